// src/bus/broadcast.rs

//! Delivering one message to every open channel. A broadcast either commits
//! to all open channels in one step or to none of them.

use super::Bus;
use crate::channel::{ChannelId, WaitSide};
use crate::error::{record, BusError};
use crate::internal::waiter::Wakeups;
use crate::telemetry;
use crate::Message;

/// Outcome of one attempt at a blocking broadcast.
enum Attempt {
  Committed,
  /// This channel cannot take the message yet.
  Blocked(usize, ChannelId),
}

impl Bus {
  /// Appends `value` to every open channel without suspending.
  ///
  /// # Errors
  /// - [`BusError::WouldBlock`] if any open channel is full. Nothing is sent.
  /// - [`BusError::NoSuchChannel`] if no channel is open.
  pub fn try_broadcast(&self, value: Message) -> Result<(), BusError> {
    record(self.try_broadcast_inner(value))
  }

  fn try_broadcast_inner(&self, value: Message) -> Result<(), BusError> {
    let mut wakeups = Wakeups::new();
    let result = {
      let mut state = self.state.borrow_mut();
      let mut open = 0;
      let mut all_have_space = true;
      for ch in state.open_channels() {
        open += 1;
        all_have_space &= ch.has_space();
      }
      if open == 0 {
        Err(BusError::NoSuchChannel)
      } else if !all_have_space {
        Err(BusError::WouldBlock)
      } else {
        for ch in state.open_channels() {
          ch.commit_broadcast(value, false, &mut wakeups);
        }
        Ok(())
      }
    };
    wakeups.wake();
    result
  }

  /// Appends `value` to every open channel, suspending until all of them can
  /// take it at once.
  ///
  /// A channel can take the message when it has a free slot, or when it is
  /// empty and a receiver is parked on it. While some channel cannot, this
  /// call parks on that channel's send queue and starts over when resumed.
  /// Channels closed in the meantime simply drop out of the broadcast.
  ///
  /// # Errors
  /// [`BusError::NoSuchChannel`] if no channel is open.
  pub async fn broadcast(&self, value: Message) -> Result<(), BusError> {
    record(self.broadcast_inner(value).await)
  }

  async fn broadcast_inner(&self, value: Message) -> Result<(), BusError> {
    loop {
      match self.attempt_broadcast(value)? {
        Attempt::Committed => return Ok(()),
        Attempt::Blocked(handle, id) => {
          if self.park(handle, id, WaitSide::Senders).await.is_err() {
            telemetry::increment_counter("bus::broadcast", "BlockerClosed");
          }
        }
      }
    }
  }

  fn attempt_broadcast(&self, value: Message) -> Result<Attempt, BusError> {
    let mut wakeups = Wakeups::new();
    let attempt = {
      let mut state = self.state.borrow_mut();
      let mut open = 0;
      let mut blocker = None;
      for (handle, slot) in state.slots.iter().enumerate() {
        let Some(ch) = slot else { continue };
        open += 1;
        if blocker.is_none() && !ch.accepts_broadcast() {
          blocker = Some((handle, ch.id()));
        }
      }
      match (open, blocker) {
        (0, _) => Err(BusError::NoSuchChannel),
        (_, Some((handle, id))) => Ok(Attempt::Blocked(handle, id)),
        (_, None) => {
          for ch in state.open_channels() {
            ch.commit_broadcast(value, true, &mut wakeups);
          }
          Ok(Attempt::Committed)
        }
      }
    };
    wakeups.wake();
    attempt
  }
}
