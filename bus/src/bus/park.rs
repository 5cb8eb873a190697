// src/bus/park.rs

//! The single suspension point of the bus.

use super::Bus;
use crate::channel::{ChannelId, WaitSide};
use crate::error::BusError;
use crate::internal::waiter::{Ticket, Wakeups};
use crate::telemetry;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParkState {
  /// Not yet queued.
  Idle,
  /// Queued under this ticket.
  Parked(Ticket),
  Done,
}

/// Parks the current task on one wait queue of a channel until another
/// coroutine wakes it.
///
/// The first poll appends the task's waker to the tail of the queue and
/// returns `Pending`. Later polls complete once a waker has popped the entry;
/// a poll while the entry is still queued only refreshes the waker. The
/// future resolves to `Err(NoSuchChannel)` if the channel was closed (or its
/// handle reused) in the meantime.
///
/// Completing does not mean the awaited condition holds. Callers re-check it
/// and park again if another coroutine got there first.
///
/// Dropping a parked `Park` unlinks its entry. If it had already been woken
/// but never resumed, the wakeup is passed on to the next waiter so it is
/// not lost.
#[must_use = "futures do nothing unless you .await or poll them"]
#[derive(Debug)]
pub(crate) struct Park<'a> {
  bus: &'a Bus,
  handle: usize,
  id: ChannelId,
  side: WaitSide,
  state: ParkState,
}

impl<'a> Park<'a> {
  pub(super) fn new(bus: &'a Bus, handle: usize, id: ChannelId, side: WaitSide) -> Self {
    Self {
      bus,
      handle,
      id,
      side,
      state: ParkState::Idle,
    }
  }

  fn enqueue(&self, cx: &Context<'_>) -> Result<Ticket, BusError> {
    let mut wakeups = Wakeups::new();
    let ticket = {
      let mut state = self.bus.state.borrow_mut();
      let ticket = state.issue_ticket();
      let channel = state
        .channel_with_id(self.handle, self.id)
        .ok_or(BusError::NoSuchChannel)?;
      channel
        .wait_queue_mut(self.side)
        .push_back(ticket, cx.waker().clone());
      if self.side == WaitSide::Receivers {
        channel.receiver_parked(&mut wakeups);
      }
      ticket
    };
    wakeups.wake();
    Ok(ticket)
  }

  /// `Some(true)` while still queued, `Some(false)` once popped by a waker,
  /// `None` if the channel is gone.
  fn still_queued(&self, ticket: Ticket, cx: &Context<'_>) -> Option<bool> {
    let mut state = self.bus.state.borrow_mut();
    let channel = state.channel_with_id(self.handle, self.id)?;
    Some(channel.wait_queue_mut(self.side).refresh(ticket, cx.waker()))
  }
}

impl Future for Park<'_> {
  type Output = Result<(), BusError>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();
    match this.state {
      ParkState::Idle => match this.enqueue(cx) {
        Ok(ticket) => {
          tracing::trace!(handle = this.handle, side = ?this.side, ticket = ticket.0, "parked");
          telemetry::increment_counter("bus::park", "Parked");
          this.state = ParkState::Parked(ticket);
          Poll::Pending
        }
        Err(err) => {
          this.state = ParkState::Done;
          Poll::Ready(Err(err))
        }
      },
      ParkState::Parked(ticket) => match this.still_queued(ticket, cx) {
        Some(true) => Poll::Pending,
        Some(false) => {
          tracing::trace!(handle = this.handle, side = ?this.side, ticket = ticket.0, "resumed");
          this.state = ParkState::Done;
          Poll::Ready(Ok(()))
        }
        None => {
          tracing::trace!(handle = this.handle, ticket = ticket.0, "resumed on closed channel");
          telemetry::increment_counter("bus::park", "ResumedClosed");
          this.state = ParkState::Done;
          Poll::Ready(Err(BusError::NoSuchChannel))
        }
      },
      ParkState::Done => Poll::Ready(Ok(())),
    }
  }
}

impl Drop for Park<'_> {
  fn drop(&mut self) {
    let ParkState::Parked(ticket) = self.state else {
      return;
    };
    let mut wakeups = Wakeups::new();
    let borrowed = self.bus.state.try_borrow_mut();
    // Wakers only run after the state borrow is released, so the borrow can
    // only be held here while unwinding out of a bus operation.
    debug_assert!(
      borrowed.is_ok() || std::thread::panicking(),
      "parked call dropped while the bus state is borrowed"
    );
    if let Ok(mut state) = borrowed {
      if let Some(channel) = state.channel_with_id(self.handle, self.id) {
        let queue = channel.wait_queue_mut(self.side);
        if !queue.remove(ticket) {
          // Woken but abandoned before it could act on it.
          queue.wake_first(&mut wakeups);
          telemetry::increment_counter("bus::park", "WakeupForwarded");
        }
      }
    }
    wakeups.wake();
  }
}
