// src/channel.rs

//! One bounded channel: a message queue, a capacity, and the two wait queues
//! that coordinate its producers and consumers.
//!
//! Everything here is synchronous. The functions report whether they could
//! proceed and push the wakers they owe into a [`Wakeups`] list, which the bus
//! drains after it releases its borrow. Suspension happens one level up, in
//! [`crate::bus::park`].

use crate::error::BusError;
use crate::internal::message_queue::MessageQueue;
use crate::internal::waiter::{WaitQueue, Wakeups};
use crate::Message;

/// Stable identity of a channel, never reused within a bus even when its
/// handle slot is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ChannelId(pub(crate) u64);

/// Which of a channel's wait queues a coroutine parks on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitSide {
  /// Waiting for the channel to have a free slot.
  Senders,
  /// Waiting for the channel to have a message.
  Receivers,
}

#[derive(Debug)]
pub(crate) struct Channel {
  id: ChannelId,
  capacity: usize,
  queue: MessageQueue,
  senders: WaitQueue,
  receivers: WaitQueue,
}

impl Channel {
  pub(crate) fn new(id: ChannelId, capacity: usize) -> Self {
    Self {
      id,
      capacity,
      queue: MessageQueue::new(),
      senders: WaitQueue::new(),
      receivers: WaitQueue::new(),
    }
  }

  #[inline]
  pub(crate) fn id(&self) -> ChannelId {
    self.id
  }

  #[inline]
  pub(crate) fn capacity(&self) -> usize {
    self.capacity
  }

  #[inline]
  pub(crate) fn len(&self) -> usize {
    self.queue.len()
  }

  /// Free slots left before the channel is full. Zero-capacity channels are
  /// always full.
  #[inline]
  pub(crate) fn free_slots(&self) -> usize {
    self.capacity.saturating_sub(self.queue.len())
  }

  #[inline]
  pub(crate) fn has_space(&self) -> bool {
    self.queue.len() < self.capacity
  }

  pub(crate) fn wait_queue_mut(&mut self, side: WaitSide) -> &mut WaitQueue {
    match side {
      WaitSide::Senders => &mut self.senders,
      WaitSide::Receivers => &mut self.receivers,
    }
  }

  pub(crate) fn waiting(&self, side: WaitSide) -> usize {
    match side {
      WaitSide::Senders => self.senders.len(),
      WaitSide::Receivers => self.receivers.len(),
    }
  }

  /// Non-blocking send: append and wake one receiver.
  pub(crate) fn try_send(&mut self, value: Message, wakeups: &mut Wakeups) -> Result<(), BusError> {
    if !self.has_space() {
      return Err(BusError::WouldBlock);
    }
    self.queue.append(value);
    self.receivers.wake_first(wakeups);
    Ok(())
  }

  /// The step of a blocking send. On success it also wakes the next parked
  /// sender, so that when a drain frees several slots the parked senders wake
  /// each other one at a time as each finds space.
  ///
  /// Returns `false` when the channel is full.
  pub(crate) fn send_step(&mut self, value: Message, wakeups: &mut Wakeups) -> bool {
    if self.try_send(value, wakeups).is_err() {
      return false;
    }
    self.senders.wake_first(wakeups);
    true
  }

  /// Non-blocking receive: pop the oldest message and wake one sender.
  pub(crate) fn try_recv(&mut self, wakeups: &mut Wakeups) -> Result<Message, BusError> {
    let value = self.queue.pop_front().ok_or(BusError::WouldBlock)?;
    self.senders.wake_first(wakeups);
    Ok(value)
  }

  /// Moves as many of `values` as fit, in order. Each appended message wakes
  /// one receiver; one sender is woken at the end to continue the cascade.
  pub(crate) fn try_send_many(
    &mut self,
    values: &[Message],
    wakeups: &mut Wakeups,
  ) -> Result<usize, BusError> {
    let free = self.free_slots();
    if free == 0 {
      return Err(BusError::WouldBlock);
    }
    let count = values.len().min(free);
    self.queue.append_many(&values[..count]);
    for _ in 0..count {
      if !self.receivers.wake_first(wakeups) {
        break;
      }
    }
    self.senders.wake_first(wakeups);
    Ok(count)
  }

  /// Pops up to `max` messages, oldest first, and wakes one sender.
  pub(crate) fn try_recv_many(
    &mut self,
    max: usize,
    wakeups: &mut Wakeups,
  ) -> Result<Vec<Message>, BusError> {
    if self.queue.is_empty() {
      return Err(BusError::WouldBlock);
    }
    let count = max.min(self.queue.len());
    let values = self.queue.pop_front_many(count);
    self.senders.wake_first(wakeups);
    Ok(values)
  }

  /// After a batch receive, hands leftover messages to the next parked
  /// receiver.
  pub(crate) fn pass_on_leftovers(&mut self, wakeups: &mut Wakeups) {
    if !self.queue.is_empty() {
      self.receivers.wake_first(wakeups);
    }
  }

  /// Whether a blocking broadcast may commit to this channel now: either a
  /// slot is free, or the channel is empty with a parked receiver that will
  /// take the message as soon as it runs.
  pub(crate) fn accepts_broadcast(&self) -> bool {
    self.has_space() || (self.queue.is_empty() && !self.receivers.is_empty())
  }

  /// Called after a receiver parks. An empty channel with no free slot has
  /// just become admissible to a blocking broadcast, so every parked sender
  /// is scheduled to re-check. A plain sender parks again.
  pub(crate) fn receiver_parked(&mut self, wakeups: &mut Wakeups) {
    if self.queue.is_empty() && !self.has_space() {
      self.senders.wake_all(wakeups);
    }
  }

  /// Appends a broadcast message that was already admitted by
  /// [`accepts_broadcast`](Self::accepts_broadcast) or
  /// [`has_space`](Self::has_space), waking one receiver. A blocking
  /// broadcast also `cascade`s to the next parked sender, like a blocking
  /// send does.
  pub(crate) fn commit_broadcast(&mut self, value: Message, cascade: bool, wakeups: &mut Wakeups) {
    self.queue.append(value);
    self.receivers.wake_first(wakeups);
    if cascade {
      self.senders.wake_first(wakeups);
    }
  }

  /// Releases the channel, scheduling every parked coroutine on both queues.
  /// Returns how many were parked.
  pub(crate) fn close(mut self, wakeups: &mut Wakeups) -> usize {
    let receivers = self.receivers.wake_all(wakeups);
    let senders = self.senders.wake_all(wakeups);
    receivers + senders
  }
}
