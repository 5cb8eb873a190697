// src/bus/mod.rs

//! The bus: a registry of bounded channels addressed by small integer
//! handles, plus the blocking and non-blocking operations on them.
//!
//! The bus is built for single-threaded cooperative scheduling. A [`Bus`] is a
//! cheap `Rc` handle and is neither `Send` nor `Sync`; run the coroutines that
//! share it on one thread, e.g. on a `futures::executor::LocalPool` or inside a
//! `tokio::task::LocalSet`.
//!
//! ### Suspension model
//!
//! Non-blocking operations (`try_*`) are plain functions. Blocking operations
//! are `async` and suspend only inside [`park::Park`], which enqueues the
//! task's waker on one of the channel's wait queues and returns `Pending`.
//! Another coroutine's send, receive, or close pops that waker and wakes it;
//! the task runs again the next time the executor polls it.
//!
//! A parked call remembers the [`ChannelId`] it parked on. On resumption it
//! compares that identity with the current occupant of the handle slot, so a
//! channel that was closed (and possibly replaced by a newly opened one under
//! the same handle) is reported as [`BusError::NoSuchChannel`].

mod batch;
mod broadcast;
pub(crate) mod park;
mod stream;


pub use stream::Messages;

use crate::channel::{Channel, ChannelId, WaitSide};
use crate::error::{record, BusError};
use crate::internal::waiter::{Ticket, Wakeups};
use crate::telemetry;
use crate::Message;

use park::Park;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Registry state shared by every clone of a [`Bus`].
#[derive(Debug, Default)]
pub(crate) struct BusState {
  slots: Vec<Option<Channel>>,
  next_id: u64,
  next_ticket: u64,
}

impl BusState {
  fn channel(&self, handle: usize) -> Option<&Channel> {
    self.slots.get(handle).and_then(Option::as_ref)
  }

  fn channel_mut(&mut self, handle: usize) -> Option<&mut Channel> {
    self.slots.get_mut(handle).and_then(Option::as_mut)
  }

  /// The channel at `handle`, only if it is still the one identified by `id`.
  pub(crate) fn channel_with_id(&mut self, handle: usize, id: ChannelId) -> Option<&mut Channel> {
    self.channel_mut(handle).filter(|ch| ch.id() == id)
  }

  pub(crate) fn issue_ticket(&mut self) -> Ticket {
    let ticket = Ticket(self.next_ticket);
    self.next_ticket += 1;
    ticket
  }

  fn open_channels(&mut self) -> impl Iterator<Item = &mut Channel> {
    self.slots.iter_mut().filter_map(Option::as_mut)
  }
}

/// A handle to a coroutine message bus.
///
/// Cloning yields another handle to the same bus. Parked operations keep
/// their bus alive until they resume or are dropped.
#[derive(Clone, Default)]
pub struct Bus {
  pub(crate) state: Rc<RefCell<BusState>>,
}

impl fmt::Debug for Bus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.state.try_borrow() {
      Ok(state) => f
        .debug_struct("Bus")
        .field("slots", &state.slots.len())
        .field("open", &state.slots.iter().filter(|s| s.is_some()).count())
        .finish(),
      Err(_) => f.debug_struct("Bus").finish_non_exhaustive(),
    }
  }
}

impl Bus {
  /// Creates an empty bus.
  pub fn new() -> Self {
    Self::default()
  }

  /// Creates an empty bus with room for `slots` channel handles before the
  /// registry has to grow.
  pub fn with_slots(slots: usize) -> Self {
    let state = BusState {
      slots: Vec::with_capacity(slots),
      ..BusState::default()
    };
    Self {
      state: Rc::new(RefCell::new(state)),
    }
  }

  /// Closes every open channel and releases this handle.
  ///
  /// Every coroutine parked on any channel is resumed and its operation fails
  /// with [`BusError::NoSuchChannel`]. Other clones of this bus remain usable
  /// and see an empty registry.
  pub fn delete(self) {
    let mut wakeups = Wakeups::new();
    let closed = {
      let mut state = self.state.borrow_mut();
      let mut closed = 0;
      for slot in state.slots.iter_mut() {
        if let Some(channel) = slot.take() {
          channel.close(&mut wakeups);
          closed += 1;
        }
      }
      state.slots.clear();
      closed
    };
    tracing::debug!(channels = closed, woken = wakeups.len(), "bus deleted");
    telemetry::log_event(None, "bus::delete", "BusDeleted", None);
    wakeups.wake();
  }

  /// Opens a channel that buffers at most `capacity` messages and returns
  /// its handle.
  ///
  /// The lowest free handle is reused; otherwise a new one is appended. A
  /// capacity of `0` is accepted, but such a channel is always full: sends
  /// block (or fail with `WouldBlock`) until it is closed.
  pub fn open(&self, capacity: usize) -> usize {
    let mut state = self.state.borrow_mut();
    let id = ChannelId(state.next_id);
    state.next_id += 1;
    let channel = Channel::new(id, capacity);

    let handle = match state.slots.iter().position(Option::is_none) {
      Some(free) => {
        state.slots[free] = Some(channel);
        free
      }
      None => {
        state.slots.push(Some(channel));
        state.slots.len() - 1
      }
    };
    tracing::debug!(handle, capacity, "channel opened");
    telemetry::increment_counter("bus::open", "ChannelsOpened");
    handle
  }

  /// Closes the channel at `handle`. Does nothing if the handle is not open.
  ///
  /// Every coroutine parked on the channel is resumed and its operation fails
  /// with [`BusError::NoSuchChannel`]. Queued messages are discarded and the
  /// handle becomes free for reuse.
  pub fn close(&self, handle: usize) {
    let mut wakeups = Wakeups::new();
    {
      let mut state = self.state.borrow_mut();
      let Some(channel) = state.slots.get_mut(handle).and_then(Option::take) else {
        return;
      };
      let dropped = channel.len();
      let woken = channel.close(&mut wakeups);
      tracing::debug!(handle, woken, dropped, "channel closed");
    }
    telemetry::log_event(Some(handle), "bus::close", "ChannelClosed", None);
    wakeups.wake();
  }

  /// Returns `true` if `handle` names an open channel.
  pub fn is_open(&self, handle: usize) -> bool {
    self.state.borrow().channel(handle).is_some()
  }

  /// Number of open channels.
  pub fn channel_count(&self) -> usize {
    self.state.borrow().slots.iter().filter(|s| s.is_some()).count()
  }

  /// Number of messages buffered in the channel.
  pub fn len(&self, handle: usize) -> Result<usize, BusError> {
    record(self.inspect(handle, Channel::len))
  }

  /// Returns `true` if the channel has no buffered messages.
  pub fn is_empty(&self, handle: usize) -> Result<bool, BusError> {
    self.len(handle).map(|len| len == 0)
  }

  /// The capacity the channel was opened with.
  pub fn capacity(&self, handle: usize) -> Result<usize, BusError> {
    record(self.inspect(handle, Channel::capacity))
  }

  /// Number of coroutines parked waiting for the channel to have space.
  pub fn waiting_senders(&self, handle: usize) -> Result<usize, BusError> {
    record(self.inspect(handle, |ch| ch.waiting(WaitSide::Senders)))
  }

  /// Number of coroutines parked waiting for the channel to have a message.
  pub fn waiting_receivers(&self, handle: usize) -> Result<usize, BusError> {
    record(self.inspect(handle, |ch| ch.waiting(WaitSide::Receivers)))
  }

  /// Sends `value` without suspending.
  ///
  /// # Errors
  /// - [`BusError::WouldBlock`] if the channel is full. Nothing is queued.
  /// - [`BusError::NoSuchChannel`] if `handle` is not open.
  pub fn try_send(&self, handle: usize, value: Message) -> Result<(), BusError> {
    record(self.with_channel(handle, |ch, wakeups| ch.try_send(value, wakeups)))
  }

  /// Sends `value`, suspending while the channel is full.
  ///
  /// # Errors
  /// [`BusError::NoSuchChannel`] if `handle` is not open, or if the channel
  /// is closed while this call is suspended.
  pub async fn send(&self, handle: usize, value: Message) -> Result<(), BusError> {
    record(self.send_inner(handle, value).await)
  }

  async fn send_inner(&self, handle: usize, value: Message) -> Result<(), BusError> {
    let id = self.resolve(handle)?;
    loop {
      let sent =
        self.with_channel_id(handle, id, |ch, wakeups| Ok(ch.send_step(value, wakeups)))?;
      if sent {
        return Ok(());
      }
      self.park(handle, id, WaitSide::Senders).await?;
    }
  }

  /// Receives the oldest message without suspending.
  ///
  /// # Errors
  /// - [`BusError::WouldBlock`] if the channel is empty.
  /// - [`BusError::NoSuchChannel`] if `handle` is not open.
  pub fn try_recv(&self, handle: usize) -> Result<Message, BusError> {
    record(self.with_channel(handle, |ch, wakeups| ch.try_recv(wakeups)))
  }

  /// Receives the oldest message, suspending while the channel is empty.
  ///
  /// # Errors
  /// [`BusError::NoSuchChannel`] if `handle` is not open, or if the channel
  /// is closed while this call is suspended.
  pub async fn recv(&self, handle: usize) -> Result<Message, BusError> {
    record(self.recv_inner(handle).await)
  }

  async fn recv_inner(&self, handle: usize) -> Result<Message, BusError> {
    let id = self.resolve(handle)?;
    self.recv_from(handle, id).await
  }

  /// Blocking receive from the channel `id`, which must still occupy
  /// `handle`.
  pub(crate) async fn recv_from(&self, handle: usize, id: ChannelId) -> Result<Message, BusError> {
    loop {
      match self.with_channel_id(handle, id, |ch, wakeups| ch.try_recv(wakeups)) {
        Err(BusError::WouldBlock) => {}
        result => return result,
      }
      self.park(handle, id, WaitSide::Receivers).await?;
    }
  }

  /// Identity of the channel currently at `handle`.
  pub(crate) fn resolve(&self, handle: usize) -> Result<ChannelId, BusError> {
    self
      .state
      .borrow()
      .channel(handle)
      .map(Channel::id)
      .ok_or(BusError::NoSuchChannel)
  }

  pub(crate) fn park(&self, handle: usize, id: ChannelId, side: WaitSide) -> Park<'_> {
    Park::new(self, handle, id, side)
  }

  fn inspect<R>(&self, handle: usize, f: impl FnOnce(&Channel) -> R) -> Result<R, BusError> {
    self
      .state
      .borrow()
      .channel(handle)
      .map(f)
      .ok_or(BusError::NoSuchChannel)
  }

  /// Runs `f` against the open channel at `handle`, then wakes whatever it
  /// scheduled once the state borrow is released.
  pub(crate) fn with_channel<R>(
    &self,
    handle: usize,
    f: impl FnOnce(&mut Channel, &mut Wakeups) -> Result<R, BusError>,
  ) -> Result<R, BusError> {
    let mut wakeups = Wakeups::new();
    let result = match self.state.borrow_mut().channel_mut(handle) {
      Some(ch) => f(ch, &mut wakeups),
      None => Err(BusError::NoSuchChannel),
    };
    wakeups.wake();
    result
  }

  /// Like [`with_channel`](Self::with_channel), but fails with
  /// `NoSuchChannel` if the slot no longer holds the channel `id`.
  pub(crate) fn with_channel_id<R>(
    &self,
    handle: usize,
    id: ChannelId,
    f: impl FnOnce(&mut Channel, &mut Wakeups) -> Result<R, BusError>,
  ) -> Result<R, BusError> {
    let mut wakeups = Wakeups::new();
    let result = match self.state.borrow_mut().channel_with_id(handle, id) {
      Some(ch) => f(ch, &mut wakeups),
      None => Err(BusError::NoSuchChannel),
    };
    wakeups.wake();
    result
  }
}
