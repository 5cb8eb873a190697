// src/bus/batch.rs

//! Vectorized send and receive. A partial transfer is a success and reports
//! how many messages moved.

use super::Bus;
use crate::channel::WaitSide;
use crate::error::{record, BusError};
use crate::Message;

impl Bus {
  /// Sends as many of `values` as currently fit, in order, without
  /// suspending. Returns how many were sent; the rest are left untouched.
  ///
  /// # Errors
  /// - [`BusError::WouldBlock`] if the channel has no free slot.
  /// - [`BusError::NoSuchChannel`] if `handle` is not open.
  pub fn try_send_many(&self, handle: usize, values: &[Message]) -> Result<usize, BusError> {
    record(self.with_channel(handle, |ch, wakeups| ch.try_send_many(values, wakeups)))
  }

  /// Suspends until the channel has at least one free slot, then sends as
  /// many of `values` as fit. Returns how many were sent.
  ///
  /// # Errors
  /// [`BusError::NoSuchChannel`] if `handle` is not open, or if the channel
  /// is closed while this call is suspended.
  pub async fn send_many(&self, handle: usize, values: &[Message]) -> Result<usize, BusError> {
    record(self.send_many_inner(handle, values).await)
  }

  async fn send_many_inner(&self, handle: usize, values: &[Message]) -> Result<usize, BusError> {
    let id = self.resolve(handle)?;
    loop {
      match self.with_channel_id(handle, id, |ch, wakeups| ch.try_send_many(values, wakeups)) {
        Err(BusError::WouldBlock) => {}
        result => return result,
      }
      self.park(handle, id, WaitSide::Senders).await?;
    }
  }

  /// Receives up to `max` messages, oldest first, without suspending.
  ///
  /// # Errors
  /// - [`BusError::WouldBlock`] if the channel is empty.
  /// - [`BusError::NoSuchChannel`] if `handle` is not open.
  pub fn try_recv_many(&self, handle: usize, max: usize) -> Result<Vec<Message>, BusError> {
    record(self.with_channel(handle, |ch, wakeups| ch.try_recv_many(max, wakeups)))
  }

  /// Suspends until the channel has at least one message, then receives up
  /// to `max` of them. If messages remain afterwards, the next parked
  /// receiver is woken to take them.
  ///
  /// # Errors
  /// [`BusError::NoSuchChannel`] if `handle` is not open, or if the channel
  /// is closed while this call is suspended.
  pub async fn recv_many(&self, handle: usize, max: usize) -> Result<Vec<Message>, BusError> {
    record(self.recv_many_inner(handle, max).await)
  }

  async fn recv_many_inner(&self, handle: usize, max: usize) -> Result<Vec<Message>, BusError> {
    let id = self.resolve(handle)?;
    loop {
      let received = self.with_channel_id(handle, id, |ch, wakeups| {
        let values = ch.try_recv_many(max, wakeups)?;
        ch.pass_on_leftovers(wakeups);
        Ok(values)
      });
      match received {
        Err(BusError::WouldBlock) => {}
        result => return result,
      }
      self.park(handle, id, WaitSide::Receivers).await?;
    }
  }
}
