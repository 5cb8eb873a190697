// src/bus/stream.rs

use super::Bus;
use crate::channel::ChannelId;
use crate::error::{record, BusError};
use crate::Message;

use futures_core::stream::FusedStream;
use futures_core::Stream;
use futures_util::future::{FutureExt, LocalBoxFuture};

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A [`Stream`] of the messages received from one channel.
///
/// The stream is bound to the channel that occupies the handle when it is
/// created. It ends once that channel is closed (or if none was open), even
/// if a new channel later reuses the handle.
#[must_use = "streams do nothing unless polled"]
pub struct Messages {
  bus: Bus,
  handle: usize,
  /// `None` once the stream has ended.
  id: Option<ChannelId>,
  pending: Option<LocalBoxFuture<'static, Result<Message, BusError>>>,
}

impl fmt::Debug for Messages {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Messages")
      .field("handle", &self.handle)
      .field("ended", &self.id.is_none())
      .field("pending", &self.pending.is_some())
      .finish()
  }
}

impl Bus {
  /// Returns a stream that receives from `handle` until the channel closes.
  pub fn messages(&self, handle: usize) -> Messages {
    Messages {
      bus: self.clone(),
      handle,
      id: self.resolve(handle).ok(),
      pending: None,
    }
  }
}

impl Stream for Messages {
  type Item = Message;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    let this = self.get_mut();
    let Some(id) = this.id else {
      return Poll::Ready(None);
    };
    let recv = this.pending.get_or_insert_with(|| {
      let bus = this.bus.clone();
      let handle = this.handle;
      async move { record(bus.recv_from(handle, id).await) }.boxed_local()
    });
    match recv.as_mut().poll(cx) {
      Poll::Ready(result) => {
        this.pending = None;
        if result.is_err() {
          this.id = None;
        }
        Poll::Ready(result.ok())
      }
      Poll::Pending => Poll::Pending,
    }
  }
}

impl FusedStream for Messages {
  fn is_terminated(&self) -> bool {
    self.id.is_none()
  }
}
