// src/error.rs

use core::fmt;
use std::cell::Cell;

/// Error returned by bus operations.
///
/// Blocking operations only ever return [`BusError::NoSuchChannel`]; a
/// would-block condition is turned into a suspension instead.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum BusError {
  /// The handle does not name an open channel, or the channel was closed
  /// while the caller was parked on it.
  NoSuchChannel,
  /// A non-blocking operation could not proceed without suspending.
  WouldBlock,
}

impl std::error::Error for BusError {}
impl fmt::Display for BusError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BusError::NoSuchChannel => write!(f, "no such channel"),
      BusError::WouldBlock => write!(f, "operation would block"),
    }
  }
}

/// Value held by the last-error slot.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ErrorCode {
  /// No operation has failed yet (or the slot was reset).
  #[default]
  None,
  /// See [`BusError::NoSuchChannel`].
  NoSuchChannel,
  /// See [`BusError::WouldBlock`].
  WouldBlock,
}

impl From<BusError> for ErrorCode {
  fn from(err: BusError) -> Self {
    match err {
      BusError::NoSuchChannel => ErrorCode::NoSuchChannel,
      BusError::WouldBlock => ErrorCode::WouldBlock,
    }
  }
}

impl fmt::Display for ErrorCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ErrorCode::None => write!(f, "no error"),
      ErrorCode::NoSuchChannel => BusError::NoSuchChannel.fmt(f),
      ErrorCode::WouldBlock => BusError::WouldBlock.fmt(f),
    }
  }
}

// The bus is confined to one thread, so every coroutine sharing a bus also
// shares this slot.
thread_local! {
  static LAST_ERROR: Cell<ErrorCode> = const { Cell::new(ErrorCode::None) };
}

/// Returns the code of the most recent failed operation on this thread.
///
/// Successful operations leave the slot untouched, so this is only meaningful
/// right after an operation returned `Err`. Prefer matching on the returned
/// [`BusError`] directly.
pub fn last_error() -> ErrorCode {
  LAST_ERROR.with(Cell::get)
}

/// Overwrites the last-error slot for this thread.
pub fn set_last_error(code: ErrorCode) {
  LAST_ERROR.with(|slot| slot.set(code));
}

/// Stores the error of a failed result in the last-error slot and passes the
/// result through unchanged.
#[inline]
pub(crate) fn record<T>(result: Result<T, BusError>) -> Result<T, BusError> {
  if let Err(err) = &result {
    set_last_error((*err).into());
  }
  result
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn record_overwrites_only_on_failure() {
    set_last_error(ErrorCode::None);
    assert_eq!(record(Ok::<_, BusError>(1)), Ok(1));
    assert_eq!(last_error(), ErrorCode::None);

    assert_eq!(record::<()>(Err(BusError::WouldBlock)), Err(BusError::WouldBlock));
    assert_eq!(last_error(), ErrorCode::WouldBlock);

    // A later success does not clear the slot.
    let _ = record(Ok::<_, BusError>(()));
    assert_eq!(last_error(), ErrorCode::WouldBlock);

    let _ = record::<()>(Err(BusError::NoSuchChannel));
    assert_eq!(last_error(), ErrorCode::NoSuchChannel);
  }

  #[test]
  fn display_messages() {
    assert_eq!(BusError::NoSuchChannel.to_string(), "no such channel");
    assert_eq!(ErrorCode::WouldBlock.to_string(), "operation would block");
    assert_eq!(ErrorCode::default().to_string(), "no error");
  }
}
