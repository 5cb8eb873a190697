//! A bounded, in-memory message bus for cooperatively scheduled coroutines.
//!
//! Corobus provides a registry of bounded FIFO channels addressed by small
//! integer handles. Coroutines running on one thread exchange `u32` messages
//! through them with blocking (`async`), non-blocking, batched, and broadcast
//! operations. Backpressure, oldest-first wakeup, and safe close are built
//! purely on suspending and waking tasks; there are no locks and no OS-level
//! blocking.
//!
//! ```rust
//! use corobus::{Bus, BusError};
//! use futures_executor::LocalPool;
//! use futures_util::task::LocalSpawnExt;
//!
//! let mut pool = LocalPool::new();
//! let bus = Bus::new();
//! let ch = bus.open(2);
//!
//! let producer = bus.clone();
//! pool.spawner().spawn_local(async move {
//!   for v in 1..=5 {
//!     producer.send(ch, v).await.unwrap();
//!   }
//! }).unwrap();
//!
//! let total = pool.run_until(async {
//!   let mut total = 0;
//!   for _ in 0..5 {
//!     total += bus.recv(ch).await.unwrap();
//!   }
//!   total
//! });
//! assert_eq!(total, 15);
//! assert_eq!(bus.try_recv(ch), Err(BusError::WouldBlock));
//! ```

pub mod bus;
pub mod error;
pub mod telemetry;

mod channel;
mod internal;

/// A message carried by the bus.
pub type Message = u32;

pub use bus::{Bus, Messages};
pub use error::{last_error, set_last_error, BusError, ErrorCode};
