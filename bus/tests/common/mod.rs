#![allow(dead_code)]

use corobus::{Bus, BusError, Message};
use futures_executor::LocalPool;
use futures_util::task::LocalSpawnExt;
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

pub const ITEMS_LOW: usize = 50;
pub const ITEMS_MEDIUM: usize = 200;
pub const ITEMS_HIGH: usize = 1000;

/// Output of a spawned task, filled in once it completes.
pub type Slot<T> = Rc<RefCell<Option<T>>>;

pub fn spawn_recorded<T: 'static>(pool: &LocalPool, fut: impl Future<Output = T> + 'static) -> Slot<T> {
  let slot = Rc::new(RefCell::new(None));
  let out = slot.clone();
  pool
    .spawner()
    .spawn_local(async move {
      let value = fut.await;
      *out.borrow_mut() = Some(value);
    })
    .expect("local pool accepts tasks");
  slot
}

pub fn recv_task(pool: &LocalPool, bus: &Bus, handle: usize) -> Slot<Result<Message, BusError>> {
  let bus = bus.clone();
  spawn_recorded(pool, async move { bus.recv(handle).await })
}

pub fn send_task(pool: &LocalPool, bus: &Bus, handle: usize, value: Message) -> Slot<Result<(), BusError>> {
  let bus = bus.clone();
  spawn_recorded(pool, async move { bus.send(handle, value).await })
}

pub fn taken<T: Clone>(slot: &Slot<T>) -> Option<T> {
  slot.borrow().clone()
}
