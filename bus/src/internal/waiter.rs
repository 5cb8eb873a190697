use std::collections::VecDeque;
use std::fmt;
use std::task::Waker;

/// Opaque name of one parked call. Unique for the lifetime of a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Ticket(pub(crate) u64);

/// One parked coroutine's membership in a wait queue.
#[derive(Debug)]
struct Waiter {
  ticket: Ticket,
  waker: Waker,
}

/// Wakers collected while the bus state is borrowed.
///
/// Waking is deferred until the borrow is released so an executor that polls
/// inline from `wake()` can never re-enter a borrowed bus.
#[derive(Default)]
pub(crate) struct Wakeups {
  wakers: Vec<Waker>,
}

impl Wakeups {
  pub(crate) fn new() -> Self {
    Self { wakers: Vec::new() }
  }

  #[inline]
  pub(crate) fn push(&mut self, waker: Waker) {
    self.wakers.push(waker);
  }

  pub(crate) fn len(&self) -> usize {
    self.wakers.len()
  }

  pub(crate) fn wake(self) {
    for waker in self.wakers {
      waker.wake();
    }
  }
}

impl fmt::Debug for Wakeups {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Wakeups").field("len", &self.wakers.len()).finish()
  }
}

/// FIFO of coroutines parked on one condition of a channel (not full, or not
/// empty).
///
/// Waking always pops the oldest entry, so two wakeups issued back to back
/// reach two different coroutines. A woken coroutine is no longer queued; if
/// it finds the condition false again it parks at the tail.
#[derive(Default)]
pub(crate) struct WaitQueue {
  waiters: VecDeque<Waiter>,
}

impl fmt::Debug for WaitQueue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WaitQueue")
      .field("len", &self.waiters.len())
      .finish()
  }
}

impl WaitQueue {
  pub(crate) fn new() -> Self {
    Self {
      waiters: VecDeque::new(),
    }
  }

  #[inline]
  pub(crate) fn is_empty(&self) -> bool {
    self.waiters.is_empty()
  }

  #[inline]
  pub(crate) fn len(&self) -> usize {
    self.waiters.len()
  }

  /// Appends a waiter to the tail.
  pub(crate) fn push_back(&mut self, ticket: Ticket, waker: Waker) {
    debug_assert!(
      !self.contains(ticket),
      "ticket {:?} is already parked in this queue",
      ticket
    );
    self.waiters.push_back(Waiter { ticket, waker });
  }

  pub(crate) fn contains(&self, ticket: Ticket) -> bool {
    self.waiters.iter().any(|w| w.ticket == ticket)
  }

  /// Swaps in a fresh waker for a still-queued ticket.
  ///
  /// Returns `false` when the ticket is no longer queued, which means a waker
  /// already popped it.
  pub(crate) fn refresh(&mut self, ticket: Ticket, waker: &Waker) -> bool {
    match self.waiters.iter_mut().find(|w| w.ticket == ticket) {
      Some(waiter) => {
        if !waiter.waker.will_wake(waker) {
          waiter.waker = waker.clone();
        }
        true
      }
      None => false,
    }
  }

  /// Unlinks a ticket. Returns `false` if it was not queued.
  pub(crate) fn remove(&mut self, ticket: Ticket) -> bool {
    match self.waiters.iter().position(|w| w.ticket == ticket) {
      Some(index) => {
        self.waiters.remove(index);
        true
      }
      None => false,
    }
  }

  /// Pops the oldest waiter and schedules it for wakeup. No-op when empty.
  pub(crate) fn wake_first(&mut self, wakeups: &mut Wakeups) -> bool {
    match self.waiters.pop_front() {
      Some(waiter) => {
        wakeups.push(waiter.waker);
        true
      }
      None => false,
    }
  }

  /// Pops every waiter, oldest first, and schedules all of them.
  pub(crate) fn wake_all(&mut self, wakeups: &mut Wakeups) -> usize {
    let count = self.waiters.len();
    for waiter in self.waiters.drain(..) {
      wakeups.push(waiter.waker);
    }
    count
  }
}


#[cfg(test)]
mod tests {
  use super::test_util::counting_waker;
  use super::*;

  #[test]
  fn wake_first_is_oldest_first() {
    let mut q = WaitQueue::new();
    let (a, wa) = counting_waker();
    let (b, wb) = counting_waker();
    q.push_back(Ticket(1), wa);
    q.push_back(Ticket(2), wb);

    let mut wakeups = Wakeups::new();
    assert!(q.wake_first(&mut wakeups));
    assert_eq!(a.hits(), 0, "waking is deferred until Wakeups::wake");
    wakeups.wake();
    assert_eq!(a.hits(), 1);
    assert_eq!(b.hits(), 0);
    assert!(!q.contains(Ticket(1)));
    assert!(q.contains(Ticket(2)));
  }

  #[test]
  fn back_to_back_wakes_reach_distinct_waiters() {
    let mut q = WaitQueue::new();
    let (a, wa) = counting_waker();
    let (b, wb) = counting_waker();
    q.push_back(Ticket(1), wa);
    q.push_back(Ticket(2), wb);

    let mut wakeups = Wakeups::new();
    q.wake_first(&mut wakeups);
    q.wake_first(&mut wakeups);
    assert!(!q.wake_first(&mut wakeups), "empty queue wake is a no-op");
    assert_eq!(wakeups.len(), 2);
    wakeups.wake();
    assert_eq!((a.hits(), b.hits()), (1, 1));
    assert!(q.is_empty());
  }

  #[test]
  fn refresh_and_remove() {
    let mut q = WaitQueue::new();
    let (old, w_old) = counting_waker();
    let (new, w_new) = counting_waker();
    q.push_back(Ticket(9), w_old);
    assert!(q.refresh(Ticket(9), &w_new));
    assert!(!q.refresh(Ticket(10), &w_new));

    let mut wakeups = Wakeups::new();
    q.wake_first(&mut wakeups);
    wakeups.wake();
    assert_eq!(old.hits(), 0);
    assert_eq!(new.hits(), 1);

    let (_, w) = counting_waker();
    q.push_back(Ticket(11), w);
    assert!(q.remove(Ticket(11)));
    assert!(!q.remove(Ticket(11)));
    assert_eq!(q.len(), 0);
  }

  #[test]
  fn wake_all_drains() {
    let mut q = WaitQueue::new();
    let counters: Vec<_> = (0..4)
      .map(|i| {
        let (c, w) = counting_waker();
        q.push_back(Ticket(i), w);
        c
      })
      .collect();
    let mut wakeups = Wakeups::new();
    assert_eq!(q.wake_all(&mut wakeups), 4);
    wakeups.wake();
    assert!(q.is_empty());
    assert!(counters.iter().all(|c| c.hits() == 1));
  }
}
