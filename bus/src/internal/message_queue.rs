use crate::Message;

/// Storage size of a queue on its first growth.
const MIN_STORAGE: usize = 4;

/// A growable FIFO of pending messages for one channel.
///
/// The queue does not know about the channel capacity; bounding it is the
/// channel's job. Storage doubles when exceeded (starting at
/// [`MIN_STORAGE`]) and is never shrunk on pop. Popping from the front moves
/// the remaining messages down, which is fine because occupancy is bounded by
/// the channel capacity.
#[derive(Debug, Default)]
pub(crate) struct MessageQueue {
  data: Vec<Message>,
}

impl MessageQueue {
  pub(crate) fn new() -> Self {
    Self { data: Vec::new() }
  }

  #[inline]
  pub(crate) fn len(&self) -> usize {
    self.data.len()
  }

  #[inline]
  pub(crate) fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  /// Number of messages the current allocation holds without growing.
  #[cfg(test)]
  pub(crate) fn storage(&self) -> usize {
    self.data.capacity()
  }

  pub(crate) fn append(&mut self, value: Message) {
    self.grow_for(1);
    self.data.push(value);
  }

  pub(crate) fn append_many(&mut self, values: &[Message]) {
    self.grow_for(values.len());
    self.data.extend_from_slice(values);
  }

  pub(crate) fn pop_front(&mut self) -> Option<Message> {
    if self.data.is_empty() {
      None
    } else {
      Some(self.data.remove(0))
    }
  }

  /// Removes the first `count` messages, oldest first.
  ///
  /// # Panics
  /// Panics if fewer than `count` messages are queued. Callers size the
  /// request from [`len`](Self::len) first.
  pub(crate) fn pop_front_many(&mut self, count: usize) -> Vec<Message> {
    assert!(
      count <= self.data.len(),
      "popping {} messages from a queue of {}",
      count,
      self.data.len()
    );
    self.data.drain(..count).collect()
  }

  fn grow_for(&mut self, additional: usize) {
    let needed = self.data.len() + additional;
    let current = self.data.capacity();
    if needed <= current {
      return;
    }
    let mut target = if current == 0 { MIN_STORAGE } else { current * 2 };
    if target < needed {
      target = needed;
    }
    self.data.reserve_exact(target - self.data.len());
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fifo_order() {
    let mut q = MessageQueue::new();
    q.append(1);
    q.append_many(&[2, 3, 4]);
    assert_eq!(q.len(), 4);
    assert_eq!(q.pop_front(), Some(1));
    assert_eq!(q.pop_front_many(2), vec![2, 3]);
    assert_eq!(q.pop_front(), Some(4));
    assert_eq!(q.pop_front(), None);
    assert!(q.is_empty());
  }

  #[test]
  fn growth_doubles_from_minimum() {
    let mut q = MessageQueue::new();
    assert_eq!(q.storage(), 0);
    q.append(7);
    assert!(q.storage() >= MIN_STORAGE);
    let first = q.storage();
    for v in 0..first as Message {
      q.append(v);
    }
    assert!(q.storage() >= first * 2);
  }

  #[test]
  fn growth_covers_large_batches() {
    let mut q = MessageQueue::new();
    let batch: Vec<Message> = (0..37).collect();
    q.append_many(&batch);
    assert!(q.storage() >= 37);
    assert_eq!(q.pop_front_many(37), batch);
  }

  #[test]
  fn pop_does_not_shrink() {
    let mut q = MessageQueue::new();
    q.append_many(&[1, 2, 3, 4, 5, 6, 7, 8, 9]);
    let before = q.storage();
    q.pop_front_many(9);
    assert_eq!(q.storage(), before);
  }

  #[test]
  #[should_panic(expected = "popping 3 messages from a queue of 2")]
  fn pop_many_past_end_panics() {
    let mut q = MessageQueue::new();
    q.append_many(&[1, 2]);
    q.pop_front_many(3);
  }
}
