mod common;
use common::*;

use corobus::{Bus, BusError, Message};
use futures_executor::LocalPool;
use futures_util::stream::{FusedStream, StreamExt};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

const PRODUCERS: usize = 4;
const CONSUMERS: usize = 3;
const PER_PRODUCER: usize = 150;
const PER_CONSUMER: usize = PRODUCERS * PER_PRODUCER / CONSUMERS;

fn encode(producer: usize, seq: usize) -> Message {
  (producer * 100_000 + seq) as Message
}

#[test]
fn many_producers_many_consumers_stay_bounded_and_ordered() {
  let mut pool = LocalPool::new();
  let bus = Bus::new();
  let capacity = 3;
  let ch = bus.open(capacity);
  let overflow = Rc::new(RefCell::new(false));

  let producers: Vec<_> = (0..PRODUCERS)
    .map(|p| {
      let bus = bus.clone();
      let overflow = overflow.clone();
      spawn_recorded(&pool, async move {
        for seq in 0..PER_PRODUCER {
          bus.send(ch, encode(p, seq)).await?;
          if bus.len(ch)? > capacity {
            *overflow.borrow_mut() = true;
          }
        }
        Ok::<_, BusError>(())
      })
    })
    .collect();

  let consumers: Vec<_> = (0..CONSUMERS)
    .map(|_| {
      let bus = bus.clone();
      spawn_recorded(&pool, async move {
        let mut got = Vec::with_capacity(PER_CONSUMER);
        for _ in 0..PER_CONSUMER {
          got.push(bus.recv(ch).await?);
        }
        Ok::<_, BusError>(got)
      })
    })
    .collect();

  pool.run_until_stalled();

  assert!(!*overflow.borrow(), "channel held more than its capacity");
  for p in &producers {
    assert_eq!(taken(p), Some(Ok(())));
  }

  let mut total = 0;
  for c in &consumers {
    let got = taken(c).expect("consumer finished").expect("no channel errors");
    total += got.len();
    // Each consumer pops in queue order, so every producer's values it saw
    // are increasing.
    for p in 0..PRODUCERS {
      let mine: Vec<_> = got
        .iter()
        .copied()
        .filter(|v| *v as usize / 100_000 == p)
        .collect();
      assert!(mine.windows(2).all(|w| w[0] < w[1]), "producer {} out of order", p);
    }
  }
  assert_eq!(total, PRODUCERS * PER_PRODUCER);
  assert_eq!(bus.len(ch), Ok(0));
  assert_eq!(bus.waiting_senders(ch), Ok(0));
  assert_eq!(bus.waiting_receivers(ch), Ok(0));
}

#[test]
fn non_blocking_ops_follow_a_fifo_model() {
  let bus = Bus::new();
  let capacity = 5;
  let ch = bus.open(capacity);
  let mut model = VecDeque::new();
  let mut seed: u32 = 0x2545_f491;
  let mut next_value: Message = 0;

  for _ in 0..ITEMS_HIGH {
    seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
    if (seed >> 16) % 3 != 0 {
      let before = bus.len(ch).unwrap();
      match bus.try_send(ch, next_value) {
        Ok(()) => model.push_back(next_value),
        Err(err) => {
          assert_eq!(err, BusError::WouldBlock);
          assert_eq!(model.len(), capacity);
          assert_eq!(bus.len(ch).unwrap(), before, "a failed try_send must not mutate");
        }
      }
      next_value += 1;
    } else {
      match bus.try_recv(ch) {
        Ok(v) => assert_eq!(Some(v), model.pop_front()),
        Err(err) => {
          assert_eq!(err, BusError::WouldBlock);
          assert!(model.is_empty());
        }
      }
    }
    assert!(bus.len(ch).unwrap() <= capacity);
    assert_eq!(bus.len(ch).unwrap(), model.len());
  }
}

#[test]
fn stream_yields_until_channel_closes() {
  let mut pool = LocalPool::new();
  let bus = Bus::new();
  let ch = bus.open(4);

  let stream_bus = bus.clone();
  let collected = spawn_recorded(&pool, async move { stream_bus.messages(ch).collect::<Vec<_>>().await });

  bus.try_send(ch, 1).unwrap();
  bus.try_send(ch, 2).unwrap();
  pool.run_until_stalled();
  assert_eq!(taken(&collected), None, "stream is parked waiting for more");

  bus.try_send(ch, 3).unwrap();
  pool.run_until_stalled();
  bus.close(ch);
  pool.run_until_stalled();
  assert_eq!(taken(&collected), Some(vec![1, 2, 3]));
}

#[test]
fn blocked_receivers_on_separate_channels_are_independent() {
  let mut pool = LocalPool::new();
  let bus = Bus::new();
  let a = bus.open(1);
  let b = bus.open(1);
  let ra = recv_task(&pool, &bus, a);
  let rb = recv_task(&pool, &bus, b);
  pool.run_until_stalled();

  bus.try_send(b, 20).unwrap();
  pool.run_until_stalled();
  assert_eq!(taken(&ra), None);
  assert_eq!(taken(&rb), Some(Ok(20)));

  bus.close(a);
  pool.run_until_stalled();
  assert_eq!(taken(&ra), Some(Err(BusError::NoSuchChannel)));
  assert!(bus.is_open(b));
}

#[test]
fn blocked_sender_completes_once_space_frees() {
  let mut pool = LocalPool::new();
  let bus = Bus::new();
  let ch = bus.open(1);
  bus.try_send(ch, 1).unwrap();

  let sent = send_task(&pool, &bus, ch, 2);
  pool.run_until_stalled();
  assert_eq!(taken(&sent), None);

  assert_eq!(pool.run_until(bus.recv(ch)), Ok(1));
  pool.run_until_stalled();
  assert_eq!(taken(&sent), Some(Ok(())));
  assert_eq!(bus.try_recv(ch), Ok(2));
}

#[test]
fn stream_does_not_follow_a_reused_handle() {
  let mut pool = LocalPool::new();
  let bus = Bus::new();
  let ch = bus.open(2);
  bus.try_send(ch, 1).unwrap();

  let mut stream = bus.messages(ch);
  assert_eq!(pool.run_until(stream.next()), Some(1));

  bus.close(ch);
  assert_eq!(bus.open(4), ch);
  bus.try_send(ch, 777).unwrap();

  assert_eq!(pool.run_until(stream.next()), None);
  assert!(stream.is_terminated());
  assert_eq!(pool.run_until(stream.next()), None);
  assert_eq!(bus.try_recv(ch), Ok(777));
}

#[test]
fn stream_on_a_closed_handle_is_empty() {
  let mut pool = LocalPool::new();
  let bus = Bus::new();
  let mut stream = bus.messages(3);
  assert!(stream.is_terminated());

  bus.open(1);
  assert_eq!(pool.run_until(stream.next()), None);
}
