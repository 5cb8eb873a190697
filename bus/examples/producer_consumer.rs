// examples/producer_consumer.rs
//
// Three producers feed one worker through a small channel, and a broadcast
// tells everyone listening on the bus to stop. Run with
// `RUST_LOG=corobus=trace` to watch tasks park and resume.

use corobus::{Bus, BusError};
use futures_util::StreamExt;
use tokio::task::{self, LocalSet};
use tracing_subscriber::EnvFilter;

const STOP: u32 = u32::MAX;

#[tokio::main(flavor = "current_thread")]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let local = LocalSet::new();
  local.run_until(run()).await;
}

async fn run() {
  let bus = Bus::new();
  let jobs = bus.open(2);
  let control = bus.open(1);

  let producers: Vec<_> = (0..3u32)
    .map(|p| {
      let bus = bus.clone();
      task::spawn_local(async move {
        for i in 0..4 {
          let job = p * 100 + i;
          bus.send(jobs, job).await?;
          println!("[producer {p}] queued job {job}");
        }
        Ok::<_, BusError>(())
      })
    })
    .collect();

  let worker = {
    let bus = bus.clone();
    task::spawn_local(async move {
      let mut done = 0;
      let mut stream = bus.messages(jobs);
      while let Some(job) = stream.next().await {
        if job == STOP {
          break;
        }
        println!("[worker] finished job {job}");
        done += 1;
      }
      done
    })
  };

  let monitor = {
    let bus = bus.clone();
    task::spawn_local(async move {
      let signal = bus.recv(control).await;
      println!("[monitor] control signal: {signal:?}");
    })
  };

  for producer in producers {
    producer.await.expect("producer task").expect("producer send");
  }

  // Every open channel, `jobs` included, gets the stop marker.
  bus.broadcast(STOP).await.expect("broadcast stop");
  let done = worker.await.expect("worker task");
  monitor.await.expect("monitor task");
  println!("[main] worker finished {done} jobs, {} channels open", bus.channel_count());

  bus.delete();
}
