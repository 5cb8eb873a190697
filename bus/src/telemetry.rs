// src/telemetry.rs

//! Optional event and counter collection for debugging wakeup ordering.
//!
//! With the `telemetry` feature, the bus records channel lifecycle events and
//! bumps counters for parks, forwarded wakeups, and closed-channel resumes
//! into one global collector. Without it, every function here is an inlined
//! no-op.

#[cfg(feature = "telemetry")]
pub mod enabled {
  use std::collections::HashMap;
  use std::fmt;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;
  use std::time::Instant;
  use tokio::task::Id as TokioTaskId;

  static NEXT_EVENT_SEQUENCE_ID: AtomicUsize = AtomicUsize::new(0);

  #[derive(Clone)]
  pub struct TelemetryEvent {
    pub seq_id: usize,
    pub timestamp: Instant,
    /// Set when the event happened inside a tokio task (e.g. a `LocalSet`).
    pub tokio_task_id: Option<TokioTaskId>,
    /// Channel handle the event concerns, if any.
    pub handle: Option<usize>,
    pub location: String,
    pub event_type: String,
    pub message: Option<String>,
  }

  impl fmt::Debug for TelemetryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("TelemetryEvent")
        .field("seq", &self.seq_id)
        .field("task", &self.tokio_task_id.map(|id| id.to_string()).as_deref().unwrap_or("N/A"))
        .field("handle", &self.handle)
        .field("loc", &self.location)
        .field("evt", &self.event_type)
        .field("msg", &self.message.as_deref().unwrap_or(""))
        .finish()
    }
  }

  type CounterKey = (String, String); // (location, counter_name)

  struct CollectorData {
    events: Vec<TelemetryEvent>,
    counters: HashMap<CounterKey, usize>,
    start_time: Instant,
  }

  impl CollectorData {
    fn new() -> Self {
      CollectorData {
        events: Vec::new(),
        counters: HashMap::new(),
        start_time: Instant::now(),
      }
    }
  }

  lazy_static::lazy_static! {
      static ref GLOBAL_COLLECTOR: Mutex<CollectorData> = Mutex::new(CollectorData::new());
  }

  pub fn log_event_fn(handle: Option<usize>, location: &str, event_type: &str, message: Option<String>) {
    let event = TelemetryEvent {
      seq_id: NEXT_EVENT_SEQUENCE_ID.fetch_add(1, Ordering::Relaxed),
      timestamp: Instant::now(),
      tokio_task_id: tokio::task::try_id(),
      handle,
      location: location.to_string(),
      event_type: event_type.to_string(),
      message,
    };
    match GLOBAL_COLLECTOR.lock() {
      Ok(mut collector) => collector.events.push(event),
      Err(_) => eprintln!("[TELEMETRY] collector mutex poisoned while recording event"),
    }
  }

  pub fn increment_counter_fn(location: &'static str, counter_name: &str) {
    let key = (location.to_string(), counter_name.to_string());
    match GLOBAL_COLLECTOR.lock() {
      Ok(mut collector) => *collector.counters.entry(key).or_insert(0) += 1,
      Err(_) => eprintln!("[TELEMETRY] collector mutex poisoned while incrementing counter"),
    }
  }

  /// Current value of one counter.
  pub fn counter_fn(location: &str, counter_name: &str) -> usize {
    GLOBAL_COLLECTOR
      .lock()
      .ok()
      .and_then(|c| {
        c.counters
          .get(&(location.to_string(), counter_name.to_string()))
          .copied()
      })
      .unwrap_or(0)
  }

  /// Recorded events in sequence order.
  pub fn events_fn() -> Vec<TelemetryEvent> {
    let mut events = GLOBAL_COLLECTOR
      .lock()
      .map(|c| c.events.clone())
      .unwrap_or_default();
    events.sort_by_key(|e| e.seq_id);
    events
  }

  pub fn print_telemetry_report_fn() {
    let Ok(collector) = GLOBAL_COLLECTOR.lock() else {
      eprintln!("[TELEMETRY] collector mutex poisoned, cannot print report");
      return;
    };
    println!("\n--- Corobus Telemetry Report ---");
    if collector.events.is_empty() {
      println!("[Events] none");
    } else {
      println!("[Events] {}", collector.events.len());
      let mut sorted = collector.events.clone();
      sorted.sort_by_key(|e| e.seq_id);
      for event in &sorted {
        let since = event.timestamp.duration_since(collector.start_time);
        println!(
          "  +{:<10.6}s [Seq:{:<5}] Task:{:<6} Handle:{:<6} Loc:{:<18} Evt:{:<20} {}",
          since.as_secs_f64(),
          event.seq_id,
          event.tokio_task_id.map_or_else(|| "---".to_string(), |id| id.to_string()),
          event.handle.map_or_else(|| "-".to_string(), |h| h.to_string()),
          event.location,
          event.event_type,
          event.message.as_deref().unwrap_or("")
        );
      }
    }
    if collector.counters.is_empty() {
      println!("[Counters] none");
    } else {
      let mut sorted: Vec<_> = collector.counters.iter().collect();
      sorted.sort_by_key(|(k, _)| *k);
      for ((loc, name), count) in sorted {
        println!("  Loc:{:<18} Counter:{:<20} Value: {}", loc, name, count);
      }
    }
    println!("--- End of Telemetry Report ---");
  }

  pub fn clear_telemetry_fn() {
    match GLOBAL_COLLECTOR.lock() {
      Ok(mut collector) => {
        collector.events.clear();
        collector.counters.clear();
        collector.start_time = Instant::now();
      }
      Err(_) => eprintln!("[TELEMETRY] collector mutex poisoned, cannot clear data"),
    }
    NEXT_EVENT_SEQUENCE_ID.store(0, Ordering::Relaxed);
  }
}

#[cfg(not(feature = "telemetry"))]
pub mod disabled {
  #[inline(always)]
  pub fn log_event_fn(
    _handle: Option<usize>,
    _location: &'static str,
    _event_type: &'static str,
    _message: Option<String>,
  ) {
  }
  #[inline(always)]
  pub fn increment_counter_fn(_location: &'static str, _counter_name: &'static str) {}
  #[inline(always)]
  pub fn counter_fn(_location: &str, _counter_name: &str) -> usize {
    0
  }
  #[inline(always)]
  pub fn print_telemetry_report_fn() {}
  #[inline(always)]
  pub fn clear_telemetry_fn() {}
}

#[cfg(feature = "telemetry")]
pub use enabled::{
  clear_telemetry_fn as clear_telemetry, counter_fn as counter, events_fn as events,
  increment_counter_fn as increment_counter, log_event_fn as log_event,
  print_telemetry_report_fn as print_telemetry_report, TelemetryEvent,
};

#[cfg(not(feature = "telemetry"))]
pub use disabled::{
  clear_telemetry_fn as clear_telemetry, counter_fn as counter,
  increment_counter_fn as increment_counter, log_event_fn as log_event,
  print_telemetry_report_fn as print_telemetry_report,
};
