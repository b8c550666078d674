//! Inspectors for Bloc containers.
//!
//! - [`LogInspector`] writes every container event to the `log` facade.
//! - [`Timeline`] records events in memory together with the latest state of
//!   every container, for tests and in-app debug panels.
//!
//! Both are plugged into a container through its options:
//!
//! ```ignore
//! let timeline = Arc::new(Timeline::new(256));
//! let counter = Bloc::builder(Counter::default())
//!     .name("Counter")
//!     .inspector(timeline.clone())
//!     .build();
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;
use web_time::Instant;

use bloc_core::{Action, Inspector, InspectorEvent};

/// Logs each event as `"<label>: <state>"`.
pub struct LogInspector {
    level: log::Level,
}

impl Default for LogInspector {
    fn default() -> Self {
        Self::new(log::Level::Debug)
    }
}

impl LogInspector {
    pub fn new(level: log::Level) -> Self {
        Self { level }
    }
}

impl Inspector for LogInspector {
    fn record(&self, event: &InspectorEvent<'_>) {
        log::log!(target: "bloc::inspector", self.level, "{}: {:?}", event.label(), event.state);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    /// Time since the timeline was created.
    pub at: Duration,
    pub container: String,
    pub action: Action,
    pub label: String,
    pub state: String,
}

struct Record {
    entries: VecDeque<Entry>,
    latest: BTreeMap<String, String>,
    dropped: u64,
}

/// Bounded, thread-safe history of container events.
///
/// Besides the event list it keeps the last reported state of every
/// container by name, like a devtools store view. Disposed containers keep
/// their last entry there.
pub struct Timeline {
    capacity: usize,
    origin: Instant,
    record: Mutex<Record>,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl Timeline {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            origin: Instant::now(),
            record: Mutex::new(Record {
                entries: VecDeque::new(),
                latest: BTreeMap::new(),
                dropped: 0,
            }),
        }
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.record.lock().entries.iter().cloned().collect()
    }

    pub fn labels(&self) -> Vec<String> {
        self.record
            .lock()
            .entries
            .iter()
            .map(|e| e.label.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.record.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries evicted because the timeline was full.
    pub fn dropped(&self) -> u64 {
        self.record.lock().dropped
    }

    /// Last reported state of the container named `container`, `Debug`-formatted.
    pub fn latest(&self, container: &str) -> Option<String> {
        self.record.lock().latest.get(container).cloned()
    }

    /// Latest state of every container, sorted by name.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.record
            .lock()
            .latest
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn clear(&self) {
        let mut record = self.record.lock();
        record.entries.clear();
        record.latest.clear();
        record.dropped = 0;
    }

    /// One line per entry, e.g. `"  12.0ms  Counter - Update  Counter { count: 1 }"`.
    pub fn summary(&self) -> String {
        let record = self.record.lock();
        let mut out = String::new();
        for e in &record.entries {
            out.push_str(&format!(
                "{:>8.1}ms  {}  {}\n",
                e.at.as_secs_f64() * 1000.0,
                e.label,
                e.state
            ));
        }
        if record.dropped > 0 {
            out.push_str(&format!("({} earlier entries dropped)\n", record.dropped));
        }
        out
    }
}

impl Inspector for Timeline {
    fn record(&self, event: &InspectorEvent<'_>) {
        let container = event.container.name().to_string();
        let state = format!("{:?}", event.state);
        let entry = Entry {
            at: self.origin.elapsed(),
            container: container.clone(),
            action: event.action.clone(),
            label: event.label(),
            state: state.clone(),
        };

        let mut record = self.record.lock();
        record.latest.insert(container, state);
        if record.entries.len() == self.capacity {
            record.entries.pop_front();
            record.dropped += 1;
        }
        record.entries.push_back(entry);
    }
}
