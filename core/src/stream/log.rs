//! Bounded, newest-first event log

use std::collections::VecDeque;
use std::sync::Arc;

use super::event::StreamEvent;

pub const DEFAULT_LOG_CAPACITY: usize = 300;

/// Owned by the stream driver; observers only ever see [`EventLogSnapshot`]s.
#[derive(Debug)]
pub struct EventLog {
  entries: VecDeque<Arc<StreamEvent>>,
  capacity: usize,
}

impl EventLog {
  pub fn new(capacity: usize) -> Self {
    let capacity = capacity.max(1);
    Self {
      entries: VecDeque::with_capacity(capacity),
      capacity,
    }
  }

  /// Inserts at the head and returns the evicted tail, if any.
  pub fn push(&mut self, event: StreamEvent) -> Option<Arc<StreamEvent>> {
    self.entries.push_front(Arc::new(event));
    if self.entries.len() > self.capacity {
      self.entries.pop_back()
    } else {
      None
    }
  }

  pub fn clear(&mut self) {
    self.entries.clear();
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn snapshot(&self) -> EventLogSnapshot {
    EventLogSnapshot {
      entries: self.entries.iter().cloned().collect(),
    }
  }
}

/// Immutable view of the log at one point in time, newest first.
///
/// Cheap to clone; iterate it as many times as needed.
#[derive(Debug, Clone)]
pub struct EventLogSnapshot {
  entries: Arc<[Arc<StreamEvent>]>,
}

impl Default for EventLogSnapshot {
  fn default() -> Self {
    Self {
      entries: Arc::new([]),
    }
  }
}

impl EventLogSnapshot {
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Most recent event.
  pub fn head(&self) -> Option<&StreamEvent> {
    self.entries.first().map(Arc::as_ref)
  }

  pub fn get(&self, index: usize) -> Option<&StreamEvent> {
    self.entries.get(index).map(Arc::as_ref)
  }

  pub fn iter(&self) -> impl DoubleEndedIterator<Item = &StreamEvent> + ExactSizeIterator + Clone {
    self.entries.iter().map(Arc::as_ref)
  }
}
