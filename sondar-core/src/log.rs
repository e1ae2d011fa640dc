use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::Value;

pub const DEFAULT_LOG_CAPACITY: usize = 100;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct LogEvent {
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub component: String,
    pub action: String,
    pub details: Value,
}

/// Append-only bounded ring of structured events, one per session. Oldest
/// events drop silently on overflow. The only supported cross-component
/// observability channel.
#[derive(Clone, Debug)]
pub struct ActivityLog {
    capacity: usize,
    next_seq: u64,
    events: VecDeque<LogEvent>,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_seq: 0,
            events: VecDeque::new(),
        }
    }

    pub fn emit(&mut self, component: impl Into<String>, action: impl Into<String>, details: Value) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(LogEvent {
            seq: self.next_seq,
            at: Utc::now(),
            component: component.into(),
            action: action.into(),
            details,
        });
        self.next_seq += 1;
    }

    /// Last `limit` events, newest first.
    pub fn recent(&self, limit: usize) -> Vec<&LogEvent> {
        self.events.iter().rev().take(limit).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
