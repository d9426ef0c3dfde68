//! Capacity-bounded, reverse-chronological event log.
//!
//! Entries live in a pre-allocated ring buffer. When full, the oldest entry is
//! overwritten. Iteration is newest first, matching how consumers display it.

use crate::id::LogId;
use crate::sim::VirtualTime;
use std::fmt;

/// Entries retained when no capacity is configured.
pub const DEFAULT_LOG_CAPACITY: usize = 50;

// ---------------------------------------------------------------------------
// Entry types
// ---------------------------------------------------------------------------

/// Category of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogKind {
    Info,
    System,
    Error,
    AutoHealing,
    Passed,
    Processing,
    Scheduled,
    Late,
}

impl LogKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LogKind::Info => "INFO",
            LogKind::System => "SYSTEM",
            LogKind::Error => "ERROR",
            LogKind::AutoHealing => "AUTO_HEALING",
            LogKind::Passed => "PASSED",
            LogKind::Processing => "PROCESSING",
            LogKind::Scheduled => "SCHEDULED",
            LogKind::Late => "LATE",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable log record.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: LogId,
    /// Virtual hour the entry was written at. `-1` before the clock is armed.
    pub timestamp: VirtualTime,
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub message: String,
    /// Country code of the region the entry concerns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_code: Option<String>,
    /// Gate id the entry correlates with.
    #[serde(rename = "gpcId", skip_serializing_if = "Option::is_none")]
    pub gate_id: Option<String>,
}

// ---------------------------------------------------------------------------
// EventLog -- pre-allocated ring buffer
// ---------------------------------------------------------------------------

/// Bounded log. Ids are assigned sequentially and never reused, even after
/// [`EventLog::clear`].
#[derive(Debug, Clone)]
pub struct EventLog {
    /// Pre-allocated storage.
    slots: Vec<Option<LogEntry>>,
    /// Next write position (wraps around).
    head: usize,
    /// Entries currently stored.
    len: usize,
    /// Entries ever written, including overwritten ones.
    total_written: u64,
    /// Entries overwritten because the log was full.
    dropped: u64,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl EventLog {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
            dropped: 0,
        }
    }

    /// Record an entry and return its id. Drops the oldest entry when full.
    pub fn append(
        &mut self,
        timestamp: VirtualTime,
        kind: LogKind,
        message: impl Into<String>,
        region_code: Option<String>,
        gate_id: Option<String>,
    ) -> LogId {
        let id = LogId(self.total_written);
        let capacity = self.capacity();
        if self.len == capacity {
            self.dropped += 1;
        } else {
            self.len += 1;
        }
        self.slots[self.head] = Some(LogEntry {
            id,
            timestamp,
            kind,
            message: message.into(),
            region_code,
            gate_id,
        });
        self.head = (self.head + 1) % capacity;
        self.total_written += 1;
        id
    }

    /// Record a SYSTEM entry not tied to any region.
    pub fn system(&mut self, timestamp: VirtualTime, message: impl Into<String>) -> LogId {
        self.append(timestamp, LogKind::System, message, None, None)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total entries written since creation (including dropped).
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Entries dropped because the log was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    /// The most recent entry.
    pub fn latest(&self) -> Option<&LogEntry> {
        self.iter().next()
    }

    /// Iterate newest first.
    pub fn iter(&self) -> EventLogIter<'_> {
        EventLogIter {
            log: self,
            index: self.head,
            remaining: self.len,
        }
    }

    /// Owned copy of the retained entries, newest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.iter().cloned().collect()
    }

    /// Remove every entry. Counters keep running.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

/// Iterator over an [`EventLog`], newest to oldest.
pub struct EventLogIter<'a> {
    log: &'a EventLog,
    index: usize,
    remaining: usize,
}

impl<'a> Iterator for EventLogIter<'a> {
    type Item = &'a LogEntry;

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 {
            let capacity = self.log.capacity();
            self.index = (self.index + capacity - 1) % capacity;
            self.remaining -= 1;
            if let Some(entry) = &self.log.slots[self.index] {
                return Some(entry);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a LogEntry;
    type IntoIter = EventLogIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
