use serde::{Deserialize, Serialize};

/// Identifies a region in the store. Assigned in manifest order at load time
/// and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegionId(pub u32);

/// Position of a gate in canonical pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GateIndex(pub u16);

/// Position of a phase in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PhaseIndex(pub u16);

/// Identifies a log entry. Unique for the lifetime of an event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogId(pub u64);

impl RegionId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl GateIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl PhaseIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}
