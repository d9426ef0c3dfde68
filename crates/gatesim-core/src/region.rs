//! Region entities and their health state.
//!
//! A region's health is a tagged enum: the three issue-bearing states carry
//! their [`IssueDetails`] and `Scheduled` carries its drop time, so a region
//! cannot hold ticket data in a state that does not use it. The flat
//! [`RegionState`] discriminant is derived for counting and display.

use crate::id::{GateIndex, RegionId};
use crate::sim::VirtualTime;
use std::fmt;

/// Upper bound of a region's in-gate progress.
pub const MAX_PROGRESS: u8 = 100;

// ---------------------------------------------------------------------------
// Issue details
// ---------------------------------------------------------------------------

/// Ticket metadata attached to an issue-bearing state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueDetails {
    pub ticket_id: String,
    pub description: String,
}

impl IssueDetails {
    pub fn new(ticket_id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            description: description.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Flat discriminant of [`Health`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegionState {
    Scheduled,
    Late,
    Idle,
    Processing,
    AutoHealing,
    Error,
    Passed,
}

impl RegionState {
    /// Every state, in declaration order.
    pub const ALL: [RegionState; 7] = [
        RegionState::Scheduled,
        RegionState::Late,
        RegionState::Idle,
        RegionState::Processing,
        RegionState::AutoHealing,
        RegionState::Error,
        RegionState::Passed,
    ];

    /// Wire name, e.g. `AUTO_HEALING`.
    pub fn as_str(self) -> &'static str {
        match self {
            RegionState::Scheduled => "SCHEDULED",
            RegionState::Late => "LATE",
            RegionState::Idle => "IDLE",
            RegionState::Processing => "PROCESSING",
            RegionState::AutoHealing => "AUTO_HEALING",
            RegionState::Error => "ERROR",
            RegionState::Passed => "PASSED",
        }
    }

    /// Whether the state carries issue details.
    pub fn is_issue(self) -> bool {
        matches!(
            self,
            RegionState::Error | RegionState::AutoHealing | RegionState::Late
        )
    }

    /// Convert to usize index for array lookups.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for RegionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A region's health, with the payload each state needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Health {
    /// Waiting for its input drop at the given virtual hour.
    Scheduled { drop_time: VirtualTime },
    /// Missed its drop window.
    Late(IssueDetails),
    /// Waiting to be picked up.
    Idle,
    /// Working through the current gate.
    Processing,
    /// A minor anomaly is being resolved automatically.
    AutoHealing(IssueDetails),
    /// Halted on a validation failure.
    Error(IssueDetails),
    /// Cleared the whole pipeline.
    Passed,
}

impl Health {
    pub fn state(&self) -> RegionState {
        match self {
            Health::Scheduled { .. } => RegionState::Scheduled,
            Health::Late(_) => RegionState::Late,
            Health::Idle => RegionState::Idle,
            Health::Processing => RegionState::Processing,
            Health::AutoHealing(_) => RegionState::AutoHealing,
            Health::Error(_) => RegionState::Error,
            Health::Passed => RegionState::Passed,
        }
    }

    /// Issue details, present exactly for `Late`, `AutoHealing` and `Error`.
    pub fn issue(&self) -> Option<&IssueDetails> {
        match self {
            Health::Late(issue) | Health::AutoHealing(issue) | Health::Error(issue) => Some(issue),
            _ => None,
        }
    }

    /// Drop time, present only while `Scheduled`.
    pub fn schedule_drop_time(&self) -> Option<VirtualTime> {
        match self {
            Health::Scheduled { drop_time } => Some(*drop_time),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Region
// ---------------------------------------------------------------------------

/// The mutable fields of a region, replaced together by a transition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionUpdate {
    pub gate: GateIndex,
    pub progress: u8,
    pub health: Health,
}

/// One region walking the pipeline.
///
/// Identity fields are public and fixed. Position, progress and health are
/// only changed through a [`RegionUpdate`] applied by the store.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Region {
    pub id: RegionId,
    /// Identifier from the manifest.
    pub key: String,
    pub country_code: String,
    pub name: String,
    gate: GateIndex,
    progress: u8,
    health: Health,
}

impl Region {
    /// A region on the first gate with no progress.
    pub fn new(
        id: RegionId,
        key: impl Into<String>,
        country_code: impl Into<String>,
        name: impl Into<String>,
        health: Health,
    ) -> Self {
        Self {
            id,
            key: key.into(),
            country_code: country_code.into(),
            name: name.into(),
            gate: GateIndex(0),
            progress: 0,
            health,
        }
    }

    /// Place the region on `gate` with the given progress (clamped to 100).
    pub fn at(mut self, gate: GateIndex, progress: u8) -> Self {
        self.gate = gate;
        self.progress = progress.min(MAX_PROGRESS);
        self
    }

    pub fn gate(&self) -> GateIndex {
        self.gate
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn health(&self) -> &Health {
        &self.health
    }

    pub fn state(&self) -> RegionState {
        self.health.state()
    }

    pub fn issue(&self) -> Option<&IssueDetails> {
        self.health.issue()
    }

    /// Replace all mutable fields at once.
    pub(crate) fn apply(&mut self, update: RegionUpdate) {
        self.gate = update.gate;
        self.progress = update.progress.min(MAX_PROGRESS);
        self.health = update.health;
    }
}
