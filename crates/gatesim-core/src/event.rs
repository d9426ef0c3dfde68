//! Typed events produced by region transitions.
//!
//! The transition engine returns at most one [`Event`] per region per tick.
//! The driver renders it into a human-readable [`crate::log::LogEntry`] using
//! the region's country code and the topology's gate ids.

use crate::id::{GateIndex, RegionId};
use crate::log::LogKind;
use crate::sim::VirtualTime;
use crate::topology::Topology;

/// Something noteworthy that happened to one region during a tick.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Event {
    // -- Lifecycle --
    /// A passed region started a new cycle from the first gate.
    CycleRestarted { region: RegionId, gate: GateIndex },
    /// A scheduled region's input arrived on time.
    PayloadArrived {
        region: RegionId,
        gate: GateIndex,
        at: VirtualTime,
    },
    /// An idle region was picked up.
    QueueEntered { region: RegionId, gate: GateIndex },

    // -- Lateness --
    /// A scheduled region missed its drop window.
    SlaBreached { region: RegionId, at: VirtualTime },
    /// A late region's input finally arrived.
    DelayedPayloadReceived { region: RegionId, gate: GateIndex },

    // -- Issues --
    /// Processing halted on a validation failure.
    ValidationFailed {
        region: RegionId,
        gate: GateIndex,
        ticket_id: String,
    },
    /// Processing intercepted a minor anomaly for automatic resolution.
    AnomalyIntercepted {
        region: RegionId,
        gate: GateIndex,
        ticket_id: String,
    },
    /// A failed region began automated recovery.
    RecoveryStarted { region: RegionId, gate: GateIndex },
    /// Automated healing finished and processing resumed.
    HealingSucceeded { region: RegionId, gate: GateIndex },

    // -- Progress --
    /// A gate completed and the region moved to the next one.
    GateCompleted {
        region: RegionId,
        from: GateIndex,
        to: GateIndex,
    },
    /// The last gate completed.
    PipelineCompleted { region: RegionId },
}

impl Event {
    /// Log category for this event.
    pub fn kind(&self) -> LogKind {
        match self {
            Event::CycleRestarted { .. } => LogKind::System,
            Event::PayloadArrived { .. }
            | Event::QueueEntered { .. }
            | Event::DelayedPayloadReceived { .. } => LogKind::Processing,
            Event::SlaBreached { .. } => LogKind::Late,
            Event::ValidationFailed { .. } => LogKind::Error,
            Event::AnomalyIntercepted { .. } | Event::RecoveryStarted { .. } => {
                LogKind::AutoHealing
            }
            Event::HealingSucceeded { .. }
            | Event::GateCompleted { .. }
            | Event::PipelineCompleted { .. } => LogKind::Passed,
        }
    }

    /// The region this event concerns.
    pub fn region(&self) -> RegionId {
        match self {
            Event::CycleRestarted { region, .. }
            | Event::PayloadArrived { region, .. }
            | Event::QueueEntered { region, .. }
            | Event::SlaBreached { region, .. }
            | Event::DelayedPayloadReceived { region, .. }
            | Event::ValidationFailed { region, .. }
            | Event::AnomalyIntercepted { region, .. }
            | Event::RecoveryStarted { region, .. }
            | Event::HealingSucceeded { region, .. }
            | Event::GateCompleted { region, .. }
            | Event::PipelineCompleted { region } => *region,
        }
    }

    /// The gate a consumer should correlate this event with. A completed gate
    /// correlates with the gate the region moved on to.
    pub fn gate(&self) -> Option<GateIndex> {
        match self {
            Event::CycleRestarted { gate, .. }
            | Event::PayloadArrived { gate, .. }
            | Event::QueueEntered { gate, .. }
            | Event::DelayedPayloadReceived { gate, .. }
            | Event::ValidationFailed { gate, .. }
            | Event::AnomalyIntercepted { gate, .. }
            | Event::RecoveryStarted { gate, .. }
            | Event::HealingSucceeded { gate, .. } => Some(*gate),
            Event::GateCompleted { to, .. } => Some(*to),
            Event::SlaBreached { .. } | Event::PipelineCompleted { .. } => None,
        }
    }

    /// Human-readable message for the event log.
    pub fn message(&self, country_code: &str, topology: &Topology) -> String {
        let label = |gate: &GateIndex| {
            topology
                .gate(*gate)
                .map_or_else(|| format!("#{}", gate.0), |g| g.id.clone())
        };
        match self {
            Event::CycleRestarted { .. } => {
                format!("{country_code} cycle restarted. Data ingestion initiating.")
            }
            Event::PayloadArrived { at, .. } => format!(
                "[VT {at}] {country_code} scheduled payload arrived at virtual hour {at}. \
                 Entering main processing queue..."
            ),
            Event::QueueEntered { gate, .. } => format!(
                "{country_code} entering main processing queue for {}...",
                label(gate)
            ),
            Event::SlaBreached { at, .. } => format!(
                "[VT {at}] {country_code} missed SLA drop window. Tagging as LATE. \
                 Automated Reminder Sent."
            ),
            Event::DelayedPayloadReceived { gate, .. } => format!(
                "{country_code} delayed payload received. Initiating processing for {}...",
                label(gate)
            ),
            Event::ValidationFailed {
                gate, ticket_id, ..
            } => format!(
                "{country_code} {} validation failed. System halted! Generating ticket {ticket_id}",
                label(gate)
            ),
            Event::AnomalyIntercepted { gate, .. } => format!(
                "{country_code} {} detected minor anomaly. Intercepting for auto-resolution...",
                label(gate)
            ),
            Event::RecoveryStarted { gate, .. } => format!(
                "{country_code} {} attempting automated recovery from critical failure...",
                label(gate)
            ),
            Event::HealingSucceeded { gate, .. } => format!(
                "{country_code} auto-healing successful. Resuming {} evaluation.",
                label(gate)
            ),
            Event::GateCompleted { from, to, .. } => format!(
                "{country_code} completed {}. Progressing to {}.",
                label(from),
                label(to)
            ),
            Event::PipelineCompleted { .. } => format!(
                "{country_code} Pipeline Complete! Final payload dispatched successfully."
            ),
        }
    }
}
