//! The per-region transition function.
//!
//! [`advance`] decides one region's next state for one tick. It reads only the
//! region, the virtual time, the topology and the tuning, and takes its
//! randomness from an injected [`Draws`] source, so the same inputs always
//! produce the same [`Transition`]. The first matching rule for the region's
//! current state wins.

use crate::config::Tuning;
use crate::event::Event;
use crate::id::{GateIndex, RegionId};
use crate::region::{Health, IssueDetails, MAX_PROGRESS, Region, RegionUpdate};
use crate::rng::Draws;
use crate::sim::VirtualTime;
use crate::topology::Topology;

/// Ticket id used when a failed region carried no ticket of its own.
pub const RECOVERY_TICKET: &str = "INC-REC";
/// Ticket id attached to a missed drop window.
pub const SLA_TICKET: &str = "SLA-BREACH";

/// Outcome of one transition. Both fields `None` means nothing happened.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transition {
    /// Replacement for the region's mutable fields.
    pub update: Option<RegionUpdate>,
    /// Event to record in the log.
    pub event: Option<Event>,
}

impl Transition {
    /// The region stays exactly as it is.
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn is_noop(&self) -> bool {
        self.update.is_none() && self.event.is_none()
    }

    fn to(update: RegionUpdate, event: Event) -> Self {
        Self {
            update: Some(update),
            event: Some(event),
        }
    }
}

/// A region references state the topology cannot resolve.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("region {region:?} is on gate {gate:?}, which is not in the topology")]
    UnknownGate { region: RegionId, gate: GateIndex },
}

/// Compute the next state of `region` at virtual time `now`.
///
/// Draws are consumed in a fixed order per state. A `Scheduled` region whose
/// drop time has not arrived consumes none.
pub fn advance<D: Draws + ?Sized>(
    region: &Region,
    now: VirtualTime,
    topology: &Topology,
    tuning: &Tuning,
    draws: &mut D,
) -> Result<Transition, TransitionError> {
    let id = region.id;
    let gate = region.gate();
    if !topology.contains_gate(gate) {
        return Err(TransitionError::UnknownGate { region: id, gate });
    }

    let transition = match region.health() {
        Health::Passed => {
            if draws.unit() < tuning.restart_chance {
                let first = topology.first_gate();
                Transition::to(
                    RegionUpdate {
                        gate: first,
                        progress: 0,
                        health: Health::Processing,
                    },
                    Event::CycleRestarted {
                        region: id,
                        gate: first,
                    },
                )
            } else {
                Transition::unchanged()
            }
        }

        Health::Error(issue) => {
            if draws.unit() < tuning.error_recovery_chance {
                let ticket_id = if issue.ticket_id.is_empty() {
                    RECOVERY_TICKET.to_string()
                } else {
                    issue.ticket_id.clone()
                };
                Transition::to(
                    with_health(
                        region,
                        Health::AutoHealing(IssueDetails::new(
                            ticket_id,
                            "Automated recovery protocol initiated.",
                        )),
                    ),
                    Event::RecoveryStarted { region: id, gate },
                )
            } else {
                Transition::unchanged()
            }
        }

        Health::AutoHealing(_) => {
            if draws.unit() < tuning.healing_success_chance {
                Transition::to(
                    with_health(region, Health::Processing),
                    Event::HealingSucceeded { region: id, gate },
                )
            } else {
                Transition::unchanged()
            }
        }

        Health::Idle => {
            if draws.unit() < tuning.idle_start_chance {
                Transition::to(
                    with_health(region, Health::Processing),
                    Event::QueueEntered { region: id, gate },
                )
            } else {
                Transition::unchanged()
            }
        }

        Health::Scheduled { drop_time } => {
            if now < *drop_time {
                Transition::unchanged()
            } else if draws.unit() < tuning.sla_breach_chance {
                Transition::to(
                    with_health(
                        region,
                        Health::Late(IssueDetails::new(SLA_TICKET, "Automated Reminder Sent")),
                    ),
                    Event::SlaBreached { region: id, at: now },
                )
            } else {
                Transition::to(
                    with_health(region, Health::Processing),
                    Event::PayloadArrived {
                        region: id,
                        gate,
                        at: now,
                    },
                )
            }
        }

        Health::Late(_) => {
            if draws.unit() < tuning.late_arrival_chance {
                Transition::to(
                    with_health(region, Health::Processing),
                    Event::DelayedPayloadReceived { region: id, gate },
                )
            } else {
                Transition::unchanged()
            }
        }

        Health::Processing => process(region, topology, tuning, draws),
    };
    Ok(transition)
}

/// Same position and progress, new health.
fn with_health(region: &Region, health: Health) -> RegionUpdate {
    RegionUpdate {
        gate: region.gate(),
        progress: region.progress(),
        health,
    }
}

fn process<D: Draws + ?Sized>(
    region: &Region,
    topology: &Topology,
    tuning: &Tuning,
    draws: &mut D,
) -> Transition {
    let id = region.id;
    let gate = region.gate();

    let step = draws.int_inclusive(
        u32::from(tuning.progress_step_min),
        u32::from(tuning.progress_step_max),
    );
    let progress = u32::from(region.progress()) + step;

    // The issue roll is always drawn, even on the exempt gate.
    let issue_roll = draws.unit();
    if issue_roll < tuning.issue_chance && !is_exempt(gate, topology, tuning) {
        let gate_label = topology.gate(gate).map_or("", |g| g.id.as_str());
        return if draws.unit() < tuning.critical_issue_chance {
            let ticket_id = format!("INC{:06}", draws.int_inclusive(0, 999_999));
            Transition::to(
                with_health(
                    region,
                    Health::Error(IssueDetails::new(
                        ticket_id.clone(),
                        format!("Rule validation failure detected by issuehandleragent at {gate_label}"),
                    )),
                ),
                Event::ValidationFailed {
                    region: id,
                    gate,
                    ticket_id,
                },
            )
        } else {
            let ticket_id = format!("TASK{:04}", draws.int_inclusive(0, 9_999));
            Transition::to(
                with_health(
                    region,
                    Health::AutoHealing(IssueDetails::new(
                        ticket_id.clone(),
                        "Formatting mismatch intercepted.",
                    )),
                ),
                Event::AnomalyIntercepted {
                    region: id,
                    gate,
                    ticket_id,
                },
            )
        };
    }

    if progress < u32::from(MAX_PROGRESS) {
        return Transition {
            update: Some(RegionUpdate {
                gate,
                progress: progress as u8,
                health: Health::Processing,
            }),
            event: None,
        };
    }

    match topology.next_gate(gate) {
        Some(next) => Transition::to(
            RegionUpdate {
                gate: next,
                progress: 0,
                health: Health::Processing,
            },
            Event::GateCompleted {
                region: id,
                from: gate,
                to: next,
            },
        ),
        None => Transition::to(
            RegionUpdate {
                gate,
                progress: MAX_PROGRESS,
                health: Health::Passed,
            },
            Event::PipelineCompleted { region: id },
        ),
    }
}

fn is_exempt(gate: GateIndex, topology: &Topology, tuning: &Tuning) -> bool {
    match (&tuning.issue_exempt_gate, topology.gate(gate)) {
        (Some(exempt), Some(g)) => g.id == *exempt,
        _ => false,
    }
}
