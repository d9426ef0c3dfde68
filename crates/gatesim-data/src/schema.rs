//! File schemas that do not already exist as core types.
//!
//! Manifest records and [`SimConfig`](gatesim_core::config::SimConfig) are
//! deserialized directly from core types. A custom topology is described by
//! the plain structs below and assembled through the core builder, which
//! performs all validation.

use gatesim_core::topology::{Topology, TopologyBuilder, TopologyError};

/// A whole pipeline definition.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TopologyData {
    pub phases: Vec<PhaseData>,
}

/// One phase and its gates, in pipeline order.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PhaseData {
    pub id: String,
    pub name: String,
    /// Defaults to the phase id.
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub gates: Vec<GateData>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GateData {
    pub id: String,
    pub name: String,
}

impl TopologyData {
    /// Register every phase and gate, then validate.
    pub fn build(&self) -> Result<Topology, TopologyError> {
        let mut builder = TopologyBuilder::new();
        for phase in &self.phases {
            let short = phase.short_name.as_deref().unwrap_or(&phase.id);
            let index = builder.register_phase(&phase.id, &phase.name, short);
            for gate in &phase.gates {
                builder.register_gate(index, &gate.id, &gate.name);
            }
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> TopologyData {
        TopologyData {
            phases: vec![
                PhaseData {
                    id: "INTAKE".into(),
                    name: "Intake".into(),
                    short_name: None,
                    gates: vec![GateData {
                        id: "IN1".into(),
                        name: "Receive".into(),
                    }],
                },
                PhaseData {
                    id: "CHECK".into(),
                    name: "Checks".into(),
                    short_name: Some("CHK".into()),
                    gates: vec![
                        GateData {
                            id: "C1".into(),
                            name: "Totals".into(),
                        },
                        GateData {
                            id: "C2".into(),
                            name: "Variance".into(),
                        },
                    ],
                },
            ],
        }
    }

    #[test]
    fn builds_in_canonical_order() {
        let t = data().build().unwrap();
        assert_eq!(t.gate_count(), 3);
        let ids: Vec<_> = t.gates().iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, ["IN1", "C1", "C2"]);
        assert_eq!(t.phases()[0].short_name, "INTAKE");
        assert_eq!(t.phases()[1].short_name, "CHK");
    }

    #[test]
    fn empty_phase_rejected() {
        let mut d = data();
        d.phases[0].gates.clear();
        assert_eq!(d.build().unwrap_err(), TopologyError::EmptyPhase("INTAKE".into()));
    }

    #[test]
    fn duplicate_gate_rejected() {
        let mut d = data();
        d.phases[1].gates[1].id = "IN1".into();
        assert_eq!(d.build().unwrap_err(), TopologyError::DuplicateGate("IN1".into()));
    }
}
