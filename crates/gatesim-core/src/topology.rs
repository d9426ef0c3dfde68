//! Immutable pipeline topology: phases, gates and their canonical order.
//!
//! Gates are flattened in phase order, then definition order, into a single
//! canonical sequence. Every "past / active / future" comparison and every
//! "next gate" lookup works on indices into that sequence. Id-to-index maps
//! are built once, so lookups never scan.

use crate::id::{GateIndex, PhaseIndex};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// An atomic control step.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Gate {
    pub id: String,
    pub name: String,
    pub phase_id: String,
}

/// A named group of consecutive gates.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Phase {
    pub id: String,
    pub name: String,
    /// Compact label for dense views.
    pub short_name: String,
    pub gates: Vec<Gate>,
}

/// Where a gate or phase sits relative to a region's current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum RelativePosition {
    Past,
    Active,
    Future,
}

impl RelativePosition {
    /// Compare a canonical index against the current one.
    pub fn between<T: Ord>(index: T, current: T) -> Self {
        match index.cmp(&current) {
            Ordering::Less => RelativePosition::Past,
            Ordering::Equal => RelativePosition::Active,
            Ordering::Greater => RelativePosition::Future,
        }
    }
}

/// Errors raised while assembling a topology.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    #[error("pipeline has no phases")]
    Empty,
    #[error("phase '{0}' has no gates")]
    EmptyPhase(String),
    #[error("duplicate phase id '{0}'")]
    DuplicatePhase(String),
    #[error("duplicate gate id '{0}'")]
    DuplicateGate(String),
    #[error("gate '{gate}' registered against unknown phase index {phase}")]
    UnknownPhase { gate: String, phase: u16 },
    #[error("pipeline defines {0} gates, more than a gate index can address")]
    TooManyGates(usize),
}

// ---------------------------------------------------------------------------
// Topology
// ---------------------------------------------------------------------------

/// The frozen pipeline definition.
#[derive(Debug, Clone)]
pub struct Topology {
    phases: Vec<Phase>,
    /// Canonical flattened gate sequence.
    gates: Vec<Gate>,
    /// Owning phase of each gate, parallel to `gates`.
    gate_phase: Vec<PhaseIndex>,
    /// Canonical index of each phase's first gate.
    phase_start: Vec<GateIndex>,
    gate_lookup: HashMap<String, GateIndex>,
    phase_lookup: HashMap<String, PhaseIndex>,
}

impl Topology {
    /// Index already-validated phases. Callers must guarantee at least one
    /// non-empty phase, unique ids and fewer than `u16::MAX` gates.
    fn assemble(phases: Vec<Phase>) -> Self {
        let mut gates = Vec::new();
        let mut gate_phase = Vec::new();
        let mut phase_start = Vec::with_capacity(phases.len());
        let mut gate_lookup = HashMap::new();
        let mut phase_lookup = HashMap::new();

        for (p, phase) in phases.iter().enumerate() {
            let phase_idx = PhaseIndex(p as u16);
            phase_lookup.insert(phase.id.clone(), phase_idx);
            phase_start.push(GateIndex(gates.len() as u16));
            for gate in &phase.gates {
                gate_lookup.insert(gate.id.clone(), GateIndex(gates.len() as u16));
                gates.push(gate.clone());
                gate_phase.push(phase_idx);
            }
        }

        Self {
            phases,
            gates,
            gate_phase,
            phase_start,
            gate_lookup,
            phase_lookup,
        }
    }

    /// The built-in payroll controls pipeline: a precondition phase with a
    /// single ETL gate followed by 21 numbered controls across three phases.
    pub fn payroll_controls() -> Self {
        const PHASES: [(&str, &str, &str, &[(&str, &str)]); 4] = [
            (
                "PHASE0",
                "Precondition Data Transformation",
                "Precondition",
                &[("PRE", "Airflow/Python ETL")],
            ),
            (
                "PHASE1",
                "Pre-payroll Processing Controls",
                "Pre-payroll",
                &[
                    ("GPC1", "Schema Match"),
                    ("GPC2", "Character Encoding"),
                    ("GPC3", "Date Formats"),
                ],
            ),
            (
                "PHASE2",
                "Payroll Processing Controls",
                "Payroll",
                &[
                    ("GPC4", "Required Fields"),
                    ("GPC5", "Currency Validation"),
                    ("GPC6", "Gross-to-Net Variance"),
                    ("GPC7", "Social Charge Thresholds"),
                    ("GPC8", "Tax Bracket Alignment"),
                    ("GPC9", "Aggregation Check"),
                    ("GPC10", "Pension Contributions"),
                    ("GPC11", "Benefit Deductions"),
                ],
            ),
            (
                "PHASE3",
                "Post-payroll Processing Controls",
                "Post-payroll",
                &[
                    ("GPC12", "Bonus Caps"),
                    ("GPC13", "Employee ID Matching"),
                    ("GPC14", "New Joiner Validation"),
                    ("GPC15", "Leaver Reconciliation"),
                    ("GPC16", "Bank Account Format"),
                    ("GPC17", "Duplicate Payment Check"),
                    ("GPC18", "Cost Center Mapping"),
                    ("GPC19", "Historical Trend Check"),
                    ("GPC20", "Multi-Country Dedupe"),
                    ("GPC21", "Final Sign-off"),
                ],
            ),
        ];

        let phases = PHASES
            .iter()
            .map(|(id, name, short_name, gates)| Phase {
                id: id.to_string(),
                name: name.to_string(),
                short_name: short_name.to_string(),
                gates: gates
                    .iter()
                    .map(|(gate_id, gate_name)| Gate {
                        id: gate_id.to_string(),
                        name: gate_name.to_string(),
                        phase_id: id.to_string(),
                    })
                    .collect(),
            })
            .collect();

        Self::assemble(phases)
    }

    // -----------------------------------------------------------------------
    // Ordered views
    // -----------------------------------------------------------------------

    /// Phases in pipeline order.
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// All gates in canonical order.
    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    /// Gates of one phase, in order.
    pub fn gates_in(&self, phase: PhaseIndex) -> &[Gate] {
        self.phases
            .get(phase.index())
            .map(|p| p.gates.as_slice())
            .unwrap_or(&[])
    }

    pub fn gate_count(&self) -> usize {
        self.gates.len()
    }

    pub fn phase_count(&self) -> usize {
        self.phases.len()
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    pub fn gate(&self, index: GateIndex) -> Option<&Gate> {
        self.gates.get(index.index())
    }

    pub fn phase(&self, index: PhaseIndex) -> Option<&Phase> {
        self.phases.get(index.index())
    }

    /// Canonical index of a gate id.
    pub fn gate_index(&self, id: &str) -> Option<GateIndex> {
        self.gate_lookup.get(id).copied()
    }

    /// Index of a phase id.
    pub fn phase_index(&self, id: &str) -> Option<PhaseIndex> {
        self.phase_lookup.get(id).copied()
    }

    /// The phase a gate belongs to.
    pub fn phase_of(&self, gate: GateIndex) -> Option<PhaseIndex> {
        self.gate_phase.get(gate.index()).copied()
    }

    /// Canonical index of a phase's first gate.
    pub fn first_gate_of(&self, phase: PhaseIndex) -> Option<GateIndex> {
        self.phase_start.get(phase.index()).copied()
    }

    pub fn contains_gate(&self, gate: GateIndex) -> bool {
        gate.index() < self.gates.len()
    }

    /// The first gate of the pipeline. Every region starts here.
    pub fn first_gate(&self) -> GateIndex {
        GateIndex(0)
    }

    /// The last gate of the pipeline.
    pub fn last_gate(&self) -> GateIndex {
        GateIndex(self.gates.len().saturating_sub(1) as u16)
    }

    /// The gate after `gate` in canonical order, or `None` when `gate` is the
    /// last one (the pipeline is complete) or unknown.
    pub fn next_gate(&self, gate: GateIndex) -> Option<GateIndex> {
        let next = gate.index() + 1;
        (next < self.gates.len()).then(|| GateIndex(next as u16))
    }

    // -----------------------------------------------------------------------
    // Relative position
    // -----------------------------------------------------------------------

    /// Position of `gate` relative to a region sitting on `current`.
    pub fn gate_position(&self, gate: GateIndex, current: GateIndex) -> Option<RelativePosition> {
        if !self.contains_gate(gate) || !self.contains_gate(current) {
            return None;
        }
        Some(RelativePosition::between(gate, current))
    }

    /// Position of `phase` relative to the phase of a region sitting on
    /// `current`.
    pub fn phase_position(
        &self,
        phase: PhaseIndex,
        current: GateIndex,
    ) -> Option<RelativePosition> {
        let current_phase = self.phase_of(current)?;
        self.phase(phase)?;
        Some(RelativePosition::between(phase, current_phase))
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for a custom [`Topology`].
/// Two-phase lifecycle: registration -> validated build.
#[derive(Debug, Default)]
pub struct TopologyBuilder {
    phases: Vec<Phase>,
    stray_gates: Vec<(String, u16)>,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a phase at the end of the pipeline. Returns its index.
    pub fn register_phase(&mut self, id: &str, name: &str, short_name: &str) -> PhaseIndex {
        let index = PhaseIndex(self.phases.len() as u16);
        self.phases.push(Phase {
            id: id.to_string(),
            name: name.to_string(),
            short_name: short_name.to_string(),
            gates: Vec::new(),
        });
        index
    }

    /// Append a gate to a registered phase.
    pub fn register_gate(&mut self, phase: PhaseIndex, id: &str, name: &str) {
        match self.phases.get_mut(phase.index()) {
            Some(p) => p.gates.push(Gate {
                id: id.to_string(),
                name: name.to_string(),
                phase_id: p.id.clone(),
            }),
            None => self.stray_gates.push((id.to_string(), phase.0)),
        }
    }

    /// Validate and freeze the topology.
    pub fn build(self) -> Result<Topology, TopologyError> {
        if let Some((gate, phase)) = self.stray_gates.into_iter().next() {
            return Err(TopologyError::UnknownPhase { gate, phase });
        }
        if self.phases.is_empty() {
            return Err(TopologyError::Empty);
        }

        let mut phase_ids = HashSet::new();
        let mut gate_ids = HashSet::new();
        let mut total = 0usize;
        for phase in &self.phases {
            if !phase_ids.insert(phase.id.as_str()) {
                return Err(TopologyError::DuplicatePhase(phase.id.clone()));
            }
            if phase.gates.is_empty() {
                return Err(TopologyError::EmptyPhase(phase.id.clone()));
            }
            for gate in &phase.gates {
                if !gate_ids.insert(gate.id.as_str()) {
                    return Err(TopologyError::DuplicateGate(gate.id.clone()));
                }
            }
            total += phase.gates.len();
        }
        if total >= u16::MAX as usize {
            return Err(TopologyError::TooManyGates(total));
        }

        Ok(Topology::assemble(self.phases))
    }
}
