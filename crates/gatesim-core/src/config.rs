//! Tuning constants and driver settings.
//!
//! Every probability the transition engine rolls against lives in [`Tuning`]
//! so a scenario can be retuned from a data file. All fields have defaults;
//! a partial config file only overrides what it names.

use crate::log::DEFAULT_LOG_CAPACITY;
use crate::topology::Topology;

// ---------------------------------------------------------------------------
// Tuning
// ---------------------------------------------------------------------------

/// Per-tick transition probabilities and progress step bounds.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// PASSED region starts a fresh cycle.
    pub restart_chance: f64,
    /// ERROR region begins automated recovery.
    pub error_recovery_chance: f64,
    /// AUTO_HEALING region resumes processing.
    pub healing_success_chance: f64,
    /// IDLE region enters the processing queue.
    pub idle_start_chance: f64,
    /// SCHEDULED region whose drop time has passed is tagged LATE instead of
    /// starting.
    pub sla_breach_chance: f64,
    /// LATE region finally receives its payload.
    pub late_arrival_chance: f64,
    /// PROCESSING region hits an issue this tick.
    pub issue_chance: f64,
    /// Given an issue, it is a hard ERROR rather than an AUTO_HEALING anomaly.
    pub critical_issue_chance: f64,
    /// Smallest progress step per processing tick.
    pub progress_step_min: u8,
    /// Largest progress step per processing tick.
    pub progress_step_max: u8,
    /// Gate on which processing never raises issues.
    pub issue_exempt_gate: Option<String>,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            restart_chance: 0.05,
            error_recovery_chance: 0.20,
            healing_success_chance: 0.40,
            idle_start_chance: 0.30,
            sla_breach_chance: 0.10,
            late_arrival_chance: 0.10,
            issue_chance: 0.05,
            critical_issue_chance: 0.40,
            progress_step_min: 5,
            progress_step_max: 25,
            issue_exempt_gate: Some("PRE".to_string()),
        }
    }
}

impl Tuning {
    fn probabilities(&self) -> [(&'static str, f64); 8] {
        [
            ("restart_chance", self.restart_chance),
            ("error_recovery_chance", self.error_recovery_chance),
            ("healing_success_chance", self.healing_success_chance),
            ("idle_start_chance", self.idle_start_chance),
            ("sla_breach_chance", self.sla_breach_chance),
            ("late_arrival_chance", self.late_arrival_chance),
            ("issue_chance", self.issue_chance),
            ("critical_issue_chance", self.critical_issue_chance),
        ]
    }

    /// Check every probability is in `[0, 1]` and the step bounds are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in self.probabilities() {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ProbabilityOutOfRange { field, value });
            }
        }
        let (min, max) = (self.progress_step_min, self.progress_step_max);
        if min == 0 || min > max || max > 100 {
            return Err(ConfigError::ProgressStepRange { min, max });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SimConfig
// ---------------------------------------------------------------------------

/// Driver settings.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub tuning: Tuning,
    /// Entries retained by the event log.
    pub log_capacity: usize,
    /// Wall-clock milliseconds per tick (one virtual hour).
    pub tick_period_ms: u64,
    /// Most ticks a single `advance` call may run. Elapsed time beyond this
    /// is dropped rather than caught up.
    pub max_ticks_per_advance: u32,
    /// Seed for reproducible runs. `None` seeds from the system clock.
    pub seed: Option<u64>,
    /// Start ticking as soon as the manifest loads.
    pub autostart: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tuning: Tuning::default(),
            log_capacity: DEFAULT_LOG_CAPACITY,
            tick_period_ms: 1000,
            max_ticks_per_advance: 24,
            seed: None,
            autostart: true,
        }
    }
}

impl SimConfig {
    /// Same defaults with a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tuning.validate()?;
        if self.log_capacity == 0 {
            return Err(ConfigError::ZeroLogCapacity);
        }
        if self.tick_period_ms == 0 {
            return Err(ConfigError::ZeroTickPeriod);
        }
        if self.max_ticks_per_advance == 0 {
            return Err(ConfigError::ZeroTickCap);
        }
        Ok(())
    }

    /// [`validate`](Self::validate), plus check that every gate the tuning
    /// names exists in `topology`.
    pub fn validate_for(&self, topology: &Topology) -> Result<(), ConfigError> {
        self.validate()?;
        if let Some(gate) = &self.tuning.issue_exempt_gate {
            if topology.gate_index(gate).is_none() {
                return Err(ConfigError::UnknownExemptGate(gate.clone()));
            }
        }
        Ok(())
    }
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be within [0, 1], got {value}")]
    ProbabilityOutOfRange { field: &'static str, value: f64 },
    #[error("progress step range {min}..={max} must satisfy 1 <= min <= max <= 100")]
    ProgressStepRange { min: u8, max: u8 },
    #[error("log capacity must be at least 1")]
    ZeroLogCapacity,
    #[error("tick period must be at least 1 ms")]
    ZeroTickPeriod,
    #[error("max ticks per advance must be at least 1")]
    ZeroTickCap,
    #[error("issue-exempt gate '{0}' is not in the topology")]
    UnknownExemptGate(String),
}
