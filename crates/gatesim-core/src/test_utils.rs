//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::config::{SimConfig, Tuning};
use crate::engine::Simulation;
use crate::id::{GateIndex, RegionId};
use crate::region::{Health, IssueDetails, Region};
use crate::rng::ScriptedDraws;
use crate::store::RegionSeed;
use crate::topology::Topology;

// ===========================================================================
// Topology
// ===========================================================================

pub fn payroll() -> Topology {
    Topology::payroll_controls()
}

/// Canonical index of a built-in gate id. Panics on an unknown id.
pub fn gate(topology: &Topology, id: &str) -> GateIndex {
    match topology.gate_index(id) {
        Some(g) => g,
        None => panic!("no gate '{id}' in topology"),
    }
}

// ===========================================================================
// Regions
// ===========================================================================

pub fn region(health: Health) -> Region {
    Region::new(RegionId(0), "r-de", "DE", "Germany", health)
}

pub fn processing_at(gate: GateIndex, progress: u8) -> Region {
    region(Health::Processing).at(gate, progress)
}

pub fn incident(ticket: &str) -> IssueDetails {
    IssueDetails::new(ticket, "Rule validation failure")
}

/// Country codes used by [`seeds`], cycling when more are requested.
pub const COUNTRY_CODES: [&str; 12] = [
    "US", "GB", "DE", "FR", "JP", "BR", "IN", "AU", "CA", "MX", "SG", "ZA",
];

/// `n` scheduled regions with drop times spread over `0..spread` hours.
/// Keys are unique; country codes repeat after twelve regions.
pub fn seeds(n: usize, spread: i64) -> Vec<RegionSeed> {
    (0..n)
        .map(|i| {
            let code = COUNTRY_CODES[i % COUNTRY_CODES.len()];
            RegionSeed::scheduled(
                format!("region-{i}"),
                code,
                format!("Region {i}"),
                (i as i64) % spread.max(1),
            )
        })
        .collect()
}

// ===========================================================================
// Draws
// ===========================================================================

/// Unit draw that yields `value` as a progress step under default tuning.
pub fn step_draw(value: u32) -> f64 {
    let t = Tuning::default();
    ScriptedDraws::unit_for(
        u32::from(t.progress_step_min),
        u32::from(t.progress_step_max),
        value,
    )
}

// ===========================================================================
// Simulations
// ===========================================================================

/// A seeded, running simulation over the built-in topology with `n` regions.
pub fn running_sim(seed: u64, n: usize) -> Simulation {
    running_sim_with(SimConfig::seeded(seed), seeds(n, 6))
}

pub fn running_sim_with(config: SimConfig, seeds: Vec<RegionSeed>) -> Simulation {
    let mut sim = match Simulation::new(payroll(), config) {
        Ok(sim) => sim,
        Err(e) => panic!("invalid test config: {e}"),
    };
    if let Err(e) = sim.load_manifest(Ok::<_, String>(seeds)) {
        panic!("test manifest rejected: {e}");
    }
    sim.start();
    sim
}
