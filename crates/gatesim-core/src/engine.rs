//! The simulation driver.
//!
//! [`Simulation`] owns the topology, the region store, the event log and the
//! clock. It stays [`DriverPhase::Uninitialized`] until a manifest loads, then
//! ticks whenever it is [`DriverPhase::Running`]:
//!
//! 1. **Clock** -- virtual time += 1.
//! 2. **Evaluate** -- every region is passed through [`transition::advance`]
//!    with its own random stream derived from (seed, tick, region id). With
//!    the `parallel` feature this fans out across rayon's pool.
//! 3. **Apply** -- updates are written back in region order.
//! 4. **Record** -- events are rendered and appended to the log.
//!
//! Two ways to drive it: [`Simulation::step`] runs exactly one tick, and
//! [`Simulation::advance`] accumulates elapsed wall-clock milliseconds and runs
//! one tick per configured period, at most `max_ticks_per_advance` per call.

use crate::config::{ConfigError, SimConfig};
use crate::event::Event;
use crate::id::{GateIndex, RegionId};
use crate::log::{EventLog, LogEntry};
use crate::query::RegionSnapshot;
use crate::region::Region;
use crate::rng::SimRng;
use crate::sim::{AdvanceResult, DriverPhase, SimState, StateHash, TickReport, VirtualTime};
use crate::store::{RegionSeed, RegionStore, StoreError};
use crate::topology::Topology;
use crate::transition::{self, Transition, TransitionError};
use std::fmt;
use tracing::{debug, error, info, warn};

/// First entry in every log.
pub const INIT_MESSAGE: &str =
    "Initializing 21-Gate Global Payroll Controls Virtual Simulation Engine...";
/// Entry written when the manifest loads.
pub const LOADED_MESSAGE: &str = "Loaded external schedule manifest. Virtual Clock engaged.";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// The manifest could not be installed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoadError {
    #[error("manifest already loaded")]
    AlreadyArmed,
    #[error("manifest unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A focus request named something that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FocusError {
    #[error("no region with country code '{0}'")]
    UnknownRegion(String),
    #[error("no gate with id '{0}'")]
    UnknownGate(String),
}

/// The region and gate a consumer has selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Focus {
    pub region: RegionId,
    pub gate: GateIndex,
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// The top-level simulation driver.
#[derive(Debug)]
pub struct Simulation {
    topology: Topology,
    config: SimConfig,
    store: RegionStore,
    log: EventLog,

    /// Clock and lifecycle.
    sim_state: SimState,

    /// Root seed every per-region stream is derived from.
    seed: u64,

    /// Whether the consumer wants ticks. Before arming this only records
    /// intent; arming starts the run if it is set.
    run_requested: bool,

    focus: Option<Focus>,
}

impl Simulation {
    /// Create an unarmed driver. The log starts with a single SYSTEM entry.
    ///
    /// Fails if the config is invalid or names a gate `topology` lacks.
    pub fn new(topology: Topology, config: SimConfig) -> Result<Self, ConfigError> {
        config.validate_for(&topology)?;
        let seed = config.seed.unwrap_or_else(clock_seed);
        let mut log = EventLog::new(config.log_capacity);
        let sim_state = SimState::new();
        log.system(sim_state.virtual_time, INIT_MESSAGE);
        info!(
            seed,
            gates = topology.gate_count(),
            phases = topology.phase_count(),
            "simulation created"
        );
        Ok(Self {
            run_requested: config.autostart,
            topology,
            config,
            store: RegionStore::new(),
            log,
            sim_state,
            seed,
            focus: None,
        })
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Install the outcome of a manifest fetch.
    ///
    /// On success the regions are loaded, the clock is set to 0 and, if a run
    /// has been requested, ticking starts. On failure the error is reported
    /// and the driver stays unarmed with the clock at -1.
    pub fn load_manifest<E: fmt::Display>(
        &mut self,
        manifest: Result<Vec<RegionSeed>, E>,
    ) -> Result<usize, LoadError> {
        if self.sim_state.is_armed() {
            return Err(LoadError::AlreadyArmed);
        }
        let seeds = manifest.map_err(|e| {
            error!(error = %e, "failed to load schedule manifest");
            LoadError::Unavailable(e.to_string())
        })?;
        let count = self.store.load(seeds, &self.topology).map_err(|e| {
            error!(error = %e, "schedule manifest rejected");
            LoadError::from(e)
        })?;

        self.sim_state.arm();
        self.log.system(self.sim_state.virtual_time, LOADED_MESSAGE);
        if self.run_requested {
            self.sim_state.phase = DriverPhase::Running;
        }
        info!(regions = count, phase = ?self.sim_state.phase, "manifest loaded, clock engaged");
        Ok(count)
    }

    /// Parse and install a JSON manifest.
    #[cfg(feature = "data-loader")]
    pub fn load_manifest_json(&mut self, json: &str) -> Result<usize, LoadError> {
        self.load_manifest(crate::manifest::parse_manifest_json(json))
    }

    // -----------------------------------------------------------------------
    // Run control
    // -----------------------------------------------------------------------

    /// Request or cancel ticking. Before a manifest loads this only records
    /// the request.
    pub fn set_running(&mut self, run: bool) {
        self.run_requested = run;
        let next = match (self.sim_state.phase, run) {
            (DriverPhase::Armed | DriverPhase::Paused, true) => DriverPhase::Running,
            (DriverPhase::Running, false) => DriverPhase::Paused,
            (phase, _) => phase,
        };
        if next != self.sim_state.phase {
            info!(from = ?self.sim_state.phase, to = ?next, "run state changed");
            self.sim_state.phase = next;
            self.sim_state.accumulator_ms = 0;
        }
    }

    pub fn start(&mut self) {
        self.set_running(true);
    }

    pub fn pause(&mut self) {
        self.set_running(false);
    }

    /// Whether ticks are currently being produced.
    pub fn is_running(&self) -> bool {
        self.sim_state.phase == DriverPhase::Running
    }

    /// Whether the consumer has asked for ticks, armed or not.
    pub fn run_requested(&self) -> bool {
        self.run_requested
    }

    pub fn phase(&self) -> DriverPhase {
        self.sim_state.phase
    }

    /// Clock and lifecycle, read-only.
    pub fn sim_state(&self) -> &SimState {
        &self.sim_state
    }

    // -----------------------------------------------------------------------
    // Ticking
    // -----------------------------------------------------------------------

    /// Run exactly one tick. Returns `None` unless running.
    pub fn step(&mut self) -> Option<TickReport> {
        self.is_running().then(|| self.tick())
    }

    /// Feed elapsed wall-clock time and run every whole tick it covers.
    /// Leftover time carries over to the next call.
    ///
    /// At most `max_ticks_per_advance` ticks run per call. Whole periods past
    /// that cap are dropped and counted in [`AdvanceResult::ticks_dropped`];
    /// only the sub-period remainder carries over.
    pub fn advance(&mut self, elapsed_ms: u64) -> AdvanceResult {
        let mut result = AdvanceResult::default();
        if !self.is_running() {
            return result;
        }
        let period = self.config.tick_period_ms.max(1);
        let cap = u64::from(self.config.max_ticks_per_advance.max(1));
        self.sim_state.accumulator_ms = self.sim_state.accumulator_ms.saturating_add(elapsed_ms);
        while self.sim_state.accumulator_ms >= period {
            if result.ticks_run == cap {
                result.ticks_dropped = self.sim_state.accumulator_ms / period;
                self.sim_state.accumulator_ms %= period;
                warn!(
                    ran = result.ticks_run,
                    dropped = result.ticks_dropped,
                    "advance fell behind, dropping backlog"
                );
                break;
            }
            self.sim_state.accumulator_ms -= period;
            result.reports.push(self.tick());
            result.ticks_run += 1;
        }
        result
    }

    fn tick(&mut self) -> TickReport {
        let now = self.sim_state.advance_clock();
        let outcomes = self.evaluate(now);

        let mut report = TickReport {
            virtual_time: now,
            ..TickReport::default()
        };
        for (id, outcome) in outcomes {
            match outcome {
                Ok(Transition { update, event }) => {
                    if let Some(update) = update {
                        match self.store.apply(id, update, &self.topology) {
                            Ok(()) => report.changed += 1,
                            Err(e) => error!(region = id.0, error = %e, "update rejected"),
                        }
                    }
                    if let Some(event) = event {
                        self.record(now, &event);
                        report.events += 1;
                    }
                }
                Err(e) => {
                    error!(region = id.0, error = %e, "region transition failed");
                    report.failed.push((id, e));
                }
            }
        }

        debug!(
            virtual_time = now,
            changed = report.changed,
            events = report.events,
            failed = report.failed.len(),
            "tick"
        );
        report
    }

    fn evaluate(&self, now: VirtualTime) -> Vec<(RegionId, Result<Transition, TransitionError>)> {
        let seed = self.seed;
        let topology = &self.topology;
        let tuning = &self.config.tuning;
        let eval = |region: &Region| {
            let mut rng = SimRng::stream(seed, now as u64, u64::from(region.id.0));
            (
                region.id,
                transition::advance(region, now, topology, tuning, &mut rng),
            )
        };

        #[cfg(feature = "parallel")]
        let outcomes: Vec<_> = {
            use rayon::prelude::*;
            self.store.as_slice().par_iter().map(eval).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let outcomes: Vec<_> = self.store.iter().map(eval).collect();

        outcomes
    }

    fn record(&mut self, now: VirtualTime, event: &Event) {
        let country_code = self
            .store
            .get(event.region())
            .map(|r| r.country_code.clone())
            .unwrap_or_default();
        let message = event.message(&country_code, &self.topology);
        let gate_id = event
            .gate()
            .and_then(|g| self.topology.gate(g))
            .map(|g| g.id.clone());
        self.log
            .append(now, event.kind(), message, Some(country_code), gate_id);
    }

    // -----------------------------------------------------------------------
    // Focus
    // -----------------------------------------------------------------------

    /// Select a region and gate for display. Has no effect on the simulation.
    pub fn focus(&mut self, region_code: &str, gate_id: &str) -> Result<Focus, FocusError> {
        let region = self
            .store
            .get_by_country(region_code)
            .ok_or_else(|| FocusError::UnknownRegion(region_code.to_string()))?
            .id;
        let gate = self
            .topology
            .gate_index(gate_id)
            .ok_or_else(|| FocusError::UnknownGate(gate_id.to_string()))?;
        let focus = Focus { region, gate };
        self.focus = Some(focus);
        Ok(focus)
    }

    pub fn clear_focus(&mut self) {
        self.focus = None;
    }

    pub fn current_focus(&self) -> Option<Focus> {
        self.focus
    }

    // -----------------------------------------------------------------------
    // Region control
    // -----------------------------------------------------------------------

    /// Send a region back to the first gate.
    pub fn reset_region(&mut self, id: RegionId) -> Result<(), StoreError> {
        self.store.reset(id, &self.topology)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Current virtual hour, or -1 before the manifest loads.
    pub fn virtual_time(&self) -> VirtualTime {
        self.sim_state.virtual_time
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn regions(&self) -> &[Region] {
        self.store.as_slice()
    }

    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.store.get(id)
    }

    pub fn region_by_code(&self, country_code: &str) -> Option<&Region> {
        self.store.get_by_country(country_code)
    }

    /// Owned views of every region, in load order.
    pub fn snapshot(&self) -> Vec<RegionSnapshot> {
        self.store
            .iter()
            .map(|r| RegionSnapshot::capture(r, &self.topology))
            .collect()
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Retained log entries, newest first.
    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.log.entries()
    }

    /// Hash of the clock and every region's mutable state.
    pub fn state_hash(&self) -> u64 {
        let mut hash = StateHash::new();
        hash.write_i64(self.sim_state.virtual_time);
        hash.write_u64(self.store.len() as u64);
        for region in self.store.iter() {
            hash.write_u64(u64::from(region.id.0));
            hash.write_u64(u64::from(region.gate().0));
            hash.write_u64(u64::from(region.progress()));
            hash.write_u64(region.state().index() as u64);
            if let Some(issue) = region.issue() {
                hash.write_str(&issue.ticket_id);
            }
            if let Some(drop_time) = region.health().schedule_drop_time() {
                hash.write_i64(drop_time);
            }
        }
        hash.finish()
    }
}

fn clock_seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::LogKind;
    use crate::region::{Health, RegionState};
    use crate::sim::UNARMED;

    fn seeds() -> Vec<RegionSeed> {
        vec![
            RegionSeed::scheduled("r-de", "DE", "Germany", 0),
            RegionSeed::scheduled("r-fr", "FR", "France", 2),
            RegionSeed::scheduled("r-jp", "JP", "Japan", 5),
        ]
    }

    fn sim(config: SimConfig) -> Simulation {
        Simulation::new(Topology::payroll_controls(), config).unwrap()
    }

    #[test]
    fn starts_unarmed_with_init_entry() {
        let s = sim(SimConfig::seeded(1));
        assert_eq!(s.virtual_time(), UNARMED);
        assert_eq!(s.phase(), DriverPhase::Uninitialized);
        assert_eq!(s.log().len(), 1);
        assert_eq!(s.log().latest().unwrap().message, INIT_MESSAGE);
        assert_eq!(s.log().latest().unwrap().kind, LogKind::System);
    }

    #[test]
    fn rejects_invalid_config() {
        let config = SimConfig {
            log_capacity: 0,
            ..SimConfig::default()
        };
        assert_eq!(
            Simulation::new(Topology::payroll_controls(), config).unwrap_err(),
            ConfigError::ZeroLogCapacity
        );
    }

    #[test]
    fn no_ticks_before_load() {
        let mut s = sim(SimConfig::seeded(1));
        assert!(s.step().is_none());
        assert_eq!(s.advance(10_000).ticks_run, 0);
        assert_eq!(s.virtual_time(), UNARMED);
    }

    #[test]
    fn load_arms_and_autostarts() {
        let mut s = sim(SimConfig::seeded(1));
        assert_eq!(s.load_manifest(Ok::<_, String>(seeds())).unwrap(), 3);
        assert_eq!(s.virtual_time(), 0);
        assert!(s.is_running());
        assert_eq!(s.log().latest().unwrap().message, LOADED_MESSAGE);
    }

    #[test]
    fn load_without_autostart_waits_armed() {
        let mut s = sim(SimConfig {
            autostart: false,
            ..SimConfig::seeded(1)
        });
        s.load_manifest(Ok::<_, String>(seeds())).unwrap();
        assert_eq!(s.phase(), DriverPhase::Armed);
        assert!(s.step().is_none());
        s.start();
        assert!(s.step().is_some());
        assert_eq!(s.virtual_time(), 1);
    }

    #[test]
    fn run_request_before_load_is_remembered() {
        let mut s = sim(SimConfig {
            autostart: false,
            ..SimConfig::seeded(1)
        });
        s.start();
        assert_eq!(s.phase(), DriverPhase::Uninitialized);
        assert!(s.run_requested());
        s.load_manifest(Ok::<_, String>(seeds())).unwrap();
        assert!(s.is_running());
    }

    #[test]
    fn failed_load_stays_unarmed() {
        let mut s = sim(SimConfig::seeded(1));
        let err = s
            .load_manifest(Err::<Vec<RegionSeed>, _>("connection refused"))
            .unwrap_err();
        assert_eq!(err, LoadError::Unavailable("connection refused".into()));
        assert_eq!(s.virtual_time(), UNARMED);
        assert_eq!(s.phase(), DriverPhase::Uninitialized);
        assert!(s.regions().is_empty());
        assert_eq!(s.log().len(), 1);
    }

    #[test]
    fn second_load_rejected() {
        let mut s = sim(SimConfig::seeded(1));
        s.load_manifest(Ok::<_, String>(seeds())).unwrap();
        assert_eq!(
            s.load_manifest(Ok::<_, String>(seeds())),
            Err(LoadError::AlreadyArmed)
        );
    }

    #[test]
    fn duplicate_manifest_ids_rejected() {
        let mut s = sim(SimConfig::seeded(1));
        let mut bad = seeds();
        bad.push(RegionSeed::scheduled("r-de", "DE", "Germany", 3));
        assert!(matches!(
            s.load_manifest(Ok::<_, String>(bad)),
            Err(LoadError::Store(StoreError::DuplicateRegion(_)))
        ));
        assert_eq!(s.virtual_time(), UNARMED);
    }

    #[test]
    fn pause_freezes_clock_and_regions() {
        let mut s = sim(SimConfig::seeded(3));
        s.load_manifest(Ok::<_, String>(seeds())).unwrap();
        s.step();
        s.pause();
        assert_eq!(s.phase(), DriverPhase::Paused);
        let hash = s.state_hash();
        assert!(s.step().is_none());
        assert_eq!(s.advance(5_000).ticks_run, 0);
        assert_eq!(s.state_hash(), hash);
        s.start();
        assert!(s.is_running());
        s.step();
        assert_eq!(s.virtual_time(), 2);
    }

    #[test]
    fn advance_runs_whole_periods_and_carries_remainder() {
        let mut s = sim(SimConfig::seeded(3));
        s.load_manifest(Ok::<_, String>(seeds())).unwrap();
        let result = s.advance(2_500);
        assert_eq!(result.ticks_run, 2);
        assert_eq!(result.reports.len(), 2);
        assert_eq!(s.sim_state().accumulator_ms, 500);
        assert_eq!(s.advance(500).ticks_run, 1);
        assert_eq!(s.virtual_time(), 3);
    }

    #[test]
    fn advance_saturates_instead_of_overflowing() {
        let mut s = sim(SimConfig::seeded(1));
        s.load_manifest(Ok::<_, String>(seeds())).unwrap();
        s.advance(500);
        let result = s.advance(u64::MAX);
        assert_eq!(result.ticks_run, 24);
        assert_eq!(s.virtual_time(), 24);
        assert!(s.sim_state().accumulator_ms < 1000);

        let result = s.advance(u64::MAX);
        assert_eq!(result.ticks_run, 24);
        assert_eq!(s.virtual_time(), 48);
    }

    #[test]
    fn advance_caps_catch_up_and_drops_backlog() {
        let mut s = sim(SimConfig {
            max_ticks_per_advance: 3,
            ..SimConfig::seeded(1)
        });
        s.load_manifest(Ok::<_, String>(seeds())).unwrap();
        let result = s.advance(10_250);
        assert_eq!(result.ticks_run, 3);
        assert_eq!(result.reports.len(), 3);
        assert_eq!(result.ticks_dropped, 7);
        assert_eq!(s.virtual_time(), 3);
        assert_eq!(s.sim_state().accumulator_ms, 250);

        let result = s.advance(750);
        assert_eq!(result.ticks_run, 1);
        assert_eq!(result.ticks_dropped, 0);
        assert_eq!(s.virtual_time(), 4);
    }

    #[test]
    fn exempt_gate_missing_from_topology_rejected() {
        let mut b = crate::topology::TopologyBuilder::new();
        let p = b.register_phase("P1", "Intake", "IN");
        b.register_gate(p, "G1", "Receive");
        let custom = b.build().unwrap();
        assert_eq!(
            Simulation::new(custom, SimConfig::seeded(1)).unwrap_err(),
            ConfigError::UnknownExemptGate("PRE".into())
        );
    }

    #[test]
    fn each_tick_advances_clock_by_one() {
        let mut s = sim(SimConfig::seeded(3));
        s.load_manifest(Ok::<_, String>(seeds())).unwrap();
        for expected in 1..=10 {
            let report = s.step().unwrap();
            assert_eq!(report.virtual_time, expected);
            assert_eq!(s.virtual_time(), expected);
        }
    }

    #[test]
    fn scheduled_regions_wait_for_drop_time() {
        let mut s = sim(SimConfig::seeded(5));
        s.load_manifest(Ok::<_, String>(seeds())).unwrap();
        for _ in 0..4 {
            s.step();
        }
        let jp = s.region_by_code("JP").unwrap();
        assert_eq!(jp.state(), RegionState::Scheduled);
        assert_eq!(jp.gate(), s.topology().first_gate());
    }

    #[test]
    fn same_seed_same_run() {
        let run = |seed| {
            let mut s = sim(SimConfig::seeded(seed));
            s.load_manifest(Ok::<_, String>(seeds())).unwrap();
            for _ in 0..200 {
                s.step();
            }
            (s.state_hash(), s.log_entries())
        };
        assert_eq!(run(42), run(42));
    }

    #[test]
    fn log_entries_correlate_region_and_gate() {
        let mut s = sim(SimConfig::seeded(9));
        s.load_manifest(Ok::<_, String>(seeds())).unwrap();
        for _ in 0..100 {
            s.step();
        }
        for entry in s.log().iter().filter(|e| e.region_code.is_some()) {
            let code = entry.region_code.as_deref().unwrap();
            assert!(s.region_by_code(code).is_some());
            if let Some(gate) = &entry.gate_id {
                assert!(s.topology().gate_index(gate).is_some());
            }
        }
        assert!(s.log().len() <= 50);
    }

    #[test]
    fn focus_validates_ids() {
        let mut s = sim(SimConfig::seeded(1));
        s.load_manifest(Ok::<_, String>(seeds())).unwrap();
        let focus = s.focus("FR", "GPC4").unwrap();
        assert_eq!(focus.region, RegionId(1));
        assert_eq!(s.current_focus(), Some(focus));
        assert_eq!(
            s.focus("XX", "GPC4"),
            Err(FocusError::UnknownRegion("XX".into()))
        );
        assert_eq!(
            s.focus("FR", "GPC99"),
            Err(FocusError::UnknownGate("GPC99".into()))
        );
        assert_eq!(s.current_focus(), Some(focus));
        s.clear_focus();
        assert!(s.current_focus().is_none());
    }

    #[test]
    fn reset_region_returns_to_start() {
        let mut s = sim(SimConfig::seeded(1));
        s.load_manifest(Ok::<_, String>(seeds())).unwrap();
        s.reset_region(RegionId(2)).unwrap();
        let r = s.region(RegionId(2)).unwrap();
        assert_eq!(r.health(), &Health::Processing);
        assert_eq!(r.progress(), 0);
        assert!(s.reset_region(RegionId(7)).is_err());
    }

    #[test]
    fn snapshot_covers_all_regions() {
        let mut s = sim(SimConfig::seeded(1));
        s.load_manifest(Ok::<_, String>(seeds())).unwrap();
        let snap = s.snapshot();
        assert_eq!(snap.len(), 3);
        assert_eq!(snap[0].gate_id, "PRE");
        assert_eq!(snap[2].schedule_drop_time, Some(5));
    }
}
