//! Pipeline statistics for the gatesim engine.
//!
//! Derives aggregate metrics from a region snapshot (counts by state, issue
//! lists, completion percentage, triage ordering) and keeps a rolling history
//! of the completion percentage for trend display.
//!
//! # Usage
//!
//! ```ignore
//! let mut stats = PipelineStats::new(StatsConfig::default());
//! // After each tick:
//! stats.observe(sim.virtual_time(), sim.regions());
//! // Query metrics:
//! let pct = stats.metrics().completion_percentage;
//! ```

use gatesim_core::region::{Region, RegionState};
use gatesim_core::sim::VirtualTime;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the statistics module.
#[derive(Debug, Clone)]
pub struct StatsConfig {
    /// Maximum number of completion samples to retain.
    pub history_capacity: usize,
    /// Record a history sample every this many virtual hours.
    pub sample_every: VirtualTime,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            history_capacity: 256,
            sample_every: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Triage ordering
// ---------------------------------------------------------------------------

/// Display priority of a state. Lower sorts first: the states needing
/// attention lead, finished regions trail.
pub fn priority(state: RegionState) -> u8 {
    match state {
        RegionState::Error => 0,
        RegionState::AutoHealing => 1,
        RegionState::Late => 2,
        RegionState::Processing => 3,
        RegionState::Scheduled => 4,
        RegionState::Idle => 5,
        RegionState::Passed => 6,
    }
}

/// Regions sorted by [`priority`]. Ties keep their load order.
pub fn triage_order(regions: &[Region]) -> Vec<&Region> {
    let mut sorted: Vec<&Region> = regions.iter().collect();
    sorted.sort_by_key(|r| priority(r.state()));
    sorted
}

/// Regions in an issue state (ERROR, AUTO_HEALING or LATE), in triage order.
pub fn issue_regions(regions: &[Region]) -> Vec<&Region> {
    regions_where(regions, |s| s.is_issue())
}

pub fn error_regions(regions: &[Region]) -> Vec<&Region> {
    regions_where(regions, |s| s == RegionState::Error)
}

pub fn completed_regions(regions: &[Region]) -> Vec<&Region> {
    regions_where(regions, |s| s == RegionState::Passed)
}

pub fn processing_regions(regions: &[Region]) -> Vec<&Region> {
    regions_where(regions, |s| s == RegionState::Processing)
}

fn regions_where(regions: &[Region], keep: impl Fn(RegionState) -> bool) -> Vec<&Region> {
    let mut matching = triage_order(regions);
    matching.retain(|r| keep(r.state()));
    matching
}

// ---------------------------------------------------------------------------
// Aggregate metrics
// ---------------------------------------------------------------------------

/// Counts derived from one snapshot of all regions.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineMetrics {
    pub total: usize,
    /// Regions per state, indexed by [`RegionState::index`].
    pub by_state: [usize; 7],
    pub issue_count: usize,
    /// `round(passed / max(total, 1) * 100)`.
    pub completion_percentage: u8,
}

impl PipelineMetrics {
    pub fn compute(regions: &[Region]) -> Self {
        let mut by_state = [0usize; 7];
        for region in regions {
            by_state[region.state().index()] += 1;
        }
        let issue_count = RegionState::ALL
            .iter()
            .filter(|s| s.is_issue())
            .map(|s| by_state[s.index()])
            .sum();
        let completed = by_state[RegionState::Passed.index()];
        let completion_percentage =
            (completed as f64 / regions.len().max(1) as f64 * 100.0).round() as u8;
        Self {
            total: regions.len(),
            by_state,
            issue_count,
            completion_percentage,
        }
    }

    pub fn count(&self, state: RegionState) -> usize {
        self.by_state[state.index()]
    }
}

// ---------------------------------------------------------------------------
// RingBuffer -- fixed-capacity history storage
// ---------------------------------------------------------------------------

/// A fixed-capacity ring buffer for trend analysis.
///
/// When full, the oldest entry is overwritten. Iterates oldest-to-newest.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    data: Vec<T>,
    head: usize,
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a new ring buffer with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            data: vec![T::default(); capacity],
            head: 0,
            len: 0,
        }
    }

    /// Push a value, overwriting the oldest entry if at capacity.
    pub fn push(&mut self, value: T) {
        self.data[self.head] = value;
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The most recently pushed value, if any.
    pub fn latest(&self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let idx = (self.head + self.capacity() - 1) % self.capacity();
        Some(self.data[idx])
    }

    /// The oldest retained value, if any.
    pub fn oldest(&self) -> Option<T> {
        self.iter().next()
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = T> + '_ {
        let start = if self.len < self.capacity() { 0 } else { self.head };
        (0..self.len).map(move |i| self.data[(start + i) % self.capacity()])
    }

    /// Collect all stored values into a Vec (oldest to newest).
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    pub fn clear(&mut self) {
        for slot in &mut self.data {
            *slot = T::default();
        }
        self.head = 0;
        self.len = 0;
    }
}

// ---------------------------------------------------------------------------
// Completion history
// ---------------------------------------------------------------------------

/// Completion percentage at one virtual hour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSample {
    pub virtual_time: VirtualTime,
    pub percentage: u8,
}

/// Tracks metrics for the latest observation and a rolling completion history.
#[derive(Debug, Clone)]
pub struct PipelineStats {
    config: StatsConfig,
    metrics: PipelineMetrics,
    history: RingBuffer<CompletionSample>,
    last_sample: Option<VirtualTime>,
}

impl PipelineStats {
    /// A `history_capacity` of 0 is clamped to 1.
    pub fn new(config: StatsConfig) -> Self {
        let history = RingBuffer::new(config.history_capacity.max(1));
        Self {
            config,
            metrics: PipelineMetrics::default(),
            history,
            last_sample: None,
        }
    }

    /// Recompute metrics from the current regions and, when due, record a
    /// completion sample. Observing the same virtual hour twice records one
    /// sample.
    pub fn observe(&mut self, virtual_time: VirtualTime, regions: &[Region]) -> &PipelineMetrics {
        self.metrics = PipelineMetrics::compute(regions);
        let due = match self.last_sample {
            None => true,
            Some(last) => virtual_time - last >= self.config.sample_every.max(1),
        };
        if due {
            self.history.push(CompletionSample {
                virtual_time,
                percentage: self.metrics.completion_percentage,
            });
            self.last_sample = Some(virtual_time);
        }
        &self.metrics
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn history(&self) -> &RingBuffer<CompletionSample> {
        &self.history
    }

    /// Change in completion percentage across the retained history.
    pub fn trend(&self) -> i16 {
        match (self.history.oldest(), self.history.latest()) {
            (Some(first), Some(last)) => i16::from(last.percentage) - i16::from(first.percentage),
            _ => 0,
        }
    }

    pub fn reset(&mut self) {
        self.metrics = PipelineMetrics::default();
        self.history.clear();
        self.last_sample = None;
    }
}
