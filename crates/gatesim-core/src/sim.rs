//! Simulation clock, driver lifecycle and tick result types.
//!
//! The clock counts virtual hours. It reads [`UNARMED`] until a manifest has
//! been loaded, is set to 0 when the driver arms, and then increments by one
//! per tick.

use crate::id::RegionId;
use crate::transition::TransitionError;

/// A virtual hour. Signed so that [`UNARMED`] can be represented.
pub type VirtualTime = i64;

/// Clock value before the manifest has loaded.
pub const UNARMED: VirtualTime = -1;

// ---------------------------------------------------------------------------
// Driver lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle of the whole simulation (not of a single region).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DriverPhase {
    /// No manifest yet. The clock reads [`UNARMED`] and nothing ticks.
    Uninitialized,
    /// Manifest loaded and clock at 0, waiting for a run request.
    Armed,
    /// Ticks are being produced.
    Running,
    /// Ticking suspended. Clock and regions are frozen.
    Paused,
}

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// Mutable clock state tracked by the driver.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SimState {
    /// Current virtual hour, or [`UNARMED`].
    pub virtual_time: VirtualTime,

    /// Current lifecycle phase.
    pub phase: DriverPhase,

    /// Wall-clock milliseconds carried toward the next tick. When it reaches
    /// the tick period a tick runs and the period is subtracted.
    pub accumulator_ms: u64,
}

impl SimState {
    /// Create an unarmed state.
    pub fn new() -> Self {
        Self {
            virtual_time: UNARMED,
            phase: DriverPhase::Uninitialized,
            accumulator_ms: 0,
        }
    }

    /// Whether the manifest has loaded.
    pub fn is_armed(&self) -> bool {
        self.phase != DriverPhase::Uninitialized
    }

    /// Move to [`DriverPhase::Armed`] with the clock at 0.
    pub fn arm(&mut self) {
        self.virtual_time = 0;
        self.phase = DriverPhase::Armed;
        self.accumulator_ms = 0;
    }

    /// Increment the clock and return the new virtual hour.
    pub fn advance_clock(&mut self) -> VirtualTime {
        self.virtual_time += 1;
        self.virtual_time
    }
}

impl Default for SimState {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tick results
// ---------------------------------------------------------------------------

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Virtual hour the tick evaluated.
    pub virtual_time: VirtualTime,
    /// Regions whose mutable fields changed.
    pub changed: usize,
    /// Log entries appended.
    pub events: usize,
    /// Regions whose transition could not be computed. They were left as-is.
    pub failed: Vec<(RegionId, TransitionError)>,
}

/// Result of a `Simulation::advance()` call.
#[derive(Debug, Default)]
pub struct AdvanceResult {
    /// Number of ticks actually executed.
    pub ticks_run: u64,

    /// One report per executed tick, oldest first.
    pub reports: Vec<TickReport>,

    /// Whole tick periods discarded because the call hit its tick cap.
    pub ticks_dropped: u64,
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of simulation state for replay checks.
///
/// Uses FNV-1a (64-bit) for speed and simplicity. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    /// Start a new hash.
    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    /// Feed bytes into the hash.
    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    /// Feed a u64 into the hash.
    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    /// Feed an i64 into the hash.
    pub fn write_i64(&mut self, v: i64) {
        self.write(&v.to_le_bytes());
    }

    /// Feed a string into the hash, length-prefixed so adjacent strings
    /// cannot alias.
    pub fn write_str(&mut self, s: &str) {
        self.write_u64(s.len() as u64);
        self.write(s.as_bytes());
    }

    /// Finalize and return the hash value.
    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}
