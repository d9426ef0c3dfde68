//! Random draws for the transition engine.
//!
//! [`SimRng`] uses the SplitMix64 algorithm: fast, 8 bytes of state, good
//! statistical properties, and trivially serializable. The driver forks one
//! stream per (tick, region) so a region's draws do not depend on how many
//! draws other regions consumed, or on evaluation order.
//!
//! [`ScriptedDraws`] replays a fixed sequence of unit draws so a scenario can
//! be reproduced exactly.

/// Source of uniform random draws consumed by [`crate::transition::advance`].
pub trait Draws {
    /// A uniform draw in `[0, 1)`.
    fn unit(&mut self) -> f64;

    /// A uniform integer in `[min, max]`, both inclusive. Consumes one unit
    /// draw. Returns `min` when the range is empty or inverted.
    fn int_inclusive(&mut self, min: u32, max: u32) -> u32 {
        if max <= min {
            return min;
        }
        let span = max - min;
        let offset = (self.unit() * (span as f64 + 1.0)) as u32;
        min + offset.min(span)
    }
}

// ---------------------------------------------------------------------------
// SimRng
// ---------------------------------------------------------------------------

/// SplitMix64 pseudo-random number generator.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SimRng {
    state: u64,
}

impl SimRng {
    /// Create a new RNG with the given seed.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Derive an independent stream for one region on one tick.
    pub fn stream(seed: u64, tick: u64, stream: u64) -> Self {
        let mut mixer = Self::new(seed ^ tick.wrapping_mul(0xD1B5_4A32_D192_ED03));
        let salted = mixer.next_u64() ^ stream.wrapping_mul(0x8CB9_2BA7_2F3D_8DD7);
        let mut mixer = Self::new(salted);
        Self::new(mixer.next_u64())
    }

    /// Generate the next `u64` in the sequence.
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Generate a uniform `f64` in `[0, 1)` from the top 53 bits.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }
}

impl Draws for SimRng {
    fn unit(&mut self) -> f64 {
        self.next_f64()
    }
}

// ---------------------------------------------------------------------------
// ScriptedDraws
// ---------------------------------------------------------------------------

/// Replays a fixed sequence of unit draws.
///
/// # Panics
///
/// Drawing past the end of the script panics: a replay that needs more draws
/// than were recorded has diverged.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDraws {
    draws: Vec<f64>,
    cursor: usize,
}

impl ScriptedDraws {
    /// Create a script from unit draws in `[0, 1)`.
    pub fn new(draws: Vec<f64>) -> Self {
        Self {
            draws,
            cursor: 0,
        }
    }

    /// The unit draw that makes [`Draws::int_inclusive`] yield `value` for
    /// the range `[min, max]`. Lands in the middle of the value's bucket.
    pub fn unit_for(min: u32, max: u32, value: u32) -> f64 {
        let span = (max.saturating_sub(min)) as f64 + 1.0;
        let offset = value.clamp(min, max.max(min)) - min;
        (offset as f64 + 0.5) / span
    }

    /// Draws consumed so far.
    pub fn consumed(&self) -> usize {
        self.cursor
    }

    /// Draws left in the script.
    pub fn remaining(&self) -> usize {
        self.draws.len() - self.cursor
    }
}

impl Draws for ScriptedDraws {
    fn unit(&mut self) -> f64 {
        let Some(&draw) = self.draws.get(self.cursor) else {
            panic!(
                "scripted draws exhausted after {} draws",
                self.draws.len()
            );
        };
        self.cursor += 1;
        draw
    }
}
