//! Gatesim Core -- the simulation engine for staged approval pipelines.
//!
//! A fixed, ordered pipeline of phases and gates is walked by many independent
//! regions. A discrete virtual clock drives every region through a randomized
//! state machine (processing, anomalies, failures, recovery, lateness) and a
//! bounded, newest-first event log records what happened.
//!
//! # Tick Pipeline
//!
//! Each call to [`engine::Simulation::step`] runs one tick:
//!
//! 1. **Clock** -- Advance the virtual hour by one.
//! 2. **Evaluate** -- Run [`transition::advance`] for every region against the
//!    topology and the current virtual time. Regions never read each other.
//! 3. **Apply** -- Replace each changed region's mutable fields in the
//!    [`store::RegionStore`] in one step.
//! 4. **Record** -- Append any produced events to the [`log::EventLog`].
//!
//! # Key Types
//!
//! - [`engine::Simulation`] -- Driver: lifecycle, ticking, snapshots, focus.
//! - [`topology::Topology`] -- Immutable phases and gates with O(1) index lookup.
//! - [`region::Region`] -- A region's identity, position and [`region::Health`].
//! - [`transition::advance`] -- Pure per-region transition function.
//! - [`rng::Draws`] -- Injected randomness; [`rng::SimRng`] for live runs and
//!   [`rng::ScriptedDraws`] for exact replay.
//! - [`config::SimConfig`] -- Tuning probabilities and driver settings.

pub mod config;
pub mod engine;
pub mod event;
pub mod id;
pub mod log;
pub mod manifest;
pub mod query;
pub mod region;
pub mod rng;
pub mod sim;
pub mod store;
pub mod topology;
pub mod transition;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
