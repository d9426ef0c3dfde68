//! Property-based tests for the gatesim core engine.
//!
//! Uses proptest to generate random regions, draw sequences and whole
//! simulations, then verify structural invariants hold.

use gatesim_core::config::{SimConfig, Tuning};
use gatesim_core::id::{GateIndex, RegionId};
use gatesim_core::log::EventLog;
use gatesim_core::log::LogKind;
use gatesim_core::region::{Health, IssueDetails, Region, RegionState};
use gatesim_core::rng::{ScriptedDraws, SimRng};
use gatesim_core::test_utils::*;
use gatesim_core::transition::advance;
use proptest::prelude::*;

// ===========================================================================
// Generators
// ===========================================================================

fn arb_issue() -> impl Strategy<Value = IssueDetails> {
    ("[A-Z]{3}[0-9]{4}", "[a-z ]{0,20}").prop_map(|(t, d)| IssueDetails::new(t, d))
}

fn arb_health() -> impl Strategy<Value = Health> {
    prop_oneof![
        (0i64..48).prop_map(|drop_time| Health::Scheduled { drop_time }),
        arb_issue().prop_map(Health::Late),
        Just(Health::Idle),
        Just(Health::Processing),
        arb_issue().prop_map(Health::AutoHealing),
        arb_issue().prop_map(Health::Error),
        Just(Health::Passed),
    ]
}

/// A region somewhere valid in the built-in pipeline.
fn arb_region() -> impl Strategy<Value = Region> {
    let gates = payroll().gate_count() as u16;
    (arb_health(), 0..gates, 0u8..=100).prop_map(|(health, gate, progress)| {
        Region::new(RegionId(0), "r", "DE", "Germany", health).at(GateIndex(gate), progress)
    })
}

fn arb_draws() -> impl Strategy<Value = Vec<f64>> {
    proptest::collection::vec(0.0f64..1.0, 4)
}

// ===========================================================================
// Transition invariants
// ===========================================================================

proptest! {
    #[test]
    fn transition_keeps_region_valid(
        region in arb_region(),
        now in 0i64..64,
        draws in arb_draws(),
    ) {
        let t = payroll();
        let out = advance(&region, now, &t, &Tuning::default(), &mut ScriptedDraws::new(draws)).unwrap();
        if let Some(update) = out.update {
            prop_assert!(update.progress <= 100);
            prop_assert!(t.contains_gate(update.gate));
            prop_assert_eq!(update.health.issue().is_some(), update.health.state().is_issue());
            // Gates only ever move forward by one, or back to the start on restart.
            if update.gate != region.gate() {
                prop_assert!(
                    Some(update.gate) == t.next_gate(region.gate())
                        || update.gate == t.first_gate()
                );
                prop_assert_eq!(update.progress, 0);
            }
        }
    }

    #[test]
    fn transition_is_pure(
        region in arb_region(),
        now in 0i64..64,
        draws in arb_draws(),
    ) {
        let t = payroll();
        let tuning = Tuning::default();
        let a = advance(&region, now, &t, &tuning, &mut ScriptedDraws::new(draws.clone()));
        let b = advance(&region, now, &t, &tuning, &mut ScriptedDraws::new(draws));
        prop_assert_eq!(a, b);
    }

    #[test]
    fn every_event_matches_its_update(
        region in arb_region(),
        now in 0i64..64,
        seed in any::<u64>(),
    ) {
        let t = payroll();
        let out = advance(&region, now, &t, &Tuning::default(), &mut SimRng::new(seed)).unwrap();
        if let (Some(event), Some(update)) = (&out.event, &out.update) {
            let expected = match event.kind() {
                LogKind::Error => Some(RegionState::Error),
                LogKind::Late => Some(RegionState::Late),
                _ => None,
            };
            if let Some(state) = expected {
                prop_assert_eq!(update.health.state(), state);
            }
        }
        if out.event.is_some() {
            prop_assert!(out.update.is_some());
        }
    }
}

// ===========================================================================
// Log invariants
// ===========================================================================

proptest! {
    #[test]
    fn log_never_exceeds_capacity(appends in 0usize..200, capacity in 1usize..80) {
        let mut log = EventLog::new(capacity);
        for i in 0..appends {
            log.append(i as i64, LogKind::Info, format!("m{i}"), None, None);
        }
        prop_assert_eq!(log.len(), appends.min(capacity));
        prop_assert_eq!(log.total_written(), appends as u64);
        if appends > 0 {
            let expected = format!("m{}", appends - 1);
            prop_assert_eq!(log.latest().map(|e| e.message.as_str()), Some(expected.as_str()));
        }
    }
}

// ===========================================================================
// Whole-run invariants
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn runs_hold_invariants(seed in any::<u64>(), regions in 1usize..24, ticks in 1usize..120) {
        let mut sim = running_sim(seed, regions);
        for _ in 0..ticks {
            sim.step();
        }
        prop_assert_eq!(sim.virtual_time(), ticks as i64);
        prop_assert!(sim.log().len() <= 50);
        for r in sim.regions() {
            prop_assert!(r.progress() <= 100);
            prop_assert!(sim.topology().contains_gate(r.gate()));
            prop_assert_eq!(r.issue().is_some(), r.state().is_issue());
        }
    }

    #[test]
    fn same_seed_is_reproducible(seed in any::<u64>(), ticks in 1usize..80) {
        let run = || {
            let mut sim = running_sim_with(SimConfig::seeded(seed), seeds(10, 5));
            for _ in 0..ticks {
                sim.step();
            }
            sim.state_hash()
        };
        prop_assert_eq!(run(), run());
    }
}
