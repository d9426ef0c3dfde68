//! Headless run: load a small manifest, drive the clock for a simulated day
//! and print each region's position plus the most recent log entries.
//!
//! Run with: `RUST_LOG=gatesim_core=debug cargo run -p gatesim-core --example headless_run`

use gatesim_core::config::SimConfig;
use gatesim_core::engine::Simulation;
use gatesim_core::query::lane;
use gatesim_core::topology::Topology;

const MANIFEST: &str = r#"[
    {"id": "1", "countryCode": "US", "name": "United States", "scheduleDropTime": "0"},
    {"id": "2", "countryCode": "GB", "name": "United Kingdom", "scheduleDropTime": "2"},
    {"id": "3", "countryCode": "DE", "name": "Germany", "scheduleDropTime": 4},
    {"id": "4", "countryCode": "JP", "name": "Japan", "scheduleDropTime": "6"},
    {"id": "5", "countryCode": "BR", "name": "Brazil", "scheduleDropTime": 9}
]"#;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let mut sim = Simulation::new(Topology::payroll_controls(), SimConfig::seeded(2024))
        .expect("default config is valid");
    sim.load_manifest_json(MANIFEST).expect("manifest parses");

    // --- Drive one virtual day, one wall-clock second per hour ---

    let result = sim.advance(24 * sim.config().tick_period_ms);
    println!(
        "ran {} ticks, virtual hour {}",
        result.ticks_run,
        sim.virtual_time()
    );

    // --- Region positions ---

    for snap in sim.snapshot() {
        println!(
            "{:<3} {:<16} {:<6} {:>3}% {}",
            snap.country_code, snap.name, snap.gate_id, snap.progress, snap.state
        );
    }

    // --- One lane, as a compact strip ---

    if let Some(region) = sim.region_by_code("US") {
        let strip: String = lane(region, sim.topology())
            .iter()
            .map(|cell| match cell.display_state.as_str() {
                "PASSED" => '#',
                "IDLE" => '.',
                _ => '>',
            })
            .collect();
        println!("US lane: {strip}");
    }

    // --- Recent log ---

    for entry in sim.log().iter().take(10) {
        println!("[VT {:>3}] {:<12} {}", entry.timestamp, entry.kind.as_str(), entry.message);
    }
}
