pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, Scenario, load_config, load_manifest, load_scenario, load_topology};
