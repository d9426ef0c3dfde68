//! Reads scenario files: manifests, configs and custom topologies.
//!
//! Provides format detection (RON/JSON/TOML), file discovery, and
//! deserialization helpers, plus [`load_scenario`] which assembles a whole
//! scenario directory into a ready-to-run [`Simulation`].

use crate::schema::TopologyData;
use gatesim_core::config::{ConfigError, SimConfig};
use gatesim_core::engine::{LoadError, Simulation};
use gatesim_core::manifest::{ManifestError, ManifestRecord, seeds_from_records};
use gatesim_core::store::RegionSeed;
use gatesim_core::topology::{Topology, TopologyError};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Base name of the manifest file in a scenario directory.
pub const MANIFEST_FILE: &str = "manifest";
/// Base name of the optional config file.
pub const CONFIG_FILE: &str = "config";
/// Base name of the optional topology file.
pub const TOPOLOGY_FILE: &str = "topology";
/// Table key holding manifest records in a TOML manifest.
pub const MANIFEST_TOML_KEY: &str = "regions";

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// Manifest records parsed but could not become regions.
    #[error("invalid manifest {file}: {source}")]
    Manifest {
        file: PathBuf,
        #[source]
        source: ManifestError,
    },

    /// Config parsed but failed validation.
    #[error("invalid config {file}: {source}")]
    Config {
        file: PathBuf,
        #[source]
        source: ConfigError,
    },

    /// Topology parsed but failed validation.
    #[error("invalid topology {file}: {source}")]
    Topology {
        file: PathBuf,
        #[source]
        source: TopologyError,
    },

    /// The driver refused the scenario.
    #[error(transparent)]
    Engine(#[from] LoadError),

    /// The driver refused the config.
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for `{base_name}.ron`, `.toml` or `.json`.
///
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// more than one format exists for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;
    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if !candidate.exists() {
            continue;
        }
        if let Some(existing) = found {
            return Err(DataLoadError::ConflictingFormats {
                a: existing,
                b: candidate,
            });
        }
        found = Some(candidate);
    }
    Ok(found)
}

/// Like [`find_data_file`], but a missing file is an error.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, e: impl ToString) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: e.to_string(),
    }
}

/// Read a file and deserialize it according to its extension.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list from a file. TOML cannot hold a bare top-level array,
/// so for TOML the array is read from `toml_key`. RON and JSON hold the list
/// directly.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => {
            let table: toml::Value = toml::from_str(&content).map_err(|e| parse_error(path, e))?;
            let array = table
                .get(toml_key)
                .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?
                .clone();
            array
                .try_into()
                .map_err(|e: toml::de::Error| parse_error(path, e))
        }
    }
}

// ===========================================================================
// Typed loaders
// ===========================================================================

/// Load manifest records and convert them to region seeds.
pub fn load_manifest(path: &Path) -> Result<Vec<RegionSeed>, DataLoadError> {
    let records: Vec<ManifestRecord> = deserialize_list(path, MANIFEST_TOML_KEY)?;
    let seeds = seeds_from_records(records).map_err(|source| DataLoadError::Manifest {
        file: path.to_path_buf(),
        source,
    })?;
    info!(file = %path.display(), regions = seeds.len(), "manifest read");
    Ok(seeds)
}

/// Load and validate a config. Missing fields take their defaults.
pub fn load_config(path: &Path) -> Result<SimConfig, DataLoadError> {
    let config: SimConfig = deserialize_file(path)?;
    config.validate().map_err(|source| DataLoadError::Config {
        file: path.to_path_buf(),
        source,
    })?;
    Ok(config)
}

/// Load and validate a custom topology.
pub fn load_topology(path: &Path) -> Result<Topology, DataLoadError> {
    let data: TopologyData = deserialize_file(path)?;
    let topology = data.build().map_err(|source| DataLoadError::Topology {
        file: path.to_path_buf(),
        source,
    })?;
    info!(
        file = %path.display(),
        phases = topology.phase_count(),
        gates = topology.gate_count(),
        "topology read"
    );
    Ok(topology)
}

// ===========================================================================
// Scenario
// ===========================================================================

/// Everything needed to start a simulation.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub topology: Topology,
    pub config: SimConfig,
    pub seeds: Vec<RegionSeed>,
}

impl Scenario {
    /// Create the driver and install the manifest.
    pub fn into_simulation(self) -> Result<Simulation, DataLoadError> {
        let mut sim = Simulation::new(self.topology, self.config)?;
        sim.load_manifest(Ok::<_, DataLoadError>(self.seeds))?;
        Ok(sim)
    }
}

/// Load a scenario directory.
///
/// `manifest.{ron,toml,json}` is required. `config` and `topology` are
/// optional and default to [`SimConfig::default`] and the built-in payroll
/// controls pipeline.
pub fn load_scenario(dir: &Path) -> Result<Scenario, DataLoadError> {
    read_scenario(dir).inspect_err(|e| {
        error!(dir = %dir.display(), error = %e, "failed to load scenario");
    })
}

fn read_scenario(dir: &Path) -> Result<Scenario, DataLoadError> {
    let topology = match find_data_file(dir, TOPOLOGY_FILE)? {
        Some(path) => load_topology(&path)?,
        None => Topology::payroll_controls(),
    };
    let config = match find_data_file(dir, CONFIG_FILE)? {
        Some(path) => load_config(&path)?,
        None => SimConfig::default(),
    };
    config.validate_for(&topology)?;
    let seeds = load_manifest(&require_data_file(dir, MANIFEST_FILE)?)?;
    Ok(Scenario {
        topology,
        config,
        seeds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatesim_core::region::{Health, RegionState};
    use std::fs;

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Create a unique temporary directory for a test.
    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "gatesim_data_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Clean up a test directory.
    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    const JSON_MANIFEST: &str = r#"[
        {"id": "1", "countryCode": "US", "name": "United States", "scheduleDropTime": "2"},
        {"id": "2", "countryCode": "GB", "name": "United Kingdom", "scheduleDropTime": 5}
    ]"#;

    // -----------------------------------------------------------------------
    // Format detection and discovery
    // -----------------------------------------------------------------------

    #[test]
    fn detect_formats() {
        assert_eq!(detect_format(Path::new("a.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("a.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("a.json")).unwrap(), Format::Json);
        assert!(matches!(
            detect_format(Path::new("a.yaml")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
        assert!(detect_format(Path::new("manifest")).is_err());
    }

    #[test]
    fn find_data_file_conflict() {
        let dir = make_test_dir("find_conflict");
        fs::write(dir.join("manifest.json"), "[]").unwrap();
        fs::write(dir.join("manifest.ron"), "[]").unwrap();
        assert!(matches!(
            find_data_file(&dir, "manifest"),
            Err(DataLoadError::ConflictingFormats { .. })
        ));
        cleanup(&dir);
    }

    #[test]
    fn require_data_file_missing() {
        let dir = make_test_dir("require_missing");
        let err = require_data_file(&dir, "manifest").unwrap_err();
        assert!(matches!(err, DataLoadError::MissingRequired { ref file, .. } if file == "manifest"));
        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // Manifests
    // -----------------------------------------------------------------------

    #[test]
    fn manifest_json() {
        let dir = make_test_dir("manifest_json");
        let path = dir.join("manifest.json");
        fs::write(&path, JSON_MANIFEST).unwrap();
        let seeds = load_manifest(&path).unwrap();
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[0].health, Health::Scheduled { drop_time: 2 });
        assert_eq!(seeds[1].country_code, "GB");
        cleanup(&dir);
    }

    #[test]
    fn manifest_toml() {
        let dir = make_test_dir("manifest_toml");
        let path = dir.join("manifest.toml");
        fs::write(
            &path,
            r#"
[[regions]]
id = "1"
countryCode = "JP"
name = "Japan"
scheduleDropTime = "7"

[[regions]]
id = "2"
countryCode = "DE"
name = "Germany"
state = "IDLE"
"#,
        )
        .unwrap();
        let seeds = load_manifest(&path).unwrap();
        assert_eq!(seeds[0].health, Health::Scheduled { drop_time: 7 });
        assert_eq!(seeds[1].health.state(), RegionState::Idle);
        cleanup(&dir);
    }

    #[test]
    fn manifest_ron() {
        let dir = make_test_dir("manifest_ron");
        let path = dir.join("manifest.ron");
        fs::write(
            &path,
            r#"[
    (id: "1", countryCode: "BR", name: "Brazil", scheduleDropTime: Some(3)),
    (id: "2", countryCode: "MX", name: "Mexico", scheduleDropTime: Some("4")),
    (id: "3", countryCode: "CA", name: "Canada", state: Some(IDLE)),
]"#,
        )
        .unwrap();
        let seeds = load_manifest(&path).unwrap();
        assert_eq!(seeds.len(), 3);
        assert_eq!(seeds[0].health, Health::Scheduled { drop_time: 3 });
        assert_eq!(seeds[1].health, Health::Scheduled { drop_time: 4 });
        assert_eq!(seeds[2].health.state(), RegionState::Idle);
        cleanup(&dir);
    }

    #[test]
    fn manifest_ron_requires_some_for_drop_time() {
        let dir = make_test_dir("manifest_ron_bare");
        let path = dir.join("manifest.ron");
        fs::write(
            &path,
            r#"[(id: "1", countryCode: "BR", name: "Brazil", scheduleDropTime: 3)]"#,
        )
        .unwrap();
        assert!(matches!(load_manifest(&path), Err(DataLoadError::Parse { .. })));
        cleanup(&dir);
    }

    #[test]
    fn manifest_toml_missing_key() {
        let dir = make_test_dir("manifest_toml_key");
        let path = dir.join("manifest.toml");
        fs::write(&path, "[[countries]]\nid = \"1\"\n").unwrap();
        let err = load_manifest(&path).unwrap_err();
        assert!(matches!(err, DataLoadError::Parse { ref detail, .. } if detail.contains("regions")));
        cleanup(&dir);
    }

    #[test]
    fn manifest_bad_drop_time() {
        let dir = make_test_dir("manifest_bad_drop");
        let path = dir.join("manifest.json");
        fs::write(
            &path,
            r#"[{"id": "1", "countryCode": "US", "name": "United States", "scheduleDropTime": "later"}]"#,
        )
        .unwrap();
        assert!(matches!(
            load_manifest(&path),
            Err(DataLoadError::Manifest {
                source: ManifestError::InvalidDropTime { .. },
                ..
            })
        ));
        cleanup(&dir);
    }

    #[test]
    fn manifest_malformed_json() {
        let dir = make_test_dir("manifest_malformed");
        let path = dir.join("manifest.json");
        fs::write(&path, "[{\"id\": ").unwrap();
        assert!(matches!(load_manifest(&path), Err(DataLoadError::Parse { .. })));
        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // Config and topology
    // -----------------------------------------------------------------------

    #[test]
    fn config_ron_partial() {
        let dir = make_test_dir("config_ron");
        let path = dir.join("config.ron");
        fs::write(&path, "(seed: Some(7), autostart: false, tuning: (issue_chance: 0.5))").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.seed, Some(7));
        assert!(!config.autostart);
        assert_eq!(config.tuning.issue_chance, 0.5);
        assert_eq!(config.tuning.restart_chance, 0.05);
        assert_eq!(config.log_capacity, 50);
        cleanup(&dir);
    }

    #[test]
    fn config_toml_invalid() {
        let dir = make_test_dir("config_toml_invalid");
        let path = dir.join("config.toml");
        fs::write(&path, "[tuning]\nidle_start_chance = 3.0\n").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(DataLoadError::Config {
                source: ConfigError::ProbabilityOutOfRange { .. },
                ..
            })
        ));
        cleanup(&dir);
    }

    #[test]
    fn topology_json() {
        let dir = make_test_dir("topology_json");
        let path = dir.join("topology.json");
        fs::write(
            &path,
            r#"{"phases": [
                {"id": "P1", "name": "Intake", "gates": [{"id": "G1", "name": "Receive"}]},
                {"id": "P2", "name": "Review", "short_name": "REV",
                 "gates": [{"id": "G2", "name": "Check"}, {"id": "G3", "name": "Approve"}]}
            ]}"#,
        )
        .unwrap();
        let t = load_topology(&path).unwrap();
        assert_eq!(t.gate_count(), 3);
        assert_eq!(t.gate(t.last_gate()).unwrap().id, "G3");
        cleanup(&dir);
    }

    #[test]
    fn topology_invalid() {
        let dir = make_test_dir("topology_invalid");
        let path = dir.join("topology.json");
        fs::write(&path, r#"{"phases": []}"#).unwrap();
        assert!(matches!(
            load_topology(&path),
            Err(DataLoadError::Topology {
                source: TopologyError::Empty,
                ..
            })
        ));
        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // Scenario
    // -----------------------------------------------------------------------

    #[test]
    fn scenario_defaults_when_optional_files_absent() {
        let dir = make_test_dir("scenario_defaults");
        fs::write(dir.join("manifest.json"), JSON_MANIFEST).unwrap();
        let scenario = load_scenario(&dir).unwrap();
        assert_eq!(scenario.topology.gate_count(), 22);
        assert_eq!(scenario.config, SimConfig::default());
        assert_eq!(scenario.seeds.len(), 2);
        cleanup(&dir);
    }

    #[test]
    fn scenario_requires_manifest() {
        let dir = make_test_dir("scenario_no_manifest");
        fs::write(dir.join("config.toml"), "seed = 1\n").unwrap();
        assert!(matches!(
            load_scenario(&dir),
            Err(DataLoadError::MissingRequired { .. })
        ));
        cleanup(&dir);
    }

    const CUSTOM_TOPOLOGY: &str = r#"{"phases": [
        {"id": "P1", "name": "Intake", "gates": [{"id": "G1", "name": "Receive"}]},
        {"id": "P2", "name": "Review", "gates": [{"id": "G2", "name": "Check"}]}
    ]}"#;

    #[test]
    fn scenario_custom_topology_needs_known_exempt_gate() {
        let dir = make_test_dir("scenario_exempt_unknown");
        fs::write(dir.join("manifest.json"), JSON_MANIFEST).unwrap();
        fs::write(dir.join("topology.json"), CUSTOM_TOPOLOGY).unwrap();
        assert!(matches!(
            load_scenario(&dir),
            Err(DataLoadError::InvalidConfig(ConfigError::UnknownExemptGate(ref gate))) if gate == "PRE"
        ));
        cleanup(&dir);
    }

    #[test]
    fn scenario_custom_topology_with_retargeted_exempt_gate() {
        let dir = make_test_dir("scenario_exempt_retargeted");
        fs::write(dir.join("manifest.json"), JSON_MANIFEST).unwrap();
        fs::write(dir.join("topology.json"), CUSTOM_TOPOLOGY).unwrap();
        fs::write(
            dir.join("config.toml"),
            "seed = 3\n[tuning]\nissue_exempt_gate = \"G1\"\n",
        )
        .unwrap();
        let mut sim = load_scenario(&dir).unwrap().into_simulation().unwrap();
        assert_eq!(sim.topology().gate_count(), 2);
        assert!(sim.step().is_some());
        cleanup(&dir);
    }

    #[test]
    fn scenario_runs() {
        let dir = make_test_dir("scenario_runs");
        fs::write(dir.join("manifest.json"), JSON_MANIFEST).unwrap();
        fs::write(dir.join("config.toml"), "seed = 11\nautostart = true\n").unwrap();
        let mut sim = load_scenario(&dir).unwrap().into_simulation().unwrap();
        assert_eq!(sim.seed(), 11);
        assert_eq!(sim.virtual_time(), 0);
        for _ in 0..5 {
            sim.step().unwrap();
        }
        assert_eq!(sim.virtual_time(), 5);
        cleanup(&dir);
    }
}
