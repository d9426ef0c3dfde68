//! Startup manifest records.
//!
//! A manifest is a list of region records. The record types are plain serde
//! structs so any format can carry them; JSON parsing is provided here behind
//! the `data-loader` feature and `gatesim-data` adds RON and TOML.

use crate::region::{Health, IssueDetails, RegionState};
use crate::sim::VirtualTime;
use crate::store::RegionSeed;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// A manifest that cannot be turned into region seeds.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[cfg(feature = "data-loader")]
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("region {id}: schedule drop time {value:?} is not a number")]
    InvalidDropTime { id: String, value: String },
    #[error("region {id}: SCHEDULED regions need a scheduleDropTime")]
    MissingDropTime { id: String },
    #[error("region {id}: state {state} needs issueDetails")]
    MissingIssueDetails { id: String, state: RegionState },
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A drop time given either as a number or as numeric text.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum DropTimeValue {
    Hours(i64),
    Fractional(f64),
    Text(String),
}

impl DropTimeValue {
    /// Whole virtual hours. Fractions are truncated toward zero.
    pub fn hours(&self) -> Option<VirtualTime> {
        match self {
            DropTimeValue::Hours(h) => Some(*h),
            DropTimeValue::Fractional(f) => truncate(*f),
            DropTimeValue::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(truncate))
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            DropTimeValue::Hours(h) => h.to_string(),
            DropTimeValue::Fractional(f) => f.to_string(),
            DropTimeValue::Text(s) => s.clone(),
        }
    }
}

fn truncate(value: f64) -> Option<VirtualTime> {
    value.is_finite().then(|| value.trunc() as VirtualTime)
}

/// One region as it appears in a manifest file.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestRecord {
    pub id: String,
    pub country_code: String,
    pub name: String,
    #[serde(default)]
    pub schedule_drop_time: Option<DropTimeValue>,
    /// Initial state. Defaults to `SCHEDULED`.
    #[serde(default)]
    pub state: Option<RegionState>,
    #[serde(default)]
    pub issue_details: Option<IssueDetails>,
}

impl ManifestRecord {
    /// Convert into a store seed, checking the state has what it needs.
    pub fn into_seed(self) -> Result<RegionSeed, ManifestError> {
        let state = self.state.unwrap_or(RegionState::Scheduled);
        let id = self.id;
        let need_issue = |issue: Option<IssueDetails>, id: &str| {
            issue.ok_or_else(|| ManifestError::MissingIssueDetails {
                id: id.to_string(),
                state,
            })
        };
        let health = match state {
            RegionState::Scheduled => {
                let value = self
                    .schedule_drop_time
                    .ok_or_else(|| ManifestError::MissingDropTime { id: id.clone() })?;
                let drop_time = value.hours().ok_or_else(|| ManifestError::InvalidDropTime {
                    id: id.clone(),
                    value: value.describe(),
                })?;
                Health::Scheduled { drop_time }
            }
            RegionState::Late => Health::Late(need_issue(self.issue_details, &id)?),
            RegionState::AutoHealing => Health::AutoHealing(need_issue(self.issue_details, &id)?),
            RegionState::Error => Health::Error(need_issue(self.issue_details, &id)?),
            RegionState::Idle => Health::Idle,
            RegionState::Processing => Health::Processing,
            RegionState::Passed => Health::Passed,
        };
        Ok(RegionSeed {
            key: id,
            country_code: self.country_code,
            name: self.name,
            health,
        })
    }
}

/// Convert every record, failing on the first bad one.
pub fn seeds_from_records(
    records: impl IntoIterator<Item = ManifestRecord>,
) -> Result<Vec<RegionSeed>, ManifestError> {
    records.into_iter().map(ManifestRecord::into_seed).collect()
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// Parse a JSON array of manifest records.
#[cfg(feature = "data-loader")]
pub fn parse_manifest_json(json: &str) -> Result<Vec<RegionSeed>, ManifestError> {
    let records: Vec<ManifestRecord> = serde_json::from_str(json)?;
    seeds_from_records(records)
}

#[cfg(feature = "data-loader")]
pub fn parse_manifest_json_bytes(bytes: &[u8]) -> Result<Vec<RegionSeed>, ManifestError> {
    let records: Vec<ManifestRecord> = serde_json::from_slice(bytes)?;
    seeds_from_records(records)
}
