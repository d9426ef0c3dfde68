//! Read-only views for consumers.
//!
//! Snapshots are owned copies with gate and phase ids resolved to strings, so
//! a consumer never needs the topology to display a region.

use crate::id::RegionId;
use crate::region::{IssueDetails, Region, RegionState};
use crate::sim::VirtualTime;
use crate::topology::{RelativePosition, Topology};

/// Owned, serializable view of one region.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionSnapshot {
    pub id: RegionId,
    /// Manifest identifier.
    pub key: String,
    pub country_code: String,
    pub name: String,
    #[serde(rename = "currentPhaseId")]
    pub phase_id: String,
    #[serde(rename = "currentGpcId")]
    pub gate_id: String,
    pub progress: u8,
    pub state: RegionState,
    #[serde(rename = "issueDetails", skip_serializing_if = "Option::is_none")]
    pub issue: Option<IssueDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_drop_time: Option<VirtualTime>,
}

impl RegionSnapshot {
    /// Resolve a region against the topology. An unknown gate resolves to
    /// empty ids.
    pub fn capture(region: &Region, topology: &Topology) -> Self {
        let gate = topology.gate(region.gate());
        Self {
            id: region.id,
            key: region.key.clone(),
            country_code: region.country_code.clone(),
            name: region.name.clone(),
            phase_id: gate.map(|g| g.phase_id.clone()).unwrap_or_default(),
            gate_id: gate.map(|g| g.id.clone()).unwrap_or_default(),
            progress: region.progress(),
            state: region.state(),
            issue: region.issue().cloned(),
            schedule_drop_time: region.health().schedule_drop_time(),
        }
    }
}

/// One gate of a region's lane.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneCell {
    pub gate_id: String,
    pub position: RelativePosition,
    /// Past gates show as passed, future gates as idle, and the active gate
    /// shows the region's own state.
    pub display_state: RegionState,
}

/// Every gate in canonical order, classified against the region's position.
pub fn lane(region: &Region, topology: &Topology) -> Vec<LaneCell> {
    let current = region.gate();
    topology
        .gates()
        .iter()
        .enumerate()
        .map(|(i, gate)| {
            let position = RelativePosition::between(i, current.index());
            let display_state = match position {
                RelativePosition::Past => RegionState::Passed,
                RelativePosition::Active => region.state(),
                RelativePosition::Future => RegionState::Idle,
            };
            LaneCell {
                gate_id: gate.id.clone(),
                position,
                display_state,
            }
        })
        .collect()
}

/// Each phase id with its position relative to the region's current phase.
pub fn phase_positions(region: &Region, topology: &Topology) -> Vec<(String, RelativePosition)> {
    let Some(current) = topology.phase_of(region.gate()) else {
        return Vec::new();
    };
    topology
        .phases()
        .iter()
        .enumerate()
        .map(|(i, phase)| {
            (
                phase.id.clone(),
                RelativePosition::between(i, current.index()),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Health;

    #[test]
    fn snapshot_resolves_ids() {
        let t = Topology::payroll_controls();
        let r = Region::new(RegionId(2), "r-fr", "FR", "France", Health::Processing)
            .at(t.gate_index("GPC5").unwrap(), 35);
        let snap = RegionSnapshot::capture(&r, &t);
        assert_eq!(snap.gate_id, "GPC5");
        assert_eq!(snap.phase_id, "PHASE2");
        assert_eq!(snap.progress, 35);
        assert_eq!(snap.state, RegionState::Processing);
        assert!(snap.issue.is_none());
    }

    #[test]
    fn snapshot_json_uses_wire_names() {
        let t = Topology::payroll_controls();
        let r = Region::new(RegionId(0), "r-jp", "JP", "Japan", Health::Scheduled { drop_time: 7 });
        let json = serde_json::to_string(&RegionSnapshot::capture(&r, &t)).unwrap();
        assert!(json.contains("\"currentGpcId\":\"PRE\""));
        assert!(json.contains("\"currentPhaseId\":\"PHASE0\""));
        assert!(json.contains("\"scheduleDropTime\":7"));
        assert!(!json.contains("issueDetails"));
    }

    #[test]
    fn lane_classifies_gates() {
        let t = Topology::payroll_controls();
        let active = t.gate_index("GPC2").unwrap();
        let r = Region::new(RegionId(0), "r", "DE", "Germany", Health::Idle).at(active, 0);
        let cells = lane(&r, &t);
        assert_eq!(cells.len(), t.gate_count());
        assert_eq!(cells[0].display_state, RegionState::Passed);
        assert_eq!(cells[active.index()].position, RelativePosition::Active);
        assert_eq!(cells[active.index()].display_state, RegionState::Idle);
        assert_eq!(cells[active.index() + 1].position, RelativePosition::Future);
    }

    #[test]
    fn phase_positions_follow_current_phase() {
        let t = Topology::payroll_controls();
        let r = Region::new(RegionId(0), "r", "DE", "Germany", Health::Processing)
            .at(t.gate_index("GPC8").unwrap(), 0);
        let positions = phase_positions(&r, &t);
        assert_eq!(
            positions.iter().map(|(_, p)| *p).collect::<Vec<_>>(),
            [
                RelativePosition::Past,
                RelativePosition::Past,
                RelativePosition::Active,
                RelativePosition::Future
            ]
        );
    }
}
