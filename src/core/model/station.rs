use crate::core::types::{SectionId, StationId, Timestamp};
use serde::{Deserialize, Serialize};

/// A physical kitchen resource category, e.g. the fryer bank
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub id: StationId,
    pub name: String,
}

impl Station {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id: StationId(id),
            name: name.to_string(),
        }
    }
}

/// Informational runtime state of a section
///
/// Capacity is enforced by counting in-progress tasks, never by this record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionState {
    /// Name of the menu item the section most recently started working on
    pub current_item: Option<String>,
    /// Number of tasks currently in progress on the section
    pub current_quantity: u32,
    /// Latest expected finish among the section's in-progress tasks
    pub busy_until: Option<Timestamp>,
}

impl SectionState {
    pub fn clear(&mut self) {
        *self = SectionState::default();
    }
}

/// Capacity-bounded sub-unit of a station
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub station_id: StationId,
    /// Position of the section within its station, starting at 1
    pub section_number: u32,
    pub description: String,
    /// Maximum number of tasks this section runs at the same time
    pub max_concurrent_tasks: u32,
    #[serde(default)]
    pub state: SectionState,
}

impl Section {
    pub fn new(id: i64, station_id: i64, section_number: u32, max_concurrent_tasks: u32, description: &str) -> Self {
        Self {
            id: SectionId(id),
            station_id: StationId(station_id),
            section_number,
            description: description.to_string(),
            max_concurrent_tasks,
            state: SectionState::default(),
        }
    }
}
