use crate::core::types::{ConstraintId, MenuItemId, SectionId, StationId, TaskDefinitionId};
use serde::{Deserialize, Serialize};

/// A sellable menu item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: MenuItemId,
    pub name: String,
    /// Unit price in the smallest currency unit
    pub price: i64,
}

impl MenuItem {
    pub fn new(id: i64, name: &str, price: i64) -> Self {
        Self {
            id: MenuItemId(id),
            name: name.to_string(),
            price,
        }
    }
}

/// One step of a menu item's recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub id: TaskDefinitionId,
    pub menu_item_id: MenuItemId,
    pub task_name: String,
    /// Ordering rank within the recipe, lower runs first
    pub rank: u32,
    pub base_duration_seconds: i64,
    pub station_id: StationId,
    /// Section tried first when no constraint pins the item
    #[serde(default)]
    pub preferred_section_id: Option<SectionId>,
}

impl TaskDefinition {
    pub fn new(id: i64, menu_item_id: i64, task_name: &str, rank: u32, base_duration_seconds: i64, station_id: i64) -> Self {
        Self {
            id: TaskDefinitionId(id),
            menu_item_id: MenuItemId(menu_item_id),
            task_name: task_name.to_string(),
            rank,
            base_duration_seconds,
            station_id: StationId(station_id),
            preferred_section_id: None,
        }
    }

    /// Set the preferred section
    pub fn with_preferred_section(mut self, section_id: i64) -> Self {
        self.preferred_section_id = Some(SectionId(section_id));
        self
    }
}

/// Edge `task -> prerequisite` within one recipe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDependency {
    pub task_definition_id: TaskDefinitionId,
    pub prerequisite_id: TaskDefinitionId,
}

impl TaskDependency {
    pub fn new(task_definition_id: i64, prerequisite_id: i64) -> Self {
        Self {
            task_definition_id: TaskDefinitionId(task_definition_id),
            prerequisite_id: TaskDefinitionId(prerequisite_id),
        }
    }
}

/// Pins a menu item to one section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentConstraint {
    pub id: ConstraintId,
    pub section_id: SectionId,
    pub menu_item_id: MenuItemId,
    /// Higher value wins when several constraints match the same item
    pub priority: i32,
    #[serde(default)]
    pub description: String,
}

impl AssignmentConstraint {
    pub fn new(id: i64, section_id: i64, menu_item_id: i64, priority: i32) -> Self {
        Self {
            id: ConstraintId(id),
            section_id: SectionId(section_id),
            menu_item_id: MenuItemId(menu_item_id),
            priority,
            description: String::new(),
        }
    }
}
