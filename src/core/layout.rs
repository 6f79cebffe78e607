//! Kitchen reference data
//!
//! [`KitchenLayout`] is the typed description of stations, sections, menu items,
//! recipes, recipe dependencies and pinning constraints that a kitchen store is
//! created from. It is immutable once loaded into a store.

use crate::core::errors::{KitchenError, Result};
use crate::core::model::{AssignmentConstraint, MenuItem, Section, Station, TaskDefinition, TaskDependency};
use crate::core::types::{MenuItemId, TaskDefinitionId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Longest step duration a layout may declare
pub const MAX_TASK_SECONDS: i64 = 86_400;

/// Reference data for one kitchen
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KitchenLayout {
    pub stations: Vec<Station>,
    pub sections: Vec<Section>,
    pub menu_items: Vec<MenuItem>,
    pub task_definitions: Vec<TaskDefinition>,
    #[serde(default)]
    pub dependencies: Vec<TaskDependency>,
    #[serde(default)]
    pub constraints: Vec<AssignmentConstraint>,
}

impl KitchenLayout {
    /// Create an empty layout
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a layout from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_station(mut self, station: Station) -> Self {
        self.stations.push(station);
        self
    }

    pub fn with_section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }

    pub fn with_menu_item(mut self, item: MenuItem) -> Self {
        self.menu_items.push(item);
        self
    }

    pub fn with_task(mut self, task: TaskDefinition) -> Self {
        self.task_definitions.push(task);
        self
    }

    pub fn with_dependency(mut self, dependency: TaskDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_constraint(mut self, constraint: AssignmentConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// The reference two-station burger kitchen
    ///
    /// Fryer: two sections of capacity 1. Assembly: three sections of capacity 2.
    /// The thigh burger is pinned to fryer #1.
    pub fn momstouch() -> Self {
        KitchenLayout::new()
            .with_station(Station::new(1, "Fryer"))
            .with_station(Station::new(2, "Assembly"))
            .with_section(Section::new(1, 1, 1, 1, "Fryer #1"))
            .with_section(Section::new(2, 1, 2, 1, "Fryer #2"))
            .with_section(Section::new(3, 2, 1, 2, "Assembly #1"))
            .with_section(Section::new(4, 2, 2, 2, "Assembly #2"))
            .with_section(Section::new(5, 2, 3, 2, "Assembly #3"))
            .with_menu_item(MenuItem::new(1, "Thigh Burger", 6000))
            .with_menu_item(MenuItem::new(2, "Thigh Burger Set", 8500))
            .with_menu_item(MenuItem::new(3, "Chicken Tenders", 4500))
            .with_task(TaskDefinition::new(1, 1, "Fry patty", 1, 300, 1))
            .with_task(TaskDefinition::new(2, 1, "Assemble", 2, 60, 2))
            .with_task(TaskDefinition::new(3, 2, "Fry patty", 1, 300, 1).with_preferred_section(1))
            .with_task(TaskDefinition::new(4, 2, "Fry potatoes", 2, 180, 1).with_preferred_section(2))
            .with_task(TaskDefinition::new(5, 2, "Pour drink", 3, 30, 2).with_preferred_section(3))
            .with_task(TaskDefinition::new(6, 2, "Assemble", 4, 90, 2).with_preferred_section(4))
            .with_task(TaskDefinition::new(7, 3, "Fry tenders", 1, 240, 1))
            .with_task(TaskDefinition::new(8, 3, "Pack", 2, 30, 2))
            .with_dependency(TaskDependency::new(2, 1))
            .with_dependency(TaskDependency::new(6, 3))
            .with_dependency(TaskDependency::new(6, 4))
            .with_dependency(TaskDependency::new(8, 7))
            .with_constraint(AssignmentConstraint {
                description: "Fryer #1 only".to_string(),
                ..AssignmentConstraint::new(1, 1, 1, 1)
            })
    }

    /// Check referential integrity and recipe acyclicity
    pub fn validate(&self) -> Result<()> {
        let station_ids = unique_ids(self.stations.iter().map(|s| s.id.value()), "station")?;
        let section_ids = unique_ids(self.sections.iter().map(|s| s.id.value()), "section")?;
        let item_ids = unique_ids(self.menu_items.iter().map(|m| m.id.value()), "menu item")?;
        unique_ids(self.task_definitions.iter().map(|t| t.id.value()), "task definition")?;
        unique_ids(self.constraints.iter().map(|c| c.id.value()), "constraint")?;

        for section in &self.sections {
            if !station_ids.contains(&section.station_id.value()) {
                return Err(KitchenError::invalid_layout(format!(
                    "section {} belongs to unknown station {}",
                    section.id, section.station_id
                )));
            }
            if section.max_concurrent_tasks == 0 {
                return Err(KitchenError::invalid_layout(format!(
                    "section {} has no capacity",
                    section.id
                )));
            }
        }

        for station in &self.stations {
            if !self.sections.iter().any(|s| s.station_id == station.id) {
                return Err(KitchenError::invalid_layout(format!(
                    "station {} has no sections",
                    station.id
                )));
            }
        }

        let section_station: HashMap<_, _> = self.sections.iter().map(|s| (s.id, s.station_id)).collect();
        for task in &self.task_definitions {
            if !item_ids.contains(&task.menu_item_id.value()) {
                return Err(KitchenError::invalid_layout(format!(
                    "task definition {} belongs to unknown menu item {}",
                    task.id, task.menu_item_id
                )));
            }
            if !station_ids.contains(&task.station_id.value()) {
                return Err(KitchenError::invalid_layout(format!(
                    "task definition {} targets unknown station {}",
                    task.id, task.station_id
                )));
            }
            if task.base_duration_seconds < 0 {
                return Err(KitchenError::invalid_layout(format!(
                    "task definition {} has a negative duration",
                    task.id
                )));
            }
            if task.base_duration_seconds > MAX_TASK_SECONDS {
                return Err(KitchenError::invalid_layout(format!(
                    "task definition {} runs longer than a day",
                    task.id
                )));
            }
            if let Some(preferred) = task.preferred_section_id {
                if section_station.get(&preferred) != Some(&task.station_id) {
                    return Err(KitchenError::invalid_layout(format!(
                        "task definition {} prefers section {} outside station {}",
                        task.id, preferred, task.station_id
                    )));
                }
            }
        }

        let owner: HashMap<TaskDefinitionId, MenuItemId> =
            self.task_definitions.iter().map(|t| (t.id, t.menu_item_id)).collect();
        for dep in &self.dependencies {
            let (Some(task_item), Some(prereq_item)) = (owner.get(&dep.task_definition_id), owner.get(&dep.prerequisite_id)) else {
                return Err(KitchenError::invalid_layout(format!(
                    "dependency {} -> {} references an unknown task definition",
                    dep.task_definition_id, dep.prerequisite_id
                )));
            };
            if task_item != prereq_item {
                return Err(KitchenError::invalid_layout(format!(
                    "dependency {} -> {} crosses menu items",
                    dep.task_definition_id, dep.prerequisite_id
                )));
            }
        }
        self.check_acyclic()?;

        let mut pairs = HashSet::new();
        for constraint in &self.constraints {
            if !section_ids.contains(&constraint.section_id.value()) {
                return Err(KitchenError::invalid_layout(format!(
                    "constraint {} references unknown section {}",
                    constraint.id, constraint.section_id
                )));
            }
            if !item_ids.contains(&constraint.menu_item_id.value()) {
                return Err(KitchenError::invalid_layout(format!(
                    "constraint {} references unknown menu item {}",
                    constraint.id, constraint.menu_item_id
                )));
            }
            if !pairs.insert((constraint.section_id, constraint.menu_item_id)) {
                return Err(KitchenError::invalid_layout(format!(
                    "duplicate constraint for section {} and menu item {}",
                    constraint.section_id, constraint.menu_item_id
                )));
            }
        }

        Ok(())
    }

    /// Kahn's algorithm over the dependency graph; edges run prerequisite -> task
    fn check_acyclic(&self) -> Result<()> {
        let mut adj_list: HashMap<TaskDefinitionId, Vec<TaskDefinitionId>> = HashMap::new();
        let mut in_degree: HashMap<TaskDefinitionId, usize> = HashMap::new();

        for task in &self.task_definitions {
            adj_list.insert(task.id, Vec::new());
            in_degree.insert(task.id, 0);
        }

        for dep in &self.dependencies {
            if let Some(targets) = adj_list.get_mut(&dep.prerequisite_id) {
                targets.push(dep.task_definition_id);
            }
            if let Some(degree) = in_degree.get_mut(&dep.task_definition_id) {
                *degree += 1;
            }
        }

        let mut ready: Vec<TaskDefinitionId> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut processed = 0;

        while let Some(id) = ready.pop() {
            processed += 1;
            if let Some(targets) = adj_list.get(&id) {
                for target in targets {
                    if let Some(degree) = in_degree.get_mut(target) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.push(*target);
                        }
                    }
                }
            }
        }

        if processed < in_degree.len() {
            let mut stuck: Vec<i64> = in_degree
                .iter()
                .filter(|(_, &degree)| degree > 0)
                .map(|(id, _)| id.value())
                .collect();
            stuck.sort();
            return Err(KitchenError::invalid_layout(format!(
                "recipe dependency cycle among task definitions {:?}",
                stuck
            )));
        }

        Ok(())
    }
}

fn unique_ids(ids: impl Iterator<Item = i64>, kind: &str) -> Result<HashSet<i64>> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(KitchenError::invalid_layout(format!("duplicate {} id {}", kind, id)));
        }
    }
    Ok(seen)
}
