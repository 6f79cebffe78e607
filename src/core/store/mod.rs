//! Typed repository contracts over the kitchen tables
//!
//! The scheduler never issues free-form queries. Each entity family exposes a
//! narrow trait with its CRUD operations plus the aggregate lookups the
//! scheduling components need, and [`KitchenRepository`] bundles them.

pub mod memory;

pub use memory::{KitchenStore, KitchenTables};

use crate::core::errors::Result;
use crate::core::model::{
    AssignmentConstraint, BottleneckRecord, CustomerOrder, MenuItem, OrderLine, QueuedTask, Section, Station,
    TaskDefinition,
};
use crate::core::types::{
    DelayCause, MenuItemId, OrderId, OrderLineId, QueueTaskId, SectionId, StationId, TaskDefinitionId, TaskStatus,
    Timestamp,
};
use chrono::NaiveDate;

/// Stations, sections and pinning constraints
pub trait CapacityRepository {
    fn station(&self, id: StationId) -> Option<&Station>;
    fn stations(&self) -> Vec<&Station>;
    fn section(&self, id: SectionId) -> Option<&Section>;
    fn section_mut(&mut self, id: SectionId) -> Option<&mut Section>;
    /// Sections of a station in section-id order
    fn sections_of(&self, station_id: StationId) -> Vec<&Section>;
    fn constraints_for(&self, menu_item_id: MenuItemId) -> Vec<&AssignmentConstraint>;
}

/// Menu items, recipes and recipe dependencies
pub trait MenuRepository {
    fn menu_item(&self, id: MenuItemId) -> Option<&MenuItem>;
    fn menu_items(&self) -> Vec<&MenuItem>;
    fn task_definition(&self, id: TaskDefinitionId) -> Option<&TaskDefinition>;
    /// Recipe steps of a menu item ordered by rank, then id
    fn recipe_of(&self, menu_item_id: MenuItemId) -> Vec<&TaskDefinition>;
    fn prerequisites_of(&self, task_definition_id: TaskDefinitionId) -> Vec<TaskDefinitionId>;
}

/// Customer orders and their lines
pub trait OrderRepository {
    fn next_order_id(&mut self) -> OrderId;
    fn insert_order(&mut self, order: CustomerOrder);
    fn order(&self, id: OrderId) -> Option<&CustomerOrder>;
    fn order_mut(&mut self, id: OrderId) -> Option<&mut CustomerOrder>;
    /// All orders in admission order
    fn orders(&self) -> Vec<&CustomerOrder>;
    /// Most recent order carrying the given number
    fn order_by_number(&self, order_number: &str) -> Option<&CustomerOrder>;
    /// Highest sequence number handed out on a simulated day, 0 if none
    fn last_sequence_on(&self, day: NaiveDate) -> u32;

    fn next_line_id(&mut self) -> OrderLineId;
    fn insert_line(&mut self, line: OrderLine);
    fn line(&self, id: OrderLineId) -> Option<&OrderLine>;
    fn lines_of(&self, order_id: OrderId) -> Vec<&OrderLine>;
}

/// Queued task instances and their status index
pub trait TaskRepository {
    fn next_task_id(&mut self) -> QueueTaskId;
    fn insert_task(&mut self, task: QueuedTask);
    fn task(&self, id: QueueTaskId) -> Option<&QueuedTask>;
    /// Ids of tasks currently in the given status, ascending
    fn tasks_with_status(&self, status: TaskStatus) -> Vec<QueueTaskId>;
    fn in_progress_on(&self, section_id: SectionId) -> usize;
    fn tasks_of_line(&self, line_id: OrderLineId) -> Vec<&QueuedTask>;
    fn tasks_of_order(&self, order_id: OrderId) -> Vec<&QueuedTask>;
    fn bind_task(&mut self, id: QueueTaskId, section_id: SectionId, at: Timestamp) -> Result<()>;
    /// Returns `false` if the task was already completed
    fn complete_task(&mut self, id: QueueTaskId, at: Timestamp) -> Result<bool>;
    fn set_delay_cause(&mut self, id: QueueTaskId, cause: Option<DelayCause>) -> Result<()>;
}

/// Append-only bottleneck observations
pub trait BottleneckRepository {
    fn append_bottleneck(&mut self, record: BottleneckRecord);
    fn bottlenecks(&self) -> &[BottleneckRecord];
}

/// Everything the scheduler needs from the store
pub trait KitchenRepository:
    CapacityRepository + MenuRepository + OrderRepository + TaskRepository + BottleneckRepository
{
}

impl<T> KitchenRepository for T where
    T: CapacityRepository + MenuRepository + OrderRepository + TaskRepository + BottleneckRepository
{
}
