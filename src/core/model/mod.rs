//! Typed records for every table of the kitchen store

pub mod menu;
pub mod order;
pub mod station;

// Re-export commonly used types
pub use menu::{AssignmentConstraint, MenuItem, TaskDefinition, TaskDependency};
pub use order::{BottleneckRecord, CustomerOrder, OrderLine, QueuedTask, TaskState};
pub use station::{Section, SectionState, Station};
