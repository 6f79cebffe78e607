use crate::core::errors::{KitchenError, Result};
use crate::core::types::{
    DelayCause, MenuItemId, OrderId, OrderLineId, OrderStatus, QueueTaskId, SectionId, StationId,
    TaskDefinitionId, TaskStatus, Timestamp,
};
use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

/// A customer order, created atomically at admission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerOrder {
    pub id: OrderId,
    /// Human-readable number, `ORD-###`, unique per simulated day
    pub order_number: String,
    /// Simulated calendar day the sequence number belongs to
    pub business_day: NaiveDate,
    pub sequence: u32,
    pub status: OrderStatus,
    pub admitted_at: Timestamp,
    /// Admission-time estimate of the total wait
    pub estimated_total_seconds: i64,
    /// Set exactly once, when every task of the order is completed
    pub actual_total_seconds: Option<i64>,
}

impl CustomerOrder {
    pub fn is_closed(&self) -> bool {
        self.actual_total_seconds.is_some()
    }
}

/// One physical unit of one menu item within an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub menu_item_id: MenuItemId,
}

/// Lifecycle of a queued task
///
/// A section is carried only by the bound states, so a task cannot hold a
/// section while queued or be running without one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskState {
    Queued,
    InProgress {
        section_id: SectionId,
        started_at: Timestamp,
    },
    Completed {
        section_id: SectionId,
        started_at: Timestamp,
        completed_at: Timestamp,
    },
}

/// One instantiation of a recipe step for one order line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuedTask {
    pub id: QueueTaskId,
    pub order_line_id: OrderLineId,
    pub task_definition_id: TaskDefinitionId,
    pub state: TaskState,
    /// Reason the task stayed queued on the most recent pass
    pub delay_cause: Option<DelayCause>,
}

impl QueuedTask {
    pub fn new(id: QueueTaskId, order_line_id: OrderLineId, task_definition_id: TaskDefinitionId) -> Self {
        Self {
            id,
            order_line_id,
            task_definition_id,
            state: TaskState::Queued,
            delay_cause: None,
        }
    }

    pub fn status(&self) -> TaskStatus {
        match self.state {
            TaskState::Queued => TaskStatus::Queued,
            TaskState::InProgress { .. } => TaskStatus::InProgress,
            TaskState::Completed { .. } => TaskStatus::Completed,
        }
    }

    pub fn assigned_section(&self) -> Option<SectionId> {
        match self.state {
            TaskState::Queued => None,
            TaskState::InProgress { section_id, .. } | TaskState::Completed { section_id, .. } => Some(section_id),
        }
    }

    pub fn started_at(&self) -> Option<Timestamp> {
        match self.state {
            TaskState::Queued => None,
            TaskState::InProgress { started_at, .. } | TaskState::Completed { started_at, .. } => Some(started_at),
        }
    }

    pub fn completed_at(&self) -> Option<Timestamp> {
        match self.state {
            TaskState::Completed { completed_at, .. } => Some(completed_at),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.state, TaskState::Completed { .. })
    }

    /// Move a queued task onto a section
    pub fn bind(&mut self, section_id: SectionId, at: Timestamp) -> Result<()> {
        match self.state {
            TaskState::Queued => {
                self.state = TaskState::InProgress {
                    section_id,
                    started_at: at,
                };
                Ok(())
            }
            _ => Err(KitchenError::invariant(format!(
                "task {} is already bound to section {}",
                self.id,
                self.assigned_section().map(|s| s.value()).unwrap_or_default()
            ))),
        }
    }

    /// Finish an in-progress task
    ///
    /// Returns `false` when the task was already completed.
    pub fn complete(&mut self, at: Timestamp) -> Result<bool> {
        match self.state {
            TaskState::InProgress {
                section_id,
                started_at,
            } => {
                self.state = TaskState::Completed {
                    section_id,
                    started_at,
                    completed_at: at,
                };
                Ok(true)
            }
            TaskState::Completed { .. } => Ok(false),
            TaskState::Queued => Err(KitchenError::invariant(format!(
                "task {} was never started",
                self.id
            ))),
        }
    }
}

/// Append-only diagnostic note of why a task started late
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BottleneckRecord {
    pub id: Uuid,
    pub queue_task_id: QueueTaskId,
    pub cause: DelayCause,
    /// Seconds between order admission and the task's start
    pub wait_seconds: i64,
    pub station_id: StationId,
    pub recorded_at: Timestamp,
}
