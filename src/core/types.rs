use serde::{Deserialize, Serialize};

/// Simulated wall-clock instant. All scheduling timestamps come from the
/// synthetic clock, never from the host clock.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

entity_id!(
    /// Identifier of a physical station (fryer, assembly table, ...)
    StationId
);
entity_id!(
    /// Identifier of a capacity-bounded section of a station
    SectionId
);
entity_id!(
    /// Identifier of a menu item
    MenuItemId
);
entity_id!(
    /// Identifier of one recipe step of a menu item
    TaskDefinitionId
);
entity_id!(
    /// Identifier of a section/menu item pinning rule
    ConstraintId
);
entity_id!(
    /// Identifier of a customer order
    OrderId
);
entity_id!(
    /// Identifier of one physical unit within an order
    OrderLineId
);
entity_id!(
    /// Identifier of one schedulable task instance
    QueueTaskId
);

/// Lifecycle status of a queued task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Waiting for an eligible section
    Queued,
    /// Bound to a section, running on the synthetic clock
    InProgress,
    /// Finished; terminal
    Completed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Queued => write!(f, "QUEUED"),
            TaskStatus::InProgress => write!(f, "IN_PROGRESS"),
            TaskStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// Derived status of a customer order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Admitted, no task bound yet
    Confirmed,
    /// At least one task has been bound to a section
    Preparing,
    /// Every task is completed and the actual duration is recorded
    Completed,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Confirmed => write!(f, "CONFIRMED"),
            OrderStatus::Preparing => write!(f, "PREPARING"),
            OrderStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// Reason a task stayed queued on an assignment pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DelayCause {
    /// A prerequisite task of the same order line is not completed
    DependencyWait,
    /// The item is pinned to a section that is at capacity
    PinnedSectionBusy,
    /// Every candidate section of the station is at capacity
    StationSaturated,
}

impl std::fmt::Display for DelayCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DelayCause::DependencyWait => write!(f, "DEPENDENCY_WAIT"),
            DelayCause::PinnedSectionBusy => write!(f, "PINNED_SECTION_BUSY"),
            DelayCause::StationSaturated => write!(f, "STATION_SATURATED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_order_by_value() {
        let mut ids = vec![QueueTaskId(3), QueueTaskId(1), QueueTaskId(2)];
        ids.sort();
        assert_eq!(ids, vec![QueueTaskId(1), QueueTaskId(2), QueueTaskId(3)]);
        assert_eq!(SectionId::from(7).value(), 7);
    }

    entity_id!(
        /// Identifier declared inside a nested module
        TrayId
    );

    fn find_tray(id: TrayId) -> crate::core::errors::Result<TrayId> {
        let trays = [TrayId(1), TrayId(2)];
        Ok(*require!(trays.iter().find(|t| **t == id), Section, id))
    }

    #[test]
    fn test_id_macros_resolve_in_core_modules() {
        assert_eq!(TrayId(5).to_string(), "5");
        assert_eq!(find_tray(TrayId(2)).unwrap(), TrayId(2));
        let err = find_tray(TrayId(9)).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "section 9 not found");
    }

    #[test]
    fn test_status_display_matches_store_labels() {
        assert_eq!(TaskStatus::InProgress.to_string(), "IN_PROGRESS");
        assert_eq!(OrderStatus::Confirmed.to_string(), "CONFIRMED");
        assert_eq!(DelayCause::StationSaturated.to_string(), "STATION_SATURATED");
    }

    #[test]
    fn test_status_serializes_as_label() {
        let json = serde_json::to_string(&TaskStatus::Queued).unwrap();
        assert_eq!(json, "\"QUEUED\"");
        let id: StationId = serde_json::from_str("4").unwrap();
        assert_eq!(id, StationId(4));
    }
}
