//! Error handling for the kitchen scheduler
//!
//! A task that cannot find free capacity is not an error: it simply stays
//! queued. Only missing reference data, rejected baskets, broken invariants and
//! an unreachable store are reported through [`KitchenError`].

use thiserror::Error;

/// Result type for kitchen operations
pub type Result<T> = std::result::Result<T, KitchenError>;

/// Kind of entity named by a `NotFound` error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Station,
    Section,
    MenuItem,
    TaskDefinition,
    Order,
    OrderLine,
    QueuedTask,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Station => "station",
            EntityKind::Section => "section",
            EntityKind::MenuItem => "menu item",
            EntityKind::TaskDefinition => "task definition",
            EntityKind::Order => "order",
            EntityKind::OrderLine => "order line",
            EntityKind::QueuedTask => "queued task",
        };
        write!(f, "{}", name)
    }
}

/// Kitchen error type
#[derive(Error, Debug)]
pub enum KitchenError {
    /// Unknown id in a request or in reference data
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: i64 },

    /// Basket rejected before anything was written
    #[error("invalid basket: {0}")]
    InvalidBasket(String),

    /// An operation would break a scheduling invariant
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Reference data failed validation
    #[error("invalid kitchen layout: {0}")]
    InvalidLayout(String),

    /// The store could not be reached; nothing was changed
    #[error("kitchen store unavailable: {0}")]
    StoreUnavailable(String),

    /// Configuration values are out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration or layout document could not be parsed
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// Configuration or layout file could not be read
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl KitchenError {
    /// Build a `NotFound` error
    pub fn not_found(kind: EntityKind, id: i64) -> Self {
        KitchenError::NotFound { kind, id }
    }

    /// Build an `InvalidBasket` error
    pub fn invalid_basket<S: Into<String>>(msg: S) -> Self {
        KitchenError::InvalidBasket(msg.into())
    }

    /// Build an `InvariantViolation` error
    pub fn invariant<S: Into<String>>(msg: S) -> Self {
        KitchenError::InvariantViolation(msg.into())
    }

    /// Build an `InvalidLayout` error
    pub fn invalid_layout<S: Into<String>>(msg: S) -> Self {
        KitchenError::InvalidLayout(msg.into())
    }

    /// Build an `InvalidConfig` error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        KitchenError::InvalidConfig(msg.into())
    }

    /// Whether the error is a missing-entity error
    pub fn is_not_found(&self) -> bool {
        matches!(self, KitchenError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_entity() {
        let err = KitchenError::not_found(EntityKind::MenuItem, 42);
        assert_eq!(err.to_string(), "menu item 42 not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_invariant_message() {
        let err = KitchenError::invariant("section 1 is full");
        assert_eq!(err.to_string(), "invariant violation: section 1 is full");
        assert!(!err.is_not_found());
    }
}
