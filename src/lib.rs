#[macro_use]
pub mod macros;
pub mod core;

// Re-export commonly used types
pub use crate::core::assignment::{AssignmentEngine, PassReport};
pub use crate::core::clock::{Clock, SyntheticClock};
pub use crate::core::clock_loop::{ClockLoop, ClockLoopHandle};
pub use crate::core::config::{ClockConfig, DependencyMode, KitchenConfig, PinScope};
pub use crate::core::errors::{EntityKind, KitchenError, Result};
pub use crate::core::intake::{AdmissionReceipt, BasketLine};
pub use crate::core::kitchen::{Kitchen, TickReport};
pub use crate::core::layout::KitchenLayout;
pub use crate::core::store::KitchenStore;
pub use crate::core::types::*;
