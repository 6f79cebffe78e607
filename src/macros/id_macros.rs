//! Identifier macros for kitchen entities
//!
//! Every table in the kitchen store is keyed by its own integer id type so that
//! a section id can never be passed where a station id is expected.

/// Macro for declaring a typed entity identifier
///
/// This macro removes the boilerplate around integer newtypes:
/// ```ignore
/// // Instead of hand-writing the struct, Display and From impls:
/// entity_id!(
///     /// Identifier of a station
///     StationId
/// );
/// ```
#[macro_export]
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Get the raw integer value
            pub fn value(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

/// Macro for looking up a row or failing with `KitchenError::NotFound`
///
/// ```ignore
/// // Instead of:
/// let item = repo.menu_item(id).ok_or(KitchenError::not_found(EntityKind::MenuItem, id))?;
///
/// // Use:
/// let item = require!(repo.menu_item(id), MenuItem, id);
/// ```
#[macro_export]
macro_rules! require {
    ($lookup:expr, $kind:ident, $id:expr) => {
        $lookup.ok_or_else(|| {
            $crate::core::errors::KitchenError::not_found(
                $crate::core::errors::EntityKind::$kind,
                $id.value(),
            )
        })?
    };
}
