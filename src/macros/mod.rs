//! Kitchen simulation macros
//!
//! Declarative macros that remove repetitive id and lookup boilerplate.

#[macro_use]
pub mod id_macros;
