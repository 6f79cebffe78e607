pub mod assignment;
pub mod capacity;
pub mod clock;
pub mod clock_loop;
pub mod completion;
pub mod config;
pub mod errors;
pub mod estimation;
pub mod intake;
pub mod kitchen;
pub mod layout;
pub mod model;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;
