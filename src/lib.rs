//! Tavolata Library
//!
//! Core of a family dinner planner: a durable SQLite store for dinners,
//! family members and conversation topics, live-query feeds over the tables,
//! and an async planner that turns user intents into background writes.
//! The binary in `main.rs` wires these together behind a small REPL; any
//! other presentation layer can do the same through this crate.

pub mod config;
pub mod dinner_store;
pub mod planner;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use dinner_store::{Dinner, DinnerStore, FamilyMember, SqliteDinnerStore, Topic};
pub use planner::DinnerPlanner;
