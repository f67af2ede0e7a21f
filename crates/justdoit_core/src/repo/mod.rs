//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the storage contract used by the move coordinator.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`TaskNotFound`,
//!   `ColumnNotFound`) in addition to DB transport errors.

pub mod board_repo;
