//! Board domain model.
//!
//! # Responsibility
//! - Define column/task records used by core business logic.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - A task's own `column_uuid` is the source of truth for membership.

pub mod board;
