//! Caller-facing board views.
//!
//! # Responsibility
//! - Model the optimistic apply / confirm / rollback contract of move callers.

pub mod local_board;
