//! Fractional-order assignment for drag-and-drop task movement.
//!
//! # Responsibility
//! - Compute the order value of a dropped task from its destination siblings.
//! - Report the sibling shifts needed when numeric room is exhausted.
//!
//! # Invariants
//! - Pure computation: no storage access, no hidden state.
//! - Never produces an order equal to a neighbour for strictly ascending input.

pub mod engine;

pub use engine::{
    append_order, assign_order, is_strictly_ascending, OrderAssignment, OrderError, OrderResult,
};
