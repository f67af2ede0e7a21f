//! Order assignment engine.
//!
//! # Responsibility
//! - Map `(siblings, drop_index)` to a new order value.
//! - Produce the renormalization shift set when two neighbours leave no room.
//!
//! # Invariants
//! - `siblings` is ascending by order and never contains the moved task.
//! - `drop_index == 0` yields a new minimum, `drop_index == len` a new maximum.
//! - Midpoints use floor division so values stay integral and bounded.
//! - Shifted siblings keep their relative order.

use crate::config::OrderingConfig;
use crate::model::board::SiblingOrder;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type OrderResult<T> = Result<T, OrderError>;

/// Input validation errors of the ordering engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// `drop_index` is above the sibling count.
    DropIndexOutOfRange {
        drop_index: usize,
        sibling_count: usize,
    },
    /// `siblings[index]` sorts before `siblings[index - 1]`.
    UnsortedSiblings { index: usize },
    /// New order value does not fit in `i64`.
    OrderOverflow,
}

impl Display for OrderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DropIndexOutOfRange {
                drop_index,
                sibling_count,
            } => write!(
                f,
                "drop index {drop_index} is out of range for {sibling_count} sibling(s)"
            ),
            Self::UnsortedSiblings { index } => {
                write!(f, "sibling orders are not ascending at index {index}")
            }
            Self::OrderOverflow => write!(f, "order value overflow"),
        }
    }
}

impl Error for OrderError {}

/// Result of one order assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAssignment {
    /// Order value for the moved task.
    pub order: i64,
    /// Siblings whose order must change in the same write, with new values.
    /// Empty unless a renormalization push was needed.
    pub shifted: Vec<SiblingOrder>,
}

impl OrderAssignment {
    fn placed(order: i64) -> Self {
        Self {
            order,
            shifted: Vec::new(),
        }
    }

    /// Whether the assignment pushed any sibling.
    pub fn renormalized(&self) -> bool {
        !self.shifted.is_empty()
    }
}

/// Computes the order value for a task dropped at `drop_index`.
///
/// When the neighbours leave no room, siblings from `drop_index` on are
/// pushed by `increment` and the task takes `next.order`, or `prev + 1` if
/// the neighbours are tied (`[1000, 1000]` at index 1 gives `1001`).
///
/// # Errors
/// - `DropIndexOutOfRange` when `drop_index > siblings.len()`.
/// - `UnsortedSiblings` when `siblings` is not ascending by order.
/// - `OrderOverflow` when the result leaves the `i64` range.
pub fn assign_order(
    siblings: &[SiblingOrder],
    drop_index: usize,
    config: &OrderingConfig,
) -> OrderResult<OrderAssignment> {
    if drop_index > siblings.len() {
        return Err(OrderError::DropIndexOutOfRange {
            drop_index,
            sibling_count: siblings.len(),
        });
    }
    ensure_ascending(siblings)?;

    let increment = config.increment();
    let (Some(first), Some(last)) = (siblings.first(), siblings.last()) else {
        return Ok(OrderAssignment::placed(increment));
    };

    if drop_index == 0 {
        return first
            .order
            .checked_sub(increment)
            .map(OrderAssignment::placed)
            .ok_or(OrderError::OrderOverflow);
    }
    if drop_index == siblings.len() {
        return last
            .order
            .checked_add(increment)
            .map(OrderAssignment::placed)
            .ok_or(OrderError::OrderOverflow);
    }

    let prev = siblings[drop_index - 1].order;
    let next = siblings[drop_index].order;
    let gap = i128::from(next) - i128::from(prev);
    let midpoint = floor_midpoint(prev, next);
    if gap >= i128::from(config.min_gap()) && midpoint > prev {
        return Ok(OrderAssignment::placed(midpoint));
    }

    let shifted = siblings[drop_index..]
        .iter()
        .map(|sibling| {
            sibling
                .order
                .checked_add(increment)
                .map(|order| SiblingOrder::new(sibling.task_uuid, order))
                .ok_or(OrderError::OrderOverflow)
        })
        .collect::<OrderResult<Vec<_>>>()?;

    // An exact tie leaves `next` equal to `prev`; step past `prev` instead.
    let order = if next > prev {
        next
    } else {
        prev.checked_add(1).ok_or(OrderError::OrderOverflow)?
    };
    Ok(OrderAssignment { order, shifted })
}

/// Order value for a task appended at the end of a column.
pub fn append_order(siblings: &[SiblingOrder], config: &OrderingConfig) -> OrderResult<i64> {
    match siblings.iter().map(|sibling| sibling.order).max() {
        None => Ok(config.increment()),
        Some(max) => max
            .checked_add(config.increment())
            .ok_or(OrderError::OrderOverflow),
    }
}

/// Returns whether every adjacent pair is strictly increasing.
pub fn is_strictly_ascending(siblings: &[SiblingOrder]) -> bool {
    siblings
        .windows(2)
        .all(|pair| pair[0].order < pair[1].order)
}

fn ensure_ascending(siblings: &[SiblingOrder]) -> OrderResult<()> {
    match siblings
        .windows(2)
        .position(|pair| pair[0].order > pair[1].order)
    {
        Some(position) => Err(OrderError::UnsortedSiblings {
            index: position + 1,
        }),
        None => Ok(()),
    }
}

fn floor_midpoint(prev: i64, next: i64) -> i64 {
    // Both inputs are i64, so the floored mean is always back in range.
    (i128::from(prev) + i128::from(next)).div_euclid(2) as i64
}
