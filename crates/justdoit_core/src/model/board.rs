//! Board domain model.
//!
//! # Responsibility
//! - Define the column/task records shared by repository, services and views.
//! - Keep ordering-relevant fields (`column_uuid`, `sort_order`) explicit and
//!   everything else as opaque payload.
//!
//! # Invariants
//! - A task belongs to exactly one column at a time (`column_uuid`).
//! - `sort_order` is only meaningful relative to tasks in the same column.
//! - Visual order inside a column is `sort_order ASC, task_uuid ASC`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable task identifier.
pub type TaskId = Uuid;

/// Stable column identifier.
pub type ColumnId = Uuid;

/// Owning project identifier. Opaque to this crate.
pub type ProjectId = Uuid;

/// One board column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub column_uuid: ColumnId,
    pub project_uuid: ProjectId,
    pub name: String,
    /// Column position within its project.
    pub sort_order: i64,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

/// One task card.
///
/// Only `column_uuid` and `sort_order` take part in ordering; the remaining
/// fields are carried for callers that re-render the card after a move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub task_uuid: TaskId,
    pub project_uuid: ProjectId,
    /// Owning column. Source of truth for membership.
    pub column_uuid: ColumnId,
    pub name: String,
    pub description: Option<String>,
    /// Opaque assignee reference.
    pub assignee: Option<String>,
    /// Opaque tag reference.
    pub tag: Option<String>,
    /// Order value within `column_uuid`.
    #[serde(rename = "order")]
    pub sort_order: i64,
    pub completed: bool,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl Task {
    /// Returns the `(task_uuid, order)` pair used by the ordering engine.
    pub fn sibling_order(&self) -> SiblingOrder {
        SiblingOrder {
            task_uuid: self.task_uuid,
            order: self.sort_order,
        }
    }
}

/// `(task id, order value)` pair as seen by the ordering engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SiblingOrder {
    pub task_uuid: TaskId,
    pub order: i64,
}

impl SiblingOrder {
    pub fn new(task_uuid: TaskId, order: i64) -> Self {
        Self { task_uuid, order }
    }

    /// Visual comparison: order first, task id as deterministic tie-break.
    pub fn visual_cmp(&self, other: &Self) -> Ordering {
        self.order
            .cmp(&other.order)
            .then_with(|| self.task_uuid.cmp(&other.task_uuid))
    }
}

/// Input for creating a task at the end of a column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewTask {
    pub column_uuid: ColumnId,
    pub name: String,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub tag: Option<String>,
}

/// Partial update of the ordering fields of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskFieldUpdate {
    pub column_uuid: Option<ColumnId>,
    pub sort_order: Option<i64>,
}

/// Partial edit of the payload fields of one task.
///
/// `None` keeps the stored value. Placement (`column_uuid`, `sort_order`)
/// is never part of a patch; it only changes through moves.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub tag: Option<String>,
    pub completed: Option<bool>,
}

/// Validation errors for board model inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardValidationError {
    /// Task or column name is blank after trim.
    BlankName,
}

impl Display for BoardValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "name must not be blank"),
        }
    }
}

impl Error for BoardValidationError {}

/// Trims a user-facing name and rejects blank values.
pub fn normalize_name(value: &str) -> Result<String, BoardValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(BoardValidationError::BlankName);
    }
    Ok(trimmed.to_string())
}
