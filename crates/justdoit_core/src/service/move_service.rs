//! Cross-column task move coordinator.
//!
//! # Responsibility
//! - Apply one drag-and-drop move (same-column reorder or cross-column move)
//!   as a single storage transaction.
//! - Keep task `column`/`order` and both column membership arrays consistent.
//! - Return a uniform success/failure envelope the caller can branch on.
//!
//! # Invariants
//! - Sibling orders are read inside the move transaction, never reused.
//! - Task fields are written before membership arrays; any failure rolls
//!   back every write of the move.
//! - Moves are never retried here. The caller retries or rolls back.

use crate::config::{ordering_config, OrderingConfig};
use crate::model::board::{ColumnId, SiblingOrder, Task, TaskFieldUpdate, TaskId};
use crate::ordering::{assign_order, OrderError};
use crate::repo::board_repo::{BoardRepoError, BoardRepository};
use log::{error, info, warn};
use serde::Serialize;
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Which list the caller's drop index was computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DropIndexBasis {
    /// Index into the destination list with the moved task already removed.
    #[default]
    ExcludingMoved,
    /// Index into the destination list as rendered, still containing the
    /// moved task when reordering within one column.
    IncludingMoved,
}

/// One move requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveRequest {
    pub task_uuid: TaskId,
    /// Column the caller believes the task is in.
    pub source_column_uuid: ColumnId,
    pub dest_column_uuid: ColumnId,
    /// Target index; `None` appends to the end of the destination.
    pub drop_index: Option<i64>,
    pub basis: DropIndexBasis,
}

impl MoveRequest {
    pub fn new(
        task_uuid: TaskId,
        source_column_uuid: ColumnId,
        dest_column_uuid: ColumnId,
        drop_index: Option<i64>,
    ) -> Self {
        Self {
            task_uuid,
            source_column_uuid,
            dest_column_uuid,
            drop_index,
            basis: DropIndexBasis::default(),
        }
    }

    pub fn with_basis(mut self, basis: DropIndexBasis) -> Self {
        self.basis = basis;
        self
    }

    pub fn is_same_column(&self) -> bool {
        self.source_column_uuid == self.dest_column_uuid
    }
}

/// Successful move result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovedTask {
    /// Task snapshot after the move.
    pub task: Task,
    /// Effective index in the destination, moved task excluded.
    pub drop_index: usize,
    /// Siblings pushed by renormalization, with their new orders.
    pub shifted: Vec<SiblingOrder>,
}

/// Errors from move operations.
#[derive(Debug)]
pub enum MoveError {
    /// Drop index is negative.
    InvalidDropIndex(i64),
    /// Task does not exist.
    TaskNotFound(TaskId),
    /// Source or destination column does not exist.
    ColumnNotFound(ColumnId),
    /// Caller's source column differs from the stored task column.
    StaleSourceColumn {
        task_uuid: TaskId,
        expected: ColumnId,
        actual: ColumnId,
    },
    /// Ordering engine rejected its input.
    Ordering(OrderError),
    /// Storage read or write failed.
    Persistence(BoardRepoError),
}

impl MoveError {
    /// Stable machine-readable error code for logs and envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidDropIndex(_) => "invalid_drop_index",
            Self::TaskNotFound(_) => "task_not_found",
            Self::ColumnNotFound(_) => "column_not_found",
            Self::StaleSourceColumn { .. } => "stale_source_column",
            Self::Ordering(_) => "invalid_ordering_input",
            Self::Persistence(_) => "persistence_failed",
        }
    }
}

impl Display for MoveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDropIndex(value) => {
                write!(f, "drop index must not be negative, got {value}")
            }
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::ColumnNotFound(id) => write!(f, "column not found: {id}"),
            Self::StaleSourceColumn {
                task_uuid,
                expected,
                actual,
            } => write!(
                f,
                "task {task_uuid} is in column {actual}, not in source column {expected}"
            ),
            Self::Ordering(err) => write!(f, "{err}"),
            Self::Persistence(err) => write!(f, "{err}"),
        }
    }
}

impl Error for MoveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Ordering(err) => Some(err),
            Self::Persistence(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BoardRepoError> for MoveError {
    fn from(value: BoardRepoError) -> Self {
        match value {
            BoardRepoError::TaskNotFound(task_uuid) => Self::TaskNotFound(task_uuid),
            BoardRepoError::ColumnNotFound(column_uuid) => Self::ColumnNotFound(column_uuid),
            other => Self::Persistence(other),
        }
    }
}

impl From<OrderError> for MoveError {
    fn from(value: OrderError) -> Self {
        Self::Ordering(value)
    }
}

/// Caller-facing move envelope: `{success, data?, error?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Task>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MoveResponse {
    fn success(task: Task) -> Self {
        Self {
            success: true,
            data: Some(task),
            error: None,
        }
    }

    fn failure(err: &MoveError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.to_string()),
        }
    }
}

/// Move coordinator facade.
pub struct MoveService<R: BoardRepository> {
    repo: R,
    config: OrderingConfig,
}

impl<R: BoardRepository> MoveService<R> {
    /// Creates service using the process-wide ordering configuration.
    pub fn new(repo: R) -> Self {
        Self::with_config(repo, ordering_config())
    }

    /// Creates service with an explicit ordering configuration.
    pub fn with_config(repo: R, config: OrderingConfig) -> Self {
        Self { repo, config }
    }

    /// Moves one task and reports the outcome as an envelope.
    ///
    /// Never panics and never leaks an error past the envelope; on
    /// `success == false` the caller rolls back its optimistic view.
    pub fn move_task(&self, request: &MoveRequest) -> MoveResponse {
        match self.try_move_task(request) {
            Ok(moved) => MoveResponse::success(moved.task),
            Err(err) => MoveResponse::failure(&err),
        }
    }

    /// Moves one task.
    ///
    /// # Errors
    /// - `InvalidDropIndex` for negative indices (checked before storage).
    /// - `TaskNotFound` / `ColumnNotFound` for unknown ids.
    /// - `StaleSourceColumn` when the task is no longer in the source column.
    /// - `Persistence` when any storage call fails; nothing is written then.
    pub fn try_move_task(&self, request: &MoveRequest) -> Result<MovedTask, MoveError> {
        let started_at = Instant::now();
        info!(
            "event=task_move module=service status=start task={} from={} to={} drop_index={:?}",
            request.task_uuid,
            request.source_column_uuid,
            request.dest_column_uuid,
            request.drop_index
        );

        let result = validate_drop_index(request.drop_index).and_then(|requested_index| {
            self.repo
                .atomically(|repo| apply_move(repo, &self.config, request, requested_index))
        });

        match &result {
            Ok(moved) => info!(
                "event=task_move module=service status=ok task={} to={} index={} order={} shifted={} duration_ms={}",
                moved.task.task_uuid,
                moved.task.column_uuid,
                moved.drop_index,
                moved.task.sort_order,
                moved.shifted.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=task_move module=service status=error task={} duration_ms={} error_code={} error={}",
                request.task_uuid,
                started_at.elapsed().as_millis(),
                err.code(),
                err
            ),
        }
        result
    }
}

fn validate_drop_index(drop_index: Option<i64>) -> Result<Option<usize>, MoveError> {
    match drop_index {
        None => Ok(None),
        Some(value) => usize::try_from(value)
            .map(Some)
            .map_err(|_| MoveError::InvalidDropIndex(value)),
    }
}

fn apply_move<R: BoardRepository>(
    repo: &R,
    config: &OrderingConfig,
    request: &MoveRequest,
    requested_index: Option<usize>,
) -> Result<MovedTask, MoveError> {
    let task = repo
        .get_task(request.task_uuid)?
        .ok_or(MoveError::TaskNotFound(request.task_uuid))?;
    for column_uuid in [request.source_column_uuid, request.dest_column_uuid] {
        repo.get_column(column_uuid)?
            .ok_or(MoveError::ColumnNotFound(column_uuid))?;
    }
    if task.column_uuid != request.source_column_uuid {
        return Err(MoveError::StaleSourceColumn {
            task_uuid: task.task_uuid,
            expected: request.source_column_uuid,
            actual: task.column_uuid,
        });
    }

    let siblings = repo.list_tasks_in_column(request.dest_column_uuid, Some(task.task_uuid))?;
    let drop_index = effective_drop_index(&task, &siblings, request, requested_index);
    let assignment = assign_order(&siblings, drop_index, config)?;

    repo.update_task_fields(
        task.task_uuid,
        &TaskFieldUpdate {
            column_uuid: Some(request.dest_column_uuid),
            sort_order: Some(assignment.order),
        },
    )?;

    if assignment.renormalized() {
        info!(
            "event=order_renormalize module=service status=start column={} shifted={}",
            request.dest_column_uuid,
            assignment.shifted.len()
        );
        repo.bulk_update_orders(&assignment.shifted)?;
    }

    if !request.is_same_column() {
        if !repo.remove_task_from_column_membership(request.source_column_uuid, task.task_uuid)? {
            warn!(
                "event=membership_drift module=service status=missing column={} task={}",
                request.source_column_uuid, task.task_uuid
            );
        }
        if !repo.add_task_to_column_membership(request.dest_column_uuid, task.task_uuid)? {
            warn!(
                "event=membership_drift module=service status=duplicate column={} task={}",
                request.dest_column_uuid, task.task_uuid
            );
        }
    }

    let task = repo
        .get_task(task.task_uuid)?
        .ok_or(MoveError::TaskNotFound(task.task_uuid))?;
    Ok(MovedTask {
        task,
        drop_index,
        shifted: assignment.shifted,
    })
}

/// Resolves the caller's index against the sibling list without the task.
///
/// Indices counted with the moved task still in place shift down by one
/// once they point past its original position. Results are clamped to the
/// sibling count.
fn effective_drop_index(
    task: &Task,
    siblings: &[SiblingOrder],
    request: &MoveRequest,
    requested_index: Option<usize>,
) -> usize {
    let Some(mut index) = requested_index else {
        return siblings.len();
    };
    if request.is_same_column() && request.basis == DropIndexBasis::IncludingMoved {
        let moved = task.sibling_order();
        let original_position = siblings
            .iter()
            .filter(|sibling| sibling.visual_cmp(&moved) == Ordering::Less)
            .count();
        if index > original_position {
            index -= 1;
        }
    }
    index.min(siblings.len())
}
