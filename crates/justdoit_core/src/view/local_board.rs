//! Caller-side board view with optimistic move application.
//!
//! # Responsibility
//! - Hold each column's visual task list as the caller renders it.
//! - Apply a move locally before the coordinator confirms it.
//! - Undo an unconfirmed move with its inverse.
//!
//! # Invariants
//! - A task appears in exactly one local column.
//! - At most one unsettled move per task.
//! - Rolling back restores the exact pre-move column and index.

use crate::model::board::{ColumnId, TaskId};
use crate::service::move_service::{DropIndexBasis, MoveRequest, MoveResponse};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Lifecycle of one move from the caller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveState {
    /// No move in flight for the task.
    Idle,
    /// Applied locally, waiting for the coordinator.
    OptimisticallyApplied,
    /// Coordinator accepted the move; local state already matches.
    Confirmed,
    /// Coordinator rejected the move; local state was restored.
    RolledBack,
}

/// Errors from local board operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalBoardError {
    ColumnNotFound(ColumnId),
    TaskNotInColumn { task_uuid: TaskId, column_uuid: ColumnId },
    InvalidDropIndex(i64),
    /// The task already has an unsettled move.
    MoveInFlight(TaskId),
    /// `settle` called on a move that is not waiting for confirmation.
    NotPending(MoveState),
}

impl Display for LocalBoardError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ColumnNotFound(id) => write!(f, "local column not found: {id}"),
            Self::TaskNotInColumn {
                task_uuid,
                column_uuid,
            } => write!(f, "task {task_uuid} is not in local column {column_uuid}"),
            Self::InvalidDropIndex(value) => {
                write!(f, "drop index must not be negative, got {value}")
            }
            Self::MoveInFlight(id) => write!(f, "task {id} already has a move in flight"),
            Self::NotPending(state) => write!(f, "move is not pending (state {state:?})"),
        }
    }
}

impl Error for LocalBoardError {}

/// One column as rendered by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LocalColumn {
    column_uuid: ColumnId,
    tasks: Vec<TaskId>,
}

/// A move applied locally and awaiting the coordinator's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMove {
    request: MoveRequest,
    original_index: usize,
    state: MoveState,
}

impl PendingMove {
    pub fn state(&self) -> MoveState {
        self.state
    }

    /// Index the task had in its source column before the move.
    pub fn original_index(&self) -> usize {
        self.original_index
    }

    /// The compensating move: back to the source column at the original index.
    pub fn inverse(&self) -> MoveRequest {
        MoveRequest {
            task_uuid: self.request.task_uuid,
            source_column_uuid: self.request.dest_column_uuid,
            dest_column_uuid: self.request.source_column_uuid,
            drop_index: Some(self.original_index as i64),
            basis: DropIndexBasis::ExcludingMoved,
        }
    }
}

/// Local board view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalBoard {
    columns: Vec<LocalColumn>,
    in_flight: HashSet<TaskId>,
}

impl LocalBoard {
    /// Builds a view from `(column, tasks in visual order)` pairs.
    pub fn from_columns(columns: impl IntoIterator<Item = (ColumnId, Vec<TaskId>)>) -> Self {
        Self {
            columns: columns
                .into_iter()
                .map(|(column_uuid, tasks)| LocalColumn { column_uuid, tasks })
                .collect(),
            in_flight: HashSet::new(),
        }
    }

    /// Visual task list of one column.
    pub fn column(&self, column_uuid: ColumnId) -> Option<&[TaskId]> {
        self.columns
            .iter()
            .find(|column| column.column_uuid == column_uuid)
            .map(|column| column.tasks.as_slice())
    }

    /// Column and index currently showing `task_uuid`.
    pub fn position_of(&self, task_uuid: TaskId) -> Option<(ColumnId, usize)> {
        self.columns.iter().find_map(|column| {
            column
                .tasks
                .iter()
                .position(|id| *id == task_uuid)
                .map(|index| (column.column_uuid, index))
        })
    }

    /// State of the latest move of `task_uuid`.
    pub fn move_state(&self, task_uuid: TaskId) -> MoveState {
        if self.in_flight.contains(&task_uuid) {
            MoveState::OptimisticallyApplied
        } else {
            MoveState::Idle
        }
    }

    /// Applies `request` locally ahead of confirmation.
    pub fn apply_optimistic(
        &mut self,
        request: &MoveRequest,
    ) -> Result<PendingMove, LocalBoardError> {
        if self.in_flight.contains(&request.task_uuid) {
            return Err(LocalBoardError::MoveInFlight(request.task_uuid));
        }
        let original_index = self.apply(request)?;
        self.in_flight.insert(request.task_uuid);
        Ok(PendingMove {
            request: *request,
            original_index,
            state: MoveState::OptimisticallyApplied,
        })
    }

    /// Settles a pending move with the coordinator's response.
    ///
    /// A failed response triggers the inverse move locally.
    pub fn settle(
        &mut self,
        pending: &mut PendingMove,
        response: &MoveResponse,
    ) -> Result<MoveState, LocalBoardError> {
        if pending.state != MoveState::OptimisticallyApplied {
            return Err(LocalBoardError::NotPending(pending.state));
        }

        pending.state = if response.success {
            MoveState::Confirmed
        } else {
            self.apply(&pending.inverse())?;
            MoveState::RolledBack
        };
        self.in_flight.remove(&pending.request.task_uuid);
        Ok(pending.state)
    }

    /// Moves the task locally and returns its index before the move.
    fn apply(&mut self, request: &MoveRequest) -> Result<usize, LocalBoardError> {
        let requested = match request.drop_index {
            Some(value) if value < 0 => return Err(LocalBoardError::InvalidDropIndex(value)),
            Some(value) => Some(value as usize),
            None => None,
        };
        let source = self.column_index(request.source_column_uuid)?;
        let dest = self.column_index(request.dest_column_uuid)?;
        let current = self.columns[source]
            .tasks
            .iter()
            .position(|id| *id == request.task_uuid)
            .ok_or(LocalBoardError::TaskNotInColumn {
                task_uuid: request.task_uuid,
                column_uuid: request.source_column_uuid,
            })?;

        self.columns[source].tasks.remove(current);

        let dest_len = self.columns[dest].tasks.len();
        let insert_at = match requested {
            None => dest_len,
            Some(index)
                if source == dest
                    && request.basis == DropIndexBasis::IncludingMoved
                    && index > current =>
            {
                index - 1
            }
            Some(index) => index,
        }
        .min(dest_len);
        self.columns[dest].tasks.insert(insert_at, request.task_uuid);

        Ok(current)
    }

    fn column_index(&self, column_uuid: ColumnId) -> Result<usize, LocalBoardError> {
        self.columns
            .iter()
            .position(|column| column.column_uuid == column_uuid)
            .ok_or(LocalBoardError::ColumnNotFound(column_uuid))
    }
}

#[cfg(test)]
mod tests {
    use super::{LocalBoard, LocalBoardError, MoveState};
    use crate::service::move_service::{DropIndexBasis, MoveRequest, MoveResponse};
    use uuid::Uuid;

    fn ids(count: u128, offset: u128) -> Vec<Uuid> {
        (0..count).map(|n| Uuid::from_u128(offset + n)).collect()
    }

    fn failed() -> MoveResponse {
        MoveResponse {
            success: false,
            data: None,
            error: Some("storage unavailable".to_string()),
        }
    }

    fn confirmed() -> MoveResponse {
        MoveResponse {
            success: true,
            data: None,
            error: None,
        }
    }

    #[test]
    fn cross_column_move_inserts_at_drop_index() {
        let todo = Uuid::from_u128(1000);
        let done = Uuid::from_u128(2000);
        let todo_tasks = ids(3, 1);
        let done_tasks = ids(2, 10);
        let mut board =
            LocalBoard::from_columns([(todo, todo_tasks.clone()), (done, done_tasks.clone())]);

        let request = MoveRequest::new(todo_tasks[0], todo, done, Some(1));
        let mut pending = board.apply_optimistic(&request).unwrap();

        assert_eq!(board.column(todo).unwrap(), &todo_tasks[1..]);
        assert_eq!(
            board.column(done).unwrap(),
            &[done_tasks[0], todo_tasks[0], done_tasks[1]]
        );
        assert_eq!(board.move_state(todo_tasks[0]), MoveState::OptimisticallyApplied);

        assert_eq!(
            board.settle(&mut pending, &confirmed()).unwrap(),
            MoveState::Confirmed
        );
        assert_eq!(board.move_state(todo_tasks[0]), MoveState::Idle);
        assert_eq!(board.position_of(todo_tasks[0]), Some((done, 1)));
    }

    #[test]
    fn failed_move_rolls_back_to_exact_position() {
        let todo = Uuid::from_u128(1000);
        let done = Uuid::from_u128(2000);
        let mut board = LocalBoard::from_columns([(todo, ids(4, 1)), (done, ids(2, 10))]);
        let before = board.clone();

        let moved = Uuid::from_u128(3);
        let mut pending = board
            .apply_optimistic(&MoveRequest::new(moved, todo, done, None))
            .unwrap();
        assert_eq!(board.position_of(moved), Some((done, 2)));

        assert_eq!(
            board.settle(&mut pending, &failed()).unwrap(),
            MoveState::RolledBack
        );
        assert_eq!(board, before);
    }

    #[test]
    fn same_column_including_moved_index_shifts_down_after_origin() {
        let column = Uuid::from_u128(1000);
        let tasks = ids(4, 1);
        let mut board = LocalBoard::from_columns([(column, tasks.clone())]);

        // Dropped "before the 4th card" while the moved card is still rendered.
        let request = MoveRequest::new(tasks[0], column, column, Some(3))
            .with_basis(DropIndexBasis::IncludingMoved);
        board.apply_optimistic(&request).unwrap();

        assert_eq!(
            board.column(column).unwrap(),
            &[tasks[1], tasks[2], tasks[0], tasks[3]]
        );
    }

    #[test]
    fn same_column_rollback_restores_original_order() {
        let column = Uuid::from_u128(1000);
        let tasks = ids(4, 1);
        let mut board = LocalBoard::from_columns([(column, tasks.clone())]);

        let request = MoveRequest::new(tasks[2], column, column, Some(0));
        let mut pending = board.apply_optimistic(&request).unwrap();
        assert_eq!(pending.original_index(), 2);
        assert_eq!(
            board.column(column).unwrap(),
            &[tasks[2], tasks[0], tasks[1], tasks[3]]
        );

        board.settle(&mut pending, &failed()).unwrap();
        assert_eq!(board.column(column).unwrap(), tasks.as_slice());
    }

    #[test]
    fn rejects_second_move_while_pending_and_double_settle() {
        let column = Uuid::from_u128(1000);
        let tasks = ids(2, 1);
        let mut board = LocalBoard::from_columns([(column, tasks.clone())]);

        let request = MoveRequest::new(tasks[0], column, column, None);
        let mut pending = board.apply_optimistic(&request).unwrap();
        assert_eq!(
            board.apply_optimistic(&request).unwrap_err(),
            LocalBoardError::MoveInFlight(tasks[0])
        );

        board.settle(&mut pending, &confirmed()).unwrap();
        assert_eq!(
            board.settle(&mut pending, &confirmed()).unwrap_err(),
            LocalBoardError::NotPending(MoveState::Confirmed)
        );
    }

    #[test]
    fn invalid_requests_leave_board_untouched() {
        let column = Uuid::from_u128(1000);
        let tasks = ids(2, 1);
        let mut board = LocalBoard::from_columns([(column, tasks.clone())]);
        let before = board.clone();

        let missing_column = Uuid::from_u128(9999);
        assert_eq!(
            board
                .apply_optimistic(&MoveRequest::new(tasks[0], column, missing_column, None))
                .unwrap_err(),
            LocalBoardError::ColumnNotFound(missing_column)
        );
        assert_eq!(
            board
                .apply_optimistic(&MoveRequest::new(tasks[0], column, column, Some(-1)))
                .unwrap_err(),
            LocalBoardError::InvalidDropIndex(-1)
        );
        assert_eq!(board, before);
    }
}
