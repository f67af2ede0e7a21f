//! Board use-case service.
//!
//! # Responsibility
//! - Create, edit and delete tasks; create columns; list column contents.
//! - Rebuild column membership arrays from task columns on demand.
//!
//! # Invariants
//! - New tasks land after the current maximum order of their column.
//! - Task rows and membership rows are written in one transaction.
//! - Deleting a task never renumbers its siblings.
//! - Editing a task never changes its column or order.

use crate::config::{ordering_config, OrderingConfig};
use crate::model::board::{
    normalize_name, BoardValidationError, Column, ColumnId, NewTask, ProjectId, Task, TaskId,
    TaskPatch,
};
use crate::ordering::{append_order, is_strictly_ascending, OrderError};
use crate::repo::board_repo::{BoardRepoError, BoardRepository};
use log::{info, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from board service operations.
#[derive(Debug)]
pub enum BoardServiceError {
    /// Name is blank after trim.
    InvalidName(BoardValidationError),
    /// Target task does not exist.
    TaskNotFound(TaskId),
    /// Target column does not exist.
    ColumnNotFound(ColumnId),
    /// Ordering engine rejected its input.
    Ordering(OrderError),
    /// Repository-level failure.
    Repo(BoardRepoError),
}

impl Display for BoardServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(err) => write!(f, "{err}"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::ColumnNotFound(id) => write!(f, "column not found: {id}"),
            Self::Ordering(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for BoardServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidName(err) => Some(err),
            Self::Ordering(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BoardRepoError> for BoardServiceError {
    fn from(value: BoardRepoError) -> Self {
        match value {
            BoardRepoError::TaskNotFound(task_uuid) => Self::TaskNotFound(task_uuid),
            BoardRepoError::ColumnNotFound(column_uuid) => Self::ColumnNotFound(column_uuid),
            other => Self::Repo(other),
        }
    }
}

impl From<BoardValidationError> for BoardServiceError {
    fn from(value: BoardValidationError) -> Self {
        Self::InvalidName(value)
    }
}

impl From<OrderError> for BoardServiceError {
    fn from(value: OrderError) -> Self {
        Self::Ordering(value)
    }
}

/// Outcome of one membership reconciliation sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Columns inspected.
    pub columns: usize,
    /// `(column, task)` rows added for tasks missing from their column.
    pub added: Vec<(ColumnId, TaskId)>,
    /// `(column, task)` rows removed because the task lives elsewhere.
    pub removed: Vec<(ColumnId, TaskId)>,
    /// Columns holding equal order values. Not repaired here; the next move
    /// into the tie renormalizes it.
    pub tied_columns: Vec<ColumnId>,
}

impl ReconcileReport {
    /// Whether membership needed no repair.
    pub fn is_clean(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Board service facade.
pub struct BoardService<R: BoardRepository> {
    repo: R,
    config: OrderingConfig,
}

impl<R: BoardRepository> BoardService<R> {
    /// Creates service using the process-wide ordering configuration.
    pub fn new(repo: R) -> Self {
        Self::with_config(repo, ordering_config())
    }

    /// Creates service with an explicit ordering configuration.
    pub fn with_config(repo: R, config: OrderingConfig) -> Self {
        Self { repo, config }
    }

    /// Creates one column after the existing columns of `project_uuid`.
    pub fn create_column(
        &self,
        project_uuid: ProjectId,
        name: impl Into<String>,
    ) -> Result<Column, BoardServiceError> {
        let name: String = name.into();
        let normalized = normalize_name(&name)?;
        self.repo
            .create_column(project_uuid, normalized.as_str())
            .map_err(Into::into)
    }

    /// Lists columns of one project in column order.
    pub fn list_columns(&self, project_uuid: ProjectId) -> Result<Vec<Column>, BoardServiceError> {
        self.repo.list_columns(project_uuid).map_err(Into::into)
    }

    /// Creates one task at the end of its column.
    pub fn create_task(&self, new_task: NewTask) -> Result<Task, BoardServiceError> {
        let new_task = NewTask {
            name: normalize_name(&new_task.name)?,
            ..new_task
        };

        self.repo.atomically(|repo| {
            let column = repo
                .get_column(new_task.column_uuid)?
                .ok_or(BoardServiceError::ColumnNotFound(new_task.column_uuid))?;
            let siblings = repo.list_tasks_in_column(column.column_uuid, None)?;
            let sort_order = append_order(&siblings, &self.config)?;

            let task = repo.create_task(column.project_uuid, &new_task, sort_order)?;
            repo.add_task_to_column_membership(column.column_uuid, task.task_uuid)?;
            info!(
                "event=task_create module=service status=ok task={} column={} order={}",
                task.task_uuid, task.column_uuid, task.sort_order
            );
            Ok(task)
        })
    }

    /// Edits name, description, assignee, tag or completion of one task.
    ///
    /// Blank optional text keeps the stored value.
    ///
    /// # Errors
    /// - `InvalidName` when a provided name is blank.
    /// - `TaskNotFound` when the task does not exist.
    pub fn update_task(
        &self,
        task_uuid: TaskId,
        patch: TaskPatch,
    ) -> Result<Task, BoardServiceError> {
        let patch = TaskPatch {
            name: patch.name.as_deref().map(normalize_name).transpose()?,
            description: non_blank(patch.description),
            assignee: non_blank(patch.assignee),
            tag: non_blank(patch.tag),
            completed: patch.completed,
        };

        let task = self.repo.atomically(|repo| {
            repo.update_task_payload(task_uuid, &patch)?;
            repo.get_task(task_uuid)?
                .ok_or(BoardServiceError::TaskNotFound(task_uuid))
        })?;
        info!(
            "event=task_update module=service status=ok task={} completed={}",
            task.task_uuid, task.completed
        );
        Ok(task)
    }

    /// Loads one task.
    pub fn get_task(&self, task_uuid: TaskId) -> Result<Task, BoardServiceError> {
        self.repo
            .get_task(task_uuid)?
            .ok_or(BoardServiceError::TaskNotFound(task_uuid))
    }

    /// Lists tasks of one column in visual order.
    pub fn list_column_tasks(&self, column_uuid: ColumnId) -> Result<Vec<Task>, BoardServiceError> {
        self.ensure_column_exists(column_uuid)?;
        self.repo.list_column_tasks(column_uuid).map_err(Into::into)
    }

    /// Returns the cached membership array of one column.
    pub fn column_membership(
        &self,
        column_uuid: ColumnId,
    ) -> Result<Vec<TaskId>, BoardServiceError> {
        self.ensure_column_exists(column_uuid)?;
        self.repo
            .list_column_membership(column_uuid)
            .map_err(Into::into)
    }

    /// Deletes one task and excises it from its column membership.
    pub fn delete_task(&self, task_uuid: TaskId) -> Result<(), BoardServiceError> {
        self.repo.atomically(|repo| {
            let task = repo
                .get_task(task_uuid)?
                .ok_or(BoardServiceError::TaskNotFound(task_uuid))?;
            repo.remove_task_from_column_membership(task.column_uuid, task_uuid)?;
            repo.delete_task(task_uuid)?;
            info!(
                "event=task_delete module=service status=ok task={} column={}",
                task_uuid, task.column_uuid
            );
            Ok(())
        })
    }

    /// Rebuilds membership arrays of every column in `project_uuid` from the
    /// tasks' own `column_uuid` values.
    pub fn reconcile_memberships(
        &self,
        project_uuid: ProjectId,
    ) -> Result<ReconcileReport, BoardServiceError> {
        let report = self.repo.atomically(|repo| {
            let mut report = ReconcileReport::default();
            for column in repo.list_columns(project_uuid)? {
                report.columns += 1;
                let siblings = repo.list_tasks_in_column(column.column_uuid, None)?;
                let expected = siblings
                    .iter()
                    .map(|sibling| sibling.task_uuid)
                    .collect::<Vec<_>>();
                let cached = repo.list_column_membership(column.column_uuid)?;
                if !is_strictly_ascending(&siblings) {
                    report.tied_columns.push(column.column_uuid);
                }

                let expected_set = expected.iter().copied().collect::<HashSet<_>>();
                let cached_set = cached.iter().copied().collect::<HashSet<_>>();

                for task_uuid in cached.iter().filter(|id| !expected_set.contains(id)) {
                    repo.remove_task_from_column_membership(column.column_uuid, *task_uuid)?;
                    report.removed.push((column.column_uuid, *task_uuid));
                }
                for task_uuid in expected.iter().filter(|id| !cached_set.contains(id)) {
                    repo.add_task_to_column_membership(column.column_uuid, *task_uuid)?;
                    report.added.push((column.column_uuid, *task_uuid));
                }
            }
            Ok::<_, BoardServiceError>(report)
        })?;

        if report.is_clean() {
            info!(
                "event=membership_reconcile module=service status=ok project={} columns={} tied={}",
                project_uuid,
                report.columns,
                report.tied_columns.len()
            );
        } else {
            warn!(
                "event=membership_reconcile module=service status=repaired project={} columns={} added={} removed={}",
                project_uuid,
                report.columns,
                report.added.len(),
                report.removed.len()
            );
        }
        Ok(report)
    }

    fn ensure_column_exists(&self, column_uuid: ColumnId) -> Result<(), BoardServiceError> {
        self.repo
            .get_column(column_uuid)?
            .ok_or(BoardServiceError::ColumnNotFound(column_uuid))?;
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
