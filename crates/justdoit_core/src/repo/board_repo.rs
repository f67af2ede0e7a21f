//! Board repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the narrow storage interface used by the move coordinator.
//! - Provide column/task persistence used by the board service.
//! - Keep SQL details and transaction handling inside the repository boundary.
//!
//! # Invariants
//! - Column task listing is deterministic: `sort_order ASC, task_uuid ASC`.
//! - `tasks.column_uuid` is authoritative; `column_tasks` is a membership cache.
//! - Writes issued inside `atomically` commit together or not at all.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::board::{
    Column, ColumnId, NewTask, ProjectId, SiblingOrder, Task, TaskFieldUpdate, TaskId, TaskPatch,
};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const TASK_SELECT_SQL: &str = "SELECT
    task_uuid,
    project_uuid,
    column_uuid,
    name,
    description,
    assignee,
    tag,
    sort_order,
    completed,
    created_at,
    updated_at
FROM tasks";

const COLUMN_SELECT_SQL: &str = "SELECT
    column_uuid,
    project_uuid,
    name,
    sort_order,
    created_at,
    updated_at
FROM board_columns";

/// Result type used by board repository operations.
pub type BoardRepoResult<T> = Result<T, BoardRepoError>;

/// Errors from board repository operations.
#[derive(Debug)]
pub enum BoardRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target task does not exist.
    TaskNotFound(TaskId),
    /// Target column does not exist.
    ColumnNotFound(ColumnId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for BoardRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::ColumnNotFound(id) => write!(f, "column not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "board repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "board repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "board repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid board data: {message}"),
        }
    }
}

impl Error for BoardRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for BoardRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for BoardRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for board storage.
pub trait BoardRepository {
    /// Runs `f` inside one storage transaction.
    ///
    /// Commits when `f` returns `Ok`, rolls back every write otherwise.
    fn atomically<T, E, F>(&self, f: F) -> Result<T, E>
    where
        Self: Sized,
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<BoardRepoError>;

    /// Creates one column at the end of its project.
    fn create_column(&self, project_uuid: ProjectId, name: &str) -> BoardRepoResult<Column>;
    /// Loads one column by id.
    fn get_column(&self, column_uuid: ColumnId) -> BoardRepoResult<Option<Column>>;
    /// Lists project columns by column position.
    fn list_columns(&self, project_uuid: ProjectId) -> BoardRepoResult<Vec<Column>>;

    /// Inserts one task row with a precomputed order value.
    fn create_task(
        &self,
        project_uuid: ProjectId,
        new_task: &NewTask,
        sort_order: i64,
    ) -> BoardRepoResult<Task>;
    /// Loads one task by id.
    fn get_task(&self, task_uuid: TaskId) -> BoardRepoResult<Option<Task>>;
    /// Lists full task rows of one column in visual order.
    fn list_column_tasks(&self, column_uuid: ColumnId) -> BoardRepoResult<Vec<Task>>;
    /// Deletes one task row.
    fn delete_task(&self, task_uuid: TaskId) -> BoardRepoResult<()>;

    /// Lists `(task, order)` of one column in visual order, optionally
    /// without one task.
    fn list_tasks_in_column(
        &self,
        column_uuid: ColumnId,
        exclude_task_uuid: Option<TaskId>,
    ) -> BoardRepoResult<Vec<SiblingOrder>>;
    /// Updates column and/or order of one task.
    fn update_task_fields(&self, task_uuid: TaskId, update: &TaskFieldUpdate)
        -> BoardRepoResult<()>;
    /// Writes new order values for several tasks.
    fn bulk_update_orders(&self, orders: &[SiblingOrder]) -> BoardRepoResult<()>;
    /// Applies a payload patch to one task. Placement fields are untouched.
    fn update_task_payload(&self, task_uuid: TaskId, patch: &TaskPatch) -> BoardRepoResult<()>;

    /// Appends a task id to a column membership array. Returns `false` when
    /// the task was already a member.
    fn add_task_to_column_membership(
        &self,
        column_uuid: ColumnId,
        task_uuid: TaskId,
    ) -> BoardRepoResult<bool>;
    /// Removes a task id from a column membership array. Returns `false` when
    /// the task was not a member.
    fn remove_task_from_column_membership(
        &self,
        column_uuid: ColumnId,
        task_uuid: TaskId,
    ) -> BoardRepoResult<bool>;
    /// Lists a column membership array in append order.
    fn list_column_membership(&self, column_uuid: ColumnId) -> BoardRepoResult<Vec<TaskId>>;
}

/// SQLite-backed board repository.
pub struct SqliteBoardRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBoardRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> BoardRepoResult<Self> {
        ensure_board_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl BoardRepository for SqliteBoardRepository<'_> {
    fn atomically<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<BoardRepoError>,
    {
        // IMMEDIATE takes the write lock up front, so two moves on the same
        // database never read the same sibling snapshot.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(BoardRepoError::from)?;
        let value = f(self)?;
        tx.commit().map_err(BoardRepoError::from)?;
        Ok(value)
    }

    fn create_column(&self, project_uuid: ProjectId, name: &str) -> BoardRepoResult<Column> {
        let column_uuid = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO board_columns (column_uuid, project_uuid, name, sort_order)
             SELECT ?1, ?2, ?3, COALESCE(MAX(sort_order), -1) + 1
             FROM board_columns
             WHERE project_uuid = ?2;",
            params![column_uuid.to_string(), project_uuid.to_string(), name],
        )?;
        self.get_column(column_uuid)?
            .ok_or(BoardRepoError::ColumnNotFound(column_uuid))
    }

    fn get_column(&self, column_uuid: ColumnId) -> BoardRepoResult<Option<Column>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{COLUMN_SELECT_SQL} WHERE column_uuid = ?1;"))?;
        let mut rows = stmt.query([column_uuid.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_column_row(row)?));
        }
        Ok(None)
    }

    fn list_columns(&self, project_uuid: ProjectId) -> BoardRepoResult<Vec<Column>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{COLUMN_SELECT_SQL}
             WHERE project_uuid = ?1
             ORDER BY sort_order ASC, column_uuid ASC;"
        ))?;
        let mut rows = stmt.query([project_uuid.to_string()])?;
        let mut columns = Vec::new();
        while let Some(row) = rows.next()? {
            columns.push(parse_column_row(row)?);
        }
        Ok(columns)
    }

    fn create_task(
        &self,
        project_uuid: ProjectId,
        new_task: &NewTask,
        sort_order: i64,
    ) -> BoardRepoResult<Task> {
        let task_uuid = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO tasks (
                task_uuid,
                project_uuid,
                column_uuid,
                name,
                description,
                assignee,
                tag,
                sort_order,
                completed
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0);",
            params![
                task_uuid.to_string(),
                project_uuid.to_string(),
                new_task.column_uuid.to_string(),
                new_task.name.as_str(),
                new_task.description.as_deref(),
                new_task.assignee.as_deref(),
                new_task.tag.as_deref(),
                sort_order,
            ],
        )?;
        self.get_task(task_uuid)?
            .ok_or(BoardRepoError::TaskNotFound(task_uuid))
    }

    fn get_task(&self, task_uuid: TaskId) -> BoardRepoResult<Option<Task>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{TASK_SELECT_SQL} WHERE task_uuid = ?1;"))?;
        let mut rows = stmt.query([task_uuid.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(row)?));
        }
        Ok(None)
    }

    fn list_column_tasks(&self, column_uuid: ColumnId) -> BoardRepoResult<Vec<Task>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{TASK_SELECT_SQL}
             WHERE column_uuid = ?1
             ORDER BY sort_order ASC, task_uuid ASC;"
        ))?;
        let mut rows = stmt.query([column_uuid.to_string()])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }

    fn delete_task(&self, task_uuid: TaskId) -> BoardRepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE task_uuid = ?1;", [task_uuid.to_string()])?;
        if changed == 0 {
            return Err(BoardRepoError::TaskNotFound(task_uuid));
        }
        Ok(())
    }

    fn list_tasks_in_column(
        &self,
        column_uuid: ColumnId,
        exclude_task_uuid: Option<TaskId>,
    ) -> BoardRepoResult<Vec<SiblingOrder>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT task_uuid, sort_order
             FROM tasks
             WHERE column_uuid = ?1
               AND (?2 IS NULL OR task_uuid <> ?2)
             ORDER BY sort_order ASC, task_uuid ASC;",
        )?;
        let mut rows = stmt.query(params![
            column_uuid.to_string(),
            exclude_task_uuid.map(|value| value.to_string()),
        ])?;
        let mut siblings = Vec::new();
        while let Some(row) = rows.next()? {
            let task_uuid_text: String = row.get(0)?;
            siblings.push(SiblingOrder::new(
                parse_uuid(&task_uuid_text, "tasks.task_uuid")?,
                row.get(1)?,
            ));
        }
        Ok(siblings)
    }

    fn update_task_fields(
        &self,
        task_uuid: TaskId,
        update: &TaskFieldUpdate,
    ) -> BoardRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE tasks
             SET column_uuid = COALESCE(?2, column_uuid),
                 sort_order = COALESCE(?3, sort_order),
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE task_uuid = ?1;",
            params![
                task_uuid.to_string(),
                update.column_uuid.map(|value| value.to_string()),
                update.sort_order,
            ],
        )?;
        if changed == 0 {
            return Err(BoardRepoError::TaskNotFound(task_uuid));
        }
        Ok(())
    }

    fn bulk_update_orders(&self, orders: &[SiblingOrder]) -> BoardRepoResult<()> {
        let mut stmt = self.conn.prepare_cached(
            "UPDATE tasks
             SET sort_order = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE task_uuid = ?1;",
        )?;
        for entry in orders {
            let changed = stmt.execute(params![entry.task_uuid.to_string(), entry.order])?;
            if changed == 0 {
                return Err(BoardRepoError::TaskNotFound(entry.task_uuid));
            }
        }
        Ok(())
    }

    fn update_task_payload(&self, task_uuid: TaskId, patch: &TaskPatch) -> BoardRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE tasks
             SET name = COALESCE(?2, name),
                 description = COALESCE(?3, description),
                 assignee = COALESCE(?4, assignee),
                 tag = COALESCE(?5, tag),
                 completed = COALESCE(?6, completed),
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE task_uuid = ?1;",
            params![
                task_uuid.to_string(),
                patch.name.as_deref(),
                patch.description.as_deref(),
                patch.assignee.as_deref(),
                patch.tag.as_deref(),
                patch.completed.map(i64::from),
            ],
        )?;
        if changed == 0 {
            return Err(BoardRepoError::TaskNotFound(task_uuid));
        }
        Ok(())
    }

    fn add_task_to_column_membership(
        &self,
        column_uuid: ColumnId,
        task_uuid: TaskId,
    ) -> BoardRepoResult<bool> {
        let changed = self.conn.execute(
            "INSERT INTO column_tasks (column_uuid, task_uuid, position)
             SELECT ?1, ?2, COALESCE(MAX(position), -1) + 1
             FROM column_tasks
             WHERE column_uuid = ?1
             ON CONFLICT (column_uuid, task_uuid) DO NOTHING;",
            params![column_uuid.to_string(), task_uuid.to_string()],
        )?;
        Ok(changed == 1)
    }

    fn remove_task_from_column_membership(
        &self,
        column_uuid: ColumnId,
        task_uuid: TaskId,
    ) -> BoardRepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM column_tasks
             WHERE column_uuid = ?1
               AND task_uuid = ?2;",
            params![column_uuid.to_string(), task_uuid.to_string()],
        )?;
        Ok(changed == 1)
    }

    fn list_column_membership(&self, column_uuid: ColumnId) -> BoardRepoResult<Vec<TaskId>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT task_uuid
             FROM column_tasks
             WHERE column_uuid = ?1
             ORDER BY position ASC, task_uuid ASC;",
        )?;
        let mut rows = stmt.query([column_uuid.to_string()])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, "column_tasks.task_uuid")?);
        }
        Ok(ids)
    }
}

fn parse_column_row(row: &Row<'_>) -> BoardRepoResult<Column> {
    let column_uuid_text: String = row.get("column_uuid")?;
    let project_uuid_text: String = row.get("project_uuid")?;
    Ok(Column {
        column_uuid: parse_uuid(&column_uuid_text, "board_columns.column_uuid")?,
        project_uuid: parse_uuid(&project_uuid_text, "board_columns.project_uuid")?,
        name: row.get("name")?,
        sort_order: row.get("sort_order")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_task_row(row: &Row<'_>) -> BoardRepoResult<Task> {
    let task_uuid_text: String = row.get("task_uuid")?;
    let project_uuid_text: String = row.get("project_uuid")?;
    let column_uuid_text: String = row.get("column_uuid")?;

    let completed = match row.get::<_, i64>("completed")? {
        0 => false,
        1 => true,
        other => {
            return Err(BoardRepoError::InvalidData(format!(
                "invalid completed value `{other}` in tasks.completed"
            )));
        }
    };

    Ok(Task {
        task_uuid: parse_uuid(&task_uuid_text, "tasks.task_uuid")?,
        project_uuid: parse_uuid(&project_uuid_text, "tasks.project_uuid")?,
        column_uuid: parse_uuid(&column_uuid_text, "tasks.column_uuid")?,
        name: row.get("name")?,
        description: row.get("description")?,
        assignee: row.get("assignee")?,
        tag: row.get("tag")?,
        sort_order: row.get("sort_order")?,
        completed,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_uuid(value: &str, column: &'static str) -> BoardRepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| BoardRepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn ensure_board_connection_ready(conn: &Connection) -> BoardRepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(BoardRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let required: [(&'static str, &[&'static str]); 3] = [
        (
            "board_columns",
            &["column_uuid", "project_uuid", "name", "sort_order"],
        ),
        (
            "tasks",
            &["task_uuid", "project_uuid", "column_uuid", "name", "sort_order"],
        ),
        ("column_tasks", &["column_uuid", "task_uuid", "position"]),
    ];
    for (table, columns) in required {
        if !table_exists(conn, table)? {
            return Err(BoardRepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(BoardRepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> BoardRepoResult<bool> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1
             FROM sqlite_master
             WHERE type = 'table' AND name = ?1;",
            [table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(exists.is_some())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> BoardRepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
