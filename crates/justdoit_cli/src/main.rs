//! JustDoIt board command-line front end.
//!
//! # Responsibility
//! - Map subcommands onto `BoardService` / `MoveService` calls.
//! - Print every result as JSON on stdout.
//!
//! # Invariants
//! - Exit status is non-zero whenever the printed result is a failure.

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use justdoit_core::db::open_db;
use justdoit_core::{
    default_log_level, init_logging, init_ordering_config, BoardService, DropIndexBasis,
    MoveRequest, MoveService, NewTask, OrderingConfig, SqliteBoardRepository, TaskPatch,
};
use log::info;
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

type CliResult<T> = Result<T, Box<dyn Error>>;

/// JustDoIt - kanban board with fractional task ordering
#[derive(Parser, Debug)]
#[command(name = "justdoit")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    JUSTDOIT_DB_PATH            Board database (alternative to --db)\n    JUSTDOIT_ORDER_INCREMENT    Order spacing for new positions (default 1000)\n    JUSTDOIT_ORDER_MIN_GAP      Smallest gap kept before renormalizing (default 1)")]
pub struct Cli {
    /// Board database file
    #[arg(long, env = "JUSTDOIT_DB_PATH")]
    pub db: PathBuf,

    /// Absolute directory for rotating log files (logging is off without it)
    #[arg(long)]
    pub log_dir: Option<String>,

    /// Log level: trace|debug|info|warn|error
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Requested log level, or the build-mode default.
    fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(default_log_level())
    }
}

/// Board commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Create a column at the end of a project
    ColumnAdd {
        /// Project the column belongs to
        #[arg(long)]
        project: Uuid,

        /// Column name
        name: String,
    },

    /// List the columns of a project
    ColumnList {
        #[arg(long)]
        project: Uuid,
    },

    /// Show one column with its tasks and cached membership
    ColumnShow { column: Uuid },

    /// Create a task at the end of a column
    TaskAdd {
        #[arg(long)]
        column: Uuid,

        /// Task name
        name: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        assignee: Option<String>,

        #[arg(long)]
        tag: Option<String>,
    },

    /// Edit name, description, assignee, tag or completion of a task
    TaskEdit {
        task: Uuid,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        assignee: Option<String>,

        #[arg(long)]
        tag: Option<String>,

        /// Mark the task done (`true`) or open again (`false`)
        #[arg(long)]
        completed: Option<bool>,
    },

    /// Move a task to a position in the same or another column
    TaskMove {
        task: Uuid,

        /// Column the task is in now
        #[arg(long)]
        from: Uuid,

        /// Destination column
        #[arg(long)]
        to: Uuid,

        /// Target position; appends when omitted
        #[arg(long, allow_hyphen_values = true)]
        index: Option<i64>,

        /// The index counts the moved task at its current position
        #[arg(long)]
        including_moved: bool,
    },

    /// Delete a task
    TaskDelete { task: Uuid },

    /// Rebuild column membership from task columns
    Reconcile {
        #[arg(long)]
        project: Uuid,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Runs one command; `Ok(false)` means the command printed a failure result.
fn run(cli: Cli) -> CliResult<bool> {
    if let Some(log_dir) = cli.log_dir.as_deref() {
        init_logging(cli.log_level(), log_dir)?;
    }
    init_ordering_config(OrderingConfig::from_env()?)?;

    let conn = open_db(&cli.db)?;
    info!(
        "event=cli_command module=cli status=start command={}",
        command_name(&cli.command)
    );

    match cli.command {
        Command::TaskMove {
            task,
            from,
            to,
            index,
            including_moved,
        } => {
            let basis = if including_moved {
                DropIndexBasis::IncludingMoved
            } else {
                DropIndexBasis::ExcludingMoved
            };
            let request = MoveRequest::new(task, from, to, index).with_basis(basis);
            let response = MoveService::new(repository(&conn)?).move_task(&request);
            print_json(&response)?;
            Ok(response.success)
        }
        command => {
            run_board_command(&conn, command)?;
            Ok(true)
        }
    }
}

fn run_board_command(conn: &Connection, command: Command) -> CliResult<()> {
    let service = BoardService::new(repository(conn)?);
    match command {
        Command::ColumnAdd { project, name } => print_json(&service.create_column(project, name)?),
        Command::ColumnList { project } => print_json(&service.list_columns(project)?),
        Command::ColumnShow { column } => print_json(&json!({
            "column_uuid": column,
            "tasks": service.list_column_tasks(column)?,
            "membership": service.column_membership(column)?,
        })),
        Command::TaskAdd {
            column,
            name,
            description,
            assignee,
            tag,
        } => print_json(&service.create_task(NewTask {
            column_uuid: column,
            name,
            description,
            assignee,
            tag,
        })?),
        Command::TaskEdit {
            task,
            name,
            description,
            assignee,
            tag,
            completed,
        } => print_json(&service.update_task(
            task,
            TaskPatch {
                name,
                description,
                assignee,
                tag,
                completed,
            },
        )?),
        Command::TaskDelete { task } => {
            service.delete_task(task)?;
            print_json(&json!({ "deleted": task }))
        }
        Command::Reconcile { project } => print_json(&service.reconcile_memberships(project)?),
        Command::TaskMove { .. } => Err("task-move is handled by the move coordinator".into()),
    }
}

fn repository(conn: &Connection) -> CliResult<SqliteBoardRepository<'_>> {
    Ok(SqliteBoardRepository::try_new(conn)?)
}

fn print_json(value: &impl serde::Serialize) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::ColumnAdd { .. } => "column-add",
        Command::ColumnList { .. } => "column-list",
        Command::ColumnShow { .. } => "column-show",
        Command::TaskAdd { .. } => "task-add",
        Command::TaskEdit { .. } => "task-edit",
        Command::TaskMove { .. } => "task-move",
        Command::TaskDelete { .. } => "task-delete",
        Command::Reconcile { .. } => "reconcile",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    const TASK: &str = "00000000-0000-0000-0000-000000000001";
    const TODO: &str = "00000000-0000-0000-0000-0000000000c1";
    const DONE: &str = "00000000-0000-0000-0000-0000000000c2";

    #[test]
    fn test_task_move_parses_index_and_basis() {
        let cli = Cli::try_parse_from([
            "justdoit",
            "--db",
            "/tmp/board.db",
            "task-move",
            TASK,
            "--from",
            TODO,
            "--to",
            DONE,
            "--index",
            "2",
            "--including-moved",
        ])
        .unwrap();
        assert_eq!(cli.db, PathBuf::from("/tmp/board.db"));
        match cli.command {
            Command::TaskMove {
                task,
                from,
                to,
                index,
                including_moved,
            } => {
                assert_eq!(task, Uuid::from_u128(1));
                assert_eq!(from, Uuid::from_u128(0xc1));
                assert_eq!(to, Uuid::from_u128(0xc2));
                assert_eq!(index, Some(2));
                assert!(including_moved);
            }
            _ => panic!("Expected TaskMove command"),
        }
    }

    #[test]
    fn test_task_move_accepts_negative_index_for_core_validation() {
        let cli = Cli::try_parse_from([
            "justdoit", "--db", "b.db", "task-move", TASK, "--from", TODO, "--to", TODO,
            "--index", "-1",
        ])
        .unwrap();
        match cli.command {
            Command::TaskMove { index, .. } => assert_eq!(index, Some(-1)),
            _ => panic!("Expected TaskMove command"),
        }
    }

    #[test]
    fn test_task_add_optional_fields() {
        let cli = Cli::try_parse_from([
            "justdoit", "--db", "b.db", "task-add", "--column", TODO, "Write docs", "--tag",
            "docs",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Command::TaskAdd {
                column: Uuid::from_u128(0xc1),
                name: "Write docs".to_string(),
                description: None,
                assignee: None,
                tag: Some("docs".to_string()),
            }
        );
    }

    #[test]
    fn test_task_edit_parses_partial_patch() {
        let cli = Cli::try_parse_from([
            "justdoit", "--db", "b.db", "task-edit", TASK, "--name", "Ship it", "--completed",
            "true",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Command::TaskEdit {
                task: Uuid::from_u128(1),
                name: Some("Ship it".to_string()),
                description: None,
                assignee: None,
                tag: None,
                completed: Some(true),
            }
        );
        assert_eq!(command_name(&cli.command), "task-edit");
    }

    #[test]
    fn test_task_edit_rejects_non_boolean_completed() {
        let result = Cli::try_parse_from([
            "justdoit", "--db", "b.db", "task-edit", TASK, "--completed", "yes",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_log_level_falls_back_to_build_default() {
        let cli = Cli::try_parse_from(["justdoit", "--db", "b.db", "task-delete", TASK]).unwrap();
        assert_eq!(cli.log_level(), default_log_level());

        let cli = Cli::try_parse_from([
            "justdoit", "--db", "b.db", "--log-level", "warn", "task-delete", TASK,
        ])
        .unwrap();
        assert_eq!(cli.log_level(), "warn");
    }

    #[test]
    fn test_invalid_uuid_is_rejected() {
        let result =
            Cli::try_parse_from(["justdoit", "--db", "b.db", "task-delete", "not-a-uuid"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_command_names_match_subcommands() {
        let cli =
            Cli::try_parse_from(["justdoit", "--db", "b.db", "reconcile", "--project", TODO])
                .unwrap();
        assert_eq!(command_name(&cli.command), "reconcile");
        assert!(cli.log_dir.is_none());
    }
}
