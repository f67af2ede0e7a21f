//! Core board logic for JustDoIt.
//! Task ordering, moves and column membership live here; HTTP, auth and
//! rendering stay outside this crate.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod ordering;
pub mod repo;
pub mod service;
pub mod view;

pub use config::{init_ordering_config, ordering_config, ConfigError, OrderingConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::board::{
    BoardValidationError, Column, ColumnId, NewTask, ProjectId, SiblingOrder, Task,
    TaskFieldUpdate, TaskId, TaskPatch,
};
pub use ordering::{assign_order, OrderAssignment, OrderError};
pub use repo::board_repo::{
    BoardRepoError, BoardRepoResult, BoardRepository, SqliteBoardRepository,
};
pub use service::board_service::{BoardService, BoardServiceError, ReconcileReport};
pub use service::move_service::{
    DropIndexBasis, MoveError, MoveRequest, MoveResponse, MoveService, MovedTask,
};
pub use view::local_board::{LocalBoard, LocalBoardError, MoveState, PendingMove};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
