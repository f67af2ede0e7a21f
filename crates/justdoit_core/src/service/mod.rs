//! Board use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls and the ordering engine into use cases.
//! - Keep CLI and other callers decoupled from storage details.

pub mod board_service;
pub mod move_service;
