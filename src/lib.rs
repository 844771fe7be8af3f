//! stm - Smart Task Manager Library
//!
//! This library provides the core functionality for the stm CLI tool:
//! a persisted task collection with search, status filtering, summary
//! counts, and AI-generated subtask suggestions.
//!
//! # Core Concepts
//!
//! - **Tasks**: titled work items with a due date, status and subtasks
//! - **Store**: the whole collection serialized under one key
//! - **Projection**: query + status filter over the collection
//! - **Suggestions**: an external service proposes 3-5 subtasks
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `config.toml`
//! - `error`: Error types and result aliases
//! - `lock`: File locking and atomic writes
//! - `output`: Human and JSON output envelopes
//! - `projection`: Search, status filter and stats
//! - `storage`: Key-value backends (file and in-memory)
//! - `store`: Task collection CRUD over a key-value backend
//! - `suggest`: Subtask suggestion clients
//! - `task`: Task model and patches

pub mod cli;
pub mod config;
pub mod error;
pub mod lock;
pub mod output;
pub mod projection;
pub mod storage;
pub mod store;
pub mod suggest;
pub mod task;

pub use error::{Error, Result};
