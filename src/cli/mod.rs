//! Command-line interface for stm
//!
//! This module defines the CLI structure using clap derive macros.
//! Task commands live in `task`, setup in `init`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;

mod init;
mod task;

/// stm - Smart Task Manager
///
/// Track tasks with due dates in a local store, search and filter them,
/// and ask an AI service to break a task into subtasks.
#[derive(Parser, Debug)]
#[command(name = "stm")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory holding config.toml and the task store
    #[arg(long, global = true, env = "STM_DIR")]
    pub dir: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directory and a default config.toml
    Init,

    /// Create a task
    Add {
        /// Task title
        title: String,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: String,

        /// Longer description
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// List tasks, newest first
    List {
        /// Case-insensitive text to find in title or description
        #[arg(long, default_value = "")]
        query: String,

        /// Status filter: all, pending, completed
        #[arg(long, default_value = "all")]
        status: String,
    },

    /// Show one task
    Show {
        /// Task id or unique prefix
        id: String,
    },

    /// Edit title, description, or due date
    Edit {
        /// Task id or unique prefix
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
    },

    /// Mark a task completed
    Done {
        /// Task id or unique prefix
        id: String,
    },

    /// Mark a task pending again
    Reopen {
        /// Task id or unique prefix
        id: String,
    },

    /// Flip a task between pending and completed
    Toggle {
        /// Task id or unique prefix
        id: String,
    },

    /// Delete a task
    Delete {
        /// Task id or unique prefix
        id: String,
    },

    /// Subtask management
    #[command(subcommand)]
    Subtasks(SubtasksCommands),

    /// Ask the suggestion service to break a task into subtasks
    Suggest {
        /// Task id or unique prefix
        id: String,
    },

    /// Show total, completed, pending and overdue counts
    Stats,
}

/// Subtask subcommands
#[derive(Subcommand, Debug)]
pub enum SubtasksCommands {
    /// Replace the subtask list
    Set {
        /// Task id or unique prefix
        id: String,

        /// Subtasks in order
        #[arg(required = true)]
        items: Vec<String>,
    },

    /// Remove all subtasks
    Clear {
        /// Task id or unique prefix
        id: String,
    },
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let global = task::GlobalOptions {
            dir: self.dir,
            json: self.json,
            quiet: self.quiet,
        };

        match self.command {
            Commands::Init => init::run(global.dir, global.json, global.quiet),
            Commands::Add {
                title,
                due,
                description,
            } => task::run_add(
                task::AddOptions {
                    title,
                    due,
                    description,
                },
                global,
            ),
            Commands::List { query, status } => {
                task::run_list(task::ListOptions { query, status }, global)
            }
            Commands::Show { id } => task::run_show(id, global),
            Commands::Edit {
                id,
                title,
                description,
                due,
            } => task::run_edit(
                task::EditOptions {
                    id,
                    title,
                    description,
                    due,
                },
                global,
            ),
            Commands::Done { id } => task::run_set_status(id, task::StatusChange::Complete, global),
            Commands::Reopen { id } => task::run_set_status(id, task::StatusChange::Reopen, global),
            Commands::Toggle { id } => task::run_set_status(id, task::StatusChange::Toggle, global),
            Commands::Delete { id } => task::run_delete(id, global),
            Commands::Subtasks(cmd) => match cmd {
                SubtasksCommands::Set { id, items } => {
                    task::run_subtasks(id, items, "subtasks set", global)
                }
                SubtasksCommands::Clear { id } => {
                    task::run_subtasks(id, Vec::new(), "subtasks clear", global)
                }
            },
            Commands::Suggest { id } => task::run_suggest(id, global),
            Commands::Stats => task::run_stats(global),
        }
    }
}
