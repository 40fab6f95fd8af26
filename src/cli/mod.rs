//! CLI command definitions for task-graph
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod graph;
pub mod task;

use crate::logging::LogTarget;
use clap::{Parser, Subcommand};
use graph::GraphArgs;
use std::path::PathBuf;
use task::{AddArgs, ListArgs, UpdateArgs};

/// Task tracking with a validated dependency graph
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (skips project and user config)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the task document (overrides config)
    #[arg(short, long, global = true)]
    pub file: Option<PathBuf>,

    /// Tag to operate on (overrides config)
    #[arg(short, long, global = true)]
    pub tag: Option<String>,

    /// Print results and errors as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: LogTarget,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a top-level task
    Add(AddArgs),

    /// Create a subtask under an existing task
    AddSubtask {
        /// Parent task id
        parent: String,

        #[command(flatten)]
        task: AddArgs,
    },

    /// Change fields of a task or subtask
    Update(UpdateArgs),

    /// Change the status of a task or subtask
    SetStatus {
        id: String,
        /// pending, in-progress, blocked, review, done, deferred, cancelled
        status: crate::types::TaskStatus,
    },

    /// Delete a task and its subtasks
    Remove {
        id: String,

        /// Delete even when other tasks depend on it, and strip those references
        #[arg(long)]
        force: bool,
    },

    /// List tasks
    List(ListArgs),

    /// Show one task
    Show { id: String },

    /// Show the next actionable task
    Next,

    /// Summary counts for the tag
    Stats,

    /// Make TASK depend on DEPENDS_ON
    AddDep { task: String, depends_on: String },

    /// Remove the dependency of TASK on DEPENDS_ON
    RemoveDep { task: String, depends_on: String },

    /// Check every dependency reference and report cycles
    Validate,

    /// Drop dangling, self, and duplicate dependency references
    FixDeps,

    /// Show what a task depends on and what depends on it
    Deps { id: String },

    /// Rank structurally significant tasks
    CriticalPath,

    /// Downstream impact of every task
    Impact,

    /// Render the dependency graph
    Graph(GraphArgs),

    /// Manage tags
    #[command(subcommand)]
    Tags(TagsCommand),
}

#[derive(Subcommand, Debug)]
pub enum TagsCommand {
    /// List tags with task counts
    List,

    /// Copy every task of one tag into a new tag
    Copy { from: String, to: String },

    /// Delete a tag and its tasks
    Delete { name: String },
}
