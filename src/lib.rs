//! Task Graph Library
//!
//! Task storage and CRUD, a validated dependency graph, graph analytics,
//! and report rendering. The `task-graph` binary is a thin CLI over
//! [`manager::TaskManager`] and [`graph::deps::DependencyGraphManager`].

pub mod cli;
pub mod collection;
pub mod config;
pub mod error;
pub mod graph;
pub mod logging;
pub mod manager;
pub mod render;
pub mod store;
pub mod types;
