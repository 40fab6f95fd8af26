//! Configuration system.
//!
//! Merges built-in defaults, project and user `config.yaml` files, and
//! environment variables field by field.
//!
//! ## Environment Variables
//! - `TASK_GRAPH_CONFIG_PATH` - Explicit config file (replaces project/user tiers)
//! - `TASK_GRAPH_TASKS_PATH` - Task document path
//! - `TASK_GRAPH_LOCK_TIMEOUT_MS` - Lock wait for mutations
//! - `TASK_GRAPH_DEFAULT_TAG` - Tag used when none is given

mod loader;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier, deep_merge};
pub use types::*;
