//! Configuration types and structures.

use crate::store::{DEFAULT_LOCK_TIMEOUT, DEFAULT_TAG};
use crate::types::Priority;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub tasks: TaskSettings,

    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Where tasks are persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the task document.
    #[serde(default = "default_tasks_path")]
    pub tasks_path: PathBuf,

    /// How long a mutation waits for the document lock.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            tasks_path: default_tasks_path(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl StorageConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

fn default_tasks_path() -> PathBuf {
    PathBuf::from(".taskmaster/tasks/tasks.json")
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT.as_millis() as u64
}

/// Task defaults and lifecycle policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSettings {
    /// Tag used by the CLI when `--tag` is not given.
    #[serde(default = "default_tag")]
    pub default_tag: String,

    /// Priority assigned to new tasks that do not specify one.
    #[serde(default)]
    pub default_priority: Priority,

    /// Reject status changes outside the conventional workflow instead of
    /// only logging them.
    #[serde(default)]
    pub strict_transitions: bool,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            default_tag: default_tag(),
            default_priority: Priority::default(),
            strict_transitions: false,
        }
    }
}

fn default_tag() -> String {
    DEFAULT_TAG.to_string()
}

/// Heuristic constants for graph analytics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// A task with at least this many direct dependents is critical.
    #[serde(default = "default_critical_dependents")]
    pub critical_dependents_threshold: usize,

    /// A task with at least this many transitive dependents is critical.
    #[serde(default = "default_critical_total_impact")]
    pub critical_total_impact_threshold: usize,

    /// Dependent count at which a task is reported as a bottleneck.
    #[serde(default = "default_bottleneck")]
    pub bottleneck_threshold: usize,

    /// Effort (hours) from which a task with dependents joins the critical path.
    #[serde(default = "default_high_effort")]
    pub high_effort_threshold: f64,

    /// Dependency count above which validation emits a warning.
    #[serde(default = "default_dependency_warning")]
    pub dependency_warning_threshold: usize,

    #[serde(default)]
    pub priority_weights: PriorityWeights,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            critical_dependents_threshold: default_critical_dependents(),
            critical_total_impact_threshold: default_critical_total_impact(),
            bottleneck_threshold: default_bottleneck(),
            high_effort_threshold: default_high_effort(),
            dependency_warning_threshold: default_dependency_warning(),
            priority_weights: PriorityWeights::default(),
        }
    }
}

fn default_critical_dependents() -> usize {
    3
}

fn default_critical_total_impact() -> usize {
    5
}

fn default_bottleneck() -> usize {
    3
}

fn default_high_effort() -> f64 {
    4.0
}

fn default_dependency_warning() -> usize {
    10
}

/// Critical-path ranking weight per priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityWeights {
    #[serde(default = "weight_low")]
    pub low: f64,
    #[serde(default = "weight_medium")]
    pub medium: f64,
    #[serde(default = "weight_high")]
    pub high: f64,
    #[serde(default = "weight_critical")]
    pub critical: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            low: weight_low(),
            medium: weight_medium(),
            high: weight_high(),
            critical: weight_critical(),
        }
    }
}

impl PriorityWeights {
    pub fn weight(&self, priority: Priority) -> f64 {
        match priority {
            Priority::Low => self.low,
            Priority::Medium => self.medium,
            Priority::High => self.high,
            Priority::Critical => self.critical,
        }
    }
}

fn weight_low() -> f64 {
    1.0
}

fn weight_medium() -> f64 {
    2.0
}

fn weight_high() -> f64 {
    3.0
}

fn weight_critical() -> f64 {
    4.0
}
