//! Configuration loader with tier-based merging.
//!
//! Tiers, lowest to highest priority: built-in defaults, project
//! `./.task-graph/config.yaml`, user `~/.task-graph/config.yaml`, then
//! environment variables. Objects merge field by field; scalars and arrays
//! are replaced.

use super::types::Config;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Explicit config file; replaces the project and user tiers.
pub const ENV_CONFIG_PATH: &str = "TASK_GRAPH_CONFIG_PATH";
pub const ENV_TASKS_PATH: &str = "TASK_GRAPH_TASKS_PATH";
pub const ENV_LOCK_TIMEOUT_MS: &str = "TASK_GRAPH_LOCK_TIMEOUT_MS";
pub const ENV_DEFAULT_TAG: &str = "TASK_GRAPH_DEFAULT_TAG";

const CONFIG_DIR: &str = ".task-graph";
const CONFIG_FILE: &str = "config.yaml";

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    Defaults = 0,
    Project = 1,
    User = 2,
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Directories searched for `config.yaml`.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub project_dir: Option<PathBuf>,
    pub user_dir: Option<PathBuf>,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::discover()
    }
}

impl ConfigPaths {
    pub fn discover() -> Self {
        Self {
            project_dir: Some(PathBuf::from(CONFIG_DIR)),
            user_dir: dirs::home_dir().map(|h| h.join(CONFIG_DIR)),
        }
    }

    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
        }
    }
}

/// Loaded configuration plus where each tier came from.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: Config,
    sources: Vec<(ConfigTier, Option<PathBuf>)>,
}

impl ConfigLoader {
    /// Load from the discovered tiers, honouring `TASK_GRAPH_CONFIG_PATH`.
    pub fn load() -> Result<Self> {
        match std::env::var_os(ENV_CONFIG_PATH) {
            Some(path) => Self::load_explicit(Path::new(&path)),
            None => Self::load_with_paths(&ConfigPaths::discover()),
        }
    }

    /// Load a single explicit file on top of the defaults, then apply env.
    pub fn load_explicit(path: &Path) -> Result<Self> {
        let mut layers = vec![serde_json::to_value(Config::default())?];
        layers.push(
            read_yaml(path)?.with_context(|| format!("config file not found: {}", path.display()))?,
        );
        let sources = vec![
            (ConfigTier::Defaults, None),
            (ConfigTier::Project, Some(path.to_path_buf())),
        ];
        Self::finish(layers, sources)
    }

    pub fn load_with_paths(paths: &ConfigPaths) -> Result<Self> {
        let mut layers = vec![serde_json::to_value(Config::default())?];
        let mut sources = vec![(ConfigTier::Defaults, None)];

        for (tier, dir) in [
            (ConfigTier::Project, paths.project_dir.as_ref()),
            (ConfigTier::User, paths.user_dir.as_ref()),
        ] {
            let Some(dir) = dir else { continue };
            let file = dir.join(CONFIG_FILE);
            match read_yaml(&file) {
                Ok(Some(value)) => {
                    debug!(tier = %tier, path = %file.display(), "Loaded config tier");
                    layers.push(value);
                    sources.push((tier, Some(file)));
                }
                Ok(None) => {}
                Err(e) => warn!(tier = %tier, path = %file.display(), error = %e, "Ignoring unreadable config"),
            }
        }

        Self::finish(layers, sources)
    }

    fn finish(layers: Vec<Value>, mut sources: Vec<(ConfigTier, Option<PathBuf>)>) -> Result<Self> {
        let merged = deep_merge_all(layers);
        let mut config: Config =
            serde_json::from_value(merged).context("invalid configuration")?;
        if apply_env_overrides(&mut config) {
            sources.push((ConfigTier::Environment, None));
        }
        Ok(Self { config, sources })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    pub fn sources(&self) -> &[(ConfigTier, Option<PathBuf>)] {
        &self.sources
    }
}

/// `Ok(None)` when the file does not exist.
fn read_yaml(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let value: Value = serde_yaml::from_str(&content)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(value))
}

/// Returns whether any override was applied.
fn apply_env_overrides(config: &mut Config) -> bool {
    let mut applied = false;

    if let Ok(path) = std::env::var(ENV_TASKS_PATH) {
        config.storage.tasks_path = PathBuf::from(path);
        applied = true;
    }
    if let Ok(timeout) = std::env::var(ENV_LOCK_TIMEOUT_MS) {
        match timeout.parse() {
            Ok(ms) => {
                config.storage.lock_timeout_ms = ms;
                applied = true;
            }
            Err(_) => warn!(value = %timeout, "Ignoring invalid {}", ENV_LOCK_TIMEOUT_MS),
        }
    }
    if let Ok(tag) = std::env::var(ENV_DEFAULT_TAG)
        && !tag.trim().is_empty()
    {
        config.tasks.default_tag = tag;
        applied = true;
    }

    applied
}

/// Deep merge two JSON values, with `overlay` taking precedence over `base`.
///
/// A null overlay means "not specified" and keeps the base value.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

fn deep_merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn merge_keeps_sibling_fields() {
        let base = json!({"analysis": {"bottleneck_threshold": 3, "high_effort_threshold": 4.0}});
        let overlay = json!({"analysis": {"bottleneck_threshold": 5}});
        assert_eq!(
            deep_merge(base, overlay),
            json!({"analysis": {"bottleneck_threshold": 5, "high_effort_threshold": 4.0}})
        );
    }

    #[test]
    fn null_overlay_preserves_base() {
        let base = json!({"tasks": {"default_tag": "master"}});
        let overlay = json!({"tasks": {"default_tag": null}});
        assert_eq!(deep_merge(base.clone(), overlay), base);
    }

    #[test]
    fn user_tier_overrides_project_tier() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        std::fs::write(
            project.path().join(CONFIG_FILE),
            "analysis:\n  bottleneck_threshold: 4\n  dependency_warning_threshold: 20\n",
        )
        .unwrap();
        std::fs::write(
            user.path().join(CONFIG_FILE),
            "analysis:\n  bottleneck_threshold: 6\n",
        )
        .unwrap();

        let paths = ConfigPaths::with_dirs(
            Some(project.path().to_path_buf()),
            Some(user.path().to_path_buf()),
        );
        let loader = ConfigLoader::load_with_paths(&paths).unwrap();
        let analysis = &loader.config().analysis;
        assert_eq!(analysis.bottleneck_threshold, 6);
        assert_eq!(analysis.dependency_warning_threshold, 20);
        assert_eq!(analysis.critical_dependents_threshold, 3);
        assert!(loader.sources().iter().any(|(t, _)| *t == ConfigTier::User));
    }

    #[test]
    fn missing_tiers_fall_back_to_defaults() {
        let empty = TempDir::new().unwrap();
        let paths = ConfigPaths::with_dirs(Some(empty.path().join("none")), None);
        let loader = ConfigLoader::load_with_paths(&paths).unwrap();
        assert_eq!(loader.config().analysis, Config::default().analysis);
    }

    #[test]
    fn explicit_file_must_exist() {
        let dir = TempDir::new().unwrap();
        assert!(ConfigLoader::load_explicit(&dir.path().join("missing.yaml")).is_err());
    }
}
