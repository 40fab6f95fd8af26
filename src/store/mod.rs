//! Durable storage for task collections.
//!
//! One JSON document per project holds every tag:
//! `{ "tags": { "<tag>": { "tasks": [...] } }, "currentTag": "..." }`.
//! Writes go to a temp file in the same directory and are renamed into
//! place, so a crash never leaves a half-written document behind.

pub mod lock;

use crate::collection::TaskCollection;
use crate::error::{Error, FieldIssue, Result};
use crate::types::TaskStatus;
use lock::FileLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Default time to wait for the document lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(5000);

/// Tag every project starts with; it cannot be deleted.
pub const DEFAULT_TAG: &str = "master";

/// The persisted project document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDocument {
    #[serde(default)]
    pub tags: BTreeMap<String, TaskCollection>,
    /// Kept for file compatibility with other tools. Engine operations
    /// always receive their tag explicitly and never read this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_tag: Option<String>,
}

/// Summary of one tag for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagSummary {
    pub name: String,
    pub task_count: usize,
    pub completed_count: usize,
}

/// Handle to the project's task document.
#[derive(Debug, Clone)]
pub struct TaskStore {
    path: PathBuf,
    lock_timeout: Duration,
}

impl TaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn lock(&self) -> Result<FileLock> {
        FileLock::acquire(self.lock_path(), self.lock_timeout)
    }

    /// Read and validate the whole document. A missing file is an error.
    pub fn read_document(&self) -> Result<ProjectDocument> {
        let content = fs::read_to_string(&self.path).map_err(|e| Error::storage(&self.path, e))?;
        let document: ProjectDocument =
            serde_json::from_str(&content).map_err(|e| Error::storage(&self.path, e))?;

        let mut issues = Vec::new();
        for (name, collection) in &document.tags {
            if let Err(Error::Validation { issues: tag_issues }) = collection.validate_shape() {
                issues.extend(tag_issues.into_iter().map(|issue| {
                    FieldIssue::new(format!("tags.{}.{}", name, issue.field), issue.reason)
                }));
            }
        }
        if !issues.is_empty() {
            return Err(Error::Validation { issues });
        }

        debug!(
            path = %self.path.display(),
            tags = document.tags.len(),
            "Loaded task document"
        );
        Ok(document)
    }

    /// Like [`read_document`](Self::read_document), but an absent file is an
    /// empty project. A present but corrupt file is still an error.
    fn read_document_or_default(&self) -> Result<ProjectDocument> {
        if self.path.exists() {
            self.read_document()
        } else {
            debug!(path = %self.path.display(), "No task document yet, starting empty");
            Ok(ProjectDocument::default())
        }
    }

    fn write_document(&self, document: &ProjectDocument) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| Error::storage(&dir, e))?;

        let mut json =
            serde_json::to_string_pretty(document).map_err(|e| Error::storage(&self.path, e))?;
        json.push('\n');

        // Temp file in the target directory so the rename stays on one filesystem.
        let mut temp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| Error::storage(&dir, e))?;
        temp.write_all(json.as_bytes())
            .map_err(|e| Error::storage(temp.path(), e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| Error::storage(temp.path(), e))?;
        temp.persist(&self.path)
            .map_err(|e| Error::storage(&self.path, e.error))?;

        debug!(path = %self.path.display(), bytes = json.len(), "Wrote task document");
        Ok(())
    }

    /// Load one tag. Fails if the document is missing or corrupt; a tag
    /// that does not exist yet in a valid document is empty.
    pub fn load(&self, tag: &str) -> Result<TaskCollection> {
        let mut document = self.read_document()?;
        Ok(document.tags.remove(tag).unwrap_or_default())
    }

    /// Replace one tag's contents, leaving the other tags untouched.
    ///
    /// The collection must pass the same shape checks as a load.
    pub fn save(&self, tag: &str, collection: &TaskCollection) -> Result<()> {
        collection.validate_shape()?;
        let _guard = self.lock()?;
        let mut document = self.read_document_or_default()?;
        document.tags.insert(tag.to_string(), collection.clone());
        self.write_document(&document)
    }

    /// Run a read-only query against a tag.
    pub fn with_tag<F, T>(&self, tag: &str, f: F) -> Result<T>
    where
        F: FnOnce(&TaskCollection) -> Result<T>,
    {
        let mut document = self.read_document_or_default()?;
        let collection = document.tags.remove(tag).unwrap_or_default();
        f(&collection)
    }

    /// Run a mutation against a tag under the exclusive document lock.
    ///
    /// `f` works on a copy. The copy is persisted only if `f` succeeds and
    /// actually changed something; on error the document is untouched.
    pub fn with_tag_mut<F, T>(&self, tag: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut TaskCollection) -> Result<T>,
    {
        let _guard = self.lock()?;
        let mut document = self.read_document_or_default()?;
        let original = document.tags.get(tag);
        let mut working = original.cloned().unwrap_or_default();

        let out = f(&mut working)?;

        if original != Some(&working) {
            document.tags.insert(tag.to_string(), working);
            self.write_document(&document)?;
        }
        Ok(out)
    }

    pub fn list_tags(&self) -> Result<Vec<TagSummary>> {
        let document = self.read_document_or_default()?;
        let mut tags: Vec<TagSummary> = document
            .tags
            .iter()
            .map(|(name, collection)| TagSummary {
                name: name.clone(),
                task_count: collection.tasks.len(),
                completed_count: collection
                    .tasks
                    .iter()
                    .filter(|t| t.status == TaskStatus::Done)
                    .count(),
            })
            .collect();
        if !tags.iter().any(|t| t.name == DEFAULT_TAG) {
            tags.insert(
                0,
                TagSummary {
                    name: DEFAULT_TAG.to_string(),
                    task_count: 0,
                    completed_count: 0,
                },
            );
        }
        Ok(tags)
    }

    /// Copy every task of `from` into a new tag `to`.
    pub fn copy_tag(&self, from: &str, to: &str) -> Result<usize> {
        if to.trim().is_empty() {
            return Err(Error::missing_field("tag"));
        }
        let _guard = self.lock()?;
        let mut document = self.read_document_or_default()?;
        if document.tags.contains_key(to) {
            return Err(Error::validation("tag", format!("tag '{}' already exists", to)));
        }
        let Some(source) = document.tags.get(from).cloned() else {
            return Err(Error::validation("tag", format!("tag '{}' does not exist", from)));
        };
        let count = source.tasks.len();
        let mut copy = source;
        copy.metadata = Some(crate::collection::TagMetadata {
            description: Some(format!("Copied from '{}'", from)),
            created_at: Some(chrono::Utc::now()),
        });
        document.tags.insert(to.to_string(), copy);
        self.write_document(&document)?;
        info!(from, to, tasks = count, "Copied tag");
        Ok(count)
    }

    pub fn delete_tag(&self, name: &str) -> Result<usize> {
        if name == DEFAULT_TAG {
            return Err(Error::validation("tag", "the master tag cannot be deleted"));
        }
        let _guard = self.lock()?;
        let mut document = self.read_document_or_default()?;
        let Some(removed) = document.tags.remove(name) else {
            return Err(Error::validation("tag", format!("tag '{}' does not exist", name)));
        };
        if document.current_tag.as_deref() == Some(name) {
            document.current_tag = Some(DEFAULT_TAG.to_string());
        }
        self.write_document(&document)?;
        info!(tag = name, tasks = removed.tasks.len(), "Deleted tag");
        Ok(removed.tasks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Task;
    use tempfile::TempDir;

    fn setup() -> (TempDir, TaskStore) {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path().join("tasks/tasks.json"));
        (dir, store)
    }

    #[test]
    fn load_missing_file_is_storage_error() {
        let (_dir, store) = setup();
        let err = store.load("master").unwrap_err();
        assert!(matches!(err, Error::Storage { .. }));
    }

    #[test]
    fn load_corrupt_file_is_storage_error() {
        let (_dir, store) = setup();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{ \"tags\": { \"master\": ").unwrap();
        let err = store.load("master").unwrap_err();
        assert!(matches!(err, Error::Storage { .. }));
        // Queries must not paper over corruption either.
        assert!(store.with_tag("master", |c| Ok(c.tasks.len())).is_err());
    }

    #[test]
    fn save_then_load_roundtrip() {
        let (_dir, store) = setup();
        let mut task = Task::new("1", "Setup").with_estimate(3.5);
        task.tags = vec!["infra".into()];
        let collection = TaskCollection::from_tasks(vec![
            task,
            Task::new("2", "Build").with_dependencies(["1"]),
        ]);

        store.save("master", &collection).unwrap();
        assert_eq!(store.load("master").unwrap(), collection);
        assert!(store.load("feature").unwrap().is_empty());
    }

    #[test]
    fn save_leaves_no_temp_files() {
        let (_dir, store) = setup();
        store.save("master", &TaskCollection::new()).unwrap();
        let dir = store.path().parent().unwrap();
        let names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().all(|n| n == "tasks.json" || n == "tasks.json.lock"));
    }

    #[test]
    fn failed_mutation_does_not_write() {
        let (_dir, store) = setup();
        store
            .save("master", &TaskCollection::from_tasks(vec![Task::new("1", "A")]))
            .unwrap();
        let before = fs::read(store.path()).unwrap();

        let result: Result<()> = store.with_tag_mut("master", |c| {
            c.tasks.clear();
            Err(Error::missing_field("title"))
        });
        assert!(result.is_err());
        assert_eq!(fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn malformed_record_is_rejected_on_load() {
        let (_dir, store) = setup();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(
            store.path(),
            r#"{"tags":{"master":{"tasks":[{"id":"1","title":"  ","status":"pending"}]}}}"#,
        )
        .unwrap();
        let Err(Error::Validation { issues }) = store.load("master") else {
            panic!("expected validation error");
        };
        assert_eq!(issues[0].field, "tags.master.tasks[0].title");
    }

    #[test]
    fn save_rejects_duplicate_ids_and_keeps_other_tags_loadable() {
        let (_dir, store) = setup();
        store
            .save("master", &TaskCollection::from_tasks(vec![Task::new("1", "A")]))
            .unwrap();
        let before = fs::read(store.path()).unwrap();

        let broken = TaskCollection::from_tasks(vec![Task::new("1", "One"), Task::new("1", "Again")]);
        let Err(Error::Validation { issues }) = store.save("feature", &broken) else {
            panic!("expected validation error");
        };
        assert_eq!(issues[0].field, "tasks[1].id");

        assert_eq!(fs::read(store.path()).unwrap(), before);
        assert_eq!(store.load("master").unwrap().tasks.len(), 1);
    }

    #[test]
    fn tag_management() {
        let (_dir, store) = setup();
        store
            .save("master", &TaskCollection::from_tasks(vec![Task::new("1", "A")]))
            .unwrap();
        assert_eq!(store.copy_tag("master", "feature").unwrap(), 1);
        assert!(store.copy_tag("master", "feature").is_err());

        let names: Vec<String> = store.list_tags().unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["feature", "master"]);

        assert!(store.delete_tag("master").is_err());
        assert_eq!(store.delete_tag("feature").unwrap(), 1);
        assert!(store.delete_tag("feature").is_err());
    }
}
