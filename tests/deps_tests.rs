//! Integration tests for dependency mutation, validation, and analytics.

use std::fs;
use task_graph::collection::TaskCollection;
use task_graph::config::{AnalysisConfig, TaskSettings};
use task_graph::error::{Error, ErrorCode};
use task_graph::graph::IssueKind;
use task_graph::graph::deps::DependencyGraphManager;
use task_graph::manager::TaskManager;
use task_graph::store::TaskStore;
use task_graph::types::{NewTask, Priority, Task, TaskStatus};
use tempfile::TempDir;

const TAG: &str = "master";

/// Helper to create both managers over a fresh task document.
fn setup() -> (TempDir, TaskManager, DependencyGraphManager) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = TaskStore::new(dir.path().join("tasks.json"));
    let tasks = TaskManager::new(store.clone(), TaskSettings::default());
    let deps = DependencyGraphManager::new(store, AnalysisConfig::default());
    (dir, tasks, deps)
}

fn seed(deps: &DependencyGraphManager, tasks: Vec<Task>) {
    deps.store()
        .save(TAG, &TaskCollection::from_tasks(tasks))
        .expect("Failed to seed tasks");
}

fn ids(manager: &TaskManager, n: usize) {
    for i in 1..=n {
        manager
            .create_task(TAG, NewTask::titled(format!("Task {}", i)))
            .expect("Failed to create task");
    }
}

/// B -> A, C -> {A, B}, D -> C.
fn diamond_chain() -> Vec<Task> {
    vec![
        Task::new("A", "Alpha"),
        Task::new("B", "Bravo").with_dependencies(["A"]),
        Task::new("C", "Charlie").with_dependencies(["A", "B"]),
        Task::new("D", "Delta").with_dependencies(["C"]),
    ]
}

mod mutation_tests {
    use super::*;

    #[test]
    fn add_and_remove_dependency() {
        let (_dir, tasks, deps) = setup();
        ids(&tasks, 2);

        assert!(deps.add_dependency("2", "1", TAG).unwrap());
        assert_eq!(tasks.get_task("2", TAG).unwrap().dependencies, vec!["1"]);

        assert!(deps.remove_dependency("2", "1", TAG).unwrap());
        assert!(tasks.get_task("2", TAG).unwrap().dependencies.is_empty());
        assert!(!deps.remove_dependency("2", "1", TAG).unwrap());
    }

    #[test]
    fn duplicate_add_is_a_no_op() {
        let (_dir, tasks, deps) = setup();
        ids(&tasks, 2);
        deps.add_dependency("2", "1", TAG).unwrap();
        let before = fs::read(deps.store().path()).unwrap();

        assert!(!deps.add_dependency("2", "1", TAG).unwrap());
        assert_eq!(fs::read(deps.store().path()).unwrap(), before);
    }

    #[test]
    fn self_dependency_is_a_validation_error() {
        let (_dir, tasks, deps) = setup();
        ids(&tasks, 1);

        let err = deps.add_dependency("1", "1", TAG).unwrap_err();
        match err {
            Error::Validation { issues } => assert_eq!(issues[0].field, "dependencies"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let (_dir, tasks, deps) = setup();
        ids(&tasks, 1);

        let err = deps.add_dependency("1", "9", TAG).unwrap_err();
        assert!(matches!(err, Error::TaskNotFound { ref id, .. } if id == "9"));
        let err = deps.add_dependency("9", "1", TAG).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn cycle_is_rejected_and_file_untouched() {
        let (_dir, _tasks, deps) = setup();
        seed(&deps, diamond_chain());
        let before = fs::read(deps.store().path()).unwrap();

        let err = deps.add_dependency("A", "D", TAG).unwrap_err();
        let Error::CircularDependency { cycle } = err else {
            panic!("expected a circular dependency error");
        };
        // D -> C -> A closes first; the longer loop through B is not reported.
        assert_eq!(cycle, vec!["A", "D", "C", "A"]);

        assert_eq!(fs::read(deps.store().path()).unwrap(), before);
    }

    #[test]
    fn two_node_cycle_is_rejected() {
        let (_dir, tasks, deps) = setup();
        ids(&tasks, 2);
        deps.add_dependency("2", "1", TAG).unwrap();

        let err = deps.add_dependency("1", "2", TAG).unwrap_err();
        assert!(matches!(err, Error::CircularDependency { ref cycle } if cycle == &["1", "2", "1"]));
    }

    #[test]
    fn remove_then_add_restores_adjacency() {
        let (_dir, _tasks, deps) = setup();
        seed(&deps, diamond_chain());
        let before = deps.get_dependencies("C", TAG).unwrap();

        deps.remove_dependency("C", "B", TAG).unwrap();
        deps.add_dependency("C", "B", TAG).unwrap();

        let after = deps.get_dependencies("C", TAG).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn subtasks_participate_in_the_graph() {
        let (_dir, tasks, deps) = setup();
        ids(&tasks, 1);
        tasks
            .create_subtask("1", NewTask::titled("Child"), TAG)
            .unwrap();
        ids(&tasks, 1);

        deps.add_dependency("2", "1.1", TAG).unwrap();
        let dependents = deps.get_dependents("1.1", TAG).unwrap();
        assert_eq!(dependents.len(), 1);
        assert_eq!(dependents[0].id, "2");
    }
}

mod validation_tests {
    use super::*;

    #[test]
    fn hand_edited_cycle_is_reported() {
        let (_dir, _tasks, deps) = setup();
        let mut tasks = diamond_chain();
        tasks[0].dependencies = vec!["D".into()];
        seed(&deps, tasks);

        let report = deps.validate_dependencies(TAG).unwrap();
        assert!(!report.valid);
        assert!(report.errors.is_empty());
        let expected: Vec<String> = ["A", "D", "C", "B", "A"].iter().map(|s| s.to_string()).collect();
        assert!(
            report.cycles.contains(&expected),
            "cycles were {:?}",
            report.cycles
        );
    }

    #[test]
    fn clean_graph_is_valid() {
        let (_dir, _tasks, deps) = setup();
        seed(&deps, diamond_chain());

        let report = deps.validate_dependencies(TAG).unwrap();
        assert!(report.valid);
        assert!(report.cycles.is_empty());
        assert!(report.errors.is_empty());
    }

    #[test]
    fn dangling_self_and_duplicate_references() {
        let (_dir, _tasks, deps) = setup();
        seed(
            &deps,
            vec![
                Task::new("1", "One").with_dependencies(["1", "7"]),
                Task::new("2", "Two").with_dependencies(["1", "1"]),
            ],
        );

        let report = deps.validate_dependencies(TAG).unwrap();
        assert!(!report.valid);
        let kinds: Vec<(String, IssueKind)> = report
            .errors
            .iter()
            .map(|e| (e.task_id.clone(), e.kind))
            .collect();
        assert!(kinds.contains(&("1".to_string(), IssueKind::SelfReference)));
        assert!(kinds.contains(&("1".to_string(), IssueKind::Missing)));
        assert!(kinds.contains(&("2".to_string(), IssueKind::Duplicate)));
    }

    #[test]
    fn fix_deps_drops_bad_references_but_keeps_cycles() {
        let (_dir, _tasks, deps) = setup();
        seed(
            &deps,
            vec![
                Task::new("1", "One").with_dependencies(["2", "1", "ghost"]),
                Task::new("2", "Two").with_dependencies(["1", "1"]),
            ],
        );

        let summary = deps.fix_dependencies(TAG).unwrap();
        assert!(summary.changed());
        assert_eq!(summary.removed.len(), 3);
        assert_eq!(summary.remaining_cycles.len(), 1);

        let stored = deps.store().load(TAG).unwrap();
        assert_eq!(stored.tasks[0].dependencies, vec!["2"]);
        assert_eq!(stored.tasks[1].dependencies, vec!["1"]);

        let again = deps.fix_dependencies(TAG).unwrap();
        assert!(!again.changed());
    }

    #[test]
    fn dangling_dependencies_resolve_to_placeholders() {
        let (_dir, _tasks, deps) = setup();
        seed(
            &deps,
            vec![
                Task::new("1", "One").with_status(TaskStatus::Done),
                Task::new("2", "Two").with_dependencies(["1", "gone"]),
            ],
        );

        let refs = deps.get_dependencies("2", TAG).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].title, "One");
        assert_eq!(refs[0].status, Some(TaskStatus::Done));
        assert!(refs[1].is_placeholder());
        assert_eq!(refs[1].id, "gone");
    }
}

mod analytics_tests {
    use super::*;

    #[test]
    fn impact_of_a_hub_task() {
        let (_dir, _tasks, deps) = setup();
        seed(
            &deps,
            vec![
                Task::new("X", "Hub"),
                Task::new("D1", "d1").with_dependencies(["X"]),
                Task::new("D2", "d2").with_dependencies(["X"]),
                Task::new("D3", "d3").with_dependencies(["X"]),
                Task::new("D4", "d4").with_dependencies(["X"]),
                Task::new("E1", "e1").with_dependencies(["D1"]),
                Task::new("E2", "e2").with_dependencies(["D2"]),
            ],
        );

        let impact = deps.impact_analysis(TAG).unwrap();
        let hub = impact.iter().find(|i| i.id == "X").unwrap();
        assert_eq!(hub.direct_dependents, 4);
        assert_eq!(hub.total_impact, 6);
        assert_eq!(hub.impact_score, 14);
        assert!(hub.is_critical);

        let leaf = impact.iter().find(|i| i.id == "E1").unwrap();
        assert_eq!(leaf.total_impact, 0);
        assert!(!leaf.is_critical);
    }

    #[test]
    fn critical_path_empty_without_qualifying_tasks() {
        let (_dir, _tasks, deps) = setup();
        seed(
            &deps,
            vec![
                Task::new("1", "Big but alone").with_estimate(10.0),
                Task::new("2", "Small").with_dependencies(["3"]),
                Task::new("3", "Cheap base").with_estimate(2.0),
            ],
        );
        assert!(deps.critical_path(TAG).unwrap().is_empty());
    }

    #[test]
    fn critical_path_ranks_by_weighted_effort() {
        let (_dir, _tasks, deps) = setup();
        seed(
            &deps,
            vec![
                Task::new("1", "Urgent").with_priority(Priority::High),
                Task::new("2", "Heavy base").with_estimate(6.0),
                Task::new("3", "Needs base").with_dependencies(["2"]),
                Task::new("4", "On fire")
                    .with_priority(Priority::Critical)
                    .with_estimate(2.0),
            ],
        );

        let path: Vec<(String, f64)> = deps
            .critical_path(TAG)
            .unwrap()
            .into_iter()
            .map(|e| (e.id, e.score))
            .collect();
        assert_eq!(
            path,
            vec![
                ("2".to_string(), 12.0),
                ("4".to_string(), 8.0),
                ("1".to_string(), 3.0)
            ]
        );
    }
}
