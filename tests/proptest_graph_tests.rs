//! Property-based tests for dependency graph invariants.
//!
//! These tests verify the behavioral contracts of the dependency graph:
//! - Cycle detection agrees with a topological-sort oracle
//! - Every reported cycle is a closed walk over real edges
//! - Guarded insertion through the manager never produces a cycle
//! - Adding an edge never shrinks anyone's impact

use proptest::prelude::*;
use std::collections::{HashMap, HashSet, VecDeque};
use task_graph::collection::TaskCollection;
use task_graph::config::AnalysisConfig;
use task_graph::error::Error;
use task_graph::graph::DependencyGraph;
use task_graph::graph::analysis::impact_analysis;
use task_graph::graph::deps::DependencyGraphManager;
use task_graph::store::TaskStore;
use task_graph::types::Task;
use tempfile::TempDir;

// =============================================================================
// Strategies for generating test data
// =============================================================================

/// Arbitrary graph over `t0..tN`: edges may form cycles, never self loops.
fn graph_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<Task>> {
    (2..=max_tasks).prop_flat_map(|n| {
        proptest::collection::vec((0..n, 0..n), 0..=n * 2).prop_map(move |pairs| {
            let mut tasks: Vec<Task> = (0..n).map(|i| Task::new(format!("t{i}"), format!("Task {i}"))).collect();
            for (from, to) in pairs {
                let dep = format!("t{to}");
                if from != to && !tasks[from].dependencies.contains(&dep) {
                    tasks[from].dependencies.push(dep);
                }
            }
            tasks
        })
    })
}

/// DAG: a task may only depend on tasks with a lower index.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<Task>> {
    (1..=max_tasks).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<prop::sample::Index>(), 0..=3), n).prop_map(
            move |picks| {
                picks
                    .into_iter()
                    .enumerate()
                    .map(|(i, choices)| {
                        let mut task = Task::new(format!("t{i}"), format!("Task {i}"));
                        if i > 0 {
                            for choice in choices {
                                let dep = format!("t{}", choice.index(i));
                                if !task.dependencies.contains(&dep) {
                                    task.dependencies.push(dep);
                                }
                            }
                        }
                        task
                    })
                    .collect()
            },
        )
    })
}

// =============================================================================
// Oracles
// =============================================================================

/// Kahn's algorithm: acyclic iff every node can be peeled off.
fn is_acyclic(tasks: &[Task]) -> bool {
    let mut indegree: HashMap<&str, usize> = tasks.iter().map(|t| (t.id.as_str(), 0)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for task in tasks {
        for dep in &task.dependencies {
            *indegree.entry(task.id.as_str()).or_default() += 1;
            dependents.entry(dep.as_str()).or_default().push(task.id.as_str());
        }
    }

    let mut queue: VecDeque<&str> = indegree.iter().filter(|(_, d)| **d == 0).map(|(id, _)| *id).collect();
    let mut seen = 0;
    while let Some(id) = queue.pop_front() {
        seen += 1;
        for next in dependents.get(id).into_iter().flatten().copied() {
            if let Some(d) = indegree.get_mut(next) {
                *d -= 1;
                if *d == 0 {
                    queue.push_back(next);
                }
            }
        }
    }
    seen == tasks.len()
}

fn edge_set(tasks: &[Task]) -> HashSet<(String, String)> {
    tasks
        .iter()
        .flat_map(|t| t.dependencies.iter().map(move |d| (t.id.clone(), d.clone())))
        .collect()
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn cycle_detection_matches_topological_sort(tasks in graph_strategy(8)) {
        let graph = DependencyGraph::from_tasks(&tasks);
        prop_assert_eq!(graph.has_cycles(), !is_acyclic(&tasks));
        prop_assert_eq!(graph.find_cycles().is_empty(), is_acyclic(&tasks));
    }

    #[test]
    fn reported_cycles_are_closed_walks(tasks in graph_strategy(8)) {
        let graph = DependencyGraph::from_tasks(&tasks);
        let edges = edge_set(&tasks);
        for cycle in graph.find_cycles() {
            prop_assert!(cycle.len() >= 3);
            prop_assert_eq!(cycle.first(), cycle.last());
            for pair in cycle.windows(2) {
                prop_assert!(
                    edges.contains(&(pair[0].clone(), pair[1].clone())),
                    "{} -> {} is not an edge", pair[0], pair[1]
                );
            }
            let interior: HashSet<&String> = cycle[..cycle.len() - 1].iter().collect();
            prop_assert_eq!(interior.len(), cycle.len() - 1);
        }
    }

    #[test]
    fn dags_have_no_cycles(tasks in dag_strategy(10)) {
        let graph = DependencyGraph::from_tasks(&tasks);
        prop_assert!(graph.find_cycles().is_empty());
        prop_assert_eq!(graph.edge_count(), edge_set(&tasks).len());
    }

    #[test]
    fn upstream_and_downstream_are_mirror_images(tasks in graph_strategy(7)) {
        let graph = DependencyGraph::from_tasks(&tasks);
        for a in graph.ids() {
            for b in graph.downstream(a) {
                prop_assert!(graph.upstream(&b).contains(a));
            }
        }
    }

    #[test]
    fn adding_an_edge_never_reduces_impact(tasks in dag_strategy(8), from in any::<prop::sample::Index>(), to in any::<prop::sample::Index>()) {
        let config = AnalysisConfig::default();
        let before = DependencyGraph::from_tasks(&tasks);
        let mut after = before.clone();
        let n = tasks.len();
        after.add_edge(&tasks[from.index(n)].id, &tasks[to.index(n)].id);

        let old: HashMap<String, usize> = impact_analysis(&before, &config)
            .into_iter()
            .map(|i| (i.id, i.total_impact))
            .collect();
        for impact in impact_analysis(&after, &config) {
            prop_assert!(impact.total_impact >= old[&impact.id]);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn guarded_insertion_keeps_the_graph_acyclic(
        n in 2..6_usize,
        ops in proptest::collection::vec((0..6_usize, 0..6_usize), 1..16),
    ) {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path().join("tasks.json"));
        let tasks: Vec<Task> = (0..n).map(|i| Task::new(format!("t{i}"), format!("Task {i}"))).collect();
        store.save("master", &TaskCollection::from_tasks(tasks)).unwrap();
        let deps = DependencyGraphManager::new(store.clone(), AnalysisConfig::default());

        for (from, to) in ops {
            let (from, to) = (format!("t{}", from % n), format!("t{}", to % n));
            let before = std::fs::read(store.path()).unwrap();
            match deps.add_dependency(&from, &to, "master") {
                Ok(_) => {}
                Err(Error::CircularDependency { cycle }) => {
                    prop_assert_eq!(cycle.first(), Some(&from));
                    prop_assert_eq!(cycle.get(1), Some(&to));
                    prop_assert_eq!(std::fs::read(store.path()).unwrap(), before);
                }
                Err(Error::Validation { .. }) => {
                    prop_assert_eq!(&from, &to);
                }
                Err(other) => {
                    prop_assert!(false, "unexpected error: {}", other);
                }
            }

            let collection = store.load("master").unwrap();
            prop_assert!(!DependencyGraph::from_collection(&collection).has_cycles());
        }
    }
}
