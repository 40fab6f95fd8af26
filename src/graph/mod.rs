//! Id-based dependency graph over one tag's tasks.
//!
//! Nodes are task and subtask ids; an edge `a -> b` means "a depends on b".
//! The graph is rebuilt from a [`TaskCollection`] on demand and never holds
//! references into it, so it is cheap to build a tentative copy, mutate it,
//! and throw it away.

pub mod analysis;
pub mod deps;
mod validate;

pub use validate::{
    DependencyIssue, IssueKind, ValidationReport, ValidationWarning, WarningKind, validate,
};

use crate::collection::TaskCollection;
use crate::types::Task;
use std::collections::{HashMap, HashSet, VecDeque};

/// Adjacency lists indexed by position in task order.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    deps: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

impl DependencyGraph {
    /// Build from tasks in pre-order. References to unknown ids, self
    /// references, and repeated entries are not edges.
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let tasks: Vec<&Task> = tasks.into_iter().collect();
        let mut graph = DependencyGraph::default();
        for task in &tasks {
            if !graph.index.contains_key(&task.id) {
                graph.index.insert(task.id.clone(), graph.ids.len());
                graph.ids.push(task.id.clone());
                graph.deps.push(Vec::new());
                graph.dependents.push(Vec::new());
            }
        }
        for task in &tasks {
            for dep in &task.dependencies {
                graph.add_edge(&task.id, dep);
            }
        }
        graph
    }

    pub fn from_collection(collection: &TaskCollection) -> Self {
        Self::from_tasks(collection.iter_all())
    }

    /// Add `from -> to`. Returns false if either end is unknown, the edge
    /// is a self loop, or it already exists.
    pub fn add_edge(&mut self, from: &str, to: &str) -> bool {
        let (Some(&f), Some(&t)) = (self.index.get(from), self.index.get(to)) else {
            return false;
        };
        if f == t || self.deps[f].contains(&t) {
            return false;
        }
        self.deps[f].push(t);
        self.dependents[t].push(f);
        self.dependents[t].sort_unstable();
        true
    }

    pub fn remove_edge(&mut self, from: &str, to: &str) -> bool {
        let (Some(&f), Some(&t)) = (self.index.get(from), self.index.get(to)) else {
            return false;
        };
        let before = self.deps[f].len();
        self.deps[f].retain(|&d| d != t);
        self.dependents[t].retain(|&d| d != f);
        before != self.deps[f].len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Node ids in task order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    fn names(&self, idx: &[usize]) -> Vec<&str> {
        idx.iter().map(|&i| self.ids[i].as_str()).collect()
    }

    /// Direct dependencies of `id`, in declaration order.
    pub fn dependencies(&self, id: &str) -> Vec<&str> {
        self.index
            .get(id)
            .map(|&i| self.names(&self.deps[i]))
            .unwrap_or_default()
    }

    /// Direct dependents of `id`, in task order.
    pub fn dependents(&self, id: &str) -> Vec<&str> {
        self.index
            .get(id)
            .map(|&i| self.names(&self.dependents[i]))
            .unwrap_or_default()
    }

    /// Every edge as `(dependency, dependent)`, grouped by dependent in task
    /// order. All renderers enumerate this same list.
    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.deps
            .iter()
            .enumerate()
            .flat_map(|(from, tos)| {
                tos.iter()
                    .map(move |&to| (self.ids[to].as_str(), self.ids[from].as_str()))
            })
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.deps.iter().map(Vec::len).sum()
    }

    /// All distinct cycles found by a three-color depth-first search.
    ///
    /// Each cycle follows dependency edges and starts and ends at the same
    /// id. Cycles that are rotations of one another are reported once.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let n = self.ids.len();
        let mut color = vec![Color::White; n];
        let mut cycles = Vec::new();
        let mut seen: HashSet<Vec<usize>> = HashSet::new();

        for root in 0..n {
            if color[root] != Color::White {
                continue;
            }
            // (node, index of the next dependency to visit)
            let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
            color[root] = Color::Gray;

            while let Some(frame) = stack.last_mut() {
                let node = frame.0;
                if let Some(&dep) = self.deps[node].get(frame.1) {
                    frame.1 += 1;
                    match color[dep] {
                        Color::White => {
                            color[dep] = Color::Gray;
                            stack.push((dep, 0));
                        }
                        Color::Gray => {
                            let start = stack
                                .iter()
                                .position(|&(n, _)| n == dep)
                                .unwrap_or_default();
                            let body: Vec<usize> = stack[start..].iter().map(|&(n, _)| n).collect();
                            if seen.insert(canonical(&body)) {
                                let mut cycle: Vec<String> =
                                    body.iter().map(|&i| self.ids[i].clone()).collect();
                                cycle.push(self.ids[dep].clone());
                                cycles.push(cycle);
                            }
                        }
                        Color::Black => {}
                    }
                } else {
                    color[node] = Color::Black;
                    stack.pop();
                }
            }
        }
        cycles
    }

    pub fn has_cycles(&self) -> bool {
        !self.find_cycles().is_empty()
    }

    /// Shortest cycle through the edge `from -> to`, if `to` can reach
    /// `from`. Starts and ends at `from`.
    pub fn cycle_through(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let (&f, &t) = (self.index.get(from)?, self.index.get(to)?);
        if f == t {
            return Some(vec![from.to_string(), from.to_string()]);
        }

        let mut parent: HashMap<usize, usize> = HashMap::new();
        let mut visited: HashSet<usize> = HashSet::from([t]);
        let mut queue = VecDeque::from([t]);
        while let Some(current) = queue.pop_front() {
            if current == f {
                let mut path = vec![f];
                let mut at = f;
                while let Some(&p) = parent.get(&at) {
                    path.push(p);
                    at = p;
                }
                path.reverse();
                // path runs to -> ... -> from
                let mut cycle = vec![from.to_string()];
                cycle.extend(path.into_iter().map(|i| self.ids[i].clone()));
                return Some(cycle);
            }
            for &next in &self.deps[current] {
                if visited.insert(next) {
                    parent.insert(next, current);
                    queue.push_back(next);
                }
            }
        }
        None
    }

    fn reach(&self, id: &str, adjacency: &[Vec<usize>], max_depth: Option<usize>) -> Vec<String> {
        let Some(&start) = self.index.get(id) else {
            return Vec::new();
        };
        let mut visited: HashSet<usize> = HashSet::from([start]);
        let mut queue = VecDeque::from([(start, 0usize)]);
        let mut out = Vec::new();

        while let Some((current, depth)) = queue.pop_front() {
            if max_depth.is_some_and(|max| depth >= max) {
                continue;
            }
            for &next in &adjacency[current] {
                if visited.insert(next) {
                    out.push(self.ids[next].clone());
                    queue.push_back((next, depth + 1));
                }
            }
        }
        out
    }

    /// Every task that transitively depends on `id`, nearest first.
    /// Terminates on cyclic input; `id` itself is never included.
    pub fn downstream(&self, id: &str) -> Vec<String> {
        self.reach(id, &self.dependents, None)
    }

    /// Every task `id` transitively depends on, nearest first.
    pub fn upstream(&self, id: &str) -> Vec<String> {
        self.reach(id, &self.deps, None)
    }

    pub fn downstream_within(&self, id: &str, max_depth: Option<usize>) -> Vec<String> {
        self.reach(id, &self.dependents, max_depth)
    }

    pub fn upstream_within(&self, id: &str, max_depth: Option<usize>) -> Vec<String> {
        self.reach(id, &self.deps, max_depth)
    }

    /// Restrict the graph to `keep`, preserving task order.
    pub fn retain(&self, keep: &HashSet<String>) -> DependencyGraph {
        let mut graph = DependencyGraph::default();
        for id in self.ids.iter().filter(|id| keep.contains(*id)) {
            graph.index.insert(id.clone(), graph.ids.len());
            graph.ids.push(id.clone());
            graph.deps.push(Vec::new());
            graph.dependents.push(Vec::new());
        }
        for (dep, dependent) in self.edges() {
            graph.add_edge(dependent, dep);
        }
        graph
    }
}

/// Rotation of a cycle body starting at its smallest index.
fn canonical(body: &[usize]) -> Vec<usize> {
    let pivot = body
        .iter()
        .enumerate()
        .min_by_key(|&(_, v)| *v)
        .map(|(i, _)| i)
        .unwrap_or(0);
    body[pivot..].iter().chain(&body[..pivot]).copied().collect()
}
