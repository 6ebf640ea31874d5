//! Field dependency graph.
//!
//! An edge `A -> B` means B's visibility or validity must be re-evaluated
//! when A changes: B is conditional on A, or lists A in `dependencies`.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::error::CyclicDependencyError;
use crate::schema::FieldSchema;

/// Acyclic graph of field dependencies, indexed by schema position.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    names: Vec<String>,
    index: HashMap<String, usize>,
    /// Direct dependents of each node, ascending.
    dependents: Vec<Vec<usize>>,
    /// Direct upstream fields of each node, ascending.
    upstream: Vec<Vec<usize>>,
    /// Topological order, ties broken by schema position.
    order: Vec<usize>,
}

impl DependencyGraph {
    /// Builds the graph, rejecting cycles.
    ///
    /// Field names must be unique and every reference must resolve;
    /// unresolved references are ignored here.
    ///
    /// # Errors
    ///
    /// Returns the first cycle found, in schema order.
    pub fn build(fields: &[&FieldSchema]) -> Result<Self, CyclicDependencyError> {
        let names: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();
        let index: HashMap<String, usize> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        let mut dependents = vec![Vec::new(); fields.len()];
        let mut upstream = vec![Vec::new(); fields.len()];
        for (b, field) in fields.iter().enumerate() {
            let sources = field
                .dependencies
                .iter()
                .map(String::as_str)
                .chain(field.conditional.as_ref().map(|c| c.field.as_str()));
            for source in sources {
                if let Some(&a) = index.get(source) {
                    dependents[a].push(b);
                    upstream[b].push(a);
                }
            }
        }
        for list in dependents.iter_mut().chain(upstream.iter_mut()) {
            list.sort_unstable();
            list.dedup();
        }

        // Kahn's algorithm; the min-heap keeps the order deterministic.
        let mut in_degree: Vec<usize> = upstream.iter().map(Vec::len).collect();
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, deg)| **deg == 0)
            .map(|(i, _)| Reverse(i))
            .collect();
        let mut order = Vec::with_capacity(fields.len());

        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for &dependent in &dependents[node] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        if order.len() != fields.len() {
            let cycle = find_cycle(&upstream, &in_degree)
                .into_iter()
                .map(|i| names[i].clone())
                .collect();
            return Err(CyclicDependencyError { cycle });
        }

        Ok(Self {
            names,
            index,
            dependents,
            upstream,
            order,
        })
    }

    /// Returns every field whose visibility or validity may change when
    /// `name` changes, in schema order. `name` itself is not included.
    #[must_use]
    pub fn affected_by(&self, name: &str) -> Vec<&str> {
        let Some(&start) = self.index.get(name) else {
            return Vec::new();
        };

        let mut seen = vec![false; self.names.len()];
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            for &dependent in &self.dependents[node] {
                if !seen[dependent] {
                    seen[dependent] = true;
                    stack.push(dependent);
                }
            }
        }

        seen.iter()
            .enumerate()
            .filter(|(_, hit)| **hit)
            .map(|(i, _)| self.names[i].as_str())
            .collect()
    }

    /// Returns the fields that directly depend on `name`.
    #[must_use]
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.index.get(name).map_or_else(Vec::new, |&i| {
            self.dependents[i]
                .iter()
                .map(|&d| self.names[d].as_str())
                .collect()
        })
    }

    /// Returns the fields `name` directly depends on.
    #[must_use]
    pub fn upstream_of(&self, name: &str) -> Vec<&str> {
        self.index.get(name).map_or_else(Vec::new, |&i| {
            self.upstream[i]
                .iter()
                .map(|&u| self.names[u].as_str())
                .collect()
        })
    }

    /// Returns field names in evaluation order: every field after the
    /// fields it depends on, otherwise schema order.
    pub fn topological_order(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|&i| self.names[i].as_str())
    }

    /// Schema positions in evaluation order.
    pub(crate) fn order(&self) -> &[usize] {
        &self.order
    }
}

/// Extracts one cycle from the nodes Kahn's algorithm could not schedule.
///
/// Every unscheduled node has an unscheduled upstream node, so walking
/// upstream edges must eventually revisit a node.
fn find_cycle(upstream: &[Vec<usize>], in_degree: &[usize]) -> Vec<usize> {
    let remaining = |i: usize| in_degree[i] > 0;
    let Some(start) = (0..in_degree.len()).find(|&i| remaining(i)) else {
        return Vec::new();
    };

    let mut path = vec![start];
    let mut position = HashMap::from([(start, 0)]);
    loop {
        let current = path[path.len() - 1];
        let Some(&previous) = upstream[current].iter().find(|&&u| remaining(u)) else {
            return path;
        };
        if let Some(&at) = position.get(&previous) {
            // The walk ran against the edges; flip it back.
            let mut cycle: Vec<usize> = path[at..].iter().rev().copied().collect();
            if let Some(first) = cycle.iter().enumerate().min_by_key(|(_, n)| **n).map(|(i, _)| i) {
                cycle.rotate_left(first);
            }
            cycle.push(cycle[0]);
            return cycle;
        }
        position.insert(previous, path.len());
        path.push(previous);
    }
}
