//! Step dependency graph of one workflow
//!
//! Edges point from a consumer step to the producers it reads from. Steps
//! are numbered by declaration position; the first declaration wins when
//! ids repeat.

use crate::model::Step;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use std::collections::HashMap;

/// Dependency graph over the steps of one workflow
#[derive(Debug, Clone)]
pub struct StepGraph<'a> {
    steps: &'a [Step],
    producers: Vec<Vec<usize>>,
}

impl<'a> StepGraph<'a> {
    /// Build the graph from step sources
    #[must_use]
    pub fn new(steps: &'a [Step]) -> Self {
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(steps.len());
        for (position, step) in steps.iter().enumerate() {
            index.entry(step.id.as_str()).or_insert(position);
        }
        let producers = steps
            .iter()
            .map(|step| {
                step.upstream()
                    .filter_map(|producer| index.get(producer).copied())
                    .collect()
            })
            .collect();
        Self { steps, producers }
    }

    /// Number of steps
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the workflow has no steps
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of distinct consumer-producer edges
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.producers.iter().map(Vec::len).sum()
    }

    /// Ids of the steps `step` reads from
    pub fn producers(&self, step: usize) -> impl Iterator<Item = &'a str> + '_ {
        self.producers
            .get(step)
            .into_iter()
            .flatten()
            .map(|&p| self.steps[p].id.as_str())
    }

    /// Every dependency cycle, found by depth-first search in declaration
    /// order
    ///
    /// Each back edge yields one cycle. Cycles are listed in data-flow
    /// order (each step feeds the next, the last feeds the first), rotated
    /// to start at the earliest-declared step.
    #[must_use]
    pub fn cycles(&self) -> Vec<Vec<&'a str>> {
        let mut state = vec![Visit::Unseen; self.steps.len()];
        let mut path = Vec::new();
        let mut found: Vec<Vec<usize>> = Vec::new();
        for start in 0..self.steps.len() {
            if state[start] == Visit::Unseen {
                self.dfs(start, &mut state, &mut path, &mut found);
            }
        }
        found
            .into_iter()
            .map(|cycle| cycle.into_iter().map(|i| self.steps[i].id.as_str()).collect())
            .collect()
    }

    fn dfs(&self, node: usize, state: &mut [Visit], path: &mut Vec<usize>, found: &mut Vec<Vec<usize>>) {
        state[node] = Visit::Visiting;
        path.push(node);
        for &producer in &self.producers[node] {
            match state[producer] {
                Visit::Unseen => self.dfs(producer, state, path, found),
                Visit::Visiting => {
                    let Some(start) = path.iter().position(|&n| n == producer) else {
                        continue;
                    };
                    // Path runs consumer to producer; reverse for data flow.
                    let mut cycle: Vec<usize> = path[start..].iter().rev().copied().collect();
                    let earliest = cycle
                        .iter()
                        .enumerate()
                        .min_by_key(|(_, &n)| n)
                        .map_or(0, |(i, _)| i);
                    cycle.rotate_left(earliest);
                    if !found.contains(&cycle) {
                        found.push(cycle);
                    }
                }
                Visit::Done => {}
            }
        }
        path.pop();
        state[node] = Visit::Done;
    }

    /// Step ids with every producer before its consumers, `None` when
    /// the graph is cyclic
    #[must_use]
    pub fn execution_order(&self) -> Option<Vec<&'a str>> {
        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::with_capacity(self.steps.len(), self.edge_count());
        for node in 0..self.steps.len() {
            graph.add_node(node);
        }
        for (consumer, producers) in self.producers.iter().enumerate() {
            for &producer in producers {
                graph.add_edge(producer, consumer, ());
            }
        }
        let order = toposort(&graph, None).ok()?;
        Some(order.into_iter().map(|i| self.steps[i].id.as_str()).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unseen,
    Visiting,
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Binding, ProcessId, SourceRef, StepInput};
    use pretty_assertions::assert_eq;
    use serde_json::Map;

    /// Step reading `out` of each named producer
    fn step(id: &str, reads: &[&str]) -> Step {
        Step {
            id: id.to_string(),
            target: ProcessId::new(0),
            inputs: reads
                .iter()
                .enumerate()
                .map(|(i, producer)| StepInput {
                    id: format!("in{i}"),
                    binding: Binding {
                        sources: vec![SourceRef::parse(&format!("{producer}/out"))],
                        ..Binding::default()
                    },
                    default: None,
                    value_from: None,
                    extra: Map::new(),
                })
                .collect(),
            outputs: vec!["out".to_string()],
            requirements: Vec::new(),
            hints: Vec::new(),
            scatter: Vec::new(),
            scatter_method: None,
            when: None,
            extra: Map::new(),
        }
    }

    #[test]
    fn acyclic_chain() {
        let steps = vec![step("c", &["b"]), step("a", &[]), step("b", &["a", "a"])];
        let graph = StepGraph::new(&steps);
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.cycles().is_empty());
        assert_eq!(graph.execution_order(), Some(vec!["a", "b", "c"]));
        assert_eq!(graph.producers(2).collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn three_step_cycle_is_reported_once() {
        // a feeds b, b feeds c, c feeds a
        let steps = vec![step("a", &["c"]), step("b", &["a"]), step("c", &["b"])];
        let graph = StepGraph::new(&steps);
        assert_eq!(graph.cycles(), vec![vec!["a", "b", "c"]]);
        assert_eq!(graph.execution_order(), None);
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let steps = vec![step("a", &[]), step("b", &["b"])];
        assert_eq!(StepGraph::new(&steps).cycles(), vec![vec!["b"]]);
    }

    #[test]
    fn independent_cycles() {
        let steps = vec![
            step("a", &["b"]),
            step("b", &["a"]),
            step("c", &["d"]),
            step("d", &["c"]),
        ];
        assert_eq!(
            StepGraph::new(&steps).cycles(),
            vec![vec!["a", "b"], vec!["c", "d"]]
        );
    }

    #[test]
    fn unknown_producers_are_ignored() {
        let steps = vec![step("a", &["ghost"])];
        let graph = StepGraph::new(&steps);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.execution_order(), Some(vec!["a"]));
    }
}
