// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Kahn's algorithm over an arbitrary set of hashable node keys.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::hash::Hash;

/// Returned when the edges describe at least one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError {
    /// Number of nodes that could not be ordered.
    pub unresolved: usize,
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Dependency cycle detected ({} node(s) could not be ordered)",
            self.unresolved
        )
    }
}

impl std::error::Error for CycleError {}

/// Orders `nodes` so that for every edge `(before, after)` the first element
/// precedes the second.
///
/// The result is deterministic: among nodes that become ready at the same
/// time, the one listed first in `nodes` comes first. Edges that mention a
/// node outside `nodes` are ignored.
pub fn topological_sort<T>(
    nodes: impl IntoIterator<Item = T>,
    edges: impl IntoIterator<Item = (T, T)>,
) -> Result<Vec<T>, CycleError>
where
    T: Copy + Eq + Hash,
{
    let node_list: Vec<T> = nodes.into_iter().collect();
    let index_of: HashMap<T, usize> = node_list
        .iter()
        .enumerate()
        .map(|(i, node)| (*node, i))
        .collect();

    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); node_list.len()];
    let mut in_degree = vec![0usize; node_list.len()];

    for (before, after) in edges {
        if let (Some(&from), Some(&to)) = (index_of.get(&before), index_of.get(&after)) {
            successors[from].push(to);
            in_degree[to] += 1;
        }
    }

    let mut ready: VecDeque<usize> = (0..node_list.len())
        .filter(|&i| in_degree[i] == 0)
        .collect();

    let mut sorted = Vec::with_capacity(node_list.len());
    while let Some(current) = ready.pop_front() {
        sorted.push(node_list[current]);
        for &next in &successors[current] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push_back(next);
            }
        }
    }

    if sorted.len() == node_list.len() {
        Ok(sorted)
    } else {
        Err(CycleError {
            unresolved: node_list.len() - sorted.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_graph_sorts_to_nothing() {
        let sorted = topological_sort(Vec::<u32>::new(), Vec::new()).unwrap();
        assert!(sorted.is_empty());
    }

    #[test]
    fn dependencies_come_first() {
        let nodes = ["final", "lighting", "gbuffer", "depth"];
        let edges = [
            ("depth", "gbuffer"),
            ("gbuffer", "lighting"),
            ("lighting", "final"),
            ("depth", "lighting"),
        ];
        let sorted = topological_sort(nodes, edges).unwrap();
        assert_eq!(sorted, vec!["depth", "gbuffer", "lighting", "final"]);
    }

    #[test]
    fn ties_follow_input_order() {
        let sorted = topological_sort([3, 1, 2], Vec::new()).unwrap();
        assert_eq!(sorted, vec![3, 1, 2]);
    }

    #[test]
    fn cycle_is_reported() {
        let err = topological_sort([1, 2, 3], [(1, 2), (2, 3), (3, 2)]).unwrap_err();
        assert_eq!(err.unresolved, 2);
    }

    #[test]
    fn edges_to_unknown_nodes_are_ignored() {
        let sorted = topological_sort([1, 2], [(1, 2), (9, 1)]).unwrap();
        assert_eq!(sorted, vec![1, 2]);
    }
}
