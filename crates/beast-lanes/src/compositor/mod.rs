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

//! Per-view render graph.
//!
//! Passes are [`CompositorNode`]s registered by id in a
//! [`CompositorNodeRegistry`]. A [`RenderCompositor`] resolves the
//! dependency closure of a final node for one view, orders it and runs it
//! every frame. Nodes publish their outputs into the frame's
//! [`LaneContext`]; once the last consumer of a node has run, the node's
//! outputs are cleared so pooled targets return to the pool early.

pub mod nodes;
pub mod outputs;

use ahash::{AHashMap, AHashSet};
use beast_core::graph::{topological_sort, CycleError};
use beast_core::lane::{Lane, LaneContext, LaneError};
use beast_core::renderer::{RendererOptions, RendererView, ViewConfig};

#[derive(Debug, thiserror::Error)]
pub enum CompositorError {
    #[error("compositor node '{id}' is not registered")]
    UnknownNode { id: String },
    #[error("compositor nodes form a cycle")]
    Cycle(#[from] CycleError),
    #[error("compositor executed before a successful build")]
    NotBuilt,
    #[error("compositor node '{id}' failed")]
    Node {
        id: &'static str,
        #[source]
        source: LaneError,
    },
}

/// A pass of the render graph.
pub trait CompositorNode: Lane {
    /// Releases the outputs this node published into `ctx`.
    fn clear(&self, _ctx: &mut LaneContext) {}
}

/// A node type that can be registered.
pub trait CompositorNodeType: CompositorNode + Sized + 'static {
    const ID: &'static str;

    /// Ids of the nodes whose outputs this node reads, for `view`.
    fn dependencies(view: &RendererView, options: &RendererOptions) -> Vec<&'static str>;

    fn create() -> Self;
}

type DependencyFn = fn(&RendererView, &RendererOptions) -> Vec<&'static str>;
type CreateFn = fn() -> Box<dyn CompositorNode>;

#[derive(Clone, Copy)]
struct NodeEntry {
    id: &'static str,
    dependencies: DependencyFn,
    create: CreateFn,
}

fn create_boxed<T: CompositorNodeType>() -> Box<dyn CompositorNode> {
    Box::new(T::create())
}

/// Node types available to compositors, by id.
#[derive(Default)]
pub struct CompositorNodeRegistry {
    entries: AHashMap<&'static str, NodeEntry>,
}

impl std::fmt::Debug for CompositorNodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.entries.keys().collect();
        ids.sort();
        f.debug_struct("CompositorNodeRegistry").field("ids", &ids).finish()
    }
}

impl CompositorNodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in node.
    pub fn with_default_nodes() -> Self {
        let mut registry = Self::new();
        nodes::register_default_nodes(&mut registry);
        registry
    }

    /// Registers `T` under `T::ID`. Registering an id twice is a
    /// configuration error: it is logged and the new type replaces the old.
    pub fn register<T: CompositorNodeType>(&mut self) {
        let entry = NodeEntry {
            id: T::ID,
            dependencies: T::dependencies,
            create: create_boxed::<T>,
        };
        if self.entries.insert(T::ID, entry).is_some() {
            log::error!("Compositor node '{}' registered twice; the last registration wins", T::ID);
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Creates a fresh instance of the node registered under `id`.
    pub fn create(&self, id: &str) -> Option<Box<dyn CompositorNode>> {
        self.entries.get(id).map(|entry| (entry.create)())
    }

    fn entry(&self, id: &str) -> Result<&NodeEntry, CompositorError> {
        self.entries
            .get(id)
            .ok_or_else(|| CompositorError::UnknownNode { id: id.to_string() })
    }
}

struct NodeInstance {
    id: &'static str,
    node: Box<dyn CompositorNode>,
    initialized: bool,
    /// Nodes whose outputs are cleared once this one has run.
    clear_after: Vec<usize>,
}

/// Ordered node instances of one view.
#[derive(Default)]
pub struct RenderCompositor {
    nodes: Vec<NodeInstance>,
    retired: Vec<(Box<dyn CompositorNode>, bool)>,
    config: Option<ViewConfig>,
    final_node: Option<&'static str>,
    is_valid: bool,
}

impl std::fmt::Debug for RenderCompositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCompositor")
            .field("nodes", &self.node_ids())
            .field("config", &self.config)
            .field("is_valid", &self.is_valid)
            .finish()
    }
}

impl RenderCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves and orders the nodes `final_node` needs for `view`.
    ///
    /// Instances already present are kept, so nodes holding pipelines or
    /// history survive a rebuild. On error the compositor is left invalid.
    pub fn build(
        &mut self,
        registry: &CompositorNodeRegistry,
        view: &RendererView,
        options: &RendererOptions,
        final_node: &str,
    ) -> Result<(), CompositorError> {
        self.is_valid = false;
        let root = registry.entry(final_node)?;

        // Depth-first walk of the dependency closure.
        let mut ids: Vec<&'static str> = Vec::new();
        let mut deps_of: AHashMap<&'static str, Vec<&'static str>> = AHashMap::new();
        let mut stack = vec![root.id];
        let mut seen: AHashSet<&'static str> = AHashSet::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let entry = registry.entry(id)?;
            let deps = (entry.dependencies)(view, options);
            for dep in deps.iter().rev() {
                let dep_entry = registry.entry(dep)?;
                stack.push(dep_entry.id);
            }
            ids.push(entry.id);
            deps_of.insert(entry.id, deps);
        }

        let edges: Vec<(&'static str, &'static str)> = ids
            .iter()
            .flat_map(|id| deps_of[id].iter().map(move |dep| (*dep, *id)))
            .collect();
        // Dependencies first, in discovery order among equals.
        let discovery: Vec<&'static str> = ids.iter().rev().copied().collect();
        let order = topological_sort(discovery, edges)?;

        let position: AHashMap<&'static str, usize> = order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let mut last_use: Vec<usize> = (0..order.len()).collect();
        for (i, id) in order.iter().enumerate() {
            for dep in &deps_of[id] {
                let d = position[dep];
                last_use[d] = last_use[d].max(i);
            }
        }

        let mut previous: AHashMap<&'static str, (Box<dyn CompositorNode>, bool)> = self
            .nodes
            .drain(..)
            .map(|instance| (instance.id, (instance.node, instance.initialized)))
            .collect();
        self.nodes = order
            .iter()
            .enumerate()
            .map(|(i, &id)| {
                let (node, initialized) = previous
                    .remove(id)
                    .unwrap_or_else(|| ((registry.entries[id].create)(), false));
                NodeInstance {
                    id,
                    node,
                    initialized,
                    clear_after: last_use
                        .iter()
                        .enumerate()
                        .filter(|(_, last)| **last == i)
                        .map(|(n, _)| n)
                        .collect(),
                }
            })
            .collect();
        self.retired.extend(previous.into_values());

        log::debug!("RenderCompositor: Built {:?} for view {:?}", order, view.id);
        self.config = Some(view.config());
        self.final_node = Some(root.id);
        self.is_valid = true;
        Ok(())
    }

    /// Runs every node in order. Outputs are cleared after their last
    /// consumer, and all of them are cleared if a node fails.
    pub fn execute(&mut self, ctx: &mut LaneContext) -> Result<(), CompositorError> {
        if !self.is_valid {
            return Err(CompositorError::NotBuilt);
        }
        self.shutdown_retired(ctx);

        for i in 0..self.nodes.len() {
            let result = self.run_node(i, ctx);
            if let Err(e) = result {
                for instance in &self.nodes {
                    instance.node.clear(ctx);
                }
                return Err(e);
            }
            for &c in &self.nodes[i].clear_after {
                self.nodes[c].node.clear(ctx);
            }
        }
        Ok(())
    }

    fn run_node(&mut self, i: usize, ctx: &mut LaneContext) -> Result<(), CompositorError> {
        let instance = &mut self.nodes[i];
        let id = instance.id;
        if !instance.initialized {
            instance
                .node
                .on_initialize(ctx)
                .map_err(|source| CompositorError::Node { id, source })?;
            instance.initialized = true;
        }
        log::trace!("RenderCompositor: Running '{}'", id);
        instance
            .node
            .execute(ctx)
            .map_err(|source| CompositorError::Node { id, source })
    }

    fn shutdown_retired(&mut self, ctx: &mut LaneContext) {
        for (node, initialized) in self.retired.drain(..) {
            if initialized {
                node.on_shutdown(ctx);
            }
        }
    }

    /// Forces a rebuild before the next execution.
    pub fn invalidate(&mut self) {
        self.is_valid = false;
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// Whether the compositor was built for a view of this shape.
    pub fn is_valid_for(&self, config: &ViewConfig) -> bool {
        self.is_valid && self.config.as_ref() == Some(config)
    }

    /// Ids of the nodes in execution order.
    pub fn node_ids(&self) -> Vec<&'static str> {
        self.nodes.iter().map(|instance| instance.id).collect()
    }

    pub fn final_node(&self) -> Option<&'static str> {
        self.final_node
    }

    /// Ids of the nodes cleared right after the node at `index` runs.
    pub fn cleared_after(&self, index: usize) -> Vec<&'static str> {
        self.nodes
            .get(index)
            .map(|instance| instance.clear_after.iter().map(|&c| self.nodes[c].id).collect())
            .unwrap_or_default()
    }

    /// Shuts every node down and forgets the graph.
    pub fn shutdown(&mut self, ctx: &mut LaneContext) {
        self.shutdown_retired(ctx);
        for instance in self.nodes.drain(..) {
            instance.node.clear(ctx);
            if instance.initialized {
                instance.node.on_shutdown(ctx);
            }
        }
        self.config = None;
        self.final_node = None;
        self.is_valid = false;
    }
}
