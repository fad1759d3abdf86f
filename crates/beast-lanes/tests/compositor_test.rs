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

use beast_core::lane::{Lane, LaneContext, LaneError, LaneKind};
use beast_core::math::{Mat4, Rect2I, Vec3};
use beast_core::renderer::api::{SampleCount, TextureFormat, TextureViewId};
use beast_core::renderer::{RendererOptions, RendererView, ViewFlags, ViewId};
use beast_lanes::compositor::nodes::*;
use beast_lanes::compositor::{
    CompositorError, CompositorNode, CompositorNodeRegistry, CompositorNodeType, RenderCompositor,
};
use std::any::Any;

/// Events recorded by the test nodes, in order.
#[derive(Default)]
struct Trace(Vec<String>);

fn push(ctx: &mut LaneContext, event: String) {
    if let Some(trace) = ctx.get_mut::<Trace>() {
        trace.0.push(event);
    }
}

macro_rules! test_node {
    ($ty:ident, $id:literal, [$($dep:literal),*]) => {
        struct $ty;

        impl Lane for $ty {
            fn strategy_name(&self) -> &'static str {
                $id
            }
            fn lane_kind(&self) -> LaneKind {
                LaneKind::Lighting
            }
            fn on_initialize(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
                push(ctx, format!("init {}", $id));
                Ok(())
            }
            fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
                push(ctx, format!("run {}", $id));
                Ok(())
            }
            fn on_shutdown(&self, ctx: &mut LaneContext) {
                push(ctx, format!("shutdown {}", $id));
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
        }

        impl CompositorNode for $ty {
            fn clear(&self, ctx: &mut LaneContext) {
                push(ctx, format!("clear {}", $id));
            }
        }

        impl CompositorNodeType for $ty {
            const ID: &'static str = $id;
            fn dependencies(_view: &RendererView, _options: &RendererOptions) -> Vec<&'static str> {
                vec![$($dep),*]
            }
            fn create() -> Self {
                $ty
            }
        }
    };
}

test_node!(Depth, "Depth", []);
test_node!(Color, "Color", []);
test_node!(Opaque, "Opaque", ["Depth", "Color"]);
test_node!(Post, "Post", ["Color"]);
test_node!(Final, "Final", ["Opaque", "Post"]);
test_node!(LoopA, "LoopA", ["LoopB"]);
test_node!(LoopB, "LoopB", ["LoopA"]);
test_node!(Dangling, "Dangling", ["Nowhere"]);
test_node!(FailingFinal, "FailingFinal", ["Boom"]);
// Registered under an existing id to replace `Depth`.
test_node!(PostDepth, "Depth", ["Post"]);

struct Boom;

impl Lane for Boom {
    fn strategy_name(&self) -> &'static str {
        "Boom"
    }
    fn lane_kind(&self) -> LaneKind {
        LaneKind::Lighting
    }
    fn execute(&self, _ctx: &mut LaneContext) -> Result<(), LaneError> {
        Err(LaneError::NotInitialized)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl CompositorNode for Boom {}

impl CompositorNodeType for Boom {
    const ID: &'static str = "Boom";
    fn dependencies(_view: &RendererView, _options: &RendererOptions) -> Vec<&'static str> {
        vec!["Depth"]
    }
    fn create() -> Self {
        Boom
    }
}

fn view(sample_count: SampleCount, flags: ViewFlags) -> RendererView {
    RendererView {
        id: ViewId(7),
        view: Mat4::look_at_rh(Vec3::new(0.0, 2.0, 10.0), Vec3::ZERO, Vec3::Y),
        projection: Mat4::perspective_rh(1.0, 1.5, 0.1, 100.0),
        near: 0.1,
        far: 100.0,
        viewport: Rect2I::new(0, 0, 960, 640),
        sample_count,
        target: TextureViewId(999),
        target_format: TextureFormat::Bgra8UnormSrgb,
        flags,
    }
}

fn test_registry() -> CompositorNodeRegistry {
    let mut registry = CompositorNodeRegistry::new();
    registry.register::<Depth>();
    registry.register::<Color>();
    registry.register::<Opaque>();
    registry.register::<Post>();
    registry.register::<Final>();
    registry
}

fn position(ids: &[&str], id: &str) -> usize {
    ids.iter()
        .position(|n| *n == id)
        .unwrap_or_else(|| panic!("'{id}' missing from {ids:?}"))
}

fn assert_before(ids: &[&str], first: &str, second: &str) {
    assert!(
        position(ids, first) < position(ids, second),
        "'{first}' should run before '{second}' in {ids:?}"
    );
}

fn default_graph(view: &RendererView, options: &RendererOptions) -> Vec<&'static str> {
    let registry = CompositorNodeRegistry::with_default_nodes();
    let mut compositor = RenderCompositor::new();
    compositor.build(&registry, view, options, FINAL_RESOLVE).unwrap();
    compositor.node_ids()
}

#[test]
fn default_graph_without_msaa_skips_unflatten_nodes() {
    let ids = default_graph(&view(SampleCount::X1, ViewFlags::EMPTY), &RendererOptions::default());
    assert_eq!(ids.len(), 9);
    assert!(!ids.contains(&UNFLATTEN_LIGHT_ACCUM));
    assert!(!ids.contains(&UNFLATTEN_SCENE_COLOR));
    assert_eq!(ids.last(), Some(&FINAL_RESOLVE));

    assert_before(&ids, SCENE_DEPTH, GBUFFER);
    assert_before(&ids, GBUFFER, TILED_DEFERRED_LIGHTING);
    assert_before(&ids, LIGHT_ACCUMULATION, TILED_DEFERRED_LIGHTING);
    assert_before(&ids, TILED_DEFERRED_LIGHTING, STANDARD_DEFERRED_LIGHTING);
    assert_before(&ids, STANDARD_DEFERRED_LIGHTING, TILED_DEFERRED_IBL);
    assert_before(&ids, SCENE_COLOR, TILED_DEFERRED_IBL);
    assert_before(&ids, TILED_DEFERRED_IBL, CLUSTERED_FORWARD);
    assert_before(&ids, CLUSTERED_FORWARD, FINAL_RESOLVE);
}

#[test]
fn msaa_graph_unflattens_compute_outputs() {
    let ids = default_graph(&view(SampleCount::X4, ViewFlags::EMPTY), &RendererOptions::default());
    assert_eq!(ids.len(), 11);
    assert_before(&ids, TILED_DEFERRED_LIGHTING, UNFLATTEN_LIGHT_ACCUM);
    assert_before(&ids, UNFLATTEN_LIGHT_ACCUM, STANDARD_DEFERRED_LIGHTING);
    assert_before(&ids, TILED_DEFERRED_IBL, UNFLATTEN_SCENE_COLOR);
    assert_before(&ids, UNFLATTEN_SCENE_COLOR, CLUSTERED_FORWARD);
}

#[test]
fn unlit_views_skip_direct_lighting() {
    let ids = default_graph(&view(SampleCount::X1, ViewFlags::NO_LIGHTING), &RendererOptions::default());
    assert!(!ids.contains(&TILED_DEFERRED_LIGHTING));
    assert!(!ids.contains(&STANDARD_DEFERRED_LIGHTING));
    assert!(ids.contains(&TILED_DEFERRED_IBL));
    assert!(ids.contains(&LIGHT_ACCUMULATION));
}

#[test]
fn disabling_tiled_lighting_leaves_the_standard_pass() {
    let options = RendererOptions {
        tiled_deferred: false,
        ..Default::default()
    };
    let ids = default_graph(&view(SampleCount::X4, ViewFlags::EMPTY), &options);
    assert!(!ids.contains(&TILED_DEFERRED_LIGHTING));
    assert!(!ids.contains(&UNFLATTEN_LIGHT_ACCUM));
    assert!(ids.contains(&STANDARD_DEFERRED_LIGHTING));
    assert!(ids.contains(&UNFLATTEN_SCENE_COLOR));
}

#[test]
fn registering_an_id_twice_keeps_one_entry() {
    let mut registry = test_registry();
    let before = registry.len();
    registry.register::<Depth>();
    assert_eq!(registry.len(), before);
    assert!(registry.create("Depth").is_some());
    assert!(registry.create("Nowhere").is_none());
}

#[test]
fn second_registration_under_an_id_replaces_the_first() {
    let mut registry = test_registry();
    let mut compositor = RenderCompositor::new();
    let view = view(SampleCount::X1, ViewFlags::EMPTY);
    compositor
        .build(&registry, &view, &RendererOptions::default(), "Opaque")
        .unwrap();
    assert!(!compositor.node_ids().contains(&"Post"));

    registry.register::<PostDepth>();
    let mut compositor = RenderCompositor::new();
    compositor
        .build(&registry, &view, &RendererOptions::default(), "Opaque")
        .unwrap();
    let ids = compositor.node_ids();
    assert_eq!(ids.len(), 4);
    assert_before(&ids, "Color", "Post");
    assert_before(&ids, "Post", "Depth");
    assert_before(&ids, "Depth", "Opaque");
}

#[test]
fn unknown_final_node_fails_to_build() {
    let mut compositor = RenderCompositor::new();
    let err = compositor
        .build(&test_registry(), &view(SampleCount::X1, ViewFlags::EMPTY), &RendererOptions::default(), "Missing")
        .unwrap_err();
    assert!(matches!(err, CompositorError::UnknownNode { ref id } if id == "Missing"));
    assert!(!compositor.is_valid());
}

#[test]
fn unregistered_dependency_fails_to_build() {
    let mut registry = test_registry();
    registry.register::<Dangling>();
    let mut compositor = RenderCompositor::new();
    let err = compositor
        .build(&registry, &view(SampleCount::X1, ViewFlags::EMPTY), &RendererOptions::default(), "Dangling")
        .unwrap_err();
    assert!(matches!(err, CompositorError::UnknownNode { ref id } if id == "Nowhere"));
}

#[test]
fn dependency_cycle_fails_to_build() {
    let mut registry = CompositorNodeRegistry::new();
    registry.register::<LoopA>();
    registry.register::<LoopB>();
    let mut compositor = RenderCompositor::new();
    let err = compositor
        .build(&registry, &view(SampleCount::X1, ViewFlags::EMPTY), &RendererOptions::default(), "LoopA")
        .unwrap_err();
    assert!(matches!(err, CompositorError::Cycle(_)));
}

#[test]
fn executing_an_unbuilt_compositor_is_an_error() {
    let mut compositor = RenderCompositor::new();
    let mut ctx = LaneContext::new();
    assert!(matches!(compositor.execute(&mut ctx), Err(CompositorError::NotBuilt)));
}

#[test]
fn outputs_are_cleared_after_their_last_consumer() {
    let registry = test_registry();
    let mut compositor = RenderCompositor::new();
    compositor
        .build(&registry, &view(SampleCount::X1, ViewFlags::EMPTY), &RendererOptions::default(), "Final")
        .unwrap();
    let ids = compositor.node_ids();
    assert!(compositor.cleared_after(position(&ids, "Opaque")).contains(&"Depth"));
    assert!(compositor.cleared_after(position(&ids, "Final")).contains(&"Opaque"));

    let mut ctx = LaneContext::new();
    ctx.insert(Trace::default());
    compositor.execute(&mut ctx).unwrap();
    let trace = ctx.remove::<Trace>().unwrap().0;
    let at = |event: &str| {
        trace
            .iter()
            .position(|e| e == event)
            .unwrap_or_else(|| panic!("'{event}' missing from {trace:?}"))
    };

    for id in ["Depth", "Color", "Opaque", "Post", "Final"] {
        assert_eq!(trace.iter().filter(|e| **e == format!("clear {id}")).count(), 1);
        assert!(at(&format!("init {id}")) < at(&format!("run {id}")));
    }
    assert!(at("clear Depth") > at("run Opaque"));
    assert!(at("clear Color") > at("run Opaque"));
    assert!(at("clear Color") > at("run Post"));
    assert!(at("clear Opaque") > at("run Final"));
    assert!(at("clear Depth") < at("run Final"));
}

#[test]
fn failing_node_stops_the_view_and_clears_every_output() {
    let mut registry = test_registry();
    registry.register::<Boom>();
    registry.register::<FailingFinal>();
    let mut compositor = RenderCompositor::new();
    compositor
        .build(&registry, &view(SampleCount::X1, ViewFlags::EMPTY), &RendererOptions::default(), "FailingFinal")
        .unwrap();

    let mut ctx = LaneContext::new();
    ctx.insert(Trace::default());
    let err = compositor.execute(&mut ctx).unwrap_err();
    assert!(matches!(err, CompositorError::Node { id: "Boom", .. }));

    let trace = ctx.remove::<Trace>().unwrap().0;
    assert!(trace.contains(&"clear Depth".to_string()));
    assert!(trace.contains(&"clear FailingFinal".to_string()));
    assert!(!trace.contains(&"run FailingFinal".to_string()));
}

#[test]
fn rebuilding_keeps_initialized_nodes_and_retires_the_rest() {
    let registry = test_registry();
    let options = RendererOptions::default();
    let plain = view(SampleCount::X1, ViewFlags::EMPTY);
    let mut compositor = RenderCompositor::new();
    let mut ctx = LaneContext::new();
    ctx.insert(Trace::default());

    compositor.build(&registry, &plain, &options, "Final").unwrap();
    compositor.execute(&mut ctx).unwrap();
    assert!(compositor.is_valid_for(&plain.config()));
    assert!(!compositor.is_valid_for(&view(SampleCount::X4, ViewFlags::EMPTY).config()));

    compositor.build(&registry, &plain, &options, "Post").unwrap();
    assert_eq!(compositor.final_node(), Some("Post"));
    ctx.insert(Trace::default());
    compositor.execute(&mut ctx).unwrap();

    let trace = ctx.remove::<Trace>().unwrap().0;
    assert!(!trace.iter().any(|e| e.starts_with("init")));
    for id in ["Depth", "Opaque", "Final"] {
        assert!(trace.contains(&format!("shutdown {id}")));
    }
    assert!(!trace.contains(&"shutdown Color".to_string()));
    assert_eq!(compositor.node_ids().len(), 2);
}

#[test]
fn shutdown_releases_every_node() {
    let registry = test_registry();
    let mut compositor = RenderCompositor::new();
    compositor
        .build(&registry, &view(SampleCount::X1, ViewFlags::EMPTY), &RendererOptions::default(), "Final")
        .unwrap();
    let mut ctx = LaneContext::new();
    ctx.insert(Trace::default());
    compositor.execute(&mut ctx).unwrap();
    ctx.insert(Trace::default());

    compositor.shutdown(&mut ctx);
    let trace = ctx.remove::<Trace>().unwrap().0;
    assert_eq!(trace.iter().filter(|e| e.starts_with("shutdown")).count(), 5);
    assert!(!compositor.is_valid());
    assert!(compositor.node_ids().is_empty());
}
