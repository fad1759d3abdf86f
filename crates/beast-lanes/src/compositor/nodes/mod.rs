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

//! Built-in compositor nodes.
//!
//! The default graph of a view, with `FinalResolve` as its final node:
//!
//! ```text
//! SceneDepth -> GBuffer -> TiledDeferredLighting -> UnflattenLightAccum
//!                       -> StandardDeferredLighting
//!                       -> TiledDeferredIBL -> UnflattenSceneColor
//!                       -> ClusteredForward -> FinalResolve
//! ```
//!
//! Which lighting and unflatten nodes take part depends on the view's
//! sample count and flags and on `RendererOptions::tiled_deferred`.

mod geometry;
mod lighting;
mod resolve;
mod targets;

pub use geometry::{sort_opaque, sort_transparent, ClusteredForwardNode, GBufferNode};
pub use lighting::{StandardDeferredLightingNode, TiledDeferredIBLNode, TiledDeferredLightingNode};
pub use resolve::{FinalResolveNode, ResolveParams};
pub use targets::{
    LightAccumulationNode, SceneColorNode, SceneDepthNode, UnflattenLightAccumNode, UnflattenSceneColorNode,
};

use super::CompositorNodeRegistry;
use crate::frame;
use crate::light_grid::LightGrid;
use beast_core::lane::{LaneContext, LaneError};
use beast_core::renderer::api::BindGroupId;
use beast_core::renderer::{RendererOptions, RendererView, ViewFlags};

pub const SCENE_DEPTH: &str = "SceneDepth";
pub const GBUFFER: &str = "GBuffer";
pub const LIGHT_ACCUMULATION: &str = "LightAccumulation";
pub const SCENE_COLOR: &str = "SceneColor";
pub const TILED_DEFERRED_LIGHTING: &str = "TiledDeferredLighting";
pub const UNFLATTEN_LIGHT_ACCUM: &str = "UnflattenLightAccum";
pub const STANDARD_DEFERRED_LIGHTING: &str = "StandardDeferredLighting";
pub const TILED_DEFERRED_IBL: &str = "TiledDeferredIBL";
pub const UNFLATTEN_SCENE_COLOR: &str = "UnflattenSceneColor";
pub const CLUSTERED_FORWARD: &str = "ClusteredForward";
pub const FINAL_RESOLVE: &str = "FinalResolve";

pub fn register_default_nodes(registry: &mut CompositorNodeRegistry) {
    registry.register::<SceneDepthNode>();
    registry.register::<GBufferNode>();
    registry.register::<LightAccumulationNode>();
    registry.register::<SceneColorNode>();
    registry.register::<TiledDeferredLightingNode>();
    registry.register::<UnflattenLightAccumNode>();
    registry.register::<StandardDeferredLightingNode>();
    registry.register::<TiledDeferredIBLNode>();
    registry.register::<UnflattenSceneColorNode>();
    registry.register::<ClusteredForwardNode>();
    registry.register::<FinalResolveNode>();
}

/// Whether unshadowed lights of `view` are shaded by the tiled pass.
pub(crate) fn uses_tiled_lighting(view: &RendererView, options: &RendererOptions) -> bool {
    options.tiled_deferred && !view.has_flag(ViewFlags::NO_LIGHTING)
}

pub(crate) fn output<'a, T: 'static>(ctx: &'a LaneContext, name: &'static str) -> Result<&'a T, LaneError> {
    ctx.get::<T>().ok_or(LaneError::missing(name))
}

pub(crate) fn grid_group(ctx: &LaneContext) -> Result<BindGroupId, LaneError> {
    frame::get_slot::<LightGrid>(ctx, "Slot<LightGrid>")?
        .shading_bind_group()
        .ok_or(LaneError::NotInitialized)
}

/// Lane boilerplate shared by every node.
macro_rules! node_identity {
    ($name:expr, $kind:expr) => {
        fn strategy_name(&self) -> &'static str {
            $name
        }

        fn lane_kind(&self) -> beast_core::lane::LaneKind {
            $kind
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    };
}
pub(crate) use node_identity;
