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

//! Nodes that own the view's intermediate targets.

use super::{
    node_identity, output, uses_tiled_lighting, LIGHT_ACCUMULATION, SCENE_COLOR, SCENE_DEPTH,
    TILED_DEFERRED_IBL, TILED_DEFERRED_LIGHTING, UNFLATTEN_LIGHT_ACCUM, UNFLATTEN_SCENE_COLOR,
};
use crate::compositor::outputs::{HdrTarget, LightAccumOutput, SceneColorOutput, SceneDepthOutput};
use crate::compositor::{CompositorNode, CompositorNodeType};
use crate::frame;
use crate::lighting::gbuffer::HDR_FORMAT;
use crate::lighting::LightingResources;
use beast_core::lane::{Lane, LaneContext, LaneError, LaneKind};
use beast_core::math::LinearRgba;
use beast_core::renderer::api::{Operations, RenderPassColorAttachment, RenderPassDescriptor};
use beast_core::renderer::{RendererOptions, RendererView};

fn clear_to_black(ctx: &LaneContext, target: &HdrTarget, label: &str) -> Result<(), LaneError> {
    let encoder = frame::encoder(ctx)?;
    let view = target.texture.view();
    let _pass = encoder.begin_render_pass(&RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[RenderPassColorAttachment {
            view: &view,
            resolve_target: None,
            ops: Operations::clear(LinearRgba::BLACK),
        }],
        depth_stencil_attachment: None,
    });
    Ok(())
}

/// Allocates the scene depth-stencil. The G-buffer pass clears it.
#[derive(Debug, Default)]
pub struct SceneDepthNode;

impl Lane for SceneDepthNode {
    node_identity!(SCENE_DEPTH, LaneKind::Geometry);

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let pool = frame::pool(ctx)?;
        let view = frame::get_ref::<RendererView>(ctx, "Ref<RendererView>")?;
        let depth = SceneDepthOutput::acquire(&pool, view).map_err(LaneError::execution)?;
        ctx.insert(depth);
        Ok(())
    }
}

impl CompositorNode for SceneDepthNode {
    fn clear(&self, ctx: &mut LaneContext) {
        if let (Some(depth), Ok(pool)) = (ctx.remove::<SceneDepthOutput>(), frame::pool(ctx)) {
            depth.release(&pool);
        }
    }
}

impl CompositorNodeType for SceneDepthNode {
    const ID: &'static str = SCENE_DEPTH;

    fn dependencies(_view: &RendererView, _options: &RendererOptions) -> Vec<&'static str> {
        Vec::new()
    }

    fn create() -> Self {
        Self
    }
}

/// Allocates the direct lighting target and clears it to black.
#[derive(Debug, Default)]
pub struct LightAccumulationNode;

impl Lane for LightAccumulationNode {
    node_identity!(LIGHT_ACCUMULATION, LaneKind::Lighting);

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let pool = frame::pool(ctx)?;
        let view = frame::get_ref::<RendererView>(ctx, "Ref<RendererView>")?;
        let options = frame::get_ref::<RendererOptions>(ctx, "Ref<RendererOptions>")?;
        let target =
            HdrTarget::acquire(&pool, view, uses_tiled_lighting(view, options)).map_err(LaneError::execution)?;
        if let Err(e) = clear_to_black(ctx, &target, "Clear Light Accumulation") {
            target.release(&pool);
            return Err(e);
        }
        ctx.insert(LightAccumOutput(target));
        Ok(())
    }
}

impl CompositorNode for LightAccumulationNode {
    fn clear(&self, ctx: &mut LaneContext) {
        if let (Some(LightAccumOutput(target)), Ok(pool)) = (ctx.remove::<LightAccumOutput>(), frame::pool(ctx)) {
            target.release(&pool);
        }
    }
}

impl CompositorNodeType for LightAccumulationNode {
    const ID: &'static str = LIGHT_ACCUMULATION;

    fn dependencies(_view: &RendererView, _options: &RendererOptions) -> Vec<&'static str> {
        Vec::new()
    }

    fn create() -> Self {
        Self
    }
}

/// Allocates the HDR scene color the IBL pass writes.
#[derive(Debug, Default)]
pub struct SceneColorNode;

impl Lane for SceneColorNode {
    node_identity!(SCENE_COLOR, LaneKind::Lighting);

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let pool = frame::pool(ctx)?;
        let view = frame::get_ref::<RendererView>(ctx, "Ref<RendererView>")?;
        let target = HdrTarget::acquire(&pool, view, true).map_err(LaneError::execution)?;
        ctx.insert(SceneColorOutput(target));
        Ok(())
    }
}

impl CompositorNode for SceneColorNode {
    fn clear(&self, ctx: &mut LaneContext) {
        if let (Some(SceneColorOutput(target)), Ok(pool)) = (ctx.remove::<SceneColorOutput>(), frame::pool(ctx)) {
            target.release(&pool);
        }
    }
}

impl CompositorNodeType for SceneColorNode {
    const ID: &'static str = SCENE_COLOR;

    fn dependencies(_view: &RendererView, _options: &RendererOptions) -> Vec<&'static str> {
        Vec::new()
    }

    fn create() -> Self {
        Self
    }
}

fn unflatten(ctx: &LaneContext, target: &HdrTarget) -> Result<(), LaneError> {
    let Some(flat) = target.flat_framebuffer() else {
        return Ok(());
    };
    let device = frame::device(ctx)?;
    let lighting = frame::get_ref::<LightingResources>(ctx, "Ref<LightingResources>")?;
    let encoder = frame::encoder(ctx)?;
    lighting
        .flat
        .execute(
            device.as_ref(),
            encoder,
            &lighting.transient,
            &flat,
            target.texture.view(),
            HDR_FORMAT,
        )
        .map_err(LaneError::execution)
}

/// Copies the tiled lighting output into the multisampled light
/// accumulation texture, so per-light draws can blend onto it.
#[derive(Debug, Default)]
pub struct UnflattenLightAccumNode;

impl Lane for UnflattenLightAccumNode {
    node_identity!(UNFLATTEN_LIGHT_ACCUM, LaneKind::Resolve);

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let LightAccumOutput(target) = output::<LightAccumOutput>(ctx, "LightAccumOutput")?;
        unflatten(ctx, target)
    }
}

impl CompositorNode for UnflattenLightAccumNode {}

impl CompositorNodeType for UnflattenLightAccumNode {
    const ID: &'static str = UNFLATTEN_LIGHT_ACCUM;

    fn dependencies(_view: &RendererView, _options: &RendererOptions) -> Vec<&'static str> {
        vec![TILED_DEFERRED_LIGHTING, LIGHT_ACCUMULATION]
    }

    fn create() -> Self {
        Self
    }
}

/// Copies the IBL output into the multisampled scene color texture.
#[derive(Debug, Default)]
pub struct UnflattenSceneColorNode;

impl Lane for UnflattenSceneColorNode {
    node_identity!(UNFLATTEN_SCENE_COLOR, LaneKind::Resolve);

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let SceneColorOutput(target) = output::<SceneColorOutput>(ctx, "SceneColorOutput")?;
        unflatten(ctx, target)
    }
}

impl CompositorNode for UnflattenSceneColorNode {}

impl CompositorNodeType for UnflattenSceneColorNode {
    const ID: &'static str = UNFLATTEN_SCENE_COLOR;

    fn dependencies(_view: &RendererView, _options: &RendererOptions) -> Vec<&'static str> {
        vec![TILED_DEFERRED_IBL, SCENE_COLOR]
    }

    fn create() -> Self {
        Self
    }
}
