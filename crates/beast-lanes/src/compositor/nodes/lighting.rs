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

//! Lighting nodes wrapping the shared passes in [`LightingResources`].

use super::{
    grid_group, node_identity, output, uses_tiled_lighting, GBUFFER, LIGHT_ACCUMULATION, SCENE_COLOR, SCENE_DEPTH,
    STANDARD_DEFERRED_LIGHTING, TILED_DEFERRED_IBL, TILED_DEFERRED_LIGHTING, UNFLATTEN_LIGHT_ACCUM,
};
use crate::compositor::outputs::{GBufferOutput, LightAccumOutput, SceneColorOutput, SceneDepthOutput};
use crate::compositor::{CompositorNode, CompositorNodeType};
use crate::frame;
use crate::light_data::SceneLighting;
use crate::lighting::gbuffer::OCCLUSION_FORMAT;
use crate::lighting::{
    DeferredLightingFrame, DeferredLightingTargets, IblInputs, IblParams, LightingResources, TiledView,
};
use crate::pool::PooledTextureDesc;
use crate::shadow::ShadowRendering;
use beast_core::lane::{Lane, LaneContext, LaneError, LaneKind};
use beast_core::renderer::api::{BindGroupDescriptor, BindGroupEntry, TextureUsage};
use beast_core::renderer::{RendererOptions, RendererView, SceneFrame, ViewFlags};

fn tiled_view(ctx: &LaneContext, view: &RendererView) -> Result<TiledView, LaneError> {
    Ok(TiledView {
        width: view.width(),
        height: view.height(),
        grid_group: grid_group(ctx)?,
    })
}

/// Adds every unshadowed light to the light accumulation target in one
/// compute dispatch.
#[derive(Debug, Default)]
pub struct TiledDeferredLightingNode;

impl Lane for TiledDeferredLightingNode {
    node_identity!(TILED_DEFERRED_LIGHTING, LaneKind::Lighting);

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let device = frame::device(ctx)?;
        let view = frame::get_ref::<RendererView>(ctx, "Ref<RendererView>")?;
        let resources = frame::get_ref::<LightingResources>(ctx, "Ref<LightingResources>")?;
        let gbuffer = output::<GBufferOutput>(ctx, "GBufferOutput")?.views();
        let LightAccumOutput(accumulation) = output::<LightAccumOutput>(ctx, "LightAccumOutput")?;
        let tiled = tiled_view(ctx, view)?;
        let encoder = frame::encoder(ctx)?;

        resources
            .tiled
            .execute(
                device.as_ref(),
                encoder,
                &resources.transient,
                &tiled,
                &gbuffer,
                accumulation.tiled_output(),
            )
            .map_err(LaneError::execution)
    }
}

impl CompositorNode for TiledDeferredLightingNode {}

impl CompositorNodeType for TiledDeferredLightingNode {
    const ID: &'static str = TILED_DEFERRED_LIGHTING;

    fn dependencies(_view: &RendererView, _options: &RendererOptions) -> Vec<&'static str> {
        vec![GBUFFER, LIGHT_ACCUMULATION]
    }

    fn create() -> Self {
        Self
    }
}

/// Projects shadows and draws the lights the tiled pass skips.
#[derive(Debug, Default)]
pub struct StandardDeferredLightingNode;

impl Lane for StandardDeferredLightingNode {
    node_identity!(STANDARD_DEFERRED_LIGHTING, LaneKind::Lighting);

    fn estimate_cost(&self, ctx: &LaneContext) -> f32 {
        frame::get_ref::<SceneLighting>(ctx, "Ref<SceneLighting>")
            .map_or(1.0, |lighting| 1.0 + lighting.visible_lights.total() as f32 * 0.1)
    }

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let device = frame::device(ctx)?;
        let pool = frame::pool(ctx)?;
        let view = frame::get_ref::<RendererView>(ctx, "Ref<RendererView>")?;
        let options = frame::get_ref::<RendererOptions>(ctx, "Ref<RendererOptions>")?;
        let scene = frame::get_ref::<SceneFrame>(ctx, "Ref<SceneFrame>")?;
        let lighting = frame::get_ref::<SceneLighting>(ctx, "Ref<SceneLighting>")?;
        let shadows = frame::get_ref::<ShadowRendering>(ctx, "Ref<ShadowRendering>")?;
        let resources = frame::get_ref::<LightingResources>(ctx, "Ref<LightingResources>")?;
        let projector = shadows.projector().ok_or(LaneError::NotInitialized)?;
        let gbuffer = output::<GBufferOutput>(ctx, "GBufferOutput")?.views();
        let depth = output::<SceneDepthOutput>(ctx, "SceneDepthOutput")?.texture.view();
        let LightAccumOutput(accumulation) = output::<LightAccumOutput>(ctx, "LightAccumOutput")?;
        let grid = grid_group(ctx)?;
        let encoder = frame::encoder(ctx)?;

        let msaa = view.sample_count.is_multisampled();
        let scene_depth_group = resources
            .transient
            .create(
                device.as_ref(),
                &BindGroupDescriptor {
                    label: Some("Shadow Scene Depth"),
                    layout: projector.scene_depth_layout(msaa),
                    entries: &[BindGroupEntry::texture(0, gbuffer.depth)],
                },
            )
            .map_err(LaneError::execution)?;
        let occlusion = pool
            .get_texture(&PooledTextureDesc::create_2d(
                OCCLUSION_FORMAT,
                view.width(),
                view.height(),
                TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
                view.sample_count,
            ))
            .map_err(LaneError::execution)?;

        let targets = DeferredLightingTargets {
            gbuffer,
            light_accumulation: accumulation.texture.view(),
            depth_stencil: depth,
            occlusion: occlusion.view(),
            grid_group: grid,
            scene_depth_group,
            sample_count: view.sample_count,
        };
        let lighting_frame = DeferredLightingFrame {
            view,
            view_index: frame::view_index(ctx),
            scene,
            lighting,
            shadows,
            volumes: &resources.volumes,
            tiled: uses_tiled_lighting(view, options),
        };
        let result = resources
            .standard
            .render(device.as_ref(), encoder, &resources.transient, &lighting_frame, &targets);
        pool.release_texture(occlusion);
        result.map_err(LaneError::execution)
    }
}

impl CompositorNode for StandardDeferredLightingNode {}

impl CompositorNodeType for StandardDeferredLightingNode {
    const ID: &'static str = STANDARD_DEFERRED_LIGHTING;

    fn dependencies(view: &RendererView, options: &RendererOptions) -> Vec<&'static str> {
        let mut deps = vec![GBUFFER, SCENE_DEPTH, LIGHT_ACCUMULATION];
        if uses_tiled_lighting(view, options) {
            deps.push(if view.sample_count.is_multisampled() {
                UNFLATTEN_LIGHT_ACCUM
            } else {
                TILED_DEFERRED_LIGHTING
            });
        }
        deps
    }

    fn create() -> Self {
        Self
    }
}

/// Adds reflections and sky lighting to the accumulated direct lighting and
/// writes the scene color.
#[derive(Debug, Default)]
pub struct TiledDeferredIBLNode;

impl Lane for TiledDeferredIBLNode {
    node_identity!(TILED_DEFERRED_IBL, LaneKind::Lighting);

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let device = frame::device(ctx)?;
        let view = frame::get_ref::<RendererView>(ctx, "Ref<RendererView>")?;
        let scene = frame::get_ref::<SceneFrame>(ctx, "Ref<SceneFrame>")?;
        let lighting = frame::get_ref::<SceneLighting>(ctx, "Ref<SceneLighting>")?;
        let resources = frame::get_ref::<LightingResources>(ctx, "Ref<LightingResources>")?;
        let gbuffer = output::<GBufferOutput>(ctx, "GBufferOutput")?.views();
        let LightAccumOutput(accumulation) = output::<LightAccumOutput>(ctx, "LightAccumOutput")?;
        let SceneColorOutput(color) = output::<SceneColorOutput>(ctx, "SceneColorOutput")?;
        let tiled = tiled_view(ctx, view)?;
        let encoder = frame::encoder(ctx)?;

        let placeholders = &resources.placeholders;
        let has_probes = scene.reflection_cubemaps.is_some() && !lighting.visible_probes.is_empty();
        let inputs = IblInputs {
            reflection_probes: scene.reflection_cubemaps.unwrap_or(placeholders.cube_array),
            sky: scene.sky_cubemap.unwrap_or(placeholders.cube),
            brdf_lut: resources.brdf_lut.view,
            params: IblParams::new(
                scene.sky_cubemap.is_some(),
                view.has_flag(ViewFlags::NO_REFLECTIONS),
                has_probes,
            ),
        };
        resources
            .ibl
            .execute(
                device.as_ref(),
                encoder,
                &resources.transient,
                &tiled,
                &gbuffer,
                accumulation.texture.view(),
                &inputs,
                color.tiled_output(),
            )
            .map_err(LaneError::execution)
    }
}

impl CompositorNode for TiledDeferredIBLNode {}

impl CompositorNodeType for TiledDeferredIBLNode {
    const ID: &'static str = TILED_DEFERRED_IBL;

    fn dependencies(view: &RendererView, _options: &RendererOptions) -> Vec<&'static str> {
        let mut deps = vec![GBUFFER, LIGHT_ACCUMULATION, SCENE_COLOR];
        if !view.has_flag(ViewFlags::NO_LIGHTING) {
            deps.push(STANDARD_DEFERRED_LIGHTING);
        }
        deps
    }

    fn create() -> Self {
        Self
    }
}
