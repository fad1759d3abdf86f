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

//! Per-light deferred shading.
//!
//! Draws the lights the tiled pass does not handle: every shadowed light,
//! or every light when tiled shading is off. Each shadowed light first has
//! its shadows projected into the occlusion target, then its volume is drawn
//! additively into the light accumulation target. Lights without a shadow
//! to project are batched into a single pass.

use super::gbuffer::{HDR_FORMAT, SCENE_DEPTH_FORMAT};
use super::tiled::GBufferViews;
use crate::light_data::{LightData, SceneLighting};
use crate::shaders;
use crate::shadow::{ProjectionTargets, ShadowError, ShadowRendering};
use crate::util::{light_volume, lock, GpuVolumeMesh, LightVolumes, ShaderDefines, TransientBindGroups, UniformRing};
use ahash::AHashMap;
use beast_core::math::Mat4;
use beast_core::renderer::api::{
    BindGroupDescriptor, BindGroupEntry, BindGroupId, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindGroupLayoutId, BlendStateDescriptor, ColorTargetStateDescriptor,
    ColorWrites, CompareFunction, CullMode, DepthStencilStateDescriptor, MultisampleStateDescriptor,
    Operations, PipelineLayoutDescriptor, PipelineLayoutId, PrimitiveStateDescriptor,
    RenderPassColorAttachment, RenderPassDepthStencilAttachment, RenderPassDescriptor,
    RenderPipelineDescriptor, RenderPipelineId, SampleCount, ShaderModuleDescriptor, ShaderModuleId,
    ShaderSourceData, ShaderStageFlags, TextureSampleType, TextureViewDimension, TextureViewId,
    VertexAttributeDescriptor, VertexBufferLayoutDescriptor, VertexFormat, VertexStepMode,
};
use beast_core::renderer::error::ResourceError;
use beast_core::renderer::{
    CommandEncoder, GraphicsDevice, LightType, RendererLight, RendererView, SceneFrame, ViewFlags,
};
use bytemuck::{Pod, Zeroable};
use std::borrow::Cow;
use std::sync::Mutex;

const PARAMS_PER_CHUNK: u32 = 64;

/// Uniforms of one deferred light draw.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DeferredLightParams {
    pub light: LightData,
    pub volume_transform: [[f32; 4]; 4],
    /// Light type (0 directional, 1 radial, 2 spot), occlusion flag, unused.
    pub misc: [u32; 4],
}

impl DeferredLightParams {
    pub fn new(light: &RendererLight, use_occlusion: bool) -> Self {
        let (volume_transform, light_type) = match light.light_type {
            LightType::Directional => (Mat4::IDENTITY, 0),
            LightType::Radial => (light_volume::volume_transform(light), 1),
            LightType::Spot => (light_volume::volume_transform(light), 2),
        };
        Self {
            light: LightData::from_light(light),
            volume_transform: volume_transform.to_cols_array_2d(),
            misc: [light_type, u32::from(use_occlusion), 0, 0],
        }
    }
}

/// Pipeline selector of a light draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeferredLightVariation {
    pub light_type: LightType,
    /// Camera inside the light volume: back faces are drawn with a reversed
    /// depth test.
    pub inside_volume: bool,
    pub msaa: bool,
}

impl DeferredLightVariation {
    pub fn new(light_type: LightType, inside_volume: bool, msaa: bool) -> Self {
        Self {
            light_type,
            inside_volume: inside_volume && light_type != LightType::Directional,
            msaa,
        }
    }

    fn uses_volume(&self) -> bool {
        self.light_type != LightType::Directional
    }

    /// Cull mode and depth test of the draw.
    pub fn raster_state(&self) -> (Option<CullMode>, CompareFunction) {
        match (self.uses_volume(), self.inside_volume) {
            (false, _) => (None, CompareFunction::Always),
            (true, false) => (Some(CullMode::Back), CompareFunction::LessEqual),
            (true, true) => (Some(CullMode::Front), CompareFunction::GreaterEqual),
        }
    }
}

/// Per-view inputs and targets of the pass.
#[derive(Debug, Clone, Copy)]
pub struct DeferredLightingTargets {
    pub gbuffer: GBufferViews,
    pub light_accumulation: TextureViewId,
    /// Scene depth-stencil, read for volume depth tests and projection.
    pub depth_stencil: TextureViewId,
    /// Shadow occlusion target, same sample count as the view.
    pub occlusion: TextureViewId,
    /// The view's light grid shading group.
    pub grid_group: BindGroupId,
    /// Scene device depth for shadow projection.
    pub scene_depth_group: BindGroupId,
    pub sample_count: SampleCount,
}

/// Frame data the pass reads.
#[derive(Clone, Copy)]
pub struct DeferredLightingFrame<'a> {
    pub view: &'a RendererView,
    pub view_index: usize,
    pub scene: &'a SceneFrame,
    pub lighting: &'a SceneLighting,
    pub shadows: &'a ShadowRendering,
    pub volumes: &'a LightVolumes,
    /// Unshadowed lights were already shaded by the tiled pass.
    pub tiled: bool,
}

struct LightDraw<'a> {
    light: &'a RendererLight,
    use_occlusion: bool,
}

#[derive(Debug)]
struct DeferredState {
    params: UniformRing,
    modules: [Option<ShaderModuleId>; 2],
    pipelines: AHashMap<(DeferredLightVariation, SampleCount), RenderPipelineId>,
}

/// Standard deferred lighting pass.
#[derive(Debug)]
pub struct StandardDeferredLighting {
    params_layout: BindGroupLayoutId,
    gbuffer_layouts: [BindGroupLayoutId; 2],
    pipeline_layouts: [PipelineLayoutId; 2],
    state: Mutex<DeferredState>,
}

impl StandardDeferredLighting {
    pub fn new(device: &dyn GraphicsDevice, grid_layout: BindGroupLayoutId) -> Result<Self, ResourceError> {
        let fs = ShaderStageFlags::FRAGMENT;
        let params_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Deferred Light Params"),
            entries: &[BindGroupLayoutEntry::uniform(0, ShaderStageFlags::VERTEX_FRAGMENT, true)],
        })?;
        let unfilterable = TextureSampleType::Float { filterable: false };
        let mut gbuffer_layouts = [params_layout; 2];
        let mut pipeline_layouts = Vec::with_capacity(2);
        for msaa in [false, true] {
            let entries: Vec<BindGroupLayoutEntry> = (0..5)
                .map(|binding| BindGroupLayoutEntry::texture(binding, fs, unfilterable, TextureViewDimension::D2, msaa))
                .collect();
            let layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some(if msaa { "Deferred Light Inputs (MSAA)" } else { "Deferred Light Inputs" }),
                entries: &entries,
            })?;
            gbuffer_layouts[usize::from(msaa)] = layout;
            pipeline_layouts.push(device.create_pipeline_layout(&PipelineLayoutDescriptor {
                label: Some(Cow::Borrowed("Deferred Light Layout")),
                bind_group_layouts: &[grid_layout, params_layout, layout],
            })?);
        }
        let params = UniformRing::new(
            device,
            params_layout,
            0,
            std::mem::size_of::<DeferredLightParams>() as u32,
            PARAMS_PER_CHUNK,
            "Deferred Light Params",
        )?;

        Ok(Self {
            params_layout,
            gbuffer_layouts,
            pipeline_layouts: [pipeline_layouts[0], pipeline_layouts[1]],
            state: Mutex::new(DeferredState {
                params,
                modules: [None; 2],
                pipelines: AHashMap::new(),
            }),
        })
    }

    pub fn begin_frame(&self) {
        lock(&self.state).params.advance();
    }

    fn module(&self, device: &dyn GraphicsDevice, state: &mut DeferredState, msaa: bool) -> Result<ShaderModuleId, ResourceError> {
        let slot = usize::from(msaa);
        if let Some(module) = state.modules[slot] {
            return Ok(module);
        }
        let mut defines = ShaderDefines::new();
        if msaa {
            defines.set("MSAA");
        }
        let source = defines.apply(shaders::DEFERRED_LIGHT_WGSL)?;
        let module = device.create_shader_module(&ShaderModuleDescriptor {
            label: Some("Deferred Light"),
            source: ShaderSourceData::Wgsl(Cow::Owned(source)),
        })?;
        state.modules[slot] = Some(module);
        Ok(module)
    }

    fn pipeline(
        &self,
        device: &dyn GraphicsDevice,
        state: &mut DeferredState,
        variation: DeferredLightVariation,
        samples: SampleCount,
    ) -> Result<RenderPipelineId, ResourceError> {
        if let Some(pipeline) = state.pipelines.get(&(variation, samples)) {
            return Ok(*pipeline);
        }
        let module = self.module(device, state, variation.msaa)?;
        let (cull_mode, depth_compare) = variation.raster_state();
        let attributes = [VertexAttributeDescriptor {
            shader_location: 0,
            format: VertexFormat::Float32x3,
            offset: 0,
        }];
        let volume_buffers = [VertexBufferLayoutDescriptor {
            array_stride: GpuVolumeMesh::VERTEX_STRIDE,
            step_mode: VertexStepMode::Vertex,
            attributes: Cow::Borrowed(&attributes),
        }];
        let (buffers, vertex_entry): (&[VertexBufferLayoutDescriptor], _) = if variation.uses_volume() {
            (&volume_buffers, "vs_volume")
        } else {
            (&[], "vs_fullscreen")
        };

        let label = format!("Deferred Light {variation:?} x{}", samples.count());
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(Cow::Owned(label)),
            vertex_shader_module: module,
            vertex_entry_point: Cow::Borrowed(vertex_entry),
            fragment_shader_module: Some(module),
            fragment_entry_point: Some(Cow::Borrowed("fs_main")),
            vertex_buffers_layout: Cow::Borrowed(buffers),
            layout: Some(self.pipeline_layouts[usize::from(variation.msaa)]),
            primitive_state: PrimitiveStateDescriptor {
                cull_mode,
                ..Default::default()
            },
            depth_stencil_state: Some(DepthStencilStateDescriptor::depth_only(
                SCENE_DEPTH_FORMAT,
                false,
                depth_compare,
            )),
            color_target_states: Cow::Owned(vec![ColorTargetStateDescriptor {
                format: HDR_FORMAT,
                blend: Some(BlendStateDescriptor::ADDITIVE),
                write_mask: ColorWrites::ALL,
            }]),
            multisample_state: MultisampleStateDescriptor {
                count: samples,
                ..Default::default()
            },
        })?;
        state.pipelines.insert((variation, samples), pipeline);
        Ok(pipeline)
    }

    /// Shades the lights of one view. Failures on a single light are logged
    /// and that light is skipped.
    pub fn render(
        &self,
        device: &dyn GraphicsDevice,
        encoder: &mut dyn CommandEncoder,
        transient: &TransientBindGroups,
        frame: &DeferredLightingFrame<'_>,
        targets: &DeferredLightingTargets,
    ) -> Result<(), ShadowError> {
        let view = frame.view;
        if view.has_flag(ViewFlags::NO_LIGHTING) {
            return Ok(());
        }
        let no_shadows = view.has_flag(ViewFlags::NO_SHADOWS);
        let lights = &frame.lighting.visible_lights;
        let gbuffer = &targets.gbuffer;
        let inputs = transient.create(
            device,
            &BindGroupDescriptor {
                label: Some("Deferred Light Inputs"),
                layout: self.gbuffer_layouts[usize::from(targets.sample_count.is_multisampled())],
                entries: &[
                    BindGroupEntry::texture(0, gbuffer.albedo),
                    BindGroupEntry::texture(1, gbuffer.normal),
                    BindGroupEntry::texture(2, gbuffer.material),
                    BindGroupEntry::texture(3, gbuffer.depth),
                    BindGroupEntry::texture(4, targets.occlusion),
                ],
            },
        )?;
        let projection = ProjectionTargets {
            occlusion: targets.occlusion,
            depth_stencil: targets.depth_stencil,
            view_group: targets.grid_group,
            scene_depth_group: targets.scene_depth_group,
            sample_count: targets.sample_count,
        };

        let mut unshadowed = Vec::new();
        for (gpu_index, &scene_index) in lights.scene_indices().iter().enumerate() {
            if !frame.lighting.light_visibility.is_visible(frame.view_index, scene_index) {
                continue;
            }
            let Some(light) = frame.scene.lights.get(scene_index) else {
                continue;
            };
            let ty = light.light_type;
            let shadowed = (gpu_index as u32) < lights.offset(ty) + lights.num_shadowed_lights(ty);
            if frame.tiled && !shadowed {
                continue;
            }
            if !shadowed || no_shadows {
                unshadowed.push(LightDraw {
                    light,
                    use_occlusion: false,
                });
                continue;
            }

            let projected = match frame.shadows.project_light(
                device,
                encoder,
                frame.view_index,
                view,
                scene_index,
                light,
                &projection,
                frame.volumes,
            ) {
                Ok(projected) => projected,
                Err(e) => {
                    log::warn!("StandardDeferredLighting: Skipping shadows of light {}: {}", scene_index, e);
                    false
                }
            };
            let draw = [LightDraw {
                light,
                use_occlusion: projected,
            }];
            if let Err(e) = self.draw_lights(device, encoder, frame, targets, inputs, &draw) {
                log::warn!("StandardDeferredLighting: Skipping light {}: {}", scene_index, e);
            }
        }

        if !unshadowed.is_empty() {
            self.draw_lights(device, encoder, frame, targets, inputs, &unshadowed)?;
        }
        Ok(())
    }

    fn draw_lights(
        &self,
        device: &dyn GraphicsDevice,
        encoder: &mut dyn CommandEncoder,
        frame: &DeferredLightingFrame<'_>,
        targets: &DeferredLightingTargets,
        inputs: BindGroupId,
        draws: &[LightDraw<'_>],
    ) -> Result<(), ResourceError> {
        let msaa = targets.sample_count.is_multisampled();
        let camera = frame.view.position();
        let margin = light_volume::near_plane_margin(frame.view);

        let mut resolved = Vec::with_capacity(draws.len());
        {
            let mut state = lock(&self.state);
            for draw in draws {
                let inside = light_volume::is_camera_inside(draw.light, camera, margin);
                let variation = DeferredLightVariation::new(draw.light.light_type, inside, msaa);
                let pipeline = self.pipeline(device, &mut state, variation, targets.sample_count)?;
                let params = state
                    .params
                    .push_pod(device, &DeferredLightParams::new(draw.light, draw.use_occlusion))?;
                resolved.push((pipeline, params, frame.volumes.mesh_for(draw.light.light_type)));
            }
        }

        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("Standard Deferred Lighting"),
            color_attachments: &[RenderPassColorAttachment {
                view: &targets.light_accumulation,
                resolve_target: None,
                ops: Operations::load(),
            }],
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: &targets.depth_stencil,
                depth_ops: Some(Operations::load()),
                stencil_ops: Some(Operations::load()),
            }),
        });
        pass.set_bind_group(0, targets.grid_group, &[]);
        pass.set_bind_group(2, inputs, &[]);
        for (pipeline, params, volume) in resolved {
            pass.set_pipeline(pipeline);
            pass.set_bind_group(1, params.bind_group, &[params.offset]);
            match volume {
                Some(mesh) => {
                    pass.set_vertex_buffer(0, mesh.vertex_buffer, 0);
                    pass.set_index_buffer(mesh.index_buffer, 0, GpuVolumeMesh::INDEX_FORMAT);
                    pass.draw_indexed(0..mesh.index_count, 0, 0..1);
                }
                None => pass.draw(0..3, 0..1),
            }
        }
        Ok(())
    }

    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        let mut state = lock(&self.state);
        for (_, pipeline) in state.pipelines.drain() {
            if let Err(e) = device.destroy_render_pipeline(pipeline) {
                log::warn!("StandardDeferredLighting: Failed to destroy pipeline: {:?}", e);
            }
        }
        for module in state.modules.iter_mut().filter_map(Option::take) {
            if let Err(e) = device.destroy_shader_module(module) {
                log::warn!("StandardDeferredLighting: Failed to destroy shader module: {:?}", e);
            }
        }
        state.params.destroy(device);
        for layout in self.pipeline_layouts {
            if let Err(e) = device.destroy_pipeline_layout(layout) {
                log::warn!("StandardDeferredLighting: Failed to destroy pipeline layout: {:?}", e);
            }
        }
        for layout in self.gbuffer_layouts.into_iter().chain([self.params_layout]) {
            if let Err(e) = device.destroy_bind_group_layout(layout) {
                log::warn!("StandardDeferredLighting: Failed to destroy bind group layout: {:?}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beast_core::math::{LinearRgba, Vec3};

    #[test]
    fn params_match_shader_struct() {
        assert_eq!(std::mem::size_of::<DeferredLightParams>(), 160);
    }

    #[test]
    fn directional_lights_ignore_the_camera_position() {
        let variation = DeferredLightVariation::new(LightType::Directional, true, false);
        assert!(!variation.inside_volume);
        assert_eq!(variation.raster_state(), (None, CompareFunction::Always));
    }

    #[test]
    fn inside_volume_draws_back_faces() {
        let outside = DeferredLightVariation::new(LightType::Radial, false, false);
        let inside = DeferredLightVariation::new(LightType::Radial, true, false);
        assert_eq!(outside.raster_state(), (Some(CullMode::Back), CompareFunction::LessEqual));
        assert_eq!(inside.raster_state(), (Some(CullMode::Front), CompareFunction::GreaterEqual));
    }

    #[test]
    fn params_encode_type_and_occlusion() {
        let light = RendererLight::radial(Vec3::ZERO, 5.0, LinearRgba::WHITE, 10.0);
        let params = DeferredLightParams::new(&light, true);
        assert_eq!(params.misc[..2], [1, 1]);
        let light = RendererLight::directional(Vec3::NEG_Y, LinearRgba::WHITE, 1.0);
        let params = DeferredLightParams::new(&light, false);
        assert_eq!(params.misc[..2], [0, 0]);
        assert_eq!(params.volume_transform, Mat4::IDENTITY.to_cols_array_2d());
    }
}
