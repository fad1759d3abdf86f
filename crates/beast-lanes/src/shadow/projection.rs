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

//! Projection of shadow maps onto the scene.
//!
//! For spot and radial lights the light volume is first rasterized into the
//! stencil buffer (z-pass from outside the volume, z-fail from inside), then
//! drawn again with the projection shader wherever the stencil is set. The
//! projection pass zeroes the stencil behind itself. Directional cascades use
//! one full-screen pass each.
//!
//! Occlusion is written with a min blend into a target cleared to 1, so
//! several shadows of the same light combine.

use super::variation::{ShadowKind, ShadowProjectVariation, StencilVariation};
use super::ShadowError;
use crate::lighting::gbuffer::{OCCLUSION_FORMAT, SCENE_DEPTH_FORMAT};
use crate::shaders;
use crate::util::{lock, GpuVolumeMesh, UniformRing};
use ahash::AHashMap;
use beast_core::math::LinearRgba;
use beast_core::renderer::api::{
    AddressMode, BindGroupId, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindGroupLayoutId,
    BlendComponentDescriptor, BlendStateDescriptor, ColorTargetStateDescriptor, ColorWrites,
    CompareFunction, CullMode, DepthBiasState, DepthStencilStateDescriptor, FilterMode,
    MultisampleStateDescriptor, Operations, PipelineLayoutDescriptor, PipelineLayoutId,
    PrimitiveStateDescriptor, RenderPassColorAttachment, RenderPassDepthStencilAttachment,
    RenderPassDescriptor, RenderPipelineDescriptor, RenderPipelineId, SampleCount,
    SamplerBindingType, SamplerDescriptor, SamplerId, ShaderModuleDescriptor, ShaderModuleId,
    ShaderSourceData, ShaderStageFlags, StencilFaceState, StencilOperation, TextureSampleType,
    TextureViewDimension, TextureViewId, VertexAttributeDescriptor, VertexBufferLayoutDescriptor,
    VertexFormat, VertexStepMode,
};
use beast_core::renderer::error::ResourceError;
use beast_core::renderer::{CommandEncoder, GraphicsDevice, ShadowFilteringQuality};
use bytemuck::{Pod, Zeroable};
use std::borrow::Cow;
use std::sync::Mutex;

const PARAMS_PER_CHUNK: u32 = 64;

/// Uniforms of one projected shadow.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ShadowProjectParams {
    pub shadow_view_proj: [[f32; 4]; 4],
    /// Unit light volume to world.
    pub volume_transform: [[f32; 4]; 4],
    /// Map region inside a spot atlas, in texture coordinates.
    pub uv_rect: [f32; 4],
    /// Light position, then the shadow far plane.
    pub light_position: [f32; 4],
    /// Depth bias, fade transition, near plane, depth range.
    pub depth: [f32; 4],
    /// Cascade start and end in view depth, blend range, layer.
    pub cascade: [f32; 4],
    /// Fade percent, texel size, then padding.
    pub misc: [f32; 4],
}

/// What one projection draws.
#[derive(Debug, Clone, Copy)]
pub struct ProjectedShadow {
    pub params: ShadowProjectParams,
    pub kind: ShadowKind,
    /// Sampling bind group of the shadow map.
    pub map_group: BindGroupId,
}

/// Render targets and per-view bind groups of a projection.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionTargets {
    /// Occlusion target, cleared to 1 at the start of each light.
    pub occlusion: TextureViewId,
    /// Scene depth-stencil.
    pub depth_stencil: TextureViewId,
    /// The view's light grid shading group (view constants).
    pub view_group: BindGroupId,
    /// Scene device depth, laid out as [`ShadowProjector::scene_depth_layout`].
    pub scene_depth_group: BindGroupId,
    pub sample_count: SampleCount,
}

#[derive(Debug, Clone, Copy)]
struct Compiled {
    module: ShaderModuleId,
    pipeline: RenderPipelineId,
}

#[derive(Debug)]
struct ProjectorState {
    params: UniformRing,
    project: AHashMap<(ShadowProjectVariation, SampleCount), Compiled>,
    stencil: AHashMap<(StencilVariation, SampleCount), Compiled>,
    layouts: AHashMap<(ShadowKind, bool), PipelineLayoutId>,
}

/// Projection and stencil pipelines, created per variation as views need
/// them.
#[derive(Debug)]
pub struct ShadowProjector {
    view_layout: BindGroupLayoutId,
    params_layout: BindGroupLayoutId,
    map_layouts: [BindGroupLayoutId; 3],
    depth_layouts: [BindGroupLayoutId; 2],
    stencil_layout: PipelineLayoutId,
    comparison_sampler: SamplerId,
    state: Mutex<ProjectorState>,
}

fn kind_slot(kind: ShadowKind) -> usize {
    match kind {
        ShadowKind::Spot => 0,
        ShadowKind::Radial => 1,
        ShadowKind::Directional => 2,
    }
}

fn volume_vertex_layout() -> [VertexAttributeDescriptor; 1] {
    [VertexAttributeDescriptor {
        shader_location: 0,
        format: VertexFormat::Float32x3,
        offset: 0,
    }]
}

impl ShadowProjector {
    /// `view_layout` is the light grid shading layout.
    pub fn new(device: &dyn GraphicsDevice, view_layout: BindGroupLayoutId) -> Result<Self, ResourceError> {
        let fs = ShaderStageFlags::FRAGMENT;
        let params_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Shadow Project Params Layout"),
            entries: &[BindGroupLayoutEntry::uniform(0, ShaderStageFlags::VERTEX_FRAGMENT, true)],
        })?;

        let mut map_layouts = [params_layout; 3];
        for (slot, (dimension, label)) in [
            (TextureViewDimension::D2, "Shadow Atlas Sampling Layout"),
            (TextureViewDimension::Cube, "Shadow Cubemap Sampling Layout"),
            (TextureViewDimension::D2Array, "Shadow Cascade Sampling Layout"),
        ]
        .into_iter()
        .enumerate()
        {
            map_layouts[slot] = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &[
                    BindGroupLayoutEntry::texture(0, fs, TextureSampleType::Depth, dimension, false),
                    BindGroupLayoutEntry::sampler(1, fs, SamplerBindingType::Comparison),
                ],
            })?;
        }

        let unfilterable = TextureSampleType::Float { filterable: false };
        let depth_layouts = [
            device.create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("Shadow Scene Depth Layout"),
                entries: &[BindGroupLayoutEntry::texture(0, fs, unfilterable, TextureViewDimension::D2, false)],
            })?,
            device.create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("Shadow Scene Depth Layout (MSAA)"),
                entries: &[BindGroupLayoutEntry::texture(0, fs, unfilterable, TextureViewDimension::D2, true)],
            })?,
        ];

        let stencil_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some(Cow::Borrowed("Light Volume Stencil Layout")),
            bind_group_layouts: &[view_layout, params_layout],
        })?;

        let comparison_sampler = device.create_sampler(&SamplerDescriptor {
            label: Some(Cow::Borrowed("Shadow Comparison Sampler")),
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Nearest,
            compare: Some(CompareFunction::LessEqual),
            ..Default::default()
        })?;

        let params = UniformRing::new(
            device,
            params_layout,
            0,
            std::mem::size_of::<ShadowProjectParams>() as u32,
            PARAMS_PER_CHUNK,
            "Shadow Project Params",
        )?;

        Ok(Self {
            view_layout,
            params_layout,
            map_layouts,
            depth_layouts,
            stencil_layout,
            comparison_sampler,
            state: Mutex::new(ProjectorState {
                params,
                project: AHashMap::new(),
                stencil: AHashMap::new(),
                layouts: AHashMap::new(),
            }),
        })
    }

    /// Layout of a shadow map's sampling bind group: depth texture, then the
    /// comparison sampler.
    pub fn map_layout(&self, kind: ShadowKind) -> BindGroupLayoutId {
        self.map_layouts[kind_slot(kind)]
    }

    pub fn comparison_sampler(&self) -> SamplerId {
        self.comparison_sampler
    }

    /// Layout of [`ProjectionTargets::scene_depth_group`].
    pub fn scene_depth_layout(&self, msaa: bool) -> BindGroupLayoutId {
        self.depth_layouts[usize::from(msaa)]
    }

    pub fn begin_frame(&self) {
        lock(&self.state).params.advance();
    }

    fn pipeline_layout(
        &self,
        device: &dyn GraphicsDevice,
        state: &mut ProjectorState,
        kind: ShadowKind,
        msaa: bool,
    ) -> Result<PipelineLayoutId, ResourceError> {
        if let Some(layout) = state.layouts.get(&(kind, msaa)) {
            return Ok(*layout);
        }
        let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some(Cow::Owned(format!("Shadow Project Layout ({kind:?}, msaa: {msaa})"))),
            bind_group_layouts: &[
                self.view_layout,
                self.params_layout,
                self.map_layout(kind),
                self.scene_depth_layout(msaa),
            ],
        })?;
        state.layouts.insert((kind, msaa), layout);
        Ok(layout)
    }

    fn project_pipeline(
        &self,
        device: &dyn GraphicsDevice,
        state: &mut ProjectorState,
        variation: ShadowProjectVariation,
        samples: SampleCount,
    ) -> Result<RenderPipelineId, ShadowError> {
        if let Some(compiled) = state.project.get(&(variation, samples)) {
            return Ok(compiled.pipeline);
        }

        let source = variation.defines().apply(shaders::SHADOW_PROJECT_WGSL)?;
        let label = format!("Shadow Project {variation:?} x{}", samples.count());
        let module = device.create_shader_module(&ShaderModuleDescriptor {
            label: Some(label.as_str()),
            source: ShaderSourceData::Wgsl(Cow::Owned(source)),
        })?;
        let layout = self.pipeline_layout(device, state, variation.kind, variation.msaa)?;

        let attributes = volume_vertex_layout();
        let volume_buffers = [VertexBufferLayoutDescriptor {
            array_stride: GpuVolumeMesh::VERTEX_STRIDE,
            step_mode: VertexStepMode::Vertex,
            attributes: Cow::Borrowed(&attributes),
        }];
        let (buffers, vertex_entry, cull_mode, stencil): (&[VertexBufferLayoutDescriptor], _, _, _) =
            if variation.kind.uses_volume() {
                let clear_marked = StencilFaceState {
                    compare: CompareFunction::NotEqual,
                    fail_op: StencilOperation::Keep,
                    depth_fail_op: StencilOperation::Zero,
                    pass_op: StencilOperation::Zero,
                };
                let cull = if variation.inside_volume {
                    CullMode::Front
                } else {
                    CullMode::Back
                };
                (&volume_buffers, "vs_volume", Some(cull), clear_marked)
            } else {
                (&[], "vs_fullscreen", None, StencilFaceState::IGNORE)
            };

        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(Cow::Owned(label.clone())),
            vertex_shader_module: module,
            vertex_entry_point: Cow::Borrowed(vertex_entry),
            fragment_shader_module: Some(module),
            fragment_entry_point: Some(Cow::Borrowed("fs_main")),
            vertex_buffers_layout: Cow::Borrowed(buffers),
            layout: Some(layout),
            primitive_state: PrimitiveStateDescriptor {
                cull_mode,
                ..Default::default()
            },
            depth_stencil_state: Some(DepthStencilStateDescriptor {
                format: SCENE_DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: CompareFunction::Always,
                stencil_front: stencil,
                stencil_back: stencil,
                stencil_read_mask: 0xff,
                stencil_write_mask: 0xff,
                bias: DepthBiasState::default(),
            }),
            color_target_states: Cow::Owned(vec![ColorTargetStateDescriptor {
                format: OCCLUSION_FORMAT,
                blend: Some(BlendStateDescriptor {
                    color: BlendComponentDescriptor::MIN,
                    alpha: BlendComponentDescriptor::MIN,
                }),
                write_mask: ColorWrites::ALL,
            }]),
            multisample_state: MultisampleStateDescriptor {
                count: samples,
                ..Default::default()
            },
        })?;

        log::debug!("ShadowProjector: Created pipeline {}", label);
        state.project.insert((variation, samples), Compiled { module, pipeline });
        Ok(pipeline)
    }

    fn stencil_pipeline(
        &self,
        device: &dyn GraphicsDevice,
        state: &mut ProjectorState,
        variation: StencilVariation,
        samples: SampleCount,
    ) -> Result<RenderPipelineId, ShadowError> {
        if let Some(compiled) = state.stencil.get(&(variation, samples)) {
            return Ok(compiled.pipeline);
        }

        let source = variation.defines().apply(shaders::SHADOW_STENCIL_WGSL)?;
        let label = format!("Light Volume Stencil {variation:?} x{}", samples.count());
        let module = device.create_shader_module(&ShaderModuleDescriptor {
            label: Some(label.as_str()),
            source: ShaderSourceData::Wgsl(Cow::Owned(source)),
        })?;

        let keep = StencilOperation::Keep;
        let (front, back) = if variation.inside_volume {
            // z-fail
            (
                StencilFaceState {
                    compare: CompareFunction::Always,
                    fail_op: keep,
                    depth_fail_op: StencilOperation::DecrementWrap,
                    pass_op: keep,
                },
                StencilFaceState {
                    compare: CompareFunction::Always,
                    fail_op: keep,
                    depth_fail_op: StencilOperation::IncrementWrap,
                    pass_op: keep,
                },
            )
        } else {
            // z-pass
            (
                StencilFaceState {
                    compare: CompareFunction::Always,
                    fail_op: keep,
                    depth_fail_op: keep,
                    pass_op: StencilOperation::IncrementWrap,
                },
                StencilFaceState {
                    compare: CompareFunction::Always,
                    fail_op: keep,
                    depth_fail_op: keep,
                    pass_op: StencilOperation::DecrementWrap,
                },
            )
        };

        let attributes = volume_vertex_layout();
        let buffers = [VertexBufferLayoutDescriptor {
            array_stride: GpuVolumeMesh::VERTEX_STRIDE,
            step_mode: VertexStepMode::Vertex,
            attributes: Cow::Borrowed(&attributes),
        }];
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(Cow::Owned(label.clone())),
            vertex_shader_module: module,
            vertex_entry_point: Cow::Borrowed("vs_main"),
            fragment_shader_module: Some(module),
            fragment_entry_point: Some(Cow::Borrowed("fs_main")),
            vertex_buffers_layout: Cow::Borrowed(&buffers),
            layout: Some(self.stencil_layout),
            primitive_state: PrimitiveStateDescriptor::default(),
            depth_stencil_state: Some(DepthStencilStateDescriptor {
                format: SCENE_DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: CompareFunction::LessEqual,
                stencil_front: front,
                stencil_back: back,
                stencil_read_mask: 0xff,
                stencil_write_mask: 0xff,
                bias: DepthBiasState::default(),
            }),
            color_target_states: Cow::Owned(vec![ColorTargetStateDescriptor {
                format: OCCLUSION_FORMAT,
                blend: None,
                write_mask: ColorWrites::EMPTY,
            }]),
            multisample_state: MultisampleStateDescriptor {
                count: samples,
                ..Default::default()
            },
        })?;

        state.stencil.insert((variation, samples), Compiled { module, pipeline });
        Ok(pipeline)
    }

    /// Projects every shadow of one light into `targets.occlusion`.
    ///
    /// `volume` is the light's volume mesh; it must be set for spot and
    /// radial shadows.
    #[allow(clippy::too_many_arguments)]
    pub fn project(
        &self,
        device: &dyn GraphicsDevice,
        encoder: &mut dyn CommandEncoder,
        targets: &ProjectionTargets,
        shadows: &[ProjectedShadow],
        volume: Option<&GpuVolumeMesh>,
        quality: ShadowFilteringQuality,
        inside_volume: bool,
    ) -> Result<(), ShadowError> {
        let msaa = targets.sample_count.is_multisampled();
        let mut state = lock(&self.state);

        // Resolve every pipeline and uniform before the pass starts.
        let mut draws = Vec::with_capacity(shadows.len());
        for shadow in shadows {
            let variation = ShadowProjectVariation::new(quality, shadow.kind, msaa, inside_volume);
            let project = self.project_pipeline(device, &mut state, variation, targets.sample_count)?;
            let stencil = if shadow.kind.uses_volume() {
                let variation = StencilVariation { inside_volume, msaa };
                Some(self.stencil_pipeline(device, &mut state, variation, targets.sample_count)?)
            } else {
                None
            };
            let params = state.params.push_pod(device, &shadow.params)?;
            draws.push((shadow, project, stencil, params));
        }
        drop(state);

        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("Shadow Projection Pass"),
            color_attachments: &[RenderPassColorAttachment {
                view: &targets.occlusion,
                resolve_target: None,
                ops: Operations::clear(LinearRgba::WHITE),
            }],
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: &targets.depth_stencil,
                depth_ops: Some(Operations::load()),
                stencil_ops: Some(Operations::load()),
            }),
        });
        pass.set_bind_group(0, targets.view_group, &[]);
        pass.set_bind_group(3, targets.scene_depth_group, &[]);
        pass.set_stencil_reference(0);

        for (shadow, project, stencil, params) in draws {
            pass.set_bind_group(1, params.bind_group, &[params.offset]);
            pass.set_bind_group(2, shadow.map_group, &[]);
            match (stencil, volume) {
                (Some(stencil), Some(mesh)) => {
                    pass.set_vertex_buffer(0, mesh.vertex_buffer, 0);
                    pass.set_index_buffer(mesh.index_buffer, 0, GpuVolumeMesh::INDEX_FORMAT);
                    pass.set_pipeline(stencil);
                    pass.draw_indexed(0..mesh.index_count, 0, 0..1);
                    pass.set_pipeline(project);
                    pass.draw_indexed(0..mesh.index_count, 0, 0..1);
                }
                (Some(_), None) => {
                    log::warn!("ShadowProjector: {:?} shadow projected without a light volume", shadow.kind);
                }
                (None, _) => {
                    pass.set_pipeline(project);
                    pass.draw(0..3, 0..1);
                }
            }
        }
        Ok(())
    }

    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        let mut guard = lock(&self.state);
        let state = &mut *guard;
        let compiled: Vec<Compiled> = state
            .project
            .drain()
            .map(|(_, c)| c)
            .chain(state.stencil.drain().map(|(_, c)| c))
            .collect();
        for c in compiled {
            if let Err(e) = device.destroy_render_pipeline(c.pipeline) {
                log::warn!("ShadowProjector: Failed to destroy pipeline: {:?}", e);
            }
            if let Err(e) = device.destroy_shader_module(c.module) {
                log::warn!("ShadowProjector: Failed to destroy shader module: {:?}", e);
            }
        }
        for (_, layout) in state.layouts.drain() {
            if let Err(e) = device.destroy_pipeline_layout(layout) {
                log::warn!("ShadowProjector: Failed to destroy pipeline layout: {:?}", e);
            }
        }
        state.params.destroy(device);
        drop(guard);

        if let Err(e) = device.destroy_pipeline_layout(self.stencil_layout) {
            log::warn!("ShadowProjector: Failed to destroy pipeline layout: {:?}", e);
        }
        if let Err(e) = device.destroy_sampler(self.comparison_sampler) {
            log::warn!("ShadowProjector: Failed to destroy sampler: {:?}", e);
        }
        let layouts = self
            .map_layouts
            .iter()
            .chain(self.depth_layouts.iter())
            .chain(std::iter::once(&self.params_layout));
        for layout in layouts {
            if let Err(e) = device.destroy_bind_group_layout(*layout) {
                log::warn!("ShadowProjector: Failed to destroy bind group layout: {:?}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_layout_matches_shader_struct() {
        assert_eq!(std::mem::size_of::<ShadowProjectParams>(), 208);
    }
}
