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

use super::maps::SHADOW_MAP_FORMAT;
use crate::shaders;
use crate::util::UniformRing;
use ahash::AHashMap;
use beast_core::math::{Mat4, Rect2I};
use beast_core::renderer::api::{
    BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindGroupLayoutId, CompareFunction,
    DepthBiasState, DepthStencilStateDescriptor, MultisampleStateDescriptor, Operations,
    PipelineLayoutDescriptor, PipelineLayoutId, PrimitiveStateDescriptor, RenderPassDepthStencilAttachment,
    RenderPassDescriptor, RenderPipelineDescriptor, RenderPipelineId, ShaderModuleDescriptor,
    ShaderModuleId, ShaderSourceData, ShaderStageFlags, TextureViewId, VertexAttributeDescriptor,
    VertexBufferLayoutDescriptor, VertexFormat, VertexStepMode,
};
use beast_core::renderer::error::ResourceError;
use beast_core::renderer::{CommandEncoder, GraphicsDevice, MeshDraw};
use bytemuck::{Pod, Zeroable};
use std::borrow::Cow;

const PARAMS_PER_CHUNK: u32 = 64;

/// Uniforms of one shadow depth pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ShadowDepthParams {
    pub view_proj: [[f32; 4]; 4],
    /// Depth bias in clip space, then padding.
    pub depth_bias: [f32; 4],
}

/// Where a depth pass renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthTarget {
    pub view: TextureViewId,
    /// Region of the target the map occupies.
    pub viewport: Rect2I,
    /// Clear the whole target before drawing.
    pub clear: bool,
}

/// One pre-resolved caster draw.
struct CasterDraw<'a> {
    pipeline: RenderPipelineId,
    mesh: &'a MeshDraw,
}

/// Renders shadow casters into depth-only targets.
///
/// Pipelines are created on demand per vertex stride; every caster only
/// feeds its position attribute.
#[derive(Debug)]
pub struct ShadowDepthRenderer {
    params_layout: BindGroupLayoutId,
    pipeline_layout: PipelineLayoutId,
    module: ShaderModuleId,
    pipelines: AHashMap<u64, RenderPipelineId>,
    params: UniformRing,
}

impl ShadowDepthRenderer {
    /// `model_layout` is the layout of [`MeshDraw::model_bind_group`].
    pub fn new(device: &dyn GraphicsDevice, model_layout: BindGroupLayoutId) -> Result<Self, ResourceError> {
        let params_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Shadow Depth Params Layout"),
            entries: &[BindGroupLayoutEntry::uniform(0, ShaderStageFlags::VERTEX, true)],
        })?;
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some(Cow::Borrowed("Shadow Depth Pipeline Layout")),
            bind_group_layouts: &[params_layout, model_layout],
        })?;
        let module = device.create_shader_module(&ShaderModuleDescriptor {
            label: Some("Shadow Depth Shader"),
            source: ShaderSourceData::Wgsl(Cow::Borrowed(shaders::SHADOW_DEPTH_WGSL)),
        })?;
        let params = UniformRing::new(
            device,
            params_layout,
            0,
            std::mem::size_of::<ShadowDepthParams>() as u32,
            PARAMS_PER_CHUNK,
            "Shadow Depth Params",
        )?;

        Ok(Self {
            params_layout,
            pipeline_layout,
            module,
            pipelines: AHashMap::new(),
            params,
        })
    }

    pub fn begin_frame(&mut self) {
        self.params.advance();
    }

    fn pipeline_for(&mut self, device: &dyn GraphicsDevice, stride: u64) -> Result<RenderPipelineId, ResourceError> {
        if let Some(pipeline) = self.pipelines.get(&stride) {
            return Ok(*pipeline);
        }

        let attributes = [VertexAttributeDescriptor {
            shader_location: 0,
            format: VertexFormat::Float32x3,
            offset: 0,
        }];
        let buffers = [VertexBufferLayoutDescriptor {
            array_stride: stride,
            step_mode: VertexStepMode::Vertex,
            attributes: Cow::Borrowed(&attributes),
        }];
        let mut depth_stencil = DepthStencilStateDescriptor::depth_only(SHADOW_MAP_FORMAT, true, CompareFunction::LessEqual);
        depth_stencil.bias = DepthBiasState {
            constant: 2,
            slope_scale: 2.0,
            clamp: 0.0,
        };

        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(Cow::Owned(format!("Shadow Depth Pipeline (stride {stride})"))),
            vertex_shader_module: self.module,
            vertex_entry_point: Cow::Borrowed("vs_main"),
            fragment_shader_module: None,
            fragment_entry_point: None,
            vertex_buffers_layout: Cow::Borrowed(&buffers),
            layout: Some(self.pipeline_layout),
            primitive_state: PrimitiveStateDescriptor::default(),
            depth_stencil_state: Some(depth_stencil),
            color_target_states: Cow::Borrowed(&[]),
            multisample_state: MultisampleStateDescriptor::default(),
        })?;
        log::debug!("ShadowDepthRenderer: Created depth pipeline for vertex stride {}", stride);
        self.pipelines.insert(stride, pipeline);
        Ok(pipeline)
    }

    /// Draws `casters` into `target` with `view_proj`.
    pub fn render(
        &mut self,
        device: &dyn GraphicsDevice,
        encoder: &mut dyn CommandEncoder,
        target: DepthTarget,
        view_proj: &Mat4,
        depth_bias: f32,
        casters: &[&MeshDraw],
    ) -> Result<(), ResourceError> {
        let params = self.params.push_pod(
            device,
            &ShadowDepthParams {
                view_proj: view_proj.to_cols_array_2d(),
                depth_bias: [depth_bias, 0.0, 0.0, 0.0],
            },
        )?;

        let mut draws = Vec::with_capacity(casters.len());
        for mesh in casters {
            draws.push(CasterDraw {
                pipeline: self.pipeline_for(device, mesh.vertex_stride)?,
                mesh,
            });
        }

        let depth_ops = if target.clear {
            Operations::clear(1.0)
        } else {
            Operations::load()
        };
        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("Shadow Depth Pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: &target.view,
                depth_ops: Some(depth_ops),
                stencil_ops: None,
            }),
        });

        let rect = target.viewport;
        pass.set_viewport(
            rect.x as f32,
            rect.y as f32,
            rect.width as f32,
            rect.height as f32,
            0.0,
            1.0,
        );
        pass.set_scissor_rect(rect.x.max(0) as u32, rect.y.max(0) as u32, rect.width, rect.height);
        pass.set_bind_group(0, params.bind_group, &[params.offset]);

        let mut current = None;
        for draw in &draws {
            if current != Some(draw.pipeline) {
                pass.set_pipeline(draw.pipeline);
                current = Some(draw.pipeline);
            }
            let mesh = draw.mesh;
            pass.set_bind_group(1, mesh.model_bind_group, &[mesh.model_offset]);
            pass.set_vertex_buffer(0, mesh.vertex_buffer, 0);
            match mesh.index_buffer {
                Some((buffer, format)) => {
                    pass.set_index_buffer(buffer, 0, format);
                    pass.draw_indexed(0..mesh.element_count, 0, 0..1);
                }
                None => pass.draw(0..mesh.element_count, 0..1),
            }
        }
        Ok(())
    }

    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        for (_, pipeline) in self.pipelines.drain() {
            if let Err(e) = device.destroy_render_pipeline(pipeline) {
                log::warn!("ShadowDepthRenderer: Failed to destroy pipeline: {:?}", e);
            }
        }
        self.params.destroy(device);
        if let Err(e) = device.destroy_shader_module(self.module) {
            log::warn!("ShadowDepthRenderer: Failed to destroy shader module: {:?}", e);
        }
        if let Err(e) = device.destroy_pipeline_layout(self.pipeline_layout) {
            log::warn!("ShadowDepthRenderer: Failed to destroy pipeline layout: {:?}", e);
        }
        if let Err(e) = device.destroy_bind_group_layout(self.params_layout) {
            log::warn!("ShadowDepthRenderer: Failed to destroy bind group layout: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_fit_one_aligned_slot() {
        assert_eq!(std::mem::size_of::<ShadowDepthParams>(), 80);
    }
}
