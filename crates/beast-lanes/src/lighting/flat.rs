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

//! Unflattening of per-sample compute output.

use crate::shaders;
use crate::util::{lock, TransientBindGroups, UniformRing};
use ahash::AHashMap;
use beast_core::math::LinearRgba;
use beast_core::renderer::api::{
    BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor, BindGroupLayoutEntry,
    BindGroupLayoutId, BufferId, ColorTargetStateDescriptor, MultisampleStateDescriptor, Operations,
    PipelineLayoutDescriptor, PipelineLayoutId, PrimitiveStateDescriptor, RenderPassColorAttachment,
    RenderPassDescriptor, RenderPipelineDescriptor, RenderPipelineId, SampleCount,
    ShaderModuleDescriptor, ShaderModuleId, ShaderSourceData, ShaderStageFlags, TextureFormat,
    TextureViewId,
};
use beast_core::renderer::error::ResourceError;
use beast_core::renderer::{CommandEncoder, GraphicsDevice};
use bytemuck::{Pod, Zeroable};
use std::borrow::Cow;
use std::sync::Mutex;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
struct FlatLayout {
    size: [u32; 4],
}

/// Flat buffer produced by an MSAA compute pass.
#[derive(Debug, Clone, Copy)]
pub struct FlatFramebuffer {
    pub buffer: BufferId,
    pub width: u32,
    pub height: u32,
    pub samples: SampleCount,
}

impl FlatFramebuffer {
    /// Bytes needed for a `width` x `height` buffer of `vec4<f32>` samples.
    pub fn byte_size(width: u32, height: u32, samples: SampleCount) -> u64 {
        u64::from(width) * u64::from(height) * u64::from(samples.count()) * 16
    }
}

#[derive(Debug)]
struct FlatState {
    dims: UniformRing,
    pipelines: AHashMap<(SampleCount, TextureFormat), RenderPipelineId>,
}

/// Full-screen pass writing each sample of a multisampled target from a
/// flat buffer.
#[derive(Debug)]
pub struct FlatFramebufferToTexture {
    input_layout: BindGroupLayoutId,
    dims_layout: BindGroupLayoutId,
    layout: PipelineLayoutId,
    module: ShaderModuleId,
    state: Mutex<FlatState>,
}

impl FlatFramebufferToTexture {
    pub fn new(device: &dyn GraphicsDevice) -> Result<Self, ResourceError> {
        let fs = ShaderStageFlags::FRAGMENT;
        let input_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Flat Framebuffer Input"),
            entries: &[BindGroupLayoutEntry::storage(0, fs, true)],
        })?;
        let dims_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Flat Framebuffer Layout"),
            entries: &[BindGroupLayoutEntry::uniform(0, fs, true)],
        })?;
        let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some(Cow::Borrowed("Flat Framebuffer To Texture")),
            bind_group_layouts: &[input_layout, dims_layout],
        })?;
        let module = device.create_shader_module(&ShaderModuleDescriptor {
            label: Some("Flat Framebuffer To Texture"),
            source: ShaderSourceData::Wgsl(Cow::Borrowed(shaders::FLAT_TO_TEXTURE_WGSL)),
        })?;
        let dims = UniformRing::new(
            device,
            dims_layout,
            0,
            std::mem::size_of::<FlatLayout>() as u32,
            8,
            "Flat Framebuffer Dims",
        )?;
        Ok(Self {
            input_layout,
            dims_layout,
            layout,
            module,
            state: Mutex::new(FlatState {
                dims,
                pipelines: AHashMap::new(),
            }),
        })
    }

    pub fn begin_frame(&self) {
        lock(&self.state).dims.advance();
    }

    fn pipeline(
        &self,
        device: &dyn GraphicsDevice,
        state: &mut FlatState,
        samples: SampleCount,
        format: TextureFormat,
    ) -> Result<RenderPipelineId, ResourceError> {
        if let Some(pipeline) = state.pipelines.get(&(samples, format)) {
            return Ok(*pipeline);
        }
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(Cow::Owned(format!("Flat To Texture {format:?} x{}", samples.count()))),
            vertex_shader_module: self.module,
            vertex_entry_point: Cow::Borrowed("vs_main"),
            fragment_shader_module: Some(self.module),
            fragment_entry_point: Some(Cow::Borrowed("fs_main")),
            vertex_buffers_layout: Cow::Borrowed(&[]),
            layout: Some(self.layout),
            primitive_state: PrimitiveStateDescriptor::default(),
            depth_stencil_state: None,
            color_target_states: Cow::Owned(vec![ColorTargetStateDescriptor::replace(format)]),
            multisample_state: MultisampleStateDescriptor {
                count: samples,
                ..Default::default()
            },
        })?;
        state.pipelines.insert((samples, format), pipeline);
        Ok(pipeline)
    }

    /// Writes `source` into `target`, a multisampled view of `format` with
    /// the same size and sample count.
    pub fn execute(
        &self,
        device: &dyn GraphicsDevice,
        encoder: &mut dyn CommandEncoder,
        transient: &TransientBindGroups,
        source: &FlatFramebuffer,
        target: TextureViewId,
        format: TextureFormat,
    ) -> Result<(), ResourceError> {
        let input = transient.create(
            device,
            &BindGroupDescriptor {
                label: Some("Flat Framebuffer Input"),
                layout: self.input_layout,
                entries: &[BindGroupEntry::buffer(0, source.buffer)],
            },
        )?;
        let (pipeline, dims) = {
            let mut state = lock(&self.state);
            let pipeline = self.pipeline(device, &mut state, source.samples, format)?;
            let dims = state.dims.push_pod(
                device,
                &FlatLayout {
                    size: [source.width, source.height, source.samples.count(), 0],
                },
            )?;
            (pipeline, dims)
        };

        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("Flat Framebuffer To Texture"),
            color_attachments: &[RenderPassColorAttachment {
                view: &target,
                resolve_target: None,
                ops: Operations::clear(LinearRgba::TRANSPARENT),
            }],
            depth_stencil_attachment: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, input, &[]);
        pass.set_bind_group(1, dims.bind_group, &[dims.offset]);
        pass.draw(0..3, 0..1);
        Ok(())
    }

    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        let mut state = lock(&self.state);
        for (_, pipeline) in state.pipelines.drain() {
            if let Err(e) = device.destroy_render_pipeline(pipeline) {
                log::warn!("Failed to destroy flat framebuffer pipeline: {:?}", e);
            }
        }
        state.dims.destroy(device);
        if let Err(e) = device.destroy_pipeline_layout(self.layout) {
            log::warn!("Failed to destroy flat framebuffer layout: {:?}", e);
        }
        if let Err(e) = device.destroy_shader_module(self.module) {
            log::warn!("Failed to destroy flat framebuffer shader: {:?}", e);
        }
        for layout in [self.input_layout, self.dims_layout] {
            if let Err(e) = device.destroy_bind_group_layout(layout) {
                log::warn!("Failed to destroy flat framebuffer layout: {:?}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_buffer_holds_every_sample() {
        assert_eq!(FlatFramebuffer::byte_size(4, 2, SampleCount::X4), 4 * 2 * 4 * 16);
        assert_eq!(FlatFramebuffer::byte_size(1920, 1080, SampleCount::X1), 1920 * 1080 * 16);
    }
}
