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

//! Recording graphics device shared by the integration tests.

#![allow(dead_code)]

use ahash::AHashSet;
use beast_core::math::{Extent3D, LinearRgba, Mat4, Origin3D, Rect2I, Sphere, Vec3};
use beast_core::renderer::api::*;
use beast_core::renderer::error::ResourceError;
use beast_core::renderer::light::RendererLight;
use beast_core::renderer::{
    CommandEncoder, ComputePass, GraphicsDevice, MeshDraw, RenderElement, RenderPass, RendererView, SceneFrame,
    ViewFlags, ViewId,
};
use std::any::Any;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    ShaderModule,
    BindGroupLayout,
    BindGroup,
    PipelineLayout,
    RenderPipeline,
    ComputePipeline,
    Buffer,
    Texture,
    TextureView,
    Sampler,
}

/// Everything the mock saw.
#[derive(Debug, Default)]
pub struct Recording {
    pub live: AHashSet<(Kind, usize)>,
    pub created: Vec<Kind>,
    pub destroyed: Vec<Kind>,
    pub textures: Vec<(TextureId, TextureFormat, u32, u32, SampleCount)>,
    pub buffer_writes: Vec<(BufferId, u64, usize)>,
    pub shader_sources: Vec<String>,
    pub render_passes: Vec<String>,
    pub compute_passes: Vec<String>,
    pub dispatches: Vec<[u32; 3]>,
    pub draws: usize,
    pub submitted: usize,
    /// Fail creation of six-layer (cube) textures.
    pub fail_cube_textures: bool,
    /// Texture views that may still be created before creation fails.
    pub texture_view_budget: Option<usize>,
}

impl Recording {
    pub fn live_count(&self, kind: Kind) -> usize {
        self.live.iter().filter(|(k, _)| *k == kind).count()
    }

    pub fn created_count(&self, kind: Kind) -> usize {
        self.created.iter().filter(|k| **k == kind).count()
    }

    pub fn destroyed_count(&self, kind: Kind) -> usize {
        self.destroyed.iter().filter(|k| **k == kind).count()
    }

    pub fn has_render_pass(&self, label: &str) -> bool {
        self.render_passes.iter().any(|l| l == label)
    }

    pub fn has_compute_pass(&self, label: &str) -> bool {
        self.compute_passes.iter().any(|l| l == label)
    }

    /// Forgets passes, draws and writes, keeping resource bookkeeping.
    pub fn clear_commands(&mut self) {
        self.buffer_writes.clear();
        self.render_passes.clear();
        self.compute_passes.clear();
        self.dispatches.clear();
        self.draws = 0;
    }
}

#[derive(Debug)]
pub struct MockGraphicsDevice {
    next_id: AtomicUsize,
    compute: bool,
    pub recording: Arc<Mutex<Recording>>,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self::with_compute(true)
    }

    pub fn with_compute(compute: bool) -> Self {
        Self {
            next_id: AtomicUsize::new(1),
            compute,
            recording: Arc::new(Mutex::new(Recording::default())),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn recording(&self) -> MutexGuard<'_, Recording> {
        self.recording.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn create(&self, kind: Kind) -> usize {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut rec = self.recording();
        rec.live.insert((kind, id));
        rec.created.push(kind);
        id
    }

    fn destroy(&self, kind: Kind, id: usize) -> Result<(), ResourceError> {
        let mut rec = self.recording();
        if !rec.live.remove(&(kind, id)) {
            return Err(ResourceError::InvalidHandle);
        }
        rec.destroyed.push(kind);
        Ok(())
    }
}

impl Default for MockGraphicsDevice {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MockRenderPass {
    recording: Arc<Mutex<Recording>>,
}

impl RenderPass<'_> for MockRenderPass {
    fn set_pipeline(&mut self, _pipeline: RenderPipelineId) {}
    fn set_bind_group(&mut self, _index: u32, _bind_group: BindGroupId, _offsets: &[u32]) {}
    fn set_vertex_buffer(&mut self, _slot: u32, _buffer: BufferId, _offset: u64) {}
    fn set_index_buffer(&mut self, _buffer: BufferId, _offset: u64, _index_format: IndexFormat) {}
    fn set_viewport(&mut self, _x: f32, _y: f32, _w: f32, _h: f32, _min_depth: f32, _max_depth: f32) {}
    fn set_scissor_rect(&mut self, _x: u32, _y: u32, _w: u32, _h: u32) {}
    fn set_stencil_reference(&mut self, _reference: u32) {}

    fn draw(&mut self, _vertices: Range<u32>, _instances: Range<u32>) {
        self.recording.lock().unwrap_or_else(PoisonError::into_inner).draws += 1;
    }

    fn draw_indexed(&mut self, _indices: Range<u32>, _base_vertex: i32, _instances: Range<u32>) {
        self.recording.lock().unwrap_or_else(PoisonError::into_inner).draws += 1;
    }
}

pub struct MockComputePass {
    recording: Arc<Mutex<Recording>>,
}

impl ComputePass<'_> for MockComputePass {
    fn set_pipeline(&mut self, _pipeline: ComputePipelineId) {}
    fn set_bind_group(&mut self, _index: u32, _bind_group: BindGroupId, _offsets: &[u32]) {}

    fn dispatch_workgroups(&mut self, x: u32, y: u32, z: u32) {
        self.recording
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .dispatches
            .push([x, y, z]);
    }
}

pub struct MockCommandEncoder {
    recording: Arc<Mutex<Recording>>,
}

impl CommandEncoder for MockCommandEncoder {
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'_>,
    ) -> Box<dyn RenderPass<'encoder> + 'encoder> {
        self.recording
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .render_passes
            .push(descriptor.label.unwrap_or_default().to_string());
        Box::new(MockRenderPass {
            recording: self.recording.clone(),
        })
    }

    fn begin_compute_pass<'encoder>(
        &'encoder mut self,
        descriptor: &ComputePassDescriptor<'_>,
    ) -> Box<dyn ComputePass<'encoder> + 'encoder> {
        self.recording
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .compute_passes
            .push(descriptor.label.unwrap_or_default().to_string());
        Box::new(MockComputePass {
            recording: self.recording.clone(),
        })
    }

    fn copy_buffer_to_buffer(
        &mut self,
        _source: BufferId,
        _source_offset: u64,
        _destination: BufferId,
        _destination_offset: u64,
        _size: u64,
    ) {
    }

    fn finish(self: Box<Self>) -> CommandBufferId {
        CommandBufferId(0)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_shader_module(&self, descriptor: &ShaderModuleDescriptor) -> Result<ShaderModuleId, ResourceError> {
        let ShaderSourceData::Wgsl(source) = &descriptor.source;
        self.recording().shader_sources.push(source.to_string());
        Ok(ShaderModuleId(self.create(Kind::ShaderModule)))
    }

    fn destroy_shader_module(&self, id: ShaderModuleId) -> Result<(), ResourceError> {
        self.destroy(Kind::ShaderModule, id.0)
    }

    fn create_bind_group_layout(
        &self,
        _descriptor: &BindGroupLayoutDescriptor,
    ) -> Result<BindGroupLayoutId, ResourceError> {
        Ok(BindGroupLayoutId(self.create(Kind::BindGroupLayout)))
    }

    fn destroy_bind_group_layout(&self, id: BindGroupLayoutId) -> Result<(), ResourceError> {
        self.destroy(Kind::BindGroupLayout, id.0)
    }

    fn create_bind_group(&self, _descriptor: &BindGroupDescriptor) -> Result<BindGroupId, ResourceError> {
        Ok(BindGroupId(self.create(Kind::BindGroup)))
    }

    fn destroy_bind_group(&self, id: BindGroupId) -> Result<(), ResourceError> {
        self.destroy(Kind::BindGroup, id.0)
    }

    fn create_pipeline_layout(&self, _descriptor: &PipelineLayoutDescriptor) -> Result<PipelineLayoutId, ResourceError> {
        Ok(PipelineLayoutId(self.create(Kind::PipelineLayout)))
    }

    fn destroy_pipeline_layout(&self, id: PipelineLayoutId) -> Result<(), ResourceError> {
        self.destroy(Kind::PipelineLayout, id.0)
    }

    fn create_render_pipeline(&self, _descriptor: &RenderPipelineDescriptor) -> Result<RenderPipelineId, ResourceError> {
        Ok(RenderPipelineId(self.create(Kind::RenderPipeline)))
    }

    fn destroy_render_pipeline(&self, id: RenderPipelineId) -> Result<(), ResourceError> {
        self.destroy(Kind::RenderPipeline, id.0)
    }

    fn create_compute_pipeline(
        &self,
        _descriptor: &ComputePipelineDescriptor,
    ) -> Result<ComputePipelineId, ResourceError> {
        Ok(ComputePipelineId(self.create(Kind::ComputePipeline) as u64))
    }

    fn destroy_compute_pipeline(&self, id: ComputePipelineId) -> Result<(), ResourceError> {
        self.destroy(Kind::ComputePipeline, id.0 as usize)
    }

    fn create_buffer(&self, _descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        Ok(BufferId(self.create(Kind::Buffer)))
    }

    fn create_buffer_with_data(&self, descriptor: &BufferDescriptor, data: &[u8]) -> Result<BufferId, ResourceError> {
        let id = self.create_buffer(descriptor)?;
        self.write_buffer(id, 0, data)?;
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        self.destroy(Kind::Buffer, id.0)
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut rec = self.recording();
        if !rec.live.contains(&(Kind::Buffer, id.0)) {
            return Err(ResourceError::InvalidHandle);
        }
        rec.buffer_writes.push((id, offset, data.len()));
        Ok(())
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        if self.recording().fail_cube_textures && descriptor.size.depth_or_array_layers == 6 {
            return Err(ResourceError::OutOfMemory);
        }
        let id = TextureId(self.create(Kind::Texture));
        self.recording().textures.push((
            id,
            descriptor.format,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.sample_count,
        ));
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        self.destroy(Kind::Texture, id.0)
    }

    fn write_texture(
        &self,
        texture_id: TextureId,
        _data: &[u8],
        _bytes_per_row: Option<u32>,
        _offset: Origin3D,
        _size: Extent3D,
    ) -> Result<(), ResourceError> {
        if self.recording().live.contains(&(Kind::Texture, texture_id.0)) {
            Ok(())
        } else {
            Err(ResourceError::InvalidHandle)
        }
    }

    fn create_texture_view(
        &self,
        _texture_id: TextureId,
        _descriptor: &TextureViewDescriptor,
    ) -> Result<TextureViewId, ResourceError> {
        if let Some(budget) = self.recording().texture_view_budget.as_mut() {
            if *budget == 0 {
                return Err(ResourceError::OutOfMemory);
            }
            *budget -= 1;
        }
        Ok(TextureViewId(self.create(Kind::TextureView)))
    }

    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), ResourceError> {
        self.destroy(Kind::TextureView, id.0)
    }

    fn create_sampler(&self, _descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError> {
        Ok(SamplerId(self.create(Kind::Sampler)))
    }

    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError> {
        self.destroy(Kind::Sampler, id.0)
    }

    fn create_command_encoder(&self, _label: Option<&str>) -> Box<dyn CommandEncoder> {
        Box::new(MockCommandEncoder {
            recording: self.recording.clone(),
        })
    }

    fn submit_command_buffer(&self, _command_buffer: CommandBufferId) {
        self.recording().submitted += 1;
    }

    fn supports_feature(&self, feature_name: &str) -> bool {
        self.compute && feature_name == beast_core::renderer::traits::FEATURE_COMPUTE_SHADERS
    }
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A 960x640 perspective view looking at the origin from +Z.
pub fn test_view(id: u64, sample_count: SampleCount, flags: ViewFlags) -> RendererView {
    RendererView {
        id: ViewId(id),
        view: Mat4::look_at_rh(Vec3::new(0.0, 3.0, 12.0), Vec3::ZERO, Vec3::Y),
        projection: Mat4::perspective_rh(60f32.to_radians(), 1.5, 0.1, 200.0),
        near: 0.1,
        far: 200.0,
        viewport: Rect2I::new(0, 0, 960, 640),
        sample_count,
        target: TextureViewId(1_000_000 + id as usize),
        target_format: TextureFormat::Bgra8UnormSrgb,
        flags,
    }
}

pub fn mesh_at(center: Vec3, radius: f32) -> MeshDraw {
    MeshDraw {
        vertex_buffer: BufferId(900_001),
        vertex_stride: 32,
        index_buffer: Some((BufferId(900_002), IndexFormat::Uint32)),
        element_count: 36,
        model_bind_group: BindGroupId(900_003),
        model_offset: 0,
        bounds: Sphere::new(center, radius),
    }
}

pub fn element_at(center: Vec3, material_key: u64) -> RenderElement {
    RenderElement {
        mesh: mesh_at(center, 1.0),
        pipeline: RenderPipelineId(900_010 + material_key as usize),
        material_bind_group: BindGroupId(900_020 + material_key as usize),
        material_key,
    }
}

/// A floor with two boxes, lit by one shadowed light of each type.
pub fn lit_scene() -> SceneFrame {
    let boxes = [Vec3::new(-2.0, 1.0, 0.0), Vec3::new(2.0, 1.0, 0.0)];
    SceneFrame {
        lights: vec![
            RendererLight::directional(Vec3::new(-0.3, -1.0, -0.2), LinearRgba::WHITE, 3.0).with_shadows(0.5),
            RendererLight::radial(Vec3::new(0.0, 2.0, 2.0), 8.0, LinearRgba::WHITE, 50.0).with_shadows(0.5),
            RendererLight::spot(
                Vec3::new(0.0, 6.0, 0.0),
                Vec3::NEG_Y,
                12.0,
                60f32.to_radians(),
                45f32.to_radians(),
                LinearRgba::WHITE,
                200.0,
            )
            .with_shadows(0.5),
            RendererLight::radial(Vec3::new(-3.0, 1.0, 1.0), 4.0, LinearRgba::WHITE, 10.0),
        ],
        probes: Vec::new(),
        shadow_casters: boxes.iter().map(|c| mesh_at(*c, 1.0)).collect(),
        opaque: boxes.iter().enumerate().map(|(i, c)| element_at(*c, i as u64)).collect(),
        transparent: vec![element_at(Vec3::new(0.0, 1.0, 3.0), 7)],
        reflection_cubemaps: None,
        sky_cubemap: None,
    }
}
