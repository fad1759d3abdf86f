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
//! Command recording traits.

use crate::renderer::api::{
    BindGroupId, BufferId, CommandBufferId, ComputePassDescriptor, ComputePipelineId,
    IndexFormat, RenderPassDescriptor, RenderPipelineId,
};
use std::any::Any;
use std::ops::Range;

/// Commands recorded inside a render pass.
pub trait RenderPass<'pass> {
    /// Binds a render pipeline.
    fn set_pipeline(&mut self, pipeline: RenderPipelineId);

    /// Binds a bind group to `@group(index)`.
    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupId, dynamic_offsets: &[u32]);

    /// Binds a vertex buffer to a slot.
    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId, offset: u64);

    /// Binds the index buffer.
    fn set_index_buffer(&mut self, buffer: BufferId, offset: u64, index_format: IndexFormat);

    /// Restricts rasterization to a viewport.
    fn set_viewport(&mut self, x: f32, y: f32, width: f32, height: f32, min_depth: f32, max_depth: f32);

    /// Restricts writes to a rectangle.
    fn set_scissor_rect(&mut self, x: u32, y: u32, width: u32, height: u32);

    /// Sets the stencil reference value.
    fn set_stencil_reference(&mut self, reference: u32);

    /// Draws non-indexed primitives.
    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>);

    /// Draws indexed primitives.
    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>);
}

/// Commands recorded inside a compute pass.
pub trait ComputePass<'pass> {
    /// Binds a compute pipeline.
    fn set_pipeline(&mut self, pipeline: ComputePipelineId);

    /// Binds a bind group to `@group(index)`.
    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupId, dynamic_offsets: &[u32]);

    /// Launches a grid of workgroups.
    fn dispatch_workgroups(&mut self, x: u32, y: u32, z: u32);
}

/// Records passes and copies into a command buffer.
pub trait CommandEncoder {
    /// Begins a render pass. The pass ends when the returned object drops.
    ///
    /// The descriptor is only read during the call.
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'_>,
    ) -> Box<dyn RenderPass<'encoder> + 'encoder>;

    /// Begins a compute pass. The pass ends when the returned object drops.
    fn begin_compute_pass<'encoder>(
        &'encoder mut self,
        descriptor: &ComputePassDescriptor<'_>,
    ) -> Box<dyn ComputePass<'encoder> + 'encoder>;

    /// Copies bytes between buffers.
    fn copy_buffer_to_buffer(
        &mut self,
        source: BufferId,
        source_offset: u64,
        destination: BufferId,
        destination_offset: u64,
        size: u64,
    );

    /// Finishes recording.
    fn finish(self: Box<Self>) -> CommandBufferId;

    /// Downcast hook for backend-specific access.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
