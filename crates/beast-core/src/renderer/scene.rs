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
//! Per-frame scene input consumed by the renderer.

use crate::math::Sphere;
use crate::renderer::api::{BindGroupId, BufferId, IndexFormat, RenderPipelineId, TextureViewId};
use crate::renderer::light::{ReflectionProbe, RendererLight};

/// Geometry plus the model transform binding needed to draw it.
///
/// The model bind group must follow the renderer's model layout: one
/// uniform at binding 0 holding the world matrix, bound with a dynamic
/// offset.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshDraw {
    /// Vertex buffer; position is a `vec3<f32>` at offset 0.
    pub vertex_buffer: BufferId,
    /// Byte stride between vertices.
    pub vertex_stride: u64,
    /// Index buffer and format, if indexed.
    pub index_buffer: Option<(BufferId, IndexFormat)>,
    /// Number of indices, or vertices when not indexed.
    pub element_count: u32,
    /// Model transform bind group.
    pub model_bind_group: BindGroupId,
    /// Dynamic offset into the model bind group.
    pub model_offset: u32,
    /// World-space bounds.
    pub bounds: Sphere,
}

/// An object rendered with its own material pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderElement {
    /// Geometry.
    pub mesh: MeshDraw,
    /// Material pipeline, compatible with the pass it is drawn in.
    pub pipeline: RenderPipelineId,
    /// Material bind group at `@group(2)`.
    pub material_bind_group: BindGroupId,
    /// Key grouping elements that share GPU state.
    pub material_key: u64,
}

/// Everything the renderer consumes for one frame.
#[derive(Debug, Clone, Default)]
pub struct SceneFrame {
    /// Active lights.
    pub lights: Vec<RendererLight>,
    /// Active reflection probes.
    pub probes: Vec<ReflectionProbe>,
    /// Geometry rendered into shadow maps.
    pub shadow_casters: Vec<MeshDraw>,
    /// Opaque elements rendered into the G-buffer.
    pub opaque: Vec<RenderElement>,
    /// Transparent elements rendered with clustered forward shading.
    pub transparent: Vec<RenderElement>,
    /// Cubemap array holding the captured probes.
    pub reflection_cubemaps: Option<TextureViewId>,
    /// Sky cubemap used where no probe applies.
    pub sky_cubemap: Option<TextureViewId>,
}
