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
//! Render pipeline descriptor.

use super::layout::PipelineLayoutId;
use super::state::*;
use crate::renderer::api::shader::ShaderModuleId;
use std::borrow::Cow;

/// Everything the device needs to build a render pipeline.
#[derive(Debug, Clone)]
pub struct RenderPipelineDescriptor<'a> {
    /// Debug label.
    pub label: Option<Cow<'a, str>>,
    /// Module holding the vertex entry point.
    pub vertex_shader_module: ShaderModuleId,
    /// Vertex entry point.
    pub vertex_entry_point: Cow<'a, str>,
    /// Module holding the fragment entry point, `None` for depth-only pipelines.
    pub fragment_shader_module: Option<ShaderModuleId>,
    /// Fragment entry point.
    pub fragment_entry_point: Option<Cow<'a, str>>,
    /// Vertex buffer slots.
    pub vertex_buffers_layout: Cow<'a, [VertexBufferLayoutDescriptor<'a>]>,
    /// Pipeline layout.
    pub layout: Option<PipelineLayoutId>,
    /// Primitive state.
    pub primitive_state: PrimitiveStateDescriptor,
    /// Depth/stencil state.
    pub depth_stencil_state: Option<DepthStencilStateDescriptor>,
    /// Color outputs.
    pub color_target_states: Cow<'a, [ColorTargetStateDescriptor]>,
    /// Multisampling.
    pub multisample_state: MultisampleStateDescriptor,
}

/// Opaque handle to a render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderPipelineId(pub usize);
