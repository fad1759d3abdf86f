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
//! Compute pipelines, used by the light grid and the tiled lighting passes.

use std::borrow::Cow;

use crate::renderer::api::{pipeline::PipelineLayoutId, shader::ShaderModuleId};

/// Opaque handle to a compute pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComputePipelineId(pub u64);

/// Describes a compute pipeline.
#[derive(Debug, Clone)]
pub struct ComputePipelineDescriptor<'a> {
    /// Debug label.
    pub label: Option<Cow<'a, str>>,
    /// Pipeline layout.
    pub layout: Option<PipelineLayoutId>,
    /// Module with the entry point.
    pub shader_module: ShaderModuleId,
    /// Entry point name.
    pub entry_point: Cow<'a, str>,
}
