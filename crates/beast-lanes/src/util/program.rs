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

//! Shader module + pipeline layout + pipeline bundles.

use beast_core::renderer::api::{
    BindGroupLayoutId, ComputePipelineDescriptor, ComputePipelineId, PipelineLayoutDescriptor,
    PipelineLayoutId, ShaderModuleDescriptor, ShaderModuleId, ShaderSourceData,
};
use beast_core::renderer::error::ResourceError;
use beast_core::renderer::GraphicsDevice;
use std::borrow::Cow;

/// A compute pipeline together with the objects it was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeProgram {
    pub module: ShaderModuleId,
    pub layout: PipelineLayoutId,
    pub pipeline: ComputePipelineId,
}

impl ComputeProgram {
    pub fn new(
        device: &dyn GraphicsDevice,
        label: &str,
        source: Cow<'_, str>,
        entry_point: &str,
        bind_group_layouts: &[BindGroupLayoutId],
    ) -> Result<Self, ResourceError> {
        let module = device.create_shader_module(&ShaderModuleDescriptor {
            label: Some(label),
            source: ShaderSourceData::Wgsl(source),
        })?;
        let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some(Cow::Owned(format!("{label} Layout"))),
            bind_group_layouts,
        })?;
        let pipeline = device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some(Cow::Borrowed(label)),
            layout: Some(layout),
            shader_module: module,
            entry_point: Cow::Borrowed(entry_point),
        })?;
        Ok(Self {
            module,
            layout,
            pipeline,
        })
    }

    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        if let Err(e) = device.destroy_compute_pipeline(self.pipeline) {
            log::warn!("Failed to destroy compute pipeline: {:?}", e);
        }
        if let Err(e) = device.destroy_pipeline_layout(self.layout) {
            log::warn!("Failed to destroy pipeline layout: {:?}", e);
        }
        if let Err(e) = device.destroy_shader_module(self.module) {
            log::warn!("Failed to destroy shader module: {:?}", e);
        }
    }
}
