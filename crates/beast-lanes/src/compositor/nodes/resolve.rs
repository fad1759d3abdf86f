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

//! Tone mapping of the scene color into the view's output target.

use super::{node_identity, output, CLUSTERED_FORWARD, FINAL_RESOLVE, SCENE_COLOR};
use crate::compositor::outputs::SceneColorOutput;
use crate::compositor::{CompositorNode, CompositorNodeType};
use crate::frame;
use crate::lighting::LightingResources;
use crate::shaders;
use crate::util::{lock, ShaderDefines, UniformRing};
use ahash::AHashMap;
use beast_core::lane::{Lane, LaneContext, LaneError, LaneKind};
use beast_core::renderer::api::{
    BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindGroupLayoutId,
    ColorTargetStateDescriptor, MultisampleStateDescriptor, Operations, PipelineLayoutDescriptor, PipelineLayoutId,
    PrimitiveStateDescriptor, RenderPassColorAttachment, RenderPassDescriptor, RenderPipelineDescriptor,
    RenderPipelineId, ShaderModuleDescriptor, ShaderModuleId, ShaderSourceData, ShaderStageFlags, TextureFormat,
    TextureSampleType, TextureViewDimension,
};
use beast_core::renderer::error::ResourceError;
use beast_core::renderer::{GraphicsDevice, RendererOptions, RendererView};
use bytemuck::{Pod, Zeroable};
use std::borrow::Cow;
use std::sync::Mutex;

/// Exposure applied before tone mapping.
pub const DEFAULT_EXPOSURE: f32 = 1.0;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ResolveParams {
    /// Viewport x, viewport y, exposure, unused.
    pub viewport: [f32; 4],
}

impl ResolveParams {
    pub fn new(view: &RendererView, exposure: f32) -> Self {
        Self {
            viewport: [view.viewport.x as f32, view.viewport.y as f32, exposure, 0.0],
        }
    }
}

#[derive(Debug)]
struct ResolveState {
    input_layouts: [BindGroupLayoutId; 2],
    params_layout: BindGroupLayoutId,
    pipeline_layouts: [PipelineLayoutId; 2],
    modules: [ShaderModuleId; 2],
    params: UniformRing,
    pipelines: AHashMap<(bool, TextureFormat), RenderPipelineId>,
}

impl ResolveState {
    fn new(device: &dyn GraphicsDevice) -> Result<Self, ResourceError> {
        let fs = ShaderStageFlags::FRAGMENT;
        let unfilterable = TextureSampleType::Float { filterable: false };
        let params_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Final Resolve Params"),
            entries: &[BindGroupLayoutEntry::uniform(0, fs, true)],
        })?;

        let mut input_layouts = [params_layout; 2];
        let mut pipeline_layouts = Vec::with_capacity(2);
        let mut modules = Vec::with_capacity(2);
        for msaa in [false, true] {
            let layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some(if msaa { "Final Resolve Input (MSAA)" } else { "Final Resolve Input" }),
                entries: &[BindGroupLayoutEntry::texture(0, fs, unfilterable, TextureViewDimension::D2, msaa)],
            })?;
            input_layouts[usize::from(msaa)] = layout;
            pipeline_layouts.push(device.create_pipeline_layout(&PipelineLayoutDescriptor {
                label: Some(Cow::Borrowed("Final Resolve Layout")),
                bind_group_layouts: &[layout, params_layout],
            })?);

            let mut defines = ShaderDefines::new();
            if msaa {
                defines.set("MSAA");
            }
            modules.push(device.create_shader_module(&ShaderModuleDescriptor {
                label: Some("Final Resolve"),
                source: ShaderSourceData::Wgsl(Cow::Owned(defines.apply(shaders::FINAL_RESOLVE_WGSL)?)),
            })?);
        }

        let params = UniformRing::new(
            device,
            params_layout,
            0,
            std::mem::size_of::<ResolveParams>() as u32,
            4,
            "Final Resolve Params",
        )?;
        Ok(Self {
            input_layouts,
            params_layout,
            pipeline_layouts: [pipeline_layouts[0], pipeline_layouts[1]],
            modules: [modules[0], modules[1]],
            params,
            pipelines: AHashMap::new(),
        })
    }

    fn pipeline(
        &mut self,
        device: &dyn GraphicsDevice,
        msaa: bool,
        format: TextureFormat,
    ) -> Result<RenderPipelineId, ResourceError> {
        if let Some(pipeline) = self.pipelines.get(&(msaa, format)) {
            return Ok(*pipeline);
        }
        let slot = usize::from(msaa);
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(Cow::Owned(format!("Final Resolve {format:?}"))),
            vertex_shader_module: self.modules[slot],
            vertex_entry_point: Cow::Borrowed("vs_main"),
            fragment_shader_module: Some(self.modules[slot]),
            fragment_entry_point: Some(Cow::Borrowed("fs_main")),
            vertex_buffers_layout: Cow::Borrowed(&[]),
            layout: Some(self.pipeline_layouts[slot]),
            primitive_state: PrimitiveStateDescriptor::default(),
            depth_stencil_state: None,
            color_target_states: Cow::Owned(vec![ColorTargetStateDescriptor::replace(format)]),
            multisample_state: MultisampleStateDescriptor::default(),
        })?;
        self.pipelines.insert((msaa, format), pipeline);
        Ok(pipeline)
    }

    fn destroy(&mut self, device: &dyn GraphicsDevice) {
        for (_, pipeline) in self.pipelines.drain() {
            if let Err(e) = device.destroy_render_pipeline(pipeline) {
                log::warn!("FinalResolveNode: Failed to destroy pipeline: {:?}", e);
            }
        }
        self.params.destroy(device);
        for layout in self.pipeline_layouts {
            if let Err(e) = device.destroy_pipeline_layout(layout) {
                log::warn!("FinalResolveNode: Failed to destroy pipeline layout: {:?}", e);
            }
        }
        for module in self.modules {
            if let Err(e) = device.destroy_shader_module(module) {
                log::warn!("FinalResolveNode: Failed to destroy shader module: {:?}", e);
            }
        }
        for layout in self.input_layouts.into_iter().chain([self.params_layout]) {
            if let Err(e) = device.destroy_bind_group_layout(layout) {
                log::warn!("FinalResolveNode: Failed to destroy layout: {:?}", e);
            }
        }
    }
}

/// Averages the samples of the scene color, tone maps it and writes the
/// view's viewport of its target.
#[derive(Debug, Default)]
pub struct FinalResolveNode {
    state: Mutex<Option<ResolveState>>,
}

impl Lane for FinalResolveNode {
    node_identity!(FINAL_RESOLVE, LaneKind::Resolve);

    fn on_initialize(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let device = frame::device(ctx)?;
        let state = ResolveState::new(device.as_ref()).map_err(LaneError::initialization)?;
        if let Some(mut old) = lock(&self.state).replace(state) {
            old.destroy(device.as_ref());
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let device = frame::device(ctx)?;
        let view = frame::get_ref::<RendererView>(ctx, "Ref<RendererView>")?;
        let resources = frame::get_ref::<LightingResources>(ctx, "Ref<LightingResources>")?;
        let SceneColorOutput(color) = output::<SceneColorOutput>(ctx, "SceneColorOutput")?;
        let encoder = frame::encoder(ctx)?;

        let msaa = view.sample_count.is_multisampled();
        let mut guard = lock(&self.state);
        let state = guard.as_mut().ok_or(LaneError::NotInitialized)?;
        // One resolve per view and frame.
        state.params.advance();
        let pipeline = state
            .pipeline(device.as_ref(), msaa, view.target_format)
            .map_err(LaneError::execution)?;
        let params = state
            .params
            .push_pod(device.as_ref(), &ResolveParams::new(view, DEFAULT_EXPOSURE))
            .map_err(LaneError::execution)?;
        let input = resources
            .transient
            .create(
                device.as_ref(),
                &BindGroupDescriptor {
                    label: Some("Final Resolve Input"),
                    layout: state.input_layouts[usize::from(msaa)],
                    entries: &[BindGroupEntry::texture(0, color.texture.view())],
                },
            )
            .map_err(LaneError::execution)?;
        drop(guard);

        let rect = view.viewport;
        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("Final Resolve"),
            color_attachments: &[RenderPassColorAttachment {
                view: &view.target,
                resolve_target: None,
                ops: Operations::load(),
            }],
            depth_stencil_attachment: None,
        });
        pass.set_viewport(
            rect.x as f32,
            rect.y as f32,
            rect.width as f32,
            rect.height as f32,
            0.0,
            1.0,
        );
        pass.set_scissor_rect(rect.x.max(0) as u32, rect.y.max(0) as u32, rect.width, rect.height);
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, input, &[]);
        pass.set_bind_group(1, params.bind_group, &[params.offset]);
        pass.draw(0..3, 0..1);
        Ok(())
    }

    fn on_shutdown(&self, ctx: &mut LaneContext) {
        let Ok(device) = frame::device(ctx) else {
            return;
        };
        if let Some(mut state) = lock(&self.state).take() {
            state.destroy(device.as_ref());
        }
    }
}

impl CompositorNode for FinalResolveNode {}

impl CompositorNodeType for FinalResolveNode {
    const ID: &'static str = FINAL_RESOLVE;

    fn dependencies(_view: &RendererView, _options: &RendererOptions) -> Vec<&'static str> {
        vec![CLUSTERED_FORWARD, SCENE_COLOR]
    }

    fn create() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_match_shader_layout() {
        assert_eq!(std::mem::size_of::<ResolveParams>(), 16);
    }
}
