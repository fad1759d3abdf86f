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

//! Tiled deferred direct lighting and image based lighting.
//!
//! Both passes are compute dispatches over the view. Without MSAA they write
//! a storage texture; with MSAA they write every sample into a flat buffer
//! indexed `(y * width + x) * samples + sample`, which
//! [`FlatFramebufferToTexture`](super::FlatFramebufferToTexture) turns back
//! into a multisampled texture.

use super::gbuffer::HDR_FORMAT;
use crate::shaders;
use crate::util::{lock, ComputeProgram, ShaderDefines, TransientBindGroups, UniformRing};
use beast_core::math::div_ceil;
use beast_core::renderer::api::{
    BindGroupDescriptor, BindGroupEntry, BindGroupId, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindGroupLayoutId, BufferId, ComputePassDescriptor, SamplerBindingType,
    SamplerId, ShaderStageFlags, TextureSampleType, TextureViewDimension, TextureViewId,
};
use beast_core::renderer::error::ResourceError;
use beast_core::renderer::{CommandEncoder, GraphicsDevice};
use bytemuck::{Pod, Zeroable};
use std::borrow::Cow;
use std::sync::Mutex;

/// Pixels along each side of a direct lighting tile.
pub const LIGHTING_TILE_SIZE: u32 = 16;
/// Pixels along each side of an IBL tile; each thread shades 2x2 pixels.
pub const IBL_TILE_SIZE: u32 = 32;

const IBL_PARAMS_PER_CHUNK: u32 = 16;

/// Sampled views of the G-buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GBufferViews {
    pub albedo: TextureViewId,
    pub normal: TextureViewId,
    pub material: TextureViewId,
    pub depth: TextureViewId,
}

impl GBufferViews {
    fn entries(&self) -> [BindGroupEntry; 4] {
        [
            BindGroupEntry::texture(0, self.albedo),
            BindGroupEntry::texture(1, self.normal),
            BindGroupEntry::texture(2, self.material),
            BindGroupEntry::texture(3, self.depth),
        ]
    }
}

/// Where a tiled pass writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiledOutput {
    /// Storage texture view, single sampled targets only.
    Texture(TextureViewId),
    /// Flat per-sample buffer of `vec4<f32>`.
    Flat(BufferId),
}

impl TiledOutput {
    fn entry(self, binding: u32) -> BindGroupEntry {
        match self {
            TiledOutput::Texture(view) => BindGroupEntry::texture(binding, view),
            TiledOutput::Flat(buffer) => BindGroupEntry::buffer(binding, buffer),
        }
    }
}

/// Extent and grid of the view a tiled pass shades.
#[derive(Debug, Clone, Copy)]
pub struct TiledView {
    pub width: u32,
    pub height: u32,
    /// The view's light grid shading group.
    pub grid_group: BindGroupId,
}

fn msaa_slot(msaa: bool) -> usize {
    usize::from(msaa)
}

fn msaa_defines(msaa: bool) -> ShaderDefines {
    let mut defines = ShaderDefines::new();
    if msaa {
        defines.set("MSAA");
    }
    defines
}

/// G-buffer inputs, `extra_inputs` more sampled textures, then the output.
fn input_layout(
    device: &dyn GraphicsDevice,
    label: &str,
    msaa: bool,
    extra_inputs: u32,
) -> Result<BindGroupLayoutId, ResourceError> {
    let cs = ShaderStageFlags::COMPUTE;
    let unfilterable = TextureSampleType::Float { filterable: false };
    let inputs = 4 + extra_inputs;
    let mut entries: Vec<BindGroupLayoutEntry> = (0..inputs)
        .map(|binding| BindGroupLayoutEntry::texture(binding, cs, unfilterable, TextureViewDimension::D2, msaa))
        .collect();
    entries.push(if msaa {
        BindGroupLayoutEntry::storage(inputs, cs, false)
    } else {
        BindGroupLayoutEntry::storage_texture(inputs, cs, HDR_FORMAT)
    });
    device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &entries,
    })
}

fn destroy_layout(device: &dyn GraphicsDevice, layout: BindGroupLayoutId) {
    if let Err(e) = device.destroy_bind_group_layout(layout) {
        log::warn!("Failed to destroy tiled lighting layout: {:?}", e);
    }
}

/// Direct lighting of every unshadowed light, 16x16 pixels per workgroup.
#[derive(Debug)]
pub struct TiledDeferredLighting {
    layouts: [BindGroupLayoutId; 2],
    programs: [ComputeProgram; 2],
}

impl TiledDeferredLighting {
    /// `grid_layout` is the light grid shading layout, bound at group 0.
    pub fn new(device: &dyn GraphicsDevice, grid_layout: BindGroupLayoutId) -> Result<Self, ResourceError> {
        let layouts = [
            input_layout(device, "Tiled Lighting Inputs", false, 0)?,
            input_layout(device, "Tiled Lighting Inputs (MSAA)", true, 0)?,
        ];
        let build = |msaa: bool| -> Result<ComputeProgram, ResourceError> {
            let source = msaa_defines(msaa).apply(shaders::TILED_DEFERRED_LIGHTING_WGSL)?;
            let label = if msaa { "Tiled Deferred Lighting (MSAA)" } else { "Tiled Deferred Lighting" };
            ComputeProgram::new(
                device,
                label,
                Cow::Owned(source),
                "cs_main",
                &[grid_layout, layouts[msaa_slot(msaa)]],
            )
        };
        let programs = [build(false)?, build(true)?];
        Ok(Self { layouts, programs })
    }

    /// Records the dispatch.
    pub fn execute(
        &self,
        device: &dyn GraphicsDevice,
        encoder: &mut dyn CommandEncoder,
        transient: &TransientBindGroups,
        view: &TiledView,
        gbuffer: &GBufferViews,
        output: TiledOutput,
    ) -> Result<(), ResourceError> {
        let msaa = matches!(output, TiledOutput::Flat(_));
        let [albedo, normal, material, depth] = gbuffer.entries();
        let inputs = transient.create(
            device,
            &BindGroupDescriptor {
                label: Some("Tiled Lighting Inputs"),
                layout: self.layouts[msaa_slot(msaa)],
                entries: &[albedo, normal, material, depth, output.entry(4)],
            },
        )?;

        let program = &self.programs[msaa_slot(msaa)];
        let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor {
            label: Some("Tiled Deferred Lighting"),
        });
        pass.set_pipeline(program.pipeline);
        pass.set_bind_group(0, view.grid_group, &[]);
        pass.set_bind_group(1, inputs, &[]);
        pass.dispatch_workgroups(
            div_ceil(view.width, LIGHTING_TILE_SIZE),
            div_ceil(view.height, LIGHTING_TILE_SIZE),
            1,
        );
        Ok(())
    }

    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        for program in &self.programs {
            program.destroy(device);
        }
        for layout in self.layouts {
            destroy_layout(device, layout);
        }
    }
}

/// Per-view switches of the IBL pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct IblParams {
    /// Sky present, reflections skipped, probes present, unused.
    pub flags: [u32; 4],
}

impl IblParams {
    pub fn new(has_sky: bool, skip_reflections: bool, has_probes: bool) -> Self {
        Self {
            flags: [u32::from(has_sky), u32::from(skip_reflections), u32::from(has_probes), 0],
        }
    }
}

/// Environment inputs of the IBL pass.
#[derive(Debug, Clone, Copy)]
pub struct IblInputs {
    /// Cube array of captured probes.
    pub reflection_probes: TextureViewId,
    pub sky: TextureViewId,
    pub brdf_lut: TextureViewId,
    pub params: IblParams,
}

/// Image based lighting plus the final combine into scene color.
#[derive(Debug)]
pub struct TiledDeferredIBL {
    layouts: [BindGroupLayoutId; 2],
    env_layout: BindGroupLayoutId,
    params_layout: BindGroupLayoutId,
    programs: [ComputeProgram; 2],
    sampler: SamplerId,
    params: Mutex<UniformRing>,
}

impl TiledDeferredIBL {
    /// `sampler` filters the probe and sky cubemaps.
    pub fn new(
        device: &dyn GraphicsDevice,
        grid_layout: BindGroupLayoutId,
        sampler: SamplerId,
    ) -> Result<Self, ResourceError> {
        let cs = ShaderStageFlags::COMPUTE;
        let layouts = [
            input_layout(device, "Tiled IBL Inputs", false, 1)?,
            input_layout(device, "Tiled IBL Inputs (MSAA)", true, 1)?,
        ];
        let filterable = TextureSampleType::Float { filterable: true };
        let env_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Tiled IBL Environment"),
            entries: &[
                BindGroupLayoutEntry::texture(0, cs, filterable, TextureViewDimension::CubeArray, false),
                BindGroupLayoutEntry::texture(1, cs, filterable, TextureViewDimension::Cube, false),
                BindGroupLayoutEntry::texture(
                    2,
                    cs,
                    TextureSampleType::Float { filterable: false },
                    TextureViewDimension::D2,
                    false,
                ),
                BindGroupLayoutEntry::sampler(3, cs, SamplerBindingType::Filtering),
            ],
        })?;
        let params_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Tiled IBL Params"),
            entries: &[BindGroupLayoutEntry::uniform(0, cs, true)],
        })?;

        let build = |msaa: bool| -> Result<ComputeProgram, ResourceError> {
            let source = msaa_defines(msaa).apply(shaders::TILED_DEFERRED_IBL_WGSL)?;
            let label = if msaa { "Tiled Deferred IBL (MSAA)" } else { "Tiled Deferred IBL" };
            ComputeProgram::new(
                device,
                label,
                Cow::Owned(source),
                "cs_main",
                &[grid_layout, layouts[msaa_slot(msaa)], env_layout, params_layout],
            )
        };
        let programs = [build(false)?, build(true)?];
        let params = UniformRing::new(
            device,
            params_layout,
            0,
            std::mem::size_of::<IblParams>() as u32,
            IBL_PARAMS_PER_CHUNK,
            "Tiled IBL Params",
        )?;

        Ok(Self {
            layouts,
            env_layout,
            params_layout,
            programs,
            sampler,
            params: Mutex::new(params),
        })
    }

    pub fn begin_frame(&self) {
        lock(&self.params).advance();
    }

    /// Records the dispatch. `light_accumulation` is the direct lighting
    /// written by the earlier passes.
    #[allow(clippy::too_many_arguments)]
    pub fn execute(
        &self,
        device: &dyn GraphicsDevice,
        encoder: &mut dyn CommandEncoder,
        transient: &TransientBindGroups,
        view: &TiledView,
        gbuffer: &GBufferViews,
        light_accumulation: TextureViewId,
        env: &IblInputs,
        output: TiledOutput,
    ) -> Result<(), ResourceError> {
        let msaa = matches!(output, TiledOutput::Flat(_));
        let [albedo, normal, material, depth] = gbuffer.entries();
        let inputs = transient.create(
            device,
            &BindGroupDescriptor {
                label: Some("Tiled IBL Inputs"),
                layout: self.layouts[msaa_slot(msaa)],
                entries: &[
                    albedo,
                    normal,
                    material,
                    depth,
                    BindGroupEntry::texture(4, light_accumulation),
                    output.entry(5),
                ],
            },
        )?;
        let environment = transient.create(
            device,
            &BindGroupDescriptor {
                label: Some("Tiled IBL Environment"),
                layout: self.env_layout,
                entries: &[
                    BindGroupEntry::texture(0, env.reflection_probes),
                    BindGroupEntry::texture(1, env.sky),
                    BindGroupEntry::texture(2, env.brdf_lut),
                    BindGroupEntry::sampler(3, self.sampler),
                ],
            },
        )?;
        let params = lock(&self.params).push_pod(device, &env.params)?;

        let program = &self.programs[msaa_slot(msaa)];
        let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor {
            label: Some("Tiled Deferred IBL"),
        });
        pass.set_pipeline(program.pipeline);
        pass.set_bind_group(0, view.grid_group, &[]);
        pass.set_bind_group(1, inputs, &[]);
        pass.set_bind_group(2, environment, &[]);
        pass.set_bind_group(3, params.bind_group, &[params.offset]);
        pass.dispatch_workgroups(div_ceil(view.width, IBL_TILE_SIZE), div_ceil(view.height, IBL_TILE_SIZE), 1);
        Ok(())
    }

    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        for program in &self.programs {
            program.destroy(device);
        }
        lock(&self.params).destroy(device);
        for layout in self.layouts.into_iter().chain([self.env_layout, self.params_layout]) {
            destroy_layout(device, layout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ibl_params_fit_one_uniform_vector() {
        assert_eq!(std::mem::size_of::<IblParams>(), 16);
        assert_eq!(IblParams::new(true, false, true).flags, [1, 0, 1, 0]);
    }

    #[test]
    fn ibl_tiles_cover_four_lighting_tiles() {
        assert_eq!(IBL_TILE_SIZE, LIGHTING_TILE_SIZE * 2);
        assert_eq!(div_ceil(1920, IBL_TILE_SIZE), 60);
        assert_eq!(div_ceil(1080, LIGHTING_TILE_SIZE), 68);
    }

    #[test]
    fn msaa_variant_selects_flat_output() {
        let source = msaa_defines(true).apply(shaders::TILED_DEFERRED_LIGHTING_WGSL).unwrap();
        assert!(source.contains("array<vec4<f32>>"));
        assert!(!source.contains("texture_storage_2d"));
        let source = msaa_defines(false).apply(shaders::TILED_DEFERRED_LIGHTING_WGSL).unwrap();
        assert!(source.contains("texture_storage_2d"));
    }
}
