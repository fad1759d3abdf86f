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

//! Deferred lighting.
//!
//! The G-buffer is shaded in three steps:
//!
//! 1. [`TiledDeferredLighting`] adds every unshadowed light in one compute
//!    dispatch, using the light grid,
//! 2. [`StandardDeferredLighting`] draws the remaining lights one volume at
//!    a time, after projecting their shadows,
//! 3. [`TiledDeferredIBL`] adds reflections and sky lighting and writes the
//!    scene color.
//!
//! [`LightingResources`] owns the pipelines and lookups these passes share
//! across views.

pub mod brdf;
pub mod flat;
pub mod gbuffer;
pub mod standard;
pub mod tiled;

pub use brdf::EnvBrdfLut;
pub use flat::{FlatFramebuffer, FlatFramebufferToTexture};
pub use standard::{DeferredLightingFrame, DeferredLightingTargets, StandardDeferredLighting};
pub use tiled::{GBufferViews, IblInputs, IblParams, TiledDeferredIBL, TiledDeferredLighting, TiledOutput, TiledView};

use crate::util::{LightVolumes, TransientBindGroups};
use beast_core::math::Extent3D;
use beast_core::renderer::api::{
    AddressMode, BindGroupLayoutId, FilterMode, SampleCount, SamplerDescriptor, SamplerId,
    TextureDescriptor, TextureDimension, TextureId, TextureUsage, TextureViewDescriptor,
    TextureViewDimension, TextureViewId,
};
use beast_core::renderer::error::ResourceError;
use beast_core::renderer::GraphicsDevice;
use gbuffer::HDR_FORMAT;
use std::borrow::Cow;

/// Black 1x1 environment bound when a scene has no sky or probes.
#[derive(Debug, Clone, Copy)]
pub struct PlaceholderEnvironment {
    texture: TextureId,
    pub cube: TextureViewId,
    pub cube_array: TextureViewId,
}

impl PlaceholderEnvironment {
    fn new(device: &dyn GraphicsDevice) -> Result<Self, ResourceError> {
        let texture = device.create_texture(&TextureDescriptor {
            label: Some(Cow::Borrowed("Placeholder Environment")),
            size: Extent3D {
                width: 1,
                height: 1,
                depth_or_array_layers: 6,
            },
            mip_level_count: 1,
            sample_count: SampleCount::X1,
            dimension: TextureDimension::D2,
            format: HDR_FORMAT,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
        })?;
        let view = |dimension| TextureViewDescriptor {
            dimension: Some(dimension),
            ..Default::default()
        };
        let cube = device.create_texture_view(texture, &view(TextureViewDimension::Cube))?;
        let cube_array = device.create_texture_view(texture, &view(TextureViewDimension::CubeArray))?;
        Ok(Self {
            texture,
            cube,
            cube_array,
        })
    }

    fn destroy(&self, device: &dyn GraphicsDevice) {
        for view in [self.cube, self.cube_array] {
            if let Err(e) = device.destroy_texture_view(view) {
                log::warn!("Failed to destroy placeholder view: {:?}", e);
            }
        }
        if let Err(e) = device.destroy_texture(self.texture) {
            log::warn!("Failed to destroy placeholder texture: {:?}", e);
        }
    }
}

/// Lighting pipelines and lookups shared by every view.
#[derive(Debug)]
pub struct LightingResources {
    pub brdf_lut: EnvBrdfLut,
    pub volumes: LightVolumes,
    pub tiled: TiledDeferredLighting,
    pub ibl: TiledDeferredIBL,
    pub flat: FlatFramebufferToTexture,
    pub standard: StandardDeferredLighting,
    pub placeholders: PlaceholderEnvironment,
    /// Filters probe and sky cubemaps.
    pub env_sampler: SamplerId,
    pub transient: TransientBindGroups,
}

impl LightingResources {
    /// `grid_layout` is the light grid shading layout.
    pub fn new(device: &dyn GraphicsDevice, grid_layout: BindGroupLayoutId) -> Result<Self, ResourceError> {
        let env_sampler = device.create_sampler(&SamplerDescriptor {
            label: Some(Cow::Borrowed("Environment Sampler")),
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Linear,
            ..Default::default()
        })?;
        let brdf_lut = EnvBrdfLut::new(device, brdf::ENV_BRDF_LUT_SIZE, brdf::ENV_BRDF_LUT_SAMPLES)?;

        Ok(Self {
            brdf_lut,
            volumes: LightVolumes::new(device)?,
            tiled: TiledDeferredLighting::new(device, grid_layout)?,
            ibl: TiledDeferredIBL::new(device, grid_layout, env_sampler)?,
            flat: FlatFramebufferToTexture::new(device)?,
            standard: StandardDeferredLighting::new(device, grid_layout)?,
            placeholders: PlaceholderEnvironment::new(device)?,
            env_sampler,
            transient: TransientBindGroups::new(),
        })
    }

    /// Rewinds per-frame uniforms and drops bind groups the GPU is done with.
    pub fn begin_frame(&self, device: &dyn GraphicsDevice) {
        self.transient.begin_frame(device);
        self.ibl.begin_frame();
        self.flat.begin_frame();
        self.standard.begin_frame();
    }

    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        self.transient.release(device);
        self.tiled.destroy(device);
        self.ibl.destroy(device);
        self.flat.destroy(device);
        self.standard.destroy(device);
        self.volumes.destroy(device);
        self.brdf_lut.destroy(device);
        self.placeholders.destroy(device);
        if let Err(e) = device.destroy_sampler(self.env_sampler) {
            log::warn!("Failed to destroy environment sampler: {:?}", e);
        }
    }
}
