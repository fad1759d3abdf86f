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

//! Outputs compositor nodes publish into the frame context.

use crate::lighting::gbuffer::{
    ALBEDO_FORMAT, DEVICE_DEPTH_FORMAT, HDR_FORMAT, MATERIAL_FORMAT, NORMAL_FORMAT, SCENE_DEPTH_FORMAT,
};
use crate::lighting::{FlatFramebuffer, GBufferViews, TiledOutput};
use crate::pool::{GpuResourcePool, PooledBuffer, PooledBufferDesc, PooledTexture, PooledTextureDesc};
use beast_core::renderer::api::{BufferUsage, SampleCount, TextureFormat, TextureUsage};
use beast_core::renderer::error::ResourceError;
use beast_core::renderer::RendererView;

fn target_desc(view: &RendererView, format: TextureFormat, usage: TextureUsage) -> PooledTextureDesc {
    PooledTextureDesc::create_2d(format, view.width(), view.height(), usage, view.sample_count)
}

/// Scene depth and stencil, at the view's sample count.
#[derive(Debug, Clone)]
pub struct SceneDepthOutput {
    pub texture: PooledTexture,
}

impl SceneDepthOutput {
    pub fn acquire(pool: &GpuResourcePool, view: &RendererView) -> Result<Self, ResourceError> {
        let usage = TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING;
        Ok(Self {
            texture: pool.get_texture(&target_desc(view, SCENE_DEPTH_FORMAT, usage))?,
        })
    }

    pub fn release(self, pool: &GpuResourcePool) {
        pool.release_texture(self.texture);
    }
}

/// Surface attributes written by the opaque pass.
#[derive(Debug, Clone)]
pub struct GBufferOutput {
    pub albedo: PooledTexture,
    pub normal: PooledTexture,
    pub material: PooledTexture,
    /// Device depth as a color texture.
    pub depth: PooledTexture,
}

impl GBufferOutput {
    pub fn acquire(pool: &GpuResourcePool, view: &RendererView) -> Result<Self, ResourceError> {
        let usage = TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING;
        let get = |format| pool.get_texture(&target_desc(view, format, usage));
        Ok(Self {
            albedo: get(ALBEDO_FORMAT)?,
            normal: get(NORMAL_FORMAT)?,
            material: get(MATERIAL_FORMAT)?,
            depth: get(DEVICE_DEPTH_FORMAT)?,
        })
    }

    pub fn views(&self) -> GBufferViews {
        GBufferViews {
            albedo: self.albedo.view(),
            normal: self.normal.view(),
            material: self.material.view(),
            depth: self.depth.view(),
        }
    }

    pub fn release(self, pool: &GpuResourcePool) {
        for texture in [self.albedo, self.normal, self.material, self.depth] {
            pool.release_texture(texture);
        }
    }
}

/// An HDR color target. When a compute pass writes it under MSAA, the pass
/// writes the flat buffer and an unflatten node copies it into the texture.
#[derive(Debug, Clone)]
pub struct HdrTarget {
    pub texture: PooledTexture,
    pub flat: Option<PooledBuffer>,
}

impl HdrTarget {
    /// `compute_output` reserves what a tiled compute pass needs to write
    /// the target.
    pub fn acquire(pool: &GpuResourcePool, view: &RendererView, compute_output: bool) -> Result<Self, ResourceError> {
        let msaa = view.sample_count.is_multisampled();
        let mut usage = TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING;
        if compute_output && !msaa {
            usage.insert(TextureUsage::STORAGE_BINDING);
        }
        let texture = pool.get_texture(&target_desc(view, HDR_FORMAT, usage))?;
        let flat = if compute_output && msaa {
            let size = FlatFramebuffer::byte_size(view.width(), view.height(), view.sample_count);
            match pool.get_buffer(&PooledBufferDesc::structured(size, 1, BufferUsage::STORAGE)) {
                Ok(buffer) => Some(buffer),
                Err(e) => {
                    pool.release_texture(texture);
                    return Err(e);
                }
            }
        } else {
            None
        };
        Ok(Self { texture, flat })
    }

    /// Where a tiled compute pass writes this target. Only meaningful for
    /// targets acquired with `compute_output`.
    pub fn tiled_output(&self) -> TiledOutput {
        match &self.flat {
            Some(buffer) => TiledOutput::Flat(buffer.buffer()),
            None => TiledOutput::Texture(self.texture.view()),
        }
    }

    pub fn flat_framebuffer(&self) -> Option<FlatFramebuffer> {
        let desc = self.texture.desc();
        self.flat.as_ref().map(|buffer| FlatFramebuffer {
            buffer: buffer.buffer(),
            width: desc.width,
            height: desc.height,
            samples: desc.sample_count,
        })
    }

    pub fn sample_count(&self) -> SampleCount {
        self.texture.desc().sample_count
    }

    pub fn release(self, pool: &GpuResourcePool) {
        pool.release_texture(self.texture);
        if let Some(buffer) = self.flat {
            pool.release_buffer(buffer);
        }
    }
}

/// Direct lighting of the view.
#[derive(Debug, Clone)]
pub struct LightAccumOutput(pub HdrTarget);

/// Final HDR color of the view, before tone mapping.
#[derive(Debug, Clone)]
pub struct SceneColorOutput(pub HdrTarget);
