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

//! Shadow map storage: spot atlases, radial cubemaps and directional
//! cascades. All textures come from the [`GpuResourcePool`] and go back to
//! it when a map has been unused for [`MAX_UNUSED_FRAMES`] frames.

use super::{MAX_ATLAS_SIZE, MAX_UNUSED_FRAMES, NUM_CASCADE_SPLITS};
use crate::atlas::TextureAtlasLayout;
use crate::pool::{GpuResourcePool, PooledTexture, PooledTextureDesc};
use beast_core::math::Rect2I;
use beast_core::renderer::api::{BindGroupId, SampleCount, TextureFormat, TextureUsage};
use beast_core::renderer::error::ResourceError;
use beast_core::renderer::GraphicsDevice;

/// Depth format of every shadow map.
pub const SHADOW_MAP_FORMAT: TextureFormat = TextureFormat::Depth32Float;

fn shadow_usage() -> TextureUsage {
    TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING
}

/// State shared by every kind of shadow map.
#[derive(Debug)]
pub struct MapState {
    texture: PooledTexture,
    last_used_counter: u32,
    sampling_group: Option<BindGroupId>,
}

impl MapState {
    fn new(texture: PooledTexture) -> Self {
        Self {
            texture,
            last_used_counter: 0,
            sampling_group: None,
        }
    }
}

/// Common behavior of the shadow map kinds.
pub trait ShadowMap {
    fn state(&self) -> &MapState;
    fn state_mut(&mut self) -> &mut MapState;

    /// Starts a new frame. Called once per `render_shadow_maps`.
    fn clear(&mut self) {
        let state = self.state_mut();
        state.last_used_counter = state.last_used_counter.saturating_add(1);
    }

    fn mark_as_used(&mut self) {
        self.state_mut().last_used_counter = 0;
    }

    /// Frames since the map was last used. Zero during a frame that used it.
    fn last_used_counter(&self) -> u32 {
        self.state().last_used_counter
    }

    fn texture(&self) -> &PooledTexture {
        &self.state().texture
    }

    /// Bind group used to sample this map during projection.
    fn sampling_group(&self) -> Option<BindGroupId> {
        self.state().sampling_group
    }

    fn set_sampling_group(&mut self, group: BindGroupId) {
        self.state_mut().sampling_group = Some(group);
    }
}

/// A 4096² depth texture holding many spot light maps.
#[derive(Debug)]
pub struct ShadowMapAtlas {
    state: MapState,
    layout: TextureAtlasLayout,
    needs_clear: bool,
}

impl ShadowMapAtlas {
    pub fn new(pool: &GpuResourcePool) -> Result<Self, ResourceError> {
        let texture = pool.get_texture(&PooledTextureDesc::create_2d(
            SHADOW_MAP_FORMAT,
            MAX_ATLAS_SIZE,
            MAX_ATLAS_SIZE,
            shadow_usage(),
            SampleCount::X1,
        ))?;
        Ok(Self {
            state: MapState::new(texture),
            layout: TextureAtlasLayout::new(MAX_ATLAS_SIZE, MAX_ATLAS_SIZE, MAX_ATLAS_SIZE, MAX_ATLAS_SIZE, true),
            needs_clear: true,
        })
    }

    /// Reserves a `size`² map surrounded by `border` texels and returns
    /// the inner region, or `None` if the atlas is full.
    pub fn add_map(&mut self, size: u32, border: u32) -> Option<Rect2I> {
        let padded = size + 2 * border;
        let (x, y) = self.layout.add_element(padded, padded)?;
        self.mark_as_used();
        Some(Rect2I::new((x + border) as i32, (y + border) as i32, size, size))
    }

    /// True exactly once per frame, for the first pass rendering into the
    /// atlas.
    pub fn take_clear(&mut self) -> bool {
        std::mem::replace(&mut self.needs_clear, false)
    }

    pub fn size(&self) -> u32 {
        MAX_ATLAS_SIZE
    }
}

impl ShadowMap for ShadowMapAtlas {
    fn state(&self) -> &MapState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut MapState {
        &mut self.state
    }

    fn clear(&mut self) {
        self.state.last_used_counter = self.state.last_used_counter.saturating_add(1);
        self.layout.clear();
        self.needs_clear = true;
    }
}

/// Six-face depth cubemap for one radial light.
#[derive(Debug)]
pub struct ShadowCubemap {
    state: MapState,
    size: u32,
}

impl ShadowCubemap {
    pub fn new(pool: &GpuResourcePool, size: u32) -> Result<Self, ResourceError> {
        let texture = pool.get_texture(&PooledTextureDesc::create_cube(SHADOW_MAP_FORMAT, size, shadow_usage()))?;
        Ok(Self {
            state: MapState::new(texture),
            size,
        })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Not yet claimed by a light this frame.
    pub fn is_free(&self) -> bool {
        self.state.last_used_counter > 0
    }
}

impl ShadowMap for ShadowCubemap {
    fn state(&self) -> &MapState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut MapState {
        &mut self.state
    }
}

/// Layered depth map holding every cascade of a directional light.
#[derive(Debug)]
pub struct ShadowCascadedMap {
    state: MapState,
    size: u32,
}

impl ShadowCascadedMap {
    pub fn new(pool: &GpuResourcePool, size: u32) -> Result<Self, ResourceError> {
        let texture = pool.get_texture(&PooledTextureDesc::create_2d_array(
            SHADOW_MAP_FORMAT,
            size,
            size,
            NUM_CASCADE_SPLITS as u32,
            shadow_usage(),
        ))?;
        Ok(Self {
            state: MapState::new(texture),
            size,
        })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn is_free(&self) -> bool {
        self.state.last_used_counter > 0
    }
}

impl ShadowMap for ShadowCascadedMap {
    fn state(&self) -> &MapState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut MapState {
        &mut self.state
    }
}

/// Drops every map unused for `MAX_UNUSED_FRAMES` frames or more and
/// returns how many were dropped.
pub fn evict_unused<M: ShadowMap>(maps: &mut Vec<M>, device: &dyn GraphicsDevice, pool: &GpuResourcePool) -> usize {
    let before = maps.len();
    maps.retain(|map| {
        if map.last_used_counter() < MAX_UNUSED_FRAMES {
            return true;
        }
        if let Some(group) = map.sampling_group() {
            if let Err(e) = device.destroy_bind_group(group) {
                log::warn!("ShadowRendering: Failed to destroy shadow map bind group: {:?}", e);
            }
        }
        pool.release_texture(map.texture().clone());
        false
    });
    before - maps.len()
}

/// Releases every map regardless of use.
pub fn release_all<M: ShadowMap>(maps: &mut Vec<M>, device: &dyn GraphicsDevice, pool: &GpuResourcePool) {
    for map in maps.drain(..) {
        if let Some(group) = map.sampling_group() {
            if let Err(e) = device.destroy_bind_group(group) {
                log::warn!("ShadowRendering: Failed to destroy shadow map bind group: {:?}", e);
            }
        }
        pool.release_texture(map.texture().clone());
    }
}
