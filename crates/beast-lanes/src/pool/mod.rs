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

//! Reuse of transient GPU textures and buffers.
//!
//! Every resource the pool hands out lives in an `Arc` shared between the
//! pool and the callers' handles. An entry is free exactly when the pool
//! holds the only reference, so releasing a resource is just dropping the
//! handle. The GPU resource is destroyed when the last reference goes away,
//! which only happens after the pool forgets the entry in [`GpuResourcePool::trim`]
//! or when the pool itself is dropped.

mod desc;

pub use desc::{PooledBufferDesc, PooledTextureDesc, PooledTextureDimension};

use beast_core::math::Extent3D;
use beast_core::renderer::api::{
    BufferDescriptor, BufferId, ImageAspect, TextureDescriptor, TextureDimension, TextureId,
    TextureViewDescriptor, TextureViewDimension, TextureViewId,
};
use beast_core::renderer::error::ResourceError;
use beast_core::renderer::GraphicsDevice;
use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::util::lock;

struct TextureEntry {
    device: Arc<dyn GraphicsDevice>,
    desc: PooledTextureDesc,
    texture: TextureId,
    view: TextureViewId,
    depth_view: Option<TextureViewId>,
    layer_views: Vec<TextureViewId>,
    last_used_frame: AtomicU64,
}

impl Drop for TextureEntry {
    fn drop(&mut self) {
        let views = self
            .layer_views
            .iter()
            .chain(self.depth_view.iter())
            .chain(std::iter::once(&self.view));
        for view in views {
            if let Err(e) = self.device.destroy_texture_view(*view) {
                log::warn!("GpuResourcePool: Failed to destroy texture view: {:?}", e);
            }
        }
        if let Err(e) = self.device.destroy_texture(self.texture) {
            log::warn!("GpuResourcePool: Failed to destroy texture: {:?}", e);
        }
    }
}

struct BufferEntry {
    device: Arc<dyn GraphicsDevice>,
    desc: PooledBufferDesc,
    buffer: BufferId,
    last_used_frame: AtomicU64,
}

impl Drop for BufferEntry {
    fn drop(&mut self) {
        if let Err(e) = self.device.destroy_buffer(self.buffer) {
            log::warn!("GpuResourcePool: Failed to destroy buffer: {:?}", e);
        }
    }
}

/// A texture checked out of the pool. Clones share the same texture.
#[derive(Clone)]
pub struct PooledTexture(Arc<TextureEntry>);

impl PooledTexture {
    pub fn texture(&self) -> TextureId {
        self.0.texture
    }

    /// Default view covering every layer and mip.
    pub fn view(&self) -> TextureViewId {
        self.0.view
    }

    /// View used for sampling. For depth-stencil formats this is a
    /// depth-only view.
    pub fn sampled_view(&self) -> TextureViewId {
        self.0.depth_view.unwrap_or(self.0.view)
    }

    /// Single-layer 2D view, for rendering into a cube face or array layer.
    pub fn layer_view(&self, layer: u32) -> Option<TextureViewId> {
        if self.0.layer_views.is_empty() && layer == 0 {
            return Some(self.0.view);
        }
        self.0.layer_views.get(layer as usize).copied()
    }

    pub fn desc(&self) -> &PooledTextureDesc {
        &self.0.desc
    }

    /// Whether both handles refer to the same GPU texture.
    pub fn same_resource(&self, other: &PooledTexture) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for PooledTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledTexture")
            .field("texture", &self.0.texture)
            .field("desc", &self.0.desc)
            .finish()
    }
}

/// A buffer checked out of the pool. Clones share the same buffer.
#[derive(Clone)]
pub struct PooledBuffer(Arc<BufferEntry>);

impl PooledBuffer {
    pub fn buffer(&self) -> BufferId {
        self.0.buffer
    }

    pub fn size(&self) -> u64 {
        self.0.desc.size
    }

    pub fn desc(&self) -> &PooledBufferDesc {
        &self.0.desc
    }

    /// Whether both handles refer to the same GPU buffer.
    pub fn same_resource(&self, other: &PooledBuffer) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("buffer", &self.0.buffer)
            .field("desc", &self.0.desc)
            .finish()
    }
}

/// Counts of pooled entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub textures: usize,
    pub free_textures: usize,
    pub buffers: usize,
    pub free_buffers: usize,
}

/// Pool of reusable GPU textures and buffers.
pub struct GpuResourcePool {
    device: Arc<dyn GraphicsDevice>,
    textures: Mutex<Vec<Arc<TextureEntry>>>,
    buffers: Mutex<Vec<Arc<BufferEntry>>>,
    frame: AtomicU64,
}

impl GpuResourcePool {
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Self {
        Self {
            device,
            textures: Mutex::new(Vec::new()),
            buffers: Mutex::new(Vec::new()),
            frame: AtomicU64::new(0),
        }
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// Returns a free texture matching `desc` exactly, or allocates one.
    pub fn get_texture(&self, desc: &PooledTextureDesc) -> Result<PooledTexture, ResourceError> {
        let frame = self.frame.load(Ordering::Relaxed);
        let mut textures = lock(&self.textures);

        if let Some(entry) = textures
            .iter()
            .find(|e| Arc::strong_count(e) == 1 && e.desc == *desc)
        {
            entry.last_used_frame.store(frame, Ordering::Relaxed);
            return Ok(PooledTexture(entry.clone()));
        }

        let entry = Arc::new(self.create_texture(desc, frame)?);
        log::trace!(
            "GpuResourcePool: Allocated {:?} {}x{} texture ({} in pool)",
            desc.format,
            desc.width,
            desc.height,
            textures.len() + 1
        );
        textures.push(entry.clone());
        Ok(PooledTexture(entry))
    }

    /// Returns a free buffer matching `desc` exactly, or allocates one.
    pub fn get_buffer(&self, desc: &PooledBufferDesc) -> Result<PooledBuffer, ResourceError> {
        let frame = self.frame.load(Ordering::Relaxed);
        let mut buffers = lock(&self.buffers);

        if let Some(entry) = buffers
            .iter()
            .find(|e| Arc::strong_count(e) == 1 && e.desc == *desc)
        {
            entry.last_used_frame.store(frame, Ordering::Relaxed);
            return Ok(PooledBuffer(entry.clone()));
        }

        let buffer = self.device.create_buffer(&BufferDescriptor {
            label: Some(Cow::Borrowed("Pooled Buffer")),
            size: desc.size,
            usage: desc.usage,
            mapped_at_creation: false,
        })?;
        let entry = Arc::new(BufferEntry {
            device: self.device.clone(),
            desc: *desc,
            buffer,
            last_used_frame: AtomicU64::new(frame),
        });
        buffers.push(entry.clone());
        Ok(PooledBuffer(entry))
    }

    /// Gives a texture back. Other clones of the handle keep it checked out.
    pub fn release_texture(&self, texture: PooledTexture) {
        texture
            .0
            .last_used_frame
            .store(self.frame.load(Ordering::Relaxed), Ordering::Relaxed);
    }

    /// Gives a buffer back. Other clones of the handle keep it checked out.
    pub fn release_buffer(&self, buffer: PooledBuffer) {
        buffer
            .0
            .last_used_frame
            .store(self.frame.load(Ordering::Relaxed), Ordering::Relaxed);
    }

    /// Advances the pool clock used by [`Self::trim`].
    pub fn end_frame(&self) {
        self.frame.fetch_add(1, Ordering::Relaxed);
    }

    /// Forgets free entries that have been idle for more than
    /// `max_idle_frames` frames.
    pub fn trim(&self, max_idle_frames: u64) {
        let frame = self.frame.load(Ordering::Relaxed);
        let idle = |last_used: &AtomicU64| frame.saturating_sub(last_used.load(Ordering::Relaxed)) > max_idle_frames;

        lock(&self.textures).retain(|e| Arc::strong_count(e) > 1 || !idle(&e.last_used_frame));
        lock(&self.buffers).retain(|e| Arc::strong_count(e) > 1 || !idle(&e.last_used_frame));
    }

    pub fn stats(&self) -> PoolStats {
        let textures = lock(&self.textures);
        let buffers = lock(&self.buffers);
        PoolStats {
            textures: textures.len(),
            free_textures: textures.iter().filter(|e| Arc::strong_count(e) == 1).count(),
            buffers: buffers.len(),
            free_buffers: buffers.iter().filter(|e| Arc::strong_count(e) == 1).count(),
        }
    }

    /// Forgets every entry. Resources still held by handles survive until
    /// those handles drop.
    pub fn clear(&self) {
        lock(&self.textures).clear();
        lock(&self.buffers).clear();
    }

    fn create_texture(&self, desc: &PooledTextureDesc, frame: u64) -> Result<TextureEntry, ResourceError> {
        let texture = self.device.create_texture(&TextureDescriptor {
            label: Some(Cow::Borrowed("Pooled Texture")),
            size: Extent3D {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: desc.array_layers(),
            },
            mip_level_count: desc.mip_count.max(1),
            sample_count: desc.sample_count,
            dimension: TextureDimension::D2,
            format: desc.format,
            usage: desc.usage,
        })?;

        let mut created = Vec::new();
        match self.create_views(texture, desc, &mut created) {
            Ok((view, depth_view, layer_views)) => Ok(TextureEntry {
                device: self.device.clone(),
                desc: *desc,
                texture,
                view,
                depth_view,
                layer_views,
                last_used_frame: AtomicU64::new(frame),
            }),
            Err(e) => {
                for view in created {
                    if let Err(e) = self.device.destroy_texture_view(view) {
                        log::warn!("GpuResourcePool: Failed to destroy texture view: {:?}", e);
                    }
                }
                if let Err(e) = self.device.destroy_texture(texture) {
                    log::warn!("GpuResourcePool: Failed to destroy texture: {:?}", e);
                }
                Err(e)
            }
        }
    }

    /// Creates the default, depth-only and per-layer views of `texture`.
    /// Every view created is also pushed to `created`, so a caller can
    /// release them when a later one fails.
    fn create_views(
        &self,
        texture: TextureId,
        desc: &PooledTextureDesc,
        created: &mut Vec<TextureViewId>,
    ) -> Result<(TextureViewId, Option<TextureViewId>, Vec<TextureViewId>), ResourceError> {
        let mut create = |descriptor: TextureViewDescriptor| -> Result<TextureViewId, ResourceError> {
            let view = self.device.create_texture_view(texture, &descriptor)?;
            created.push(view);
            Ok(view)
        };

        let view_dimension = match desc.dimension {
            PooledTextureDimension::D2 => TextureViewDimension::D2,
            PooledTextureDimension::Cube => TextureViewDimension::Cube,
            PooledTextureDimension::D2Array => TextureViewDimension::D2Array,
        };
        let view = create(TextureViewDescriptor {
            label: Some(Cow::Borrowed("Pooled Texture View")),
            dimension: Some(view_dimension),
            ..Default::default()
        })?;

        let depth_view = if desc.format.has_stencil() {
            Some(create(TextureViewDescriptor {
                label: Some(Cow::Borrowed("Pooled Depth View")),
                dimension: Some(view_dimension),
                aspect: ImageAspect::DepthOnly,
                ..Default::default()
            })?)
        } else {
            None
        };

        let layers = desc.array_layers();
        let mut layer_views = Vec::new();
        if layers > 1 {
            for layer in 0..layers {
                layer_views.push(create(TextureViewDescriptor {
                    label: Some(Cow::Owned(format!("Pooled Texture Layer {layer}"))),
                    dimension: Some(TextureViewDimension::D2),
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    ..Default::default()
                })?);
            }
        }

        Ok((view, depth_view, layer_views))
    }
}

impl fmt::Debug for GpuResourcePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuResourcePool")
            .field("stats", &self.stats())
            .finish()
    }
}
