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

//! Descriptors keying pooled resources. Lookups match them exactly.

use beast_core::renderer::api::{BufferUsage, SampleCount, TextureFormat, TextureUsage};

/// Shape of a pooled texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PooledTextureDimension {
    /// A plain 2D texture, optionally multisampled.
    D2,
    /// Six 2D faces viewed as a cube.
    Cube,
    /// An array of 2D layers.
    D2Array,
}

/// Everything that identifies a pooled texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PooledTextureDesc {
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
    /// Array layers for `D2Array`, ignored otherwise.
    pub depth_or_layers: u32,
    pub dimension: PooledTextureDimension,
    pub mip_count: u32,
    pub sample_count: SampleCount,
    pub usage: TextureUsage,
}

impl PooledTextureDesc {
    pub fn create_2d(format: TextureFormat, width: u32, height: u32, usage: TextureUsage, sample_count: SampleCount) -> Self {
        Self {
            format,
            width,
            height,
            depth_or_layers: 1,
            dimension: PooledTextureDimension::D2,
            mip_count: 1,
            sample_count,
            usage,
        }
    }

    pub fn create_cube(format: TextureFormat, size: u32, usage: TextureUsage) -> Self {
        Self {
            format,
            width: size,
            height: size,
            depth_or_layers: 6,
            dimension: PooledTextureDimension::Cube,
            mip_count: 1,
            sample_count: SampleCount::X1,
            usage,
        }
    }

    pub fn create_2d_array(format: TextureFormat, width: u32, height: u32, layers: u32, usage: TextureUsage) -> Self {
        Self {
            format,
            width,
            height,
            depth_or_layers: layers.max(1),
            dimension: PooledTextureDimension::D2Array,
            mip_count: 1,
            sample_count: SampleCount::X1,
            usage,
        }
    }

    /// Number of array layers the GPU texture is created with.
    pub fn array_layers(&self) -> u32 {
        match self.dimension {
            PooledTextureDimension::D2 => 1,
            PooledTextureDimension::Cube => 6,
            PooledTextureDimension::D2Array => self.depth_or_layers.max(1),
        }
    }
}

/// Everything that identifies a pooled buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PooledBufferDesc {
    pub size: u64,
    pub usage: BufferUsage,
}

impl PooledBufferDesc {
    /// A storage buffer of `count` elements of `element_size` bytes.
    pub fn structured(element_size: u64, count: u64, usage: BufferUsage) -> Self {
        let mut usage = usage;
        usage.insert(BufferUsage::STORAGE);
        Self {
            size: element_size * count.max(1),
            usage,
        }
    }

    /// A uniform buffer written from the CPU.
    pub fn uniform(size: u64) -> Self {
        Self {
            size,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        }
    }
}
