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
//! Bind groups and their layouts.

use crate::renderer::api::{
    resource::{BufferId, SamplerId, TextureViewDimension, TextureViewId},
    util::{ShaderStageFlags, TextureFormat},
};
use std::num::NonZeroU64;

/// Opaque handle to a bind group layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupLayoutId(pub usize);

/// Opaque handle to a bind group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupId(pub usize);

/// Uniform or storage buffer binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferBindingType {
    /// Uniform buffer.
    Uniform,
    /// Storage buffer.
    Storage {
        /// Whether the shader only reads it.
        read_only: bool,
    },
}

/// Sampled texture component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureSampleType {
    /// Float texels.
    Float {
        /// Whether linear filtering is allowed.
        filterable: bool,
    },
    /// Depth texels.
    Depth,
    /// Unsigned integer texels.
    Uint,
}

/// Access mode of a storage texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageTextureAccess {
    /// Write only.
    WriteOnly,
    /// Read and write.
    ReadWrite,
}

/// Kind of sampler binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerBindingType {
    /// Filtering sampler.
    Filtering,
    /// Non-filtering sampler.
    NonFiltering,
    /// Depth comparison sampler.
    Comparison,
}

/// Type of resource expected at a binding slot.
#[derive(Debug, Clone, PartialEq)]
pub enum BindingType {
    /// Buffer.
    Buffer {
        /// Uniform or storage.
        ty: BufferBindingType,
        /// Whether a dynamic offset is supplied at bind time.
        has_dynamic_offset: bool,
        /// Minimum bound size.
        min_binding_size: Option<NonZeroU64>,
    },
    /// Sampled texture.
    Texture {
        /// Component type.
        sample_type: TextureSampleType,
        /// View dimension.
        view_dimension: TextureViewDimension,
        /// Whether the texture is multisampled.
        multisampled: bool,
    },
    /// Storage texture.
    StorageTexture {
        /// Access mode.
        access: StorageTextureAccess,
        /// Texel format.
        format: TextureFormat,
        /// View dimension.
        view_dimension: TextureViewDimension,
    },
    /// Sampler.
    Sampler(SamplerBindingType),
}

/// One slot of a bind group layout.
#[derive(Debug, Clone, PartialEq)]
pub struct BindGroupLayoutEntry {
    /// `@binding` index.
    pub binding: u32,
    /// Stages that see the binding.
    pub visibility: ShaderStageFlags,
    /// Resource type.
    pub ty: BindingType,
}

impl BindGroupLayoutEntry {
    /// Uniform buffer slot.
    pub fn uniform(binding: u32, visibility: ShaderStageFlags, dynamic: bool) -> Self {
        Self {
            binding,
            visibility,
            ty: BindingType::Buffer {
                ty: BufferBindingType::Uniform,
                has_dynamic_offset: dynamic,
                min_binding_size: None,
            },
        }
    }

    /// Storage buffer slot.
    pub fn storage(binding: u32, visibility: ShaderStageFlags, read_only: bool) -> Self {
        Self {
            binding,
            visibility,
            ty: BindingType::Buffer {
                ty: BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
        }
    }

    /// Sampled texture slot.
    pub fn texture(
        binding: u32,
        visibility: ShaderStageFlags,
        sample_type: TextureSampleType,
        view_dimension: TextureViewDimension,
        multisampled: bool,
    ) -> Self {
        Self {
            binding,
            visibility,
            ty: BindingType::Texture {
                sample_type,
                view_dimension,
                multisampled,
            },
        }
    }

    /// Write-only 2D storage texture slot.
    pub fn storage_texture(binding: u32, visibility: ShaderStageFlags, format: TextureFormat) -> Self {
        Self {
            binding,
            visibility,
            ty: BindingType::StorageTexture {
                access: StorageTextureAccess::WriteOnly,
                format,
                view_dimension: TextureViewDimension::D2,
            },
        }
    }

    /// Sampler slot.
    pub fn sampler(binding: u32, visibility: ShaderStageFlags, ty: SamplerBindingType) -> Self {
        Self {
            binding,
            visibility,
            ty: BindingType::Sampler(ty),
        }
    }
}

/// Describes a bind group layout.
#[derive(Debug, Clone)]
pub struct BindGroupLayoutDescriptor<'a> {
    /// Debug label.
    pub label: Option<&'a str>,
    /// Slots.
    pub entries: &'a [BindGroupLayoutEntry],
}

/// A range of a buffer bound to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBinding {
    /// Buffer.
    pub buffer: BufferId,
    /// Byte offset.
    pub offset: u64,
    /// Bound size, `None` for the rest of the buffer.
    pub size: Option<NonZeroU64>,
}

/// Resource bound to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingResource {
    /// Buffer range.
    Buffer(BufferBinding),
    /// Texture view.
    TextureView(TextureViewId),
    /// Sampler.
    Sampler(SamplerId),
}

/// One bound slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindGroupEntry {
    /// `@binding` index.
    pub binding: u32,
    /// Bound resource.
    pub resource: BindingResource,
}

impl BindGroupEntry {
    /// Binds a whole buffer.
    pub fn buffer(binding: u32, buffer: BufferId) -> Self {
        Self {
            binding,
            resource: BindingResource::Buffer(BufferBinding {
                buffer,
                offset: 0,
                size: None,
            }),
        }
    }

    /// Binds `size` bytes of a buffer, typically for a dynamic-offset uniform.
    pub fn buffer_range(binding: u32, buffer: BufferId, size: u64) -> Self {
        Self {
            binding,
            resource: BindingResource::Buffer(BufferBinding {
                buffer,
                offset: 0,
                size: NonZeroU64::new(size),
            }),
        }
    }

    /// Binds a texture view.
    pub fn texture(binding: u32, view: TextureViewId) -> Self {
        Self {
            binding,
            resource: BindingResource::TextureView(view),
        }
    }

    /// Binds a sampler.
    pub fn sampler(binding: u32, sampler: SamplerId) -> Self {
        Self {
            binding,
            resource: BindingResource::Sampler(sampler),
        }
    }
}

/// Describes a bind group.
#[derive(Debug, Clone)]
pub struct BindGroupDescriptor<'a> {
    /// Debug label.
    pub label: Option<&'a str>,
    /// Layout the group conforms to.
    pub layout: BindGroupLayoutId,
    /// Bound resources.
    pub entries: &'a [BindGroupEntry],
}
