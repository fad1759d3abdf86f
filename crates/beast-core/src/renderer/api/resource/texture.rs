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
//! Textures, views and samplers.

use crate::beast_bitflags;
use crate::math::Extent3D;
use crate::renderer::api::pipeline::CompareFunction;
use crate::renderer::api::util::{SampleCount, TextureFormat};
use std::borrow::Cow;

/// Dimensionality of a texture's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    /// 1D storage.
    D1,
    /// 2D storage, also used for arrays and cubemaps.
    D2,
    /// 3D storage.
    D3,
}

/// How a view interprets a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureViewDimension {
    /// Single 2D image.
    D2,
    /// Array of 2D images.
    D2Array,
    /// Six-face cube.
    Cube,
    /// Array of cubes.
    CubeArray,
    /// Volume.
    D3,
}

/// Aspect of a depth/stencil texture seen by a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageAspect {
    /// Every aspect.
    #[default]
    All,
    /// Stencil only.
    StencilOnly,
    /// Depth only.
    DepthOnly,
}

/// Texture coordinate wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    /// Clamp to the edge texel.
    #[default]
    ClampToEdge,
    /// Repeat.
    Repeat,
}

/// Texel filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    /// Nearest texel.
    #[default]
    Nearest,
    /// Linear blend of neighbours.
    Linear,
}

beast_bitflags! {
    /// How a texture may be used.
    pub struct TextureUsage: u32 {
        /// Source of copy operations.
        const COPY_SRC = 1 << 0;
        /// Destination of copies and `write_texture`.
        const COPY_DST = 1 << 1;
        /// Sampled or loaded from a shader.
        const TEXTURE_BINDING = 1 << 2;
        /// Written as a storage texture.
        const STORAGE_BINDING = 1 << 3;
        /// Color or depth attachment of a render pass.
        const RENDER_ATTACHMENT = 1 << 4;
    }
}

/// Describes a texture to create.
#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    /// Debug label.
    pub label: Option<Cow<'a, str>>,
    /// Size; the third component counts layers for arrays and cubemaps.
    pub size: Extent3D,
    /// Number of mip levels.
    pub mip_level_count: u32,
    /// Samples per texel.
    pub sample_count: SampleCount,
    /// Storage dimensionality.
    pub dimension: TextureDimension,
    /// Texel format.
    pub format: TextureFormat,
    /// Allowed usages.
    pub usage: TextureUsage,
}

/// Describes a view onto a texture.
#[derive(Debug, Clone, Default)]
pub struct TextureViewDescriptor<'a> {
    /// Debug label.
    pub label: Option<Cow<'a, str>>,
    /// Reinterpreted format, or the texture's own.
    pub format: Option<TextureFormat>,
    /// View dimensionality, or inferred from the texture.
    pub dimension: Option<TextureViewDimension>,
    /// Aspect seen by the view.
    pub aspect: ImageAspect,
    /// First visible mip.
    pub base_mip_level: u32,
    /// Number of visible mips, or all remaining.
    pub mip_level_count: Option<u32>,
    /// First visible layer.
    pub base_array_layer: u32,
    /// Number of visible layers, or all remaining.
    pub array_layer_count: Option<u32>,
}

/// Describes a sampler to create.
#[derive(Debug, Clone, Default)]
pub struct SamplerDescriptor<'a> {
    /// Debug label.
    pub label: Option<Cow<'a, str>>,
    /// Wrapping on U.
    pub address_mode_u: AddressMode,
    /// Wrapping on V.
    pub address_mode_v: AddressMode,
    /// Wrapping on W.
    pub address_mode_w: AddressMode,
    /// Magnification filter.
    pub mag_filter: FilterMode,
    /// Minification filter.
    pub min_filter: FilterMode,
    /// Filter between mips.
    pub mipmap_filter: FilterMode,
    /// Comparison function for depth samplers.
    pub compare: Option<CompareFunction>,
    /// Maximum anisotropy, 1 disables it.
    pub anisotropy_clamp: u16,
}

/// Opaque handle to a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub usize);

/// Opaque handle to a texture view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureViewId(pub usize);

/// Opaque handle to a sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SamplerId(pub usize);
