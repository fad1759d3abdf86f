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
//! Generic rendering enums.

use serde::{Deserialize, Serialize};

/// Width of the indices in an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    /// 16-bit indices.
    Uint16,
    /// 32-bit indices.
    Uint32,
}

/// Number of samples per pixel of a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SampleCount {
    /// No multisampling.
    #[default]
    X1,
    /// 2x MSAA.
    X2,
    /// 4x MSAA.
    X4,
    /// 8x MSAA.
    X8,
}

impl SampleCount {
    /// Samples per pixel as an integer.
    pub const fn count(self) -> u32 {
        match self {
            SampleCount::X1 => 1,
            SampleCount::X2 => 2,
            SampleCount::X4 => 4,
            SampleCount::X8 => 8,
        }
    }

    /// Maps an integer count to the matching variant.
    pub const fn from_count(count: u32) -> Option<Self> {
        match count {
            1 => Some(SampleCount::X1),
            2 => Some(SampleCount::X2),
            4 => Some(SampleCount::X4),
            8 => Some(SampleCount::X8),
            _ => None,
        }
    }

    /// Whether more than one sample is stored per pixel.
    pub const fn is_multisampled(self) -> bool {
        !matches!(self, SampleCount::X1)
    }
}

/// Pixel formats used by the lighting pipeline's render targets and lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// Single 8-bit normalized channel.
    R8Unorm,
    /// Four 8-bit normalized channels.
    Rgba8Unorm,
    /// Four 8-bit normalized channels, sRGB encoded.
    Rgba8UnormSrgb,
    /// Four 8-bit normalized channels in BGRA order, sRGB encoded.
    Bgra8UnormSrgb,
    /// Packed 10-bit RGB with 2-bit alpha.
    Rgb10a2Unorm,
    /// Two 16-bit float channels.
    Rg16Float,
    /// Four 16-bit float channels.
    Rgba16Float,
    /// Single 32-bit unsigned integer channel.
    R32Uint,
    /// Single 32-bit float channel.
    R32Float,
    /// Two 32-bit float channels.
    Rg32Float,
    /// Four 32-bit float channels.
    Rgba32Float,
    /// 32-bit float depth.
    Depth32Float,
    /// 24-bit depth with 8-bit stencil.
    Depth24PlusStencil8,
    /// 32-bit float depth with 8-bit stencil.
    Depth32FloatStencil8,
}

impl TextureFormat {
    /// Size of one texel in bytes.
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::R8Unorm => 1,
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8UnormSrgb
            | TextureFormat::Rgb10a2Unorm
            | TextureFormat::Rg16Float
            | TextureFormat::R32Uint
            | TextureFormat::R32Float
            | TextureFormat::Depth32Float
            | TextureFormat::Depth24PlusStencil8 => 4,
            TextureFormat::Depth32FloatStencil8 => 5,
            TextureFormat::Rgba16Float | TextureFormat::Rg32Float => 8,
            TextureFormat::Rgba32Float => 16,
        }
    }

    /// Whether the format carries depth.
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            TextureFormat::Depth32Float
                | TextureFormat::Depth24PlusStencil8
                | TextureFormat::Depth32FloatStencil8
        )
    }

    /// Whether the format carries stencil.
    pub fn has_stencil(&self) -> bool {
        matches!(
            self,
            TextureFormat::Depth24PlusStencil8 | TextureFormat::Depth32FloatStencil8
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_count_conversions() {
        for count in [1, 2, 4, 8] {
            assert_eq!(SampleCount::from_count(count).unwrap().count(), count);
        }
        assert_eq!(SampleCount::from_count(3), None);
        assert!(!SampleCount::X1.is_multisampled());
        assert!(SampleCount::X4.is_multisampled());
    }

    #[test]
    fn depth_formats() {
        assert!(TextureFormat::Depth32Float.is_depth());
        assert!(!TextureFormat::Depth32Float.has_stencil());
        assert!(TextureFormat::Depth24PlusStencil8.has_stencil());
        assert!(!TextureFormat::Rgba16Float.is_depth());
        assert_eq!(TextureFormat::Rgba16Float.bytes_per_pixel(), 8);
    }
}
