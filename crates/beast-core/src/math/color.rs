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
//! Linear-space color.

use glam::Vec3;

/// A color in linear RGB space with alpha. Laid out as four `f32`s so it can
/// be written straight into uniform data.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable, serde::Serialize, serde::Deserialize,
)]
pub struct LinearRgba {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
    /// Alpha.
    pub a: f32,
}

impl LinearRgba {
    /// Opaque white.
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    /// Opaque black.
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Creates a color from all four channels.
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Creates an opaque color.
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// The RGB channels as a vector.
    pub fn rgb_vec(&self) -> Vec3 {
        Vec3::new(self.r, self.g, self.b)
    }

    /// Channels in `[r, g, b, a]` order.
    pub fn to_array(self) -> [f32; 4] {
        bytemuck::cast(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_keep_rgba_order() {
        let color = LinearRgba::new(0.1, 0.2, 0.3, 0.4);
        assert_eq!(color.to_array(), [0.1, 0.2, 0.3, 0.4]);
        assert_eq!(bytemuck::bytes_of(&color).len(), 16);
        assert_eq!(LinearRgba::rgb(1.0, 0.5, 0.25).rgb_vec(), Vec3::new(1.0, 0.5, 0.25));
    }
}
