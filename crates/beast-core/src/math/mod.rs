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
//! Math types used by the lighting pipeline.
//!
//! Linear algebra comes from `glam`; this module adds the geometric
//! primitives (rectangles, spheres, planes, convex volumes) and scalar
//! helpers the renderer needs.

pub mod color;
pub mod dimension;
pub mod geometry;

pub use color::LinearRgba;
pub use dimension::{Extent3D, Origin3D};
pub use geometry::{Aabb, ConvexVolume, Plane, Rect2, Rect2I, Sphere};
pub use glam::{Mat3, Mat4, Quat, UVec2, UVec3, UVec4, Vec2, Vec3, Vec4};

/// Tolerance used for float comparisons.
pub const EPSILON: f32 = 1e-5;

/// Clamps `value` to `[0, 1]`.
#[inline]
pub fn saturate(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Position of `value` inside `[a, b]`, as a fraction. Not clamped.
#[inline]
pub fn inv_lerp(a: f32, b: f32, value: f32) -> f32 {
    if (b - a).abs() < EPSILON {
        return 0.0;
    }
    (value - a) / (b - a)
}

/// Integer division rounding up.
#[inline]
pub const fn div_ceil(value: u32, divisor: u32) -> u32 {
    (value + divisor - 1) / divisor
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn inv_lerp_maps_range_to_unit() {
        assert_relative_eq!(inv_lerp(32.0, 64.0, 32.0), 0.0);
        assert_relative_eq!(inv_lerp(32.0, 64.0, 48.0), 0.5);
        assert_relative_eq!(inv_lerp(32.0, 64.0, 64.0), 1.0);
        assert_eq!(inv_lerp(1.0, 1.0, 5.0), 0.0);
    }

    #[test]
    fn div_ceil_rounds_up() {
        assert_eq!(div_ceil(1920, 64), 30);
        assert_eq!(div_ceil(1080, 64), 17);
        assert_eq!(div_ceil(64, 64), 1);
    }
}
