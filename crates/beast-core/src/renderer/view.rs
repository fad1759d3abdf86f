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
//! Camera views rendered by the pipeline.

use crate::beast_bitflags;
use crate::math::{ConvexVolume, Mat4, Rect2I, Vec3};
use crate::renderer::api::{SampleCount, TextureFormat, TextureViewId};

/// Stable identifier of a view across frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub u64);

beast_bitflags! {
    /// Per-view switches that change which passes run.
    pub struct ViewFlags: u32 {
        /// Skip direct lighting; probe data is still populated.
        const NO_LIGHTING = 1 << 0;
        /// Skip shadow rendering and projection.
        const NO_SHADOWS = 1 << 1;
        /// Skip image-based lighting.
        const NO_REFLECTIONS = 1 << 2;
    }
}

/// A camera and the target it renders into.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererView {
    /// Identifier used to keep per-view state between frames.
    pub id: ViewId,
    /// World to view transform.
    pub view: Mat4,
    /// View to clip transform, `[0, 1]` depth range.
    pub projection: Mat4,
    /// Near plane distance.
    pub near: f32,
    /// Far plane distance.
    pub far: f32,
    /// Region of the target rendered into.
    pub viewport: Rect2I,
    /// Samples per pixel of the view's intermediate targets.
    pub sample_count: SampleCount,
    /// Final output view.
    pub target: TextureViewId,
    /// Format of `target`.
    pub target_format: TextureFormat,
    /// Pass switches.
    pub flags: ViewFlags,
}

/// The part of a view that determines the shape of its render graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewConfig {
    /// Samples per pixel.
    pub sample_count: SampleCount,
    /// Pass switches.
    pub flags: ViewFlags,
    /// Final output format.
    pub target_format: TextureFormat,
}

impl RendererView {
    /// World to clip transform.
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Clip to view transform.
    pub fn inv_projection(&self) -> Mat4 {
        self.projection.inverse()
    }

    /// Camera position in world space.
    pub fn position(&self) -> Vec3 {
        self.view.inverse().w_axis.truncate()
    }

    /// Camera forward direction in world space.
    pub fn forward(&self) -> Vec3 {
        -self.view.inverse().z_axis.truncate().normalize_or_zero()
    }

    /// Whether the projection is orthographic.
    pub fn is_orthographic(&self) -> bool {
        self.projection.w_axis.w == 1.0
    }

    /// World-space view frustum.
    pub fn frustum(&self) -> ConvexVolume {
        ConvexVolume::from_view_projection(&self.view_projection())
    }

    /// Width of the rendered region.
    pub fn width(&self) -> u32 {
        self.viewport.width.max(1)
    }

    /// Height of the rendered region.
    pub fn height(&self) -> u32 {
        self.viewport.height.max(1)
    }

    /// Whether the view has the given flag.
    pub fn has_flag(&self, flag: ViewFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Render-graph shape of the view.
    pub fn config(&self) -> ViewConfig {
        ViewConfig {
            sample_count: self.sample_count,
            flags: self.flags,
            target_format: self.target_format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn view_at(eye: Vec3) -> RendererView {
        RendererView {
            id: ViewId(1),
            view: Mat4::look_at_rh(eye, eye + Vec3::NEG_Z, Vec3::Y),
            projection: Mat4::perspective_rh(1.0, 16.0 / 9.0, 0.1, 500.0),
            near: 0.1,
            far: 500.0,
            viewport: Rect2I::new(0, 0, 1920, 1080),
            sample_count: SampleCount::X1,
            target: TextureViewId(0),
            target_format: TextureFormat::Rgba8UnormSrgb,
            flags: ViewFlags::EMPTY,
        }
    }

    #[test]
    fn position_and_forward_come_from_view_matrix() {
        let view = view_at(Vec3::new(1.0, 2.0, 3.0));
        let p = view.position();
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(p.y, 2.0, epsilon = 1e-5);
        assert_relative_eq!(p.z, 3.0, epsilon = 1e-5);
        assert_relative_eq!(view.forward().z, -1.0, epsilon = 1e-5);
        assert!(!view.is_orthographic());
    }

    #[test]
    fn config_changes_with_flags_only() {
        let a = view_at(Vec3::ZERO);
        let mut b = view_at(Vec3::ONE);
        assert_eq!(a.config(), b.config());
        b.flags.insert(ViewFlags::NO_SHADOWS);
        assert_ne!(a.config(), b.config());
    }
}
