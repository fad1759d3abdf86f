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

//! Per-view frustum culling of lights and reflection probes.

use beast_core::math::Sphere;
use beast_core::renderer::{LightType, ReflectionProbe, RendererLight, RendererView};

/// Which items each view can see.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Visibility {
    /// `per_view[v][i]` is set when item `i` is visible from view `v`.
    pub per_view: Vec<Vec<bool>>,
    /// Item is visible from at least one view.
    pub any: Vec<bool>,
}

impl Visibility {
    pub fn is_visible(&self, view: usize, item: usize) -> bool {
        self.per_view
            .get(view)
            .and_then(|v| v.get(item))
            .copied()
            .unwrap_or(false)
    }

    /// Views that see `item`.
    pub fn views_of(&self, item: usize) -> impl Iterator<Item = usize> + '_ {
        self.per_view
            .iter()
            .enumerate()
            .filter(move |(_, v)| v.get(item).copied().unwrap_or(false))
            .map(|(i, _)| i)
    }
}

/// Culls bounding spheres against every view frustum. `None` bounds are
/// visible everywhere.
pub fn compute_visibility(views: &[RendererView], bounds: &[Option<Sphere>]) -> Visibility {
    let frusta: Vec<_> = views.iter().map(|v| v.frustum()).collect();
    let per_view: Vec<Vec<bool>> = frusta
        .iter()
        .map(|frustum| {
            bounds
                .iter()
                .map(|b| b.map_or(true, |sphere| frustum.intersects_sphere(&sphere)))
                .collect()
        })
        .collect();

    let any = (0..bounds.len())
        .map(|i| per_view.iter().any(|v| v[i]))
        .collect();

    Visibility { per_view, any }
}

/// Culls lights. Directional lights are always visible.
pub fn compute_light_visibility(views: &[RendererView], lights: &[RendererLight]) -> Visibility {
    let bounds: Vec<Option<Sphere>> = lights
        .iter()
        .map(|light| match light.light_type {
            LightType::Directional => None,
            _ => Some(light.bounds()),
        })
        .collect();
    compute_visibility(views, &bounds)
}

pub fn compute_probe_visibility(views: &[RendererView], probes: &[ReflectionProbe]) -> Visibility {
    let bounds: Vec<Option<Sphere>> = probes.iter().map(|p| Some(p.bounds())).collect();
    compute_visibility(views, &bounds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use beast_core::math::{LinearRgba, Mat4, Rect2I, Vec3};
    use beast_core::renderer::{SampleCount, TextureFormat, TextureViewId, ViewFlags, ViewId};

    fn view_looking_down_neg_z() -> RendererView {
        RendererView {
            id: ViewId(0),
            view: Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y),
            projection: Mat4::perspective_rh(1.2, 1.0, 0.1, 100.0),
            near: 0.1,
            far: 100.0,
            viewport: Rect2I::new(0, 0, 256, 256),
            sample_count: SampleCount::X1,
            target: TextureViewId(0),
            target_format: TextureFormat::Rgba8UnormSrgb,
            flags: ViewFlags::EMPTY,
        }
    }

    #[test]
    fn lights_behind_the_camera_are_culled() {
        let lights = vec![
            RendererLight::radial(Vec3::new(0.0, 0.0, -10.0), 1.0, LinearRgba::WHITE, 1.0),
            RendererLight::radial(Vec3::new(0.0, 0.0, 10.0), 1.0, LinearRgba::WHITE, 1.0),
            RendererLight::directional(Vec3::Z, LinearRgba::WHITE, 1.0),
        ];
        let visibility = compute_light_visibility(&[view_looking_down_neg_z()], &lights);
        assert_eq!(visibility.any, vec![true, false, true]);
        assert_eq!(visibility.views_of(0).collect::<Vec<_>>(), vec![0]);
        assert!(!visibility.is_visible(0, 1));
    }
}
