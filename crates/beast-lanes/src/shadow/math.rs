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

//! Projection, fade and bias math for shadow maps. Everything here is pure.

use super::{CASCADE_FRACTION_FADE, MIN_SHADOW_MAP_SIZE, NUM_CASCADE_SPLITS, SHADOW_MAP_FADE_SIZE};
use beast_core::math::{inv_lerp, saturate, ConvexVolume, Mat4, Sphere, Vec3, EPSILON};
use beast_core::renderer::{LightType, RendererLight, RendererOptions, RendererView};

/// Near plane of spot and radial shadow projections.
pub const SHADOW_NEAR_PLANE: f32 = 0.05;

const DEFAULT_DIRECTIONAL_BIAS: f32 = 0.001;
const DEFAULT_RADIAL_BIAS: f32 = 0.005;
const DEFAULT_SPOT_BIAS: f32 = 0.01;

/// Reference resolution at which spot and radial biases are authored.
const LOCAL_BIAS_RESOLUTION: f32 = 512.0;

/// Cube face forward and up vectors, in layer order +X, -X, +Y, -Y, +Z, -Z.
const CUBE_FACES: [(Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::NEG_Y),
    (Vec3::NEG_X, Vec3::NEG_Y),
    (Vec3::Y, Vec3::Z),
    (Vec3::NEG_Y, Vec3::NEG_Z),
    (Vec3::Z, Vec3::NEG_Y),
    (Vec3::NEG_Z, Vec3::NEG_Y),
];

/// Approximate height in pixels of `bounds` when seen from `view`.
///
/// A camera inside the sphere gets `f32::MAX`.
pub fn projected_size(view: &RendererView, bounds: &Sphere) -> f32 {
    let viewport_h = view.height() as f32;
    let p11 = view.projection.y_axis.y;
    if view.is_orthographic() {
        return bounds.radius * p11 * viewport_h * 0.5;
    }

    let distance = view.position().distance(bounds.center);
    if distance <= bounds.radius {
        return f32::MAX;
    }
    bounds.radius * p11 / distance * viewport_h
}

/// Shadow map size for a light covering `bounds` in `view`, clamped to
/// `max_size`.
pub fn shadow_map_size(view: &RendererView, bounds: &Sphere, max_size: u32) -> u32 {
    let size = projected_size(view, bounds).min(max_size as f32);
    (size.max(0.0) as u32).max(1)
}

/// How much of the shadow has faded out, in `[0, 1]`. Maps at
/// `MIN_SHADOW_MAP_SIZE` or smaller are fully faded, maps at
/// `SHADOW_MAP_FADE_SIZE` or larger not at all.
pub fn fade_percent(map_size: f32) -> f32 {
    1.0 - saturate(inv_lerp(
        MIN_SHADOW_MAP_SIZE as f32,
        SHADOW_MAP_FADE_SIZE as f32,
        map_size,
    ))
}

/// Fraction of the shadowed range covered by cascades `0..index`.
pub fn cascade_scale(index: usize, exponent: f32) -> f32 {
    if index == 0 {
        return 0.0;
    }
    let total: f32 = (0..NUM_CASCADE_SPLITS).map(|j| exponent.powi(j as i32)).sum();
    if total <= EPSILON {
        return index as f32 / NUM_CASCADE_SPLITS as f32;
    }
    let partial: f32 = (0..index.min(NUM_CASCADE_SPLITS))
        .map(|j| exponent.powi(j as i32))
        .sum();
    partial / total
}

/// View-space distances bounding each cascade, `near` first.
pub fn cascade_splits(near: f32, far: f32, options: &RendererOptions) -> [f32; NUM_CASCADE_SPLITS + 1] {
    let far = far.clamp(near, near + options.shadow_draw_distance.max(0.0));
    let mut splits = [0.0; NUM_CASCADE_SPLITS + 1];
    for (i, split) in splits.iter_mut().enumerate() {
        *split = near + (far - near) * cascade_scale(i, options.cascade_distribution_exponent);
    }
    splits
}

/// World-space corners of the part of the view frustum between the
/// view-space distances `near` and `far`.
pub fn sub_frustum_corners(view: &RendererView, near: f32, far: f32) -> [Vec3; 8] {
    let inv_view = view.view.inverse();
    let p00 = view.projection.x_axis.x;
    let p11 = view.projection.y_axis.y;

    let mut corners = [Vec3::ZERO; 8];
    for (slice, depth) in [near, far].into_iter().enumerate() {
        let (half_w, half_h) = if view.is_orthographic() {
            (1.0 / p00, 1.0 / p11)
        } else {
            (depth / p00, depth / p11)
        };
        // Off-center projections shift the slice.
        let offset = if view.is_orthographic() {
            Vec3::new(-view.projection.w_axis.x / p00, -view.projection.w_axis.y / p11, 0.0)
        } else {
            Vec3::new(view.projection.z_axis.x / p00, view.projection.z_axis.y / p11, 0.0) * depth
        };

        for (i, (sx, sy)) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)].into_iter().enumerate() {
            let local = Vec3::new(sx * half_w, sy * half_h, -depth) + offset;
            corners[slice * 4 + i] = inv_view.transform_point3(local);
        }
    }
    corners
}

fn light_up_vector(direction: Vec3) -> Vec3 {
    if direction.dot(Vec3::Y).abs() > 0.99 {
        Vec3::Z
    } else {
        Vec3::Y
    }
}

/// Orthographic shadow volume of one cascade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeProjection {
    pub view_proj: Mat4,
    /// Radius of the sphere bounding the sub-frustum.
    pub radius: f32,
    pub depth_range: f32,
}

/// Fits an orthographic projection along `direction` around `bounds`.
///
/// The near plane is pulled towards the light until every caster that can
/// throw a shadow into the sphere is in range. The result is snapped to
/// whole texels of a `map_size` map so it does not shimmer as the camera
/// moves.
pub fn cascade_projection(bounds: &Sphere, direction: Vec3, map_size: u32, casters: &[Sphere]) -> CascadeProjection {
    let direction = direction.normalize_or(Vec3::NEG_Z);
    let radius = (bounds.radius * 16.0).ceil() / 16.0;
    let radius = radius.max(EPSILON);

    let mut pull_back = 0.0f32;
    for caster in casters {
        let to_caster = caster.center - bounds.center;
        let along = to_caster.dot(direction);
        let lateral = (to_caster - direction * along).length();
        if lateral > radius + caster.radius {
            continue;
        }
        pull_back = pull_back.max(-along + caster.radius - radius);
    }

    let eye = bounds.center - direction * (radius + pull_back);
    let view = Mat4::look_at_rh(eye, bounds.center, light_up_vector(direction));
    let depth_range = 2.0 * radius + pull_back;
    let proj = Mat4::orthographic_rh(-radius, radius, -radius, radius, 0.0, depth_range);

    let view_proj = proj * view;
    let texel = 2.0 / map_size.max(1) as f32;
    let origin = view_proj.project_point3(Vec3::ZERO);
    let snapped_x = (origin.x / texel).round() * texel;
    let snapped_y = (origin.y / texel).round() * texel;
    let snap = Mat4::from_translation(Vec3::new(snapped_x - origin.x, snapped_y - origin.y, 0.0));

    CascadeProjection {
        view_proj: snap * view_proj,
        radius,
        depth_range,
    }
}

/// Perspective shadow projection of a spot light and its depth range.
pub fn spot_view_proj(light: &RendererLight) -> (Mat4, f32) {
    let far = light.attenuation_radius.max(SHADOW_NEAR_PLANE * 2.0);
    let fov = light.spot_angle.clamp(0.01, std::f32::consts::PI - 0.01);
    let direction = light.direction.normalize_or(Vec3::NEG_Z);
    let view = Mat4::look_at_rh(light.position, light.position + direction, light_up_vector(direction));
    let proj = Mat4::perspective_rh(fov, 1.0, SHADOW_NEAR_PLANE, far);
    (proj * view, far - SHADOW_NEAR_PLANE)
}

/// View-projection of each cube face of a radial light, in layer order.
pub fn cube_face_view_projs(light: &RendererLight) -> ([Mat4; 6], f32) {
    let far = light.attenuation_radius.max(SHADOW_NEAR_PLANE * 2.0);
    // Right-handed face cameras come out mirrored against the cube sampling
    // convention; flipping y restores it.
    let proj = Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0))
        * Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, SHADOW_NEAR_PLANE, far);
    let faces = CUBE_FACES.map(|(forward, up)| proj * Mat4::look_at_rh(light.position, light.position + forward, up));
    (faces, far - SHADOW_NEAR_PLANE)
}

/// Depth bias applied when rendering and sampling the map.
pub fn depth_bias(light: &RendererLight, map_size: u32, radius: f32, depth_range: f32) -> f32 {
    let map_size = map_size.max(1) as f32;
    let (default_bias, resolution_scale, range_scale) = match light.light_type {
        LightType::Directional => (DEFAULT_DIRECTIONAL_BIAS, radius / map_size, 1.0),
        LightType::Radial => (DEFAULT_RADIAL_BIAS, LOCAL_BIAS_RESOLUTION / map_size, 1.0),
        LightType::Spot => (
            DEFAULT_SPOT_BIAS,
            LOCAL_BIAS_RESOLUTION / map_size,
            1.0 / depth_range.max(EPSILON),
        ),
    };
    default_bias * light.shadow_bias * resolution_scale * range_scale
}

/// Scale of the occluder-receiver distance over which the shadow fades in.
pub fn fade_transition(light: &RendererLight, map_size: u32, radius: f32, depth_range: f32) -> f32 {
    match light.light_type {
        LightType::Directional => {
            light.shadow_bias * 5e7 / depth_range.max(EPSILON) / map_size.max(1) as f32 * radius
        }
        _ => light.shadow_bias.abs() * 1000.0,
    }
}

/// View-space depths over which cascade `index` blends into the next one.
pub fn cascade_fade_range(splits: &[f32; NUM_CASCADE_SPLITS + 1], index: usize) -> f32 {
    let start = splits[index];
    let end = splits[(index + 1).min(NUM_CASCADE_SPLITS)];
    (end - start) * CASCADE_FRACTION_FADE
}

/// Whether a caster with bounds `caster` can throw a shadow into the
/// volume of a directional or spot shadow map.
pub fn caster_in_frustum(view_proj: &Mat4, caster: &Sphere) -> bool {
    ConvexVolume::from_view_projection(view_proj).intersects_sphere(caster)
}

/// Directional cascades do not limit depth towards the light; only the side
/// planes and the far plane reject casters.
pub fn caster_in_cascade(view_proj: &Mat4, caster: &Sphere) -> bool {
    let mut volume = ConvexVolume::from_view_projection(view_proj);
    if volume.planes.len() > 4 {
        volume.planes.remove(4);
    }
    volume.intersects_sphere(caster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use beast_core::math::{LinearRgba, Rect2I};
    use beast_core::renderer::api::{SampleCount, TextureFormat, TextureViewId};
    use beast_core::renderer::{ViewFlags, ViewId};

    fn camera(position: Vec3, target: Vec3) -> RendererView {
        RendererView {
            id: ViewId(0),
            view: Mat4::look_at_rh(position, target, Vec3::Y),
            projection: Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 500.0),
            near: 0.1,
            far: 500.0,
            viewport: Rect2I::new(0, 0, 1024, 1024),
            sample_count: SampleCount::X1,
            target: TextureViewId(0),
            target_format: TextureFormat::Rgba8UnormSrgb,
            flags: ViewFlags::EMPTY,
        }
    }

    #[test]
    fn fade_is_monotonic_in_map_size() {
        let mut last = f32::MAX;
        for size in (0..200).map(|s| s as f32) {
            let fade = fade_percent(size);
            assert!(fade <= last);
            last = fade;
        }
        assert_relative_eq!(fade_percent(32.0), 1.0);
        assert_relative_eq!(fade_percent(48.0), 0.5);
        assert_relative_eq!(fade_percent(64.0), 0.0);
    }

    #[test]
    fn farther_lights_get_smaller_maps() {
        let bounds = Sphere::new(Vec3::new(0.0, 0.0, -20.0), 5.0);
        let near = camera(Vec3::ZERO, Vec3::NEG_Z);
        let far = camera(Vec3::new(0.0, 0.0, 200.0), Vec3::NEG_Z);
        assert!(shadow_map_size(&near, &bounds, 2048) > shadow_map_size(&far, &bounds, 2048));
        assert_eq!(shadow_map_size(&near, &Sphere::new(Vec3::ZERO, 1.0), 2048), 2048);
    }

    #[test]
    fn splits_are_increasing_and_bounded() {
        let options = RendererOptions::default();
        let splits = cascade_splits(0.1, 500.0, &options);
        assert_relative_eq!(splits[0], 0.1);
        assert_relative_eq!(splits[NUM_CASCADE_SPLITS], 0.1 + options.shadow_draw_distance, epsilon = 1e-3);
        for pair in splits.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn split_series_uses_exponent() {
        // 1 + 3 + 9 + 27 = 40
        assert_relative_eq!(cascade_scale(1, 3.0), 1.0 / 40.0);
        assert_relative_eq!(cascade_scale(2, 3.0), 4.0 / 40.0);
        assert_relative_eq!(cascade_scale(4, 3.0), 1.0);
        assert_relative_eq!(cascade_scale(2, 1.0), 0.5);
    }

    #[test]
    fn sub_frustum_is_enclosed_by_cascade() {
        let view = camera(Vec3::new(0.0, 2.0, 0.0), Vec3::new(0.0, 2.0, -1.0));
        let corners = sub_frustum_corners(&view, 1.0, 10.0);
        let bounds = Sphere::enclosing(&corners);
        let cascade = cascade_projection(&bounds, Vec3::new(0.3, -1.0, 0.2), 2048, &[]);
        for corner in corners {
            let ndc = cascade.view_proj.project_point3(corner);
            assert!(ndc.x.abs() <= 1.0 + 1e-3 && ndc.y.abs() <= 1.0 + 1e-3);
            assert!((-1e-4..=1.0 + 1e-4).contains(&ndc.z));
        }
    }

    #[test]
    fn casters_behind_the_cascade_pull_the_near_plane_back() {
        let bounds = Sphere::new(Vec3::ZERO, 10.0);
        let tower = Sphere::new(Vec3::new(0.0, 40.0, 0.0), 2.0);
        let plain = cascade_projection(&bounds, Vec3::NEG_Y, 1024, &[]);
        let pulled = cascade_projection(&bounds, Vec3::NEG_Y, 1024, &[tower]);
        assert!(pulled.depth_range > plain.depth_range);
        let ndc = pulled.view_proj.project_point3(tower.center + Vec3::Y * tower.radius);
        assert!(ndc.z >= -1e-4);
    }

    #[test]
    fn cube_faces_look_along_axes() {
        let light = RendererLight::radial(Vec3::new(1.0, 2.0, 3.0), 10.0, LinearRgba::WHITE, 1.0);
        let (faces, range) = cube_face_view_projs(&light);
        for (face, (forward, _)) in faces.iter().zip(CUBE_FACES) {
            let ndc = face.project_point3(light.position + forward * 5.0);
            assert_relative_eq!(ndc.x, 0.0, epsilon = 1e-4);
            assert_relative_eq!(ndc.y, 0.0, epsilon = 1e-4);
        }
        assert_relative_eq!(range, 10.0 - SHADOW_NEAR_PLANE);
    }

    #[test]
    fn bias_scales_with_light_type_and_resolution() {
        let spot = RendererLight::spot(
            Vec3::ZERO,
            Vec3::NEG_Z,
            10.0,
            std::f32::consts::FRAC_PI_2,
            std::f32::consts::FRAC_PI_4,
            LinearRgba::WHITE,
            1.0,
        )
        .with_shadows(1.0);
        assert_relative_eq!(depth_bias(&spot, 512, 10.0, 10.0), 0.001);
        assert_relative_eq!(depth_bias(&spot, 1024, 10.0, 10.0), 0.0005);
        assert_relative_eq!(fade_transition(&spot, 1024, 10.0, 10.0), 1000.0);
    }
}
