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
//! Scene-side descriptions of lights and reflection probes.
//!
//! These are the inputs of the lighting pipeline: the scene hands over one
//! [`RendererLight`] per active light and one [`ReflectionProbe`] per
//! captured probe every frame.

use crate::math::{LinearRgba, Mat4, Quat, Sphere, Vec3};

/// Kind of light source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LightType {
    /// Infinitely distant light with parallel rays.
    Directional,
    /// Point light radiating in every direction.
    Radial,
    /// Cone-shaped light.
    Spot,
}

/// A light as seen by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererLight {
    /// Kind of light.
    pub light_type: LightType,
    /// World-space position. Ignored for directional lights.
    pub position: Vec3,
    /// Normalized world-space direction the light travels in.
    pub direction: Vec3,
    /// Linear color.
    pub color: LinearRgba,
    /// Luminous power (radial, spot) or illuminance (directional).
    pub intensity: f32,
    /// Distance at which the light's contribution reaches zero.
    pub attenuation_radius: f32,
    /// Radius of the emitting surface, for area-light approximation.
    pub source_radius: f32,
    /// Full outer cone angle in radians.
    pub spot_angle: f32,
    /// Full inner cone angle in radians, where falloff starts.
    pub spot_falloff_angle: f32,
    /// Whether the light renders a shadow map.
    pub cast_shadows: bool,
    /// Scale applied to the computed shadow depth bias.
    pub shadow_bias: f32,
}

impl RendererLight {
    /// A directional light.
    pub fn directional(direction: Vec3, color: LinearRgba, intensity: f32) -> Self {
        Self {
            light_type: LightType::Directional,
            position: Vec3::ZERO,
            direction: direction.normalize_or_zero(),
            color,
            intensity,
            attenuation_radius: f32::MAX,
            source_radius: 0.0,
            spot_angle: 0.0,
            spot_falloff_angle: 0.0,
            cast_shadows: false,
            shadow_bias: 0.5,
        }
    }

    /// A radial (point) light.
    pub fn radial(position: Vec3, radius: f32, color: LinearRgba, intensity: f32) -> Self {
        Self {
            light_type: LightType::Radial,
            position,
            direction: Vec3::NEG_Z,
            attenuation_radius: radius,
            ..Self::directional(Vec3::NEG_Z, color, intensity)
        }
    }

    /// A spot light with full outer and inner cone angles in radians.
    pub fn spot(
        position: Vec3,
        direction: Vec3,
        radius: f32,
        spot_angle: f32,
        spot_falloff_angle: f32,
        color: LinearRgba,
        intensity: f32,
    ) -> Self {
        Self {
            light_type: LightType::Spot,
            position,
            direction: direction.normalize_or_zero(),
            attenuation_radius: radius,
            spot_angle,
            spot_falloff_angle: spot_falloff_angle.min(spot_angle),
            ..Self::directional(direction, color, intensity)
        }
    }

    /// Enables shadow casting.
    pub fn with_shadows(mut self, shadow_bias: f32) -> Self {
        self.cast_shadows = true;
        self.shadow_bias = shadow_bias;
        self
    }

    /// Bounding sphere of the lit volume.
    ///
    /// Directional lights return an infinite sphere at the origin.
    pub fn bounds(&self) -> Sphere {
        match self.light_type {
            LightType::Directional => Sphere::new(Vec3::ZERO, f32::MAX),
            LightType::Radial => Sphere::new(self.position, self.attenuation_radius),
            LightType::Spot => {
                let half = self.spot_angle * 0.5;
                let range = self.attenuation_radius;
                if half > std::f32::consts::FRAC_PI_4 {
                    let center = self.position + self.direction * (range * half.cos());
                    Sphere::new(center, range * half.sin())
                } else {
                    let r = range / (2.0 * half.cos());
                    Sphere::new(self.position + self.direction * r, r)
                }
            }
        }
    }
}

/// Shape of a reflection probe's influence volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReflectionProbeType {
    /// Spherical influence.
    Sphere,
    /// Oriented box influence with parallax correction.
    Box,
}

/// A captured reflection probe.
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectionProbe {
    /// Influence shape.
    pub probe_type: ReflectionProbeType,
    /// World-space center.
    pub position: Vec3,
    /// Radius of a spherical probe.
    pub radius: f32,
    /// Half extents of a box probe.
    pub extents: Vec3,
    /// Orientation of a box probe.
    pub rotation: Quat,
    /// Distance over which the probe fades into the ones below it.
    pub transition_distance: f32,
    /// Slice of the probe in the reflection cubemap array.
    pub cubemap_idx: u32,
}

impl ReflectionProbe {
    /// A spherical probe.
    pub fn sphere(position: Vec3, radius: f32, cubemap_idx: u32) -> Self {
        Self {
            probe_type: ReflectionProbeType::Sphere,
            position,
            radius,
            extents: Vec3::splat(radius),
            rotation: Quat::IDENTITY,
            transition_distance: 0.1,
            cubemap_idx,
        }
    }

    /// A box probe.
    pub fn oriented_box(position: Vec3, extents: Vec3, rotation: Quat, cubemap_idx: u32) -> Self {
        Self {
            probe_type: ReflectionProbeType::Box,
            position,
            radius: extents.length(),
            extents,
            rotation,
            transition_distance: 0.1,
            cubemap_idx,
        }
    }

    /// Bounding sphere of the influence volume.
    pub fn bounds(&self) -> Sphere {
        match self.probe_type {
            ReflectionProbeType::Sphere => Sphere::new(self.position, self.radius),
            ReflectionProbeType::Box => Sphere::new(self.position, self.extents.length()),
        }
    }

    /// Maps world space into the box's unit cube.
    pub fn inv_box_transform(&self) -> Mat4 {
        let world = Mat4::from_scale_rotation_translation(
            self.extents.max(Vec3::splat(f32::EPSILON)),
            self.rotation,
            self.position,
        );
        world.inverse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn narrow_spot_bounds_enclose_cone_tip_and_cap() {
        let light = RendererLight::spot(
            Vec3::ZERO,
            Vec3::NEG_Z,
            10.0,
            30f32.to_radians(),
            20f32.to_radians(),
            LinearRgba::WHITE,
            100.0,
        );
        let bounds = light.bounds();
        let half = light.spot_angle * 0.5;
        let cap_edge = Vec3::new(10.0 * half.sin(), 0.0, -10.0 * half.cos());
        assert!(bounds.center.distance(Vec3::ZERO) <= bounds.radius + 1e-4);
        assert!(bounds.center.distance(cap_edge) <= bounds.radius + 1e-4);
        assert!(bounds.radius < 10.0);
    }

    #[test]
    fn inverse_box_transform_maps_corner_to_unit() {
        let probe = ReflectionProbe::oriented_box(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(2.0, 4.0, 8.0),
            Quat::IDENTITY,
            0,
        );
        let local = probe.inv_box_transform().transform_point3(Vec3::new(3.0, 6.0, 11.0));
        assert_relative_eq!(local.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(local.y, 1.0, epsilon = 1e-5);
        assert_relative_eq!(local.z, 1.0, epsilon = 1e-5);
    }
}
