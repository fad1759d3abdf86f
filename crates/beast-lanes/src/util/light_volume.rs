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

//! Meshes bounding the lit volume of radial and spot lights.
//!
//! Both meshes are unit sized and circumscribe the shape they approximate,
//! so a light's volume is never smaller than the light.

use beast_core::math::{Mat4, Quat, Vec3};
use beast_core::renderer::api::{BufferId, BufferUsage, IndexFormat};
use beast_core::renderer::error::ResourceError;
use beast_core::renderer::{GraphicsDevice, LightType, RendererLight, RendererView};
use std::f32::consts::PI;

const SPHERE_RINGS: u32 = 12;
const SPHERE_SEGMENTS: u32 = 16;
const CONE_SEGMENTS: u32 = 16;
/// Widest spot half angle a cone volume is built for.
const MAX_CONE_HALF_ANGLE: f32 = 89.0 * PI / 180.0;

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeMesh {
    pub positions: Vec<[f32; 3]>,
    pub indices: Vec<u16>,
}

/// Unit sphere with `rings` latitude bands and `segments` longitude bands.
pub fn sphere_mesh(rings: u32, segments: u32) -> VolumeMesh {
    let rings = rings.max(2);
    let segments = segments.max(3);
    let inflate = 1.0 / ((PI / segments as f32).cos() * (PI / (2 * rings) as f32).cos());

    let mut positions = Vec::with_capacity(((rings + 1) * segments) as usize);
    for ring in 0..=rings {
        let theta = PI * ring as f32 / rings as f32;
        for segment in 0..segments {
            let phi = 2.0 * PI * segment as f32 / segments as f32;
            let p = Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin());
            positions.push((p * inflate).to_array());
        }
    }

    let mut indices = Vec::with_capacity((rings * segments * 6) as usize);
    for ring in 0..rings {
        for segment in 0..segments {
            let next = (segment + 1) % segments;
            let a = (ring * segments + segment) as u16;
            let b = (ring * segments + next) as u16;
            let c = ((ring + 1) * segments + segment) as u16;
            let d = ((ring + 1) * segments + next) as u16;
            indices.extend_from_slice(&[a, b, c, b, d, c]);
        }
    }
    VolumeMesh { positions, indices }
}

/// Unit cone with its apex at the origin and its base disc of radius 1 at
/// `z = -1`.
pub fn cone_mesh(segments: u32) -> VolumeMesh {
    let segments = segments.max(3);
    let inflate = 1.0 / (PI / segments as f32).cos();

    let mut positions = vec![[0.0, 0.0, 0.0], [0.0, 0.0, -1.0]];
    for segment in 0..segments {
        let phi = 2.0 * PI * segment as f32 / segments as f32;
        positions.push([phi.cos() * inflate, phi.sin() * inflate, -1.0]);
    }

    let mut indices = Vec::with_capacity((segments * 6) as usize);
    for segment in 0..segments {
        let a = (2 + segment) as u16;
        let b = (2 + (segment + 1) % segments) as u16;
        indices.extend_from_slice(&[0, a, b, 1, b, a]);
    }
    VolumeMesh { positions, indices }
}

/// World transform of the unit volume mesh of `light`.
///
/// Directional lights have no volume and get the identity.
pub fn volume_transform(light: &RendererLight) -> Mat4 {
    match light.light_type {
        LightType::Directional => Mat4::IDENTITY,
        LightType::Radial => Mat4::from_scale_rotation_translation(
            Vec3::splat(light.attenuation_radius),
            Quat::IDENTITY,
            light.position,
        ),
        LightType::Spot => {
            let range = light.attenuation_radius;
            let lateral = range * spot_half_angle(light).tan();
            let rotation = Quat::from_rotation_arc(Vec3::NEG_Z, light.direction.normalize_or(Vec3::NEG_Z));
            Mat4::from_scale_rotation_translation(
                Vec3::new(lateral, lateral, range),
                rotation,
                light.position,
            )
        }
    }
}

fn spot_half_angle(light: &RendererLight) -> f32 {
    (light.spot_angle * 0.5).clamp(0.0, MAX_CONE_HALF_ANGLE)
}

/// Distance from the camera to the far corners of its near plane.
pub fn near_plane_margin(view: &RendererView) -> f32 {
    if view.is_orthographic() {
        return view.near;
    }
    let x = 1.0 / view.projection.x_axis.x.abs().max(f32::EPSILON);
    let y = 1.0 / view.projection.y_axis.y.abs().max(f32::EPSILON);
    view.near * (1.0 + x * x + y * y).sqrt()
}

/// Whether `camera` is inside the light's volume, or close enough that the
/// near plane may clip it.
pub fn is_camera_inside(light: &RendererLight, camera: Vec3, margin: f32) -> bool {
    match light.light_type {
        LightType::Directional => true,
        LightType::Radial => camera.distance(light.position) <= light.attenuation_radius + margin,
        LightType::Spot => {
            let to_camera = camera - light.position;
            if to_camera.length() <= margin {
                return true;
            }
            let axis = light.direction.normalize_or(Vec3::NEG_Z);
            let along = to_camera.dot(axis);
            if along < -margin || along > light.attenuation_radius + margin {
                return false;
            }
            let lateral = (to_camera - axis * along).length();
            lateral <= along.max(0.0) * spot_half_angle(light).tan() + margin
        }
    }
}

/// A volume mesh uploaded to the GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuVolumeMesh {
    pub vertex_buffer: BufferId,
    pub index_buffer: BufferId,
    pub index_count: u32,
}

impl GpuVolumeMesh {
    pub const INDEX_FORMAT: IndexFormat = IndexFormat::Uint16;
    pub const VERTEX_STRIDE: u64 = 12;

    fn upload(device: &dyn GraphicsDevice, mesh: &VolumeMesh, label: &str) -> Result<Self, ResourceError> {
        let vertex_buffer = device.create_buffer_with_data(
            &beast_core::renderer::api::BufferDescriptor {
                label: Some(format!("{label} Vertices").into()),
                size: (mesh.positions.len() * 12) as u64,
                usage: BufferUsage::VERTEX,
                mapped_at_creation: false,
            },
            bytemuck::cast_slice(&mesh.positions),
        )?;
        // Index data is padded to a multiple of four bytes.
        let mut indices = mesh.indices.clone();
        if indices.len() % 2 == 1 {
            indices.push(0);
        }
        let index_buffer = device.create_buffer_with_data(
            &beast_core::renderer::api::BufferDescriptor {
                label: Some(format!("{label} Indices").into()),
                size: (indices.len() * 2) as u64,
                usage: BufferUsage::INDEX,
                mapped_at_creation: false,
            },
            bytemuck::cast_slice(&indices),
        )?;
        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
        })
    }

    fn destroy(&self, device: &dyn GraphicsDevice) {
        for buffer in [self.vertex_buffer, self.index_buffer] {
            if let Err(e) = device.destroy_buffer(buffer) {
                log::warn!("Failed to destroy light volume buffer: {:?}", e);
            }
        }
    }
}

/// Sphere and cone meshes shared by the stencil, projection and lighting
/// passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightVolumes {
    pub sphere: GpuVolumeMesh,
    pub cone: GpuVolumeMesh,
}

impl LightVolumes {
    pub fn new(device: &dyn GraphicsDevice) -> Result<Self, ResourceError> {
        Ok(Self {
            sphere: GpuVolumeMesh::upload(
                device,
                &sphere_mesh(SPHERE_RINGS, SPHERE_SEGMENTS),
                "Light Sphere",
            )?,
            cone: GpuVolumeMesh::upload(device, &cone_mesh(CONE_SEGMENTS), "Light Cone")?,
        })
    }

    /// Mesh of a radial or spot light.
    pub fn mesh_for(&self, light_type: LightType) -> Option<&GpuVolumeMesh> {
        match light_type {
            LightType::Directional => None,
            LightType::Radial => Some(&self.sphere),
            LightType::Spot => Some(&self.cone),
        }
    }

    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        self.sphere.destroy(device);
        self.cone.destroy(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beast_core::math::LinearRgba;

    #[test]
    fn sphere_mesh_circumscribes_the_unit_sphere() {
        let mesh = sphere_mesh(SPHERE_RINGS, SPHERE_SEGMENTS);
        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Vec3::from_array(mesh.positions[i as usize]));
            let centroid = (a + b + c) / 3.0;
            // Degenerate pole triangles collapse to a point on the sphere.
            if (b - a).cross(c - a).length_squared() > 1e-8 {
                let normal = (b - a).cross(c - a).normalize();
                assert!(normal.dot(a).abs() >= 0.9999, "face plane cuts into the sphere");
            }
            assert!(centroid.length() <= 1.2);
        }
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.positions.len()));
    }

    #[test]
    fn cone_mesh_indices_are_valid() {
        let mesh = cone_mesh(CONE_SEGMENTS);
        assert_eq!(mesh.positions.len(), 2 + CONE_SEGMENTS as usize);
        assert_eq!(mesh.indices.len(), CONE_SEGMENTS as usize * 6);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.positions.len()));
    }

    #[test]
    fn spot_volume_points_along_light_direction() {
        let light = RendererLight::spot(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::X,
            10.0,
            std::f32::consts::FRAC_PI_2,
            0.5,
            LinearRgba::WHITE,
            1.0,
        );
        let transform = volume_transform(&light);
        let base_center = transform.transform_point3(Vec3::new(0.0, 0.0, -1.0));
        assert!(base_center.abs_diff_eq(Vec3::new(11.0, 2.0, 3.0), 1e-4));
        assert!(transform.transform_point3(Vec3::ZERO).abs_diff_eq(light.position, 1e-5));
    }

    #[test]
    fn camera_inside_checks() {
        let radial = RendererLight::radial(Vec3::ZERO, 5.0, LinearRgba::WHITE, 1.0);
        assert!(is_camera_inside(&radial, Vec3::new(0.0, 0.0, 4.0), 0.1));
        assert!(!is_camera_inside(&radial, Vec3::new(0.0, 0.0, 6.0), 0.1));

        let spot = RendererLight::spot(
            Vec3::ZERO,
            Vec3::NEG_Z,
            10.0,
            std::f32::consts::FRAC_PI_2,
            0.5,
            LinearRgba::WHITE,
            1.0,
        );
        assert!(is_camera_inside(&spot, Vec3::new(0.0, 0.0, -5.0), 0.1));
        assert!(!is_camera_inside(&spot, Vec3::new(0.0, 0.0, 5.0), 0.1));
        assert!(!is_camera_inside(&spot, Vec3::new(9.0, 0.0, -2.0), 0.1));
    }
}
