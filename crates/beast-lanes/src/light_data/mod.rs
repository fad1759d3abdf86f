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

//! GPU light and reflection probe records.
//!
//! Every frame the visible lights and probes are flattened into plain
//! `#[repr(C)]` records whose layout matches the structured buffers read by
//! the light grid and lighting shaders, byte for byte.
//!
//! Lights are grouped by type (directional, radial, spot) and, inside each
//! group, shadow-casting lights come first. The lighting passes rely on this
//! to address a group or its unshadowed tail with an offset and a count.
//! Probes are sorted largest first so smaller probes blend over larger ones.

pub mod visibility;

use crate::util::GrowableBuffer;
use beast_core::renderer::api::{BufferId, BufferUsage};
use beast_core::renderer::error::ResourceError;
use beast_core::renderer::{
    GraphicsDevice, LightType, ReflectionProbe, ReflectionProbeType, RendererLight, RendererView,
    SceneFrame,
};
use bytemuck::{Pod, Zeroable};
use std::f32::consts::PI;

/// One light as read by shaders.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightData {
    pub position: [f32; 3],
    pub bounds_radius: f32,
    pub direction: [f32; 3],
    pub luminance: f32,
    /// Outer angle, cosine of the outer half angle, and the reciprocal of
    /// the cosine difference between inner and outer half angles.
    pub spot_angles: [f32; 3],
    pub att_radius_sqrd_inv: f32,
    pub color: [f32; 3],
    pub src_radius: f32,
    /// Spot position moved back so the cone apex covers the source disc.
    pub shifted_light_position: [f32; 3],
    pub padding: f32,
}

impl LightData {
    pub fn from_light(light: &RendererLight) -> Self {
        let luminance = match light.light_type {
            LightType::Directional => light.intensity,
            LightType::Radial => light.intensity / (4.0 * PI),
            LightType::Spot => light.intensity / PI,
        };

        let (bounds_radius, att_radius_sqrd_inv) = match light.light_type {
            LightType::Directional => (0.0, 0.0),
            _ => {
                let radius = light.attenuation_radius.max(f32::EPSILON);
                (radius, 1.0 / (radius * radius))
            }
        };

        let outer_half = light.spot_angle * 0.5;
        let inner_half = light.spot_falloff_angle.min(light.spot_angle) * 0.5;
        let cos_outer = outer_half.cos();
        let cos_inner = inner_half.cos();
        let spot_angles = [
            light.spot_angle,
            cos_outer,
            1.0 / (cos_inner - cos_outer).max(1e-4),
        ];

        let shifted = if light.light_type == LightType::Spot && light.source_radius > 0.0 {
            let tan_half = outer_half.tan().max(1e-4);
            light.position - light.direction * (light.source_radius / tan_half)
        } else {
            light.position
        };

        Self {
            position: light.position.to_array(),
            bounds_radius,
            direction: light.direction.to_array(),
            luminance,
            spot_angles,
            att_radius_sqrd_inv,
            color: light.color.rgb_vec().to_array(),
            src_radius: light.source_radius,
            shifted_light_position: shifted.to_array(),
            padding: 0.0,
        }
    }
}

/// One reflection probe as read by shaders.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ReflProbeData {
    pub position: [f32; 3],
    pub radius: f32,
    pub box_extents: [f32; 3],
    pub transition_distance: f32,
    pub inv_box_transform: [[f32; 4]; 4],
    pub cubemap_idx: u32,
    /// 0 for sphere probes, 1 for box probes.
    pub probe_type: u32,
    pub padding: [u32; 2],
}

impl ReflProbeData {
    pub fn from_probe(probe: &ReflectionProbe) -> Self {
        Self {
            position: probe.position.to_array(),
            radius: probe.radius,
            box_extents: probe.extents.to_array(),
            transition_distance: probe.transition_distance,
            inv_box_transform: probe.inv_box_transform().to_cols_array_2d(),
            cubemap_idx: probe.cubemap_idx,
            probe_type: match probe.probe_type {
                ReflectionProbeType::Sphere => 0,
                ReflectionProbeType::Box => 1,
            },
            padding: [0; 2],
        }
    }
}

fn type_slot(light_type: LightType) -> usize {
    match light_type {
        LightType::Directional => 0,
        LightType::Radial => 1,
        LightType::Spot => 2,
    }
}

/// Visible lights of one frame, ordered for the GPU.
#[derive(Debug, Clone, Default)]
pub struct VisibleLightData {
    data: Vec<LightData>,
    scene_indices: Vec<usize>,
    counts: [u32; 3],
    shadowed_counts: [u32; 3],
}

impl VisibleLightData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the list from the scene lights marked visible.
    pub fn update(&mut self, lights: &[RendererLight], visible: &[bool]) {
        let mut order: Vec<usize> = lights
            .iter()
            .enumerate()
            .filter(|(i, _)| visible.get(*i).copied().unwrap_or(false))
            .map(|(i, _)| i)
            .collect();
        order.sort_by_key(|&i| (type_slot(lights[i].light_type), !lights[i].cast_shadows));

        self.counts = [0; 3];
        self.shadowed_counts = [0; 3];
        for &i in &order {
            let slot = type_slot(lights[i].light_type);
            self.counts[slot] += 1;
            if lights[i].cast_shadows {
                self.shadowed_counts[slot] += 1;
            }
        }

        self.data = order.iter().map(|&i| LightData::from_light(&lights[i])).collect();
        self.scene_indices = order;
    }

    /// Flattened records, directional then radial then spot.
    pub fn data(&self) -> &[LightData] {
        &self.data
    }

    /// Scene index of each record in [`Self::data`].
    pub fn scene_indices(&self) -> &[usize] {
        &self.scene_indices
    }

    /// Position of a scene light in the flattened list.
    pub fn gpu_index_of(&self, scene_index: usize) -> Option<usize> {
        self.scene_indices.iter().position(|&i| i == scene_index)
    }

    pub fn num_lights(&self, light_type: LightType) -> u32 {
        self.counts[type_slot(light_type)]
    }

    pub fn num_shadowed_lights(&self, light_type: LightType) -> u32 {
        self.shadowed_counts[type_slot(light_type)]
    }

    pub fn num_unshadowed_lights(&self, light_type: LightType) -> u32 {
        let slot = type_slot(light_type);
        self.counts[slot] - self.shadowed_counts[slot]
    }

    /// Index of the first record of a type.
    pub fn offset(&self, light_type: LightType) -> u32 {
        self.counts[..type_slot(light_type)].iter().sum()
    }

    pub fn total(&self) -> u32 {
        self.data.len() as u32
    }

    /// Counts of (directional, radial, spot) lights.
    pub fn counts(&self) -> [u32; 3] {
        self.counts
    }
}

/// Visible reflection probes of one frame, largest first.
#[derive(Debug, Clone, Default)]
pub struct VisibleReflProbeData {
    data: Vec<ReflProbeData>,
    scene_indices: Vec<usize>,
}

impl VisibleReflProbeData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, probes: &[ReflectionProbe], visible: &[bool]) {
        let mut order: Vec<usize> = (0..probes.len())
            .filter(|&i| visible.get(i).copied().unwrap_or(false))
            .collect();
        order.sort_by(|&a, &b| probes[b].radius.total_cmp(&probes[a].radius));

        self.data = order.iter().map(|&i| ReflProbeData::from_probe(&probes[i])).collect();
        self.scene_indices = order;
    }

    pub fn data(&self) -> &[ReflProbeData] {
        &self.data
    }

    pub fn scene_indices(&self) -> &[usize] {
        &self.scene_indices
    }

    pub fn len(&self) -> u32 {
        self.data.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Structured buffer holding the frame's [`LightData`] records.
#[derive(Debug)]
pub struct GpuLightData {
    buffer: GrowableBuffer,
}

impl Default for GpuLightData {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuLightData {
    pub fn new() -> Self {
        Self {
            buffer: GrowableBuffer::new(
                std::mem::size_of::<LightData>() as u64,
                BufferUsage::STORAGE | BufferUsage::COPY_DST,
                "Light Data Buffer",
            ),
        }
    }

    /// Uploads the visible lights, growing the buffer when needed.
    pub fn update(&mut self, device: &dyn GraphicsDevice, lights: &VisibleLightData) -> Result<(), ResourceError> {
        self.buffer.write(device, bytemuck::cast_slice(lights.data()))?;
        Ok(())
    }

    pub fn buffer(&self) -> Option<BufferId> {
        self.buffer.buffer()
    }

    pub fn generation(&self) -> u64 {
        self.buffer.generation()
    }

    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        self.buffer.destroy(device);
    }
}

/// Structured buffer holding the frame's [`ReflProbeData`] records.
#[derive(Debug)]
pub struct GpuReflProbeData {
    buffer: GrowableBuffer,
}

impl Default for GpuReflProbeData {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuReflProbeData {
    pub fn new() -> Self {
        Self {
            buffer: GrowableBuffer::new(
                std::mem::size_of::<ReflProbeData>() as u64,
                BufferUsage::STORAGE | BufferUsage::COPY_DST,
                "Reflection Probe Buffer",
            ),
        }
    }

    pub fn update(&mut self, device: &dyn GraphicsDevice, probes: &VisibleReflProbeData) -> Result<(), ResourceError> {
        self.buffer.write(device, bytemuck::cast_slice(probes.data()))?;
        Ok(())
    }

    pub fn buffer(&self) -> Option<BufferId> {
        self.buffer.buffer()
    }

    pub fn generation(&self) -> u64 {
        self.buffer.generation()
    }

    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        self.buffer.destroy(device);
    }
}

/// Everything the frame knows about lights and probes: visibility, the
/// flattened visible lists and their GPU buffers.
#[derive(Debug, Default)]
pub struct SceneLighting {
    pub light_visibility: visibility::Visibility,
    pub probe_visibility: visibility::Visibility,
    pub visible_lights: VisibleLightData,
    pub visible_probes: VisibleReflProbeData,
    pub gpu_lights: GpuLightData,
    pub gpu_probes: GpuReflProbeData,
}

impl SceneLighting {
    pub fn new() -> Self {
        Self::default()
    }

    /// Culls, sorts and uploads the scene's lights and probes for `views`.
    pub fn update(
        &mut self,
        device: &dyn GraphicsDevice,
        scene: &SceneFrame,
        views: &[RendererView],
    ) -> Result<(), ResourceError> {
        self.light_visibility = visibility::compute_light_visibility(views, &scene.lights);
        self.probe_visibility = visibility::compute_probe_visibility(views, &scene.probes);
        self.visible_lights.update(&scene.lights, &self.light_visibility.any);
        self.visible_probes.update(&scene.probes, &self.probe_visibility.any);
        self.gpu_lights.update(device, &self.visible_lights)?;
        self.gpu_probes.update(device, &self.visible_probes)?;
        log::trace!(
            "Visible lights {:?}, probes {}",
            self.visible_lights.counts(),
            self.visible_probes.len()
        );
        Ok(())
    }

    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        self.gpu_lights.destroy(device);
        self.gpu_probes.destroy(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use beast_core::math::{LinearRgba, Quat, Vec3};

    #[test]
    fn gpu_record_sizes_match_shader_layout() {
        assert_eq!(std::mem::size_of::<LightData>(), 80);
        assert_eq!(std::mem::size_of::<ReflProbeData>(), 112);
    }

    #[test]
    fn lights_are_grouped_by_type_with_shadowed_first() {
        let white = LinearRgba::WHITE;
        let lights = vec![
            RendererLight::spot(Vec3::ZERO, Vec3::NEG_Z, 5.0, 1.0, 0.5, white, 10.0),
            RendererLight::radial(Vec3::X, 3.0, white, 10.0),
            RendererLight::directional(Vec3::NEG_Y, white, 1.0),
            RendererLight::radial(Vec3::Y, 3.0, white, 10.0).with_shadows(0.5),
            RendererLight::spot(Vec3::ONE, Vec3::NEG_Z, 5.0, 1.0, 0.5, white, 10.0).with_shadows(0.5),
        ];
        let mut visible = VisibleLightData::new();
        visible.update(&lights, &[true; 5]);

        assert_eq!(visible.scene_indices(), &[2, 3, 1, 4, 0]);
        assert_eq!(visible.counts(), [1, 2, 2]);
        assert_eq!(visible.num_shadowed_lights(LightType::Radial), 1);
        assert_eq!(visible.num_unshadowed_lights(LightType::Spot), 1);
        assert_eq!(visible.offset(LightType::Radial), 1);
        assert_eq!(visible.offset(LightType::Spot), 3);
        assert_eq!(visible.gpu_index_of(4), Some(3));
    }

    #[test]
    fn invisible_lights_are_skipped() {
        let lights = vec![
            RendererLight::radial(Vec3::X, 3.0, LinearRgba::WHITE, 10.0),
            RendererLight::radial(Vec3::Y, 3.0, LinearRgba::WHITE, 10.0),
        ];
        let mut visible = VisibleLightData::new();
        visible.update(&lights, &[false, true]);
        assert_eq!(visible.total(), 1);
        assert_eq!(visible.scene_indices(), &[1]);
    }

    #[test]
    fn luminance_depends_on_light_type() {
        let radial = LightData::from_light(&RendererLight::radial(Vec3::ZERO, 2.0, LinearRgba::WHITE, 4.0 * PI));
        assert_relative_eq!(radial.luminance, 1.0, epsilon = 1e-5);
        assert_relative_eq!(radial.att_radius_sqrd_inv, 0.25, epsilon = 1e-6);

        let spot = LightData::from_light(&RendererLight::spot(
            Vec3::ZERO,
            Vec3::NEG_Z,
            2.0,
            std::f32::consts::FRAC_PI_2,
            std::f32::consts::FRAC_PI_4,
            LinearRgba::WHITE,
            PI,
        ));
        assert_relative_eq!(spot.luminance, 1.0, epsilon = 1e-5);
        assert_relative_eq!(spot.spot_angles[1], (std::f32::consts::FRAC_PI_4).cos(), epsilon = 1e-5);
    }

    #[test]
    fn spot_source_radius_shifts_apex_back() {
        let mut light = RendererLight::spot(
            Vec3::ZERO,
            Vec3::NEG_Z,
            10.0,
            std::f32::consts::FRAC_PI_2,
            0.5,
            LinearRgba::WHITE,
            1.0,
        );
        light.source_radius = 1.0;
        let data = LightData::from_light(&light);
        // tan(45deg) == 1, so the apex moves back by the source radius.
        assert_relative_eq!(data.shifted_light_position[2], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn probes_sort_largest_first() {
        let probes = vec![
            ReflectionProbe::sphere(Vec3::ZERO, 2.0, 0),
            ReflectionProbe::sphere(Vec3::ZERO, 8.0, 1),
            ReflectionProbe::oriented_box(Vec3::ZERO, Vec3::splat(2.0), Quat::IDENTITY, 2),
        ];
        let mut visible = VisibleReflProbeData::new();
        visible.update(&probes, &[true, true, true]);
        assert_eq!(visible.scene_indices(), &[1, 2, 0]);
        assert_eq!(visible.data()[1].probe_type, 1);
    }
}
