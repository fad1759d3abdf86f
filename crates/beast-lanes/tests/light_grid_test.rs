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

use beast_core::math::{LinearRgba, Mat4, Rect2I, Sphere, Vec3};
use beast_core::renderer::api::{SampleCount, TextureFormat, TextureViewId};
use beast_core::renderer::{ReflectionProbe, RendererLight, RendererView, ViewFlags, ViewId};
use beast_lanes::light_data::{ReflProbeData, VisibleLightData};
use beast_lanes::light_grid::{CpuLightGrid, LightGridLayout, MAX_LIGHTS_PER_CELL};

fn camera() -> RendererView {
    RendererView {
        id: ViewId(3),
        view: Mat4::IDENTITY,
        projection: Mat4::perspective_rh(1.0, 1.5, 0.5, 200.0),
        near: 0.5,
        far: 200.0,
        viewport: Rect2I::new(0, 0, 768, 512),
        sample_count: SampleCount::X1,
        target: TextureViewId(0),
        target_format: TextureFormat::Rgba8UnormSrgb,
        flags: ViewFlags::EMPTY,
    }
}

fn build(lights: &[RendererLight], probes: &[ReflectionProbe]) -> (LightGridLayout, CpuLightGrid) {
    let view = camera();
    let layout = LightGridLayout::new(&view);
    let mut visible = VisibleLightData::new();
    visible.update(lights, &vec![true; lights.len()]);
    let probe_data: Vec<ReflProbeData> = probes.iter().map(ReflProbeData::from_probe).collect();
    let grid = layout.build_cell_lists(&view.view, visible.data(), visible.counts(), &probe_data);
    (layout, grid)
}

fn cells_with(grid: &CpuLightGrid, num_cells: u32, index: u32) -> Vec<u32> {
    (0..num_cells)
        .filter(|&cell| grid.lights_in_cell(cell).contains(&index))
        .collect()
}

#[test]
fn radial_light_is_listed_in_exactly_the_cells_it_touches() {
    let light = RendererLight::radial(Vec3::new(1.0, 0.5, -12.0), 2.0, LinearRgba::WHITE, 10.0);
    let (layout, grid) = build(&[light], &[]);

    let mut expected = layout.cells_overlapping_sphere(&Sphere::new(Vec3::new(1.0, 0.5, -12.0), 2.0));
    expected.sort_unstable();
    assert!(!expected.is_empty());
    assert_eq!(cells_with(&grid, layout.num_cells(), 0), expected);
}

#[test]
fn directional_lights_are_never_binned() {
    let lights = [
        RendererLight::directional(Vec3::NEG_Y, LinearRgba::WHITE, 1.0),
        RendererLight::radial(Vec3::new(0.0, 0.0, -8.0), 1.0, LinearRgba::WHITE, 1.0),
    ];
    let (layout, grid) = build(&lights, &[]);
    // Directional records come first in the flattened list.
    assert!(cells_with(&grid, layout.num_cells(), 0).is_empty());
    assert!(!cells_with(&grid, layout.num_cells(), 1).is_empty());
}

#[test]
fn radial_entries_precede_spot_entries_in_a_cell() {
    let position = Vec3::new(0.0, 0.0, -10.0);
    let lights = [
        RendererLight::spot(position, Vec3::NEG_Z, 4.0, 1.2, 1.0, LinearRgba::WHITE, 1.0),
        RendererLight::radial(position, 3.0, LinearRgba::WHITE, 1.0),
    ];
    let (layout, grid) = build(&lights, &[]);

    let shared: Vec<u32> = (0..layout.num_cells())
        .filter(|&cell| grid.lights_in_cell(cell).len() == 2)
        .collect();
    assert!(!shared.is_empty());
    for cell in shared {
        let [_, radial, spot, _] = grid.light_cells[cell as usize];
        assert_eq!((radial, spot), (1, 1));
        // Radial lights sort before spot lights in the flattened list.
        assert_eq!(grid.lights_in_cell(cell), &[0, 1]);
    }
}

#[test]
fn crowded_cells_keep_every_light() {
    let count = MAX_LIGHTS_PER_CELL + 8;
    let lights: Vec<RendererLight> = (0..count)
        .map(|_| RendererLight::radial(Vec3::new(0.0, 0.0, -10.0), 1.0, LinearRgba::WHITE, 1.0))
        .collect();
    let (layout, grid) = build(&lights, &[]);

    for index in 0..count {
        assert!(
            !cells_with(&grid, layout.num_cells(), index).is_empty(),
            "light {index} is missing from every cell"
        );
    }
    let densest = (0..layout.num_cells()).map(|c| grid.lights_in_cell(c).len()).max();
    assert_eq!(densest, Some(count as usize));
}

/// Cell holding a view-space point, from the screen mapping and the
/// quadratic slice distribution of a 768x512 view with a 1.0 rad vertical
/// fov, near 0.5 and far 200.
fn cell_of(point: Vec3) -> u32 {
    let (width, height, near, far) = (768.0_f32, 512.0_f32, 0.5_f32, 200.0_f32);
    let depth = -point.z;
    let tan = (0.5_f32).tan();
    let ndc_x = point.x / (depth * tan * 1.5);
    let ndc_y = point.y / (depth * tan);
    let x = ((ndc_x * 0.5 + 0.5) * width / 64.0).floor() as u32;
    let y = ((0.5 - ndc_y * 0.5) * height / 64.0).floor() as u32;
    let z = (((depth - near) / (far - near)).sqrt() * 32.0).floor() as u32;
    (z.min(31) * 8 + y.min(7)) * 12 + x.min(11)
}

/// View-space point at pixel (`px`, `py`) and view distance `depth`.
fn at_pixel(px: f32, py: f32, depth: f32) -> Vec3 {
    let tan = (0.5_f32).tan();
    let ndc_x = px / 768.0 * 2.0 - 1.0;
    let ndc_y = 1.0 - py / 512.0 * 2.0;
    Vec3::new(ndc_x * depth * tan * 1.5, ndc_y * depth * tan, -depth)
}

#[test]
fn lights_on_cell_and_depth_edges_cover_their_own_cell() {
    let slice_start = |k: f32| 0.5 + 199.5 * (k / 32.0) * (k / 32.0);
    let mut centers = Vec::new();
    for k in [0.0, 1.0, 8.0, 20.0, 31.0] {
        let depth = slice_start(k) * 1.001 + 0.001;
        for column in [0.0, 5.0, 11.0] {
            for row in [0.0, 3.0, 7.0] {
                // Just past the top left corner of the cell.
                centers.push(at_pixel(column * 64.0 + 0.5, row * 64.0 + 0.5, depth));
            }
        }
    }
    centers.push(at_pixel(400.0, 300.0, 0.51));
    centers.push(at_pixel(400.0, 300.0, 199.99));

    let lights: Vec<RendererLight> = centers
        .iter()
        .map(|&center| RendererLight::radial(center, 0.25, LinearRgba::WHITE, 1.0))
        .collect();
    let view = camera();
    let layout = LightGridLayout::new(&view);
    let mut visible = VisibleLightData::new();
    visible.update(&lights, &vec![true; lights.len()]);
    let grid = layout.build_cell_lists(&view.view, visible.data(), visible.counts(), &[]);

    assert_eq!(visible.data().len(), centers.len());
    for (index, record) in visible.data().iter().enumerate() {
        let center = Vec3::from_array(record.position);
        let cell = cell_of(center);
        assert!(
            grid.lights_in_cell(cell).contains(&(index as u32)),
            "light at {center:?} is missing from cell {cell}"
        );
    }
}

#[test]
fn lights_behind_the_camera_touch_nothing() {
    let light = RendererLight::radial(Vec3::new(0.0, 0.0, 20.0), 2.0, LinearRgba::WHITE, 1.0);
    let (_layout, grid) = build(&[light], &[]);
    assert!(grid.light_indices.is_empty());
}

#[test]
fn probes_are_binned_like_lights() {
    let probe = ReflectionProbe::sphere(Vec3::new(-1.0, 0.0, -15.0), 3.0, 0);
    let (layout, grid) = build(&[], &[probe]);
    let mut expected = layout.cells_overlapping_sphere(&Sphere::new(Vec3::new(-1.0, 0.0, -15.0), 3.0));
    expected.sort_unstable();
    let listed: Vec<u32> = (0..layout.num_cells())
        .filter(|&cell| grid.probes_in_cell(cell) == [0])
        .collect();
    assert_eq!(listed, expected);
    assert!(grid.light_indices.is_empty());
}
