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

//! Cell math of the light grid, plus a software build of both passes.
//!
//! The grid covers the view frustum with 64x64 pixel cells in screen space
//! and 32 slices in depth. Slices are spaced quadratically between the near
//! and far planes so cells near the camera stay small:
//!
//! ```text
//! depth(k) = near + (far - near) * k^2 / 32^2
//! ```
//!
//! [`LightGridLayout::build_cell_lists`] produces exactly what the two
//! compute passes produce, and is used on devices without compute support
//! and by tests.

use super::{CELL_XY_SIZE, MAX_LIGHTS_PER_CELL, NUM_Z_SUBDIVIDES};
use crate::light_data::{LightData, ReflProbeData};
use beast_core::math::{div_ceil, Aabb, Mat4, Sphere, UVec3, Vec3, Vec4};
use beast_core::renderer::RendererView;

/// End-of-list marker of the per-cell linked lists.
pub const LIST_END: u32 = u32::MAX;

/// Dimensions and projection of one view's light grid.
#[derive(Debug, Clone, PartialEq)]
pub struct LightGridLayout {
    grid_size: UVec3,
    viewport: (u32, u32),
    near: f32,
    far: f32,
    projection: Mat4,
    inv_projection: Mat4,
}

impl LightGridLayout {
    pub fn new(view: &RendererView) -> Self {
        let (width, height) = (view.width(), view.height());
        let near = view.near.max(f32::EPSILON);
        Self {
            grid_size: UVec3::new(
                div_ceil(width, CELL_XY_SIZE),
                div_ceil(height, CELL_XY_SIZE),
                NUM_Z_SUBDIVIDES,
            ),
            viewport: (width, height),
            near,
            far: view.far.max(near + f32::EPSILON),
            projection: view.projection,
            inv_projection: view.inv_projection(),
        }
    }

    pub fn grid_size(&self) -> UVec3 {
        self.grid_size
    }

    pub fn num_cells(&self) -> u32 {
        self.grid_size.x * self.grid_size.y * self.grid_size.z
    }

    /// Capacity of each node pool and index list. Cells share the pool, so a
    /// single cell may hold any number of entries.
    pub fn max_entries(&self) -> u32 {
        self.num_cells() * MAX_LIGHTS_PER_CELL
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn cell_index(&self, x: u32, y: u32, z: u32) -> u32 {
        (z * self.grid_size.y + y) * self.grid_size.x + x
    }

    /// View distance at which slice `cell_z` starts.
    pub fn view_z_from_cell_z(&self, cell_z: u32) -> f32 {
        let t = cell_z as f32 / NUM_Z_SUBDIVIDES as f32;
        self.near + (self.far - self.near) * t * t
    }

    /// Slice containing view distance `depth`, clamped to the grid.
    pub fn cell_z_from_view_z(&self, depth: f32) -> u32 {
        let z = NUM_Z_SUBDIVIDES as f32;
        let t = ((depth - self.near) * z * z / (self.far - self.near)).max(0.0);
        (t.sqrt().floor() as u32).min(NUM_Z_SUBDIVIDES - 1)
    }

    fn ndc_depth(&self, depth: f32) -> f32 {
        let clip = self.projection * Vec4::new(0.0, 0.0, -depth, 1.0);
        clip.z / clip.w
    }

    /// View-space bounds of a cell.
    pub fn cell_bounds(&self, x: u32, y: u32, z: u32) -> Aabb {
        let (width, height) = (self.viewport.0 as f32, self.viewport.1 as f32);
        let px = [
            (x * CELL_XY_SIZE) as f32,
            (((x + 1) * CELL_XY_SIZE) as f32).min(width),
        ];
        let py = [
            (y * CELL_XY_SIZE) as f32,
            (((y + 1) * CELL_XY_SIZE) as f32).min(height),
        ];

        let mut corners = [Vec3::ZERO; 8];
        let mut n = 0;
        for depth in [self.view_z_from_cell_z(z), self.view_z_from_cell_z(z + 1)] {
            let ndc_z = self.ndc_depth(depth);
            for sx in px {
                for sy in py {
                    let ndc = Vec3::new(sx / width * 2.0 - 1.0, 1.0 - sy / height * 2.0, ndc_z);
                    corners[n] = self.inv_projection.project_point3(ndc);
                    n += 1;
                }
            }
        }
        Aabb::from_points(&corners).unwrap_or(Aabb::from_min_max(Vec3::ZERO, Vec3::ZERO))
    }

    /// Conservative cell range touched by a view-space sphere, inclusive.
    pub fn cell_range(&self, sphere: &Sphere) -> Option<(UVec3, UVec3)> {
        let depth = -sphere.center.z;
        let radius = sphere.radius;
        if depth + radius < self.near || depth - radius > self.far {
            return None;
        }

        let z0 = self.cell_z_from_view_z(depth - radius);
        let z1 = self.cell_z_from_view_z(depth + radius);
        let max_x = self.grid_size.x - 1;
        let max_y = self.grid_size.y - 1;

        if depth - radius <= self.near {
            return Some((UVec3::new(0, 0, z0), UVec3::new(max_x, max_y, z1)));
        }

        let mut ndc_min = Vec3::splat(f32::MAX);
        let mut ndc_max = Vec3::splat(f32::MIN);
        for i in 0..8 {
            let offset = Vec3::new(
                if i & 1 == 0 { -radius } else { radius },
                if i & 2 == 0 { -radius } else { radius },
                if i & 4 == 0 { -radius } else { radius },
            );
            let ndc = self.projection.project_point3(sphere.center + offset);
            ndc_min = ndc_min.min(ndc);
            ndc_max = ndc_max.max(ndc);
        }
        if ndc_max.x < -1.0 || ndc_min.x > 1.0 || ndc_max.y < -1.0 || ndc_min.y > 1.0 {
            return None;
        }

        let (width, height) = (self.viewport.0 as f32, self.viewport.1 as f32);
        let to_cell_x = |ndc: f32| {
            let px = (ndc.clamp(-1.0, 1.0) * 0.5 + 0.5) * width;
            ((px / CELL_XY_SIZE as f32) as u32).min(max_x)
        };
        let to_cell_y = |ndc: f32| {
            let py = (0.5 - ndc.clamp(-1.0, 1.0) * 0.5) * height;
            ((py / CELL_XY_SIZE as f32) as u32).min(max_y)
        };

        Some((
            UVec3::new(to_cell_x(ndc_min.x), to_cell_y(ndc_max.y), z0),
            UVec3::new(to_cell_x(ndc_max.x), to_cell_y(ndc_min.y), z1),
        ))
    }

    /// Cells whose bounds intersect a view-space sphere.
    pub fn cells_overlapping_sphere(&self, sphere: &Sphere) -> Vec<u32> {
        let Some((min, max)) = self.cell_range(sphere) else {
            return Vec::new();
        };

        let mut cells = Vec::new();
        for z in min.z..=max.z {
            for y in min.y..=max.y {
                for x in min.x..=max.x {
                    if self.cell_bounds(x, y, z).intersects_sphere(sphere) {
                        cells.push(self.cell_index(x, y, z));
                    }
                }
            }
        }
        cells
    }

    /// Runs the construction and reduction passes on the CPU.
    ///
    /// `light_counts` holds the number of directional, radial and spot
    /// records at the start of `lights`, in that order. Only radial and
    /// spot lights are binned.
    pub fn build_cell_lists(
        &self,
        view: &Mat4,
        lights: &[LightData],
        light_counts: [u32; 3],
        probes: &[ReflProbeData],
    ) -> CpuLightGrid {
        let local_start = light_counts[0];
        let spot_start = light_counts[0] + light_counts[1];
        let local_end = (spot_start + light_counts[2]).min(lights.len() as u32);

        let light_lists = self.build_lists((local_start..local_end).map(|i| {
            let light = &lights[i as usize];
            (i, view.transform_point3(Vec3::from_array(light.position)), light.bounds_radius)
        }));
        let probe_lists = self.build_lists(probes.iter().enumerate().map(|(i, probe)| {
            (i as u32, view.transform_point3(Vec3::from_array(probe.position)), probe.radius)
        }));

        let num_cells = self.num_cells() as usize;
        let mut grid = CpuLightGrid {
            light_cells: vec![[0; 4]; num_cells],
            light_indices: Vec::new(),
            probe_cells: vec![[0; 4]; num_cells],
            probe_indices: Vec::new(),
        };

        for cell in 0..num_cells {
            let (radial, spot): (Vec<u32>, Vec<u32>) =
                light_lists.walk(cell).partition(|&index| index < spot_start);
            let offset = grid.light_indices.len() as u32;
            grid.light_indices.extend_from_slice(&radial);
            grid.light_indices.extend_from_slice(&spot);
            grid.light_cells[cell] = [offset, radial.len() as u32, spot.len() as u32, 0];

            let offset = grid.probe_indices.len() as u32;
            grid.probe_indices.extend(probe_lists.walk(cell));
            let count = grid.probe_indices.len() as u32 - offset;
            grid.probe_cells[cell] = [offset, count, 0, 0];
        }

        grid
    }

    fn build_lists(&self, items: impl Iterator<Item = (u32, Vec3, f32)>) -> CellLists {
        let mut lists = CellLists {
            heads: vec![LIST_END; self.num_cells() as usize],
            nodes: Vec::new(),
        };
        let capacity = self.max_entries() as usize;

        for (index, center, radius) in items {
            for cell in self.cells_overlapping_sphere(&Sphere::new(center, radius)) {
                if lists.nodes.len() >= capacity {
                    log::warn!("Light grid node pool exhausted, dropping entries");
                    return lists;
                }
                let slot = lists.nodes.len() as u32;
                let next = std::mem::replace(&mut lists.heads[cell as usize], slot);
                lists.nodes.push([index, next]);
            }
        }
        lists
    }
}

struct CellLists {
    heads: Vec<u32>,
    nodes: Vec<[u32; 2]>,
}

impl CellLists {
    fn walk(&self, cell: usize) -> impl Iterator<Item = u32> + '_ {
        let mut node = self.heads[cell];
        std::iter::from_fn(move || {
            let [index, next] = *self.nodes.get(node as usize)?;
            node = next;
            Some(index)
        })
    }
}

/// Output of the grid build: one `[offset, a, b, 0]` entry per cell and the
/// flat index lists they point into.
///
/// Light cells store `(offset, radial_count, spot_count, 0)`, probe cells
/// `(offset, count, 0, 0)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpuLightGrid {
    pub light_cells: Vec<[u32; 4]>,
    pub light_indices: Vec<u32>,
    pub probe_cells: Vec<[u32; 4]>,
    pub probe_indices: Vec<u32>,
}

impl CpuLightGrid {
    /// Radial then spot light indices of a cell.
    pub fn lights_in_cell(&self, cell: u32) -> &[u32] {
        let [offset, radial, spot, _] = self.light_cells[cell as usize];
        &self.light_indices[offset as usize..(offset + radial + spot) as usize]
    }

    pub fn probes_in_cell(&self, cell: u32) -> &[u32] {
        let [offset, count, _, _] = self.probe_cells[cell as usize];
        &self.probe_indices[offset as usize..(offset + count) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use beast_core::math::Rect2I;
    use beast_core::renderer::{SampleCount, TextureFormat, TextureViewId, ViewFlags, ViewId};

    fn view(width: u32, height: u32) -> RendererView {
        RendererView {
            id: ViewId(0),
            view: Mat4::IDENTITY,
            projection: Mat4::perspective_rh(1.0, width as f32 / height as f32, 0.5, 200.0),
            near: 0.5,
            far: 200.0,
            viewport: Rect2I::new(0, 0, width, height),
            sample_count: SampleCount::X1,
            target: TextureViewId(0),
            target_format: TextureFormat::Rgba8UnormSrgb,
            flags: ViewFlags::EMPTY,
        }
    }

    #[test]
    fn grid_size_rounds_up_partial_cells() {
        let layout = LightGridLayout::new(&view(1920, 1080));
        assert_eq!(layout.grid_size(), UVec3::new(30, 17, 32));
        assert_eq!(layout.num_cells(), 30 * 17 * 32);
    }

    #[test]
    fn slices_are_quadratic_and_invertible() {
        let layout = LightGridLayout::new(&view(640, 480));
        assert_relative_eq!(layout.view_z_from_cell_z(0), 0.5);
        assert_relative_eq!(layout.view_z_from_cell_z(32), 200.0, epsilon = 1e-3);
        for k in 0..32 {
            let mid = (layout.view_z_from_cell_z(k) + layout.view_z_from_cell_z(k + 1)) * 0.5;
            assert_eq!(layout.cell_z_from_view_z(mid), k);
        }
        assert_eq!(layout.cell_z_from_view_z(0.0), 0);
        assert_eq!(layout.cell_z_from_view_z(1e6), 31);
    }

    #[test]
    fn cell_bounds_stack_along_depth() {
        let layout = LightGridLayout::new(&view(640, 480));
        let near_cell = layout.cell_bounds(5, 3, 4);
        let far_cell = layout.cell_bounds(5, 3, 5);
        assert!(near_cell.max.z <= -layout.view_z_from_cell_z(4) + 1e-3);
        assert_relative_eq!(near_cell.min.z, far_cell.max.z, epsilon = 1e-3);
    }

    #[test]
    fn sphere_straddling_near_plane_covers_whole_screen() {
        let layout = LightGridLayout::new(&view(640, 480));
        let (min, max) = layout
            .cell_range(&Sphere::new(Vec3::new(0.0, 0.0, -0.4), 1.0))
            .unwrap();
        assert_eq!((min.x, min.y), (0, 0));
        assert_eq!((max.x, max.y), (9, 7));
    }

    #[test]
    fn spheres_outside_depth_range_touch_nothing() {
        let layout = LightGridLayout::new(&view(640, 480));
        assert!(layout.cell_range(&Sphere::new(Vec3::new(0.0, 0.0, 5.0), 1.0)).is_none());
        assert!(layout.cell_range(&Sphere::new(Vec3::new(0.0, 0.0, -300.0), 1.0)).is_none());
    }
}
