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

//! Clustered light and reflection probe grid.
//!
//! Each view's frustum is split into cells (see [`LightGridLayout`]). Two
//! compute passes bin the visible radial and spot lights and the visible
//! reflection probes into those cells:
//!
//! 1. **Construction**, one thread per light or probe: every overlapping
//!    cell gets a node prepended to its linked list through an atomic
//!    counter and an atomic exchange on the cell's head.
//! 2. **Reduction**, one thread per cell: the list is walked and flattened
//!    into contiguous index ranges, radial lights before spot lights.
//!
//! The shading passes read the flattened ranges through the bind group
//! returned by [`LightGrid::shading_bind_group`].

mod layout;

pub use layout::{CpuLightGrid, LightGridLayout, LIST_END};

use crate::frame;
use crate::light_data::SceneLighting;
use crate::shaders;
use crate::util::{ComputeProgram, GrowableBuffer};
use beast_core::lane::{Lane, LaneContext, LaneError, LaneKind};
use beast_core::math::div_ceil;
use beast_core::renderer::api::{
    BindGroupDescriptor, BindGroupEntry, BindGroupId, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindGroupLayoutId, BufferDescriptor, BufferId, BufferUsage,
    ComputePassDescriptor, ShaderStageFlags,
};
use beast_core::renderer::error::ResourceError;
use beast_core::renderer::traits::FEATURE_COMPUTE_SHADERS;
use beast_core::renderer::{CommandEncoder, GraphicsDevice, LightType, RendererView, ViewFlags};
use bytemuck::{Pod, Zeroable};
use std::borrow::Cow;
use std::sync::{PoisonError, RwLock};

/// Edge of a grid cell in pixels.
pub const CELL_XY_SIZE: u32 = 64;
/// Depth slices of the grid.
pub const NUM_Z_SUBDIVIDES: u32 = 32;
/// Average entries per cell the node pools are sized for. Individual cells
/// are not bounded by it.
pub const MAX_LIGHTS_PER_CELL: u32 = 32;

const CREATE_GROUP_SIZE: u32 = 64;
const REDUCE_GROUP_SIZE: u32 = 4;

const GRID_PASS_OVERHEAD: f32 = 0.3;
const PER_CELL_COST: f32 = 0.00005;
const PER_LIGHT_COST: f32 = 0.002;

/// Per-view constants shared by the grid passes and every pass that shades
/// with the grid.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightGridParams {
    /// Cells along x, y, z and the total cell count.
    pub grid_size: [u32; 4],
    /// Visible directional, radial and spot lights, then their total.
    pub light_counts: [u32; 4],
    /// First record of each light type in the light buffer.
    pub light_offsets: [u32; 4],
    /// Shadow-casting lights at the start of each type's range.
    pub shadowed_counts: [u32; 4],
    /// Probe count, average entries per cell, cell size in pixels, node pool capacity.
    pub misc: [u32; 4],
    pub inv_proj: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub inv_view: [[f32; 4]; 4],
    /// Near, far, then unused.
    pub near_far: [f32; 4],
    /// Width, height and their reciprocals, in pixels.
    pub viewport_size: [f32; 4],
}

impl LightGridParams {
    pub fn new(
        view: &RendererView,
        layout: &LightGridLayout,
        lighting: &SceneLighting,
        no_lighting: bool,
    ) -> Self {
        let lights = &lighting.visible_lights;
        let types = [LightType::Directional, LightType::Radial, LightType::Spot];
        let mut counts = [0u32; 4];
        let mut shadowed = [0u32; 4];
        if !no_lighting {
            for (i, ty) in types.iter().enumerate() {
                counts[i] = lights.num_lights(*ty);
                shadowed[i] = lights.num_shadowed_lights(*ty);
            }
            counts[3] = lights.total();
        }
        let grid = layout.grid_size();
        let (width, height) = layout.viewport();
        let (width, height) = (width.max(1) as f32, height.max(1) as f32);

        Self {
            grid_size: [grid.x, grid.y, grid.z, layout.num_cells()],
            light_counts: counts,
            light_offsets: [
                lights.offset(LightType::Directional),
                lights.offset(LightType::Radial),
                lights.offset(LightType::Spot),
                0,
            ],
            shadowed_counts: shadowed,
            misc: [
                lighting.visible_probes.len(),
                MAX_LIGHTS_PER_CELL,
                CELL_XY_SIZE,
                layout.max_entries(),
            ],
            inv_proj: view.inv_projection().to_cols_array_2d(),
            proj: view.projection.to_cols_array_2d(),
            view: view.view.to_cols_array_2d(),
            inv_view: view.view.inverse().to_cols_array_2d(),
            near_far: [layout.near(), layout.far(), 0.0, 0.0],
            viewport_size: [width, height, 1.0 / width, 1.0 / height],
        }
    }

    /// Number of threads of the construction pass.
    pub fn num_binned_items(&self) -> u32 {
        self.light_counts[1] + self.light_counts[2] + self.misc[0]
    }
}

/// Bind group layouts and pipelines of the two grid passes, plus the layout
/// shading passes use to read the grid.
#[derive(Debug)]
pub struct LightGridPipelines {
    create_layout: BindGroupLayoutId,
    reduce_layout: BindGroupLayoutId,
    shading_layout: BindGroupLayoutId,
    create: ComputeProgram,
    reduce: ComputeProgram,
}

impl LightGridPipelines {
    pub fn new(device: &dyn GraphicsDevice) -> Result<Self, ResourceError> {
        let cs = ShaderStageFlags::COMPUTE;
        let create_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Light Grid Create Layout"),
            entries: &[
                BindGroupLayoutEntry::uniform(0, cs, false),
                BindGroupLayoutEntry::storage(1, cs, true),
                BindGroupLayoutEntry::storage(2, cs, true),
                BindGroupLayoutEntry::storage(3, cs, false),
                BindGroupLayoutEntry::storage(4, cs, false),
                BindGroupLayoutEntry::storage(5, cs, false),
            ],
        })?;
        let reduce_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Light Grid Reduce Layout"),
            entries: &[
                BindGroupLayoutEntry::uniform(0, cs, false),
                BindGroupLayoutEntry::storage(1, cs, false),
                BindGroupLayoutEntry::storage(2, cs, true),
                BindGroupLayoutEntry::storage(3, cs, true),
                BindGroupLayoutEntry::storage(4, cs, false),
                BindGroupLayoutEntry::storage(5, cs, false),
                BindGroupLayoutEntry::storage(6, cs, false),
                BindGroupLayoutEntry::storage(7, cs, false),
            ],
        })?;
        let vis = ShaderStageFlags::COMPUTE | ShaderStageFlags::FRAGMENT;
        let shading_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Light Grid Shading Layout"),
            entries: &[
                BindGroupLayoutEntry::uniform(0, vis | ShaderStageFlags::VERTEX, false),
                BindGroupLayoutEntry::storage(1, vis, true),
                BindGroupLayoutEntry::storage(2, vis, true),
                BindGroupLayoutEntry::storage(3, vis, true),
                BindGroupLayoutEntry::storage(4, vis, true),
                BindGroupLayoutEntry::storage(5, vis, true),
                BindGroupLayoutEntry::storage(6, vis, true),
            ],
        })?;

        let create = ComputeProgram::new(
            device,
            "Light Grid Create",
            Cow::Borrowed(shaders::LIGHT_GRID_CREATE_WGSL),
            "cs_main",
            &[create_layout],
        )?;
        let reduce = ComputeProgram::new(
            device,
            "Light Grid Reduce",
            Cow::Borrowed(shaders::LIGHT_GRID_REDUCE_WGSL),
            "cs_main",
            &[reduce_layout],
        )?;

        Ok(Self {
            create_layout,
            reduce_layout,
            shading_layout,
            create,
            reduce,
        })
    }

    /// Layout of [`LightGrid::shading_bind_group`].
    pub fn shading_layout(&self) -> BindGroupLayoutId {
        self.shading_layout
    }

    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        self.create.destroy(device);
        self.reduce.destroy(device);
        for layout in [self.create_layout, self.reduce_layout, self.shading_layout] {
            if let Err(e) = device.destroy_bind_group_layout(layout) {
                log::warn!("Failed to destroy light grid layout: {:?}", e);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BindGroups {
    create: BindGroupId,
    reduce: BindGroupId,
    shading: BindGroupId,
}

/// Buffer ids the cached bind groups were created with.
type BindingKey = [Option<BufferId>; 10];

/// GPU state of one view's light grid.
#[derive(Debug)]
pub struct LightGrid {
    layout: Option<LightGridLayout>,
    params: LightGridParams,
    params_buffer: Option<BufferId>,
    counters: Option<BufferId>,
    heads: GrowableBuffer,
    nodes: GrowableBuffer,
    light_cells: GrowableBuffer,
    light_indices: GrowableBuffer,
    probe_cells: GrowableBuffer,
    probe_indices: GrowableBuffer,
    bind_groups: Option<BindGroups>,
    bound: BindingKey,
}

impl Default for LightGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl LightGrid {
    pub fn new() -> Self {
        let rw = BufferUsage::STORAGE | BufferUsage::COPY_DST;
        Self {
            layout: None,
            params: LightGridParams::zeroed(),
            params_buffer: None,
            counters: None,
            heads: GrowableBuffer::new(4, rw, "Light Grid Heads"),
            nodes: GrowableBuffer::new(8, rw, "Light Grid Nodes"),
            light_cells: GrowableBuffer::new(16, rw, "Light Grid Light Cells"),
            light_indices: GrowableBuffer::new(4, rw, "Light Grid Light Indices"),
            probe_cells: GrowableBuffer::new(16, rw, "Light Grid Probe Cells"),
            probe_indices: GrowableBuffer::new(4, rw, "Light Grid Probe Indices"),
            bind_groups: None,
            bound: [None; 10],
        }
    }

    /// Layout of the most recent build.
    pub fn layout(&self) -> Option<&LightGridLayout> {
        self.layout.as_ref()
    }

    /// Constants of the most recent build.
    pub fn params(&self) -> &LightGridParams {
        &self.params
    }

    /// Grid output for shading passes, laid out as
    /// [`LightGridPipelines::shading_layout`]: params, lights, light cells,
    /// light indices, probes, probe cells, probe indices.
    pub fn shading_bind_group(&self) -> Option<BindGroupId> {
        self.bind_groups.map(|groups| groups.shading)
    }

    /// Rebuilds the grid for `view` and records the passes into `encoder`.
    ///
    /// Devices without compute support get the lists built on the CPU and
    /// uploaded instead.
    pub fn update(
        &mut self,
        device: &dyn GraphicsDevice,
        encoder: &mut dyn CommandEncoder,
        pipelines: &LightGridPipelines,
        view: &RendererView,
        lighting: &SceneLighting,
    ) -> Result<(), ResourceError> {
        let layout = LightGridLayout::new(view);
        let no_lighting = view.has_flag(ViewFlags::NO_LIGHTING);
        self.params = LightGridParams::new(view, &layout, lighting, no_lighting);
        let num_cells = u64::from(layout.num_cells());
        let max_entries = u64::from(layout.max_entries());

        self.heads.reserve(device, num_cells * 2)?;
        self.nodes.reserve(device, max_entries * 2)?;
        self.light_cells.reserve(device, num_cells)?;
        self.light_indices.reserve(device, max_entries)?;
        self.probe_cells.reserve(device, num_cells)?;
        self.probe_indices.reserve(device, max_entries)?;
        let params_buffer = Self::ensure_buffer(
            device,
            &mut self.params_buffer,
            std::mem::size_of::<LightGridParams>() as u64,
            BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            "Light Grid Params",
        )?;
        let counters = Self::ensure_buffer(
            device,
            &mut self.counters,
            16,
            BufferUsage::STORAGE | BufferUsage::COPY_DST,
            "Light Grid Counters",
        )?;
        device.write_buffer(params_buffer, 0, bytemuck::bytes_of(&self.params))?;
        self.update_bind_groups(device, pipelines, lighting)?;

        if device.supports_feature(FEATURE_COMPUTE_SHADERS) {
            let heads = vec![0xFFu8; (num_cells * 2 * 4) as usize];
            if let Some(buffer) = self.heads.buffer() {
                device.write_buffer(buffer, 0, &heads)?;
            }
            device.write_buffer(counters, 0, &[0u8; 16])?;
            self.dispatch(encoder, pipelines);
        } else {
            self.upload_cpu_grid(device, &layout, view, lighting, no_lighting)?;
        }

        self.layout = Some(layout);
        Ok(())
    }

    fn dispatch(&self, encoder: &mut dyn CommandEncoder, pipelines: &LightGridPipelines) {
        let Some(groups) = self.bind_groups else {
            return;
        };
        let [grid_x, grid_y, grid_z, _] = self.params.grid_size;
        let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor {
            label: Some("Light Grid"),
        });

        let items = self.params.num_binned_items();
        if items > 0 {
            pass.set_pipeline(pipelines.create.pipeline);
            pass.set_bind_group(0, groups.create, &[]);
            pass.dispatch_workgroups(div_ceil(items, CREATE_GROUP_SIZE), 1, 1);
        }

        pass.set_pipeline(pipelines.reduce.pipeline);
        pass.set_bind_group(0, groups.reduce, &[]);
        pass.dispatch_workgroups(
            div_ceil(grid_x, REDUCE_GROUP_SIZE),
            div_ceil(grid_y, REDUCE_GROUP_SIZE),
            div_ceil(grid_z, REDUCE_GROUP_SIZE),
        );
    }

    fn upload_cpu_grid(
        &mut self,
        device: &dyn GraphicsDevice,
        layout: &LightGridLayout,
        view: &RendererView,
        lighting: &SceneLighting,
        no_lighting: bool,
    ) -> Result<(), ResourceError> {
        let counts = if no_lighting {
            [0; 3]
        } else {
            lighting.visible_lights.counts()
        };
        let grid = layout.build_cell_lists(
            &view.view,
            lighting.visible_lights.data(),
            counts,
            lighting.visible_probes.data(),
        );
        self.light_cells
            .write(device, bytemuck::cast_slice(&grid.light_cells))?;
        self.light_indices
            .write(device, bytemuck::cast_slice(&grid.light_indices))?;
        self.probe_cells
            .write(device, bytemuck::cast_slice(&grid.probe_cells))?;
        self.probe_indices
            .write(device, bytemuck::cast_slice(&grid.probe_indices))?;
        Ok(())
    }

    fn ensure_buffer(
        device: &dyn GraphicsDevice,
        slot: &mut Option<BufferId>,
        size: u64,
        usage: BufferUsage,
        label: &'static str,
    ) -> Result<BufferId, ResourceError> {
        if let Some(buffer) = *slot {
            return Ok(buffer);
        }
        let buffer = device.create_buffer(&BufferDescriptor {
            label: Some(Cow::Borrowed(label)),
            size,
            usage,
            mapped_at_creation: false,
        })?;
        *slot = Some(buffer);
        Ok(buffer)
    }

    fn update_bind_groups(
        &mut self,
        device: &dyn GraphicsDevice,
        pipelines: &LightGridPipelines,
        lighting: &SceneLighting,
    ) -> Result<(), ResourceError> {
        let key: BindingKey = [
            self.params_buffer,
            self.counters,
            self.heads.buffer(),
            self.nodes.buffer(),
            self.light_cells.buffer(),
            self.light_indices.buffer(),
            self.probe_cells.buffer(),
            self.probe_indices.buffer(),
            lighting.gpu_lights.buffer(),
            lighting.gpu_probes.buffer(),
        ];
        if self.bind_groups.is_some() && key == self.bound {
            return Ok(());
        }
        let [Some(params), Some(counters), Some(heads), Some(nodes), Some(light_cells), Some(light_indices), Some(probe_cells), Some(probe_indices), Some(lights), Some(probes)] =
            key
        else {
            return Err(ResourceError::NotFound);
        };

        self.destroy_bind_groups(device);

        let create = device.create_bind_group(&BindGroupDescriptor {
            label: Some("Light Grid Create"),
            layout: pipelines.create_layout,
            entries: &[
                BindGroupEntry::buffer(0, params),
                BindGroupEntry::buffer(1, lights),
                BindGroupEntry::buffer(2, probes),
                BindGroupEntry::buffer(3, counters),
                BindGroupEntry::buffer(4, heads),
                BindGroupEntry::buffer(5, nodes),
            ],
        })?;
        let reduce = device.create_bind_group(&BindGroupDescriptor {
            label: Some("Light Grid Reduce"),
            layout: pipelines.reduce_layout,
            entries: &[
                BindGroupEntry::buffer(0, params),
                BindGroupEntry::buffer(1, counters),
                BindGroupEntry::buffer(2, heads),
                BindGroupEntry::buffer(3, nodes),
                BindGroupEntry::buffer(4, light_cells),
                BindGroupEntry::buffer(5, light_indices),
                BindGroupEntry::buffer(6, probe_cells),
                BindGroupEntry::buffer(7, probe_indices),
            ],
        })?;
        let shading = device.create_bind_group(&BindGroupDescriptor {
            label: Some("Light Grid Shading"),
            layout: pipelines.shading_layout,
            entries: &[
                BindGroupEntry::buffer(0, params),
                BindGroupEntry::buffer(1, lights),
                BindGroupEntry::buffer(2, light_cells),
                BindGroupEntry::buffer(3, light_indices),
                BindGroupEntry::buffer(4, probes),
                BindGroupEntry::buffer(5, probe_cells),
                BindGroupEntry::buffer(6, probe_indices),
            ],
        })?;

        self.bind_groups = Some(BindGroups {
            create,
            reduce,
            shading,
        });
        self.bound = key;
        Ok(())
    }

    fn destroy_bind_groups(&mut self, device: &dyn GraphicsDevice) {
        if let Some(groups) = self.bind_groups.take() {
            for group in [groups.create, groups.reduce, groups.shading] {
                if let Err(e) = device.destroy_bind_group(group) {
                    log::warn!("Failed to destroy light grid bind group: {:?}", e);
                }
            }
        }
    }

    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        self.destroy_bind_groups(device);
        for buffer in [self.params_buffer.take(), self.counters.take()]
            .into_iter()
            .flatten()
        {
            if let Err(e) = device.destroy_buffer(buffer) {
                log::warn!("Failed to destroy light grid buffer: {:?}", e);
            }
        }
        self.heads.destroy(device);
        self.nodes.destroy(device);
        self.light_cells.destroy(device);
        self.light_indices.destroy(device);
        self.probe_cells.destroy(device);
        self.probe_indices.destroy(device);
        self.layout = None;
    }
}

/// Lane that builds the current view's [`LightGrid`].
///
/// Reads `Slot<LightGrid>`, `Ref<RendererView>` and `Ref<SceneLighting>`
/// from the context.
#[derive(Debug, Default)]
pub struct LightGridLane {
    pipelines: RwLock<Option<LightGridPipelines>>,
}

impl LightGridLane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layout shading passes bind the grid with, once initialized.
    pub fn shading_layout(&self) -> Option<BindGroupLayoutId> {
        self.pipelines
            .read()
            .ok()?
            .as_ref()
            .map(LightGridPipelines::shading_layout)
    }
}

impl Lane for LightGridLane {
    fn strategy_name(&self) -> &'static str {
        "LightGrid"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::LightCulling
    }

    fn estimate_cost(&self, ctx: &LaneContext) -> f32 {
        let (Ok(view), Ok(lighting)) = (
            frame::get_ref::<RendererView>(ctx, "RendererView"),
            frame::get_ref::<SceneLighting>(ctx, "SceneLighting"),
        ) else {
            return 1.0;
        };
        let cells = LightGridLayout::new(view).num_cells() as f32;
        let items = lighting.visible_lights.total() + lighting.visible_probes.len();
        GRID_PASS_OVERHEAD + cells * PER_CELL_COST + items as f32 * PER_LIGHT_COST
    }

    fn on_initialize(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let device = frame::device(ctx)?;
        let pipelines =
            LightGridPipelines::new(device.as_ref()).map_err(LaneError::initialization)?;
        let mut slot = self.pipelines.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = slot.replace(pipelines) {
            old.destroy(device.as_ref());
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let device = frame::device(ctx)?;
        let guard = self.pipelines.read().map_err(|_| LaneError::NotInitialized)?;
        let pipelines = guard.as_ref().ok_or(LaneError::NotInitialized)?;
        let view = frame::get_ref::<RendererView>(ctx, "Ref<RendererView>")?;
        let lighting = frame::get_ref::<SceneLighting>(ctx, "Ref<SceneLighting>")?;
        let grid = frame::get_slot::<LightGrid>(ctx, "Slot<LightGrid>")?;
        let encoder = frame::encoder(ctx)?;
        grid.update(device.as_ref(), encoder, pipelines, view, lighting)
            .map_err(LaneError::execution)
    }

    fn on_shutdown(&self, ctx: &mut LaneContext) {
        let Ok(device) = frame::device(ctx) else {
            return;
        };
        let mut slot = self.pipelines.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(pipelines) = slot.take() {
            pipelines.destroy(device.as_ref());
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_match_shader_layout() {
        assert_eq!(std::mem::size_of::<LightGridParams>(), 368);
        assert_eq!(std::mem::size_of::<LightGridParams>() % 16, 0);
    }

    #[test]
    fn lane_identity() {
        let lane = LightGridLane::new();
        assert_eq!(lane.strategy_name(), "LightGrid");
        assert_eq!(lane.lane_kind(), LaneKind::LightCulling);
        assert!(lane.shading_layout().is_none());
    }
}
