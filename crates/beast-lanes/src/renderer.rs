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

//! The renderer front end.
//!
//! [`RenderBeast`] owns every service of the lighting pipeline and runs a
//! frame in this order:
//!
//! 1. rewinds per-frame uniforms and transient bind groups,
//! 2. culls lights and probes against every view and uploads them,
//! 3. builds each view's light grid,
//! 4. renders the shadow maps of the frame,
//! 5. executes each view's compositor, rebuilding it when the view changed
//!    shape or the options changed,
//! 6. submits the command buffer and advances the resource pool.
//!
//! A view that fails at any step is logged and skipped; the other views
//! still render.

use crate::compositor::nodes::FINAL_RESOLVE;
use crate::compositor::{CompositorNodeRegistry, RenderCompositor};
use crate::frame::ViewIndex;
use crate::light_data::SceneLighting;
use crate::light_grid::{LightGrid, LightGridLane};
use crate::lighting::LightingResources;
use crate::pool::GpuResourcePool;
use crate::shadow::ShadowRendering;
use ahash::AHashMap;
use beast_core::lane::{Lane, LaneContext, Ref, Slot};
use beast_core::renderer::api::{
    BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindGroupLayoutId, CommandBufferId, ShaderStageFlags,
};
use beast_core::renderer::{
    CommandEncoder, ConfigError, GraphicsDevice, RenderError, RendererOptions, RendererView, SceneFrame, ViewId,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Frames a free pooled target may stay idle before it is destroyed.
pub const POOL_IDLE_FRAMES: u64 = 120;

#[derive(Debug, Default)]
struct ViewState {
    grid: LightGrid,
    compositor: RenderCompositor,
}

#[derive(Debug)]
struct Services {
    grid_lane: LightGridLane,
    lighting: LightingResources,
    model_layout: BindGroupLayoutId,
}

fn device_context(device: &Arc<dyn GraphicsDevice>, pool: &Arc<GpuResourcePool>) -> LaneContext {
    let mut ctx = LaneContext::new();
    ctx.insert(device.clone());
    ctx.insert(pool.clone());
    ctx
}

/// Tiled deferred renderer with clustered lights, shadow maps and image
/// based lighting.
pub struct RenderBeast {
    device: Arc<dyn GraphicsDevice>,
    pool: Arc<GpuResourcePool>,
    options: RendererOptions,
    registry: CompositorNodeRegistry,
    final_node: &'static str,
    lighting: SceneLighting,
    shadows: ShadowRendering,
    services: Option<Services>,
    views: AHashMap<ViewId, ViewState>,
    frame_count: u64,
    last_frame_time: Duration,
}

impl std::fmt::Debug for RenderBeast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderBeast")
            .field("options", &self.options)
            .field("final_node", &self.final_node)
            .field("views", &self.views.len())
            .field("frame_count", &self.frame_count)
            .finish()
    }
}

impl RenderBeast {
    /// Creates the pool, every shared pipeline, the BRDF lookup table and
    /// the default compositor nodes.
    pub fn new(device: Arc<dyn GraphicsDevice>, options: RendererOptions) -> Result<Self, RenderError> {
        options
            .validate()
            .map_err(|e| RenderError::InitializationFailed(e.to_string()))?;
        let pool = Arc::new(GpuResourcePool::new(device.clone()));

        let grid_lane = LightGridLane::new();
        grid_lane.on_initialize(&mut device_context(&device, &pool))?;
        let grid_layout = grid_lane.shading_layout().ok_or(RenderError::NotInitialized)?;

        let model_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Model Layout"),
            entries: &[BindGroupLayoutEntry::uniform(0, ShaderStageFlags::VERTEX_FRAGMENT, true)],
        })?;

        let mut shadows = ShadowRendering::new(pool.clone(), options.clone());
        shadows
            .initialize(device.as_ref(), grid_layout, model_layout)
            .map_err(|e| RenderError::InitializationFailed(e.to_string()))?;
        let lighting = LightingResources::new(device.as_ref(), grid_layout)?;

        log::info!(
            "RenderBeast: Initialized (tiled deferred: {}, shadow maps: {})",
            options.tiled_deferred,
            options.shadow_map_size
        );
        Ok(Self {
            device,
            pool,
            options,
            registry: CompositorNodeRegistry::with_default_nodes(),
            final_node: FINAL_RESOLVE,
            lighting: SceneLighting::new(),
            shadows,
            services: Some(Services {
                grid_lane,
                lighting,
                model_layout,
            }),
            views: AHashMap::new(),
            frame_count: 0,
            last_frame_time: Duration::ZERO,
        })
    }

    /// Records and submits one frame for `views`.
    pub fn render_frame(&mut self, scene: &SceneFrame, views: &[RendererView]) -> Result<CommandBufferId, RenderError> {
        let frame_start = Instant::now();
        let Self {
            device,
            pool,
            options,
            registry,
            final_node,
            lighting,
            shadows,
            services,
            views: view_states,
            ..
        } = self;
        let services = services.as_ref().ok_or(RenderError::NotInitialized)?;

        services.lighting.begin_frame(device.as_ref());
        lighting.update(device.as_ref(), scene, views)?;

        let mut encoder = device.create_command_encoder(Some("RenderBeast Frame"));
        let mut ready = vec![true; views.len()];

        for (index, view) in views.iter().enumerate() {
            let state = view_states.entry(view.id).or_default();
            let mut ctx = device_context(device, pool);
            ctx.insert(Slot::<dyn CommandEncoder>::new(encoder.as_mut()));
            ctx.insert(Ref::new(view));
            ctx.insert(Ref::new(&*lighting));
            ctx.insert(Slot::new(&mut state.grid));
            if let Err(e) = services.grid_lane.execute(&mut ctx) {
                log::warn!("RenderBeast: Skipping view {:?}, light grid failed: {}", view.id, e);
                ready[index] = false;
            }
        }

        if let Err(e) = shadows.render_shadow_maps(device.as_ref(), encoder.as_mut(), scene, lighting, views) {
            log::warn!("RenderBeast: Shadow map rendering failed: {}", e);
        }

        for (index, view) in views.iter().enumerate() {
            if !ready[index] {
                continue;
            }
            let state = view_states.entry(view.id).or_default();
            let ViewState { grid, compositor } = state;
            if !compositor.is_valid_for(&view.config()) {
                if let Err(e) = compositor.build(registry, view, options, final_node) {
                    log::error!("RenderBeast: Cannot build compositor for view {:?}: {}", view.id, e);
                    continue;
                }
            }

            let mut ctx = device_context(device, pool);
            ctx.insert(Slot::<dyn CommandEncoder>::new(encoder.as_mut()));
            ctx.insert(Ref::new(view));
            ctx.insert(ViewIndex(index));
            ctx.insert(Ref::new(&*options));
            ctx.insert(Ref::new(scene));
            ctx.insert(Ref::new(&*lighting));
            ctx.insert(Slot::new(grid));
            ctx.insert(Ref::new(&*shadows));
            ctx.insert(Ref::new(&services.lighting));
            if let Err(e) = compositor.execute(&mut ctx) {
                log::error!("RenderBeast: View {:?} failed: {}", view.id, e);
            }
        }

        let command_buffer = encoder.finish();
        device.submit_command_buffer(command_buffer);
        pool.end_frame();
        pool.trim(POOL_IDLE_FRAMES);

        self.frame_count += 1;
        self.last_frame_time = frame_start.elapsed();
        log::trace!(
            "RenderBeast: Frame {} recorded {} view(s) in {:?}",
            self.frame_count,
            views.len(),
            self.last_frame_time
        );
        Ok(command_buffer)
    }

    /// Replaces the options. Every compositor is rebuilt on its next frame.
    pub fn set_options(&mut self, options: RendererOptions) -> Result<(), ConfigError> {
        options.validate()?;
        self.shadows.set_options(options.clone());
        self.options = options;
        self.invalidate_compositors();
        Ok(())
    }

    pub fn options(&self) -> &RendererOptions {
        &self.options
    }

    /// Node registry used when compositors are rebuilt. Changing it
    /// invalidates every compositor.
    pub fn registry_mut(&mut self) -> &mut CompositorNodeRegistry {
        self.invalidate_compositors();
        &mut self.registry
    }

    /// Sets the node every view's graph ends with.
    pub fn set_final_node(&mut self, id: &'static str) {
        self.final_node = id;
        self.invalidate_compositors();
    }

    fn invalidate_compositors(&mut self) {
        for state in self.views.values_mut() {
            state.compositor.invalidate();
        }
    }

    /// Releases the light grid and compositor of a view that will not be
    /// rendered again.
    pub fn remove_view(&mut self, id: ViewId) {
        if let Some(mut state) = self.views.remove(&id) {
            let mut ctx = device_context(&self.device, &self.pool);
            state.compositor.shutdown(&mut ctx);
            state.grid.destroy(self.device.as_ref());
            log::debug!("RenderBeast: Removed view {:?}", id);
        }
    }

    /// Releases every GPU object. Later frames fail with
    /// [`RenderError::NotInitialized`].
    pub fn shutdown(&mut self) {
        let ids: Vec<ViewId> = self.views.keys().copied().collect();
        for id in ids {
            self.remove_view(id);
        }
        if let Some(services) = self.services.take() {
            let device = self.device.as_ref();
            services.grid_lane.on_shutdown(&mut device_context(&self.device, &self.pool));
            services.lighting.destroy(device);
            if let Err(e) = device.destroy_bind_group_layout(services.model_layout) {
                log::warn!("RenderBeast: Failed to destroy model layout: {:?}", e);
            }
        }
        self.shadows.shutdown(self.device.as_ref());
        self.lighting.destroy(self.device.as_ref());
        self.pool.clear();
        log::info!("RenderBeast: Shut down after {} frame(s)", self.frame_count);
    }

    /// Layout material pipelines bind models with at `@group(1)`.
    pub fn model_bind_group_layout(&self) -> Option<BindGroupLayoutId> {
        self.services.as_ref().map(|s| s.model_layout)
    }

    /// Layout material pipelines bind the light grid with at `@group(0)`.
    pub fn shading_layout(&self) -> Option<BindGroupLayoutId> {
        self.services.as_ref().and_then(|s| s.grid_lane.shading_layout())
    }

    pub fn pool(&self) -> &Arc<GpuResourcePool> {
        &self.pool
    }

    pub fn shadows(&self) -> &ShadowRendering {
        &self.shadows
    }

    pub fn scene_lighting(&self) -> &SceneLighting {
        &self.lighting
    }

    /// Compositor of a view rendered at least once.
    pub fn compositor(&self, id: ViewId) -> Option<&RenderCompositor> {
        self.views.get(&id).map(|state| &state.compositor)
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn last_frame_time(&self) -> Duration {
        self.last_frame_time
    }
}
