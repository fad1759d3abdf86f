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

//! Shadow map rendering and projection.
//!
//! Every frame [`ShadowRendering::render_shadow_maps`] decides which
//! shadow-casting lights get a map, packs the maps and renders the casters
//! into them:
//!
//! * spot lights get a region of a [`ShadowMapAtlas`], sized by how large
//!   the light appears in the views that see it,
//! * radial lights get a [`ShadowCubemap`],
//! * directional lights get one [`ShadowCascadedMap`] per view, split into
//!   [`NUM_CASCADE_SPLITS`] cascades.
//!
//! Lights that appear too small in every view fade out and get no map. Maps
//! unused for [`MAX_UNUSED_FRAMES`] frames go back to the pool.
//!
//! The standard deferred lighting pass then calls
//! [`ShadowRendering::project_light`] for each shadowed light of a view.

pub mod depth;
pub mod maps;
pub mod math;
pub mod projection;
pub mod variation;

pub use maps::{ShadowCascadedMap, ShadowCubemap, ShadowMap, ShadowMapAtlas};
pub use projection::{ProjectedShadow, ProjectionTargets, ShadowProjectParams, ShadowProjector};
pub use variation::{ShadowKind, ShadowProjectVariation, StencilVariation};

use crate::light_data::SceneLighting;
use crate::pool::{GpuResourcePool, PooledTexture};
use crate::util::{light_volume, DefinesError, LightVolumes};
use ahash::AHashMap;
use beast_core::math::{Mat4, Rect2, Rect2I, Sphere, Vec3};
use beast_core::renderer::api::{BindGroupDescriptor, BindGroupEntry, BindGroupId, BindGroupLayoutId};
use beast_core::renderer::error::ResourceError;
use beast_core::renderer::{
    CommandEncoder, GraphicsDevice, LightType, MeshDraw, RendererLight, RendererOptions, RendererView,
    SceneFrame, ViewFlags,
};
use depth::{DepthTarget, ShadowDepthRenderer};
use std::sync::Arc;

/// Edge of a spot shadow atlas.
pub const MAX_ATLAS_SIZE: u32 = 4096;
/// Frames a map may stay unused before it is released.
pub const MAX_UNUSED_FRAMES: u32 = 60;
/// Map size at or below which a shadow is fully faded.
pub const MIN_SHADOW_MAP_SIZE: u32 = 32;
/// Map size at or above which a shadow is not faded at all.
pub const SHADOW_MAP_FADE_SIZE: u32 = 64;
/// Texels around each atlas region, so PCF never reads a neighbor.
pub const SHADOW_MAP_BORDER: u32 = 4;
/// Fraction of a cascade over which it blends into the next one.
pub const CASCADE_FRACTION_FADE: f32 = 0.1;
pub const NUM_CASCADE_SPLITS: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum ShadowError {
    #[error("shadow rendering used before initialization")]
    NotInitialized,
    #[error("shadow map of {size} texels does not fit in an atlas")]
    MapTooLarge { size: u32 },
    #[error(transparent)]
    Defines(#[from] DefinesError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

/// Which map a shadow was rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowTexture {
    Atlas(usize),
    Cubemap(usize),
    Cascaded(usize),
}

/// One rendered shadow map region.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowInfo {
    /// Index of the light in `SceneFrame::lights`.
    pub light_idx: usize,
    pub texture: ShadowTexture,
    /// Region of the texture, in texels.
    pub area: Rect2I,
    /// Region of the texture, in texture coordinates.
    pub norm_area: Rect2,
    pub map_size: u32,
    pub depth_near: f32,
    pub depth_far: f32,
    pub depth_range: f32,
    pub depth_bias: f32,
    /// Occluder distance scale over which the shadow fades in.
    pub depth_fade: f32,
    /// Cascade index, for directional shadows.
    pub cascade_idx: Option<u32>,
    /// View depths covered by the cascade.
    pub cascade_split: [f32; 2],
    /// View depth over which the cascade blends into the next.
    pub fade_range: f32,
    /// One view-projection for spot and cascade maps, six for cubemaps.
    pub shadow_vp: Vec<Mat4>,
    /// Fade percent per view; 1 means the view does not show this shadow.
    pub fade_per_view: Vec<f32>,
}

#[derive(Debug, Default)]
struct LightShadows {
    /// Shadow infos visible in each view.
    per_view: Vec<Vec<usize>>,
}

#[derive(Debug)]
struct ShadowRenderers {
    depth: ShadowDepthRenderer,
    projector: ShadowProjector,
}

struct LocalRequest {
    light_idx: usize,
    size: u32,
    fade_per_view: Vec<f32>,
}

/// Owner of every shadow map and of the shadow passes.
#[derive(Debug)]
pub struct ShadowRendering {
    pool: Arc<GpuResourcePool>,
    options: RendererOptions,
    atlases: Vec<ShadowMapAtlas>,
    cubemaps: Vec<ShadowCubemap>,
    cascaded_maps: Vec<ShadowCascadedMap>,
    infos: Vec<ShadowInfo>,
    lights: AHashMap<usize, LightShadows>,
    renderers: Option<ShadowRenderers>,
}

impl ShadowRendering {
    pub fn new(pool: Arc<GpuResourcePool>, options: RendererOptions) -> Self {
        Self {
            pool,
            options,
            atlases: Vec::new(),
            cubemaps: Vec::new(),
            cascaded_maps: Vec::new(),
            infos: Vec::new(),
            lights: AHashMap::new(),
            renderers: None,
        }
    }

    /// Creates the depth and projection pipelines.
    ///
    /// `view_layout` is the light grid shading layout and `model_layout` the
    /// layout of the casters' model bind groups.
    pub fn initialize(
        &mut self,
        device: &dyn GraphicsDevice,
        view_layout: BindGroupLayoutId,
        model_layout: BindGroupLayoutId,
    ) -> Result<(), ShadowError> {
        if self.renderers.is_some() {
            return Ok(());
        }
        self.renderers = Some(ShadowRenderers {
            depth: ShadowDepthRenderer::new(device, model_layout)?,
            projector: ShadowProjector::new(device, view_layout)?,
        });
        Ok(())
    }

    pub fn set_options(&mut self, options: RendererOptions) {
        self.options = options;
    }

    pub fn options(&self) -> &RendererOptions {
        &self.options
    }

    pub fn shadow_infos(&self) -> &[ShadowInfo] {
        &self.infos
    }

    pub fn atlases(&self) -> &[ShadowMapAtlas] {
        &self.atlases
    }

    pub fn cubemaps(&self) -> &[ShadowCubemap] {
        &self.cubemaps
    }

    pub fn cascaded_maps(&self) -> &[ShadowCascadedMap] {
        &self.cascaded_maps
    }

    pub fn projector(&self) -> Option<&ShadowProjector> {
        self.renderers.as_ref().map(|r| &r.projector)
    }

    /// Shadows of light `light_idx` that `view_index` shows this frame.
    pub fn shadows_of(&self, view_index: usize, light_idx: usize) -> impl Iterator<Item = &ShadowInfo> + '_ {
        self.lights
            .get(&light_idx)
            .and_then(|shadows| shadows.per_view.get(view_index))
            .into_iter()
            .flatten()
            .map(|&i| &self.infos[i])
    }

    /// Whether light `light_idx` has a shadow in `view_index` this frame.
    pub fn has_shadows(&self, view_index: usize, light_idx: usize) -> bool {
        self.shadows_of(view_index, light_idx).next().is_some()
    }

    /// Allocates, renders and evicts shadow maps for this frame. A light
    /// whose map cannot be allocated or rendered is logged and skipped, and
    /// eviction runs regardless.
    pub fn render_shadow_maps(
        &mut self,
        device: &dyn GraphicsDevice,
        encoder: &mut dyn CommandEncoder,
        scene: &SceneFrame,
        lighting: &SceneLighting,
        views: &[RendererView],
    ) -> Result<(), ShadowError> {
        for atlas in &mut self.atlases {
            atlas.clear();
        }
        for cubemap in &mut self.cubemaps {
            cubemap.clear();
        }
        for cascaded in &mut self.cascaded_maps {
            cascaded.clear();
        }
        self.infos.clear();
        self.lights.clear();

        let renderers = self.renderers.as_mut().ok_or(ShadowError::NotInitialized)?;
        renderers.depth.begin_frame();
        renderers.projector.begin_frame();

        let shadow_views: Vec<bool> = views.iter().map(|v| !v.has_flag(ViewFlags::NO_SHADOWS)).collect();
        let max_size = self.options.shadow_map_size.max(MIN_SHADOW_MAP_SIZE);

        let mut spots = Vec::new();
        let mut radials = Vec::new();
        for &light_idx in lighting.visible_lights.scene_indices() {
            let Some(light) = scene.lights.get(light_idx) else {
                continue;
            };
            if !light.cast_shadows {
                continue;
            }

            if light.light_type == LightType::Directional {
                for (view_index, view) in views.iter().enumerate() {
                    if !shadow_views[view_index] {
                        continue;
                    }
                    if let Err(e) = render_cascades(
                        device,
                        encoder,
                        &mut renderers.depth,
                        &renderers.projector,
                        &self.pool,
                        &self.options,
                        &mut self.cascaded_maps,
                        &mut self.infos,
                        &mut self.lights,
                        scene,
                        light_idx,
                        (view_index, view),
                        views.len(),
                    ) {
                        log::warn!(
                            "ShadowRendering: Skipping cascades of light {} in view {:?}: {}",
                            light_idx,
                            view.id,
                            e
                        );
                    }
                }
                continue;
            }

            let bounds = light.bounds();
            let mut size = 0;
            let mut fade_per_view = vec![1.0; views.len()];
            for (view_index, view) in views.iter().enumerate() {
                if !shadow_views[view_index] || !lighting.light_visibility.is_visible(view_index, light_idx) {
                    continue;
                }
                let view_size = math::shadow_map_size(view, &bounds, max_size);
                fade_per_view[view_index] = math::fade_percent(view_size as f32);
                size = size.max(view_size);
            }
            if fade_per_view.iter().all(|&fade| fade >= 1.0) {
                log::trace!("ShadowRendering: Light {} faded out in every view", light_idx);
                continue;
            }

            let request = LocalRequest {
                light_idx,
                size,
                fade_per_view,
            };
            match light.light_type {
                LightType::Spot => spots.push(request),
                _ => radials.push(request),
            }
        }

        // Largest first packs the atlas tighter.
        spots.sort_by(|a, b| b.size.cmp(&a.size));
        for request in spots {
            let light_idx = request.light_idx;
            if let Err(e) = render_spot(
                device,
                encoder,
                renderers,
                &self.pool,
                &mut self.atlases,
                &mut self.infos,
                &mut self.lights,
                scene,
                request,
                views.len(),
            ) {
                log::warn!("ShadowRendering: Skipping shadows of spot light {}: {}", light_idx, e);
            }
        }

        for request in radials {
            let light_idx = request.light_idx;
            if let Err(e) = render_radial(
                device,
                encoder,
                renderers,
                &self.pool,
                &mut self.cubemaps,
                &mut self.infos,
                &mut self.lights,
                scene,
                request,
                views.len(),
            ) {
                log::warn!("ShadowRendering: Skipping shadows of radial light {}: {}", light_idx, e);
            }
        }

        let evicted = maps::evict_unused(&mut self.atlases, device, &self.pool)
            + maps::evict_unused(&mut self.cubemaps, device, &self.pool)
            + maps::evict_unused(&mut self.cascaded_maps, device, &self.pool);
        if evicted > 0 {
            log::debug!("ShadowRendering: Released {} unused shadow map(s)", evicted);
        }
        log::trace!(
            "ShadowRendering: {} shadow(s) in {} atlas(es), {} cubemap(s), {} cascaded map(s)",
            self.infos.len(),
            self.atlases.len(),
            self.cubemaps.len(),
            self.cascaded_maps.len()
        );
        Ok(())
    }

    /// Projects the shadows of light `light_idx` as seen by `view` into the
    /// occlusion target. Returns false when the light has no shadow in this
    /// view, in which case nothing is recorded.
    #[allow(clippy::too_many_arguments)]
    pub fn project_light(
        &self,
        device: &dyn GraphicsDevice,
        encoder: &mut dyn CommandEncoder,
        view_index: usize,
        view: &RendererView,
        light_idx: usize,
        light: &RendererLight,
        targets: &ProjectionTargets,
        volumes: &LightVolumes,
    ) -> Result<bool, ShadowError> {
        let renderers = self.renderers.as_ref().ok_or(ShadowError::NotInitialized)?;
        let kind = ShadowKind::of(light.light_type);
        let volume_transform = match kind {
            ShadowKind::Directional => Mat4::IDENTITY,
            _ => light_volume::volume_transform(light),
        };

        let mut shadows = Vec::new();
        for info in self.shadows_of(view_index, light_idx) {
            let fade = info.fade_per_view.get(view_index).copied().unwrap_or(1.0);
            if fade >= 1.0 {
                continue;
            }
            let (map_group, texture_size) = match info.texture {
                ShadowTexture::Atlas(i) => (self.atlases.get(i).and_then(|m| m.sampling_group()), MAX_ATLAS_SIZE),
                ShadowTexture::Cubemap(i) => (self.cubemaps.get(i).and_then(|m| m.sampling_group()), info.map_size),
                ShadowTexture::Cascaded(i) => (
                    self.cascaded_maps.get(i).and_then(|m| m.sampling_group()),
                    info.map_size,
                ),
            };
            let Some(map_group) = map_group else {
                log::warn!("ShadowRendering: Shadow map of light {} has no sampling group", light_idx);
                continue;
            };

            let shadow_view_proj = match kind {
                ShadowKind::Radial => Mat4::IDENTITY,
                _ => info.shadow_vp.first().copied().unwrap_or(Mat4::IDENTITY),
            };
            shadows.push(ProjectedShadow {
                params: ShadowProjectParams {
                    shadow_view_proj: shadow_view_proj.to_cols_array_2d(),
                    volume_transform: volume_transform.to_cols_array_2d(),
                    uv_rect: info.norm_area.to_vec4().to_array(),
                    light_position: light.position.extend(info.depth_far).to_array(),
                    depth: [info.depth_bias, info.depth_fade, info.depth_near, info.depth_range],
                    cascade: [
                        info.cascade_split[0],
                        info.cascade_split[1],
                        info.fade_range,
                        info.cascade_idx.unwrap_or(0) as f32,
                    ],
                    misc: [fade, 1.0 / texture_size.max(1) as f32, 0.0, 0.0],
                },
                kind,
                map_group,
            });
        }
        if shadows.is_empty() {
            return Ok(false);
        }

        let inside = kind.uses_volume()
            && light_volume::is_camera_inside(light, view.position(), light_volume::near_plane_margin(view));
        renderers.projector.project(
            device,
            encoder,
            targets,
            &shadows,
            volumes.mesh_for(light.light_type),
            self.options.shadow_filtering_quality,
            inside,
        )?;
        Ok(true)
    }

    /// Releases every map and pipeline.
    pub fn shutdown(&mut self, device: &dyn GraphicsDevice) {
        maps::release_all(&mut self.atlases, device, &self.pool);
        maps::release_all(&mut self.cubemaps, device, &self.pool);
        maps::release_all(&mut self.cascaded_maps, device, &self.pool);
        self.infos.clear();
        self.lights.clear();
        if let Some(mut renderers) = self.renderers.take() {
            renderers.depth.destroy(device);
            renderers.projector.destroy(device);
        }
    }
}

fn create_sampling_group(
    device: &dyn GraphicsDevice,
    projector: &ShadowProjector,
    kind: ShadowKind,
    texture: &PooledTexture,
) -> Result<BindGroupId, ResourceError> {
    device.create_bind_group(&BindGroupDescriptor {
        label: Some("Shadow Map Sampling Group"),
        layout: projector.map_layout(kind),
        entries: &[
            BindGroupEntry::texture(0, texture.sampled_view()),
            BindGroupEntry::sampler(1, projector.comparison_sampler()),
        ],
    })
}

fn cull_casters(scene: &SceneFrame, keep: impl Fn(&Sphere) -> bool) -> Vec<&MeshDraw> {
    scene.shadow_casters.iter().filter(|c| keep(&c.bounds)).collect()
}

fn push_info(infos: &mut Vec<ShadowInfo>, lights: &mut AHashMap<usize, LightShadows>, info: ShadowInfo, num_views: usize) {
    let index = infos.len();
    let shadows = lights.entry(info.light_idx).or_default();
    shadows.per_view.resize_with(num_views, Vec::new);
    for (view_index, fade) in info.fade_per_view.iter().enumerate() {
        if *fade < 1.0 {
            if let Some(list) = shadows.per_view.get_mut(view_index) {
                list.push(index);
            }
        }
    }
    infos.push(info);
}

#[allow(clippy::too_many_arguments)]
fn render_spot(
    device: &dyn GraphicsDevice,
    encoder: &mut dyn CommandEncoder,
    renderers: &mut ShadowRenderers,
    pool: &GpuResourcePool,
    atlases: &mut Vec<ShadowMapAtlas>,
    infos: &mut Vec<ShadowInfo>,
    lights: &mut AHashMap<usize, LightShadows>,
    scene: &SceneFrame,
    request: LocalRequest,
    num_views: usize,
) -> Result<(), ShadowError> {
    let light = &scene.lights[request.light_idx];
    let size = request.size.min(MAX_ATLAS_SIZE - 2 * SHADOW_MAP_BORDER);

    let placed = atlases
        .iter_mut()
        .enumerate()
        .find_map(|(i, atlas)| atlas.add_map(size, SHADOW_MAP_BORDER).map(|region| (i, region)));
    let (atlas_idx, region) = match placed {
        Some(placed) => placed,
        None => {
            let mut atlas = ShadowMapAtlas::new(pool)?;
            let region = atlas
                .add_map(size, SHADOW_MAP_BORDER)
                .ok_or(ShadowError::MapTooLarge { size })?;
            let group = create_sampling_group(device, &renderers.projector, ShadowKind::Spot, atlas.texture())?;
            atlas.set_sampling_group(group);
            atlases.push(atlas);
            log::debug!("ShadowRendering: Added shadow atlas #{}", atlases.len());
            (atlases.len() - 1, region)
        }
    };

    let (view_proj, depth_range) = math::spot_view_proj(light);
    let casters = cull_casters(scene, |bounds| {
        bounds.intersects(&light.bounds()) && math::caster_in_frustum(&view_proj, bounds)
    });
    let atlas = &mut atlases[atlas_idx];
    let depth_bias = math::depth_bias(light, size, light.attenuation_radius, depth_range);
    renderers.depth.render(
        device,
        encoder,
        DepthTarget {
            view: atlas.texture().view(),
            viewport: region,
            clear: atlas.take_clear(),
        },
        &view_proj,
        depth_bias,
        &casters,
    )?;

    let info = ShadowInfo {
        light_idx: request.light_idx,
        texture: ShadowTexture::Atlas(atlas_idx),
        area: region,
        norm_area: region.normalized(MAX_ATLAS_SIZE, MAX_ATLAS_SIZE),
        map_size: size,
        depth_near: math::SHADOW_NEAR_PLANE,
        depth_far: math::SHADOW_NEAR_PLANE + depth_range,
        depth_range,
        depth_bias,
        depth_fade: math::fade_transition(light, size, light.attenuation_radius, depth_range),
        cascade_idx: None,
        cascade_split: [0.0; 2],
        fade_range: 0.0,
        shadow_vp: vec![view_proj],
        fade_per_view: request.fade_per_view,
    };
    push_info(infos, lights, info, num_views);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn render_radial(
    device: &dyn GraphicsDevice,
    encoder: &mut dyn CommandEncoder,
    renderers: &mut ShadowRenderers,
    pool: &GpuResourcePool,
    cubemaps: &mut Vec<ShadowCubemap>,
    infos: &mut Vec<ShadowInfo>,
    lights: &mut AHashMap<usize, LightShadows>,
    scene: &SceneFrame,
    request: LocalRequest,
    num_views: usize,
) -> Result<(), ShadowError> {
    let light = &scene.lights[request.light_idx];
    let size = request.size;

    let cubemap_idx = match cubemaps.iter().position(|c| c.is_free() && c.size() == size) {
        Some(i) => i,
        None => {
            let mut cubemap = ShadowCubemap::new(pool, size)?;
            let group = create_sampling_group(device, &renderers.projector, ShadowKind::Radial, cubemap.texture())?;
            cubemap.set_sampling_group(group);
            cubemaps.push(cubemap);
            cubemaps.len() - 1
        }
    };
    let cubemap = &mut cubemaps[cubemap_idx];
    cubemap.mark_as_used();

    let (faces, depth_range) = math::cube_face_view_projs(light);
    let depth_bias = math::depth_bias(light, size, light.attenuation_radius, depth_range);
    let light_bounds = light.bounds();
    for (face, view_proj) in faces.iter().enumerate() {
        let Some(target) = cubemap.texture().layer_view(face as u32) else {
            continue;
        };
        let casters = cull_casters(scene, |bounds| {
            bounds.intersects(&light_bounds) && math::caster_in_frustum(view_proj, bounds)
        });
        renderers.depth.render(
            device,
            encoder,
            DepthTarget {
                view: target,
                viewport: Rect2I::new(0, 0, size, size),
                clear: true,
            },
            view_proj,
            depth_bias,
            &casters,
        )?;
    }

    let area = Rect2I::new(0, 0, size, size);
    let info = ShadowInfo {
        light_idx: request.light_idx,
        texture: ShadowTexture::Cubemap(cubemap_idx),
        area,
        norm_area: area.normalized(size, size),
        map_size: size,
        depth_near: math::SHADOW_NEAR_PLANE,
        depth_far: math::SHADOW_NEAR_PLANE + depth_range,
        depth_range,
        depth_bias,
        depth_fade: math::fade_transition(light, size, light.attenuation_radius, depth_range),
        cascade_idx: None,
        cascade_split: [0.0; 2],
        fade_range: 0.0,
        shadow_vp: faces.to_vec(),
        fade_per_view: request.fade_per_view,
    };
    push_info(infos, lights, info, num_views);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn render_cascades(
    device: &dyn GraphicsDevice,
    encoder: &mut dyn CommandEncoder,
    depth: &mut ShadowDepthRenderer,
    projector: &ShadowProjector,
    pool: &GpuResourcePool,
    options: &RendererOptions,
    cascaded_maps: &mut Vec<ShadowCascadedMap>,
    infos: &mut Vec<ShadowInfo>,
    lights: &mut AHashMap<usize, LightShadows>,
    scene: &SceneFrame,
    light_idx: usize,
    (view_index, view): (usize, &RendererView),
    num_views: usize,
) -> Result<(), ShadowError> {
    let light = &scene.lights[light_idx];
    let size = options.shadow_map_size.max(MIN_SHADOW_MAP_SIZE);

    let map_idx = match cascaded_maps.iter().position(|m| m.is_free() && m.size() == size) {
        Some(i) => i,
        None => {
            let mut map = ShadowCascadedMap::new(pool, size)?;
            let group = create_sampling_group(device, projector, ShadowKind::Directional, map.texture())?;
            map.set_sampling_group(group);
            cascaded_maps.push(map);
            cascaded_maps.len() - 1
        }
    };
    let map = &mut cascaded_maps[map_idx];
    map.mark_as_used();

    let caster_bounds: Vec<Sphere> = scene.shadow_casters.iter().map(|c| c.bounds).collect();
    let splits = math::cascade_splits(view.near, view.far, options);
    let direction = light.direction.normalize_or(Vec3::NEG_Z);

    for cascade in 0..NUM_CASCADE_SPLITS {
        let last = cascade + 1 == NUM_CASCADE_SPLITS;
        let fade_range = if last { 0.0 } else { math::cascade_fade_range(&splits, cascade) };
        let corners = math::sub_frustum_corners(view, splits[cascade], splits[cascade + 1] + fade_range);
        let bounds = Sphere::enclosing(&corners);
        let projection = math::cascade_projection(&bounds, direction, size, &caster_bounds);

        let casters = cull_casters(scene, |b| math::caster_in_cascade(&projection.view_proj, b));
        let depth_bias = math::depth_bias(light, size, projection.radius, projection.depth_range);
        let Some(target) = map.texture().layer_view(cascade as u32) else {
            continue;
        };
        depth.render(
            device,
            encoder,
            DepthTarget {
                view: target,
                viewport: Rect2I::new(0, 0, size, size),
                clear: true,
            },
            &projection.view_proj,
            depth_bias,
            &casters,
        )?;

        let mut fade_per_view = vec![1.0; num_views];
        fade_per_view[view_index] = 0.0;
        let area = Rect2I::new(0, 0, size, size);
        push_info(
            infos,
            lights,
            ShadowInfo {
                light_idx,
                texture: ShadowTexture::Cascaded(map_idx),
                area,
                norm_area: area.normalized(size, size),
                map_size: size,
                depth_near: 0.0,
                depth_far: projection.depth_range,
                depth_range: projection.depth_range,
                depth_bias,
                depth_fade: math::fade_transition(light, size, projection.radius, projection.depth_range),
                cascade_idx: Some(cascade as u32),
                cascade_split: [splits[cascade], splits[cascade + 1]],
                fade_range,
                shadow_vp: vec![projection.view_proj],
                fade_per_view,
            },
            num_views,
        );
    }
    Ok(())
}
