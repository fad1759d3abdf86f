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

mod common;

use beast_core::renderer::api::SampleCount;
use beast_core::renderer::{GraphicsDevice, LightType, RendererOptions, SceneFrame, ViewFlags};
use beast_lanes::pool::GpuResourcePool;
use beast_lanes::shadow::maps::{evict_unused, ShadowCubemap, ShadowMap, ShadowMapAtlas};
use beast_lanes::shadow::{
    ShadowTexture, MAX_ATLAS_SIZE, MAX_UNUSED_FRAMES, NUM_CASCADE_SPLITS, SHADOW_MAP_BORDER,
};
use beast_lanes::RenderBeast;
use common::{lit_scene, test_view, MockGraphicsDevice};
use std::sync::Arc;

const DIRECTIONAL: usize = 0;
const SHADOWED_RADIAL: usize = 1;
const SPOT: usize = 2;
const UNSHADOWED_RADIAL: usize = 3;

fn renderer() -> (Arc<MockGraphicsDevice>, RenderBeast) {
    common::init_logger();
    let device = MockGraphicsDevice::shared();
    let renderer = RenderBeast::new(device.clone() as Arc<dyn GraphicsDevice>, RendererOptions::default()).unwrap();
    (device, renderer)
}

fn unshadowed(mut scene: SceneFrame) -> SceneFrame {
    for light in &mut scene.lights {
        light.cast_shadows = false;
    }
    scene
}

#[test]
fn each_light_type_gets_its_own_kind_of_map() {
    let (_device, mut renderer) = renderer();
    let scene = lit_scene();
    renderer
        .render_frame(&scene, &[test_view(1, SampleCount::X1, ViewFlags::EMPTY)])
        .unwrap();

    let shadows = renderer.shadows();
    assert_eq!(shadows.atlases().len(), 1);
    assert_eq!(shadows.cubemaps().len(), 1);
    assert_eq!(shadows.cascaded_maps().len(), 1);

    assert!(shadows.has_shadows(0, SPOT));
    assert!(shadows.has_shadows(0, SHADOWED_RADIAL));
    assert!(shadows.has_shadows(0, DIRECTIONAL));
    assert!(!shadows.has_shadows(0, UNSHADOWED_RADIAL));

    let spot = shadows.shadows_of(0, SPOT).next().unwrap();
    assert_eq!(spot.texture, ShadowTexture::Atlas(0));
    assert!(spot.area.x >= SHADOW_MAP_BORDER as i32 && spot.area.y >= SHADOW_MAP_BORDER as i32);
    assert!(spot.area.x as u32 + spot.area.width <= MAX_ATLAS_SIZE);
    assert_eq!(spot.shadow_vp.len(), 1);

    let radial = shadows.shadows_of(0, SHADOWED_RADIAL).next().unwrap();
    assert_eq!(radial.texture, ShadowTexture::Cubemap(0));
    assert_eq!(radial.shadow_vp.len(), 6);
}

#[test]
fn directional_light_gets_one_cascade_per_split() {
    let (_device, mut renderer) = renderer();
    renderer
        .render_frame(&lit_scene(), &[test_view(1, SampleCount::X1, ViewFlags::EMPTY)])
        .unwrap();

    let cascades: Vec<_> = renderer.shadows().shadows_of(0, DIRECTIONAL).collect();
    assert_eq!(cascades.len(), NUM_CASCADE_SPLITS);
    for (i, cascade) in cascades.iter().enumerate() {
        assert_eq!(cascade.cascade_idx, Some(i as u32));
        assert!(cascade.cascade_split[0] < cascade.cascade_split[1]);
    }
    for pair in cascades.windows(2) {
        assert_eq!(pair[0].cascade_split[1], pair[1].cascade_split[0]);
    }
}

#[test]
fn views_without_shadows_render_no_maps() {
    let (_device, mut renderer) = renderer();
    renderer
        .render_frame(&lit_scene(), &[test_view(1, SampleCount::X1, ViewFlags::NO_SHADOWS)])
        .unwrap();
    let shadows = renderer.shadows();
    assert!(shadows.shadow_infos().is_empty());
    assert!(shadows.atlases().is_empty());
    assert!(shadows.cascaded_maps().is_empty());
}

#[test]
fn every_shadowing_view_gets_its_own_cascades() {
    let (_device, mut renderer) = renderer();
    let views = [
        test_view(1, SampleCount::X1, ViewFlags::EMPTY),
        test_view(2, SampleCount::X1, ViewFlags::EMPTY),
    ];
    renderer.render_frame(&lit_scene(), &views).unwrap();
    let shadows = renderer.shadows();
    assert_eq!(shadows.cascaded_maps().len(), 2);
    assert_eq!(shadows.shadows_of(1, DIRECTIONAL).count(), NUM_CASCADE_SPLITS);
}

#[test]
fn maps_unused_for_long_enough_return_to_the_pool() {
    let (_device, mut renderer) = renderer();
    let views = [test_view(1, SampleCount::X1, ViewFlags::EMPTY)];
    renderer.render_frame(&lit_scene(), &views).unwrap();
    assert_eq!(renderer.shadows().cubemaps().len(), 1);

    let dark = unshadowed(lit_scene());
    for _ in 1..MAX_UNUSED_FRAMES {
        renderer.render_frame(&dark, &views).unwrap();
    }
    assert_eq!(renderer.shadows().cubemaps().len(), 1);

    renderer.render_frame(&dark, &views).unwrap();
    let shadows = renderer.shadows();
    assert!(shadows.atlases().is_empty());
    assert!(shadows.cubemaps().is_empty());
    assert!(shadows.cascaded_maps().is_empty());
}

#[test]
fn reused_maps_survive_consecutive_frames() {
    let (device, mut renderer) = renderer();
    let views = [test_view(1, SampleCount::X1, ViewFlags::EMPTY)];
    renderer.render_frame(&lit_scene(), &views).unwrap();
    let textures = device.recording().created_count(common::Kind::Texture);

    renderer.render_frame(&lit_scene(), &views).unwrap();
    assert_eq!(renderer.shadows().atlases().len(), 1);
    assert_eq!(device.recording().created_count(common::Kind::Texture), textures);
}

#[test]
fn atlas_reserves_borders_and_clears_once_per_frame() {
    let device = MockGraphicsDevice::shared();
    let pool = GpuResourcePool::new(device as Arc<dyn GraphicsDevice>);
    let mut atlas = ShadowMapAtlas::new(&pool).unwrap();

    let first = atlas.add_map(1024, SHADOW_MAP_BORDER).unwrap();
    assert_eq!((first.x, first.y), (SHADOW_MAP_BORDER as i32, SHADOW_MAP_BORDER as i32));
    assert_eq!(first.width, 1024);
    let second = atlas.add_map(1024, SHADOW_MAP_BORDER).unwrap();
    assert!(!first.overlaps(&second));

    assert!(atlas.take_clear());
    assert!(!atlas.take_clear());
    atlas.clear();
    assert!(atlas.take_clear());
    assert_eq!(atlas.add_map(1024, SHADOW_MAP_BORDER), Some(first));

    assert_eq!(atlas.add_map(MAX_ATLAS_SIZE, SHADOW_MAP_BORDER), None);
}

#[test]
fn eviction_counts_frames_since_last_use() {
    let mock = MockGraphicsDevice::shared();
    let device: Arc<dyn GraphicsDevice> = mock.clone();
    let pool = GpuResourcePool::new(device.clone());
    let mut maps = vec![ShadowCubemap::new(&pool, 256).unwrap()];

    maps[0].mark_as_used();
    assert!(!maps[0].is_free());
    for _ in 0..MAX_UNUSED_FRAMES - 1 {
        maps[0].clear();
    }
    assert!(maps[0].is_free());
    assert_eq!(evict_unused(&mut maps, device.as_ref(), &pool), 0);

    maps[0].clear();
    assert_eq!(evict_unused(&mut maps, device.as_ref(), &pool), 1);
    assert_eq!(pool.stats().free_textures, 1);
}

#[test]
fn light_types_are_sorted_directional_first() {
    let (_device, mut renderer) = renderer();
    renderer
        .render_frame(&lit_scene(), &[test_view(1, SampleCount::X1, ViewFlags::EMPTY)])
        .unwrap();
    let lights = &renderer.scene_lighting().visible_lights;
    assert_eq!(lights.num_lights(LightType::Directional), 1);
    assert_eq!(lights.num_shadowed_lights(LightType::Radial), 1);
    assert_eq!(lights.num_unshadowed_lights(LightType::Radial), 1);
    assert_eq!(lights.offset(LightType::Spot), 3);
}

#[test]
fn a_failing_light_does_not_cost_the_others_their_shadows() {
    let (device, mut renderer) = renderer();
    device.recording().fail_cube_textures = true;
    renderer
        .render_frame(&lit_scene(), &[test_view(1, SampleCount::X1, ViewFlags::EMPTY)])
        .unwrap();

    let shadows = renderer.shadows();
    assert!(shadows.cubemaps().is_empty());
    assert!(!shadows.has_shadows(0, SHADOWED_RADIAL));
    assert!(shadows.has_shadows(0, SPOT));
    assert!(shadows.has_shadows(0, DIRECTIONAL));
}

#[test]
fn unused_maps_are_evicted_while_a_light_keeps_failing() {
    let (device, mut renderer) = renderer();
    let views = [test_view(1, SampleCount::X1, ViewFlags::EMPTY)];
    renderer.render_frame(&lit_scene(), &views).unwrap();
    assert_eq!(renderer.shadows().cubemaps().len(), 1);
    assert!(renderer.shadows().cubemaps()[0].size() > 64);

    // The radial light now needs a smaller cubemap, which cannot be created.
    device.recording().fail_cube_textures = true;
    renderer
        .set_options(RendererOptions {
            shadow_map_size: 64,
            ..Default::default()
        })
        .unwrap();
    for _ in 0..MAX_UNUSED_FRAMES {
        renderer.render_frame(&lit_scene(), &views).unwrap();
    }

    let shadows = renderer.shadows();
    assert!(shadows.cubemaps().is_empty());
    assert!(!shadows.has_shadows(0, SHADOWED_RADIAL));
    assert!(shadows.has_shadows(0, SPOT));
}
