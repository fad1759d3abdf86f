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
use beast_core::renderer::{GraphicsDevice, RenderError, RendererOptions, SceneFrame, ViewFlags, ViewId};
use beast_lanes::compositor::nodes::{
    FINAL_RESOLVE, TILED_DEFERRED_LIGHTING, UNFLATTEN_LIGHT_ACCUM, UNFLATTEN_SCENE_COLOR,
};
use beast_lanes::RenderBeast;
use common::{lit_scene, test_view, MockGraphicsDevice};
use std::sync::Arc;

fn renderer_on(device: &Arc<MockGraphicsDevice>) -> RenderBeast {
    common::init_logger();
    RenderBeast::new(device.clone() as Arc<dyn GraphicsDevice>, RendererOptions::default()).unwrap()
}

#[test]
fn invalid_options_fail_initialization() {
    let device = MockGraphicsDevice::shared();
    let options = RendererOptions {
        shadow_map_size: 1000,
        ..Default::default()
    };
    let err = RenderBeast::new(device as Arc<dyn GraphicsDevice>, options).unwrap_err();
    assert!(matches!(err, RenderError::InitializationFailed(_)));
}

#[test]
fn a_frame_records_every_pass_and_submits_once() {
    let device = MockGraphicsDevice::shared();
    let mut renderer = renderer_on(&device);
    renderer
        .render_frame(&lit_scene(), &[test_view(1, SampleCount::X1, ViewFlags::EMPTY)])
        .unwrap();

    assert_eq!(renderer.frame_count(), 1);
    assert_eq!(renderer.view_count(), 1);
    let compositor = renderer.compositor(ViewId(1)).unwrap();
    assert!(compositor.is_valid());
    assert_eq!(compositor.final_node(), Some(FINAL_RESOLVE));

    let rec = device.recording();
    assert_eq!(rec.submitted, 1);
    assert!(rec.has_compute_pass("Light Grid"));
    assert!(rec.has_render_pass("Shadow Depth Pass"));
    assert!(rec.has_render_pass("G-Buffer Pass"));
    assert!(rec.has_compute_pass("Tiled Deferred Lighting"));
    assert!(rec.has_render_pass("Standard Deferred Lighting"));
    assert!(rec.has_compute_pass("Tiled Deferred IBL"));
    assert!(rec.has_render_pass("Clustered Forward Pass"));
    assert!(rec.has_render_pass("Final Resolve"));
    assert!(rec.draws > 0);
}

#[test]
fn compiled_shaders_have_their_defines_resolved() {
    let device = MockGraphicsDevice::shared();
    let mut renderer = renderer_on(&device);
    renderer
        .render_frame(
            &lit_scene(),
            &[
                test_view(1, SampleCount::X1, ViewFlags::EMPTY),
                test_view(2, SampleCount::X4, ViewFlags::EMPTY),
            ],
        )
        .unwrap();

    let rec = device.recording();
    assert!(!rec.shader_sources.is_empty());
    for source in &rec.shader_sources {
        assert!(!source.contains("#ifdef"), "unresolved define in:\n{source}");
        assert!(!source.contains("#endif"), "unresolved define in:\n{source}");
    }
}

#[test]
fn multisampled_views_get_unflatten_nodes() {
    let device = MockGraphicsDevice::shared();
    let mut renderer = renderer_on(&device);
    renderer
        .render_frame(
            &lit_scene(),
            &[
                test_view(1, SampleCount::X1, ViewFlags::EMPTY),
                test_view(2, SampleCount::X4, ViewFlags::EMPTY),
            ],
        )
        .unwrap();

    let plain = renderer.compositor(ViewId(1)).unwrap().node_ids();
    let msaa = renderer.compositor(ViewId(2)).unwrap().node_ids();
    assert!(!plain.contains(&UNFLATTEN_SCENE_COLOR));
    assert!(msaa.contains(&UNFLATTEN_SCENE_COLOR));
    assert!(msaa.contains(&UNFLATTEN_LIGHT_ACCUM));
}

#[test]
fn views_are_rebuilt_when_their_shape_changes() {
    let device = MockGraphicsDevice::shared();
    let mut renderer = renderer_on(&device);
    let scene = lit_scene();
    renderer
        .render_frame(&scene, &[test_view(1, SampleCount::X1, ViewFlags::EMPTY)])
        .unwrap();
    renderer
        .render_frame(&scene, &[test_view(1, SampleCount::X4, ViewFlags::EMPTY)])
        .unwrap();
    let ids = renderer.compositor(ViewId(1)).unwrap().node_ids();
    assert!(ids.contains(&UNFLATTEN_SCENE_COLOR));
    assert_eq!(renderer.view_count(), 1);
}

#[test]
fn new_options_apply_on_the_next_frame() {
    let device = MockGraphicsDevice::shared();
    let mut renderer = renderer_on(&device);
    let views = [test_view(1, SampleCount::X1, ViewFlags::EMPTY)];
    renderer.render_frame(&lit_scene(), &views).unwrap();
    assert!(renderer.compositor(ViewId(1)).unwrap().node_ids().contains(&TILED_DEFERRED_LIGHTING));

    let invalid = RendererOptions {
        anisotropy_max: 0,
        ..Default::default()
    };
    assert!(renderer.set_options(invalid).is_err());
    assert!(renderer.compositor(ViewId(1)).unwrap().is_valid());

    renderer
        .set_options(RendererOptions {
            tiled_deferred: false,
            ..Default::default()
        })
        .unwrap();
    assert!(!renderer.compositor(ViewId(1)).unwrap().is_valid());
    assert!(!renderer.options().tiled_deferred);

    renderer.render_frame(&lit_scene(), &views).unwrap();
    let compositor = renderer.compositor(ViewId(1)).unwrap();
    assert!(compositor.is_valid());
    assert!(!compositor.node_ids().contains(&TILED_DEFERRED_LIGHTING));
}

#[test]
fn devices_without_compute_build_the_grid_on_the_cpu() {
    let device = Arc::new(MockGraphicsDevice::with_compute(false));
    let mut renderer = renderer_on(&device);
    renderer
        .render_frame(&lit_scene(), &[test_view(1, SampleCount::X1, ViewFlags::EMPTY)])
        .unwrap();
    let rec = device.recording();
    assert!(!rec.has_compute_pass("Light Grid"));
    assert!(!rec.buffer_writes.is_empty());
}

#[test]
fn empty_scene_still_resolves_the_view() {
    let device = MockGraphicsDevice::shared();
    let mut renderer = renderer_on(&device);
    renderer
        .render_frame(&SceneFrame::default(), &[test_view(1, SampleCount::X1, ViewFlags::EMPTY)])
        .unwrap();
    let rec = device.recording();
    assert!(rec.has_render_pass("Final Resolve"));
    assert!(!rec.has_render_pass("Clustered Forward Pass"));
}

#[test]
fn unlit_views_skip_direct_lighting_passes() {
    let device = MockGraphicsDevice::shared();
    let mut renderer = renderer_on(&device);
    renderer
        .render_frame(&lit_scene(), &[test_view(1, SampleCount::X1, ViewFlags::NO_LIGHTING)])
        .unwrap();
    let rec = device.recording();
    assert!(!rec.has_compute_pass("Tiled Deferred Lighting"));
    assert!(!rec.has_render_pass("Standard Deferred Lighting"));
    assert!(rec.has_compute_pass("Tiled Deferred IBL"));
}

#[test]
fn removed_views_release_their_state() {
    let device = MockGraphicsDevice::shared();
    let mut renderer = renderer_on(&device);
    let views = [
        test_view(1, SampleCount::X1, ViewFlags::EMPTY),
        test_view(2, SampleCount::X1, ViewFlags::EMPTY),
    ];
    renderer.render_frame(&lit_scene(), &views).unwrap();
    assert_eq!(renderer.view_count(), 2);

    renderer.remove_view(ViewId(2));
    assert_eq!(renderer.view_count(), 1);
    assert!(renderer.compositor(ViewId(2)).is_none());
    renderer.remove_view(ViewId(42));
    assert_eq!(renderer.view_count(), 1);

    renderer.render_frame(&lit_scene(), &views[..1]).unwrap();
    assert_eq!(renderer.frame_count(), 2);
}

#[test]
fn frames_after_shutdown_are_rejected() {
    let device = MockGraphicsDevice::shared();
    let mut renderer = renderer_on(&device);
    renderer
        .render_frame(&lit_scene(), &[test_view(1, SampleCount::X1, ViewFlags::EMPTY)])
        .unwrap();

    assert!(device.recording().live_count(common::Kind::RenderPipeline) > 0);

    renderer.shutdown();
    assert_eq!(renderer.view_count(), 0);
    assert!(renderer.model_bind_group_layout().is_none());
    assert!(renderer.shading_layout().is_none());
    let err = renderer
        .render_frame(&lit_scene(), &[test_view(1, SampleCount::X1, ViewFlags::EMPTY)])
        .unwrap_err();
    assert!(matches!(err, RenderError::NotInitialized));
    assert_eq!(device.recording().live_count(common::Kind::ComputePipeline), 0);
    assert_eq!(device.recording().live_count(common::Kind::RenderPipeline), 0);
}

#[test]
fn unknown_final_node_skips_the_view_until_restored() {
    let device = MockGraphicsDevice::shared();
    let mut renderer = renderer_on(&device);
    let views = [test_view(1, SampleCount::X1, ViewFlags::EMPTY)];
    assert!(renderer.registry_mut().contains(FINAL_RESOLVE));

    renderer.set_final_node("Missing");
    renderer.render_frame(&lit_scene(), &views).unwrap();
    assert!(!device.recording().has_render_pass("Final Resolve"));

    renderer.set_final_node(FINAL_RESOLVE);
    renderer.render_frame(&lit_scene(), &views).unwrap();
    assert!(device.recording().has_render_pass("Final Resolve"));
}
