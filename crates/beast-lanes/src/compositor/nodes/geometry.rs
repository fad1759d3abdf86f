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

//! Scene geometry passes: the opaque G-buffer pass and clustered forward
//! shading of transparent elements.

use super::{
    grid_group, node_identity, output, CLUSTERED_FORWARD, GBUFFER, SCENE_COLOR, SCENE_DEPTH, TILED_DEFERRED_IBL,
    UNFLATTEN_SCENE_COLOR,
};
use crate::compositor::outputs::{GBufferOutput, SceneColorOutput, SceneDepthOutput};
use crate::compositor::{CompositorNode, CompositorNodeType};
use crate::frame;
use beast_core::lane::{Lane, LaneContext, LaneError, LaneKind};
use beast_core::math::LinearRgba;
use beast_core::renderer::api::{
    BindGroupId, Operations, RenderPassColorAttachment, RenderPassDepthStencilAttachment, RenderPassDescriptor,
    RenderPipelineId, TextureViewId,
};
use beast_core::renderer::{
    RenderElement, RenderPass, RendererOptions, RendererView, SceneFrame, StateReductionMode,
};
use std::cmp::Ordering;

fn view_depth(element: &RenderElement, view: &RendererView) -> f32 {
    (element.mesh.bounds.center - view.position()).dot(view.forward())
}

/// Orders opaque elements for the G-buffer pass.
///
/// `Material` groups elements sharing a material key and draws each group
/// front to back; `Distance` draws everything front to back. Sorting is
/// stable, so equal keys keep submission order.
pub fn sort_opaque<'a>(
    elements: &'a [RenderElement],
    view: &RendererView,
    mode: StateReductionMode,
) -> Vec<&'a RenderElement> {
    let mut sorted: Vec<(f32, &RenderElement)> = elements.iter().map(|e| (view_depth(e, view), e)).collect();
    match mode {
        StateReductionMode::None => {}
        StateReductionMode::Material => sorted.sort_by(|(da, a), (db, b)| {
            a.material_key.cmp(&b.material_key).then_with(|| da.total_cmp(db))
        }),
        StateReductionMode::Distance => sorted.sort_by(|(da, _), (db, _)| da.total_cmp(db)),
    }
    sorted.into_iter().map(|(_, e)| e).collect()
}

/// Orders transparent elements back to front.
pub fn sort_transparent<'a>(elements: &'a [RenderElement], view: &RendererView) -> Vec<&'a RenderElement> {
    let mut sorted: Vec<(f32, &RenderElement)> = elements.iter().map(|e| (view_depth(e, view), e)).collect();
    sorted.sort_by(|(da, _), (db, _)| db.partial_cmp(da).unwrap_or(Ordering::Equal));
    sorted.into_iter().map(|(_, e)| e).collect()
}

fn cleared(view: &TextureViewId, value: LinearRgba) -> RenderPassColorAttachment<'_> {
    RenderPassColorAttachment {
        view,
        resolve_target: None,
        ops: Operations::clear(value),
    }
}

/// Draws elements with `@group(0)` already bound, skipping redundant
/// pipeline and material binds.
fn draw_elements(pass: &mut dyn RenderPass<'_>, elements: &[&RenderElement]) {
    let mut pipeline: Option<RenderPipelineId> = None;
    let mut material: Option<BindGroupId> = None;
    for element in elements {
        if pipeline != Some(element.pipeline) {
            pass.set_pipeline(element.pipeline);
            pipeline = Some(element.pipeline);
            material = None;
        }
        if material != Some(element.material_bind_group) {
            pass.set_bind_group(2, element.material_bind_group, &[]);
            material = Some(element.material_bind_group);
        }
        let mesh = &element.mesh;
        pass.set_bind_group(1, mesh.model_bind_group, &[mesh.model_offset]);
        pass.set_vertex_buffer(0, mesh.vertex_buffer, 0);
        match mesh.index_buffer {
            Some((buffer, format)) => {
                pass.set_index_buffer(buffer, 0, format);
                pass.draw_indexed(0..mesh.element_count, 0, 0..1);
            }
            None => pass.draw(0..mesh.element_count, 0..1),
        }
    }
}

/// Renders opaque elements into the G-buffer and scene depth.
///
/// Material pipelines bind the light grid at `@group(0)`, the model at
/// `@group(1)` and their material at `@group(2)`.
#[derive(Debug, Default)]
pub struct GBufferNode;

impl Lane for GBufferNode {
    node_identity!(GBUFFER, LaneKind::Geometry);

    fn estimate_cost(&self, ctx: &LaneContext) -> f32 {
        frame::get_ref::<SceneFrame>(ctx, "Ref<SceneFrame>").map_or(1.0, |scene| 1.0 + scene.opaque.len() as f32 * 0.01)
    }

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let pool = frame::pool(ctx)?;
        let view = frame::get_ref::<RendererView>(ctx, "Ref<RendererView>")?;
        let options = frame::get_ref::<RendererOptions>(ctx, "Ref<RendererOptions>")?;
        let scene = frame::get_ref::<SceneFrame>(ctx, "Ref<SceneFrame>")?;
        let grid = grid_group(ctx)?;
        let depth = output::<SceneDepthOutput>(ctx, "SceneDepthOutput")?.texture.view();
        let encoder = frame::encoder(ctx)?;

        let gbuffer = GBufferOutput::acquire(&pool, view).map_err(LaneError::execution)?;
        let elements = sort_opaque(&scene.opaque, view, options.state_reduction);
        {
            let views = gbuffer.views();
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("G-Buffer Pass"),
                color_attachments: &[
                    cleared(&views.albedo, LinearRgba::TRANSPARENT),
                    cleared(&views.normal, LinearRgba::TRANSPARENT),
                    cleared(&views.material, LinearRgba::TRANSPARENT),
                    // Far plane
                    cleared(&views.depth, LinearRgba::WHITE),
                ],
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: &depth,
                    depth_ops: Some(Operations::clear(1.0)),
                    stencil_ops: Some(Operations::clear(0)),
                }),
            });
            pass.set_bind_group(0, grid, &[]);
            draw_elements(pass.as_mut(), &elements);
        }
        log::trace!("GBufferNode: Drew {} opaque elements for view {:?}", elements.len(), view.id);

        ctx.insert(gbuffer);
        Ok(())
    }
}

impl CompositorNode for GBufferNode {
    fn clear(&self, ctx: &mut LaneContext) {
        if let (Some(gbuffer), Ok(pool)) = (ctx.remove::<GBufferOutput>(), frame::pool(ctx)) {
            gbuffer.release(&pool);
        }
    }
}

impl CompositorNodeType for GBufferNode {
    const ID: &'static str = GBUFFER;

    fn dependencies(_view: &RendererView, _options: &RendererOptions) -> Vec<&'static str> {
        vec![SCENE_DEPTH]
    }

    fn create() -> Self {
        Self
    }
}

/// Draws transparent elements over the scene color, shading them with the
/// light grid. Depth is tested but not written.
#[derive(Debug, Default)]
pub struct ClusteredForwardNode;

impl Lane for ClusteredForwardNode {
    node_identity!(CLUSTERED_FORWARD, LaneKind::Geometry);

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let scene = frame::get_ref::<SceneFrame>(ctx, "Ref<SceneFrame>")?;
        if scene.transparent.is_empty() {
            return Ok(());
        }
        let view = frame::get_ref::<RendererView>(ctx, "Ref<RendererView>")?;
        let grid = grid_group(ctx)?;
        let SceneColorOutput(color) = output::<SceneColorOutput>(ctx, "SceneColorOutput")?;
        let color = color.texture.view();
        let depth = output::<SceneDepthOutput>(ctx, "SceneDepthOutput")?.texture.view();
        let encoder = frame::encoder(ctx)?;

        let elements = sort_transparent(&scene.transparent, view);
        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("Clustered Forward Pass"),
            color_attachments: &[RenderPassColorAttachment {
                view: &color,
                resolve_target: None,
                ops: Operations::load(),
            }],
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: &depth,
                depth_ops: None,
                stencil_ops: None,
            }),
        });
        pass.set_bind_group(0, grid, &[]);
        draw_elements(pass.as_mut(), &elements);
        Ok(())
    }
}

impl CompositorNode for ClusteredForwardNode {}

impl CompositorNodeType for ClusteredForwardNode {
    const ID: &'static str = CLUSTERED_FORWARD;

    fn dependencies(view: &RendererView, _options: &RendererOptions) -> Vec<&'static str> {
        let color_source = if view.sample_count.is_multisampled() {
            UNFLATTEN_SCENE_COLOR
        } else {
            TILED_DEFERRED_IBL
        };
        vec![SCENE_COLOR, SCENE_DEPTH, color_source]
    }

    fn create() -> Self {
        Self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beast_core::math::{Mat4, Rect2I, Sphere, Vec3};
    use beast_core::renderer::api::{BufferId, SampleCount, TextureFormat};
    use beast_core::renderer::{MeshDraw, ViewFlags, ViewId};

    fn camera(sample_count: SampleCount) -> RendererView {
        RendererView {
            id: ViewId(1),
            view: Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y),
            projection: Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0),
            near: 0.1,
            far: 100.0,
            viewport: Rect2I::new(0, 0, 64, 64),
            sample_count,
            target: TextureViewId(0),
            target_format: TextureFormat::Rgba8UnormSrgb,
            flags: ViewFlags::EMPTY,
        }
    }

    fn element(depth: f32, material_key: u64) -> RenderElement {
        RenderElement {
            mesh: MeshDraw {
                vertex_buffer: BufferId(0),
                vertex_stride: 12,
                index_buffer: None,
                element_count: 3,
                model_bind_group: BindGroupId(0),
                model_offset: 0,
                bounds: Sphere::new(Vec3::new(0.0, 0.0, -depth), 1.0),
            },
            pipeline: RenderPipelineId(material_key as usize),
            material_bind_group: BindGroupId(material_key as usize),
            material_key,
        }
    }

    fn depths(sorted: &[&RenderElement]) -> Vec<f32> {
        sorted.iter().map(|e| -e.mesh.bounds.center.z).collect()
    }

    #[test]
    fn distance_mode_draws_front_to_back() {
        let elements = [element(30.0, 0), element(5.0, 1), element(12.0, 0)];
        let sorted = sort_opaque(&elements, &camera(SampleCount::X1), StateReductionMode::Distance);
        assert_eq!(depths(&sorted), vec![5.0, 12.0, 30.0]);
    }

    #[test]
    fn material_mode_groups_then_orders_by_distance() {
        let elements = [element(30.0, 2), element(5.0, 1), element(12.0, 2), element(8.0, 1)];
        let sorted = sort_opaque(&elements, &camera(SampleCount::X1), StateReductionMode::Material);
        assert_eq!(depths(&sorted), vec![5.0, 8.0, 12.0, 30.0]);
        let keys: Vec<u64> = sorted.iter().map(|e| e.material_key).collect();
        assert_eq!(keys, vec![1, 1, 2, 2]);
    }

    #[test]
    fn no_reduction_keeps_submission_order() {
        let elements = [element(30.0, 2), element(5.0, 1)];
        let sorted = sort_opaque(&elements, &camera(SampleCount::X1), StateReductionMode::None);
        assert_eq!(depths(&sorted), vec![30.0, 5.0]);
    }

    #[test]
    fn transparent_elements_draw_back_to_front() {
        let elements = [element(5.0, 0), element(30.0, 0), element(12.0, 0)];
        let sorted = sort_transparent(&elements, &camera(SampleCount::X1));
        assert_eq!(depths(&sorted), vec![30.0, 12.0, 5.0]);
    }

    #[test]
    fn forward_pass_reads_unflattened_color_under_msaa() {
        let options = RendererOptions::default();
        let deps = ClusteredForwardNode::dependencies(&camera(SampleCount::X4), &options);
        assert!(deps.contains(&UNFLATTEN_SCENE_COLOR));
        let deps = ClusteredForwardNode::dependencies(&camera(SampleCount::X1), &options);
        assert!(deps.contains(&TILED_DEFERRED_IBL));
    }
}
