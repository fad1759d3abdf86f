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

//! Typed access to the per-frame [`LaneContext`].
//!
//! The renderer front end fills one context per view with:
//!
//! | key                              | contents                                  |
//! |----------------------------------|-------------------------------------------|
//! | `Arc<dyn GraphicsDevice>`        | the device                                |
//! | `Arc<GpuResourcePool>`           | the resource pool                         |
//! | `Slot<dyn CommandEncoder>`       | the frame's encoder                       |
//! | `Ref<RendererView>`              | the view being rendered                   |
//! | `ViewIndex`                      | its index among the frame's views         |
//! | `Ref<RendererOptions>`           | renderer options                          |
//! | `Ref<SceneFrame>`                | scene input                               |
//! | `Ref<SceneLighting>`             | visible lights and probes, GPU buffers    |
//! | `Slot<LightGrid>`                | the view's light grid                     |
//! | `Ref<ShadowRendering>`           | this frame's shadow maps                  |
//! | `Ref<LightingResources>`         | shared lighting pipelines and lookups     |
//!
//! Compositor nodes add their outputs as they run.

use crate::pool::GpuResourcePool;
use beast_core::lane::{LaneContext, LaneError, Ref, Slot};
use beast_core::renderer::{CommandEncoder, GraphicsDevice};
use std::sync::Arc;

/// Index of the view being rendered in the frame's view list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewIndex(pub usize);

pub(crate) fn device(ctx: &LaneContext) -> Result<Arc<dyn GraphicsDevice>, LaneError> {
    ctx.get::<Arc<dyn GraphicsDevice>>()
        .cloned()
        .ok_or(LaneError::missing("Arc<dyn GraphicsDevice>"))
}

pub(crate) fn pool(ctx: &LaneContext) -> Result<Arc<GpuResourcePool>, LaneError> {
    ctx.get::<Arc<GpuResourcePool>>()
        .cloned()
        .ok_or(LaneError::missing("Arc<GpuResourcePool>"))
}

pub(crate) fn encoder(ctx: &LaneContext) -> Result<&mut (dyn CommandEncoder + 'static), LaneError> {
    ctx.get::<Slot<dyn CommandEncoder>>()
        .map(|slot| slot.get())
        .ok_or(LaneError::missing("Slot<dyn CommandEncoder>"))
}

pub(crate) fn get_ref<'a, T: ?Sized + 'static>(ctx: &'a LaneContext, name: &'static str) -> Result<&'a T, LaneError> {
    ctx.get::<Ref<T>>()
        .map(|r| r.get())
        .ok_or(LaneError::missing(name))
}

pub(crate) fn get_slot<'a, T: ?Sized + 'static>(ctx: &'a LaneContext, name: &'static str) -> Result<&'a mut T, LaneError> {
    ctx.get::<Slot<T>>()
        .map(|s| s.get())
        .ok_or(LaneError::missing(name))
}

pub(crate) fn view_index(ctx: &LaneContext) -> usize {
    ctx.get::<ViewIndex>().map_or(0, |v| v.0)
}
