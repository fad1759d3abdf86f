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
//! Render and compute pass descriptors.

use crate::math::LinearRgba;
use crate::renderer::api::resource::TextureViewId;

/// Opaque handle to a finished command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandBufferId(pub u64);

/// What an attachment contains when the pass starts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LoadOp<V> {
    /// Keep the previous contents.
    Load,
    /// Clear to the given value.
    Clear(V),
}

/// What happens to an attachment when the pass ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreOp {
    /// Keep the results.
    Store,
    /// Results may be thrown away.
    Discard,
}

/// Load and store behaviour of an attachment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Operations<V> {
    /// Load behaviour.
    pub load: LoadOp<V>,
    /// Store behaviour.
    pub store: StoreOp,
}

impl<V> Operations<V> {
    /// Clears to `value` and stores.
    pub fn clear(value: V) -> Self {
        Self {
            load: LoadOp::Clear(value),
            store: StoreOp::Store,
        }
    }

    /// Loads and stores.
    pub fn load() -> Self {
        Self {
            load: LoadOp::Load,
            store: StoreOp::Store,
        }
    }
}

/// A color attachment.
#[derive(Debug)]
pub struct RenderPassColorAttachment<'a> {
    /// View rendered into.
    pub view: &'a TextureViewId,
    /// Single-sample view receiving the MSAA resolve.
    pub resolve_target: Option<&'a TextureViewId>,
    /// Load/store behaviour.
    pub ops: Operations<LinearRgba>,
}

/// The depth/stencil attachment.
#[derive(Debug)]
pub struct RenderPassDepthStencilAttachment<'a> {
    /// View rendered into.
    pub view: &'a TextureViewId,
    /// Depth load/store, `None` for read-only depth.
    pub depth_ops: Option<Operations<f32>>,
    /// Stencil load/store, `None` for read-only stencil.
    pub stencil_ops: Option<Operations<u32>>,
}

/// Describes a render pass.
#[derive(Debug, Default)]
pub struct RenderPassDescriptor<'a> {
    /// Debug label.
    pub label: Option<&'a str>,
    /// Color attachments in `@location` order.
    pub color_attachments: &'a [RenderPassColorAttachment<'a>],
    /// Depth/stencil attachment.
    pub depth_stencil_attachment: Option<RenderPassDepthStencilAttachment<'a>>,
}

/// Describes a compute pass.
#[derive(Debug, Default)]
pub struct ComputePassDescriptor<'a> {
    /// Debug label.
    pub label: Option<&'a str>,
}
