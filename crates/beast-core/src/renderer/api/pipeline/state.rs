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
//! Fixed-function state blocks of a render pipeline.

use super::enums::*;
use crate::beast_bitflags;
use crate::renderer::api::util::{SampleCount, TextureFormat};
use std::borrow::Cow;

/// One attribute inside a vertex buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexAttributeDescriptor {
    /// Shader `@location`.
    pub shader_location: u32,
    /// Attribute format.
    pub format: VertexFormat,
    /// Byte offset inside the vertex.
    pub offset: u64,
}

/// Layout of one vertex buffer slot.
#[derive(Debug, Clone)]
pub struct VertexBufferLayoutDescriptor<'a> {
    /// Distance between consecutive vertices in bytes.
    pub array_stride: u64,
    /// Advance rate.
    pub step_mode: VertexStepMode,
    /// Attributes read from the buffer.
    pub attributes: Cow<'a, [VertexAttributeDescriptor]>,
}

/// Primitive assembly and rasterization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PrimitiveStateDescriptor {
    /// Topology.
    pub topology: PrimitiveTopology,
    /// Front face winding.
    pub front_face: FrontFace,
    /// Culled faces.
    pub cull_mode: Option<CullMode>,
    /// Disables depth clipping; used to clamp casters in front of a
    /// directional shadow's near plane.
    pub unclipped_depth: bool,
}

/// Stencil behaviour for one facing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StencilFaceState {
    /// Stencil test.
    pub compare: CompareFunction,
    /// Operation when the stencil test fails.
    pub fail_op: StencilOperation,
    /// Operation when the stencil test passes and the depth test fails.
    pub depth_fail_op: StencilOperation,
    /// Operation when both tests pass.
    pub pass_op: StencilOperation,
}

impl StencilFaceState {
    /// Stencil test disabled.
    pub const IGNORE: Self = Self {
        compare: CompareFunction::Always,
        fail_op: StencilOperation::Keep,
        depth_fail_op: StencilOperation::Keep,
        pass_op: StencilOperation::Keep,
    };
}

/// Hardware depth bias.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DepthBiasState {
    /// Constant bias in depth units.
    pub constant: i32,
    /// Bias scaled by the depth slope.
    pub slope_scale: f32,
    /// Maximum bias.
    pub clamp: f32,
}

/// Depth and stencil testing.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthStencilStateDescriptor {
    /// Format of the depth attachment.
    pub format: TextureFormat,
    /// Whether depth is written.
    pub depth_write_enabled: bool,
    /// Depth test.
    pub depth_compare: CompareFunction,
    /// Stencil state for front faces.
    pub stencil_front: StencilFaceState,
    /// Stencil state for back faces.
    pub stencil_back: StencilFaceState,
    /// Stencil read mask.
    pub stencil_read_mask: u32,
    /// Stencil write mask.
    pub stencil_write_mask: u32,
    /// Depth bias.
    pub bias: DepthBiasState,
}

impl DepthStencilStateDescriptor {
    /// Depth test with `compare`, optional writes, stencil off.
    pub fn depth_only(format: TextureFormat, write: bool, compare: CompareFunction) -> Self {
        Self {
            format,
            depth_write_enabled: write,
            depth_compare: compare,
            stencil_front: StencilFaceState::IGNORE,
            stencil_back: StencilFaceState::IGNORE,
            stencil_read_mask: 0,
            stencil_write_mask: 0,
            bias: DepthBiasState::default(),
        }
    }
}

/// Blend equation for one channel group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendComponentDescriptor {
    /// Source factor.
    pub src_factor: BlendFactor,
    /// Destination factor.
    pub dst_factor: BlendFactor,
    /// Combination.
    pub operation: BlendOperation,
}

impl BlendComponentDescriptor {
    /// `src + dst`.
    pub const ADDITIVE: Self = Self {
        src_factor: BlendFactor::One,
        dst_factor: BlendFactor::One,
        operation: BlendOperation::Add,
    };

    /// `min(src, dst)`.
    pub const MIN: Self = Self {
        src_factor: BlendFactor::One,
        dst_factor: BlendFactor::One,
        operation: BlendOperation::Min,
    };
}

/// Blend state of a color target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendStateDescriptor {
    /// Equation for RGB.
    pub color: BlendComponentDescriptor,
    /// Equation for alpha.
    pub alpha: BlendComponentDescriptor,
}

impl BlendStateDescriptor {
    /// Additive on every channel.
    pub const ADDITIVE: Self = Self {
        color: BlendComponentDescriptor::ADDITIVE,
        alpha: BlendComponentDescriptor::ADDITIVE,
    };
}

beast_bitflags! {
    /// Channels written to a color target.
    pub struct ColorWrites: u8 {
        /// Red.
        const R = 0b0001;
        /// Green.
        const G = 0b0010;
        /// Blue.
        const B = 0b0100;
        /// Alpha.
        const A = 0b1000;
        /// Every channel.
        const ALL = 0b1111;
    }
}

/// One color output of a render pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColorTargetStateDescriptor {
    /// Target format.
    pub format: TextureFormat,
    /// Blending, `None` replaces.
    pub blend: Option<BlendStateDescriptor>,
    /// Written channels.
    pub write_mask: ColorWrites,
}

impl ColorTargetStateDescriptor {
    /// Opaque write of every channel.
    pub fn replace(format: TextureFormat) -> Self {
        Self {
            format,
            blend: None,
            write_mask: ColorWrites::ALL,
        }
    }
}

/// Multisampling of a render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MultisampleStateDescriptor {
    /// Samples per pixel; must match the attachments.
    pub count: SampleCount,
    /// Active sample mask.
    pub mask: u32,
    /// Alpha to coverage.
    pub alpha_to_coverage_enabled: bool,
}

impl Default for MultisampleStateDescriptor {
    fn default() -> Self {
        Self {
            count: SampleCount::X1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        }
    }
}
