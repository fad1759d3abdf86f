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

//! WGSL sources of the lighting pipeline.
//!
//! Shaders that read the light grid are prefixed with `common.wgsl` (grid
//! constants, light and probe records, cell addressing); the shading passes
//! also get `lighting_common.wgsl` (surface decoding and the BRDF). Sources
//! containing `#ifdef` blocks go through [`ShaderDefines`] before
//! compilation.
//!
//! [`ShaderDefines`]: crate::util::ShaderDefines

macro_rules! with_common {
    ($($file:literal),+) => {
        concat!(include_str!("common.wgsl"), $("\n", include_str!($file)),+)
    };
}

/// Construction pass of the light grid: one thread per light or probe,
/// prepending nodes to the linked list of every overlapped cell.
pub const LIGHT_GRID_CREATE_WGSL: &str = with_common!("light_grid_create.wgsl");

/// Reduction pass of the light grid: one thread per cell, flattening the
/// linked lists into index ranges.
pub const LIGHT_GRID_REDUCE_WGSL: &str = with_common!("light_grid_reduce.wgsl");

/// Depth-only rendering of shadow casters.
pub const SHADOW_DEPTH_WGSL: &str = include_str!("shadow_depth.wgsl");

/// Light volume stencil marking ahead of shadow projection.
pub const SHADOW_STENCIL_WGSL: &str = with_common!("shadow_stencil.wgsl");

/// Shadow map projection with PCF. Specialized per light kind, filtering
/// quality and MSAA.
pub const SHADOW_PROJECT_WGSL: &str = with_common!("shadow_project.wgsl");

/// Direct lighting of unshadowed lights, 16x16 pixel tiles.
pub const TILED_DEFERRED_LIGHTING_WGSL: &str = with_common!("lighting_common.wgsl", "tiled_deferred_lighting.wgsl");

/// Reflection probes, sky and final combine, 32x32 pixel tiles.
pub const TILED_DEFERRED_IBL_WGSL: &str = with_common!("lighting_common.wgsl", "tiled_deferred_ibl.wgsl");

/// Per-light volume shading with optional shadow occlusion.
pub const DEFERRED_LIGHT_WGSL: &str = with_common!("lighting_common.wgsl", "deferred_light.wgsl");

/// Per-sample copy of a flat buffer into a multisampled texture.
pub const FLAT_TO_TEXTURE_WGSL: &str = include_str!("flat_to_texture.wgsl");

/// Sample average and tone mapping into the output target.
pub const FINAL_RESOLVE_WGSL: &str = include_str!("final_resolve.wgsl");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_shaders_have_entry_point() {
        for source in [
            LIGHT_GRID_CREATE_WGSL,
            LIGHT_GRID_REDUCE_WGSL,
            TILED_DEFERRED_LIGHTING_WGSL,
            TILED_DEFERRED_IBL_WGSL,
        ] {
            assert!(source.contains("@compute"));
            assert!(source.contains("fn cs_main"));
        }
    }

    #[test]
    fn render_shaders_have_both_stages() {
        for source in [
            SHADOW_STENCIL_WGSL,
            SHADOW_PROJECT_WGSL,
            DEFERRED_LIGHT_WGSL,
            FLAT_TO_TEXTURE_WGSL,
            FINAL_RESOLVE_WGSL,
        ] {
            assert!(source.contains("@vertex"));
            assert!(source.contains("@fragment"));
        }
        assert!(SHADOW_DEPTH_WGSL.contains("fn vs_main"));
    }

    #[test]
    fn grid_shaders_share_the_common_records() {
        assert!(LIGHT_GRID_CREATE_WGSL.contains("struct GridParams"));
        assert!(DEFERRED_LIGHT_WGSL.contains("fn evaluate_light"));
        assert!(!SHADOW_DEPTH_WGSL.contains("struct GridParams"));
    }
}
