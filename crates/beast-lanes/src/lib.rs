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

//! # Beast Lanes
//!
//! The lighting pipeline proper: atlas packing, pooled GPU resources, light
//! and reflection probe buffers, the clustered light grid, shadow rendering,
//! tiled deferred lighting and image based lighting, and the render
//! compositor that strings the passes together per view.
//!
//! [`RenderBeast`] owns all of it and is the entry point hosts use.

pub mod atlas;
pub mod compositor;
pub mod frame;
pub mod light_data;
pub mod light_grid;
pub mod lighting;
pub mod pool;
pub mod renderer;
pub mod shaders;
pub mod shadow;
pub mod util;

pub use atlas::{create_atlas_layout, AtlasElement, AtlasPage, TextureAtlasLayout};
pub use compositor::{CompositorError, CompositorNode, CompositorNodeRegistry, CompositorNodeType, RenderCompositor};
pub use light_data::{GpuLightData, GpuReflProbeData, LightData, ReflProbeData};
pub use light_grid::{LightGrid, LightGridLane, LightGridLayout};
pub use lighting::LightingResources;
pub use pool::{GpuResourcePool, PooledBuffer, PooledBufferDesc, PooledTexture, PooledTextureDesc};
pub use renderer::RenderBeast;
pub use shadow::ShadowRendering;
