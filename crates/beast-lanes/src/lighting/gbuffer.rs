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

//! Formats of the per-view intermediate targets.

use beast_core::renderer::api::TextureFormat;

/// Depth and stencil of the scene. Stencil marks light volumes.
pub const SCENE_DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32FloatStencil8;
/// Device depth copied out by the G-buffer pass so compute and
/// fragment passes can load it as a color texture.
pub const DEVICE_DEPTH_FORMAT: TextureFormat = TextureFormat::R32Float;
/// Base color and alpha.
pub const ALBEDO_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;
/// World normal in xyz, roughness in w.
pub const NORMAL_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
/// Metalness, ambient occlusion, unused, unused.
pub const MATERIAL_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;
/// Accumulated direct lighting and the final scene color.
pub const HDR_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
/// Shadow occlusion of the light being drawn, 1 meaning fully lit.
pub const OCCLUSION_FORMAT: TextureFormat = TextureFormat::R8Unorm;

/// Order of the G-buffer color attachments. Host material pipelines target
/// these formats in this order.
pub const GBUFFER_FORMATS: [TextureFormat; 4] = [ALBEDO_FORMAT, NORMAL_FORMAT, MATERIAL_FORMAT, DEVICE_DEPTH_FORMAT];
