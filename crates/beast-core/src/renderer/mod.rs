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
//! Renderer contracts: the GPU API, device traits, errors and the scene,
//! view and option types the lighting pipeline consumes.

pub mod api;
pub mod error;
pub mod light;
pub mod scene;
pub mod settings;
pub mod traits;
pub mod view;

pub use self::api::*;
pub use self::error::{PipelineError, RenderError, ResourceError, ShaderError};
pub use self::light::{LightType, ReflectionProbe, ReflectionProbeType, RendererLight};
pub use self::scene::{MeshDraw, RenderElement, SceneFrame};
pub use self::settings::{
    ConfigError, RendererOptions, ShadowFilteringQuality, StateReductionMode, TextureFiltering,
};
pub use self::traits::{CommandEncoder, ComputePass, GraphicsDevice, RenderPass};
pub use self::view::{RendererView, ViewConfig, ViewFlags, ViewId};
