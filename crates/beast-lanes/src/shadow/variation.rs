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

//! Shader variations of the shadow projection and stencil passes.

use crate::util::ShaderDefines;
use beast_core::renderer::{LightType, ShadowFilteringQuality};

/// Shape of the shadow map being projected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowKind {
    /// Region of a 2D atlas.
    Spot,
    /// Cubemap.
    Radial,
    /// Layer of a cascaded 2D array.
    Directional,
}

impl ShadowKind {
    pub fn of(light_type: LightType) -> Self {
        match light_type {
            LightType::Directional => ShadowKind::Directional,
            LightType::Radial => ShadowKind::Radial,
            LightType::Spot => ShadowKind::Spot,
        }
    }

    fn define(self) -> &'static str {
        match self {
            ShadowKind::Spot => "KIND_SPOT",
            ShadowKind::Radial => "KIND_RADIAL",
            ShadowKind::Directional => "KIND_DIRECTIONAL",
        }
    }

    /// Whether the pass draws the light volume mesh rather than a
    /// full-screen triangle.
    pub fn uses_volume(self) -> bool {
        !matches!(self, ShadowKind::Directional)
    }
}

/// Key of one shadow projection pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShadowProjectVariation {
    pub quality: ShadowFilteringQuality,
    pub kind: ShadowKind,
    pub msaa: bool,
    /// Camera is inside the light volume; back faces are drawn.
    pub inside_volume: bool,
}

impl ShadowProjectVariation {
    pub fn new(quality: ShadowFilteringQuality, kind: ShadowKind, msaa: bool, inside_volume: bool) -> Self {
        Self {
            quality,
            kind,
            msaa,
            inside_volume: inside_volume && kind.uses_volume(),
        }
    }

    pub fn defines(&self) -> ShaderDefines {
        let mut defines = ShaderDefines::new();
        defines.set(self.kind.define());
        if self.msaa {
            defines.set("MSAA");
        }
        defines.set_constant("SHADOW_QUALITY", self.quality.level());
        defines.set_constant("PCF_KERNEL_SIZE", self.quality.kernel_size());
        defines
    }
}

/// Key of one light volume stencil pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilVariation {
    /// Z-fail when the camera is inside the volume, z-pass otherwise.
    pub inside_volume: bool,
    pub msaa: bool,
}

impl StencilVariation {
    pub fn defines(&self) -> ShaderDefines {
        let mut defines = ShaderDefines::new();
        if self.msaa {
            defines.set("MSAA");
        }
        defines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directional_projection_never_uses_inside_variation() {
        let variation = ShadowProjectVariation::new(ShadowFilteringQuality::High, ShadowKind::Directional, false, true);
        assert!(!variation.inside_volume);
        assert!(variation.defines().is_set("KIND_DIRECTIONAL"));
    }
}
