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
//! Renderer options.
//!
//! Options are plain data, serializable with `serde`, so hosts can keep them
//! in a JSON settings file. Missing fields take their default values.

use crate::renderer::api::{FilterMode, SamplerDescriptor};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Largest shadow map edge, equal to the shadow atlas size.
pub const MAX_SHADOW_MAP_SIZE: u32 = 4096;

/// Texture filtering used by material and lookup samplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureFiltering {
    /// Linear within a mip, nearest between mips.
    Bilinear,
    /// Linear within and between mips.
    Trilinear,
    /// Trilinear plus anisotropic filtering.
    #[default]
    Anisotropic,
}

/// Ordering of opaque draws to reduce GPU state changes or overdraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateReductionMode {
    /// Submission order.
    None,
    /// Group by material.
    Material,
    /// Front to back.
    #[default]
    Distance,
}

/// Percentage-closer filtering quality of shadow projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowFilteringQuality {
    /// A single comparison tap.
    Low,
    /// 2x2 taps.
    #[default]
    Medium,
    /// 4x4 taps.
    High,
    /// 6x6 taps.
    Ultra,
}

impl ShadowFilteringQuality {
    /// Quality level, 1 to 4.
    pub const fn level(self) -> u32 {
        match self {
            ShadowFilteringQuality::Low => 1,
            ShadowFilteringQuality::Medium => 2,
            ShadowFilteringQuality::High => 3,
            ShadowFilteringQuality::Ultra => 4,
        }
    }

    /// PCF kernel width in texels.
    pub const fn kernel_size(self) -> u32 {
        match self {
            ShadowFilteringQuality::Low => 1,
            ShadowFilteringQuality::Medium => 2,
            ShadowFilteringQuality::High => 4,
            ShadowFilteringQuality::Ultra => 6,
        }
    }
}

/// User-facing renderer options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererOptions {
    /// Texture filtering.
    pub filtering: TextureFiltering,
    /// Maximum anisotropy when `filtering` is anisotropic.
    pub anisotropy_max: u32,
    /// Opaque draw ordering.
    pub state_reduction: StateReductionMode,
    /// Edge length of full-resolution shadow maps, a power of two.
    pub shadow_map_size: u32,
    /// PCF quality of shadow projection.
    pub shadow_filtering_quality: ShadowFilteringQuality,
    /// Distance from the camera covered by directional light cascades.
    pub shadow_draw_distance: f32,
    /// Growth factor between consecutive cascade lengths.
    pub cascade_distribution_exponent: f32,
    /// Whether unshadowed lights go through the tiled compute path. When
    /// off, every light is drawn by the per-light deferred pass.
    pub tiled_deferred: bool,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            filtering: TextureFiltering::Anisotropic,
            anisotropy_max: 16,
            state_reduction: StateReductionMode::Distance,
            shadow_map_size: 2048,
            shadow_filtering_quality: ShadowFilteringQuality::Medium,
            shadow_draw_distance: 250.0,
            cascade_distribution_exponent: 3.0,
            tiled_deferred: true,
        }
    }
}

/// Invalid options.
#[derive(Debug)]
pub enum ConfigError {
    /// A field is out of range.
    InvalidValue {
        /// Field name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
    /// The JSON text could not be parsed.
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid renderer option '{field}': {reason}")
            }
            ConfigError::Parse(err) => write!(f, "Failed to parse renderer options: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err)
    }
}

impl RendererOptions {
    /// Parses and validates options from JSON.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let options: RendererOptions = serde_json::from_str(text)?;
        options.validate()?;
        Ok(options)
    }

    /// Serializes the options to pretty JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks every field's range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=16).contains(&self.anisotropy_max) {
            return Err(ConfigError::InvalidValue {
                field: "anisotropy_max",
                reason: format!("{} is outside 1..=16", self.anisotropy_max),
            });
        }
        if !self.shadow_map_size.is_power_of_two()
            || !(32..=MAX_SHADOW_MAP_SIZE).contains(&self.shadow_map_size)
        {
            return Err(ConfigError::InvalidValue {
                field: "shadow_map_size",
                reason: format!(
                    "{} must be a power of two between 32 and {MAX_SHADOW_MAP_SIZE}",
                    self.shadow_map_size
                ),
            });
        }
        if self.shadow_draw_distance.partial_cmp(&0.0) != Some(std::cmp::Ordering::Greater) {
            return Err(ConfigError::InvalidValue {
                field: "shadow_draw_distance",
                reason: "must be positive".into(),
            });
        }
        if self.cascade_distribution_exponent.partial_cmp(&1.0) == Some(std::cmp::Ordering::Less)
            || self.cascade_distribution_exponent.is_nan()
        {
            return Err(ConfigError::InvalidValue {
                field: "cascade_distribution_exponent",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Sampler matching the filtering options.
    pub fn sampler_descriptor(&self) -> SamplerDescriptor<'static> {
        let (mipmap_filter, anisotropy_clamp) = match self.filtering {
            TextureFiltering::Bilinear => (FilterMode::Nearest, 1),
            TextureFiltering::Trilinear => (FilterMode::Linear, 1),
            TextureFiltering::Anisotropic => (FilterMode::Linear, self.anisotropy_max as u16),
        };
        SamplerDescriptor {
            label: Some(Cow::Borrowed("Material Sampler")),
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter,
            anisotropy_clamp,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let options =
            RendererOptions::from_json(r#"{ "filtering": "trilinear", "shadow_map_size": 1024 }"#)
                .unwrap();
        assert_eq!(options.filtering, TextureFiltering::Trilinear);
        assert_eq!(options.shadow_map_size, 1024);
        assert_eq!(options.anisotropy_max, 16);
        assert_eq!(options.state_reduction, StateReductionMode::Distance);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = RendererOptions::from_json(r#"{ "shadow_map_size": 1000 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "shadow_map_size", .. }));

        let err = RendererOptions::from_json(r#"{ "anisotropy_max": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "anisotropy_max", .. }));
    }

    #[test]
    fn unknown_enum_value_is_a_parse_error() {
        let err = RendererOptions::from_json(r#"{ "state_reduction": "random" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn json_round_trip_keeps_options() {
        let options = RendererOptions {
            state_reduction: StateReductionMode::Material,
            shadow_filtering_quality: ShadowFilteringQuality::Ultra,
            ..Default::default()
        };
        let text = options.to_json().unwrap();
        assert_eq!(RendererOptions::from_json(&text).unwrap(), options);
    }

    #[test]
    fn bilinear_sampler_has_no_mip_blending() {
        let options = RendererOptions {
            filtering: TextureFiltering::Bilinear,
            ..Default::default()
        };
        let sampler = options.sampler_descriptor();
        assert_eq!(sampler.mipmap_filter, FilterMode::Nearest);
        assert_eq!(sampler.anisotropy_clamp, 1);
    }
}
