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

//! Pre-integrated environment BRDF lookup table.
//!
//! Split-sum approximation of the specular image-based lighting integral:
//! for a view angle and roughness the table stores the scale and bias applied
//! to the surface's F0. Computed on the CPU once and uploaded.

use beast_core::math::{Extent3D, Origin3D, Vec3};
use beast_core::renderer::api::{
    SampleCount, TextureDescriptor, TextureDimension, TextureFormat, TextureId, TextureUsage,
    TextureViewDescriptor, TextureViewId,
};
use beast_core::renderer::error::ResourceError;
use beast_core::renderer::GraphicsDevice;
use std::borrow::Cow;
use std::f32::consts::PI;

/// Default table edge.
pub const ENV_BRDF_LUT_SIZE: u32 = 128;
/// Default samples integrated per texel.
pub const ENV_BRDF_LUT_SAMPLES: u32 = 512;

pub const ENV_BRDF_LUT_FORMAT: TextureFormat = TextureFormat::Rg32Float;

fn hammersley(i: u32, count: u32) -> (f32, f32) {
    (i as f32 / count as f32, i.reverse_bits() as f32 * 2.328_306_4e-10)
}

/// GGX half vector around +Z for roughness `alpha` (already squared).
fn importance_sample_ggx(xi: (f32, f32), alpha: f32) -> Vec3 {
    let phi = 2.0 * PI * xi.0;
    let cos_theta = ((1.0 - xi.1) / (1.0 + (alpha * alpha - 1.0) * xi.1)).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
}

/// Smith visibility with the Schlick approximation, `k = alpha / 2`.
fn smith_schlick(n_dot_v: f32, n_dot_l: f32, alpha: f32) -> f32 {
    let k = alpha * 0.5;
    let g_v = n_dot_v / (n_dot_v * (1.0 - k) + k);
    let g_l = n_dot_l / (n_dot_l * (1.0 - k) + k);
    g_v * g_l
}

fn integrate(n_dot_v: f32, roughness: f32, samples: u32) -> [f32; 2] {
    let alpha = roughness * roughness;
    let v = Vec3::new((1.0 - n_dot_v * n_dot_v).max(0.0).sqrt(), 0.0, n_dot_v);

    let (mut scale, mut bias) = (0.0, 0.0);
    for i in 0..samples {
        let h = importance_sample_ggx(hammersley(i, samples), alpha);
        let v_dot_h = v.dot(h);
        let l = 2.0 * v_dot_h * h - v;

        let n_dot_l = l.z.clamp(0.0, 1.0);
        let n_dot_h = h.z.clamp(0.0, 1.0);
        let v_dot_h = v_dot_h.clamp(0.0, 1.0);
        if n_dot_l <= 0.0 {
            continue;
        }

        let g_vis = smith_schlick(n_dot_v, n_dot_l, alpha) * v_dot_h / (n_dot_h * n_dot_v).max(1e-6);
        let fresnel = (1.0 - v_dot_h).powi(5);
        scale += (1.0 - fresnel) * g_vis;
        bias += fresnel * g_vis;
    }
    [scale / samples as f32, bias / samples as f32]
}

/// The lookup table texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvBrdfLut {
    pub texture: TextureId,
    pub view: TextureViewId,
    pub size: u32,
}

impl EnvBrdfLut {
    /// Integrates a `size` x `size` table. Columns are `n . v`, rows
    /// roughness, both sampled at texel centers.
    pub fn generate(size: u32, samples: u32) -> Vec<[f32; 2]> {
        let size = size.max(1);
        let samples = samples.max(1);
        let mut texels = Vec::with_capacity((size * size) as usize);
        for y in 0..size {
            let roughness = (y as f32 + 0.5) / size as f32;
            for x in 0..size {
                let n_dot_v = (x as f32 + 0.5) / size as f32;
                texels.push(integrate(n_dot_v, roughness, samples));
            }
        }
        texels
    }

    /// Generates the table and uploads it.
    pub fn new(device: &dyn GraphicsDevice, size: u32, samples: u32) -> Result<Self, ResourceError> {
        let texels = Self::generate(size, samples);
        let size = size.max(1);
        let extent = Extent3D::new_2d(size, size);

        let texture = device.create_texture(&TextureDescriptor {
            label: Some(Cow::Borrowed("Env BRDF LUT")),
            size: extent,
            mip_level_count: 1,
            sample_count: SampleCount::X1,
            dimension: TextureDimension::D2,
            format: ENV_BRDF_LUT_FORMAT,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
        })?;
        device.write_texture(
            texture,
            bytemuck::cast_slice(&texels),
            Some(size * ENV_BRDF_LUT_FORMAT.bytes_per_pixel()),
            Origin3D::default(),
            extent,
        )?;
        let view = device.create_texture_view(texture, &TextureViewDescriptor::default())?;
        log::debug!("EnvBrdfLut: Integrated {}x{} table with {} samples", size, size, samples);

        Ok(Self { texture, view, size })
    }

    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        if let Err(e) = device.destroy_texture_view(self.view) {
            log::warn!("EnvBrdfLut: Failed to destroy view: {:?}", e);
        }
        if let Err(e) = device.destroy_texture(self.texture) {
            log::warn!("EnvBrdfLut: Failed to destroy texture: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_bounded() {
        let table = EnvBrdfLut::generate(16, 64);
        assert_eq!(table.len(), 256);
        for [scale, bias] in table {
            assert!(scale >= 0.0 && bias >= 0.0);
            assert!(scale + bias <= 1.01, "{scale} + {bias}");
        }
    }

    #[test]
    fn smooth_surfaces_seen_head_on_reflect_f0() {
        let [scale, bias] = integrate(0.999, 0.02, 256);
        assert!((scale + bias - 1.0).abs() < 0.05);
        assert!(bias < 0.01);
    }

    #[test]
    fn grazing_angles_add_fresnel_bias() {
        let head_on = integrate(0.95, 0.3, 256)[1];
        let grazing = integrate(0.1, 0.3, 256)[1];
        assert!(grazing > head_on);
    }
}
