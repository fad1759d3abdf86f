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

//! Bind groups that only live for one frame.

use super::lock;
use beast_core::renderer::api::{BindGroupDescriptor, BindGroupId};
use beast_core::renderer::error::ResourceError;
use beast_core::renderer::GraphicsDevice;
use std::sync::Mutex;

const FRAMES_IN_FLIGHT: usize = 2;

/// Bind groups created while recording a frame and destroyed once the GPU
/// can no longer be using them.
///
/// Groups referencing pooled targets change from frame to frame, so they
/// are recreated instead of cached.
#[derive(Debug, Default)]
pub struct TransientBindGroups {
    frames: Mutex<[Vec<BindGroupId>; FRAMES_IN_FLIGHT]>,
}

impl TransientBindGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &self,
        device: &dyn GraphicsDevice,
        desc: &BindGroupDescriptor<'_>,
    ) -> Result<BindGroupId, ResourceError> {
        let group = device.create_bind_group(desc)?;
        lock(&self.frames)[0].push(group);
        Ok(group)
    }

    /// Starts a frame: groups from two frames ago are destroyed.
    pub fn begin_frame(&self, device: &dyn GraphicsDevice) {
        let mut frames = lock(&self.frames);
        let expired = std::mem::take(&mut frames[FRAMES_IN_FLIGHT - 1]);
        frames.rotate_right(1);
        Self::destroy_all(device, expired);
    }

    /// Number of groups still alive.
    pub fn len(&self) -> usize {
        lock(&self.frames).iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn release(&self, device: &dyn GraphicsDevice) {
        let mut frames = lock(&self.frames);
        for frame in frames.iter_mut() {
            Self::destroy_all(device, std::mem::take(frame));
        }
    }

    fn destroy_all(device: &dyn GraphicsDevice, groups: Vec<BindGroupId>) {
        for group in groups {
            if let Err(e) = device.destroy_bind_group(group) {
                log::warn!("Failed to destroy transient bind group: {:?}", e);
            }
        }
    }
}
