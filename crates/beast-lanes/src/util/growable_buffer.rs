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

//! Storage buffer that grows to fit and never shrinks.

use beast_core::renderer::api::{BufferDescriptor, BufferId, BufferUsage};
use beast_core::renderer::error::ResourceError;
use beast_core::renderer::GraphicsDevice;
use std::borrow::Cow;

/// A GPU buffer whose capacity is only ever raised.
///
/// When a request exceeds the capacity the buffer is recreated with the
/// requested element count rounded up to a power of two. Callers that cache
/// bind groups compare [`GrowableBuffer::generation`] to know when to
/// rebuild them.
#[derive(Debug)]
pub struct GrowableBuffer {
    buffer: Option<BufferId>,
    capacity: u64,
    element_size: u64,
    usage: BufferUsage,
    generation: u64,
    label: &'static str,
}

impl GrowableBuffer {
    pub fn new(element_size: u64, usage: BufferUsage, label: &'static str) -> Self {
        Self {
            buffer: None,
            capacity: 0,
            element_size: element_size.max(1),
            usage,
            generation: 0,
            label,
        }
    }

    /// Makes room for `count` elements. Returns whether the buffer changed.
    pub fn reserve(&mut self, device: &dyn GraphicsDevice, count: u64) -> Result<bool, ResourceError> {
        let count = count.max(1);
        if self.buffer.is_some() && count <= self.capacity {
            return Ok(false);
        }

        let capacity = count.next_power_of_two();
        let buffer = device.create_buffer(&BufferDescriptor {
            label: Some(Cow::Borrowed(self.label)),
            size: capacity * self.element_size,
            usage: self.usage,
            mapped_at_creation: false,
        })?;
        if let Some(old) = self.buffer.replace(buffer) {
            if let Err(e) = device.destroy_buffer(old) {
                log::warn!("{}: Failed to destroy old buffer: {:?}", self.label, e);
            }
        }
        log::debug!("{}: Resized to {} elements", self.label, capacity);
        self.capacity = capacity;
        self.generation += 1;
        Ok(true)
    }

    /// Grows if needed and writes `data` at the start of the buffer.
    pub fn write(&mut self, device: &dyn GraphicsDevice, data: &[u8]) -> Result<bool, ResourceError> {
        let count = (data.len() as u64).div_ceil(self.element_size);
        let resized = self.reserve(device, count)?;
        if !data.is_empty() {
            if let Some(buffer) = self.buffer {
                device.write_buffer(buffer, 0, data)?;
            }
        }
        Ok(resized)
    }

    pub fn buffer(&self) -> Option<BufferId> {
        self.buffer
    }

    /// Capacity in elements.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.capacity * self.element_size
    }

    /// Incremented every time the underlying buffer is replaced.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        if let Some(buffer) = self.buffer.take() {
            if let Err(e) = device.destroy_buffer(buffer) {
                log::warn!("{}: Failed to destroy buffer: {:?}", self.label, e);
            }
        }
        self.capacity = 0;
    }
}
