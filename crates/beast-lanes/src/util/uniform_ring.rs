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

//! Ring of uniform buffer chunks bound with dynamic offsets.
//!
//! Passes recorded into one command buffer all see the state of a buffer at
//! submission time, so per-pass parameters cannot share one uniform slot.
//! The ring hands out a distinct 256-byte aligned slot for every push and
//! grows by whole chunks when a frame needs more.

use beast_core::renderer::api::{
    BindGroupDescriptor, BindGroupEntry, BindGroupId, BindGroupLayoutId, BufferDescriptor,
    BufferId, BufferUsage,
};
use beast_core::renderer::error::ResourceError;
use beast_core::renderer::GraphicsDevice;
use std::borrow::Cow;

/// Minimum dynamic uniform offset alignment required by most APIs.
pub const MIN_UNIFORM_ALIGNMENT: u32 = 256;

/// Frames that may be recorded before the GPU finishes the oldest one.
const FRAMES_IN_FLIGHT: usize = 2;

/// Where a pushed element lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlice {
    /// Bind group covering the chunk the element was written to.
    pub bind_group: BindGroupId,
    /// Dynamic offset of the element inside that chunk.
    pub offset: u32,
}

#[derive(Debug)]
struct Chunk {
    buffer: BufferId,
    bind_group: BindGroupId,
    capacity: u32,
    cursor: u32,
}

#[derive(Debug, Default)]
struct Slot {
    chunks: Vec<Chunk>,
    active: usize,
}

/// Uniform ring buffer with one slot per frame in flight.
#[derive(Debug)]
pub struct UniformRing {
    slots: Vec<Slot>,
    current: usize,
    element_size: u32,
    elements_per_chunk: u32,
    layout: BindGroupLayoutId,
    binding: u32,
    label: &'static str,
}

impl UniformRing {
    /// Creates the ring. `layout` must declare `binding` as a uniform
    /// buffer with a dynamic offset.
    pub fn new(
        device: &dyn GraphicsDevice,
        layout: BindGroupLayoutId,
        binding: u32,
        element_size: u32,
        elements_per_chunk: u32,
        label: &'static str,
    ) -> Result<Self, ResourceError> {
        let mut ring = Self {
            slots: (0..FRAMES_IN_FLIGHT).map(|_| Slot::default()).collect(),
            current: 0,
            element_size,
            elements_per_chunk: elements_per_chunk.max(1),
            layout,
            binding,
            label,
        };
        for index in 0..FRAMES_IN_FLIGHT {
            let chunk = ring.create_chunk(device, ring.chunk_capacity(), index)?;
            ring.slots[index].chunks.push(chunk);
        }
        Ok(ring)
    }

    fn aligned(size: u32) -> u32 {
        (size + MIN_UNIFORM_ALIGNMENT - 1) & !(MIN_UNIFORM_ALIGNMENT - 1)
    }

    fn chunk_capacity(&self) -> u32 {
        Self::aligned(self.element_size) * self.elements_per_chunk
    }

    fn create_chunk(&self, device: &dyn GraphicsDevice, capacity: u32, slot: usize) -> Result<Chunk, ResourceError> {
        let buffer = device.create_buffer(&BufferDescriptor {
            label: Some(Cow::Owned(format!("{} [slot {}]", self.label, slot))),
            size: capacity as u64,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            mapped_at_creation: false,
        })?;
        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some(self.label),
            layout: self.layout,
            entries: &[BindGroupEntry::buffer_range(self.binding, buffer, self.element_size as u64)],
        })?;
        Ok(Chunk {
            buffer,
            bind_group,
            capacity,
            cursor: 0,
        })
    }

    /// Moves to the next frame's slot and rewinds it.
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.slots.len();
        let slot = &mut self.slots[self.current];
        for chunk in &mut slot.chunks {
            chunk.cursor = 0;
        }
        slot.active = 0;
    }

    /// Writes one element and returns where it landed.
    pub fn push(&mut self, device: &dyn GraphicsDevice, data: &[u8]) -> Result<UniformSlice, ResourceError> {
        let size = Self::aligned(data.len() as u32);
        let current = self.current;

        let needs_chunk = {
            let slot = &mut self.slots[current];
            let chunk = &slot.chunks[slot.active];
            if chunk.cursor + size <= chunk.capacity {
                false
            } else if slot.active + 1 < slot.chunks.len() {
                slot.active += 1;
                false
            } else {
                true
            }
        };

        if needs_chunk {
            let capacity = self.slots[current].chunks[self.slots[current].active].capacity * 2;
            let chunk = self.create_chunk(device, capacity.max(size), current)?;
            log::debug!("{}: Grew slot {} to {} chunk(s)", self.label, current, self.slots[current].chunks.len() + 1);
            let slot = &mut self.slots[current];
            slot.chunks.push(chunk);
            slot.active = slot.chunks.len() - 1;
        }

        let slot = &mut self.slots[current];
        let chunk = &mut slot.chunks[slot.active];
        let offset = chunk.cursor;
        device.write_buffer(chunk.buffer, offset as u64, data)?;
        chunk.cursor += size;

        Ok(UniformSlice {
            bind_group: chunk.bind_group,
            offset,
        })
    }

    /// Pushes a plain-old-data value.
    pub fn push_pod<T: bytemuck::Pod>(&mut self, device: &dyn GraphicsDevice, value: &T) -> Result<UniformSlice, ResourceError> {
        self.push(device, bytemuck::bytes_of(value))
    }

    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        for slot in self.slots.drain(..) {
            for chunk in slot.chunks {
                if let Err(e) = device.destroy_bind_group(chunk.bind_group) {
                    log::warn!("UniformRing({}): Failed to destroy bind group: {:?}", self.label, e);
                }
                if let Err(e) = device.destroy_buffer(chunk.buffer) {
                    log::warn!("UniformRing({}): Failed to destroy buffer: {:?}", self.label, e);
                }
            }
        }
    }
}
