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

//! Helpers shared by the lanes.

mod growable_buffer;
pub mod light_volume;
mod program;
mod shader_defines;
mod transient;
mod uniform_ring;

pub use growable_buffer::GrowableBuffer;
pub use light_volume::{GpuVolumeMesh, LightVolumes};
pub use program::ComputeProgram;
pub use shader_defines::{DefinesError, ShaderDefines};
pub use transient::TransientBindGroups;
pub use uniform_ring::{UniformRing, UniformSlice, MIN_UNIFORM_ALIGNMENT};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

