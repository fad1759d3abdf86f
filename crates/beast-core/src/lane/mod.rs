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
//! # Lane Abstraction
//!
//! A **lane** is one self-contained GPU processing step of the lighting
//! pipeline: building the light grid, rendering shadow maps, running the
//! tiled lighting dispatch, and so on. The renderer front end drives lanes
//! and passes them everything they need through a [`LaneContext`].
//!
//! Domain traits extend [`Lane`] with extra hooks; the render compositor's
//! node trait is one of them.
//!
//! ```rust,ignore
//! use beast_core::lane::{Lane, LaneContext, LaneError, LaneKind};
//!
//! struct ClearLane;
//!
//! impl Lane for ClearLane {
//!     fn strategy_name(&self) -> &'static str { "Clear" }
//!     fn lane_kind(&self) -> LaneKind { LaneKind::Resolve }
//!     fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
//!         let _encoder = ctx.get::<MyEncoderKey>().ok_or(LaneError::missing("MyEncoderKey"))?;
//!         Ok(())
//!     }
//!     fn as_any(&self) -> &dyn std::any::Any { self }
//!     fn as_any_mut(&mut self) -> &mut dyn std::any::Any { self }
//! }
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

/// Errors raised while initializing or executing a lane.
#[derive(Debug)]
pub enum LaneError {
    /// `execute` ran before `on_initialize` created the lane's GPU state.
    NotInitialized,
    /// A value the lane requires was not present in the [`LaneContext`].
    InvalidContext {
        /// Name of the expected context entry.
        expected: &'static str,
        /// What was found instead.
        received: String,
    },
    /// The lane's work failed.
    ExecutionFailed(Box<dyn std::error::Error + Send + Sync>),
    /// The lane's GPU resources could not be created.
    InitializationFailed(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for LaneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneError::NotInitialized => write!(f, "Lane not initialized"),
            LaneError::InvalidContext { expected, received } => {
                write!(f, "Invalid lane context: expected {expected}, got {received}")
            }
            LaneError::ExecutionFailed(e) => write!(f, "Lane execution failed: {e}"),
            LaneError::InitializationFailed(e) => write!(f, "Lane initialization failed: {e}"),
        }
    }
}

impl std::error::Error for LaneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LaneError::ExecutionFailed(e) | LaneError::InitializationFailed(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl LaneError {
    /// Shorthand for a context entry that is absent.
    pub fn missing(type_name: &'static str) -> Self {
        LaneError::InvalidContext {
            expected: type_name,
            received: "not found in LaneContext".into(),
        }
    }

    /// Wraps any error as an execution failure.
    pub fn execution(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        LaneError::ExecutionFailed(Box::new(error))
    }

    /// Wraps any error as an initialization failure.
    pub fn initialization(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        LaneError::InitializationFailed(Box::new(error))
    }
}

/// Broad classification of a lane's work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneKind {
    /// Rasterizes scene geometry (depth, G-buffer, forward).
    Geometry,
    /// Renders or projects shadow maps.
    Shadow,
    /// Bins lights and probes into screen-space clusters.
    LightCulling,
    /// Accumulates direct or image-based lighting.
    Lighting,
    /// Copies, unflattens or resolves intermediate targets.
    Resolve,
}

impl fmt::Display for LaneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LaneKind::Geometry => "Geometry",
            LaneKind::Shadow => "Shadow",
            LaneKind::LightCulling => "LightCulling",
            LaneKind::Lighting => "Lighting",
            LaneKind::Resolve => "Resolve",
        };
        f.write_str(name)
    }
}

/// Common interface of every processing lane.
pub trait Lane: Send + Sync {
    /// Stable identifier of the strategy, used for lookups and logs.
    fn strategy_name(&self) -> &'static str;

    /// Classification of the lane.
    fn lane_kind(&self) -> LaneKind;

    /// Relative GPU cost estimate for the coming frame.
    fn estimate_cost(&self, _ctx: &LaneContext) -> f32 {
        1.0
    }

    /// Creates GPU state. Called once before the first `execute`.
    fn on_initialize(&self, _ctx: &mut LaneContext) -> Result<(), LaneError> {
        Ok(())
    }

    /// Records the lane's work for the current frame.
    fn execute(&self, _ctx: &mut LaneContext) -> Result<(), LaneError> {
        Ok(())
    }

    /// Releases GPU state.
    fn on_shutdown(&self, _ctx: &mut LaneContext) {}

    /// Upcast used for downcasting to the concrete lane.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast used for downcasting to the concrete lane.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

// ─────────────────────────────────────────────────────────────────────────────
// LaneContext
// ─────────────────────────────────────────────────────────────────────────────

/// Type-keyed bag of values handed to lanes for one frame.
pub struct LaneContext {
    data: HashMap<TypeId, Box<dyn Any>>,
}

// SAFETY: `insert` only accepts Send + Sync values. The Slot/Ref wrappers
// carry raw pointers but live only inside one frame on the render thread.
unsafe impl Send for LaneContext {}
unsafe impl Sync for LaneContext {}

impl LaneContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    /// Inserts a value, replacing any previous value of the same type.
    pub fn insert<T: 'static + Send + Sync>(&mut self, value: T) {
        self.data.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Borrows the value of type `T`.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.data.get(&TypeId::of::<T>())?.downcast_ref()
    }

    /// Mutably borrows the value of type `T`.
    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.data.get_mut(&TypeId::of::<T>())?.downcast_mut()
    }

    /// Whether a value of type `T` is present.
    pub fn contains<T: 'static>(&self) -> bool {
        self.data.contains_key(&TypeId::of::<T>())
    }

    /// Takes the value of type `T` out of the context.
    pub fn remove<T: 'static>(&mut self) -> Option<T> {
        self.data
            .remove(&TypeId::of::<T>())
            .and_then(|b| b.downcast().ok().map(|b| *b))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the context holds no entry.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Default for LaneContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LaneContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaneContext")
            .field("entries", &self.data.len())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Slot / Ref
// ─────────────────────────────────────────────────────────────────────────────

/// Mutable borrow smuggled through a [`LaneContext`] for the span of a frame.
///
/// The caller guarantees the pointee outlives every use and that lanes run
/// one at a time.
pub struct Slot<T: ?Sized>(*mut T);

// SAFETY: only used inside single-threaded frame scopes.
unsafe impl<T: ?Sized> Send for Slot<T> {}
unsafe impl<T: ?Sized> Sync for Slot<T> {}

impl<T: ?Sized> Slot<T> {
    /// Wraps a mutable borrow.
    pub fn new(value: &mut T) -> Self {
        Self(value as *mut T)
    }

    /// Mutable access to the pointee.
    #[allow(clippy::mut_from_ref)]
    pub fn get(&self) -> &mut T {
        // SAFETY: lanes execute sequentially while the frame owns the pointee
        unsafe { &mut *self.0 }
    }

    /// Shared access to the pointee.
    pub fn get_ref(&self) -> &T {
        // SAFETY: see get()
        unsafe { &*self.0 }
    }
}

/// Shared borrow smuggled through a [`LaneContext`] for the span of a frame.
pub struct Ref<T: ?Sized>(*const T);

// SAFETY: only used inside single-threaded frame scopes.
unsafe impl<T: ?Sized> Send for Ref<T> {}
unsafe impl<T: ?Sized> Sync for Ref<T> {}

impl<T: ?Sized> Ref<T> {
    /// Wraps a shared borrow.
    pub fn new(value: &T) -> Self {
        Self(value as *const T)
    }

    /// Access to the pointee.
    pub fn get(&self) -> &T {
        // SAFETY: the frame keeps the pointee alive
        unsafe { &*self.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct FrameIndex(u64);

    #[test]
    fn context_round_trips_values_by_type() {
        let mut ctx = LaneContext::new();
        assert!(ctx.is_empty());
        ctx.insert(FrameIndex(7));
        ctx.insert(3.5f32);

        assert_eq!(ctx.get::<FrameIndex>(), Some(&FrameIndex(7)));
        ctx.get_mut::<FrameIndex>().unwrap().0 += 1;
        assert_eq!(ctx.remove::<FrameIndex>(), Some(FrameIndex(8)));
        assert!(!ctx.contains::<FrameIndex>());
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn slot_gives_mutable_access() {
        let mut counter = 0u32;
        {
            let slot = Slot::new(&mut counter);
            *slot.get() += 2;
            assert_eq!(*slot.get_ref(), 2);
        }
        assert_eq!(counter, 2);
    }

    #[test]
    fn missing_entry_error_names_the_type() {
        let err = LaneError::missing("LightGrid");
        assert!(err.to_string().contains("LightGrid"));
    }
}
