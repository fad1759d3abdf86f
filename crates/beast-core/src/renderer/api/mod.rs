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
//! Backend-agnostic rendering API.
//!
//! - **[`resource`]**: buffers, textures, views, samplers.
//! - **[`command`]**: passes, bind groups, compute pipelines.
//! - **[`pipeline`]**: render pipeline state and layouts.
//! - **[`shader`]**: shader modules.
//! - **[`util`]**: formats, sample counts and flags.

pub mod command;
pub mod pipeline;
pub mod resource;
pub mod shader;
pub mod util;

pub use command::*;
pub use pipeline::*;
pub use resource::*;
pub use shader::*;
pub use util::*;
