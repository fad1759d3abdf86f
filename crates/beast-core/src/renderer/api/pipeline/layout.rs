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
//! Pipeline layouts.

use crate::renderer::api::command::BindGroupLayoutId;
use std::borrow::Cow;

/// Opaque handle to a pipeline layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineLayoutId(pub usize);

/// Describes a pipeline layout: the bind group layouts, in group order.
#[derive(Debug, Clone)]
pub struct PipelineLayoutDescriptor<'a> {
    /// Debug label.
    pub label: Option<Cow<'a, str>>,
    /// Bind group layouts for `@group(0)`, `@group(1)`, ...
    pub bind_group_layouts: &'a [BindGroupLayoutId],
}
