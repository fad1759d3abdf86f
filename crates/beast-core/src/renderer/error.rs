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
//! Error hierarchy of the rendering contracts.

use crate::lane::LaneError;
use crate::renderer::api::{RenderPipelineId, ShaderModuleId};
use std::fmt;

/// Failures while turning shader source into a module.
#[derive(Debug)]
pub enum ShaderError {
    /// The backend rejected the source.
    CompilationError {
        /// Module label.
        label: String,
        /// Backend diagnostics.
        details: String,
    },
    /// The requested entry point does not exist in the module.
    InvalidEntryPoint {
        /// Module.
        id: ShaderModuleId,
        /// Missing entry point.
        entry_point: String,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::CompilationError { label, details } => {
                write!(f, "Shader compilation failed for '{label}': {details}")
            }
            ShaderError::InvalidEntryPoint { id, entry_point } => {
                write!(f, "Invalid entry point '{entry_point}' for shader module {id:?}")
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// Failures while building pipeline objects.
#[derive(Debug)]
pub enum PipelineError {
    /// The pipeline layout could not be created.
    LayoutCreationFailed(String),
    /// The backend rejected the pipeline.
    CompilationFailed {
        /// Pipeline label.
        label: Option<String>,
        /// Backend diagnostics.
        details: String,
    },
    /// A pipeline id that the device does not know.
    InvalidRenderPipeline {
        /// Offending id.
        id: RenderPipelineId,
    },
    /// The device lacks a feature the pipeline needs.
    FeatureNotSupported(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::LayoutCreationFailed(msg) => {
                write!(f, "Pipeline layout creation failed: {msg}")
            }
            PipelineError::CompilationFailed { label, details } => write!(
                f,
                "Pipeline compilation failed for '{}': {}",
                label.as_deref().unwrap_or("Unknown"),
                details
            ),
            PipelineError::InvalidRenderPipeline { id } => {
                write!(f, "Invalid render pipeline ID: {id:?}")
            }
            PipelineError::FeatureNotSupported(msg) => write!(f, "Feature not supported: {msg}"),
        }
    }
}

impl std::error::Error for PipelineError {}

/// Failures of resource creation, update or destruction.
#[derive(Debug)]
pub enum ResourceError {
    /// Shader module failure.
    Shader(ShaderError),
    /// Pipeline failure.
    Pipeline(PipelineError),
    /// No resource with that id.
    NotFound,
    /// The handle was already destroyed or never valid.
    InvalidHandle,
    /// A write or copy outside the resource.
    OutOfBounds,
    /// The device ran out of memory.
    OutOfMemory,
    /// Backend-specific failure.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Shader(err) => write!(f, "Shader resource error: {err}"),
            ResourceError::Pipeline(err) => write!(f, "Pipeline resource error: {err}"),
            ResourceError::NotFound => write!(f, "Resource not found with ID."),
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle or ID."),
            ResourceError::OutOfBounds => write!(f, "Resource access out of bounds."),
            ResourceError::OutOfMemory => write!(f, "Out of GPU memory."),
            ResourceError::BackendError(msg) => write!(f, "Backend-specific resource error: {msg}"),
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Shader(err) => Some(err),
            ResourceError::Pipeline(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for ResourceError {
    fn from(err: ShaderError) -> Self {
        ResourceError::Shader(err)
    }
}

impl From<PipelineError> for ResourceError {
    fn from(err: PipelineError) -> Self {
        ResourceError::Pipeline(err)
    }
}

/// Top-level error of a rendered frame.
#[derive(Debug)]
pub enum RenderError {
    /// The renderer was used before initialization or after shutdown.
    NotInitialized,
    /// Renderer start-up failed.
    InitializationFailed(String),
    /// A GPU resource operation failed.
    ResourceError(ResourceError),
    /// A lane failed while recording the frame.
    Lane(LaneError),
    /// Anything else.
    Internal(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NotInitialized => write!(f, "The renderer is not initialized."),
            RenderError::InitializationFailed(msg) => {
                write!(f, "Failed to initialize the renderer: {msg}")
            }
            RenderError::ResourceError(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
            RenderError::Lane(err) => write!(f, "Frame recording failed: {err}"),
            RenderError::Internal(msg) => write!(f, "An internal error occurred: {msg}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceError(err) => Some(err),
            RenderError::Lane(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::ResourceError(err)
    }
}

impl From<LaneError> for RenderError {
    fn from(err: LaneError) -> Self {
        RenderError::Lane(err)
    }
}

impl From<ResourceError> for LaneError {
    fn from(err: ResourceError) -> Self {
        LaneError::ExecutionFailed(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn resource_error_wraps_pipeline_error() {
        let err: ResourceError = PipelineError::FeatureNotSupported("compute".into()).into();
        assert!(err.to_string().contains("compute"));
        assert!(err.source().is_some());
    }

    #[test]
    fn render_error_chains_lane_error() {
        let err: RenderError = LaneError::missing("GpuResourcePool").into();
        assert!(matches!(err, RenderError::Lane(_)));
        assert!(err.source().unwrap().to_string().contains("GpuResourcePool"));
    }
}
