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

//! Defines the hierarchy of error types for the frame scheduler.
//!
//! Nothing in this subsystem is retried. A [`ConfigurationError`] means a fixed
//! capacity was chosen too small, [`RenderError::DeviceLost`] means the queue
//! stopped signaling, and [`RenderError::SubmissionFailure`] means a state
//! contract was broken while recording. All of them are surfaced to the caller.

use crate::handle::{DescriptorCategory, TextureId};
use crate::state::ResourceState;
use thiserror::Error;

/// A fixed capacity was too small for the workload, or the configuration
/// itself is malformed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A descriptor heap has fewer free slots than requested.
    #[error("{category} descriptor pool exhausted: requested {requested}, {remaining} remaining")]
    PoolExhausted {
        /// The heap that ran out.
        category: DescriptorCategory,
        /// Number of slots asked for.
        requested: u32,
        /// Number of slots still free.
        remaining: u32,
    },
    /// A frame's transient constant allocations exceeded the per-slot budget.
    #[error(
        "constant arena exhausted: requested {requested} bytes with {frame_used} of {frame_budget} already used this frame"
    )]
    ArenaExhausted {
        /// Aligned size of the failing request.
        requested: u64,
        /// Bytes already allocated in the current frame.
        frame_used: u64,
        /// Bytes a single frame may allocate.
        frame_budget: u64,
    },
    /// A suballocating pool has no room left.
    #[error("{pool} exhausted: requested {requested} bytes, {remaining} remaining")]
    BufferPoolExhausted {
        /// Which pool ran out.
        pool: &'static str,
        /// Aligned size of the failing request.
        requested: u64,
        /// Bytes still free.
        remaining: u64,
    },
    /// Every command buffer of the current frame slot is in use.
    #[error("frame slot {slot} has no free command buffer (capacity {capacity})")]
    CommandBuffersExhausted {
        /// The frame slot.
        slot: usize,
        /// Command buffers per slot.
        capacity: usize,
    },
    /// More timestamps were recorded in one frame than the query set holds.
    #[error("timestamp query capacity of {capacity} exceeded")]
    TimestampsExhausted {
        /// Timestamps per frame slot.
        capacity: u32,
    },
    /// The upload heap was used after it had been released.
    #[error("upload heap used after release")]
    UploadHeapReleased,
    /// The renderer configuration is invalid.
    #[error("invalid renderer configuration: {0}")]
    InvalidConfig(String),
}

/// The error type returned by every fallible scheduler operation.
#[derive(Debug, Error)]
pub enum RenderError {
    /// See [`ConfigurationError`].
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// The device stopped signaling its fence or was removed.
    #[error("device lost: {0}")]
    DeviceLost(String),
    /// The device rejected a command buffer at close or submit time.
    #[error("command submission failed: {0}")]
    SubmissionFailure(String),
    /// A transition was requested from a state the resource is not in.
    #[error("invalid transition on {resource:?}: expected {expected}, resource is in {actual}")]
    InvalidTransition {
        /// The texture being transitioned.
        resource: TextureId,
        /// The state the caller assumed.
        expected: ResourceState,
        /// The state the texture is actually in.
        actual: ResourceState,
    },
    /// A staged load failed part-way; the loader can still be unloaded.
    #[error("scene load aborted during stage '{stage}'")]
    LoadAborted {
        /// Name of the stage that failed.
        stage: &'static str,
        /// The underlying asset or device failure.
        #[source]
        source: anyhow::Error,
    },
    /// A resource id was unknown or a resource operation failed.
    #[error("resource error: {0}")]
    ResourceError(String),
}

impl RenderError {
    /// Whether this error requires a full device teardown.
    pub fn is_device_lost(&self) -> bool {
        matches!(self, RenderError::DeviceLost(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_configuration_error_converts() {
        let err: RenderError = ConfigurationError::PoolExhausted {
            category: DescriptorCategory::RenderTarget,
            requested: 4,
            remaining: 1,
        }
        .into();
        assert!(matches!(
            err,
            RenderError::Configuration(ConfigurationError::PoolExhausted { requested: 4, .. })
        ));
        assert_eq!(
            err.to_string(),
            "RTV descriptor pool exhausted: requested 4, 1 remaining"
        );
    }

    #[test]
    fn test_load_aborted_keeps_source() {
        let err = RenderError::LoadAborted {
            stage: "load textures",
            source: anyhow::anyhow!("missing albedo.dds"),
        };
        assert!(err.to_string().contains("load textures"));
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("missing albedo.dds"));
    }

    #[test]
    fn test_device_lost_flag() {
        assert!(RenderError::DeviceLost("fence 3".into()).is_device_lost());
        assert!(!RenderError::SubmissionFailure("x".into()).is_device_lost());
    }
}
