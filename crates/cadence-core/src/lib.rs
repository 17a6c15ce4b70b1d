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

//! # Cadence Core
//!
//! Foundational crate containing the handle types, device contracts, error
//! taxonomy and per-frame state shared by every other cadence crate.
//!
//! Nothing in here owns GPU memory. Allocators live in `cadence-data`, render
//! lanes in `cadence-lanes`, and the orchestration logic in `cadence-agents`.

#![warn(missing_docs)]

pub mod command;
pub mod config;
pub mod device;
pub mod error;
pub mod frame;
pub mod handle;
pub mod state;
pub mod surface;

pub use command::{CommandEncoder, Viewport};
pub use config::{DescriptorCounts, RendererConfig};
pub use device::{
    BufferDescriptor, BufferUsage, DescriptorHeapId, DescriptorHeapInfo, FenceValue,
    GraphicsDevice, MemoryLocation, PipelineDescriptor, PipelineKind, TextureDescriptor,
    TextureFormat, TextureUsage, ViewKind,
};
pub use error::{ConfigurationError, RenderError};
pub use frame::{
    AmbientOcclusion, Camera, FrameState, LightKind, SceneLight, SkyMode, SpotLight, ToneMapper,
    MAX_LIGHTS, MAX_SHADOW_CASTERS,
};
pub use handle::{
    BufferId, CommandBufferId, DescriptorCategory, DescriptorHandle, DescriptorTable, GpuAddress,
    PipelineId, QuerySetId, TextureId,
};
pub use state::{ResourceState, TransitionBarrier};
pub use surface::PresentationSurface;

/// Hardware alignment, in bytes, of constant buffer views and suballocations.
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// Rounds `value` up to the next multiple of `alignment` (a power of two).
#[inline]
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 256), 512);
        assert_eq!(align_up(4, 4), 4);
    }
}
