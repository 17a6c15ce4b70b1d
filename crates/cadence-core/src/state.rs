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

//! Resource access states and transition barriers.

use crate::handle::TextureId;
use std::fmt;

/// The GPU-visible access state of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// No particular access; the state textures are created in by default.
    Common,
    /// Ready to be handed to the presentation engine.
    Present,
    /// Bound as a color attachment.
    RenderTarget,
    /// Bound as a writable depth attachment.
    DepthWrite,
    /// Sampled from pixel shaders.
    PixelShaderResource,
    /// Sampled from non-pixel stages (compute, vertex).
    NonPixelShaderResource,
    /// Read/write storage access from compute.
    UnorderedAccess,
    /// Source of a multisample resolve.
    ResolveSource,
    /// Destination of a multisample resolve.
    ResolveDest,
    /// Source of a copy.
    CopySource,
    /// Destination of a copy.
    CopyDest,
    /// Any read-only access; upload heaps live here.
    GenericRead,
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A single state transition for one texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransitionBarrier {
    /// The texture being transitioned.
    pub texture: TextureId,
    /// The state the texture must currently be in.
    pub before: ResourceState,
    /// The state the texture will be in after the barrier.
    pub after: ResourceState,
}

impl TransitionBarrier {
    /// Creates a barrier moving `texture` from `before` to `after`.
    pub const fn new(texture: TextureId, before: ResourceState, after: ResourceState) -> Self {
        Self {
            texture,
            before,
            after,
        }
    }

    /// The barrier that undoes this one.
    pub const fn reversed(self) -> Self {
        Self {
            texture: self.texture,
            before: self.after,
            after: self.before,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reversed_barrier_swaps_states() {
        let barrier = TransitionBarrier::new(
            TextureId(3),
            ResourceState::DepthWrite,
            ResourceState::PixelShaderResource,
        );
        let back = barrier.reversed();
        assert_eq!(back.texture, TextureId(3));
        assert_eq!(back.before, ResourceState::PixelShaderResource);
        assert_eq!(back.after, ResourceState::DepthWrite);
        assert_eq!(back.reversed(), barrier);
    }
}
