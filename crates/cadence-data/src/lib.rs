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

//! # Cadence Data
//!
//! The memory side of the frame scheduler: every allocator that hands out GPU
//! memory or descriptors, and the fence bookkeeping that decides when that
//! memory can be reused.
//!
//! - [`DescriptorHeaps`]: append-only descriptor pools, one per category.
//! - [`RingCursor`]: the fenced ring algorithm shared by the transient rings.
//! - [`CommandBufferRing`] and [`ConstantBufferRing`]: per-frame-slot command
//!   buffers and constant data.
//! - [`UploadHeap`] and [`StaticBufferPool`]: the staging and long-lived
//!   suballocating pools.
//! - [`TrackedTexture`]: a texture that owns its current resource state.
//! - [`GpuTimer`]: per-slot timestamp queries.
//! - [`RenderContext`]: the bundle that owns all of the above.

pub mod command_ring;
pub mod constant_ring;
pub mod context;
pub mod descriptor;
pub mod ring;
pub mod static_pool;
pub mod timer;
pub mod tracked;
pub mod upload_heap;

pub use command_ring::CommandBufferRing;
pub use constant_ring::ConstantBufferRing;
pub use context::RenderContext;
pub use descriptor::{DescriptorHeap, DescriptorHeaps};
pub use ring::{RingCursor, RingTab};
pub use static_pool::{StaticBufferPool, Suballocation};
pub use timer::{GpuTimer, TimingSample};
pub use tracked::TrackedTexture;
pub use upload_heap::{UploadAllocation, UploadHeap};
