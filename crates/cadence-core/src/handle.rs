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

//! Opaque handle types.
//!
//! Every GPU object is referred to through a small `Copy` id minted by the
//! [`GraphicsDevice`](crate::GraphicsDevice). Descriptor handles additionally
//! carry their CPU and (for shader-visible heaps) GPU addresses.

use std::fmt;

/// An opaque handle to a GPU buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub usize);

/// An opaque handle to a GPU texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub usize);

/// An opaque handle to a reusable command buffer (allocator + list pair).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandBufferId(pub usize);

/// An opaque handle to a timestamp query set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuerySetId(pub usize);

/// An opaque handle to a compiled pipeline state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineId(pub usize);

/// A GPU virtual address, directly consumable by shader stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct GpuAddress(pub u64);

impl GpuAddress {
    /// Returns the address `bytes` past this one.
    #[inline]
    pub const fn offset(self, bytes: u64) -> Self {
        Self(self.0 + bytes)
    }
}

impl fmt::Display for GpuAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

/// The descriptor categories, each backed by its own heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorCategory {
    /// Constant buffer, shader resource and unordered access views.
    CbvSrvUav,
    /// Sampler states.
    Sampler,
    /// Render target views.
    RenderTarget,
    /// Depth stencil views.
    DepthStencil,
}

impl DescriptorCategory {
    /// All categories, in heap creation order.
    pub const ALL: [DescriptorCategory; 4] = [
        DescriptorCategory::CbvSrvUav,
        DescriptorCategory::Sampler,
        DescriptorCategory::RenderTarget,
        DescriptorCategory::DepthStencil,
    ];

    /// Whether descriptors of this category can be bound to shader stages.
    ///
    /// Render target and depth stencil views are CPU-only.
    pub const fn is_shader_visible(self) -> bool {
        matches!(
            self,
            DescriptorCategory::CbvSrvUav | DescriptorCategory::Sampler
        )
    }
}

impl fmt::Display for DescriptorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DescriptorCategory::CbvSrvUav => "CBV/SRV/UAV",
            DescriptorCategory::Sampler => "Sampler",
            DescriptorCategory::RenderTarget => "RTV",
            DescriptorCategory::DepthStencil => "DSV",
        };
        f.write_str(name)
    }
}

/// A single descriptor slot in one of the descriptor heaps.
///
/// A handle is never reassigned once issued. Views may be re-created into the
/// same slot (for example after a window resize) but the slot stays owned by
/// whoever allocated it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorHandle {
    /// The heap this slot belongs to.
    pub category: DescriptorCategory,
    /// Index of the slot within its heap.
    pub index: u32,
    /// CPU descriptor address.
    pub cpu: u64,
    /// GPU descriptor address, for shader-visible categories only.
    pub gpu: Option<u64>,
}

/// A contiguous run of descriptor slots handed out by a single allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorTable {
    first: DescriptorHandle,
    count: u32,
    increment: u32,
}

impl DescriptorTable {
    /// Builds a table from its first handle, length and the heap's slot stride.
    pub fn new(first: DescriptorHandle, count: u32, increment: u32) -> Self {
        Self {
            first,
            count,
            increment,
        }
    }

    /// The first slot of the table, suitable for binding as a table start.
    pub fn first(&self) -> DescriptorHandle {
        self.first
    }

    /// Number of slots in the table.
    pub fn len(&self) -> u32 {
        self.count
    }

    /// Whether the table holds no slots.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the `i`-th slot, or `None` past the end of the table.
    pub fn handle(&self, i: u32) -> Option<DescriptorHandle> {
        if i >= self.count {
            return None;
        }
        let stride = u64::from(i) * u64::from(self.increment);
        Some(DescriptorHandle {
            category: self.first.category,
            index: self.first.index + i,
            cpu: self.first.cpu + stride,
            gpu: self.first.gpu.map(|gpu| gpu + stride),
        })
    }

    /// Iterates over every slot in the table.
    pub fn iter(&self) -> impl Iterator<Item = DescriptorHandle> + '_ {
        (0..self.count).filter_map(move |i| self.handle(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(category: DescriptorCategory, gpu: Option<u64>) -> DescriptorTable {
        DescriptorTable::new(
            DescriptorHandle {
                category,
                index: 10,
                cpu: 0x1000,
                gpu,
            },
            3,
            32,
        )
    }

    #[test]
    fn test_table_handles_follow_stride() {
        let table = table(DescriptorCategory::CbvSrvUav, Some(0x9000));
        let handles: Vec<_> = table.iter().collect();
        assert_eq!(handles.len(), 3);
        assert_eq!(handles[2].index, 12);
        assert_eq!(handles[2].cpu, 0x1000 + 64);
        assert_eq!(handles[2].gpu, Some(0x9000 + 64));
        assert!(table.handle(3).is_none());
    }

    #[test]
    fn test_cpu_only_table_has_no_gpu_address() {
        let table = table(DescriptorCategory::RenderTarget, None);
        assert!(table.iter().all(|h| h.gpu.is_none()));
        assert!(!DescriptorCategory::RenderTarget.is_shader_visible());
        assert!(DescriptorCategory::Sampler.is_shader_visible());
    }

    #[test]
    fn test_gpu_address_offset() {
        assert_eq!(GpuAddress(0x100).offset(0x20), GpuAddress(0x120));
        assert_eq!(GpuAddress(0xff).to_string(), "0x00000000000000ff");
    }
}
