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

//! Fixed-capacity descriptor heaps.
//!
//! Each category gets one heap, sized from [`DescriptorCounts`] at startup.
//! Slots are handed out by a bump cursor and never returned: owners keep their
//! handles for as long as the heap lives and the whole heap is destroyed at
//! once during teardown.

use cadence_core::{
    ConfigurationError, DescriptorCategory, DescriptorCounts, DescriptorHandle, DescriptorHeapInfo,
    DescriptorTable, GraphicsDevice, RenderError,
};

/// A single append-only descriptor heap.
#[derive(Debug)]
pub struct DescriptorHeap {
    category: DescriptorCategory,
    info: DescriptorHeapInfo,
    capacity: u32,
    next: u32,
}

impl DescriptorHeap {
    /// Creates a heap of `capacity` slots on the device.
    pub fn new(
        device: &dyn GraphicsDevice,
        category: DescriptorCategory,
        capacity: u32,
    ) -> Result<Self, RenderError> {
        let info = device.create_descriptor_heap(category, capacity)?;
        log::debug!("{} descriptor heap created with {} slots", category, capacity);
        Ok(Self {
            category,
            info,
            capacity,
            next: 0,
        })
    }

    /// Hands out `count` contiguous slots.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::PoolExhausted`] if fewer than `count` slots
    /// remain. The heap is left untouched in that case.
    pub fn allocate(&mut self, count: u32) -> Result<DescriptorTable, ConfigurationError> {
        let remaining = self.remaining();
        if count > remaining {
            return Err(ConfigurationError::PoolExhausted {
                category: self.category,
                requested: count,
                remaining,
            });
        }

        let index = self.next;
        let offset = u64::from(index) * u64::from(self.info.increment);
        let first = DescriptorHandle {
            category: self.category,
            index,
            cpu: self.info.cpu_base + offset,
            gpu: self.info.gpu_base.map(|base| base + offset),
        };
        self.next += count;
        Ok(DescriptorTable::new(first, count, self.info.increment))
    }

    /// Hands out a single slot.
    pub fn allocate_one(&mut self) -> Result<DescriptorHandle, ConfigurationError> {
        Ok(self.allocate(1)?.first())
    }

    /// The category of descriptors stored in this heap.
    pub fn category(&self) -> DescriptorCategory {
        self.category
    }

    /// Total number of slots.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of slots handed out so far.
    pub fn allocated(&self) -> u32 {
        self.next
    }

    /// Number of slots still free.
    pub fn remaining(&self) -> u32 {
        self.capacity - self.next
    }

    /// Destroys the heap and every view written into it.
    pub fn destroy(self, device: &dyn GraphicsDevice) {
        if let Err(e) = device.destroy_descriptor_heap(self.info.id) {
            log::warn!(
                "DescriptorHeap({}): Failed to destroy heap: {:?}",
                self.category,
                e
            );
        }
    }
}

/// The four descriptor heaps of the renderer.
#[derive(Debug)]
pub struct DescriptorHeaps {
    cbv_srv_uav: DescriptorHeap,
    sampler: DescriptorHeap,
    render_target: DescriptorHeap,
    depth_stencil: DescriptorHeap,
}

impl DescriptorHeaps {
    /// Creates every heap with the configured sizes.
    pub fn new(device: &dyn GraphicsDevice, counts: &DescriptorCounts) -> Result<Self, RenderError> {
        let heaps = Self {
            cbv_srv_uav: DescriptorHeap::new(
                device,
                DescriptorCategory::CbvSrvUav,
                counts.cbv_srv_uav(),
            )?,
            sampler: DescriptorHeap::new(device, DescriptorCategory::Sampler, counts.sampler)?,
            render_target: DescriptorHeap::new(device, DescriptorCategory::RenderTarget, counts.rtv)?,
            depth_stencil: DescriptorHeap::new(device, DescriptorCategory::DepthStencil, counts.dsv)?,
        };
        log::info!(
            "Descriptor heaps ready: {} CBV/SRV/UAV, {} samplers, {} RTV, {} DSV",
            counts.cbv_srv_uav(),
            counts.sampler,
            counts.rtv,
            counts.dsv
        );
        Ok(heaps)
    }

    /// The heap holding descriptors of `category`.
    pub fn heap(&self, category: DescriptorCategory) -> &DescriptorHeap {
        match category {
            DescriptorCategory::CbvSrvUav => &self.cbv_srv_uav,
            DescriptorCategory::Sampler => &self.sampler,
            DescriptorCategory::RenderTarget => &self.render_target,
            DescriptorCategory::DepthStencil => &self.depth_stencil,
        }
    }

    fn heap_mut(&mut self, category: DescriptorCategory) -> &mut DescriptorHeap {
        match category {
            DescriptorCategory::CbvSrvUav => &mut self.cbv_srv_uav,
            DescriptorCategory::Sampler => &mut self.sampler,
            DescriptorCategory::RenderTarget => &mut self.render_target,
            DescriptorCategory::DepthStencil => &mut self.depth_stencil,
        }
    }

    /// Hands out `count` contiguous slots of `category`.
    pub fn allocate(
        &mut self,
        category: DescriptorCategory,
        count: u32,
    ) -> Result<DescriptorTable, ConfigurationError> {
        self.heap_mut(category).allocate(count)
    }

    /// Shader resource, constant buffer or unordered access slots.
    pub fn allocate_cbv_srv_uav(&mut self, count: u32) -> Result<DescriptorTable, ConfigurationError> {
        self.allocate(DescriptorCategory::CbvSrvUav, count)
    }

    /// Sampler slots.
    pub fn allocate_sampler(&mut self, count: u32) -> Result<DescriptorTable, ConfigurationError> {
        self.allocate(DescriptorCategory::Sampler, count)
    }

    /// Render target view slots.
    pub fn allocate_rtv(&mut self, count: u32) -> Result<DescriptorTable, ConfigurationError> {
        self.allocate(DescriptorCategory::RenderTarget, count)
    }

    /// Depth stencil view slots.
    pub fn allocate_dsv(&mut self, count: u32) -> Result<DescriptorTable, ConfigurationError> {
        self.allocate(DescriptorCategory::DepthStencil, count)
    }

    /// Destroys all four heaps.
    pub fn destroy(self, device: &dyn GraphicsDevice) {
        self.cbv_srv_uav.destroy(device);
        self.sampler.destroy(device);
        self.render_target.destroy(device);
        self.depth_stencil.destroy(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_infra::HeadlessDevice;
    use std::collections::HashSet;

    #[test]
    fn test_allocate_exactly_capacity_gives_disjoint_handles() {
        let device = HeadlessDevice::default();
        let mut heap = DescriptorHeap::new(&device, DescriptorCategory::CbvSrvUav, 8).unwrap();

        let a = heap.allocate(3).unwrap();
        let b = heap.allocate(5).unwrap();
        assert_eq!(heap.remaining(), 0);

        let cpu: HashSet<u64> = a.iter().chain(b.iter()).map(|h| h.cpu).collect();
        let gpu: HashSet<u64> = a.iter().chain(b.iter()).filter_map(|h| h.gpu).collect();
        let indices: HashSet<u32> = a.iter().chain(b.iter()).map(|h| h.index).collect();
        assert_eq!(cpu.len(), 8);
        assert_eq!(gpu.len(), 8);
        assert_eq!(indices, (0..8).collect());
    }

    #[test]
    fn test_allocate_past_capacity_is_pool_exhausted() {
        let device = HeadlessDevice::default();
        let mut heap = DescriptorHeap::new(&device, DescriptorCategory::RenderTarget, 4).unwrap();
        heap.allocate(4).unwrap();

        let err = heap.allocate_one().unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::PoolExhausted {
                category: DescriptorCategory::RenderTarget,
                requested: 1,
                remaining: 0,
            }
        );
    }

    #[test]
    fn test_failed_allocation_leaves_heap_untouched() {
        let device = HeadlessDevice::default();
        let mut heap = DescriptorHeap::new(&device, DescriptorCategory::DepthStencil, 4).unwrap();
        heap.allocate(3).unwrap();
        assert!(heap.allocate(2).is_err());
        assert_eq!(heap.allocated(), 3);
        assert!(heap.allocate(1).is_ok());
    }

    #[test]
    fn test_cpu_only_heaps_have_no_gpu_handles() {
        let device = HeadlessDevice::default();
        let mut heaps = DescriptorHeaps::new(&device, &DescriptorCounts::default()).unwrap();
        assert!(heaps.allocate_rtv(2).unwrap().iter().all(|h| h.gpu.is_none()));
        assert!(heaps.allocate_dsv(1).unwrap().first().gpu.is_none());
        assert!(heaps.allocate_sampler(1).unwrap().first().gpu.is_some());
        assert!(heaps
            .allocate_cbv_srv_uav(2)
            .unwrap()
            .iter()
            .all(|h| h.gpu.is_some()));
        assert_eq!(heaps.heap(DescriptorCategory::CbvSrvUav).capacity(), 6100);
        heaps.destroy(&device);
    }
}
