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

//! Transient per-frame constant data.
//!
//! One CPU-writable arena is split into `K` equal regions, one per frame slot.
//! Each region is driven by its own [`RingCursor`], so a frame may always
//! allocate its full `arena / K` budget once the slot's previous fence has
//! completed, whatever the other slots still hold.

use crate::ring::RingCursor;
use bytemuck::Pod;
use cadence_core::{
    align_up, BufferDescriptor, BufferId, BufferUsage, ConfigurationError, FenceValue, GpuAddress,
    GraphicsDevice, MemoryLocation, RenderError, CONSTANT_BUFFER_ALIGNMENT,
};

/// The part of the arena owned by one frame slot.
#[derive(Debug)]
struct SlotArena {
    base: u64,
    cursor: RingCursor,
    fence: FenceValue,
}

/// A fence-gated ring of constant buffer memory.
#[derive(Debug)]
pub struct ConstantBufferRing {
    buffer: BufferId,
    base: GpuAddress,
    slots: Vec<SlotArena>,
    current: usize,
    frame_budget: u64,
    frame_used: u64,
}

impl ConstantBufferRing {
    /// Creates an arena of `total_size` bytes split between `slot_count` frame slots.
    pub fn new(
        device: &dyn GraphicsDevice,
        total_size: u64,
        slot_count: usize,
    ) -> Result<Self, RenderError> {
        let slot_count = slot_count.max(1);
        let frame_budget = {
            let share = total_size / slot_count as u64;
            share - share % CONSTANT_BUFFER_ALIGNMENT
        };
        if frame_budget == 0 {
            return Err(ConfigurationError::InvalidConfig(format!(
                "constant arena of {} bytes cannot hold {} frame slots",
                total_size, slot_count
            ))
            .into());
        }

        let buffer = device.create_buffer(&BufferDescriptor {
            label: Some("Constant buffer ring".into()),
            size: total_size,
            location: MemoryLocation::Upload,
            usage: BufferUsage::CONSTANT,
        })?;
        let base = device.buffer_gpu_address(buffer)?;
        let slots = (0..slot_count as u64)
            .map(|i| SlotArena {
                base: i * frame_budget,
                cursor: RingCursor::new(frame_budget, CONSTANT_BUFFER_ALIGNMENT),
                fence: 0,
            })
            .collect();
        log::debug!(
            "Constant buffer ring created: {} bytes, {} bytes per frame",
            total_size,
            frame_budget
        );
        Ok(Self {
            buffer,
            base,
            slots,
            current: 0,
            frame_budget,
            frame_used: 0,
        })
    }

    /// Starts a frame in `slot`, releasing the slot's previous frame.
    ///
    /// # Errors
    ///
    /// Fails if `slot` is out of range or its last fence is still pending
    /// (`completed` is below it).
    pub fn begin_frame(&mut self, slot: usize, completed: FenceValue) -> Result<(), RenderError> {
        let slot_count = self.slots.len();
        let arena = self.slots.get_mut(slot).ok_or_else(|| {
            RenderError::ResourceError(format!(
                "constant ring has {} slots, frame slot {} requested",
                slot_count, slot
            ))
        })?;
        if arena.fence > completed {
            return Err(RenderError::ResourceError(format!(
                "constant slot {} reused before fence {} completed (completed: {})",
                slot, arena.fence, completed
            )));
        }
        let released = arena.cursor.reclaim(completed);
        if released > 0 {
            log::trace!("Constant ring slot {} released {} bytes", slot, released);
        }
        self.current = slot;
        self.frame_used = 0;
        Ok(())
    }

    /// Copies `data` into the current slot's region and returns its GPU address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ArenaExhausted`] if the frame would exceed
    /// its slot's share of the arena.
    pub fn allocate(
        &mut self,
        device: &dyn GraphicsDevice,
        data: &[u8],
    ) -> Result<GpuAddress, RenderError> {
        let requested = align_up(data.len().max(1) as u64, CONSTANT_BUFFER_ALIGNMENT);
        let exhausted = ConfigurationError::ArenaExhausted {
            requested,
            frame_used: self.frame_used,
            frame_budget: self.frame_budget,
        };
        if self.frame_used + requested > self.frame_budget {
            return Err(exhausted.into());
        }
        let arena = &mut self.slots[self.current];
        let offset = arena.base + arena.cursor.allocate(requested).ok_or(exhausted)?;
        device.write_buffer(self.buffer, offset, data)?;
        self.frame_used += requested;
        Ok(self.base.offset(offset))
    }

    /// Copies a plain-data value into the ring.
    pub fn allocate_pod<T: Pod>(
        &mut self,
        device: &dyn GraphicsDevice,
        value: &T,
    ) -> Result<GpuAddress, RenderError> {
        self.allocate(device, bytemuck::bytes_of(value))
    }

    /// Ends the frame; its allocations are retired by `fence`.
    pub fn end_frame(&mut self, fence: FenceValue) {
        let arena = &mut self.slots[self.current];
        arena.cursor.close_tab(fence);
        arena.fence = fence;
    }

    /// Aligned bytes allocated in the current frame.
    pub fn frame_used(&self) -> u64 {
        self.frame_used
    }

    /// Bytes a single frame may allocate.
    pub fn frame_budget(&self) -> u64 {
        self.frame_budget
    }

    /// Number of frame slots sharing the arena.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Bytes allocated by frames that have not been retired yet.
    pub fn in_flight(&self) -> u64 {
        self.slots.iter().map(|arena| arena.cursor.in_flight()).sum()
    }

    /// The backing buffer.
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// Destroys the backing buffer.
    pub fn destroy(self, device: &dyn GraphicsDevice) {
        if let Err(e) = device.destroy_buffer(self.buffer) {
            log::warn!("ConstantBufferRing: Failed to destroy buffer: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_infra::HeadlessDevice;

    #[test]
    fn test_allocations_are_aligned_and_written() {
        let device = HeadlessDevice::default();
        let mut ring = ConstantBufferRing::new(&device, 3 * 4096, 3).unwrap();
        ring.begin_frame(0, 0).unwrap();

        let a = ring.allocate(&device, &[1, 2, 3]).unwrap();
        let b = ring.allocate_pod(&device, &[7u32; 4]).unwrap();
        assert_eq!(b.0 - a.0, CONSTANT_BUFFER_ALIGNMENT);
        assert_eq!(a.0 % CONSTANT_BUFFER_ALIGNMENT, 0);

        let contents = device.buffer_contents(ring.buffer()).unwrap();
        assert_eq!(&contents[..3], &[1, 2, 3]);
        assert_eq!(&contents[256..260], &7u32.to_le_bytes());
        assert_eq!(ring.frame_used(), 512);
    }

    #[test]
    fn test_frame_budget_is_enforced() {
        let device = HeadlessDevice::default();
        let mut ring = ConstantBufferRing::new(&device, 3 * 1024, 3).unwrap();
        assert_eq!(ring.frame_budget(), 1024);
        ring.begin_frame(0, 0).unwrap();
        ring.allocate(&device, &[0; 1024]).unwrap();

        let err = ring.allocate(&device, &[0; 4]).unwrap_err();
        assert!(matches!(
            err,
            RenderError::Configuration(ConfigurationError::ArenaExhausted {
                requested: 256,
                frame_used: 1024,
                frame_budget: 1024,
            })
        ));
    }

    #[test]
    fn test_slots_own_disjoint_regions() {
        let device = HeadlessDevice::default();
        let mut ring = ConstantBufferRing::new(&device, 3 * 1024, 3).unwrap();
        let base = device.buffer_gpu_address(ring.buffer()).unwrap();

        for slot in 0..3 {
            ring.begin_frame(slot, 0).unwrap();
            let address = ring.allocate(&device, &[0; 16]).unwrap();
            assert_eq!(address, base.offset(slot as u64 * 1024));
            ring.end_frame(slot as u64 + 1);
        }
        assert_eq!(ring.in_flight(), 3 * 256);
    }

    #[test]
    fn test_pending_slot_cannot_restart() {
        let device = HeadlessDevice::default();
        let mut ring = ConstantBufferRing::new(&device, 2 * 512, 2).unwrap();
        ring.begin_frame(0, 0).unwrap();
        ring.allocate(&device, &[0; 512]).unwrap();
        ring.end_frame(1);

        assert!(ring.begin_frame(0, 0).is_err());
        assert!(ring.begin_frame(2, 1).is_err());

        ring.begin_frame(0, 1).unwrap();
        let address = ring.allocate(&device, &[0; 512]).unwrap();
        assert_eq!(address, device.buffer_gpu_address(ring.buffer()).unwrap());
    }

    #[test]
    fn test_arena_smaller_than_slots_is_rejected() {
        let device = HeadlessDevice::default();
        let err = ConstantBufferRing::new(&device, 512, 3).unwrap_err();
        assert!(matches!(
            err,
            RenderError::Configuration(ConfigurationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_reused_slot_gets_full_budget_after_mixed_frames() {
        let device = HeadlessDevice::deferred();
        let mut ring = ConstantBufferRing::new(&device, 3 * 1024, 3).unwrap();

        // Three frames of mixed sizes, none retired.
        for (slot, bytes) in [(0, 768), (1, 1024), (2, 1024)] {
            ring.begin_frame(slot, device.completed_fence_value()).unwrap();
            ring.allocate(&device, &vec![0; bytes]).unwrap();
            ring.end_frame(device.signal().unwrap());
        }

        // Slot 0 comes back once only its own frame has completed.
        device.wait_for_fence(1).unwrap();
        assert_eq!(device.completed_fence_value(), 1);
        ring.begin_frame(0, 1).unwrap();
        ring.allocate(&device, &[0; 512]).unwrap();
        ring.allocate(&device, &[0; 512]).unwrap();
        assert_eq!(ring.frame_used(), ring.frame_budget());
        assert_eq!(ring.in_flight(), 3 * 1024);
    }
}
