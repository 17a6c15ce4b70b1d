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

//! Per-frame-slot command buffers.
//!
//! The ring owns `K` frame slots, each with a fixed set of reusable command
//! buffers. [`CommandBufferRing::begin_frame`] is the only throttle on the CPU:
//! before a slot is reused it waits for the fence its previous frame was
//! submitted with, so the CPU never runs more than `K` frames ahead.

use cadence_core::{
    CommandBufferId, CommandEncoder, ConfigurationError, FenceValue, GraphicsDevice, RenderError,
};

#[derive(Debug)]
struct FrameSlot {
    command_buffers: Vec<CommandBufferId>,
    used: usize,
    fence: FenceValue,
}

/// `K` frame slots of `M` command buffers each.
#[derive(Debug)]
pub struct CommandBufferRing {
    slots: Vec<FrameSlot>,
    current: usize,
    frames_begun: u64,
}

impl CommandBufferRing {
    /// Creates `slot_count` slots of `buffers_per_slot` command buffers.
    pub fn new(
        device: &dyn GraphicsDevice,
        slot_count: usize,
        buffers_per_slot: usize,
    ) -> Result<Self, RenderError> {
        let mut slots = Vec::with_capacity(slot_count);
        for slot in 0..slot_count {
            let command_buffers = (0..buffers_per_slot)
                .map(|i| device.create_command_buffer(&format!("Command buffer [slot {slot}] #{i}")))
                .collect::<Result<Vec<_>, _>>()?;
            slots.push(FrameSlot {
                command_buffers,
                used: 0,
                fence: 0,
            });
        }
        log::debug!(
            "Command buffer ring created: {} slots x {} buffers",
            slot_count,
            buffers_per_slot
        );
        Ok(Self {
            slots,
            current: 0,
            frames_begun: 0,
        })
    }

    /// Moves to the next frame slot and returns its index.
    ///
    /// Blocks until the fence recorded at the slot's previous use has
    /// completed; nothing of the slot is touched before that.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::DeviceLost`] if the fence can never complete.
    pub fn begin_frame(&mut self, device: &dyn GraphicsDevice) -> Result<usize, RenderError> {
        let next = if self.frames_begun == 0 {
            0
        } else {
            (self.current + 1) % self.slots.len()
        };

        let fence = self.slots[next].fence;
        if fence > device.completed_fence_value() {
            log::debug!("Frame slot {} still in flight, waiting on fence {}", next, fence);
            device.wait_for_fence(fence)?;
        }

        self.current = next;
        self.frames_begun += 1;
        self.slots[next].used = 0;
        Ok(next)
    }

    /// Resets and opens the next unused command buffer of the current slot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::CommandBuffersExhausted`] once every
    /// buffer of the slot has been handed out this frame.
    pub fn acquire(
        &mut self,
        device: &dyn GraphicsDevice,
    ) -> Result<Box<dyn CommandEncoder>, RenderError> {
        let current = self.current;
        let slot = &mut self.slots[current];
        let id = *slot.command_buffers.get(slot.used).ok_or(
            ConfigurationError::CommandBuffersExhausted {
                slot: current,
                capacity: slot.command_buffers.len(),
            },
        )?;
        slot.used += 1;
        device.begin_command_buffer(id)
    }

    /// Records the fence value that retires the current slot's work.
    pub fn finish_frame(&mut self, fence: FenceValue) {
        self.slots[self.current].fence = fence;
    }

    /// Index of the current slot.
    pub fn current_slot(&self) -> usize {
        self.current
    }

    /// Number of frame slots.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Command buffers handed out from the current slot this frame.
    pub fn used_in_current(&self) -> usize {
        self.slots[self.current].used
    }

    /// The fence last recorded for `slot`.
    pub fn slot_fence(&self, slot: usize) -> FenceValue {
        self.slots[slot].fence
    }

    /// Number of frames begun so far.
    pub fn frames_begun(&self) -> u64 {
        self.frames_begun
    }

    /// Destroys every command buffer. The caller waits for the GPU first.
    pub fn destroy(self, device: &dyn GraphicsDevice) {
        for id in self.slots.into_iter().flat_map(|s| s.command_buffers) {
            if let Err(e) = device.destroy_command_buffer(id) {
                log::warn!("CommandBufferRing: Failed to destroy {:?}: {:?}", id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_infra::{DeviceEvent, HeadlessDevice};

    fn submit_frame(ring: &mut CommandBufferRing, device: &HeadlessDevice) -> FenceValue {
        let encoder = ring.acquire(device).unwrap();
        let id = encoder.close().unwrap();
        device.submit(&[id]).unwrap();
        let fence = device.signal().unwrap();
        ring.finish_frame(fence);
        fence
    }

    #[test]
    fn test_slots_rotate() {
        let device = HeadlessDevice::default();
        let mut ring = CommandBufferRing::new(&device, 3, 2).unwrap();
        let slots: Vec<usize> = (0..5)
            .map(|_| {
                let slot = ring.begin_frame(&device).unwrap();
                submit_frame(&mut ring, &device);
                slot
            })
            .collect();
        assert_eq!(slots, vec![0, 1, 2, 0, 1]);
    }

    #[test]
    fn test_reused_slot_waits_for_its_fence_before_reset() {
        let device = HeadlessDevice::deferred();
        let mut ring = CommandBufferRing::new(&device, 2, 1).unwrap();

        ring.begin_frame(&device).unwrap();
        let first = submit_frame(&mut ring, &device);
        ring.begin_frame(&device).unwrap();
        submit_frame(&mut ring, &device);
        device.take_events();

        assert_eq!(ring.begin_frame(&device).unwrap(), 0);
        ring.acquire(&device).unwrap();

        let events = device.events();
        let wait = events
            .iter()
            .position(|e| *e == DeviceEvent::Waited { value: first, blocked: true })
            .expect("slot reuse waits on the first frame's fence");
        let reset = events
            .iter()
            .position(|e| matches!(e, DeviceEvent::CommandBufferReset(_)))
            .expect("command buffer reset");
        assert!(wait < reset);
    }

    #[test]
    fn test_completed_slot_does_not_wait() {
        let device = HeadlessDevice::default();
        let mut ring = CommandBufferRing::new(&device, 2, 1).unwrap();
        for _ in 0..4 {
            ring.begin_frame(&device).unwrap();
            submit_frame(&mut ring, &device);
        }
        assert!(!device
            .events()
            .iter()
            .any(|e| matches!(e, DeviceEvent::Waited { .. })));
    }

    #[test]
    fn test_acquire_past_capacity_fails() {
        let device = HeadlessDevice::default();
        let mut ring = CommandBufferRing::new(&device, 2, 2).unwrap();
        ring.begin_frame(&device).unwrap();
        let _a = ring.acquire(&device).unwrap();
        let _b = ring.acquire(&device).unwrap();
        assert!(matches!(
            ring.acquire(&device),
            Err(RenderError::Configuration(
                ConfigurationError::CommandBuffersExhausted { slot: 0, capacity: 2 }
            ))
        ));
        assert_eq!(ring.used_in_current(), 2);
    }
}
