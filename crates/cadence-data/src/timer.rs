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

//! GPU timestamp profiling.
//!
//! Every frame slot owns a contiguous range of a query set and of a readback
//! buffer. Marks recorded during a frame are resolved into the readback range
//! at the end of the frame and read back the next time the same slot begins,
//! once its fence has completed, so reading results never stalls the GPU.

use cadence_core::{
    BufferDescriptor, BufferId, BufferUsage, CommandEncoder, ConfigurationError, FenceValue,
    GraphicsDevice, MemoryLocation, QuerySetId, RenderError,
};
use std::borrow::Cow;

const TIMESTAMP_SIZE: u64 = std::mem::size_of::<u64>() as u64;

/// One measured interval.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingSample {
    /// Label of the mark that closed the interval.
    pub label: Cow<'static, str>,
    /// Duration in microseconds.
    pub microseconds: f32,
}

#[derive(Debug, Default)]
struct TimerSlot {
    labels: Vec<Cow<'static, str>>,
    fence: FenceValue,
    resolved: bool,
}

/// Per-frame-slot GPU timestamps.
#[derive(Debug)]
pub struct GpuTimer {
    query_set: QuerySetId,
    readback: BufferId,
    capacity: u32,
    slots: Vec<TimerSlot>,
    current: usize,
    results: Vec<TimingSample>,
}

impl GpuTimer {
    /// Creates a timer with room for `capacity` marks in each of `slot_count` slots.
    pub fn new(
        device: &dyn GraphicsDevice,
        slot_count: usize,
        capacity: u32,
    ) -> Result<Self, RenderError> {
        let total = slot_count as u32 * capacity;
        let query_set = device.create_query_set(total)?;
        let readback = device.create_buffer(&BufferDescriptor {
            label: Some("GPU timer readback".into()),
            size: u64::from(total) * TIMESTAMP_SIZE,
            location: MemoryLocation::Readback,
            usage: BufferUsage::QUERY_RESOLVE,
        })?;
        Ok(Self {
            query_set,
            readback,
            capacity,
            slots: (0..slot_count).map(|_| TimerSlot::default()).collect(),
            current: 0,
            results: Vec::new(),
        })
    }

    fn first_query(&self, slot: usize) -> u32 {
        slot as u32 * self.capacity
    }

    /// Makes `slot` current, reading back the timestamps of its previous use
    /// if that frame has completed on the GPU.
    pub fn begin_frame(
        &mut self,
        device: &dyn GraphicsDevice,
        slot: usize,
        ticks_per_second: u64,
    ) -> Result<(), RenderError> {
        self.current = slot;
        let first = self.first_query(slot);
        let completed = device.completed_fence_value();
        let Some(entry) = self.slots.get_mut(slot) else {
            return Err(RenderError::ResourceError(format!(
                "timer slot {slot} out of range"
            )));
        };

        if entry.resolved && entry.fence <= completed && !entry.labels.is_empty() {
            let mut bytes = vec![0u8; entry.labels.len() * TIMESTAMP_SIZE as usize];
            device.read_buffer(self.readback, u64::from(first) * TIMESTAMP_SIZE, &mut bytes)?;
            let ticks: Vec<u64> = bytes
                .chunks_exact(TIMESTAMP_SIZE as usize)
                .map(|chunk| {
                    let mut raw = [0u8; TIMESTAMP_SIZE as usize];
                    raw.copy_from_slice(chunk);
                    u64::from_le_bytes(raw)
                })
                .collect();

            let to_us = |delta: u64| (delta as f64 * 1_000_000.0 / ticks_per_second.max(1) as f64) as f32;
            self.results.clear();
            for (i, window) in ticks.windows(2).enumerate() {
                self.results.push(TimingSample {
                    label: entry.labels[i + 1].clone(),
                    microseconds: to_us(window[1].saturating_sub(window[0])),
                });
            }
            if let (Some(first), Some(last)) = (ticks.first(), ticks.last()) {
                self.results.push(TimingSample {
                    label: Cow::Borrowed("Total GPU Time"),
                    microseconds: to_us(last.saturating_sub(*first)),
                });
            }
        }

        entry.labels.clear();
        entry.resolved = false;
        Ok(())
    }

    /// Records a timestamp labeled `label` in the current slot.
    pub fn mark(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        label: impl Into<Cow<'static, str>>,
    ) -> Result<(), RenderError> {
        let first = self.first_query(self.current);
        let capacity = self.capacity;
        let entry = &mut self.slots[self.current];
        let index = entry.labels.len() as u32;
        if index >= capacity {
            return Err(ConfigurationError::TimestampsExhausted { capacity }.into());
        }
        encoder.write_timestamp(self.query_set, first + index);
        entry.labels.push(label.into());
        Ok(())
    }

    /// Resolves the current slot's timestamps into the readback buffer.
    pub fn collect(&mut self, encoder: &mut dyn CommandEncoder) {
        let first = self.first_query(self.current);
        let entry = &mut self.slots[self.current];
        if entry.labels.is_empty() {
            return;
        }
        encoder.resolve_timestamps(
            self.query_set,
            first,
            entry.labels.len() as u32,
            self.readback,
            u64::from(first) * TIMESTAMP_SIZE,
        );
        entry.resolved = true;
    }

    /// Records the fence that retires the current slot's frame.
    pub fn end_frame(&mut self, fence: FenceValue) {
        self.slots[self.current].fence = fence;
    }

    /// Intervals of the most recently read back frame, in mark order,
    /// followed by the total.
    pub fn results(&self) -> &[TimingSample] {
        &self.results
    }

    /// Number of marks recorded in the current slot.
    pub fn marks_in_current(&self) -> usize {
        self.slots[self.current].labels.len()
    }

    /// Destroys the query set and readback buffer.
    pub fn destroy(self, device: &dyn GraphicsDevice) {
        if let Err(e) = device.destroy_query_set(self.query_set) {
            log::warn!("GpuTimer: Failed to destroy query set: {:?}", e);
        }
        if let Err(e) = device.destroy_buffer(self.readback) {
            log::warn!("GpuTimer: Failed to destroy readback buffer: {:?}", e);
        }
    }
}
