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

//! The bundle of GPU allocators owned by a renderer.

use crate::{
    CommandBufferRing, ConstantBufferRing, DescriptorHeaps, GpuTimer, StaticBufferPool,
    UploadHeap,
};
use cadence_core::{FenceValue, GraphicsDevice, RenderError, RendererConfig};
use std::sync::Arc;

/// Owns the device handle and every pool built from a [`RendererConfig`].
///
/// Fields are public so callers can borrow the device and one pool at the
/// same time.
#[derive(Debug)]
pub struct RenderContext {
    /// The device every pool was created on.
    pub device: Arc<dyn GraphicsDevice>,
    /// The configuration the pools were sized from.
    pub config: RendererConfig,
    /// Descriptor pools.
    pub descriptors: DescriptorHeaps,
    /// Per-slot command buffers.
    pub command_ring: CommandBufferRing,
    /// Per-frame constant data.
    pub constants: ConstantBufferRing,
    /// Staging memory for loads.
    pub upload_heap: UploadHeap,
    /// Long-lived geometry and constants.
    pub static_pool: StaticBufferPool,
    /// Per-slot GPU timestamps.
    pub timer: GpuTimer,
}

impl RenderContext {
    /// Validates `config` and creates every pool.
    pub fn new(device: Arc<dyn GraphicsDevice>, config: RendererConfig) -> Result<Self, RenderError> {
        config.validate()?;
        let slots = config.frame_slots();
        let dev = device.as_ref();

        let descriptors = DescriptorHeaps::new(dev, &config.descriptors)?;
        let command_ring =
            CommandBufferRing::new(dev, slots, config.command_buffers_per_slot as usize)?;
        let constants = ConstantBufferRing::new(dev, config.constant_arena_size, slots)?;
        let upload_heap = UploadHeap::new(dev, config.upload_heap_size)?;
        let static_pool =
            StaticBufferPool::new(dev, config.static_pool_size, config.use_video_memory)?;
        let timer = GpuTimer::new(dev, slots, config.timestamps_per_frame)?;

        log::info!("Render context ready with {} frame slots", slots);
        Ok(Self {
            device,
            config,
            descriptors,
            command_ring,
            constants,
            upload_heap,
            static_pool,
            timer,
        })
    }

    /// Number of frame slots.
    pub fn frame_slots(&self) -> usize {
        self.command_ring.slot_count()
    }

    /// Starts a frame on every per-slot allocator and returns the slot index.
    ///
    /// Blocks until the slot's previous frame has completed.
    pub fn begin_frame(&mut self) -> Result<usize, RenderError> {
        let device = self.device.as_ref();
        let slot = self.command_ring.begin_frame(device)?;
        self.constants
            .begin_frame(slot, device.completed_fence_value())?;
        self.timer
            .begin_frame(device, slot, device.timestamp_frequency())?;
        Ok(slot)
    }

    /// Retires the current frame's allocations with `fence`.
    pub fn end_frame(&mut self, fence: FenceValue) {
        self.command_ring.finish_frame(fence);
        self.constants.end_frame(fence);
        self.timer.end_frame(fence);
    }

    /// Copies the static pool's new data to video memory, waits for every
    /// staged upload, then frees the upload heap and the static staging copy.
    ///
    /// Loads reopen both with [`UploadHeap::reopen`] and
    /// [`StaticBufferPool::reopen_staging`].
    pub fn finish_uploads(&mut self) -> Result<(), RenderError> {
        let device = self.device.as_ref();
        let encoder = self.upload_heap.encoder(device)?;
        self.static_pool.upload_data(encoder)?;
        self.upload_heap.flush_and_wait(device)?;
        self.upload_heap.release(device);
        self.static_pool.free_upload_heap(device);
        Ok(())
    }

    /// Waits for the GPU and destroys every pool.
    pub fn destroy(self) {
        if let Err(e) = self.device.wait_idle() {
            log::warn!("RenderContext: Failed to wait for the GPU: {:?}", e);
        }
        let device = self.device.as_ref();
        self.timer.destroy(device);
        self.static_pool.destroy(device);
        self.upload_heap.destroy(device);
        self.constants.destroy(device);
        self.command_ring.destroy(device);
        self.descriptors.destroy(device);
        log::info!("Render context destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_infra::HeadlessDevice;

    fn small_config() -> RendererConfig {
        RendererConfig {
            constant_arena_size: 3 * 4096,
            static_pool_size: 1 << 16,
            upload_heap_size: 1 << 16,
            ..RendererConfig::default()
        }
    }

    #[test]
    fn test_context_creates_and_destroys_everything() {
        let device = HeadlessDevice::default();
        let context = RenderContext::new(Arc::new(device.clone()), small_config()).unwrap();
        assert_eq!(context.frame_slots(), 3);
        assert!(device.live_buffers() > 0);

        context.destroy();
        assert_eq!(device.live_buffers(), 0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let device = HeadlessDevice::default();
        let config = RendererConfig {
            back_buffer_count: 0,
            ..small_config()
        };
        assert!(matches!(
            RenderContext::new(Arc::new(device), config),
            Err(RenderError::Configuration(_))
        ));
    }

    #[test]
    fn test_frames_rotate_through_slots() {
        let device = HeadlessDevice::default();
        let mut context = RenderContext::new(Arc::new(device.clone()), small_config()).unwrap();
        let mut seen = Vec::new();
        for _ in 0..4 {
            let slot = context.begin_frame().unwrap();
            seen.push(slot);
            let fence = context.device.signal().unwrap();
            context.end_frame(fence);
        }
        assert_eq!(seen, vec![0, 1, 2, 0]);
    }

    #[test]
    fn test_finish_uploads_retires_staging() {
        let device = HeadlessDevice::default();
        let mut context = RenderContext::new(Arc::new(device.clone()), small_config()).unwrap();
        let geometry = context
            .static_pool
            .allocate_with_data(&device, &[7u8; 64])
            .unwrap();

        context.finish_uploads().unwrap();
        assert!(context.upload_heap.is_released());
        assert!(!context.static_pool.has_staging());

        let video = context.static_pool.gpu_buffer().unwrap();
        let contents = device.buffer_contents(video).unwrap();
        let start = geometry.offset as usize;
        assert_eq!(&contents[start..start + 64], &[7u8; 64]);

        // A second call has nothing left to do but must not fail.
        context.upload_heap.reopen(&device).unwrap();
        context.static_pool.reopen_staging(&device).unwrap();
        context.finish_uploads().unwrap();
    }
}
