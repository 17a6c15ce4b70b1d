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

//! The staging heap used while loading.
//!
//! Assets are written into a CPU-visible buffer by a bump allocator and the
//! copies out of it are recorded into a command buffer owned by the heap. A
//! single [`UploadHeap::flush_and_wait`] submits everything and blocks until
//! the GPU has consumed it, after which the allocator is rewound. Once loading
//! is over [`UploadHeap::release`] frees the staging memory; any later use is
//! a programming error and reports [`ConfigurationError::UploadHeapReleased`].

use crate::tracked::TrackedTexture;
use cadence_core::{
    align_up, BufferDescriptor, BufferId, BufferUsage, CommandBufferId, CommandEncoder,
    ConfigurationError, GpuAddress, GraphicsDevice, MemoryLocation, RenderError, ResourceState,
};
use std::fmt;

/// A range of the upload heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadAllocation {
    /// Offset inside the staging buffer.
    pub offset: u64,
    /// Size in bytes.
    pub size: u64,
    /// GPU address of the range, readable by copy commands.
    pub address: GpuAddress,
}

/// A bump-allocated staging buffer with its own command buffer.
pub struct UploadHeap {
    buffer: Option<BufferId>,
    base: GpuAddress,
    capacity: u64,
    offset: u64,
    command_buffer: CommandBufferId,
    encoder: Option<Box<dyn CommandEncoder>>,
    pending_copies: usize,
}

impl fmt::Debug for UploadHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadHeap")
            .field("buffer", &self.buffer)
            .field("capacity", &self.capacity)
            .field("offset", &self.offset)
            .field("recording", &self.encoder.is_some())
            .field("pending_copies", &self.pending_copies)
            .finish()
    }
}

impl UploadHeap {
    /// Creates a staging heap of `capacity` bytes.
    pub fn new(device: &dyn GraphicsDevice, capacity: u64) -> Result<Self, RenderError> {
        let command_buffer = device.create_command_buffer("Upload heap")?;
        let mut heap = Self {
            buffer: None,
            base: GpuAddress::default(),
            capacity,
            offset: 0,
            command_buffer,
            encoder: None,
            pending_copies: 0,
        };
        heap.reopen(device)?;
        Ok(heap)
    }

    /// Recreates the staging memory after a [`release`](Self::release).
    ///
    /// Does nothing if the heap is live.
    pub fn reopen(&mut self, device: &dyn GraphicsDevice) -> Result<(), RenderError> {
        if self.buffer.is_some() {
            return Ok(());
        }
        let buffer = device.create_buffer(&BufferDescriptor {
            label: Some("Upload heap".into()),
            size: self.capacity,
            location: MemoryLocation::Upload,
            usage: BufferUsage::COPY_SRC,
        })?;
        self.base = device.buffer_gpu_address(buffer)?;
        self.buffer = Some(buffer);
        self.offset = 0;
        log::debug!("Upload heap opened with {} bytes", self.capacity);
        Ok(())
    }

    fn live_buffer(&self) -> Result<BufferId, RenderError> {
        self.buffer
            .ok_or_else(|| ConfigurationError::UploadHeapReleased.into())
    }

    /// Reserves `size` bytes aligned to `alignment`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::BufferPoolExhausted`] when the heap is full
    /// (flush and retry, or configure a larger heap) and
    /// [`ConfigurationError::UploadHeapReleased`] after a release.
    pub fn allocate(&mut self, size: u64, alignment: u64) -> Result<UploadAllocation, RenderError> {
        self.live_buffer()?;
        let start = align_up(self.offset, alignment.max(1));
        if start + size > self.capacity {
            return Err(ConfigurationError::BufferPoolExhausted {
                pool: "upload heap",
                requested: size,
                remaining: self.capacity.saturating_sub(self.offset),
            }
            .into());
        }
        self.offset = start + size;
        Ok(UploadAllocation {
            offset: start,
            size,
            address: self.base.offset(start),
        })
    }

    /// Writes `data` at the start of `allocation`.
    pub fn write(
        &self,
        device: &dyn GraphicsDevice,
        allocation: &UploadAllocation,
        data: &[u8],
    ) -> Result<(), RenderError> {
        debug_assert!(self.buffer.is_some(), "upload heap written after release");
        let buffer = self.live_buffer()?;
        if data.len() as u64 > allocation.size {
            return Err(RenderError::ResourceError(format!(
                "{} bytes do not fit a {} byte upload allocation",
                data.len(),
                allocation.size
            )));
        }
        device.write_buffer(buffer, allocation.offset, data)
    }

    /// Reserves room for `data` and copies it in.
    pub fn stage(
        &mut self,
        device: &dyn GraphicsDevice,
        data: &[u8],
        alignment: u64,
    ) -> Result<UploadAllocation, RenderError> {
        let allocation = self.allocate(data.len() as u64, alignment)?;
        self.write(device, &allocation, data)?;
        Ok(allocation)
    }

    /// The heap's open command buffer, begun on first use.
    pub fn encoder(
        &mut self,
        device: &dyn GraphicsDevice,
    ) -> Result<&mut dyn CommandEncoder, RenderError> {
        self.live_buffer()?;
        let encoder = match self.encoder.take() {
            Some(encoder) => encoder,
            None => device.begin_command_buffer(self.command_buffer)?,
        };
        Ok(self.encoder.insert(encoder).as_mut())
    }

    /// Records a copy of `allocation` into `destination` at `destination_offset`.
    pub fn copy_to_buffer(
        &mut self,
        device: &dyn GraphicsDevice,
        allocation: &UploadAllocation,
        destination: BufferId,
        destination_offset: u64,
    ) -> Result<(), RenderError> {
        let source = self.live_buffer()?;
        self.encoder(device)?.copy_buffer_to_buffer(
            source,
            allocation.offset,
            destination,
            destination_offset,
            allocation.size,
        );
        self.pending_copies += 1;
        Ok(())
    }

    /// Records a copy of `allocation` into `texture`, which must be in
    /// [`ResourceState::CopyDest`], and then makes it shader-readable.
    pub fn copy_to_texture(
        &mut self,
        device: &dyn GraphicsDevice,
        allocation: &UploadAllocation,
        texture: &mut TrackedTexture,
    ) -> Result<(), RenderError> {
        let source = self.live_buffer()?;
        texture.require(ResourceState::CopyDest)?;
        let encoder = self.encoder(device)?;
        encoder.copy_buffer_to_texture(source, allocation.offset, texture.id());
        texture.transition(
            encoder,
            ResourceState::CopyDest,
            ResourceState::PixelShaderResource,
        )?;
        self.pending_copies += 1;
        Ok(())
    }

    /// Submits every recorded copy, waits for the GPU to finish them and
    /// rewinds the allocator.
    pub fn flush_and_wait(&mut self, device: &dyn GraphicsDevice) -> Result<(), RenderError> {
        self.live_buffer()?;
        if let Some(encoder) = self.encoder.take() {
            let id = encoder.close()?;
            device.submit(&[id])?;
            let fence = device.signal()?;
            device.wait_for_fence(fence)?;
            log::info!(
                "Upload heap flushed: {} copies, {} bytes staged",
                self.pending_copies,
                self.offset
            );
        }
        self.offset = 0;
        self.pending_copies = 0;
        Ok(())
    }

    /// Frees the staging memory. Safe to call more than once.
    ///
    /// Copies recorded but not flushed are discarded.
    pub fn release(&mut self, device: &dyn GraphicsDevice) {
        if self.encoder.take().is_some() {
            log::warn!(
                "UploadHeap: Released with {} unflushed copies",
                self.pending_copies
            );
        }
        if let Some(buffer) = self.buffer.take() {
            if let Err(e) = device.destroy_buffer(buffer) {
                log::warn!("UploadHeap: Failed to destroy staging buffer: {:?}", e);
            }
            log::debug!("Upload heap released");
        }
        self.offset = 0;
        self.pending_copies = 0;
    }

    /// Whether the staging memory has been freed.
    pub fn is_released(&self) -> bool {
        self.buffer.is_none()
    }

    /// Bytes reserved since the last flush.
    pub fn used(&self) -> u64 {
        self.offset
    }

    /// Size of the staging memory.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Frees the staging memory and the command buffer.
    pub fn destroy(mut self, device: &dyn GraphicsDevice) {
        self.release(device);
        if let Err(e) = device.destroy_command_buffer(self.command_buffer) {
            log::warn!("UploadHeap: Failed to destroy command buffer: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{TextureDescriptor, TextureFormat, TextureUsage};
    use cadence_infra::{DeviceEvent, HeadlessDevice};

    fn device_buffer(device: &HeadlessDevice, size: u64) -> BufferId {
        device
            .create_buffer(&BufferDescriptor {
                label: Some("destination".into()),
                size,
                location: MemoryLocation::Readback,
                usage: BufferUsage::COPY_DST,
            })
            .unwrap()
    }

    #[test]
    fn test_flush_makes_data_visible_to_gpu() {
        let device = HeadlessDevice::deferred();
        let mut heap = UploadHeap::new(&device, 1024).unwrap();
        let destination = device_buffer(&device, 64);

        let allocation = heap.stage(&device, b"vertex data", 16).unwrap();
        heap.copy_to_buffer(&device, &allocation, destination, 8)
            .unwrap();
        heap.flush_and_wait(&device).unwrap();

        let contents = device.buffer_contents(destination).unwrap();
        assert_eq!(&contents[8..19], b"vertex data");
        assert_eq!(heap.used(), 0);

        // The flush waited on its own fence.
        let signaled = device.signaled_fence_value();
        assert!(device.events().contains(&DeviceEvent::Waited {
            value: signaled,
            blocked: true
        }));
        assert_eq!(device.completed_fence_value(), signaled);
    }

    #[test]
    fn test_texture_upload_leaves_texture_readable() {
        let device = HeadlessDevice::default();
        let mut heap = UploadHeap::new(&device, 1024).unwrap();
        let mut texture = TrackedTexture::create(
            &device,
            &TextureDescriptor::new_2d(
                "albedo",
                4,
                4,
                TextureFormat::Rgba8Unorm,
                TextureUsage::SHADER_RESOURCE | TextureUsage::COPY_DST,
                ResourceState::CopyDest,
            ),
        )
        .unwrap();

        let allocation = heap.stage(&device, &[255; 64], 512).unwrap();
        heap.copy_to_texture(&device, &allocation, &mut texture)
            .unwrap();
        heap.flush_and_wait(&device).unwrap();

        assert_eq!(texture.state(), ResourceState::PixelShaderResource);
        assert_eq!(
            device.texture_state(texture.id()),
            Some(ResourceState::PixelShaderResource)
        );
        assert_eq!(device.texture_uploaded_bytes(texture.id()), Some(64));
    }

    #[test]
    fn test_allocations_respect_alignment_and_capacity() {
        let device = HeadlessDevice::default();
        let mut heap = UploadHeap::new(&device, 1024).unwrap();
        let a = heap.allocate(10, 1).unwrap();
        let b = heap.allocate(10, 512).unwrap();
        assert_eq!(a.offset, 0);
        assert_eq!(b.offset, 512);
        assert!(matches!(
            heap.allocate(600, 1),
            Err(RenderError::Configuration(
                ConfigurationError::BufferPoolExhausted { .. }
            ))
        ));
    }

    #[test]
    fn test_release_is_idempotent_and_reopen_restores() {
        let device = HeadlessDevice::default();
        let mut heap = UploadHeap::new(&device, 256).unwrap();
        let buffers = device.live_buffers();
        heap.release(&device);
        heap.release(&device);
        assert!(heap.is_released());
        assert_eq!(device.live_buffers(), buffers - 1);

        heap.reopen(&device).unwrap();
        assert!(heap.stage(&device, &[1, 2, 3], 4).is_ok());
        heap.destroy(&device);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "upload heap written after release"))]
    fn test_write_after_release_is_rejected() {
        let device = HeadlessDevice::default();
        let mut heap = UploadHeap::new(&device, 256).unwrap();
        let allocation = heap.allocate(4, 4).unwrap();
        heap.flush_and_wait(&device).unwrap();
        heap.release(&device);

        let result = heap.write(&device, &allocation, &[1, 2, 3, 4]);
        assert!(matches!(
            result,
            Err(RenderError::Configuration(ConfigurationError::UploadHeapReleased))
        ));
    }
}
