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

//! Long-lived vertex, index and constant data.
//!
//! The pool is a bump allocator over one large buffer. Allocations are never
//! freed individually. Data is written into a CPU-visible staging copy and,
//! when the pool lives in video memory, moved there by
//! [`StaticBufferPool::upload_data`]. After the first upload the staging copy
//! can be dropped with [`StaticBufferPool::free_upload_heap`].

use cadence_core::{
    align_up, BufferDescriptor, BufferId, BufferUsage, CommandEncoder, ConfigurationError,
    GpuAddress, GraphicsDevice, MemoryLocation, RenderError, CONSTANT_BUFFER_ALIGNMENT,
};

/// A permanent range of the static pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Suballocation {
    /// Offset inside the pool.
    pub offset: u64,
    /// Size in bytes.
    pub size: u64,
    /// Address the GPU reads the data from.
    pub address: GpuAddress,
}

/// A bump allocator for data that lives as long as the renderer.
#[derive(Debug)]
pub struct StaticBufferPool {
    staging: Option<BufferId>,
    video: Option<BufferId>,
    base: GpuAddress,
    capacity: u64,
    offset: u64,
    uploaded: u64,
}

const STATIC_USAGE: BufferUsage = BufferUsage::VERTEX
    .union(BufferUsage::INDEX)
    .union(BufferUsage::CONSTANT);

impl StaticBufferPool {
    /// Creates a pool of `capacity` bytes.
    ///
    /// With `use_video_memory` the GPU reads from a device-local copy that is
    /// filled by [`upload_data`](Self::upload_data); otherwise it reads the
    /// CPU-visible buffer directly.
    pub fn new(
        device: &dyn GraphicsDevice,
        capacity: u64,
        use_video_memory: bool,
    ) -> Result<Self, RenderError> {
        let video = if use_video_memory {
            Some(device.create_buffer(&BufferDescriptor {
                label: Some("Static pool (video)".into()),
                size: capacity,
                location: MemoryLocation::DeviceLocal,
                usage: STATIC_USAGE | BufferUsage::COPY_DST,
            })?)
        } else {
            None
        };
        let staging = Self::create_staging(device, capacity, use_video_memory)?;
        let base = device.buffer_gpu_address(video.unwrap_or(staging))?;
        log::info!(
            "Static buffer pool created: {} bytes ({})",
            capacity,
            if use_video_memory { "video memory" } else { "system memory" }
        );
        Ok(Self {
            staging: Some(staging),
            video,
            base,
            capacity,
            offset: 0,
            uploaded: 0,
        })
    }

    fn create_staging(
        device: &dyn GraphicsDevice,
        capacity: u64,
        use_video_memory: bool,
    ) -> Result<BufferId, RenderError> {
        let usage = if use_video_memory {
            BufferUsage::COPY_SRC
        } else {
            STATIC_USAGE
        };
        device.create_buffer(&BufferDescriptor {
            label: Some("Static pool (staging)".into()),
            size: capacity,
            location: MemoryLocation::Upload,
            usage,
        })
    }

    /// Reserves `size` bytes, aligned for constant buffer use.
    pub fn allocate(&mut self, size: u64) -> Result<Suballocation, RenderError> {
        let start = align_up(self.offset, CONSTANT_BUFFER_ALIGNMENT);
        if start + size > self.capacity {
            return Err(ConfigurationError::BufferPoolExhausted {
                pool: "static pool",
                requested: size,
                remaining: self.capacity.saturating_sub(self.offset),
            }
            .into());
        }
        self.offset = start + size;
        Ok(Suballocation {
            offset: start,
            size,
            address: self.base.offset(start),
        })
    }

    /// Writes `data` into the staging copy of `allocation`.
    pub fn write(
        &self,
        device: &dyn GraphicsDevice,
        allocation: &Suballocation,
        data: &[u8],
    ) -> Result<(), RenderError> {
        let staging = self
            .staging
            .ok_or(ConfigurationError::UploadHeapReleased)?;
        if data.len() as u64 > allocation.size {
            return Err(RenderError::ResourceError(format!(
                "{} bytes do not fit a {} byte static allocation",
                data.len(),
                allocation.size
            )));
        }
        device.write_buffer(staging, allocation.offset, data)
    }

    /// Reserves room for `data` and writes it.
    pub fn allocate_with_data(
        &mut self,
        device: &dyn GraphicsDevice,
        data: &[u8],
    ) -> Result<Suballocation, RenderError> {
        let allocation = self.allocate(data.len() as u64)?;
        self.write(device, &allocation, data)?;
        Ok(allocation)
    }

    /// Records the copy of everything written since the last upload into
    /// video memory. Does nothing for a system-memory pool.
    pub fn upload_data(&mut self, encoder: &mut dyn CommandEncoder) -> Result<(), RenderError> {
        let Some(video) = self.video else {
            self.uploaded = self.offset;
            return Ok(());
        };
        if self.uploaded == self.offset {
            return Ok(());
        }
        let staging = self
            .staging
            .ok_or(ConfigurationError::UploadHeapReleased)?;
        encoder.copy_buffer_to_buffer(
            staging,
            self.uploaded,
            video,
            self.uploaded,
            self.offset - self.uploaded,
        );
        log::debug!(
            "Static pool upload of {} bytes recorded",
            self.offset - self.uploaded
        );
        self.uploaded = self.offset;
        Ok(())
    }

    /// Frees the staging copy once its contents are in video memory.
    ///
    /// A system-memory pool keeps its buffer since the GPU reads it directly.
    pub fn free_upload_heap(&mut self, device: &dyn GraphicsDevice) {
        if self.video.is_none() {
            return;
        }
        if self.uploaded != self.offset {
            log::warn!(
                "StaticBufferPool: Freeing staging with {} bytes not uploaded",
                self.offset - self.uploaded
            );
        }
        if let Some(staging) = self.staging.take() {
            if let Err(e) = device.destroy_buffer(staging) {
                log::warn!("StaticBufferPool: Failed to destroy staging buffer: {:?}", e);
            }
        }
    }

    /// Recreates the staging copy so new data can be written.
    pub fn reopen_staging(&mut self, device: &dyn GraphicsDevice) -> Result<(), RenderError> {
        if self.staging.is_none() {
            self.staging = Some(Self::create_staging(device, self.capacity, true)?);
        }
        Ok(())
    }

    /// Whether the staging copy is live.
    pub fn has_staging(&self) -> bool {
        self.staging.is_some()
    }

    /// The buffer the GPU reads from.
    pub fn gpu_buffer(&self) -> Option<BufferId> {
        self.video.or(self.staging)
    }

    /// Bytes allocated so far.
    pub fn used(&self) -> u64 {
        self.offset
    }

    /// Size of the pool.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Destroys the pool's buffers.
    pub fn destroy(self, device: &dyn GraphicsDevice) {
        for buffer in self.staging.into_iter().chain(self.video) {
            if let Err(e) = device.destroy_buffer(buffer) {
                log::warn!("StaticBufferPool: Failed to destroy buffer: {:?}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_infra::HeadlessDevice;

    #[test]
    fn test_upload_copies_only_new_data() {
        let device = HeadlessDevice::default();
        let mut pool = StaticBufferPool::new(&device, 4096, true).unwrap();
        let command_buffer = device.create_command_buffer("upload").unwrap();

        let first = pool.allocate_with_data(&device, &[1; 16]).unwrap();
        let mut encoder = device.begin_command_buffer(command_buffer).unwrap();
        pool.upload_data(encoder.as_mut()).unwrap();
        let id = encoder.close().unwrap();
        device.submit(&[id]).unwrap();
        device.wait_idle().unwrap();

        let second = pool.allocate_with_data(&device, &[2; 16]).unwrap();
        let mut encoder = device.begin_command_buffer(command_buffer).unwrap();
        pool.upload_data(encoder.as_mut()).unwrap();
        let id = encoder.close().unwrap();
        device.submit(&[id]).unwrap();
        device.wait_idle().unwrap();

        let video = pool.gpu_buffer().unwrap();
        let contents = device.buffer_contents(video).unwrap();
        assert_eq!(&contents[0..16], &[1; 16]);
        assert_eq!(second.offset, 256);
        assert_eq!(&contents[256..272], &[2; 16]);
        assert_eq!(second.address.0 - first.address.0, 256);
    }

    #[test]
    fn test_exhaustion_is_reported() {
        let device = HeadlessDevice::default();
        let mut pool = StaticBufferPool::new(&device, 512, false).unwrap();
        pool.allocate(300).unwrap();
        let err = pool.allocate(300).unwrap_err();
        assert!(matches!(
            err,
            RenderError::Configuration(ConfigurationError::BufferPoolExhausted {
                pool: "static pool",
                requested: 300,
                remaining: 212,
            })
        ));
    }

    #[test]
    fn test_freed_staging_rejects_writes_until_reopened() {
        let device = HeadlessDevice::default();
        let mut pool = StaticBufferPool::new(&device, 1024, true).unwrap();
        let allocation = pool.allocate(8).unwrap();
        pool.free_upload_heap(&device);
        assert!(!pool.has_staging());
        assert!(pool.write(&device, &allocation, &[0; 8]).is_err());

        pool.reopen_staging(&device).unwrap();
        assert!(pool.write(&device, &allocation, &[0; 8]).is_ok());
        pool.destroy(&device);
        assert_eq!(device.live_buffers(), 0);
    }

    #[test]
    fn test_system_memory_pool_keeps_its_buffer() {
        let device = HeadlessDevice::default();
        let mut pool = StaticBufferPool::new(&device, 1024, false).unwrap();
        pool.free_upload_heap(&device);
        assert!(pool.has_staging());
        assert!(pool.gpu_buffer().is_some());
    }
}
