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

//! A swap chain stand-in for the headless device.

use super::device::HeadlessDevice;
use super::state::DeviceEvent;
use cadence_core::{
    DescriptorCategory, DescriptorHandle, DescriptorHeapInfo, GraphicsDevice,
    PresentationSurface, RenderError, ResourceState, TextureDescriptor, TextureFormat,
    TextureId, TextureUsage, ViewKind,
};

/// A chain of back buffers owned by a [`HeadlessDevice`].
#[derive(Debug)]
pub struct HeadlessSurface {
    device: HeadlessDevice,
    heap: DescriptorHeapInfo,
    back_buffers: Vec<TextureId>,
    current: usize,
    width: u32,
    height: u32,
    format: TextureFormat,
}

impl HeadlessSurface {
    /// Creates `back_buffer_count` back buffers of `width` x `height`.
    pub fn new(
        device: &HeadlessDevice,
        width: u32,
        height: u32,
        back_buffer_count: u32,
    ) -> Result<Self, RenderError> {
        let heap =
            device.create_descriptor_heap(DescriptorCategory::RenderTarget, back_buffer_count)?;
        let mut surface = Self {
            device: device.clone(),
            heap,
            back_buffers: Vec::with_capacity(back_buffer_count as usize),
            current: 0,
            width,
            height,
            format: TextureFormat::Bgra8UnormSrgb,
        };
        surface.create_back_buffers(back_buffer_count)?;
        log::info!(
            "Headless surface created: {}x{}, {} back buffers",
            width,
            height,
            back_buffer_count
        );
        Ok(surface)
    }

    fn view(&self, index: usize) -> DescriptorHandle {
        DescriptorHandle {
            category: DescriptorCategory::RenderTarget,
            index: index as u32,
            cpu: self.heap.cpu_base + index as u64 * u64::from(self.heap.increment),
            gpu: None,
        }
    }

    fn create_back_buffers(&mut self, count: u32) -> Result<(), RenderError> {
        for i in 0..count as usize {
            let label = format!("Back buffer {i}");
            let texture = self.device.create_texture(&TextureDescriptor::new_2d(
                &label,
                self.width,
                self.height,
                self.format,
                TextureUsage::RENDER_TARGET,
                ResourceState::Present,
            ))?;
            self.device
                .create_view(texture, ViewKind::RenderTarget, self.view(i))?;
            self.back_buffers.push(texture);
        }
        Ok(())
    }

    fn destroy_back_buffers(&mut self) {
        for texture in self.back_buffers.drain(..) {
            if let Err(e) = self.device.destroy_texture(texture) {
                log::warn!("HeadlessSurface: Failed to destroy back buffer: {:?}", e);
            }
        }
    }

    /// Recreates the back buffers at a new size.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        let count = self.back_buffers.len() as u32;
        self.destroy_back_buffers();
        self.width = width;
        self.height = height;
        self.current = 0;
        self.create_back_buffers(count)
    }

    /// Index of the back buffer the next frame renders into.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Destroys the back buffers and their descriptor heap.
    pub fn destroy(mut self) {
        self.destroy_back_buffers();
        if let Err(e) = self.device.destroy_descriptor_heap(self.heap.id) {
            log::warn!("HeadlessSurface: Failed to destroy descriptor heap: {:?}", e);
        }
    }
}

impl PresentationSurface for HeadlessSurface {
    fn back_buffer_count(&self) -> u32 {
        self.back_buffers.len() as u32
    }

    fn format(&self) -> TextureFormat {
        self.format
    }

    fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn current_back_buffer(&self) -> TextureId {
        self.back_buffers[self.current]
    }

    fn current_back_buffer_view(&self) -> DescriptorHandle {
        self.view(self.current)
    }

    fn wait_for_ready(&mut self) -> Result<(), RenderError> {
        self.device.state().log(DeviceEvent::SurfaceWait {
            back_buffer: self.current as u32,
        });
        Ok(())
    }

    fn present(&mut self) -> Result<(), RenderError> {
        let texture = self.current_back_buffer();
        match self.device.texture_state(texture) {
            Some(ResourceState::Present) => {}
            other => {
                return Err(RenderError::SubmissionFailure(format!(
                    "back buffer {} presented in state {:?}",
                    self.current, other
                )))
            }
        }
        self.device.state().log(DeviceEvent::Presented {
            back_buffer: self.current as u32,
        });
        self.current = (self.current + 1) % self.back_buffers.len();
        Ok(())
    }
}
