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

//! The headless [`GraphicsDevice`] implementation.

use super::encoder::HeadlessEncoder;
use super::state::{
    BufferEntry, CommandBufferEntry, CommandBufferStatus, CompletionMode, DeviceEvent,
    DeviceState, HeapEntry, TextureEntry,
};
use cadence_core::{
    BufferDescriptor, BufferId, CommandBufferId, CommandEncoder, DescriptorCategory,
    DescriptorHandle, DescriptorHeapId, DescriptorHeapInfo, FenceValue, GpuAddress,
    GraphicsDevice, PipelineDescriptor, PipelineId, QuerySetId, RenderError, ResourceState,
    TextureDescriptor, TextureId, ViewKind,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const DESCRIPTOR_INCREMENT: u32 = 32;

/// Tunables of the simulated queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessConfig {
    /// Reported timestamp ticks per second.
    pub timestamp_frequency: u64,
    /// Ticks the simulated clock advances per executed command.
    pub tick_step: u64,
    /// Completion behavior of submitted work.
    pub mode: CompletionMode,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            timestamp_frequency: 1_000_000_000,
            tick_step: 1_000,
            mode: CompletionMode::Immediate,
        }
    }
}

/// A simulated GPU device and queue living entirely in host memory.
///
/// Cloning yields another handle to the same device.
#[derive(Debug, Clone)]
pub struct HeadlessDevice {
    shared: Arc<Mutex<DeviceState>>,
    config: HeadlessConfig,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new(HeadlessConfig::default())
    }
}

impl HeadlessDevice {
    /// Creates a device with the given queue behavior.
    pub fn new(config: HeadlessConfig) -> Self {
        log::info!(
            "Headless device created ({:?} completion, {} ticks/s)",
            config.mode,
            config.timestamp_frequency
        );
        Self {
            shared: Arc::new(Mutex::new(DeviceState::new(config.mode))),
            config,
        }
    }

    /// Creates a device whose work only completes when waited on or retired.
    pub fn deferred() -> Self {
        Self::new(HeadlessConfig {
            mode: CompletionMode::Deferred,
            ..HeadlessConfig::default()
        })
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Switches the completion mode for work signaled from now on.
    pub fn set_completion_mode(&self, mode: CompletionMode) {
        self.state().mode = mode;
    }

    /// A snapshot of the event log.
    pub fn events(&self) -> Vec<DeviceEvent> {
        self.state().events.clone()
    }

    /// Drains the event log.
    pub fn take_events(&self) -> Vec<DeviceEvent> {
        std::mem::take(&mut self.state().events)
    }

    /// Completes all work up to `value` (clamped to the last signaled value).
    pub fn retire(&self, value: FenceValue) {
        let mut state = self.state();
        let target = value.min(state.signaled);
        state.completed = state.completed.max(target);
        state.log(DeviceEvent::Retired(target));
    }

    /// Completes all signaled work.
    pub fn retire_all(&self) {
        let signaled = self.state().signaled;
        self.retire(signaled);
    }

    /// The last fence value enqueued by [`GraphicsDevice::signal`].
    pub fn signaled_fence_value(&self) -> FenceValue {
        self.state().signaled
    }

    /// The state of a texture after every closed command buffer.
    pub fn texture_state(&self, id: TextureId) -> Option<ResourceState> {
        self.state().textures.get(&id).map(|t| t.state)
    }

    /// Bytes copied into a texture so far.
    pub fn texture_uploaded_bytes(&self, id: TextureId) -> Option<u64> {
        self.state().textures.get(&id).map(|t| t.uploaded_bytes)
    }

    /// A copy of a buffer's contents, regardless of its memory location.
    pub fn buffer_contents(&self, id: BufferId) -> Option<Vec<u8>> {
        self.state().buffers.get(&id).map(|b| b.data.clone())
    }

    /// Number of live buffers.
    pub fn live_buffers(&self) -> usize {
        self.state().buffers.len()
    }

    /// Number of live textures.
    pub fn live_textures(&self) -> usize {
        self.state().textures.len()
    }

    /// Number of live pipelines.
    pub fn live_pipelines(&self) -> usize {
        self.state().pipelines.len()
    }

    /// Simulates a device removal; every later wait fails.
    pub fn lose_device(&self) {
        log::error!("Headless device marked as lost");
        self.state().lost = true;
    }

    pub(crate) fn tick_step(&self) -> u64 {
        self.config.tick_step
    }

    pub(crate) fn shared(&self) -> Arc<Mutex<DeviceState>> {
        Arc::clone(&self.shared)
    }
}

fn resource_error(message: String) -> RenderError {
    RenderError::ResourceError(message)
}

impl GraphicsDevice for HeadlessDevice {
    fn create_descriptor_heap(
        &self,
        category: DescriptorCategory,
        capacity: u32,
    ) -> Result<DescriptorHeapInfo, RenderError> {
        let mut state = self.state();
        let id = state.next_id();
        let bytes = u64::from(capacity) * u64::from(DESCRIPTOR_INCREMENT);
        let cpu_base = state.reserve_descriptors(bytes);
        let gpu_base = category
            .is_shader_visible()
            .then(|| state.reserve_descriptors(bytes));
        state.heaps.insert(
            id,
            HeapEntry {
                category,
                cpu_base,
                capacity,
                increment: DESCRIPTOR_INCREMENT,
            },
        );
        Ok(DescriptorHeapInfo {
            id: DescriptorHeapId(id),
            cpu_base,
            gpu_base,
            increment: DESCRIPTOR_INCREMENT,
        })
    }

    fn destroy_descriptor_heap(&self, id: DescriptorHeapId) -> Result<(), RenderError> {
        let mut state = self.state();
        let heap = state
            .heaps
            .remove(&id.0)
            .ok_or_else(|| resource_error(format!("unknown descriptor heap {id:?}")))?;
        let end = heap.cpu_base + u64::from(heap.capacity) * u64::from(heap.increment);
        state.views.retain(|cpu, _| !(heap.cpu_base..end).contains(cpu));
        Ok(())
    }

    fn create_view(
        &self,
        texture: TextureId,
        kind: ViewKind,
        target: DescriptorHandle,
    ) -> Result<(), RenderError> {
        let mut state = self.state();
        if kind.category() != target.category {
            return Err(resource_error(format!(
                "{kind:?} view cannot live in a {} heap",
                target.category
            )));
        }
        if !state.textures.contains_key(&texture) {
            return Err(resource_error(format!("unknown texture {texture:?}")));
        }
        let in_heap = state.heaps.values().any(|heap| {
            heap.category == target.category
                && target.index < heap.capacity
                && target.cpu
                    == heap.cpu_base + u64::from(target.index) * u64::from(heap.increment)
        });
        if !in_heap {
            return Err(resource_error(format!(
                "descriptor {} #{} does not belong to a live heap",
                target.category, target.index
            )));
        }
        state.views.insert(target.cpu, (texture, kind));
        Ok(())
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, RenderError> {
        let mut state = self.state();
        let id = BufferId(state.next_id());
        let address = state.reserve_address(descriptor.size);
        let label = descriptor
            .label
            .as_deref()
            .unwrap_or("unnamed buffer")
            .to_string();
        state.buffers.insert(
            id,
            BufferEntry {
                label,
                data: vec![0; descriptor.size as usize],
                address,
                location: descriptor.location,
            },
        );
        state.log(DeviceEvent::BufferCreated {
            buffer: id,
            size: descriptor.size,
            location: descriptor.location,
        });
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), RenderError> {
        let mut state = self.state();
        state
            .buffers
            .remove(&id)
            .ok_or_else(|| resource_error(format!("unknown buffer {id:?}")))?;
        state.log(DeviceEvent::BufferDestroyed(id));
        Ok(())
    }

    fn buffer_gpu_address(&self, id: BufferId) -> Result<GpuAddress, RenderError> {
        self.state()
            .buffers
            .get(&id)
            .map(|b| GpuAddress(b.address))
            .ok_or_else(|| resource_error(format!("unknown buffer {id:?}")))
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), RenderError> {
        let mut state = self.state();
        state.cpu_write(id, offset, data).map_err(resource_error)?;
        state.log(DeviceEvent::BufferWrite {
            buffer: id,
            offset,
            size: data.len() as u64,
        });
        Ok(())
    }

    fn read_buffer(&self, id: BufferId, offset: u64, out: &mut [u8]) -> Result<(), RenderError> {
        let bytes = self
            .state()
            .cpu_read(id, offset, out.len() as u64)
            .map_err(resource_error)?;
        out.copy_from_slice(&bytes);
        Ok(())
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, RenderError> {
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(resource_error(format!(
                "texture '{}' has a zero extent",
                descriptor.label.as_deref().unwrap_or("unnamed texture")
            )));
        }
        let mut state = self.state();
        let id = TextureId(state.next_id());
        let label = descriptor
            .label
            .as_deref()
            .unwrap_or("unnamed texture")
            .to_string();
        state.textures.insert(
            id,
            TextureEntry {
                label: label.clone(),
                byte_size: descriptor.byte_size() * u64::from(descriptor.sample_count),
                state: descriptor.initial_state,
                uploaded_bytes: 0,
            },
        );
        state.log(DeviceEvent::TextureCreated {
            texture: id,
            label,
            state: descriptor.initial_state,
        });
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), RenderError> {
        let mut state = self.state();
        let entry = state
            .textures
            .remove(&id)
            .ok_or_else(|| resource_error(format!("unknown texture {id:?}")))?;
        state.views.retain(|_, (texture, _)| *texture != id);
        log::trace!("Destroyed texture '{}'", entry.label);
        state.log(DeviceEvent::TextureDestroyed(id));
        Ok(())
    }

    fn create_pipeline(&self, descriptor: &PipelineDescriptor) -> Result<PipelineId, RenderError> {
        let mut state = self.state();
        let id = PipelineId(state.next_id());
        state.pipelines.insert(id, descriptor.label.to_string());
        Ok(id)
    }

    fn destroy_pipeline(&self, id: PipelineId) -> Result<(), RenderError> {
        self.state()
            .pipelines
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| resource_error(format!("unknown pipeline {id:?}")))
    }

    fn create_query_set(&self, count: u32) -> Result<QuerySetId, RenderError> {
        let mut state = self.state();
        let id = QuerySetId(state.next_id());
        state.query_sets.insert(id, vec![0; count as usize]);
        Ok(id)
    }

    fn destroy_query_set(&self, id: QuerySetId) -> Result<(), RenderError> {
        self.state()
            .query_sets
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| resource_error(format!("unknown query set {id:?}")))
    }

    fn timestamp_frequency(&self) -> u64 {
        self.config.timestamp_frequency
    }

    fn create_command_buffer(&self, label: &str) -> Result<CommandBufferId, RenderError> {
        let mut state = self.state();
        let id = CommandBufferId(state.next_id());
        state.command_buffers.insert(
            id,
            CommandBufferEntry {
                label: label.to_string(),
                status: CommandBufferStatus::Initial,
            },
        );
        Ok(id)
    }

    fn destroy_command_buffer(&self, id: CommandBufferId) -> Result<(), RenderError> {
        self.state()
            .command_buffers
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| resource_error(format!("unknown command buffer {id:?}")))
    }

    fn begin_command_buffer(
        &self,
        id: CommandBufferId,
    ) -> Result<Box<dyn CommandEncoder>, RenderError> {
        let mut state = self.state();
        state.is_idle(id).map_err(RenderError::SubmissionFailure)?;
        if let Some(entry) = state.command_buffers.get_mut(&id) {
            entry.status = CommandBufferStatus::Recording;
        }
        state.log(DeviceEvent::CommandBufferReset(id));
        Ok(Box::new(HeadlessEncoder::new(id, self.shared())))
    }

    fn submit(&self, command_buffers: &[CommandBufferId]) -> Result<(), RenderError> {
        let mut state = self.state();
        let mut batches = Vec::with_capacity(command_buffers.len());
        for id in command_buffers {
            let entry = state.command_buffers.get_mut(id).ok_or_else(|| {
                RenderError::SubmissionFailure(format!("unknown command buffer {id:?}"))
            })?;
            match std::mem::replace(
                &mut entry.status,
                CommandBufferStatus::Submitted { fence: None },
            ) {
                CommandBufferStatus::Closed(commands) => batches.push((*id, commands)),
                other => {
                    let label = entry.label.clone();
                    entry.status = other;
                    return Err(RenderError::SubmissionFailure(format!(
                        "command buffer '{label}' submitted without being closed"
                    )));
                }
            }
        }

        state.log(DeviceEvent::Submitted(command_buffers.to_vec()));
        for (id, commands) in batches {
            state
                .execute(id, commands, self.tick_step())
                .map_err(RenderError::SubmissionFailure)?;
            state.unsignaled.push(id);
        }
        Ok(())
    }

    fn signal(&self) -> Result<FenceValue, RenderError> {
        let mut state = self.state();
        if state.lost {
            return Err(RenderError::DeviceLost("signal on a lost device".into()));
        }
        state.signaled += 1;
        let value = state.signaled;
        for id in std::mem::take(&mut state.unsignaled) {
            if let Some(entry) = state.command_buffers.get_mut(&id) {
                entry.status = CommandBufferStatus::Submitted { fence: Some(value) };
            }
        }
        if state.mode == CompletionMode::Immediate {
            state.completed = value;
        }
        state.log(DeviceEvent::Signaled(value));
        Ok(value)
    }

    fn completed_fence_value(&self) -> FenceValue {
        self.state().completed
    }

    fn wait_for_fence(&self, value: FenceValue) -> Result<(), RenderError> {
        let mut state = self.state();
        if state.lost {
            return Err(RenderError::DeviceLost(format!(
                "device lost while waiting for fence {value}"
            )));
        }
        if value > state.signaled {
            return Err(RenderError::DeviceLost(format!(
                "fence {value} was never signaled (last signaled {})",
                state.signaled
            )));
        }
        let blocked = value > state.completed;
        state.completed = state.completed.max(value);
        state.log(DeviceEvent::Waited { value, blocked });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{BufferUsage, MemoryLocation, TextureFormat, TextureUsage};

    fn upload_buffer(device: &HeadlessDevice, size: u64) -> BufferId {
        device
            .create_buffer(&BufferDescriptor {
                label: Some("upload".into()),
                size,
                location: MemoryLocation::Upload,
                usage: BufferUsage::COPY_SRC,
            })
            .unwrap()
    }

    #[test]
    fn test_buffer_write_and_read() {
        let device = HeadlessDevice::default();
        let buffer = upload_buffer(&device, 16);
        device.write_buffer(buffer, 4, &[1, 2, 3]).unwrap();

        let mut out = [0u8; 5];
        device.read_buffer(buffer, 3, &mut out).unwrap();
        assert_eq!(out, [0, 1, 2, 3, 0]);
        assert!(device.write_buffer(buffer, 15, &[1, 2]).is_err());
    }

    #[test]
    fn test_device_local_buffers_cannot_be_mapped() {
        let device = HeadlessDevice::default();
        let buffer = device
            .create_buffer(&BufferDescriptor {
                label: None,
                size: 16,
                location: MemoryLocation::DeviceLocal,
                usage: BufferUsage::VERTEX,
            })
            .unwrap();
        assert!(matches!(
            device.write_buffer(buffer, 0, &[0]),
            Err(RenderError::ResourceError(_))
        ));
    }

    #[test]
    fn test_buffer_addresses_do_not_overlap() {
        let device = HeadlessDevice::default();
        let a = upload_buffer(&device, 100_000);
        let b = upload_buffer(&device, 10);
        let a_addr = device.buffer_gpu_address(a).unwrap().0;
        let b_addr = device.buffer_gpu_address(b).unwrap().0;
        assert!(b_addr >= a_addr + 100_000);
    }

    #[test]
    fn test_immediate_mode_completes_on_signal() {
        let device = HeadlessDevice::default();
        let value = device.signal().unwrap();
        assert_eq!(value, 1);
        assert_eq!(device.completed_fence_value(), 1);
    }

    #[test]
    fn test_deferred_mode_completes_on_wait() {
        let device = HeadlessDevice::deferred();
        let value = device.signal().unwrap();
        assert_eq!(device.completed_fence_value(), 0);
        device.wait_for_fence(value).unwrap();
        assert_eq!(device.completed_fence_value(), value);
        assert!(device.events().contains(&DeviceEvent::Waited {
            value,
            blocked: true
        }));
    }

    #[test]
    fn test_waiting_on_unsignaled_fence_is_device_lost() {
        let device = HeadlessDevice::default();
        let err = device.wait_for_fence(5).unwrap_err();
        assert!(err.is_device_lost());
    }

    #[test]
    fn test_in_flight_command_buffer_cannot_be_reset() {
        let device = HeadlessDevice::deferred();
        let id = device.create_command_buffer("cb").unwrap();
        let encoder = device.begin_command_buffer(id).unwrap();
        encoder.close().unwrap();
        device.submit(&[id]).unwrap();
        let fence = device.signal().unwrap();

        assert!(matches!(
            device.begin_command_buffer(id),
            Err(RenderError::SubmissionFailure(_))
        ));
        device.retire(fence);
        assert!(device.begin_command_buffer(id).is_ok());
    }

    #[test]
    fn test_views_must_match_heap_category() {
        let device = HeadlessDevice::default();
        let heap = device
            .create_descriptor_heap(DescriptorCategory::RenderTarget, 4)
            .unwrap();
        let texture = device
            .create_texture(&TextureDescriptor::new_2d(
                "rt",
                8,
                8,
                TextureFormat::Rgba8Unorm,
                TextureUsage::RENDER_TARGET,
                ResourceState::RenderTarget,
            ))
            .unwrap();
        let handle = DescriptorHandle {
            category: DescriptorCategory::RenderTarget,
            index: 1,
            cpu: heap.cpu_base + u64::from(heap.increment),
            gpu: None,
        };
        device
            .create_view(texture, ViewKind::RenderTarget, handle)
            .unwrap();
        assert!(device
            .create_view(texture, ViewKind::ShaderResource, handle)
            .is_err());
    }
}
