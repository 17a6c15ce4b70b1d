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

//! Command recording for the headless device.

use super::state::{CommandBufferStatus, DeviceState, RecordedCommand};
use cadence_core::{
    BufferId, CommandBufferId, CommandEncoder, DescriptorHandle, GpuAddress, PipelineId,
    QuerySetId, RenderError, TextureFormat, TextureId, TransitionBarrier, Viewport,
};
use std::any::Any;
use std::ops::Range;
use std::sync::{Arc, Mutex, PoisonError};

/// Records commands into a host-side list until closed.
///
/// Dropping an encoder without closing it returns the command buffer to its
/// initial state, discarding the recording.
#[derive(Debug)]
pub(crate) struct HeadlessEncoder {
    id: CommandBufferId,
    shared: Arc<Mutex<DeviceState>>,
    commands: Vec<RecordedCommand>,
    closed: bool,
}

impl HeadlessEncoder {
    pub(crate) fn new(id: CommandBufferId, shared: Arc<Mutex<DeviceState>>) -> Self {
        Self {
            id,
            shared,
            commands: Vec::new(),
            closed: false,
        }
    }

    fn record(&mut self, command: RecordedCommand) {
        self.commands.push(command);
    }
}

impl CommandEncoder for HeadlessEncoder {
    fn id(&self) -> CommandBufferId {
        self.id
    }

    fn resource_barrier(&mut self, barriers: &[TransitionBarrier]) {
        self.commands
            .extend(barriers.iter().copied().map(RecordedCommand::Barrier));
    }

    fn clear_render_target(&mut self, view: DescriptorHandle, color: [f32; 4]) {
        self.record(RecordedCommand::ClearRenderTarget { view, color });
    }

    fn clear_depth_stencil(&mut self, view: DescriptorHandle, depth: f32) {
        self.record(RecordedCommand::ClearDepthStencil { view, depth });
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.record(RecordedCommand::SetViewport(viewport));
    }

    fn set_render_targets(&mut self, colors: &[DescriptorHandle], depth: Option<DescriptorHandle>) {
        self.record(RecordedCommand::SetRenderTargets {
            colors: colors.to_vec(),
            depth,
        });
    }

    fn set_pipeline(&mut self, pipeline: PipelineId) {
        self.record(RecordedCommand::SetPipeline(pipeline));
    }

    fn bind_constant_buffer(&mut self, slot: u32, address: GpuAddress) {
        self.record(RecordedCommand::BindConstantBuffer { slot, address });
    }

    fn bind_descriptor_table(&mut self, slot: u32, first: DescriptorHandle) {
        self.record(RecordedCommand::BindDescriptorTable { slot, first });
    }

    fn set_vertex_buffer(&mut self, slot: u32, address: GpuAddress, size: u64, stride: u32) {
        self.record(RecordedCommand::SetVertexBuffer {
            slot,
            address,
            size,
            stride,
        });
    }

    fn set_index_buffer(&mut self, address: GpuAddress, size: u64) {
        self.record(RecordedCommand::SetIndexBuffer { address, size });
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.record(RecordedCommand::Draw {
            vertices,
            instances,
        });
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        self.record(RecordedCommand::DrawIndexed {
            indices,
            base_vertex,
            instances,
        });
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.record(RecordedCommand::Dispatch { x, y, z });
    }

    fn resolve_subresource(
        &mut self,
        destination: TextureId,
        source: TextureId,
        format: TextureFormat,
    ) {
        self.record(RecordedCommand::Resolve {
            destination,
            source,
            format,
        });
    }

    fn copy_buffer_to_buffer(
        &mut self,
        source: BufferId,
        source_offset: u64,
        destination: BufferId,
        destination_offset: u64,
        size: u64,
    ) {
        self.record(RecordedCommand::CopyBuffer {
            source,
            source_offset,
            destination,
            destination_offset,
            size,
        });
    }

    fn copy_buffer_to_texture(&mut self, source: BufferId, source_offset: u64, destination: TextureId) {
        self.record(RecordedCommand::CopyBufferToTexture {
            source,
            source_offset,
            destination,
        });
    }

    fn write_timestamp(&mut self, query_set: QuerySetId, index: u32) {
        self.record(RecordedCommand::WriteTimestamp { query_set, index });
    }

    fn resolve_timestamps(
        &mut self,
        query_set: QuerySetId,
        first: u32,
        count: u32,
        destination: BufferId,
        destination_offset: u64,
    ) {
        self.record(RecordedCommand::ResolveTimestamps {
            query_set,
            first,
            count,
            destination,
            destination_offset,
        });
    }

    fn push_debug_marker(&mut self, label: &str) {
        self.record(RecordedCommand::PushMarker(label.to_string()));
    }

    fn pop_debug_marker(&mut self) {
        self.record(RecordedCommand::PopMarker);
    }

    fn close(mut self: Box<Self>) -> Result<CommandBufferId, RenderError> {
        let commands = std::mem::take(&mut self.commands);
        self.closed = true;

        let mut state = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        let label = state
            .command_buffers
            .get(&self.id)
            .map(|entry| entry.label.clone())
            .unwrap_or_default();

        let states = match state.validate(&commands) {
            Ok(states) => states,
            Err(reason) => {
                if let Some(entry) = state.command_buffers.get_mut(&self.id) {
                    entry.status = CommandBufferStatus::Initial;
                }
                log::error!("Command buffer '{}' rejected at close: {}", label, reason);
                return Err(RenderError::SubmissionFailure(format!("'{label}': {reason}")));
            }
        };

        for (texture, resource_state) in states {
            if let Some(entry) = state.textures.get_mut(&texture) {
                entry.state = resource_state;
            }
        }
        let entry = state.command_buffers.get_mut(&self.id).ok_or_else(|| {
            RenderError::SubmissionFailure(format!("command buffer {:?} was destroyed", self.id))
        })?;
        entry.status = CommandBufferStatus::Closed(commands);
        Ok(self.id)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for HeadlessEncoder {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let mut state = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = state.command_buffers.get_mut(&self.id) {
            log::warn!(
                "Command buffer '{}' dropped while recording; discarding {} commands",
                entry.label,
                self.commands.len()
            );
            entry.status = CommandBufferStatus::Initial;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::headless::{DeviceEvent, HeadlessDevice};
    use cadence_core::{
        DescriptorCategory, DescriptorHandle, GraphicsDevice, RenderError, ResourceState,
        TextureDescriptor, TextureFormat, TextureUsage, TransitionBarrier, ViewKind,
    };

    fn render_target(device: &HeadlessDevice) -> (cadence_core::TextureId, DescriptorHandle) {
        let texture = device
            .create_texture(&TextureDescriptor::new_2d(
                "color",
                4,
                4,
                TextureFormat::Rgba8Unorm,
                TextureUsage::RENDER_TARGET | TextureUsage::SHADER_RESOURCE,
                ResourceState::RenderTarget,
            ))
            .unwrap();
        let heap = device
            .create_descriptor_heap(DescriptorCategory::RenderTarget, 1)
            .unwrap();
        let view = DescriptorHandle {
            category: DescriptorCategory::RenderTarget,
            index: 0,
            cpu: heap.cpu_base,
            gpu: None,
        };
        device
            .create_view(texture, ViewKind::RenderTarget, view)
            .unwrap();
        (texture, view)
    }

    #[test]
    fn test_close_rejects_mismatched_barrier() {
        let device = HeadlessDevice::default();
        let (texture, _) = render_target(&device);
        let cb = device.create_command_buffer("cb").unwrap();

        let mut encoder = device.begin_command_buffer(cb).unwrap();
        encoder.resource_barrier(&[TransitionBarrier::new(
            texture,
            ResourceState::PixelShaderResource,
            ResourceState::RenderTarget,
        )]);
        assert!(matches!(
            encoder.close(),
            Err(RenderError::SubmissionFailure(_))
        ));
        assert_eq!(
            device.texture_state(texture),
            Some(ResourceState::RenderTarget)
        );
        // The buffer can be recorded again after a rejected close.
        assert!(device.begin_command_buffer(cb).is_ok());
    }

    #[test]
    fn test_clear_requires_render_target_state() {
        let device = HeadlessDevice::default();
        let (texture, view) = render_target(&device);
        let cb = device.create_command_buffer("cb").unwrap();

        let mut encoder = device.begin_command_buffer(cb).unwrap();
        encoder.resource_barrier(&[TransitionBarrier::new(
            texture,
            ResourceState::RenderTarget,
            ResourceState::PixelShaderResource,
        )]);
        encoder.clear_render_target(view, [0.0; 4]);
        assert!(encoder.close().is_err());
    }

    #[test]
    fn test_close_commits_states_and_submit_executes() {
        let device = HeadlessDevice::default();
        let (texture, view) = render_target(&device);
        let cb = device.create_command_buffer("cb").unwrap();

        let mut encoder = device.begin_command_buffer(cb).unwrap();
        encoder.clear_render_target(view, [1.0, 0.0, 0.0, 1.0]);
        encoder.resource_barrier(&[TransitionBarrier::new(
            texture,
            ResourceState::RenderTarget,
            ResourceState::PixelShaderResource,
        )]);
        let id = encoder.close().unwrap();
        assert_eq!(
            device.texture_state(texture),
            Some(ResourceState::PixelShaderResource)
        );

        device.submit(&[id]).unwrap();
        let executed = device
            .events()
            .into_iter()
            .filter(|e| matches!(e, DeviceEvent::Executed { .. }))
            .count();
        assert_eq!(executed, 2);
    }

    #[test]
    fn test_unbalanced_markers_fail() {
        let device = HeadlessDevice::default();
        let cb = device.create_command_buffer("cb").unwrap();
        let mut encoder = device.begin_command_buffer(cb).unwrap();
        encoder.push_debug_marker("open");
        assert!(encoder.close().is_err());
    }

    #[test]
    fn test_dropped_encoder_releases_buffer() {
        let device = HeadlessDevice::default();
        let cb = device.create_command_buffer("cb").unwrap();
        let encoder = device.begin_command_buffer(cb).unwrap();
        drop(encoder);
        assert!(device.begin_command_buffer(cb).is_ok());
    }

    #[test]
    fn test_submit_requires_closed_buffer() {
        let device = HeadlessDevice::default();
        let cb = device.create_command_buffer("cb").unwrap();
        assert!(matches!(
            device.submit(&[cb]),
            Err(RenderError::SubmissionFailure(_))
        ));
    }
}
