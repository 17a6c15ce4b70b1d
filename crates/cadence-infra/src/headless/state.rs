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

//! Shared state of the simulated device.

use cadence_core::{
    BufferId, CommandBufferId, DescriptorCategory, DescriptorHandle, FenceValue, GpuAddress,
    MemoryLocation, PipelineId, QuerySetId, ResourceState, TextureFormat, TextureId,
    TransitionBarrier, ViewKind, Viewport,
};
use std::collections::HashMap;
use std::ops::Range;

/// When submitted work is considered complete by the simulated queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionMode {
    /// Work completes as soon as its fence is signaled.
    #[default]
    Immediate,
    /// Work completes only when the CPU waits for it or a test retires it.
    Deferred,
}

/// A command as recorded into a headless command buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    /// A single state transition.
    Barrier(TransitionBarrier),
    /// Render target clear.
    ClearRenderTarget {
        /// Cleared view.
        view: DescriptorHandle,
        /// Clear color.
        color: [f32; 4],
    },
    /// Depth clear.
    ClearDepthStencil {
        /// Cleared view.
        view: DescriptorHandle,
        /// Clear depth.
        depth: f32,
    },
    /// Viewport and scissor change.
    SetViewport(Viewport),
    /// Attachment change.
    SetRenderTargets {
        /// Color attachments.
        colors: Vec<DescriptorHandle>,
        /// Depth attachment.
        depth: Option<DescriptorHandle>,
    },
    /// Pipeline bind.
    SetPipeline(PipelineId),
    /// Root constant buffer bind.
    BindConstantBuffer {
        /// Root slot.
        slot: u32,
        /// Bound address.
        address: GpuAddress,
    },
    /// Root descriptor table bind.
    BindDescriptorTable {
        /// Root slot.
        slot: u32,
        /// First descriptor of the table.
        first: DescriptorHandle,
    },
    /// Vertex stream bind.
    SetVertexBuffer {
        /// Input slot.
        slot: u32,
        /// Stream address.
        address: GpuAddress,
        /// Stream size in bytes.
        size: u64,
        /// Vertex stride in bytes.
        stride: u32,
    },
    /// Index stream bind.
    SetIndexBuffer {
        /// Stream address.
        address: GpuAddress,
        /// Stream size in bytes.
        size: u64,
    },
    /// Non-indexed draw.
    Draw {
        /// Vertex range.
        vertices: Range<u32>,
        /// Instance range.
        instances: Range<u32>,
    },
    /// Indexed draw.
    DrawIndexed {
        /// Index range.
        indices: Range<u32>,
        /// Added to every index.
        base_vertex: i32,
        /// Instance range.
        instances: Range<u32>,
    },
    /// Compute dispatch.
    Dispatch {
        /// Groups along X.
        x: u32,
        /// Groups along Y.
        y: u32,
        /// Groups along Z.
        z: u32,
    },
    /// Multisample resolve.
    Resolve {
        /// Single-sampled target.
        destination: TextureId,
        /// Multisampled source.
        source: TextureId,
        /// Resolve format.
        format: TextureFormat,
    },
    /// Buffer to buffer copy.
    CopyBuffer {
        /// Source buffer.
        source: BufferId,
        /// Source offset.
        source_offset: u64,
        /// Destination buffer.
        destination: BufferId,
        /// Destination offset.
        destination_offset: u64,
        /// Byte count.
        size: u64,
    },
    /// Buffer to texture copy.
    CopyBufferToTexture {
        /// Source buffer.
        source: BufferId,
        /// Source offset.
        source_offset: u64,
        /// Destination texture.
        destination: TextureId,
    },
    /// Timestamp write.
    WriteTimestamp {
        /// Query set.
        query_set: QuerySetId,
        /// Query index.
        index: u32,
    },
    /// Timestamp resolve into a buffer.
    ResolveTimestamps {
        /// Query set.
        query_set: QuerySetId,
        /// First query.
        first: u32,
        /// Query count.
        count: u32,
        /// Readback buffer.
        destination: BufferId,
        /// Offset into the readback buffer.
        destination_offset: u64,
    },
    /// Debug region start.
    PushMarker(String),
    /// Debug region end.
    PopMarker,
}

/// Something the simulated device did, in the order it did it.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// A buffer was created.
    BufferCreated {
        /// New buffer.
        buffer: BufferId,
        /// Size in bytes.
        size: u64,
        /// Memory heap.
        location: MemoryLocation,
    },
    /// A buffer was destroyed.
    BufferDestroyed(BufferId),
    /// The CPU wrote into a buffer.
    BufferWrite {
        /// Written buffer.
        buffer: BufferId,
        /// Byte offset.
        offset: u64,
        /// Byte count.
        size: u64,
    },
    /// A texture was created.
    TextureCreated {
        /// New texture.
        texture: TextureId,
        /// Debug label.
        label: String,
        /// Initial state.
        state: ResourceState,
    },
    /// A texture was destroyed.
    TextureDestroyed(TextureId),
    /// A command buffer was reset and opened for recording.
    CommandBufferReset(CommandBufferId),
    /// Command buffers were submitted, in order.
    Submitted(Vec<CommandBufferId>),
    /// A command ran on the simulated queue.
    Executed {
        /// Owning command buffer.
        command_buffer: CommandBufferId,
        /// The command.
        command: RecordedCommand,
    },
    /// The queue signaled a fence value.
    Signaled(FenceValue),
    /// The CPU waited on a fence value.
    Waited {
        /// Awaited value.
        value: FenceValue,
        /// Whether the value had not completed yet when the wait began.
        blocked: bool,
    },
    /// A test retired submitted work up to a value.
    Retired(FenceValue),
    /// The presentation surface was asked to become writable.
    SurfaceWait {
        /// Back buffer index.
        back_buffer: u32,
    },
    /// A back buffer was presented.
    Presented {
        /// Back buffer index.
        back_buffer: u32,
    },
}

#[derive(Debug)]
pub(crate) struct BufferEntry {
    pub label: String,
    pub data: Vec<u8>,
    pub address: u64,
    pub location: MemoryLocation,
}

#[derive(Debug)]
pub(crate) struct TextureEntry {
    pub label: String,
    pub byte_size: u64,
    pub state: ResourceState,
    pub uploaded_bytes: u64,
}

#[derive(Debug)]
pub(crate) struct HeapEntry {
    pub category: DescriptorCategory,
    pub cpu_base: u64,
    pub capacity: u32,
    pub increment: u32,
}

#[derive(Debug)]
pub(crate) enum CommandBufferStatus {
    Initial,
    Recording,
    Closed(Vec<RecordedCommand>),
    Submitted { fence: Option<FenceValue> },
}

#[derive(Debug)]
pub(crate) struct CommandBufferEntry {
    pub label: String,
    pub status: CommandBufferStatus,
}

#[derive(Debug, Default)]
pub(crate) struct DeviceState {
    next_id: usize,
    next_address: u64,
    next_descriptor_base: u64,
    pub buffers: HashMap<BufferId, BufferEntry>,
    pub textures: HashMap<TextureId, TextureEntry>,
    pub heaps: HashMap<usize, HeapEntry>,
    pub views: HashMap<u64, (TextureId, ViewKind)>,
    pub query_sets: HashMap<QuerySetId, Vec<u64>>,
    pub pipelines: HashMap<PipelineId, String>,
    pub command_buffers: HashMap<CommandBufferId, CommandBufferEntry>,
    pub unsignaled: Vec<CommandBufferId>,
    pub signaled: FenceValue,
    pub completed: FenceValue,
    pub tick: u64,
    pub lost: bool,
    pub mode: CompletionMode,
    pub events: Vec<DeviceEvent>,
}

const ADDRESS_GRANULARITY: u64 = 64 * 1024;

impl DeviceState {
    pub fn new(mode: CompletionMode) -> Self {
        Self {
            next_id: 1,
            next_address: ADDRESS_GRANULARITY,
            next_descriptor_base: 0x1_0000_0000,
            mode,
            ..Default::default()
        }
    }

    pub fn next_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Reserves a range of the synthetic GPU address space.
    pub fn reserve_address(&mut self, size: u64) -> u64 {
        let address = self.next_address;
        let span = size.max(1).div_ceil(ADDRESS_GRANULARITY) * ADDRESS_GRANULARITY;
        self.next_address += span;
        address
    }

    /// Reserves a range of descriptor addresses.
    pub fn reserve_descriptors(&mut self, bytes: u64) -> u64 {
        let base = self.next_descriptor_base;
        self.next_descriptor_base += bytes.div_ceil(ADDRESS_GRANULARITY).max(1) * ADDRESS_GRANULARITY;
        base
    }

    pub fn log(&mut self, event: DeviceEvent) {
        self.events.push(event);
    }

    /// Whether `id` may be reset: it is not recording and not still executing.
    pub fn is_idle(&self, id: CommandBufferId) -> Result<(), String> {
        let entry = self
            .command_buffers
            .get(&id)
            .ok_or_else(|| format!("unknown command buffer {id:?}"))?;
        match entry.status {
            CommandBufferStatus::Recording => {
                Err(format!("command buffer '{}' is already recording", entry.label))
            }
            CommandBufferStatus::Submitted { fence: Some(fence) } if fence > self.completed => {
                Err(format!(
                    "command buffer '{}' reset while fence {fence} is still pending (completed {})",
                    entry.label, self.completed
                ))
            }
            CommandBufferStatus::Submitted { fence: None } if self.mode == CompletionMode::Deferred => {
                Err(format!(
                    "command buffer '{}' reset before its submission was fenced",
                    entry.label
                ))
            }
            _ => Ok(()),
        }
    }

    fn view_texture(
        &self,
        view: &DescriptorHandle,
        expected: ViewKind,
    ) -> Result<TextureId, String> {
        match self.views.get(&view.cpu) {
            Some((texture, kind)) if *kind == expected => Ok(*texture),
            Some((_, kind)) => Err(format!(
                "descriptor {} #{} holds a {kind:?} view, expected {expected:?}",
                view.category, view.index
            )),
            None => Err(format!(
                "descriptor {} #{} has no view",
                view.category, view.index
            )),
        }
    }

    /// Replays the recorded commands against the texture states left by every
    /// previously closed command buffer.
    ///
    /// Returns the texture states after the commands, or a description of the
    /// first command that touches a texture outside its valid state.
    pub fn validate(
        &self,
        commands: &[RecordedCommand],
    ) -> Result<HashMap<TextureId, ResourceState>, String> {
        let mut states: HashMap<TextureId, ResourceState> = HashMap::new();
        let current = |states: &HashMap<TextureId, ResourceState>, texture: TextureId| {
            states
                .get(&texture)
                .copied()
                .or_else(|| self.textures.get(&texture).map(|t| t.state))
                .ok_or_else(|| format!("unknown texture {texture:?}"))
        };
        let require = |states: &HashMap<TextureId, ResourceState>,
                       texture: TextureId,
                       state: ResourceState,
                       what: &str|
         -> Result<(), String> {
            let actual = current(states, texture)?;
            if actual != state {
                return Err(format!(
                    "{what} on {texture:?} requires {state} but the texture is in {actual}"
                ));
            }
            Ok(())
        };

        let mut markers = 0usize;
        for command in commands {
            match command {
                RecordedCommand::Barrier(barrier) => {
                    let actual = current(&states, barrier.texture)?;
                    if actual != barrier.before {
                        return Err(format!(
                            "barrier {} -> {} on {:?} but the texture is in {}",
                            barrier.before, barrier.after, barrier.texture, actual
                        ));
                    }
                    states.insert(barrier.texture, barrier.after);
                }
                RecordedCommand::ClearRenderTarget { view, .. } => {
                    let texture = self.view_texture(view, ViewKind::RenderTarget)?;
                    require(&states, texture, ResourceState::RenderTarget, "render target clear")?;
                }
                RecordedCommand::ClearDepthStencil { view, .. } => {
                    let texture = self.view_texture(view, ViewKind::DepthStencil)?;
                    require(&states, texture, ResourceState::DepthWrite, "depth clear")?;
                }
                RecordedCommand::SetRenderTargets { colors, depth } => {
                    for view in colors {
                        let texture = self.view_texture(view, ViewKind::RenderTarget)?;
                        require(&states, texture, ResourceState::RenderTarget, "color attachment")?;
                    }
                    if let Some(view) = depth {
                        let texture = self.view_texture(view, ViewKind::DepthStencil)?;
                        require(&states, texture, ResourceState::DepthWrite, "depth attachment")?;
                    }
                }
                RecordedCommand::Resolve {
                    destination,
                    source,
                    ..
                } => {
                    require(&states, *source, ResourceState::ResolveSource, "resolve source")?;
                    require(
                        &states,
                        *destination,
                        ResourceState::ResolveDest,
                        "resolve destination",
                    )?;
                }
                RecordedCommand::CopyBufferToTexture { destination, .. } => {
                    require(&states, *destination, ResourceState::CopyDest, "texture upload")?;
                }
                RecordedCommand::PushMarker(_) => markers += 1,
                RecordedCommand::PopMarker => {
                    markers = markers
                        .checked_sub(1)
                        .ok_or_else(|| "debug marker popped without a push".to_string())?;
                }
                _ => {}
            }
        }
        if markers != 0 {
            return Err(format!("{markers} debug marker(s) left open at close"));
        }
        Ok(states)
    }

    /// Runs a closed command list on the simulated queue.
    pub fn execute(
        &mut self,
        id: CommandBufferId,
        commands: Vec<RecordedCommand>,
        tick_step: u64,
    ) -> Result<(), String> {
        for command in commands {
            match &command {
                RecordedCommand::CopyBuffer {
                    source,
                    source_offset,
                    destination,
                    destination_offset,
                    size,
                } => {
                    let bytes = self.read_range(*source, *source_offset, *size)?;
                    self.write_range(*destination, *destination_offset, &bytes)?;
                }
                RecordedCommand::CopyBufferToTexture {
                    source,
                    source_offset,
                    destination,
                } => {
                    let available = self
                        .buffers
                        .get(source)
                        .map(|b| (b.data.len() as u64).saturating_sub(*source_offset))
                        .ok_or_else(|| format!("unknown buffer {source:?}"))?;
                    let texture = self
                        .textures
                        .get_mut(destination)
                        .ok_or_else(|| format!("unknown texture {destination:?}"))?;
                    texture.uploaded_bytes += available.min(texture.byte_size);
                }
                RecordedCommand::WriteTimestamp { query_set, index } => {
                    let tick = self.tick;
                    let slot = self
                        .query_sets
                        .get_mut(query_set)
                        .and_then(|set| set.get_mut(*index as usize))
                        .ok_or_else(|| format!("timestamp {index} out of range"))?;
                    *slot = tick;
                }
                RecordedCommand::ResolveTimestamps {
                    query_set,
                    first,
                    count,
                    destination,
                    destination_offset,
                } => {
                    let set = self
                        .query_sets
                        .get(query_set)
                        .ok_or_else(|| format!("unknown query set {query_set:?}"))?;
                    let range = *first as usize..(*first + *count) as usize;
                    let values = set
                        .get(range)
                        .ok_or_else(|| "timestamp resolve out of range".to_string())?;
                    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
                    self.write_range(*destination, *destination_offset, &bytes)?;
                }
                _ => {}
            }
            self.tick += tick_step;
            self.log(DeviceEvent::Executed {
                command_buffer: id,
                command,
            });
        }
        Ok(())
    }

    fn read_range(&self, id: BufferId, offset: u64, size: u64) -> Result<Vec<u8>, String> {
        let buffer = self
            .buffers
            .get(&id)
            .ok_or_else(|| format!("unknown buffer {id:?}"))?;
        let range = offset as usize..(offset + size) as usize;
        buffer
            .data
            .get(range)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| format!("read of {size} bytes at {offset} overruns '{}'", buffer.label))
    }

    fn write_range(&mut self, id: BufferId, offset: u64, bytes: &[u8]) -> Result<(), String> {
        let buffer = self
            .buffers
            .get_mut(&id)
            .ok_or_else(|| format!("unknown buffer {id:?}"))?;
        let start = offset as usize;
        let end = start + bytes.len();
        if end > buffer.data.len() {
            return Err(format!(
                "write of {} bytes at {offset} overruns '{}'",
                bytes.len(),
                buffer.label
            ));
        }
        buffer.data[start..end].copy_from_slice(bytes);
        Ok(())
    }

    pub fn cpu_write(&mut self, id: BufferId, offset: u64, bytes: &[u8]) -> Result<(), String> {
        self.cpu_accessible(id)?;
        self.write_range(id, offset, bytes)
    }

    pub fn cpu_read(&self, id: BufferId, offset: u64, size: u64) -> Result<Vec<u8>, String> {
        self.cpu_accessible(id)?;
        self.read_range(id, offset, size)
    }

    fn cpu_accessible(&self, id: BufferId) -> Result<(), String> {
        match self.buffers.get(&id) {
            Some(buffer) if buffer.location == MemoryLocation::DeviceLocal => Err(format!(
                "buffer '{}' lives in device memory and cannot be mapped",
                buffer.label
            )),
            Some(_) => Ok(()),
            None => Err(format!("unknown buffer {id:?}")),
        }
    }
}
