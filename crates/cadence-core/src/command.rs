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

//! The command recording contract.

use crate::device::TextureFormat;
use crate::error::RenderError;
use crate::handle::{
    BufferId, CommandBufferId, DescriptorHandle, GpuAddress, PipelineId, QuerySetId, TextureId,
};
use crate::state::TransitionBarrier;
use std::any::Any;
use std::ops::Range;

/// A rectangular viewport; the scissor rectangle always matches it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Left edge in pixels.
    pub x: f32,
    /// Top edge in pixels.
    pub y: f32,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
    /// Near depth.
    pub min_depth: f32,
    /// Far depth.
    pub max_depth: f32,
}

impl Viewport {
    /// A full-depth viewport covering `width` x `height` pixels from `(x, y)`.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    /// A viewport covering a whole `width` x `height` surface.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }
}

/// An open command buffer.
///
/// Obtained from [`GraphicsDevice::begin_command_buffer`](crate::GraphicsDevice::begin_command_buffer)
/// and turned back into a submittable [`CommandBufferId`] with [`close`](CommandEncoder::close).
/// Recording never fails; state violations are reported at close time.
pub trait CommandEncoder: Send {
    /// The command buffer being recorded.
    fn id(&self) -> CommandBufferId;

    /// Records a batch of state transitions.
    fn resource_barrier(&mut self, barriers: &[TransitionBarrier]);

    /// Clears a render target view.
    fn clear_render_target(&mut self, view: DescriptorHandle, color: [f32; 4]);

    /// Clears a depth stencil view.
    fn clear_depth_stencil(&mut self, view: DescriptorHandle, depth: f32);

    /// Sets the viewport and a matching scissor rectangle.
    fn set_viewport(&mut self, viewport: Viewport);

    /// Binds color and depth attachments.
    fn set_render_targets(&mut self, colors: &[DescriptorHandle], depth: Option<DescriptorHandle>);

    /// Binds a pipeline state object.
    fn set_pipeline(&mut self, pipeline: PipelineId);

    /// Binds a constant buffer address to root slot `slot`.
    fn bind_constant_buffer(&mut self, slot: u32, address: GpuAddress);

    /// Binds a descriptor table starting at `first` to root slot `slot`.
    fn bind_descriptor_table(&mut self, slot: u32, first: DescriptorHandle);

    /// Binds a vertex stream at `slot`.
    fn set_vertex_buffer(&mut self, slot: u32, address: GpuAddress, size: u64, stride: u32);

    /// Binds a 32-bit index stream.
    fn set_index_buffer(&mut self, address: GpuAddress, size: u64);

    /// Records a non-indexed draw.
    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>);

    /// Records an indexed draw.
    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>);

    /// Records a compute dispatch.
    fn dispatch(&mut self, x: u32, y: u32, z: u32);

    /// Resolves the multisampled `source` into the single-sampled `destination`.
    fn resolve_subresource(
        &mut self,
        destination: TextureId,
        source: TextureId,
        format: TextureFormat,
    );

    /// Copies `size` bytes between buffers.
    fn copy_buffer_to_buffer(
        &mut self,
        source: BufferId,
        source_offset: u64,
        destination: BufferId,
        destination_offset: u64,
        size: u64,
    );

    /// Copies tightly packed texel data from a buffer into a texture's top mip.
    fn copy_buffer_to_texture(&mut self, source: BufferId, source_offset: u64, destination: TextureId);

    /// Writes the GPU timestamp into query `index` of `query_set`.
    fn write_timestamp(&mut self, query_set: QuerySetId, index: u32);

    /// Resolves `count` queries starting at `first` into a readback buffer.
    fn resolve_timestamps(
        &mut self,
        query_set: QuerySetId,
        first: u32,
        count: u32,
        destination: BufferId,
        destination_offset: u64,
    );

    /// Opens a named debug region.
    fn push_debug_marker(&mut self, label: &str);

    /// Closes the innermost debug region.
    fn pop_debug_marker(&mut self);

    /// Finishes recording.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::SubmissionFailure`] if the device rejects the
    /// recorded commands.
    fn close(self: Box<Self>) -> Result<CommandBufferId, RenderError>;

    /// Allows downcasting to a backend-specific encoder.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
