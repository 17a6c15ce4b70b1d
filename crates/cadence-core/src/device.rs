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

//! The [`GraphicsDevice`] contract and the descriptors used to create
//! resources through it.
//!
//! The device owns the queue, the fence timeline and every GPU object. The
//! scheduler never reaches past this trait: command buffers are created,
//! reset, closed and submitted through it, and the only way to learn that the
//! GPU is done with something is [`GraphicsDevice::completed_fence_value`].

use crate::command::CommandEncoder;
use crate::error::RenderError;
use crate::handle::{
    BufferId, CommandBufferId, DescriptorCategory, DescriptorHandle, GpuAddress, PipelineId,
    QuerySetId, TextureId,
};
use crate::state::ResourceState;
use bitflags::bitflags;
use std::borrow::Cow;
use std::fmt::Debug;

/// A point on the device's monotonically increasing fence timeline.
///
/// Zero is never signaled; it means "nothing to wait for".
pub type FenceValue = u64;

/// Where a buffer's memory lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryLocation {
    /// Device local memory, written through copies.
    DeviceLocal,
    /// CPU-writable, GPU-readable memory.
    Upload,
    /// GPU-writable, CPU-readable memory.
    Readback,
}

bitflags! {
    /// How a buffer is going to be used.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Vertex input.
        const VERTEX = 1 << 0;
        /// Index input.
        const INDEX = 1 << 1;
        /// Constant buffer views.
        const CONSTANT = 1 << 2;
        /// Copy source.
        const COPY_SRC = 1 << 3;
        /// Copy destination.
        const COPY_DST = 1 << 4;
        /// Destination of timestamp query resolves.
        const QUERY_RESOLVE = 1 << 5;
    }
}

bitflags! {
    /// How a texture is going to be used.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Color attachment.
        const RENDER_TARGET = 1 << 0;
        /// Depth attachment.
        const DEPTH_STENCIL = 1 << 1;
        /// Storage image.
        const UNORDERED_ACCESS = 1 << 2;
        /// Sampled image.
        const SHADER_RESOURCE = 1 << 3;
        /// Copy destination.
        const COPY_DST = 1 << 4;
    }
}

/// Texel formats used by the scheduler's own targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit normalized RGBA.
    Rgba8Unorm,
    /// 8-bit normalized BGRA, sRGB encoded. Typical back buffer format.
    Bgra8UnormSrgb,
    /// 16-bit float RGBA, used for HDR targets.
    Rgba16Float,
    /// 10-bit RGB with 2-bit alpha, used for packed normals.
    Rgb10A2Unorm,
    /// Single-channel 8-bit normalized, used for ambient occlusion.
    R8Unorm,
    /// 32-bit float depth.
    Depth32Float,
}

impl TextureFormat {
    /// Size of one texel in bytes.
    pub const fn bytes_per_texel(self) -> u32 {
        match self {
            TextureFormat::R8Unorm => 1,
            TextureFormat::Rgba16Float => 8,
            _ => 4,
        }
    }

    /// Whether this is a depth format.
    pub const fn is_depth(self) -> bool {
        matches!(self, TextureFormat::Depth32Float)
    }
}

/// Describes a buffer to create.
#[derive(Debug, Clone)]
pub struct BufferDescriptor<'a> {
    /// Debug label.
    pub label: Option<Cow<'a, str>>,
    /// Size in bytes.
    pub size: u64,
    /// Memory heap the buffer lives in.
    pub location: MemoryLocation,
    /// Intended usages.
    pub usage: BufferUsage,
}

/// Describes a 2D texture to create.
#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    /// Debug label.
    pub label: Option<Cow<'a, str>>,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Mip level count.
    pub mip_levels: u32,
    /// Texel format.
    pub format: TextureFormat,
    /// MSAA sample count; 1 for single-sampled.
    pub sample_count: u32,
    /// Intended usages.
    pub usage: TextureUsage,
    /// The state the texture is in right after creation.
    pub initial_state: ResourceState,
}

impl<'a> TextureDescriptor<'a> {
    /// A single-mip, single-sample texture description.
    pub fn new_2d(
        label: &'a str,
        width: u32,
        height: u32,
        format: TextureFormat,
        usage: TextureUsage,
        initial_state: ResourceState,
    ) -> Self {
        Self {
            label: Some(Cow::Borrowed(label)),
            width,
            height,
            mip_levels: 1,
            format,
            sample_count: 1,
            usage,
            initial_state,
        }
    }

    /// Returns this description with `samples` samples per texel.
    pub fn with_samples(mut self, samples: u32) -> Self {
        self.sample_count = samples;
        self
    }

    /// Size of the top mip in bytes.
    pub fn byte_size(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * u64::from(self.format.bytes_per_texel())
    }
}

/// The kind of view written into a descriptor slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    /// Render target view.
    RenderTarget,
    /// Depth stencil view.
    DepthStencil,
    /// Shader resource view.
    ShaderResource,
    /// Unordered access view.
    UnorderedAccess,
}

impl ViewKind {
    /// The descriptor heap category this kind of view must be written into.
    pub const fn category(self) -> DescriptorCategory {
        match self {
            ViewKind::RenderTarget => DescriptorCategory::RenderTarget,
            ViewKind::DepthStencil => DescriptorCategory::DepthStencil,
            ViewKind::ShaderResource | ViewKind::UnorderedAccess => DescriptorCategory::CbvSrvUav,
        }
    }
}

/// The fixed-function shape of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineKind {
    /// Rasterization pipeline.
    Graphics {
        /// Formats of the bound color attachments, in slot order.
        color_formats: Vec<TextureFormat>,
        /// Format of the depth attachment, if any.
        depth_format: Option<TextureFormat>,
        /// Sample count of every attachment.
        sample_count: u32,
    },
    /// Compute pipeline.
    Compute,
}

/// Describes a pipeline state object to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDescriptor<'a> {
    /// Debug label, also used to locate the shader.
    pub label: Cow<'a, str>,
    /// Pipeline shape.
    pub kind: PipelineKind,
}

/// An opaque handle to a descriptor heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorHeapId(pub usize);

/// Addresses of a freshly created descriptor heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorHeapInfo {
    /// The heap handle.
    pub id: DescriptorHeapId,
    /// CPU address of slot 0.
    pub cpu_base: u64,
    /// GPU address of slot 0, for shader-visible heaps.
    pub gpu_base: Option<u64>,
    /// Distance in bytes between consecutive slots.
    pub increment: u32,
}

/// A trait representing a logical graphics device and its single queue.
///
/// All methods take `&self`; implementations synchronize internally.
pub trait GraphicsDevice: Send + Sync + Debug + 'static {
    // ─── Descriptor heaps ──────────────────────────────────────────────

    /// Creates a descriptor heap with `capacity` slots of `category`.
    fn create_descriptor_heap(
        &self,
        category: DescriptorCategory,
        capacity: u32,
    ) -> Result<DescriptorHeapInfo, RenderError>;

    /// Destroys a descriptor heap and every slot in it.
    fn destroy_descriptor_heap(&self, id: DescriptorHeapId) -> Result<(), RenderError>;

    /// Writes a `kind` view of `texture` into the descriptor slot `target`.
    fn create_view(
        &self,
        texture: TextureId,
        kind: ViewKind,
        target: DescriptorHandle,
    ) -> Result<(), RenderError>;

    // ─── Buffers ──────────────────────────────────────────────────────

    /// Creates a buffer.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, RenderError>;

    /// Destroys a buffer.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), RenderError>;

    /// Returns the GPU virtual address of the start of a buffer.
    fn buffer_gpu_address(&self, id: BufferId) -> Result<GpuAddress, RenderError>;

    /// Writes `data` into a CPU-visible buffer at `offset`.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), RenderError>;

    /// Reads `out.len()` bytes from a CPU-visible buffer at `offset`.
    fn read_buffer(&self, id: BufferId, offset: u64, out: &mut [u8]) -> Result<(), RenderError>;

    // ─── Textures ─────────────────────────────────────────────────────

    /// Creates a texture.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, RenderError>;

    /// Destroys a texture.
    fn destroy_texture(&self, id: TextureId) -> Result<(), RenderError>;

    // ─── Pipelines ───────────────────────────────────────────────────

    /// Compiles a pipeline state object.
    fn create_pipeline(&self, descriptor: &PipelineDescriptor) -> Result<PipelineId, RenderError>;

    /// Destroys a pipeline state object.
    fn destroy_pipeline(&self, id: PipelineId) -> Result<(), RenderError>;

    // ─── Queries ──────────────────────────────────────────────────────

    /// Creates a set of `count` timestamp queries.
    fn create_query_set(&self, count: u32) -> Result<QuerySetId, RenderError>;

    /// Destroys a query set.
    fn destroy_query_set(&self, id: QuerySetId) -> Result<(), RenderError>;

    /// Timestamp ticks per second on the queue.
    fn timestamp_frequency(&self) -> u64;

    // ─── Command buffers and submission ───────────────────────────────

    /// Creates a reusable command buffer.
    fn create_command_buffer(&self, label: &str) -> Result<CommandBufferId, RenderError>;

    /// Destroys a command buffer.
    fn destroy_command_buffer(&self, id: CommandBufferId) -> Result<(), RenderError>;

    /// Resets a command buffer and opens it for recording.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::SubmissionFailure`] if the buffer is already
    /// recording or its previous submission may still be executing.
    fn begin_command_buffer(
        &self,
        id: CommandBufferId,
    ) -> Result<Box<dyn CommandEncoder>, RenderError>;

    /// Submits closed command buffers to the queue, in order.
    fn submit(&self, command_buffers: &[CommandBufferId]) -> Result<(), RenderError>;

    // ─── Fence timeline ───────────────────────────────────────────────

    /// Enqueues a fence signal after all submitted work and returns its value.
    fn signal(&self) -> Result<FenceValue, RenderError>;

    /// The highest fence value the GPU has reached.
    fn completed_fence_value(&self) -> FenceValue;

    /// Blocks until the fence reaches `value`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::DeviceLost`] if `value` was never signaled or the
    /// queue can no longer make progress.
    fn wait_for_fence(&self, value: FenceValue) -> Result<(), RenderError>;

    /// Blocks until every submitted command has completed.
    fn wait_idle(&self) -> Result<(), RenderError> {
        let value = self.signal()?;
        self.wait_for_fence(value)
    }
}
