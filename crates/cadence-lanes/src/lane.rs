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

//! The contract between the frame orchestrator and the render lanes.
//!
//! A lane is a black box that turns descriptor handles and a command encoder
//! into draw or dispatch calls. The orchestrator only ever sees the four
//! operations of [`RenderLane`]: create, resize, draw and destroy.

use crate::{constants::ShadowCaster, scene::SceneResources};
use cadence_core::{
    CommandEncoder, DescriptorHandle, FrameState, GpuAddress, GraphicsDevice, PipelineKind,
    RenderError, TextureFormat, ToneMapper, Viewport,
};
use cadence_data::{ConstantBufferRing, DescriptorHeaps, StaticBufferPool, UploadHeap};
use glam::{Mat4, Vec4};
use std::fmt::Debug;

/// The attachments a lane renders into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLayout {
    /// Color attachment formats, in slot order.
    pub color_formats: Vec<TextureFormat>,
    /// Depth attachment format, if any.
    pub depth_format: Option<TextureFormat>,
    /// MSAA sample count of the attachments.
    pub sample_count: u32,
}

impl TargetLayout {
    /// A single color attachment.
    pub fn color(format: TextureFormat, sample_count: u32) -> Self {
        Self {
            color_formats: vec![format],
            depth_format: None,
            sample_count,
        }
    }

    /// A depth-only layout.
    pub fn depth_only(format: TextureFormat, sample_count: u32) -> Self {
        Self {
            color_formats: Vec::new(),
            depth_format: Some(format),
            sample_count,
        }
    }

    /// Adds a depth attachment.
    pub fn with_depth(mut self, format: TextureFormat) -> Self {
        self.depth_format = Some(format);
        self
    }

    /// The pipeline shape for this layout.
    pub fn pipeline_kind(&self) -> PipelineKind {
        PipelineKind::Graphics {
            color_formats: self.color_formats.clone(),
            depth_format: self.depth_format,
            sample_count: self.sample_count,
        }
    }
}

/// Everything a lane may use while it is being created.
pub struct LaneContext<'a> {
    /// The device.
    pub device: &'a dyn GraphicsDevice,
    /// Descriptor pools; handles taken here are owned by the lane for good.
    pub descriptors: &'a mut DescriptorHeaps,
    /// Pool for geometry and constants that live as long as the lane.
    pub static_pool: &'a mut StaticBufferPool,
    /// Staging memory, flushed by the caller once creation is over.
    pub upload_heap: &'a mut UploadHeap,
    /// The loaded scene, for lanes that draw it.
    pub scene: Option<&'a SceneResources>,
    /// Attachments the lane will render into.
    pub targets: TargetLayout,
    /// Current window size.
    pub extent: (u32, u32),
}

/// Per-draw parameters beyond the shared frame constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LaneInput {
    /// Nothing beyond the per-frame constants.
    Frame,
    /// Render depth from a light into its atlas quadrant.
    Shadow(ShadowCaster),
    /// Map HDR to the display.
    ToneMap {
        /// Exposure multiplier.
        exposure: f32,
        /// Operator.
        tone_mapper: ToneMapper,
    },
    /// Compute ambient occlusion.
    AmbientOcclusion {
        /// Whether to compute at half resolution.
        downsampled: bool,
    },
    /// Draw one wireframe box transformed by `world`.
    Wireframe {
        /// Maps the unit cube `[-1, 1]^3` into clip space.
        world: Mat4,
        /// Line color.
        color: Vec4,
    },
}

/// Everything a lane may use while it records a frame.
pub struct DrawContext<'a> {
    /// The device, for constant uploads.
    pub device: &'a dyn GraphicsDevice,
    /// This frame's constant ring.
    pub constants: &'a mut ConstantBufferRing,
    /// Address of this frame's [`PerFrameConstants`](crate::PerFrameConstants).
    pub per_frame: GpuAddress,
    /// The caller's frame description.
    pub frame: &'a FrameState,
    /// Viewport to render with.
    pub viewport: Viewport,
    /// Shader-visible inputs, bound in order after the lane's own tables.
    pub inputs: &'a [DescriptorHandle],
    /// Lane specific parameters.
    pub input: LaneInput,
}

impl DrawContext<'_> {
    /// Copies `value` into the constant ring.
    pub fn push_constants<T: bytemuck::Pod>(&mut self, value: &T) -> Result<GpuAddress, RenderError> {
        self.constants.allocate_pod(self.device, value)
    }
}

/// A render pass as seen by the orchestrator.
pub trait RenderLane: Send + Sync + Debug {
    /// Label used in logs, debug markers and timer marks.
    fn name(&self) -> &'static str;

    /// Creates pipelines, descriptors and static data.
    fn on_create(&mut self, ctx: &mut LaneContext<'_>) -> Result<(), RenderError>;

    /// Follows a window size change.
    fn on_resize(&mut self, width: u32, height: u32);

    /// Records the lane's work.
    ///
    /// Attachments are already bound and in the states the lane expects;
    /// a lane never issues barriers on resources it does not own.
    fn draw(&self, encoder: &mut dyn CommandEncoder, ctx: &mut DrawContext<'_>) -> Result<(), RenderError>;

    /// Releases everything `on_create` made. Must be safe to call twice.
    fn on_destroy(&mut self, device: &dyn GraphicsDevice);
}

pub(crate) fn not_created(lane: &str) -> RenderError {
    RenderError::ResourceError(format!("lane '{lane}' drawn before on_create"))
}
