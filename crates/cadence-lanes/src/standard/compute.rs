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

//! Compute passes over the window-sized ambient occlusion target.

use super::{create_pipeline, release_pipeline};
use crate::{
    constants::AmbientOcclusionConstants,
    lane::{not_created, DrawContext, LaneContext, LaneInput, RenderLane},
};
use cadence_core::{CommandEncoder, GraphicsDevice, PipelineId, PipelineKind, RenderError};

/// Threads per group along each axis.
pub const GROUP_SIZE: u32 = 8;

/// Which compute pass a [`ComputeLane`] implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeKind {
    /// Screen-space ambient occlusion from depth and normals.
    AmbientOcclusion,
    /// Fills the occlusion target with "no occlusion".
    ClearAmbientOcclusion,
}

/// A compute pass dispatched over the window.
#[derive(Debug)]
pub struct ComputeLane {
    kind: ComputeKind,
    pipeline: Option<PipelineId>,
    extent: (u32, u32),
}

impl ComputeLane {
    /// An uncreated lane.
    pub fn new(kind: ComputeKind) -> Self {
        Self {
            kind,
            pipeline: None,
            extent: (0, 0),
        }
    }

    fn groups(&self, shift: u32) -> (u32, u32) {
        let (width, height) = self.extent;
        (
            (width >> shift).div_ceil(GROUP_SIZE).max(1),
            (height >> shift).div_ceil(GROUP_SIZE).max(1),
        )
    }
}

impl RenderLane for ComputeLane {
    fn name(&self) -> &'static str {
        match self.kind {
            ComputeKind::AmbientOcclusion => "Ambient occlusion",
            ComputeKind::ClearAmbientOcclusion => "Clear ambient occlusion",
        }
    }

    fn on_create(&mut self, ctx: &mut LaneContext<'_>) -> Result<(), RenderError> {
        self.pipeline = Some(create_pipeline(ctx.device, self.name(), PipelineKind::Compute)?);
        self.extent = ctx.extent;
        Ok(())
    }

    fn on_resize(&mut self, width: u32, height: u32) {
        self.extent = (width, height);
    }

    fn draw(&self, encoder: &mut dyn CommandEncoder, ctx: &mut DrawContext<'_>) -> Result<(), RenderError> {
        let pipeline = self.pipeline.ok_or_else(|| not_created(self.name()))?;
        encoder.set_pipeline(pipeline);

        let (x, y) = match (self.kind, ctx.input) {
            (ComputeKind::AmbientOcclusion, input) => {
                let downsampled = matches!(input, LaneInput::AmbientOcclusion { downsampled: true });
                let constants = ctx.push_constants(&AmbientOcclusionConstants {
                    output_size: [self.extent.0, self.extent.1],
                    downsampled: u32::from(downsampled),
                    _padding: 0,
                })?;
                encoder.bind_constant_buffer(0, constants);
                self.groups(u32::from(downsampled))
            }
            (ComputeKind::ClearAmbientOcclusion, _) => {
                // The clear shader reads no constants, yet its layout
                // expects a bound constant buffer.
                let dummy = ctx.constants.allocate(ctx.device, &[0u8; 4])?;
                encoder.bind_constant_buffer(0, dummy);
                self.groups(0)
            }
        };
        for (slot, input) in (1..).zip(ctx.inputs) {
            encoder.bind_descriptor_table(slot, *input);
        }
        encoder.dispatch(x, y, 1);
        Ok(())
    }

    fn on_destroy(&mut self, device: &dyn GraphicsDevice) {
        let name = self.name();
        release_pipeline(device, &mut self.pipeline, name);
    }
}
