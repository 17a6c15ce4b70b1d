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

//! Full-screen triangle passes that composite into the back buffer.

use super::{create_pipeline, release_pipeline};
use crate::{
    constants::ToneMapConstants,
    lane::{not_created, DrawContext, LaneContext, LaneInput, RenderLane},
};
use cadence_core::{CommandEncoder, GraphicsDevice, PipelineId, RenderError};

/// What a [`FullscreenLane`] composites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullscreenEffect {
    /// HDR to display with exposure and a tone mapping operator.
    ToneMap,
    /// The ambient occlusion term, for debugging.
    ApplyAmbientOcclusion,
    /// The user interface overlay.
    Ui,
}

/// A pass that draws one full-screen triangle reading its inputs.
#[derive(Debug)]
pub struct FullscreenLane {
    effect: FullscreenEffect,
    pipeline: Option<PipelineId>,
}

impl FullscreenLane {
    /// An uncreated lane.
    pub fn new(effect: FullscreenEffect) -> Self {
        Self {
            effect,
            pipeline: None,
        }
    }
}

impl RenderLane for FullscreenLane {
    fn name(&self) -> &'static str {
        match self.effect {
            FullscreenEffect::ToneMap => "Tone mapping",
            FullscreenEffect::ApplyAmbientOcclusion => "Apply ambient occlusion",
            FullscreenEffect::Ui => "UI",
        }
    }

    fn on_create(&mut self, ctx: &mut LaneContext<'_>) -> Result<(), RenderError> {
        self.pipeline = Some(create_pipeline(
            ctx.device,
            self.name(),
            ctx.targets.pipeline_kind(),
        )?);
        Ok(())
    }

    fn on_resize(&mut self, _width: u32, _height: u32) {}

    fn draw(&self, encoder: &mut dyn CommandEncoder, ctx: &mut DrawContext<'_>) -> Result<(), RenderError> {
        let pipeline = self.pipeline.ok_or_else(|| not_created(self.name()))?;
        encoder.set_pipeline(pipeline);
        encoder.set_viewport(ctx.viewport);

        if self.effect == FullscreenEffect::ToneMap {
            let input = ctx.input;
            let (exposure, tone_mapper) = match input {
                LaneInput::ToneMap {
                    exposure,
                    tone_mapper,
                } => (exposure, tone_mapper),
                _ => (ctx.frame.exposure, ctx.frame.tone_mapper),
            };
            let constants = ctx.push_constants(&ToneMapConstants {
                exposure,
                tone_mapper: tone_mapper.index(),
                _padding: [0; 2],
            })?;
            encoder.bind_constant_buffer(0, constants);
        } else {
            encoder.bind_constant_buffer(0, ctx.per_frame);
        }
        for (slot, input) in (1..).zip(ctx.inputs) {
            encoder.bind_descriptor_table(slot, *input);
        }

        match self.effect {
            FullscreenEffect::Ui => encoder.draw(0..6, 0..1),
            _ => encoder.draw(0..3, 0..1),
        }
        Ok(())
    }

    fn on_destroy(&mut self, device: &dyn GraphicsDevice) {
        let name = self.name();
        release_pipeline(device, &mut self.pipeline, name);
    }
}
