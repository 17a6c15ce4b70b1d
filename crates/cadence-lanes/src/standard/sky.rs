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

//! Sky backgrounds drawn behind the scene.

use super::{create_pipeline, release_pipeline};
use crate::{
    constants::{ProceduralSkyConstants, SkyConstants},
    lane::{not_created, DrawContext, LaneContext, RenderLane},
    scene::{TextureData, TEXTURE_UPLOAD_ALIGNMENT},
};
use cadence_core::{
    CommandEncoder, DescriptorHandle, GraphicsDevice, PipelineId, RenderError, ResourceState,
    TextureDescriptor, TextureUsage, ViewKind,
};
use cadence_data::TrackedTexture;

/// Side of the environment map the cubemap sky samples.
pub const ENVIRONMENT_SIZE: u32 = 4;

/// Which sky a [`SkyLane`] draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkyKind {
    /// Samples a prefiltered environment map.
    Cubemap,
    /// Evaluates an analytic atmosphere.
    Procedural,
}

/// A full-screen sky pass.
#[derive(Debug)]
pub struct SkyLane {
    kind: SkyKind,
    pipeline: Option<PipelineId>,
    environment: Option<TrackedTexture>,
    environment_view: Option<DescriptorHandle>,
}

impl SkyLane {
    /// An uncreated lane.
    pub fn new(kind: SkyKind) -> Self {
        Self {
            kind,
            pipeline: None,
            environment: None,
            environment_view: None,
        }
    }

    fn create_environment(&mut self, ctx: &mut LaneContext<'_>) -> Result<(), RenderError> {
        let data = TextureData::solid(
            "Skydome environment",
            ENVIRONMENT_SIZE,
            ENVIRONMENT_SIZE,
            [90, 140, 220, 255],
        );
        let mut texture = TrackedTexture::create(
            ctx.device,
            &TextureDescriptor::new_2d(
                &data.name,
                data.width,
                data.height,
                data.format,
                TextureUsage::SHADER_RESOURCE | TextureUsage::COPY_DST,
                ResourceState::CopyDest,
            ),
        )?;
        let uploaded = ctx
            .upload_heap
            .stage(ctx.device, &data.pixels, TEXTURE_UPLOAD_ALIGNMENT)
            .and_then(|allocation| {
                ctx.upload_heap
                    .copy_to_texture(ctx.device, &allocation, &mut texture)
            });
        if let Err(e) = uploaded {
            texture.destroy(ctx.device);
            return Err(e);
        }
        let view = ctx.descriptors.allocate_cbv_srv_uav(1)?.first();
        ctx.device
            .create_view(texture.id(), ViewKind::ShaderResource, view)?;
        self.environment = Some(texture);
        self.environment_view = Some(view);
        Ok(())
    }
}

impl RenderLane for SkyLane {
    fn name(&self) -> &'static str {
        match self.kind {
            SkyKind::Cubemap => "Skydome",
            SkyKind::Procedural => "Skydome proc",
        }
    }

    fn on_create(&mut self, ctx: &mut LaneContext<'_>) -> Result<(), RenderError> {
        if self.kind == SkyKind::Cubemap {
            self.create_environment(ctx)?;
        }
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

        let inverse = ctx.frame.camera.view_projection().inverse();
        let constants = match self.kind {
            SkyKind::Cubemap => ctx.push_constants(&SkyConstants {
                inverse_view_projection: inverse.to_cols_array_2d(),
            })?,
            SkyKind::Procedural => ctx.push_constants(&ProceduralSkyConstants::new(inverse))?,
        };
        encoder.bind_constant_buffer(0, constants);
        if let Some(view) = self.environment_view {
            encoder.bind_descriptor_table(1, view);
        }
        encoder.draw(0..3, 0..1);
        Ok(())
    }

    fn on_destroy(&mut self, device: &dyn GraphicsDevice) {
        let name = self.name();
        release_pipeline(device, &mut self.pipeline, name);
        if let Some(texture) = self.environment.take() {
            texture.destroy(device);
        }
        self.environment_view = None;
    }
}
