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

//! The frame orchestrator: owns the render context, the targets and every
//! lane, and turns one [`FrameState`] into two submissions and a present.

use super::lanes::RendererLanes;
use super::recorder::FrameRecorder;
use super::targets::{RenderTargets, TargetFormats};
use crate::scene_agent::{LoadEnvironment, LoadStep, SceneLoader};
use cadence_core::{
    FrameState, GraphicsDevice, PresentationSurface, RenderError, RendererConfig, ResourceState,
};
use cadence_data::{RenderContext, TimingSample, TrackedTexture};
use cadence_lanes::{FrameLights, LaneContext, LaneFactory, LaneKind, SceneSource, ShadowAtlas};
use std::sync::Arc;

/// What one call to [`FrameOrchestrator::render`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames rendered so far, this one included.
    pub frame_number: u64,
    /// Frame slot the frame was recorded into.
    pub slot: usize,
    /// Constant bytes the frame allocated.
    pub constant_bytes_used: u64,
    /// Command buffers the frame recorded.
    pub command_buffers_used: usize,
    /// Lights that rendered into the shadow atlas.
    pub shadow_casters: usize,
}

/// Drives the renderer one frame at a time.
#[derive(Debug)]
pub struct FrameOrchestrator {
    context: RenderContext,
    factory: Box<dyn LaneFactory>,
    formats: TargetFormats,
    targets: RenderTargets,
    lanes: RendererLanes,
    loader: SceneLoader,
    atlas: ShadowAtlas,
    frame_number: u64,
}

impl FrameOrchestrator {
    /// Creates the pools, the render targets at the surface's size and the
    /// renderer lanes, then waits for their static data to reach the GPU.
    ///
    /// # Errors
    ///
    /// Returns the first failure. Everything created before it is destroyed.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        surface: &dyn PresentationSurface,
        config: RendererConfig,
        factory: Box<dyn LaneFactory>,
    ) -> Result<Self, RenderError> {
        if surface.back_buffer_count() != config.back_buffer_count {
            log::warn!(
                "FrameOrchestrator: surface has {} back buffers, configuration expects {}",
                surface.back_buffer_count(),
                config.back_buffer_count
            );
        }
        let formats = TargetFormats {
            msaa_samples: config.msaa_samples,
            back_buffer: surface.format(),
        };
        let atlas = ShadowAtlas::new(config.shadow_atlas_size);

        let mut context = RenderContext::new(device, config)?;
        let targets = match RenderTargets::new(
            context.device.as_ref(),
            &mut context.descriptors,
            &context.config,
            surface.extent(),
        ) {
            Ok(targets) => targets,
            Err(e) => {
                log::error!("FrameOrchestrator: Failed to create render targets: {}", e);
                context.destroy();
                return Err(e);
            }
        };

        let mut orchestrator = Self {
            context,
            factory,
            formats,
            targets,
            lanes: RendererLanes::default(),
            loader: SceneLoader::new(),
            atlas,
            frame_number: 0,
        };
        if let Err(e) = orchestrator.create_renderer_lanes() {
            log::error!("FrameOrchestrator: Failed to create renderer lanes: {}", e);
            orchestrator.destroy();
            return Err(e);
        }
        log::info!(
            "Frame orchestrator ready: {} frame slots, {}x{}",
            orchestrator.context.frame_slots(),
            orchestrator.targets.extent().0,
            orchestrator.targets.extent().1
        );
        Ok(orchestrator)
    }

    fn create_renderer_lanes(&mut self) -> Result<(), RenderError> {
        let extent = self.targets.extent();
        let context = &mut self.context;
        let device = context.device.as_ref();
        for kind in LaneKind::RENDERER {
            let Some(slot) = self.lanes.slot_mut(kind) else {
                continue;
            };
            let lane = self.factory.create(kind)?;
            let mut ctx = LaneContext {
                device,
                descriptors: &mut context.descriptors,
                static_pool: &mut context.static_pool,
                upload_heap: &mut context.upload_heap,
                scene: None,
                targets: self.formats.layout(kind),
                extent,
            };
            slot.create(lane, &mut ctx)?;
        }
        context.finish_uploads()
    }

    /// Records, submits and presents one frame.
    ///
    /// Blocks first until the frame slot about to be reused has retired.
    /// The offscreen work is submitted before waiting for the back buffer,
    /// so the GPU starts on it while the swap chain catches up.
    ///
    /// # Errors
    ///
    /// Any error is fatal to the renderer; the caller should destroy it.
    pub fn render(
        &mut self,
        frame: &FrameState,
        surface: &mut dyn PresentationSurface,
    ) -> Result<FrameStats, RenderError> {
        self.render_frame(frame, surface).inspect_err(|e| {
            log::error!("FrameOrchestrator: Frame {} failed: {}", self.frame_number, e);
        })
    }

    fn render_frame(
        &mut self,
        frame: &FrameState,
        surface: &mut dyn PresentationSurface,
    ) -> Result<FrameStats, RenderError> {
        let slot = self.context.begin_frame()?;
        self.frame_number += 1;
        let device = Arc::clone(&self.context.device);
        let device = device.as_ref();

        let scene = self.loader.ready();
        let scene_lights = scene.map_or(&[][..], |(resources, _)| resources.lights());
        let (width, height) = self.targets.extent();
        let lights = FrameLights::build(frame, scene_lights, width, height);

        let RenderContext {
            command_ring,
            constants,
            timer,
            ..
        } = &mut self.context;
        let per_frame = constants.allocate_pod(device, &lights.constants)?;
        {
            let mut recorder = FrameRecorder {
                device,
                constants: &mut *constants,
                timer: &mut *timer,
                per_frame,
                frame,
                lights: &lights,
                targets: &mut self.targets,
                lanes: &self.lanes,
                scene: scene.map(|(_, lanes)| lanes),
                atlas: self.atlas,
            };

            let mut back_buffer = TrackedTexture::adopt(
                surface.current_back_buffer(),
                ResourceState::Present,
                surface.extent(),
                surface.format(),
            );
            let mut encoder = command_ring.acquire(device)?;
            recorder.record_offscreen(encoder.as_mut(), &mut back_buffer)?;
            let offscreen = encoder.close()?;
            device.submit(&[offscreen])?;

            surface.wait_for_ready()?;
            let mut encoder = command_ring.acquire(device)?;
            recorder.record_composite(
                encoder.as_mut(),
                &mut back_buffer,
                surface.current_back_buffer_view(),
            )?;
            let composite = encoder.close()?;
            device.submit(&[composite])?;
        }

        let fence = device.signal()?;
        let stats = FrameStats {
            frame_number: self.frame_number,
            slot,
            constant_bytes_used: constants.frame_used(),
            command_buffers_used: command_ring.used_in_current(),
            shadow_casters: lights.shadow_casters.len(),
        };
        self.context.end_frame(fence);
        surface.present()?;
        log::trace!("Frame {} submitted with fence {}", stats.frame_number, fence);
        Ok(stats)
    }

    /// Recreates the window-sized targets. An unchanged or empty size is
    /// ignored.
    pub fn on_resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if width == 0 || height == 0 || self.targets.extent() == (width, height) {
            return Ok(());
        }
        let device = self.context.device.as_ref();
        device.wait_idle()?;
        self.targets.resize(device, width, height)?;
        self.lanes.on_resize(width, height);
        self.loader.on_resize(width, height);
        log::info!("Render targets resized to {}x{}", width, height);
        Ok(())
    }

    /// Starts loading `source`, unloading the current scene first.
    pub fn begin_load(&mut self, source: Box<dyn SceneSource>) {
        self.loader.begin(source, &mut self.context);
    }

    /// Runs the next load stage.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::LoadAborted`] when a stage fails. The partial
    /// scene stays in place, undrawn, until [`unload`](Self::unload).
    pub fn advance_load(&mut self) -> Result<LoadStep, RenderError> {
        let mut env = LoadEnvironment {
            context: &mut self.context,
            factory: self.factory.as_ref(),
            formats: &self.formats,
            extent: self.targets.extent(),
        };
        self.loader.advance(&mut env)
    }

    /// Waits for the GPU and destroys the loaded or partially loaded scene.
    pub fn unload(&mut self) {
        self.loader.unload(&mut self.context);
    }

    /// The scene loader.
    pub fn loader(&self) -> &SceneLoader {
        &self.loader
    }

    /// The GPU timings of the most recently read-back frame.
    pub fn timings(&self) -> &[TimingSample] {
        self.context.timer.results()
    }

    /// The render context.
    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    /// The render targets.
    pub fn targets(&self) -> &RenderTargets {
        &self.targets
    }

    /// Frames rendered so far.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Waits for the GPU and destroys everything, scene first.
    pub fn destroy(self) {
        if let Err(e) = self.context.device.wait_idle() {
            log::warn!("FrameOrchestrator: Failed to wait for the GPU: {:?}", e);
        }
        let Self {
            context,
            loader,
            mut lanes,
            targets,
            ..
        } = self;
        let device = context.device.as_ref();
        loader.destroy(device);
        lanes.destroy(device);
        targets.destroy(device);
        context.destroy();
        log::info!("Frame orchestrator destroyed");
    }
}
