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

//! Recording of one frame's two command buffers.
//!
//! Every target leaves a frame in the state it entered it in. Each transition
//! below has a matching transition back, either in the same pass or at the
//! end of the composite buffer.

use super::lanes::RendererLanes;
use super::targets::{RenderTargets, HDR_FORMAT};
use cadence_core::{
    AmbientOcclusion, CommandEncoder, DescriptorHandle, FrameState, GpuAddress, GraphicsDevice,
    RenderError, ResourceState, SkyMode, Viewport,
};
use cadence_data::{ConstantBufferRing, GpuTimer, TrackedTexture};
use cadence_lanes::{DrawContext, FrameLights, LaneInput, LaneSlot, SceneLanes, ShadowAtlas};
use glam::Vec4;

/// Color of the light frustum overlay.
pub const FRUSTUM_COLOR: Vec4 = Vec4::ONE;

const HDR_CLEAR: [f32; 4] = [0.0, 0.0, 0.0, 0.0];
const NORMAL_CLEAR: [f32; 4] = [0.0, 0.0, 0.0, 0.0];
const FAR_DEPTH: f32 = 1.0;

/// Borrows everything a frame records into.
pub(crate) struct FrameRecorder<'a> {
    pub device: &'a dyn GraphicsDevice,
    pub constants: &'a mut ConstantBufferRing,
    pub timer: &'a mut GpuTimer,
    pub per_frame: GpuAddress,
    pub frame: &'a FrameState,
    pub lights: &'a FrameLights,
    pub targets: &'a mut RenderTargets,
    pub lanes: &'a RendererLanes,
    pub scene: Option<&'a SceneLanes>,
    pub atlas: ShadowAtlas,
}

impl FrameRecorder<'_> {
    fn draw(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        slot: &LaneSlot,
        input: LaneInput,
        inputs: &[DescriptorHandle],
        viewport: Viewport,
    ) -> Result<bool, RenderError> {
        let mut ctx = DrawContext {
            device: self.device,
            constants: &mut *self.constants,
            per_frame: self.per_frame,
            frame: self.frame,
            viewport,
            inputs,
            input,
        };
        slot.draw(encoder, &mut ctx)
    }

    /// Draws `slot` and marks the timer with `label`, or with the lane's own
    /// name, if the slot held a lane.
    fn draw_and_mark(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        slot: &LaneSlot,
        input: LaneInput,
        inputs: &[DescriptorHandle],
        viewport: Viewport,
        label: Option<&'static str>,
    ) -> Result<(), RenderError> {
        if self.draw(encoder, slot, input, inputs, viewport)? {
            let label = label.or_else(|| slot.get().map(|lane| lane.name()));
            if let Some(label) = label {
                self.timer.mark(encoder, label)?;
            }
        }
        Ok(())
    }

    fn full_viewport(&self) -> Viewport {
        let (width, height) = self.targets.extent();
        Viewport::full(width, height)
    }

    /// Records the first command buffer: the back buffer's transition to a
    /// render target, clears, shadows, prepass, ambient occlusion, sky, scene,
    /// overlays and the MSAA resolve.
    pub fn record_offscreen(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        back_buffer: &mut TrackedTexture,
    ) -> Result<(), RenderError> {
        self.timer.mark(encoder, "Begin Frame")?;
        back_buffer.transition(encoder, ResourceState::Present, ResourceState::RenderTarget)?;
        self.clear(encoder)?;
        self.shadows(encoder)?;
        self.prepass_and_ambient_occlusion(encoder)?;
        self.color(encoder)?;
        self.resolve(encoder)
    }

    fn clear(&mut self, encoder: &mut dyn CommandEncoder) -> Result<(), RenderError> {
        let views = *self.targets.views();
        encoder.clear_depth_stencil(views.shadow_dsv, FAR_DEPTH);
        self.timer.mark(encoder, "Clear shadow map")?;
        encoder.clear_render_target(views.hdr_msaa_rtv, HDR_CLEAR);
        self.timer.mark(encoder, "Clear HDR")?;
        encoder.clear_depth_stencil(views.depth_dsv, FAR_DEPTH);
        self.timer.mark(encoder, "Clear depth")?;
        encoder.clear_depth_stencil(views.prepass_depth_dsv, FAR_DEPTH);
        encoder.clear_render_target(views.normal_rtv, NORMAL_CLEAR);
        self.timer.mark(encoder, "Clear depth (Non MSAA)")
    }

    fn shadows(&mut self, encoder: &mut dyn CommandEncoder) -> Result<(), RenderError> {
        let views = *self.targets.views();
        let lights = self.lights;
        if let Some(scene) = self.scene {
            for caster in &lights.shadow_casters {
                let Some(viewport) = self.atlas.viewport(caster.shadow_index) else {
                    continue;
                };
                encoder.set_render_targets(&[], Some(views.shadow_dsv));
                self.draw_and_mark(
                    encoder,
                    &scene.depth,
                    LaneInput::Shadow(*caster),
                    &[],
                    viewport,
                    Some("Shadow map"),
                )?;
            }
        }
        self.targets.textures_mut().shadow_atlas.transition(
            encoder,
            ResourceState::DepthWrite,
            ResourceState::PixelShaderResource,
        )
    }

    fn prepass_and_ambient_occlusion(
        &mut self,
        encoder: &mut dyn CommandEncoder,
    ) -> Result<(), RenderError> {
        let views = *self.targets.views();
        let viewport = self.full_viewport();
        if let Some(scene) = self.scene {
            encoder.set_render_targets(&[views.normal_rtv], Some(views.prepass_depth_dsv));
            self.draw(encoder, &scene.prepass, LaneInput::Frame, &[], viewport)?;
        }

        let t = self.targets.textures_mut();
        TrackedTexture::transition_batch(
            encoder,
            [
                (
                    t.prepass_depth,
                    ResourceState::DepthWrite,
                    ResourceState::NonPixelShaderResource,
                ),
                (
                    t.normal,
                    ResourceState::RenderTarget,
                    ResourceState::NonPixelShaderResource,
                ),
                (
                    t.ambient_occlusion,
                    ResourceState::GenericRead,
                    ResourceState::UnorderedAccess,
                ),
            ],
        )?;

        let lanes = self.lanes;
        match self.frame.ambient_occlusion {
            AmbientOcclusion::Disabled => {
                self.draw(
                    encoder,
                    &lanes.ambient_occlusion_clear,
                    LaneInput::Frame,
                    &[views.ambient_occlusion_uav],
                    viewport,
                )?;
            }
            mode => {
                let input = LaneInput::AmbientOcclusion {
                    downsampled: mode == AmbientOcclusion::Downsampled,
                };
                self.draw(
                    encoder,
                    &lanes.ambient_occlusion,
                    input,
                    &[
                        views.prepass_depth_srv,
                        views.normal_srv,
                        views.ambient_occlusion_uav,
                    ],
                    viewport,
                )?;
            }
        }

        let t = self.targets.textures_mut();
        TrackedTexture::transition_batch(
            encoder,
            [
                (
                    t.prepass_depth,
                    ResourceState::NonPixelShaderResource,
                    ResourceState::DepthWrite,
                ),
                (
                    t.normal,
                    ResourceState::NonPixelShaderResource,
                    ResourceState::RenderTarget,
                ),
                (
                    t.ambient_occlusion,
                    ResourceState::UnorderedAccess,
                    ResourceState::GenericRead,
                ),
            ],
        )
    }

    fn color(&mut self, encoder: &mut dyn CommandEncoder) -> Result<(), RenderError> {
        let views = *self.targets.views();
        let viewport = self.full_viewport();
        let lanes = self.lanes;
        encoder.set_render_targets(&[views.hdr_msaa_rtv], Some(views.depth_dsv));

        let sky = match self.frame.sky {
            SkyMode::Cubemap => Some(&lanes.sky_cubemap),
            SkyMode::Procedural => Some(&lanes.sky_procedural),
            SkyMode::None => None,
        };
        if let Some(sky) = sky {
            self.draw_and_mark(encoder, sky, LaneInput::Frame, &[], viewport, None)?;
        }

        if let Some(scene) = self.scene {
            self.draw(
                encoder,
                &scene.color,
                LaneInput::Frame,
                &[views.shadow_srv, views.ambient_occlusion_srv],
                viewport,
            )?;
            if self.frame.draw_bounding_boxes {
                self.draw_and_mark(
                    encoder,
                    &scene.bounding_boxes,
                    LaneInput::Frame,
                    &[],
                    viewport,
                    None,
                )?;
            }
        }

        let lights = self.lights;
        if self.frame.draw_light_frustums && !lights.light_view_projections.is_empty() {
            let camera = self.frame.camera.view_projection();
            encoder.push_debug_marker("Light's frustum");
            for light in &lights.light_view_projections {
                let input = LaneInput::Wireframe {
                    world: camera * light.inverse(),
                    color: FRUSTUM_COLOR,
                };
                self.draw(encoder, &lanes.wireframe, input, &[], viewport)?;
            }
            encoder.pop_debug_marker();
            self.timer.mark(encoder, "Light's frustum")?;
        }
        self.timer.mark(encoder, "Rendering scene")
    }

    fn resolve(&mut self, encoder: &mut dyn CommandEncoder) -> Result<(), RenderError> {
        encoder.push_debug_marker("Resolve MSAA");
        let t = self.targets.textures_mut();
        TrackedTexture::transition_batch(
            encoder,
            [
                (
                    &mut *t.hdr,
                    ResourceState::RenderTarget,
                    ResourceState::ResolveDest,
                ),
                (
                    &mut *t.hdr_msaa,
                    ResourceState::RenderTarget,
                    ResourceState::ResolveSource,
                ),
            ],
        )?;
        encoder.resolve_subresource(t.hdr.id(), t.hdr_msaa.id(), HDR_FORMAT);
        TrackedTexture::transition_batch(
            encoder,
            [
                (
                    t.hdr,
                    ResourceState::ResolveDest,
                    ResourceState::PixelShaderResource,
                ),
                (
                    t.hdr_msaa,
                    ResourceState::ResolveSource,
                    ResourceState::RenderTarget,
                ),
            ],
        )?;
        encoder.pop_debug_marker();
        self.timer.mark(encoder, "Resolve MSAA")
    }

    /// Records the second command buffer: the composite into `back_buffer`,
    /// the UI, the return of every target to its resting state and the
    /// timestamp resolve. `back_buffer` is already a render target.
    pub fn record_composite(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        back_buffer: &mut TrackedTexture,
        back_buffer_view: DescriptorHandle,
    ) -> Result<(), RenderError> {
        let views = *self.targets.views();
        let lanes = self.lanes;
        let (width, height) = back_buffer.extent();
        let viewport = Viewport::full(width, height);

        encoder.set_render_targets(&[back_buffer_view], None);
        if self.frame.display_ao_directly {
            self.draw(
                encoder,
                &lanes.ambient_occlusion_apply,
                LaneInput::Frame,
                &[views.ambient_occlusion_apply_srv],
                viewport,
            )?;
        } else {
            let input = LaneInput::ToneMap {
                exposure: self.frame.exposure,
                tone_mapper: self.frame.tone_mapper,
            };
            self.draw_and_mark(
                encoder,
                &lanes.tone_map,
                input,
                &[views.hdr_srv],
                viewport,
                None,
            )?;
        }
        self.draw_and_mark(
            encoder,
            &lanes.ui,
            LaneInput::Frame,
            &[],
            viewport,
            Some("UI rendering"),
        )?;
        back_buffer.transition(encoder, ResourceState::RenderTarget, ResourceState::Present)?;

        let t = self.targets.textures_mut();
        TrackedTexture::transition_batch(
            encoder,
            [
                (
                    t.hdr,
                    ResourceState::PixelShaderResource,
                    ResourceState::RenderTarget,
                ),
                (
                    t.shadow_atlas,
                    ResourceState::PixelShaderResource,
                    ResourceState::DepthWrite,
                ),
            ],
        )?;
        self.timer.collect(encoder);
        Ok(())
    }
}
