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

//! The render targets owned by the frame orchestrator.
//!
//! Descriptor slots for every target are allocated once, when the targets are
//! created. A resize recreates the window-sized textures and writes their new
//! views into the same slots, so lanes holding a handle never see it change.

use cadence_core::{
    DescriptorHandle, DescriptorTable, GraphicsDevice, RenderError, RendererConfig, ResourceState,
    TextureDescriptor, TextureFormat, TextureUsage, ViewKind,
};
use cadence_data::{DescriptorHeaps, TrackedTexture};
use cadence_lanes::{LaneKind, TargetLayout};

/// Format of every depth buffer, including the shadow atlas.
pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;
/// Format of the HDR color targets.
pub const HDR_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
/// Format of the prepass normal buffer.
pub const NORMAL_FORMAT: TextureFormat = TextureFormat::Rgb10A2Unorm;
/// Format of the ambient occlusion output.
pub const AMBIENT_OCCLUSION_FORMAT: TextureFormat = TextureFormat::R8Unorm;

/// The attachment formats each lane kind renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetFormats {
    /// Samples of the multisampled HDR and depth targets.
    pub msaa_samples: u32,
    /// Format of the presentation surface.
    pub back_buffer: TextureFormat,
}

impl TargetFormats {
    /// The attachments `kind` is drawn with.
    pub fn layout(&self, kind: LaneKind) -> TargetLayout {
        match kind {
            LaneKind::Depth => TargetLayout::depth_only(DEPTH_FORMAT, 1),
            LaneKind::Prepass => TargetLayout::color(NORMAL_FORMAT, 1).with_depth(DEPTH_FORMAT),
            LaneKind::SkyCubemap
            | LaneKind::SkyProcedural
            | LaneKind::Wireframe
            | LaneKind::Color
            | LaneKind::BoundingBoxes => {
                TargetLayout::color(HDR_FORMAT, self.msaa_samples).with_depth(DEPTH_FORMAT)
            }
            // Compute lanes have no attachments.
            LaneKind::AmbientOcclusion | LaneKind::AmbientOcclusionClear => TargetLayout {
                color_formats: Vec::new(),
                depth_format: None,
                sample_count: 1,
            },
            LaneKind::AmbientOcclusionApply | LaneKind::ToneMap | LaneKind::Ui => {
                TargetLayout::color(self.back_buffer, 1)
            }
        }
    }
}

/// Descriptor slots of every target, fixed for the orchestrator's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetViews {
    /// Multisampled depth.
    pub depth_dsv: DescriptorHandle,
    /// Single-sampled prepass depth.
    pub prepass_depth_dsv: DescriptorHandle,
    /// Prepass depth, read by ambient occlusion.
    pub prepass_depth_srv: DescriptorHandle,
    /// Prepass normals.
    pub normal_rtv: DescriptorHandle,
    /// Prepass normals, read by ambient occlusion.
    pub normal_srv: DescriptorHandle,
    /// Multisampled HDR color.
    pub hdr_msaa_rtv: DescriptorHandle,
    /// Resolved HDR color, read by tone mapping.
    pub hdr_srv: DescriptorHandle,
    /// Ambient occlusion output, read by the color pass.
    pub ambient_occlusion_srv: DescriptorHandle,
    /// Ambient occlusion output, written by the compute pass.
    pub ambient_occlusion_uav: DescriptorHandle,
    /// Ambient occlusion output, read by the debug composite.
    pub ambient_occlusion_apply_srv: DescriptorHandle,
    /// Shadow atlas attachment.
    pub shadow_dsv: DescriptorHandle,
    /// Shadow atlas, read by the color pass.
    pub shadow_srv: DescriptorHandle,
}

impl TargetViews {
    fn allocate(descriptors: &mut DescriptorHeaps) -> Result<Self, RenderError> {
        let dsv = descriptors.allocate_dsv(3)?;
        let rtv = descriptors.allocate_rtv(2)?;
        let srv = descriptors.allocate_cbv_srv_uav(7)?;
        let slot = |table: &DescriptorTable, i: u32| {
            table.handle(i).ok_or_else(|| {
                RenderError::ResourceError(format!("descriptor table too short for slot {i}"))
            })
        };
        Ok(Self {
            depth_dsv: slot(&dsv, 0)?,
            prepass_depth_dsv: slot(&dsv, 1)?,
            shadow_dsv: slot(&dsv, 2)?,
            normal_rtv: slot(&rtv, 0)?,
            hdr_msaa_rtv: slot(&rtv, 1)?,
            prepass_depth_srv: slot(&srv, 0)?,
            normal_srv: slot(&srv, 1)?,
            hdr_srv: slot(&srv, 2)?,
            ambient_occlusion_srv: slot(&srv, 3)?,
            ambient_occlusion_uav: slot(&srv, 4)?,
            ambient_occlusion_apply_srv: slot(&srv, 5)?,
            shadow_srv: slot(&srv, 6)?,
        })
    }
}

/// The window-sized textures, created and destroyed together.
#[derive(Debug)]
struct SizedTargets {
    depth: TrackedTexture,
    prepass_depth: TrackedTexture,
    normal: TrackedTexture,
    hdr_msaa: TrackedTexture,
    hdr: TrackedTexture,
    ambient_occlusion: TrackedTexture,
}

impl SizedTargets {
    fn create(
        device: &dyn GraphicsDevice,
        (width, height): (u32, u32),
        msaa_samples: u32,
    ) -> Result<Self, RenderError> {
        let mut created: Vec<TrackedTexture> = Vec::with_capacity(6);
        let descriptors = [
            TextureDescriptor::new_2d(
                "Depth buffer",
                width,
                height,
                DEPTH_FORMAT,
                TextureUsage::DEPTH_STENCIL,
                ResourceState::DepthWrite,
            )
            .with_samples(msaa_samples),
            TextureDescriptor::new_2d(
                "Depth buffer (Non MSAA)",
                width,
                height,
                DEPTH_FORMAT,
                TextureUsage::DEPTH_STENCIL | TextureUsage::SHADER_RESOURCE,
                ResourceState::DepthWrite,
            ),
            TextureDescriptor::new_2d(
                "Normal buffer",
                width,
                height,
                NORMAL_FORMAT,
                TextureUsage::RENDER_TARGET | TextureUsage::SHADER_RESOURCE,
                ResourceState::RenderTarget,
            ),
            TextureDescriptor::new_2d(
                "HDR MSAA",
                width,
                height,
                HDR_FORMAT,
                TextureUsage::RENDER_TARGET,
                ResourceState::RenderTarget,
            )
            .with_samples(msaa_samples),
            TextureDescriptor::new_2d(
                "HDR",
                width,
                height,
                HDR_FORMAT,
                TextureUsage::RENDER_TARGET | TextureUsage::SHADER_RESOURCE,
                ResourceState::RenderTarget,
            ),
            TextureDescriptor::new_2d(
                "Ambient occlusion",
                width,
                height,
                AMBIENT_OCCLUSION_FORMAT,
                TextureUsage::UNORDERED_ACCESS | TextureUsage::SHADER_RESOURCE,
                ResourceState::GenericRead,
            ),
        ];
        for descriptor in &descriptors {
            match TrackedTexture::create(device, descriptor) {
                Ok(texture) => created.push(texture),
                Err(e) => {
                    for texture in created {
                        texture.destroy(device);
                    }
                    return Err(e);
                }
            }
        }

        let mut textures = created.into_iter();
        let mut next = || {
            textures
                .next()
                .ok_or_else(|| RenderError::ResourceError("missing render target".into()))
        };
        Ok(Self {
            depth: next()?,
            prepass_depth: next()?,
            normal: next()?,
            hdr_msaa: next()?,
            hdr: next()?,
            ambient_occlusion: next()?,
        })
    }

    fn write_views(
        &self,
        device: &dyn GraphicsDevice,
        views: &TargetViews,
    ) -> Result<(), RenderError> {
        let writes = [
            (&self.depth, ViewKind::DepthStencil, views.depth_dsv),
            (&self.prepass_depth, ViewKind::DepthStencil, views.prepass_depth_dsv),
            (&self.prepass_depth, ViewKind::ShaderResource, views.prepass_depth_srv),
            (&self.normal, ViewKind::RenderTarget, views.normal_rtv),
            (&self.normal, ViewKind::ShaderResource, views.normal_srv),
            (&self.hdr_msaa, ViewKind::RenderTarget, views.hdr_msaa_rtv),
            (&self.hdr, ViewKind::ShaderResource, views.hdr_srv),
            (&self.ambient_occlusion, ViewKind::ShaderResource, views.ambient_occlusion_srv),
            (&self.ambient_occlusion, ViewKind::UnorderedAccess, views.ambient_occlusion_uav),
            (
                &self.ambient_occlusion,
                ViewKind::ShaderResource,
                views.ambient_occlusion_apply_srv,
            ),
        ];
        for (texture, kind, handle) in writes {
            device.create_view(texture.id(), kind, handle)?;
        }
        Ok(())
    }

    fn destroy(self, device: &dyn GraphicsDevice) {
        self.ambient_occlusion.destroy(device);
        self.hdr.destroy(device);
        self.hdr_msaa.destroy(device);
        self.normal.destroy(device);
        self.prepass_depth.destroy(device);
        self.depth.destroy(device);
    }
}

/// Every texture the orchestrator renders into, with its tracked state.
///
/// Between frames each target rests in a fixed state: depth buffers in
/// [`DepthWrite`](ResourceState::DepthWrite), color targets in
/// [`RenderTarget`](ResourceState::RenderTarget) and the ambient occlusion
/// output in [`GenericRead`](ResourceState::GenericRead).
#[derive(Debug)]
pub struct RenderTargets {
    views: TargetViews,
    shadow_atlas: TrackedTexture,
    sized: SizedTargets,
    extent: (u32, u32),
    msaa_samples: u32,
}

impl RenderTargets {
    /// Allocates the descriptor slots and creates every target at `extent`.
    pub fn new(
        device: &dyn GraphicsDevice,
        descriptors: &mut DescriptorHeaps,
        config: &RendererConfig,
        extent: (u32, u32),
    ) -> Result<Self, RenderError> {
        let views = TargetViews::allocate(descriptors)?;

        let shadow_atlas = TrackedTexture::create(
            device,
            &TextureDescriptor::new_2d(
                "Shadow atlas",
                config.shadow_atlas_size,
                config.shadow_atlas_size,
                DEPTH_FORMAT,
                TextureUsage::DEPTH_STENCIL | TextureUsage::SHADER_RESOURCE,
                ResourceState::DepthWrite,
            ),
        )?;
        let views_written = device
            .create_view(shadow_atlas.id(), ViewKind::DepthStencil, views.shadow_dsv)
            .and_then(|()| {
                device.create_view(shadow_atlas.id(), ViewKind::ShaderResource, views.shadow_srv)
            });
        if let Err(e) = views_written {
            shadow_atlas.destroy(device);
            return Err(e);
        }

        let sized = match SizedTargets::create(device, extent, config.msaa_samples) {
            Ok(sized) => sized,
            Err(e) => {
                shadow_atlas.destroy(device);
                return Err(e);
            }
        };
        let targets = Self {
            views,
            shadow_atlas,
            sized,
            extent,
            msaa_samples: config.msaa_samples,
        };
        if let Err(e) = targets.sized.write_views(device, &targets.views) {
            targets.destroy(device);
            return Err(e);
        }
        log::info!(
            "Render targets created at {}x{} with {}x MSAA",
            extent.0,
            extent.1,
            targets.msaa_samples
        );
        Ok(targets)
    }

    /// Recreates the window-sized targets at `width` x `height`.
    ///
    /// The caller makes sure the GPU no longer uses the old ones.
    pub fn resize(
        &mut self,
        device: &dyn GraphicsDevice,
        width: u32,
        height: u32,
    ) -> Result<(), RenderError> {
        let sized = SizedTargets::create(device, (width, height), self.msaa_samples)?;
        if let Err(e) = sized.write_views(device, &self.views) {
            sized.destroy(device);
            return Err(e);
        }
        let old = std::mem::replace(&mut self.sized, sized);
        old.destroy(device);
        self.extent = (width, height);
        log::info!("Render targets resized to {}x{}", width, height);
        Ok(())
    }

    /// The fixed descriptor slots.
    pub fn views(&self) -> &TargetViews {
        &self.views
    }

    /// Width and height of the window-sized targets.
    pub fn extent(&self) -> (u32, u32) {
        self.extent
    }

    /// Multisampled depth.
    pub fn depth(&self) -> &TrackedTexture {
        &self.sized.depth
    }

    /// Shadow atlas.
    pub fn shadow_atlas(&self) -> &TrackedTexture {
        &self.shadow_atlas
    }

    /// Mutable access to every target, for recording transitions.
    pub fn textures_mut(&mut self) -> TargetTextures<'_> {
        TargetTextures {
            shadow_atlas: &mut self.shadow_atlas,
            prepass_depth: &mut self.sized.prepass_depth,
            normal: &mut self.sized.normal,
            hdr_msaa: &mut self.sized.hdr_msaa,
            hdr: &mut self.sized.hdr,
            ambient_occlusion: &mut self.sized.ambient_occlusion,
        }
    }

    /// Every target's current tracked state, keyed by label.
    pub fn states(&self) -> Vec<(&str, ResourceState)> {
        [
            &self.shadow_atlas,
            &self.sized.depth,
            &self.sized.prepass_depth,
            &self.sized.normal,
            &self.sized.hdr_msaa,
            &self.sized.hdr,
            &self.sized.ambient_occlusion,
        ]
        .into_iter()
        .map(|texture| (texture.label(), texture.state()))
        .collect()
    }

    /// Destroys every target.
    pub fn destroy(self, device: &dyn GraphicsDevice) {
        self.sized.destroy(device);
        self.shadow_atlas.destroy(device);
    }
}

/// Disjoint mutable borrows of the targets that change state during a frame.
pub struct TargetTextures<'a> {
    /// Shadow atlas.
    pub shadow_atlas: &'a mut TrackedTexture,
    /// Single-sampled prepass depth.
    pub prepass_depth: &'a mut TrackedTexture,
    /// Prepass normals.
    pub normal: &'a mut TrackedTexture,
    /// Multisampled HDR color.
    pub hdr_msaa: &'a mut TrackedTexture,
    /// Resolved HDR color.
    pub hdr: &'a mut TrackedTexture,
    /// Ambient occlusion output.
    pub ambient_occlusion: &'a mut TrackedTexture,
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{DescriptorCategory, DescriptorCounts};
    use cadence_infra::HeadlessDevice;

    fn config() -> RendererConfig {
        RendererConfig {
            shadow_atlas_size: 256,
            ..RendererConfig::default()
        }
    }

    #[test]
    fn test_resize_keeps_descriptor_slots() {
        let device = HeadlessDevice::default();
        let mut descriptors = DescriptorHeaps::new(&device, &DescriptorCounts::default()).unwrap();
        let mut targets = RenderTargets::new(&device, &mut descriptors, &config(), (64, 32)).unwrap();
        assert_eq!(device.live_textures(), 7);

        let views = *targets.views();
        let old_depth = targets.depth().id();
        let atlas = targets.shadow_atlas().id();
        targets.resize(&device, 128, 64).unwrap();

        assert_eq!(*targets.views(), views);
        assert_ne!(targets.depth().id(), old_depth);
        assert_eq!(targets.shadow_atlas().id(), atlas);
        assert_eq!(targets.extent(), (128, 64));
        assert_eq!(device.live_textures(), 7);

        targets.destroy(&device);
        assert_eq!(device.live_textures(), 0);
    }

    #[test]
    fn test_targets_start_in_resting_states() {
        let device = HeadlessDevice::default();
        let mut descriptors = DescriptorHeaps::new(&device, &DescriptorCounts::default()).unwrap();
        let targets = RenderTargets::new(&device, &mut descriptors, &config(), (64, 32)).unwrap();

        let states = targets.states();
        assert!(states.contains(&("Shadow atlas", ResourceState::DepthWrite)));
        assert!(states.contains(&("HDR MSAA", ResourceState::RenderTarget)));
        assert!(states.contains(&("Ambient occlusion", ResourceState::GenericRead)));
        assert_eq!(descriptors.heap(DescriptorCategory::DepthStencil).allocated(), 3);
        targets.destroy(&device);
    }

    #[test]
    fn test_layouts_follow_lane_kind() {
        let formats = TargetFormats {
            msaa_samples: 4,
            back_buffer: TextureFormat::Bgra8UnormSrgb,
        };
        assert_eq!(formats.layout(LaneKind::Color).sample_count, 4);
        assert_eq!(formats.layout(LaneKind::Depth).depth_format, Some(DEPTH_FORMAT));
        assert!(formats.layout(LaneKind::Depth).color_formats.is_empty());
        assert_eq!(
            formats.layout(LaneKind::ToneMap).color_formats,
            vec![TextureFormat::Bgra8UnormSrgb]
        );
    }
}
