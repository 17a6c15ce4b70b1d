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

//! Textures that own their resource state.

use cadence_core::{
    CommandEncoder, GraphicsDevice, RenderError, ResourceState, TextureDescriptor, TextureFormat,
    TextureId, TransitionBarrier,
};

/// A texture paired with the state it is currently in.
///
/// Every barrier on a tracked texture goes through [`transition`] or
/// [`transition_batch`], which check the caller's expected state against the
/// tracked one and update it in the same call that records the barrier.
///
/// [`transition`]: TrackedTexture::transition
/// [`transition_batch`]: TrackedTexture::transition_batch
#[derive(Debug)]
pub struct TrackedTexture {
    id: TextureId,
    state: ResourceState,
    label: String,
    width: u32,
    height: u32,
    format: TextureFormat,
    sample_count: u32,
}

impl TrackedTexture {
    /// Creates a texture on the device and starts tracking it.
    pub fn create(
        device: &dyn GraphicsDevice,
        descriptor: &TextureDescriptor,
    ) -> Result<Self, RenderError> {
        let id = device.create_texture(descriptor)?;
        Ok(Self {
            id,
            state: descriptor.initial_state,
            label: descriptor.label.as_deref().unwrap_or("texture").to_string(),
            width: descriptor.width,
            height: descriptor.height,
            format: descriptor.format,
            sample_count: descriptor.sample_count,
        })
    }

    /// Tracks a texture owned elsewhere, such as a swap chain back buffer.
    pub fn adopt(
        id: TextureId,
        state: ResourceState,
        (width, height): (u32, u32),
        format: TextureFormat,
    ) -> Self {
        Self {
            id,
            state,
            label: format!("{id:?}"),
            width,
            height,
            format,
            sample_count: 1,
        }
    }

    /// The device handle.
    pub fn id(&self) -> TextureId {
        self.id
    }

    /// The state the texture is in at this point of the recording.
    pub fn state(&self) -> ResourceState {
        self.state
    }

    /// Debug label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Width and height in texels.
    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Texel format.
    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// Samples per texel.
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Fails unless the texture is in `expected`.
    pub fn require(&self, expected: ResourceState) -> Result<(), RenderError> {
        if self.state != expected {
            return Err(RenderError::InvalidTransition {
                resource: self.id,
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    /// Records a `from -> to` barrier and updates the tracked state.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidTransition`] without recording anything if
    /// the texture is not in `from`.
    pub fn transition(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        from: ResourceState,
        to: ResourceState,
    ) -> Result<(), RenderError> {
        self.require(from)?;
        encoder.resource_barrier(&[TransitionBarrier::new(self.id, from, to)]);
        self.state = to;
        Ok(())
    }

    /// Records one batch of barriers for several textures.
    ///
    /// Either every texture is in its expected state and the whole batch is
    /// recorded, or nothing is recorded and no state changes.
    pub fn transition_batch<const N: usize>(
        encoder: &mut dyn CommandEncoder,
        requests: [(&mut TrackedTexture, ResourceState, ResourceState); N],
    ) -> Result<(), RenderError> {
        for (texture, from, _) in &requests {
            texture.require(*from)?;
        }
        let barriers = requests
            .each_ref()
            .map(|(texture, from, to)| TransitionBarrier::new(texture.id, *from, *to));
        encoder.resource_barrier(&barriers);
        for (texture, _, to) in requests {
            texture.state = to;
        }
        Ok(())
    }

    /// Destroys the texture on the device.
    pub fn destroy(self, device: &dyn GraphicsDevice) {
        if let Err(e) = device.destroy_texture(self.id) {
            log::warn!(
                "TrackedTexture({}): Failed to destroy texture: {:?}",
                self.label,
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::TextureUsage;
    use cadence_infra::{DeviceEvent, HeadlessDevice, RecordedCommand};

    fn texture(device: &HeadlessDevice, state: ResourceState) -> TrackedTexture {
        TrackedTexture::create(
            device,
            &TextureDescriptor::new_2d(
                "tracked",
                4,
                4,
                TextureFormat::Rgba16Float,
                TextureUsage::RENDER_TARGET | TextureUsage::SHADER_RESOURCE,
                state,
            ),
        )
        .unwrap()
    }

    #[test]
    fn test_transition_updates_state() {
        let device = HeadlessDevice::default();
        let mut hdr = texture(&device, ResourceState::RenderTarget);
        let cb = device.create_command_buffer("cb").unwrap();
        let mut encoder = device.begin_command_buffer(cb).unwrap();

        hdr.transition(
            encoder.as_mut(),
            ResourceState::RenderTarget,
            ResourceState::PixelShaderResource,
        )
        .unwrap();
        assert_eq!(hdr.state(), ResourceState::PixelShaderResource);

        let err = hdr
            .transition(
                encoder.as_mut(),
                ResourceState::RenderTarget,
                ResourceState::ResolveDest,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::InvalidTransition {
                expected: ResourceState::RenderTarget,
                actual: ResourceState::PixelShaderResource,
                ..
            }
        ));
        assert!(encoder.close().is_ok());
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let device = HeadlessDevice::default();
        let mut a = texture(&device, ResourceState::RenderTarget);
        let mut b = texture(&device, ResourceState::DepthWrite);
        let cb = device.create_command_buffer("cb").unwrap();
        let mut encoder = device.begin_command_buffer(cb).unwrap();

        let result = TrackedTexture::transition_batch(
            encoder.as_mut(),
            [
                (&mut a, ResourceState::RenderTarget, ResourceState::ResolveDest),
                (&mut b, ResourceState::RenderTarget, ResourceState::ResolveSource),
            ],
        );
        assert!(result.is_err());
        assert_eq!(a.state(), ResourceState::RenderTarget);
        assert_eq!(b.state(), ResourceState::DepthWrite);

        TrackedTexture::transition_batch(
            encoder.as_mut(),
            [
                (&mut a, ResourceState::RenderTarget, ResourceState::ResolveDest),
                (&mut b, ResourceState::DepthWrite, ResourceState::PixelShaderResource),
            ],
        )
        .unwrap();
        let id = encoder.close().unwrap();
        device.submit(&[id]).unwrap();

        let barriers = device
            .events()
            .into_iter()
            .filter(|e| {
                matches!(
                    e,
                    DeviceEvent::Executed {
                        command: RecordedCommand::Barrier(_),
                        ..
                    }
                )
            })
            .count();
        assert_eq!(barriers, 2);
        assert_eq!(device.texture_state(a.id()), Some(ResourceState::ResolveDest));
    }
}
