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

//! Owned, nullable lane slots.
//!
//! Every optional lane lives in a [`LaneSlot`]. Destroying a slot runs the
//! lane's `on_destroy` and empties it, so the same call on an empty slot is a
//! no-op and a lane can never be destroyed twice.

use crate::lane::{DrawContext, LaneContext, RenderLane};
use cadence_core::{CommandEncoder, GraphicsDevice, RenderError};

/// A slot that may hold a created lane.
#[derive(Debug, Default)]
pub struct LaneSlot {
    lane: Option<Box<dyn RenderLane>>,
}

impl LaneSlot {
    /// An empty slot.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Runs `on_create` on `lane` and stores it.
    ///
    /// A lane already in the slot is destroyed first. On failure the new lane
    /// is destroyed and the slot stays empty.
    pub fn create(
        &mut self,
        mut lane: Box<dyn RenderLane>,
        ctx: &mut LaneContext<'_>,
    ) -> Result<(), RenderError> {
        self.destroy(ctx.device);
        if let Err(e) = lane.on_create(ctx) {
            log::error!("Lane '{}' failed to create: {}", lane.name(), e);
            lane.on_destroy(ctx.device);
            return Err(e);
        }
        log::debug!("Lane '{}' created", lane.name());
        self.lane = Some(lane);
        Ok(())
    }

    /// Whether the slot holds no lane.
    pub fn is_empty(&self) -> bool {
        self.lane.is_none()
    }

    /// The lane, if any.
    pub fn get(&self) -> Option<&dyn RenderLane> {
        self.lane.as_deref()
    }

    /// Forwards a resize to the lane, if any.
    pub fn on_resize(&mut self, width: u32, height: u32) {
        if let Some(lane) = self.lane.as_mut() {
            lane.on_resize(width, height);
        }
    }

    /// Draws the lane, if any. Returns whether something was recorded.
    pub fn draw(
        &self,
        encoder: &mut dyn CommandEncoder,
        ctx: &mut DrawContext<'_>,
    ) -> Result<bool, RenderError> {
        match &self.lane {
            Some(lane) => lane.draw(encoder, ctx).map(|()| true),
            None => Ok(false),
        }
    }

    /// Destroys and removes the lane. Safe on an empty slot.
    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        if let Some(mut lane) = self.lane.take() {
            lane.on_destroy(device);
            log::debug!("Lane '{}' destroyed", lane.name());
        }
    }
}

/// The lanes built by the scene loader, one per scene pass.
#[derive(Debug, Default)]
pub struct SceneLanes {
    /// Depth-only pass, used for shadow maps.
    pub depth: LaneSlot,
    /// Single-sample depth and normal prepass.
    pub prepass: LaneSlot,
    /// Multisampled shading pass.
    pub color: LaneSlot,
    /// Bounding box overlay.
    pub bounding_boxes: LaneSlot,
}

impl SceneLanes {
    /// Every slot, in creation order.
    pub fn slots_mut(&mut self) -> [&mut LaneSlot; 4] {
        [
            &mut self.depth,
            &mut self.prepass,
            &mut self.color,
            &mut self.bounding_boxes,
        ]
    }

    /// Whether every slot is empty.
    pub fn is_empty(&self) -> bool {
        self.depth.is_empty()
            && self.prepass.is_empty()
            && self.color.is_empty()
            && self.bounding_boxes.is_empty()
    }

    /// Whether every slot holds a lane.
    pub fn is_complete(&self) -> bool {
        !self.depth.is_empty()
            && !self.prepass.is_empty()
            && !self.color.is_empty()
            && !self.bounding_boxes.is_empty()
    }

    /// Destroys every lane, in reverse creation order.
    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        for slot in self.slots_mut().into_iter().rev() {
            slot.destroy(device);
        }
    }

    /// Forwards a resize to every lane.
    pub fn on_resize(&mut self, width: u32, height: u32) {
        for slot in self.slots_mut() {
            slot.on_resize(width, height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lane::TargetLayout;
    use cadence_core::{DescriptorCounts, TextureFormat};
    use cadence_data::{DescriptorHeaps, StaticBufferPool, UploadHeap};
    use cadence_infra::HeadlessDevice;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct CountingLane {
        destroyed: Arc<AtomicUsize>,
        fail: bool,
    }

    impl RenderLane for CountingLane {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn on_create(&mut self, _ctx: &mut LaneContext<'_>) -> Result<(), RenderError> {
            if self.fail {
                Err(RenderError::ResourceError("boom".into()))
            } else {
                Ok(())
            }
        }

        fn on_resize(&mut self, _width: u32, _height: u32) {}

        fn draw(&self, _: &mut dyn CommandEncoder, _: &mut DrawContext<'_>) -> Result<(), RenderError> {
            Ok(())
        }

        fn on_destroy(&mut self, _device: &dyn GraphicsDevice) {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn with_context(device: &HeadlessDevice, f: impl FnOnce(&mut LaneContext<'_>)) {
        let mut descriptors = DescriptorHeaps::new(device, &DescriptorCounts::default()).unwrap();
        let mut static_pool = StaticBufferPool::new(device, 4096, false).unwrap();
        let mut upload_heap = UploadHeap::new(device, 4096).unwrap();
        let mut ctx = LaneContext {
            device,
            descriptors: &mut descriptors,
            static_pool: &mut static_pool,
            upload_heap: &mut upload_heap,
            scene: None,
            targets: TargetLayout::color(TextureFormat::Rgba16Float, 1),
            extent: (64, 64),
        };
        f(&mut ctx);
    }

    #[test]
    fn test_destroy_runs_once() {
        let device = HeadlessDevice::default();
        let destroyed = Arc::new(AtomicUsize::new(0));
        let mut slot = LaneSlot::empty();
        with_context(&device, |ctx| {
            let lane = CountingLane {
                destroyed: Arc::clone(&destroyed),
                fail: false,
            };
            slot.create(Box::new(lane), ctx).unwrap();
        });
        assert!(!slot.is_empty());

        slot.destroy(&device);
        slot.destroy(&device);
        assert!(slot.is_empty());
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_create_leaves_slot_empty() {
        let device = HeadlessDevice::default();
        let destroyed = Arc::new(AtomicUsize::new(0));
        let mut slot = LaneSlot::empty();
        with_context(&device, |ctx| {
            let lane = CountingLane {
                destroyed: Arc::clone(&destroyed),
                fail: true,
            };
            assert!(slot.create(Box::new(lane), ctx).is_err());
        });
        assert!(slot.is_empty());
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_scene_lanes_destroy_is_idempotent() {
        let device = HeadlessDevice::default();
        let destroyed = Arc::new(AtomicUsize::new(0));
        let mut lanes = SceneLanes::default();
        with_context(&device, |ctx| {
            for slot in [&mut lanes.depth, &mut lanes.color] {
                let lane = CountingLane {
                    destroyed: Arc::clone(&destroyed),
                    fail: false,
                };
                slot.create(Box::new(lane), ctx).unwrap();
            }
        });
        assert!(!lanes.is_empty());
        assert!(!lanes.is_complete());

        lanes.destroy(&device);
        lanes.destroy(&device);
        assert!(lanes.is_empty());
        assert_eq!(destroyed.load(Ordering::SeqCst), 2);
    }
}
