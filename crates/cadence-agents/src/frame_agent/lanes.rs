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

//! The lanes that exist for the orchestrator's whole lifetime.

use cadence_core::GraphicsDevice;
use cadence_lanes::{LaneKind, LaneSlot};

/// Slots for every lane in [`LaneKind::RENDERER`].
#[derive(Debug, Default)]
pub(crate) struct RendererLanes {
    pub sky_cubemap: LaneSlot,
    pub sky_procedural: LaneSlot,
    pub wireframe: LaneSlot,
    pub ambient_occlusion: LaneSlot,
    pub ambient_occlusion_clear: LaneSlot,
    pub ambient_occlusion_apply: LaneSlot,
    pub tone_map: LaneSlot,
    pub ui: LaneSlot,
}

impl RendererLanes {
    /// The slot of `kind`, or `None` for scene lanes.
    pub fn slot_mut(&mut self, kind: LaneKind) -> Option<&mut LaneSlot> {
        Some(match kind {
            LaneKind::SkyCubemap => &mut self.sky_cubemap,
            LaneKind::SkyProcedural => &mut self.sky_procedural,
            LaneKind::Wireframe => &mut self.wireframe,
            LaneKind::AmbientOcclusion => &mut self.ambient_occlusion,
            LaneKind::AmbientOcclusionClear => &mut self.ambient_occlusion_clear,
            LaneKind::AmbientOcclusionApply => &mut self.ambient_occlusion_apply,
            LaneKind::ToneMap => &mut self.tone_map,
            LaneKind::Ui => &mut self.ui,
            LaneKind::Depth | LaneKind::Prepass | LaneKind::Color | LaneKind::BoundingBoxes => {
                return None
            }
        })
    }

    pub fn slots_mut(&mut self) -> [&mut LaneSlot; 8] {
        [
            &mut self.sky_cubemap,
            &mut self.sky_procedural,
            &mut self.wireframe,
            &mut self.ambient_occlusion,
            &mut self.ambient_occlusion_clear,
            &mut self.ambient_occlusion_apply,
            &mut self.tone_map,
            &mut self.ui,
        ]
    }

    pub fn on_resize(&mut self, width: u32, height: u32) {
        for slot in self.slots_mut() {
            slot.on_resize(width, height);
        }
    }

    /// Destroys every lane, last created first.
    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        for slot in self.slots_mut().into_iter().rev() {
            slot.destroy(device);
        }
    }
}
