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

//! Construction of lanes by kind.
//!
//! The orchestrator and the scene loader never name a concrete lane type;
//! they ask a [`LaneFactory`] for a [`LaneKind`] and drive the result through
//! the [`RenderLane`] contract. Swapping the factory swaps every pass.

use crate::{
    lane::RenderLane,
    standard::{
        ComputeKind, ComputeLane, FullscreenEffect, FullscreenLane, MeshLane, MeshPass, SkyKind,
        SkyLane, WireframeLane,
    },
};
use cadence_core::RenderError;
use std::fmt::Debug;

/// Every pass the frame orchestrator schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneKind {
    /// Environment map sky.
    SkyCubemap,
    /// Analytic sky.
    SkyProcedural,
    /// Generic wireframe boxes (light frustums).
    Wireframe,
    /// Ambient occlusion compute.
    AmbientOcclusion,
    /// Ambient occlusion fallback clear.
    AmbientOcclusionClear,
    /// Ambient occlusion debug composite.
    AmbientOcclusionApply,
    /// Tone mapping composite.
    ToneMap,
    /// User interface.
    Ui,
    /// Scene depth, used for shadow maps.
    Depth,
    /// Scene depth and normal prepass.
    Prepass,
    /// Scene shading.
    Color,
    /// Scene bounding boxes.
    BoundingBoxes,
}

impl LaneKind {
    /// Lanes created with the renderer, independent of any scene.
    pub const RENDERER: [LaneKind; 8] = [
        LaneKind::SkyCubemap,
        LaneKind::SkyProcedural,
        LaneKind::Wireframe,
        LaneKind::AmbientOcclusion,
        LaneKind::AmbientOcclusionClear,
        LaneKind::AmbientOcclusionApply,
        LaneKind::ToneMap,
        LaneKind::Ui,
    ];

    /// Whether the lane draws a loaded scene.
    pub fn needs_scene(self) -> bool {
        matches!(
            self,
            LaneKind::Depth | LaneKind::Prepass | LaneKind::Color | LaneKind::BoundingBoxes
        )
    }
}

/// Builds uncreated lanes.
pub trait LaneFactory: Send + Sync + Debug {
    /// A new lane of `kind`; the caller runs its `on_create`.
    fn create(&self, kind: LaneKind) -> Result<Box<dyn RenderLane>, RenderError>;
}

/// The factory for the lanes in [`standard`](crate::standard).
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardLaneFactory;

impl LaneFactory for StandardLaneFactory {
    fn create(&self, kind: LaneKind) -> Result<Box<dyn RenderLane>, RenderError> {
        Ok(match kind {
            LaneKind::SkyCubemap => Box::new(SkyLane::new(SkyKind::Cubemap)),
            LaneKind::SkyProcedural => Box::new(SkyLane::new(SkyKind::Procedural)),
            LaneKind::Wireframe => Box::new(WireframeLane::new()),
            LaneKind::AmbientOcclusion => Box::new(ComputeLane::new(ComputeKind::AmbientOcclusion)),
            LaneKind::AmbientOcclusionClear => {
                Box::new(ComputeLane::new(ComputeKind::ClearAmbientOcclusion))
            }
            LaneKind::AmbientOcclusionApply => {
                Box::new(FullscreenLane::new(FullscreenEffect::ApplyAmbientOcclusion))
            }
            LaneKind::ToneMap => Box::new(FullscreenLane::new(FullscreenEffect::ToneMap)),
            LaneKind::Ui => Box::new(FullscreenLane::new(FullscreenEffect::Ui)),
            LaneKind::Depth => Box::new(MeshLane::new(MeshPass::Depth)),
            LaneKind::Prepass => Box::new(MeshLane::new(MeshPass::Prepass)),
            LaneKind::Color => Box::new(MeshLane::new(MeshPass::Color)),
            LaneKind::BoundingBoxes => Box::new(WireframeLane::bounding_boxes()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_factory_names() {
        let factory = StandardLaneFactory;
        let names: Vec<&str> = [LaneKind::SkyCubemap, LaneKind::SkyProcedural, LaneKind::BoundingBoxes]
            .into_iter()
            .map(|kind| factory.create(kind).unwrap().name())
            .collect();
        assert_eq!(names, vec!["Skydome", "Skydome proc", "Bounding Box"]);
    }

    #[test]
    fn test_scene_lanes_are_flagged() {
        assert!(LaneKind::RENDERER.iter().all(|kind| !kind.needs_scene()));
        assert!(LaneKind::Color.needs_scene());
    }
}
