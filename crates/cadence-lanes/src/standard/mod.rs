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

//! The lanes the default [`LaneFactory`](crate::LaneFactory) builds.
//!
//! They carry no shading logic of their own: each creates its pipeline and
//! static data, then records the bindings and draw or dispatch calls of its
//! pass in the order a real implementation would.

mod compute;
mod fullscreen;
mod mesh;
mod sky;
mod wireframe;

pub use compute::{ComputeKind, ComputeLane};
pub use fullscreen::{FullscreenEffect, FullscreenLane};
pub use mesh::{MeshLane, MeshPass};
pub use sky::{SkyKind, SkyLane};
pub use wireframe::WireframeLane;

use cadence_core::{GraphicsDevice, PipelineDescriptor, PipelineId, PipelineKind, RenderError};

fn create_pipeline(
    device: &dyn GraphicsDevice,
    label: &'static str,
    kind: PipelineKind,
) -> Result<PipelineId, RenderError> {
    device.create_pipeline(&PipelineDescriptor {
        label: label.into(),
        kind,
    })
}

fn release_pipeline(device: &dyn GraphicsDevice, pipeline: &mut Option<PipelineId>, lane: &str) {
    if let Some(id) = pipeline.take() {
        if let Err(e) = device.destroy_pipeline(id) {
            log::warn!("{}: Failed to destroy pipeline: {:?}", lane, e);
        }
    }
}
