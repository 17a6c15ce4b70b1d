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

//! Frame orchestration.
//!
//! A frame is recorded into two command buffers. The first holds everything
//! up to the MSAA resolve and is submitted before the orchestrator waits for
//! the swap chain; the second composites into the back buffer and is
//! submitted once it is ready.

mod lanes;
mod orchestrator;
mod recorder;
mod targets;

pub use orchestrator::{FrameOrchestrator, FrameStats};
pub use recorder::FRUSTUM_COLOR;
pub use targets::{
    RenderTargets, TargetFormats, TargetTextures, TargetViews, AMBIENT_OCCLUSION_FORMAT,
    DEPTH_FORMAT, HDR_FORMAT, NORMAL_FORMAT,
};
