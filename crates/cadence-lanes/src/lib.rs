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

//! # Cadence Lanes
//!
//! Render lanes are the passes of a frame seen from the outside: shadow,
//! depth, shading, sky, ambient occlusion, tone mapping and UI. This crate
//! defines the [`RenderLane`] contract the orchestrator drives them through,
//! the slots that own them, the scene container they read, and the GPU
//! layout of the constants they share.

#![warn(missing_docs)]

pub mod constants;
pub mod factory;
pub mod lane;
pub mod scene;
pub mod shadow;
pub mod slot;
pub mod standard;

pub use constants::{FrameLights, GpuLight, PerFrameConstants, ShadowCaster};
pub use factory::{LaneFactory, LaneKind, StandardLaneFactory};
pub use lane::{DrawContext, LaneContext, LaneInput, RenderLane, TargetLayout};
pub use scene::{GpuMesh, MemoryScene, MeshData, SceneResources, SceneSource, TextureData};
pub use shadow::{AtlasQuadrant, ShadowAtlas};
pub use slot::{LaneSlot, SceneLanes};
