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

//! The stages of a scene load.

use cadence_lanes::LaneKind;

/// One bounded unit of loading work, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LoadStage {
    /// Reopens the staging memory released by the previous load.
    Prepare = 0,
    /// Copies geometry into the static pool and creates the scene container.
    CreateContainer = 1,
    /// Creates the scene textures and records their uploads.
    LoadTextures = 2,
    /// Creates the depth lane used for shadow maps.
    DepthLane = 3,
    /// Creates the depth and normal prepass lane.
    PrepassLane = 4,
    /// Creates the shading lane.
    ColorLane = 5,
    /// Creates the bounding box lane.
    BoundingBoxLane = 6,
    /// Uploads the static pool, flushes and releases the staging memory.
    Finalize = 7,
}

impl LoadStage {
    /// The first stage of every load.
    pub const FIRST: LoadStage = LoadStage::Prepare;

    /// The last stage; advancing past it reaches the terminal state.
    pub const LAST: LoadStage = LoadStage::Finalize;

    /// Position of the stage in `0..=LAST`.
    pub fn index(self) -> u32 {
        self as u32
    }

    /// The stage after this one, or `None` after [`LAST`](Self::LAST).
    pub fn next(self) -> Option<LoadStage> {
        Some(match self {
            LoadStage::Prepare => LoadStage::CreateContainer,
            LoadStage::CreateContainer => LoadStage::LoadTextures,
            LoadStage::LoadTextures => LoadStage::DepthLane,
            LoadStage::DepthLane => LoadStage::PrepassLane,
            LoadStage::PrepassLane => LoadStage::ColorLane,
            LoadStage::ColorLane => LoadStage::BoundingBoxLane,
            LoadStage::BoundingBoxLane => LoadStage::Finalize,
            LoadStage::Finalize => return None,
        })
    }

    /// Human readable name, reported in errors and logs.
    pub fn name(self) -> &'static str {
        match self {
            LoadStage::Prepare => "prepare",
            LoadStage::CreateContainer => "create container",
            LoadStage::LoadTextures => "load textures",
            LoadStage::DepthLane => "depth lane",
            LoadStage::PrepassLane => "prepass lane",
            LoadStage::ColorLane => "color lane",
            LoadStage::BoundingBoxLane => "bounding box lane",
            LoadStage::Finalize => "finalize",
        }
    }

    /// The lane this stage creates, if it creates one.
    pub fn lane_kind(self) -> Option<LaneKind> {
        match self {
            LoadStage::DepthLane => Some(LaneKind::Depth),
            LoadStage::PrepassLane => Some(LaneKind::Prepass),
            LoadStage::ColorLane => Some(LaneKind::Color),
            LoadStage::BoundingBoxLane => Some(LaneKind::BoundingBoxes),
            _ => None,
        }
    }
}

/// How far a load has come, for a progress bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadProgress {
    /// The stage the next `advance` runs.
    pub stage: LoadStage,
    /// `stage / LAST`, in `0.0..=1.0`.
    pub fraction: f32,
}

impl LoadProgress {
    /// Progress when `stage` is the next to run.
    pub fn at(stage: LoadStage) -> Self {
        Self {
            stage,
            fraction: stage.index() as f32 / LoadStage::LAST.index() as f32,
        }
    }
}

/// The outcome of one `advance` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadStep {
    /// More stages remain.
    Continue(LoadProgress),
    /// Nothing is left to do.
    Terminal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stages_are_strictly_increasing() {
        let mut stage = LoadStage::FIRST;
        let mut visited = vec![stage];
        while let Some(next) = stage.next() {
            assert_eq!(next.index(), stage.index() + 1);
            stage = next;
            visited.push(stage);
        }
        assert_eq!(stage, LoadStage::LAST);
        assert_eq!(visited.len(), LoadStage::LAST.index() as usize + 1);
    }

    #[test]
    fn test_progress_fraction() {
        assert_eq!(LoadProgress::at(LoadStage::Prepare).fraction, 0.0);
        assert_eq!(LoadProgress::at(LoadStage::Finalize).fraction, 1.0);
        let color = LoadProgress::at(LoadStage::ColorLane);
        assert!((color.fraction - 5.0 / 7.0).abs() < 1e-6);
    }

    #[test]
    fn test_every_scene_lane_has_a_stage() {
        let kinds: Vec<LaneKind> = [
            LoadStage::DepthLane,
            LoadStage::PrepassLane,
            LoadStage::ColorLane,
            LoadStage::BoundingBoxLane,
        ]
        .into_iter()
        .filter_map(LoadStage::lane_kind)
        .collect();
        assert_eq!(kinds.len(), 4);
        assert!(kinds.iter().all(|kind| kind.needs_scene()));
        assert_eq!(LoadStage::Finalize.lane_kind(), None);
    }
}
