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

//! The staged scene loader.

use super::stage::{LoadProgress, LoadStage, LoadStep};
use crate::frame_agent::TargetFormats;
use anyhow::Context;
use cadence_core::{GraphicsDevice, RenderError};
use cadence_data::RenderContext;
use cadence_lanes::{LaneContext, LaneFactory, LaneSlot, SceneLanes, SceneResources, SceneSource};

enum LoaderState {
    Idle,
    Loading {
        source: Box<dyn SceneSource>,
        next: LoadStage,
    },
    Ready,
    Aborted(LoadStage),
}

impl std::fmt::Debug for LoaderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoaderState::Idle => f.write_str("Idle"),
            LoaderState::Loading { source, next } => f
                .debug_struct("Loading")
                .field("scene", &source.name())
                .field("next", next)
                .finish(),
            LoaderState::Ready => f.write_str("Ready"),
            LoaderState::Aborted(stage) => f.debug_tuple("Aborted").field(stage).finish(),
        }
    }
}

/// Everything a stage may touch besides the loader itself.
pub struct LoadEnvironment<'a> {
    /// The renderer's pools.
    pub context: &'a mut RenderContext,
    /// Builds the scene lanes.
    pub factory: &'a dyn LaneFactory,
    /// Attachment formats of the scene lanes.
    pub formats: &'a TargetFormats,
    /// Current size of the window-sized targets.
    pub extent: (u32, u32),
}

/// Materializes a scene one stage per call, so the caller can keep drawing a
/// progress indicator between stages.
///
/// The loader owns the scene container and the four scene lanes. Whatever a
/// load has created so far is released by [`unload`](Self::unload), which is
/// safe at any point, including after a failed stage.
#[derive(Debug)]
pub struct SceneLoader {
    state: LoaderState,
    scene: Option<SceneResources>,
    lanes: SceneLanes,
}

impl Default for SceneLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneLoader {
    /// An idle loader.
    pub fn new() -> Self {
        Self {
            state: LoaderState::Idle,
            scene: None,
            lanes: SceneLanes::default(),
        }
    }

    /// Starts loading `source`, unloading any previous scene first.
    pub fn begin(&mut self, source: Box<dyn SceneSource>, context: &mut RenderContext) {
        self.unload(context);
        log::info!("Loading scene '{}'", source.name());
        self.state = LoaderState::Loading {
            source,
            next: LoadStage::FIRST,
        };
    }

    /// Runs the next stage.
    ///
    /// Returns [`LoadStep::Continue`] with the stage the following call will
    /// run, or [`LoadStep::Terminal`] once the last stage is done. An idle or
    /// finished loader is terminal.
    ///
    /// # Errors
    ///
    /// A failing stage yields [`RenderError::LoadAborted`] and leaves the
    /// loader aborted: further calls fail until [`unload`](Self::unload).
    pub fn advance(&mut self, env: &mut LoadEnvironment<'_>) -> Result<LoadStep, RenderError> {
        let (source, stage) = match std::mem::replace(&mut self.state, LoaderState::Idle) {
            LoaderState::Loading { source, next } => (source, next),
            LoaderState::Aborted(stage) => {
                self.state = LoaderState::Aborted(stage);
                return Err(RenderError::ResourceError(format!(
                    "scene load aborted during '{}'; unload before continuing",
                    stage.name()
                )));
            }
            state => {
                self.state = state;
                return Ok(LoadStep::Terminal);
            }
        };

        if let Err(source_error) = self.run(stage, source.as_ref(), env) {
            log::error!(
                "Scene '{}' failed to load during '{}': {:#}",
                source.name(),
                stage.name(),
                source_error
            );
            self.state = LoaderState::Aborted(stage);
            return Err(RenderError::LoadAborted {
                stage: stage.name(),
                source: source_error,
            });
        }
        log::debug!("Scene '{}': stage '{}' done", source.name(), stage.name());

        Ok(match stage.next() {
            Some(next) => {
                self.state = LoaderState::Loading { source, next };
                LoadStep::Continue(LoadProgress::at(next))
            }
            None => {
                log::info!("Scene '{}' loaded", source.name());
                self.state = LoaderState::Ready;
                LoadStep::Terminal
            }
        })
    }

    fn run(
        &mut self,
        stage: LoadStage,
        source: &dyn SceneSource,
        env: &mut LoadEnvironment<'_>,
    ) -> anyhow::Result<()> {
        let context = &mut *env.context;
        let device = context.device.as_ref();
        match stage {
            LoadStage::Prepare => {
                context.upload_heap.reopen(device)?;
                context.static_pool.reopen_staging(device)?;
            }
            LoadStage::CreateContainer => {
                let meshes = source
                    .meshes()
                    .with_context(|| format!("reading meshes of '{}'", source.name()))?;
                self.scene = Some(SceneResources::create(
                    device,
                    &mut context.static_pool,
                    source.name(),
                    &meshes,
                    source.lights(),
                )?);
            }
            LoadStage::LoadTextures => {
                let textures = source
                    .textures()
                    .with_context(|| format!("reading textures of '{}'", source.name()))?;
                let scene = self.scene.as_mut().context("scene container missing")?;
                scene.load_textures(
                    device,
                    &mut context.descriptors,
                    &mut context.upload_heap,
                    &textures,
                )?;
            }
            LoadStage::DepthLane
            | LoadStage::PrepassLane
            | LoadStage::ColorLane
            | LoadStage::BoundingBoxLane => {
                let kind = stage.lane_kind().context("stage creates no lane")?;
                let scene = self.scene.as_ref().context("scene container missing")?;
                let slot: &mut LaneSlot = match stage {
                    LoadStage::DepthLane => &mut self.lanes.depth,
                    LoadStage::PrepassLane => &mut self.lanes.prepass,
                    LoadStage::ColorLane => &mut self.lanes.color,
                    _ => &mut self.lanes.bounding_boxes,
                };
                let lane = env.factory.create(kind)?;
                let mut ctx = LaneContext {
                    device,
                    descriptors: &mut context.descriptors,
                    static_pool: &mut context.static_pool,
                    upload_heap: &mut context.upload_heap,
                    scene: Some(scene),
                    targets: env.formats.layout(kind),
                    extent: env.extent,
                };
                slot.create(lane, &mut ctx)?;
            }
            LoadStage::Finalize => context.finish_uploads()?,
        }
        Ok(())
    }

    /// Destroys every lane and the scene container created so far and
    /// returns to idle. Safe to call at any time, any number of times.
    pub fn unload(&mut self, context: &mut RenderContext) {
        let device = context.device.as_ref();
        let has_resources = self.scene.is_some() || !self.lanes.is_empty();
        if has_resources {
            // Frames in flight may still read the scene.
            if let Err(e) = device.wait_idle() {
                log::warn!("SceneLoader: Failed to wait for the GPU before unloading: {:?}", e);
            }
        }
        if matches!(self.state, LoaderState::Loading { .. } | LoaderState::Aborted(_)) {
            // Copies recorded by a partial load target textures destroyed below.
            context.upload_heap.release(device);
            context.static_pool.free_upload_heap(device);
        }

        self.lanes.destroy(device);
        if let Some(scene) = self.scene.take() {
            log::info!("Scene '{}' unloaded", scene.name());
            scene.destroy(device);
        }
        self.state = LoaderState::Idle;
    }

    /// Whether a load is in progress.
    pub fn is_loading(&self) -> bool {
        matches!(self.state, LoaderState::Loading { .. })
    }

    /// Whether the last load failed and still awaits an unload.
    pub fn is_aborted(&self) -> bool {
        matches!(self.state, LoaderState::Aborted(_))
    }

    /// The stage the next `advance` runs, while loading.
    pub fn progress(&self) -> Option<LoadProgress> {
        match &self.state {
            LoaderState::Loading { next, .. } => Some(LoadProgress::at(*next)),
            _ => None,
        }
    }

    /// The scene and its lanes, once every stage has completed.
    pub fn ready(&self) -> Option<(&SceneResources, &SceneLanes)> {
        match (&self.state, &self.scene) {
            (LoaderState::Ready, Some(scene)) => Some((scene, &self.lanes)),
            _ => None,
        }
    }

    /// The scene lanes, in whatever state the load left them.
    pub fn lanes(&self) -> &SceneLanes {
        &self.lanes
    }

    /// Forwards a window resize to the scene lanes.
    pub fn on_resize(&mut self, width: u32, height: u32) {
        self.lanes.on_resize(width, height);
    }

    /// Releases the lanes and the scene container. The caller has already
    /// waited for the GPU.
    pub fn destroy(mut self, device: &dyn GraphicsDevice) {
        self.lanes.destroy(device);
        if let Some(scene) = self.scene.take() {
            scene.destroy(device);
        }
    }
}
