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

use anyhow::anyhow;
use cadence_agents::{FrameOrchestrator, LoadStage, LoadStep};
use cadence_core::{DescriptorCounts, FrameState, RenderError, RendererConfig};
use cadence_infra::{HeadlessDevice, HeadlessSurface};
use cadence_lanes::{MemoryScene, MeshData, SceneSource, StandardLaneFactory, TextureData};
use glam::{Mat4, Vec3};
use std::sync::Arc;

fn test_config() -> RendererConfig {
    RendererConfig {
        descriptors: DescriptorCounts {
            cbv: 64,
            srv: 64,
            uav: 16,
            dsv: 8,
            rtv: 16,
            sampler: 4,
        },
        back_buffer_count: 2,
        command_buffers_per_slot: 4,
        constant_arena_size: 3 * (1 << 16),
        static_pool_size: 1 << 20,
        upload_heap_size: 1 << 20,
        shadow_atlas_size: 256,
        msaa_samples: 4,
        timestamps_per_frame: 64,
        use_video_memory: true,
    }
}

fn setup(device: &HeadlessDevice) -> (HeadlessSurface, FrameOrchestrator) {
    let surface = HeadlessSurface::new(device, 320, 180, 2).unwrap();
    let orchestrator = FrameOrchestrator::new(
        Arc::new(device.clone()),
        &surface,
        test_config(),
        Box::new(StandardLaneFactory),
    )
    .unwrap();
    (surface, orchestrator)
}

fn cubes() -> Box<MemoryScene> {
    Box::new(
        MemoryScene::new("cubes")
            .with_mesh(MeshData::cube("left", Mat4::from_translation(Vec3::NEG_X * 2.0)))
            .with_mesh(MeshData::cube("right", Mat4::from_translation(Vec3::X * 2.0)))
            .with_texture(TextureData::solid("albedo", 4, 4, [180, 180, 180, 255])),
    )
}

/// A scene whose texture file is missing.
struct MissingTextureScene;

impl SceneSource for MissingTextureScene {
    fn name(&self) -> &str {
        "missing texture"
    }

    fn textures(&self) -> anyhow::Result<Vec<TextureData>> {
        Err(anyhow!("file 'albedo.png' not found"))
    }

    fn meshes(&self) -> anyhow::Result<Vec<MeshData>> {
        Ok(vec![MeshData::cube("cube", Mat4::IDENTITY)])
    }
}

#[test]
fn test_load_reaches_terminal_in_eight_steps() {
    // --- 1. Setup ---
    let device = HeadlessDevice::default();
    let (mut surface, mut orchestrator) = setup(&device);
    orchestrator.begin_load(cubes());
    assert_eq!(
        orchestrator.loader().progress().map(|p| p.stage),
        Some(LoadStage::Prepare)
    );

    // --- 2. Seven stages continue, the eighth finishes ---
    let mut fractions = Vec::new();
    for _ in 0..7 {
        match orchestrator.advance_load().unwrap() {
            LoadStep::Continue(progress) => fractions.push(progress.fraction),
            LoadStep::Terminal => panic!("load finished early"),
        }
        assert!(orchestrator.loader().ready().is_none());
    }
    assert_eq!(orchestrator.advance_load().unwrap(), LoadStep::Terminal);
    assert!(fractions.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(fractions.last().copied(), Some(1.0));

    // --- 3. The scene is drawable and the staging memory is gone ---
    let (scene, lanes) = orchestrator.loader().ready().unwrap();
    assert_eq!(scene.name(), "cubes");
    assert!(lanes.is_complete());
    assert!(orchestrator.context().upload_heap.is_released());

    // Further advances are no-ops.
    assert_eq!(orchestrator.advance_load().unwrap(), LoadStep::Terminal);
    orchestrator
        .render(&FrameState::default(), &mut surface)
        .unwrap();

    orchestrator.destroy();
    surface.destroy();
}

#[test]
fn test_frames_render_between_stages() {
    let device = HeadlessDevice::default();
    let (mut surface, mut orchestrator) = setup(&device);
    orchestrator.begin_load(cubes());

    loop {
        // A partially loaded scene is never drawn.
        orchestrator
            .render(&FrameState::default(), &mut surface)
            .unwrap();
        if orchestrator.advance_load().unwrap() == LoadStep::Terminal {
            break;
        }
    }
    orchestrator
        .render(&FrameState::default(), &mut surface)
        .unwrap();

    orchestrator.destroy();
    surface.destroy();
}

#[test]
fn test_unload_at_every_stage() {
    let device = HeadlessDevice::default();
    let (mut surface, mut orchestrator) = setup(&device);
    let textures = device.live_textures();
    let buffers = device.live_buffers();
    let pipelines = device.live_pipelines();

    for stages in 0..=8 {
        orchestrator.begin_load(cubes());
        for _ in 0..stages {
            orchestrator.advance_load().unwrap();
        }

        orchestrator.unload();
        orchestrator.unload();

        let loader = orchestrator.loader();
        assert!(loader.lanes().is_empty(), "lanes left after {stages} stages");
        assert!(loader.ready().is_none());
        assert!(!loader.is_loading());
        assert!(orchestrator.context().upload_heap.is_released());
        assert_eq!(device.live_textures(), textures);
        assert_eq!(device.live_buffers(), buffers);
        assert_eq!(device.live_pipelines(), pipelines);

        orchestrator
            .render(&FrameState::default(), &mut surface)
            .unwrap();
    }

    orchestrator.destroy();
    surface.destroy();
}

#[test]
fn test_missing_asset_aborts_load() {
    // --- 1. Setup ---
    let device = HeadlessDevice::default();
    let (mut surface, mut orchestrator) = setup(&device);
    orchestrator.begin_load(Box::new(MissingTextureScene));

    // --- 2. The texture stage fails ---
    assert!(matches!(
        orchestrator.advance_load(),
        Ok(LoadStep::Continue(_))
    ));
    assert!(matches!(
        orchestrator.advance_load(),
        Ok(LoadStep::Continue(_))
    ));
    match orchestrator.advance_load() {
        Err(RenderError::LoadAborted { stage, source }) => {
            assert_eq!(stage, LoadStage::LoadTextures.name());
            assert!(format!("{source:#}").contains("albedo.png"));
        }
        other => panic!("expected an aborted load, got {other:?}"),
    }
    assert!(orchestrator.loader().is_aborted());
    assert!(orchestrator.advance_load().is_err());

    // --- 3. Frames still render, and unloading recovers ---
    orchestrator
        .render(&FrameState::default(), &mut surface)
        .unwrap();
    orchestrator.unload();
    assert!(!orchestrator.loader().is_aborted());
    assert!(orchestrator.loader().lanes().is_empty());

    orchestrator.begin_load(cubes());
    while let LoadStep::Continue(_) = orchestrator.advance_load().unwrap() {}
    assert!(orchestrator.loader().ready().is_some());

    orchestrator.destroy();
    surface.destroy();
}

#[test]
fn test_begin_load_replaces_loaded_scene() {
    let device = HeadlessDevice::default();
    let (mut surface, mut orchestrator) = setup(&device);
    orchestrator.begin_load(cubes());
    while let LoadStep::Continue(_) = orchestrator.advance_load().unwrap() {}
    let textures = device.live_textures();

    orchestrator.begin_load(cubes());
    assert!(orchestrator.loader().ready().is_none());
    assert!(orchestrator.loader().lanes().is_empty());
    while let LoadStep::Continue(_) = orchestrator.advance_load().unwrap() {}
    assert_eq!(device.live_textures(), textures);

    orchestrator
        .render(&FrameState::default(), &mut surface)
        .unwrap();
    orchestrator.destroy();
    surface.destroy();
}
