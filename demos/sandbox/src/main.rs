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

// Cadence sandbox
// Loads a synthetic scene one stage per frame, renders a short camera orbit on
// the headless device and prints the GPU timings of the last frame.

use anyhow::{Context, Result};
use cadence_agents::{FrameOrchestrator, LoadStep};
use cadence_core::{
    AmbientOcclusion, Camera, FrameState, PresentationSurface, RendererConfig, SkyMode, SpotLight,
};
use cadence_infra::{HeadlessDevice, HeadlessSurface};
use cadence_lanes::{MemoryScene, MeshData, StandardLaneFactory, TextureData};
use glam::{Mat4, Quat, Vec3};
use std::sync::Arc;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;
const ORBIT_FRAMES: u32 = 120;

fn demo_scene() -> MemoryScene {
    let mut scene = MemoryScene::new("Cube garden")
        .with_texture(TextureData::solid("Checker", 64, 64, [200, 200, 200, 255]))
        .with_mesh(MeshData::cube(
            "Ground",
            Mat4::from_scale_rotation_translation(
                Vec3::new(10.0, 0.1, 10.0),
                Quat::IDENTITY,
                Vec3::new(0.0, -0.1, 0.0),
            ),
        ));
    for x in -2..=2 {
        for z in -2..=2 {
            let position = Vec3::new(x as f32 * 2.5, 0.5, z as f32 * 2.5);
            scene = scene.with_mesh(MeshData::cube(
                format!("Cube {x},{z}"),
                Mat4::from_translation(position) * Mat4::from_scale(Vec3::splat(0.5)),
            ));
        }
    }
    scene
}

fn frame_at(frame: u32, aspect: f32) -> FrameState {
    let angle = frame as f32 / ORBIT_FRAMES as f32 * std::f32::consts::TAU;
    let eye = Vec3::new(angle.cos() * 12.0, 6.0, angle.sin() * 12.0);
    let spot = |position: Vec3, color: Vec3| {
        SpotLight::looking_at(position, Vec3::ZERO, 50f32.to_radians(), color, 40.0)
    };
    FrameState {
        camera: Camera::look_at(eye, Vec3::ZERO, 60f32.to_radians(), aspect),
        spot_lights: vec![
            spot(Vec3::new(6.0, 8.0, 6.0), Vec3::new(1.0, 0.9, 0.8)),
            spot(Vec3::new(-6.0, 8.0, 6.0), Vec3::new(0.6, 0.7, 1.0)),
            spot(Vec3::new(0.0, 8.0, -8.0), Vec3::ONE),
        ],
        sky: if frame % 2 == 0 {
            SkyMode::Procedural
        } else {
            SkyMode::Cubemap
        },
        ambient_occlusion: AmbientOcclusion::Native,
        draw_light_frustums: frame >= ORBIT_FRAMES / 2,
        ..FrameState::default()
    }
}

fn progress_bar(fraction: f32) -> String {
    let filled = (fraction * 20.0).round() as usize;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(20 - filled.min(20)))
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => RendererConfig::load(&path)
            .with_context(|| format!("loading renderer configuration from {path}"))?,
        None => RendererConfig::from_ron_str(include_str!("../renderer.ron"))
            .context("parsing the built-in renderer configuration")?,
    };

    let device = HeadlessDevice::default();
    let mut surface = HeadlessSurface::new(&device, WIDTH, HEIGHT, config.back_buffer_count)?;
    let mut orchestrator = FrameOrchestrator::new(
        Arc::new(device.clone()),
        &surface,
        config,
        Box::new(StandardLaneFactory),
    )?;

    // --- Stage the scene, rendering a frame between stages ---
    orchestrator.begin_load(Box::new(demo_scene()));
    let aspect = WIDTH as f32 / HEIGHT as f32;
    loop {
        orchestrator.render(&FrameState::default(), &mut surface)?;
        match orchestrator.advance_load()? {
            LoadStep::Continue(progress) => log::info!(
                "Loading {} {:>3.0}% (next: {})",
                progress_bar(progress.fraction),
                progress.fraction * 100.0,
                progress.stage.name()
            ),
            LoadStep::Terminal => break,
        }
    }
    log::info!("Loading {} 100%", progress_bar(1.0));

    // --- Orbit, with a resize halfway through ---
    let mut extent = (WIDTH, HEIGHT);
    for frame in 0..ORBIT_FRAMES {
        if frame == ORBIT_FRAMES / 2 {
            extent = (WIDTH / 2, HEIGHT / 2);
            surface.resize(extent.0, extent.1)?;
            orchestrator.on_resize(extent.0, extent.1)?;
        }
        let stats = orchestrator.render(&frame_at(frame, aspect), &mut surface)?;
        log::debug!(
            "Frame {}: slot {}, {} constant bytes, {} shadow casters",
            stats.frame_number,
            stats.slot,
            stats.constant_bytes_used,
            stats.shadow_casters
        );
    }

    println!(
        "GPU timings after {} frames at {}x{} ({} back buffers):",
        orchestrator.frame_number(),
        extent.0,
        extent.1,
        surface.back_buffer_count()
    );
    for sample in orchestrator.timings() {
        println!("  {:<24} {:>10.2} us", sample.label, sample.microseconds);
    }

    orchestrator.unload();
    orchestrator.destroy();
    surface.destroy();
    Ok(())
}
