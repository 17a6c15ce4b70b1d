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

//! Wireframe boxes for debug overlays.

use super::{create_pipeline, release_pipeline};
use crate::{
    constants::WireframeConstants,
    lane::{not_created, DrawContext, LaneContext, LaneInput, RenderLane},
};
use cadence_core::{CommandEncoder, GraphicsDevice, PipelineId, RenderError};
use cadence_data::Suballocation;
use glam::{Mat4, Vec4};

/// Color of scene bounding boxes.
pub const BOUNDING_BOX_COLOR: Vec4 = Vec4::new(1.0, 0.0, 0.0, 1.0);

const CUBE_EDGES: [u16; 24] = [
    0, 1, 1, 3, 3, 2, 2, 0, // -z face
    4, 5, 5, 7, 7, 6, 6, 4, // +z face
    0, 4, 1, 5, 2, 6, 3, 7, // connecting edges
];

/// Draws unit cubes as line lists.
///
/// With [`LaneInput::Wireframe`] it draws the single box it is given;
/// otherwise it draws the bounding box of every scene mesh captured at
/// creation.
#[derive(Debug)]
pub struct WireframeLane {
    label: &'static str,
    scene_boxes: bool,
    pipeline: Option<PipelineId>,
    cube: Option<(Suballocation, Suballocation)>,
    boxes: Vec<Mat4>,
}

impl WireframeLane {
    /// A lane that only draws boxes it is handed.
    pub fn new() -> Self {
        Self {
            label: "Wireframe",
            scene_boxes: false,
            pipeline: None,
            cube: None,
            boxes: Vec::new(),
        }
    }

    /// A lane that draws the scene's bounding boxes.
    pub fn bounding_boxes() -> Self {
        Self {
            label: "Bounding Box",
            scene_boxes: true,
            ..Self::new()
        }
    }

    fn draw_box(
        &self,
        encoder: &mut dyn CommandEncoder,
        ctx: &mut DrawContext<'_>,
        world_view_projection: Mat4,
        color: Vec4,
    ) -> Result<(), RenderError> {
        let Some((vertices, indices)) = self.cube else {
            return Err(not_created(self.label));
        };
        let constants = ctx.push_constants(&WireframeConstants::new(world_view_projection, color))?;
        encoder.bind_constant_buffer(0, constants);
        encoder.set_vertex_buffer(0, vertices.address, vertices.size, 12);
        encoder.set_index_buffer(indices.address, indices.size);
        encoder.draw_indexed(0..CUBE_EDGES.len() as u32, 0, 0..1);
        Ok(())
    }
}

impl Default for WireframeLane {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderLane for WireframeLane {
    fn name(&self) -> &'static str {
        self.label
    }

    fn on_create(&mut self, ctx: &mut LaneContext<'_>) -> Result<(), RenderError> {
        if self.scene_boxes {
            let scene = ctx.scene.ok_or_else(|| {
                RenderError::ResourceError(format!("lane '{}' requires a loaded scene", self.label))
            })?;
            self.boxes = scene.meshes().iter().map(|m| m.bounds_transform()).collect();
        }

        let mut corners = Vec::with_capacity(8 * 3);
        for i in 0..8u32 {
            for bit in [1, 2, 4] {
                corners.push(if i & bit == 0 { -1.0f32 } else { 1.0 });
            }
        }
        let vertices = ctx
            .static_pool
            .allocate_with_data(ctx.device, bytemuck::cast_slice(&corners))?;
        let indices = ctx
            .static_pool
            .allocate_with_data(ctx.device, bytemuck::cast_slice(&CUBE_EDGES))?;
        self.cube = Some((vertices, indices));

        self.pipeline = Some(create_pipeline(
            ctx.device,
            self.label,
            ctx.targets.pipeline_kind(),
        )?);
        Ok(())
    }

    fn on_resize(&mut self, _width: u32, _height: u32) {}

    fn draw(&self, encoder: &mut dyn CommandEncoder, ctx: &mut DrawContext<'_>) -> Result<(), RenderError> {
        let pipeline = self.pipeline.ok_or_else(|| not_created(self.label))?;
        encoder.set_pipeline(pipeline);
        encoder.set_viewport(ctx.viewport);

        let input = ctx.input;
        match input {
            LaneInput::Wireframe { world, color } => self.draw_box(encoder, ctx, world, color),
            _ => {
                let view_projection = ctx.frame.camera.view_projection();
                for bounds in &self.boxes {
                    self.draw_box(encoder, ctx, view_projection * *bounds, BOUNDING_BOX_COLOR)?;
                }
                Ok(())
            }
        }
    }

    fn on_destroy(&mut self, device: &dyn GraphicsDevice) {
        release_pipeline(device, &mut self.pipeline, self.label);
        // Static pool ranges are permanent; only forget them.
        self.cube = None;
        self.boxes.clear();
    }
}
