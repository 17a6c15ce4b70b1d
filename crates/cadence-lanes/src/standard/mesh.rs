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

//! Passes that draw the loaded scene's meshes.

use super::{create_pipeline, release_pipeline};
use crate::{
    constants::{ObjectConstants, ShadowPassConstants},
    lane::{not_created, DrawContext, LaneContext, LaneInput, RenderLane},
    scene::GpuMesh,
};
use cadence_core::{CommandEncoder, DescriptorHandle, GraphicsDevice, PipelineId, RenderError};

/// Which scene pass a [`MeshLane`] implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshPass {
    /// Depth only; renders shadow maps.
    Depth,
    /// Single-sample depth and normals for ambient occlusion.
    Prepass,
    /// Multisampled shading.
    Color,
}

/// Draws every mesh of the scene with one pipeline.
#[derive(Debug)]
pub struct MeshLane {
    pass: MeshPass,
    pipeline: Option<PipelineId>,
    meshes: Vec<GpuMesh>,
    textures: Option<DescriptorHandle>,
}

impl MeshLane {
    /// An uncreated lane for `pass`.
    pub fn new(pass: MeshPass) -> Self {
        Self {
            pass,
            pipeline: None,
            meshes: Vec::new(),
            textures: None,
        }
    }

    /// The pass this lane implements.
    pub fn pass(&self) -> MeshPass {
        self.pass
    }
}

impl RenderLane for MeshLane {
    fn name(&self) -> &'static str {
        match self.pass {
            MeshPass::Depth => "Depth",
            MeshPass::Prepass => "Prepass (Non MSAA)",
            MeshPass::Color => "Scene",
        }
    }

    fn on_create(&mut self, ctx: &mut LaneContext<'_>) -> Result<(), RenderError> {
        let scene = ctx.scene.ok_or_else(|| {
            RenderError::ResourceError(format!("lane '{}' requires a loaded scene", self.name()))
        })?;
        self.pipeline = Some(create_pipeline(
            ctx.device,
            self.name(),
            ctx.targets.pipeline_kind(),
        )?);
        self.meshes = scene.meshes().to_vec();
        self.textures = scene.texture_table().map(|table| table.first());
        Ok(())
    }

    fn on_resize(&mut self, _width: u32, _height: u32) {}

    fn draw(&self, encoder: &mut dyn CommandEncoder, ctx: &mut DrawContext<'_>) -> Result<(), RenderError> {
        let pipeline = self.pipeline.ok_or_else(|| not_created(self.name()))?;
        encoder.set_pipeline(pipeline);
        encoder.set_viewport(ctx.viewport);

        let input = ctx.input;
        let camera = match input {
            LaneInput::Shadow(caster) => ctx.push_constants(&ShadowPassConstants {
                view_projection: caster.view_projection.to_cols_array_2d(),
            })?,
            _ => ctx.per_frame,
        };
        encoder.bind_constant_buffer(0, camera);
        if let Some(textures) = self.textures {
            encoder.bind_descriptor_table(2, textures);
        }
        for (slot, input) in (3..).zip(ctx.inputs) {
            encoder.bind_descriptor_table(slot, *input);
        }

        for mesh in &self.meshes {
            let object = ctx.push_constants(&ObjectConstants {
                world: mesh.world.to_cols_array_2d(),
            })?;
            encoder.bind_constant_buffer(1, object);
            encoder.set_vertex_buffer(
                0,
                mesh.vertices.address,
                mesh.vertices.size,
                mesh.vertex_stride,
            );
            encoder.set_index_buffer(mesh.indices.address, mesh.indices.size);
            encoder.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
        Ok(())
    }

    fn on_destroy(&mut self, device: &dyn GraphicsDevice) {
        let name = self.name();
        release_pipeline(device, &mut self.pipeline, name);
        self.meshes.clear();
        self.textures = None;
    }
}
