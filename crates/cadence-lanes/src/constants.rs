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

//! GPU-layout constant structures.
//!
//! Every struct here is `#[repr(C)]` and [`Pod`] so it can be copied straight
//! into the constant ring.

use bytemuck::{Pod, Zeroable};
use cadence_core::{FrameState, LightKind, SceneLight, SpotLight, MAX_LIGHTS, MAX_SHADOW_CASTERS};
use glam::{Mat4, Vec3, Vec4};

/// Range given to spot lights that come from the frame description.
pub const SPOT_LIGHT_RANGE: f32 = 15.0;
/// Depth bias of shadow-casting lights.
pub const SHADOW_DEPTH_BIAS: f32 = 70e-5;

/// One light as the shading lanes read it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuLight {
    /// Light view-projection, used for shadow lookups.
    pub view_projection: [[f32; 4]; 4],
    /// Direction the light points to.
    pub direction: [f32; 3],
    /// Attenuation range in meters.
    pub range: f32,
    /// Linear color.
    pub color: [f32; 3],
    /// Intensity multiplier.
    pub intensity: f32,
    /// World position.
    pub position: [f32; 3],
    /// Cosine of the inner cone angle.
    pub inner_cone_cos: f32,
    /// Cosine of the outer cone angle.
    pub outer_cone_cos: f32,
    /// [`LightKind`] as an integer.
    pub kind: u32,
    /// Shadow depth bias.
    pub depth_bias: f32,
    /// Atlas quadrant index, `-1` for no shadow.
    pub shadow_map_index: i32,
}

impl GpuLight {
    fn from_spot(light: &SpotLight) -> Self {
        Self {
            view_projection: light.view_projection().to_cols_array_2d(),
            direction: light.direction.to_array(),
            range: SPOT_LIGHT_RANGE,
            color: light.color.to_array(),
            intensity: light.intensity,
            position: light.position.to_array(),
            inner_cone_cos: (light.fov_y * 0.9 / 2.0).cos(),
            outer_cone_cos: (light.fov_y / 2.0).cos(),
            kind: LightKind::Spot as u32,
            depth_bias: 0.0,
            shadow_map_index: -1,
        }
    }

    fn from_scene(light: &SceneLight) -> Self {
        Self {
            view_projection: light.view_projection.to_cols_array_2d(),
            direction: light.direction.to_array(),
            range: light.range,
            color: light.color.to_array(),
            intensity: light.intensity,
            position: light.position.to_array(),
            inner_cone_cos: light.inner_cone_cos,
            outer_cone_cos: light.outer_cone_cos,
            kind: light.kind as u32,
            depth_bias: 0.0,
            shadow_map_index: -1,
        }
    }
}

/// The constants every lane of a frame shares.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PerFrameConstants {
    /// Camera view-projection.
    pub camera_view_projection: [[f32; 4]; 4],
    /// Its inverse.
    pub inverse_view_projection: [[f32; 4]; 4],
    /// Camera world position, `w = 1`.
    pub camera_position: [f32; 4],
    /// Image-based lighting factor.
    pub ibl_factor: f32,
    /// Emissive factor.
    pub emissive_factor: f32,
    /// `1 / width`, `1 / height`.
    pub inverse_resolution: [f32; 2],
    /// Number of valid entries in `lights`.
    pub light_count: u32,
    /// Padding to a 16 byte boundary.
    pub _padding: [u32; 3],
    /// Lights, only the first `light_count` are read.
    pub lights: [GpuLight; MAX_LIGHTS],
}

/// A light that renders into the shadow atlas this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowCaster {
    /// Atlas quadrant.
    pub shadow_index: usize,
    /// Index into the frame's light list.
    pub light_index: usize,
    /// Light view-projection.
    pub view_projection: Mat4,
}

/// The lighting of one frame: shader constants plus what the orchestrator
/// needs to schedule shadow and frustum draws.
#[derive(Debug, Clone)]
pub struct FrameLights {
    /// The constants to upload.
    pub constants: PerFrameConstants,
    /// Lights that got an atlas quadrant, in assignment order.
    pub shadow_casters: Vec<ShadowCaster>,
    /// View-projection of every light, in light order.
    pub light_view_projections: Vec<Mat4>,
}

impl FrameLights {
    /// Builds the frame constants for a `width` x `height` target.
    ///
    /// Scene lights win over the frame's spot lights when the scene has any.
    /// Spot lights get atlas quadrants in order until the atlas is full.
    pub fn build(frame: &FrameState, scene_lights: &[SceneLight], width: u32, height: u32) -> Self {
        let mut lights: Vec<GpuLight> = if scene_lights.is_empty() {
            frame.spot_lights.iter().map(GpuLight::from_spot).collect()
        } else {
            scene_lights.iter().map(GpuLight::from_scene).collect()
        };
        if lights.len() > MAX_LIGHTS {
            log::warn!(
                "Frame has {} lights, only the first {} are used",
                lights.len(),
                MAX_LIGHTS
            );
            lights.truncate(MAX_LIGHTS);
        }

        let mut shadow_casters = Vec::new();
        for (light_index, light) in lights.iter_mut().enumerate() {
            if light.kind != LightKind::Spot as u32 || shadow_casters.len() >= MAX_SHADOW_CASTERS {
                continue;
            }
            light.shadow_map_index = shadow_casters.len() as i32;
            light.depth_bias = SHADOW_DEPTH_BIAS;
            shadow_casters.push(ShadowCaster {
                shadow_index: shadow_casters.len(),
                light_index,
                view_projection: Mat4::from_cols_array_2d(&light.view_projection),
            });
        }

        let view_projection = frame.camera.view_projection();
        let mut constants = PerFrameConstants {
            camera_view_projection: view_projection.to_cols_array_2d(),
            inverse_view_projection: view_projection.inverse().to_cols_array_2d(),
            camera_position: frame.camera.position.extend(1.0).to_array(),
            ibl_factor: frame.ibl_factor,
            emissive_factor: frame.emissive_factor,
            inverse_resolution: [1.0 / width.max(1) as f32, 1.0 / height.max(1) as f32],
            light_count: lights.len() as u32,
            _padding: [0; 3],
            lights: [GpuLight::zeroed(); MAX_LIGHTS],
        };
        constants.lights[..lights.len()].copy_from_slice(&lights);

        let light_view_projections = lights
            .iter()
            .map(|light| Mat4::from_cols_array_2d(&light.view_projection))
            .collect();

        Self {
            constants,
            shadow_casters,
            light_view_projections,
        }
    }
}

/// Per-object constants of mesh lanes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ObjectConstants {
    /// Object to world.
    pub world: [[f32; 4]; 4],
}

/// View-projection override of a shadow draw.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ShadowPassConstants {
    /// Light view-projection.
    pub view_projection: [[f32; 4]; 4],
}

/// Constants of a wireframe box.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct WireframeConstants {
    /// Unit cube to clip space.
    pub world_view_projection: [[f32; 4]; 4],
    /// Line color.
    pub color: [f32; 4],
}

impl WireframeConstants {
    /// Packs a transform and a color.
    pub fn new(world_view_projection: Mat4, color: Vec4) -> Self {
        Self {
            world_view_projection: world_view_projection.to_cols_array_2d(),
            color: color.to_array(),
        }
    }
}

/// Constants of the tone-mapping lane.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ToneMapConstants {
    /// Exposure multiplier.
    pub exposure: f32,
    /// Operator index.
    pub tone_mapper: u32,
    /// Padding.
    pub _padding: [u32; 2],
}

/// Constants of the ambient occlusion compute lane.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct AmbientOcclusionConstants {
    /// Size of the output in pixels.
    pub output_size: [u32; 2],
    /// `1` for the half resolution variant.
    pub downsampled: u32,
    /// Padding.
    pub _padding: u32,
}

/// Constants of the cubemap sky.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SkyConstants {
    /// Clip space to world, for view ray reconstruction.
    pub inverse_view_projection: [[f32; 4]; 4],
}

/// Constants of the analytic atmosphere.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ProceduralSkyConstants {
    /// Clip space to world.
    pub inverse_view_projection: [[f32; 4]; 4],
    /// Direction towards the sun.
    pub sun_direction: [f32; 3],
    /// Haze amount.
    pub turbidity: f32,
    /// Rayleigh scattering scale.
    pub rayleigh: f32,
    /// Mie scattering coefficient.
    pub mie_coefficient: f32,
    /// Mie phase asymmetry.
    pub mie_directional_g: f32,
    /// Output luminance.
    pub luminance: f32,
}

impl ProceduralSkyConstants {
    /// The fixed daytime atmosphere seen from `inverse_view_projection`.
    pub fn new(inverse_view_projection: Mat4) -> Self {
        Self {
            inverse_view_projection: inverse_view_projection.to_cols_array_2d(),
            sun_direction: Vec3::new(1.0, 0.05, 0.0).to_array(),
            turbidity: 10.0,
            rayleigh: 2.0,
            mie_coefficient: 0.005,
            mie_directional_g: 0.8,
            luminance: 1.0,
        }
    }
}
