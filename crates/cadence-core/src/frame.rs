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

//! Per-frame state supplied by the caller.
//!
//! A [`FrameState`] is rebuilt by the application every frame and read, never
//! retained, by the orchestrator.

use glam::{Mat4, Vec3};

/// Maximum number of lights uploaded per frame.
pub const MAX_LIGHTS: usize = 32;

/// Maximum number of spot lights that receive a shadow map.
pub const MAX_SHADOW_CASTERS: usize = 4;

/// Camera transforms for the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// World to view transform.
    pub view: Mat4,
    /// View to clip transform.
    pub projection: Mat4,
    /// World-space eye position.
    pub position: Vec3,
}

impl Camera {
    /// A right-handed perspective camera at `eye` looking at `target`.
    pub fn look_at(eye: Vec3, target: Vec3, fov_y: f32, aspect: f32) -> Self {
        Self {
            view: Mat4::look_at_rh(eye, target, Vec3::Y),
            projection: Mat4::perspective_rh(fov_y, aspect, 0.1, 1000.0),
            position: eye,
        }
    }

    /// World to clip transform.
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::look_at(
            Vec3::new(0.0, 2.0, 5.0),
            Vec3::ZERO,
            60f32.to_radians(),
            16.0 / 9.0,
        )
    }
}

/// Light types, numbered the way the shaders expect them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum LightKind {
    /// Infinitely distant light.
    Directional = 0,
    /// Omnidirectional light.
    Point = 1,
    /// Cone light; the only kind that can cast shadows into the atlas.
    Spot = 2,
}

/// A light authored in the loaded scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneLight {
    /// Light type.
    pub kind: LightKind,
    /// World-space position.
    pub position: Vec3,
    /// World-space direction the light points in.
    pub direction: Vec3,
    /// Linear RGB color.
    pub color: Vec3,
    /// Intensity multiplier.
    pub intensity: f32,
    /// Attenuation range in meters.
    pub range: f32,
    /// Cosine of the inner cone angle.
    pub inner_cone_cos: f32,
    /// Cosine of the outer cone angle.
    pub outer_cone_cos: f32,
    /// World to light clip transform, used for shadows and frustum overlays.
    pub view_projection: Mat4,
}

/// A spot light controlled by the application rather than the scene.
///
/// Used whenever the loaded scene has no lights of its own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    /// World to light view transform.
    pub view: Mat4,
    /// Light view to clip transform.
    pub projection: Mat4,
    /// World-space position.
    pub position: Vec3,
    /// World-space direction.
    pub direction: Vec3,
    /// Vertical field of view in radians; drives the cone angles.
    pub fov_y: f32,
    /// Linear RGB color.
    pub color: Vec3,
    /// Intensity multiplier.
    pub intensity: f32,
}

impl SpotLight {
    /// A spot light at `position` aimed at `target`.
    pub fn looking_at(position: Vec3, target: Vec3, fov_y: f32, color: Vec3, intensity: f32) -> Self {
        let direction = (target - position).normalize_or_zero();
        let up = if direction.abs_diff_eq(Vec3::Y, 1e-4) || direction.abs_diff_eq(-Vec3::Y, 1e-4)
        {
            Vec3::Z
        } else {
            Vec3::Y
        };
        Self {
            view: Mat4::look_at_rh(position, target, up),
            projection: Mat4::perspective_rh(fov_y, 1.0, 0.1, 100.0),
            position,
            direction,
            fov_y,
            color,
            intensity,
        }
    }

    /// World to light clip transform.
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// Tone mapping operators, in the order the tone-mapping shader indexes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum ToneMapper {
    /// Timothy Lottes' operator.
    Timothy = 0,
    /// The DX11 DSK operator.
    Dx11Dsk = 1,
    /// Reinhard.
    Reinhard = 2,
    /// Uncharted 2 filmic curve.
    Uncharted2 = 3,
    /// ACES filmic approximation.
    #[default]
    AcesFilmic = 4,
    /// Exposure only.
    None = 5,
}

impl ToneMapper {
    /// Index passed to the tone-mapping lane.
    pub fn index(self) -> u32 {
        self as u32
    }
}

/// Which sky, if any, is drawn behind the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SkyMode {
    /// Prefiltered environment cubemap.
    Cubemap,
    /// Analytic atmosphere.
    #[default]
    Procedural,
    /// No sky.
    None,
}

/// Ambient occlusion mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AmbientOcclusion {
    /// Output is cleared to 1 (no occlusion).
    Disabled,
    /// Computed at full resolution.
    #[default]
    Native,
    /// Computed at half resolution and upsampled.
    Downsampled,
}

impl AmbientOcclusion {
    /// Whether the effect pass runs at all.
    pub fn is_enabled(self) -> bool {
        !matches!(self, AmbientOcclusion::Disabled)
    }
}

/// Everything the caller decides about a single frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameState {
    /// The camera.
    pub camera: Camera,
    /// Application spot lights, in priority order.
    pub spot_lights: Vec<SpotLight>,
    /// Exposure applied before tone mapping.
    pub exposure: f32,
    /// Tone mapping operator.
    pub tone_mapper: ToneMapper,
    /// Image based lighting contribution.
    pub ibl_factor: f32,
    /// Emissive contribution.
    pub emissive_factor: f32,
    /// Sky selection.
    pub sky: SkyMode,
    /// Ambient occlusion mode.
    pub ambient_occlusion: AmbientOcclusion,
    /// Composite the raw AO buffer instead of the tone-mapped image.
    pub display_ao_directly: bool,
    /// Draw scene bounding boxes.
    pub draw_bounding_boxes: bool,
    /// Draw one wireframe frustum per light.
    pub draw_light_frustums: bool,
}

impl Default for FrameState {
    fn default() -> Self {
        Self {
            camera: Camera::default(),
            spot_lights: Vec::new(),
            exposure: 1.0,
            tone_mapper: ToneMapper::default(),
            ibl_factor: 2.0,
            emissive_factor: 1.0,
            sky: SkyMode::default(),
            ambient_occlusion: AmbientOcclusion::default(),
            display_ao_directly: false,
            draw_bounding_boxes: false,
            draw_light_frustums: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spot_light_direction_is_normalized() {
        let light = SpotLight::looking_at(
            Vec3::new(0.0, 10.0, 0.0),
            Vec3::ZERO,
            45f32.to_radians(),
            Vec3::ONE,
            10.0,
        );
        assert!((light.direction - Vec3::new(0.0, -1.0, 0.0)).length() < 1e-5);
        assert!(light.view.is_finite());
        assert!(light.view_projection().is_finite());
    }

    #[test]
    fn test_camera_view_projection_order() {
        let camera = Camera::default();
        let origin = camera.view_projection().project_point3(Vec3::ZERO);
        // The target sits in the middle of the screen.
        assert!(origin.x.abs() < 1e-5);
        assert!(origin.y.abs() < 1e-5);
    }

    #[test]
    fn test_tone_mapper_indices() {
        assert_eq!(ToneMapper::Timothy.index(), 0);
        assert_eq!(ToneMapper::default().index(), 4);
        assert_eq!(ToneMapper::None.index(), 5);
        assert!(!AmbientOcclusion::Disabled.is_enabled());
        assert!(AmbientOcclusion::Downsampled.is_enabled());
    }
}
