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

//! Scene input and the GPU container built from it.
//!
//! A [`SceneSource`] is the opaque description handed to the loader. The
//! loader turns it into a [`SceneResources`]: meshes copied into the static
//! pool, textures uploaded through the upload heap and a table of shader
//! resource views shared by every lane that draws the scene.

use cadence_core::{
    ConfigurationError, DescriptorTable, GraphicsDevice, RenderError, ResourceState, SceneLight,
    TextureDescriptor, TextureFormat, TextureUsage, ViewKind,
};
use cadence_data::{DescriptorHeaps, StaticBufferPool, Suballocation, TrackedTexture, UploadHeap};
use glam::{Mat4, Vec3};

/// Placement alignment of texture data in the upload heap.
pub const TEXTURE_UPLOAD_ALIGNMENT: u64 = 512;

/// Decoded texels of one texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    /// Asset name.
    pub name: String,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Texel format.
    pub format: TextureFormat,
    /// Tightly packed texels, row-major.
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// A `width` x `height` RGBA8 texture of one color.
    pub fn solid(name: impl Into<String>, width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            format: TextureFormat::Rgba8Unorm,
            pixels: rgba.repeat((width * height) as usize),
        }
    }
}

/// Geometry of one mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    /// Asset name.
    pub name: String,
    /// Interleaved vertex data.
    pub vertices: Vec<u8>,
    /// Bytes per vertex.
    pub vertex_stride: u32,
    /// Triangle list indices.
    pub indices: Vec<u32>,
    /// Object to world.
    pub world: Mat4,
    /// Object space bounding box minimum.
    pub bounds_min: Vec3,
    /// Object space bounding box maximum.
    pub bounds_max: Vec3,
}

impl MeshData {
    /// A unit cube of position-only vertices placed by `world`.
    pub fn cube(name: impl Into<String>, world: Mat4) -> Self {
        let mut vertices = Vec::with_capacity(8 * 12);
        for i in 0..8u32 {
            let corner = [
                if i & 1 == 0 { -1.0f32 } else { 1.0 },
                if i & 2 == 0 { -1.0 } else { 1.0 },
                if i & 4 == 0 { -1.0 } else { 1.0 },
            ];
            vertices.extend_from_slice(bytemuck::cast_slice(&corner));
        }
        #[rustfmt::skip]
        let indices = vec![
            0, 2, 1, 1, 2, 3, // -z
            4, 5, 6, 5, 7, 6, // +z
            0, 1, 4, 1, 5, 4, // -y
            2, 6, 3, 3, 6, 7, // +y
            0, 4, 2, 2, 4, 6, // -x
            1, 3, 5, 3, 7, 5, // +x
        ];
        Self {
            name: name.into(),
            vertices,
            vertex_stride: 12,
            indices,
            world,
            bounds_min: Vec3::NEG_ONE,
            bounds_max: Vec3::ONE,
        }
    }
}

/// An opaque scene description the loader can pull assets from.
///
/// Asset access may fail (missing file, corrupt data); the loader reports
/// such failures as an aborted load.
pub trait SceneSource: Send + Sync {
    /// Display name.
    fn name(&self) -> &str;

    /// Every texture of the scene.
    fn textures(&self) -> anyhow::Result<Vec<TextureData>>;

    /// Every mesh of the scene.
    fn meshes(&self) -> anyhow::Result<Vec<MeshData>>;

    /// Punctual lights authored in the scene.
    fn lights(&self) -> Vec<SceneLight> {
        Vec::new()
    }
}

/// A scene held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryScene {
    name: String,
    textures: Vec<TextureData>,
    meshes: Vec<MeshData>,
    lights: Vec<SceneLight>,
}

impl MemoryScene {
    /// An empty scene.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a texture.
    pub fn with_texture(mut self, texture: TextureData) -> Self {
        self.textures.push(texture);
        self
    }

    /// Adds a mesh.
    pub fn with_mesh(mut self, mesh: MeshData) -> Self {
        self.meshes.push(mesh);
        self
    }

    /// Adds a light.
    pub fn with_light(mut self, light: SceneLight) -> Self {
        self.lights.push(light);
        self
    }
}

impl SceneSource for MemoryScene {
    fn name(&self) -> &str {
        &self.name
    }

    fn textures(&self) -> anyhow::Result<Vec<TextureData>> {
        Ok(self.textures.clone())
    }

    fn meshes(&self) -> anyhow::Result<Vec<MeshData>> {
        Ok(self.meshes.clone())
    }

    fn lights(&self) -> Vec<SceneLight> {
        self.lights.clone()
    }
}

/// A mesh living in the static pool.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuMesh {
    /// Asset name.
    pub name: String,
    /// Vertex data.
    pub vertices: Suballocation,
    /// 32-bit index data.
    pub indices: Suballocation,
    /// Bytes per vertex.
    pub vertex_stride: u32,
    /// Number of indices.
    pub index_count: u32,
    /// Object to world.
    pub world: Mat4,
    /// Object space bounding box minimum.
    pub bounds_min: Vec3,
    /// Object space bounding box maximum.
    pub bounds_max: Vec3,
}

impl GpuMesh {
    /// Maps the unit cube `[-1, 1]^3` onto the mesh's world space bounding box.
    pub fn bounds_transform(&self) -> Mat4 {
        let center = (self.bounds_min + self.bounds_max) * 0.5;
        let half_extent = (self.bounds_max - self.bounds_min) * 0.5;
        self.world * Mat4::from_translation(center) * Mat4::from_scale(half_extent)
    }
}

/// The textures, buffers and lights of a loaded scene.
#[derive(Debug)]
pub struct SceneResources {
    name: String,
    meshes: Vec<GpuMesh>,
    lights: Vec<SceneLight>,
    textures: Vec<TrackedTexture>,
    texture_table: Option<DescriptorTable>,
}

impl SceneResources {
    /// Copies `meshes` into the static pool.
    ///
    /// The data reaches video memory with the pool's next upload.
    pub fn create(
        device: &dyn GraphicsDevice,
        static_pool: &mut StaticBufferPool,
        name: &str,
        meshes: &[MeshData],
        lights: Vec<SceneLight>,
    ) -> Result<Self, RenderError> {
        let mut gpu_meshes = Vec::with_capacity(meshes.len());
        for mesh in meshes {
            if mesh.vertex_stride == 0
                || mesh.vertices.len() % mesh.vertex_stride as usize != 0
                || mesh.indices.is_empty()
            {
                return Err(RenderError::ResourceError(format!(
                    "mesh '{}' has malformed geometry",
                    mesh.name
                )));
            }
            let vertices = static_pool.allocate_with_data(device, &mesh.vertices)?;
            let indices =
                static_pool.allocate_with_data(device, bytemuck::cast_slice(&mesh.indices))?;
            gpu_meshes.push(GpuMesh {
                name: mesh.name.clone(),
                vertices,
                indices,
                vertex_stride: mesh.vertex_stride,
                index_count: mesh.indices.len() as u32,
                world: mesh.world,
                bounds_min: mesh.bounds_min,
                bounds_max: mesh.bounds_max,
            });
        }
        log::info!(
            "Scene '{}': {} meshes staged in the static pool",
            name,
            gpu_meshes.len()
        );
        Ok(Self {
            name: name.to_string(),
            meshes: gpu_meshes,
            lights,
            textures: Vec::new(),
            texture_table: None,
        })
    }

    /// Creates and uploads every texture and gives each a shader resource view.
    ///
    /// Copies are recorded into the upload heap; if it fills up it is flushed
    /// and the texture retried once.
    pub fn load_textures(
        &mut self,
        device: &dyn GraphicsDevice,
        descriptors: &mut DescriptorHeaps,
        upload_heap: &mut UploadHeap,
        textures: &[TextureData],
    ) -> Result<(), RenderError> {
        for data in textures {
            let descriptor = TextureDescriptor::new_2d(
                &data.name,
                data.width,
                data.height,
                data.format,
                TextureUsage::SHADER_RESOURCE | TextureUsage::COPY_DST,
                ResourceState::CopyDest,
            );
            if data.pixels.len() as u64 != descriptor.byte_size() {
                return Err(RenderError::ResourceError(format!(
                    "texture '{}' has {} bytes, expected {}",
                    data.name,
                    data.pixels.len(),
                    descriptor.byte_size()
                )));
            }
            let mut texture = TrackedTexture::create(device, &descriptor)?;

            let staged = match upload_heap.stage(device, &data.pixels, TEXTURE_UPLOAD_ALIGNMENT) {
                Err(RenderError::Configuration(ConfigurationError::BufferPoolExhausted { .. }))
                    if upload_heap.used() > 0 =>
                {
                    upload_heap.flush_and_wait(device)?;
                    upload_heap.stage(device, &data.pixels, TEXTURE_UPLOAD_ALIGNMENT)
                }
                other => other,
            };
            let uploaded = staged
                .and_then(|allocation| upload_heap.copy_to_texture(device, &allocation, &mut texture));
            if let Err(e) = uploaded {
                texture.destroy(device);
                return Err(e);
            }
            self.textures.push(texture);
        }

        if !self.textures.is_empty() {
            let table = descriptors.allocate_cbv_srv_uav(self.textures.len() as u32)?;
            for (texture, handle) in self.textures.iter().zip(table.iter()) {
                device.create_view(texture.id(), ViewKind::ShaderResource, handle)?;
            }
            self.texture_table = Some(table);
        }
        log::info!(
            "Scene '{}': {} textures uploaded",
            self.name,
            self.textures.len()
        );
        Ok(())
    }

    /// Scene name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Meshes in the static pool.
    pub fn meshes(&self) -> &[GpuMesh] {
        &self.meshes
    }

    /// Authored lights.
    pub fn lights(&self) -> &[SceneLight] {
        &self.lights
    }

    /// Uploaded textures.
    pub fn textures(&self) -> &[TrackedTexture] {
        &self.textures
    }

    /// Shader resource views of the textures, in texture order.
    pub fn texture_table(&self) -> Option<DescriptorTable> {
        self.texture_table
    }

    /// Destroys the textures. Static pool ranges and descriptors stay reserved.
    pub fn destroy(self, device: &dyn GraphicsDevice) {
        for texture in self.textures {
            texture.destroy(device);
        }
        log::debug!("Scene '{}' resources destroyed", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::DescriptorCounts;
    use cadence_infra::HeadlessDevice;

    struct Pools {
        descriptors: DescriptorHeaps,
        static_pool: StaticBufferPool,
        upload_heap: UploadHeap,
    }

    fn pools(device: &HeadlessDevice, upload_size: u64) -> Pools {
        Pools {
            descriptors: DescriptorHeaps::new(device, &DescriptorCounts::default()).unwrap(),
            static_pool: StaticBufferPool::new(device, 1 << 16, true).unwrap(),
            upload_heap: UploadHeap::new(device, upload_size).unwrap(),
        }
    }

    #[test]
    fn test_cube_geometry() {
        let cube = MeshData::cube("cube", Mat4::IDENTITY);
        assert_eq!(cube.vertices.len(), 8 * 12);
        assert_eq!(cube.indices.len(), 36);
        assert!(cube.indices.iter().all(|&i| i < 8));
    }

    #[test]
    fn test_meshes_land_in_static_pool() {
        let device = HeadlessDevice::default();
        let mut pools = pools(&device, 1 << 16);
        let meshes = vec![
            MeshData::cube("a", Mat4::IDENTITY),
            MeshData::cube("b", Mat4::from_translation(Vec3::X * 3.0)),
        ];
        let scene =
            SceneResources::create(&device, &mut pools.static_pool, "test", &meshes, Vec::new())
                .unwrap();
        assert_eq!(scene.meshes().len(), 2);
        assert_eq!(scene.meshes()[0].index_count, 36);
        assert!(pools.static_pool.used() >= 2 * (96 + 144));
    }

    #[test]
    fn test_malformed_mesh_is_rejected() {
        let device = HeadlessDevice::default();
        let mut pools = pools(&device, 1 << 16);
        let mut mesh = MeshData::cube("broken", Mat4::IDENTITY);
        mesh.vertices.pop();
        let result =
            SceneResources::create(&device, &mut pools.static_pool, "test", &[mesh], Vec::new());
        assert!(matches!(result, Err(RenderError::ResourceError(_))));
    }

    #[test]
    fn test_textures_get_views_and_survive_a_full_heap() {
        let device = HeadlessDevice::default();
        // Room for one 16x16 RGBA texture at a time.
        let mut pools = pools(&device, 1024);
        let mut scene =
            SceneResources::create(&device, &mut pools.static_pool, "test", &[], Vec::new())
                .unwrap();
        let textures = vec![
            TextureData::solid("albedo", 16, 16, [255, 0, 0, 255]),
            TextureData::solid("normal", 16, 16, [128, 128, 255, 255]),
        ];
        scene
            .load_textures(&device, &mut pools.descriptors, &mut pools.upload_heap, &textures)
            .unwrap();
        pools.upload_heap.flush_and_wait(&device).unwrap();

        assert_eq!(scene.textures().len(), 2);
        assert_eq!(scene.texture_table().map(|t| t.len()), Some(2));
        for texture in scene.textures() {
            assert_eq!(
                device.texture_state(texture.id()),
                Some(ResourceState::PixelShaderResource)
            );
            assert_eq!(device.texture_uploaded_bytes(texture.id()), Some(1024));
        }

        scene.destroy(&device);
        assert_eq!(device.live_textures(), 0);
    }
}
