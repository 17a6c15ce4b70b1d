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

use cadence_core::{
    ConfigurationError, GraphicsDevice, RenderError, RendererConfig, ResourceState, TextureDescriptor,
    TextureFormat, TextureUsage,
};
use cadence_data::{RenderContext, TrackedTexture};
use cadence_infra::HeadlessDevice;
use std::sync::Arc;

fn config() -> RendererConfig {
    RendererConfig {
        constant_arena_size: 3 * 4096,
        static_pool_size: 1 << 16,
        upload_heap_size: 1 << 16,
        use_video_memory: true,
        ..RendererConfig::default()
    }
}

#[test]
fn test_staged_geometry_and_textures_reach_the_gpu() {
    // --- 1. ARRANGE ---
    let device = HeadlessDevice::deferred();
    let mut context = RenderContext::new(Arc::new(device.clone()), config()).unwrap();
    let dev = context.device.clone();

    let vertices: Vec<u8> = (0..96u8).collect();
    let mesh = context
        .static_pool
        .allocate_with_data(dev.as_ref(), &vertices)
        .unwrap();

    let mut albedo = TrackedTexture::create(
        dev.as_ref(),
        &TextureDescriptor::new_2d(
            "albedo",
            8,
            8,
            TextureFormat::Rgba8Unorm,
            TextureUsage::SHADER_RESOURCE | TextureUsage::COPY_DST,
            ResourceState::CopyDest,
        ),
    )
    .unwrap();
    let texels = context
        .upload_heap
        .stage(dev.as_ref(), &[0x7F; 256], 512)
        .unwrap();

    // --- 2. ACT ---
    context
        .upload_heap
        .copy_to_texture(dev.as_ref(), &texels, &mut albedo)
        .unwrap();
    let encoder = context.upload_heap.encoder(dev.as_ref()).unwrap();
    context.static_pool.upload_data(encoder).unwrap();
    context.upload_heap.flush_and_wait(dev.as_ref()).unwrap();
    context.upload_heap.release(dev.as_ref());
    context.static_pool.free_upload_heap(dev.as_ref());

    // --- 3. ASSERT ---
    let video = context.static_pool.gpu_buffer().unwrap();
    let contents = device.buffer_contents(video).unwrap();
    assert_eq!(&contents[mesh.offset as usize..][..96], vertices.as_slice());
    assert_eq!(device.texture_uploaded_bytes(albedo.id()), Some(256));
    assert_eq!(albedo.state(), ResourceState::PixelShaderResource);
    assert_eq!(device.completed_fence_value(), device.signaled_fence_value());

    assert!(context.upload_heap.is_released());
    assert!(!context.static_pool.has_staging());

    albedo.destroy(dev.as_ref());
    context.destroy();
    assert_eq!(device.live_buffers(), 0);
    assert_eq!(device.live_textures(), 0);
}

#[test]
fn test_released_heap_rejects_new_allocations() {
    let device = HeadlessDevice::default();
    let mut context = RenderContext::new(Arc::new(device), config()).unwrap();
    let dev = context.device.clone();

    context.upload_heap.release(dev.as_ref());
    let result = context.upload_heap.allocate(16, 16);
    assert!(matches!(
        result,
        Err(RenderError::Configuration(ConfigurationError::UploadHeapReleased))
    ));

    context.upload_heap.reopen(dev.as_ref()).unwrap();
    assert!(context.upload_heap.allocate(16, 16).is_ok());
    context.destroy();
}
