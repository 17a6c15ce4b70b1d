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

use cadence_core::{GraphicsDevice, RendererConfig};
use cadence_data::RenderContext;
use cadence_infra::{DeviceEvent, HeadlessDevice};
use std::sync::Arc;

fn config() -> RendererConfig {
    RendererConfig {
        back_buffer_count: 2,
        constant_arena_size: 3 * 4096,
        static_pool_size: 1 << 16,
        upload_heap_size: 1 << 16,
        ..RendererConfig::default()
    }
}

/// Records one frame that writes `bytes` of constants and returns its fence.
fn run_frame(context: &mut RenderContext, bytes: usize) -> u64 {
    context.begin_frame().unwrap();
    let device = Arc::clone(&context.device);
    let encoder = context.command_ring.acquire(device.as_ref()).unwrap();
    context
        .constants
        .allocate(device.as_ref(), &vec![0xAB; bytes])
        .unwrap();
    let id = encoder.close().unwrap();
    device.submit(&[id]).unwrap();
    let fence = device.signal().unwrap();
    context.end_frame(fence);
    fence
}

#[test]
fn test_slot_reuse_waits_before_any_write() {
    // --- 1. ARRANGE ---
    // Three slots on a queue that only completes work when waited on.
    let device = HeadlessDevice::deferred();
    let mut context = RenderContext::new(Arc::new(device.clone()), config()).unwrap();
    let constant_buffer = context.constants.buffer();

    let fences: Vec<u64> = (0..3).map(|_| run_frame(&mut context, 1024)).collect();
    assert_eq!(fences, vec![1, 2, 3]);
    assert_eq!(device.completed_fence_value(), 0, "Nothing has completed yet");
    device.take_events();

    // --- 2. ACT ---
    // The fourth frame reuses slot 0.
    run_frame(&mut context, 1024);

    // --- 3. ASSERT ---
    let events = device.take_events();
    let wait = events
        .iter()
        .position(|e| matches!(e, DeviceEvent::Waited { value: 1, blocked: true }))
        .expect("Frame 4 should block on frame 1's fence");
    let first_write = events
        .iter()
        .position(|e| matches!(e, DeviceEvent::BufferWrite { buffer, .. } if *buffer == constant_buffer))
        .expect("Frame 4 should write constants");
    let first_reset = events
        .iter()
        .position(|e| matches!(e, DeviceEvent::CommandBufferReset(_)))
        .expect("Frame 4 should reset a command buffer");
    assert!(wait < first_write, "The slot was written before its fence completed");
    assert!(wait < first_reset, "A command buffer was reset before its fence completed");

    // Frames 2 and 3 are still in flight; only frame 1 was waited for.
    assert!(!events
        .iter()
        .any(|e| matches!(e, DeviceEvent::Waited { value: 2 | 3, .. })));
    assert_eq!(context.constants.in_flight(), 3 * 1024);
    context.destroy();
}

#[test]
fn test_rings_never_hand_out_overlapping_ranges() {
    let device = HeadlessDevice::deferred();
    let mut context = RenderContext::new(Arc::new(device.clone()), config()).unwrap();
    let mut live: Vec<(u64, u64, u64)> = Vec::new();

    for frame in 0..12u64 {
        context.begin_frame().unwrap();
        let completed = device.completed_fence_value();
        live.retain(|(_, _, fence)| *fence > completed);

        let size = 256 * (1 + frame % 3);
        let address = context
            .constants
            .allocate(&device, &vec![0; size as usize])
            .unwrap();
        for (start, len, _) in &live {
            let disjoint = address.0 + size <= *start || start + len <= address.0;
            assert!(disjoint, "Frame {frame} overlaps a range still in flight");
        }

        let fence = device.signal().unwrap();
        live.push((address.0, size, fence));
        context.end_frame(fence);
    }
    context.destroy();
}

#[test]
fn test_wrapped_arena_still_grants_full_frame_budget() {
    // --- 1. ARRANGE ---
    let device = HeadlessDevice::deferred();
    let mut context = RenderContext::new(Arc::new(device.clone()), config()).unwrap();
    let budget = context.constants.frame_budget();
    assert_eq!(budget, 4096);

    // Frames of mixed sizes fill every slot; none has completed.
    run_frame(&mut context, 3072);
    run_frame(&mut context, 4096);
    run_frame(&mut context, 4096);

    // --- 2. ACT ---
    // The fourth frame reuses slot 0 while frames 2 and 3 are still in flight.
    let slot = context.begin_frame().unwrap();
    let device_ref = Arc::clone(&context.device);
    let first = context.constants.allocate(device_ref.as_ref(), &[1; 2048]);
    let second = context.constants.allocate(device_ref.as_ref(), &[2; 2048]);

    // --- 3. ASSERT ---
    assert_eq!(slot, 0);
    assert_eq!(device.completed_fence_value(), 1);
    assert!(first.is_ok());
    assert!(second.is_ok(), "A frame within its budget was refused: {second:?}");
    assert_eq!(context.constants.frame_used(), budget);
    assert!(context.constants.allocate(device_ref.as_ref(), &[3; 1]).is_err());

    let fence = device.signal().unwrap();
    context.end_frame(fence);
    context.destroy();
}
