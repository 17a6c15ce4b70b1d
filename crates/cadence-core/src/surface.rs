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

//! The presentation surface contract.

use crate::device::TextureFormat;
use crate::error::RenderError;
use crate::handle::{DescriptorHandle, TextureId};
use std::fmt::Debug;

/// A swap chain as seen by the frame orchestrator.
///
/// Back buffers are created and owned by the surface. They sit in
/// [`ResourceState::Present`](crate::ResourceState::Present) whenever the
/// orchestrator is not recording into them.
pub trait PresentationSurface: Send + Debug {
    /// Number of back buffers in the chain.
    fn back_buffer_count(&self) -> u32;

    /// Format of the back buffers.
    fn format(&self) -> TextureFormat;

    /// Current width and height in pixels.
    fn extent(&self) -> (u32, u32);

    /// The back buffer the next frame renders into.
    fn current_back_buffer(&self) -> TextureId;

    /// Render target view of [`current_back_buffer`](Self::current_back_buffer).
    fn current_back_buffer_view(&self) -> DescriptorHandle;

    /// Blocks until the current back buffer may be written by the GPU.
    fn wait_for_ready(&mut self) -> Result<(), RenderError>;

    /// Presents the current back buffer and advances to the next one.
    fn present(&mut self) -> Result<(), RenderError>;
}
