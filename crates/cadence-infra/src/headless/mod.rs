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

//! A headless GPU simulation.
//!
//! [`HeadlessDevice`] keeps every buffer in host memory, hands out synthetic
//! GPU virtual addresses and runs submitted command buffers on the calling
//! thread. Completion of submitted work is governed by a [`CompletionMode`]:
//! either everything finishes at submission, or nothing finishes until the
//! CPU waits on a fence (or a test retires it explicitly). All device-visible
//! activity is appended to an event log of [`DeviceEvent`]s.

mod device;
mod encoder;
mod state;
mod surface;

pub use device::{HeadlessConfig, HeadlessDevice};
pub use state::{CompletionMode, DeviceEvent, RecordedCommand};
pub use surface::HeadlessSurface;
