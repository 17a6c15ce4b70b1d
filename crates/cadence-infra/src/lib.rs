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

//! # Cadence Infra
//!
//! Concrete implementations of the `cadence-core` device contracts.
//!
//! The only backend shipped today is [`headless`], a host-memory simulation of
//! a single GPU queue. It executes copies and timestamp queries, tracks the
//! fence timeline and validates every recorded barrier, which makes it the
//! backend of choice for the sandbox and for tests.

pub mod headless;

pub use headless::{
    CompletionMode, DeviceEvent, HeadlessConfig, HeadlessDevice, HeadlessSurface, RecordedCommand,
};
