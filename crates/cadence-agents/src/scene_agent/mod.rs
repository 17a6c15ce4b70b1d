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

//! The staged scene loader.
//!
//! Loading a scene touches the upload heap, the static pool, the descriptor
//! heaps and creates four lanes. Doing all of it in one call would freeze the
//! caller for the whole load, so the work is split into [`LoadStage`]s and
//! the caller runs one per tick, drawing a progress bar in between.

mod loader;
mod stage;

pub use loader::{LoadEnvironment, SceneLoader};
pub use stage::{LoadProgress, LoadStage, LoadStep};
