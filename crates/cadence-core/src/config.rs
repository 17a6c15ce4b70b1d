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

//! Renderer configuration.
//!
//! Every capacity in the scheduler is fixed at startup. The values live in a
//! [`RendererConfig`] that can be loaded from a RON file; fields left out of
//! the file keep their defaults.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::path::Path;

const MIB: u64 = 1024 * 1024;

/// Descriptor heap sizes, per view type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptorCounts {
    /// Constant buffer views.
    pub cbv: u32,
    /// Shader resource views.
    pub srv: u32,
    /// Unordered access views.
    pub uav: u32,
    /// Depth stencil views.
    pub dsv: u32,
    /// Render target views.
    pub rtv: u32,
    /// Samplers.
    pub sampler: u32,
}

impl DescriptorCounts {
    /// Size of the combined CBV/SRV/UAV heap.
    pub fn cbv_srv_uav(&self) -> u32 {
        self.cbv + self.srv + self.uav
    }
}

impl Default for DescriptorCounts {
    fn default() -> Self {
        Self {
            cbv: 3000,
            srv: 3000,
            uav: 100,
            dsv: 100,
            rtv: 1000,
            sampler: 50,
        }
    }
}

/// Fixed capacities and feature settings of the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Descriptor heap sizes.
    pub descriptors: DescriptorCounts,
    /// Swap chain length. The scheduler uses one more frame slot than this.
    pub back_buffer_count: u32,
    /// Command buffers available to each frame slot.
    pub command_buffers_per_slot: u32,
    /// Size in bytes of the transient constant arena, shared by all slots.
    pub constant_arena_size: u64,
    /// Size in bytes of the static vertex/index/constant pool.
    pub static_pool_size: u64,
    /// Size in bytes of the staging heap used during loading.
    pub upload_heap_size: u64,
    /// Width and height of the shadow atlas; each quadrant is half of it.
    pub shadow_atlas_size: u32,
    /// Sample count of the multisampled color and depth targets; at least 2.
    pub msaa_samples: u32,
    /// Timestamp queries available per frame slot.
    pub timestamps_per_frame: u32,
    /// Whether the static pool lives in device memory and is filled by a copy.
    pub use_video_memory: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            descriptors: DescriptorCounts::default(),
            back_buffer_count: 2,
            command_buffers_per_slot: 8,
            constant_arena_size: 20 * MIB,
            static_pool_size: 128 * MIB,
            upload_heap_size: 64 * MIB,
            shadow_atlas_size: 2048,
            msaa_samples: 4,
            timestamps_per_frame: 128,
            use_video_memory: true,
        }
    }
}

impl RendererConfig {
    /// Number of rotating frame slots (`back_buffer_count + 1`).
    pub fn frame_slots(&self) -> usize {
        self.back_buffer_count as usize + 1
    }

    /// Parses a configuration from RON text and validates it.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigurationError> {
        let config: Self =
            ron::from_str(text).map_err(|e| ConfigurationError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a RON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidConfig`] if the file cannot be read,
    /// does not parse, or fails [`validate`](Self::validate).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_ron_str(&text)?;
        log::info!("Loaded renderer configuration from {}", path.display());
        Ok(config)
    }

    /// Serializes the configuration as pretty-printed RON.
    pub fn to_ron_string(&self) -> Result<String, ConfigurationError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigurationError::InvalidConfig(e.to_string()))
    }

    /// Rejects capacities the scheduler cannot work with.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let d = &self.descriptors;
        let checks: [(&str, bool); 12] = [
            ("back_buffer_count", self.back_buffer_count > 0),
            ("command_buffers_per_slot", self.command_buffers_per_slot > 0),
            ("constant_arena_size", self.constant_arena_size > 0),
            ("static_pool_size", self.static_pool_size > 0),
            ("upload_heap_size", self.upload_heap_size > 0),
            ("timestamps_per_frame", self.timestamps_per_frame > 0),
            ("descriptors.cbv_srv_uav", d.cbv_srv_uav() > 0),
            ("descriptors.dsv", d.dsv > 0),
            ("descriptors.rtv", d.rtv > 0),
            ("descriptors.sampler", d.sampler > 0),
            (
                "shadow_atlas_size",
                self.shadow_atlas_size >= 2 && self.shadow_atlas_size % 2 == 0,
            ),
            (
                "msaa_samples",
                self.msaa_samples >= 2 && self.msaa_samples.is_power_of_two(),
            ),
        ];
        if let Some((field, _)) = checks.iter().find(|(_, ok)| !ok) {
            return Err(ConfigurationError::InvalidConfig(format!(
                "{field} is out of range"
            )));
        }

        let per_slot = self.constant_arena_size / self.frame_slots() as u64;
        if per_slot < crate::CONSTANT_BUFFER_ALIGNMENT {
            return Err(ConfigurationError::InvalidConfig(format!(
                "constant_arena_size of {} bytes leaves less than one aligned allocation per frame slot",
                self.constant_arena_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = RendererConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.frame_slots(), 3);
        assert_eq!(config.descriptors.cbv_srv_uav(), 6100);
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config = RendererConfig::from_ron_str("(back_buffer_count: 3, msaa_samples: 8)")
            .expect("valid config");
        assert_eq!(config.back_buffer_count, 3);
        assert_eq!(config.frame_slots(), 4);
        assert_eq!(config.msaa_samples, 8);
        assert_eq!(config.shadow_atlas_size, 2048);
        assert_eq!(config.descriptors.rtv, 1000);
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let err = RendererConfig::from_ron_str("(descriptors: (rtv: 0))").unwrap_err();
        match err {
            ConfigurationError::InvalidConfig(msg) => assert!(msg.contains("descriptors.rtv")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_ron_is_rejected() {
        assert!(matches!(
            RendererConfig::from_ron_str("(back_buffer_count: \"two\")"),
            Err(ConfigurationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_load_from_file_round_trip() {
        let mut config = RendererConfig::default();
        config.timestamps_per_frame = 64;
        config.use_video_memory = false;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_ron_string().unwrap().as_bytes())
            .unwrap();

        let loaded = RendererConfig::load(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = RendererConfig::load(dir.path().join("missing.ron")).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidConfig(_)));
    }
}
