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

//! Layout of the shared shadow atlas.

use cadence_core::{Viewport, MAX_SHADOW_CASTERS};

/// One quadrant of the atlas, in quadrant coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasQuadrant {
    /// Column, 0 or 1.
    pub x: u32,
    /// Row, 0 or 1.
    pub y: u32,
}

/// A square depth atlas split into four shadow maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowAtlas {
    size: u32,
}

impl ShadowAtlas {
    /// An atlas of `size` x `size` texels.
    pub fn new(size: u32) -> Self {
        Self { size }
    }

    /// Side of the whole atlas.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Side of one shadow map.
    pub fn quadrant_size(&self) -> u32 {
        self.size / 2
    }

    /// The quadrant of shadow map `index`, or `None` past the fourth.
    pub fn quadrant(&self, index: usize) -> Option<AtlasQuadrant> {
        (index < MAX_SHADOW_CASTERS).then(|| AtlasQuadrant {
            x: (index % 2) as u32,
            y: (index / 2) as u32,
        })
    }

    /// The viewport that renders into shadow map `index`.
    pub fn viewport(&self, index: usize) -> Option<Viewport> {
        let quadrant = self.quadrant(index)?;
        let side = self.quadrant_size() as f32;
        Some(Viewport::new(
            quadrant.x as f32 * side,
            quadrant.y as f32 * side,
            side,
            side,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadrants_fill_rows_first() {
        let atlas = ShadowAtlas::new(2048);
        let quadrants: Vec<(u32, u32)> = (0..4)
            .filter_map(|i| atlas.quadrant(i))
            .map(|q| (q.x, q.y))
            .collect();
        assert_eq!(quadrants, vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
        assert_eq!(atlas.quadrant(4), None);
    }

    #[test]
    fn test_viewport_covers_one_quadrant() {
        let atlas = ShadowAtlas::new(2048);
        let viewport = atlas.viewport(3).unwrap();
        assert_eq!(
            (viewport.x, viewport.y, viewport.width, viewport.height),
            (1024.0, 1024.0, 1024.0, 1024.0)
        );
        assert_eq!(viewport.min_depth, 0.0);
        assert_eq!(viewport.max_depth, 1.0);
    }
}
