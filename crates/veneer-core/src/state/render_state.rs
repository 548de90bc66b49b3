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

//! Requested render state and the cache of immutable native state objects.
//!
//! Global toggles (depth test, blending, culling...) only update the requested
//! descriptors. At draw time each descriptor is resolved to a native state
//! object, created once per distinct descriptor.

use crate::native::*;
use std::collections::HashMap;
use std::hash::Hash;

/// One global render-state toggle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderStateChange {
    /// Enables or disables depth testing.
    DepthTest(bool),
    /// Enables or disables depth writes.
    DepthWrite(bool),
    /// Sets the depth comparison.
    DepthFunc(CompareFunction),
    /// Enables or disables blending.
    Blend(bool),
    /// Sets the blend factors.
    BlendFunc {
        /// Source factor.
        src: BlendFactor,
        /// Destination factor.
        dst: BlendFactor,
    },
    /// Sets face culling.
    CullMode(CullMode),
    /// Enables or disables the scissor test.
    ScissorTest(bool),
    /// Sets the scissor rectangle.
    ScissorRect(Rect),
    /// Sets the viewport.
    Viewport(Viewport),
}

/// The render state the caller asked for, not yet applied.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RequestedRenderState {
    /// Depth-stencil descriptor.
    pub depth: DepthStencilDesc,
    /// Blend descriptor.
    pub blend: BlendDesc,
    /// Rasterizer descriptor.
    pub raster: RasterizerDesc,
    /// Scissor rectangle, if one was set.
    pub scissor: Option<Rect>,
    /// Viewport, if one was set.
    pub viewport: Option<Viewport>,
}

impl RequestedRenderState {
    /// Folds a toggle into the requested state.
    pub fn apply(&mut self, change: RenderStateChange) {
        match change {
            RenderStateChange::DepthTest(enabled) => self.depth.depth_test = enabled,
            RenderStateChange::DepthWrite(enabled) => self.depth.depth_write = enabled,
            RenderStateChange::DepthFunc(func) => self.depth.depth_func = func,
            RenderStateChange::Blend(enabled) => self.blend.enabled = enabled,
            RenderStateChange::BlendFunc { src, dst } => {
                self.blend.src = src;
                self.blend.dst = dst;
            }
            RenderStateChange::CullMode(cull) => self.raster.cull = cull,
            RenderStateChange::ScissorTest(enabled) => self.raster.scissor_enabled = enabled,
            RenderStateChange::ScissorRect(rect) => self.scissor = Some(rect),
            RenderStateChange::Viewport(viewport) => self.viewport = Some(viewport),
        }
    }
}

/// Native state objects resolved for the requested descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedStates {
    /// Depth-stencil state.
    pub depth: NativeStateId,
    /// Blend state.
    pub blend: NativeStateId,
    /// Rasterizer state.
    pub raster: NativeStateId,
}

/// Memoizes one native state object per distinct descriptor.
#[derive(Debug, Default)]
pub struct RenderStateCache {
    depth: HashMap<DepthStencilDesc, NativeStateId>,
    blend: HashMap<BlendDesc, NativeStateId>,
    raster: HashMap<RasterizerDesc, NativeStateId>,
}

fn get_or_create<D: Eq + Hash + Copy>(
    map: &mut HashMap<D, NativeStateId>,
    desc: D,
    create: impl FnOnce(&D) -> Result<NativeStateId, NativeError>,
) -> Result<NativeStateId, NativeError> {
    if let Some(id) = map.get(&desc) {
        return Ok(*id);
    }
    let id = create(&desc)?;
    map.insert(desc, id);
    Ok(id)
}

impl RenderStateCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves every descriptor of `requested` to a native state object.
    pub fn resolve(
        &mut self,
        device: &dyn NativeDevice,
        requested: &RequestedRenderState,
    ) -> Result<ResolvedStates, NativeError> {
        Ok(ResolvedStates {
            depth: get_or_create(&mut self.depth, requested.depth, |d| {
                device.create_depth_stencil_state(d)
            })?,
            blend: get_or_create(&mut self.blend, requested.blend, |d| {
                device.create_blend_state(d)
            })?,
            raster: get_or_create(&mut self.raster, requested.raster, |d| {
                device.create_rasterizer_state(d)
            })?,
        })
    }

    /// Number of native state objects held.
    pub fn len(&self) -> usize {
        self.depth.len() + self.blend.len() + self.raster.len()
    }

    /// Returns `true` if no state object has been created.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Releases every native state object.
    pub fn clear(&mut self, device: &dyn NativeDevice) {
        let ids = self
            .depth
            .drain()
            .map(|(_, id)| id)
            .chain(self.blend.drain().map(|(_, id)| id))
            .chain(self.raster.drain().map(|(_, id)| id))
            .collect::<Vec<_>>();
        for id in ids {
            if let Err(e) = device.destroy_state(id) {
                log::warn!("Failed to destroy state object {id:?}: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{NativeCall, RecordingDevice};

    #[test]
    fn test_toggles_fold_into_descriptors() {
        let mut requested = RequestedRenderState::default();
        requested.apply(RenderStateChange::DepthTest(true));
        requested.apply(RenderStateChange::BlendFunc {
            src: BlendFactor::SrcAlpha,
            dst: BlendFactor::OneMinusSrcAlpha,
        });
        requested.apply(RenderStateChange::ScissorTest(true));
        assert!(requested.depth.depth_test);
        assert_eq!(requested.blend.dst, BlendFactor::OneMinusSrcAlpha);
        assert!(requested.raster.scissor_enabled);
        assert_eq!(requested.scissor, None);
    }

    #[test]
    fn test_identical_descriptors_share_a_state_object() {
        let (device, _context) = RecordingDevice::new();
        let mut cache = RenderStateCache::new();
        let mut requested = RequestedRenderState::default();

        let first = cache.resolve(&device, &requested).unwrap();
        let again = cache.resolve(&device, &requested).unwrap();
        assert_eq!(first, again);
        assert_eq!(device.count_calls(|c| matches!(c, NativeCall::CreateState(_))), 3);

        requested.apply(RenderStateChange::DepthTest(true));
        let changed = cache.resolve(&device, &requested).unwrap();
        assert_ne!(changed.depth, first.depth);
        assert_eq!(changed.blend, first.blend);
        assert_eq!(cache.len(), 4);

        cache.clear(&device);
        assert!(cache.is_empty());
        assert_eq!(device.live_objects(), 0);
    }
}
