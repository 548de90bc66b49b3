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

//! Pipeline, texture, constant and render-state selection.
//!
//! Most selections are recorded and applied at the next draw. Pipelines and
//! render targets are applied immediately.

use super::{Translator, TranslatorState};
use crate::error::SkipReason;
use crate::handle::Handle;
use crate::native::{
    BlendFactor, ClearRequest, CompareFunction, CullMode, Rect, ShaderStage, Viewport,
};
use crate::resource::{LookupError, ResourceKind};
use crate::state::{RenderStateChange, CONSTANT_BUFFER_SLOTS};

/// Rounds a constant buffer size up to the 16-byte register size.
fn constant_buffer_size(minimum: u64, len: usize) -> u64 {
    let rounded = (len as u64).div_ceil(16) * 16;
    rounded.max(minimum)
}

impl TranslatorState {
    pub(crate) fn bind_pipeline(&mut self, pipeline: Handle) -> Result<(), SkipReason> {
        self.pipeline = pipeline;
        if pipeline.is_null() {
            return Ok(());
        }
        let resolved = self.resolve_pipeline()?;
        self.apply_pipeline(&resolved);
        Ok(())
    }

    pub(crate) fn set_fallback_pipeline(&mut self, pipeline: Handle) -> Result<(), SkipReason> {
        if !pipeline.is_null() {
            self.pools.pipeline(pipeline)?;
        }
        self.fallback_pipeline = pipeline;
        Ok(())
    }

    pub(crate) fn bind_texture(&mut self, unit: u32, texture: Handle) -> Result<(), SkipReason> {
        let slot = self
            .texture_units
            .get_mut(unit as usize)
            .ok_or(SkipReason::SlotOutOfRange(unit))?;
        if !texture.is_null() {
            self.pools.texture(texture)?;
        }
        *slot = texture;
        Ok(())
    }

    pub(crate) fn set_texture_sampler(
        &mut self,
        texture: Handle,
        sampler: Handle,
    ) -> Result<(), SkipReason> {
        if !sampler.is_null() {
            self.pools.sampler(sampler)?;
        }
        self.pools.texture_mut(texture)?.sampler = sampler;
        Ok(())
    }

    pub(crate) fn set_constant_buffer_data(
        &mut self,
        stage: ShaderStage,
        slot: u32,
        data: &[u8],
    ) -> Result<(), SkipReason> {
        let index = slot as usize;
        if index >= CONSTANT_BUFFER_SLOTS {
            return Err(SkipReason::SlotOutOfRange(slot));
        }
        if data.is_empty() {
            return Ok(());
        }

        let current = self.stage_constants[stage.index()][index];
        let reusable = self
            .pools
            .constant_buffer(current)
            .ok()
            .filter(|record| record.size >= data.len() as u64)
            .map(|record| record.native);

        let native = match reusable {
            Some(native) => native,
            None => {
                let size = constant_buffer_size(self.config.constant_buffer_size, data.len());
                let handle = self
                    .pools
                    .create_constant_buffer(self.device.as_ref(), size)?;
                if !current.is_null() {
                    self.pools.destroy(self.device.as_ref(), current);
                    self.stats.buffer_growths += 1;
                    log::debug!("{stage:?} constant buffer {slot} grown to {size} bytes");
                }
                self.stage_constants[stage.index()][index] = handle;
                self.pools.constant_buffer(handle)?.native
            }
        };
        self.context.update_buffer(native, 0, data)?;
        Ok(())
    }

    pub(crate) fn set_render_state(&mut self, change: RenderStateChange) {
        self.requested.apply(change);
    }

    pub(crate) fn bind_render_target(&mut self, target: Handle) -> Result<(), SkipReason> {
        if !target.is_null() {
            self.pools.render_target(target)?;
        }
        self.render_target = target;
        self.apply_render_targets();
        Ok(())
    }

    pub(crate) fn clear(&mut self, request: ClearRequest) -> Result<(), SkipReason> {
        let selected = self.render_target;
        let targets = self.apply_render_targets();
        if !selected.is_null() && targets.is_default() {
            return Err(SkipReason::Lookup(LookupError::NotFound(selected)));
        }
        if let Some(color) = request.color {
            self.context.clear_render_target(targets.color, color);
        }
        if let Some(depth) = request.depth {
            match (targets.is_default(), targets.depth) {
                (true, _) => self.context.clear_depth_stencil(None, depth),
                (false, Some(view)) => self.context.clear_depth_stencil(Some(view), depth),
                (false, None) => {
                    log::trace!("Render target {selected} has no depth attachment; depth clear skipped");
                }
            }
        }
        Ok(())
    }
}

impl Translator {
    /// Selects the pipeline for subsequent draws and binds its shaders.
    ///
    /// Binding the pipeline that is already bound issues no native calls.
    /// `NULL` deselects; draws then use the fallback pipeline, if any.
    pub fn bind_pipeline(&self, pipeline: Handle) -> Result<(), SkipReason> {
        self.lock().bind_pipeline(pipeline)
    }

    /// Registers the pipeline used when the selected one does not resolve.
    /// `NULL` removes the fallback.
    pub fn set_fallback_pipeline(&self, pipeline: Handle) -> Result<(), SkipReason> {
        self.lock().set_fallback_pipeline(pipeline)
    }

    /// Selects the texture sampled through `unit`. `NULL` empties the unit.
    pub fn bind_texture(&self, unit: u32, texture: Handle) -> Result<(), SkipReason> {
        self.lock().bind_texture(unit, texture)
    }

    /// Sets the sampler a texture is sampled with. `NULL` restores the default sampler.
    pub fn set_texture_sampler(&self, texture: Handle, sampler: Handle) -> Result<(), SkipReason> {
        self.lock().set_texture_sampler(texture, sampler)
    }

    /// Uploads the contents of a stage's constant buffer `slot`.
    ///
    /// The buffer is owned by the translator and grows to fit `data`. It is
    /// bound at the next draw.
    pub fn set_constant_buffer_data(
        &self,
        stage: ShaderStage,
        slot: u32,
        data: &[u8],
    ) -> Result<(), SkipReason> {
        self.lock().set_constant_buffer_data(stage, slot, data)
    }

    /// Uploads a plain-data value as a stage's constant buffer `slot`.
    pub fn set_constants<T: bytemuck::Pod>(
        &self,
        stage: ShaderStage,
        slot: u32,
        value: &T,
    ) -> Result<(), SkipReason> {
        self.set_constant_buffer_data(stage, slot, bytemuck::bytes_of(value))
    }

    /// Applies a render-state change at the next draw.
    pub fn set_render_state(&self, change: RenderStateChange) {
        self.lock().set_render_state(change);
    }

    /// Enables or disables depth testing.
    pub fn set_depth_test(&self, enabled: bool) {
        self.set_render_state(RenderStateChange::DepthTest(enabled));
    }

    /// Enables or disables depth writes.
    pub fn set_depth_write(&self, enabled: bool) {
        self.set_render_state(RenderStateChange::DepthWrite(enabled));
    }

    /// Sets the depth comparison.
    pub fn set_depth_func(&self, func: CompareFunction) {
        self.set_render_state(RenderStateChange::DepthFunc(func));
    }

    /// Enables or disables blending.
    pub fn set_blend(&self, enabled: bool) {
        self.set_render_state(RenderStateChange::Blend(enabled));
    }

    /// Sets the blend factors.
    pub fn set_blend_func(&self, src: BlendFactor, dst: BlendFactor) {
        self.set_render_state(RenderStateChange::BlendFunc { src, dst });
    }

    /// Sets which faces are culled.
    pub fn set_cull_mode(&self, cull: CullMode) {
        self.set_render_state(RenderStateChange::CullMode(cull));
    }

    /// Enables or disables the scissor test.
    pub fn set_scissor_test(&self, enabled: bool) {
        self.set_render_state(RenderStateChange::ScissorTest(enabled));
    }

    /// Sets the scissor rectangle.
    pub fn set_scissor_rect(&self, rect: Rect) {
        self.set_render_state(RenderStateChange::ScissorRect(rect));
    }

    /// Sets the viewport.
    pub fn set_viewport(&self, viewport: Viewport) {
        self.set_render_state(RenderStateChange::Viewport(viewport));
    }

    /// Directs output to a render-target bundle. `NULL` selects the back buffer.
    pub fn bind_render_target(&self, target: Handle) -> Result<(), SkipReason> {
        self.lock().bind_render_target(target)
    }

    /// Clears the attachments of the bound render target.
    ///
    /// A depth clear on a bundle without a depth attachment is ignored.
    pub fn clear(&self, request: ClearRequest) -> Result<(), SkipReason> {
        self.lock().clear(request)
    }

    /// The kind of resource `handle` names, if it is live.
    pub fn resource_kind(&self, handle: Handle) -> Option<ResourceKind> {
        self.lock().pools.kind(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_buffer_size_rounds_to_registers() {
        assert_eq!(constant_buffer_size(256, 4), 256);
        assert_eq!(constant_buffer_size(16, 20), 32);
        assert_eq!(constant_buffer_size(0, 64), 64);
    }
}
