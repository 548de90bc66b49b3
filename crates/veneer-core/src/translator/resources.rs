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

//! Resource creation, destruction and uploads.

use super::{Translator, TranslatorState};
use crate::command_list::CommandListBuilder;
use crate::error::{SkipReason, TranslatorError};
use crate::growth::GrowthOutcome;
use crate::handle::Handle;
use crate::native::{NativeError, SamplerDescriptor, ShaderBytecode, ShaderStage, TextureRegion};
use crate::resource::{
    IndexBufferDesc, PoolError, RenderTargetDesc, ResourceKind, TextureDesc, VertexBufferDesc,
};

/// Logs a creation failure and yields the `NULL` handle.
fn null_on_error(what: &str, result: Result<Handle, PoolError>) -> Handle {
    match result {
        Ok(handle) => {
            log::debug!("Translator: created {what} {handle}");
            handle
        }
        Err(e) => {
            log::warn!("Translator: failed to create {what}: {e}");
            Handle::NULL
        }
    }
}

impl From<PoolError> for SkipReason {
    fn from(error: PoolError) -> Self {
        match error {
            PoolError::Lookup(e) => SkipReason::Lookup(e),
            PoolError::Native(e) => SkipReason::Native(e),
            other => SkipReason::Native(NativeError::InvalidArgument(other.to_string())),
        }
    }
}

impl TranslatorState {
    pub(crate) fn create_shader(
        &mut self,
        stage: ShaderStage,
        bytecode: &ShaderBytecode,
    ) -> Result<Handle, TranslatorError> {
        match self.pools.create_shader(self.device.as_ref(), stage, bytecode) {
            Ok(handle) => {
                log::debug!("Translator: created {stage:?} shader {handle}");
                Ok(handle)
            }
            Err(PoolError::Native(NativeError::ShaderRejected(reason))) => {
                let label = bytecode
                    .label
                    .clone()
                    .unwrap_or_else(|| "unnamed".to_string());
                log::error!("Translator: {stage:?} shader '{label}' rejected: {reason}");
                Err(TranslatorError::ShaderRejected {
                    stage,
                    label,
                    reason,
                })
            }
            Err(e) => {
                log::warn!("Translator: failed to create {stage:?} shader: {e}");
                Ok(Handle::NULL)
            }
        }
    }

    pub(crate) fn destroy(&mut self, handle: Handle) {
        if handle.is_null() {
            return;
        }
        if self.pools.kind(handle) == Some(ResourceKind::ConstantBuffer) {
            log::warn!("Translator: constant buffer {handle} is translator-owned; ignoring destroy");
            return;
        }
        let device = self.device.clone();
        match self.pools.destroy(device.as_ref(), handle) {
            Some(ResourceKind::VertexShader) => {
                let purged = self.layouts.purge_shader(device.as_ref(), handle);
                log::debug!("Translator: destroyed vertex shader {handle}, purged {purged} input layouts");
            }
            Some(kind) => log::debug!("Translator: destroyed {kind} {handle}"),
            None => {
                log::debug!("Translator: destroy of unknown handle {handle} ignored");
                return;
            }
        }
        if self.fallback_pipeline == handle {
            self.fallback_pipeline = Handle::NULL;
        }
        if self.render_target == handle {
            self.render_target = Handle::NULL;
        }
    }

    /// Writes into a vertex or index buffer, growing it first if the write
    /// ends past its capacity.
    fn update_growable(
        &mut self,
        handle: Handle,
        kind: ResourceKind,
        offset: u64,
        data: &[u8],
    ) -> Result<(), SkipReason> {
        match kind {
            ResourceKind::VertexBuffer => {
                self.pools.vertex_buffer(handle)?;
            }
            _ => {
                self.pools.index_buffer(handle)?;
            }
        }
        if data.is_empty() {
            return Ok(());
        }
        let end = offset
            .checked_add(data.len() as u64)
            .ok_or(SkipReason::OutOfBounds)?;

        let outcome = self
            .growth
            .ensure_bytes(
                &mut self.pools,
                self.device.as_ref(),
                self.context.as_mut(),
                &mut self.committed,
                handle,
                end,
            )
            .map_err(|e| {
                log::warn!("Translator: buffer {handle} could not grow for upload: {e}");
                SkipReason::GrowthFailed(handle)
            })?;
        if let GrowthOutcome::Grown { .. } = outcome {
            self.stats.buffer_growths += 1;
        }

        let native = match self.pools.get_mut(handle).and_then(|r| r.growable_mut()) {
            Some((native, _, _)) => *native,
            None => return Err(SkipReason::GrowthFailed(handle)),
        };
        self.context.update_buffer(native, offset, data)?;
        Ok(())
    }

    pub(crate) fn update_texture(
        &mut self,
        handle: Handle,
        region: TextureRegion,
        data: &[u8],
    ) -> Result<(), SkipReason> {
        let record = self.pools.texture(handle)?;
        let fits = region
            .x
            .checked_add(region.width)
            .is_some_and(|right| right <= record.width)
            && region
                .y
                .checked_add(region.height)
                .is_some_and(|bottom| bottom <= record.height);
        let expected = region.width as u64 * region.height as u64 * record.format.bytes_per_texel() as u64;
        if !fits || (data.len() as u64) < expected {
            return Err(SkipReason::OutOfBounds);
        }
        let native = record.native;
        self.context.update_texture(native, region, data)?;
        Ok(())
    }
}

impl Translator {
    /// Creates a vertex buffer. Returns `NULL` if the description is invalid
    /// or the device refuses it.
    pub fn create_vertex_buffer(&self, desc: &VertexBufferDesc) -> Handle {
        let mut state = self.lock();
        let state = &mut *state;
        null_on_error(
            "vertex buffer",
            state.pools.create_vertex_buffer(state.device.as_ref(), desc),
        )
    }

    /// Creates an index buffer. Returns `NULL` on failure.
    pub fn create_index_buffer(&self, desc: &IndexBufferDesc) -> Handle {
        let mut state = self.lock();
        let state = &mut *state;
        null_on_error(
            "index buffer",
            state.pools.create_index_buffer(state.device.as_ref(), desc),
        )
    }

    /// Creates a sampled texture. Returns `NULL` on failure, including when
    /// the device does not support the format.
    pub fn create_texture(&self, desc: &TextureDesc) -> Handle {
        let mut state = self.lock();
        let state = &mut *state;
        null_on_error(
            "texture",
            state.pools.create_texture(state.device.as_ref(), desc),
        )
    }

    /// Creates a sampler. Returns `NULL` on failure.
    pub fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Handle {
        let mut state = self.lock();
        let state = &mut *state;
        null_on_error(
            "sampler",
            state.pools.create_sampler(state.device.as_ref(), descriptor),
        )
    }

    /// Creates a vertex shader.
    /// ## Errors
    /// * `TranslatorError::ShaderRejected` - If the device rejects the bytecode.
    ///
    /// Other device failures yield `Ok(Handle::NULL)`.
    pub fn create_vertex_shader(&self, bytecode: &ShaderBytecode) -> Result<Handle, TranslatorError> {
        self.lock().create_shader(ShaderStage::Vertex, bytecode)
    }

    /// Creates a pixel shader.
    /// ## Errors
    /// * `TranslatorError::ShaderRejected` - If the device rejects the bytecode.
    pub fn create_pixel_shader(&self, bytecode: &ShaderBytecode) -> Result<Handle, TranslatorError> {
        self.lock().create_shader(ShaderStage::Pixel, bytecode)
    }

    /// Pairs a vertex and a pixel shader. Returns `NULL` if either handle is
    /// not a shader of the right stage.
    pub fn create_pipeline(&self, vertex_shader: Handle, pixel_shader: Handle) -> Handle {
        null_on_error(
            "pipeline",
            self.lock().pools.create_pipeline(vertex_shader, pixel_shader),
        )
    }

    /// Creates an event query. Returns `NULL` on failure.
    pub fn create_query(&self) -> Handle {
        let mut state = self.lock();
        let state = &mut *state;
        null_on_error("query", state.pools.create_query(state.device.as_ref()))
    }

    /// Creates an offscreen render-target bundle. Returns `NULL` on failure.
    pub fn create_render_target(&self, desc: &RenderTargetDesc) -> Handle {
        let mut state = self.lock();
        let state = &mut *state;
        null_on_error(
            "render target",
            state.pools.create_render_target(state.device.as_ref(), desc),
        )
    }

    /// The texture handle of a render target's color attachment, for sampling
    /// what was rendered. `NULL` if `target` is not a render target.
    pub fn render_target_texture(&self, target: Handle) -> Handle {
        self.lock()
            .pools
            .render_target(target)
            .map(|r| r.color_texture)
            .unwrap_or(Handle::NULL)
    }

    /// Registers a recorded command list for replay.
    pub fn create_command_list(&self, builder: CommandListBuilder) -> Handle {
        let handle = self.lock().pools.create_command_list(builder.finish());
        log::debug!("Translator: created command list {handle}");
        handle
    }

    /// Destroys any resource. `NULL` and unknown handles are ignored.
    ///
    /// Destroying a vertex shader drops its cached input layouts. Bindings
    /// that still name the handle are dropped at the next draw.
    pub fn destroy(&self, handle: Handle) {
        self.lock().destroy(handle);
    }

    /// Writes `data` into a vertex buffer at byte `offset`, growing the buffer
    /// if the write ends past its capacity.
    pub fn update_vertex_buffer(
        &self,
        handle: Handle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), SkipReason> {
        self.lock()
            .update_growable(handle, ResourceKind::VertexBuffer, offset, data)
    }

    /// Writes `data` into an index buffer at byte `offset`, growing the buffer
    /// if the write ends past its capacity.
    pub fn update_index_buffer(
        &self,
        handle: Handle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), SkipReason> {
        self.lock()
            .update_growable(handle, ResourceKind::IndexBuffer, offset, data)
    }

    /// Writes tightly packed texel rows into a region of a texture.
    pub fn update_texture(
        &self,
        handle: Handle,
        region: TextureRegion,
        data: &[u8],
    ) -> Result<(), SkipReason> {
        self.lock().update_texture(handle, region, data)
    }
}
