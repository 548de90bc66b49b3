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

//! Per-draw binding: shaders, input layout, constants, textures and render state.
//!
//! Each step compares against the committed state and only issues native
//! calls for what changed. The order mirrors what the native context needs:
//! shaders first (which may detach constants and textures), then the input
//! layout, then everything the shaders read.

use crate::error::SkipReason;
use crate::handle::Handle;
use crate::native::{NativeSamplerId, NativeShaderId, PrimitiveTopology, RenderTargets, ShaderStage};
use crate::resource::{LookupError, PipelineLayoutSlot};
use crate::state::{IndexBufferBinding, VertexBufferBinding, CONSTANT_BUFFER_SLOTS};
use crate::translator::TranslatorState;
use crate::vertex::{LayoutResolution, VertexFormat};

/// A pipeline whose shaders all resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResolvedPipeline {
    pub(crate) handle: Handle,
    pub(crate) vertex_shader: Handle,
    pub(crate) vertex_native: NativeShaderId,
    pub(crate) pixel_native: NativeShaderId,
}

impl TranslatorState {
    fn resolve_pipeline_handle(&self, pipeline: Handle) -> Result<ResolvedPipeline, LookupError> {
        let record = self.pools.pipeline(pipeline)?;
        let vertex = self.pools.vertex_shader(record.vertex_shader)?;
        let pixel = self.pools.pixel_shader(record.pixel_shader)?;
        Ok(ResolvedPipeline {
            handle: pipeline,
            vertex_shader: record.vertex_shader,
            vertex_native: vertex.native,
            pixel_native: pixel.native,
        })
    }

    /// Resolves the bound pipeline, substituting the fallback when it does not resolve.
    pub(crate) fn resolve_pipeline(&mut self) -> Result<ResolvedPipeline, SkipReason> {
        let error = match self.resolve_pipeline_handle(self.pipeline) {
            Ok(resolved) => return Ok(resolved),
            Err(e) => e,
        };
        if !self.fallback_pipeline.is_null() && self.fallback_pipeline != self.pipeline {
            if let Ok(resolved) = self.resolve_pipeline_handle(self.fallback_pipeline) {
                log::debug!(
                    "Pipeline {} unavailable ({error}); using fallback {}",
                    self.pipeline,
                    self.fallback_pipeline
                );
                self.stats.fallback_pipeline_uses += 1;
                return Ok(resolved);
            }
        }
        if self.pipeline.is_null() {
            Err(SkipReason::NoPipeline)
        } else {
            Err(error.into())
        }
    }

    /// Binds the pipeline's shaders and re-asserts the constant buffers they may have dropped.
    pub(crate) fn apply_pipeline(&mut self, pipeline: &ResolvedPipeline) {
        let (issued, invalidated) = self.committed.bind_shaders(
            self.context.as_mut(),
            pipeline.vertex_native,
            pipeline.pixel_native,
        );
        self.stats.binds_issued += issued as u64;
        if issued == 0 {
            self.stats.binds_elided += 1;
        } else {
            log::trace!(
                "Bound pipeline {} ({issued} shader binds, invalidated {invalidated:?})",
                pipeline.handle
            );
        }
        self.committed.pipeline = pipeline.handle;
        self.apply_constant_buffers();
    }

    /// Resolves and binds the input layout for `format` against the pipeline's vertex shader.
    pub(crate) fn apply_input_layout(
        &mut self,
        pipeline: &ResolvedPipeline,
        format: &VertexFormat,
    ) -> Result<(), SkipReason> {
        let hash = format.content_hash();
        let slot = self
            .pools
            .pipeline(pipeline.handle)
            .ok()
            .and_then(|p| p.layout)
            .filter(|slot| slot.format_hash == hash);

        let resolution = match slot {
            Some(slot) => {
                self.stats.layout_cache_hits += 1;
                slot.resolution
            }
            None => {
                let misses = self.layouts.misses();
                let resolution = self.layouts.get_or_create(
                    self.device.as_ref(),
                    pipeline.vertex_shader,
                    pipeline.vertex_native,
                    format,
                );
                if self.layouts.misses() > misses {
                    self.stats.layout_cache_misses += 1;
                } else {
                    self.stats.layout_cache_hits += 1;
                }
                // Transient device failures leave the slot empty so the next draw retries.
                let resolution = resolution?;
                if let Ok(record) = self.pools.pipeline_mut(pipeline.handle) {
                    record.layout = Some(PipelineLayoutSlot {
                        format_hash: hash,
                        resolution,
                    });
                }
                resolution
            }
        };

        match resolution {
            LayoutResolution::Ready(layout) => {
                let issued = self
                    .committed
                    .bind_input_layout(self.context.as_mut(), layout);
                self.stats.record_bind(issued);
                Ok(())
            }
            LayoutResolution::Incompatible => Err(SkipReason::IncompatibleLayout),
        }
    }

    /// Binds every stage constant buffer the caller has written.
    pub(crate) fn apply_constant_buffers(&mut self) {
        for stage in ShaderStage::ALL {
            for slot in 0..CONSTANT_BUFFER_SLOTS {
                let handle = self.stage_constants[stage.index()][slot];
                let desired = if handle.is_null() {
                    None
                } else {
                    self.pools.constant_buffer(handle).ok().map(|r| r.native)
                };
                let issued = self.committed.bind_constant_buffer(
                    self.context.as_mut(),
                    stage,
                    slot,
                    desired,
                );
                if issued || desired.is_some() {
                    self.stats.record_bind(issued);
                }
            }
        }
    }

    fn sampler_for(&self, sampler: Handle) -> NativeSamplerId {
        if sampler.is_null() {
            return self.default_sampler;
        }
        match self.pools.sampler(sampler) {
            Ok(record) => record.native,
            Err(e) => {
                log::debug!("Texture sampler unavailable ({e}); using default sampler");
                self.default_sampler
            }
        }
    }

    /// Binds each texture unit's view and the texture's sampler.
    pub(crate) fn apply_textures(&mut self) {
        for unit in 0..self.texture_units.len() {
            let texture = self.texture_units[unit];
            let (view, sampler) = if texture.is_null() {
                (None, None)
            } else {
                match self.pools.texture(texture) {
                    Ok(record) => (Some(record.view), Some(self.sampler_for(record.sampler))),
                    Err(e) => {
                        log::debug!("Texture unit {unit} left empty: {e}");
                        (None, None)
                    }
                }
            };
            let context = self.context.as_mut();
            let view_issued = self.committed.bind_shader_resource(context, unit, view);
            let sampler_issued = self.committed.bind_sampler(context, unit, sampler);
            if view_issued || view.is_some() {
                self.stats.record_bind(view_issued);
            }
            if sampler_issued || sampler.is_some() {
                self.stats.record_bind(sampler_issued);
            }
        }
    }

    /// Binds the vertex buffer with vertices `stride` bytes apart.
    pub(crate) fn apply_vertex_buffer(
        &mut self,
        buffer: Handle,
        stride: u32,
    ) -> Result<(), SkipReason> {
        let record = self.pools.vertex_buffer(buffer)?;
        let binding = VertexBufferBinding {
            buffer,
            native: record.native,
            stride,
            offset: 0,
        };
        let issued = self
            .committed
            .bind_vertex_buffer(self.context.as_mut(), binding);
        self.stats.record_bind(issued);
        Ok(())
    }

    /// Binds the index buffer.
    pub(crate) fn apply_index_buffer(&mut self, buffer: Handle) -> Result<(), SkipReason> {
        let record = self.pools.index_buffer(buffer)?;
        let binding = IndexBufferBinding {
            buffer,
            native: record.native,
            format: record.format,
            offset: 0,
        };
        let issued = self
            .committed
            .bind_index_buffer(self.context.as_mut(), binding);
        self.stats.record_bind(issued);
        Ok(())
    }

    /// Resolves the requested render state to native objects and binds them.
    pub(crate) fn apply_render_state(&mut self) -> Result<(), SkipReason> {
        let resolved = self
            .render_states
            .resolve(self.device.as_ref(), &self.requested)?;
        let context = self.context.as_mut();
        let mut decisions = vec![
            self.committed.bind_depth_stencil_state(context, resolved.depth),
            self.committed.bind_blend_state(context, resolved.blend),
            self.committed.bind_rasterizer_state(context, resolved.raster),
        ];
        if let Some(rect) = self.requested.scissor {
            decisions.push(self.committed.bind_scissor(context, rect));
        }
        if let Some(viewport) = self.requested.viewport {
            decisions.push(self.committed.bind_viewport(context, viewport));
        }
        for issued in decisions {
            self.stats.record_bind(issued);
        }
        Ok(())
    }

    /// Binds the selected render target, or the default back buffer when the
    /// selected bundle no longer exists.
    pub(crate) fn apply_render_targets(&mut self) -> RenderTargets {
        let targets = if self.render_target.is_null() {
            RenderTargets::DEFAULT
        } else {
            match self.pools.render_target(self.render_target) {
                Ok(record) => record.targets(),
                Err(e) => {
                    log::debug!("Render target unavailable ({e}); drawing to the back buffer");
                    self.render_target = Handle::NULL;
                    RenderTargets::DEFAULT
                }
            }
        };
        let issued = self
            .committed
            .bind_render_targets(self.context.as_mut(), targets);
        self.stats.record_bind(issued);
        targets
    }

    /// Sets the primitive topology.
    pub(crate) fn apply_topology(&mut self, topology: PrimitiveTopology) {
        let issued = self
            .committed
            .bind_topology(self.context.as_mut(), topology);
        self.stats.record_bind(issued);
    }
}
