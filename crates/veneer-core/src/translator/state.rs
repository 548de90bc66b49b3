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

//! State owned by a translator behind its mutex.

use crate::config::TranslatorConfig;
use crate::error::TranslatorError;
use crate::fence::FrameFenceRing;
use crate::growth::BufferGrowth;
use crate::handle::Handle;
use crate::native::{NativeContext, NativeDevice, NativeSamplerId, SamplerDescriptor};
use crate::resource::ResourcePools;
use crate::state::{CommittedState, RenderStateCache, RequestedRenderState, CONSTANT_BUFFER_SLOTS};
use crate::stats::TranslatorStats;
use crate::vertex::InputLayoutCache;
use std::sync::Arc;

/// Everything a translator mutates. Only accessed with the translator's lock held.
#[derive(Debug)]
pub(crate) struct TranslatorState {
    pub(crate) device: Arc<dyn NativeDevice>,
    pub(crate) context: Box<dyn NativeContext>,
    pub(crate) config: TranslatorConfig,
    pub(crate) pools: ResourcePools,
    pub(crate) committed: CommittedState,
    pub(crate) layouts: InputLayoutCache,
    pub(crate) render_states: RenderStateCache,
    pub(crate) requested: RequestedRenderState,
    pub(crate) fences: FrameFenceRing,
    pub(crate) growth: BufferGrowth,
    /// Translator-owned constant buffers, per stage and slot.
    pub(crate) stage_constants: [[Handle; CONSTANT_BUFFER_SLOTS]; 2],
    /// The pipeline selected by `bind_pipeline`.
    pub(crate) pipeline: Handle,
    pub(crate) fallback_pipeline: Handle,
    /// The texture selected for each unit.
    pub(crate) texture_units: Vec<Handle>,
    pub(crate) default_sampler: NativeSamplerId,
    /// The render-target bundle selected by `bind_render_target`. `NULL` is the back buffer.
    pub(crate) render_target: Handle,
    pub(crate) stats: TranslatorStats,
}

impl TranslatorState {
    pub(crate) fn new(
        device: Arc<dyn NativeDevice>,
        context: Box<dyn NativeContext>,
        config: TranslatorConfig,
        pools: ResourcePools,
    ) -> Result<Self, TranslatorError> {
        config.validate()?;

        let default_sampler = device.create_sampler(&SamplerDescriptor::default())?;
        let fences = match FrameFenceRing::new(
            device.as_ref(),
            config.frames_in_flight,
            config.fence_poll_spins,
        ) {
            Ok(fences) => fences,
            Err(e) => {
                if let Err(e) = device.destroy_sampler(default_sampler) {
                    log::warn!("Failed to release default sampler: {e}");
                }
                return Err(e.into());
            }
        };

        Ok(Self {
            committed: CommittedState::new(config.texture_units),
            texture_units: vec![Handle::NULL; config.texture_units],
            growth: BufferGrowth::new(config.growth_factor),
            device,
            context,
            pools,
            layouts: InputLayoutCache::new(),
            render_states: RenderStateCache::new(),
            requested: RequestedRenderState::default(),
            fences,
            stage_constants: [[Handle::NULL; CONSTANT_BUFFER_SLOTS]; 2],
            pipeline: Handle::NULL,
            fallback_pipeline: Handle::NULL,
            default_sampler,
            render_target: Handle::NULL,
            stats: TranslatorStats::default(),
            config,
        })
    }

    /// Waits for the GPU and releases every native object.
    pub(crate) fn shutdown(self) -> Result<(), TranslatorError> {
        let TranslatorState {
            device,
            mut context,
            mut pools,
            mut layouts,
            mut render_states,
            mut fences,
            default_sampler,
            ..
        } = self;

        let drained = fences.drain(context.as_mut());
        if let Err(e) = &drained {
            log::warn!("Translator: GPU did not drain before shutdown: {e}");
        }

        layouts.clear(device.as_ref());
        render_states.clear(device.as_ref());
        let live = pools.len();
        pools.destroy_all(device.as_ref());
        if let Err(e) = device.destroy_sampler(default_sampler) {
            log::warn!("Failed to release default sampler: {e}");
        }
        fences.destroy(device.as_ref());

        log::info!("Translator: shut down, released {live} resources");
        drained.map_err(TranslatorError::from)
    }
}
