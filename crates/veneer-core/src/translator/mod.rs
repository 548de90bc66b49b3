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

//! The public translation entry point.
//!
//! A [`Translator`] owns a native context and every resource created through
//! it. Each public operation takes the translator's lock for its whole
//! duration, so a translator can be shared across threads while the context
//! itself is only ever driven by one of them at a time.

mod bindings;
mod draw;
mod frame;
mod resources;
mod state;

pub use self::draw::DrawCall;
pub(crate) use self::state::TranslatorState;

use crate::config::TranslatorConfig;
use crate::error::TranslatorError;
use crate::native::{NativeContext, NativeDevice};
use crate::resource::ResourcePools;
use crate::stats::TranslatorStats;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Translates immediate-mode rendering calls onto a native explicit-state device.
#[derive(Debug)]
pub struct Translator {
    state: Mutex<TranslatorState>,
}

impl Translator {
    /// Creates a translator driving `context`, creating objects on `device`.
    /// ## Errors
    /// * `TranslatorError::Config` - If `config` does not validate.
    /// * `TranslatorError::Native` - If the default sampler or frame fences cannot be created.
    pub fn new(
        device: Arc<dyn NativeDevice>,
        context: Box<dyn NativeContext>,
        config: TranslatorConfig,
    ) -> Result<Self, TranslatorError> {
        Self::with_pools(device, context, config, ResourcePools::new())
    }

    /// Like [`Translator::new`], with handles derived from a fixed key so runs
    /// are reproducible.
    pub fn with_handle_key(
        device: Arc<dyn NativeDevice>,
        context: Box<dyn NativeContext>,
        config: TranslatorConfig,
        key: u64,
    ) -> Result<Self, TranslatorError> {
        Self::with_pools(device, context, config, ResourcePools::with_key(key))
    }

    fn with_pools(
        device: Arc<dyn NativeDevice>,
        context: Box<dyn NativeContext>,
        config: TranslatorConfig,
        pools: ResourcePools,
    ) -> Result<Self, TranslatorError> {
        let frames = config.frames_in_flight;
        let units = config.texture_units;
        let state = TranslatorState::new(device, context, config, pools)?;
        log::info!("Translator: created with {frames} frames in flight and {units} texture units");
        Ok(Self {
            state: Mutex::new(state),
        })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, TranslatorState> {
        // A panic mid-operation leaves at worst a stale committed binding,
        // which the next diff corrects.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits for outstanding frames and releases every native object.
    /// ## Errors
    /// * `TranslatorError::Native` - If the GPU could not be drained. Objects are released anyway.
    pub fn shutdown(self) -> Result<(), TranslatorError> {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .shutdown()
    }

    /// Counters accumulated since creation.
    pub fn stats(&self) -> TranslatorStats {
        let state = self.lock();
        let mut stats = state.stats;
        stats.frames_submitted = state.fences.frames_submitted();
        stats
    }

    /// The configuration in effect.
    pub fn config(&self) -> TranslatorConfig {
        self.lock().config.clone()
    }

    /// Number of live resources, translator-owned constant buffers included.
    pub fn live_resources(&self) -> usize {
        self.lock().pools.len()
    }
}
