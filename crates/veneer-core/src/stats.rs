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

//! Counters describing what the translator did.

/// Running totals since the translator was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TranslatorStats {
    /// Native bind calls issued.
    pub binds_issued: u64,
    /// Binds skipped because the committed state already matched.
    pub binds_elided: u64,
    /// Draws submitted to the native context.
    pub draws_issued: u64,
    /// Draws skipped for any recoverable reason.
    pub draws_skipped: u64,
    /// Buffers reallocated by the growth engine.
    pub buffer_growths: u64,
    /// Input layout lookups answered from the cache.
    pub layout_cache_hits: u64,
    /// Input layout lookups that built a layout.
    pub layout_cache_misses: u64,
    /// Times the fallback pipeline stood in for a missing one.
    pub fallback_pipeline_uses: u64,
    /// Frames signaled on the fence ring.
    pub frames_submitted: u64,
}

impl TranslatorStats {
    /// Counts one bind decision.
    pub(crate) fn record_bind(&mut self, issued: bool) {
        if issued {
            self.binds_issued += 1;
        } else {
            self.binds_elided += 1;
        }
    }
}
