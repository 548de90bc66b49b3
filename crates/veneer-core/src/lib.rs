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

//! # Veneer Core
//!
//! Translates immediate-mode rendering calls onto explicit-state native GPU
//! APIs: opaque handles for every resource, a mirror of the native binding
//! state so only changes are issued, input layouts cached per vertex format
//! and shader, buffers that grow on demand, and fence-paced frames.
//!
//! The native API itself is abstracted by [`native::NativeDevice`] and
//! [`native::NativeContext`]; backends implement those traits.

#![warn(missing_docs)]

mod binder;
pub mod command_list;
pub mod config;
pub mod error;
pub mod fence;
pub mod growth;
pub mod handle;
pub mod logging;
pub mod native;
pub mod resource;
pub mod state;
pub mod stats;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod translator;
pub mod vertex;

pub use command_list::{CommandListBuilder, CommandListReport};
pub use config::TranslatorConfig;
pub use error::{DrawOutcome, SkipReason, TranslatorError};
pub use fence::{FrameStatus, WaitPolicy};
pub use handle::Handle;
pub use logging::init_logging;
pub use stats::TranslatorStats;
pub use translator::{DrawCall, Translator};
pub use vertex::{ScalarType, VertexAttribute, VertexFormat, VertexUsage};
