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

//! Errors and recoverable outcomes at the translator boundary.

use crate::config::ConfigError;
use crate::handle::Handle;
use crate::native::{NativeError, ShaderStage};
use crate::resource::LookupError;
use thiserror::Error;

/// An error that crosses the translator boundary.
///
/// Everything else the translator encounters is recoverable and reported as
/// a [`SkipReason`] or a `NULL` handle.
#[derive(Debug, Error)]
pub enum TranslatorError {
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The device failed in a way the translator cannot work around, such as
    /// a lost device during a frame wait.
    #[error("Native device failure: {0}")]
    Native(#[from] NativeError),
    /// Shader bytecode failed validation. Hosts are expected to abort.
    #[error("{stage:?} shader '{label}' rejected: {reason}")]
    ShaderRejected {
        /// The stage the shader was created for.
        stage: ShaderStage,
        /// The bytecode's debug label.
        label: String,
        /// The device's explanation.
        reason: String,
    },
}

/// Why a call was skipped without reaching the device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    /// The draw named no vertex buffer.
    #[error("No vertex buffer")]
    NoVertexBuffer,
    /// The draw has zero vertices, indices or instances.
    #[error("Empty draw")]
    EmptyDraw,
    /// No pipeline resolved and no fallback is registered.
    #[error("No usable pipeline")]
    NoPipeline,
    /// A handle did not resolve.
    #[error(transparent)]
    Lookup(#[from] LookupError),
    /// Neither the draw nor the vertex buffer supplied a vertex format.
    #[error("No vertex format for buffer {0}")]
    NoVertexFormat(Handle),
    /// The vertex format cannot feed the vertex shader.
    #[error("Vertex format incompatible with vertex shader")]
    IncompatibleLayout,
    /// The buffer was too small and could not be grown.
    #[error("Buffer {0} could not be grown")]
    GrowthFailed(Handle),
    /// A unit or slot index is out of range.
    #[error("Slot {0} is out of range")]
    SlotOutOfRange(u32),
    /// A write falls outside the resource.
    #[error("Write outside resource bounds")]
    OutOfBounds,
    /// A native call failed.
    #[error(transparent)]
    Native(#[from] NativeError),
}

/// What happened to a draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawOutcome {
    /// The draw reached the native context.
    Drawn,
    /// The draw was skipped.
    Skipped(SkipReason),
}

impl DrawOutcome {
    /// Returns `true` for [`DrawOutcome::Drawn`].
    pub fn is_drawn(&self) -> bool {
        matches!(self, DrawOutcome::Drawn)
    }
}

impl From<Result<(), SkipReason>> for DrawOutcome {
    fn from(result: Result<(), SkipReason>) -> Self {
        match result {
            Ok(()) => DrawOutcome::Drawn,
            Err(reason) => DrawOutcome::Skipped(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_rejected_display() {
        let err = TranslatorError::ShaderRejected {
            stage: ShaderStage::Pixel,
            label: "sprite.ps".into(),
            reason: "bad opcode".into(),
        };
        assert_eq!(err.to_string(), "Pixel shader 'sprite.ps' rejected: bad opcode");
    }

    #[test]
    fn test_skip_reason_wraps_lookup() {
        let handle = Handle::from_raw(0x10);
        let reason: SkipReason = LookupError::NotFound(handle).into();
        assert_eq!(
            reason.to_string(),
            "No resource registered for handle 0x0000000000000010"
        );
    }

    #[test]
    fn test_outcome_from_result() {
        assert!(DrawOutcome::from(Ok(())).is_drawn());
        assert_eq!(
            DrawOutcome::from(Err(SkipReason::EmptyDraw)),
            DrawOutcome::Skipped(SkipReason::EmptyDraw)
        );
    }
}
