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

//! Errors reported by native device and context calls.

use thiserror::Error;

/// A failed native device or context call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NativeError {
    /// The device could not allocate the requested object.
    #[error("Native allocation failed: {0}")]
    OutOfMemory(String),
    /// A descriptor or argument was rejected by the device.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// An input layout does not satisfy the vertex shader's input signature.
    #[error("Input layout incompatible with shader signature: {0}")]
    IncompatibleLayout(String),
    /// Shader bytecode failed validation.
    #[error("Shader bytecode rejected: {0}")]
    ShaderRejected(String),
    /// The native object id is not known to the device.
    #[error("Unknown native object: {0}")]
    UnknownObject(String),
    /// The device stopped responding.
    #[error("Device lost: {0}")]
    DeviceLost(String),
    /// Any other backend failure.
    #[error("Backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_error_display() {
        let err = NativeError::IncompatibleLayout("missing COLOR0".to_string());
        assert_eq!(
            err.to_string(),
            "Input layout incompatible with shader signature: missing COLOR0"
        );
        let err = NativeError::DeviceLost("fence wait timed out".to_string());
        assert_eq!(err.to_string(), "Device lost: fence wait timed out");
    }
}
