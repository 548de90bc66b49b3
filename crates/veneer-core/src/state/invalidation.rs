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

//! Bindings the native context drops on its own when a shader changes.

use bitflags::bitflags;

bitflags! {
    /// Groups of committed bindings that a transition detaches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InvalidatedFields: u8 {
        /// All vertex-stage constant buffer slots.
        const VS_CONSTANT_BUFFERS = 1 << 0;
        /// All pixel-stage constant buffer slots.
        const PS_CONSTANT_BUFFERS = 1 << 1;
        /// All texture units.
        const TEXTURES = 1 << 2;
        /// All sampler units.
        const SAMPLERS = 1 << 3;
    }
}

/// A native binding change with implicit side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    /// A different vertex shader was bound.
    VertexShaderChanged,
    /// A different pixel shader was bound.
    PixelShaderChanged,
}

/// What each transition detaches.
pub const INVALIDATION_TABLE: &[(Transition, InvalidatedFields)] = &[
    (
        Transition::VertexShaderChanged,
        InvalidatedFields::VS_CONSTANT_BUFFERS,
    ),
    (
        Transition::PixelShaderChanged,
        InvalidatedFields::PS_CONSTANT_BUFFERS
            .union(InvalidatedFields::TEXTURES)
            .union(InvalidatedFields::SAMPLERS),
    ),
];

/// Looks up the fields a transition invalidates.
pub fn invalidated_by(transition: Transition) -> InvalidatedFields {
    INVALIDATION_TABLE
        .iter()
        .filter(|(t, _)| *t == transition)
        .fold(InvalidatedFields::empty(), |acc, (_, fields)| acc | *fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_shader_change_only_detaches_vertex_constants() {
        assert_eq!(
            invalidated_by(Transition::VertexShaderChanged),
            InvalidatedFields::VS_CONSTANT_BUFFERS
        );
    }

    #[test]
    fn test_pixel_shader_change_detaches_resources() {
        let fields = invalidated_by(Transition::PixelShaderChanged);
        assert!(fields.contains(InvalidatedFields::PS_CONSTANT_BUFFERS));
        assert!(fields.contains(InvalidatedFields::TEXTURES));
        assert!(fields.contains(InvalidatedFields::SAMPLERS));
        assert!(!fields.contains(InvalidatedFields::VS_CONSTANT_BUFFERS));
    }
}
