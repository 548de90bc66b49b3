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

//! Decoded vertex-attribute descriptors.

use crate::native::{Semantic, VertexElementFormat};
use xxhash_rust::xxh3::xxh3_64;

/// What a vertex attribute means to the shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum VertexUsage {
    Position,
    Normal,
    Color,
    TexCoord,
    Tangent,
    Binormal,
    BlendWeight,
    BlendIndices,
    PointSize,
}

impl VertexUsage {
    /// Number of distinct usages.
    pub const COUNT: usize = 9;

    /// The shader semantic this usage feeds.
    pub const fn semantic(self) -> Semantic {
        match self {
            VertexUsage::Position => Semantic::Position,
            VertexUsage::Normal => Semantic::Normal,
            VertexUsage::Color => Semantic::Color,
            VertexUsage::TexCoord => Semantic::TexCoord,
            VertexUsage::Tangent => Semantic::Tangent,
            VertexUsage::Binormal => Semantic::Binormal,
            VertexUsage::BlendWeight => Semantic::BlendWeight,
            VertexUsage::BlendIndices => Semantic::BlendIndices,
            VertexUsage::PointSize => Semantic::PointSize,
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// The scalar type of each component of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ScalarType {
    Float32,
    Float16,
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
}

/// One attribute of a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// What the attribute means.
    pub usage: VertexUsage,
    /// Scalar type of each component.
    pub scalar: ScalarType,
    /// Number of components, 1 to 4.
    pub components: u8,
    /// Whether integer components are normalized to `[0, 1]` or `[-1, 1]`.
    pub normalized: bool,
    /// Byte offset inside the vertex.
    pub offset: u32,
}

impl VertexAttribute {
    /// Creates an attribute.
    pub const fn new(
        usage: VertexUsage,
        scalar: ScalarType,
        components: u8,
        normalized: bool,
        offset: u32,
    ) -> Self {
        Self {
            usage,
            scalar,
            components,
            normalized,
            offset,
        }
    }

    /// The input-assembler format for this attribute, or `None` when the
    /// combination has no native equivalent.
    pub const fn element_format(&self) -> Option<VertexElementFormat> {
        use VertexElementFormat as F;
        let n = self.normalized;
        let format = match (self.scalar, self.components) {
            (ScalarType::Float32, 1) => F::Float32,
            (ScalarType::Float32, 2) => F::Float32x2,
            (ScalarType::Float32, 3) => F::Float32x3,
            (ScalarType::Float32, 4) => F::Float32x4,
            (ScalarType::Float16, 2) => F::Float16x2,
            (ScalarType::Float16, 4) => F::Float16x4,
            (ScalarType::Uint8, 2) => {
                if n {
                    F::Unorm8x2
                } else {
                    F::Uint8x2
                }
            }
            (ScalarType::Uint8, 4) => {
                if n {
                    F::Unorm8x4
                } else {
                    F::Uint8x4
                }
            }
            (ScalarType::Int8, 2) => {
                if n {
                    F::Snorm8x2
                } else {
                    F::Sint8x2
                }
            }
            (ScalarType::Int8, 4) => {
                if n {
                    F::Snorm8x4
                } else {
                    F::Sint8x4
                }
            }
            (ScalarType::Uint16, 2) => {
                if n {
                    F::Unorm16x2
                } else {
                    F::Uint16x2
                }
            }
            (ScalarType::Uint16, 4) => {
                if n {
                    F::Unorm16x4
                } else {
                    F::Uint16x4
                }
            }
            (ScalarType::Int16, 2) => {
                if n {
                    F::Snorm16x2
                } else {
                    F::Sint16x2
                }
            }
            (ScalarType::Int16, 4) => {
                if n {
                    F::Snorm16x4
                } else {
                    F::Sint16x4
                }
            }
            (ScalarType::Uint32, c) if !n => match c {
                1 => F::Uint32,
                2 => F::Uint32x2,
                3 => F::Uint32x3,
                4 => F::Uint32x4,
                _ => return None,
            },
            (ScalarType::Int32, c) if !n => match c {
                1 => F::Sint32,
                2 => F::Sint32x2,
                3 => F::Sint32x3,
                4 => F::Sint32x4,
                _ => return None,
            },
            _ => return None,
        };
        Some(format)
    }
}

/// The full byte layout of one vertex.
///
/// The content hash is computed once at construction and keys the input
/// layout cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexFormat {
    attributes: Vec<VertexAttribute>,
    stride: u32,
    hash: u64,
}

impl VertexFormat {
    /// Creates a vertex format from its attributes and vertex stride.
    pub fn new(stride: u32, attributes: Vec<VertexAttribute>) -> Self {
        let hash = Self::compute_hash(stride, &attributes);
        Self {
            attributes,
            stride,
            hash,
        }
    }

    fn compute_hash(stride: u32, attributes: &[VertexAttribute]) -> u64 {
        let mut bytes = Vec::with_capacity(4 + attributes.len() * 8);
        bytes.extend_from_slice(&stride.to_le_bytes());
        for attribute in attributes {
            bytes.push(attribute.usage as u8);
            bytes.push(attribute.scalar as u8);
            bytes.push(attribute.components);
            bytes.push(attribute.normalized as u8);
            bytes.extend_from_slice(&attribute.offset.to_le_bytes());
        }
        xxh3_64(&bytes)
    }

    /// The attributes, in vertex order.
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Byte distance between consecutive vertices.
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// The xxh3 hash of the descriptor contents.
    pub fn content_hash(&self) -> u64 {
        self.hash
    }

    /// Returns `true` if any attribute has the given usage.
    pub fn has_usage(&self, usage: VertexUsage) -> bool {
        self.attributes.iter().any(|a| a.usage == usage)
    }

    /// Semantic index of each attribute: indices ascend separately per usage,
    /// in attribute order.
    pub(crate) fn semantic_indices(&self) -> Vec<u32> {
        let mut next = [0u32; VertexUsage::COUNT];
        self.attributes
            .iter()
            .map(|a| {
                let slot = &mut next[a.usage.index()];
                let index = *slot;
                *slot += 1;
                index
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position_uv() -> VertexFormat {
        VertexFormat::new(
            20,
            vec![
                VertexAttribute::new(VertexUsage::Position, ScalarType::Float32, 3, false, 0),
                VertexAttribute::new(VertexUsage::TexCoord, ScalarType::Float32, 2, false, 12),
            ],
        )
    }

    #[test]
    fn test_hash_is_stable_and_content_based() {
        assert_eq!(position_uv().content_hash(), position_uv().content_hash());

        let shifted = VertexFormat::new(
            24,
            vec![
                VertexAttribute::new(VertexUsage::Position, ScalarType::Float32, 3, false, 0),
                VertexAttribute::new(VertexUsage::TexCoord, ScalarType::Float32, 2, false, 12),
            ],
        );
        assert_ne!(position_uv().content_hash(), shifted.content_hash());
    }

    #[test]
    fn test_element_format_mapping() {
        let color = VertexAttribute::new(VertexUsage::Color, ScalarType::Uint8, 4, true, 0);
        assert_eq!(color.element_format(), Some(VertexElementFormat::Unorm8x4));

        let indices = VertexAttribute::new(VertexUsage::BlendIndices, ScalarType::Uint8, 4, false, 0);
        assert_eq!(indices.element_format(), Some(VertexElementFormat::Uint8x4));

        let half = VertexAttribute::new(VertexUsage::TexCoord, ScalarType::Float16, 2, false, 0);
        assert_eq!(half.element_format(), Some(VertexElementFormat::Float16x2));
    }

    #[test]
    fn test_unmappable_combinations() {
        let three_bytes = VertexAttribute::new(VertexUsage::Color, ScalarType::Uint8, 3, true, 0);
        assert_eq!(three_bytes.element_format(), None);

        let normalized_int32 =
            VertexAttribute::new(VertexUsage::Normal, ScalarType::Int32, 3, true, 0);
        assert_eq!(normalized_int32.element_format(), None);

        let five = VertexAttribute::new(VertexUsage::Position, ScalarType::Float32, 5, false, 0);
        assert_eq!(five.element_format(), None);
    }

    #[test]
    fn test_semantic_indices_ascend_per_usage() {
        let format = VertexFormat::new(
            40,
            vec![
                VertexAttribute::new(VertexUsage::Position, ScalarType::Float32, 3, false, 0),
                VertexAttribute::new(VertexUsage::TexCoord, ScalarType::Float32, 2, false, 12),
                VertexAttribute::new(VertexUsage::Color, ScalarType::Uint8, 4, true, 20),
                VertexAttribute::new(VertexUsage::TexCoord, ScalarType::Float32, 2, false, 24),
                VertexAttribute::new(VertexUsage::TexCoord, ScalarType::Float32, 2, false, 32),
            ],
        );
        assert_eq!(format.semantic_indices(), vec![0, 0, 0, 1, 2]);
    }
}
