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

//! Memoized input layouts, keyed on (vertex format, vertex shader).

use super::format::VertexFormat;
use crate::handle::{mix64, Handle};
use crate::native::{
    AlignedByteOffset, InputElement, NativeDevice, NativeError, NativeInputLayoutId,
    NativeShaderId,
};
use std::collections::HashMap;

/// Cache key: the format's content hash mixed with the vertex shader handle.
///
/// Distinct (format, shader) pairs may collide on the key; entries remember
/// their full composite so a collision is detected instead of aliased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputLayoutCacheKey(pub u64);

impl InputLayoutCacheKey {
    /// Derives the key for a format hash and a vertex shader.
    pub fn new(format_hash: u64, vertex_shader: Handle) -> Self {
        Self(format_hash ^ mix64(vertex_shader.to_raw()))
    }
}

/// The outcome of resolving an input layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutResolution {
    /// A native layout exists and can be bound.
    Ready(NativeInputLayoutId),
    /// The format cannot feed the shader. Draws using the pair are skipped.
    Incompatible,
}

#[derive(Debug)]
struct CacheEntry {
    vertex_shader: Handle,
    format_hash: u64,
    resolution: LayoutResolution,
}

/// Memoizes input layouts so each (format, shader) pair is validated once.
///
/// Layouts displaced by a key collision stay alive until their shader is
/// purged, since pipelines may still hold them in their layout slot.
#[derive(Debug, Default)]
pub struct InputLayoutCache {
    entries: HashMap<InputLayoutCacheKey, CacheEntry>,
    displaced: Vec<CacheEntry>,
    hits: u64,
    misses: u64,
}

impl InputLayoutCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the layout for `format` against `vertex_shader`, creating it on a miss.
    ///
    /// Rejection by the device caches [`LayoutResolution::Incompatible`]. Other
    /// device failures are returned as errors and leave the cache untouched,
    /// so a later call retries the creation.
    pub fn get_or_create(
        &mut self,
        device: &dyn NativeDevice,
        vertex_shader: Handle,
        vertex_shader_native: NativeShaderId,
        format: &VertexFormat,
    ) -> Result<LayoutResolution, NativeError> {
        let key = InputLayoutCacheKey::new(format.content_hash(), vertex_shader);

        if let Some(entry) = self.entries.get(&key) {
            if entry.vertex_shader == vertex_shader && entry.format_hash == format.content_hash() {
                self.hits += 1;
                return Ok(entry.resolution);
            }
            log::debug!(
                "Input layout key {:#x} collides between shader {} and {}; rebuilding",
                key.0,
                entry.vertex_shader,
                vertex_shader
            );
            if let Some(stale) = self.entries.remove(&key) {
                self.displaced.push(stale);
            }
        }

        self.misses += 1;
        let resolution = match build_elements(format) {
            None => {
                log::debug!(
                    "Vertex format {:#x} has no native element mapping",
                    format.content_hash()
                );
                LayoutResolution::Incompatible
            }
            Some(elements) => match device.create_input_layout(&elements, vertex_shader_native) {
                Ok(id) => LayoutResolution::Ready(id),
                Err(NativeError::IncompatibleLayout(reason))
                | Err(NativeError::InvalidArgument(reason)) => {
                    log::debug!(
                        "Vertex format {:#x} cannot feed shader {}: {}",
                        format.content_hash(),
                        vertex_shader,
                        reason
                    );
                    LayoutResolution::Incompatible
                }
                Err(e) => {
                    log::warn!("Failed to create input layout: {e}");
                    return Err(e);
                }
            },
        };

        self.entries.insert(
            key,
            CacheEntry {
                vertex_shader,
                format_hash: format.content_hash(),
                resolution,
            },
        );
        Ok(resolution)
    }

    /// Drops every entry created for `vertex_shader`, releasing the native
    /// layouts. Returns the number of entries dropped.
    pub fn purge_shader(&mut self, device: &dyn NativeDevice, vertex_shader: Handle) -> usize {
        let keys: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, e)| e.vertex_shader == vertex_shader)
            .map(|(k, _)| *k)
            .collect();
        for key in &keys {
            if let Some(entry) = self.entries.remove(key) {
                Self::destroy_entry(device, entry);
            }
        }
        let (purged, kept): (Vec<_>, Vec<_>) = self
            .displaced
            .drain(..)
            .partition(|e| e.vertex_shader == vertex_shader);
        self.displaced = kept;
        let displaced = purged.len();
        for entry in purged {
            Self::destroy_entry(device, entry);
        }
        keys.len() + displaced
    }

    /// Drops every entry, releasing the native layouts.
    pub fn clear(&mut self, device: &dyn NativeDevice) {
        let displaced = std::mem::take(&mut self.displaced);
        for entry in self.entries.drain().map(|(_, e)| e).chain(displaced) {
            Self::destroy_entry(device, entry);
        }
    }

    fn destroy_entry(device: &dyn NativeDevice, entry: CacheEntry) {
        if let LayoutResolution::Ready(id) = entry.resolution {
            if let Err(e) = device.destroy_input_layout(id) {
                log::warn!("Failed to destroy input layout {id:?}: {e}");
            }
        }
    }

    /// Number of cached entries, incompatible ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lookups answered from the cache.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Lookups that had to build a layout.
    pub fn misses(&self) -> u64 {
        self.misses
    }
}

/// Maps a vertex format to input elements. The first element sits at offset 0
/// and the rest are packed after it.
fn build_elements(format: &VertexFormat) -> Option<Vec<InputElement>> {
    let indices = format.semantic_indices();
    format
        .attributes()
        .iter()
        .zip(indices)
        .enumerate()
        .map(|(i, (attribute, semantic_index))| {
            Some(InputElement {
                semantic: attribute.usage.semantic(),
                semantic_index,
                format: attribute.element_format()?,
                offset: if i == 0 {
                    AlignedByteOffset::Explicit(0)
                } else {
                    AlignedByteOffset::Append
                },
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{ComponentType, Semantic, ShaderBytecode, SignatureElement, VertexElementFormat};
    use crate::testing::{NativeCall, RecordingDevice};
    use crate::vertex::{ScalarType, VertexAttribute, VertexUsage};

    fn signature(semantics: &[Semantic]) -> Vec<SignatureElement> {
        semantics
            .iter()
            .enumerate()
            .map(|(i, s)| SignatureElement {
                semantic: *s,
                semantic_index: 0,
                component_type: ComponentType::Float,
                location: i as u32,
            })
            .collect()
    }

    fn format_pos_uv() -> VertexFormat {
        VertexFormat::new(
            20,
            vec![
                VertexAttribute::new(VertexUsage::Position, ScalarType::Float32, 3, false, 0),
                VertexAttribute::new(VertexUsage::TexCoord, ScalarType::Float32, 2, false, 12),
            ],
        )
    }

    #[test]
    fn test_build_elements_offsets() {
        let elements = build_elements(&format_pos_uv()).unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].semantic, Semantic::Position);
        assert_eq!(elements[0].offset, AlignedByteOffset::Explicit(0));
        assert_eq!(elements[1].format, VertexElementFormat::Float32x2);
        assert_eq!(elements[1].offset, AlignedByteOffset::Append);
    }

    #[test]
    fn test_hit_after_miss() {
        let (device, _context) = RecordingDevice::new();
        let vs = device
            .create_vertex_shader(
                &ShaderBytecode::new("vs").with_signature(signature(&[Semantic::Position, Semantic::TexCoord])),
            )
            .unwrap();
        let mut cache = InputLayoutCache::new();
        let handle = Handle::from_raw(0x55);

        let first = cache.get_or_create(&device, handle, vs, &format_pos_uv()).unwrap();
        let second = cache.get_or_create(&device, handle, vs, &format_pos_uv()).unwrap();
        assert!(matches!(first, LayoutResolution::Ready(_)));
        assert_eq!(first, second);
        assert_eq!((cache.hits(), cache.misses()), (1, 1));
        assert_eq!(device.count_calls(|c| matches!(c, NativeCall::CreateInputLayout { .. })), 1);
    }

    #[test]
    fn test_shaders_get_independent_entries() {
        let (device, _context) = RecordingDevice::new();
        let sig = signature(&[Semantic::Position, Semantic::TexCoord]);
        let vs_a = device
            .create_vertex_shader(&ShaderBytecode::new("a").with_signature(sig.clone()))
            .unwrap();
        let vs_b = device
            .create_vertex_shader(&ShaderBytecode::new("b").with_signature(sig))
            .unwrap();
        let mut cache = InputLayoutCache::new();

        let a = cache.get_or_create(&device, Handle::from_raw(1), vs_a, &format_pos_uv()).unwrap();
        let b = cache.get_or_create(&device, Handle::from_raw(2), vs_b, &format_pos_uv()).unwrap();
        assert_ne!(a, b);
        assert_eq!(cache.len(), 2);

        assert_eq!(cache.purge_shader(&device, Handle::from_raw(1)), 1);
        assert_eq!(cache.len(), 1);
        let b_again = cache.get_or_create(&device, Handle::from_raw(2), vs_b, &format_pos_uv()).unwrap();
        assert_eq!(b, b_again);
    }

    #[test]
    fn test_missing_semantic_is_cached_incompatible() {
        let (device, _context) = RecordingDevice::new();
        let vs = device
            .create_vertex_shader(&ShaderBytecode::new("vs").with_signature(signature(&[
                Semantic::Position,
                Semantic::TexCoord,
                Semantic::Color,
            ])))
            .unwrap();
        let mut cache = InputLayoutCache::new();
        let handle = Handle::from_raw(3);

        assert_eq!(
            cache.get_or_create(&device, handle, vs, &format_pos_uv()).unwrap(),
            LayoutResolution::Incompatible
        );
        assert_eq!(
            cache.get_or_create(&device, handle, vs, &format_pos_uv()).unwrap(),
            LayoutResolution::Incompatible
        );
        assert_eq!(device.count_calls(|c| matches!(c, NativeCall::CreateInputLayout { .. })), 1);
    }

    #[test]
    fn test_transient_failure_is_not_cached() {
        let (device, _context) = RecordingDevice::new();
        let sig = signature(&[Semantic::Position, Semantic::TexCoord]);
        let vs = device
            .create_vertex_shader(&ShaderBytecode::new("vs").with_signature(sig))
            .unwrap();
        let mut cache = InputLayoutCache::new();
        let handle = Handle::from_raw(4);
        device.set_fail_input_layouts(1);

        let first = cache.get_or_create(&device, handle, vs, &format_pos_uv());
        assert!(matches!(first, Err(NativeError::OutOfMemory(_))));
        assert!(cache.is_empty());

        let second = cache.get_or_create(&device, handle, vs, &format_pos_uv()).unwrap();
        assert!(matches!(second, LayoutResolution::Ready(_)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_key_collision_rebuilds() {
        let (device, _context) = RecordingDevice::new();
        let sig = signature(&[Semantic::Position, Semantic::TexCoord]);
        let vs = device
            .create_vertex_shader(&ShaderBytecode::new("vs").with_signature(sig))
            .unwrap();
        let format = format_pos_uv();

        // Forge a second shader handle whose key matches the first one's.
        let first = Handle::from_raw(10);
        let key = InputLayoutCacheKey::new(format.content_hash(), first);
        let mut cache = InputLayoutCache::new();
        cache.get_or_create(&device, first, vs, &format).unwrap();
        cache.entries.get_mut(&key).unwrap().vertex_shader = Handle::from_raw(11);

        cache.get_or_create(&device, first, vs, &format).unwrap();
        assert_eq!(cache.misses(), 2);
        assert_eq!(cache.len(), 1);
        // The displaced layout survives until its shader goes away.
        assert_eq!(device.count_calls(|c| matches!(c, NativeCall::DestroyInputLayout(_))), 0);
        assert_eq!(cache.purge_shader(&device, Handle::from_raw(11)), 1);
        assert_eq!(device.count_calls(|c| matches!(c, NativeCall::DestroyInputLayout(_))), 1);
    }
}
