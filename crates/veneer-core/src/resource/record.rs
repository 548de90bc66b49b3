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

//! Records stored behind translator handles.

use crate::command_list::RecordedCommand;
use crate::handle::Handle;
use crate::native::*;
use crate::vertex::{LayoutResolution, VertexFormat};
use std::fmt;
use std::sync::Arc;

/// The kind of resource a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ResourceKind {
    VertexBuffer,
    IndexBuffer,
    ConstantBuffer,
    Texture,
    VertexShader,
    PixelShader,
    Sampler,
    Pipeline,
    Query,
    RenderTarget,
    CommandList,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Size and element stride of a vertex or index buffer. Updated in place when
/// the buffer grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCapacity {
    /// Current size in bytes.
    pub size: u64,
    /// Logical byte size of one element.
    pub stride: u32,
}

impl BufferCapacity {
    /// Bytes needed to address `count` elements starting at `first`, or `None` on overflow.
    pub fn required_bytes(&self, first: u64, count: u64) -> Option<u64> {
        first.checked_add(count)?.checked_mul(self.stride as u64)
    }
}

/// A vertex buffer.
#[derive(Debug, Clone)]
pub struct VertexBufferRecord {
    /// The native buffer. Replaced when the buffer grows.
    pub native: NativeBufferId,
    /// Current capacity.
    pub capacity: BufferCapacity,
    /// The format draws use when they do not supply one.
    pub format: Option<Arc<VertexFormat>>,
}

/// An index buffer.
#[derive(Debug, Clone)]
pub struct IndexBufferRecord {
    /// The native buffer. Replaced when the buffer grows.
    pub native: NativeBufferId,
    /// Current capacity. The stride is the index width.
    pub capacity: BufferCapacity,
    /// Index width.
    pub format: IndexFormat,
}

/// A translator-owned constant buffer backing one stage slot.
#[derive(Debug, Clone)]
pub struct ConstantBufferRecord {
    /// The native buffer.
    pub native: NativeBufferId,
    /// Size in bytes.
    pub size: u64,
}

/// A sampled texture and its view.
#[derive(Debug, Clone)]
pub struct TextureRecord {
    /// The native texture.
    pub native: NativeTextureId,
    /// The view bound to texture units.
    pub view: NativeViewId,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Texel format.
    pub format: TextureFormat,
    /// Sampler applied when the texture is bound. `NULL` uses the default sampler.
    pub sampler: Handle,
    /// The render-target bundle that owns this texture, or `NULL`.
    pub owner: Handle,
}

/// A sampler object.
#[derive(Debug, Clone)]
pub struct SamplerRecord {
    /// The native sampler.
    pub native: NativeSamplerId,
    /// The descriptor it was created from.
    pub descriptor: SamplerDescriptor,
}

/// A compiled vertex or pixel shader.
#[derive(Debug, Clone)]
pub struct ShaderRecord {
    /// The native shader.
    pub native: NativeShaderId,
}

/// The input layout a pipeline resolved on its last draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineLayoutSlot {
    /// Hash of the vertex format the layout was resolved for.
    pub format_hash: u64,
    /// The resolution.
    pub resolution: LayoutResolution,
}

/// A vertex/pixel shader pair.
#[derive(Debug, Clone)]
pub struct PipelineRecord {
    /// The vertex shader handle.
    pub vertex_shader: Handle,
    /// The pixel shader handle.
    pub pixel_shader: Handle,
    /// Filled lazily on the first draw with a given vertex format.
    pub layout: Option<PipelineLayoutSlot>,
}

/// An event query.
#[derive(Debug, Clone)]
pub struct QueryRecord {
    /// The native query.
    pub native: NativeQueryId,
    /// Whether the query has been issued at least once.
    pub issued: bool,
}

/// A color texture plus optional depth attachment that draws can target.
#[derive(Debug, Clone)]
pub struct RenderTargetRecord {
    /// The texture handle of the color attachment; it can be bound for sampling.
    pub color_texture: Handle,
    /// The color view.
    pub color_view: NativeRenderTargetId,
    /// The depth texture, if any.
    pub depth_texture: Option<NativeTextureId>,
    /// The depth view, if any.
    pub depth_view: Option<NativeDepthTargetId>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl RenderTargetRecord {
    /// The native targets this bundle binds.
    pub fn targets(&self) -> RenderTargets {
        RenderTargets {
            color: Some(self.color_view),
            depth: self.depth_view,
        }
    }
}

/// A recorded command sequence replayed on demand.
#[derive(Debug, Clone)]
pub struct CommandListRecord {
    /// The recorded commands, in order. Shared so replay does not copy them.
    pub commands: Arc<[RecordedCommand]>,
}

/// Everything a handle can refer to.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum ResourceRecord {
    VertexBuffer(VertexBufferRecord),
    IndexBuffer(IndexBufferRecord),
    ConstantBuffer(ConstantBufferRecord),
    Texture(TextureRecord),
    VertexShader(ShaderRecord),
    PixelShader(ShaderRecord),
    Sampler(SamplerRecord),
    Pipeline(PipelineRecord),
    Query(QueryRecord),
    RenderTarget(RenderTargetRecord),
    CommandList(CommandListRecord),
}

impl ResourceRecord {
    /// The kind of this record.
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceRecord::VertexBuffer(_) => ResourceKind::VertexBuffer,
            ResourceRecord::IndexBuffer(_) => ResourceKind::IndexBuffer,
            ResourceRecord::ConstantBuffer(_) => ResourceKind::ConstantBuffer,
            ResourceRecord::Texture(_) => ResourceKind::Texture,
            ResourceRecord::VertexShader(_) => ResourceKind::VertexShader,
            ResourceRecord::PixelShader(_) => ResourceKind::PixelShader,
            ResourceRecord::Sampler(_) => ResourceKind::Sampler,
            ResourceRecord::Pipeline(_) => ResourceKind::Pipeline,
            ResourceRecord::Query(_) => ResourceKind::Query,
            ResourceRecord::RenderTarget(_) => ResourceKind::RenderTarget,
            ResourceRecord::CommandList(_) => ResourceKind::CommandList,
        }
    }

    /// Native buffer and capacity of a growable (vertex or index) buffer.
    pub fn growable_mut(&mut self) -> Option<(&mut NativeBufferId, &mut BufferCapacity, BufferKind)> {
        match self {
            ResourceRecord::VertexBuffer(r) => {
                Some((&mut r.native, &mut r.capacity, BufferKind::Vertex))
            }
            ResourceRecord::IndexBuffer(r) => Some((&mut r.native, &mut r.capacity, BufferKind::Index)),
            _ => None,
        }
    }

    /// Releases the native objects this record owns.
    ///
    /// Failures are logged; the record is gone either way. The color texture
    /// of a render-target bundle is a separate record and is not touched here.
    pub fn release_native(self, device: &dyn NativeDevice) {
        let result = match self {
            ResourceRecord::VertexBuffer(r) => device.destroy_buffer(r.native),
            ResourceRecord::IndexBuffer(r) => device.destroy_buffer(r.native),
            ResourceRecord::ConstantBuffer(r) => device.destroy_buffer(r.native),
            ResourceRecord::Texture(r) => device
                .destroy_shader_resource_view(r.view)
                .and(device.destroy_texture(r.native)),
            ResourceRecord::VertexShader(r) | ResourceRecord::PixelShader(r) => {
                device.destroy_shader(r.native)
            }
            ResourceRecord::Sampler(r) => device.destroy_sampler(r.native),
            ResourceRecord::Query(r) => device.destroy_query(r.native),
            ResourceRecord::RenderTarget(r) => {
                let mut result = device.destroy_render_target_view(r.color_view);
                if let Some(view) = r.depth_view {
                    result = result.and(device.destroy_depth_stencil_view(view));
                }
                if let Some(texture) = r.depth_texture {
                    result = result.and(device.destroy_texture(texture));
                }
                result
            }
            ResourceRecord::Pipeline(_) | ResourceRecord::CommandList(_) => Ok(()),
        };
        if let Err(e) = result {
            log::warn!("Failed to release native object: {e}");
        }
    }
}
