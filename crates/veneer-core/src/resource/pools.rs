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

//! Typed ownership tables on top of the handle registry.

use super::descriptors::*;
use super::record::*;
use crate::command_list::RecordedCommand;
use crate::handle::{Handle, HandleRegistry};
use crate::native::*;
use std::borrow::Cow;
use std::sync::Arc;
use thiserror::Error;

/// A handle did not resolve to a record of the expected kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LookupError {
    /// Nothing is registered under the handle.
    #[error("No resource registered for handle {0}")]
    NotFound(Handle),
    /// The handle refers to a different kind of resource.
    #[error("Handle {handle} is a {found}, expected a {expected}")]
    WrongKind {
        /// The handle looked up.
        handle: Handle,
        /// The kind the caller wanted.
        expected: ResourceKind,
        /// The kind actually registered.
        found: ResourceKind,
    },
}

impl LookupError {
    /// The handle that failed to resolve.
    pub fn handle(&self) -> Handle {
        match self {
            LookupError::NotFound(handle) | LookupError::WrongKind { handle, .. } => *handle,
        }
    }
}

/// A resource could not be created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// A creation precondition does not hold.
    #[error("Invalid resource description: {0}")]
    Invalid(String),
    /// The device cannot create textures of this format.
    #[error("Texture format {0:?} is not supported by the device")]
    UnsupportedFormat(TextureFormat),
    /// A referenced handle did not resolve.
    #[error(transparent)]
    Lookup(#[from] LookupError),
    /// The device refused the native object.
    #[error(transparent)]
    Native(#[from] NativeError),
}

macro_rules! typed_accessors {
    ($($get:ident, $get_mut:ident => $variant:ident($record:ty);)*) => {
        $(
            #[doc = concat!("Resolves a handle to a `", stringify!($variant), "` record.")]
            pub fn $get(&self, handle: Handle) -> Result<&$record, LookupError> {
                match self.registry.lookup(handle) {
                    Some(ResourceRecord::$variant(record)) => Ok(record),
                    Some(other) => Err(LookupError::WrongKind {
                        handle,
                        expected: ResourceKind::$variant,
                        found: other.kind(),
                    }),
                    None => Err(LookupError::NotFound(handle)),
                }
            }

            #[doc = concat!("Resolves a handle to a mutable `", stringify!($variant), "` record.")]
            pub fn $get_mut(&mut self, handle: Handle) -> Result<&mut $record, LookupError> {
                match self.registry.lookup_mut(handle) {
                    Some(ResourceRecord::$variant(record)) => Ok(record),
                    Some(other) => Err(LookupError::WrongKind {
                        handle,
                        expected: ResourceKind::$variant,
                        found: other.kind(),
                    }),
                    None => Err(LookupError::NotFound(handle)),
                }
            }
        )*
    };
}

/// Owns every translator resource and the native objects behind them.
#[derive(Debug, Default)]
pub struct ResourcePools {
    registry: HandleRegistry<ResourceRecord>,
}

impl ResourcePools {
    /// Creates empty pools with a random handle key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates empty pools with a fixed handle key.
    pub fn with_key(key: u64) -> Self {
        Self {
            registry: HandleRegistry::with_key(key),
        }
    }

    typed_accessors! {
        vertex_buffer, vertex_buffer_mut => VertexBuffer(VertexBufferRecord);
        index_buffer, index_buffer_mut => IndexBuffer(IndexBufferRecord);
        constant_buffer, constant_buffer_mut => ConstantBuffer(ConstantBufferRecord);
        texture, texture_mut => Texture(TextureRecord);
        vertex_shader, vertex_shader_mut => VertexShader(ShaderRecord);
        pixel_shader, pixel_shader_mut => PixelShader(ShaderRecord);
        sampler, sampler_mut => Sampler(SamplerRecord);
        pipeline, pipeline_mut => Pipeline(PipelineRecord);
        query, query_mut => Query(QueryRecord);
        render_target, render_target_mut => RenderTarget(RenderTargetRecord);
        command_list, command_list_mut => CommandList(CommandListRecord);
    }

    /// The record behind a handle, of any kind.
    pub fn get(&self, handle: Handle) -> Option<&ResourceRecord> {
        self.registry.lookup(handle)
    }

    /// The record behind a handle for mutation, of any kind.
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut ResourceRecord> {
        self.registry.lookup_mut(handle)
    }

    /// The kind of resource behind a handle.
    pub fn kind(&self, handle: Handle) -> Option<ResourceKind> {
        self.registry.lookup(handle).map(ResourceRecord::kind)
    }

    /// Number of live resources.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Returns `true` when no resource is live.
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    fn insert(&mut self, record: ResourceRecord) -> Handle {
        self.registry.insert(record)
    }

    /// Creates a vertex buffer.
    pub fn create_vertex_buffer(
        &mut self,
        device: &dyn NativeDevice,
        desc: &VertexBufferDesc,
    ) -> Result<Handle, PoolError> {
        let stride = desc.effective_stride().ok_or_else(|| {
            PoolError::Invalid("vertex buffer stride disagrees with its format".into())
        })?;
        if desc.size == 0 {
            return Err(PoolError::Invalid("vertex buffer size must be non-zero".into()));
        }
        if stride == 0 {
            return Err(PoolError::Invalid("vertex buffer stride must be non-zero".into()));
        }
        check_contents(desc.contents, desc.size)?;
        let native = device.create_buffer(
            &BufferDescriptor {
                label: desc.label.map(Cow::Borrowed),
                size: desc.size,
                kind: BufferKind::Vertex,
            },
            desc.contents,
        )?;
        Ok(self.insert(ResourceRecord::VertexBuffer(VertexBufferRecord {
            native,
            capacity: BufferCapacity {
                size: desc.size,
                stride,
            },
            format: desc.format.clone().map(Arc::new),
        })))
    }

    /// Creates an index buffer.
    pub fn create_index_buffer(
        &mut self,
        device: &dyn NativeDevice,
        desc: &IndexBufferDesc,
    ) -> Result<Handle, PoolError> {
        if desc.size == 0 {
            return Err(PoolError::Invalid("index buffer size must be non-zero".into()));
        }
        check_contents(desc.contents, desc.size)?;
        let native = device.create_buffer(
            &BufferDescriptor {
                label: desc.label.map(Cow::Borrowed),
                size: desc.size,
                kind: BufferKind::Index,
            },
            desc.contents,
        )?;
        Ok(self.insert(ResourceRecord::IndexBuffer(IndexBufferRecord {
            native,
            capacity: BufferCapacity {
                size: desc.size,
                stride: desc.format.size(),
            },
            format: desc.format,
        })))
    }

    /// Creates a constant buffer of `size` bytes.
    pub fn create_constant_buffer(
        &mut self,
        device: &dyn NativeDevice,
        size: u64,
    ) -> Result<Handle, PoolError> {
        if size == 0 {
            return Err(PoolError::Invalid("constant buffer size must be non-zero".into()));
        }
        let native = device.create_buffer(
            &BufferDescriptor {
                label: Some(Cow::Borrowed("veneer constant buffer")),
                size,
                kind: BufferKind::Constant,
            },
            None,
        )?;
        Ok(self.insert(ResourceRecord::ConstantBuffer(ConstantBufferRecord {
            native,
            size,
        })))
    }

    /// Creates a sampled texture and its view.
    pub fn create_texture(
        &mut self,
        device: &dyn NativeDevice,
        desc: &TextureDesc,
    ) -> Result<Handle, PoolError> {
        self.create_texture_owned(device, desc, false, Handle::NULL)
            .map(|(handle, _)| handle)
    }

    fn create_texture_owned(
        &mut self,
        device: &dyn NativeDevice,
        desc: &TextureDesc,
        render_target: bool,
        owner: Handle,
    ) -> Result<(Handle, NativeTextureId), PoolError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(PoolError::Invalid(format!(
                "texture dimensions must be non-zero, got {}x{}",
                desc.width, desc.height
            )));
        }
        if desc.format.is_depth() {
            return Err(PoolError::Invalid(
                "depth formats can only be used as render-target attachments".into(),
            ));
        }
        if !device.supports_format(desc.format) {
            return Err(PoolError::UnsupportedFormat(desc.format));
        }
        let native = device.create_texture(
            &TextureDescriptor {
                label: desc.label.map(Cow::Borrowed),
                width: desc.width,
                height: desc.height,
                format: desc.format,
                render_target,
            },
            desc.contents,
        )?;
        let view = match device.create_shader_resource_view(native) {
            Ok(view) => view,
            Err(e) => {
                if let Err(e) = device.destroy_texture(native) {
                    log::warn!("Failed to release texture after view creation failed: {e}");
                }
                return Err(e.into());
            }
        };
        let handle = self.insert(ResourceRecord::Texture(TextureRecord {
            native,
            view,
            width: desc.width,
            height: desc.height,
            format: desc.format,
            sampler: Handle::NULL,
            owner,
        }));
        Ok((handle, native))
    }

    /// Creates a sampler.
    pub fn create_sampler(
        &mut self,
        device: &dyn NativeDevice,
        descriptor: &SamplerDescriptor,
    ) -> Result<Handle, PoolError> {
        let native = device.create_sampler(descriptor)?;
        Ok(self.insert(ResourceRecord::Sampler(SamplerRecord {
            native,
            descriptor: *descriptor,
        })))
    }

    /// Creates a vertex or pixel shader.
    pub fn create_shader(
        &mut self,
        device: &dyn NativeDevice,
        stage: ShaderStage,
        bytecode: &ShaderBytecode,
    ) -> Result<Handle, PoolError> {
        if bytecode.code.is_empty() {
            return Err(NativeError::ShaderRejected("empty bytecode".into()).into());
        }
        let record = match stage {
            ShaderStage::Vertex => ResourceRecord::VertexShader(ShaderRecord {
                native: device.create_vertex_shader(bytecode)?,
            }),
            ShaderStage::Pixel => ResourceRecord::PixelShader(ShaderRecord {
                native: device.create_pixel_shader(bytecode)?,
            }),
        };
        Ok(self.insert(record))
    }

    /// Pairs a vertex and a pixel shader into a pipeline.
    pub fn create_pipeline(
        &mut self,
        vertex_shader: Handle,
        pixel_shader: Handle,
    ) -> Result<Handle, PoolError> {
        self.vertex_shader(vertex_shader)?;
        self.pixel_shader(pixel_shader)?;
        Ok(self.insert(ResourceRecord::Pipeline(PipelineRecord {
            vertex_shader,
            pixel_shader,
            layout: None,
        })))
    }

    /// Creates an event query.
    pub fn create_query(&mut self, device: &dyn NativeDevice) -> Result<Handle, PoolError> {
        let native = device.create_query()?;
        Ok(self.insert(ResourceRecord::Query(QueryRecord {
            native,
            issued: false,
        })))
    }

    /// Creates a render-target bundle. The color attachment is registered as
    /// its own texture handle so it can be sampled after rendering.
    pub fn create_render_target(
        &mut self,
        device: &dyn NativeDevice,
        desc: &RenderTargetDesc,
    ) -> Result<Handle, PoolError> {
        if let Some(depth) = desc.depth_format {
            if !depth.is_depth() {
                return Err(PoolError::Invalid(format!(
                    "{depth:?} is not a depth format"
                )));
            }
        }

        let bundle = self.registry.allocate();
        let (color_texture, color_native) = self.create_texture_owned(
            device,
            &TextureDesc::new(desc.width, desc.height, desc.color_format),
            true,
            bundle,
        )?;

        let built = (|| -> Result<RenderTargetRecord, NativeError> {
            let color_view = device.create_render_target_view(color_native)?;
            let mut record = RenderTargetRecord {
                color_texture,
                color_view,
                depth_texture: None,
                depth_view: None,
                width: desc.width,
                height: desc.height,
            };
            if let Some(format) = desc.depth_format {
                let depth = device.create_texture(
                    &TextureDescriptor {
                        label: Some(Cow::Borrowed("veneer depth target")),
                        width: desc.width,
                        height: desc.height,
                        format,
                        render_target: true,
                    },
                    None,
                );
                let depth = match depth {
                    Ok(depth) => depth,
                    Err(e) => {
                        ResourceRecord::RenderTarget(record).release_native(device);
                        return Err(e);
                    }
                };
                record.depth_texture = Some(depth);
                match device.create_depth_stencil_view(depth) {
                    Ok(view) => record.depth_view = Some(view),
                    Err(e) => {
                        ResourceRecord::RenderTarget(record).release_native(device);
                        return Err(e);
                    }
                }
            }
            Ok(record)
        })();

        match built {
            Ok(record) => {
                self.registry
                    .bind(bundle, ResourceRecord::RenderTarget(record));
                Ok(bundle)
            }
            Err(e) => {
                if let Some(texture) = self.registry.release(color_texture) {
                    texture.release_native(device);
                }
                Err(e.into())
            }
        }
    }

    /// Stores a recorded command sequence.
    pub fn create_command_list(&mut self, commands: Vec<RecordedCommand>) -> Handle {
        self.insert(ResourceRecord::CommandList(CommandListRecord {
            commands: commands.into(),
        }))
    }

    /// Removes a record without touching its native objects.
    pub fn release(&mut self, handle: Handle) -> Option<ResourceRecord> {
        self.registry.release(handle)
    }

    /// Destroys a resource and the native objects it owns.
    ///
    /// Destroying a render-target bundle also destroys its color texture.
    /// Textures owned by a bundle cannot be destroyed on their own.
    pub fn destroy(&mut self, device: &dyn NativeDevice, handle: Handle) -> Option<ResourceKind> {
        if let Ok(texture) = self.texture(handle) {
            if !texture.owner.is_null() {
                log::warn!(
                    "Texture {handle} belongs to render target {}; destroy the render target instead",
                    texture.owner
                );
                return None;
            }
        }
        let record = self.registry.release(handle)?;
        let kind = record.kind();
        if let ResourceRecord::RenderTarget(target) = &record {
            if let Some(texture) = self.registry.release(target.color_texture) {
                texture.release_native(device);
            }
        }
        record.release_native(device);
        Some(kind)
    }

    /// Destroys every resource.
    pub fn destroy_all(&mut self, device: &dyn NativeDevice) {
        for (_, record) in self.registry.drain() {
            record.release_native(device);
        }
    }
}

fn check_contents(contents: Option<&[u8]>, size: u64) -> Result<(), PoolError> {
    match contents {
        Some(bytes) if bytes.len() as u64 > size => Err(PoolError::Invalid(format!(
            "initial contents ({} bytes) exceed buffer size ({size} bytes)",
            bytes.len()
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{NativeCall, RecordingDevice};
    use crate::vertex::{ScalarType, VertexAttribute, VertexFormat, VertexUsage};

    fn pools() -> (ResourcePools, RecordingDevice) {
        let (device, _context) = RecordingDevice::new();
        (ResourcePools::with_key(42), device)
    }

    #[test]
    fn test_create_vertex_buffer_records_capacity() {
        let (mut pools, device) = pools();
        let handle = pools
            .create_vertex_buffer(&device, &VertexBufferDesc::new(64, 16))
            .unwrap();
        let record = pools.vertex_buffer(handle).unwrap();
        assert_eq!(record.capacity, BufferCapacity { size: 64, stride: 16 });
    }

    #[test]
    fn test_invalid_descriptors_register_nothing() {
        let (mut pools, device) = pools();
        assert!(matches!(
            pools.create_vertex_buffer(&device, &VertexBufferDesc::new(0, 16)),
            Err(PoolError::Invalid(_))
        ));
        assert!(matches!(
            pools.create_vertex_buffer(&device, &VertexBufferDesc::new(64, 0)),
            Err(PoolError::Invalid(_))
        ));
        assert!(matches!(
            pools.create_texture(&device, &TextureDesc::new(0, 4, TextureFormat::Rgba8Unorm)),
            Err(PoolError::Invalid(_))
        ));
        assert!(pools.is_empty());
        assert_eq!(device.live_objects(), 0);
    }

    #[test]
    fn test_vertex_stride_must_agree_with_format() {
        let (mut pools, device) = pools();
        let format = VertexFormat::new(
            16,
            vec![VertexAttribute::new(VertexUsage::Position, ScalarType::Float32, 4, false, 0)],
        );

        let mismatched = pools.create_vertex_buffer(
            &device,
            &VertexBufferDesc::new(64, 4).with_format(format.clone()),
        );
        assert!(matches!(mismatched, Err(PoolError::Invalid(_))));
        assert_eq!(device.live_objects(), 0);

        let inferred = pools
            .create_vertex_buffer(&device, &VertexBufferDesc::new(64, 0).with_format(format))
            .unwrap();
        assert_eq!(pools.vertex_buffer(inferred).unwrap().capacity.stride, 16);
    }

    #[test]
    fn test_unsupported_format_is_refused_before_allocation() {
        let (mut pools, device) = pools();
        device.set_format_unsupported(TextureFormat::Rgba32Float);
        let result = pools.create_texture(&device, &TextureDesc::new(4, 4, TextureFormat::Rgba32Float));
        assert_eq!(result, Err(PoolError::UnsupportedFormat(TextureFormat::Rgba32Float)));
        assert_eq!(device.count_calls(|c| matches!(c, NativeCall::CreateTexture { .. })), 0);
    }

    #[test]
    fn test_native_failure_leaves_no_partial_registration() {
        let (mut pools, device) = pools();
        device.set_buffer_budget(Some(32));
        let result = pools.create_vertex_buffer(&device, &VertexBufferDesc::new(64, 16));
        assert!(matches!(result, Err(PoolError::Native(NativeError::OutOfMemory(_)))));
        assert!(pools.is_empty());
    }

    #[test]
    fn test_wrong_kind_lookup() {
        let (mut pools, device) = pools();
        let handle = pools
            .create_index_buffer(&device, &IndexBufferDesc::new(12, IndexFormat::Uint16))
            .unwrap();
        assert_eq!(
            pools.vertex_buffer(handle).unwrap_err(),
            LookupError::WrongKind {
                handle,
                expected: ResourceKind::VertexBuffer,
                found: ResourceKind::IndexBuffer,
            }
        );
        assert_eq!(pools.index_buffer(handle).unwrap().capacity.stride, 2);
    }

    #[test]
    fn test_pipeline_requires_shaders_of_the_right_stage() {
        let (mut pools, device) = pools();
        let vs = pools
            .create_shader(&device, ShaderStage::Vertex, &ShaderBytecode::new("vs"))
            .unwrap();
        let ps = pools
            .create_shader(&device, ShaderStage::Pixel, &ShaderBytecode::new("ps"))
            .unwrap();
        assert!(pools.create_pipeline(vs, ps).is_ok());
        assert!(matches!(
            pools.create_pipeline(ps, vs),
            Err(PoolError::Lookup(LookupError::WrongKind { .. }))
        ));
        assert!(matches!(
            pools.create_pipeline(vs, Handle::NULL),
            Err(PoolError::Lookup(LookupError::NotFound(_)))
        ));
    }

    #[test]
    fn test_empty_bytecode_is_rejected() {
        let (mut pools, device) = pools();
        let result = pools.create_shader(&device, ShaderStage::Pixel, &ShaderBytecode::new(Vec::new()));
        assert!(matches!(result, Err(PoolError::Native(NativeError::ShaderRejected(_)))));
    }

    #[test]
    fn test_render_target_owns_its_color_texture() {
        let (mut pools, device) = pools();
        let target = pools
            .create_render_target(
                &device,
                &RenderTargetDesc {
                    width: 32,
                    height: 32,
                    color_format: TextureFormat::Rgba8Unorm,
                    depth_format: Some(TextureFormat::Depth32Float),
                },
            )
            .unwrap();
        let color = pools.render_target(target).unwrap().color_texture;
        assert_eq!(pools.texture(color).unwrap().owner, target);

        // The color texture cannot be destroyed independently.
        assert_eq!(pools.destroy(&device, color), None);
        assert!(pools.texture(color).is_ok());

        assert_eq!(pools.destroy(&device, target), Some(ResourceKind::RenderTarget));
        assert!(pools.texture(color).is_err());
        assert!(pools.is_empty());
        assert_eq!(device.live_objects(), 0);
    }

    #[test]
    fn test_destroy_releases_native_objects() {
        let (mut pools, device) = pools();
        let texture = pools
            .create_texture(&device, &TextureDesc::new(2, 2, TextureFormat::Rgba8Unorm))
            .unwrap();
        assert_eq!(device.live_objects(), 2);
        assert_eq!(pools.destroy(&device, texture), Some(ResourceKind::Texture));
        assert_eq!(device.live_objects(), 0);
        assert_eq!(pools.destroy(&device, texture), None);
    }
}
