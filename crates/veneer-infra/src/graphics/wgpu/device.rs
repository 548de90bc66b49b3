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

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use veneer_core::native::*;
use wgpu::util::DeviceExt;

use super::context::WgpuGraphicsContext;
use super::conversions::IntoWgpu;
use super::native_context::WgpuNativeContext;
use super::pipeline_cache::PipelineCache;
use super::shader::{validate_wgsl, ValidatedShader};

/// Backend settings that are not part of the native device contract.
#[derive(Debug, Clone, PartialEq)]
pub struct WgpuBackendConfig {
    /// Width of the default back buffer.
    pub width: u32,
    /// Height of the default back buffer.
    pub height: u32,
    /// How long a blocking fence wait may take before the device is considered lost.
    pub fence_timeout: Duration,
}

impl Default for WgpuBackendConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            fence_timeout: Duration::from_secs(5),
        }
    }
}

pub(crate) const fn align4(size: u64) -> u64 {
    (size + wgpu::COPY_BUFFER_ALIGNMENT - 1) & !(wgpu::COPY_BUFFER_ALIGNMENT - 1)
}

#[derive(Debug)]
pub(crate) struct BufferEntry {
    pub(crate) buffer: Arc<wgpu::Buffer>,
    /// CPU copy of the contents, padded to the copy alignment. Partial
    /// updates are widened to aligned ranges from here.
    pub(crate) shadow: Vec<u8>,
    pub(crate) size: u64,
}

#[derive(Debug)]
pub(crate) struct TextureEntry {
    pub(crate) texture: Arc<wgpu::Texture>,
    pub(crate) format: TextureFormat,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) render_target: bool,
}

/// A view usable as a render pass attachment.
#[derive(Debug, Clone)]
pub(crate) struct TargetView {
    pub(crate) view: Arc<wgpu::TextureView>,
    /// The viewed texture. `None` for the default targets.
    pub(crate) texture: Option<NativeTextureId>,
    pub(crate) format: TextureFormat,
    pub(crate) width: u32,
    pub(crate) height: u32,
}

#[derive(Debug)]
pub(crate) struct ViewEntry {
    pub(crate) view: Arc<wgpu::TextureView>,
    pub(crate) texture: NativeTextureId,
}

#[derive(Debug)]
pub(crate) struct ShaderEntry {
    pub(crate) module: wgpu::ShaderModule,
    pub(crate) info: ValidatedShader,
    pub(crate) signature: Vec<SignatureElement>,
}

#[derive(Debug)]
pub(crate) struct InputLayoutEntry {
    pub(crate) attributes: Vec<wgpu::VertexAttribute>,
    /// Bytes from the vertex start to the end of the last element.
    pub(crate) span: u32,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum StateEntry {
    DepthStencil(DepthStencilDesc),
    Blend(BlendDesc),
    Rasterizer(RasterizerDesc),
}

/// Completion tracking shared by fences and event queries.
///
/// Each signal takes the next generation; the queue callback publishes it
/// once the submitted work has executed.
#[derive(Debug, Default)]
pub(crate) struct SyncPoint {
    issued: AtomicU64,
    completed: Arc<AtomicU64>,
}

impl SyncPoint {
    pub(crate) fn arm(&self, queue: &wgpu::Queue) {
        let generation = self.issued.fetch_add(1, Ordering::AcqRel) + 1;
        let completed = self.completed.clone();
        queue.on_submitted_work_done(move || {
            completed.fetch_max(generation, Ordering::AcqRel);
        });
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.completed.load(Ordering::Acquire) >= self.issued.load(Ordering::Acquire)
    }
}

/// The internal, non-clonable state of the WgpuNativeDevice.
#[derive(Debug)]
pub(crate) struct WgpuDeviceInternal {
    pub(crate) context: Arc<WgpuGraphicsContext>,
    pub(crate) config: WgpuBackendConfig,
    next_id: AtomicU64,

    pub(crate) buffers: Mutex<HashMap<NativeBufferId, BufferEntry>>,
    pub(crate) textures: Mutex<HashMap<NativeTextureId, TextureEntry>>,
    pub(crate) views: Mutex<HashMap<NativeViewId, ViewEntry>>,
    pub(crate) render_targets: Mutex<HashMap<NativeRenderTargetId, TargetView>>,
    pub(crate) depth_targets: Mutex<HashMap<NativeDepthTargetId, TargetView>>,
    pub(crate) samplers: Mutex<HashMap<NativeSamplerId, Arc<wgpu::Sampler>>>,
    pub(crate) shaders: Mutex<HashMap<NativeShaderId, Arc<ShaderEntry>>>,
    pub(crate) input_layouts: Mutex<HashMap<NativeInputLayoutId, Arc<InputLayoutEntry>>>,
    pub(crate) states: Mutex<HashMap<NativeStateId, StateEntry>>,
    pub(crate) fences: Mutex<HashMap<NativeFenceId, Arc<SyncPoint>>>,
    pub(crate) queries: Mutex<HashMap<NativeQueryId, Arc<SyncPoint>>>,
    pub(crate) pipelines: Mutex<PipelineCache>,

    pub(crate) default_color: TargetView,
    pub(crate) default_depth: TargetView,
    default_color_texture: Arc<wgpu::Texture>,
}

/// Locks a registry. Registries hold plain maps, so a poisoned lock is still consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A clonable, thread-safe handle to the wgpu native device.
/// It wraps the actual device state (`WgpuDeviceInternal`) in an Arc,
/// so the context created alongside it can resolve native ids.
#[derive(Clone, Debug)]
pub struct WgpuNativeDevice {
    pub(crate) internal: Arc<WgpuDeviceInternal>,
}

fn create_target(
    device: &wgpu::Device,
    label: &str,
    format: TextureFormat,
    width: u32,
    height: u32,
    usage: wgpu::TextureUsages,
) -> (Arc<wgpu::Texture>, TargetView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: format.into_wgpu(),
        usage,
        view_formats: &[],
    });
    let view = Arc::new(texture.create_view(&wgpu::TextureViewDescriptor::default()));
    (
        Arc::new(texture),
        TargetView {
            view,
            texture: None,
            format,
            width,
            height,
        },
    )
}

impl WgpuNativeDevice {
    /// Creates a device and the immediate context that records onto it.
    ///
    /// ## Arguments
    /// * `context` - The wgpu device and queue to create objects on.
    /// * `config` - Size of the default back buffer and fence timeout.
    ///
    /// ## Errors
    /// * `NativeError::InvalidArgument` - If the back buffer size is zero or exceeds device limits.
    pub fn new(
        context: Arc<WgpuGraphicsContext>,
        config: WgpuBackendConfig,
    ) -> Result<(Self, WgpuNativeContext), NativeError> {
        let max_dimension = context.device_limits.max_texture_dimension_2d;
        if config.width == 0
            || config.height == 0
            || config.width > max_dimension
            || config.height > max_dimension
        {
            return Err(NativeError::InvalidArgument(format!(
                "back buffer size {}x{} outside 1..={max_dimension}",
                config.width, config.height
            )));
        }

        let (default_color_texture, default_color) = create_target(
            &context.device,
            "Veneer Back Buffer",
            TextureFormat::Rgba8Unorm,
            config.width,
            config.height,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        );
        let (_, default_depth) = create_target(
            &context.device,
            "Veneer Depth Buffer",
            TextureFormat::Depth32Float,
            config.width,
            config.height,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );
        let pipelines = PipelineCache::new(&context.device);

        log::info!(
            "WgpuNativeDevice: created on \"{}\" ({:?}) with a {}x{} back buffer",
            context.adapter_name,
            context.adapter_backend,
            config.width,
            config.height
        );

        let device = Self {
            internal: Arc::new(WgpuDeviceInternal {
                context,
                config,
                next_id: AtomicU64::new(1),
                buffers: Mutex::new(HashMap::new()),
                textures: Mutex::new(HashMap::new()),
                views: Mutex::new(HashMap::new()),
                render_targets: Mutex::new(HashMap::new()),
                depth_targets: Mutex::new(HashMap::new()),
                samplers: Mutex::new(HashMap::new()),
                shaders: Mutex::new(HashMap::new()),
                input_layouts: Mutex::new(HashMap::new()),
                states: Mutex::new(HashMap::new()),
                fences: Mutex::new(HashMap::new()),
                queries: Mutex::new(HashMap::new()),
                pipelines: Mutex::new(pipelines),
                default_color,
                default_depth,
                default_color_texture,
            }),
        };
        let native_context = WgpuNativeContext::new(device.clone());
        Ok((device, native_context))
    }

    fn next_id(&self) -> u64 {
        self.internal.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn wgpu_device(&self) -> &wgpu::Device {
        &self.internal.context.device
    }

    pub(crate) fn queue(&self) -> &wgpu::Queue {
        &self.internal.context.queue
    }

    /// Number of live native objects, excluding the default targets.
    pub fn live_objects(&self) -> usize {
        let i = &self.internal;
        lock(&i.buffers).len()
            + lock(&i.textures).len()
            + lock(&i.views).len()
            + lock(&i.render_targets).len()
            + lock(&i.depth_targets).len()
            + lock(&i.samplers).len()
            + lock(&i.shaders).len()
            + lock(&i.input_layouts).len()
            + lock(&i.states).len()
            + lock(&i.fences).len()
            + lock(&i.queries).len()
    }

    /// Number of render pipelines currently cached.
    pub fn cached_pipelines(&self) -> usize {
        lock(&self.internal.pipelines).len()
    }

    /// Size of the default back buffer.
    pub fn back_buffer_size(&self) -> (u32, u32) {
        (self.internal.config.width, self.internal.config.height)
    }

    /// Reads the default back buffer as tightly packed RGBA8 rows.
    ///
    /// Work recorded on the context is only visible once the context has flushed.
    /// ## Errors
    /// * `NativeError::DeviceLost` - If the readback does not complete within the fence timeout.
    pub fn read_back_buffer(&self) -> Result<Vec<u8>, NativeError> {
        let (width, height) = self.back_buffer_size();
        let unpadded = width * 4;
        let padded = unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let device = self.wgpu_device();
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Veneer Readback"),
            size: u64::from(padded) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Veneer Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.internal.default_color_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue().submit(Some(encoder.finish()));

        let mapped = Arc::new(Mutex::new(None));
        let slot = mapped.clone();
        staging
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                *lock(&slot) = Some(result);
            });
        self.wait_until(|| lock(&mapped).is_some(), "buffer readback")?;
        if let Some(Err(e)) = lock(&mapped).take() {
            return Err(NativeError::Backend(format!("Readback mapping failed: {e}")));
        }

        let mut pixels = Vec::with_capacity((unpadded * height) as usize);
        {
            let data = staging.slice(..).get_mapped_range();
            for row in data.chunks(padded as usize) {
                pixels.extend_from_slice(&row[..unpadded as usize]);
            }
        }
        staging.unmap();
        Ok(pixels)
    }

    /// Processes completed work without blocking.
    pub(crate) fn poll(&self) -> Result<(), NativeError> {
        self.wgpu_device()
            .poll(wgpu::PollType::Poll)
            .map(|_| ())
            .map_err(|e| NativeError::DeviceLost(format!("Device poll failed: {e}")))
    }

    /// Polls until `done` holds or the fence timeout elapses.
    pub(crate) fn wait_until(
        &self,
        mut done: impl FnMut() -> bool,
        what: &str,
    ) -> Result<(), NativeError> {
        let deadline = std::time::Instant::now() + self.internal.config.fence_timeout;
        loop {
            self.poll()?;
            if done() {
                return Ok(());
            }
            if std::time::Instant::now() >= deadline {
                log::error!("WgpuNativeDevice: {what} did not complete in time");
                return Err(NativeError::DeviceLost(format!(
                    "{what} did not complete within {:?}",
                    self.internal.config.fence_timeout
                )));
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn create_shader(
        &self,
        bytecode: &ShaderBytecode,
        stage: ShaderStage,
    ) -> Result<NativeShaderId, NativeError> {
        let (info, source) = validate_wgsl(bytecode, stage)?;
        let module = self
            .wgpu_device()
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: bytecode.label.as_deref(),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        let id = NativeShaderId(self.next_id());
        lock(&self.internal.shaders).insert(
            id,
            Arc::new(ShaderEntry {
                module,
                info,
                signature: bytecode.input_signature.clone(),
            }),
        );
        log::info!(
            "WgpuNativeDevice: Created {stage:?} shader '{}' with ID: {id:?}",
            bytecode.label.as_deref().unwrap_or_default()
        );
        Ok(id)
    }

    fn create_state(&self, entry: StateEntry) -> Result<NativeStateId, NativeError> {
        let id = NativeStateId(self.next_id());
        lock(&self.internal.states).insert(id, entry);
        log::debug!("WgpuNativeDevice: Created state {entry:?} with ID: {id:?}");
        Ok(id)
    }

    fn texture_for_view(
        &self,
        texture: NativeTextureId,
    ) -> Result<(Arc<wgpu::Texture>, TextureFormat, u32, u32, bool), NativeError> {
        let textures = lock(&self.internal.textures);
        let entry = textures
            .get(&texture)
            .ok_or_else(|| NativeError::UnknownObject(format!("texture {}", texture.0)))?;
        Ok((
            entry.texture.clone(),
            entry.format,
            entry.width,
            entry.height,
            entry.render_target,
        ))
    }
}

fn not_found(what: &str, id: u64) -> NativeError {
    NativeError::UnknownObject(format!("{what} {id}"))
}

impl NativeDevice for WgpuNativeDevice {
    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
        contents: Option<&[u8]>,
    ) -> Result<NativeBufferId, NativeError> {
        if descriptor.size == 0 {
            return Err(NativeError::InvalidArgument("buffer size is zero".to_owned()));
        }
        if let Some(data) = contents {
            if data.len() as u64 > descriptor.size {
                return Err(NativeError::InvalidArgument(format!(
                    "{} bytes of contents for a {}-byte buffer",
                    data.len(),
                    descriptor.size
                )));
            }
        }
        let limit = self.internal.context.device_limits.max_buffer_size;
        if descriptor.size > limit {
            return Err(NativeError::OutOfMemory(format!(
                "{} bytes exceeds the {limit}-byte buffer limit",
                descriptor.size
            )));
        }

        let usage = match descriptor.kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
            BufferKind::Constant => wgpu::BufferUsages::UNIFORM,
        } | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::COPY_SRC;

        let mut shadow = vec![0u8; align4(descriptor.size) as usize];
        let buffer = match contents {
            Some(data) => {
                shadow[..data.len()].copy_from_slice(data);
                self.wgpu_device()
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: descriptor.label.as_deref(),
                        contents: &shadow,
                        usage,
                    })
            }
            None => self.wgpu_device().create_buffer(&wgpu::BufferDescriptor {
                label: descriptor.label.as_deref(),
                size: shadow.len() as u64,
                usage,
                mapped_at_creation: false,
            }),
        };

        let id = NativeBufferId(self.next_id());
        lock(&self.internal.buffers).insert(
            id,
            BufferEntry {
                buffer: Arc::new(buffer),
                shadow,
                size: descriptor.size,
            },
        );
        log::info!(
            "WgpuNativeDevice: Created {:?} buffer '{}' with ID: {id:?}, size: {} bytes",
            descriptor.kind,
            descriptor.label.as_deref().unwrap_or_default(),
            descriptor.size
        );
        Ok(id)
    }

    fn destroy_buffer(&self, id: NativeBufferId) -> Result<(), NativeError> {
        // Dropped rather than destroyed: recorded copies may still read it.
        lock(&self.internal.buffers)
            .remove(&id)
            .ok_or_else(|| not_found("buffer", id.0))?;
        log::debug!("WgpuNativeDevice: Destroyed buffer with ID: {id:?}");
        Ok(())
    }

    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        contents: Option<&[u8]>,
    ) -> Result<NativeTextureId, NativeError> {
        let max_dimension = self.internal.context.device_limits.max_texture_dimension_2d;
        if descriptor.width == 0
            || descriptor.height == 0
            || descriptor.width > max_dimension
            || descriptor.height > max_dimension
        {
            return Err(NativeError::InvalidArgument(format!(
                "texture size {}x{} outside 1..={max_dimension}",
                descriptor.width, descriptor.height
            )));
        }
        if !self.supports_format(descriptor.format) {
            return Err(NativeError::InvalidArgument(format!(
                "format {:?} is not supported",
                descriptor.format
            )));
        }
        let is_depth = descriptor.format.is_depth();
        let expected = descriptor.width as usize
            * descriptor.height as usize
            * descriptor.format.bytes_per_texel() as usize;
        if let Some(data) = contents {
            if is_depth {
                return Err(NativeError::InvalidArgument(
                    "depth textures cannot be initialized with contents".to_owned(),
                ));
            }
            if data.len() != expected {
                return Err(NativeError::InvalidArgument(format!(
                    "{} bytes of contents for a {expected}-byte texture",
                    data.len()
                )));
            }
        }

        let usage = if is_depth {
            wgpu::TextureUsages::RENDER_ATTACHMENT
        } else {
            let base = wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC;
            if descriptor.render_target {
                base | wgpu::TextureUsages::RENDER_ATTACHMENT
            } else {
                base
            }
        };
        let size = wgpu::Extent3d {
            width: descriptor.width,
            height: descriptor.height,
            depth_or_array_layers: 1,
        };
        let texture = self.wgpu_device().create_texture(&wgpu::TextureDescriptor {
            label: descriptor.label.as_deref(),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: descriptor.format.into_wgpu(),
            usage,
            view_formats: &[],
        });
        if let Some(data) = contents {
            self.queue().write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                data,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(descriptor.width * descriptor.format.bytes_per_texel()),
                    rows_per_image: Some(descriptor.height),
                },
                size,
            );
        }

        let id = NativeTextureId(self.next_id());
        lock(&self.internal.textures).insert(
            id,
            TextureEntry {
                texture: Arc::new(texture),
                format: descriptor.format,
                width: descriptor.width,
                height: descriptor.height,
                render_target: descriptor.render_target || is_depth,
            },
        );
        log::info!(
            "WgpuNativeDevice: Created texture '{}' with ID: {id:?}, {}x{} {:?}",
            descriptor.label.as_deref().unwrap_or_default(),
            descriptor.width,
            descriptor.height,
            descriptor.format
        );
        Ok(id)
    }

    fn destroy_texture(&self, id: NativeTextureId) -> Result<(), NativeError> {
        lock(&self.internal.textures)
            .remove(&id)
            .ok_or_else(|| not_found("texture", id.0))?;
        log::debug!("WgpuNativeDevice: Destroyed texture with ID: {id:?}");
        Ok(())
    }

    fn create_shader_resource_view(
        &self,
        texture: NativeTextureId,
    ) -> Result<NativeViewId, NativeError> {
        let texture_id = texture;
        let (texture, format, ..) = self.texture_for_view(texture_id)?;
        if format.is_depth() {
            return Err(NativeError::InvalidArgument(
                "depth textures cannot be sampled".to_owned(),
            ));
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let id = NativeViewId(self.next_id());
        lock(&self.internal.views).insert(
            id,
            ViewEntry {
                view: Arc::new(view),
                texture: texture_id,
            },
        );
        log::debug!("WgpuNativeDevice: Created shader-resource view with ID: {id:?}");
        Ok(id)
    }

    fn destroy_shader_resource_view(&self, id: NativeViewId) -> Result<(), NativeError> {
        lock(&self.internal.views)
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("view", id.0))
    }

    fn create_render_target_view(
        &self,
        texture: NativeTextureId,
    ) -> Result<NativeRenderTargetId, NativeError> {
        let texture_id = texture;
        let (texture, format, width, height, render_target) = self.texture_for_view(texture_id)?;
        if !render_target || format.is_depth() {
            return Err(NativeError::InvalidArgument(format!(
                "{format:?} texture was not created as a color render target"
            )));
        }
        let view = Arc::new(texture.create_view(&wgpu::TextureViewDescriptor::default()));
        let id = NativeRenderTargetId(self.next_id());
        lock(&self.internal.render_targets).insert(
            id,
            TargetView {
                view,
                texture: Some(texture_id),
                format,
                width,
                height,
            },
        );
        log::debug!("WgpuNativeDevice: Created render-target view with ID: {id:?}");
        Ok(id)
    }

    fn destroy_render_target_view(&self, id: NativeRenderTargetId) -> Result<(), NativeError> {
        lock(&self.internal.render_targets)
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("render target", id.0))
    }

    fn create_depth_stencil_view(
        &self,
        texture: NativeTextureId,
    ) -> Result<NativeDepthTargetId, NativeError> {
        let texture_id = texture;
        let (texture, format, width, height, _) = self.texture_for_view(texture_id)?;
        if !format.is_depth() {
            return Err(NativeError::InvalidArgument(format!(
                "{format:?} is not a depth format"
            )));
        }
        let view = Arc::new(texture.create_view(&wgpu::TextureViewDescriptor::default()));
        let id = NativeDepthTargetId(self.next_id());
        lock(&self.internal.depth_targets).insert(
            id,
            TargetView {
                view,
                texture: Some(texture_id),
                format,
                width,
                height,
            },
        );
        log::debug!("WgpuNativeDevice: Created depth-stencil view with ID: {id:?}");
        Ok(id)
    }

    fn destroy_depth_stencil_view(&self, id: NativeDepthTargetId) -> Result<(), NativeError> {
        lock(&self.internal.depth_targets)
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("depth target", id.0))
    }

    fn create_sampler(
        &self,
        descriptor: &SamplerDescriptor,
    ) -> Result<NativeSamplerId, NativeError> {
        let sampler = self.wgpu_device().create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Veneer Sampler"),
            address_mode_u: descriptor.address_u.into_wgpu(),
            address_mode_v: descriptor.address_v.into_wgpu(),
            mag_filter: descriptor.mag_filter.into_wgpu(),
            min_filter: descriptor.min_filter.into_wgpu(),
            ..Default::default()
        });
        let id = NativeSamplerId(self.next_id());
        lock(&self.internal.samplers).insert(id, Arc::new(sampler));
        log::debug!("WgpuNativeDevice: Created sampler {descriptor:?} with ID: {id:?}");
        Ok(id)
    }

    fn destroy_sampler(&self, id: NativeSamplerId) -> Result<(), NativeError> {
        lock(&self.internal.samplers)
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("sampler", id.0))
    }

    fn create_vertex_shader(
        &self,
        bytecode: &ShaderBytecode,
    ) -> Result<NativeShaderId, NativeError> {
        self.create_shader(bytecode, ShaderStage::Vertex)
    }

    fn create_pixel_shader(&self, bytecode: &ShaderBytecode) -> Result<NativeShaderId, NativeError> {
        self.create_shader(bytecode, ShaderStage::Pixel)
    }

    fn destroy_shader(&self, id: NativeShaderId) -> Result<(), NativeError> {
        lock(&self.internal.shaders)
            .remove(&id)
            .ok_or_else(|| not_found("shader", id.0))?;
        lock(&self.internal.pipelines).purge_shader(id);
        log::debug!("WgpuNativeDevice: Destroyed shader with ID: {id:?}");
        Ok(())
    }

    fn create_input_layout(
        &self,
        elements: &[InputElement],
        vertex_shader: NativeShaderId,
    ) -> Result<NativeInputLayoutId, NativeError> {
        let shader = lock(&self.internal.shaders)
            .get(&vertex_shader)
            .cloned()
            .ok_or_else(|| not_found("shader", vertex_shader.0))?;
        if shader.info.stage != ShaderStage::Vertex {
            return Err(NativeError::InvalidArgument(format!(
                "shader {} is not a vertex shader",
                vertex_shader.0
            )));
        }

        // Resolve appended offsets in element order.
        let mut cursor = 0u32;
        let mut span = 0u32;
        let placed: Vec<(InputElement, u32)> = elements
            .iter()
            .map(|element| {
                let offset = match element.offset {
                    AlignedByteOffset::Explicit(offset) => offset,
                    AlignedByteOffset::Append => cursor,
                };
                cursor = offset + element.format.size();
                span = span.max(cursor);
                (*element, offset)
            })
            .collect();

        let mut attributes = Vec::with_capacity(shader.signature.len());
        for input in &shader.signature {
            let (element, offset) = placed
                .iter()
                .find(|(e, _)| e.semantic == input.semantic && e.semantic_index == input.semantic_index)
                .ok_or_else(|| {
                    NativeError::IncompatibleLayout(format!(
                        "missing {}{}",
                        input.semantic.name(),
                        input.semantic_index
                    ))
                })?;
            if element.format.component_type() != input.component_type {
                return Err(NativeError::IncompatibleLayout(format!(
                    "{}{} is {:?} but the shader reads {:?}",
                    input.semantic.name(),
                    input.semantic_index,
                    element.format.component_type(),
                    input.component_type
                )));
            }
            if offset % element.format.size().min(4) != 0 {
                return Err(NativeError::IncompatibleLayout(format!(
                    "{}{} at offset {offset} is misaligned",
                    input.semantic.name(),
                    input.semantic_index
                )));
            }
            attributes.push(wgpu::VertexAttribute {
                format: element.format.into_wgpu(),
                offset: u64::from(*offset),
                shader_location: input.location,
            });
        }

        let id = NativeInputLayoutId(self.next_id());
        lock(&self.internal.input_layouts).insert(id, Arc::new(InputLayoutEntry { attributes, span }));
        log::debug!(
            "WgpuNativeDevice: Created input layout with ID: {id:?} ({} elements, span {span})",
            elements.len()
        );
        Ok(id)
    }

    fn destroy_input_layout(&self, id: NativeInputLayoutId) -> Result<(), NativeError> {
        lock(&self.internal.input_layouts)
            .remove(&id)
            .ok_or_else(|| not_found("input layout", id.0))?;
        lock(&self.internal.pipelines).purge_layout(id);
        Ok(())
    }

    fn create_depth_stencil_state(
        &self,
        descriptor: &DepthStencilDesc,
    ) -> Result<NativeStateId, NativeError> {
        self.create_state(StateEntry::DepthStencil(*descriptor))
    }

    fn create_blend_state(&self, descriptor: &BlendDesc) -> Result<NativeStateId, NativeError> {
        self.create_state(StateEntry::Blend(*descriptor))
    }

    fn create_rasterizer_state(
        &self,
        descriptor: &RasterizerDesc,
    ) -> Result<NativeStateId, NativeError> {
        self.create_state(StateEntry::Rasterizer(*descriptor))
    }

    fn destroy_state(&self, id: NativeStateId) -> Result<(), NativeError> {
        lock(&self.internal.states)
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("state", id.0))
    }

    fn create_fence(&self) -> Result<NativeFenceId, NativeError> {
        let id = NativeFenceId(self.next_id());
        lock(&self.internal.fences).insert(id, Arc::new(SyncPoint::default()));
        Ok(id)
    }

    fn destroy_fence(&self, id: NativeFenceId) -> Result<(), NativeError> {
        lock(&self.internal.fences)
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("fence", id.0))
    }

    fn create_query(&self) -> Result<NativeQueryId, NativeError> {
        let id = NativeQueryId(self.next_id());
        lock(&self.internal.queries).insert(id, Arc::new(SyncPoint::default()));
        Ok(id)
    }

    fn destroy_query(&self, id: NativeQueryId) -> Result<(), NativeError> {
        lock(&self.internal.queries)
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("query", id.0))
    }

    fn supports_format(&self, format: TextureFormat) -> bool {
        match format {
            TextureFormat::Rgba32Float => self
                .internal
                .context
                .active_device_features
                .contains(wgpu::Features::FLOAT32_FILTERABLE),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align4() {
        assert_eq!(align4(1), 4);
        assert_eq!(align4(4), 4);
        assert_eq!(align4(13), 16);
    }

    #[test]
    fn test_sync_point_starts_complete() {
        let point = SyncPoint::default();
        assert!(point.is_complete());

        point.issued.fetch_add(1, Ordering::AcqRel);
        assert!(!point.is_complete());

        point.completed.fetch_max(1, Ordering::AcqRel);
        assert!(point.is_complete());
    }
}
