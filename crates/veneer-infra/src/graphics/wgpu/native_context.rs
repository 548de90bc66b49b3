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

use std::sync::Arc;

use veneer_core::native::*;
use wgpu::util::DeviceExt;

use super::conversions::IntoWgpu;
use super::device::{align4, lock, StateEntry, TargetView, WgpuNativeDevice};
use super::pipeline_cache::{PipelineKey, PipelineSources};
use super::shader::{CONSTANT_SLOTS, TEXTURE_UNITS};

#[derive(Debug, Clone, Copy)]
enum DrawKind {
    Vertices {
        count: u32,
        instances: u32,
        first: u32,
        first_instance: u32,
    },
    Indexed {
        count: u32,
        instances: u32,
        first: u32,
        base_vertex: i32,
        first_instance: u32,
    },
}

/// What the immediate context currently has bound.
#[derive(Debug, Default)]
struct BoundState {
    vertex_shader: Option<NativeShaderId>,
    pixel_shader: Option<NativeShaderId>,
    input_layout: Option<NativeInputLayoutId>,
    constant_buffers: [[Option<NativeBufferId>; CONSTANT_SLOTS as usize]; 2],
    views: [Option<NativeViewId>; TEXTURE_UNITS as usize],
    samplers: [Option<NativeSamplerId>; TEXTURE_UNITS as usize],
    vertex_buffer: Option<(NativeBufferId, u32, u64)>,
    index_buffer: Option<(NativeBufferId, IndexFormat, u64)>,
    topology: PrimitiveTopology,
    depth_state: Option<NativeStateId>,
    blend_state: Option<NativeStateId>,
    rasterizer_state: Option<NativeStateId>,
    scissor: Rect,
    /// `None` covers the whole render target.
    viewport: Option<Viewport>,
    targets: RenderTargets,
}

/// The immediate context of a [`WgpuNativeDevice`].
///
/// Commands are recorded into a single `wgpu::CommandEncoder` which is
/// submitted on flush, on fence signals and before texture uploads.
#[derive(Debug)]
pub struct WgpuNativeContext {
    device: WgpuNativeDevice,
    encoder: Option<wgpu::CommandEncoder>,
    bound: BoundState,
}

fn active_encoder<'a>(
    slot: &'a mut Option<wgpu::CommandEncoder>,
    device: &wgpu::Device,
) -> &'a mut wgpu::CommandEncoder {
    slot.get_or_insert_with(|| {
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Veneer Immediate Context"),
        })
    })
}

fn depth_attachment(
    target: &TargetView,
    load: wgpu::LoadOp<f32>,
) -> wgpu::RenderPassDepthStencilAttachment<'_> {
    let has_stencil = target.format == TextureFormat::Depth24PlusStencil8;
    let stencil_load = if matches!(load, wgpu::LoadOp::Clear(_)) {
        wgpu::LoadOp::Clear(0)
    } else {
        wgpu::LoadOp::Load
    };
    wgpu::RenderPassDepthStencilAttachment {
        view: &target.view,
        depth_ops: Some(wgpu::Operations {
            load,
            store: wgpu::StoreOp::Store,
        }),
        stencil_ops: has_stencil.then_some(wgpu::Operations {
            load: stencil_load,
            store: wgpu::StoreOp::Store,
        }),
    }
}

impl WgpuNativeContext {
    pub(crate) fn new(device: WgpuNativeDevice) -> Self {
        Self {
            device,
            encoder: None,
            bound: BoundState::default(),
        }
    }

    /// The device this context records onto.
    pub fn device(&self) -> &WgpuNativeDevice {
        &self.device
    }

    fn submit(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.device.queue().submit(Some(encoder.finish()));
            log::trace!("WgpuNativeContext: submitted recorded commands");
        }
    }

    fn resolve_targets(&self) -> Result<(TargetView, Option<TargetView>), String> {
        let internal = &self.device.internal;
        let targets = self.bound.targets;
        if targets.is_default() {
            return Ok((
                internal.default_color.clone(),
                Some(internal.default_depth.clone()),
            ));
        }
        let color = match targets.color {
            Some(id) => lock(&internal.render_targets)
                .get(&id)
                .cloned()
                .ok_or_else(|| format!("render target {} does not exist", id.0))?,
            None => internal.default_color.clone(),
        };
        let depth = match targets.depth {
            Some(id) => Some(
                lock(&internal.depth_targets)
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| format!("depth target {} does not exist", id.0))?,
            ),
            None => None,
        };
        if let Some(depth) = &depth {
            if (depth.width, depth.height) != (color.width, color.height) {
                return Err(format!(
                    "depth target is {}x{} but the color target is {}x{}",
                    depth.width, depth.height, color.width, color.height
                ));
            }
        }
        Ok((color, depth))
    }

    fn state_descs(&self) -> (DepthStencilDesc, BlendDesc, RasterizerDesc) {
        let states = lock(&self.device.internal.states);
        let depth = match self.bound.depth_state.and_then(|id| states.get(&id)) {
            Some(StateEntry::DepthStencil(desc)) => *desc,
            _ => DepthStencilDesc::default(),
        };
        let blend = match self.bound.blend_state.and_then(|id| states.get(&id)) {
            Some(StateEntry::Blend(desc)) => *desc,
            _ => BlendDesc::default(),
        };
        let rasterizer = match self.bound.rasterizer_state.and_then(|id| states.get(&id)) {
            Some(StateEntry::Rasterizer(desc)) => *desc,
            _ => RasterizerDesc::default(),
        };
        (depth, blend, rasterizer)
    }

    /// Resolves every bound object and encodes one render pass.
    ///
    /// Returns `Err` with a reason when the draw cannot be encoded without
    /// tripping wgpu validation.
    fn encode_draw(&mut self, kind: DrawKind) -> Result<(), String> {
        let internal = self.device.internal.clone();
        let wgpu_device = &internal.context.device;

        let vs_id = self.bound.vertex_shader.ok_or("no vertex shader bound")?;
        let ps_id = self.bound.pixel_shader.ok_or("no pixel shader bound")?;
        let layout_id = self.bound.input_layout.ok_or("no input layout bound")?;
        let (vb_id, stride, vb_offset) = self.bound.vertex_buffer.ok_or("no vertex buffer bound")?;

        let (vertex, pixel) = {
            let shaders = lock(&internal.shaders);
            let vertex = shaders
                .get(&vs_id)
                .cloned()
                .ok_or_else(|| format!("vertex shader {} does not exist", vs_id.0))?;
            let pixel = shaders
                .get(&ps_id)
                .cloned()
                .ok_or_else(|| format!("pixel shader {} does not exist", ps_id.0))?;
            (vertex, pixel)
        };
        if vertex.info.stage != ShaderStage::Vertex || pixel.info.stage != ShaderStage::Pixel {
            return Err("shaders are bound to the wrong stages".to_owned());
        }
        let layout = lock(&internal.input_layouts)
            .get(&layout_id)
            .cloned()
            .ok_or_else(|| format!("input layout {} does not exist", layout_id.0))?;
        let max_stride = internal.context.device_limits.max_vertex_buffer_array_stride;
        if stride % 4 != 0 || stride > max_stride || (stride != 0 && stride < layout.span) {
            return Err(format!(
                "stride {stride} does not fit an input layout spanning {} bytes",
                layout.span
            ));
        }

        let (depth_desc, blend, rasterizer) = self.state_descs();
        let (color, depth) = self.resolve_targets()?;

        let (vertex_buffer, index, vs_buffers, ps_buffers) = {
            let buffers = lock(&internal.buffers);
            let entry = buffers
                .get(&vb_id)
                .ok_or_else(|| format!("vertex buffer {} does not exist", vb_id.0))?;
            if vb_offset % 4 != 0 || vb_offset > entry.size {
                return Err(format!("vertex buffer offset {vb_offset} is invalid"));
            }
            if let DrawKind::Vertices { count, first, .. } = kind {
                let needed = (u64::from(first) + u64::from(count)) * u64::from(stride);
                if needed > entry.size - vb_offset {
                    return Err(format!(
                        "{needed} bytes of vertices exceed the {}-byte vertex buffer",
                        entry.size - vb_offset
                    ));
                }
            }
            let vertex_buffer = entry.buffer.clone();

            let index = match kind {
                DrawKind::Indexed { count, first, .. } => {
                    let (ib_id, format, offset) =
                        self.bound.index_buffer.ok_or("no index buffer bound")?;
                    let entry = buffers
                        .get(&ib_id)
                        .ok_or_else(|| format!("index buffer {} does not exist", ib_id.0))?;
                    let index_size = u64::from(format.size());
                    if offset % index_size != 0 || offset > entry.size {
                        return Err(format!("index buffer offset {offset} is invalid"));
                    }
                    let needed = (u64::from(first) + u64::from(count)) * index_size;
                    if needed > entry.size - offset {
                        return Err(format!(
                            "{needed} bytes of indices exceed the {}-byte index buffer",
                            entry.size - offset
                        ));
                    }
                    Some((entry.buffer.clone(), format, offset))
                }
                DrawKind::Vertices { .. } => None,
            };

            let resolve = |slots: &[Option<NativeBufferId>]| -> Vec<Option<Arc<wgpu::Buffer>>> {
                slots
                    .iter()
                    .map(|slot| slot.and_then(|id| buffers.get(&id).map(|e| e.buffer.clone())))
                    .collect()
            };
            let vs_buffers = resolve(&self.bound.constant_buffers[ShaderStage::Vertex.index()]);
            let ps_buffers = resolve(&self.bound.constant_buffers[ShaderStage::Pixel.index()]);
            (vertex_buffer, index, vs_buffers, ps_buffers)
        };

        // A texture cannot be sampled while it is the color attachment.
        let views: Vec<Option<Arc<wgpu::TextureView>>> = {
            let views = lock(&internal.views);
            self.bound
                .views
                .iter()
                .enumerate()
                .map(|(unit, slot)| {
                    let entry = slot.and_then(|id| views.get(&id))?;
                    if color.texture == Some(entry.texture) {
                        log::debug!("Unit {unit} samples the bound render target; unbinding it");
                        return None;
                    }
                    Some(entry.view.clone())
                })
                .collect()
        };
        let samplers: Vec<Option<Arc<wgpu::Sampler>>> = {
            let samplers = lock(&internal.samplers);
            self.bound
                .samplers
                .iter()
                .map(|slot| slot.and_then(|id| samplers.get(&id).cloned()))
                .collect()
        };

        let (target_w, target_h) = (color.width as f32, color.height as f32);
        let viewport = self
            .bound
            .viewport
            .unwrap_or_else(|| Viewport::new(target_w, target_h));
        let vx = viewport.x.clamp(0.0, target_w);
        let vy = viewport.y.clamp(0.0, target_h);
        let vw = viewport.width.min(target_w - vx);
        let vh = viewport.height.min(target_h - vy);
        if !(vw > 0.0 && vh > 0.0) {
            return Err("viewport is empty".to_owned());
        }
        let min_depth = viewport.min_depth.clamp(0.0, 1.0);
        let max_depth = viewport.max_depth.clamp(0.0, 1.0).max(min_depth);

        let scissor = if rasterizer.scissor_enabled {
            let rect = self.bound.scissor;
            let x = rect.x.min(color.width);
            let y = rect.y.min(color.height);
            let w = rect.width.min(color.width - x);
            let h = rect.height.min(color.height - y);
            if w == 0 || h == 0 {
                log::trace!("Scissor rectangle is empty; nothing to draw");
                return Ok(());
            }
            Some((x, y, w, h))
        } else {
            None
        };

        let strip_index_format = match (&index, self.bound.topology) {
            (
                Some((_, format, _)),
                PrimitiveTopology::LineStrip | PrimitiveTopology::TriangleStrip,
            ) => Some(*format),
            _ => None,
        };
        let key = PipelineKey {
            vertex_shader: vs_id,
            pixel_shader: ps_id,
            input_layout: layout_id,
            stride,
            topology: self.bound.topology,
            strip_index_format,
            color_format: color.format,
            depth: depth.as_ref().map(|d| (d.format, depth_desc)),
            blend,
            rasterizer,
        };

        let (pipeline, bind_groups) = {
            let mut cache = lock(&internal.pipelines);
            let model = cache.model();
            for (stage, shader, buffers) in [
                (ShaderStage::Vertex, &vertex, &vs_buffers),
                (ShaderStage::Pixel, &pixel, &ps_buffers),
            ] {
                for uniform in &shader.info.uniforms {
                    let visible = model.visible_size(buffers[uniform.slot as usize].as_deref());
                    if visible < uniform.size {
                        return Err(format!(
                            "{stage:?} constant slot {} holds {visible} bytes but the shader reads {}",
                            uniform.slot, uniform.size
                        ));
                    }
                }
            }
            let bind_groups = [
                model.constant_bind_group(wgpu_device, ShaderStage::Vertex, &vs_buffers),
                model.constant_bind_group(wgpu_device, ShaderStage::Pixel, &ps_buffers),
                model.texture_bind_group(wgpu_device, &views, &samplers),
            ];
            let pipeline = cache.get_or_create(
                wgpu_device,
                key,
                PipelineSources {
                    vertex: &vertex,
                    pixel: &pixel,
                    layout: &layout,
                },
            )?;
            (pipeline, bind_groups)
        };

        let encoder = active_encoder(&mut self.encoder, wgpu_device);
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Veneer Draw"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &color.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: depth
                .as_ref()
                .map(|d| depth_attachment(d, wgpu::LoadOp::Load)),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_pipeline(&pipeline);
        for (slot, group) in bind_groups.iter().enumerate() {
            pass.set_bind_group(slot as u32, group, &[]);
        }
        pass.set_vertex_buffer(0, vertex_buffer.slice(vb_offset..));
        pass.set_viewport(vx, vy, vw, vh, min_depth, max_depth);
        if let Some((x, y, w, h)) = scissor {
            pass.set_scissor_rect(x, y, w, h);
        }
        match (kind, &index) {
            (
                DrawKind::Vertices {
                    count,
                    instances,
                    first,
                    first_instance,
                },
                _,
            ) => {
                pass.draw(first..first + count, first_instance..first_instance + instances);
            }
            (
                DrawKind::Indexed {
                    count,
                    instances,
                    first,
                    base_vertex,
                    first_instance,
                },
                Some((buffer, format, offset)),
            ) => {
                pass.set_index_buffer(buffer.slice(*offset..), format.into_wgpu());
                pass.draw_indexed(
                    first..first + count,
                    base_vertex,
                    first_instance..first_instance + instances,
                );
            }
            (DrawKind::Indexed { .. }, None) => {}
        }
        Ok(())
    }

    fn draw_or_skip(&mut self, kind: DrawKind) {
        if let Err(reason) = self.encode_draw(kind) {
            log::warn!("WgpuNativeContext: skipped draw: {reason}");
        }
    }

    fn staged_copy(&mut self, destination: &wgpu::Buffer, offset: u64, bytes: &[u8]) {
        let device = self.device.wgpu_device();
        let staging = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Veneer Upload"),
            contents: bytes,
            usage: wgpu::BufferUsages::COPY_SRC,
        });
        active_encoder(&mut self.encoder, device).copy_buffer_to_buffer(
            &staging,
            0,
            destination,
            offset,
            bytes.len() as u64,
        );
    }
}

fn range_overflows(first: u32, count: u32, instances: u32, first_instance: u32) -> bool {
    first.checked_add(count).is_none() || first_instance.checked_add(instances).is_none()
}

impl NativeContext for WgpuNativeContext {
    fn set_vertex_shader(&mut self, shader: Option<NativeShaderId>) {
        self.bound.vertex_shader = shader;
        self.bound.constant_buffers[ShaderStage::Vertex.index()] = Default::default();
    }

    fn set_pixel_shader(&mut self, shader: Option<NativeShaderId>) {
        self.bound.pixel_shader = shader;
        self.bound.constant_buffers[ShaderStage::Pixel.index()] = Default::default();
        self.bound.views = Default::default();
        self.bound.samplers = Default::default();
    }

    fn set_input_layout(&mut self, layout: Option<NativeInputLayoutId>) {
        self.bound.input_layout = layout;
    }

    fn set_constant_buffer(
        &mut self,
        stage: ShaderStage,
        slot: u32,
        buffer: Option<NativeBufferId>,
    ) {
        match self.bound.constant_buffers[stage.index()].get_mut(slot as usize) {
            Some(bound) => *bound = buffer,
            None => log::warn!("WgpuNativeContext: constant slot {slot} out of range"),
        }
    }

    fn set_shader_resource(&mut self, unit: u32, view: Option<NativeViewId>) {
        match self.bound.views.get_mut(unit as usize) {
            Some(bound) => *bound = view,
            None => log::warn!("WgpuNativeContext: texture unit {unit} out of range"),
        }
    }

    fn set_sampler(&mut self, unit: u32, sampler: Option<NativeSamplerId>) {
        match self.bound.samplers.get_mut(unit as usize) {
            Some(bound) => *bound = sampler,
            None => log::warn!("WgpuNativeContext: sampler unit {unit} out of range"),
        }
    }

    fn set_vertex_buffer(&mut self, buffer: Option<NativeBufferId>, stride: u32, offset: u64) {
        self.bound.vertex_buffer = buffer.map(|id| (id, stride, offset));
    }

    fn set_index_buffer(&mut self, buffer: Option<NativeBufferId>, format: IndexFormat, offset: u64) {
        self.bound.index_buffer = buffer.map(|id| (id, format, offset));
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) {
        self.bound.topology = topology;
    }

    fn set_depth_stencil_state(&mut self, state: Option<NativeStateId>) {
        self.bound.depth_state = state;
    }

    fn set_blend_state(&mut self, state: Option<NativeStateId>) {
        self.bound.blend_state = state;
    }

    fn set_rasterizer_state(&mut self, state: Option<NativeStateId>) {
        self.bound.rasterizer_state = state;
    }

    fn set_scissor_rect(&mut self, rect: Rect) {
        self.bound.scissor = rect;
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.bound.viewport = Some(viewport);
    }

    fn set_render_targets(&mut self, targets: RenderTargets) {
        self.bound.targets = targets;
    }

    fn clear_render_target(&mut self, target: Option<NativeRenderTargetId>, color: [f32; 4]) {
        let internal = self.device.internal.clone();
        let view = match target {
            None => internal.default_color.clone(),
            Some(id) => match lock(&internal.render_targets).get(&id).cloned() {
                Some(view) => view,
                None => {
                    log::warn!("WgpuNativeContext: cannot clear missing render target {}", id.0);
                    return;
                }
            },
        };
        let [r, g, b, a] = color.map(f64::from);
        let encoder = active_encoder(&mut self.encoder, &internal.context.device);
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Veneer Clear Color"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
    }

    fn clear_depth_stencil(&mut self, target: Option<NativeDepthTargetId>, depth: f32) {
        let internal = self.device.internal.clone();
        let view = match target {
            None => internal.default_depth.clone(),
            Some(id) => match lock(&internal.depth_targets).get(&id).cloned() {
                Some(view) => view,
                None => {
                    log::warn!("WgpuNativeContext: cannot clear missing depth target {}", id.0);
                    return;
                }
            },
        };
        let encoder = active_encoder(&mut self.encoder, &internal.context.device);
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Veneer Clear Depth"),
            color_attachments: &[],
            depth_stencil_attachment: Some(depth_attachment(
                &view,
                wgpu::LoadOp::Clear(depth.clamp(0.0, 1.0)),
            )),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
    }

    fn update_buffer(
        &mut self,
        buffer: NativeBufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), NativeError> {
        if data.is_empty() {
            return Ok(());
        }
        let (target, start, bytes) = {
            let mut buffers = lock(&self.device.internal.buffers);
            let entry = buffers
                .get_mut(&buffer)
                .ok_or_else(|| NativeError::UnknownObject(format!("buffer {}", buffer.0)))?;
            let end = offset
                .checked_add(data.len() as u64)
                .filter(|&end| end <= entry.size)
                .ok_or_else(|| {
                    NativeError::InvalidArgument(format!(
                        "update of {} bytes at {offset} exceeds the {}-byte buffer",
                        data.len(),
                        entry.size
                    ))
                })?;
            entry.shadow[offset as usize..end as usize].copy_from_slice(data);
            let start = offset & !(wgpu::COPY_BUFFER_ALIGNMENT - 1);
            let bytes = entry.shadow[start as usize..align4(end) as usize].to_vec();
            (entry.buffer.clone(), start, bytes)
        };

        // Draws already recorded must observe the old contents.
        if self.encoder.is_some() {
            self.staged_copy(&target, start, &bytes);
        } else {
            self.device.queue().write_buffer(&target, start, &bytes);
        }
        Ok(())
    }

    fn update_texture(
        &mut self,
        texture: NativeTextureId,
        region: TextureRegion,
        data: &[u8],
    ) -> Result<(), NativeError> {
        let (target, format) = {
            let textures = lock(&self.device.internal.textures);
            let entry = textures
                .get(&texture)
                .ok_or_else(|| NativeError::UnknownObject(format!("texture {}", texture.0)))?;
            let fits = region.x.checked_add(region.width).is_some_and(|r| r <= entry.width)
                && region.y.checked_add(region.height).is_some_and(|b| b <= entry.height);
            if !fits || entry.format.is_depth() {
                return Err(NativeError::InvalidArgument(format!(
                    "region {region:?} cannot be written to a {}x{} {:?} texture",
                    entry.width, entry.height, entry.format
                )));
            }
            (entry.texture.clone(), entry.format)
        };
        let row = region.width * format.bytes_per_texel();
        if data.len() != row as usize * region.height as usize {
            return Err(NativeError::InvalidArgument(format!(
                "{} bytes for a {}x{} region",
                data.len(),
                region.width,
                region.height
            )));
        }
        if data.is_empty() {
            return Ok(());
        }

        // Queue writes land before the next submission; submit first to keep order.
        self.submit();
        self.device.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &target,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: region.x,
                    y: region.y,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(row),
                rows_per_image: Some(region.height),
            },
            wgpu::Extent3d {
                width: region.width,
                height: region.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn copy_buffer_region(
        &mut self,
        destination: NativeBufferId,
        source: NativeBufferId,
        size: u64,
    ) -> Result<(), NativeError> {
        if size == 0 {
            return Ok(());
        }
        let body = size & !(wgpu::COPY_BUFFER_ALIGNMENT - 1);
        let (src, dst, tail) = {
            let mut buffers = lock(&self.device.internal.buffers);
            let src = buffers
                .get(&source)
                .ok_or_else(|| NativeError::UnknownObject(format!("buffer {}", source.0)))?;
            if size > src.size {
                return Err(NativeError::InvalidArgument(format!(
                    "copy of {size} bytes from a {}-byte buffer",
                    src.size
                )));
            }
            let prefix = src.shadow[..size as usize].to_vec();
            let src = src.buffer.clone();
            let dst = buffers
                .get_mut(&destination)
                .ok_or_else(|| NativeError::UnknownObject(format!("buffer {}", destination.0)))?;
            if size > dst.size {
                return Err(NativeError::InvalidArgument(format!(
                    "copy of {size} bytes into a {}-byte buffer",
                    dst.size
                )));
            }
            dst.shadow[..size as usize].copy_from_slice(&prefix);
            // The unaligned tail goes up as a whole word merged with what follows it.
            let tail = (body < size)
                .then(|| dst.shadow[body as usize..align4(size) as usize].to_vec());
            (src, dst.buffer.clone(), tail)
        };

        if body > 0 {
            active_encoder(&mut self.encoder, self.device.wgpu_device())
                .copy_buffer_to_buffer(&src, 0, &dst, 0, body);
        }
        if let Some(tail) = tail {
            self.staged_copy(&dst, body, &tail);
        }
        log::debug!("WgpuNativeContext: copied {size} bytes from {source:?} to {destination:?}");
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        if range_overflows(first_vertex, vertex_count, instance_count, first_instance) {
            log::warn!("WgpuNativeContext: draw range overflows");
            return;
        }
        self.draw_or_skip(DrawKind::Vertices {
            count: vertex_count,
            instances: instance_count,
            first: first_vertex,
            first_instance,
        });
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    ) {
        if range_overflows(first_index, index_count, instance_count, first_instance) {
            log::warn!("WgpuNativeContext: indexed draw range overflows");
            return;
        }
        self.draw_or_skip(DrawKind::Indexed {
            count: index_count,
            instances: instance_count,
            first: first_index,
            base_vertex,
            first_instance,
        });
    }

    fn end_query(&mut self, query: NativeQueryId) {
        let Some(point) = lock(&self.device.internal.queries).get(&query).cloned() else {
            log::warn!("WgpuNativeContext: end_query on missing query {}", query.0);
            return;
        };
        self.submit();
        point.arm(self.device.queue());
    }

    fn query_completed(&mut self, query: NativeQueryId) -> Result<bool, NativeError> {
        let point = lock(&self.device.internal.queries)
            .get(&query)
            .cloned()
            .ok_or_else(|| NativeError::UnknownObject(format!("query {}", query.0)))?;
        self.device.poll()?;
        Ok(point.is_complete())
    }

    fn signal_fence(&mut self, fence: NativeFenceId) -> Result<(), NativeError> {
        let point = lock(&self.device.internal.fences)
            .get(&fence)
            .cloned()
            .ok_or_else(|| NativeError::UnknownObject(format!("fence {}", fence.0)))?;
        self.submit();
        point.arm(self.device.queue());
        Ok(())
    }

    fn poll_fence(&mut self, fence: NativeFenceId) -> Result<bool, NativeError> {
        let point = lock(&self.device.internal.fences)
            .get(&fence)
            .cloned()
            .ok_or_else(|| NativeError::UnknownObject(format!("fence {}", fence.0)))?;
        self.device.poll()?;
        Ok(point.is_complete())
    }

    fn wait_fence(&mut self, fence: NativeFenceId) -> Result<(), NativeError> {
        let point = lock(&self.device.internal.fences)
            .get(&fence)
            .cloned()
            .ok_or_else(|| NativeError::UnknownObject(format!("fence {}", fence.0)))?;
        self.submit();
        self.device
            .wait_until(|| point.is_complete(), &format!("fence {}", fence.0))
    }

    fn flush(&mut self) -> Result<(), NativeError> {
        self.submit();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_overflow() {
        assert!(!range_overflows(0, 3, 1, 0));
        assert!(range_overflows(u32::MAX, 1, 1, 0));
        assert!(range_overflows(0, 3, 2, u32::MAX));
    }

    #[test]
    fn test_bound_state_defaults() {
        let bound = BoundState::default();
        assert!(bound.targets.is_default());
        assert_eq!(bound.topology, PrimitiveTopology::TriangleList);
        assert!(bound.viewport.is_none());
    }
}
