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

//! A recording native device for tests.
//!
//! [`RecordingDevice`] and [`RecordingContext`] share one simulated GPU: buffer
//! memory, shader input signatures, fence and query completion, and a log of
//! every native call. Knobs on the device inject failures.

use crate::native::*;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One native call observed by the recording device or context.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum NativeCall {
    CreateBuffer { id: NativeBufferId, size: u64, kind: BufferKind },
    DestroyBuffer(NativeBufferId),
    CreateTexture { id: NativeTextureId, width: u32, height: u32, format: TextureFormat },
    DestroyTexture(NativeTextureId),
    CreateShaderResourceView(NativeViewId),
    DestroyShaderResourceView(NativeViewId),
    CreateRenderTargetView(NativeRenderTargetId),
    DestroyRenderTargetView(NativeRenderTargetId),
    CreateDepthStencilView(NativeDepthTargetId),
    DestroyDepthStencilView(NativeDepthTargetId),
    CreateSampler(NativeSamplerId),
    DestroySampler(NativeSamplerId),
    CreateShader { id: NativeShaderId, stage: ShaderStage },
    DestroyShader(NativeShaderId),
    CreateInputLayout { shader: NativeShaderId, result: Option<NativeInputLayoutId> },
    DestroyInputLayout(NativeInputLayoutId),
    CreateState(NativeStateId),
    DestroyState(NativeStateId),
    CreateFence(NativeFenceId),
    DestroyFence(NativeFenceId),
    CreateQuery(NativeQueryId),
    DestroyQuery(NativeQueryId),
    SetVertexShader(Option<NativeShaderId>),
    SetPixelShader(Option<NativeShaderId>),
    SetInputLayout(Option<NativeInputLayoutId>),
    SetConstantBuffer { stage: ShaderStage, slot: u32, buffer: Option<NativeBufferId> },
    SetShaderResource { unit: u32, view: Option<NativeViewId> },
    SetSampler { unit: u32, sampler: Option<NativeSamplerId> },
    SetVertexBuffer { buffer: Option<NativeBufferId>, stride: u32, offset: u64 },
    SetIndexBuffer { buffer: Option<NativeBufferId>, format: IndexFormat, offset: u64 },
    SetPrimitiveTopology(PrimitiveTopology),
    SetDepthStencilState(Option<NativeStateId>),
    SetBlendState(Option<NativeStateId>),
    SetRasterizerState(Option<NativeStateId>),
    SetScissorRect(Rect),
    SetViewport(Viewport),
    SetRenderTargets(RenderTargets),
    ClearRenderTarget { target: Option<NativeRenderTargetId>, color: [f32; 4] },
    ClearDepthStencil { target: Option<NativeDepthTargetId>, depth: f32 },
    UpdateBuffer { buffer: NativeBufferId, offset: u64, len: usize },
    UpdateTexture { texture: NativeTextureId, region: TextureRegion },
    CopyBufferRegion { destination: NativeBufferId, source: NativeBufferId, size: u64 },
    Draw { vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32 },
    DrawIndexed { index_count: u32, instance_count: u32, first_index: u32, base_vertex: i32, first_instance: u32 },
    EndQuery(NativeQueryId),
    SignalFence(NativeFenceId),
    WaitFence(NativeFenceId),
    Flush,
}

impl NativeCall {
    /// Returns `true` for draw calls of either kind.
    pub fn is_draw(&self) -> bool {
        matches!(self, NativeCall::Draw { .. } | NativeCall::DrawIndexed { .. })
    }

    /// Returns `true` for vertex or pixel shader binds.
    pub fn is_shader_bind(&self) -> bool {
        matches!(self, NativeCall::SetVertexShader(_) | NativeCall::SetPixelShader(_))
    }
}

const CONSTANT_SLOTS: usize = 4;

#[derive(Debug, Default)]
struct Bound {
    constant_buffers: [[Option<NativeBufferId>; CONSTANT_SLOTS]; 2],
    views: HashMap<u32, NativeViewId>,
    samplers: HashMap<u32, NativeSamplerId>,
}

#[derive(Debug, Default)]
struct Shared {
    next_id: u64,
    calls: Vec<NativeCall>,
    live: HashSet<u64>,
    buffers: HashMap<u64, Vec<u8>>,
    textures: HashMap<u64, (u32, u32, TextureFormat)>,
    vertex_shaders: HashMap<u64, Vec<SignatureElement>>,
    fences: HashMap<u64, Option<u32>>,
    queries: HashMap<u64, Option<u32>>,
    bound: Bound,
    // Knobs.
    completion_latency: u32,
    buffer_budget: Option<u64>,
    reject_shaders: bool,
    unsupported: HashSet<TextureFormat>,
    fail_copies: bool,
    fail_input_layouts: u32,
    fence_limit: Option<usize>,
    hang_on_wait: bool,
}

impl Shared {
    fn issue(&mut self) -> u64 {
        self.next_id += 1;
        self.live.insert(self.next_id);
        self.next_id
    }

    fn retire(&mut self, id: u64, what: &str) -> Result<(), NativeError> {
        if self.live.remove(&id) {
            Ok(())
        } else {
            Err(NativeError::UnknownObject(format!("{what} {id}")))
        }
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A simulated native device that records every call.
#[derive(Debug, Clone)]
pub struct RecordingDevice {
    shared: Arc<Mutex<Shared>>,
}

/// The immediate context paired with a [`RecordingDevice`].
#[derive(Debug)]
pub struct RecordingContext {
    shared: Arc<Mutex<Shared>>,
}

impl RecordingDevice {
    /// Creates a device and its context. Fences and queries complete on the
    /// first poll after being signaled.
    pub fn new() -> (RecordingDevice, RecordingContext) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        (
            RecordingDevice {
                shared: shared.clone(),
            },
            RecordingContext { shared },
        )
    }

    /// Number of polls a signaled fence or issued query reports incomplete.
    pub fn set_completion_latency(&self, polls: u32) {
        lock(&self.shared).completion_latency = polls;
    }

    /// Buffer allocations larger than `budget` bytes fail with `OutOfMemory`.
    pub fn set_buffer_budget(&self, budget: Option<u64>) {
        lock(&self.shared).buffer_budget = budget;
    }

    /// Makes every shader creation fail validation.
    pub fn set_reject_shaders(&self, reject: bool) {
        lock(&self.shared).reject_shaders = reject;
    }

    /// Marks a texture format unsupported.
    pub fn set_format_unsupported(&self, format: TextureFormat) {
        lock(&self.shared).unsupported.insert(format);
    }

    /// Makes device-side buffer copies fail.
    pub fn set_fail_copies(&self, fail: bool) {
        lock(&self.shared).fail_copies = fail;
    }

    /// Makes the next `count` input layout creations fail with `OutOfMemory`.
    pub fn set_fail_input_layouts(&self, count: u32) {
        lock(&self.shared).fail_input_layouts = count;
    }

    /// Fence creation fails with `OutOfMemory` once `limit` fences are live.
    pub fn set_fence_limit(&self, limit: Option<usize>) {
        lock(&self.shared).fence_limit = limit;
    }

    /// Makes blocking fence waits report a lost device.
    pub fn set_hang_on_wait(&self, hang: bool) {
        lock(&self.shared).hang_on_wait = hang;
    }

    /// A copy of the call log.
    pub fn calls(&self) -> Vec<NativeCall> {
        lock(&self.shared).calls.clone()
    }

    /// Empties the call log.
    pub fn clear_calls(&self) {
        lock(&self.shared).calls.clear();
    }

    /// Number of logged calls matching `predicate`.
    pub fn count_calls(&self, predicate: impl Fn(&NativeCall) -> bool) -> usize {
        lock(&self.shared).calls.iter().filter(|c| predicate(c)).count()
    }

    /// Current contents of a simulated buffer.
    pub fn buffer_contents(&self, id: NativeBufferId) -> Option<Vec<u8>> {
        lock(&self.shared).buffers.get(&id.0).cloned()
    }

    /// Number of native objects created and not yet destroyed.
    pub fn live_objects(&self) -> usize {
        lock(&self.shared).live.len()
    }

    /// The view currently bound to a texture unit.
    pub fn bound_view(&self, unit: u32) -> Option<NativeViewId> {
        lock(&self.shared).bound.views.get(&unit).copied()
    }

    /// The sampler currently bound to a sampler unit.
    pub fn bound_sampler(&self, unit: u32) -> Option<NativeSamplerId> {
        lock(&self.shared).bound.samplers.get(&unit).copied()
    }

    /// The constant buffer currently bound to a stage slot.
    pub fn bound_constant_buffer(&self, stage: ShaderStage, slot: u32) -> Option<NativeBufferId> {
        lock(&self.shared).bound.constant_buffers[stage.index()]
            .get(slot as usize)
            .copied()
            .flatten()
    }

    fn create_shader(
        &self,
        bytecode: &ShaderBytecode,
        stage: ShaderStage,
    ) -> Result<NativeShaderId, NativeError> {
        let mut shared = lock(&self.shared);
        if shared.reject_shaders || bytecode.code.is_empty() {
            return Err(NativeError::ShaderRejected(format!(
                "invalid bytecode for '{}'",
                bytecode.label.as_deref().unwrap_or("unnamed")
            )));
        }
        let id = shared.issue();
        if stage == ShaderStage::Vertex {
            shared
                .vertex_shaders
                .insert(id, bytecode.input_signature.clone());
        }
        let id = NativeShaderId(id);
        shared.calls.push(NativeCall::CreateShader { id, stage });
        Ok(id)
    }
}

impl NativeDevice for RecordingDevice {
    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
        contents: Option<&[u8]>,
    ) -> Result<NativeBufferId, NativeError> {
        let mut shared = lock(&self.shared);
        if descriptor.size == 0 {
            return Err(NativeError::InvalidArgument("zero-sized buffer".into()));
        }
        if shared.buffer_budget.is_some_and(|b| descriptor.size > b) {
            return Err(NativeError::OutOfMemory(format!(
                "{} bytes over budget",
                descriptor.size
            )));
        }
        let mut memory = vec![0u8; descriptor.size as usize];
        if let Some(bytes) = contents {
            if bytes.len() > memory.len() {
                return Err(NativeError::InvalidArgument(
                    "initial contents exceed buffer size".into(),
                ));
            }
            memory[..bytes.len()].copy_from_slice(bytes);
        }
        let id = shared.issue();
        shared.buffers.insert(id, memory);
        let id = NativeBufferId(id);
        shared.calls.push(NativeCall::CreateBuffer {
            id,
            size: descriptor.size,
            kind: descriptor.kind,
        });
        Ok(id)
    }

    fn destroy_buffer(&self, id: NativeBufferId) -> Result<(), NativeError> {
        let mut shared = lock(&self.shared);
        shared.retire(id.0, "buffer")?;
        shared.buffers.remove(&id.0);
        shared.calls.push(NativeCall::DestroyBuffer(id));
        Ok(())
    }

    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        contents: Option<&[u8]>,
    ) -> Result<NativeTextureId, NativeError> {
        let mut shared = lock(&self.shared);
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(NativeError::InvalidArgument("zero-sized texture".into()));
        }
        if shared.unsupported.contains(&descriptor.format) {
            return Err(NativeError::InvalidArgument(format!(
                "unsupported format {:?}",
                descriptor.format
            )));
        }
        let expected = descriptor.width as usize
            * descriptor.height as usize
            * descriptor.format.bytes_per_texel() as usize;
        if contents.is_some_and(|c| c.len() < expected) {
            return Err(NativeError::InvalidArgument("texture contents too short".into()));
        }
        let id = shared.issue();
        shared.textures.insert(
            id,
            (descriptor.width, descriptor.height, descriptor.format),
        );
        let id = NativeTextureId(id);
        shared.calls.push(NativeCall::CreateTexture {
            id,
            width: descriptor.width,
            height: descriptor.height,
            format: descriptor.format,
        });
        Ok(id)
    }

    fn destroy_texture(&self, id: NativeTextureId) -> Result<(), NativeError> {
        let mut shared = lock(&self.shared);
        shared.retire(id.0, "texture")?;
        shared.textures.remove(&id.0);
        shared.calls.push(NativeCall::DestroyTexture(id));
        Ok(())
    }

    fn create_shader_resource_view(
        &self,
        texture: NativeTextureId,
    ) -> Result<NativeViewId, NativeError> {
        let mut shared = lock(&self.shared);
        if !shared.textures.contains_key(&texture.0) {
            return Err(NativeError::UnknownObject(format!("texture {}", texture.0)));
        }
        let id = NativeViewId(shared.issue());
        shared.calls.push(NativeCall::CreateShaderResourceView(id));
        Ok(id)
    }

    fn destroy_shader_resource_view(&self, id: NativeViewId) -> Result<(), NativeError> {
        let mut shared = lock(&self.shared);
        shared.retire(id.0, "view")?;
        shared.calls.push(NativeCall::DestroyShaderResourceView(id));
        Ok(())
    }

    fn create_render_target_view(
        &self,
        texture: NativeTextureId,
    ) -> Result<NativeRenderTargetId, NativeError> {
        let mut shared = lock(&self.shared);
        match shared.textures.get(&texture.0) {
            Some((_, _, format)) if !format.is_depth() => {}
            Some(_) => {
                return Err(NativeError::InvalidArgument(
                    "depth texture used as color target".into(),
                ))
            }
            None => return Err(NativeError::UnknownObject(format!("texture {}", texture.0))),
        }
        let id = NativeRenderTargetId(shared.issue());
        shared.calls.push(NativeCall::CreateRenderTargetView(id));
        Ok(id)
    }

    fn destroy_render_target_view(&self, id: NativeRenderTargetId) -> Result<(), NativeError> {
        let mut shared = lock(&self.shared);
        shared.retire(id.0, "render target view")?;
        shared.calls.push(NativeCall::DestroyRenderTargetView(id));
        Ok(())
    }

    fn create_depth_stencil_view(
        &self,
        texture: NativeTextureId,
    ) -> Result<NativeDepthTargetId, NativeError> {
        let mut shared = lock(&self.shared);
        match shared.textures.get(&texture.0) {
            Some((_, _, format)) if format.is_depth() => {}
            Some(_) => {
                return Err(NativeError::InvalidArgument(
                    "color texture used as depth target".into(),
                ))
            }
            None => return Err(NativeError::UnknownObject(format!("texture {}", texture.0))),
        }
        let id = NativeDepthTargetId(shared.issue());
        shared.calls.push(NativeCall::CreateDepthStencilView(id));
        Ok(id)
    }

    fn destroy_depth_stencil_view(&self, id: NativeDepthTargetId) -> Result<(), NativeError> {
        let mut shared = lock(&self.shared);
        shared.retire(id.0, "depth stencil view")?;
        shared.calls.push(NativeCall::DestroyDepthStencilView(id));
        Ok(())
    }

    fn create_sampler(
        &self,
        _descriptor: &SamplerDescriptor,
    ) -> Result<NativeSamplerId, NativeError> {
        let mut shared = lock(&self.shared);
        let id = NativeSamplerId(shared.issue());
        shared.calls.push(NativeCall::CreateSampler(id));
        Ok(id)
    }

    fn destroy_sampler(&self, id: NativeSamplerId) -> Result<(), NativeError> {
        let mut shared = lock(&self.shared);
        shared.retire(id.0, "sampler")?;
        shared.calls.push(NativeCall::DestroySampler(id));
        Ok(())
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
        let mut shared = lock(&self.shared);
        shared.retire(id.0, "shader")?;
        shared.vertex_shaders.remove(&id.0);
        shared.calls.push(NativeCall::DestroyShader(id));
        Ok(())
    }

    fn create_input_layout(
        &self,
        elements: &[InputElement],
        vertex_shader: NativeShaderId,
    ) -> Result<NativeInputLayoutId, NativeError> {
        let mut shared = lock(&self.shared);
        if shared.fail_input_layouts > 0 {
            shared.fail_input_layouts -= 1;
            return Err(NativeError::OutOfMemory("input layout".into()));
        }
        let Some(signature) = shared.vertex_shaders.get(&vertex_shader.0).cloned() else {
            return Err(NativeError::UnknownObject(format!(
                "vertex shader {}",
                vertex_shader.0
            )));
        };

        let verdict = signature.iter().try_for_each(|input| {
            let element = elements
                .iter()
                .find(|e| e.semantic == input.semantic && e.semantic_index == input.semantic_index)
                .ok_or_else(|| {
                    format!("missing {}{}", input.semantic.name(), input.semantic_index)
                })?;
            if element.format.component_type() != input.component_type {
                return Err(format!(
                    "{}{} is {:?}, shader reads {:?}",
                    input.semantic.name(),
                    input.semantic_index,
                    element.format.component_type(),
                    input.component_type
                ));
            }
            Ok(())
        });

        match verdict {
            Ok(()) => {
                let id = NativeInputLayoutId(shared.issue());
                shared.calls.push(NativeCall::CreateInputLayout {
                    shader: vertex_shader,
                    result: Some(id),
                });
                Ok(id)
            }
            Err(reason) => {
                shared.calls.push(NativeCall::CreateInputLayout {
                    shader: vertex_shader,
                    result: None,
                });
                Err(NativeError::IncompatibleLayout(reason))
            }
        }
    }

    fn destroy_input_layout(&self, id: NativeInputLayoutId) -> Result<(), NativeError> {
        let mut shared = lock(&self.shared);
        shared.retire(id.0, "input layout")?;
        shared.calls.push(NativeCall::DestroyInputLayout(id));
        Ok(())
    }

    fn create_depth_stencil_state(
        &self,
        _descriptor: &DepthStencilDesc,
    ) -> Result<NativeStateId, NativeError> {
        let mut shared = lock(&self.shared);
        let id = NativeStateId(shared.issue());
        shared.calls.push(NativeCall::CreateState(id));
        Ok(id)
    }

    fn create_blend_state(&self, _descriptor: &BlendDesc) -> Result<NativeStateId, NativeError> {
        let mut shared = lock(&self.shared);
        let id = NativeStateId(shared.issue());
        shared.calls.push(NativeCall::CreateState(id));
        Ok(id)
    }

    fn create_rasterizer_state(
        &self,
        _descriptor: &RasterizerDesc,
    ) -> Result<NativeStateId, NativeError> {
        let mut shared = lock(&self.shared);
        let id = NativeStateId(shared.issue());
        shared.calls.push(NativeCall::CreateState(id));
        Ok(id)
    }

    fn destroy_state(&self, id: NativeStateId) -> Result<(), NativeError> {
        let mut shared = lock(&self.shared);
        shared.retire(id.0, "state")?;
        shared.calls.push(NativeCall::DestroyState(id));
        Ok(())
    }

    fn create_fence(&self) -> Result<NativeFenceId, NativeError> {
        let mut shared = lock(&self.shared);
        if shared
            .fence_limit
            .is_some_and(|limit| shared.fences.len() >= limit)
        {
            return Err(NativeError::OutOfMemory("fence".into()));
        }
        let id = shared.issue();
        shared.fences.insert(id, None);
        let id = NativeFenceId(id);
        shared.calls.push(NativeCall::CreateFence(id));
        Ok(id)
    }

    fn destroy_fence(&self, id: NativeFenceId) -> Result<(), NativeError> {
        let mut shared = lock(&self.shared);
        shared.retire(id.0, "fence")?;
        shared.fences.remove(&id.0);
        shared.calls.push(NativeCall::DestroyFence(id));
        Ok(())
    }

    fn create_query(&self) -> Result<NativeQueryId, NativeError> {
        let mut shared = lock(&self.shared);
        let id = shared.issue();
        shared.queries.insert(id, None);
        let id = NativeQueryId(id);
        shared.calls.push(NativeCall::CreateQuery(id));
        Ok(id)
    }

    fn destroy_query(&self, id: NativeQueryId) -> Result<(), NativeError> {
        let mut shared = lock(&self.shared);
        shared.retire(id.0, "query")?;
        shared.queries.remove(&id.0);
        shared.calls.push(NativeCall::DestroyQuery(id));
        Ok(())
    }

    fn supports_format(&self, format: TextureFormat) -> bool {
        !lock(&self.shared).unsupported.contains(&format)
    }
}

/// Counts down a pending completion. `None` means complete.
fn poll_pending(pending: &mut Option<u32>) -> bool {
    match pending {
        None => true,
        Some(0) => {
            *pending = None;
            true
        }
        Some(remaining) => {
            *remaining -= 1;
            false
        }
    }
}

impl NativeContext for RecordingContext {
    fn set_vertex_shader(&mut self, shader: Option<NativeShaderId>) {
        let mut shared = lock(&self.shared);
        shared.bound.constant_buffers[ShaderStage::Vertex.index()] = [None; CONSTANT_SLOTS];
        shared.calls.push(NativeCall::SetVertexShader(shader));
    }

    fn set_pixel_shader(&mut self, shader: Option<NativeShaderId>) {
        let mut shared = lock(&self.shared);
        shared.bound.constant_buffers[ShaderStage::Pixel.index()] = [None; CONSTANT_SLOTS];
        shared.bound.views.clear();
        shared.bound.samplers.clear();
        shared.calls.push(NativeCall::SetPixelShader(shader));
    }

    fn set_input_layout(&mut self, layout: Option<NativeInputLayoutId>) {
        lock(&self.shared).calls.push(NativeCall::SetInputLayout(layout));
    }

    fn set_constant_buffer(
        &mut self,
        stage: ShaderStage,
        slot: u32,
        buffer: Option<NativeBufferId>,
    ) {
        let mut shared = lock(&self.shared);
        if let Some(entry) = shared.bound.constant_buffers[stage.index()].get_mut(slot as usize) {
            *entry = buffer;
        }
        shared.calls.push(NativeCall::SetConstantBuffer {
            stage,
            slot,
            buffer,
        });
    }

    fn set_shader_resource(&mut self, unit: u32, view: Option<NativeViewId>) {
        let mut shared = lock(&self.shared);
        match view {
            Some(v) => shared.bound.views.insert(unit, v),
            None => shared.bound.views.remove(&unit),
        };
        shared.calls.push(NativeCall::SetShaderResource { unit, view });
    }

    fn set_sampler(&mut self, unit: u32, sampler: Option<NativeSamplerId>) {
        let mut shared = lock(&self.shared);
        match sampler {
            Some(s) => shared.bound.samplers.insert(unit, s),
            None => shared.bound.samplers.remove(&unit),
        };
        shared.calls.push(NativeCall::SetSampler { unit, sampler });
    }

    fn set_vertex_buffer(&mut self, buffer: Option<NativeBufferId>, stride: u32, offset: u64) {
        lock(&self.shared).calls.push(NativeCall::SetVertexBuffer {
            buffer,
            stride,
            offset,
        });
    }

    fn set_index_buffer(
        &mut self,
        buffer: Option<NativeBufferId>,
        format: IndexFormat,
        offset: u64,
    ) {
        lock(&self.shared).calls.push(NativeCall::SetIndexBuffer {
            buffer,
            format,
            offset,
        });
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) {
        lock(&self.shared)
            .calls
            .push(NativeCall::SetPrimitiveTopology(topology));
    }

    fn set_depth_stencil_state(&mut self, state: Option<NativeStateId>) {
        lock(&self.shared)
            .calls
            .push(NativeCall::SetDepthStencilState(state));
    }

    fn set_blend_state(&mut self, state: Option<NativeStateId>) {
        lock(&self.shared).calls.push(NativeCall::SetBlendState(state));
    }

    fn set_rasterizer_state(&mut self, state: Option<NativeStateId>) {
        lock(&self.shared)
            .calls
            .push(NativeCall::SetRasterizerState(state));
    }

    fn set_scissor_rect(&mut self, rect: Rect) {
        lock(&self.shared).calls.push(NativeCall::SetScissorRect(rect));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        lock(&self.shared).calls.push(NativeCall::SetViewport(viewport));
    }

    fn set_render_targets(&mut self, targets: RenderTargets) {
        lock(&self.shared)
            .calls
            .push(NativeCall::SetRenderTargets(targets));
    }

    fn clear_render_target(&mut self, target: Option<NativeRenderTargetId>, color: [f32; 4]) {
        lock(&self.shared)
            .calls
            .push(NativeCall::ClearRenderTarget { target, color });
    }

    fn clear_depth_stencil(&mut self, target: Option<NativeDepthTargetId>, depth: f32) {
        lock(&self.shared)
            .calls
            .push(NativeCall::ClearDepthStencil { target, depth });
    }

    fn update_buffer(
        &mut self,
        buffer: NativeBufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), NativeError> {
        let mut shared = lock(&self.shared);
        let memory = shared
            .buffers
            .get_mut(&buffer.0)
            .ok_or_else(|| NativeError::UnknownObject(format!("buffer {}", buffer.0)))?;
        let start = offset as usize;
        let end = start
            .checked_add(data.len())
            .filter(|end| *end <= memory.len())
            .ok_or_else(|| NativeError::InvalidArgument("write past end of buffer".into()))?;
        memory[start..end].copy_from_slice(data);
        shared.calls.push(NativeCall::UpdateBuffer {
            buffer,
            offset,
            len: data.len(),
        });
        Ok(())
    }

    fn update_texture(
        &mut self,
        texture: NativeTextureId,
        region: TextureRegion,
        data: &[u8],
    ) -> Result<(), NativeError> {
        let mut shared = lock(&self.shared);
        let (width, height, format) = *shared
            .textures
            .get(&texture.0)
            .ok_or_else(|| NativeError::UnknownObject(format!("texture {}", texture.0)))?;
        if region.x + region.width > width || region.y + region.height > height {
            return Err(NativeError::InvalidArgument("region outside texture".into()));
        }
        let expected = (region.width * region.height * format.bytes_per_texel()) as usize;
        if data.len() < expected {
            return Err(NativeError::InvalidArgument("texel data too short".into()));
        }
        shared
            .calls
            .push(NativeCall::UpdateTexture { texture, region });
        Ok(())
    }

    fn copy_buffer_region(
        &mut self,
        destination: NativeBufferId,
        source: NativeBufferId,
        size: u64,
    ) -> Result<(), NativeError> {
        let mut shared = lock(&self.shared);
        if shared.fail_copies {
            return Err(NativeError::Backend("copy failed".into()));
        }
        let size_usize = size as usize;
        let bytes = shared
            .buffers
            .get(&source.0)
            .filter(|m| m.len() >= size_usize)
            .map(|m| m[..size_usize].to_vec())
            .ok_or_else(|| NativeError::InvalidArgument("bad copy source".into()))?;
        let target = shared
            .buffers
            .get_mut(&destination.0)
            .filter(|m| m.len() >= size_usize)
            .ok_or_else(|| NativeError::InvalidArgument("bad copy destination".into()))?;
        target[..size_usize].copy_from_slice(&bytes);
        shared.calls.push(NativeCall::CopyBufferRegion {
            destination,
            source,
            size,
        });
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        lock(&self.shared).calls.push(NativeCall::Draw {
            vertex_count,
            instance_count,
            first_vertex,
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
        lock(&self.shared).calls.push(NativeCall::DrawIndexed {
            index_count,
            instance_count,
            first_index,
            base_vertex,
            first_instance,
        });
    }

    fn end_query(&mut self, query: NativeQueryId) {
        let mut shared = lock(&self.shared);
        let latency = shared.completion_latency;
        if let Some(pending) = shared.queries.get_mut(&query.0) {
            *pending = Some(latency);
        }
        shared.calls.push(NativeCall::EndQuery(query));
    }

    fn query_completed(&mut self, query: NativeQueryId) -> Result<bool, NativeError> {
        let mut shared = lock(&self.shared);
        let pending = shared
            .queries
            .get_mut(&query.0)
            .ok_or_else(|| NativeError::UnknownObject(format!("query {}", query.0)))?;
        Ok(poll_pending(pending))
    }

    fn signal_fence(&mut self, fence: NativeFenceId) -> Result<(), NativeError> {
        let mut shared = lock(&self.shared);
        let latency = shared.completion_latency;
        let pending = shared
            .fences
            .get_mut(&fence.0)
            .ok_or_else(|| NativeError::UnknownObject(format!("fence {}", fence.0)))?;
        *pending = Some(latency);
        shared.calls.push(NativeCall::SignalFence(fence));
        Ok(())
    }

    fn poll_fence(&mut self, fence: NativeFenceId) -> Result<bool, NativeError> {
        let mut shared = lock(&self.shared);
        let pending = shared
            .fences
            .get_mut(&fence.0)
            .ok_or_else(|| NativeError::UnknownObject(format!("fence {}", fence.0)))?;
        Ok(poll_pending(pending))
    }

    fn wait_fence(&mut self, fence: NativeFenceId) -> Result<(), NativeError> {
        let mut shared = lock(&self.shared);
        if shared.hang_on_wait {
            return Err(NativeError::DeviceLost(format!("fence {} never signaled", fence.0)));
        }
        let pending = shared
            .fences
            .get_mut(&fence.0)
            .ok_or_else(|| NativeError::UnknownObject(format!("fence {}", fence.0)))?;
        *pending = None;
        shared.calls.push(NativeCall::WaitFence(fence));
        Ok(())
    }

    fn flush(&mut self) -> Result<(), NativeError> {
        lock(&self.shared).calls.push(NativeCall::Flush);
        Ok(())
    }
}
