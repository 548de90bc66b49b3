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

use super::error::NativeError;
use super::types::*;
use std::fmt::Debug;

/// The immediate context of an explicit-state device.
///
/// A context records state changes and draws in submission order. It is owned
/// by a single thread at a time.
///
/// Binding a shader detaches every constant buffer of that shader's stage.
/// Binding a pixel shader additionally detaches all shader-resource views and
/// samplers. Callers must re-bind what they still need afterwards.
pub trait NativeContext: Send + Debug {
    /// Binds a vertex shader, or unbinds the stage with `None`.
    fn set_vertex_shader(&mut self, shader: Option<NativeShaderId>);

    /// Binds a pixel shader, or unbinds the stage with `None`.
    fn set_pixel_shader(&mut self, shader: Option<NativeShaderId>);

    /// Binds the input layout used by subsequent draws.
    fn set_input_layout(&mut self, layout: Option<NativeInputLayoutId>);

    /// Binds a constant buffer to a stage slot.
    fn set_constant_buffer(
        &mut self,
        stage: ShaderStage,
        slot: u32,
        buffer: Option<NativeBufferId>,
    );

    /// Binds a shader-resource view to a pixel-stage texture unit.
    fn set_shader_resource(&mut self, unit: u32, view: Option<NativeViewId>);

    /// Binds a sampler to a pixel-stage sampler unit.
    fn set_sampler(&mut self, unit: u32, sampler: Option<NativeSamplerId>);

    /// Binds the vertex buffer. `stride` is the byte distance between vertices.
    fn set_vertex_buffer(&mut self, buffer: Option<NativeBufferId>, stride: u32, offset: u64);

    /// Binds the index buffer.
    fn set_index_buffer(&mut self, buffer: Option<NativeBufferId>, format: IndexFormat, offset: u64);

    /// Sets how vertices are assembled.
    fn set_primitive_topology(&mut self, topology: PrimitiveTopology);

    /// Binds a depth-stencil state object.
    fn set_depth_stencil_state(&mut self, state: Option<NativeStateId>);

    /// Binds a blend state object.
    fn set_blend_state(&mut self, state: Option<NativeStateId>);

    /// Binds a rasterizer state object.
    fn set_rasterizer_state(&mut self, state: Option<NativeStateId>);

    /// Sets the scissor rectangle. Only effective when the rasterizer state enables it.
    fn set_scissor_rect(&mut self, rect: Rect);

    /// Sets the viewport.
    fn set_viewport(&mut self, viewport: Viewport);

    /// Selects the render targets written by subsequent draws.
    fn set_render_targets(&mut self, targets: RenderTargets);

    /// Clears a color view. `None` clears the default back buffer.
    fn clear_render_target(&mut self, target: Option<NativeRenderTargetId>, color: [f32; 4]);

    /// Clears a depth view. `None` clears the default depth buffer.
    fn clear_depth_stencil(&mut self, target: Option<NativeDepthTargetId>, depth: f32);

    /// Overwrites a range of a buffer.
    /// ## Errors
    /// * `NativeError::InvalidArgument` - If the range exceeds the buffer.
    fn update_buffer(
        &mut self,
        buffer: NativeBufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), NativeError>;

    /// Overwrites a region of a texture with tightly packed texel rows.
    fn update_texture(
        &mut self,
        texture: NativeTextureId,
        region: TextureRegion,
        data: &[u8],
    ) -> Result<(), NativeError>;

    /// Copies the first `size` bytes of `source` into `destination`, on the device.
    fn copy_buffer_region(
        &mut self,
        destination: NativeBufferId,
        source: NativeBufferId,
        size: u64,
    ) -> Result<(), NativeError>;

    /// Issues a non-indexed draw with the bound state.
    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32);

    /// Issues an indexed draw with the bound state.
    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    );

    /// Marks the end of an event query. It completes once all prior work has.
    fn end_query(&mut self, query: NativeQueryId);

    /// Non-blocking check of an event query.
    fn query_completed(&mut self, query: NativeQueryId) -> Result<bool, NativeError>;

    /// Submits all prior work and signals `fence` once it has executed.
    fn signal_fence(&mut self, fence: NativeFenceId) -> Result<(), NativeError>;

    /// Non-blocking check of a fence.
    fn poll_fence(&mut self, fence: NativeFenceId) -> Result<bool, NativeError>;

    /// Blocks until `fence` is signaled.
    /// ## Errors
    /// * `NativeError::DeviceLost` - If the device stops making progress.
    fn wait_fence(&mut self, fence: NativeFenceId) -> Result<(), NativeError>;

    /// Submits recorded work without signaling anything.
    fn flush(&mut self) -> Result<(), NativeError>;
}
