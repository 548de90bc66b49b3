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

//! The shadow copy of what is bound on the native context.
//!
//! Every `bind_*` method compares the requested binding against the committed
//! one and only calls into the context when they differ. It returns `true`
//! when a native call was issued, so callers can count elided binds.

use super::invalidation::{invalidated_by, InvalidatedFields, Transition};
use crate::handle::Handle;
use crate::native::*;

/// Constant buffer slots per shader stage.
pub const CONSTANT_BUFFER_SLOTS: usize = 4;

/// A committed vertex buffer binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBufferBinding {
    /// The translator buffer.
    pub buffer: Handle,
    /// The native buffer currently backing it.
    pub native: NativeBufferId,
    /// Vertex stride.
    pub stride: u32,
    /// Byte offset.
    pub offset: u64,
}

/// A committed index buffer binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexBufferBinding {
    /// The translator buffer.
    pub buffer: Handle,
    /// The native buffer currently backing it.
    pub native: NativeBufferId,
    /// Index width.
    pub format: IndexFormat,
    /// Byte offset.
    pub offset: u64,
}

/// Mirror of the native context's bindings.
#[derive(Debug, Clone)]
pub struct CommittedState {
    /// The pipeline whose shaders are bound.
    pub pipeline: Handle,
    /// Bound vertex shader.
    pub vertex_shader: Option<NativeShaderId>,
    /// Bound pixel shader.
    pub pixel_shader: Option<NativeShaderId>,
    /// Bound input layout.
    pub input_layout: Option<NativeInputLayoutId>,
    /// Constant buffers per stage, indexed by [`ShaderStage::index`].
    pub constant_buffers: [[Option<NativeBufferId>; CONSTANT_BUFFER_SLOTS]; 2],
    /// Shader-resource view per texture unit.
    pub shader_resources: Vec<Option<NativeViewId>>,
    /// Sampler per texture unit.
    pub samplers: Vec<Option<NativeSamplerId>>,
    /// Bound vertex buffer.
    pub vertex_buffer: Option<VertexBufferBinding>,
    /// Bound index buffer.
    pub index_buffer: Option<IndexBufferBinding>,
    /// Bound depth-stencil state.
    pub depth_stencil_state: Option<NativeStateId>,
    /// Bound blend state.
    pub blend_state: Option<NativeStateId>,
    /// Bound rasterizer state.
    pub rasterizer_state: Option<NativeStateId>,
    /// Scissor rectangle.
    pub scissor: Option<Rect>,
    /// Viewport.
    pub viewport: Option<Viewport>,
    /// Primitive topology.
    pub topology: Option<PrimitiveTopology>,
    /// Render targets. `None` until first bound.
    pub render_targets: Option<RenderTargets>,
}

impl CommittedState {
    /// A state with nothing bound and `texture_units` texture/sampler units.
    pub fn new(texture_units: usize) -> Self {
        Self {
            pipeline: Handle::NULL,
            vertex_shader: None,
            pixel_shader: None,
            input_layout: None,
            constant_buffers: [[None; CONSTANT_BUFFER_SLOTS]; 2],
            shader_resources: vec![None; texture_units],
            samplers: vec![None; texture_units],
            vertex_buffer: None,
            index_buffer: None,
            depth_stencil_state: None,
            blend_state: None,
            rasterizer_state: None,
            scissor: None,
            viewport: None,
            topology: None,
            render_targets: None,
        }
    }

    /// Number of texture units tracked.
    pub fn texture_units(&self) -> usize {
        self.shader_resources.len()
    }

    /// Clears the mirrored bindings the native context dropped.
    pub fn apply_invalidation(&mut self, fields: InvalidatedFields) {
        if fields.contains(InvalidatedFields::VS_CONSTANT_BUFFERS) {
            self.constant_buffers[ShaderStage::Vertex.index()] = [None; CONSTANT_BUFFER_SLOTS];
        }
        if fields.contains(InvalidatedFields::PS_CONSTANT_BUFFERS) {
            self.constant_buffers[ShaderStage::Pixel.index()] = [None; CONSTANT_BUFFER_SLOTS];
        }
        if fields.contains(InvalidatedFields::TEXTURES) {
            self.shader_resources.fill(None);
        }
        if fields.contains(InvalidatedFields::SAMPLERS) {
            self.samplers.fill(None);
        }
    }

    /// Binds a shader pair, touching only the stages that differ.
    ///
    /// Returns the number of native shader binds issued and the bindings the
    /// context dropped as a side effect, which are already cleared here.
    pub fn bind_shaders(
        &mut self,
        context: &mut dyn NativeContext,
        vertex_shader: NativeShaderId,
        pixel_shader: NativeShaderId,
    ) -> (u32, InvalidatedFields) {
        let mut issued = 0;
        let mut fields = InvalidatedFields::empty();
        if self.vertex_shader != Some(vertex_shader) {
            context.set_vertex_shader(Some(vertex_shader));
            self.vertex_shader = Some(vertex_shader);
            fields |= invalidated_by(Transition::VertexShaderChanged);
            issued += 1;
        }
        if self.pixel_shader != Some(pixel_shader) {
            context.set_pixel_shader(Some(pixel_shader));
            self.pixel_shader = Some(pixel_shader);
            fields |= invalidated_by(Transition::PixelShaderChanged);
            issued += 1;
        }
        self.apply_invalidation(fields);
        (issued, fields)
    }

    /// Binds an input layout.
    pub fn bind_input_layout(
        &mut self,
        context: &mut dyn NativeContext,
        layout: NativeInputLayoutId,
    ) -> bool {
        if self.input_layout == Some(layout) {
            return false;
        }
        context.set_input_layout(Some(layout));
        self.input_layout = Some(layout);
        true
    }

    /// Binds a constant buffer to a stage slot.
    pub fn bind_constant_buffer(
        &mut self,
        context: &mut dyn NativeContext,
        stage: ShaderStage,
        slot: usize,
        buffer: Option<NativeBufferId>,
    ) -> bool {
        let committed = &mut self.constant_buffers[stage.index()][slot];
        if *committed == buffer {
            return false;
        }
        context.set_constant_buffer(stage, slot as u32, buffer);
        *committed = buffer;
        true
    }

    /// Binds a view to a texture unit.
    pub fn bind_shader_resource(
        &mut self,
        context: &mut dyn NativeContext,
        unit: usize,
        view: Option<NativeViewId>,
    ) -> bool {
        if self.shader_resources[unit] == view {
            return false;
        }
        context.set_shader_resource(unit as u32, view);
        self.shader_resources[unit] = view;
        true
    }

    /// Binds a sampler to a sampler unit.
    pub fn bind_sampler(
        &mut self,
        context: &mut dyn NativeContext,
        unit: usize,
        sampler: Option<NativeSamplerId>,
    ) -> bool {
        if self.samplers[unit] == sampler {
            return false;
        }
        context.set_sampler(unit as u32, sampler);
        self.samplers[unit] = sampler;
        true
    }

    /// Binds the vertex buffer.
    pub fn bind_vertex_buffer(
        &mut self,
        context: &mut dyn NativeContext,
        binding: VertexBufferBinding,
    ) -> bool {
        if self.vertex_buffer == Some(binding) {
            return false;
        }
        context.set_vertex_buffer(Some(binding.native), binding.stride, binding.offset);
        self.vertex_buffer = Some(binding);
        true
    }

    /// Binds the index buffer.
    pub fn bind_index_buffer(
        &mut self,
        context: &mut dyn NativeContext,
        binding: IndexBufferBinding,
    ) -> bool {
        if self.index_buffer == Some(binding) {
            return false;
        }
        context.set_index_buffer(Some(binding.native), binding.format, binding.offset);
        self.index_buffer = Some(binding);
        true
    }

    /// Re-points every binding of `buffer` at a replacement native object.
    /// Returns `true` if the buffer was bound anywhere.
    pub fn rebind_buffer(
        &mut self,
        context: &mut dyn NativeContext,
        buffer: Handle,
        native: NativeBufferId,
    ) -> bool {
        let mut rebound = false;
        if let Some(binding) = self.vertex_buffer.filter(|b| b.buffer == buffer) {
            rebound |= self.bind_vertex_buffer(context, VertexBufferBinding { native, ..binding });
        }
        if let Some(binding) = self.index_buffer.filter(|b| b.buffer == buffer) {
            rebound |= self.bind_index_buffer(context, IndexBufferBinding { native, ..binding });
        }
        rebound
    }

    /// Binds a depth-stencil state object.
    pub fn bind_depth_stencil_state(
        &mut self,
        context: &mut dyn NativeContext,
        state: NativeStateId,
    ) -> bool {
        if self.depth_stencil_state == Some(state) {
            return false;
        }
        context.set_depth_stencil_state(Some(state));
        self.depth_stencil_state = Some(state);
        true
    }

    /// Binds a blend state object.
    pub fn bind_blend_state(&mut self, context: &mut dyn NativeContext, state: NativeStateId) -> bool {
        if self.blend_state == Some(state) {
            return false;
        }
        context.set_blend_state(Some(state));
        self.blend_state = Some(state);
        true
    }

    /// Binds a rasterizer state object.
    pub fn bind_rasterizer_state(
        &mut self,
        context: &mut dyn NativeContext,
        state: NativeStateId,
    ) -> bool {
        if self.rasterizer_state == Some(state) {
            return false;
        }
        context.set_rasterizer_state(Some(state));
        self.rasterizer_state = Some(state);
        true
    }

    /// Sets the scissor rectangle.
    pub fn bind_scissor(&mut self, context: &mut dyn NativeContext, rect: Rect) -> bool {
        if self.scissor == Some(rect) {
            return false;
        }
        context.set_scissor_rect(rect);
        self.scissor = Some(rect);
        true
    }

    /// Sets the viewport.
    pub fn bind_viewport(&mut self, context: &mut dyn NativeContext, viewport: Viewport) -> bool {
        if self.viewport == Some(viewport) {
            return false;
        }
        context.set_viewport(viewport);
        self.viewport = Some(viewport);
        true
    }

    /// Sets the primitive topology.
    pub fn bind_topology(
        &mut self,
        context: &mut dyn NativeContext,
        topology: PrimitiveTopology,
    ) -> bool {
        if self.topology == Some(topology) {
            return false;
        }
        context.set_primitive_topology(topology);
        self.topology = Some(topology);
        true
    }

    /// Selects the render targets.
    pub fn bind_render_targets(
        &mut self,
        context: &mut dyn NativeContext,
        targets: RenderTargets,
    ) -> bool {
        if self.render_targets == Some(targets) {
            return false;
        }
        context.set_render_targets(targets);
        self.render_targets = Some(targets);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{NativeCall, RecordingDevice};

    #[test]
    fn test_repeated_bind_is_elided() {
        let (device, mut context) = RecordingDevice::new();
        let mut state = CommittedState::new(8);
        assert!(state.bind_topology(&mut context, PrimitiveTopology::TriangleList));
        assert!(!state.bind_topology(&mut context, PrimitiveTopology::TriangleList));
        assert!(state.bind_topology(&mut context, PrimitiveTopology::LineList));
        assert_eq!(
            device.count_calls(|c| matches!(c, NativeCall::SetPrimitiveTopology(_))),
            2
        );
    }

    #[test]
    fn test_pixel_shader_change_clears_resources() {
        let (_device, mut context) = RecordingDevice::new();
        let mut state = CommittedState::new(2);
        state.bind_shaders(&mut context, NativeShaderId(1), NativeShaderId(2));
        state.bind_shader_resource(&mut context, 0, Some(NativeViewId(9)));
        state.bind_constant_buffer(&mut context, ShaderStage::Vertex, 0, Some(NativeBufferId(5)));

        let (issued, fields) =
            state.bind_shaders(&mut context, NativeShaderId(1), NativeShaderId(3));
        assert_eq!(issued, 1);
        assert!(fields.contains(InvalidatedFields::TEXTURES));
        assert_eq!(state.shader_resources[0], None);
        // The vertex stage was untouched, so its constant buffer survives.
        assert_eq!(
            state.constant_buffers[ShaderStage::Vertex.index()][0],
            Some(NativeBufferId(5))
        );
    }

    #[test]
    fn test_same_shaders_issue_nothing() {
        let (device, mut context) = RecordingDevice::new();
        let mut state = CommittedState::new(1);
        let (first, _) = state.bind_shaders(&mut context, NativeShaderId(1), NativeShaderId(2));
        let (second, fields) = state.bind_shaders(&mut context, NativeShaderId(1), NativeShaderId(2));
        assert_eq!((first, second), (2, 0));
        assert!(fields.is_empty());
        assert_eq!(device.count_calls(NativeCall::is_shader_bind), 2);
    }

    #[test]
    fn test_rebind_buffer_follows_replacement() {
        let (device, mut context) = RecordingDevice::new();
        let mut state = CommittedState::new(1);
        let handle = Handle::from_raw(77);
        state.bind_vertex_buffer(
            &mut context,
            VertexBufferBinding {
                buffer: handle,
                native: NativeBufferId(1),
                stride: 12,
                offset: 0,
            },
        );

        assert!(state.rebind_buffer(&mut context, handle, NativeBufferId(2)));
        assert_eq!(state.vertex_buffer.unwrap().native, NativeBufferId(2));
        assert!(!state.rebind_buffer(&mut context, Handle::from_raw(78), NativeBufferId(3)));
        assert_eq!(
            device.calls().last(),
            Some(&NativeCall::SetVertexBuffer {
                buffer: Some(NativeBufferId(2)),
                stride: 12,
                offset: 0,
            })
        );
    }
}
