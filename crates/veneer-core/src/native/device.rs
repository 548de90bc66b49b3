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

/// Object creation on an explicit-state GPU device.
///
/// The device is shared and thread-safe. Every object it hands out is
/// identified by a native id that is never reissued while the device lives.
pub trait NativeDevice: Send + Sync + Debug + 'static {
    /// Creates a buffer, optionally filled with initial contents.
    /// ## Arguments
    /// * `descriptor` - Size and binding kind of the buffer.
    /// * `contents` - Bytes copied to the start of the buffer. Must not exceed `descriptor.size`.
    /// ## Errors
    /// * `NativeError::OutOfMemory` - If the allocation fails.
    /// * `NativeError::InvalidArgument` - If the size is zero or the contents do not fit.
    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
        contents: Option<&[u8]>,
    ) -> Result<NativeBufferId, NativeError>;

    /// Releases a buffer.
    fn destroy_buffer(&self, id: NativeBufferId) -> Result<(), NativeError>;

    /// Creates a 2D texture with a single mip level.
    /// ## Arguments
    /// * `descriptor` - Dimensions and format of the texture.
    /// * `contents` - Tightly packed texel rows for the whole texture.
    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        contents: Option<&[u8]>,
    ) -> Result<NativeTextureId, NativeError>;

    /// Releases a texture. Views created from it must be destroyed first.
    fn destroy_texture(&self, id: NativeTextureId) -> Result<(), NativeError>;

    /// Creates a view used to sample a texture from a shader.
    fn create_shader_resource_view(
        &self,
        texture: NativeTextureId,
    ) -> Result<NativeViewId, NativeError>;

    /// Releases a shader-resource view.
    fn destroy_shader_resource_view(&self, id: NativeViewId) -> Result<(), NativeError>;

    /// Creates a view used to render into a color texture.
    fn create_render_target_view(
        &self,
        texture: NativeTextureId,
    ) -> Result<NativeRenderTargetId, NativeError>;

    /// Releases a render-target view.
    fn destroy_render_target_view(&self, id: NativeRenderTargetId) -> Result<(), NativeError>;

    /// Creates a view used to depth-test against a depth texture.
    fn create_depth_stencil_view(
        &self,
        texture: NativeTextureId,
    ) -> Result<NativeDepthTargetId, NativeError>;

    /// Releases a depth-stencil view.
    fn destroy_depth_stencil_view(&self, id: NativeDepthTargetId) -> Result<(), NativeError>;

    /// Creates a sampler object.
    fn create_sampler(
        &self,
        descriptor: &SamplerDescriptor,
    ) -> Result<NativeSamplerId, NativeError>;

    /// Releases a sampler object.
    fn destroy_sampler(&self, id: NativeSamplerId) -> Result<(), NativeError>;

    /// Creates a vertex shader from compiled bytecode.
    /// ## Errors
    /// * `NativeError::ShaderRejected` - If the bytecode fails validation.
    fn create_vertex_shader(&self, bytecode: &ShaderBytecode)
        -> Result<NativeShaderId, NativeError>;

    /// Creates a pixel shader from compiled bytecode.
    /// ## Errors
    /// * `NativeError::ShaderRejected` - If the bytecode fails validation.
    fn create_pixel_shader(&self, bytecode: &ShaderBytecode) -> Result<NativeShaderId, NativeError>;

    /// Releases a vertex or pixel shader.
    fn destroy_shader(&self, id: NativeShaderId) -> Result<(), NativeError>;

    /// Creates an input layout and validates it against a vertex shader's input signature.
    /// ## Arguments
    /// * `elements` - The layout's elements, in vertex order.
    /// * `vertex_shader` - The shader whose signature the layout must satisfy.
    /// ## Errors
    /// * `NativeError::IncompatibleLayout` - If a signature input has no matching
    ///   element, or an element's value class differs from the input's.
    fn create_input_layout(
        &self,
        elements: &[InputElement],
        vertex_shader: NativeShaderId,
    ) -> Result<NativeInputLayoutId, NativeError>;

    /// Releases an input layout.
    fn destroy_input_layout(&self, id: NativeInputLayoutId) -> Result<(), NativeError>;

    /// Creates an immutable depth-stencil state object.
    fn create_depth_stencil_state(
        &self,
        descriptor: &DepthStencilDesc,
    ) -> Result<NativeStateId, NativeError>;

    /// Creates an immutable blend state object.
    fn create_blend_state(&self, descriptor: &BlendDesc) -> Result<NativeStateId, NativeError>;

    /// Creates an immutable rasterizer state object.
    fn create_rasterizer_state(
        &self,
        descriptor: &RasterizerDesc,
    ) -> Result<NativeStateId, NativeError>;

    /// Releases any state object.
    fn destroy_state(&self, id: NativeStateId) -> Result<(), NativeError>;

    /// Creates a completion fence in the unsignaled state.
    fn create_fence(&self) -> Result<NativeFenceId, NativeError>;

    /// Releases a fence.
    fn destroy_fence(&self, id: NativeFenceId) -> Result<(), NativeError>;

    /// Creates an event query.
    fn create_query(&self) -> Result<NativeQueryId, NativeError>;

    /// Releases an event query.
    fn destroy_query(&self, id: NativeQueryId) -> Result<(), NativeError>;

    /// Returns `true` if textures of `format` can be created and sampled.
    fn supports_format(&self, format: TextureFormat) -> bool;
}
