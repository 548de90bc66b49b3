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

//! Plain data types exchanged with a native explicit-state device.

use std::borrow::Cow;

macro_rules! native_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);
    };
}

native_id!(
    /// An opaque identifier for a native buffer object.
    NativeBufferId
);
native_id!(
    /// An opaque identifier for a native texture object.
    NativeTextureId
);
native_id!(
    /// An opaque identifier for a shader-resource view over a texture.
    NativeViewId
);
native_id!(
    /// An opaque identifier for a native sampler object.
    NativeSamplerId
);
native_id!(
    /// An opaque identifier for a compiled vertex or pixel shader.
    NativeShaderId
);
native_id!(
    /// An opaque identifier for an input layout bound to a vertex shader signature.
    NativeInputLayoutId
);
native_id!(
    /// An opaque identifier for an immutable depth, blend or rasterizer state object.
    NativeStateId
);
native_id!(
    /// An opaque identifier for a GPU completion fence.
    NativeFenceId
);
native_id!(
    /// An opaque identifier for an event query.
    NativeQueryId
);
native_id!(
    /// An opaque identifier for a render-target view over a color texture.
    NativeRenderTargetId
);
native_id!(
    /// An opaque identifier for a depth-stencil view over a depth texture.
    NativeDepthTargetId
);

/// The programmable stage a shader or constant buffer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// The vertex stage.
    Vertex,
    /// The pixel (fragment) stage.
    Pixel,
}

impl ShaderStage {
    /// Both stages, in binding order.
    pub const ALL: [ShaderStage; 2] = [ShaderStage::Vertex, ShaderStage::Pixel];

    /// Index of the stage in per-stage arrays.
    pub const fn index(self) -> usize {
        match self {
            ShaderStage::Vertex => 0,
            ShaderStage::Pixel => 1,
        }
    }
}

/// What a native buffer is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Bound to the input assembler as vertex data.
    Vertex,
    /// Bound to the input assembler as index data.
    Index,
    /// Bound to a shader stage as a constant (uniform) block.
    Constant,
}

/// Describes a native buffer to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Size in bytes. Must be greater than zero.
    pub size: u64,
    /// How the buffer will be bound.
    pub kind: BufferKind,
}

/// The width of an index buffer element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    /// 16-bit unsigned indices.
    Uint16,
    /// 32-bit unsigned indices.
    Uint32,
}

impl IndexFormat {
    /// Size of one index in bytes.
    pub const fn size(self) -> u32 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

/// Texel formats a texture may be created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit RGBA, normalized.
    Rgba8Unorm,
    /// 8-bit BGRA, normalized.
    Bgra8Unorm,
    /// Single 8-bit channel, normalized.
    R8Unorm,
    /// Two 8-bit channels, normalized.
    Rg8Unorm,
    /// 16-bit float RGBA.
    Rgba16Float,
    /// 32-bit float RGBA.
    Rgba32Float,
    /// 24-bit depth with 8-bit stencil.
    Depth24PlusStencil8,
    /// 32-bit float depth.
    Depth32Float,
}

impl TextureFormat {
    /// Bytes per texel. Depth formats report their nominal footprint.
    pub const fn bytes_per_texel(self) -> u32 {
        match self {
            TextureFormat::R8Unorm => 1,
            TextureFormat::Rg8Unorm => 2,
            TextureFormat::Rgba8Unorm
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Depth24PlusStencil8
            | TextureFormat::Depth32Float => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::Rgba32Float => 16,
        }
    }

    /// Returns `true` for depth(-stencil) formats.
    pub const fn is_depth(self) -> bool {
        matches!(
            self,
            TextureFormat::Depth24PlusStencil8 | TextureFormat::Depth32Float
        )
    }
}

/// Describes a 2D texture to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Texel format.
    pub format: TextureFormat,
    /// Whether the texture can be rendered into.
    pub render_target: bool,
}

/// Texel filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    /// Nearest texel.
    Nearest,
    /// Linear interpolation.
    #[default]
    Linear,
}

/// Behavior for texture coordinates outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    /// Clamp to the edge texel.
    #[default]
    ClampToEdge,
    /// Tile the texture.
    Repeat,
    /// Tile the texture, mirroring every other repetition.
    MirrorRepeat,
}

/// Describes a sampler object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerDescriptor {
    /// Filter applied when magnifying.
    pub mag_filter: FilterMode,
    /// Filter applied when minifying.
    pub min_filter: FilterMode,
    /// Address mode along U.
    pub address_u: AddressMode,
    /// Address mode along V.
    pub address_v: AddressMode,
}

/// The data type of a single vertex element, as understood by the input assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum VertexElementFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Float16x2,
    Float16x4,
    Uint8x2,
    Uint8x4,
    Sint8x2,
    Sint8x4,
    Unorm8x2,
    Unorm8x4,
    Snorm8x2,
    Snorm8x4,
    Uint16x2,
    Uint16x4,
    Sint16x2,
    Sint16x4,
    Unorm16x2,
    Unorm16x4,
    Snorm16x2,
    Snorm16x4,
    Uint32,
    Uint32x2,
    Uint32x3,
    Uint32x4,
    Sint32,
    Sint32x2,
    Sint32x3,
    Sint32x4,
}

impl VertexElementFormat {
    /// Size of the element in bytes.
    pub const fn size(self) -> u32 {
        use VertexElementFormat::*;
        match self {
            Uint8x2 | Sint8x2 | Unorm8x2 | Snorm8x2 => 2,
            Float32 | Float16x2 | Uint8x4 | Sint8x4 | Unorm8x4 | Snorm8x4 | Uint16x2
            | Sint16x2 | Unorm16x2 | Snorm16x2 | Uint32 | Sint32 => 4,
            Float32x2 | Float16x4 | Uint16x4 | Sint16x4 | Unorm16x4 | Snorm16x4 | Uint32x2
            | Sint32x2 => 8,
            Float32x3 | Uint32x3 | Sint32x3 => 12,
            Float32x4 | Uint32x4 | Sint32x4 => 16,
        }
    }

    /// The value class the shader observes for this element.
    pub const fn component_type(self) -> ComponentType {
        use VertexElementFormat::*;
        match self {
            Uint8x2 | Uint8x4 | Uint16x2 | Uint16x4 | Uint32 | Uint32x2 | Uint32x3 | Uint32x4 => {
                ComponentType::Uint
            }
            Sint8x2 | Sint8x4 | Sint16x2 | Sint16x4 | Sint32 | Sint32x2 | Sint32x3 | Sint32x4 => {
                ComponentType::Sint
            }
            _ => ComponentType::Float,
        }
    }
}

/// The value class of a shader input: floating point (including normalized
/// integers), unsigned integer or signed integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    /// Float, or an integer normalized to float.
    Float,
    /// Unsigned integer.
    Uint,
    /// Signed integer.
    Sint,
}

/// The offset of an input element within a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlignedByteOffset {
    /// An explicit byte offset.
    Explicit(u32),
    /// Immediately after the previous element.
    Append,
}

/// Semantic names matched between vertex data and a vertex shader's inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum Semantic {
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

impl Semantic {
    /// The upper-case semantic name, as it appears in shader signatures.
    pub const fn name(self) -> &'static str {
        match self {
            Semantic::Position => "POSITION",
            Semantic::Normal => "NORMAL",
            Semantic::Color => "COLOR",
            Semantic::TexCoord => "TEXCOORD",
            Semantic::Tangent => "TANGENT",
            Semantic::Binormal => "BINORMAL",
            Semantic::BlendWeight => "BLENDWEIGHT",
            Semantic::BlendIndices => "BLENDINDICES",
            Semantic::PointSize => "PSIZE",
        }
    }
}

/// One element of an input layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputElement {
    /// The semantic this element feeds.
    pub semantic: Semantic,
    /// The index within the semantic (`TEXCOORD1` has index 1).
    pub semantic_index: u32,
    /// Data format of the element.
    pub format: VertexElementFormat,
    /// Where the element sits in the vertex.
    pub offset: AlignedByteOffset,
}

/// One input a vertex shader consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignatureElement {
    /// The semantic the shader expects.
    pub semantic: Semantic,
    /// The semantic index.
    pub semantic_index: u32,
    /// The value class the shader reads.
    pub component_type: ComponentType,
    /// The shader input location the semantic is wired to.
    pub location: u32,
}

/// A compiled shader blob together with its input signature.
///
/// The code is opaque to the translator; only the device interprets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderBytecode {
    /// The compiled shader.
    pub code: Vec<u8>,
    /// Inputs consumed by a vertex shader. Empty for pixel shaders.
    pub input_signature: Vec<SignatureElement>,
    /// Optional debug label.
    pub label: Option<String>,
}

impl ShaderBytecode {
    /// Creates a bytecode blob without an input signature.
    pub fn new(code: impl Into<Vec<u8>>) -> Self {
        Self {
            code: code.into(),
            input_signature: Vec::new(),
            label: None,
        }
    }

    /// Attaches an input signature.
    pub fn with_signature(mut self, signature: Vec<SignatureElement>) -> Self {
        self.input_signature = signature;
        self
    }

    /// Attaches a debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Comparison used by depth testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(missing_docs)]
pub enum CompareFunction {
    Never,
    #[default]
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Describes an immutable depth-stencil state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilDesc {
    /// Whether depth testing is enabled.
    pub depth_test: bool,
    /// Whether depth writes are enabled.
    pub depth_write: bool,
    /// The depth comparison.
    pub depth_func: CompareFunction,
}

impl Default for DepthStencilDesc {
    fn default() -> Self {
        Self {
            depth_test: false,
            depth_write: true,
            depth_func: CompareFunction::Less,
        }
    }
}

/// A blend factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstColor,
    OneMinusDstColor,
    DstAlpha,
    OneMinusDstAlpha,
}

/// The operation combining the weighted source and destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(missing_docs)]
pub enum BlendOperation {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Describes an immutable blend state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendDesc {
    /// Whether blending is enabled.
    pub enabled: bool,
    /// Source factor.
    pub src: BlendFactor,
    /// Destination factor.
    pub dst: BlendFactor,
    /// Combining operation.
    pub op: BlendOperation,
}

impl Default for BlendDesc {
    fn default() -> Self {
        Self {
            enabled: false,
            src: BlendFactor::One,
            dst: BlendFactor::Zero,
            op: BlendOperation::Add,
        }
    }
}

/// Which faces are culled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// No culling.
    #[default]
    None,
    /// Cull front faces.
    Front,
    /// Cull back faces.
    Back,
}

/// Describes an immutable rasterizer state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterizerDesc {
    /// Face culling.
    pub cull: CullMode,
    /// Whether counter-clockwise triangles are front facing.
    pub front_ccw: bool,
    /// Whether the scissor rectangle clips rasterization.
    pub scissor_enabled: bool,
}

impl Default for RasterizerDesc {
    fn default() -> Self {
        Self {
            cull: CullMode::None,
            front_ccw: true,
            scissor_enabled: false,
        }
    }
}

/// An integer rectangle in render-target pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(missing_docs)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// The viewport transform.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[allow(missing_docs)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// A full-depth viewport covering `width` x `height` from the origin.
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// How vertices are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(missing_docs)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

/// The color and depth views output is written to.
///
/// Both fields `None` selects the device's default back buffer together with
/// its default depth buffer. A color view without a depth view renders with
/// no depth attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RenderTargets {
    /// The color attachment.
    pub color: Option<NativeRenderTargetId>,
    /// The depth attachment.
    pub depth: Option<NativeDepthTargetId>,
}

impl RenderTargets {
    /// The default back buffer.
    pub const DEFAULT: RenderTargets = RenderTargets {
        color: None,
        depth: None,
    };

    /// Returns `true` when these targets select the default back buffer.
    pub const fn is_default(&self) -> bool {
        self.color.is_none() && self.depth.is_none()
    }
}

/// Which attachments of the bound render target to clear, and to what.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClearRequest {
    /// Clear color, if the color attachment should be cleared.
    pub color: Option<[f32; 4]>,
    /// Clear depth, if the depth attachment should be cleared.
    pub depth: Option<f32>,
}

/// A rectangular region of a texture's top mip level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct TextureRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TextureRegion {
    /// The region covering a whole `width` x `height` texture.
    pub const fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}
