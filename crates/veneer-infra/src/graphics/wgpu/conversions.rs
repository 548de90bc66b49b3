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

use veneer_core::native::{
    AddressMode, BlendFactor, BlendOperation, CompareFunction, CullMode, FilterMode, IndexFormat,
    PrimitiveTopology, TextureFormat, VertexElementFormat,
};

/// A local extension trait to convert veneer types into wgpu types.
/// This avoids Rust's orphan rules while keeping an idiomatic `.into_wgpu()` syntax.
pub trait IntoWgpu<T> {
    /// Consumes self and converts it into a wgpu type.
    fn into_wgpu(self) -> T;
}

impl IntoWgpu<wgpu::TextureFormat> for TextureFormat {
    fn into_wgpu(self) -> wgpu::TextureFormat {
        match self {
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
            TextureFormat::R8Unorm => wgpu::TextureFormat::R8Unorm,
            TextureFormat::Rg8Unorm => wgpu::TextureFormat::Rg8Unorm,
            TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
            TextureFormat::Depth24PlusStencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
            TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
        }
    }
}

impl IntoWgpu<wgpu::VertexFormat> for VertexElementFormat {
    fn into_wgpu(self) -> wgpu::VertexFormat {
        use VertexElementFormat as F;
        match self {
            F::Float32 => wgpu::VertexFormat::Float32,
            F::Float32x2 => wgpu::VertexFormat::Float32x2,
            F::Float32x3 => wgpu::VertexFormat::Float32x3,
            F::Float32x4 => wgpu::VertexFormat::Float32x4,
            F::Float16x2 => wgpu::VertexFormat::Float16x2,
            F::Float16x4 => wgpu::VertexFormat::Float16x4,
            F::Uint8x2 => wgpu::VertexFormat::Uint8x2,
            F::Uint8x4 => wgpu::VertexFormat::Uint8x4,
            F::Sint8x2 => wgpu::VertexFormat::Sint8x2,
            F::Sint8x4 => wgpu::VertexFormat::Sint8x4,
            F::Unorm8x2 => wgpu::VertexFormat::Unorm8x2,
            F::Unorm8x4 => wgpu::VertexFormat::Unorm8x4,
            F::Snorm8x2 => wgpu::VertexFormat::Snorm8x2,
            F::Snorm8x4 => wgpu::VertexFormat::Snorm8x4,
            F::Uint16x2 => wgpu::VertexFormat::Uint16x2,
            F::Uint16x4 => wgpu::VertexFormat::Uint16x4,
            F::Sint16x2 => wgpu::VertexFormat::Sint16x2,
            F::Sint16x4 => wgpu::VertexFormat::Sint16x4,
            F::Unorm16x2 => wgpu::VertexFormat::Unorm16x2,
            F::Unorm16x4 => wgpu::VertexFormat::Unorm16x4,
            F::Snorm16x2 => wgpu::VertexFormat::Snorm16x2,
            F::Snorm16x4 => wgpu::VertexFormat::Snorm16x4,
            F::Uint32 => wgpu::VertexFormat::Uint32,
            F::Uint32x2 => wgpu::VertexFormat::Uint32x2,
            F::Uint32x3 => wgpu::VertexFormat::Uint32x3,
            F::Uint32x4 => wgpu::VertexFormat::Uint32x4,
            F::Sint32 => wgpu::VertexFormat::Sint32,
            F::Sint32x2 => wgpu::VertexFormat::Sint32x2,
            F::Sint32x3 => wgpu::VertexFormat::Sint32x3,
            F::Sint32x4 => wgpu::VertexFormat::Sint32x4,
        }
    }
}

impl IntoWgpu<wgpu::IndexFormat> for IndexFormat {
    fn into_wgpu(self) -> wgpu::IndexFormat {
        match self {
            IndexFormat::Uint16 => wgpu::IndexFormat::Uint16,
            IndexFormat::Uint32 => wgpu::IndexFormat::Uint32,
        }
    }
}

impl IntoWgpu<wgpu::PrimitiveTopology> for PrimitiveTopology {
    fn into_wgpu(self) -> wgpu::PrimitiveTopology {
        match self {
            PrimitiveTopology::PointList => wgpu::PrimitiveTopology::PointList,
            PrimitiveTopology::LineList => wgpu::PrimitiveTopology::LineList,
            PrimitiveTopology::LineStrip => wgpu::PrimitiveTopology::LineStrip,
            PrimitiveTopology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
            PrimitiveTopology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        }
    }
}

impl IntoWgpu<wgpu::CompareFunction> for CompareFunction {
    fn into_wgpu(self) -> wgpu::CompareFunction {
        match self {
            CompareFunction::Never => wgpu::CompareFunction::Never,
            CompareFunction::Less => wgpu::CompareFunction::Less,
            CompareFunction::Equal => wgpu::CompareFunction::Equal,
            CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
            CompareFunction::Greater => wgpu::CompareFunction::Greater,
            CompareFunction::NotEqual => wgpu::CompareFunction::NotEqual,
            CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
            CompareFunction::Always => wgpu::CompareFunction::Always,
        }
    }
}

impl IntoWgpu<wgpu::BlendFactor> for BlendFactor {
    fn into_wgpu(self) -> wgpu::BlendFactor {
        match self {
            BlendFactor::Zero => wgpu::BlendFactor::Zero,
            BlendFactor::One => wgpu::BlendFactor::One,
            BlendFactor::SrcColor => wgpu::BlendFactor::Src,
            BlendFactor::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
            BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
            BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
            BlendFactor::DstColor => wgpu::BlendFactor::Dst,
            BlendFactor::OneMinusDstColor => wgpu::BlendFactor::OneMinusDst,
            BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
            BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        }
    }
}

impl IntoWgpu<wgpu::BlendOperation> for BlendOperation {
    fn into_wgpu(self) -> wgpu::BlendOperation {
        match self {
            BlendOperation::Add => wgpu::BlendOperation::Add,
            BlendOperation::Subtract => wgpu::BlendOperation::Subtract,
            BlendOperation::ReverseSubtract => wgpu::BlendOperation::ReverseSubtract,
            BlendOperation::Min => wgpu::BlendOperation::Min,
            BlendOperation::Max => wgpu::BlendOperation::Max,
        }
    }
}

impl IntoWgpu<Option<wgpu::Face>> for CullMode {
    fn into_wgpu(self) -> Option<wgpu::Face> {
        match self {
            CullMode::None => None,
            CullMode::Front => Some(wgpu::Face::Front),
            CullMode::Back => Some(wgpu::Face::Back),
        }
    }
}

impl IntoWgpu<wgpu::FilterMode> for FilterMode {
    fn into_wgpu(self) -> wgpu::FilterMode {
        match self {
            FilterMode::Nearest => wgpu::FilterMode::Nearest,
            FilterMode::Linear => wgpu::FilterMode::Linear,
        }
    }
}

impl IntoWgpu<wgpu::AddressMode> for AddressMode {
    fn into_wgpu(self) -> wgpu::AddressMode {
        match self {
            AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            AddressMode::Repeat => wgpu::AddressMode::Repeat,
            AddressMode::MirrorRepeat => wgpu::AddressMode::MirrorRepeat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_format_conversion() {
        assert_eq!(
            wgpu::TextureFormat::Bgra8Unorm,
            TextureFormat::Bgra8Unorm.into_wgpu()
        );
        assert_eq!(
            wgpu::TextureFormat::Depth24PlusStencil8,
            TextureFormat::Depth24PlusStencil8.into_wgpu()
        );
    }

    #[test]
    fn test_vertex_format_sizes_agree() {
        let formats = [
            VertexElementFormat::Float32x3,
            VertexElementFormat::Unorm8x4,
            VertexElementFormat::Sint16x2,
            VertexElementFormat::Float16x4,
            VertexElementFormat::Uint32x4,
        ];
        for format in formats {
            let wgpu_format: wgpu::VertexFormat = format.into_wgpu();
            assert_eq!(wgpu_format.size(), format.size() as u64, "{format:?}");
        }
    }

    #[test]
    fn test_blend_factor_conversion() {
        assert_eq!(wgpu::BlendFactor::Src, BlendFactor::SrcColor.into_wgpu());
        assert_eq!(
            wgpu::BlendFactor::OneMinusDstAlpha,
            BlendFactor::OneMinusDstAlpha.into_wgpu()
        );
    }

    #[test]
    fn test_cull_mode_conversion() {
        let none: Option<wgpu::Face> = CullMode::None.into_wgpu();
        assert_eq!(none, None);
        assert_eq!(Some(wgpu::Face::Back), CullMode::Back.into_wgpu());
    }
}
