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

//! Creation descriptors for translator resources.

use crate::native::{IndexFormat, TextureFormat};
use crate::vertex::VertexFormat;

/// Describes a vertex buffer.
#[derive(Debug, Clone, Default)]
pub struct VertexBufferDesc<'a> {
    /// Optional debug label.
    pub label: Option<&'a str>,
    /// Initial size in bytes.
    pub size: u64,
    /// Byte distance between vertices. Zero takes the stride of `format`.
    pub stride: u32,
    /// The vertex format used when draws do not supply one.
    pub format: Option<VertexFormat>,
    /// Bytes uploaded at creation.
    pub contents: Option<&'a [u8]>,
}

impl<'a> VertexBufferDesc<'a> {
    /// A buffer of `size` bytes holding vertices `stride` bytes apart.
    pub fn new(size: u64, stride: u32) -> Self {
        Self {
            size,
            stride,
            ..Default::default()
        }
    }

    /// Attaches a default vertex format.
    pub fn with_format(mut self, format: VertexFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Uploads `contents` at creation.
    pub fn with_contents(mut self, contents: &'a [u8]) -> Self {
        self.contents = Some(contents);
        self
    }

    /// The stride vertices are addressed with, or `None` when the explicit
    /// stride and the format's stride disagree.
    pub(crate) fn effective_stride(&self) -> Option<u32> {
        match (self.format.as_ref().map(VertexFormat::stride), self.stride) {
            (Some(format), 0) => Some(format),
            (Some(format), stride) if format != 0 && format != stride => None,
            (_, stride) => Some(stride),
        }
    }
}

/// Describes an index buffer.
#[derive(Debug, Clone)]
pub struct IndexBufferDesc<'a> {
    /// Optional debug label.
    pub label: Option<&'a str>,
    /// Initial size in bytes.
    pub size: u64,
    /// Index width.
    pub format: IndexFormat,
    /// Bytes uploaded at creation.
    pub contents: Option<&'a [u8]>,
}

impl<'a> IndexBufferDesc<'a> {
    /// A buffer of `size` bytes holding indices of `format`.
    pub fn new(size: u64, format: IndexFormat) -> Self {
        Self {
            label: None,
            size,
            format,
            contents: None,
        }
    }

    /// Uploads `contents` at creation.
    pub fn with_contents(mut self, contents: &'a [u8]) -> Self {
        self.contents = Some(contents);
        self
    }
}

/// Describes a sampled 2D texture.
#[derive(Debug, Clone)]
pub struct TextureDesc<'a> {
    /// Optional debug label.
    pub label: Option<&'a str>,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Texel format.
    pub format: TextureFormat,
    /// Tightly packed texel rows uploaded at creation.
    pub contents: Option<&'a [u8]>,
}

impl<'a> TextureDesc<'a> {
    /// A `width` x `height` texture of `format`.
    pub fn new(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: None,
            width,
            height,
            format,
            contents: None,
        }
    }

    /// Uploads `contents` at creation.
    pub fn with_contents(mut self, contents: &'a [u8]) -> Self {
        self.contents = Some(contents);
        self
    }
}

/// Describes an offscreen render-target bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetDesc {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Format of the color attachment, which can also be sampled.
    pub color_format: TextureFormat,
    /// Format of the depth attachment, if any.
    pub depth_format: Option<TextureFormat>,
}
