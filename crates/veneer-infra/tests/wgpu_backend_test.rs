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

//! Exercises the wgpu backend on a real adapter. Every test skips when the
//! machine has none.

use std::sync::Arc;

use veneer_core::native::{
    BufferDescriptor, BufferKind, ClearRequest, ComponentType, InputElement, NativeContext,
    NativeDevice, NativeError, Semantic, ShaderBytecode, ShaderStage, SignatureElement,
    VertexElementFormat, AlignedByteOffset,
};
use veneer_core::resource::VertexBufferDesc;
use veneer_core::{
    DrawCall, ScalarType, Translator, TranslatorConfig, VertexAttribute, VertexFormat,
    VertexUsage,
};
use veneer_infra::{WgpuBackendConfig, WgpuGraphicsContext, WgpuNativeContext, WgpuNativeDevice};

const SIZE: u32 = 64;

const POSITION_VS: &str = r#"
@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position, 1.0);
}
"#;

const TINT_PS: &str = r#"
@group(1) @binding(0) var<uniform> tint: vec4<f32>;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return tint;
}
"#;

fn backend() -> Option<(WgpuNativeDevice, WgpuNativeContext)> {
    let context = match WgpuGraphicsContext::new_headless_blocking() {
        Ok(context) => context,
        Err(e) => {
            eprintln!("Skipping: no wgpu adapter available ({e:#})");
            return None;
        }
    };
    let config = WgpuBackendConfig {
        width: SIZE,
        height: SIZE,
        ..Default::default()
    };
    Some(
        WgpuNativeDevice::new(Arc::new(context), config)
            .expect("Device should initialize with a valid back buffer size"),
    )
}

fn position_signature() -> Vec<SignatureElement> {
    vec![SignatureElement {
        semantic: Semantic::Position,
        semantic_index: 0,
        component_type: ComponentType::Float,
        location: 0,
    }]
}

fn vertex_shader() -> ShaderBytecode {
    ShaderBytecode::new(POSITION_VS)
        .with_signature(position_signature())
        .with_label("position.vs")
}

fn pixel_at(pixels: &[u8], x: u32, y: u32) -> [u8; 4] {
    let i = ((y * SIZE + x) * 4) as usize;
    [pixels[i], pixels[i + 1], pixels[i + 2], pixels[i + 3]]
}

#[test]
fn test_device_rejects_invalid_wgsl() {
    let Some((device, _context)) = backend() else { return };

    let result = device.create_pixel_shader(&ShaderBytecode::new("fn broken( {").with_label("bad.ps"));

    assert!(
        matches!(&result, Err(NativeError::ShaderRejected(msg)) if msg.starts_with("bad.ps")),
        "Unexpected result: {result:?}"
    );
    assert_eq!(device.live_objects(), 0);
}

#[test]
fn test_input_layout_must_cover_the_signature() {
    let Some((device, _context)) = backend() else { return };
    let vs = device.create_vertex_shader(&vertex_shader()).unwrap();
    let normal_only = [InputElement {
        semantic: Semantic::Normal,
        semantic_index: 0,
        format: VertexElementFormat::Float32x3,
        offset: AlignedByteOffset::Append,
    }];
    let position = [InputElement {
        semantic: Semantic::Position,
        semantic_index: 0,
        format: VertexElementFormat::Float32x3,
        offset: AlignedByteOffset::Append,
    }];

    let missing = device.create_input_layout(&normal_only, vs);
    let matching = device.create_input_layout(&position, vs);

    assert!(matches!(missing, Err(NativeError::IncompatibleLayout(msg)) if msg.contains("POSITION0")));
    assert!(matching.is_ok());
}

#[test]
fn test_unaligned_buffer_update_and_fence() {
    let Some((device, mut context)) = backend() else { return };
    let buffer = device
        .create_buffer(
            &BufferDescriptor {
                label: None,
                size: 10,
                kind: BufferKind::Vertex,
            },
            Some(&[1, 2, 3]),
        )
        .unwrap();
    let fence = device.create_fence().unwrap();

    context.update_buffer(buffer, 5, &[9, 9, 9]).unwrap();
    let overflow = context.update_buffer(buffer, 8, &[0, 0, 0]);
    context.signal_fence(fence).unwrap();
    context.wait_fence(fence).unwrap();

    assert!(matches!(overflow, Err(NativeError::InvalidArgument(_))));
    assert!(context.poll_fence(fence).unwrap());
}

#[test]
fn test_clear_reaches_the_back_buffer() {
    // --- 1. ARRANGE ---
    let Some((device, context)) = backend() else { return };
    let translator = Translator::new(
        Arc::new(device.clone()),
        Box::new(context),
        TranslatorConfig::default(),
    )
    .unwrap();

    // --- 2. ACT ---
    translator
        .clear(ClearRequest {
            color: Some([1.0, 0.0, 0.0, 1.0]),
            depth: Some(1.0),
        })
        .unwrap();
    translator.end_frame().unwrap();
    let pixels = device.read_back_buffer().unwrap();

    // --- 3. ASSERT ---
    assert_eq!(pixels.len(), (SIZE * SIZE * 4) as usize);
    assert_eq!(pixel_at(&pixels, 0, 0), [255, 0, 0, 255]);
    assert_eq!(pixel_at(&pixels, SIZE - 1, SIZE - 1), [255, 0, 0, 255]);
    translator.shutdown().unwrap();
}

#[test]
fn test_translated_draw_renders_and_shutdown_releases_everything() {
    // --- 1. ARRANGE ---
    let Some((device, context)) = backend() else { return };
    let translator = Translator::new(
        Arc::new(device.clone()),
        Box::new(context),
        TranslatorConfig::default(),
    )
    .unwrap();

    let vs = translator.create_vertex_shader(&vertex_shader()).unwrap();
    let ps = translator
        .create_pixel_shader(&ShaderBytecode::new(TINT_PS).with_label("tint.ps"))
        .unwrap();
    let pipeline = translator.create_pipeline(vs, ps);

    // One triangle covering the whole target.
    let triangle: [[f32; 3]; 3] = [[-1.0, -1.0, 0.5], [3.0, -1.0, 0.5], [-1.0, 3.0, 0.5]];
    let format = VertexFormat::new(
        12,
        vec![VertexAttribute::new(VertexUsage::Position, ScalarType::Float32, 3, false, 0)],
    );
    let vb = translator.create_vertex_buffer(
        &VertexBufferDesc::new(36, 12)
            .with_format(format)
            .with_contents(bytemuck::cast_slice(&triangle)),
    );

    // --- 2. ACT ---
    translator.begin_frame().unwrap();
    translator
        .clear(ClearRequest {
            color: Some([0.0, 0.0, 0.0, 1.0]),
            depth: Some(1.0),
        })
        .unwrap();
    translator.bind_pipeline(pipeline).unwrap();
    translator
        .set_constants(ShaderStage::Pixel, 0, &[0.0f32, 1.0, 0.0, 1.0])
        .unwrap();
    let outcome = translator.draw(&DrawCall::vertices(vb, 0, 3));
    translator.end_frame().unwrap();
    let pixels = device.read_back_buffer().unwrap();

    // --- 3. ASSERT ---
    assert!(outcome.is_drawn(), "Draw should reach the device: {outcome:?}");
    assert_eq!(pixel_at(&pixels, SIZE / 2, SIZE / 2), [0, 255, 0, 255]);
    assert_eq!(device.cached_pipelines(), 1);

    translator.shutdown().unwrap();
    assert_eq!(device.live_objects(), 0, "Shutdown should release every native object");
}
