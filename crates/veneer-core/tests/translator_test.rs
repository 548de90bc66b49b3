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

use veneer_core::native::{
    ComponentType, Semantic, ShaderBytecode, ShaderStage, SignatureElement,
};
use veneer_core::resource::{LookupError, VertexBufferDesc};
use veneer_core::testing::{NativeCall, RecordingDevice};
use veneer_core::{
    DrawCall, DrawOutcome, Handle, ScalarType, SkipReason, Translator, TranslatorConfig,
    TranslatorError, VertexAttribute, VertexFormat, VertexUsage,
};

fn translator() -> (Translator, RecordingDevice) {
    let (device, context) = RecordingDevice::new();
    let translator = Translator::with_handle_key(
        Arc::new(device.clone()),
        Box::new(context),
        TranslatorConfig::default(),
        0x5eed,
    )
    .expect("Translator should initialize on the recording device");
    (translator, device)
}

/// A single float per vertex, read as POSITION0.
fn scalar_format() -> VertexFormat {
    VertexFormat::new(
        4,
        vec![VertexAttribute::new(VertexUsage::Position, ScalarType::Float32, 1, false, 0)],
    )
}

fn position_color_format() -> VertexFormat {
    VertexFormat::new(
        16,
        vec![
            VertexAttribute::new(VertexUsage::Position, ScalarType::Float32, 3, false, 0),
            VertexAttribute::new(VertexUsage::Color, ScalarType::Uint8, 4, true, 12),
        ],
    )
}

fn vertex_shader(semantics: &[Semantic]) -> ShaderBytecode {
    let signature = semantics
        .iter()
        .enumerate()
        .map(|(location, &semantic)| SignatureElement {
            semantic,
            semantic_index: 0,
            component_type: ComponentType::Float,
            location: location as u32,
        })
        .collect();
    ShaderBytecode::new(vec![0x56, 0x53])
        .with_signature(signature)
        .with_label("test.vs")
}

fn pixel_shader() -> ShaderBytecode {
    ShaderBytecode::new(vec![0x50, 0x53]).with_label("test.ps")
}

fn pipeline(translator: &Translator, semantics: &[Semantic]) -> Handle {
    let vs = translator.create_vertex_shader(&vertex_shader(semantics)).unwrap();
    let ps = translator.create_pixel_shader(&pixel_shader()).unwrap();
    translator.create_pipeline(vs, ps)
}

#[test]
fn test_draw_grows_undersized_vertex_buffer() {
    // --- 1. ARRANGE ---
    let (translator, device) = translator();
    let pipeline = pipeline(&translator, &[Semantic::Position]);
    let vb = translator
        .create_vertex_buffer(&VertexBufferDesc::new(64, 4).with_format(scalar_format()));
    translator.bind_pipeline(pipeline).unwrap();

    // --- 2. ACT ---
    // Vertices 20..25 need 100 bytes; the buffer holds 64.
    let first = translator.draw(&DrawCall::vertices(vb, 20, 5));
    let second = translator.draw(&DrawCall::vertices(vb, 20, 5));

    // --- 3. ASSERT ---
    assert_eq!(first, DrawOutcome::Drawn);
    assert_eq!(second, DrawOutcome::Drawn);
    assert!(
        device
            .calls()
            .iter()
            .any(|c| matches!(c, NativeCall::CreateBuffer { size: 328, .. })),
        "Buffer should grow to (64 + 100) * 2 bytes"
    );
    assert_eq!(translator.stats().buffer_growths, 1, "The second draw fits without growing");
}

#[test]
fn test_grown_buffer_keeps_its_contents() {
    let (translator, device) = translator();
    let pipeline = pipeline(&translator, &[Semantic::Position]);
    let contents: Vec<u8> = (0..64).collect();
    let vb = translator.create_vertex_buffer(
        &VertexBufferDesc::new(64, 4)
            .with_format(scalar_format())
            .with_contents(&contents),
    );
    translator.bind_pipeline(pipeline).unwrap();

    assert!(translator.draw(&DrawCall::vertices(vb, 0, 40)).is_drawn());

    let bound = device
        .calls()
        .iter()
        .rev()
        .find_map(|c| match c {
            NativeCall::SetVertexBuffer { buffer, .. } => *buffer,
            _ => None,
        })
        .expect("A vertex buffer should be bound");
    let grown = device.buffer_contents(bound).unwrap();
    assert!(grown.len() >= 160);
    assert_eq!(&grown[..64], &contents[..]);
}

#[test]
fn test_upload_past_capacity_grows_buffer() {
    let (translator, device) = translator();
    let vb = translator.create_vertex_buffer(&VertexBufferDesc::new(16, 4));

    translator
        .update_vertex_buffer(vb, 12, &[7u8; 8])
        .expect("Upload should grow the buffer");

    assert_eq!(translator.stats().buffer_growths, 1);
    assert!(device
        .calls()
        .iter()
        .any(|c| matches!(c, NativeCall::UpdateBuffer { offset: 12, len: 8, .. })));
}

#[test]
fn test_rebinding_the_same_pipeline_issues_nothing() {
    let (translator, device) = translator();
    let pipeline = pipeline(&translator, &[Semantic::Position]);

    translator.bind_pipeline(pipeline).unwrap();
    translator.bind_pipeline(pipeline).unwrap();

    assert_eq!(device.count_calls(NativeCall::is_shader_bind), 2);
    assert!(translator.stats().binds_elided >= 1);
}

#[test]
fn test_destroyed_handles_never_resolve() {
    let (translator, _device) = translator();
    let pipeline = pipeline(&translator, &[Semantic::Position]);
    translator.bind_pipeline(pipeline).unwrap();
    let vb = translator
        .create_vertex_buffer(&VertexBufferDesc::new(64, 4).with_format(scalar_format()));

    translator.destroy(vb);
    let replacement = translator
        .create_vertex_buffer(&VertexBufferDesc::new(64, 4).with_format(scalar_format()));

    assert_ne!(replacement, vb, "Handles are never reused");
    assert_eq!(translator.resource_kind(vb), None);
    assert_eq!(
        translator.draw(&DrawCall::vertices(vb, 0, 3)),
        DrawOutcome::Skipped(SkipReason::Lookup(LookupError::NotFound(vb)))
    );
    assert!(translator.draw(&DrawCall::vertices(replacement, 0, 3)).is_drawn());
}

#[test]
fn test_missing_semantic_skips_draw_without_native_call() {
    let (translator, device) = translator();
    let pipeline = pipeline(&translator, &[Semantic::Position, Semantic::Color]);
    let vb = translator
        .create_vertex_buffer(&VertexBufferDesc::new(64, 4).with_format(scalar_format()));
    translator.bind_pipeline(pipeline).unwrap();

    let first = translator.draw(&DrawCall::vertices(vb, 0, 3));
    let second = translator.draw(&DrawCall::vertices(vb, 0, 3));

    assert_eq!(first, DrawOutcome::Skipped(SkipReason::IncompatibleLayout));
    assert_eq!(second, DrawOutcome::Skipped(SkipReason::IncompatibleLayout));
    assert_eq!(device.count_calls(NativeCall::is_draw), 0);
    assert_eq!(
        device.count_calls(|c| matches!(c, NativeCall::CreateInputLayout { .. })),
        1,
        "The incompatible verdict should be cached"
    );
    assert_eq!(translator.stats().draws_skipped, 2);
}

#[test]
fn test_format_without_color_is_incompatible_with_color_shader() {
    // --- 1. ARRANGE ---
    let (translator, device) = translator();
    let pipeline = pipeline(
        &translator,
        &[Semantic::Position, Semantic::TexCoord, Semantic::Color],
    );
    let position_uv = VertexFormat::new(
        20,
        vec![
            VertexAttribute::new(VertexUsage::Position, ScalarType::Float32, 3, false, 0),
            VertexAttribute::new(VertexUsage::TexCoord, ScalarType::Float32, 2, false, 12),
        ],
    );
    let vb = translator
        .create_vertex_buffer(&VertexBufferDesc::new(60, 20).with_format(position_uv));
    translator.bind_pipeline(pipeline).unwrap();

    // --- 2. ACT ---
    let outcome = translator.draw(&DrawCall::vertices(vb, 0, 3));

    // --- 3. ASSERT ---
    assert_eq!(outcome, DrawOutcome::Skipped(SkipReason::IncompatibleLayout));
    assert_eq!(device.count_calls(NativeCall::is_draw), 0);
}

#[test]
fn test_layout_failure_is_retried_on_next_draw() {
    // --- 1. ARRANGE ---
    let (translator, device) = translator();
    let pipeline = pipeline(&translator, &[Semantic::Position]);
    let vb = translator
        .create_vertex_buffer(&VertexBufferDesc::new(64, 4).with_format(scalar_format()));
    translator.bind_pipeline(pipeline).unwrap();
    device.set_fail_input_layouts(1);

    // --- 2. ACT ---
    let first = translator.draw(&DrawCall::vertices(vb, 0, 3));
    let second = translator.draw(&DrawCall::vertices(vb, 0, 3));

    // --- 3. ASSERT ---
    assert!(!first.is_drawn(), "The failed layout creation skips the first draw");
    assert_eq!(second, DrawOutcome::Drawn, "The device recovered, so the layout is rebuilt");
    assert_eq!(device.count_calls(NativeCall::is_draw), 1);
}

#[test]
fn test_wider_draw_format_grows_by_its_own_stride() {
    // --- 1. ARRANGE ---
    let (translator, device) = translator();
    let pipeline = pipeline(&translator, &[Semantic::Position]);
    let vb = translator
        .create_vertex_buffer(&VertexBufferDesc::new(64, 4).with_format(scalar_format()));
    translator.bind_pipeline(pipeline).unwrap();

    // --- 2. ACT ---
    // Ten 16-byte vertices need 160 bytes; the buffer holds 64.
    let outcome =
        translator.draw_with_format(&DrawCall::vertices(vb, 0, 10), &position_color_format());

    // --- 3. ASSERT ---
    assert_eq!(outcome, DrawOutcome::Drawn);
    assert_eq!(translator.stats().buffer_growths, 1);
    assert!(device
        .calls()
        .iter()
        .any(|c| matches!(c, NativeCall::CreateBuffer { size: 448, .. })));
    let bound_stride = device.calls().iter().rev().find_map(|c| match c {
        NativeCall::SetVertexBuffer { stride, .. } => Some(*stride),
        _ => None,
    });
    assert_eq!(bound_stride, Some(16));
}

#[test]
fn test_vertex_buffer_stride_disagreeing_with_format_is_refused() {
    let (translator, device) = translator();
    let is_create = |c: &NativeCall| matches!(c, NativeCall::CreateBuffer { .. });
    let before = device.count_calls(is_create);

    let vb = translator
        .create_vertex_buffer(&VertexBufferDesc::new(64, 4).with_format(position_color_format()));

    assert!(vb.is_null());
    assert_eq!(device.count_calls(is_create), before);
}

#[test]
fn test_same_shader_different_formats_get_distinct_layouts() {
    let (translator, device) = translator();
    let pipeline = pipeline(&translator, &[Semantic::Position]);
    let narrow = translator
        .create_vertex_buffer(&VertexBufferDesc::new(64, 4).with_format(scalar_format()));
    let wide = translator
        .create_vertex_buffer(&VertexBufferDesc::new(64, 16).with_format(position_color_format()));
    translator.bind_pipeline(pipeline).unwrap();

    assert!(translator.draw(&DrawCall::vertices(narrow, 0, 3)).is_drawn());
    assert!(translator.draw(&DrawCall::vertices(wide, 0, 3)).is_drawn());
    assert!(translator.draw(&DrawCall::vertices(narrow, 0, 3)).is_drawn());

    let layouts: Vec<_> = device
        .calls()
        .iter()
        .filter_map(|c| match c {
            NativeCall::CreateInputLayout { result, .. } => *result,
            _ => None,
        })
        .collect();
    assert_eq!(layouts.len(), 2);
    assert_ne!(layouts[0], layouts[1]);
}

#[test]
fn test_draw_without_pipeline_uses_fallback() {
    let (translator, device) = translator();
    let vb = translator
        .create_vertex_buffer(&VertexBufferDesc::new(64, 4).with_format(scalar_format()));

    assert_eq!(
        translator.draw(&DrawCall::vertices(vb, 0, 3)),
        DrawOutcome::Skipped(SkipReason::NoPipeline)
    );

    let fallback = pipeline(&translator, &[Semantic::Position]);
    let doomed = pipeline(&translator, &[Semantic::Position]);
    translator.set_fallback_pipeline(fallback).unwrap();
    translator.bind_pipeline(doomed).unwrap();
    translator.destroy(doomed);

    assert!(translator.draw(&DrawCall::vertices(vb, 0, 3)).is_drawn());
    assert_eq!(translator.stats().fallback_pipeline_uses, 1);
    assert_eq!(device.count_calls(NativeCall::is_draw), 1);
}

#[test]
fn test_pixel_shader_switch_rebinds_textures_and_constants() {
    let (translator, device) = translator();
    let vs = translator
        .create_vertex_shader(&vertex_shader(&[Semantic::Position]))
        .unwrap();
    let first_ps = translator.create_pixel_shader(&pixel_shader()).unwrap();
    let second_ps = translator.create_pixel_shader(&pixel_shader()).unwrap();
    let first = translator.create_pipeline(vs, first_ps);
    let second = translator.create_pipeline(vs, second_ps);
    let texture = translator.create_texture(
        &veneer_core::resource::TextureDesc::new(4, 4, veneer_core::native::TextureFormat::Rgba8Unorm),
    );
    let vb = translator
        .create_vertex_buffer(&VertexBufferDesc::new(64, 4).with_format(scalar_format()));

    translator.bind_texture(0, texture).unwrap();
    translator
        .set_constant_buffer_data(ShaderStage::Pixel, 1, &[1u8; 32])
        .unwrap();
    translator.bind_pipeline(first).unwrap();
    assert!(translator.draw(&DrawCall::vertices(vb, 0, 3)).is_drawn());
    let view = device.bound_view(0).expect("Texture should be bound after the first draw");
    let constants = device
        .bound_constant_buffer(ShaderStage::Pixel, 1)
        .expect("Constants should be bound after the first draw");

    translator.bind_pipeline(second).unwrap();
    assert!(translator.draw(&DrawCall::vertices(vb, 0, 3)).is_drawn());

    assert_eq!(device.bound_view(0), Some(view));
    assert!(device.bound_sampler(0).is_some());
    assert_eq!(device.bound_constant_buffer(ShaderStage::Pixel, 1), Some(constants));
}

#[test]
fn test_texture_unit_out_of_range_is_rejected() {
    let (translator, _device) = translator();
    let units = translator.config().texture_units as u32;

    assert_eq!(
        translator.bind_texture(units, Handle::NULL),
        Err(SkipReason::SlotOutOfRange(units))
    );
}

#[test]
fn test_rejected_shader_is_an_error() {
    let (translator, device) = translator();
    device.set_reject_shaders(true);

    let result = translator.create_vertex_shader(&vertex_shader(&[Semantic::Position]));

    match result {
        Err(TranslatorError::ShaderRejected { stage, label, .. }) => {
            assert_eq!(stage, ShaderStage::Vertex);
            assert_eq!(label, "test.vs");
        }
        other => panic!("Expected a shader rejection, got {other:?}"),
    }
}

#[test]
fn test_indexed_draw_grows_index_buffer() {
    let (translator, device) = translator();
    let pipeline = pipeline(&translator, &[Semantic::Position]);
    let vb = translator
        .create_vertex_buffer(&VertexBufferDesc::new(64, 4).with_format(scalar_format()));
    let ib = translator.create_index_buffer(&veneer_core::resource::IndexBufferDesc::new(
        12,
        veneer_core::native::IndexFormat::Uint16,
    ));
    translator.bind_pipeline(pipeline).unwrap();

    let outcome = translator.draw(&DrawCall::indexed(vb, ib, 0, 12).with_base_vertex(2));

    assert!(outcome.is_drawn());
    assert_eq!(translator.stats().buffer_growths, 1);
    assert!(device.calls().iter().any(|c| matches!(
        c,
        NativeCall::DrawIndexed {
            index_count: 12,
            base_vertex: 2,
            ..
        }
    )));
}

#[test]
fn test_shutdown_releases_every_native_object() {
    let (translator, device) = translator();
    let pipeline = pipeline(&translator, &[Semantic::Position]);
    let vb = translator
        .create_vertex_buffer(&VertexBufferDesc::new(64, 4).with_format(scalar_format()));
    let target = translator.create_render_target(&veneer_core::resource::RenderTargetDesc {
        width: 8,
        height: 8,
        color_format: veneer_core::native::TextureFormat::Rgba8Unorm,
        depth_format: Some(veneer_core::native::TextureFormat::Depth32Float),
    });
    let query = translator.create_query();
    translator
        .set_constant_buffer_data(ShaderStage::Vertex, 0, &[0u8; 64])
        .unwrap();
    translator.bind_pipeline(pipeline).unwrap();
    translator.bind_render_target(target).unwrap();
    translator.begin_frame().unwrap();
    assert!(translator.draw(&DrawCall::vertices(vb, 0, 30)).is_drawn());
    translator.issue_query(query).unwrap();
    translator.end_frame().unwrap();
    assert!(device.live_objects() > 0);

    translator.shutdown().expect("Shutdown should drain cleanly");

    assert_eq!(device.live_objects(), 0, "Every native object should be released");
}
