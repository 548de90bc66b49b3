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

use pretty_assertions::assert_eq;
use veneer_core::native::{
    ClearRequest, ComponentType, Semantic, ShaderBytecode, SignatureElement, TextureFormat,
};
use veneer_core::resource::{RenderTargetDesc, VertexBufferDesc};
use veneer_core::testing::{NativeCall, RecordingDevice};
use veneer_core::{
    CommandListBuilder, CommandListReport, DrawCall, FrameStatus, Handle, ScalarType, SkipReason,
    Translator, TranslatorConfig, TranslatorError, VertexAttribute, VertexFormat, VertexUsage,
    WaitPolicy,
};

fn translator_with(config: TranslatorConfig) -> (Translator, RecordingDevice) {
    let (device, context) = RecordingDevice::new();
    let translator = Translator::new(Arc::new(device.clone()), Box::new(context), config)
        .expect("Translator should initialize on the recording device");
    (translator, device)
}

fn ready_to_draw(translator: &Translator) -> Handle {
    let format = VertexFormat::new(
        4,
        vec![VertexAttribute::new(VertexUsage::Position, ScalarType::Float32, 1, false, 0)],
    );
    let vs = translator
        .create_vertex_shader(&ShaderBytecode::new(vec![1]).with_signature(vec![
            SignatureElement {
                semantic: Semantic::Position,
                semantic_index: 0,
                component_type: ComponentType::Float,
                location: 0,
            },
        ]))
        .unwrap();
    let ps = translator.create_pixel_shader(&ShaderBytecode::new(vec![2])).unwrap();
    translator
        .bind_pipeline(translator.create_pipeline(vs, ps))
        .unwrap();
    translator.create_vertex_buffer(&VertexBufferDesc::new(64, 4).with_format(format))
}

#[test]
fn test_frames_in_flight_never_exceed_ring() {
    // --- 1. ARRANGE ---
    let config = TranslatorConfig {
        frames_in_flight: 2,
        fence_poll_spins: 1,
        wait_policy: WaitPolicy::Poll,
        ..TranslatorConfig::default()
    };
    let (translator, device) = translator_with(config);
    device.set_completion_latency(10);

    // --- 2. ACT ---
    for _ in 0..2 {
        assert!(translator.begin_frame().unwrap().is_ready());
        translator.end_frame().unwrap();
    }
    let third = translator.try_begin_frame().unwrap();

    // --- 3. ASSERT ---
    assert_eq!(third, FrameStatus::Busy { slot: 0 });
    assert_eq!(
        device.count_calls(|c| matches!(c, NativeCall::SignalFence(_))),
        2,
        "A busy slot must not be signaled again"
    );

    // Ending the frame anyway waits for the slot first.
    translator.end_frame().unwrap();
    assert_eq!(device.count_calls(|c| matches!(c, NativeCall::WaitFence(_))), 1);
    assert_eq!(translator.stats().frames_submitted, 3);
}

#[test]
fn test_blocking_frame_waits_for_slot() {
    let config = TranslatorConfig {
        frames_in_flight: 1,
        fence_poll_spins: 1,
        ..TranslatorConfig::default()
    };
    let (translator, device) = translator_with(config);
    device.set_completion_latency(10);

    translator.begin_frame().unwrap();
    translator.end_frame().unwrap();
    let status = translator.begin_frame().unwrap();

    assert_eq!(status, FrameStatus::Ready { slot: 0 });
    assert_eq!(device.count_calls(|c| matches!(c, NativeCall::WaitFence(_))), 1);
}

#[test]
fn test_lost_device_surfaces_from_frame_wait() {
    let config = TranslatorConfig {
        frames_in_flight: 1,
        fence_poll_spins: 1,
        ..TranslatorConfig::default()
    };
    let (translator, device) = translator_with(config);
    device.set_completion_latency(10);
    device.set_hang_on_wait(true);

    translator.begin_frame().unwrap();
    translator.end_frame().unwrap();
    let result = translator.begin_frame();

    assert!(matches!(result, Err(TranslatorError::Native(_))));
}

#[test]
fn test_query_completion() {
    let (translator, device) = translator_with(TranslatorConfig::default());
    device.set_completion_latency(1);
    let query = translator.create_query();

    assert_eq!(translator.query_completed(query), Ok(false), "Never issued");

    translator.issue_query(query).unwrap();
    assert_eq!(translator.query_completed(query), Ok(false));
    assert_eq!(translator.query_completed(query), Ok(true));

    translator.destroy(query);
    assert!(matches!(
        translator.query_completed(query),
        Err(SkipReason::Lookup(_))
    ));
}

#[test]
fn test_command_list_skips_destroyed_handles() {
    // --- 1. ARRANGE ---
    let (translator, device) = translator_with(TranslatorConfig::default());
    let kept = ready_to_draw(&translator);
    let doomed = ready_to_draw(&translator);

    let mut builder = CommandListBuilder::new();
    builder
        .set_render_state(veneer_core::state::RenderStateChange::DepthTest(true))
        .draw(DrawCall::vertices(kept, 0, 3))
        .draw(DrawCall::vertices(doomed, 0, 3))
        .bind_texture(0, doomed);
    let list = translator.create_command_list(builder);
    translator.destroy(doomed);

    // --- 2. ACT ---
    let report = translator.execute_command_list(list).unwrap();
    let replay = translator.execute_command_list(list).unwrap();

    // --- 3. ASSERT ---
    assert_eq!(
        report,
        CommandListReport {
            commands: 4,
            draws: 1,
            skipped: 2,
        }
    );
    assert_eq!(replay, report, "A list can be replayed");
    assert_eq!(device.count_calls(NativeCall::is_draw), 2);
}

#[test]
fn test_clear_targets_bound_render_target() {
    let (translator, device) = translator_with(TranslatorConfig::default());
    let with_depth = translator.create_render_target(&RenderTargetDesc {
        width: 16,
        height: 16,
        color_format: TextureFormat::Rgba8Unorm,
        depth_format: Some(TextureFormat::Depth24PlusStencil8),
    });
    let color_only = translator.create_render_target(&RenderTargetDesc {
        width: 16,
        height: 16,
        color_format: TextureFormat::Rgba8Unorm,
        depth_format: None,
    });
    let request = ClearRequest {
        color: Some([0.0, 0.0, 0.0, 1.0]),
        depth: Some(1.0),
    };

    translator.bind_render_target(with_depth).unwrap();
    translator.clear(request).unwrap();
    translator.bind_render_target(color_only).unwrap();
    translator.clear(request).unwrap();
    translator.bind_render_target(Handle::NULL).unwrap();
    translator.clear(request).unwrap();

    let color_clears = device.count_calls(|c| matches!(c, NativeCall::ClearRenderTarget { .. }));
    let depth_clears: Vec<_> = device
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            NativeCall::ClearDepthStencil { target, .. } => Some(target.is_some()),
            _ => None,
        })
        .collect();
    assert_eq!(color_clears, 3);
    assert_eq!(depth_clears, vec![true, false], "The color-only target has no depth to clear");
}

#[test]
fn test_render_target_texture_cannot_be_destroyed_alone() {
    let (translator, _device) = translator_with(TranslatorConfig::default());
    let target = translator.create_render_target(&RenderTargetDesc {
        width: 4,
        height: 4,
        color_format: TextureFormat::Rgba8Unorm,
        depth_format: None,
    });
    let texture = translator.render_target_texture(target);
    assert!(!texture.is_null());

    translator.destroy(texture);
    assert!(translator.resource_kind(texture).is_some());

    translator.destroy(target);
    assert!(translator.resource_kind(texture).is_none());
}
