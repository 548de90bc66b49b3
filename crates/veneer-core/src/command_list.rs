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

//! Deferred command lists.
//!
//! A [`CommandListBuilder`] records translator calls without touching the
//! device. The finished list is registered as a resource and replayed through
//! the same binding path as immediate calls, so handles destroyed between
//! recording and replay are skipped like any other stale handle.

use crate::handle::Handle;
use crate::native::{ClearRequest, ShaderStage};
use crate::state::RenderStateChange;
use crate::translator::DrawCall;
use crate::vertex::VertexFormat;
use std::sync::Arc;

/// One recorded translator call.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    /// `bind_pipeline`.
    BindPipeline(Handle),
    /// `bind_texture`.
    BindTexture {
        /// Texture unit.
        unit: u32,
        /// Texture handle, or `NULL` to unbind.
        texture: Handle,
    },
    /// `set_constant_buffer_data`, with the bytes captured at record time.
    SetConstantBufferData {
        /// Shader stage.
        stage: ShaderStage,
        /// Constant buffer slot.
        slot: u32,
        /// Captured contents.
        data: Vec<u8>,
    },
    /// Any render-state toggle.
    SetRenderState(RenderStateChange),
    /// `bind_render_target`.
    BindRenderTarget(Handle),
    /// `clear`.
    Clear(ClearRequest),
    /// `draw`.
    Draw(DrawCall),
    /// `draw_with_format`.
    DrawWithFormat(DrawCall, Arc<VertexFormat>),
}

/// Records commands for later replay.
#[derive(Debug, Clone, Default)]
pub struct CommandListBuilder {
    commands: Vec<RecordedCommand>,
}

impl CommandListBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a pipeline bind.
    pub fn bind_pipeline(&mut self, pipeline: Handle) -> &mut Self {
        self.commands.push(RecordedCommand::BindPipeline(pipeline));
        self
    }

    /// Records a texture bind.
    pub fn bind_texture(&mut self, unit: u32, texture: Handle) -> &mut Self {
        self.commands
            .push(RecordedCommand::BindTexture { unit, texture });
        self
    }

    /// Records a constant buffer upload. The bytes are copied now.
    pub fn set_constant_buffer_data(
        &mut self,
        stage: ShaderStage,
        slot: u32,
        data: &[u8],
    ) -> &mut Self {
        self.commands.push(RecordedCommand::SetConstantBufferData {
            stage,
            slot,
            data: data.to_vec(),
        });
        self
    }

    /// Records a render-state change.
    pub fn set_render_state(&mut self, change: RenderStateChange) -> &mut Self {
        self.commands.push(RecordedCommand::SetRenderState(change));
        self
    }

    /// Records a render-target bind.
    pub fn bind_render_target(&mut self, target: Handle) -> &mut Self {
        self.commands.push(RecordedCommand::BindRenderTarget(target));
        self
    }

    /// Records a clear.
    pub fn clear(&mut self, request: ClearRequest) -> &mut Self {
        self.commands.push(RecordedCommand::Clear(request));
        self
    }

    /// Records a draw using the vertex buffer's own format.
    pub fn draw(&mut self, call: DrawCall) -> &mut Self {
        self.commands.push(RecordedCommand::Draw(call));
        self
    }

    /// Records a draw with an explicit vertex format.
    pub fn draw_with_format(&mut self, call: DrawCall, format: &VertexFormat) -> &mut Self {
        self.commands
            .push(RecordedCommand::DrawWithFormat(call, Arc::new(format.clone())));
        self
    }

    /// Number of recorded commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Consumes the builder, yielding the recorded commands.
    pub fn finish(self) -> Vec<RecordedCommand> {
        self.commands
    }
}

/// What a command-list replay did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandListReport {
    /// Commands replayed.
    pub commands: usize,
    /// Draws that reached the device.
    pub draws: usize,
    /// Draws or binds that were skipped.
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::CompareFunction;

    #[test]
    fn test_builder_records_in_order() {
        let pipeline = Handle::from_raw(1);
        let vb = Handle::from_raw(2);
        let mut builder = CommandListBuilder::new();
        builder
            .bind_pipeline(pipeline)
            .set_render_state(RenderStateChange::DepthFunc(CompareFunction::LessEqual))
            .set_constant_buffer_data(ShaderStage::Vertex, 0, &[1, 2, 3, 4])
            .draw(DrawCall::vertices(vb, 0, 3));

        assert_eq!(builder.len(), 4);
        let commands = builder.finish();
        assert_eq!(commands[0], RecordedCommand::BindPipeline(pipeline));
        assert_eq!(
            commands[2],
            RecordedCommand::SetConstantBufferData {
                stage: ShaderStage::Vertex,
                slot: 0,
                data: vec![1, 2, 3, 4],
            }
        );
        assert!(matches!(commands[3], RecordedCommand::Draw(call) if call.vertex_buffer == vb));
    }

    #[test]
    fn test_constant_data_is_captured_at_record_time() {
        let mut data = vec![7u8; 16];
        let mut builder = CommandListBuilder::new();
        builder.set_constant_buffer_data(ShaderStage::Pixel, 1, &data);
        data.fill(0);

        match &builder.finish()[0] {
            RecordedCommand::SetConstantBufferData { data: captured, .. } => {
                assert_eq!(captured, &vec![7u8; 16]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
