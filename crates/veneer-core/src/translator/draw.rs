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

//! Draw submission.

use super::{Translator, TranslatorState};
use crate::error::{DrawOutcome, SkipReason};
use crate::growth::GrowthOutcome;
use crate::handle::Handle;
use crate::native::PrimitiveTopology;
use crate::vertex::VertexFormat;
use std::sync::Arc;

/// A single draw request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    /// The vertex buffer to read from.
    pub vertex_buffer: Handle,
    /// The index buffer, or `NULL` for a non-indexed draw.
    pub index_buffer: Handle,
    /// How vertices assemble into primitives.
    pub topology: PrimitiveTopology,
    /// First vertex, or first index for indexed draws.
    pub first: u32,
    /// Vertex count, or index count for indexed draws.
    pub count: u32,
    /// Added to each index before fetching a vertex.
    pub base_vertex: i32,
    /// Number of instances.
    pub instance_count: u32,
}

impl DrawCall {
    /// A non-indexed triangle-list draw of `count` vertices starting at `first`.
    pub const fn vertices(vertex_buffer: Handle, first: u32, count: u32) -> Self {
        Self {
            vertex_buffer,
            index_buffer: Handle::NULL,
            topology: PrimitiveTopology::TriangleList,
            first,
            count,
            base_vertex: 0,
            instance_count: 1,
        }
    }

    /// An indexed triangle-list draw of `count` indices starting at `first_index`.
    pub const fn indexed(
        vertex_buffer: Handle,
        index_buffer: Handle,
        first_index: u32,
        count: u32,
    ) -> Self {
        Self {
            vertex_buffer,
            index_buffer,
            topology: PrimitiveTopology::TriangleList,
            first: first_index,
            count,
            base_vertex: 0,
            instance_count: 1,
        }
    }

    /// Sets the base vertex.
    pub const fn with_base_vertex(mut self, base_vertex: i32) -> Self {
        self.base_vertex = base_vertex;
        self
    }

    /// Sets the primitive topology.
    pub const fn with_topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    /// Sets the instance count.
    pub const fn with_instances(mut self, instance_count: u32) -> Self {
        self.instance_count = instance_count;
        self
    }

    /// Returns `true` if the draw reads through an index buffer.
    pub const fn is_indexed(&self) -> bool {
        !self.index_buffer.is_null()
    }
}

impl TranslatorState {
    pub(crate) fn draw(&mut self, call: &DrawCall, format: Option<Arc<VertexFormat>>) -> DrawOutcome {
        let outcome = DrawOutcome::from(self.try_draw(call, format));
        match &outcome {
            DrawOutcome::Drawn => self.stats.draws_issued += 1,
            DrawOutcome::Skipped(reason) => {
                self.stats.draws_skipped += 1;
                if self.config.log_skipped_draws {
                    log::debug!("Draw from {} skipped: {reason}", call.vertex_buffer);
                }
            }
        }
        outcome
    }

    fn try_draw(
        &mut self,
        call: &DrawCall,
        format: Option<Arc<VertexFormat>>,
    ) -> Result<(), SkipReason> {
        if call.vertex_buffer.is_null() {
            return Err(SkipReason::NoVertexBuffer);
        }
        if call.count == 0 || call.instance_count == 0 {
            return Err(SkipReason::EmptyDraw);
        }

        let record = self.pools.vertex_buffer(call.vertex_buffer)?;
        let format = format
            .or_else(|| record.format.clone())
            .ok_or(SkipReason::NoVertexFormat(call.vertex_buffer))?;
        // Vertices are fetched with the stride they are bound with.
        let stride = match format.stride() {
            0 => record.capacity.stride,
            stride => stride,
        };
        if call.is_indexed() {
            self.pools.index_buffer(call.index_buffer)?;
        }

        let pipeline = self.resolve_pipeline()?;
        self.apply_pipeline(&pipeline);
        self.apply_input_layout(&pipeline, &format)?;

        let (grow_target, grown) = if call.is_indexed() {
            let grown = self.growth.ensure_capacity(
                &mut self.pools,
                self.device.as_ref(),
                self.context.as_mut(),
                &mut self.committed,
                call.index_buffer,
                call.first as u64,
                call.count as u64,
            );
            (call.index_buffer, grown)
        } else {
            let grown = self.growth.ensure_elements(
                &mut self.pools,
                self.device.as_ref(),
                self.context.as_mut(),
                &mut self.committed,
                call.vertex_buffer,
                call.first as u64,
                call.count as u64,
                stride,
            );
            (call.vertex_buffer, grown)
        };
        match grown {
            Ok(GrowthOutcome::Grown { .. }) => self.stats.buffer_growths += 1,
            Ok(GrowthOutcome::Sufficient) => {}
            Err(e) => {
                log::warn!("Buffer {grow_target} could not grow for draw: {e}");
                return Err(SkipReason::GrowthFailed(grow_target));
            }
        }

        self.apply_vertex_buffer(call.vertex_buffer, stride)?;
        if call.is_indexed() {
            self.apply_index_buffer(call.index_buffer)?;
        }
        self.apply_textures();
        self.apply_render_state()?;
        self.apply_render_targets();
        self.apply_topology(call.topology);

        if call.is_indexed() {
            self.context.draw_indexed(
                call.count,
                call.instance_count,
                call.first,
                call.base_vertex,
                0,
            );
        } else {
            self.context
                .draw(call.count, call.instance_count, call.first, 0);
        }
        Ok(())
    }
}

impl Translator {
    /// Draws with the vertex buffer's own format.
    ///
    /// Everything the draw depends on is resolved and bound first; only
    /// bindings that differ from what the context already holds are issued.
    /// A draw that cannot be made safe is skipped, never forwarded.
    pub fn draw(&self, call: &DrawCall) -> DrawOutcome {
        self.lock().draw(call, None)
    }

    /// Draws, reading vertices through `format` instead of the buffer's own.
    pub fn draw_with_format(&self, call: &DrawCall, format: &VertexFormat) -> DrawOutcome {
        self.lock().draw(call, Some(Arc::new(format.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_call_builders() {
        let vb = Handle::from_raw(7);
        let ib = Handle::from_raw(9);

        let call = DrawCall::indexed(vb, ib, 3, 6)
            .with_base_vertex(-2)
            .with_topology(PrimitiveTopology::LineList)
            .with_instances(4);

        assert!(call.is_indexed());
        assert_eq!(call.first, 3);
        assert_eq!(call.base_vertex, -2);
        assert_eq!(call.instance_count, 4);
        assert!(!DrawCall::vertices(vb, 0, 3).is_indexed());
    }
}
