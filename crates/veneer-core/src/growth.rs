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

//! Transparent growth of vertex and index buffers.
//!
//! When a draw or an upload addresses bytes past a buffer's capacity, the
//! buffer is reallocated at `(capacity + required) * factor` bytes, its old
//! contents are copied over on the device, and the handle keeps pointing at
//! the same record. Bindings of the buffer are re-pointed at the new object.

use crate::handle::Handle;
use crate::native::{BufferDescriptor, NativeContext, NativeDevice, NativeError};
use crate::resource::{LookupError, ResourcePools};
use crate::state::CommittedState;
use std::borrow::Cow;
use thiserror::Error;

/// Why a buffer could not be grown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrowthError {
    /// The handle is not a vertex or index buffer.
    #[error(transparent)]
    Lookup(#[from] LookupError),
    /// The handle refers to a resource that cannot grow.
    #[error("Handle {0} is not a growable buffer")]
    NotGrowable(Handle),
    /// The requested range does not fit in 64 bits.
    #[error("Requested range overflows")]
    Overflow,
    /// The replacement buffer could not be allocated.
    #[error("Failed to allocate grown buffer: {0}")]
    Allocation(NativeError),
    /// The old contents could not be copied into the replacement.
    #[error("Failed to copy buffer contents: {0}")]
    Copy(NativeError),
}

/// Result of a capacity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthOutcome {
    /// The buffer was already large enough.
    Sufficient,
    /// The buffer was reallocated.
    Grown {
        /// Capacity before growing, in bytes.
        old_size: u64,
        /// Capacity after growing, in bytes.
        new_size: u64,
    },
}

/// Reallocates buffers that are too small for a request.
#[derive(Debug, Clone, Copy)]
pub struct BufferGrowth {
    factor: u64,
}

impl Default for BufferGrowth {
    fn default() -> Self {
        Self { factor: 2 }
    }
}

impl BufferGrowth {
    /// Creates a growth policy. A factor below 1 is treated as 1.
    pub fn new(factor: u32) -> Self {
        Self {
            factor: factor.max(1) as u64,
        }
    }

    /// The multiplier applied when growing.
    pub fn factor(&self) -> u64 {
        self.factor
    }

    /// Makes sure `count` elements starting at `first_element` fit in the buffer.
    #[allow(clippy::too_many_arguments)]
    pub fn ensure_capacity(
        &self,
        pools: &mut ResourcePools,
        device: &dyn NativeDevice,
        context: &mut dyn NativeContext,
        committed: &mut CommittedState,
        handle: Handle,
        first_element: u64,
        element_count: u64,
    ) -> Result<GrowthOutcome, GrowthError> {
        let stride = {
            let record = pools
                .get_mut(handle)
                .ok_or(GrowthError::Lookup(LookupError::NotFound(handle)))?;
            let (_, capacity, _) = record
                .growable_mut()
                .ok_or(GrowthError::NotGrowable(handle))?;
            capacity.stride
        };
        self.ensure_elements(
            pools,
            device,
            context,
            committed,
            handle,
            first_element,
            element_count,
            stride,
        )
    }

    /// Like [`ensure_capacity`](Self::ensure_capacity), with elements `stride`
    /// bytes apart instead of the buffer's own stride.
    #[allow(clippy::too_many_arguments)]
    pub fn ensure_elements(
        &self,
        pools: &mut ResourcePools,
        device: &dyn NativeDevice,
        context: &mut dyn NativeContext,
        committed: &mut CommittedState,
        handle: Handle,
        first_element: u64,
        element_count: u64,
        stride: u32,
    ) -> Result<GrowthOutcome, GrowthError> {
        let required = first_element
            .checked_add(element_count)
            .and_then(|end| end.checked_mul(stride as u64))
            .ok_or(GrowthError::Overflow)?;
        self.ensure_bytes(pools, device, context, committed, handle, required)
    }

    /// Makes sure the buffer holds at least `required` bytes.
    pub fn ensure_bytes(
        &self,
        pools: &mut ResourcePools,
        device: &dyn NativeDevice,
        context: &mut dyn NativeContext,
        committed: &mut CommittedState,
        handle: Handle,
        required: u64,
    ) -> Result<GrowthOutcome, GrowthError> {
        let record = pools
            .get_mut(handle)
            .ok_or(GrowthError::Lookup(LookupError::NotFound(handle)))?;
        let (native, capacity, kind) = record
            .growable_mut()
            .ok_or(GrowthError::NotGrowable(handle))?;

        let old_size = capacity.size;
        if old_size >= required {
            return Ok(GrowthOutcome::Sufficient);
        }

        let new_size = old_size
            .checked_add(required)
            .and_then(|sum| sum.checked_mul(self.factor))
            .ok_or(GrowthError::Overflow)?;

        let replacement = device
            .create_buffer(
                &BufferDescriptor {
                    label: Some(Cow::Borrowed("veneer grown buffer")),
                    size: new_size,
                    kind,
                },
                None,
            )
            .map_err(GrowthError::Allocation)?;

        if let Err(e) = context.copy_buffer_region(replacement, *native, old_size) {
            if let Err(e) = device.destroy_buffer(replacement) {
                log::warn!("Failed to release replacement buffer: {e}");
            }
            return Err(GrowthError::Copy(e));
        }

        let old_native = std::mem::replace(native, replacement);
        capacity.size = new_size;
        if let Err(e) = device.destroy_buffer(old_native) {
            log::warn!("Failed to release outgrown buffer {old_native:?}: {e}");
        }

        committed.rebind_buffer(context, handle, replacement);
        log::debug!("Grew buffer {handle} from {old_size} to {new_size} bytes");

        Ok(GrowthOutcome::Grown { old_size, new_size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::VertexBufferDesc;
    use crate::state::VertexBufferBinding;
    use crate::testing::{NativeCall, RecordingDevice};

    #[test]
    fn test_growth_is_a_no_op_when_large_enough() {
        let (device, mut context) = RecordingDevice::new();
        let mut pools = ResourcePools::with_key(1);
        let mut committed = CommittedState::new(1);
        let vb = pools
            .create_vertex_buffer(&device, &VertexBufferDesc::new(64, 4))
            .unwrap();

        let outcome = BufferGrowth::default()
            .ensure_capacity(&mut pools, &device, &mut context, &mut committed, vb, 0, 16)
            .unwrap();
        assert_eq!(outcome, GrowthOutcome::Sufficient);
        assert_eq!(device.count_calls(|c| matches!(c, NativeCall::CreateBuffer { .. })), 1);
    }

    #[test]
    fn test_growing_sequence_keeps_every_prefix() {
        let (device, mut context) = RecordingDevice::new();
        let mut pools = ResourcePools::with_key(1);
        let mut committed = CommittedState::new(1);
        let mut expected: Vec<u8> = (0..16).collect();
        let vb = pools
            .create_vertex_buffer(&device, &VertexBufferDesc::new(16, 4).with_contents(&expected))
            .unwrap();
        let growth = BufferGrowth::default();
        let mut growths = 0;

        for (step, count) in [2u64, 4, 4, 9, 30, 30, 100, 250].into_iter().enumerate() {
            let outcome = growth
                .ensure_capacity(&mut pools, &device, &mut context, &mut committed, vb, 0, count)
                .unwrap();
            if matches!(outcome, GrowthOutcome::Grown { .. }) {
                growths += 1;
            }

            let required = count * 4;
            let record = pools.vertex_buffer(vb).unwrap();
            assert!(record.capacity.size >= required, "step {step}: capacity below {required}");
            let memory = device.buffer_contents(record.native).unwrap();
            assert_eq!(&memory[..expected.len()], &expected[..], "step {step}: prefix lost");

            // Fill the newly required bytes so the next growth has more to carry over.
            let written = expected.len() as u64;
            if required > written {
                let fill = vec![100 + step as u8; (required - written) as usize];
                context.update_buffer(record.native, written, &fill).unwrap();
                expected.extend_from_slice(&fill);
            }
        }

        assert_eq!(growths, 3);
    }

    #[test]
    fn test_wider_stride_grows_further() {
        let (device, mut context) = RecordingDevice::new();
        let mut pools = ResourcePools::with_key(1);
        let mut committed = CommittedState::new(1);
        let vb = pools
            .create_vertex_buffer(&device, &VertexBufferDesc::new(64, 4))
            .unwrap();

        let outcome = BufferGrowth::default()
            .ensure_elements(&mut pools, &device, &mut context, &mut committed, vb, 0, 10, 16)
            .unwrap();

        assert_eq!(
            outcome,
            GrowthOutcome::Grown {
                old_size: 64,
                new_size: 448
            }
        );
    }

    #[test]
    fn test_growth_copies_on_device_and_rebinds() {
        let (device, mut context) = RecordingDevice::new();
        let mut pools = ResourcePools::with_key(1);
        let mut committed = CommittedState::new(1);
        let contents: Vec<u8> = (0..64).collect();
        let vb = pools
            .create_vertex_buffer(&device, &VertexBufferDesc::new(64, 4).with_contents(&contents))
            .unwrap();
        let old_native = pools.vertex_buffer(vb).unwrap().native;
        committed.bind_vertex_buffer(
            &mut context,
            VertexBufferBinding {
                buffer: vb,
                native: old_native,
                stride: 4,
                offset: 0,
            },
        );

        let outcome = BufferGrowth::default()
            .ensure_capacity(&mut pools, &device, &mut context, &mut committed, vb, 20, 5)
            .unwrap();
        assert_eq!(
            outcome,
            GrowthOutcome::Grown {
                old_size: 64,
                new_size: 328
            }
        );

        let record = pools.vertex_buffer(vb).unwrap();
        assert_ne!(record.native, old_native);
        assert_eq!(record.capacity.size, 328);
        let grown = device.buffer_contents(record.native).unwrap();
        assert_eq!(&grown[..64], &contents[..]);
        assert!(device.buffer_contents(old_native).is_none());
        assert_eq!(committed.vertex_buffer.unwrap().native, record.native);
    }

    #[test]
    fn test_failed_allocation_leaves_buffer_untouched() {
        let (device, mut context) = RecordingDevice::new();
        let mut pools = ResourcePools::with_key(1);
        let mut committed = CommittedState::new(1);
        let vb = pools
            .create_vertex_buffer(&device, &VertexBufferDesc::new(64, 4))
            .unwrap();
        device.set_buffer_budget(Some(128));

        let result = BufferGrowth::default().ensure_bytes(
            &mut pools,
            &device,
            &mut context,
            &mut committed,
            vb,
            100,
        );
        assert!(matches!(result, Err(GrowthError::Allocation(_))));
        assert_eq!(pools.vertex_buffer(vb).unwrap().capacity.size, 64);
    }

    #[test]
    fn test_failed_copy_releases_replacement() {
        let (device, mut context) = RecordingDevice::new();
        let mut pools = ResourcePools::with_key(1);
        let mut committed = CommittedState::new(1);
        let vb = pools
            .create_vertex_buffer(&device, &VertexBufferDesc::new(64, 4))
            .unwrap();
        device.set_fail_copies(true);

        let result = BufferGrowth::default().ensure_bytes(
            &mut pools,
            &device,
            &mut context,
            &mut committed,
            vb,
            100,
        );
        assert!(matches!(result, Err(GrowthError::Copy(_))));
        assert_eq!(device.live_objects(), 1);
    }

    #[test]
    fn test_overflowing_range_is_rejected() {
        let (device, mut context) = RecordingDevice::new();
        let mut pools = ResourcePools::with_key(1);
        let mut committed = CommittedState::new(1);
        let vb = pools
            .create_vertex_buffer(&device, &VertexBufferDesc::new(64, 4))
            .unwrap();
        let result = BufferGrowth::default().ensure_capacity(
            &mut pools,
            &device,
            &mut context,
            &mut committed,
            vb,
            u64::MAX,
            2,
        );
        assert_eq!(result, Err(GrowthError::Overflow));
    }
}
