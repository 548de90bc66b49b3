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

//! A fixed ring of completion fences that bounds how far the CPU runs ahead.
//!
//! ```text
//! end_frame:    signal slot N, mark it Signaled, advance to N+1
//! begin_frame:  slot N+1 Signaled? poll it, block only if the policy allows
//! ```
//!
//! With a ring of size `n`, at most `n` frames are ever outstanding.

use crate::native::{NativeContext, NativeDevice, NativeError, NativeFenceId};
use serde::{Deserialize, Serialize};

/// What `begin_frame` does when the GPU is still busy with the slot's last frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WaitPolicy {
    /// Return [`FrameStatus::Busy`] so the caller can do other work.
    Poll,
    /// Block until the slot is free.
    #[default]
    Block,
}

/// Whether a new frame may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// The slot is free and the frame may be recorded.
    Ready {
        /// The ring slot the frame uses.
        slot: usize,
    },
    /// The GPU has not finished the slot's previous frame.
    Busy {
        /// The ring slot that is still in flight.
        slot: usize,
    },
}

impl FrameStatus {
    /// Returns `true` for [`FrameStatus::Ready`].
    pub fn is_ready(&self) -> bool {
        matches!(self, FrameStatus::Ready { .. })
    }
}

/// The state of one ring slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// No frame is outstanding on the slot.
    Idle,
    /// The slot's fence was signaled and has not been observed complete.
    Signaled,
}

#[derive(Debug)]
struct FenceSlot {
    fence: NativeFenceId,
    outstanding: bool,
}

/// The frame fence ring.
#[derive(Debug)]
pub struct FrameFenceRing {
    slots: Vec<FenceSlot>,
    current: usize,
    poll_spins: u32,
    frames_submitted: u64,
    frames_retired: u64,
}

impl FrameFenceRing {
    /// Creates a ring of `frames_in_flight` fences.
    /// ## Errors
    /// Returns the device error if a fence cannot be created. Fences created
    /// before the failure are released.
    pub fn new(
        device: &dyn NativeDevice,
        frames_in_flight: usize,
        poll_spins: u32,
    ) -> Result<Self, NativeError> {
        if frames_in_flight == 0 {
            return Err(NativeError::InvalidArgument(
                "fence ring needs at least one slot".into(),
            ));
        }
        let mut slots = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            match device.create_fence() {
                Ok(fence) => slots.push(FenceSlot {
                    fence,
                    outstanding: false,
                }),
                Err(e) => {
                    for slot in slots {
                        if let Err(e) = device.destroy_fence(slot.fence) {
                            log::warn!("Failed to release fence {:?}: {e}", slot.fence);
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(Self {
            slots,
            current: 0,
            poll_spins,
            frames_submitted: 0,
            frames_retired: 0,
        })
    }

    /// Checks whether the current slot is free, waiting according to `policy`.
    pub fn begin_frame(
        &mut self,
        context: &mut dyn NativeContext,
        policy: WaitPolicy,
    ) -> Result<FrameStatus, NativeError> {
        let index = self.current;
        if !self.slots[index].outstanding {
            return Ok(FrameStatus::Ready { slot: index });
        }

        let fence = self.slots[index].fence;
        for _ in 0..self.poll_spins.max(1) {
            if context.poll_fence(fence)? {
                self.retire(index);
                return Ok(FrameStatus::Ready { slot: index });
            }
        }

        match policy {
            WaitPolicy::Poll => Ok(FrameStatus::Busy { slot: index }),
            WaitPolicy::Block => {
                log::debug!("Frame slot {index} still in flight; blocking");
                context.wait_fence(fence)?;
                self.retire(index);
                Ok(FrameStatus::Ready { slot: index })
            }
        }
    }

    /// Signals the current slot's fence and advances the ring.
    ///
    /// If the caller skipped `begin_frame` and the slot is still outstanding,
    /// this waits for it first so the ring bound holds.
    pub fn end_frame(&mut self, context: &mut dyn NativeContext) -> Result<usize, NativeError> {
        let index = self.current;
        let fence = self.slots[index].fence;
        if self.slots[index].outstanding {
            context.wait_fence(fence)?;
            self.retire(index);
        }
        context.signal_fence(fence)?;
        self.slots[index].outstanding = true;
        self.frames_submitted += 1;
        self.current = (self.current + 1) % self.slots.len();
        Ok(index)
    }

    fn retire(&mut self, index: usize) {
        self.slots[index].outstanding = false;
        self.frames_retired += 1;
    }

    /// Blocks until every outstanding frame has completed.
    pub fn drain(&mut self, context: &mut dyn NativeContext) -> Result<(), NativeError> {
        for index in 0..self.slots.len() {
            if self.slots[index].outstanding {
                context.wait_fence(self.slots[index].fence)?;
                self.retire(index);
            }
        }
        Ok(())
    }

    /// Releases the fences.
    pub fn destroy(self, device: &dyn NativeDevice) {
        for slot in self.slots {
            if let Err(e) = device.destroy_fence(slot.fence) {
                log::warn!("Failed to destroy frame fence {:?}: {e}", slot.fence);
            }
        }
    }

    /// Number of frames signaled and not yet observed complete.
    pub fn frames_in_flight(&self) -> usize {
        self.slots.iter().filter(|s| s.outstanding).count()
    }

    /// Ring size.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always `false`; a ring has at least one slot.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The slot the next frame will use.
    pub fn current_slot(&self) -> usize {
        self.current
    }

    /// State of a slot.
    pub fn slot_state(&self, index: usize) -> Option<SlotState> {
        self.slots.get(index).map(|s| {
            if s.outstanding {
                SlotState::Signaled
            } else {
                SlotState::Idle
            }
        })
    }

    /// Frames signaled since creation.
    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    /// Frames observed complete since creation.
    pub fn frames_retired(&self) -> u64 {
        self.frames_retired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{NativeCall, RecordingDevice};

    #[test]
    fn test_ring_never_exceeds_its_size() {
        let (device, mut context) = RecordingDevice::new();
        device.set_completion_latency(1000);
        let mut ring = FrameFenceRing::new(&device, 3, 2).unwrap();

        for _ in 0..20 {
            let status = ring.begin_frame(&mut context, WaitPolicy::Block).unwrap();
            assert!(status.is_ready());
            ring.end_frame(&mut context).unwrap();
            assert!(ring.frames_in_flight() <= 3);
        }
        assert_eq!(ring.frames_submitted(), 20);
        assert_eq!(ring.frames_retired(), 17);
    }

    #[test]
    fn test_partial_ring_is_released_on_failure() {
        let (device, _context) = RecordingDevice::new();
        device.set_fence_limit(Some(2));

        let result = FrameFenceRing::new(&device, 3, 2);

        assert!(matches!(result, Err(NativeError::OutOfMemory(_))));
        assert_eq!(device.count_calls(|c| matches!(c, NativeCall::DestroyFence(_))), 2);
        assert_eq!(device.live_objects(), 0);
    }

    #[test]
    fn test_poll_policy_reports_busy() {
        let (device, mut context) = RecordingDevice::new();
        device.set_completion_latency(5);
        let mut ring = FrameFenceRing::new(&device, 2, 1).unwrap();

        ring.end_frame(&mut context).unwrap();
        ring.end_frame(&mut context).unwrap();
        assert_eq!(ring.slot_state(0), Some(SlotState::Signaled));

        let status = ring.begin_frame(&mut context, WaitPolicy::Poll).unwrap();
        assert_eq!(status, FrameStatus::Busy { slot: 0 });
        assert_eq!(device.count_calls(|c| matches!(c, NativeCall::WaitFence(_))), 0);
    }

    #[test]
    fn test_completed_fence_is_observed_without_blocking() {
        let (device, mut context) = RecordingDevice::new();
        device.set_completion_latency(2);
        let mut ring = FrameFenceRing::new(&device, 1, 8).unwrap();

        ring.end_frame(&mut context).unwrap();
        let status = ring.begin_frame(&mut context, WaitPolicy::Block).unwrap();
        assert_eq!(status, FrameStatus::Ready { slot: 0 });
        assert_eq!(ring.slot_state(0), Some(SlotState::Idle));
        assert_eq!(device.count_calls(|c| matches!(c, NativeCall::WaitFence(_))), 0);
    }

    #[test]
    fn test_end_frame_without_begin_waits() {
        let (device, mut context) = RecordingDevice::new();
        device.set_completion_latency(100);
        let mut ring = FrameFenceRing::new(&device, 1, 1).unwrap();

        ring.end_frame(&mut context).unwrap();
        ring.end_frame(&mut context).unwrap();
        assert_eq!(ring.frames_in_flight(), 1);
        assert_eq!(device.count_calls(|c| matches!(c, NativeCall::WaitFence(_))), 1);
    }

    #[test]
    fn test_lost_device_surfaces_from_wait() {
        let (device, mut context) = RecordingDevice::new();
        device.set_completion_latency(100);
        device.set_hang_on_wait(true);
        let mut ring = FrameFenceRing::new(&device, 1, 1).unwrap();
        ring.end_frame(&mut context).unwrap();

        let result = ring.begin_frame(&mut context, WaitPolicy::Block);
        assert!(matches!(result, Err(NativeError::DeviceLost(_))));
    }

    #[test]
    fn test_zero_slots_is_invalid() {
        let (device, _context) = RecordingDevice::new();
        assert!(FrameFenceRing::new(&device, 0, 1).is_err());
    }

    #[test]
    fn test_destroy_releases_fences() {
        let (device, mut context) = RecordingDevice::new();
        let mut ring = FrameFenceRing::new(&device, 2, 1).unwrap();
        ring.end_frame(&mut context).unwrap();
        ring.drain(&mut context).unwrap();
        assert_eq!(ring.frames_in_flight(), 0);
        ring.destroy(&device);
        assert_eq!(device.live_objects(), 0);
    }
}
