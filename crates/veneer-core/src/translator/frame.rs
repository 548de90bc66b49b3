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

//! Frame pacing, queries and command-list replay.

use super::{Translator, TranslatorState};
use crate::command_list::{CommandListReport, RecordedCommand};
use crate::error::{DrawOutcome, SkipReason, TranslatorError};
use crate::fence::{FrameStatus, WaitPolicy};
use crate::handle::Handle;

impl TranslatorState {
    pub(crate) fn begin_frame(&mut self, policy: WaitPolicy) -> Result<FrameStatus, TranslatorError> {
        let status = self.fences.begin_frame(self.context.as_mut(), policy)?;
        if let FrameStatus::Busy { slot } = status {
            log::trace!("Frame slot {slot} is still in flight");
        }
        Ok(status)
    }

    pub(crate) fn end_frame(&mut self) -> Result<(), TranslatorError> {
        let slot = self.fences.end_frame(self.context.as_mut())?;
        self.context.flush()?;
        log::trace!("Submitted frame in slot {slot}");
        Ok(())
    }

    pub(crate) fn issue_query(&mut self, query: Handle) -> Result<(), SkipReason> {
        let record = self.pools.query_mut(query)?;
        record.issued = true;
        let native = record.native;
        self.context.end_query(native);
        Ok(())
    }

    pub(crate) fn query_completed(&mut self, query: Handle) -> Result<bool, SkipReason> {
        let record = self.pools.query(query)?;
        if !record.issued {
            return Ok(false);
        }
        let native = record.native;
        Ok(self.context.query_completed(native)?)
    }

    /// Replays one recorded command. Returns `Some` for draws.
    fn replay(&mut self, command: &RecordedCommand) -> Result<Option<DrawOutcome>, SkipReason> {
        match command {
            RecordedCommand::BindPipeline(pipeline) => self.bind_pipeline(*pipeline)?,
            RecordedCommand::BindTexture { unit, texture } => self.bind_texture(*unit, *texture)?,
            RecordedCommand::SetConstantBufferData { stage, slot, data } => {
                self.set_constant_buffer_data(*stage, *slot, data)?
            }
            RecordedCommand::SetRenderState(change) => self.set_render_state(*change),
            RecordedCommand::BindRenderTarget(target) => self.bind_render_target(*target)?,
            RecordedCommand::Clear(request) => self.clear(*request)?,
            RecordedCommand::Draw(call) => return Ok(Some(self.draw(call, None))),
            RecordedCommand::DrawWithFormat(call, format) => {
                return Ok(Some(self.draw(call, Some(format.clone()))));
            }
        }
        Ok(None)
    }

    pub(crate) fn execute_command_list(
        &mut self,
        list: Handle,
    ) -> Result<CommandListReport, SkipReason> {
        let commands = self.pools.command_list(list)?.commands.clone();
        let mut report = CommandListReport::default();
        for command in commands.iter() {
            report.commands += 1;
            match self.replay(command) {
                Ok(Some(DrawOutcome::Drawn)) => report.draws += 1,
                Ok(Some(DrawOutcome::Skipped(_))) => report.skipped += 1,
                Ok(None) => {}
                Err(reason) => {
                    log::debug!("Command list {list}: command skipped: {reason}");
                    report.skipped += 1;
                }
            }
        }
        log::trace!(
            "Replayed command list {list}: {} commands, {} draws, {} skipped",
            report.commands,
            report.draws,
            report.skipped
        );
        Ok(report)
    }
}

impl Translator {
    /// Starts a frame, waiting as configured for the slot's previous frame.
    /// ## Errors
    /// * `TranslatorError::Native` - If the fence could not be waited on, e.g. the device was lost.
    pub fn begin_frame(&self) -> Result<FrameStatus, TranslatorError> {
        let mut state = self.lock();
        let policy = state.config.wait_policy;
        state.begin_frame(policy)
    }

    /// Starts a frame without blocking. Returns [`FrameStatus::Busy`] if the
    /// slot is still in flight; the caller may retry.
    pub fn try_begin_frame(&self) -> Result<FrameStatus, TranslatorError> {
        self.lock().begin_frame(WaitPolicy::Poll)
    }

    /// Ends the frame, signalling its fence and submitting queued work.
    pub fn end_frame(&self) -> Result<(), TranslatorError> {
        self.lock().end_frame()
    }

    /// Marks the point in the command stream an event query waits for.
    pub fn issue_query(&self, query: Handle) -> Result<(), SkipReason> {
        self.lock().issue_query(query)
    }

    /// Returns `true` once the GPU has passed the query's last issue point.
    /// A query that was never issued reports `false`.
    pub fn query_completed(&self, query: Handle) -> Result<bool, SkipReason> {
        self.lock().query_completed(query)
    }

    /// Replays a recorded command list.
    ///
    /// Commands naming handles destroyed since recording are skipped and
    /// counted; the rest of the list still runs.
    pub fn execute_command_list(&self, list: Handle) -> Result<CommandListReport, SkipReason> {
        self.lock().execute_command_list(list)
    }
}
