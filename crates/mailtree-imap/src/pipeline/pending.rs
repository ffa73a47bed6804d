//! Per-command bookkeeping.

use std::collections::VecDeque;

use crate::command::Command;
use crate::parser::UntaggedResponse;
use crate::types::{ResponseCode, Status, Tag};

/// Where a command stands on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Not written yet.
    Queued,
    /// Partly written; the next segment waits for a `+`.
    AwaitingLiteral,
    /// The server sent `+` and the caller has to answer.
    AwaitingPayload,
    /// Fully written; waiting for the tagged completion.
    Sent,
}

#[derive(Debug)]
pub(crate) struct Pending {
    pub tag: Tag,
    pub summary: String,
    pub exclusive: bool,
    pub continuable: bool,
    /// FETCH data in reply belongs to this command.
    pub solicits_fetch: bool,
    pub segments: VecDeque<Vec<u8>>,
    pub responses: Vec<UntaggedResponse>,
    pub stage: Stage,
    /// The caller gave up; the completion is swallowed.
    pub abandoned: bool,
}

impl Pending {
    pub fn new(tag: Tag, command: &Command, segments: Vec<Vec<u8>>) -> Self {
        Self {
            tag,
            summary: command.describe(),
            exclusive: !command.is_pipelineable(),
            continuable: command.expects_continuation(),
            solicits_fetch: matches!(command, Command::Fetch { .. } | Command::Store { .. }),
            segments: segments.into(),
            responses: Vec::new(),
            stage: Stage::Queued,
            abandoned: false,
        }
    }

    /// Takes the next segment and advances the stage.
    pub fn next_segment(&mut self) -> Option<Vec<u8>> {
        let segment = self.segments.pop_front()?;
        self.stage = if self.segments.is_empty() {
            Stage::Sent
        } else {
            Stage::AwaitingLiteral
        };
        Some(segment)
    }

    /// Returns true while later commands must not be written.
    pub fn blocks(&self) -> bool {
        self.exclusive || matches!(self.stage, Stage::AwaitingLiteral | Stage::AwaitingPayload)
    }
}

/// A successful completion: the tagged `OK` plus the untagged data
/// attributed to the command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Always [`Status::Ok`]; `NO` and `BAD` become errors.
    pub status: Status,
    /// Response code of the tagged reply.
    pub code: Option<ResponseCode>,
    /// Human-readable text of the tagged reply.
    pub text: String,
    /// Untagged data that arrived while the command was in flight.
    pub responses: Vec<UntaggedResponse>,
}

impl CommandResult {
    /// Returns the CAPABILITY list carried by the completion, if any.
    ///
    /// Looks at untagged CAPABILITY data first, then at the response code.
    #[must_use]
    pub fn capabilities(&self) -> Option<&[crate::types::Capability]> {
        self.responses
            .iter()
            .rev()
            .find_map(|r| match r {
                UntaggedResponse::Capability(caps) => Some(caps.as_slice()),
                _ => None,
            })
            .or(match &self.code {
                Some(ResponseCode::Capability(caps)) => Some(caps.as_slice()),
                _ => None,
            })
    }
}
