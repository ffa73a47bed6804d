//! Command pipelining.
//!
//! [`Pipeline`] is a sans-I/O state machine. Commands are enqueued and
//! encoded up front; [`Pipeline::poll_transmit`] hands out the bytes that may
//! be written now, and [`Pipeline::handle_response`] matches what the server
//! sent back. Tagged completions are matched by tag only, never by position.
//!
//! Without pipelining, a command is written only once the previous one has
//! completed. With pipelining, up to `max_depth` commands are in flight.
//! Commands that change connection state or the mailbox hierarchy
//! ([`Command::is_pipelineable`]) are always written alone.
//!
//! # Example
//!
//! ```
//! use mailtree_imap::command::Command;
//! use mailtree_imap::parser::ResponseParser;
//! use mailtree_imap::pipeline::{Dispatch, Pipeline, PipelineConfig};
//!
//! let mut pipeline = Pipeline::new(PipelineConfig::new().enabled(true));
//! let a = pipeline.enqueue(&Command::Noop).unwrap();
//! let b = pipeline.enqueue(&Command::Capability).unwrap();
//! assert_eq!(pipeline.poll_transmit().unwrap().data, b"A0001 NOOP\r\n");
//! assert_eq!(pipeline.poll_transmit().unwrap().data, b"A0002 CAPABILITY\r\n");
//!
//! // Completions may arrive in any order.
//! let done = ResponseParser::parse(b"A0002 OK done\r\n").unwrap();
//! assert_eq!(pipeline.handle_response(done).unwrap(), Dispatch::Completed(b.clone()));
//! assert!(pipeline.take_result(&b).unwrap().is_ok());
//! assert!(pipeline.is_pending(&a));
//! ```

mod pending;
mod transmit;

use std::collections::{HashMap, VecDeque};

pub use pending::{CommandResult, Stage};
pub use transmit::{Transmit, TransmitKind};

use pending::Pending;

use crate::command::{Command, TagGenerator};
use crate::parser::{Response, UntaggedResponse};
use crate::types::{LiteralMode, Status, Tag};
use crate::{Error, Result};

/// Default maximum pipeline depth.
pub const DEFAULT_MAX_DEPTH: usize = 4;

/// Maximum allowed pipeline depth.
pub const MAX_PIPELINE_DEPTH: usize = 16;

/// Default size above which strings are sent as literals.
pub const DEFAULT_LITERAL_THRESHOLD: usize = 1024;

/// Pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum number of commands in flight.
    pub max_depth: usize,
    /// Whether more than one command may be in flight.
    pub enabled: bool,
    /// Letter the generated tags start with.
    pub tag_prefix: char,
    /// Strings longer than this many bytes are sent as literals.
    pub literal_threshold: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            enabled: false,
            tag_prefix: 'A',
            literal_threshold: DEFAULT_LITERAL_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum pipeline depth, clamped to `1..=16`.
    #[must_use]
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.clamp(1, MAX_PIPELINE_DEPTH);
        self
    }

    /// Enables or disables pipelining.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the tag prefix. One that is not a valid tag character falls
    /// back to `A`.
    #[must_use]
    pub const fn tag_prefix(mut self, prefix: char) -> Self {
        self.tag_prefix = prefix;
        self
    }

    /// Sets the size above which strings are sent as literals.
    #[must_use]
    pub const fn literal_threshold(mut self, threshold: usize) -> Self {
        self.literal_threshold = threshold;
        self
    }
}

/// A handle to an enqueued command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandHandle {
    tag: Tag,
}

impl CommandHandle {
    /// Returns the tag associated with this command.
    #[must_use]
    pub const fn tag(&self) -> &Tag {
        &self.tag
    }
}

/// What [`Pipeline::handle_response`] did with a response.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// The command completed; its outcome is ready in
    /// [`Pipeline::take_result`].
    Completed(CommandHandle),
    /// Untagged data was attached to this in-flight command.
    Attributed(CommandHandle),
    /// Untagged data with no command in flight.
    Unsolicited(UntaggedResponse),
    /// A `+` released the next literal segment.
    LiteralReleased,
    /// The server waits for a caller-supplied payload
    /// ([`Pipeline::continue_with`]) or a [`Pipeline::cancel`].
    Continuation {
        /// Command the server is talking to.
        handle: CommandHandle,
        /// Text after the `+`.
        text: String,
    },
    /// The completion of an abandoned command was discarded.
    Swallowed,
}

/// Command pipeline state machine.
#[derive(Debug)]
pub struct Pipeline {
    tags: TagGenerator,
    literal_mode: LiteralMode,
    literal_threshold: usize,
    enabled: bool,
    max_depth: usize,
    queue: VecDeque<Pending>,
    in_flight: Vec<Pending>,
    outbound: VecDeque<Transmit>,
    finished: HashMap<Tag, Result<CommandResult>>,
    /// Cancelled tags whose `Cancelled` outcome was not taken yet, oldest first.
    cancelled: VecDeque<Tag>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl Pipeline {
    /// Creates a pipeline. An invalid tag prefix falls back to `A`.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            tags: TagGenerator::new(config.tag_prefix).unwrap_or_default(),
            literal_mode: LiteralMode::Synchronizing,
            literal_threshold: config.literal_threshold,
            enabled: config.enabled,
            max_depth: config.max_depth.clamp(1, MAX_PIPELINE_DEPTH),
            queue: VecDeque::new(),
            in_flight: Vec::new(),
            outbound: VecDeque::new(),
            finished: HashMap::new(),
            cancelled: VecDeque::new(),
        }
    }

    /// Sets how literals are announced for commands enqueued from now on.
    pub const fn set_literal_mode(&mut self, mode: LiteralMode) {
        self.literal_mode = mode;
    }

    /// Enables or disables pipelining.
    pub const fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Returns true if more than one command may be in flight.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Commands not written yet.
    #[must_use]
    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    /// Commands written and not completed.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Returns true if nothing is queued, in flight, or waiting to be written.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.in_flight.is_empty() && self.outbound.is_empty()
    }

    /// Returns true until the command's outcome was taken.
    #[must_use]
    pub fn is_pending(&self, handle: &CommandHandle) -> bool {
        self.finished.contains_key(&handle.tag)
            || self.queue.iter().any(|p| p.tag == handle.tag)
            || self
                .in_flight
                .iter()
                .any(|p| p.tag == handle.tag && !p.abandoned)
    }

    /// Stage of a command still on the wire.
    #[must_use]
    pub fn stage(&self, handle: &CommandHandle) -> Option<Stage> {
        self.queue
            .iter()
            .chain(&self.in_flight)
            .find(|p| p.tag == handle.tag)
            .map(|p| p.stage)
    }

    /// Returns true if untagged FETCH data now is the reply to a FETCH or
    /// STORE rather than news from the server.
    #[must_use]
    pub fn expects_fetch_data(&self) -> bool {
        self.in_flight.last().is_some_and(|p| p.solicits_fetch)
    }

    /// Assigns the next tag and encodes the command.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a command that would encode
    /// malformed (no tag is used up then), and [`Error::InvalidState`] once
    /// the tag counter is exhausted.
    pub fn enqueue(&mut self, command: &Command) -> Result<CommandHandle> {
        command.validate()?;
        let tag = self.tags.next()?;
        let segments = command.encode(&tag, self.literal_mode, self.literal_threshold);
        tracing::debug!(tag = %tag, command = %command.describe(), "queued");
        self.queue.push_back(Pending::new(tag.clone(), command, segments));
        Ok(CommandHandle { tag })
    }

    /// Returns the next bytes to write, if the pipeline allows any.
    pub fn poll_transmit(&mut self) -> Option<Transmit> {
        if let Some(transmit) = self.outbound.pop_front() {
            return Some(transmit);
        }
        if !self.can_send() {
            return None;
        }

        let mut pending = self.queue.pop_front()?;
        let data = pending.next_segment()?;
        tracing::debug!(tag = %pending.tag, command = %pending.summary, "sending");
        let transmit = Transmit::new(pending.tag.clone(), TransmitKind::Command, data);
        self.in_flight.push(pending);
        Some(transmit)
    }

    fn can_send(&self) -> bool {
        let Some(next) = self.queue.front() else {
            return false;
        };
        if self.in_flight.is_empty() {
            return true;
        }
        if !self.enabled || next.exclusive || self.in_flight.iter().any(Pending::blocks) {
            return false;
        }
        self.in_flight.len() < self.max_depth
    }

    /// Matches one server response against the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] for a tagged response nobody is waiting
    /// for or a continuation nothing asked for.
    pub fn handle_response(&mut self, response: Response) -> Result<Dispatch> {
        match response {
            Response::Tagged {
                tag,
                status,
                code,
                text,
            } => {
                let pos = self
                    .in_flight
                    .iter()
                    .position(|p| p.tag == tag)
                    .ok_or_else(|| Error::Protocol(format!("response for unknown tag {tag}")))?;
                if pos != 0 {
                    tracing::warn!(
                        tag = %tag,
                        expected = %self.in_flight[0].tag,
                        "completion arrived out of order"
                    );
                }
                let pending = self.in_flight.remove(pos);
                if pending.abandoned {
                    tracing::debug!(tag = %tag, "discarding completion of cancelled command");
                    self.forget_cancelled(&tag);
                    return Ok(Dispatch::Swallowed);
                }

                let outcome = if status == Status::Ok {
                    Ok(CommandResult {
                        status,
                        code,
                        text,
                        responses: pending.responses,
                    })
                } else {
                    Err(Error::Command { status, code, text })
                };
                self.finished.insert(tag.clone(), outcome);
                Ok(Dispatch::Completed(CommandHandle { tag }))
            }

            Response::Untagged(data) => match self.in_flight.last_mut() {
                Some(pending) => {
                    let handle = CommandHandle {
                        tag: pending.tag.clone(),
                    };
                    pending.responses.push(data);
                    Ok(Dispatch::Attributed(handle))
                }
                None => Ok(Dispatch::Unsolicited(data)),
            },

            Response::Continuation { text } => {
                let pending = self
                    .in_flight
                    .iter_mut()
                    .rev()
                    .find(|p| {
                        p.stage == Stage::AwaitingLiteral
                            || (p.stage == Stage::Sent && p.continuable)
                    })
                    .ok_or_else(|| Error::Protocol("unexpected continuation request".into()))?;

                if pending.stage == Stage::AwaitingLiteral {
                    if let Some(data) = pending.next_segment() {
                        self.outbound.push_back(Transmit::new(
                            pending.tag.clone(),
                            TransmitKind::Literal,
                            data,
                        ));
                    }
                    return Ok(Dispatch::LiteralReleased);
                }

                pending.stage = Stage::AwaitingPayload;
                Ok(Dispatch::Continuation {
                    handle: CommandHandle {
                        tag: pending.tag.clone(),
                    },
                    text,
                })
            }
        }
    }

    /// Answers a continuation request. `payload` is sent followed by CRLF.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the command is not waiting for a
    /// payload.
    pub fn continue_with(&mut self, handle: &CommandHandle, payload: &[u8]) -> Result<()> {
        let pending = self
            .in_flight
            .iter_mut()
            .find(|p| p.tag == handle.tag && p.stage == Stage::AwaitingPayload)
            .ok_or_else(|| {
                Error::InvalidState(format!("{} is not waiting for a continuation", handle.tag))
            })?;
        let mut data = Vec::with_capacity(payload.len() + 2);
        data.extend_from_slice(payload);
        data.extend_from_slice(b"\r\n");
        self.outbound
            .push_back(Transmit::new(pending.tag.clone(), TransmitKind::Payload, data));
        pending.stage = Stage::Sent;
        Ok(())
    }

    /// Abandons a command and resolves it with [`Error::Cancelled`].
    ///
    /// A queued command is dropped without being written. A command waiting
    /// for a continuation payload gets `*` instead. Otherwise the eventual
    /// completion is discarded when it arrives.
    ///
    /// The `Cancelled` outcome stays available to [`Self::take_result`]
    /// until the server's completion is discarded, and at most
    /// [`MAX_PIPELINE_DEPTH`] untaken cancellations are kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the command already completed.
    pub fn cancel(&mut self, handle: &CommandHandle) -> Result<()> {
        if let Some(pos) = self.queue.iter().position(|p| p.tag == handle.tag) {
            self.queue.remove(pos);
        } else {
            let pending = self
                .in_flight
                .iter_mut()
                .find(|p| p.tag == handle.tag && !p.abandoned)
                .ok_or_else(|| Error::InvalidState(format!("{} is not pending", handle.tag)))?;
            if pending.stage == Stage::AwaitingPayload {
                self.outbound.push_back(Transmit::new(
                    pending.tag.clone(),
                    TransmitKind::Cancel,
                    b"*\r\n".to_vec(),
                ));
                pending.stage = Stage::Sent;
            }
            pending.abandoned = true;
        }
        tracing::debug!(tag = %handle.tag, "cancelled");
        self.finished.insert(handle.tag.clone(), Err(Error::Cancelled));
        self.cancelled.push_back(handle.tag.clone());
        if self.cancelled.len() > MAX_PIPELINE_DEPTH
            && let Some(oldest) = self.cancelled.pop_front()
        {
            self.finished.remove(&oldest);
        }
        Ok(())
    }

    fn forget_cancelled(&mut self, tag: &Tag) {
        if let Some(pos) = self.cancelled.iter().position(|t| t == tag) {
            self.cancelled.remove(pos);
            self.finished.remove(tag);
        }
    }

    /// Forgets an in-flight command without resolving it. Its completion is
    /// discarded when it arrives.
    pub fn detach(&mut self, handle: &CommandHandle) {
        if let Some(pending) = self.in_flight.iter_mut().find(|p| p.tag == handle.tag) {
            pending.abandoned = true;
        }
    }

    /// Drains the untagged data collected so far for an in-flight command.
    pub fn take_responses(&mut self, handle: &CommandHandle) -> Vec<UntaggedResponse> {
        self.in_flight
            .iter_mut()
            .find(|p| p.tag == handle.tag)
            .map(|p| std::mem::take(&mut p.responses))
            .unwrap_or_default()
    }

    /// Takes the outcome of a completed command.
    pub fn take_result(&mut self, handle: &CommandHandle) -> Option<Result<CommandResult>> {
        let outcome = self.finished.remove(&handle.tag)?;
        self.cancelled.retain(|t| *t != handle.tag);
        Some(outcome)
    }

    /// Rejects every queued and in-flight command with
    /// [`Error::ConnectionLost`].
    pub fn fail_all(&mut self, reason: &str) {
        let failed: Vec<Tag> = self
            .queue
            .drain(..)
            .chain(self.in_flight.drain(..).filter(|p| !p.abandoned))
            .map(|p| p.tag)
            .collect();
        if !failed.is_empty() {
            tracing::warn!(count = failed.len(), reason, "failing pending commands");
        }
        for tag in failed {
            self.finished
                .insert(tag, Err(Error::ConnectionLost(reason.to_string())));
        }
        self.outbound.clear();
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::parser::ResponseParser;
    use crate::types::{Mailbox, ResponseCode};

    fn respond(pipeline: &mut Pipeline, line: &[u8]) -> Dispatch {
        pipeline
            .handle_response(ResponseParser::parse(line).unwrap())
            .unwrap()
    }

    fn drain(pipeline: &mut Pipeline) -> Vec<Vec<u8>> {
        std::iter::from_fn(|| pipeline.poll_transmit())
            .map(|t| t.data)
            .collect()
    }

    fn create(name: &str) -> Command {
        Command::Create {
            mailbox: Mailbox::new(name),
        }
    }

    #[test]
    fn config_clamps_depth() {
        assert_eq!(PipelineConfig::new().max_depth(100).max_depth, MAX_PIPELINE_DEPTH);
        assert_eq!(PipelineConfig::new().max_depth(0).max_depth, 1);
        assert_eq!(PipelineConfig::default().max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn one_at_a_time_without_pipelining() {
        let mut pipeline = Pipeline::default();
        let a = pipeline.enqueue(&Command::Noop).unwrap();
        pipeline.enqueue(&Command::Noop).unwrap();

        assert_eq!(drain(&mut pipeline), vec![b"A0001 NOOP\r\n".to_vec()]);
        assert_eq!(respond(&mut pipeline, b"A0001 OK\r\n"), Dispatch::Completed(a));
        assert_eq!(drain(&mut pipeline), vec![b"A0002 NOOP\r\n".to_vec()]);
    }

    #[test]
    fn depth_limit_with_pipelining() {
        let mut pipeline = Pipeline::new(PipelineConfig::new().enabled(true).max_depth(2));
        for _ in 0..3 {
            pipeline.enqueue(&Command::Noop).unwrap();
        }
        assert_eq!(drain(&mut pipeline).len(), 2);
        assert_eq!(pipeline.in_flight_count(), 2);
        respond(&mut pipeline, b"A0002 OK\r\n");
        assert_eq!(drain(&mut pipeline), vec![b"A0003 NOOP\r\n".to_vec()]);
    }

    #[test]
    fn exclusive_commands_go_alone() {
        let mut pipeline = Pipeline::new(PipelineConfig::new().enabled(true));
        pipeline.enqueue(&Command::Noop).unwrap();
        pipeline.enqueue(&Command::Select { mailbox: Mailbox::inbox() }).unwrap();
        pipeline.enqueue(&Command::Noop).unwrap();

        assert_eq!(drain(&mut pipeline).len(), 1);
        respond(&mut pipeline, b"A0001 OK\r\n");
        assert_eq!(drain(&mut pipeline), vec![b"A0002 SELECT INBOX\r\n".to_vec()]);
        respond(&mut pipeline, b"A0002 OK [READ-WRITE] done\r\n");
        assert_eq!(drain(&mut pipeline), vec![b"A0003 NOOP\r\n".to_vec()]);
    }

    #[test]
    fn completions_matched_by_tag() {
        let mut pipeline = Pipeline::new(PipelineConfig::new().enabled(true));
        let a = pipeline.enqueue(&Command::Noop).unwrap();
        let b = pipeline.enqueue(&Command::Noop).unwrap();
        drain(&mut pipeline);

        assert_eq!(respond(&mut pipeline, b"A0002 OK b\r\n"), Dispatch::Completed(b.clone()));
        assert_eq!(pipeline.take_result(&b).unwrap().unwrap().text, "b");
        assert!(pipeline.take_result(&a).is_none());
        respond(&mut pipeline, b"A0001 OK a\r\n");
        assert_eq!(pipeline.take_result(&a).unwrap().unwrap().text, "a");
    }

    #[test]
    fn no_rejects_only_that_command() {
        let mut pipeline = Pipeline::new(PipelineConfig::new().enabled(true));
        let a = pipeline.enqueue(&Command::Noop).unwrap();
        let b = pipeline.enqueue(&Command::Noop).unwrap();
        drain(&mut pipeline);

        respond(&mut pipeline, b"A0001 NO [ALREADYEXISTS] Mailbox exists\r\n");
        match pipeline.take_result(&a).unwrap() {
            Err(Error::Command { status, code, text }) => {
                assert_eq!(status, Status::No);
                assert_eq!(code, Some(ResponseCode::AlreadyExists));
                assert_eq!(text, "Mailbox exists");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(pipeline.is_pending(&b));
    }

    #[test]
    fn untagged_goes_to_latest_command() {
        let mut pipeline = Pipeline::new(PipelineConfig::new().enabled(true));
        assert!(matches!(
            respond(&mut pipeline, b"* 3 EXISTS\r\n"),
            Dispatch::Unsolicited(UntaggedResponse::Exists(3))
        ));

        pipeline.enqueue(&Command::Noop).unwrap();
        let b = pipeline
            .enqueue(&Command::List {
                reference: String::new(),
                pattern: "*".into(),
            })
            .unwrap();
        drain(&mut pipeline);

        assert_eq!(
            respond(&mut pipeline, b"* LIST () \"/\" INBOX\r\n"),
            Dispatch::Attributed(b.clone())
        );
        respond(&mut pipeline, b"A0002 OK\r\n");
        assert_eq!(pipeline.take_result(&b).unwrap().unwrap().responses.len(), 1);
    }

    #[test]
    fn synchronizing_literal_waits_for_continuation() {
        let mut pipeline = Pipeline::new(PipelineConfig::new().enabled(true));
        let h = pipeline.enqueue(&create("a\r\nb")).unwrap();
        pipeline.enqueue(&Command::Noop).unwrap();

        assert_eq!(drain(&mut pipeline), vec![b"A0001 CREATE {4}\r\n".to_vec()]);
        assert_eq!(pipeline.stage(&h), Some(Stage::AwaitingLiteral));
        assert_eq!(respond(&mut pipeline, b"+ go ahead\r\n"), Dispatch::LiteralReleased);
        let out = drain(&mut pipeline);
        assert_eq!(out[0], b"a\r\nb\r\n".to_vec());
        assert_eq!(out.len(), 1, "CREATE is written alone");
    }

    #[test]
    fn literal_plus_needs_no_continuation() {
        let mut pipeline = Pipeline::default();
        pipeline.set_literal_mode(LiteralMode::Plus);
        let h = pipeline.enqueue(&create("a\r\nb")).unwrap();
        assert_eq!(drain(&mut pipeline), vec![b"A0001 CREATE {4+}\r\na\r\nb\r\n".to_vec()]);
        assert_eq!(pipeline.stage(&h), Some(Stage::Sent));
    }

    #[test]
    fn authenticate_continuation_and_payload() {
        let mut pipeline = Pipeline::default();
        let h = pipeline
            .enqueue(&Command::Authenticate {
                mechanism: "PLAIN".into(),
                initial_response: None,
            })
            .unwrap();
        drain(&mut pipeline);

        assert_eq!(
            respond(&mut pipeline, b"+ \r\n"),
            Dispatch::Continuation {
                handle: h.clone(),
                text: String::new()
            }
        );
        pipeline.continue_with(&h, b"AHVzZXIAcGFzcw==").unwrap();
        let out = pipeline.poll_transmit().unwrap();
        assert_eq!(out.kind, TransmitKind::Payload);
        assert_eq!(out.data, b"AHVzZXIAcGFzcw==\r\n");
        assert!(pipeline.continue_with(&h, b"again").is_err());
    }

    #[test]
    fn cancel_at_continuation_sends_star() {
        let mut pipeline = Pipeline::default();
        let h = pipeline
            .enqueue(&Command::Authenticate {
                mechanism: "XOAUTH2".into(),
                initial_response: None,
            })
            .unwrap();
        drain(&mut pipeline);
        respond(&mut pipeline, b"+ \r\n");

        pipeline.cancel(&h).unwrap();
        assert_eq!(drain(&mut pipeline), vec![b"*\r\n".to_vec()]);
        assert!(matches!(pipeline.take_result(&h), Some(Err(Error::Cancelled))));
        assert_eq!(
            respond(&mut pipeline, b"A0001 BAD aborted\r\n"),
            Dispatch::Swallowed
        );
        assert!(pipeline.is_idle());
    }

    #[test]
    fn cancel_queued_never_sends() {
        let mut pipeline = Pipeline::default();
        pipeline.enqueue(&Command::Noop).unwrap();
        let b = pipeline.enqueue(&Command::Noop).unwrap();
        drain(&mut pipeline);

        pipeline.cancel(&b).unwrap();
        respond(&mut pipeline, b"A0001 OK\r\n");
        assert!(drain(&mut pipeline).is_empty());
        assert!(matches!(pipeline.take_result(&b), Some(Err(Error::Cancelled))));
        assert!(pipeline.cancel(&b).is_err());
    }

    #[test]
    fn cancelled_outcome_dropped_with_completion() {
        let mut pipeline = Pipeline::default();
        let h = pipeline.enqueue(&Command::Noop).unwrap();
        drain(&mut pipeline);

        pipeline.cancel(&h).unwrap();
        assert!(pipeline.is_pending(&h));
        assert_eq!(respond(&mut pipeline, b"A0001 OK\r\n"), Dispatch::Swallowed);
        assert!(pipeline.finished.is_empty());
        assert!(pipeline.cancelled.is_empty());
        assert!(pipeline.take_result(&h).is_none());
    }

    #[test]
    fn untaken_cancellations_are_bounded() {
        let mut pipeline = Pipeline::default();
        pipeline.enqueue(&Command::Noop).unwrap();
        drain(&mut pipeline);
        let queued: Vec<_> = (0..40)
            .map(|_| pipeline.enqueue(&Command::Noop).unwrap())
            .collect();
        for h in &queued {
            pipeline.cancel(h).unwrap();
        }
        assert_eq!(pipeline.finished.len(), MAX_PIPELINE_DEPTH);
        assert!(pipeline.take_result(&queued[0]).is_none());
        assert!(matches!(pipeline.take_result(&queued[39]), Some(Err(Error::Cancelled))));
        assert_eq!(pipeline.cancelled.len(), MAX_PIPELINE_DEPTH - 1);
    }

    #[test]
    fn empty_set_is_never_queued() {
        let mut pipeline = Pipeline::default();
        let fetch = Command::Fetch {
            set: crate::types::SequenceSet::empty().into(),
            items: crate::command::FetchItems::Fast,
        };
        assert!(matches!(pipeline.enqueue(&fetch), Err(Error::InvalidArgument(_))));
        assert!(pipeline.is_idle());
        pipeline.enqueue(&Command::Noop).unwrap();
        assert_eq!(drain(&mut pipeline), vec![b"A0001 NOOP\r\n".to_vec()]);
    }

    #[test]
    fn fail_all_rejects_everything() {
        let mut pipeline = Pipeline::default();
        let a = pipeline.enqueue(&Command::Noop).unwrap();
        let b = pipeline.enqueue(&Command::Noop).unwrap();
        drain(&mut pipeline);

        pipeline.fail_all("connection reset");
        for h in [&a, &b] {
            assert!(matches!(pipeline.take_result(h), Some(Err(Error::ConnectionLost(_)))));
        }
        assert!(pipeline.is_idle());
    }

    #[test]
    fn unknown_tag_and_stray_continuation_are_protocol_errors() {
        let mut pipeline = Pipeline::default();
        let tagged = ResponseParser::parse(b"Z9 OK\r\n").unwrap();
        assert!(matches!(pipeline.handle_response(tagged), Err(Error::Protocol(_))));
        let cont = ResponseParser::parse(b"+ hi\r\n").unwrap();
        assert!(matches!(pipeline.handle_response(cont), Err(Error::Protocol(_))));
    }

    #[test]
    fn fetch_context() {
        let mut pipeline = Pipeline::default();
        assert!(!pipeline.expects_fetch_data());
        pipeline
            .enqueue(&Command::Fetch {
                set: crate::types::SequenceSet::all().into(),
                items: crate::command::FetchItems::Fast,
            })
            .unwrap();
        drain(&mut pipeline);
        assert!(pipeline.expects_fetch_data());
        respond(&mut pipeline, b"A0001 OK\r\n");
        assert!(!pipeline.expects_fetch_data());
    }

    #[test]
    fn detached_completion_is_swallowed() {
        let mut pipeline = Pipeline::default();
        let h = pipeline.enqueue(&Command::Idle).unwrap();
        drain(&mut pipeline);
        respond(&mut pipeline, b"+ idling\r\n");
        pipeline.continue_with(&h, b"DONE").unwrap();
        pipeline.detach(&h);
        assert!(!pipeline.is_pending(&h));
        assert_eq!(drain(&mut pipeline), vec![b"DONE\r\n".to_vec()]);
        assert_eq!(respond(&mut pipeline, b"A0001 OK done\r\n"), Dispatch::Swallowed);
    }

    #[test]
    fn capabilities_from_completion() {
        let mut pipeline = Pipeline::default();
        let h = pipeline
            .enqueue(&Command::Login {
                username: "u".into(),
                password: "p".into(),
            })
            .unwrap();
        drain(&mut pipeline);
        respond(&mut pipeline, b"A0001 OK [CAPABILITY IMAP4rev1 IDLE] logged in\r\n");
        let result = pipeline.take_result(&h).unwrap().unwrap();
        assert_eq!(result.capabilities().map(<[_]>::len), Some(2));
    }
}
