//! Reasoning/answer channel splitter
//!
//! Consumes raw model fragments and labels every byte as reasoning or
//! answer. Delimiters may arrive split across any number of fragments.
//!
//! ```text
//!            start              end
//! OUTSIDE ─────────▶ INSIDE_THINK ─────▶ OUTSIDE (post-think, no more scanning)
//!    │                    │                  │
//!    └──── finish ────────┴──── finish ──────┴──▶ DONE
//!    └──── fail ──────────┴──── fail ────────┴──▶ FAILED
//! ```
//!
//! Text before the first start delimiter is answer text.

use graphqa_common::errors::ErrorCode;
use graphqa_common::metrics::record_malformed_stream;
use graphqa_common::models::{StreamErrorKind, StreamEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitterState {
    Outside,
    InsideThink,
    Done,
    Failed,
}

#[derive(Debug)]
pub struct ThinkTagSplitter {
    start: String,
    end: String,
    state: SplitterState,
    think_closed: bool,
    /// Unemitted tail that may still be the beginning of a delimiter
    pending: String,
}

impl ThinkTagSplitter {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            state: SplitterState::Outside,
            think_closed: false,
            pending: String::new(),
        }
    }

    pub fn state(&self) -> SplitterState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, SplitterState::Done | SplitterState::Failed)
    }

    /// Feed one fragment. Returns the chunks that are now certain.
    pub fn push(&mut self, fragment: &str) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.is_terminal() {
            return events;
        }
        self.pending.push_str(fragment);

        loop {
            match self.state {
                SplitterState::Outside if self.think_closed => {
                    let text = std::mem::take(&mut self.pending);
                    emit(&mut events, StreamEvent::answer(text));
                    break;
                }
                SplitterState::Outside => match self.pending.find(&self.start) {
                    Some(pos) => {
                        let rest = self.pending.split_off(pos + self.start.len());
                        self.pending.truncate(pos);
                        let before = std::mem::replace(&mut self.pending, rest);
                        emit(&mut events, StreamEvent::answer(before));
                        self.state = SplitterState::InsideThink;
                    }
                    None => {
                        let safe = self.release_point(&self.start);
                        let held = self.pending.split_off(safe);
                        let text = std::mem::replace(&mut self.pending, held);
                        emit(&mut events, StreamEvent::answer(text));
                        break;
                    }
                },
                SplitterState::InsideThink => match self.pending.find(&self.end) {
                    Some(pos) => {
                        let rest = self.pending.split_off(pos + self.end.len());
                        self.pending.truncate(pos);
                        let reasoning = std::mem::replace(&mut self.pending, rest);
                        emit(&mut events, StreamEvent::reasoning(reasoning));
                        self.state = SplitterState::Outside;
                        self.think_closed = true;
                    }
                    None => {
                        let safe = self.release_point(&self.end);
                        let held = self.pending.split_off(safe);
                        let text = std::mem::replace(&mut self.pending, held);
                        emit(&mut events, StreamEvent::reasoning(text));
                        break;
                    }
                },
                SplitterState::Done | SplitterState::Failed => break,
            }
        }

        events
    }

    /// The model finished normally. Flushes held text, then `Done`.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.is_terminal() {
            return events;
        }

        if self.state == SplitterState::InsideThink {
            tracing::warn!(
                code = ?ErrorCode::MalformedStream,
                "Stream ended inside the reasoning section"
            );
            record_malformed_stream();
        }

        self.flush(&mut events);
        self.state = SplitterState::Done;
        events.push(StreamEvent::Done);
        events
    }

    /// The model call failed. Flushes held text, then a terminal `Error`.
    pub fn fail(&mut self, kind: StreamErrorKind, message: impl Into<String>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.is_terminal() {
            return events;
        }

        self.flush(&mut events);
        self.state = SplitterState::Failed;
        events.push(StreamEvent::Error {
            kind,
            message: message.into(),
        });
        events
    }

    /// Emit whatever is held on the current channel
    fn flush(&mut self, events: &mut Vec<StreamEvent>) {
        let text = std::mem::take(&mut self.pending);
        match self.state {
            SplitterState::InsideThink => emit(events, StreamEvent::reasoning(text)),
            _ => emit(events, StreamEvent::answer(text)),
        }
    }

    /// Byte offset up to which `pending` cannot be part of `delimiter`.
    ///
    /// Everything after it is the longest suffix that is a proper prefix
    /// of the delimiter.
    fn release_point(&self, delimiter: &str) -> usize {
        let longest = delimiter.len().saturating_sub(1).min(self.pending.len());
        (1..=longest)
            .rev()
            .filter(|&n| delimiter.is_char_boundary(n))
            .find(|&n| self.pending.ends_with(&delimiter[..n]))
            .map(|n| self.pending.len() - n)
            .unwrap_or(self.pending.len())
    }
}

fn emit(events: &mut Vec<StreamEvent>, event: StreamEvent) {
    match &event {
        StreamEvent::AnswerChunk { text } | StreamEvent::ReasoningChunk { text } if text.is_empty() => {}
        _ => events.push(event),
    }
}
