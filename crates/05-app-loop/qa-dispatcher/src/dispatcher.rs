//! Controller-side state machine for one exchange at a time.
//!
//! ```text
//! Idle --begin--> AwaitingOperatorInput --confirm--> Done --reset--> Idle
//! ```
//!
//! `confirm` claims the buffer, writes the answer and notifies the signal
//! slot exactly once. The question is read under a short-lived claim so the
//! worker can still withdraw it while the operator deliberates. There is no
//! cancel transition; a caller that gives up must abort the exchange on the
//! buffer so the worker is released.

use qa_abi::{Answer, Problem, ProblemError, Question};
use qa_codec::{CodecError, MessageCodec};
use qa_transport::{SharedBuffer, TransportError};
use thiserror::Error;

use crate::prompt::Prompt;

pub type DispatchResult<T> = Result<T, DispatchError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    AwaitingOperatorInput,
    Done,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("cannot {op} while {state:?}")]
    InvalidState {
        op: &'static str,
        state: DispatchState,
    },

    #[error("refusing to render question: {0}")]
    Problem(#[from] ProblemError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug)]
pub struct Dispatcher {
    buffer: SharedBuffer,
    codec: MessageCodec,
    state: DispatchState,
    prompt: Option<Prompt>,
}

impl Dispatcher {
    pub fn new(buffer: SharedBuffer, codec: MessageCodec) -> Self {
        Self {
            buffer,
            codec,
            state: DispatchState::Idle,
            prompt: None,
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn buffer(&self) -> &SharedBuffer {
        &self.buffer
    }

    /// Opens a prompt for `question`.
    pub fn begin(&mut self, question: &Question) -> DispatchResult<&mut Prompt> {
        if self.state != DispatchState::Idle {
            return Err(DispatchError::InvalidState {
                op: "begin",
                state: self.state,
            });
        }
        tracing::trace!(id = %question.id, kind = ?question.kind.tag(), "rendering prompt");
        self.state = DispatchState::AwaitingOperatorInput;
        Ok(self.prompt.insert(Prompt::for_question(question)))
    }

    /// Opens a prompt for the question currently in the shared buffer.
    ///
    /// Unknown question types are refused and the state stays `Idle`.
    pub fn begin_from_buffer(&mut self) -> DispatchResult<&mut Prompt> {
        let problem: Problem = {
            let claim = self.buffer.read_question()?;
            self.codec.decode(claim.bytes())?
        };
        let question = Question::try_from(problem)?;
        self.begin(&question)
    }

    /// The open prompt, if any.
    pub fn prompt(&mut self) -> Option<&mut Prompt> {
        match self.state {
            DispatchState::AwaitingOperatorInput => self.prompt.as_mut(),
            _ => None,
        }
    }

    /// Writes the operator's answer and wakes the worker.
    ///
    /// An answer that fails validation keeps the prompt open. A codec failure
    /// after the buffer was claimed aborts the exchange instead: the dropped
    /// draft marks it aborted and wakes the worker.
    pub fn confirm(&mut self) -> DispatchResult<Answer> {
        let prompt = match (self.state, self.prompt.as_ref()) {
            (DispatchState::AwaitingOperatorInput, Some(prompt)) => prompt,
            _ => {
                return Err(DispatchError::InvalidState {
                    op: "confirm",
                    state: self.state,
                })
            }
        };
        let answer = Answer::new(prompt.question().clone(), prompt.answer_value())?;

        let mut draft = self.buffer.post_answer()?;
        if let Err(err) = self.codec.encode(&mut draft.bytes_mut(), &answer) {
            drop(draft);
            self.state = DispatchState::Done;
            self.prompt = None;
            return Err(err.into());
        }
        let woken = draft.publish();
        tracing::trace!(id = %answer.question().id, woken, "answer posted");

        self.state = DispatchState::Done;
        self.prompt = None;
        Ok(answer)
    }

    /// Returns to `Idle`, dropping any open prompt.
    pub fn reset(&mut self) {
        self.state = DispatchState::Idle;
        self.prompt = None;
    }
}
