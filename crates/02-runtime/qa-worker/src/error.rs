use std::time::Duration;

use qa_abi::ProblemError;
use qa_codec::CodecError;
use qa_transport::TransportError;
use thiserror::Error;

use crate::memory::MemoryError;

pub type HostResult<T> = Result<T, HostError>;

/// Return codes of the host-callable `ask_question`. Zero and above is a byte count.
pub const ERR_NO_CHANNEL: i32 = -1;
pub const ERR_TIMED_OUT: i32 = -2;
pub const ERR_ABORTED: i32 = -3;
pub const ERR_CONTROLLER_GONE: i32 = -4;
pub const ERR_ANSWER_MISMATCH: i32 = -5;
pub const ERR_ANSWER_TOO_LARGE: i32 = -6;
pub const ERR_GUEST_MEMORY: i32 = -7;
pub const ERR_BAD_QUESTION: i32 = -8;
pub const ERR_CODEC: i32 = -9;
pub const ERR_TRANSPORT: i32 = -10;
pub const ERR_UNEXPECTED_SIGNAL: i32 = -11;
pub const ERR_UNKNOWN: i32 = -100;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("no shared buffer configured; interactive questions are disabled")]
    NoSharedBufferConfigured,

    #[error("operator did not respond in time ({timeout:?})")]
    WaitTimedOut { timeout: Duration },

    #[error("the controller aborted the outstanding question")]
    ExchangeAborted,

    #[error("the controller is no longer listening")]
    ControllerGone,

    #[error("answer for {found:?} does not match question {expected:?}")]
    AnswerMismatch { expected: String, found: String },

    #[error("encoded answer of {len} bytes exceeds the {capacity} byte answer buffer")]
    AnswerTooLarge { len: usize, capacity: usize },

    #[error("signal slot changed to {value} while waiting")]
    UnexpectedSignal { value: i32 },

    #[error("ask_question failed with code {code}")]
    Failed { code: i32 },

    #[error(transparent)]
    GuestMemory(#[from] MemoryError),

    #[error(transparent)]
    Problem(#[from] ProblemError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl HostError {
    /// Negative code handed back across the host-callable boundary.
    pub fn code(&self) -> i32 {
        match self {
            HostError::NoSharedBufferConfigured => ERR_NO_CHANNEL,
            HostError::WaitTimedOut { .. } => ERR_TIMED_OUT,
            HostError::ExchangeAborted => ERR_ABORTED,
            HostError::ControllerGone => ERR_CONTROLLER_GONE,
            HostError::AnswerMismatch { .. } => ERR_ANSWER_MISMATCH,
            HostError::AnswerTooLarge { .. } => ERR_ANSWER_TOO_LARGE,
            HostError::UnexpectedSignal { .. } => ERR_UNEXPECTED_SIGNAL,
            HostError::Failed { code } => *code,
            HostError::GuestMemory(_) => ERR_GUEST_MEMORY,
            HostError::Problem(_) => ERR_BAD_QUESTION,
            HostError::Codec(_) => ERR_CODEC,
            HostError::Transport(_) => ERR_TRANSPORT,
        }
    }

    /// True when only the current question is broken and the channel itself
    /// is still usable.
    pub fn is_question_scoped(&self) -> bool {
        matches!(
            self,
            HostError::Problem(_)
                | HostError::AnswerMismatch { .. }
                | HostError::AnswerTooLarge { .. }
                | HostError::GuestMemory(_)
                | HostError::Codec(CodecError::PayloadTooLarge { .. })
        )
    }
}
