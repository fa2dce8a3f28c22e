//! Shared-memory transport for synchronous question/answer exchanges.
//!
//! This crate exposes the low-level pieces both threads agree on:
//! * [`SharedBuffer`] – fixed-size memory with a control region of atomic
//!   slots and a payload region. The payload is only reachable through the
//!   exchange claims ([`QuestionDraft`], [`QuestionRead`], [`AnswerDraft`],
//!   [`AnswerRead`]) that own the current phase.
//! * [`wait`] – the worker-side blocking wait and the controller-side notify.
//! * [`Capabilities`] – the one-shot platform gate for interactive mode.
//! * [`TransportError`] – allocation, layout, and exchange-discipline failures.

mod capability;
mod error;
mod region;
mod shared_buffer;
pub mod wait;

pub use capability::Capabilities;
pub use error::{TransportError, TransportResult};
pub use shared_buffer::{
    AnswerDraft, AnswerRead, ByteView, ByteViewMut, ExchangePhase, IntView, QuestionDraft,
    QuestionRead, SharedBuffer, CONTROL_SLOTS, DEFAULT_BUFFER_LEN, HEADER_LEN, LENGTH_SLOT,
    SIGNAL_SLOT,
};
pub use wait::WaitResult;
