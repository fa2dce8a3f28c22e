//! Error surface for the shared-memory transport.
//!
//! The transport layer keeps its errors small: allocation and layout
//! validation, out-of-range slot/payload access, and violations of the
//! one-exchange-at-a-time discipline.

use thiserror::Error;

use crate::shared_buffer::ExchangePhase;

/// Convenience result alias for fallible transport operations.
pub type TransportResult<T, E = TransportError> = Result<T, E>;

/// Errors surfaced by low-level transport helpers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Requested buffer length cannot hold the control region plus one payload byte.
    #[error("shared buffer length {requested} must be at least {minimum} bytes")]
    InvalidLength { requested: usize, minimum: usize },

    /// Allocation of a shared region failed for the given size/alignment pair.
    #[error("failed to allocate shared region of {size} bytes aligned to {alignment}")]
    AllocationFailed { size: usize, alignment: usize },

    /// Control slot index outside the control region.
    #[error("control slot {slot} is out of range")]
    InvalidSlot { slot: usize },

    /// Payload access would run past the end of the payload region.
    #[error("payload of {len} bytes exceeds the {capacity} byte payload region")]
    PayloadOutOfBounds { len: usize, capacity: usize },

    /// A question is already outstanding on this buffer.
    #[error("another exchange is still outstanding (phase {phase:?})")]
    ExchangeInFlight { phase: ExchangePhase },

    /// An answer was posted while no question was outstanding.
    #[error("no question is awaiting an answer (phase {phase:?})")]
    NoPendingQuestion { phase: ExchangePhase },

    /// The worker tried to collect an answer that was never posted.
    #[error("no answer is waiting to be collected (phase {phase:?})")]
    NoAnswerPosted { phase: ExchangePhase },

    /// A blocking wait was attempted on the thread that owns the buffer.
    #[error("blocking wait attempted on the controller thread")]
    WaitOnControllerThread,

    /// The platform cannot provide shared memory plus blocking wait.
    #[error("interactive exchange unavailable: {0}")]
    CapabilityUnavailable(&'static str),
}
