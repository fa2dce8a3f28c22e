//! Fixed-size shared synchronization buffer for question/answer exchanges.
//!
//! The buffer is one contiguous region split into a control region of two
//! 32-bit atomic slots and a payload region:
//!
//! ```text
//! 0        4        8                                   len
//! +--------+--------+-----------------------------------+
//! | slot 0 | slot 1 | payload bytes                     |
//! | signal | length |                                   |
//! +--------+--------+-----------------------------------+
//! ```
//!
//! Slot 0 is the wait/notify cell and stays at its initial value; only a
//! notify wakes the waiter. Slot 1 holds the byte length of the most recent
//! message. [`IntView`] covers the atomic control slots and is always
//! available. The payload is reached only through [`ByteView`] and
//! [`ByteViewMut`], which are handed out by exchange claims.
//!
//! At most one message lives in the buffer at a time. The exchange phase
//! (kept beside the region, not inside the wire layout) decides who may touch
//! the payload:
//!
//! ```text
//! Idle -> Asking -> QuestionPosted -> Answering -> AnswerPosted -> Collecting -> Idle
//!  (worker writes)      |    ^           | (controller writes)     (worker reads)
//!                       v    |           v
//!                      Reading        Aborted -> Idle
//!                 (controller reads)
//! ```
//!
//! Each claim moves the phase into a state only its holder can leave, so a
//! payload write never overlaps another access.

use std::sync::atomic::{AtomicI32, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use crate::region::SharedRegion;
use crate::wait::{self, Doorbell};
use crate::{TransportError, TransportResult};

/// Length observed for the buffer in the deployed system.
pub const DEFAULT_BUFFER_LEN: usize = 65_536;
/// Number of 32-bit control slots at the head of the buffer.
pub const CONTROL_SLOTS: usize = 2;
/// Bytes occupied by the control region.
pub const HEADER_LEN: usize = CONTROL_SLOTS * std::mem::size_of::<i32>();
/// Wait/notify synchronization cell.
pub const SIGNAL_SLOT: usize = 0;
/// Payload length of the most recently written message.
pub const LENGTH_SLOT: usize = 1;

const REGION_ALIGNMENT: usize = 64;

/// Phase of the exchange currently occupying the buffer.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangePhase {
    /// No exchange in progress; the worker may claim the buffer.
    Idle = 0,
    /// The worker is writing a question.
    Asking = 1,
    /// A question is published and the worker is (or will be) blocked.
    QuestionPosted = 2,
    /// The controller is copying the question out.
    Reading = 3,
    /// The controller is writing the answer.
    Answering = 4,
    /// An answer is published and the worker has been notified.
    AnswerPosted = 5,
    /// The worker is copying the answer out.
    Collecting = 6,
    /// The controller gave up on the outstanding question.
    Aborted = 7,
}

impl ExchangePhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ExchangePhase::Asking,
            2 => ExchangePhase::QuestionPosted,
            3 => ExchangePhase::Reading,
            4 => ExchangePhase::Answering,
            5 => ExchangePhase::AnswerPosted,
            6 => ExchangePhase::Collecting,
            7 => ExchangePhase::Aborted,
            _ => ExchangePhase::Idle,
        }
    }
}

struct Inner {
    region: SharedRegion,
    doorbells: [Doorbell; CONTROL_SLOTS],
    phase: AtomicU8,
    controller: ThreadId,
}

/// Handle to a shared synchronization buffer. Clones alias the same memory.
#[derive(Clone)]
pub struct SharedBuffer {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("len", &self.len())
            .field("phase", &self.phase())
            .finish()
    }
}

impl SharedBuffer {
    /// Allocates a zeroed buffer of `len` bytes.
    ///
    /// The calling thread is recorded as the controller thread; blocking
    /// waits on this buffer are refused there.
    pub fn new(len: usize) -> TransportResult<Self> {
        let minimum = HEADER_LEN + 1;
        if len < minimum || len > i32::MAX as usize {
            return Err(TransportError::InvalidLength {
                requested: len,
                minimum,
            });
        }
        let region = SharedRegion::new_zeroed(len, REGION_ALIGNMENT)?;
        tracing::debug!(len, "allocated shared buffer");
        Ok(Self {
            inner: Arc::new(Inner {
                region,
                doorbells: [Doorbell::new(), Doorbell::new()],
                phase: AtomicU8::new(ExchangePhase::Idle as u8),
                controller: thread::current().id(),
            }),
        })
    }

    /// Total length of the buffer, control region included.
    pub fn len(&self) -> usize {
        self.inner.region.len()
    }

    /// Always false; a buffer holds at least the control region and one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Largest message the payload region can hold.
    pub fn payload_capacity(&self) -> usize {
        self.len() - HEADER_LEN
    }

    /// Signed 32-bit view over the control slots.
    pub fn int_view(&self) -> IntView<'_> {
        IntView { buffer: self }
    }

    /// Returns true when both handles alias the same memory.
    pub fn same_buffer(&self, other: &SharedBuffer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Current exchange phase.
    pub fn phase(&self) -> ExchangePhase {
        ExchangePhase::from_u8(self.inner.phase.load(Ordering::Acquire))
    }

    /// Claims the idle buffer so the worker can write a question.
    ///
    /// Dropping the draft unpublished returns the buffer to idle.
    pub fn begin_question(&self) -> TransportResult<QuestionDraft<'_>> {
        self.transition(ExchangePhase::Idle, ExchangePhase::Asking)
            .map_err(|phase| TransportError::ExchangeInFlight { phase })?;
        // Wakeups banked by a previous exchange must not satisfy this one.
        self.inner.doorbells[SIGNAL_SLOT].clear();
        Ok(QuestionDraft {
            claim: Claim::new(self, ExchangePhase::Asking, ExchangePhase::Idle),
        })
    }

    /// Claims the published question for reading. Dropping the claim
    /// republishes it untouched.
    pub fn read_question(&self) -> TransportResult<QuestionRead<'_>> {
        self.transition(ExchangePhase::QuestionPosted, ExchangePhase::Reading)
            .map_err(|phase| TransportError::NoPendingQuestion { phase })?;
        Ok(QuestionRead {
            claim: Claim::new(self, ExchangePhase::Reading, ExchangePhase::QuestionPosted),
        })
    }

    /// Claims the buffer for the answer to the outstanding question.
    ///
    /// Dropping the draft unpublished aborts the exchange.
    pub fn post_answer(&self) -> TransportResult<AnswerDraft<'_>> {
        self.transition(ExchangePhase::QuestionPosted, ExchangePhase::Answering)
            .map_err(|phase| TransportError::NoPendingQuestion { phase })?;
        Ok(AnswerDraft {
            claim: Claim::new(self, ExchangePhase::Answering, ExchangePhase::Aborted),
        })
    }

    /// Claims the posted answer for reading. Dropping the claim ends the exchange.
    pub fn collect_answer(&self) -> TransportResult<AnswerRead<'_>> {
        self.transition(ExchangePhase::AnswerPosted, ExchangePhase::Collecting)
            .map_err(|phase| TransportError::NoAnswerPosted { phase })?;
        Ok(AnswerRead {
            claim: Claim::new(self, ExchangePhase::Collecting, ExchangePhase::Idle),
        })
    }

    /// Withdraws an unanswered question, e.g. after a timed-out wait.
    ///
    /// A controller copying the question out is waited for. Returns false when
    /// the controller already claimed the buffer for an answer or aborted it;
    /// the caller must then consume that outcome.
    pub fn withdraw_question(&self) -> bool {
        loop {
            match self.transition(ExchangePhase::QuestionPosted, ExchangePhase::Idle) {
                Ok(()) => return true,
                Err(ExchangePhase::Reading) => thread::yield_now(),
                Err(_) => return false,
            }
        }
    }

    /// Marks a published, unclaimed question as aborted and wakes the worker.
    ///
    /// Returns false when no such question is outstanding.
    pub fn abort_exchange(&self) -> bool {
        if self
            .transition(ExchangePhase::QuestionPosted, ExchangePhase::Aborted)
            .is_err()
        {
            return false;
        }
        tracing::debug!("aborted outstanding exchange");
        self.ring();
        true
    }

    /// Acknowledges an aborted or uncollected answered exchange, returning the
    /// buffer to idle. Reports the phase observed; any other phase is left as is.
    pub fn finish_exchange(&self) -> ExchangePhase {
        let mut current = self.inner.phase.load(Ordering::Acquire);
        loop {
            match ExchangePhase::from_u8(current) {
                ExchangePhase::Aborted | ExchangePhase::AnswerPosted => {}
                other => return other,
            }
            match self.inner.phase.compare_exchange(
                current,
                ExchangePhase::Idle as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(left) => return ExchangePhase::from_u8(left),
                Err(actual) => current = actual,
            }
        }
    }

    fn transition(&self, from: ExchangePhase, to: ExchangePhase) -> Result<(), ExchangePhase> {
        self.inner
            .phase
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(ExchangePhase::from_u8)
    }

    fn ring(&self) -> u32 {
        // The slot index is a constant inside the control region.
        wait::notify(&self.int_view(), SIGNAL_SLOT, 1).unwrap_or(0)
    }

    pub(crate) fn doorbell(&self, slot: usize) -> TransportResult<&Doorbell> {
        self.inner
            .doorbells
            .get(slot)
            .ok_or(TransportError::InvalidSlot { slot })
    }

    pub(crate) fn is_controller_thread(&self) -> bool {
        thread::current().id() == self.inner.controller
    }

    fn base(&self) -> *mut u8 {
        self.inner.region.as_ptr()
    }
}

/// Exclusive hold on one phase. Leaves it for `release` when dropped.
struct Claim<'a> {
    buffer: &'a SharedBuffer,
    held: ExchangePhase,
    release: Option<ExchangePhase>,
}

impl<'a> Claim<'a> {
    fn new(buffer: &'a SharedBuffer, held: ExchangePhase, release: ExchangePhase) -> Self {
        Self {
            buffer,
            held,
            release: Some(release),
        }
    }

    fn hand_over(mut self, to: ExchangePhase) {
        self.release = None;
        // Only the holder can leave a held phase.
        let _ = self.buffer.transition(self.held, to);
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        let Some(to) = self.release.take() else {
            return;
        };
        let _ = self.buffer.transition(self.held, to);
        if to == ExchangePhase::Aborted {
            tracing::debug!(from = ?self.held, "exchange abandoned");
            self.buffer.ring();
        }
    }
}

/// Worker's hold on the buffer while it writes a question.
pub struct QuestionDraft<'a> {
    claim: Claim<'a>,
}

impl QuestionDraft<'_> {
    pub fn bytes(&self) -> ByteView<'_> {
        ByteView::new(self.claim.buffer)
    }

    pub fn bytes_mut(&mut self) -> ByteViewMut<'_> {
        ByteViewMut::new(self.claim.buffer)
    }

    /// Publishes the question for the controller.
    pub fn publish(self) {
        self.claim.hand_over(ExchangePhase::QuestionPosted);
    }
}

/// Controller's hold on a published question while it copies it out.
pub struct QuestionRead<'a> {
    claim: Claim<'a>,
}

impl QuestionRead<'_> {
    pub fn bytes(&self) -> ByteView<'_> {
        ByteView::new(self.claim.buffer)
    }
}

/// Controller's hold on the buffer while it writes the answer.
pub struct AnswerDraft<'a> {
    claim: Claim<'a>,
}

impl AnswerDraft<'_> {
    pub fn bytes(&self) -> ByteView<'_> {
        ByteView::new(self.claim.buffer)
    }

    pub fn bytes_mut(&mut self) -> ByteViewMut<'_> {
        ByteViewMut::new(self.claim.buffer)
    }

    /// Publishes the answer and wakes the worker. Returns the number of
    /// threads that were parked and got woken.
    pub fn publish(self) -> u32 {
        let buffer = self.claim.buffer;
        self.claim.hand_over(ExchangePhase::AnswerPosted);
        buffer.ring()
    }
}

/// Worker's hold on a posted answer while it copies it out.
pub struct AnswerRead<'a> {
    claim: Claim<'a>,
}

impl AnswerRead<'_> {
    pub fn bytes(&self) -> ByteView<'_> {
        ByteView::new(self.claim.buffer)
    }
}

/// Signed 32-bit view over the control region.
#[derive(Clone, Copy)]
pub struct IntView<'a> {
    buffer: &'a SharedBuffer,
}

impl<'a> IntView<'a> {
    /// Borrows the atomic cell backing `slot`.
    pub fn slot(&self, slot: usize) -> TransportResult<&'a AtomicI32> {
        if slot >= CONTROL_SLOTS {
            return Err(TransportError::InvalidSlot { slot });
        }
        // SAFETY: the region is 64-byte aligned and at least HEADER_LEN bytes
        // long; slot < CONTROL_SLOTS keeps the cell inside the control region,
        // which is only ever accessed atomically.
        Ok(unsafe { &*(self.buffer.base() as *const AtomicI32).add(slot) })
    }

    /// Atomically loads `slot`.
    pub fn load(&self, slot: usize) -> TransportResult<i32> {
        Ok(self.slot(slot)?.load(Ordering::Acquire))
    }

    /// Atomically stores `value` into `slot`.
    pub fn store(&self, slot: usize, value: i32) -> TransportResult<()> {
        self.slot(slot)?.store(value, Ordering::Release);
        Ok(())
    }

    /// Buffer this view was taken from.
    pub fn buffer(&self) -> &'a SharedBuffer {
        self.buffer
    }
}

/// Read-only byte view over the payload region, borrowed from a claim.
#[derive(Clone, Copy)]
pub struct ByteView<'a> {
    buffer: &'a SharedBuffer,
}

impl<'a> ByteView<'a> {
    fn new(buffer: &'a SharedBuffer) -> Self {
        Self { buffer }
    }

    /// Size of the payload region in bytes.
    pub fn len(&self) -> usize {
        self.buffer.payload_capacity()
    }

    /// Always false; the payload region holds at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Control slots of the same buffer.
    pub fn int_view(&self) -> IntView<'a> {
        self.buffer.int_view()
    }

    /// Copies the first `len` payload bytes out of the buffer.
    pub fn read_payload(&self, len: usize) -> TransportResult<Vec<u8>> {
        let capacity = self.len();
        if len > capacity {
            return Err(TransportError::PayloadOutOfBounds { len, capacity });
        }
        let mut out = vec![0u8; len];
        // SAFETY: the source lies inside the payload region (checked above).
        // This view only exists under a claim, and no claim that hands out a
        // writable view can coexist with it.
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.buffer.base().add(HEADER_LEN),
                out.as_mut_ptr(),
                len,
            );
        }
        Ok(out)
    }
}

/// Writable byte view over the payload region, borrowed mutably from a draft.
pub struct ByteViewMut<'a> {
    buffer: &'a SharedBuffer,
}

impl<'a> ByteViewMut<'a> {
    fn new(buffer: &'a SharedBuffer) -> Self {
        Self { buffer }
    }

    /// Size of the payload region in bytes.
    pub fn len(&self) -> usize {
        self.buffer.payload_capacity()
    }

    /// Always false; the payload region holds at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Control slots of the same buffer.
    pub fn int_view(&self) -> IntView<'a> {
        self.buffer.int_view()
    }

    /// Reborrows as a read-only view.
    pub fn as_view(&self) -> ByteView<'_> {
        ByteView::new(self.buffer)
    }

    /// Copies `bytes` to the start of the payload region.
    pub fn write_payload(&mut self, bytes: &[u8]) -> TransportResult<()> {
        let capacity = self.len();
        if bytes.len() > capacity {
            return Err(TransportError::PayloadOutOfBounds {
                len: bytes.len(),
                capacity,
            });
        }
        // SAFETY: the destination lies inside the payload region (checked
        // above). The draft this view borrows from holds a phase no other
        // claim can enter, and `&mut self` keeps the view unique.
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                self.buffer.base().add(HEADER_LEN),
                bytes.len(),
            );
        }
        Ok(())
    }
}
