//! Host side of the blocking question/answer exchange.
//!
//! `ask` runs one exchange end to end on the worker thread:
//!
//! 1. claim the shared buffer and encode the question into it,
//! 2. publish it (`QuestionPosted`),
//! 3. send [`WorkerEvent::QuestionAvailable`] to wake the controller,
//! 4. park on the signal slot until the controller notifies,
//! 5. collect and decode the answer, which returns the buffer to idle.
//!
//! `ask_question` wraps the same flow in the pointer ABI the compute unit
//! calls through: JSON in at `question_ptr`, JSON out at `answer_out_ptr`,
//! byte count or negative error code back.

use qa_abi::{Answer, Problem, Question};
use qa_codec::MessageCodec;
use qa_transport::wait::{self, WaitResult};
use qa_transport::{ExchangePhase, SharedBuffer, SIGNAL_SLOT};

use crate::error::{HostError, HostResult};
use crate::event::WorkerEvent;
use crate::memory::GuestMemory;
use crate::session::Session;

/// Value the signal slot holds for the whole exchange.
const SIGNAL_IDLE: i32 = 0;

#[derive(Clone, Copy, Debug)]
pub struct HostAdapter<'a> {
    session: &'a Session,
}

impl<'a> HostAdapter<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &'a Session {
        self.session
    }

    /// Asks `question` and blocks until the controller answers it.
    ///
    /// Must run on the worker thread; the wait is refused on the thread that
    /// created the buffer.
    pub fn ask(&self, question: &Question) -> HostResult<Answer> {
        let buffer = self.session.channel()?;
        let codec = self.session.codec();

        let mut draft = buffer.begin_question()?;
        // A failed encode drops the draft, which frees the buffer.
        codec.encode(&mut draft.bytes_mut(), question)?;
        draft.publish();
        tracing::trace!(id = %question.id, kind = ?question.kind.tag(), "question posted");

        if let Err(err) = self
            .session
            .emit(WorkerEvent::QuestionAvailable(question.clone()))
        {
            buffer.withdraw_question();
            return Err(err);
        }

        self.block_for_answer(buffer)?;
        let answer: Answer = {
            let claim = buffer.collect_answer()?;
            codec.decode(claim.bytes())?
        };
        tracing::trace!(id = %question.id, "exchange finished");

        if answer.question().id != question.id {
            return Err(HostError::AnswerMismatch {
                expected: question.id.clone(),
                found: answer.question().id.clone(),
            });
        }
        Ok(answer)
    }

    /// Host-callable entry point over the compute unit's memory.
    ///
    /// Returns the length of the answer written at `answer_out_ptr`, or a
    /// negative [`HostError::code`]. The error itself is kept for
    /// [`Session::take_last_error`].
    pub fn ask_question(
        &self,
        memory: &mut dyn GuestMemory,
        question_ptr: u32,
        question_len: u32,
        answer_out_ptr: u32,
    ) -> i32 {
        match self.try_ask_question(memory, question_ptr, question_len, answer_out_ptr) {
            Ok(len) => len,
            Err(err) => {
                let code = err.code();
                tracing::warn!(code, error = %err, "ask_question failed");
                self.session.record_error(err);
                code
            }
        }
    }

    fn try_ask_question(
        &self,
        memory: &mut dyn GuestMemory,
        question_ptr: u32,
        question_len: u32,
        answer_out_ptr: u32,
    ) -> HostResult<i32> {
        // The compute unit always speaks the unversioned wire form.
        let guest_codec = MessageCodec::new();
        let raw = memory.read(question_ptr, question_len)?;
        let problem: Problem = guest_codec.from_bytes(raw)?;
        let question = Question::try_from(problem)?;

        let answer = self.ask(&question)?;

        let bytes = guest_codec.to_bytes(&answer)?;
        let capacity = self.session.answer_capacity();
        let too_large = HostError::AnswerTooLarge {
            len: bytes.len(),
            capacity,
        };
        if bytes.len() > capacity {
            return Err(too_large);
        }
        let len = i32::try_from(bytes.len()).map_err(|_| too_large)?;
        memory.write(answer_out_ptr, &bytes)?;
        Ok(len)
    }

    fn block_for_answer(&self, buffer: &SharedBuffer) -> HostResult<()> {
        let view = buffer.int_view();
        let limit = self.session.wait_timeout();
        let mut timeout = limit;
        loop {
            match wait::wait(&view, SIGNAL_SLOT, SIGNAL_IDLE, timeout)? {
                WaitResult::Ok => match buffer.phase() {
                    ExchangePhase::AnswerPosted => return Ok(()),
                    ExchangePhase::Aborted => {
                        buffer.finish_exchange();
                        return Err(HostError::ExchangeAborted);
                    }
                    phase => tracing::trace!(?phase, "woken without an answer"),
                },
                WaitResult::NotEqual => {
                    return Err(HostError::UnexpectedSignal {
                        value: view.load(SIGNAL_SLOT)?,
                    })
                }
                WaitResult::TimedOut => {
                    if buffer.withdraw_question() {
                        return Err(HostError::WaitTimedOut {
                            timeout: limit.unwrap_or_default(),
                        });
                    }
                    // The controller claimed the buffer first; its publish or
                    // abort notifies.
                    tracing::debug!("answer claimed at the deadline, waiting for it");
                    timeout = None;
                }
            }
        }
    }
}
