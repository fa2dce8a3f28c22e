//! Question engine running inside the compute unit.
//!
//! The compute unit resolves every question through [`GuestQa::fetch_answer`].
//! Interactive questions cross into the host through the pointer ABI exactly
//! as an embedded module would: the question is serialised into guest memory,
//! an answer buffer is reserved next to it, and `ask_question` fills it in.

use qa_abi::{Answer, AnswerValue, Question, QuestionKind, OTHER_ANSWER};
use qa_codec::MessageCodec;

use crate::error::{HostError, HostResult};
use crate::host::HostAdapter;
use crate::memory::{GuestMemory, LinearMemory};

/// Smallest guest memory handed to a compute unit.
pub const GUEST_MEMORY_LEN: usize = 1 << 20;

#[derive(Debug)]
pub struct GuestQa {
    interactive: bool,
    answer_capacity: usize,
    memory: LinearMemory,
}

impl GuestQa {
    pub fn new(interactive: bool, answer_capacity: usize) -> Self {
        let size = GUEST_MEMORY_LEN.max(answer_capacity.saturating_mul(2));
        Self {
            interactive,
            answer_capacity,
            memory: LinearMemory::new(size),
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Resolves `question`, asking the operator only when that is possible
    /// and useful.
    ///
    /// Order: structural validation, pre-solved questions, defaults when not
    /// interactive or when there is nothing to show, then the host exchange.
    /// A select answered with [`OTHER_ANSWER`] is re-asked as a free-text
    /// input whose text becomes the answer. A multi-select answer containing
    /// the sentinel triggers a multi-line follow-up whose non-empty lines
    /// replace it.
    pub fn fetch_answer(
        &mut self,
        host: &HostAdapter<'_>,
        question: Question,
    ) -> HostResult<Answer> {
        question.validate()?;
        if let Some(value) = question.presolved() {
            tracing::debug!(id = %question.id, "question resolved without asking");
            return Ok(Answer::new(question, value)?);
        }
        if !self.interactive || question.description.is_empty() {
            let value = question.default_answer();
            tracing::debug!(id = %question.id, "question answered from its default");
            return Ok(Answer::new(question, value)?);
        }

        let mut answer = self.ask_through_host(host, &question)?;
        if matches!(question.kind, QuestionKind::Select { .. })
            && answer.value() == &AnswerValue::Text(OTHER_ANSWER.into())
        {
            let mut follow_up = Question::input(
                question.id.clone(),
                format!("Input {}", question.description),
                None,
            );
            follow_up.hints = question.hints.clone();
            let (_, value) = self.ask_through_host(host, &follow_up)?.into_parts();
            return Ok(Answer::new(question, value)?);
        }

        let wants_more = matches!(question.kind, QuestionKind::MultiSelect { .. })
            && answer.remove_choice(OTHER_ANSWER);
        if wants_more {
            let mut follow_up = Question::multiline_input(
                question.id.clone(),
                question.description.clone(),
                Some(""),
            );
            follow_up.hints = question.hints.clone();
            let extra = self.ask_through_host(host, &follow_up)?;
            if let AnswerValue::Text(text) = extra.value() {
                answer.extend_choices(
                    text.lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty())
                        .map(str::to_owned),
                );
            }
        }
        Ok(answer)
    }

    fn ask_through_host(
        &mut self,
        host: &HostAdapter<'_>,
        question: &Question,
    ) -> HostResult<Answer> {
        let codec = MessageCodec::new();
        self.memory.reset();
        let bytes = codec.to_bytes(question)?;
        let (question_ptr, question_len) = self.memory.store(&bytes)?;
        let answer_ptr = self.memory.reserve(self.answer_capacity)?;

        let ret = host.ask_question(&mut self.memory, question_ptr, question_len, answer_ptr);
        if ret < 0 {
            return Err(host
                .session()
                .take_last_error()
                .unwrap_or(HostError::Failed { code: ret }));
        }
        let raw = self.memory.read(answer_ptr, ret as u32)?;
        Ok(codec.from_bytes(raw)?)
    }
}
