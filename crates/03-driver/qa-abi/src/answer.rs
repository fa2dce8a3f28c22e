use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::problem::Problem;
use crate::{in_option_order, ProblemError, ProblemResult, Question, QuestionKind, OTHER_ANSWER};

/// Value confirmed by the operator. The variant follows the question kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnswerValue {
    /// Input, multi-line input, password, and select answers.
    Text(String),
    /// Multi-select answers, in options order.
    Choices(Vec<String>),
    /// Confirm answers.
    Flag(bool),
}

impl AnswerValue {
    pub(crate) fn to_json(&self) -> Value {
        match self {
            AnswerValue::Text(text) => Value::String(text.clone()),
            AnswerValue::Choices(choices) => {
                Value::Array(choices.iter().cloned().map(Value::String).collect())
            }
            AnswerValue::Flag(flag) => Value::Bool(*flag),
        }
    }

    pub(crate) fn from_json(question: &Question, value: Value) -> ProblemResult<Self> {
        let mismatch = |expected| ProblemError::AnswerKindMismatch {
            id: question.id.clone(),
            expected,
        };
        match &question.kind {
            QuestionKind::Input { .. }
            | QuestionKind::MultiLineInput { .. }
            | QuestionKind::Password { .. }
            | QuestionKind::Select { .. } => match value {
                Value::String(text) => Ok(AnswerValue::Text(text)),
                _ => Err(mismatch("a string")),
            },
            QuestionKind::MultiSelect { .. } => match value {
                Value::Array(items) => items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(text) => Ok(text),
                        _ => Err(mismatch("an array of strings")),
                    })
                    .collect::<ProblemResult<Vec<_>>>()
                    .map(AnswerValue::Choices),
                _ => Err(mismatch("an array of strings")),
            },
            QuestionKind::Confirm { .. } => match value {
                Value::Bool(flag) => Ok(AnswerValue::Flag(flag)),
                _ => Err(mismatch("a boolean")),
            },
        }
    }
}

/// A question together with the operator's answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Problem", into = "Problem")]
pub struct Answer {
    question: Question,
    value: AnswerValue,
}

impl Answer {
    /// Attaches `value` to `question`, validating it against the kind.
    ///
    /// Select answers must name an option unless the options include
    /// [`OTHER_ANSWER`]. Multi-select answers are filtered to known options
    /// and re-ordered into options order.
    pub fn new(question: Question, value: AnswerValue) -> ProblemResult<Self> {
        let mismatch = |expected| ProblemError::AnswerKindMismatch {
            id: question.id.clone(),
            expected,
        };
        let value = match (&question.kind, value) {
            (
                QuestionKind::Input { .. }
                | QuestionKind::MultiLineInput { .. }
                | QuestionKind::Password { .. },
                AnswerValue::Text(text),
            ) => AnswerValue::Text(text),
            (QuestionKind::Select { options, .. }, AnswerValue::Text(text)) => {
                let known = options.iter().any(|o| *o == text);
                let open = options.iter().any(|o| o == OTHER_ANSWER);
                if !known && !open {
                    return Err(ProblemError::UnknownOption {
                        id: question.id.clone(),
                        answer: text,
                    });
                }
                AnswerValue::Text(text)
            }
            (QuestionKind::MultiSelect { options, .. }, AnswerValue::Choices(picked)) => {
                AnswerValue::Choices(in_option_order(options, &picked))
            }
            (QuestionKind::Confirm { .. }, AnswerValue::Flag(flag)) => AnswerValue::Flag(flag),
            (QuestionKind::MultiSelect { .. }, _) => {
                return Err(mismatch("an array of strings"))
            }
            (QuestionKind::Confirm { .. }, _) => return Err(mismatch("a boolean")),
            (_, _) => return Err(mismatch("a string")),
        };
        Ok(Self { question, value })
    }

    pub fn question(&self) -> &Question {
        &self.question
    }

    pub fn value(&self) -> &AnswerValue {
        &self.value
    }

    pub fn into_parts(self) -> (Question, AnswerValue) {
        (self.question, self.value)
    }

    /// Appends operator-supplied entries to a multi-select answer, skipping
    /// duplicates. Other kinds are left untouched.
    pub fn extend_choices<I>(&mut self, extra: I)
    where
        I: IntoIterator<Item = String>,
    {
        if let AnswerValue::Choices(choices) = &mut self.value {
            for entry in extra {
                if !choices.contains(&entry) {
                    choices.push(entry);
                }
            }
        }
    }

    /// Drops one entry from a multi-select answer.
    pub fn remove_choice(&mut self, entry: &str) -> bool {
        if let AnswerValue::Choices(choices) = &mut self.value {
            let before = choices.len();
            choices.retain(|c| c != entry);
            return choices.len() != before;
        }
        false
    }
}

impl TryFrom<Problem> for Answer {
    type Error = ProblemError;

    fn try_from(mut problem: Problem) -> Result<Self, Self::Error> {
        let raw = problem.answer.take();
        let question = Question::try_from(problem)?;
        let raw = raw.ok_or_else(|| ProblemError::MissingAnswer {
            id: question.id.clone(),
        })?;
        let value = AnswerValue::from_json(&question, raw)?;
        // Values decoded off the wire are kept verbatim; option filtering
        // happens when an answer is first built.
        Ok(Self { question, value })
    }
}

impl From<Answer> for Problem {
    fn from(answer: Answer) -> Self {
        let mut problem = Problem::from(answer.question);
        problem.answer = Some(answer.value.to_json());
        problem
    }
}
