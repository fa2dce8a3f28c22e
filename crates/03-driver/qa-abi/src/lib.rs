//! Question/answer types shared by the worker-side host adapter and the
//! controller-side dispatcher.
//!
//! This crate defines the protocol boundary between the compute unit and the
//! operator UI. A [`Question`] is created by the compute unit and never
//! mutated after it is sent; an [`Answer`] is the question plus the value the
//! operator confirmed. Both travel as a flat JSON object (see [`Problem`]).

mod answer;
mod problem;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use answer::{Answer, AnswerValue};
pub use problem::{KindTag, Problem};

/// Sentinel option that lets the operator supply values outside `options`.
pub const OTHER_ANSWER: &str = "Other (specify custom option)";

pub type ProblemResult<T> = Result<T, ProblemError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProblemError {
    #[error("unsupported question type {0:?}")]
    UnsupportedKind(String),

    #[error("question {id:?}: default must be {expected}")]
    InvalidDefault { id: String, expected: &'static str },

    #[error("question {id:?} carries no answer")]
    MissingAnswer { id: String },

    #[error("question {id:?}: answer must be {expected}")]
    AnswerKindMismatch { id: String, expected: &'static str },

    #[error("question {id:?}: answer {answer:?} has no matching value in the options")]
    UnknownOption { id: String, answer: String },

    #[error("question {id:?} is invalid: {reason}")]
    Invalid { id: String, reason: String },
}

/// Shape of a question, carrying exactly the fields its prompt needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuestionKind {
    /// Single-line free text.
    Input { default: Option<String> },
    /// Multi-line free text. Rendered like `Input`; content is not validated.
    MultiLineInput { default: Option<String> },
    /// Masked free text.
    Password { default: Option<String> },
    /// Exactly one of `options`.
    Select {
        options: Vec<String>,
        default: Option<String>,
    },
    /// Any subset of `options`.
    MultiSelect {
        options: Vec<String>,
        default: Vec<String>,
    },
    /// Yes/no.
    Confirm { default: bool },
}

impl QuestionKind {
    pub fn tag(&self) -> KindTag {
        match self {
            QuestionKind::Input { .. } => KindTag::Input,
            QuestionKind::MultiLineInput { .. } => KindTag::MultiLineInput,
            QuestionKind::Password { .. } => KindTag::Password,
            QuestionKind::Select { .. } => KindTag::Select,
            QuestionKind::MultiSelect { .. } => KindTag::MultiSelect,
            QuestionKind::Confirm { .. } => KindTag::Confirm,
        }
    }

    /// Options offered by select kinds; empty for the others.
    pub fn options(&self) -> &[String] {
        match self {
            QuestionKind::Select { options, .. } | QuestionKind::MultiSelect { options, .. } => {
                options
            }
            _ => &[],
        }
    }
}

/// A question raised by the compute unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Problem", into = "Problem")]
pub struct Question {
    pub id: String,
    pub description: String,
    pub hints: Vec<String>,
    pub kind: QuestionKind,
}

impl Question {
    pub fn new(id: impl Into<String>, description: impl Into<String>, kind: QuestionKind) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            hints: Vec::new(),
            kind,
        }
    }

    pub fn input(
        id: impl Into<String>,
        description: impl Into<String>,
        default: Option<&str>,
    ) -> Self {
        Self::new(
            id,
            description,
            QuestionKind::Input {
                default: default.map(str::to_owned),
            },
        )
    }

    pub fn multiline_input(
        id: impl Into<String>,
        description: impl Into<String>,
        default: Option<&str>,
    ) -> Self {
        Self::new(
            id,
            description,
            QuestionKind::MultiLineInput {
                default: default.map(str::to_owned),
            },
        )
    }

    pub fn password(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(id, description, QuestionKind::Password { default: None })
    }

    pub fn select(
        id: impl Into<String>,
        description: impl Into<String>,
        options: &[&str],
        default: Option<&str>,
    ) -> Self {
        Self::new(
            id,
            description,
            QuestionKind::Select {
                options: to_strings(options),
                default: default.map(str::to_owned),
            },
        )
    }

    pub fn multi_select(
        id: impl Into<String>,
        description: impl Into<String>,
        options: &[&str],
        default: &[&str],
    ) -> Self {
        Self::new(
            id,
            description,
            QuestionKind::MultiSelect {
                options: to_strings(options),
                default: to_strings(default),
            },
        )
    }

    pub fn confirm(id: impl Into<String>, description: impl Into<String>, default: bool) -> Self {
        Self::new(id, description, QuestionKind::Confirm { default })
    }

    pub fn with_hints(mut self, hints: &[&str]) -> Self {
        self.hints = to_strings(hints);
        self
    }

    /// Checks the structural rules a question must satisfy before it is asked.
    pub fn validate(&self) -> ProblemResult<()> {
        let invalid = |reason: String| ProblemError::Invalid {
            id: self.id.clone(),
            reason,
        };
        if self.id.is_empty() {
            return Err(invalid("the id is empty".into()));
        }
        match &self.kind {
            QuestionKind::Select { options, default } => {
                if options.is_empty() {
                    return Err(invalid("a select question needs options".into()));
                }
                if let Some(default) = default.as_ref().filter(|d| !options.contains(*d)) {
                    return Err(invalid(format!("default {default:?} is not an option")));
                }
            }
            QuestionKind::MultiSelect { options, default } => {
                if let Some(stray) = default.iter().find(|d| !options.contains(*d)) {
                    return Err(invalid(format!("default {stray:?} is not an option")));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Value used when nobody is asked: the default, or the closest safe choice.
    pub fn default_answer(&self) -> AnswerValue {
        match &self.kind {
            QuestionKind::Input { default }
            | QuestionKind::MultiLineInput { default }
            | QuestionKind::Password { default } => {
                AnswerValue::Text(default.clone().unwrap_or_default())
            }
            QuestionKind::Select { options, default } => {
                let chosen = default
                    .as_ref()
                    .filter(|d| options.contains(*d))
                    .or_else(|| options.first())
                    .cloned()
                    .unwrap_or_default();
                AnswerValue::Text(chosen)
            }
            QuestionKind::MultiSelect { options, default } => {
                AnswerValue::Choices(in_option_order(options, default))
            }
            QuestionKind::Confirm { default } => AnswerValue::Flag(*default),
        }
    }

    /// Answer implied by the question itself, if asking would be pointless.
    ///
    /// A select with a single option and a multi-select with no options are
    /// resolved without the operator.
    pub fn presolved(&self) -> Option<AnswerValue> {
        match &self.kind {
            QuestionKind::Select { options, .. } if options.len() == 1 => {
                Some(AnswerValue::Text(options[0].clone()))
            }
            QuestionKind::MultiSelect { options, .. } if options.is_empty() => {
                Some(AnswerValue::Choices(Vec::new()))
            }
            _ => None,
        }
    }
}

/// Keeps the entries of `picked` that appear in `options`, in options order.
pub fn in_option_order(options: &[String], picked: &[String]) -> Vec<String> {
    options
        .iter()
        .filter(|option| picked.contains(option))
        .cloned()
        .collect()
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_owned()).collect()
}
