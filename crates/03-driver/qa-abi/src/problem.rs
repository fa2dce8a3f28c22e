//! Flat JSON wire form shared with the compute unit.
//!
//! The compute unit marshals questions as one object whose `default` and
//! `answer` fields change type with `type`. [`Problem`] mirrors that object
//! field for field; conversions into [`Question`] / [`Answer`] check the
//! dynamic parts once so the rest of the system sees tagged kinds only.
//!
//! There is no version field; see `qa-codec` for the optional schema tag.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ProblemError, ProblemResult, Question, QuestionKind};

/// Wire tag of a question kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KindTag {
    Input,
    MultiLineInput,
    Password,
    Select,
    MultiSelect,
    Confirm,
}

impl KindTag {
    pub fn as_str(self) -> &'static str {
        match self {
            KindTag::Input => "Input",
            KindTag::MultiLineInput => "MultiLineInput",
            KindTag::Password => "Password",
            KindTag::Select => "Select",
            KindTag::MultiSelect => "MultiSelect",
            KindTag::Confirm => "Confirm",
        }
    }

    pub fn parse(raw: &str) -> ProblemResult<Self> {
        Ok(match raw {
            "Input" => KindTag::Input,
            "MultiLineInput" => KindTag::MultiLineInput,
            "Password" => KindTag::Password,
            "Select" => KindTag::Select,
            "MultiSelect" => KindTag::MultiSelect,
            "Confirm" => KindTag::Confirm,
            other => return Err(ProblemError::UnsupportedKind(other.to_owned())),
        })
    }
}

/// Untyped question/answer object as it appears on the wire.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<Value>,
}

impl From<Question> for Problem {
    fn from(question: Question) -> Self {
        let kind = question.kind.tag().as_str().to_owned();
        let (options, default) = match question.kind {
            QuestionKind::Input { default }
            | QuestionKind::MultiLineInput { default }
            | QuestionKind::Password { default } => (Vec::new(), default.map(Value::String)),
            QuestionKind::Select { options, default } => (options, default.map(Value::String)),
            QuestionKind::MultiSelect { options, default } => (
                options,
                Some(Value::Array(default.into_iter().map(Value::String).collect())),
            ),
            QuestionKind::Confirm { default } => (Vec::new(), Some(Value::Bool(default))),
        };
        Problem {
            id: question.id,
            kind,
            description: question.description,
            hints: question.hints,
            options,
            default,
            answer: None,
        }
    }
}

impl TryFrom<Problem> for Question {
    type Error = ProblemError;

    fn try_from(problem: Problem) -> Result<Self, Self::Error> {
        let tag = KindTag::parse(&problem.kind)?;
        let Problem {
            id,
            description,
            hints,
            options,
            default,
            ..
        } = problem;
        let invalid = |expected| ProblemError::InvalidDefault {
            id: id.clone(),
            expected,
        };
        let kind = match tag {
            KindTag::Input => QuestionKind::Input {
                default: text_default(default).map_err(|_| invalid("a string"))?,
            },
            KindTag::MultiLineInput => QuestionKind::MultiLineInput {
                default: text_default(default).map_err(|_| invalid("a string"))?,
            },
            KindTag::Password => QuestionKind::Password {
                default: text_default(default).map_err(|_| invalid("a string"))?,
            },
            KindTag::Select => QuestionKind::Select {
                options,
                default: text_default(default).map_err(|_| invalid("a string"))?,
            },
            KindTag::MultiSelect => QuestionKind::MultiSelect {
                options,
                default: list_default(default).map_err(|_| invalid("an array of strings"))?,
            },
            KindTag::Confirm => QuestionKind::Confirm {
                default: flag_default(default).map_err(|_| invalid("a boolean"))?,
            },
        };
        Ok(Question {
            id,
            description,
            hints,
            kind,
        })
    }
}

fn text_default(value: Option<Value>) -> Result<Option<String>, ()> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(_) => Err(()),
    }
}

fn list_default(value: Option<Value>) -> Result<Vec<String>, ()> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(text) => Ok(text),
                _ => Err(()),
            })
            .collect(),
        Some(_) => Err(()),
    }
}

/// A missing default reads as `false`, and "true"/"false" strings are
/// accepted, matching how the compute unit coerces confirm defaults.
fn flag_default(value: Option<Value>) -> Result<bool, ()> {
    match value {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(flag)) => Ok(flag),
        Some(Value::String(text)) => text.trim().parse::<bool>().map_err(|_| ()),
        Some(_) => Err(()),
    }
}
