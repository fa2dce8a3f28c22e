//! Compute unit that resolves a list of questions read from disk.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use qa_abi::{Answer, AnswerValue, Question, QuestionKind};
use qa_worker::{ComputeUnit, HostContext};

#[derive(Debug)]
pub struct Questionnaire {
    name: String,
    questions: Vec<Question>,
}

impl Questionnaire {
    pub fn new(name: impl Into<String>, questions: Vec<Question>) -> Self {
        Self {
            name: name.into(),
            questions,
        }
    }

    /// Parses a JSON array of questions in wire form.
    pub fn from_json(name: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        let questions: Vec<Question> = serde_json::from_slice(bytes)
            .context("questionnaire is not a JSON array of questions")?;
        Ok(Self::new(name, questions))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(path.display().to_string(), &bytes)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

impl ComputeUnit for Questionnaire {
    fn name(&self) -> &str {
        &self.name
    }

    /// Resolves every question in order and returns the answered list as JSON.
    fn run(&mut self, host: &mut HostContext<'_>) -> Result<Vec<u8>> {
        host.print(format!(
            "resolving {} question(s){}\n",
            self.questions.len(),
            if host.interactive() { "" } else { " from defaults" }
        ))?;
        let mut solved: Vec<Answer> = Vec::with_capacity(self.questions.len());
        for question in std::mem::take(&mut self.questions) {
            let id = question.id.clone();
            let answer = host
                .fetch_answer(question)
                .with_context(|| format!("failed to resolve question {id:?}"))?;
            host.print(format!("{}\n", render_answer(&answer)))?;
            solved.push(answer);
        }
        serde_json::to_vec_pretty(&solved).context("failed to serialise answers")
    }
}

/// One line summary of an answer. Password answers are masked.
pub fn render_answer(answer: &Answer) -> String {
    let id = &answer.question().id;
    let shown = match (&answer.question().kind, answer.value()) {
        (QuestionKind::Password { .. }, _) => "********".to_owned(),
        (_, AnswerValue::Text(text)) => text.replace('\n', "\\n"),
        (_, AnswerValue::Choices(choices)) => format!("[{}]", choices.join(", ")),
        (_, AnswerValue::Flag(true)) => "yes".to_owned(),
        (_, AnswerValue::Flag(false)) => "no".to_owned(),
    };
    format!("{id}: {shown}")
}
