use qa_abi::{Answer, AnswerValue, Question};

use crate::error::HostResult;
use crate::guest::GuestQa;
use crate::host::HostAdapter;
use crate::session::Session;

/// Opaque long-running task executed on the worker thread.
pub trait ComputeUnit: Send {
    fn name(&self) -> &str;

    /// Runs to completion, returning the run artifact.
    fn run(&mut self, host: &mut HostContext<'_>) -> anyhow::Result<Vec<u8>>;
}

/// Host services visible to a running compute unit.
pub struct HostContext<'a> {
    session: &'a Session,
    qa: GuestQa,
}

impl<'a> HostContext<'a> {
    pub(crate) fn new(session: &'a Session) -> Self {
        Self {
            session,
            qa: GuestQa::new(session.is_interactive(), session.answer_capacity()),
        }
    }

    /// True when questions may reach the operator.
    pub fn interactive(&self) -> bool {
        self.qa.is_interactive()
    }

    pub fn print(&self, text: impl AsRef<[u8]>) -> HostResult<()> {
        self.session.print(text.as_ref())
    }

    pub fn fetch_answer(&mut self, question: Question) -> HostResult<Answer> {
        let host = HostAdapter::new(self.session);
        self.qa.fetch_answer(&host, question)
    }

    /// Asks a single-line input question and returns the text.
    pub fn fetch_string(
        &mut self,
        id: &str,
        description: &str,
        default: Option<&str>,
    ) -> HostResult<String> {
        let answer = self.fetch_answer(Question::input(id, description, default))?;
        Ok(match answer.into_parts().1 {
            AnswerValue::Text(text) => text,
            _ => String::new(),
        })
    }

    /// Asks a confirm question and returns the flag.
    pub fn fetch_bool(&mut self, id: &str, description: &str, default: bool) -> HostResult<bool> {
        let answer = self.fetch_answer(Question::confirm(id, description, default))?;
        Ok(matches!(answer.value(), AnswerValue::Flag(true)))
    }
}
