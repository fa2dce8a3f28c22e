use crate::prompt::Prompt;

/// Whoever fills in prompts: a terminal, a UI, or a script.
///
/// Returning `Ok` confirms the prompt with whatever the control holds.
/// Returning an error aborts the run; there is no per-question cancel.
pub trait Operator {
    fn respond(&mut self, prompt: &mut Prompt) -> anyhow::Result<()>;
}

/// Confirms every prompt as rendered, i.e. with the question's default.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptDefaults;

impl Operator for AcceptDefaults {
    fn respond(&mut self, prompt: &mut Prompt) -> anyhow::Result<()> {
        tracing::debug!(id = %prompt.question().id, "accepting default");
        Ok(())
    }
}

impl<F> Operator for F
where
    F: FnMut(&mut Prompt) -> anyhow::Result<()>,
{
    fn respond(&mut self, prompt: &mut Prompt) -> anyhow::Result<()> {
        self(prompt)
    }
}
