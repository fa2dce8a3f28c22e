//! Terminal operator built on dialoguer.

use anyhow::Result;
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, MultiSelect, Password, Select};
use qa_dispatcher::{Control, Operator, Prompt};

pub struct TerminalOperator {
    theme: ColorfulTheme,
}

impl TerminalOperator {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }

    fn text(&self, label: &str, initial: &str, masked: bool) -> Result<String> {
        if masked {
            let entry = Password::with_theme(&self.theme)
                .with_prompt(label)
                .allow_empty_password(true)
                .interact()?;
            return Ok(or_initial(entry, initial));
        }
        Ok(Input::<String>::with_theme(&self.theme)
            .with_prompt(label)
            .with_initial_text(initial)
            .allow_empty(true)
            .interact_text()?)
    }

    /// Reads lines until an empty one. The initial value is offered as the first line.
    fn lines(&self, label: &str, initial: &str) -> Result<String> {
        eprintln!("{} {}", style(label).bold(), style("(empty line to finish)").dim());
        let mut lines = Vec::new();
        let mut seed = initial.to_owned();
        loop {
            let line = Input::<String>::with_theme(&self.theme)
                .with_prompt(">")
                .with_initial_text(std::mem::take(&mut seed))
                .allow_empty(true)
                .interact_text()?;
            if line.is_empty() {
                break;
            }
            lines.push(line);
        }
        Ok(lines.join("\n"))
    }
}

/// Masked entries cannot be pre-filled, so an empty entry keeps the default.
fn or_initial(entry: String, initial: &str) -> String {
    if entry.is_empty() {
        initial.to_owned()
    } else {
        entry
    }
}

impl Default for TerminalOperator {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator for TerminalOperator {
    fn respond(&mut self, prompt: &mut Prompt) -> Result<()> {
        for hint in prompt.hints() {
            eprintln!("  {}", style(hint).dim());
        }
        let label = prompt.label().to_owned();
        match prompt.control_mut() {
            Control::TextField {
                masked,
                multiline,
                value,
            } => {
                *value = if *multiline {
                    self.lines(&label, value)?
                } else {
                    self.text(&label, value, *masked)?
                };
            }
            Control::Checkboxes { options, checked } => {
                let picked = MultiSelect::with_theme(&self.theme)
                    .with_prompt(label)
                    .items(options.as_slice())
                    .defaults(checked.as_slice())
                    .interact()?;
                for (idx, on) in checked.iter_mut().enumerate() {
                    *on = picked.contains(&idx);
                }
            }
            Control::Dropdown { options, selected } => {
                let idx = Select::with_theme(&self.theme)
                    .with_prompt(label)
                    .items(options.as_slice())
                    .default(selected.unwrap_or(0))
                    .interact()?;
                *selected = Some(idx);
            }
            Control::Toggle { value } => {
                *value = Confirm::with_theme(&self.theme)
                    .with_prompt(label)
                    .default(*value)
                    .interact()?;
            }
        }
        Ok(())
    }
}
