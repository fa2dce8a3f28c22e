//! Modal prompt model rendered for one question.
//!
//! The control is chosen by the question kind once, in
//! [`Prompt::for_question`]; operators only ever touch the control.

use qa_abi::{in_option_order, AnswerValue, Question, QuestionKind};

/// Input control shown to the operator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Control {
    /// Free text. Password questions are masked; multi-line input is not validated.
    TextField {
        masked: bool,
        multiline: bool,
        value: String,
    },
    /// One checkbox per option.
    Checkboxes {
        options: Vec<String>,
        checked: Vec<bool>,
    },
    /// A dropdown over the options.
    Dropdown {
        options: Vec<String>,
        selected: Option<usize>,
    },
    /// Yes/no.
    Toggle { value: bool },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prompt {
    question: Question,
    control: Control,
}

impl Prompt {
    /// Builds the control for `question`, pre-filled from its default.
    pub fn for_question(question: &Question) -> Self {
        let control = match &question.kind {
            QuestionKind::Input { default } => text(default, false, false),
            QuestionKind::MultiLineInput { default } => text(default, false, true),
            QuestionKind::Password { default } => text(default, true, false),
            QuestionKind::MultiSelect { options, default } => Control::Checkboxes {
                checked: options.iter().map(|o| default.contains(o)).collect(),
                options: options.clone(),
            },
            QuestionKind::Select { options, default } => Control::Dropdown {
                selected: default
                    .as_ref()
                    .and_then(|d| options.iter().position(|o| o == d))
                    .or(if options.is_empty() { None } else { Some(0) }),
                options: options.clone(),
            },
            QuestionKind::Confirm { default } => Control::Toggle { value: *default },
        };
        Self {
            question: question.clone(),
            control,
        }
    }

    pub fn question(&self) -> &Question {
        &self.question
    }

    pub fn label(&self) -> &str {
        &self.question.description
    }

    pub fn hints(&self) -> &[String] {
        &self.question.hints
    }

    pub fn control(&self) -> &Control {
        &self.control
    }

    pub fn control_mut(&mut self) -> &mut Control {
        &mut self.control
    }

    /// Replaces the text of a text field. Returns false for other controls.
    pub fn set_text(&mut self, text: impl Into<String>) -> bool {
        match &mut self.control {
            Control::TextField { value, .. } => {
                *value = text.into();
                true
            }
            _ => false,
        }
    }

    /// Picks the dropdown entry equal to `option`.
    pub fn select(&mut self, option: &str) -> bool {
        match &mut self.control {
            Control::Dropdown { options, selected } => {
                match options.iter().position(|o| o == option) {
                    Some(idx) => {
                        *selected = Some(idx);
                        true
                    }
                    None => false,
                }
            }
            _ => false,
        }
    }

    /// Checks or unchecks the checkbox labelled `option`.
    pub fn set_checked(&mut self, option: &str, on: bool) -> bool {
        match &mut self.control {
            Control::Checkboxes { options, checked } => {
                match options.iter().position(|o| o == option) {
                    Some(idx) => {
                        checked[idx] = on;
                        true
                    }
                    None => false,
                }
            }
            _ => false,
        }
    }

    pub fn set_flag(&mut self, flag: bool) -> bool {
        match &mut self.control {
            Control::Toggle { value } => {
                *value = flag;
                true
            }
            _ => false,
        }
    }

    /// Value currently held by the control.
    ///
    /// Checked boxes come back in options order, whatever order they were
    /// clicked in.
    pub fn answer_value(&self) -> AnswerValue {
        match &self.control {
            Control::TextField { value, .. } => AnswerValue::Text(value.clone()),
            Control::Checkboxes { options, checked } => {
                let picked: Vec<String> = options
                    .iter()
                    .zip(checked)
                    .filter(|(_, on)| **on)
                    .map(|(o, _)| o.clone())
                    .collect();
                AnswerValue::Choices(in_option_order(options, &picked))
            }
            Control::Dropdown { options, selected } => AnswerValue::Text(
                selected
                    .and_then(|idx| options.get(idx))
                    .cloned()
                    .unwrap_or_default(),
            ),
            Control::Toggle { value } => AnswerValue::Flag(*value),
        }
    }
}

fn text(default: &Option<String>, masked: bool, multiline: bool) -> Control {
    Control::TextField {
        masked,
        multiline,
        value: default.clone().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controls_follow_the_kind() {
        let prompt = Prompt::for_question(&Question::password("pw", "secret?"));
        assert_eq!(
            prompt.control(),
            &Control::TextField {
                masked: true,
                multiline: false,
                value: String::new()
            }
        );

        let prompt =
            Prompt::for_question(&Question::select("q2", "pick", &["a", "b", "c"], Some("b")));
        assert_eq!(
            prompt.control(),
            &Control::Dropdown {
                options: vec!["a".into(), "b".into(), "c".into()],
                selected: Some(1)
            }
        );

        let prompt =
            Prompt::for_question(&Question::multi_select("q3", "pick", &["x", "y"], &["x"]));
        assert_eq!(
            prompt.control(),
            &Control::Checkboxes {
                options: vec!["x".into(), "y".into()],
                checked: vec![true, false]
            }
        );

        let prompt = Prompt::for_question(&Question::confirm("q1", "proceed?", false));
        assert_eq!(prompt.control(), &Control::Toggle { value: false });
    }

    #[test]
    fn checked_boxes_come_back_in_options_order() {
        let mut prompt =
            Prompt::for_question(&Question::multi_select("q3", "pick", &["x", "y", "z"], &[]));
        assert!(prompt.set_checked("z", true));
        assert!(prompt.set_checked("x", true));
        assert!(!prompt.set_checked("w", true));
        assert_eq!(
            prompt.answer_value(),
            AnswerValue::Choices(vec!["x".into(), "z".into()])
        );
    }

    #[test]
    fn setters_refuse_the_wrong_control() {
        let mut prompt = Prompt::for_question(&Question::confirm("q1", "proceed?", false));
        assert!(!prompt.set_text("yes"));
        assert!(!prompt.select("a"));
        assert!(prompt.set_flag(true));
        assert_eq!(prompt.answer_value(), AnswerValue::Flag(true));
    }

    #[test]
    fn unknown_select_default_falls_back_to_first_option() {
        let prompt = Prompt::for_question(&Question::select("q", "pick", &["a", "b"], Some("zz")));
        assert_eq!(prompt.answer_value(), AnswerValue::Text("a".into()));
    }
}
