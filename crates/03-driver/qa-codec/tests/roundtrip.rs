//! Property checks for the shared-buffer codec over generated questions.

use proptest::collection::vec;
use proptest::prelude::*;
use qa_abi::{Answer, AnswerValue, Question, QuestionKind};
use qa_codec::{read_bytes, CodecError, MessageCodec};
use qa_transport::{SharedBuffer, DEFAULT_BUFFER_LEN};

fn text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 _./:\\-\u{e9}\u{4e2d}]{0,24}"
}

fn kind() -> impl Strategy<Value = QuestionKind> {
    prop_oneof![
        proptest::option::of(text()).prop_map(|default| QuestionKind::Input { default }),
        proptest::option::of(text()).prop_map(|default| QuestionKind::MultiLineInput { default }),
        proptest::option::of(text()).prop_map(|default| QuestionKind::Password { default }),
        (vec(text(), 0..6), proptest::option::of(text()))
            .prop_map(|(options, default)| QuestionKind::Select { options, default }),
        (vec(text(), 0..6), vec(text(), 0..4))
            .prop_map(|(options, default)| QuestionKind::MultiSelect { options, default }),
        any::<bool>().prop_map(|default| QuestionKind::Confirm { default }),
    ]
}

fn question() -> impl Strategy<Value = Question> {
    (text(), text(), vec(text(), 0..3), kind()).prop_map(|(id, description, hints, kind)| {
        Question {
            id,
            description,
            hints,
            kind,
        }
    })
}

/// Publishes `value` as a question and reads it back through the controller's claim.
fn through_buffer<T>(codec: MessageCodec, value: &T) -> (usize, T)
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    let buffer = SharedBuffer::new(DEFAULT_BUFFER_LEN).unwrap();
    let mut draft = buffer.begin_question().unwrap();
    let written = codec.encode(&mut draft.bytes_mut(), value).unwrap();
    draft.publish();
    let read = buffer.read_question().unwrap();
    (written, codec.decode(read.bytes()).unwrap())
}

proptest! {
    #[test]
    fn question_round_trips_through_buffer(q in question()) {
        let (written, back) = through_buffer(MessageCodec::new(), &q);
        prop_assert_eq!(written, serde_json::to_vec(&q).unwrap().len());
        prop_assert_eq!(back, q);
    }

    #[test]
    fn versioned_question_round_trips(q in question(), version in 1u32..8) {
        let (_, back) = through_buffer(MessageCodec::with_schema_version(version), &q);
        prop_assert_eq!(back, q);
    }

    #[test]
    fn confirm_answer_round_trips(id in text(), flag in any::<bool>()) {
        let answer = Answer::new(
            Question::confirm(id, "proceed?", !flag),
            AnswerValue::Flag(flag),
        ).unwrap();
        let (_, back) = through_buffer(MessageCodec::new(), &answer);
        prop_assert_eq!(back, answer);
    }
}

#[test]
fn oversized_question_fails_without_writing() {
    let buffer = SharedBuffer::new(DEFAULT_BUFFER_LEN).unwrap();
    let codec = MessageCodec::new();
    let small = Question::confirm("q0", "small", true);
    let mut draft = buffer.begin_question().unwrap();
    codec.encode(&mut draft.bytes_mut(), &small).unwrap();
    let before = read_bytes(draft.bytes()).unwrap();

    let huge = Question::input("q5", "d".repeat(DEFAULT_BUFFER_LEN), None);
    let err = codec.encode(&mut draft.bytes_mut(), &huge).unwrap_err();
    match err {
        CodecError::PayloadTooLarge { len, capacity } => {
            assert!(len > capacity);
            assert_eq!(capacity, DEFAULT_BUFFER_LEN - 8);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(read_bytes(draft.bytes()).unwrap(), before);
    let still: Question = codec.decode(draft.bytes()).unwrap();
    assert_eq!(still, small);
}
