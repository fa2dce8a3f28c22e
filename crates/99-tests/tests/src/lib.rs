//! End-to-end tests for the blocking question/answer exchange.

#[cfg(all(test, not(target_arch = "wasm32")))]
mod harness;

#[cfg(all(test, not(target_arch = "wasm32")))]
mod scenarios;

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use crate::harness::{artifact_of, decode_answers, AskAll, Bench};
    use qa_abi::{AnswerValue, Question};
    use qa_dispatcher::{AcceptDefaults, Controller, Prompt};
    use qa_transport::ExchangePhase;
    use qa_worker::SessionConfig;

    #[test]
    fn buffer_is_reusable_across_exchanges() {
        let mut bench = Bench::new(&SessionConfig::default());
        for round in 0..3 {
            let id = format!("q{round}");
            let asked = Question::input(id.clone(), "value?", None);
            let worker = bench.on_worker(move |session| session.host().ask(&asked));
            let answer = bench.answer_next(&mut |prompt: &mut Prompt| {
                prompt.set_text(format!("v{round}"));
                Ok(())
            });
            assert_eq!(answer.question().id, id);
            let answer = worker.join().unwrap().unwrap();
            assert_eq!(answer.value(), &AnswerValue::Text(format!("v{round}")));
            assert_eq!(bench.buffer.phase(), ExchangePhase::Idle);
        }
    }

    // Slow tests must be #[ignore] and prefixed with "slow_".
    #[test]
    #[ignore]
    fn slow_many_questions_in_one_run() {
        const QUESTIONS: usize = 2_000;
        let questions = (0..QUESTIONS)
            .map(|n| Question::confirm(format!("q{n}"), "ok?", n % 2 == 0))
            .collect();
        let report = Controller::new(SessionConfig::default()).run(
            AskAll::new(questions),
            &mut AcceptDefaults,
            &mut std::io::sink(),
        );
        assert_eq!(report.questions_answered, QUESTIONS);
        let answers = decode_answers(&artifact_of(report));
        assert_eq!(answers.len(), QUESTIONS);
        assert!(answers
            .iter()
            .enumerate()
            .all(|(n, a)| a.value() == &AnswerValue::Flag(n % 2 == 0)));
    }
}
