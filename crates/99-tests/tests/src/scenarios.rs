use std::thread;
use std::time::Duration;

use qa_abi::{Answer, AnswerValue, Question};
use qa_codec::{CodecError, MessageCodec};
use qa_dispatcher::{AcceptDefaults, Controller, Prompt, RunFailure, RunStatus};
use qa_transport::wait::{notify, wait};
use qa_transport::{
    Capabilities, ExchangePhase, SharedBuffer, TransportError, WaitResult, DEFAULT_BUFFER_LEN,
    SIGNAL_SLOT,
};
use qa_worker::{HostError, Session, SessionConfig, StartupConfig, ERR_NO_CHANNEL};

use crate::harness::{artifact_of, decode_answers, AskAll, Bench, Recording};

#[test]
fn confirm_left_at_default_returns_exact_answer_length() {
    let mut bench = Bench::new(&SessionConfig::default());
    let worker = bench.ask_through_memory(&Question::confirm("q1", "proceed?", false));

    let answer = bench.answer_next(&mut AcceptDefaults);
    assert_eq!(answer.value(), &AnswerValue::Flag(false));

    let (ret, written) = worker.join().unwrap();
    let expected = serde_json::to_vec(&answer).unwrap();
    assert_eq!(ret as usize, expected.len());
    assert_eq!(written, expected);
    let back: serde_json::Value = serde_json::from_slice(&written).unwrap();
    assert_eq!(back["answer"], serde_json::Value::Bool(false));
}

#[test]
fn single_select_pick_is_returned() {
    let mut bench = Bench::new(&SessionConfig::default());
    let worker = bench.on_worker(|session| {
        session
            .host()
            .ask(&Question::select("q2", "pick one", &["a", "b", "c"], Some("b")))
    });

    bench.answer_next(&mut |prompt: &mut Prompt| {
        assert!(prompt.select("c"));
        Ok(())
    });

    let answer = worker.join().unwrap().unwrap();
    assert_eq!(answer.value(), &AnswerValue::Text("c".into()));
}

#[test]
fn multi_select_answer_follows_options_order() {
    let mut bench = Bench::new(&SessionConfig::default());
    let worker = bench.on_worker(|session| {
        session
            .host()
            .ask(&Question::multi_select("q3", "pick", &["x", "y"], &["x"]))
    });

    bench.answer_next(&mut |prompt: &mut Prompt| {
        // Click order: y, then x again.
        assert!(prompt.set_checked("y", true));
        assert!(prompt.set_checked("x", false));
        assert!(prompt.set_checked("x", true));
        Ok(())
    });

    let answer = worker.join().unwrap().unwrap();
    assert_eq!(
        answer.value(),
        &AnswerValue::Choices(vec!["x".into(), "y".into()])
    );
}

#[test]
fn disabled_interactivity_fails_without_blocking() {
    let (tx, rx) = crossbeam_channel::unbounded();
    let session = Session::new(
        StartupConfig::non_interactive(&SessionConfig::non_interactive()),
        tx,
    );
    let mut mem = qa_worker::LinearMemory::new(4096);
    let json = serde_json::to_vec(&Question::confirm("q1", "proceed?", false)).unwrap();
    let (ptr, len) = mem.store(&json).unwrap();
    let out = mem.reserve(1024).unwrap();

    // Runs on the test thread: a blocking wait here would hang.
    assert_eq!(session.host().ask_question(&mut mem, ptr, len, out), ERR_NO_CHANNEL);
    assert!(matches!(
        session.take_last_error(),
        Some(HostError::NoSharedBufferConfigured)
    ));
    assert!(rx.try_recv().is_err());
}

#[test]
fn oversized_question_aborts_the_run() {
    let config = SessionConfig::default();
    let controller = Controller::with_capabilities(config, Capabilities::detect());
    let huge = Question::input("q5", "d".repeat(DEFAULT_BUFFER_LEN), None);
    let mut sink = Vec::new();
    let report = controller.run(AskAll::new(vec![huge]), &mut AcceptDefaults, &mut sink);

    match &report.status {
        RunStatus::Failed { failure, message } => {
            assert_eq!(*failure, RunFailure::Codec);
            assert!(message.contains("exceeds"), "{message}");
        }
        other => panic!("unexpected status: {other:?}"),
    }
    assert_eq!(report.questions_answered, 0);
    assert_eq!(String::from_utf8(sink).unwrap(), "asking q5\n");
}

#[test]
fn notify_before_wait_still_releases_the_waiter() {
    let buffer = SharedBuffer::new(64).unwrap();
    let (posted_tx, posted_rx) = crossbeam_channel::bounded::<()>(0);
    let (answered_tx, answered_rx) = crossbeam_channel::bounded::<()>(0);
    let worker = {
        let buffer = buffer.clone();
        thread::spawn(move || {
            buffer.begin_question().unwrap().publish();
            posted_tx.send(()).unwrap();
            answered_rx.recv().unwrap();
            wait(&buffer.int_view(), SIGNAL_SLOT, 0, Some(Duration::from_secs(5))).unwrap()
        })
    };

    posted_rx.recv().unwrap();
    assert_eq!(buffer.post_answer().unwrap().publish(), 0);
    answered_tx.send(()).unwrap();

    assert_eq!(worker.join().unwrap(), WaitResult::Ok);
}

#[test]
fn one_notify_releases_exactly_one_wait() {
    let buffer = SharedBuffer::new(64).unwrap();
    let worker = {
        let buffer = buffer.clone();
        thread::spawn(move || {
            let view = buffer.int_view();
            let first = wait(&view, SIGNAL_SLOT, 0, Some(Duration::from_secs(5))).unwrap();
            let second = wait(&view, SIGNAL_SLOT, 0, Some(Duration::from_millis(50))).unwrap();
            (first, second)
        })
    };
    notify(&buffer.int_view(), SIGNAL_SLOT, 1).unwrap();
    assert_eq!(worker.join().unwrap(), (WaitResult::Ok, WaitResult::TimedOut));
}

#[test]
fn second_question_is_rejected_while_one_is_outstanding() {
    let mut bench = Bench::new(&SessionConfig::default());
    let first =
        bench.on_worker(|session| session.host().ask(&Question::confirm("q1", "first?", true)));
    let announced = bench.next_question();
    assert_eq!(announced.id, "q1");

    let second = bench
        .on_worker(|session| session.host().ask(&Question::confirm("q2", "second?", true)))
        .join()
        .unwrap()
        .unwrap_err();
    assert!(matches!(
        second,
        HostError::Transport(TransportError::ExchangeInFlight {
            phase: ExchangePhase::QuestionPosted
        })
    ));

    // The buffer still holds the first question, untouched.
    let in_buffer: Question = {
        let claim = bench.buffer.read_question().unwrap();
        MessageCodec::new().decode(claim.bytes()).unwrap()
    };
    assert_eq!(in_buffer, announced);

    bench.dispatcher.reset();
    bench.dispatcher.begin_from_buffer().unwrap();
    bench.dispatcher.confirm().unwrap();
    let answer = first.join().unwrap().unwrap();
    assert_eq!(answer.value(), &AnswerValue::Flag(true));
}

#[test]
fn controller_runs_interactive_session_end_to_end() {
    let controller = Controller::new(SessionConfig::default());
    assert!(controller.interactive_available());

    let mut operator = Recording::new(|prompt: &mut Prompt| {
        match prompt.question().id.as_str() {
            "name" => {
                prompt.set_text("gizmo");
            }
            "lang" => {
                prompt.select("rust");
            }
            _ => {}
        }
        Ok(())
    });
    let questions = vec![
        Question::input("name", "project name?", Some("demo")),
        Question::select("lang", "language?", &["go", "rust"], Some("go")),
        Question::select("only", "registry?", &["docker.io"], None),
        Question::confirm("go", "proceed?", true),
    ];
    let mut sink = Vec::new();
    let report = controller.run(AskAll::new(questions), &mut operator, &mut sink);

    assert!(report.interactive);
    // The single-option select never reaches the operator.
    assert_eq!(report.questions_answered, 3);
    let seen: Vec<String> = operator.seen.lock().iter().map(|q| q.id.clone()).collect();
    assert_eq!(seen, ["name", "lang", "go"]);

    let answers = decode_answers(&artifact_of(report));
    let values: Vec<&AnswerValue> = answers.iter().map(Answer::value).collect();
    assert_eq!(
        values,
        [
            &AnswerValue::Text("gizmo".into()),
            &AnswerValue::Text("rust".into()),
            &AnswerValue::Text("docker.io".into()),
            &AnswerValue::Flag(true),
        ]
    );
    assert_eq!(
        String::from_utf8(sink).unwrap(),
        "asking name\nasking lang\nasking only\nasking go\n"
    );
}

#[test]
fn missing_capability_forces_defaults() {
    let controller = Controller::with_capabilities(SessionConfig::default(), Capabilities::none());
    assert!(!controller.interactive_available());
    let mut operator = Recording::new(|_: &mut Prompt| Ok(()));
    let report = controller.run(
        AskAll::new(vec![
            Question::select("lang", "language?", &["go", "rust"], Some("rust")),
            Question::confirm("go", "proceed?", false),
        ]),
        &mut operator,
        &mut std::io::sink(),
    );
    assert!(!report.interactive);
    assert_eq!(report.questions_answered, 0);
    assert!(operator.seen.lock().is_empty());

    let answers = decode_answers(&artifact_of(report));
    assert_eq!(answers[0].value(), &AnswerValue::Text("rust".into()));
    assert_eq!(answers[1].value(), &AnswerValue::Flag(false));
}

#[test]
fn operator_failure_aborts_the_run_and_releases_the_worker() {
    let controller = Controller::new(SessionConfig::default());
    let mut operator =
        |_: &mut Prompt| -> anyhow::Result<()> { Err(anyhow::anyhow!("window closed")) };
    let report = controller.run(
        AskAll::new(vec![Question::confirm("q1", "proceed?", true)]),
        &mut operator,
        &mut std::io::sink(),
    );
    match &report.status {
        RunStatus::Failed { failure, message } => {
            assert_eq!(*failure, RunFailure::Dispatcher);
            assert!(message.contains("window closed"), "{message}");
        }
        other => panic!("unexpected status: {other:?}"),
    }
}

#[test]
fn slow_operator_times_the_run_out() {
    let config = SessionConfig::default().with_wait_timeout(Duration::from_millis(50));
    let controller = Controller::new(config);
    let mut operator = |_: &mut Prompt| -> anyhow::Result<()> {
        thread::sleep(Duration::from_millis(300));
        Ok(())
    };
    let report = controller.run(
        AskAll::new(vec![Question::confirm("q1", "proceed?", true)]),
        &mut operator,
        &mut std::io::sink(),
    );
    match &report.status {
        RunStatus::Failed { failure, message } => {
            assert_eq!(*failure, RunFailure::OperatorTimeout);
            assert!(message.contains("operator did not respond in time"), "{message}");
        }
        other => panic!("unexpected status: {other:?}"),
    }
}

#[test]
fn versioned_payloads_work_end_to_end() {
    let controller = Controller::new(SessionConfig::default().with_schema_version(3));
    let report = controller.run(
        AskAll::new(vec![Question::multi_select("q3", "pick", &["x", "y"], &["y"])]),
        &mut AcceptDefaults,
        &mut std::io::sink(),
    );
    assert_eq!(
        decode_answers(&artifact_of(report))[0].value(),
        &AnswerValue::Choices(vec!["y".into()])
    );
}

#[test]
fn independent_sessions_run_side_by_side() {
    let runs: Vec<_> = (0..3)
        .map(|n| {
            thread::spawn(move || {
                let controller = Controller::new(SessionConfig::default());
                let mut operator = move |prompt: &mut Prompt| -> anyhow::Result<()> {
                    prompt.set_text(format!("session-{n}"));
                    Ok(())
                };
                controller.run(
                    AskAll::new(vec![Question::input("name", "name?", None)]),
                    &mut operator,
                    &mut std::io::sink(),
                )
            })
        })
        .collect();

    for (n, run) in runs.into_iter().enumerate() {
        let artifact = artifact_of(run.join().unwrap());
        assert_eq!(
            decode_answers(&artifact)[0].value(),
            &AnswerValue::Text(format!("session-{n}"))
        );
    }
}

#[test]
fn oversized_answer_leaves_the_question_unanswered() {
    let mut bench = Bench::new(&SessionConfig::default().with_buffer_len(256));
    let worker =
        bench.on_worker(|session| session.host().ask(&Question::input("q", "name?", None)));
    bench.next_question();
    bench.dispatcher.reset();
    bench
        .dispatcher
        .begin_from_buffer()
        .unwrap()
        .set_text("x".repeat(512));
    let err = bench.dispatcher.confirm().unwrap_err();
    assert!(matches!(
        err,
        qa_dispatcher::DispatchError::Codec(CodecError::PayloadTooLarge { .. })
    ));
    assert!(matches!(worker.join().unwrap(), Err(HostError::ExchangeAborted)));
    assert_eq!(bench.buffer.phase(), ExchangePhase::Idle);
}
