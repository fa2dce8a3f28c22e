//! Two-thread harness: the test thread plays the controller, a spawned
//! thread plays the worker.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use qa_abi::{Answer, Question};
use qa_dispatcher::{Dispatcher, Operator, Prompt, RunReport, RunStatus};
use qa_transport::SharedBuffer;
use qa_worker::{
    ComputeUnit, HostContext, LinearMemory, Session, SessionConfig, StartupConfig, WorkerEvent,
};

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Controller end of an interactive session whose worker side runs elsewhere.
pub struct Bench {
    pub buffer: SharedBuffer,
    pub session: Arc<Session>,
    pub events: Receiver<WorkerEvent>,
    pub dispatcher: Dispatcher,
}

impl Bench {
    /// Allocates the buffer on the calling thread, making it the controller.
    pub fn new(config: &SessionConfig) -> Self {
        let buffer = SharedBuffer::new(config.buffer_len).expect("allocate shared buffer");
        let (tx, events) = crossbeam_channel::unbounded();
        let session = Arc::new(Session::new(
            StartupConfig::interactive(buffer.clone(), config),
            tx,
        ));
        let dispatcher = Dispatcher::new(buffer.clone(), config.codec());
        Self {
            buffer,
            session,
            events,
            dispatcher,
        }
    }

    /// Runs `f` against the session on a worker thread.
    pub fn on_worker<T, F>(&self, f: F) -> thread::JoinHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(&Session) -> T + Send + 'static,
    {
        let session = Arc::clone(&self.session);
        thread::spawn(move || f(&session))
    }

    /// Calls `ask_question` through guest memory on a worker thread and
    /// returns the code plus whatever was written to the answer buffer.
    pub fn ask_through_memory(&self, question: &Question) -> thread::JoinHandle<(i32, Vec<u8>)> {
        let json = serde_json::to_vec(question).expect("encode question");
        self.on_worker(move |session| {
            let mut mem = LinearMemory::new(1 << 20);
            let (ptr, len) = mem.store(&json).expect("store question");
            let out = mem.reserve(session.answer_capacity()).expect("reserve answer");
            let ret = session.host().ask_question(&mut mem, ptr, len, out);
            let written = if ret > 0 {
                qa_worker::GuestMemory::read(&mem, out, ret as u32)
                    .expect("read answer")
                    .to_vec()
            } else {
                Vec::new()
            };
            (ret, written)
        })
    }

    pub fn next_question(&self) -> Question {
        match self.events.recv_timeout(EVENT_TIMEOUT) {
            Ok(WorkerEvent::QuestionAvailable(question)) => question,
            other => panic!("expected a question, got {other:?}"),
        }
    }

    /// Waits for the next question and answers it through the dispatcher.
    pub fn answer_next(&mut self, operator: &mut dyn Operator) -> Answer {
        let announced = self.next_question();
        self.dispatcher.reset();
        let prompt = self.dispatcher.begin_from_buffer().expect("render prompt");
        assert_eq!(prompt.question(), &announced);
        operator.respond(prompt).expect("operator responds");
        self.dispatcher.confirm().expect("confirm answer")
    }
}

/// Compute unit asking a fixed list of questions and returning the answers as JSON.
pub struct AskAll {
    pub questions: Vec<Question>,
}

impl AskAll {
    pub fn new(questions: Vec<Question>) -> Box<Self> {
        Box::new(Self { questions })
    }
}

impl ComputeUnit for AskAll {
    fn name(&self) -> &str {
        "ask-all"
    }

    fn run(&mut self, host: &mut HostContext<'_>) -> anyhow::Result<Vec<u8>> {
        let mut answers = Vec::new();
        for question in std::mem::take(&mut self.questions) {
            host.print(format!("asking {}\n", question.id))?;
            answers.push(host.fetch_answer(question)?);
        }
        Ok(serde_json::to_vec(&answers)?)
    }
}

/// Operator that records every prompt it sees and applies `edit`.
pub struct Recording<F> {
    pub seen: Arc<Mutex<Vec<Question>>>,
    edit: F,
}

impl<F> Recording<F>
where
    F: FnMut(&mut Prompt) -> anyhow::Result<()>,
{
    pub fn new(edit: F) -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
            edit,
        }
    }
}

impl<F> Operator for Recording<F>
where
    F: FnMut(&mut Prompt) -> anyhow::Result<()>,
{
    fn respond(&mut self, prompt: &mut Prompt) -> anyhow::Result<()> {
        self.seen.lock().push(prompt.question().clone());
        (self.edit)(prompt)
    }
}

pub fn decode_answers(artifact: &[u8]) -> Vec<Answer> {
    serde_json::from_slice(artifact).expect("artifact holds answers")
}

/// Artifact of a successful run; panics with the failure otherwise.
pub fn artifact_of(report: RunReport) -> Vec<u8> {
    match report.status {
        RunStatus::Succeeded { artifact } => artifact,
        failed => panic!("run failed: {failed}"),
    }
}
