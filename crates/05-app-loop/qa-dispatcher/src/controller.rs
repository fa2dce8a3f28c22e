//! Controller thread orchestration for one compute run.
//!
//! The controller decides interactivity once, before the worker starts,
//! allocates the shared buffer when interactive, and then pumps worker
//! events: terminal output goes to the [`TerminalSink`], questions go
//! through the [`Dispatcher`] and the [`Operator`], and `RunFinished` ends
//! the run with a single [`RunStatus`].

use std::fmt;
use std::io;

use qa_abi::Question;
use qa_transport::{Capabilities, SharedBuffer, TransportError};
use qa_worker::{
    spawn_worker, ComputeUnit, HostError, InteractiveMode, SessionConfig, StartupConfig,
    WorkerEvent,
};

use crate::dispatcher::{DispatchError, Dispatcher};
use crate::operator::Operator;

/// Destination for text the compute unit prints.
pub trait TerminalSink {
    fn write_output(&mut self, bytes: &[u8]) -> io::Result<()>;
}

impl<W: io::Write> TerminalSink for W {
    fn write_output(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_all(bytes)?;
        self.flush()
    }
}

/// Why a run failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunFailure {
    /// The worker gave up waiting for an answer.
    OperatorTimeout,
    /// A message did not fit or did not parse.
    Codec,
    /// The platform or configuration could not support the exchange.
    Capability,
    /// The compute unit returned an error of its own.
    ComputeUnit,
    /// The controller refused or could not complete a prompt.
    Dispatcher,
    /// The worker thread could not be started or went away.
    Worker,
}

/// Terminal status of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunStatus {
    Succeeded { artifact: Vec<u8> },
    Failed { failure: RunFailure, message: String },
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Succeeded { .. })
    }

    pub fn failure(&self) -> Option<RunFailure> {
        match self {
            RunStatus::Succeeded { .. } => None,
            RunStatus::Failed { failure, .. } => Some(*failure),
        }
    }

    fn failed(failure: RunFailure, message: impl Into<String>) -> Self {
        RunStatus::Failed {
            failure,
            message: message.into(),
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Succeeded { artifact } => {
                write!(f, "run succeeded ({} byte artifact)", artifact.len())
            }
            RunStatus::Failed { message, .. } => write!(f, "run failed: {message}"),
        }
    }
}

/// Outcome of [`Controller::run`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    pub status: RunStatus,
    pub interactive: bool,
    pub questions_answered: usize,
}

pub struct Controller {
    config: SessionConfig,
    capabilities: Capabilities,
}

impl Controller {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_capabilities(config, Capabilities::detect())
    }

    pub fn with_capabilities(config: SessionConfig, capabilities: Capabilities) -> Self {
        Self {
            config,
            capabilities,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether the run will offer questions to the operator.
    ///
    /// False when the platform lacks shared memory or blocking wait, or when
    /// the configuration skips questions.
    pub fn interactive_available(&self) -> bool {
        self.config.interactive == InteractiveMode::Auto
            && self.capabilities.interactive_supported()
    }

    /// Runs `unit` on a fresh worker thread until it finishes.
    ///
    /// Must be called on the controller thread, which is the thread that owns
    /// the shared buffer and therefore never blocks on it.
    pub fn run(
        &self,
        unit: Box<dyn ComputeUnit>,
        operator: &mut dyn Operator,
        sink: &mut dyn TerminalSink,
    ) -> RunReport {
        let interactive = self.interactive_available();
        if !interactive && self.config.interactive == InteractiveMode::Auto {
            if let Err(err) = self.capabilities.require_interactive() {
                tracing::warn!(error = %err, "falling back to non-interactive mode");
            }
        }

        let mut report = RunReport {
            status: RunStatus::failed(RunFailure::Worker, "run did not start"),
            interactive,
            questions_answered: 0,
        };

        let (startup, mut dispatcher) = if interactive {
            match SharedBuffer::new(self.config.buffer_len) {
                Ok(buffer) => (
                    StartupConfig::interactive(buffer.clone(), &self.config),
                    Some(Dispatcher::new(buffer, self.config.codec())),
                ),
                Err(err) => {
                    report.status = RunStatus::failed(classify_transport(&err), err.to_string());
                    return report;
                }
            }
        } else {
            (StartupConfig::non_interactive(&self.config), None)
        };

        let worker = match spawn_worker("qa-worker") {
            Ok(worker) => worker,
            Err(err) => {
                report.status = RunStatus::failed(RunFailure::Worker, err.to_string());
                return report;
            }
        };
        let outcome = worker
            .configure(startup)
            .and_then(|_| worker.run(unit))
            .map_err(|err| RunStatus::failed(RunFailure::Worker, err.to_string()));
        if let Err(status) = outcome {
            report.status = status;
            return report;
        }

        let mut dispatch_failure: Option<RunStatus> = None;
        report.status = loop {
            let event = match worker.events().recv() {
                Ok(event) => event,
                Err(_) => {
                    break RunStatus::failed(
                        RunFailure::Worker,
                        "worker exited before finishing the run",
                    )
                }
            };
            match event {
                WorkerEvent::TerminalOutput(bytes) => {
                    if let Err(err) = sink.write_output(&bytes) {
                        tracing::warn!(error = %err, "terminal sink rejected output");
                    }
                }
                WorkerEvent::QuestionAvailable(question) => {
                    let Some(dispatcher) = dispatcher.as_mut() else {
                        tracing::warn!(
                            id = %question.id,
                            "question raised without a shared buffer"
                        );
                        continue;
                    };
                    if dispatch_failure.is_some() {
                        dispatcher.buffer().abort_exchange();
                        continue;
                    }
                    match dispatch(dispatcher, operator, &question) {
                        Ok(()) => report.questions_answered += 1,
                        Err(status) => {
                            tracing::error!(
                                id = %question.id,
                                %status,
                                "aborting outstanding question"
                            );
                            dispatcher.buffer().abort_exchange();
                            dispatch_failure = Some(status);
                        }
                    }
                }
                WorkerEvent::RunFinished(result) => {
                    break match (result, dispatch_failure.take()) {
                        (_, Some(status)) => status,
                        (Ok(artifact), None) => RunStatus::Succeeded { artifact },
                        (Err(err), None) => {
                            let failure = classify(&err);
                            tracing::error!(
                                ?failure,
                                error = %format!("{err:#}"),
                                "compute run failed"
                            );
                            RunStatus::failed(failure, format!("{err:#}"))
                        }
                    };
                }
                WorkerEvent::Ready { .. } => tracing::trace!("late readiness event"),
            }
        };

        if let Err(err) = worker.shutdown() {
            tracing::warn!(error = %err, "worker did not shut down cleanly");
        }
        tracing::info!(
            status = %report.status,
            answered = report.questions_answered,
            "run complete"
        );
        report
    }
}

/// Runs one exchange through the dispatcher. Returns the failure status on error.
fn dispatch(
    dispatcher: &mut Dispatcher,
    operator: &mut dyn Operator,
    announced: &Question,
) -> Result<(), RunStatus> {
    dispatcher.reset();
    let prompt = dispatcher
        .begin_from_buffer()
        .map_err(|err| dispatch_status(&err))?;
    if prompt.question().id != announced.id {
        return Err(RunStatus::failed(
            RunFailure::Dispatcher,
            format!(
                "buffer holds question {:?}, expected {:?}",
                prompt.question().id,
                announced.id
            ),
        ));
    }
    operator
        .respond(prompt)
        .map_err(|err| {
            RunStatus::failed(RunFailure::Dispatcher, format!("operator failed: {err:#}"))
        })?;
    match dispatcher.confirm() {
        Ok(_) => Ok(()),
        // The worker withdrew after its timeout; its own error ends the run.
        Err(DispatchError::Transport(TransportError::NoPendingQuestion { phase })) => {
            tracing::warn!(?phase, id = %announced.id, "answer arrived after the worker gave up");
            Ok(())
        }
        Err(err) => Err(dispatch_status(&err)),
    }
}

fn dispatch_status(err: &DispatchError) -> RunStatus {
    let failure = match err {
        DispatchError::Codec(_) => RunFailure::Codec,
        DispatchError::Transport(err) => classify_transport(err),
        DispatchError::InvalidState { .. } | DispatchError::Problem(_) => RunFailure::Dispatcher,
    };
    RunStatus::failed(failure, err.to_string())
}

fn classify_transport(err: &TransportError) -> RunFailure {
    match err {
        TransportError::CapabilityUnavailable(_) | TransportError::WaitOnControllerThread => {
            RunFailure::Capability
        }
        _ => RunFailure::Dispatcher,
    }
}

/// Maps a compute-unit error to a failure kind by the host error it carries.
pub fn classify(err: &anyhow::Error) -> RunFailure {
    let Some(host) = err.chain().find_map(|cause| cause.downcast_ref::<HostError>()) else {
        return RunFailure::ComputeUnit;
    };
    tracing::debug!(
        question_scoped = host.is_question_scoped(),
        code = host.code(),
        "host error ended the run"
    );
    match host {
        HostError::WaitTimedOut { .. } => RunFailure::OperatorTimeout,
        HostError::Codec(_) => RunFailure::Codec,
        HostError::NoSharedBufferConfigured => RunFailure::Capability,
        HostError::Transport(err) => classify_transport(err),
        _ => RunFailure::ComputeUnit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};
    use std::time::Duration;

    #[test]
    fn timeout_is_reported_distinctly() {
        let err = anyhow::Error::new(HostError::WaitTimedOut {
            timeout: Duration::from_secs(1),
        })
        .context("asking q1");
        assert_eq!(classify(&err), RunFailure::OperatorTimeout);
        assert!(format!("{err:#}").contains("operator did not respond in time"));
    }

    #[test]
    fn plain_errors_blame_the_compute_unit() {
        assert_eq!(classify(&anyhow!("boom")), RunFailure::ComputeUnit);
        let err = anyhow::Error::new(HostError::Codec(qa_codec::CodecError::PayloadTooLarge {
            len: 9,
            capacity: 1,
        }));
        assert_eq!(classify(&err), RunFailure::Codec);
    }

    #[test]
    fn skipping_questions_disables_interactivity() {
        let controller = Controller::with_capabilities(
            SessionConfig::non_interactive(),
            Capabilities::detect(),
        );
        assert!(!controller.interactive_available());

        let controller =
            Controller::with_capabilities(SessionConfig::default(), Capabilities::none());
        assert!(!controller.interactive_available());
    }

    #[test]
    fn status_display_is_human_readable() {
        let status =
            RunStatus::failed(RunFailure::OperatorTimeout, "operator did not respond in time");
        assert_eq!(status.to_string(), "run failed: operator did not respond in time");
        assert_eq!(status.failure(), Some(RunFailure::OperatorTimeout));
        assert!(RunStatus::Succeeded { artifact: vec![1] }.is_success());
    }
}
