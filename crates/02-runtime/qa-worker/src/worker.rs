//! Dedicated worker thread hosting compute units.
//!
//! The controller drives the worker with [`ControlMsg`]s and listens for
//! [`WorkerEvent`]s. A worker must be configured before it runs anything:
//! `Configure` builds the [`Session`] and the worker answers with
//! [`WorkerEvent::Ready`]. The session lives until the worker exits.

use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::anyhow;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use thiserror::Error;

use crate::compute::ComputeUnit;
use crate::config::StartupConfig;
use crate::event::{ControlMsg, WorkerEvent};
use crate::session::Session;

/// How long `configure` waits for the readiness handshake.
pub const READY_TIMEOUT: Duration = Duration::from_secs(10);

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("worker thread is gone")]
    Disconnected,

    #[error("worker did not acknowledge its configuration within {0:?}")]
    NotReady(Duration),

    #[error("expected {expected}, worker sent {found}")]
    UnexpectedEvent {
        expected: &'static str,
        found: String,
    },

    #[error("worker thread panicked")]
    Panicked,
}

/// Controller-side handle to a running worker thread.
#[derive(Debug)]
pub struct WorkerHandle {
    control: Sender<ControlMsg>,
    events: Receiver<WorkerEvent>,
    join: Option<JoinHandle<()>>,
}

/// Starts a worker thread waiting for its startup configuration.
pub fn spawn_worker(name: &str) -> WorkerResult<WorkerHandle> {
    let (control_tx, control_rx) = crossbeam_channel::unbounded();
    let (event_tx, event_rx) = crossbeam_channel::unbounded();
    let join = thread::Builder::new()
        .name(name.to_owned())
        .spawn(move || worker_main(control_rx, event_tx))
        .map_err(WorkerError::Spawn)?;
    tracing::debug!(name, "worker spawned");
    Ok(WorkerHandle {
        control: control_tx,
        events: event_rx,
        join: Some(join),
    })
}

impl WorkerHandle {
    /// Sends the startup configuration and waits for the readiness handshake.
    ///
    /// Returns whether the worker ended up interactive.
    pub fn configure(&self, startup: StartupConfig) -> WorkerResult<bool> {
        self.configure_within(startup, READY_TIMEOUT)
    }

    pub fn configure_within(&self, startup: StartupConfig, limit: Duration) -> WorkerResult<bool> {
        self.send(ControlMsg::Configure(startup))?;
        match self.events.recv_timeout(limit) {
            Ok(WorkerEvent::Ready { interactive }) => {
                tracing::debug!(interactive, "worker ready");
                Ok(interactive)
            }
            Ok(other) => Err(WorkerError::UnexpectedEvent {
                expected: "Ready",
                found: format!("{other:?}"),
            }),
            Err(RecvTimeoutError::Timeout) => Err(WorkerError::NotReady(limit)),
            Err(RecvTimeoutError::Disconnected) => Err(WorkerError::Disconnected),
        }
    }

    /// Hands a compute unit to the worker. Progress arrives on [`WorkerHandle::events`].
    pub fn run(&self, unit: Box<dyn ComputeUnit>) -> WorkerResult<()> {
        tracing::debug!(unit = unit.name(), "submitting compute unit");
        self.send(ControlMsg::Run(unit))
    }

    pub fn events(&self) -> &Receiver<WorkerEvent> {
        &self.events
    }

    /// Stops the worker after its current task and joins it.
    pub fn shutdown(mut self) -> WorkerResult<()> {
        // A worker that already exited has dropped its receiver; joining still applies.
        let _ = self.control.send(ControlMsg::Shutdown);
        match self.join.take() {
            Some(join) => join.join().map_err(|_| WorkerError::Panicked),
            None => Ok(()),
        }
    }

    fn send(&self, msg: ControlMsg) -> WorkerResult<()> {
        self.control
            .send(msg)
            .map_err(|_| WorkerError::Disconnected)
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        // Detach rather than join: the worker may be parked on an answer
        // that will never come.
        if self.join.is_some() {
            let _ = self.control.send(ControlMsg::Shutdown);
        }
    }
}

fn worker_main(control: Receiver<ControlMsg>, events: Sender<WorkerEvent>) {
    let mut session: Option<Session> = None;
    for msg in control.iter() {
        tracing::trace!(?msg, "worker received");
        let event = match msg {
            ControlMsg::Configure(startup) => {
                let created = Session::new(startup, events.clone());
                let interactive = created.is_interactive();
                session = Some(created);
                WorkerEvent::Ready { interactive }
            }
            ControlMsg::Run(mut unit) => {
                let result = match &session {
                    Some(session) => session.run(unit.as_mut()),
                    None => Err(anyhow!("worker received a compute unit before its configuration")),
                };
                WorkerEvent::RunFinished(result)
            }
            ControlMsg::Shutdown => break,
        };
        if events.send(event).is_err() {
            break;
        }
    }
    tracing::debug!("worker exiting");
}
