//! Per-worker session context.
//!
//! A [`Session`] owns everything one compute session needs: the optional
//! shared buffer, the codec settings, the event channel back to the
//! controller, and the last host error. It is created when the worker applies
//! its startup configuration and dropped when the worker exits, so independent
//! sessions never share state.

use std::time::Duration;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use qa_codec::MessageCodec;
use qa_transport::SharedBuffer;

use crate::compute::{ComputeUnit, HostContext};
use crate::config::StartupConfig;
use crate::error::{HostError, HostResult};
use crate::event::WorkerEvent;
use crate::host::HostAdapter;

pub struct Session {
    channel: Option<SharedBuffer>,
    codec: MessageCodec,
    wait_timeout: Option<Duration>,
    answer_capacity: usize,
    events: Sender<WorkerEvent>,
    last_error: Mutex<Option<HostError>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("interactive", &self.is_interactive())
            .field("codec", &self.codec)
            .field("wait_timeout", &self.wait_timeout)
            .field("answer_capacity", &self.answer_capacity)
            .finish()
    }
}

impl Session {
    pub fn new(startup: StartupConfig, events: Sender<WorkerEvent>) -> Self {
        tracing::debug!(
            interactive = startup.is_interactive(),
            timeout = ?startup.wait_timeout,
            schema_version = ?startup.codec.schema_version(),
            "session created"
        );
        Self {
            channel: startup.channel,
            codec: startup.codec,
            wait_timeout: startup.wait_timeout,
            answer_capacity: startup.answer_capacity,
            events,
            last_error: Mutex::new(None),
        }
    }

    /// True when the session was started with a shared buffer.
    pub fn is_interactive(&self) -> bool {
        self.channel.is_some()
    }

    pub fn codec(&self) -> MessageCodec {
        self.codec
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout
    }

    pub fn answer_capacity(&self) -> usize {
        self.answer_capacity
    }

    /// Host adapter bound to this session.
    pub fn host(&self) -> HostAdapter<'_> {
        HostAdapter::new(self)
    }

    /// Runs `unit` to completion on the calling thread.
    pub fn run(&self, unit: &mut dyn ComputeUnit) -> anyhow::Result<Vec<u8>> {
        let span = tracing::debug_span!("compute", unit = unit.name());
        let _enter = span.enter();
        let mut ctx = HostContext::new(self);
        let result = unit.run(&mut ctx);
        match &result {
            Ok(artifact) => tracing::debug!(len = artifact.len(), "compute unit finished"),
            Err(err) => tracing::error!(error = %err, "compute unit failed"),
        }
        result
    }

    /// Forwards text printed by the compute unit to the controller.
    pub fn print(&self, bytes: &[u8]) -> HostResult<()> {
        self.emit(WorkerEvent::TerminalOutput(bytes.to_vec()))
    }

    /// Takes the error recorded by the last failed `ask_question` call.
    pub fn take_last_error(&self) -> Option<HostError> {
        self.last_error.lock().take()
    }

    pub(crate) fn record_error(&self, err: HostError) {
        *self.last_error.lock() = Some(err);
    }

    pub(crate) fn channel(&self) -> HostResult<&SharedBuffer> {
        self.channel
            .as_ref()
            .ok_or(HostError::NoSharedBufferConfigured)
    }

    pub(crate) fn emit(&self, event: WorkerEvent) -> HostResult<()> {
        self.events
            .send(event)
            .map_err(|_| HostError::ControllerGone)
    }
}
