use std::time::Duration;

use qa_codec::MessageCodec;
use qa_transport::{SharedBuffer, DEFAULT_BUFFER_LEN};

/// Size of the answer buffer the compute unit reserves in its own memory.
pub const DEFAULT_ANSWER_CAPACITY: usize = 65_536;

/// Whether the run may ask the operator at all.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InteractiveMode {
    /// Interactive when the platform supports it, skipped otherwise.
    #[default]
    Auto,
    /// Every question is answered from its default.
    Disabled,
}

/// Knobs for one compute session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Total length of the shared buffer, control region included.
    pub buffer_len: usize,
    /// Upper bound on how long the worker stays parked for one answer.
    /// `None` waits forever.
    pub wait_timeout: Option<Duration>,
    /// Schema version stamped on buffer payloads. `None` keeps them unversioned.
    pub schema_version: Option<u32>,
    /// Answer buffer size the compute unit reserves per question.
    pub answer_capacity: usize,
    pub interactive: InteractiveMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            buffer_len: DEFAULT_BUFFER_LEN,
            wait_timeout: None,
            schema_version: None,
            answer_capacity: DEFAULT_ANSWER_CAPACITY,
            interactive: InteractiveMode::Auto,
        }
    }
}

impl SessionConfig {
    pub fn non_interactive() -> Self {
        Self {
            interactive: InteractiveMode::Disabled,
            ..Self::default()
        }
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    pub fn with_schema_version(mut self, version: u32) -> Self {
        self.schema_version = Some(version);
        self
    }

    pub fn with_buffer_len(mut self, len: usize) -> Self {
        self.buffer_len = len;
        self
    }

    pub fn codec(&self) -> MessageCodec {
        match self.schema_version {
            Some(version) => MessageCodec::with_schema_version(version),
            None => MessageCodec::new(),
        }
    }
}

/// One-shot startup message sent to the worker before any compute task.
///
/// Carrying a buffer enables interactive mode; carrying none tells the
/// compute unit to skip every question.
#[derive(Clone, Debug)]
pub struct StartupConfig {
    pub channel: Option<SharedBuffer>,
    pub codec: MessageCodec,
    pub wait_timeout: Option<Duration>,
    pub answer_capacity: usize,
}

impl StartupConfig {
    pub fn interactive(channel: SharedBuffer, config: &SessionConfig) -> Self {
        Self {
            channel: Some(channel),
            codec: config.codec(),
            wait_timeout: config.wait_timeout,
            answer_capacity: config.answer_capacity,
        }
    }

    pub fn non_interactive(config: &SessionConfig) -> Self {
        Self {
            channel: None,
            codec: config.codec(),
            wait_timeout: None,
            answer_capacity: config.answer_capacity,
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.channel.is_some()
    }
}
