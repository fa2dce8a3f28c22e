//! Worker-side runtime for the blocking question/answer exchange.
//!
//! A worker thread hosts one [`Session`]. Compute units run inside it and
//! resolve questions through [`HostContext::fetch_answer`]; interactive
//! questions go through the [`HostAdapter`], which parks the worker thread on
//! the shared buffer until the controller answers.

mod compute;
mod config;
mod error;
mod event;
mod guest;
mod host;
mod memory;
mod session;
mod worker;

pub use compute::{ComputeUnit, HostContext};
pub use config::{InteractiveMode, SessionConfig, StartupConfig, DEFAULT_ANSWER_CAPACITY};
pub use error::*;
pub use event::{ControlMsg, WorkerEvent};
pub use guest::{GuestQa, GUEST_MEMORY_LEN};
pub use host::HostAdapter;
pub use memory::{GuestMemory, LinearMemory, MemoryError};
pub use session::Session;
pub use worker::{spawn_worker, WorkerError, WorkerHandle, WorkerResult, READY_TIMEOUT};
