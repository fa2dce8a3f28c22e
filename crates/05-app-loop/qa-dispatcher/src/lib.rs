//! Controller side of the blocking question/answer exchange.
//!
//! The [`Controller`] owns the shared buffer and the worker lifecycle. Each
//! question the worker raises is rendered as a [`Prompt`], filled in by an
//! [`Operator`], and written back by the [`Dispatcher`].

mod controller;
mod dispatcher;
mod operator;
mod prompt;

pub use controller::{classify, Controller, RunFailure, RunReport, RunStatus, TerminalSink};
pub use dispatcher::{DispatchError, DispatchResult, DispatchState, Dispatcher};
pub use operator::{AcceptDefaults, Operator};
pub use prompt::{Control, Prompt};
