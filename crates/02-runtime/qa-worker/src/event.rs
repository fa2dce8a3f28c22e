use qa_abi::Question;

use crate::compute::ComputeUnit;
use crate::config::StartupConfig;

/// Messages flowing from the worker thread to the controller.
#[derive(Debug)]
pub enum WorkerEvent {
    /// Startup configuration applied; the worker accepts compute tasks.
    Ready { interactive: bool },
    /// A question sits in the shared buffer and the worker is about to block.
    QuestionAvailable(Question),
    /// Text the compute unit printed.
    TerminalOutput(Vec<u8>),
    /// The compute unit returned. `Ok` carries the run artifact.
    RunFinished(anyhow::Result<Vec<u8>>),
}

/// Messages flowing from the controller to the worker thread.
pub enum ControlMsg {
    Configure(StartupConfig),
    Run(Box<dyn ComputeUnit>),
    Shutdown,
}

impl std::fmt::Debug for ControlMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlMsg::Configure(startup) => f
                .debug_struct("Configure")
                .field("interactive", &startup.is_interactive())
                .finish(),
            ControlMsg::Run(unit) => f.debug_tuple("Run").field(&unit.name()).finish(),
            ControlMsg::Shutdown => f.write_str("Shutdown"),
        }
    }
}
