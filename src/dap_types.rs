use std::path::PathBuf;

use probe_bridge_config::DebugConfig;
use probe_bridge_dap::{Breakpoint, SessionEvent, SessionId, StackFrame, StepKind, Thread};

/// Commands sent from the main thread to the async DAP task.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum HostCommand {
    /// Connect and run the handshake, installing `breakpoints` before the
    /// target is let go.
    Start {
        config: DebugConfig,
        breakpoints: Vec<(PathBuf, Vec<i64>)>,
    },
    SetBreakpoints {
        file: PathBuf,
        lines: Vec<i64>,
    },
    SetInstructionBreakpoints(Vec<u64>),
    Continue {
        thread_id: Option<i64>,
    },
    Step {
        kind: StepKind,
        thread_id: Option<i64>,
    },
    Pause {
        thread_id: Option<i64>,
    },
    Threads,
    StackTrace {
        thread_id: Option<i64>,
    },
    Evaluate {
        expression: String,
    },
    Breakpoints,
    Quit,
}

/// Events sent from the async DAP task back to the main thread.
#[derive(Debug)]
pub(crate) enum HostEvent {
    /// Handshake finished; the target is running.
    Started {
        session: SessionId,
        capabilities: Vec<&'static str>,
    },
    /// Something the backend sent.
    Session(SessionEvent),
    Breakpoints(Vec<Breakpoint>),
    Threads(Vec<Thread>),
    Stack(Vec<StackFrame>),
    Evaluated(String),
    /// Informational message.
    Info(String),
    /// Error message.
    Error(String),
    /// The task has shut down; nothing follows.
    Finished,
}
