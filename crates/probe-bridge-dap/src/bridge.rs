//! Host-facing adapter bridge.
//!
//! [`DapBridge`] turns host intents into DAP requests on one session and
//! waits for their answers. A dispatch task drains the transport into the
//! session state machine, so callers only ever wait on their own response.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use probe_bridge_config::{AdapterBinary, DapSettings, DebugConfig, RequestKind};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::timeout;

use crate::breakpoint::Breakpoint;
use crate::capabilities::DapCapabilities;
use crate::error::DapError;
use crate::protocol::{
    Command, ContinueArguments, DisconnectArguments, EvaluateArguments, EvaluateResponseBody,
    InitializeRequestArguments, NextArguments, PauseArguments, Response, Scope, ScopesArguments,
    ScopesResponseBody, SetBreakpointsArguments, SetInstructionBreakpointsArguments, Source,
    StackFrame, StackTraceArguments, StackTraceResponseBody, StepInArguments, StepOutArguments,
    Thread, ThreadsResponseBody, Variable, VariablesArguments, VariablesResponseBody,
};
use crate::session::{
    DapSession, PendingHandle, SessionEvent, SessionId, SessionState, StopSnapshot,
    TerminationReason,
};
use crate::transport::{self, Connection, ConnectionGuard, Target, TransportEvent};

/// Name reported in `initialize`.
const CLIENT_ID: &str = "probe-bridge";

/// Adapter id reported in `initialize`.
const ADAPTER_ID: &str = "probe-rs";

/// Which step request to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// `next`
    Over,
    /// `stepIn`
    In,
    /// `stepOut`
    Out,
}

impl StepKind {
    fn command(self, thread_id: i64) -> Command {
        match self {
            StepKind::Over => Command::Next(NextArguments {
                thread_id,
                granularity: None,
            }),
            StepKind::In => Command::StepIn(StepInArguments {
                thread_id,
                target_id: None,
                granularity: None,
            }),
            StepKind::Out => Command::StepOut(StepOutArguments {
                thread_id,
                granularity: None,
            }),
        }
    }
}

/// One debug session as seen by the host.
pub struct DapBridge {
    id: SessionId,
    config: DebugConfig,
    session: Arc<Mutex<DapSession>>,
    state_rx: watch::Receiver<SessionState>,
    request_timeout: Option<Duration>,
    guard: ConnectionGuard,
}

impl DapBridge {
    /// Reach the backend the configuration points at, starting
    /// `probe-rs dap-server` when no `server` is configured.
    pub async fn connect(config: DebugConfig, settings: &DapSettings) -> Result<Self, DapError> {
        let binary = AdapterBinary::resolve(&config, settings, None)?;
        let target = Target::from_adapter_binary(&binary, config.resolved_cwd());
        Self::connect_to(&target, config, settings).await
    }

    /// Connect to an explicit target.
    pub async fn connect_to(
        target: &Target,
        config: DebugConfig,
        settings: &DapSettings,
    ) -> Result<Self, DapError> {
        let connection = transport::connect(target, settings.connect_timeout()).await?;
        Ok(Self::from_connection(connection, config, settings))
    }

    /// Wrap an open connection. Must be called inside a tokio runtime.
    pub fn from_connection(
        connection: Connection,
        config: DebugConfig,
        settings: &DapSettings,
    ) -> Self {
        let (writer, events, mut guard) = connection.into_parts();
        let session =
            DapSession::new(writer).with_event_capacity(settings.event_channel_capacity);
        let id = session.id();
        let state_rx = session.watch_state();
        let session = Arc::new(Mutex::new(session));
        guard.track(tokio::spawn(dispatch(session.clone(), events)));
        tracing::info!(session = %id, request = config.request.command(), "debug session opened");

        Self {
            id,
            config,
            session,
            state_rx,
            request_timeout: settings.request_timeout(),
            guard,
        }
    }

    /// Session id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The configuration this session was opened with.
    pub fn config(&self) -> &DebugConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Send `initialize` and return what the adapter supports.
    pub async fn initialize(&self) -> Result<DapCapabilities, DapError> {
        let args = InitializeRequestArguments {
            client_id: Some(CLIENT_ID.into()),
            client_name: Some(CLIENT_ID.into()),
            adapter_id: ADAPTER_ID.into(),
            locale: None,
            lines_start_at1: Some(true),
            columns_start_at1: Some(true),
            path_format: Some("path".into()),
            supports_variable_type: Some(true),
            supports_variable_paging: Some(false),
            supports_run_in_terminal_request: Some(false),
        };
        self.request("initialize", &[SessionState::Idle], Command::Initialize(args))
            .await?;
        Ok(self.capabilities().await)
    }

    /// Send `launch` or `attach`, forwarding the configuration as arguments.
    pub async fn launch(&self) -> Result<(), DapError> {
        let arguments = self.config.to_request_arguments()?;
        let command = match self.config.request {
            RequestKind::Launch => Command::Launch(arguments),
            RequestKind::Attach => Command::Attach(arguments),
        };
        self.request(self.config.request.command(), &[SessionState::Idle], command)
            .await?;
        Ok(())
    }

    /// Wait until the adapter is ready for configuration.
    pub async fn wait_for_initialized(&self) -> Result<(), DapError> {
        let mut state_rx = self.state_rx.clone();
        let ready = state_rx.wait_for(|state| {
            !matches!(state, SessionState::Idle | SessionState::Initializing)
        });
        let waited = match self.request_timeout {
            Some(limit) => timeout(limit, ready).await.map_err(|_| DapError::Timeout {
                command: "initialized".into(),
            })?,
            None => ready.await,
        };
        let state = match waited {
            Ok(state) => *state,
            Err(_) => return Err(DapError::SessionTerminated),
        };
        match state {
            SessionState::Terminating | SessionState::Terminated => {
                Err(DapError::SessionTerminated)
            }
            _ => Ok(()),
        }
    }

    /// Finish configuration; the target starts running.
    pub async fn configuration_done(&self) -> Result<(), DapError> {
        self.request(
            "configurationDone",
            &[SessionState::Initialized, SessionState::Stopped],
            Command::ConfigurationDone,
        )
        .await?;
        Ok(())
    }

    /// Replace the breakpoints of `path`. An empty `lines` clears them.
    pub async fn set_breakpoints(
        &self,
        path: &Path,
        lines: &[i64],
    ) -> Result<Vec<Breakpoint>, DapError> {
        let handle = {
            let mut session = self.session.lock().await;
            check_state(
                &session,
                "set breakpoints",
                &[SessionState::Initialized, SessionState::Running, SessionState::Stopped],
            )?;
            let requested = session.breakpoints_mut().replace_file(path, lines);
            session.submit(Command::SetBreakpoints(SetBreakpointsArguments {
                source: Source {
                    name: path.file_name().map(|n| n.to_string_lossy().into_owned()),
                    path: Some(path.to_string_lossy().into_owned()),
                    source_reference: None,
                },
                breakpoints: Some(requested),
            }))?
        };
        self.await_response(handle).await?;
        Ok(self
            .session
            .lock()
            .await
            .breakpoints()
            .get_for_file(path)
            .to_vec())
    }

    /// Replace all instruction breakpoints.
    pub async fn set_instruction_breakpoints(
        &self,
        addresses: &[u64],
    ) -> Result<Vec<Breakpoint>, DapError> {
        let handle = {
            let mut session = self.session.lock().await;
            check_state(
                &session,
                "set instruction breakpoints",
                &[SessionState::Initialized, SessionState::Running, SessionState::Stopped],
            )?;
            let breakpoints = session.breakpoints_mut().replace_instructions(addresses);
            session.submit(Command::SetInstructionBreakpoints(
                SetInstructionBreakpointsArguments { breakpoints },
            ))?
        };
        self.await_response(handle).await?;
        Ok(self
            .session
            .lock()
            .await
            .breakpoints()
            .instruction_breakpoints()
            .to_vec())
    }

    /// Resume the target.
    pub async fn continue_execution(&self, thread_id: i64) -> Result<(), DapError> {
        self.request(
            "continue",
            &[SessionState::Stopped],
            Command::Continue(ContinueArguments {
                thread_id,
                single_thread: None,
            }),
        )
        .await?;
        Ok(())
    }

    /// Step one line.
    pub async fn step(&self, kind: StepKind, thread_id: i64) -> Result<(), DapError> {
        self.request("step", &[SessionState::Stopped], kind.command(thread_id))
            .await?;
        Ok(())
    }

    /// Halt the target. The resulting `stopped` event arrives separately.
    pub async fn pause(&self, thread_id: i64) -> Result<(), DapError> {
        self.request(
            "pause",
            &[SessionState::Running],
            Command::Pause(PauseArguments { thread_id }),
        )
        .await?;
        Ok(())
    }

    /// Evaluate an expression in the debug console context.
    pub async fn evaluate(
        &self,
        expression: &str,
        frame_id: Option<i64>,
    ) -> Result<EvaluateResponseBody, DapError> {
        let response = self
            .request(
                "evaluate",
                &[SessionState::Initialized, SessionState::Running, SessionState::Stopped],
                Command::Evaluate(EvaluateArguments {
                    expression: expression.to_string(),
                    frame_id,
                    context: Some("repl".into()),
                }),
            )
            .await?;
        response.parse_body()
    }

    /// Threads of the target; answered from the stop snapshot when it has them.
    pub async fn threads(&self) -> Result<Vec<Thread>, DapError> {
        let (handle, generation) = {
            let mut session = self.session.lock().await;
            check_state(
                &session,
                "list threads",
                &[SessionState::Initialized, SessionState::Running, SessionState::Stopped],
            )?;
            if let Some(threads) = session.stop_snapshot().and_then(|s| s.threads.clone()) {
                return Ok(threads);
            }
            (session.submit(Command::Threads)?, session.stop_generation())
        };
        let body: ThreadsResponseBody = self.await_response(handle).await?.parse_body()?;
        let threads = body.threads;
        self.cache_for_stop(generation, |snapshot| {
            snapshot.threads = Some(threads.clone());
        })
        .await;
        Ok(threads)
    }

    /// Stack of `thread_id` at the current stop; cached until the target moves.
    pub async fn stack_trace(&self, thread_id: i64) -> Result<Vec<StackFrame>, DapError> {
        let (handle, generation) = {
            let mut session = self.session.lock().await;
            check_state(&session, "read the stack", &[SessionState::Stopped])?;
            if let Some(frames) = session
                .stop_snapshot()
                .and_then(|s| s.frames.get(&thread_id).cloned())
            {
                return Ok(frames);
            }
            let handle = session.submit(Command::StackTrace(StackTraceArguments {
                thread_id,
                start_frame: None,
                levels: None,
            }))?;
            (handle, session.stop_generation())
        };
        let body: StackTraceResponseBody = self.await_response(handle).await?.parse_body()?;
        let frames = body.stack_frames;
        self.cache_for_stop(generation, |snapshot| {
            snapshot.frames.insert(thread_id, frames.clone());
        })
        .await;
        Ok(frames)
    }

    /// Scopes of a stack frame.
    pub async fn scopes(&self, frame_id: i64) -> Result<Vec<Scope>, DapError> {
        let response = self
            .request(
                "read scopes",
                &[SessionState::Stopped],
                Command::Scopes(ScopesArguments { frame_id }),
            )
            .await?;
        Ok(response.parse_body::<ScopesResponseBody>()?.scopes)
    }

    /// Children of a variables reference.
    pub async fn variables(&self, variables_reference: i64) -> Result<Vec<Variable>, DapError> {
        let response = self
            .request(
                "read variables",
                &[SessionState::Stopped],
                Command::Variables(VariablesArguments {
                    variables_reference,
                }),
            )
            .await?;
        Ok(response.parse_body::<VariablesResponseBody>()?.variables)
    }

    /// End the session.
    ///
    /// The session is terminated locally whatever the backend answers, and
    /// the connection is released. Calling it on an ended session is a
    /// no-op.
    pub async fn disconnect(&mut self, terminate_debuggee: bool) -> Result<(), DapError> {
        let submitted = {
            let mut session = self.session.lock().await;
            if session.state().is_terminal() {
                return Ok(());
            }
            session.submit(Command::Disconnect(DisconnectArguments {
                restart: None,
                terminate_debuggee: Some(terminate_debuggee),
                suspend_debuggee: None,
            }))
        };
        let result = match submitted {
            Ok(handle) => self.await_response(handle).await.map(|_| ()),
            Err(e) => Err(e),
        };

        self.session
            .lock()
            .await
            .terminate(TerminationReason::Disconnected);
        self.guard.close();

        match result {
            // The backend may hang up instead of answering.
            Err(DapError::SessionTerminated | DapError::NotConnected) => Ok(()),
            other => other,
        }
    }

    /// All known breakpoints, source files first.
    pub async fn breakpoints(&self) -> Vec<Breakpoint> {
        self.session.lock().await.breakpoints().all().cloned().collect()
    }

    /// The current stop, if the target is halted.
    pub async fn stop_snapshot(&self) -> Option<StopSnapshot> {
        self.session.lock().await.stop_snapshot().cloned()
    }

    /// Adapter capabilities from `initialize`.
    pub async fn capabilities(&self) -> DapCapabilities {
        self.session.lock().await.capabilities().clone()
    }

    /// Why the session ended, once it has.
    pub async fn termination_reason(&self) -> Option<TerminationReason> {
        self.session.lock().await.termination_reason().cloned()
    }

    /// Receive backend events and the terminal notification.
    pub async fn subscribe(&self) -> mpsc::Receiver<SessionEvent> {
        self.session.lock().await.subscribe()
    }

    async fn request(
        &self,
        operation: &str,
        allowed: &[SessionState],
        command: Command,
    ) -> Result<Response, DapError> {
        let handle = {
            let mut session = self.session.lock().await;
            check_state(&session, operation, allowed)?;
            session.submit(command)?
        };
        self.await_response(handle).await
    }

    async fn await_response(&self, handle: PendingHandle) -> Result<Response, DapError> {
        let limit = match handle.command() {
            // Flashing runs inside launch/attach.
            "launch" | "attach" => None,
            _ => self.request_timeout,
        };
        let Some(limit) = limit else {
            return handle.await;
        };
        let command = handle.command().to_string();
        let seq = handle.seq();
        match timeout(limit, handle).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(session = %self.id, seq, %command, "request timed out");
                self.session
                    .lock()
                    .await
                    .terminate(TerminationReason::Desynchronized(format!(
                        "no response to {command} (seq {seq})"
                    )));
                Err(DapError::Timeout { command })
            }
        }
    }

    async fn cache_for_stop(&self, generation: u64, update: impl FnOnce(&mut StopSnapshot)) {
        let mut session = self.session.lock().await;
        if session.stop_generation() != generation {
            return;
        }
        if let Some(snapshot) = session.stop_snapshot_mut() {
            update(snapshot);
        }
    }
}

impl std::fmt::Debug for DapBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DapBridge")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

fn check_state(
    session: &DapSession,
    operation: &str,
    allowed: &[SessionState],
) -> Result<(), DapError> {
    let state = session.state();
    if state.is_terminal() {
        return Err(DapError::NotConnected);
    }
    if allowed.contains(&state) {
        Ok(())
    } else {
        Err(DapError::InvalidState {
            operation: operation.to_string(),
            state,
        })
    }
}

/// Feed transport events into the session until it ends.
async fn dispatch(
    session: Arc<Mutex<DapSession>>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    while let Some(event) = events.recv().await {
        let mut locked = session.lock().await;
        match event {
            TransportEvent::Message(message) => {
                if let Err(e) = locked.on_message(message) {
                    tracing::warn!(session = %locked.id(), error = %e, "unexpected message");
                }
            }
            TransportEvent::Error(e) if e.is_fatal() => {
                locked.terminate(TerminationReason::TransportFailed(e.to_string()));
            }
            TransportEvent::Error(e) => {
                tracing::warn!(session = %locked.id(), error = %e, "dropped message");
            }
            TransportEvent::Undecodable {
                request_seq: Some(seq),
                error,
            } => {
                if !locked.fail_pending(seq, error) {
                    tracing::warn!(session = %locked.id(), seq, "undecodable response to no pending request");
                }
            }
            TransportEvent::Undecodable { error, .. } => {
                tracing::warn!(session = %locked.id(), error = %error, "dropped message");
            }
            TransportEvent::Closed => locked.terminate(TerminationReason::TransportClosed),
        }
        if locked.state().is_terminal() {
            return;
        }
    }
    session
        .lock()
        .await
        .terminate(TerminationReason::TransportClosed);
}
