//! DAP session state machine.
//!
//! [`DapSession`] owns everything about one debug run: its lifecycle state,
//! the table of requests waiting for a response, breakpoints, and the most
//! recent stop. It never touches the network itself; outgoing frames go to
//! the connection's writer channel and incoming messages are fed in through
//! [`DapSession::on_message`].

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot, watch};

use crate::breakpoint::BreakpointManager;
use crate::capabilities::DapCapabilities;
use crate::codec;
use crate::error::DapError;
use crate::protocol::{
    Capabilities, Command, Event, EventBody, Message, Request, Response,
    SetBreakpointsResponseBody, StackFrame, StopReason, StoppedEventBody, Thread,
};

/// Default capacity of each subscriber channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Return the raw numeric id.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// The current state of a debug session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no launch/attach sent yet.
    Idle,
    /// launch/attach sent, waiting for the `initialized` event.
    Initializing,
    /// Ready for configuration (breakpoints, then `configurationDone`).
    Initialized,
    /// The target is running.
    Running,
    /// The target is halted.
    Stopped,
    /// `disconnect` sent, waiting for its response.
    Terminating,
    /// Final; no further requests accepted.
    Terminated,
}

impl SessionState {
    /// Whether the session has ended.
    pub fn is_terminal(self) -> bool {
        self == SessionState::Terminated
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Initializing => "initializing",
            SessionState::Initialized => "initialized",
            SessionState::Running => "running",
            SessionState::Stopped => "stopped",
            SessionState::Terminating => "terminating",
            SessionState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// The backend sent `terminated`.
    Backend,
    /// `disconnect` completed.
    Disconnected,
    /// The stream reached end of file.
    TransportClosed,
    /// A connection or framing failure.
    TransportFailed(String),
    /// A request went unanswered; the stream can no longer be trusted.
    Desynchronized(String),
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationReason::Backend => f.write_str("debug adapter ended the session"),
            TerminationReason::Disconnected => f.write_str("disconnected"),
            TerminationReason::TransportClosed => f.write_str("connection closed"),
            TerminationReason::TransportFailed(e) => write!(f, "transport failed: {e}"),
            TerminationReason::Desynchronized(e) => write!(f, "desynchronized: {e}"),
        }
    }
}

/// What subscribers receive.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// An event from the backend.
    Event(Event),
    /// A reverse request from the backend; never answered automatically.
    ReverseRequest(Request),
    /// The session ended. Sent exactly once, always last.
    Terminated {
        /// Why.
        reason: TerminationReason,
    },
}

/// The most recent stop, plus whatever has been fetched for it.
#[derive(Debug, Clone, PartialEq)]
pub struct StopSnapshot {
    /// Why the target stopped.
    pub reason: StopReason,
    /// Thread that stopped.
    pub thread_id: Option<i64>,
    /// Adapter description of the stop.
    pub description: Option<String>,
    /// Whether every thread halted.
    pub all_threads_stopped: bool,
    /// Thread list, once fetched.
    pub threads: Option<Vec<Thread>>,
    /// Stack frames per thread, once fetched.
    pub frames: HashMap<i64, Vec<StackFrame>>,
}

impl StopSnapshot {
    fn from_event(body: &StoppedEventBody) -> Self {
        Self {
            reason: body.reason.clone(),
            thread_id: body.thread_id,
            description: body.description.clone(),
            all_threads_stopped: body.all_threads_stopped.unwrap_or(false),
            threads: None,
            frames: HashMap::new(),
        }
    }
}

/// Side effect to apply when a request is acknowledged.
#[derive(Debug, Clone, PartialEq)]
enum PendingKind {
    Initialize,
    ConfigurationDone,
    SourceBreakpoints(PathBuf),
    InstructionBreakpoints,
    Resume,
    Disconnect,
    Other,
}

impl PendingKind {
    fn of(command: &Command) -> Self {
        match command {
            Command::Initialize(_) => PendingKind::Initialize,
            Command::ConfigurationDone => PendingKind::ConfigurationDone,
            Command::SetBreakpoints(args) => PendingKind::SourceBreakpoints(PathBuf::from(
                args.source.path.clone().unwrap_or_default(),
            )),
            Command::SetInstructionBreakpoints(_) => PendingKind::InstructionBreakpoints,
            Command::Continue(_) | Command::Next(_) | Command::StepIn(_) | Command::StepOut(_) => {
                PendingKind::Resume
            }
            Command::Disconnect(_) => PendingKind::Disconnect,
            _ => PendingKind::Other,
        }
    }
}

struct PendingRequest {
    command: String,
    kind: PendingKind,
    stop_generation: u64,
    tx: oneshot::Sender<Result<Response, DapError>>,
}

/// Awaitable result of a submitted request.
///
/// Resolves exactly once: with the matched response, with the backend's
/// rejection, or with `SessionTerminated` if the session ends first.
#[derive(Debug)]
pub struct PendingHandle {
    seq: i64,
    command: String,
    rx: oneshot::Receiver<Result<Response, DapError>>,
}

impl PendingHandle {
    /// Sequence number of the request.
    pub fn seq(&self) -> i64 {
        self.seq
    }

    /// Command name of the request.
    pub fn command(&self) -> &str {
        &self.command
    }
}

impl Future for PendingHandle {
    type Output = Result<Response, DapError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(DapError::SessionTerminated)))
    }
}

/// Lifecycle, pending requests and cached state of one debug session.
pub struct DapSession {
    id: SessionId,
    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    next_seq: i64,
    pending: HashMap<i64, PendingRequest>,
    writer: Option<mpsc::UnboundedSender<Vec<u8>>>,
    capabilities: DapCapabilities,
    breakpoints: BreakpointManager,
    stop: Option<StopSnapshot>,
    stop_generation: u64,
    initialized_early: bool,
    subscribers: Vec<mpsc::Sender<SessionEvent>>,
    event_capacity: usize,
    termination: Option<TerminationReason>,
}

impl DapSession {
    /// Create a session in the [`Idle`](SessionState::Idle) state that
    /// writes frames to `writer`.
    pub fn new(writer: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        Self {
            id: SessionId::next(),
            state: SessionState::Idle,
            state_tx,
            next_seq: 1,
            pending: HashMap::new(),
            writer: Some(writer),
            capabilities: DapCapabilities::default(),
            breakpoints: BreakpointManager::new(),
            stop: None,
            stop_generation: 0,
            initialized_early: false,
            subscribers: Vec::new(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            termination: None,
        }
    }

    /// Set the capacity of subscriber channels created afterwards.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Session id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Return the current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Return the resolved adapter capabilities.
    pub fn capabilities(&self) -> &DapCapabilities {
        &self.capabilities
    }

    /// Breakpoints known to this session.
    pub fn breakpoints(&self) -> &BreakpointManager {
        &self.breakpoints
    }

    /// Mutable access for the bridge to stage a breakpoint resync.
    pub fn breakpoints_mut(&mut self) -> &mut BreakpointManager {
        &mut self.breakpoints
    }

    /// The current stop, if the target is halted.
    pub fn stop_snapshot(&self) -> Option<&StopSnapshot> {
        self.stop.as_ref()
    }

    /// Mutable access for caching threads and frames.
    pub fn stop_snapshot_mut(&mut self) -> Option<&mut StopSnapshot> {
        self.stop.as_mut()
    }

    /// Counter bumped on every `stopped`/`continued`; cached data fetched
    /// under an older value is stale.
    pub fn stop_generation(&self) -> u64 {
        self.stop_generation
    }

    /// Number of requests waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Why the session ended, once it has.
    pub fn termination_reason(&self) -> Option<&TerminationReason> {
        self.termination.as_ref()
    }

    /// Register a subscriber.
    ///
    /// Subscribing after termination yields a channel holding only the
    /// terminal notification.
    pub fn subscribe(&mut self) -> mpsc::Receiver<SessionEvent> {
        // One slot stays reserved for the terminal notification.
        let (tx, rx) = mpsc::channel(self.event_capacity + 1);
        if let Some(reason) = &self.termination {
            let _ = tx.try_send(SessionEvent::Terminated {
                reason: reason.clone(),
            });
            return rx;
        }
        self.subscribers.retain(|existing| !existing.is_closed());
        self.subscribers.push(tx);
        rx
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Send a request to the backend.
    ///
    /// Assigns the next sequence number, records the pending entry and
    /// enqueues the frame without waiting for the write.
    pub fn submit(&mut self, command: Command) -> Result<PendingHandle, DapError> {
        if self.state.is_terminal() {
            return Err(DapError::NotConnected);
        }
        let Some(writer) = &self.writer else {
            return Err(DapError::NotConnected);
        };

        let seq = self.next_seq;
        let name = command.name().to_string();
        let kind = PendingKind::of(&command);
        let starts_session = matches!(command, Command::Launch(_) | Command::Attach(_));
        let bytes = codec::encode(&Message::Request(Request::new(seq, command)))?;

        if writer.send(bytes).is_err() {
            self.terminate(TerminationReason::TransportFailed(
                "writer task has stopped".into(),
            ));
            return Err(DapError::Connection("connection writer closed".into()));
        }
        self.next_seq += 1;
        tracing::debug!(session = %self.id, seq, command = %name, "request sent");

        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            seq,
            PendingRequest {
                command: name.clone(),
                kind: kind.clone(),
                stop_generation: self.stop_generation,
                tx,
            },
        );

        match &kind {
            PendingKind::SourceBreakpoints(path) => self.breakpoints.track_file_request(path, seq),
            PendingKind::InstructionBreakpoints => self.breakpoints.track_instruction_request(seq),
            _ => {}
        }
        if starts_session && self.state == SessionState::Idle {
            if self.initialized_early {
                self.set_state(SessionState::Initialized);
            } else {
                self.set_state(SessionState::Initializing);
            }
        }
        if kind == PendingKind::Disconnect {
            self.set_state(SessionState::Terminating);
        }

        Ok(PendingHandle {
            seq,
            command: name,
            rx,
        })
    }

    /// Feed one message received from the backend.
    ///
    /// Returns a `ProtocolError` for a response nobody is waiting for; the
    /// session itself keeps going.
    pub fn on_message(&mut self, message: Message) -> Result<(), DapError> {
        match message {
            Message::Response(response) => self.on_response(response),
            Message::Event(event) => {
                tracing::debug!(session = %self.id, event = event.body.name(), "event received");
                self.broadcast(SessionEvent::Event(event.clone()));
                self.on_event(&event.body);
                Ok(())
            }
            Message::Request(request) => {
                tracing::debug!(
                    session = %self.id,
                    command = request.command.name(),
                    "reverse request received"
                );
                self.broadcast(SessionEvent::ReverseRequest(request));
                Ok(())
            }
        }
    }

    /// End the session.
    ///
    /// Every pending request resolves with `SessionTerminated`, breakpoints
    /// lose their verification, and subscribers get the terminal
    /// notification. Calling it again is a no-op.
    pub fn terminate(&mut self, reason: TerminationReason) {
        if self.state.is_terminal() {
            return;
        }
        tracing::info!(session = %self.id, %reason, pending = self.pending.len(), "session terminated");
        self.set_state(SessionState::Terminated);
        self.writer = None;
        for (_, pending) in self.pending.drain() {
            let _ = pending.tx.send(Err(DapError::SessionTerminated));
        }
        self.breakpoints.invalidate_all();
        self.stop = None;
        self.termination = Some(reason.clone());

        for tx in self.subscribers.drain(..) {
            if tx.try_send(SessionEvent::Terminated { reason: reason.clone() }).is_err() {
                tracing::debug!("subscriber gone before termination notice");
            }
        }
    }

    /// Resolve the request `seq` with `error` instead of a response.
    ///
    /// Used when the backend answered with something that could not be
    /// decoded. Returns `false` when nothing was waiting on `seq`.
    pub fn fail_pending(&mut self, seq: i64, error: DapError) -> bool {
        let Some(pending) = self.pending.remove(&seq) else {
            return false;
        };
        tracing::warn!(session = %self.id, seq, command = %pending.command, error = %error, "request failed");
        if pending.kind == PendingKind::Disconnect {
            self.terminate(TerminationReason::Disconnected);
        }
        let _ = pending.tx.send(Err(error));
        true
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            tracing::debug!(session = %self.id, from = %self.state, to = %state, "state change");
            self.state = state;
            self.state_tx.send_replace(state);
        }
    }

    fn on_response(&mut self, response: Response) -> Result<(), DapError> {
        let request_seq = response.request_seq;
        let Some(pending) = self.pending.remove(&request_seq) else {
            if request_seq > 0 && request_seq < self.next_seq {
                tracing::debug!(session = %self.id, request_seq, "dropping duplicate response");
                return Ok(());
            }
            tracing::warn!(session = %self.id, request_seq, "response for unknown request");
            return Err(DapError::Protocol(format!(
                "response to unknown request seq {request_seq}"
            )));
        };

        if pending.command != response.command {
            tracing::warn!(
                session = %self.id,
                request_seq,
                expected = %pending.command,
                got = %response.command,
                "response command does not match request"
            );
        }

        let result = if response.success {
            self.on_acknowledged(request_seq, &pending, &response);
            Ok(response)
        } else {
            let message = response.error_message();
            tracing::debug!(session = %self.id, command = %pending.command, %message, "request rejected");
            if pending.kind == PendingKind::Disconnect {
                self.terminate(TerminationReason::Disconnected);
            }
            Err(DapError::Rejected {
                command: pending.command.clone(),
                message,
            })
        };
        let _ = pending.tx.send(result);
        Ok(())
    }

    fn on_acknowledged(&mut self, seq: i64, pending: &PendingRequest, response: &Response) {
        match &pending.kind {
            PendingKind::Initialize => {
                let caps = response.parse_body::<Capabilities>().unwrap_or_default();
                self.capabilities = DapCapabilities::from_initialize_response(&caps);
            }
            PendingKind::ConfigurationDone => {
                if self.state == SessionState::Initialized {
                    self.set_state(SessionState::Running);
                }
            }
            PendingKind::SourceBreakpoints(path) => {
                match response.parse_body::<SetBreakpointsResponseBody>() {
                    Ok(body) => {
                        self.breakpoints.apply_file_response(path, seq, &body.breakpoints);
                    }
                    Err(e) => tracing::warn!(session = %self.id, error = %e, "ignoring breakpoint response"),
                }
            }
            PendingKind::InstructionBreakpoints => {
                match response.parse_body::<SetBreakpointsResponseBody>() {
                    Ok(body) => {
                        self.breakpoints.apply_instruction_response(seq, &body.breakpoints);
                    }
                    Err(e) => tracing::warn!(session = %self.id, error = %e, "ignoring breakpoint response"),
                }
            }
            PendingKind::Resume => {
                // A stop that raced ahead of this ack is newer; keep it.
                if self.state == SessionState::Stopped
                    && self.stop_generation == pending.stop_generation
                {
                    self.stop = None;
                    self.stop_generation += 1;
                    self.set_state(SessionState::Running);
                }
            }
            PendingKind::Disconnect => self.terminate(TerminationReason::Disconnected),
            PendingKind::Other => {}
        }
    }

    fn on_event(&mut self, body: &EventBody) {
        if self.state.is_terminal() {
            return;
        }
        match body {
            EventBody::Initialized => match self.state {
                SessionState::Idle => self.initialized_early = true,
                SessionState::Initializing => self.set_state(SessionState::Initialized),
                other => tracing::debug!(session = %self.id, state = %other, "ignoring initialized event"),
            },
            EventBody::Stopped(stopped) => match self.state {
                SessionState::Initializing
                | SessionState::Initialized
                | SessionState::Running
                | SessionState::Stopped => {
                    self.stop = Some(StopSnapshot::from_event(stopped));
                    self.stop_generation += 1;
                    self.set_state(SessionState::Stopped);
                }
                other => tracing::warn!(session = %self.id, state = %other, "ignoring stopped event"),
            },
            EventBody::Continued(_) => {
                if self.state == SessionState::Stopped {
                    self.stop = None;
                    self.stop_generation += 1;
                    self.set_state(SessionState::Running);
                }
            }
            EventBody::Breakpoint(event) => match event.reason.as_str() {
                "changed" => {
                    if !self.breakpoints.update_from_event(&event.breakpoint) {
                        tracing::debug!(session = %self.id, id = ?event.breakpoint.id, "breakpoint event for unknown id");
                    }
                }
                "removed" => {
                    if let Some(id) = event.breakpoint.id {
                        self.breakpoints.remove_by_id(id);
                    }
                }
                other => tracing::debug!(session = %self.id, reason = other, "breakpoint event ignored"),
            },
            EventBody::Terminated(_) => self.terminate(TerminationReason::Backend),
            EventBody::Exited(_)
            | EventBody::Output(_)
            | EventBody::Thread(_)
            | EventBody::Unrecognized { .. } => {}
        }
    }

    fn broadcast(&mut self, event: SessionEvent) {
        let session = self.id;
        self.subscribers.retain(|tx| {
            if tx.is_closed() {
                return false;
            }
            // The last slot belongs to the terminal notification.
            if tx.capacity() <= 1 {
                tracing::warn!(%session, "subscriber channel full, dropping event");
                return true;
            }
            match tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(%session, "subscriber channel full, dropping event");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }
}

impl std::fmt::Debug for DapSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DapSession")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("next_seq", &self.next_seq)
            .field("pending", &self.pending.len())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FrameDecoder;
    use crate::protocol::{
        BreakpointEventBody, BreakpointResponse, ContinueArguments, ContinuedEventBody,
        DisconnectArguments, SetBreakpointsArguments, Source, SourceBreakpoint,
    };
    use serde_json::json;

    struct Harness {
        session: DapSession,
        wire: mpsc::UnboundedReceiver<Vec<u8>>,
        backend_seq: i64,
    }

    impl Harness {
        fn new() -> Self {
            let (tx, wire) = mpsc::unbounded_channel();
            Self {
                session: DapSession::new(tx),
                wire,
                backend_seq: 100,
            }
        }

        fn sent(&mut self) -> Vec<Message> {
            let mut decoder = FrameDecoder::new();
            while let Ok(bytes) = self.wire.try_recv() {
                decoder.extend(&bytes);
            }
            let mut out = Vec::new();
            while let Some(m) = decoder.next_message().unwrap() {
                out.push(m);
            }
            out
        }

        fn respond(&mut self, request_seq: i64, command: &str, body: Option<serde_json::Value>) {
            self.backend_seq += 1;
            self.session
                .on_message(Message::Response(Response::success(
                    self.backend_seq,
                    request_seq,
                    command,
                    body,
                )))
                .unwrap();
        }

        fn event(&mut self, body: EventBody) {
            self.backend_seq += 1;
            self.session
                .on_message(Message::Event(Event::new(self.backend_seq, body)))
                .unwrap();
        }
    }

    fn stopped(thread_id: i64) -> EventBody {
        EventBody::Stopped(StoppedEventBody {
            reason: StopReason::Breakpoint,
            description: None,
            thread_id: Some(thread_id),
            all_threads_stopped: Some(true),
            text: None,
            hit_breakpoint_ids: None,
        })
    }

    fn continue_cmd() -> Command {
        Command::Continue(ContinueArguments {
            thread_id: 0,
            single_thread: None,
        })
    }

    fn set_breakpoints(path: &str, lines: &[i64]) -> Command {
        Command::SetBreakpoints(SetBreakpointsArguments {
            source: Source {
                name: None,
                path: Some(path.into()),
                source_reference: None,
            },
            breakpoints: Some(
                lines
                    .iter()
                    .map(|&line| SourceBreakpoint {
                        line,
                        column: None,
                        condition: None,
                    })
                    .collect(),
            ),
        })
    }

    #[tokio::test]
    async fn session_launch_then_initialized_event() {
        let mut h = Harness::new();
        assert_eq!(h.session.state(), SessionState::Idle);

        let handle = h.session.submit(Command::Launch(json!({}))).unwrap();
        assert_eq!(handle.seq(), 1);
        assert_eq!(h.session.state(), SessionState::Initializing);

        h.respond(1, "launch", None);
        let response = handle.await.unwrap();
        assert!(response.success);
        assert_eq!(h.session.state(), SessionState::Initializing);

        h.event(EventBody::Initialized);
        assert_eq!(h.session.state(), SessionState::Initialized);

        let sent = h.sent();
        assert_eq!(sent.len(), 1);
        assert!(matches!(&sent[0], Message::Request(r) if r.seq == 1 && r.command.name() == "launch"));
    }

    #[tokio::test]
    async fn session_initialized_before_launch_is_remembered() {
        let mut h = Harness::new();
        h.event(EventBody::Initialized);
        assert_eq!(h.session.state(), SessionState::Idle);
        let _handle = h.session.submit(Command::Attach(json!({}))).unwrap();
        assert_eq!(h.session.state(), SessionState::Initialized);
    }

    #[tokio::test]
    async fn session_full_lifecycle() {
        let mut h = Harness::new();
        let _launch = h.session.submit(Command::Launch(json!({}))).unwrap();
        h.respond(1, "launch", None);
        h.event(EventBody::Initialized);

        let done = h.session.submit(Command::ConfigurationDone).unwrap();
        assert_eq!(h.session.state(), SessionState::Initialized);
        h.respond(2, "configurationDone", None);
        done.await.unwrap();
        assert_eq!(h.session.state(), SessionState::Running);

        h.event(stopped(0));
        assert_eq!(h.session.state(), SessionState::Stopped);
        assert_eq!(h.session.stop_snapshot().unwrap().thread_id, Some(0));

        let resume = h.session.submit(continue_cmd()).unwrap();
        assert_eq!(h.session.state(), SessionState::Stopped);
        h.respond(3, "continue", Some(json!({"allThreadsContinued": true})));
        resume.await.unwrap();
        assert_eq!(h.session.state(), SessionState::Running);
        assert!(h.session.stop_snapshot().is_none());

        h.event(stopped(0));
        let bye = h
            .session
            .submit(Command::Disconnect(DisconnectArguments::default()))
            .unwrap();
        assert_eq!(h.session.state(), SessionState::Terminating);
        h.respond(4, "disconnect", None);
        bye.await.unwrap();
        assert_eq!(h.session.state(), SessionState::Terminated);
        assert_eq!(
            h.session.termination_reason(),
            Some(&TerminationReason::Disconnected)
        );
    }

    #[tokio::test]
    async fn session_stop_racing_resume_ack_wins() {
        let mut h = Harness::new();
        let _ = h.session.submit(Command::Launch(json!({}))).unwrap();
        h.event(EventBody::Initialized);
        h.event(stopped(0));

        let step = h.session.submit(continue_cmd()).unwrap();
        // The next stop arrives before the continue is acknowledged.
        h.event(stopped(1));
        h.respond(step.seq(), "continue", None);
        step.await.unwrap();
        assert_eq!(h.session.state(), SessionState::Stopped);
        assert_eq!(h.session.stop_snapshot().unwrap().thread_id, Some(1));
    }

    #[tokio::test]
    async fn session_continued_event_clears_stop() {
        let mut h = Harness::new();
        let _ = h.session.submit(Command::Launch(json!({}))).unwrap();
        h.event(stopped(0));
        let generation = h.session.stop_generation();
        h.event(EventBody::Continued(ContinuedEventBody {
            thread_id: 0,
            all_threads_continued: Some(true),
        }));
        assert_eq!(h.session.state(), SessionState::Running);
        assert!(h.session.stop_snapshot().is_none());
        assert!(h.session.stop_generation() > generation);
    }

    #[tokio::test]
    async fn session_rejected_response_reaches_only_its_caller() {
        let mut h = Harness::new();
        let handle = h.session.submit(Command::Launch(json!({}))).unwrap();
        h.backend_seq += 1;
        h.session
            .on_message(Message::Response(Response {
                seq: h.backend_seq,
                request_seq: 1,
                success: false,
                command: "launch".into(),
                message: Some("no probe".into()),
                body: None,
            }))
            .unwrap();
        match handle.await {
            Err(DapError::Rejected { command, message }) => {
                assert_eq!(command, "launch");
                assert_eq!(message, "no probe");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(h.session.state(), SessionState::Initializing);
    }

    #[tokio::test]
    async fn session_fail_pending_reaches_only_its_caller() {
        let mut h = Harness::new();
        let failed = h.session.submit(Command::Threads).unwrap();
        let other = h.session.submit(Command::Threads).unwrap();

        assert!(h
            .session
            .fail_pending(1, DapError::Protocol("missing command".into())));
        assert!(!h.session.fail_pending(1, DapError::Protocol("again".into())));
        assert!(matches!(failed.await, Err(DapError::Protocol(_))));

        assert_eq!(h.session.state(), SessionState::Idle);
        assert_eq!(h.session.pending_count(), 1);
        h.respond(2, "threads", Some(json!({"threads": []})));
        assert!(other.await.is_ok());
    }

    #[tokio::test]
    async fn session_duplicate_response_is_dropped() {
        let mut h = Harness::new();
        let handle = h.session.submit(Command::Threads).unwrap();
        h.respond(1, "threads", Some(json!({"threads": []})));
        assert!(handle.await.is_ok());
        // Retransmission: already resolved, silently discarded.
        h.respond(1, "threads", Some(json!({"threads": []})));
        assert_eq!(h.session.pending_count(), 0);
    }

    #[tokio::test]
    async fn session_unknown_response_is_protocol_error() {
        let mut h = Harness::new();
        let err = h
            .session
            .on_message(Message::Response(Response::success(1, 77, "threads", None)))
            .unwrap_err();
        assert!(matches!(err, DapError::Protocol(_)));
        assert_eq!(h.session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn session_breakpoint_response_then_event() {
        let mut h = Harness::new();
        let handle = h.session.submit(set_breakpoints("/fw/src/main.rs", &[10])).unwrap();
        h.session
            .breakpoints_mut()
            .replace_file(std::path::Path::new("/fw/src/main.rs"), &[10]);
        h.respond(
            handle.seq(),
            "setBreakpoints",
            Some(json!({"breakpoints": [{"id": 1, "verified": false, "line": 10}]})),
        );
        handle.await.unwrap();
        let path = std::path::Path::new("/fw/src/main.rs");
        assert!(!h.session.breakpoints().get_for_file(path)[0].verified);

        h.event(EventBody::Breakpoint(BreakpointEventBody {
            reason: "changed".into(),
            breakpoint: BreakpointResponse {
                id: Some(1),
                verified: true,
                message: None,
                source: None,
                line: Some(10),
                column: None,
                instruction_reference: None,
            },
        }));
        assert!(h.session.breakpoints().get_for_file(path)[0].verified);
        assert_eq!(h.sent().len(), 1);
    }

    #[tokio::test]
    async fn session_terminate_drains_pending() {
        let mut h = Harness::new();
        let handles: Vec<_> = (0..3)
            .map(|_| h.session.submit(Command::Threads).unwrap())
            .collect();
        h.session.terminate(TerminationReason::TransportClosed);
        for handle in handles {
            assert!(matches!(handle.await, Err(DapError::SessionTerminated)));
        }
        assert!(matches!(
            h.session.submit(Command::Threads),
            Err(DapError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn session_terminated_event_ends_session() {
        let mut h = Harness::new();
        let mut events = h.session.subscribe();
        let _ = h.session.submit(Command::Launch(json!({}))).unwrap();
        h.event(EventBody::Terminated(None));
        assert_eq!(h.session.state(), SessionState::Terminated);

        assert!(matches!(
            events.recv().await,
            Some(SessionEvent::Event(Event { body: EventBody::Terminated(None), .. }))
        ));
        assert_eq!(
            events.recv().await,
            Some(SessionEvent::Terminated {
                reason: TerminationReason::Backend
            })
        );
        assert_eq!(events.recv().await, None);
    }

    #[tokio::test]
    async fn session_full_subscriber_still_gets_termination() {
        let (tx, _wire) = mpsc::unbounded_channel();
        let mut session = DapSession::new(tx).with_event_capacity(1);
        let mut events = session.subscribe();
        for seq in 1..=5 {
            session
                .on_message(Message::Event(Event::new(seq, EventBody::Initialized)))
                .unwrap();
        }
        session.terminate(TerminationReason::TransportClosed);
        assert!(matches!(events.recv().await, Some(SessionEvent::Event(_))));
        assert!(matches!(
            events.recv().await,
            Some(SessionEvent::Terminated { .. })
        ));
        assert_eq!(events.recv().await, None);
    }

    #[tokio::test]
    async fn session_late_subscriber_sees_termination() {
        let mut h = Harness::new();
        h.session.terminate(TerminationReason::Disconnected);
        h.session.terminate(TerminationReason::TransportClosed);
        let mut events = h.session.subscribe();
        assert_eq!(
            events.recv().await,
            Some(SessionEvent::Terminated {
                reason: TerminationReason::Disconnected
            })
        );
        assert_eq!(h.session.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn session_dropped_subscribers_are_pruned() {
        let mut h = Harness::new();
        let first = h.session.subscribe();
        let _second = h.session.subscribe();
        drop(first);
        h.event(EventBody::Initialized);
        assert_eq!(h.session.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn session_reverse_request_is_forwarded() {
        let mut h = Harness::new();
        let mut events = h.session.subscribe();
        let request: Message = serde_json::from_value(json!({
            "seq": 5, "type": "request", "command": "runInTerminal", "arguments": {}
        }))
        .unwrap();
        h.session.on_message(request).unwrap();
        assert!(matches!(
            events.recv().await,
            Some(SessionEvent::ReverseRequest(_))
        ));
        assert!(h.sent().is_empty());
    }

    #[tokio::test]
    async fn session_initialize_stores_capabilities() {
        let mut h = Harness::new();
        let handle = h
            .session
            .submit(Command::Initialize(Default::default()))
            .unwrap();
        h.respond(
            1,
            "initialize",
            Some(json!({"supportsConfigurationDoneRequest": true})),
        );
        handle.await.unwrap();
        assert!(h.session.capabilities().supports_configuration_done_request);
        assert_eq!(h.session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn session_state_watch_follows_transitions() {
        let mut h = Harness::new();
        let watcher = h.session.watch_state();
        let _ = h.session.submit(Command::Launch(json!({}))).unwrap();
        assert_eq!(*watcher.borrow(), SessionState::Initializing);
    }

    #[test]
    fn session_ids_are_unique() {
        let a = SessionId::next();
        let b = SessionId::next();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("session-"));
    }

    #[test]
    fn session_state_display() {
        assert_eq!(SessionState::Terminating.to_string(), "terminating");
        assert!(SessionState::Terminated.is_terminal());
        assert!(!SessionState::Stopped.is_terminal());
    }
}
