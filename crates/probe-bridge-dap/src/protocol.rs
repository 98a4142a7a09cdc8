//! DAP protocol message types.
//!
//! Requests and events are decoded into typed variants keyed by their
//! command/event name. Names the bridge does not know are kept as
//! `Unrecognized` with the raw JSON, so nothing the backend sends is lost.

use serde::de::DeserializeOwned;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::DapError;

// ---------------------------------------------------------------------------
// Base protocol messages
// ---------------------------------------------------------------------------

/// One DAP message, tagged by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    /// Client-to-backend request, or a reverse request from the backend.
    Request(Request),
    /// Answer to a request.
    Response(Response),
    /// Unsolicited notification.
    Event(Event),
}

impl Message {
    /// Sequence number of this message.
    pub fn seq(&self) -> i64 {
        match self {
            Message::Request(r) => r.seq,
            Message::Response(r) => r.seq,
            Message::Event(e) => e.seq,
        }
    }
}

/// A DAP request message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawRequest")]
pub struct Request {
    /// Sequence number.
    pub seq: i64,
    /// Command and its arguments.
    pub command: Command,
}

impl Request {
    /// Build a request with the given sequence number.
    pub fn new(seq: i64, command: Command) -> Self {
        Self { seq, command }
    }
}

/// Every command the bridge issues, plus a catch-all.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `initialize`
    Initialize(InitializeRequestArguments),
    /// `launch`; the debug configuration is forwarded as-is.
    Launch(Value),
    /// `attach`; the debug configuration is forwarded as-is.
    Attach(Value),
    /// `configurationDone`
    ConfigurationDone,
    /// `setBreakpoints`
    SetBreakpoints(SetBreakpointsArguments),
    /// `setInstructionBreakpoints`
    SetInstructionBreakpoints(SetInstructionBreakpointsArguments),
    /// `continue`
    Continue(ContinueArguments),
    /// `next`
    Next(NextArguments),
    /// `stepIn`
    StepIn(StepInArguments),
    /// `stepOut`
    StepOut(StepOutArguments),
    /// `pause`
    Pause(PauseArguments),
    /// `threads`
    Threads,
    /// `stackTrace`
    StackTrace(StackTraceArguments),
    /// `scopes`
    Scopes(ScopesArguments),
    /// `variables`
    Variables(VariablesArguments),
    /// `evaluate`
    Evaluate(EvaluateArguments),
    /// `disconnect`
    Disconnect(DisconnectArguments),
    /// `terminate`
    Terminate,
    /// Any other command, e.g. the `runInTerminal` reverse request.
    Unrecognized {
        /// Command name.
        command: String,
        /// Raw arguments.
        arguments: Option<Value>,
    },
}

impl Command {
    /// Wire name of the command.
    pub fn name(&self) -> &str {
        match self {
            Command::Initialize(_) => "initialize",
            Command::Launch(_) => "launch",
            Command::Attach(_) => "attach",
            Command::ConfigurationDone => "configurationDone",
            Command::SetBreakpoints(_) => "setBreakpoints",
            Command::SetInstructionBreakpoints(_) => "setInstructionBreakpoints",
            Command::Continue(_) => "continue",
            Command::Next(_) => "next",
            Command::StepIn(_) => "stepIn",
            Command::StepOut(_) => "stepOut",
            Command::Pause(_) => "pause",
            Command::Threads => "threads",
            Command::StackTrace(_) => "stackTrace",
            Command::Scopes(_) => "scopes",
            Command::Variables(_) => "variables",
            Command::Evaluate(_) => "evaluate",
            Command::Disconnect(_) => "disconnect",
            Command::Terminate => "terminate",
            Command::Unrecognized { command, .. } => command,
        }
    }
}

#[derive(Deserialize)]
struct RawRequest {
    seq: i64,
    command: String,
    #[serde(default)]
    arguments: Option<Value>,
}

fn parse_arguments<T: DeserializeOwned>(name: &str, arguments: Option<Value>) -> Result<T, String> {
    let value = arguments.unwrap_or_else(|| Value::Object(Map::new()));
    serde_json::from_value(value).map_err(|e| format!("invalid arguments for {name}: {e}"))
}

impl TryFrom<RawRequest> for Request {
    type Error = String;

    fn try_from(raw: RawRequest) -> Result<Self, Self::Error> {
        let RawRequest {
            seq,
            command,
            arguments,
        } = raw;
        let name = command.as_str();
        let command = match name {
            "initialize" => Command::Initialize(parse_arguments(name, arguments)?),
            "launch" => Command::Launch(arguments.unwrap_or(Value::Null)),
            "attach" => Command::Attach(arguments.unwrap_or(Value::Null)),
            "configurationDone" => Command::ConfigurationDone,
            "setBreakpoints" => Command::SetBreakpoints(parse_arguments(name, arguments)?),
            "setInstructionBreakpoints" => {
                Command::SetInstructionBreakpoints(parse_arguments(name, arguments)?)
            }
            "continue" => Command::Continue(parse_arguments(name, arguments)?),
            "next" => Command::Next(parse_arguments(name, arguments)?),
            "stepIn" => Command::StepIn(parse_arguments(name, arguments)?),
            "stepOut" => Command::StepOut(parse_arguments(name, arguments)?),
            "pause" => Command::Pause(parse_arguments(name, arguments)?),
            "threads" => Command::Threads,
            "stackTrace" => Command::StackTrace(parse_arguments(name, arguments)?),
            "scopes" => Command::Scopes(parse_arguments(name, arguments)?),
            "variables" => Command::Variables(parse_arguments(name, arguments)?),
            "evaluate" => Command::Evaluate(parse_arguments(name, arguments)?),
            "disconnect" => Command::Disconnect(parse_arguments(name, arguments)?),
            "terminate" => Command::Terminate,
            _ => Command::Unrecognized {
                command,
                arguments,
            },
        };
        Ok(Request { seq, command })
    }
}

impl Serialize for Request {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Request", 3)?;
        state.serialize_field("seq", &self.seq)?;
        state.serialize_field("command", self.command.name())?;
        match &self.command {
            Command::Initialize(args) => state.serialize_field("arguments", args)?,
            Command::Launch(args) | Command::Attach(args) => {
                state.serialize_field("arguments", args)?
            }
            Command::SetBreakpoints(args) => state.serialize_field("arguments", args)?,
            Command::SetInstructionBreakpoints(args) => {
                state.serialize_field("arguments", args)?
            }
            Command::Continue(args) => state.serialize_field("arguments", args)?,
            Command::Next(args) => state.serialize_field("arguments", args)?,
            Command::StepIn(args) => state.serialize_field("arguments", args)?,
            Command::StepOut(args) => state.serialize_field("arguments", args)?,
            Command::Pause(args) => state.serialize_field("arguments", args)?,
            Command::StackTrace(args) => state.serialize_field("arguments", args)?,
            Command::Scopes(args) => state.serialize_field("arguments", args)?,
            Command::Variables(args) => state.serialize_field("arguments", args)?,
            Command::Evaluate(args) => state.serialize_field("arguments", args)?,
            Command::Disconnect(args) => state.serialize_field("arguments", args)?,
            Command::Unrecognized {
                arguments: Some(args),
                ..
            } => state.serialize_field("arguments", args)?,
            Command::ConfigurationDone
            | Command::Threads
            | Command::Terminate
            | Command::Unrecognized {
                arguments: None, ..
            } => state.skip_field("arguments")?,
        }
        state.end()
    }
}

/// A DAP response message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Sequence number.
    pub seq: i64,
    /// Sequence number of the corresponding request.
    pub request_seq: i64,
    /// Whether the request was successful.
    pub success: bool,
    /// The command this response is for.
    pub command: String,
    /// Error message if `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Response body (command-specific).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Response {
    /// A successful response to `request_seq`.
    pub fn success(seq: i64, request_seq: i64, command: &str, body: Option<Value>) -> Self {
        Self {
            seq,
            request_seq,
            success: true,
            command: command.to_string(),
            message: None,
            body,
        }
    }

    /// The most detailed failure text the backend gave.
    ///
    /// Prefers `body.error.format` over the short `message`.
    pub fn error_message(&self) -> String {
        self.body
            .as_ref()
            .and_then(|b| b.pointer("/error/format"))
            .and_then(Value::as_str)
            .or(self.message.as_deref())
            .unwrap_or("unknown error")
            .to_string()
    }

    /// Decode the body into a typed response body.
    pub fn parse_body<T: DeserializeOwned>(&self) -> Result<T, DapError> {
        let value = self.body.clone().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| {
            DapError::Protocol(format!("invalid {} response body: {e}", self.command))
        })
    }
}

/// A DAP event message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawEvent")]
pub struct Event {
    /// Sequence number.
    pub seq: i64,
    /// Event name and body.
    pub body: EventBody,
}

impl Event {
    /// Build an event with the given sequence number.
    pub fn new(seq: i64, body: EventBody) -> Self {
        Self { seq, body }
    }
}

/// Events the bridge reacts to, plus a catch-all.
#[derive(Debug, Clone, PartialEq)]
pub enum EventBody {
    /// `initialized`
    Initialized,
    /// `stopped`
    Stopped(StoppedEventBody),
    /// `continued`
    Continued(ContinuedEventBody),
    /// `exited`
    Exited(ExitedEventBody),
    /// `terminated`
    Terminated(Option<TerminatedEventBody>),
    /// `breakpoint`
    Breakpoint(BreakpointEventBody),
    /// `output`
    Output(OutputEventBody),
    /// `thread`
    Thread(ThreadEventBody),
    /// Any other event, e.g. probe-rs `rttChannelConfig`.
    Unrecognized {
        /// Event name.
        event: String,
        /// Raw body.
        body: Option<Value>,
    },
}

impl EventBody {
    /// Wire name of the event.
    pub fn name(&self) -> &str {
        match self {
            EventBody::Initialized => "initialized",
            EventBody::Stopped(_) => "stopped",
            EventBody::Continued(_) => "continued",
            EventBody::Exited(_) => "exited",
            EventBody::Terminated(_) => "terminated",
            EventBody::Breakpoint(_) => "breakpoint",
            EventBody::Output(_) => "output",
            EventBody::Thread(_) => "thread",
            EventBody::Unrecognized { event, .. } => event,
        }
    }
}

#[derive(Deserialize)]
struct RawEvent {
    seq: i64,
    event: String,
    #[serde(default)]
    body: Option<Value>,
}

fn parse_event_body<T: DeserializeOwned>(name: &str, body: Option<Value>) -> Result<T, String> {
    serde_json::from_value(body.unwrap_or(Value::Null))
        .map_err(|e| format!("invalid body for {name} event: {e}"))
}

impl TryFrom<RawEvent> for Event {
    type Error = String;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        let RawEvent { seq, event, body } = raw;
        let name = event.as_str();
        let body = match name {
            "initialized" => EventBody::Initialized,
            "stopped" => EventBody::Stopped(parse_event_body(name, body)?),
            "continued" => EventBody::Continued(parse_event_body(name, body)?),
            "exited" => EventBody::Exited(parse_event_body(name, body)?),
            "terminated" => EventBody::Terminated(match body {
                Some(value) => Some(parse_event_body(name, Some(value))?),
                None => None,
            }),
            "breakpoint" => EventBody::Breakpoint(parse_event_body(name, body)?),
            "output" => EventBody::Output(parse_event_body(name, body)?),
            "thread" => EventBody::Thread(parse_event_body(name, body)?),
            _ => EventBody::Unrecognized { event, body },
        };
        Ok(Event { seq, body })
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Event", 3)?;
        state.serialize_field("seq", &self.seq)?;
        state.serialize_field("event", self.body.name())?;
        match &self.body {
            EventBody::Stopped(body) => state.serialize_field("body", body)?,
            EventBody::Continued(body) => state.serialize_field("body", body)?,
            EventBody::Exited(body) => state.serialize_field("body", body)?,
            EventBody::Terminated(Some(body)) => state.serialize_field("body", body)?,
            EventBody::Breakpoint(body) => state.serialize_field("body", body)?,
            EventBody::Output(body) => state.serialize_field("body", body)?,
            EventBody::Thread(body) => state.serialize_field("body", body)?,
            EventBody::Unrecognized {
                body: Some(body), ..
            } => state.serialize_field("body", body)?,
            EventBody::Initialized
            | EventBody::Terminated(None)
            | EventBody::Unrecognized { body: None, .. } => state.skip_field("body")?,
        }
        state.end()
    }
}

// ---------------------------------------------------------------------------
// Request arguments
// ---------------------------------------------------------------------------

/// Arguments for the `initialize` request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequestArguments {
    /// ID of the client.
    #[serde(rename = "clientID", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Human-readable name of the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    /// ID of the debug adapter.
    #[serde(rename = "adapterID")]
    pub adapter_id: String,
    /// Client locale (e.g. "en-US").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Whether lines are 1-based.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines_start_at1: Option<bool>,
    /// Whether columns are 1-based.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns_start_at1: Option<bool>,
    /// Path format: "path" or "uri".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_format: Option<String>,
    /// Whether the client supports variable type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_variable_type: Option<bool>,
    /// Whether the client supports variable paging.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_variable_paging: Option<bool>,
    /// Whether the client supports the `runInTerminal` request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_run_in_terminal_request: Option<bool>,
}

/// Capabilities returned by the debug adapter in the `initialize` response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// The adapter supports the `configurationDone` request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_configuration_done_request: Option<bool>,
    /// The adapter supports conditional breakpoints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_conditional_breakpoints: Option<bool>,
    /// The adapter supports hit conditional breakpoints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_hit_conditional_breakpoints: Option<bool>,
    /// The adapter supports `evaluate` for hovers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_evaluate_for_hovers: Option<bool>,
    /// The adapter supports stepping backwards.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_step_back: Option<bool>,
    /// The adapter supports setting variable values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_set_variable: Option<bool>,
    /// The adapter supports the `terminate` request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_terminate_request: Option<bool>,
    /// The adapter supports `setInstructionBreakpoints`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_instruction_breakpoints: Option<bool>,
    /// The adapter honours a `granularity` on step requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_stepping_granularity: Option<bool>,
}

/// Arguments for the `setBreakpoints` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointsArguments {
    /// The source to set breakpoints for.
    pub source: Source,
    /// Breakpoints to set (replaces all previous ones).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakpoints: Option<Vec<SourceBreakpoint>>,
}

/// Response body for `setBreakpoints` and `setInstructionBreakpoints`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointsResponseBody {
    /// Information about the breakpoints, in request order.
    pub breakpoints: Vec<BreakpointResponse>,
}

/// A breakpoint as returned by the adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointResponse {
    /// Unique identifier for the breakpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Whether the breakpoint has been verified.
    pub verified: bool,
    /// Optional message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Actual source location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    /// Actual line of the breakpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<i64>,
    /// Actual column of the breakpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<i64>,
    /// Memory reference of the instruction, for instruction breakpoints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction_reference: Option<String>,
}

/// A source breakpoint (client-side).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceBreakpoint {
    /// The source line of the breakpoint.
    pub line: i64,
    /// Optional column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<i64>,
    /// Condition expression.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Arguments for the `setInstructionBreakpoints` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetInstructionBreakpointsArguments {
    /// All instruction breakpoints (replaces the previous set).
    pub breakpoints: Vec<InstructionBreakpoint>,
}

/// An address breakpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionBreakpoint {
    /// Memory reference, e.g. `0x08000400`.
    pub instruction_reference: String,
    /// Byte offset from the reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    /// Condition expression.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

// ---------------------------------------------------------------------------
// Step / flow-control arguments
// ---------------------------------------------------------------------------

/// Arguments for the `continue` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueArguments {
    /// The thread to continue.
    pub thread_id: i64,
    /// Whether to continue just this thread.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub single_thread: Option<bool>,
}

/// Arguments for the `next` (step over) request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextArguments {
    /// The thread to step.
    pub thread_id: i64,
    /// Stepping granularity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub granularity: Option<String>,
}

/// Arguments for the `stepIn` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepInArguments {
    /// The thread to step.
    pub thread_id: i64,
    /// Target to step into (if multiple).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<i64>,
    /// Stepping granularity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub granularity: Option<String>,
}

/// Arguments for the `stepOut` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutArguments {
    /// The thread to step.
    pub thread_id: i64,
    /// Stepping granularity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub granularity: Option<String>,
}

/// Arguments for the `pause` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseArguments {
    /// The thread to pause.
    pub thread_id: i64,
}

// ---------------------------------------------------------------------------
// Runtime types
// ---------------------------------------------------------------------------

/// A thread in the debuggee. probe-rs reports one per core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    /// Unique identifier of the thread.
    pub id: i64,
    /// Human-readable name of the thread.
    pub name: String,
}

/// Response body for `threads`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadsResponseBody {
    /// All threads.
    pub threads: Vec<Thread>,
}

/// Arguments for the `stackTrace` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceArguments {
    /// Thread whose stack is wanted.
    pub thread_id: i64,
    /// Index of the first frame to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_frame: Option<i64>,
    /// Maximum number of frames; all when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<i64>,
}

/// Response body for `stackTrace`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceResponseBody {
    /// Frames, innermost first.
    pub stack_frames: Vec<StackFrame>,
    /// Total number of frames available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_frames: Option<i64>,
}

/// A stack frame in the call stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    /// Unique identifier for the stack frame.
    pub id: i64,
    /// Name of the frame (function name).
    pub name: String,
    /// Source location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    /// Line within the source.
    pub line: i64,
    /// Column within the source.
    pub column: i64,
    /// Program counter of the frame.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction_pointer_reference: Option<String>,
}

/// A source location.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Short name of the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// File system path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Source reference (for sources without a file path).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_reference: Option<i64>,
}

/// Arguments for the `scopes` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopesArguments {
    /// Frame whose scopes are wanted.
    pub frame_id: i64,
}

/// Response body for `scopes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopesResponseBody {
    /// Scopes of the frame.
    pub scopes: Vec<Scope>,
}

/// A scope (container for variables).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    /// Name of the scope (e.g. "Locals", "Registers").
    pub name: String,
    /// Variables reference for this scope.
    pub variables_reference: i64,
    /// Whether the scope is expensive to resolve.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expensive: Option<bool>,
}

/// Arguments for the `variables` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariablesArguments {
    /// Reference from a scope or a structured variable.
    pub variables_reference: i64,
}

/// Response body for `variables`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariablesResponseBody {
    /// Child variables.
    pub variables: Vec<Variable>,
}

/// A variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    /// Name of the variable.
    pub name: String,
    /// Value of the variable as a string.
    pub value: String,
    /// Type of the variable.
    #[serde(rename = "type")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable_type: Option<String>,
    /// If > 0, the variable has children accessed via this reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables_reference: Option<i64>,
}

// ---------------------------------------------------------------------------
// Evaluate
// ---------------------------------------------------------------------------

/// Arguments for the `evaluate` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateArguments {
    /// The expression to evaluate.
    pub expression: String,
    /// Stack frame in whose context to evaluate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<i64>,
    /// Context: "watch", "repl", "hover", "clipboard".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Response body for `evaluate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponseBody {
    /// The result string.
    pub result: String,
    /// Type of the result.
    #[serde(rename = "type")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_type: Option<String>,
    /// If > 0, the result has children.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables_reference: Option<i64>,
}

// ---------------------------------------------------------------------------
// Disconnect
// ---------------------------------------------------------------------------

/// Arguments for the `disconnect` request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectArguments {
    /// Whether to restart the debuggee.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<bool>,
    /// Whether to terminate the debuggee.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminate_debuggee: Option<bool>,
    /// Whether to suspend the debuggee.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspend_debuggee: Option<bool>,
}

// ---------------------------------------------------------------------------
// Event bodies
// ---------------------------------------------------------------------------

/// Reason why the debuggee stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    /// A step request completed.
    Step,
    /// A breakpoint was hit.
    Breakpoint,
    /// An exception occurred.
    Exception,
    /// A pause request was fulfilled.
    Pause,
    /// An entry point was reached.
    Entry,
    /// A goto request completed.
    Goto,
    /// A function breakpoint was hit.
    #[serde(rename = "function breakpoint")]
    FunctionBreakpoint,
    /// A data breakpoint was hit.
    #[serde(rename = "data breakpoint")]
    DataBreakpoint,
    /// An instruction breakpoint was hit.
    #[serde(rename = "instruction breakpoint")]
    InstructionBreakpoint,
    /// Any reason this client does not know.
    #[serde(other)]
    Unknown,
}

/// Body of the `stopped` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoppedEventBody {
    /// The reason for the stop.
    pub reason: StopReason,
    /// Description of the stop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Thread that stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<i64>,
    /// Whether all threads are stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_threads_stopped: Option<bool>,
    /// Additional text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Breakpoints that triggered the stop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_breakpoint_ids: Option<Vec<i64>>,
}

/// Body of the `continued` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuedEventBody {
    /// Thread that resumed.
    pub thread_id: i64,
    /// Whether every thread resumed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_threads_continued: Option<bool>,
}

/// Body of the `output` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputEventBody {
    /// Output category: "console", "stdout", "stderr", "telemetry".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// The output text.
    pub output: String,
    /// Source location that generated the output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    /// Line in the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<i64>,
}

/// Body of the `exited` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitedEventBody {
    /// The exit code of the debuggee.
    pub exit_code: i64,
}

/// Body of the `terminated` event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminatedEventBody {
    /// Restart data; if present, a restart is requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<Value>,
}

/// Body of the `breakpoint` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointEventBody {
    /// "changed", "new" or "removed".
    pub reason: String,
    /// The breakpoint, identified by its `id`.
    pub breakpoint: BreakpointResponse,
}

/// Body of the `thread` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadEventBody {
    /// "started" or "exited".
    pub reason: String,
    /// The thread.
    pub thread_id: i64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
