//! DAP transport layer.
//!
//! Owns the byte stream to the debug backend: a TCP socket, the piped stdio
//! of a spawned adapter, or a `probe-rs dap-server` we start and then reach
//! over TCP. Reading and writing run as background tasks; frames go out
//! through an unbounded channel and decoded messages come back as
//! [`TransportEvent`]s.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use probe_bridge_config::{AdapterBinary, ServerAddress};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, Command as TokioCommand};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};

use crate::codec::{self, FrameDecoder};
use crate::error::DapError;
use crate::protocol::Message;

/// Size of each read from the backend stream.
const READ_CHUNK: usize = 8 * 1024;

/// Pause between connect attempts while a spawned server binds its port.
const SPAWN_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Where the debug backend lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// An already running server.
    Tcp {
        /// `host:port`.
        address: String,
    },
    /// An adapter speaking DAP on its stdin/stdout.
    Stdio {
        /// Program to run.
        command: String,
        /// Its arguments.
        args: Vec<String>,
        /// Working directory.
        cwd: Option<PathBuf>,
    },
    /// A server we start ourselves and then connect to.
    SpawnTcp {
        /// Program to run.
        command: String,
        /// Its arguments.
        args: Vec<String>,
        /// Where it will listen.
        address: ServerAddress,
        /// Working directory.
        cwd: Option<PathBuf>,
    },
}

impl Target {
    /// TCP target; surrounding whitespace in `address` is dropped.
    pub fn tcp(address: &str) -> Self {
        Target::Tcp {
            address: address.trim().to_string(),
        }
    }

    /// Build the target for a resolved adapter binary.
    pub fn from_adapter_binary(binary: &AdapterBinary, cwd: Option<PathBuf>) -> Self {
        match &binary.command {
            Some(command) => Target::SpawnTcp {
                command: command.clone(),
                args: binary.arguments.clone(),
                address: binary.connection,
                cwd,
            },
            None => Target::Tcp {
                address: binary.connection.to_string(),
            },
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Tcp { address } => write!(f, "tcp://{address}"),
            Target::Stdio { command, args, .. } => write!(f, "stdio:{command} {}", args.join(" ")),
            Target::SpawnTcp {
                command, address, ..
            } => write!(f, "{command} on tcp://{address}"),
        }
    }
}

/// What the reader task reports.
#[derive(Debug)]
pub enum TransportEvent {
    /// A complete, decoded message.
    Message(Message),
    /// A read, write or framing failure. Fatal ones are followed by nothing.
    Error(DapError),
    /// A complete frame that is not a valid message. `request_seq` is set
    /// when the payload still names the request it answers.
    Undecodable {
        /// Request the payload claims to answer.
        request_seq: Option<i64>,
        /// Why decoding failed.
        error: DapError,
    },
    /// The backend closed the stream on a frame boundary.
    Closed,
}

/// Releases the I/O tasks and the child process when dropped.
#[derive(Debug, Default)]
pub struct ConnectionGuard {
    tasks: Vec<JoinHandle<()>>,
    child: Option<Child>,
}

impl ConnectionGuard {
    /// Abort `handle` when this guard is closed.
    pub fn track(&mut self, handle: JoinHandle<()>) {
        self.tasks.push(handle);
    }

    fn attach_child(&mut self, child: Child) {
        self.child = Some(child);
    }

    /// Whether a spawned process is attached.
    pub fn has_child(&self) -> bool {
        self.child.is_some()
    }

    /// Stop all tasks and kill the child. Safe to call repeatedly.
    pub fn close(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                tracing::debug!(error = %e, "debug adapter already exited");
            }
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.close();
    }
}

/// An open byte stream to the backend.
#[derive(Debug)]
pub struct Connection {
    writer: mpsc::UnboundedSender<Vec<u8>>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    guard: ConnectionGuard,
}

impl Connection {
    /// Run the reader and writer tasks over any async stream pair.
    pub fn from_streams<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();

        let mut guard = ConnectionGuard::default();
        guard.track(tokio::spawn(write_loop(writer, writer_rx, events_tx.clone())));
        guard.track(tokio::spawn(read_loop(reader, events_tx)));

        Self {
            writer: writer_tx,
            events,
            guard,
        }
    }

    /// Queue raw bytes for the writer task.
    pub fn send(&self, bytes: Vec<u8>) -> Result<(), DapError> {
        self.writer
            .send(bytes)
            .map_err(|_| DapError::Connection("connection writer closed".into()))
    }

    /// Encode and queue a message.
    pub fn send_message(&self, message: &Message) -> Result<(), DapError> {
        self.send(codec::encode(message)?)
    }

    /// Wait for the next transport event. `None` once the reader is gone.
    pub async fn receive(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    /// A handle for queueing frames.
    pub fn sender(&self) -> mpsc::UnboundedSender<Vec<u8>> {
        self.writer.clone()
    }

    /// Split into the writer channel, the event stream and the guard.
    pub fn into_parts(
        self,
    ) -> (
        mpsc::UnboundedSender<Vec<u8>>,
        mpsc::UnboundedReceiver<TransportEvent>,
        ConnectionGuard,
    ) {
        (self.writer, self.events, self.guard)
    }
}

/// Open a connection to `target`.
pub async fn connect(target: &Target, connect_timeout: Duration) -> Result<Connection, DapError> {
    tracing::info!(%target, "connecting to debug adapter");
    match target {
        Target::Tcp { address } => {
            let stream = connect_tcp(address, connect_timeout).await?;
            let (reader, writer) = stream.into_split();
            Ok(Connection::from_streams(reader, writer))
        }
        Target::Stdio { command, args, cwd } => {
            let mut child = spawn(command, args, cwd.as_deref(), true)?;
            let stdin = child
                .stdin
                .take()
                .ok_or_else(|| DapError::Connection("could not capture adapter stdin".into()))?;
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| DapError::Connection("could not capture adapter stdout".into()))?;

            let mut connection = Connection::from_streams(stdout, stdin);
            if let Some(stderr) = child.stderr.take() {
                connection
                    .guard
                    .track(tokio::spawn(log_stderr(stderr, command.clone())));
            }
            connection.guard.attach_child(child);
            Ok(connection)
        }
        Target::SpawnTcp {
            command,
            args,
            address,
            cwd,
        } => {
            let mut child = spawn(command, args, cwd.as_deref(), false)?;
            let stderr_task = child
                .stderr
                .take()
                .map(|stderr| tokio::spawn(log_stderr(stderr, command.clone())));

            let stream = match connect_spawned(&mut child, command, address, connect_timeout).await
            {
                Ok(stream) => stream,
                Err(e) => {
                    if let Some(task) = stderr_task {
                        task.abort();
                    }
                    return Err(e);
                }
            };

            let (reader, writer) = stream.into_split();
            let mut connection = Connection::from_streams(reader, writer);
            if let Some(task) = stderr_task {
                connection.guard.track(task);
            }
            connection.guard.attach_child(child);
            Ok(connection)
        }
    }
}

async fn connect_tcp(address: &str, connect_timeout: Duration) -> Result<TcpStream, DapError> {
    let stream = timeout(connect_timeout, TcpStream::connect(address))
        .await
        .map_err(|_| {
            DapError::Connection(format!(
                "timed out after {}ms connecting to {address}",
                connect_timeout.as_millis()
            ))
        })?
        .map_err(|e| DapError::Connection(format!("cannot connect to {address}: {e}")))?;
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(error = %e, "could not set TCP_NODELAY");
    }
    Ok(stream)
}

/// Keep trying until the spawned server accepts, exits, or time runs out.
async fn connect_spawned(
    child: &mut Child,
    command: &str,
    address: &ServerAddress,
    connect_timeout: Duration,
) -> Result<TcpStream, DapError> {
    let deadline = Instant::now() + connect_timeout;
    let target = address.socket_addr();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let last_error = match timeout(remaining, TcpStream::connect(target)).await {
            Ok(Ok(stream)) => return Ok(stream),
            Ok(Err(e)) => e.to_string(),
            Err(_) => "connect timed out".to_string(),
        };

        let exited = child
            .try_wait()
            .map_err(|e| DapError::Connection(format!("cannot poll {command}: {e}")))?;
        if let Some(status) = exited {
            return Err(DapError::Connection(format!(
                "{command} exited with {status} before accepting connections"
            )));
        }
        if Instant::now() + SPAWN_RETRY_INTERVAL >= deadline {
            return Err(DapError::Connection(format!(
                "{command} did not accept connections on {address} within {}ms: {last_error}",
                connect_timeout.as_millis()
            )));
        }
        sleep(SPAWN_RETRY_INTERVAL).await;
    }
}

/// Start `command`. With `piped_stdio` its stdin/stdout carry DAP;
/// otherwise they are discarded. Stderr always goes to the log.
fn spawn(
    command: &str,
    args: &[String],
    cwd: Option<&Path>,
    piped_stdio: bool,
) -> Result<Child, DapError> {
    let stdio = || {
        if piped_stdio {
            Stdio::piped()
        } else {
            Stdio::null()
        }
    };
    let mut cmd = TokioCommand::new(command);
    cmd.args(args)
        .stdin(stdio())
        .stdout(stdio())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }
    let child = cmd
        .spawn()
        .map_err(|e| DapError::Connection(format!("failed to spawn {command}: {e}")))?;
    tracing::debug!(%command, pid = ?child.id(), "debug adapter spawned");
    Ok(child)
}

async fn log_stderr<R: AsyncRead + Unpin>(stderr: R, command: String) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => tracing::debug!(adapter = %command, "{line}"),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(adapter = %command, error = %e, "stopped reading adapter stderr");
                break;
            }
        }
    }
}

async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: R,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let mut decoder = FrameDecoder::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => {
                let event = match decoder.finish() {
                    Ok(()) => TransportEvent::Closed,
                    Err(e) => TransportEvent::Error(e),
                };
                let _ = events.send(event);
                return;
            }
            Ok(n) => n,
            Err(e) => {
                let _ = events.send(TransportEvent::Error(DapError::Connection(format!(
                    "read failed: {e}"
                ))));
                return;
            }
        };
        decoder.extend(&chunk[..n]);

        loop {
            let event = match decoder.next_frame() {
                Ok(Some(payload)) => match codec::decode(&payload) {
                    Ok(message) => TransportEvent::Message(message),
                    Err(error) => {
                        let request_seq = codec::response_request_seq(&payload);
                        tracing::warn!(error = %error, ?request_seq, "skipping undecodable message");
                        TransportEvent::Undecodable { request_seq, error }
                    }
                },
                Ok(None) => break,
                Err(e) if e.is_fatal() => {
                    tracing::error!(error = %e, buffered = decoder.buffered(), "stream desynchronized");
                    let _ = events.send(TransportEvent::Error(e));
                    return;
                }
                Err(e) => TransportEvent::Error(e),
            };
            if events.send(event).is_err() {
                return;
            }
        }
    }
}

async fn write_loop<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut frames: mpsc::UnboundedReceiver<Vec<u8>>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    while let Some(frame) = frames.recv().await {
        let written = match writer.write_all(&frame).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = events.send(TransportEvent::Error(DapError::Connection(format!(
                "write failed: {e}"
            ))));
            return;
        }
    }
    let _ = writer.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Command, Event, EventBody, Request};
    use tokio::io::duplex;
    use tokio::net::TcpListener;

    fn initialized(seq: i64) -> Message {
        Message::Event(Event::new(seq, EventBody::Initialized))
    }

    async fn read_frames<R: AsyncRead + Unpin>(reader: &mut R, count: usize) -> Vec<Message> {
        let mut decoder = FrameDecoder::new();
        let mut out = Vec::new();
        let mut buf = [0u8; 1024];
        while out.len() < count {
            let n = reader.read(&mut buf).await.unwrap();
            assert!(n > 0, "stream closed early");
            decoder.extend(&buf[..n]);
            while let Some(m) = decoder.next_message().unwrap() {
                out.push(m);
            }
        }
        out
    }

    #[test]
    fn transport_tcp_target_trims_address() {
        assert_eq!(
            Target::tcp("  127.0.0.1:50000 \n"),
            Target::Tcp {
                address: "127.0.0.1:50000".into()
            }
        );
    }

    #[test]
    fn transport_target_from_adapter_binary() {
        let running = AdapterBinary {
            command: None,
            arguments: Vec::new(),
            connection: ServerAddress::localhost(50001),
        };
        assert_eq!(
            Target::from_adapter_binary(&running, None),
            Target::tcp("127.0.0.1:50001")
        );

        let spawned = AdapterBinary {
            command: Some("probe-rs".into()),
            arguments: vec!["dap-server".into(), "--port".into(), "50000".into()],
            connection: ServerAddress::localhost(50000),
        };
        let target = Target::from_adapter_binary(&spawned, Some(PathBuf::from("/fw")));
        assert!(matches!(&target, Target::SpawnTcp { command, .. } if command == "probe-rs"));
        assert_eq!(target.to_string(), "probe-rs on tcp://127.0.0.1:50000");
    }

    #[tokio::test]
    async fn transport_streams_send_and_receive() {
        let (client, backend) = duplex(64);
        let (client_read, client_write) = tokio::io::split(client);
        let (mut backend_read, mut backend_write) = tokio::io::split(backend);
        let mut connection = Connection::from_streams(client_read, client_write);

        connection
            .send_message(&Message::Request(Request::new(1, Command::Threads)))
            .unwrap();
        let sent = read_frames(&mut backend_read, 1).await;
        assert!(matches!(&sent[0], Message::Request(r) if r.seq == 1));

        // Small duplex buffer forces the frame through in pieces.
        backend_write
            .write_all(&codec::encode(&initialized(7)).unwrap())
            .await
            .unwrap();
        match connection.receive().await {
            Some(TransportEvent::Message(m)) => assert_eq!(m, initialized(7)),
            other => panic!("expected message, got {other:?}"),
        }

        drop(backend_write);
        drop(backend_read);
        assert!(matches!(connection.receive().await, Some(TransportEvent::Closed)));
    }

    #[tokio::test]
    async fn transport_close_mid_frame_is_framing_error() {
        let (client, mut backend) = duplex(1024);
        let (r, w) = tokio::io::split(client);
        let mut connection = Connection::from_streams(r, w);

        backend
            .write_all(b"Content-Length: 50\r\n\r\n{\"seq\":")
            .await
            .unwrap();
        drop(backend);
        match connection.receive().await {
            Some(TransportEvent::Error(DapError::Framing(_))) => {}
            other => panic!("expected framing error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_bad_payload_is_reported_and_skipped() {
        let (client, mut backend) = duplex(1024);
        let (r, w) = tokio::io::split(client);
        let mut connection = Connection::from_streams(r, w);

        backend.write_all(&codec::frame(b"[1, 2]")).await.unwrap();
        backend
            .write_all(&codec::encode(&initialized(2)).unwrap())
            .await
            .unwrap();
        assert!(matches!(
            connection.receive().await,
            Some(TransportEvent::Undecodable {
                request_seq: None,
                error: DapError::Protocol(_)
            })
        ));
        assert!(matches!(
            connection.receive().await,
            Some(TransportEvent::Message(_))
        ));
    }

    #[tokio::test]
    async fn transport_malformed_response_keeps_request_seq() {
        let (client, mut backend) = duplex(1024);
        let (r, w) = tokio::io::split(client);
        let mut connection = Connection::from_streams(r, w);

        backend
            .write_all(&codec::frame(
                br#"{"seq":9,"type":"response","request_seq":4,"success":true}"#,
            ))
            .await
            .unwrap();
        match connection.receive().await {
            Some(TransportEvent::Undecodable {
                request_seq: Some(4),
                error: DapError::Protocol(_),
            }) => {}
            other => panic!("expected undecodable response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_tcp_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let accept = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(&codec::encode(&initialized(1)).unwrap())
                .await
                .unwrap();
            socket
        });

        let mut connection = connect(&Target::tcp(&address), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(matches!(
            connection.receive().await,
            Some(TransportEvent::Message(_))
        ));
        drop(accept.await.unwrap());
        assert!(matches!(connection.receive().await, Some(TransportEvent::Closed)));
    }

    #[tokio::test]
    async fn transport_tcp_unreachable_is_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);
        let err = connect(&Target::tcp(&address), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, DapError::Connection(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn transport_spawn_failure_is_connection_error() {
        let target = Target::Stdio {
            command: "probe-bridge-no-such-adapter".into(),
            args: Vec::new(),
            cwd: None,
        };
        let err = connect(&target, Duration::from_secs(1)).await.unwrap_err();
        assert!(err.to_string().contains("failed to spawn"), "got: {err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn transport_stdio_roundtrip_through_cat() {
        let target = Target::Stdio {
            command: "cat".into(),
            args: Vec::new(),
            cwd: None,
        };
        let mut connection = connect(&target, Duration::from_secs(1)).await.unwrap();
        connection.send_message(&initialized(3)).unwrap();
        match connection.receive().await {
            Some(TransportEvent::Message(m)) => assert_eq!(m, initialized(3)),
            other => panic!("expected echoed message, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn transport_spawned_server_exiting_early() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let target = Target::SpawnTcp {
            command: "true".into(),
            args: Vec::new(),
            address: ServerAddress::localhost(port),
            cwd: None,
        };
        let err = connect(&target, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, DapError::Connection(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn transport_guard_close_stops_tasks() {
        let (client, _backend) = duplex(64);
        let (r, w) = tokio::io::split(client);
        let connection = Connection::from_streams(r, w);
        let (writer, mut events, mut guard) = connection.into_parts();
        guard.close();
        guard.close();
        assert!(!guard.has_child());
        assert!(events.recv().await.is_none());
        assert!(writer.send(Vec::new()).is_err());
    }
}
