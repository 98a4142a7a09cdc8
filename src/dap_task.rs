use std::path::PathBuf;
use std::sync::mpsc::Sender;

use probe_bridge_config::{DapSettings, DebugConfig};
use probe_bridge_dap::{DapBridge, DapError, SessionId, SessionRegistry};
use tokio::sync::mpsc::Receiver;

use crate::dap_types::{HostCommand, HostEvent};

/// Async task that owns the debug sessions and processes host commands.
///
/// Runs on the tokio runtime, receives commands from the main thread, and
/// sends results and session events back via the event channel.
pub(crate) async fn dap_manager_task(
    mut cmd_rx: Receiver<HostCommand>,
    evt_tx: Sender<HostEvent>,
    settings: DapSettings,
) {
    let mut registry = SessionRegistry::new();
    let mut current: Option<SessionId> = None;

    while let Some(cmd) = cmd_rx.recv().await {
        let cmd = match cmd {
            HostCommand::Quit => break,
            HostCommand::Start {
                config,
                breakpoints,
            } => {
                match start_session(config, &breakpoints, &settings, &evt_tx).await {
                    Ok(bridge) => {
                        let capabilities = bridge.capabilities().await.supported();
                        let id = registry.insert(bridge);
                        current = Some(id);
                        let _ = evt_tx.send(HostEvent::Started {
                            session: id,
                            capabilities,
                        });
                    }
                    Err(e) => {
                        let _ = evt_tx
                            .send(HostEvent::Error(format!("failed to start session: {e}")));
                    }
                }
                continue;
            }
            other => other,
        };

        let Some(bridge) = current.and_then(|id| registry.get(id)) else {
            let _ = evt_tx.send(HostEvent::Error("no debug session".into()));
            continue;
        };
        let event = match handle_command(bridge, cmd).await {
            Ok(event) => event,
            Err(e) => HostEvent::Error(e.to_string()),
        };
        let _ = evt_tx.send(event);
    }

    registry.disconnect_all(true).await;
    let _ = evt_tx.send(HostEvent::Finished);
}

/// Connect, then run initialize → launch/attach → breakpoints →
/// configurationDone.
async fn start_session(
    config: DebugConfig,
    breakpoints: &[(PathBuf, Vec<i64>)],
    settings: &DapSettings,
    evt_tx: &Sender<HostEvent>,
) -> Result<DapBridge, DapError> {
    let bridge = DapBridge::connect(config, settings).await?;

    let mut events = bridge.subscribe().await;
    let forward_tx = evt_tx.clone();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if forward_tx.send(HostEvent::Session(event)).is_err() {
                break;
            }
        }
    });

    let capabilities = bridge.initialize().await?;
    tracing::info!(session = %bridge.id(), supported = ?capabilities.supported(), "adapter initialized");
    bridge.launch().await?;
    bridge.wait_for_initialized().await?;
    for (file, lines) in breakpoints {
        let placed = bridge.set_breakpoints(file, lines).await?;
        let _ = evt_tx.send(HostEvent::Breakpoints(placed));
    }
    bridge.configuration_done().await?;
    Ok(bridge)
}

async fn handle_command(bridge: &DapBridge, cmd: HostCommand) -> Result<HostEvent, DapError> {
    let event = match cmd {
        HostCommand::SetBreakpoints { file, lines } => {
            HostEvent::Breakpoints(bridge.set_breakpoints(&file, &lines).await?)
        }
        HostCommand::SetInstructionBreakpoints(addresses) => {
            HostEvent::Breakpoints(bridge.set_instruction_breakpoints(&addresses).await?)
        }
        HostCommand::Continue { thread_id } => {
            let thread_id = resolve_thread(bridge, thread_id).await;
            bridge.continue_execution(thread_id).await?;
            HostEvent::Info("running".into())
        }
        HostCommand::Step { kind, thread_id } => {
            let thread_id = resolve_thread(bridge, thread_id).await;
            bridge.step(kind, thread_id).await?;
            HostEvent::Info("stepping".into())
        }
        HostCommand::Pause { thread_id } => {
            let thread_id = resolve_thread(bridge, thread_id).await;
            bridge.pause(thread_id).await?;
            HostEvent::Info("pause requested".into())
        }
        HostCommand::Threads => HostEvent::Threads(bridge.threads().await?),
        HostCommand::StackTrace { thread_id } => {
            let thread_id = resolve_thread(bridge, thread_id).await;
            HostEvent::Stack(bridge.stack_trace(thread_id).await?)
        }
        HostCommand::Evaluate { expression } => {
            let frame_id = top_frame(bridge).await;
            HostEvent::Evaluated(bridge.evaluate(&expression, frame_id).await?.result)
        }
        HostCommand::Breakpoints => HostEvent::Breakpoints(bridge.breakpoints().await),
        HostCommand::Start { .. } | HostCommand::Quit => HostEvent::Info("ignored".into()),
    };
    Ok(event)
}

/// Explicit thread, else the one that stopped, else 0.
async fn resolve_thread(bridge: &DapBridge, thread_id: Option<i64>) -> i64 {
    match thread_id {
        Some(id) => id,
        None => bridge
            .stop_snapshot()
            .await
            .and_then(|snapshot| snapshot.thread_id)
            .unwrap_or(0),
    }
}

/// Innermost frame of the stopped thread, if the target is halted.
async fn top_frame(bridge: &DapBridge) -> Option<i64> {
    let thread_id = bridge.stop_snapshot().await?.thread_id.unwrap_or(0);
    match bridge.stack_trace(thread_id).await {
        Ok(frames) => frames.first().map(|frame| frame.id),
        Err(e) => {
            tracing::debug!(error = %e, "evaluating without a frame");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_bridge_dap::{codec, Command, Event, EventBody, FrameDecoder, Message, Response};
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Acknowledge every request until `configurationDone`, recording the
    /// command order.
    async fn serve(listener: TcpListener) -> Vec<String> {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut decoder = FrameDecoder::new();
        let mut buf = [0u8; 4096];
        let mut seen = Vec::new();
        let mut seq = 0;
        loop {
            while let Some(message) = decoder.next_message().unwrap() {
                let Message::Request(request) = message else {
                    continue;
                };
                let name = request.command.name().to_string();
                let body = match &request.command {
                    Command::SetBreakpoints(args) => {
                        let count = args.breakpoints.as_ref().map_or(0, Vec::len);
                        let placed: Vec<_> = (0..count).map(|_| json!({"verified": true})).collect();
                        Some(json!({ "breakpoints": placed }))
                    }
                    _ => None,
                };
                seq += 1;
                let response = Response::success(seq, request.seq, &name, body);
                socket
                    .write_all(&codec::encode(&Message::Response(response)).unwrap())
                    .await
                    .unwrap();
                if name == "attach" {
                    seq += 1;
                    let event = Message::Event(Event::new(seq, EventBody::Initialized));
                    socket.write_all(&codec::encode(&event).unwrap()).await.unwrap();
                }
                let done = name == "configurationDone";
                seen.push(name);
                if done {
                    return seen;
                }
            }
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return seen;
            }
            decoder.extend(&buf[..n]);
        }
    }

    #[tokio::test]
    async fn start_session_sets_breakpoints_before_configuration_done() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(serve(listener));

        let config = DebugConfig::from_value(json!({
            "adapter": "probe-rs",
            "request": "attach",
            "server": format!("127.0.0.1:{port}"),
        }))
        .unwrap();
        let breakpoints = vec![
            (PathBuf::from("/fw/src/main.rs"), vec![10, 20]),
            (PathBuf::from("/fw/src/lib.rs"), vec![3]),
        ];
        let (evt_tx, evt_rx) = std::sync::mpsc::channel();

        let bridge = start_session(config, &breakpoints, &DapSettings::default(), &evt_tx)
            .await
            .unwrap();
        assert_eq!(
            server.await.unwrap(),
            [
                "initialize",
                "attach",
                "setBreakpoints",
                "setBreakpoints",
                "configurationDone"
            ]
        );

        let placed: Vec<usize> = evt_rx
            .try_iter()
            .filter_map(|event| match event {
                HostEvent::Breakpoints(bps) => Some(bps.len()),
                _ => None,
            })
            .collect();
        assert_eq!(placed, [2, 1]);
        assert_eq!(bridge.breakpoints().await.len(), 3);
    }
}
