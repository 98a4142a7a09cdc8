use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use probe_bridge_config::{load_settings, DebugConfig, Settings};
use probe_bridge_dap::{EventBody, SessionEvent};
use probe_bridge_platform::{default_log_file_path, log_level_to_filter, open_log_file};
use probe_bridge_platform::{DefaultPaths, PlatformPaths};

use crate::commands::{parse_breakpoint_specs, parse_command, HELP};
use crate::dap_types::{HostCommand, HostEvent};

/// Set up logging and the runtime, drive one debug session from stdin.
///
/// `breakpoint_specs` are `file:line` pairs set before the target runs.
pub(crate) fn run_host(config_path: PathBuf, breakpoint_specs: &[String]) -> Result<()> {
    let paths = DefaultPaths::new().context("failed to detect platform paths")?;

    // Load settings first so we can honour log settings.
    let project_dir = std::env::current_dir().ok();
    let settings = load_settings(&paths.config_dir(), project_dir.as_deref());
    let (settings, settings_error) = match settings {
        Ok(settings) => (settings, None),
        Err(e) => (Settings::default(), Some(e)),
    };

    let log_path = settings
        .log
        .file
        .clone()
        .unwrap_or_else(|| default_log_file_path(&paths));
    init_logging(&log_path, settings.log.level.as_str());
    info!(log = %log_path.display(), "probe-bridge starting");
    if let Some(e) = settings_error {
        error!("settings load failed, using defaults: {e}");
    }

    let config = DebugConfig::from_file(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let breakpoints = parse_breakpoint_specs(breakpoint_specs)?;

    let (cmd_tx, cmd_rx) = tokio::sync::mpsc::channel::<HostCommand>(64);
    let (evt_tx, evt_rx) = std_mpsc::channel();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    runtime.spawn(crate::dap_task::dap_manager_task(
        cmd_rx,
        evt_tx,
        settings.dap.clone(),
    ));

    cmd_tx
        .blocking_send(HostCommand::Start {
            config,
            breakpoints,
        })
        .context("debug task stopped before start")?;

    // stdin blocks, so it gets its own thread.
    let input_tx = cmd_tx.clone();
    std::thread::spawn(move || read_commands(input_tx));
    drop(cmd_tx);

    for event in evt_rx {
        if matches!(event, HostEvent::Finished) {
            break;
        }
        print_event(&event);
    }

    runtime.shutdown_timeout(Duration::from_secs(2));
    info!("probe-bridge exited cleanly");
    Ok(())
}

fn init_logging(log_path: &Path, level: &str) {
    let writer = match open_log_file(log_path) {
        Ok(file) => BoxMakeWriter::new(std::sync::Mutex::new(file)),
        Err(e) => {
            eprintln!("probe-bridge: logging disabled: {e}");
            BoxMakeWriter::new(std::io::sink)
        }
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level_to_filter(level)));

    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_env_filter(env_filter)
        .init();
}

fn read_commands(cmd_tx: tokio::sync::mpsc::Sender<HostCommand>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("stdin read failed: {e}");
                break;
            }
        };
        match parse_command(&line) {
            Ok(Some(cmd)) => {
                let quit = cmd == HostCommand::Quit;
                if cmd_tx.blocking_send(cmd).is_err() || quit {
                    return;
                }
            }
            Ok(None) => {
                if line.trim() == "help" || line.trim() == "?" {
                    println!("{HELP}");
                }
            }
            Err(e) => println!("{e:#}"),
        }
    }
    // End of input behaves like `quit`.
    let _ = cmd_tx.blocking_send(HostCommand::Quit);
}

fn print_event(event: &HostEvent) {
    match event {
        HostEvent::Started {
            session,
            capabilities,
        } => {
            println!("{session} running");
            if !capabilities.is_empty() {
                println!("adapter supports: {}", capabilities.join(", "));
            }
        }
        HostEvent::Session(event) => print_session_event(event),
        HostEvent::Breakpoints(breakpoints) => {
            if breakpoints.is_empty() {
                println!("no breakpoints");
            }
            for bp in breakpoints {
                let status = if bp.verified { "verified" } else { "pending" };
                match &bp.message {
                    Some(message) => println!("  {} [{status}] {message}", bp.location),
                    None => println!("  {} [{status}]", bp.location),
                }
            }
        }
        HostEvent::Threads(threads) => {
            for thread in threads {
                println!("  thread {}: {}", thread.id, thread.name);
            }
        }
        HostEvent::Stack(frames) => {
            for (depth, frame) in frames.iter().enumerate() {
                let location = frame
                    .source
                    .as_ref()
                    .and_then(|s| s.path.as_deref().or(s.name.as_deref()))
                    .unwrap_or("??");
                println!("  #{depth} {} at {location}:{}", frame.name, frame.line);
            }
        }
        HostEvent::Evaluated(result) => println!("{result}"),
        HostEvent::Info(message) => println!("{message}"),
        HostEvent::Error(message) => println!("error: {message}"),
        HostEvent::Finished => {}
    }
}

fn print_session_event(event: &SessionEvent) {
    match event {
        SessionEvent::Event(event) => match &event.body {
            EventBody::Stopped(stopped) => {
                let thread = stopped
                    .thread_id
                    .map(|id| format!(" (thread {id})"))
                    .unwrap_or_default();
                let reason = stopped
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("{:?}", stopped.reason).to_lowercase());
                println!("stopped: {reason}{thread}");
            }
            EventBody::Continued(_) => println!("running"),
            EventBody::Exited(exited) => println!("target exited with code {}", exited.exit_code),
            EventBody::Output(output) => print!("{}", output.output),
            EventBody::Breakpoint(changed) => {
                let state = if changed.breakpoint.verified {
                    "verified"
                } else {
                    "unverified"
                };
                match changed.breakpoint.id {
                    Some(id) => println!("breakpoint {id} {} ({state})", changed.reason),
                    None => println!("breakpoint {} ({state})", changed.reason),
                }
            }
            EventBody::Initialized | EventBody::Terminated(_) | EventBody::Thread(_) => {}
            EventBody::Unrecognized { event, .. } => info!(event = %event, "unhandled event"),
        },
        SessionEvent::ReverseRequest(request) => {
            println!(
                "adapter requested '{}', which this client does not handle",
                request.command.name()
            );
        }
        SessionEvent::Terminated { reason } => println!("session ended: {reason}"),
    }
}
