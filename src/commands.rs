//! Parsing of host commands typed on stdin.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use probe_bridge_dap::StepKind;

use crate::dap_types::HostCommand;

/// Help text printed for `help` and unknown commands.
pub(crate) const HELP: &str = "\
commands:
  break <file> [line...]   replace breakpoints in <file> (no lines clears them)
  ibreak [addr...]         replace instruction breakpoints (hex or decimal)
  continue|c [thread]      resume the target
  next|n [thread]          step over
  stepin|s [thread]        step into
  stepout|o [thread]       step out
  pause [thread]           halt the target
  threads                  list threads
  stack|bt [thread]        show the call stack
  eval|p <expression>      evaluate in the current frame
  bps                      list breakpoints
  quit|q                   disconnect and exit";

/// Parse one input line. Blank lines and `help` yield `None`.
pub(crate) fn parse_command(line: &str) -> Result<Option<HostCommand>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };

    let command = match verb {
        "break" | "b" => {
            let file = words.next().context("usage: break <file> [line...]")?;
            let lines = words
                .map(|w| {
                    w.parse::<i64>()
                        .ok()
                        .filter(|line| *line > 0)
                        .with_context(|| format!("invalid line number '{w}'"))
                })
                .collect::<Result<Vec<_>>>()?;
            HostCommand::SetBreakpoints {
                file: PathBuf::from(file),
                lines,
            }
        }
        "ibreak" => HostCommand::SetInstructionBreakpoints(
            words.map(parse_address).collect::<Result<Vec<_>>>()?,
        ),
        "continue" | "c" => HostCommand::Continue {
            thread_id: thread_arg(words.next())?,
        },
        "next" | "n" => step(StepKind::Over, words.next())?,
        "stepin" | "s" => step(StepKind::In, words.next())?,
        "stepout" | "o" => step(StepKind::Out, words.next())?,
        "pause" => HostCommand::Pause {
            thread_id: thread_arg(words.next())?,
        },
        "threads" => HostCommand::Threads,
        "stack" | "bt" => HostCommand::StackTrace {
            thread_id: thread_arg(words.next())?,
        },
        "eval" | "p" => {
            let expression = words.collect::<Vec<_>>().join(" ");
            if expression.is_empty() {
                bail!("usage: eval <expression>");
            }
            HostCommand::Evaluate { expression }
        }
        "bps" => HostCommand::Breakpoints,
        "quit" | "q" | "exit" => HostCommand::Quit,
        "help" | "?" => return Ok(None),
        other => bail!("unknown command '{other}'; type 'help'"),
    };
    Ok(Some(command))
}

/// Parse `file:line` arguments into per-file line lists, in first-seen
/// file order.
pub(crate) fn parse_breakpoint_specs<S: AsRef<str>>(specs: &[S]) -> Result<Vec<(PathBuf, Vec<i64>)>> {
    let mut grouped: Vec<(PathBuf, Vec<i64>)> = Vec::new();
    for spec in specs {
        let spec = spec.as_ref();
        let (file, line) = spec
            .rsplit_once(':')
            .filter(|(file, _)| !file.is_empty())
            .with_context(|| format!("expected <file>:<line>, got '{spec}'"))?;
        let line = line
            .parse::<i64>()
            .ok()
            .filter(|line| *line > 0)
            .with_context(|| format!("invalid line number in '{spec}'"))?;
        let file = PathBuf::from(file);
        match grouped.iter_mut().find(|(known, _)| *known == file) {
            Some((_, lines)) => lines.push(line),
            None => grouped.push((file, vec![line])),
        }
    }
    Ok(grouped)
}

fn step(kind: StepKind, thread: Option<&str>) -> Result<HostCommand> {
    Ok(HostCommand::Step {
        kind,
        thread_id: thread_arg(thread)?,
    })
}

fn thread_arg(word: Option<&str>) -> Result<Option<i64>> {
    word.map(|w| {
        w.parse::<i64>()
            .with_context(|| format!("invalid thread id '{w}'"))
    })
    .transpose()
}

fn parse_address(word: &str) -> Result<u64> {
    let parsed = match word
        .strip_prefix("0x")
        .or_else(|| word.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => word.parse::<u64>(),
    };
    parsed.with_context(|| format!("invalid address '{word}'"))
}
