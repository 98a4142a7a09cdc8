mod commands;
mod dap_task;
mod dap_types;
mod host;

use std::env;
use std::path::PathBuf;

fn main() {
    let mut args = env::args().skip(1);
    let Some(config_path) = args.next().map(PathBuf::from) else {
        eprintln!("usage: probe-bridge <debug-config.json> [<file>:<line>...]");
        std::process::exit(2);
    };
    let breakpoints: Vec<String> = args.collect();

    if let Err(e) = host::run_host(config_path, &breakpoints) {
        eprintln!("probe-bridge: {:#}", e);
        std::process::exit(1);
    }
}
