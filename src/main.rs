mod backup;
mod config;
mod db;
mod ipc;
mod metrics;
mod store;

use clap::Parser;
use config::{Cli, LogFormat};
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    // stdout is the protocol channel; logs must only ever go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("studentd=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let mut state = ipc::AppState::new();
    if let Some(path) = cli.workspace.as_deref() {
        // Startup continues in memory; the UI can still select a workspace later.
        if let Err(e) = state.open_workspace(path) {
            tracing::error!(workspace = %path.display(), error = %e, "failed to open workspace");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => {
                // Can't reply with an id; report the decode failure anyway.
                tracing::warn!(error = %e, "undecodable request line");
                ipc::bad_json(e.to_string())
            }
        };

        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    tracing::info!("stdin closed, exiting");
}
