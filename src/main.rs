mod calc;
mod comments;
mod config;
mod db;
mod error;
mod generate;
mod ipc;
mod store;
mod workflow;

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(filter: &str) {
    // stdout carries the IPC replies, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cfg = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("reportcardd: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&cfg.log_filter);
    info!(version = env!("CARGO_PKG_VERSION"), "reportcardd starting");

    let mut state = ipc::AppState::default();
    if let Some(ws) = cfg.workspace.as_deref() {
        if let Err(e) = ipc::select_workspace(&mut state, ws) {
            error!(workspace = %ws.display(), error = %e, "failed to open startup workspace");
            return ExitCode::FAILURE;
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to echo back.
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    info!("reportcardd stopped");
    ExitCode::SUCCESS
}
