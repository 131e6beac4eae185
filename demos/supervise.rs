//! # Example: supervise
//!
//! Launches a debug adapter worker, keeps the link to it alive and logs every
//! status change until Ctrl-C.
//!
//! Shows how to:
//! - Configure [`SupervisorConfig`] with a custom command and endpoint.
//! - Attach the built-in [`LogReporter`].
//! - Read bytes coming from the worker through `take_data()`.
//!
//! ## Run
//! ```bash
//! # default worker: racket -l dap-debugger on localhost:4142
//! cargo run --example supervise --features logging
//!
//! # any program that listens on the given port
//! cargo run --example supervise --features logging -- 4142 python3 -m http.server 4142
//! ```

use std::sync::Arc;
use std::time::Duration;

use dapvisor::{ConnectionSupervisor, Endpoint, LogReporter, StatusReporter, SupervisorConfig, WorkerCommand};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dapvisor=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut cfg = SupervisorConfig {
        connect_timeout: Duration::from_secs(30),
        ..SupervisorConfig::default()
    };

    let mut args = std::env::args().skip(1);
    if let Some(port) = args.next() {
        cfg.endpoint = Endpoint::new("localhost", port.parse()?);
        if let Some(program) = args.next() {
            cfg.command = WorkerCommand::new(program, args);
        }
    }

    let reporters: Vec<Arc<dyn StatusReporter>> = vec![Arc::new(LogReporter::new())];
    let sup = ConnectionSupervisor::builder(cfg).with_reporters(reporters).build();

    let mut data = sup.take_data().ok_or("data receiver already taken")?;
    tokio::spawn(async move {
        while let Some(chunk) = data.recv().await {
            println!("[worker] {}", String::from_utf8_lossy(&chunk));
        }
    });

    sup.serve().await?;
    Ok(())
}
