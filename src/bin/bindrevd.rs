use std::path::PathBuf;

use bindrev::{Config, Supervisor};
use clap::Parser;

/// bindrev tap-fed reverse DNS lookup daemon.
#[derive(Parser, Debug)]
#[command(name = "bindrevd", version, about)]
struct Args {
    /// Unix socket path the dnstap-speaking resolver connects to.
    #[arg(long, default_value = "/tmp/bindrev.sock")]
    framestream_socket: PathBuf,

    /// Address the TCP lookup endpoint binds to.
    #[arg(long, default_value = "0.0.0.0:8888")]
    lookup_bind: String,

    /// Path to the on-disk reverse store.
    #[arg(long, default_value = "bindrev.db")]
    store_path: PathBuf,

    /// Ceiling on a single data frame's payload, in bytes.
    #[arg(long, default_value_t = bindrev::frame::MAX_FRAME_PAYLOAD)]
    max_frame_payload: usize,

    /// Log level / filter passed to `tracing-subscriber`'s `EnvFilter`.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&args.log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config {
        framestream_socket_path: args.framestream_socket,
        lookup_bind_addr: args.lookup_bind,
        store_path: args.store_path,
        max_frame_payload: args.max_frame_payload,
    };

    let supervisor = match Supervisor::bind(config).await {
        Ok(supervisor) => supervisor,
        Err(err) => {
            tracing::error!(error = %err, "failed to start bindrevd");
            return std::process::ExitCode::FAILURE;
        }
    };

    match supervisor.run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "bindrevd exited with an error");
            std::process::ExitCode::FAILURE
        }
    }
}
