//! Wiring and graceful shutdown (spec §4.G): owns the store and both
//! listeners, constructed explicitly here rather than behind any global —
//! see the crate's "no singletons" policy.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::{TcpListener, UnixListener};

use crate::lookup;
use crate::session::FramestreamSession;
use crate::store::{Store, StoreError};
use crate::tap;

/// How long a running connection gets to finish up after a shutdown signal
/// before the store is closed out from under it.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to bind framestream socket at {path}: {source}")]
    FramestreamBind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to bind TCP lookup listener on {addr}: {source}")]
    LookupBind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open store: {0}")]
    Store(#[from] StoreError),
}

pub struct Config {
    pub framestream_socket_path: PathBuf,
    pub lookup_bind_addr: String,
    pub store_path: PathBuf,
    pub max_frame_payload: usize,
}

pub struct Supervisor {
    store: Arc<Store>,
    framestream_listener: UnixListener,
    lookup_listener: TcpListener,
    max_frame_payload: usize,
}

impl Supervisor {
    pub async fn bind(config: Config) -> Result<Self, SupervisorError> {
        let store = Store::open(&config.store_path)?;

        // A stale socket file from a prior unclean shutdown would otherwise
        // make bind() fail with AddrInUse.
        let _ = std::fs::remove_file(&config.framestream_socket_path);
        let framestream_listener = UnixListener::bind(&config.framestream_socket_path)
            .map_err(|source| SupervisorError::FramestreamBind {
                path: config.framestream_socket_path.clone(),
                source,
            })?;

        let lookup_listener = TcpListener::bind(&config.lookup_bind_addr)
            .await
            .map_err(|source| SupervisorError::LookupBind {
                addr: config.lookup_bind_addr.clone(),
                source,
            })?;

        Ok(Supervisor {
            store: Arc::new(store),
            framestream_listener,
            lookup_listener,
            max_frame_payload: config.max_frame_payload,
        })
    }

    /// Runs both accept loops until a shutdown signal arrives, then drains
    /// for up to `SHUTDOWN_DRAIN` before closing the store.
    pub async fn run(self) -> crate::Result<()> {
        let store = Arc::clone(&self.store);
        let max_frame_payload = self.max_frame_payload;

        let framestream_loop = accept_framestream_loop(self.framestream_listener, store.clone(), max_frame_payload);
        let lookup_loop = lookup::serve_lookup(self.lookup_listener, store.clone());

        tokio::select! {
            result = framestream_loop => {
                if let Err(err) = result {
                    tracing::error!(error = %err, "framestream accept loop ended");
                }
            }
            result = lookup_loop => {
                if let Err(err) = result {
                    tracing::error!(error = %err, "lookup accept loop ended");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received, draining");
                tokio::time::sleep(SHUTDOWN_DRAIN).await;
            }
        }

        Arc::try_unwrap(store)
            .map_err(|_| "store still has outstanding references at shutdown")?
            .close()?;
        Ok(())
    }
}

async fn accept_framestream_loop(
    listener: UnixListener,
    store: Arc<Store>,
    max_frame_payload: usize,
) -> std::io::Result<()> {
    loop {
        let (socket, _addr) = listener.accept().await?;
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            let (read_half, write_half) = socket.into_split();
            let mut session =
                FramestreamSession::new(read_half, write_half).with_max_payload(max_frame_payload);

            let result = session
                .run(|payload| match tap::interpret(&payload) {
                    Ok(observations) => {
                        for obs in observations {
                            if let Err(err) = store.add(obs.ip, &obs.name) {
                                tracing::warn!(error = %err, "failed to record tap observation");
                            }
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to interpret tap message");
                    }
                })
                .await;

            if let Err(err) = result {
                tracing::debug!(error = %err, "framestream session ended");
            }
        });
    }
}
