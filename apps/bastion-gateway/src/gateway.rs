// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Serve / Drain Lifecycle
//!
//! [`Gateway`] owns the HTTP server and the group cache refresher and moves
//! through [`Phase`]s in one direction only:
//!
//! ```text
//! Starting -> Serving -> Draining -> Stopped
//! ```
//!
//! When the shutdown future resolves the gateway stops accepting new
//! connections and gives in-flight requests `drain_grace_period` to finish.
//! Past that the server task is aborted and [`GatewayError::DrainTimeout`]
//! is returned. The refresher is cancelled once the gateway is stopped.

use std::future::{Future, IntoFuture};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::api::router;
use crate::config::{ConfigError, GatewayConfig};
use crate::provider::IdentityProvider;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Starting,
    Serving,
    Draining,
    Stopped,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] io::Error),

    #[error("in-flight requests still running after {0:?} drain grace period")]
    DrainTimeout(Duration),
}

pub struct Gateway {
    state: AppState,
    phase: watch::Sender<Phase>,
}

impl Gateway {
    pub fn new(
        config: GatewayConfig,
        provider: Arc<dyn IdentityProvider>,
    ) -> Result<Self, GatewayError> {
        let state = AppState::new(config, provider)?;
        let (phase, _) = watch::channel(Phase::Starting);
        Ok(Self { state, phase })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Move to `next` unless already there or beyond.
    fn advance(&self, next: Phase) {
        let moved = self.phase.send_if_modified(|current| {
            if next > *current {
                *current = next;
                true
            } else {
                false
            }
        });
        if moved {
            info!(phase = ?next, "Gateway phase changed");
        }
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn run<F>(&self, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.state.config.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| GatewayError::Bind { addr, source })?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves, then drain.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let refresher = CancellationToken::new();
        self.state.groups.start(refresher.clone());

        let drain = CancellationToken::new();
        let local_addr = listener.local_addr().map_err(GatewayError::Serve)?;
        let app = router(self.state.clone());
        let mut server = tokio::spawn(
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(drain.clone().cancelled_owned())
            .into_future(),
        );

        self.advance(Phase::Serving);
        info!(addr = %local_addr, upstream = %self.state.config.upstream, "Gateway listening");

        tokio::pin!(shutdown);
        let result = tokio::select! {
            joined = &mut server => {
                warn!("Server stopped without a shutdown request");
                flatten(joined)
            }
            () = &mut shutdown => {
                self.advance(Phase::Draining);
                let grace = self.state.config.drain_grace_period;
                info!(grace_secs = grace.as_secs_f64(), "Draining in-flight requests");
                drain.cancel();

                match tokio::time::timeout(grace, &mut server).await {
                    Ok(joined) => flatten(joined),
                    Err(_) => {
                        server.abort();
                        Err(GatewayError::DrainTimeout(grace))
                    }
                }
            }
        };

        refresher.cancel();
        self.advance(Phase::Stopped);
        result
    }
}

fn flatten(joined: Result<io::Result<()>, tokio::task::JoinError>) -> Result<(), GatewayError> {
    match joined {
        Ok(result) => result.map_err(GatewayError::Serve),
        Err(e) => Err(GatewayError::Serve(io::Error::other(e))),
    }
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT"),
        () = terminate => info!("Received SIGTERM"),
    }
}
