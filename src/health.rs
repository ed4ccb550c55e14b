use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::HealthcheckConfig;
use crate::store::Store;

/// HTTP healthcheck reporting store reachability on `GET /`.
pub struct HealthServer {
    addr: String,
    attempts: u32,
    retry_delay: Duration,
    shutdown: parking_lot::Mutex<Option<CancellationToken>>,
}

struct AppState<S> {
    store: S,
    attempts: u32,
    retry_delay: Duration,
}

impl HealthServer {
    pub fn new(cfg: &HealthcheckConfig) -> Self {
        Self {
            addr: cfg.addr.clone(),
            attempts: cfg.attempts,
            retry_delay: cfg.retry_delay,
            shutdown: parking_lot::Mutex::new(None),
        }
    }

    /// Binds and serves in the background. Returns the bound address.
    pub async fn start<S: Store>(&self, store: S) -> Result<SocketAddr> {
        // Parse address, handling ":port" shorthand.
        let bind_addr = if self.addr.starts_with(':') {
            format!("0.0.0.0{}", self.addr)
        } else {
            self.addr.clone()
        };

        let state = Arc::new(AppState {
            store,
            attempts: self.attempts,
            retry_delay: self.retry_delay,
        });
        let app = Router::new()
            .route("/", get(check_handler::<S>))
            .with_state(state);

        let listener = TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("listening on {bind_addr}"))?;
        let local_addr = listener.local_addr().context("getting local address")?;

        let cancel = CancellationToken::new();
        *self.shutdown.lock() = Some(cancel.clone());

        tokio::spawn(async move {
            tracing::info!(addr = %local_addr, "healthcheck server started");

            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    cancel.cancelled().await;
                })
                .await;

            if let Err(e) = result {
                tracing::error!(error = %e, "healthcheck server error");
            }
        });

        Ok(local_addr)
    }

    pub fn stop(&self) {
        if let Some(cancel) = self.shutdown.lock().take() {
            cancel.cancel();
            tracing::info!("healthcheck server stopped");
        }
    }
}

/// Pings the store up to `attempts` times, sleeping `retry_delay` between
/// failed attempts.
pub async fn check<S: Store>(store: &S, attempts: u32, retry_delay: Duration) -> bool {
    for attempt in 1..=attempts.max(1) {
        match store.ping().await {
            Ok(()) => return true,
            Err(e) => {
                tracing::warn!(attempt, error = %e, "healthcheck ping failed");
                if attempt < attempts {
                    tokio::time::sleep(retry_delay).await;
                }
            }
        }
    }
    false
}

/// GET / - "ok" if the store answers a ping.
async fn check_handler<S: Store>(State(state): State<Arc<AppState<S>>>) -> (StatusCode, &'static str) {
    if check(&state.store, state.attempts, state.retry_delay).await {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "err")
    }
}
