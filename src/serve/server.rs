//! Development server lifecycle.
//!
//! The HTTP server runs on the caller's runtime. The optional watch build
//! runs on its own OS thread with a dedicated single-threaded runtime, so a
//! long webpack session never competes with request handling. The build's
//! working directory lives exactly as long as that thread.

use std::future::Future;
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use super::addr::BindAddr;
use super::router::{build_router, ServeState};
use crate::webpack::Webpack;

/// Bind `addr` and serve until `shutdown` resolves
pub async fn serve<F>(addr: &BindAddr, state: ServeState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr.socket_addr())
        .await
        .with_context(|| format!("Failed to bind {}", addr.socket_addr()))?;
    serve_listener(listener, state, shutdown).await
}

/// Serve on an already bound listener
pub async fn serve_listener<F>(listener: TcpListener, state: ServeState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local = listener.local_addr().context("Listener has no local address")?;
    info!(
        addr = %local,
        document_root = %state.document_root.display(),
        prefix = %state.matcher.prefix().url_prefix(),
        "Serving static files"
    );

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")
}

/// Resolves on Ctrl-C
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Prepare the webpack root and run a watch build on a dedicated thread
pub fn spawn_watch_build<O, E>(webpack: Webpack, on_stdout: O, on_stderr: E) -> Result<JoinHandle<()>>
where
    O: FnMut(&str) + Send + 'static,
    E: FnMut(&str) + Send + 'static,
{
    std::thread::Builder::new()
        .name("webpack-watch".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!(error = %e, "Failed to start watch build runtime");
                    return;
                }
            };

            runtime.block_on(async move {
                if let Err(e) = webpack.prepare_root().await {
                    error!(error = %e, "Failed to prepare webpack root");
                    return;
                }
                match webpack.build(true, on_stdout, on_stderr).await {
                    Ok(outcome) => info!(outcome = %outcome, "Watch build stopped"),
                    Err(e) => error!(error = %e, "Watch build failed"),
                }
            });
        })
        .context("Failed to spawn watch build thread")
}
