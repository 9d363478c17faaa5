//! Server runtime: startup, the polling loop, and graceful shutdown.
//!
//! The loop runs on one task: drain network events, tick the transition
//! engine, sleep. All engine state changes happen here; the network layer
//! only enqueues. The tick period comes from config, with a faster floor
//! while a remote context is active so forwarded motion stays smooth.
//!
//! Whatever ends the loop (signal or fatal error), the shutdown path runs the
//! engine's return sequence so the host desktop is never left grabbed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use tx2tx_core::config::Config;
use tx2tx_core::protocol::message::Message;

use crate::backend::{BackendError, DisplayBackend};
use crate::network::{NetEvent, NetworkError, NetworkHandle, ServerNetwork};
use crate::transition::TransitionEngine;

/// Tick period floor while a remote context is active.
const REMOTE_POLL_INTERVAL: Duration = Duration::from_millis(8);

/// Fatal server startup/runtime errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Runs the server until SIGINT/SIGTERM.
///
/// # Errors
///
/// Returns a [`ServerError`] only for startup failures: bind, backend init,
/// or the initial geometry query. Once the loop is entered, errors are
/// handled by the engine's safety paths instead of being raised.
pub async fn run(config: &Config, mut backend: Box<dyn DisplayBackend>) -> Result<(), ServerError> {
    let screen = backend.geometry()?;
    info!(width = screen.width, height = screen.height, "screen geometry");

    let (network, events) = ServerNetwork::bind(
        &config.server.host,
        config.server.port,
        config.server.max_clients,
    )
    .await?;
    let handle = network.handle();

    for placement in &config.clients {
        info!(name = %placement.name, position = %placement.position, "configured client");
    }

    let engine = TransitionEngine::new(
        backend,
        Arc::new(handle.clone()),
        screen,
        config,
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_signal = Arc::clone(&running);
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("shutdown signal received");
        running_signal.store(false, Ordering::Relaxed);
    });

    let poll_interval = Duration::from_millis(config.server.poll_interval_ms);
    run_loop(engine, handle, events, running, poll_interval).await;

    network.shutdown();
    info!("server stopped");
    Ok(())
}

/// Resolves on SIGINT or, on Unix, SIGTERM.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable, listening for SIGINT only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

async fn run_loop(
    mut engine: TransitionEngine,
    handle: NetworkHandle,
    mut events: mpsc::UnboundedReceiver<NetEvent>,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
) {
    let remote_interval = poll_interval.min(REMOTE_POLL_INTERVAL);

    while running.load(Ordering::Relaxed) {
        let now = Instant::now();
        drain_network_events(&mut engine, &handle, &mut events, now);
        engine.tick(now);

        let interval = if engine.context().is_remote() {
            remote_interval
        } else {
            poll_interval
        };
        tokio::time::sleep(interval).await;
    }

    engine.shutdown(Instant::now());
}

/// Applies queued network events to the engine at a tick boundary.
fn drain_network_events(
    engine: &mut TransitionEngine,
    handle: &NetworkHandle,
    events: &mut mpsc::UnboundedReceiver<NetEvent>,
    now: Instant,
) {
    while let Ok(event) = events.try_recv() {
        match event {
            NetEvent::Connected { id, addr } => {
                debug!(%id, %addr, "connection opened, awaiting handshake");
            }
            NetEvent::Hello { id, name, version, screen } => {
                info!(%id, name, version, ?screen, "client handshake");
                match handle.register_name(id, &name, screen) {
                    Some(Some(evicted)) => {
                        info!(%evicted, name, "zombie client evicted by re-handshake");
                        // The evicted socket was the one being driven; the
                        // newcomer starts from a clean CENTER.
                        engine.handle_client_disconnect(&name, now);
                    }
                    Some(None) => {}
                    None => {
                        warn!(%id, name, "handshake from already-closed connection");
                    }
                }
            }
            NetEvent::Inbound { id, name, message } => match message {
                Message::Keepalive(_) => {
                    debug!(%id, "keepalive received");
                }
                Message::ScreenInfo(info) => {
                    info!(%id, ?name, width = info.width, height = info.height, "client screen info");
                }
                Message::Error(err) => {
                    warn!(%id, ?name, error = %err.message, "client reported error");
                }
                other => {
                    warn!(%id, ?name, msg_type = other.msg_type(), "unexpected message from client");
                }
            },
            NetEvent::Disconnected { id, name } => {
                info!(%id, ?name, "client disconnected");
                if let Some(name) = name {
                    engine.handle_client_disconnect(&name, now);
                }
            }
        }
    }
}
