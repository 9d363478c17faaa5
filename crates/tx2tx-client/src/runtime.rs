//! Client runtime: connect, handshake, dispatch, inject.
//!
//! The dispatcher is the testable core: it maps inbound protocol messages to
//! injector calls, denormalizing coordinates against the local screen and
//! honouring the hide signal, which suppresses motion injection until the
//! next real coordinate arrives. Key and button events are never
//! suppressed: a press that crossed the wire must not lose its release.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use tx2tx_core::config::Config;
use tx2tx_core::domain::geometry::Screen;
use tx2tx_core::protocol::codec::{encode_frame, FrameDecoder};
use tx2tx_core::protocol::message::{
    Message, MouseEventKind, MouseEventPayload, ScreenSize,
};

use crate::injector::InputInjector;
use crate::network::{connect_with_retry, ClientError};

/// How often the client emits a keepalive on an otherwise idle connection.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

/// Maps inbound messages to injector calls.
pub struct Dispatcher {
    injector: Box<dyn InputInjector>,
    screen: Screen,
    /// Set by the hide signal; cleared by the next real coordinate.
    motion_suppressed: bool,
}

impl Dispatcher {
    pub fn new(injector: Box<dyn InputInjector>, screen: Screen) -> Self {
        Self { injector, screen, motion_suppressed: true }
    }

    /// Whether motion injection is currently suppressed by the hide signal.
    pub fn motion_suppressed(&self) -> bool {
        self.motion_suppressed
    }

    /// Handles one inbound message.
    pub fn handle(&mut self, message: Message) {
        match message {
            Message::MouseEvent(event) => self.handle_mouse(event),
            Message::KeyEvent(event) => {
                use tx2tx_core::protocol::message::KeyEventKind;
                self.injector.key(event.keycode, event.event == KeyEventKind::Press);
            }
            Message::Hello(hello) => {
                info!(server = %hello.name, version = %hello.version, "server greeting");
            }
            Message::Keepalive(_) => debug!("keepalive from server"),
            Message::ScreenInfo(_) => debug!("ignoring screen_info on client side"),
            Message::Error(err) => warn!(error = %err.message, "server reported error"),
        }
    }

    fn handle_mouse(&mut self, event: MouseEventPayload) {
        let point = event.point();
        match event.event {
            MouseEventKind::Move => {
                if point.is_hide_signal() {
                    debug!("hide signal: suppressing motion until next coordinate");
                    self.motion_suppressed = true;
                    return;
                }
                self.motion_suppressed = false;
                self.injector.mouse_move(self.screen.denormalize(point));
            }
            MouseEventKind::Press | MouseEventKind::Release => {
                let Some(button) = event.button else {
                    warn!("button event without a button code, dropping");
                    return;
                };
                // Place the cursor where the click lands, then click.
                if !point.is_hide_signal() {
                    self.motion_suppressed = false;
                    self.injector.mouse_move(self.screen.denormalize(point));
                }
                self.injector.button(button, event.event == MouseEventKind::Press);
            }
            MouseEventKind::Scroll => {
                let Some(button) = event.button else {
                    warn!("scroll event without a button code, dropping");
                    return;
                };
                self.injector.scroll(button, event.delta.unwrap_or(1));
            }
        }
    }
}

/// Runs the client until the connection ends and the reconnect policy is
/// spent.
///
/// # Errors
///
/// Returns [`ClientError`] when connecting (or reconnecting) finally fails.
pub async fn run(
    config: &Config,
    client_name: &str,
    injector: Box<dyn InputInjector>,
    screen: Screen,
) -> Result<(), ClientError> {
    let mut dispatcher = Dispatcher::new(injector, screen);
    let policy = &config.client.reconnect;

    loop {
        let stream = connect_with_retry(&config.client.server_address, policy).await?;
        session(stream, client_name, screen, &mut dispatcher).await;
        if !policy.enabled {
            info!("connection closed, reconnect disabled, exiting");
            return Ok(());
        }
        info!("connection closed, attempting reconnect");
    }
}

/// One connected session: handshake, then dispatch until the socket closes.
async fn session(mut stream: TcpStream, client_name: &str, screen: Screen, dispatcher: &mut Dispatcher) {
    let hello = Message::hello(
        client_name,
        Some(ScreenSize { width: screen.width, height: screen.height }),
    );
    let Ok(frame) = encode_frame(&hello) else {
        return;
    };
    if let Err(e) = stream.write_all(&frame).await {
        warn!(error = %e, "handshake send failed");
        return;
    }

    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 4096];
    let mut keepalive = tokio::time::interval(KEEPALIVE_INTERVAL);
    keepalive.tick().await; // the first tick fires immediately

    loop {
        tokio::select! {
            read = stream.read(&mut buf) => {
                match read {
                    Ok(0) => {
                        info!("server closed the connection");
                        return;
                    }
                    Ok(n) => {
                        if decoder.extend(&buf[..n]).is_err() {
                            warn!("server exceeded frame limits, dropping connection");
                            return;
                        }
                        loop {
                            match decoder.next_message() {
                                Ok(Some(message)) => dispatcher.handle(message),
                                Ok(None) => break,
                                Err(e) => {
                                    warn!(error = %e, "malformed frame from server, dropping connection");
                                    return;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "read failed");
                        return;
                    }
                }
            }
            _ = keepalive.tick() => {
                if let Ok(frame) = encode_frame(&Message::keepalive()) {
                    if let Err(e) = stream.write_all(&frame).await {
                        warn!(error = %e, "keepalive send failed");
                        return;
                    }
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
