//! TCP network layer: listener, per-client IO tasks, and the client registry.
//!
//! Socket IO runs on tokio tasks; the transition engine never touches a
//! socket. Each client connection gets a reader task (frame-decodes inbound
//! messages onto the [`NetEvent`] queue) and a writer task (flushes an
//! enqueue-only byte channel). The engine drains the event queue at tick
//! boundaries and sends through the [`ClientRouter`] seam, whose methods
//! only enqueue and therefore never block the tick.
//!
//! Client identity is two-layered: every connection gets a fresh [`Uuid`],
//! and a `hello` handshake binds a configured *name* to it. A handshake
//! claiming a name that is already bound evicts the older connection
//! (zombie eviction): the newer socket wins.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tx2tx_core::protocol::codec::{encode_frame, FrameDecoder};
use tx2tx_core::protocol::message::{Message, ScreenSize};

/// Unique identifier of one TCP connection.
pub type ClientId = Uuid;

/// Error type for the server network layer.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Events emitted by the network layer, drained by the core at tick
/// boundaries.
#[derive(Debug)]
pub enum NetEvent {
    Connected {
        id: ClientId,
        addr: SocketAddr,
    },
    /// A `hello` handshake arrived. The core decides whether to register the
    /// name (and whom to evict).
    Hello {
        id: ClientId,
        name: String,
        version: String,
        screen: Option<ScreenSize>,
    },
    /// Any non-handshake inbound message.
    Inbound {
        id: ClientId,
        name: Option<String>,
        message: Message,
    },
    Disconnected {
        id: ClientId,
        name: Option<String>,
    },
}

/// Sending seam between the transition engine and the network.
///
/// Implementations must be enqueue-only: a send reports whether the client
/// was present and its queue accepted the bytes, never whether the kernel
/// flushed them.
pub trait ClientRouter: Send + Sync {
    /// Sends to one named client. `false` when the client is unknown or its
    /// connection is gone.
    fn send(&self, client: &str, message: &Message) -> bool;

    /// Sends to every client that completed a handshake.
    fn broadcast(&self, message: &Message);

    /// Whether a named client currently has a live connection.
    fn is_connected(&self, client: &str) -> bool;
}

struct ClientEntry {
    name: Option<String>,
    screen: Option<ScreenSize>,
    sender: mpsc::UnboundedSender<Vec<u8>>,
    reader_abort: Option<AbortHandle>,
    writer_abort: Option<AbortHandle>,
}

#[derive(Default)]
struct Registry {
    clients: HashMap<ClientId, ClientEntry>,
    by_name: HashMap<String, ClientId>,
}

/// Cloneable, thread-safe handle onto the client registry.
#[derive(Clone)]
pub struct NetworkHandle {
    registry: Arc<Mutex<Registry>>,
}

impl NetworkHandle {
    fn new() -> Self {
        Self { registry: Arc::new(Mutex::new(Registry::default())) }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().expect("client registry poisoned")
    }

    fn insert(&self, id: ClientId, entry: ClientEntry) {
        self.lock().clients.insert(id, entry);
    }

    fn attach_tasks(&self, id: ClientId, reader: AbortHandle, writer: AbortHandle) {
        if let Some(entry) = self.lock().clients.get_mut(&id) {
            entry.reader_abort = Some(reader);
            entry.writer_abort = Some(writer);
        }
    }

    /// Number of live connections, handshaken or not.
    pub fn connection_count(&self) -> usize {
        self.lock().clients.len()
    }

    /// Names of all handshaken clients.
    pub fn client_names(&self) -> Vec<String> {
        self.lock().by_name.keys().cloned().collect()
    }

    /// The handshaken name of a connection, if any.
    pub fn name_of(&self, id: ClientId) -> Option<String> {
        self.lock().clients.get(&id).and_then(|entry| entry.name.clone())
    }

    /// The screen geometry a named client advertised in its handshake.
    pub fn screen_of(&self, client: &str) -> Option<ScreenSize> {
        let registry = self.lock();
        let id = registry.by_name.get(client)?;
        registry.clients.get(id)?.screen
    }

    /// Binds `name` to connection `id`, evicting any older connection that
    /// holds the same name.
    ///
    /// Returns the evicted connection's id when a zombie was displaced, or
    /// `None`. A `None` outer value means `id` itself already disconnected.
    pub fn register_name(
        &self,
        id: ClientId,
        name: &str,
        screen: Option<ScreenSize>,
    ) -> Option<Option<ClientId>> {
        let mut registry = self.lock();
        if !registry.clients.contains_key(&id) {
            return None;
        }

        let evicted = match registry.by_name.get(name) {
            Some(&old) if old != id => {
                if let Some(old_entry) = registry.clients.remove(&old) {
                    info!(name, %old, "evicting zombie client for re-handshake");
                    abort_entry(&old_entry);
                }
                Some(old)
            }
            _ => None,
        };

        let prior = registry
            .clients
            .get_mut(&id)
            .and_then(|entry| entry.name.take());
        if let Some(prior) = prior {
            registry.by_name.remove(&prior);
        }
        if let Some(entry) = registry.clients.get_mut(&id) {
            entry.name = Some(name.to_string());
            entry.screen = screen;
        }
        registry.by_name.insert(name.to_string(), id);
        Some(evicted)
    }

    /// Removes a connection, returning its handshaken name.
    pub fn remove(&self, id: ClientId) -> Option<String> {
        let mut registry = self.lock();
        let entry = registry.clients.remove(&id)?;
        if let Some(name) = &entry.name {
            registry.by_name.remove(name);
        }
        abort_entry(&entry);
        entry.name
    }

    fn send_frame_to_id(&self, id: ClientId, frame: Vec<u8>) -> bool {
        match self.lock().clients.get(&id) {
            Some(entry) => entry.sender.send(frame).is_ok(),
            None => false,
        }
    }
}

fn abort_entry(entry: &ClientEntry) {
    if let Some(abort) = &entry.reader_abort {
        abort.abort();
    }
    if let Some(abort) = &entry.writer_abort {
        abort.abort();
    }
}

impl ClientRouter for NetworkHandle {
    fn send(&self, client: &str, message: &Message) -> bool {
        let Ok(frame) = encode_frame(message) else {
            return false;
        };
        let id = match self.lock().by_name.get(client) {
            Some(&id) => id,
            None => return false,
        };
        self.send_frame_to_id(id, frame)
    }

    fn broadcast(&self, message: &Message) {
        let Ok(frame) = encode_frame(message) else {
            return;
        };
        let targets: Vec<ClientId> = self.lock().by_name.values().copied().collect();
        for id in targets {
            self.send_frame_to_id(id, frame.clone());
        }
    }

    fn is_connected(&self, client: &str) -> bool {
        self.lock().by_name.contains_key(client)
    }
}

/// The listening server network.
pub struct ServerNetwork {
    handle: NetworkHandle,
    local_addr: SocketAddr,
    accept_abort: AbortHandle,
}

impl ServerNetwork {
    /// Binds the listener and starts the accept loop.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::BindFailed`] when the address cannot be
    /// bound. Fatal at startup.
    pub async fn bind(
        host: &str,
        port: u16,
        max_clients: usize,
    ) -> Result<(Self, mpsc::UnboundedReceiver<NetEvent>), NetworkError> {
        let addr = format!("{host}:{port}");
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| NetworkError::BindFailed { addr: addr.clone(), source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| NetworkError::BindFailed { addr, source })?;
        info!(%local_addr, "server listening");

        let handle = NetworkHandle::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let accept_handle = handle.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        if accept_handle.connection_count() >= max_clients {
                            warn!(%addr, max_clients, "max clients reached, rejecting connection");
                            drop(stream);
                            continue;
                        }
                        spawn_client(stream, addr, accept_handle.clone(), events_tx.clone());
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                    }
                }
            }
        });

        Ok((
            Self { handle, local_addr, accept_abort: accept_task.abort_handle() },
            events_rx,
        ))
    }

    /// Handle for the engine and runtime to route through.
    pub fn handle(&self) -> NetworkHandle {
        self.handle.clone()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting and tears down every connection.
    pub fn shutdown(&self) {
        self.accept_abort.abort();
        let ids: Vec<ClientId> = self.handle.lock().clients.keys().copied().collect();
        for id in ids {
            self.handle.remove(id);
        }
    }
}

impl Drop for ServerNetwork {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_client(
    stream: tokio::net::TcpStream,
    addr: SocketAddr,
    handle: NetworkHandle,
    events: mpsc::UnboundedSender<NetEvent>,
) {
    let id = Uuid::new_v4();
    info!(%id, %addr, "client connected");

    let (mut read_half, mut write_half) = stream.into_split();
    let (sender, mut outbound) = mpsc::unbounded_channel::<Vec<u8>>();

    handle.insert(
        id,
        ClientEntry {
            name: None,
            screen: None,
            sender: sender.clone(),
            reader_abort: None,
            writer_abort: None,
        },
    );
    let _ = events.send(NetEvent::Connected { id, addr });

    // Greet the new connection before anything else is queued.
    if let Ok(frame) = encode_frame(&Message::hello(env!("CARGO_PKG_NAME"), None)) {
        let _ = sender.send(frame);
    }

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if let Err(e) = write_half.write_all(&frame).await {
                debug!(error = %e, "client write failed");
                break;
            }
        }
    });

    let reader_handle = handle.clone();
    let reader = tokio::spawn(async move {
        let mut decoder = FrameDecoder::new();
        let mut buf = [0u8; 4096];
        'io: loop {
            match read_half.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if decoder.extend(&buf[..n]).is_err() {
                        warn!(%id, "client exceeded frame limits, dropping");
                        break;
                    }
                    loop {
                        match decoder.next_message() {
                            Ok(Some(Message::Hello(hello))) => {
                                let _ = events.send(NetEvent::Hello {
                                    id,
                                    name: hello.name,
                                    version: hello.version,
                                    screen: hello.screen,
                                });
                            }
                            Ok(Some(message)) => {
                                let name = reader_handle.name_of(id);
                                let _ = events.send(NetEvent::Inbound { id, name, message });
                            }
                            Ok(None) => break,
                            Err(e) => {
                                warn!(%id, error = %e, "malformed frame from client, dropping");
                                break 'io;
                            }
                        }
                    }
                }
                Err(e) => {
                    debug!(%id, error = %e, "client read failed");
                    break;
                }
            }
        }
        let name = reader_handle.remove(id);
        let _ = events.send(NetEvent::Disconnected { id, name });
    });

    handle.attach_tasks(id, reader.abort_handle(), writer.abort_handle());
}
