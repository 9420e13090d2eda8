// src/server.rs

use std::{
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use launcher_plugin::OutboxReceiver;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{
        broadcast,
        mpsc::{UnboundedSender, unbounded_channel},
    },
};
use tokio_tungstenite::{accept_async, tungstenite::Message as WsMsg};
use tracing::{debug, error, info, warn};

use crate::session::SessionHandle;

/// The one UI client we talk to.
struct Client {
    id: u64,
    tx: UnboundedSender<WsMsg>,
}

type ClientSlot = Arc<Mutex<Option<Client>>>;

fn lock_slot(slot: &ClientSlot) -> std::sync::MutexGuard<'_, Option<Client>> {
    match slot.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Plain WebSocket endpoint for the launcher UI.
///
/// Only one client is served at a time; a new connection takes over and the
/// previous one is closed.
pub struct UiServer {
    listener: TcpListener,
    session: SessionHandle,
    shutdown_tx: broadcast::Sender<()>,
}

impl UiServer {
    pub async fn bind(addr: &str, session: SessionHandle) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("could not bind UI socket on {addr}"))?;
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self { listener, session, shutdown_tx })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Send `()` here to stop the server and its connections.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Accept clients and pump the outbox to whichever one is current.
    pub async fn serve(self, outbox_rx: OutboxReceiver) -> Result<()> {
        let current: ClientSlot = Arc::new(Mutex::new(None));
        let next_id = AtomicU64::new(1);

        let forwarder = tokio::spawn(Self::forward_loop(
            outbox_rx,
            current.clone(),
            self.shutdown_tx.subscribe(),
        ));

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        info!(addr = ?self.listener.local_addr().ok(), "UI server listening");
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("UI server shutting down");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let id = next_id.fetch_add(1, Ordering::Relaxed);
                        tokio::spawn(Self::handle_connection(
                            stream,
                            peer,
                            id,
                            current.clone(),
                            self.session.clone(),
                            self.shutdown_tx.subscribe(),
                        ));
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                }
            }
        }

        if let Err(e) = forwarder.await {
            error!(error = %e, "outbox forwarder ended abnormally");
        }
        Ok(())
    }

    async fn forward_loop(
        mut outbox_rx: OutboxReceiver,
        current: ClientSlot,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                env = outbox_rx.recv() => {
                    let Some(env) = env else { break };
                    let text = match env.to_json() {
                        Ok(text) => text,
                        Err(e) => {
                            error!(error = %e, "could not encode envelope");
                            continue;
                        }
                    };
                    match lock_slot(&current).as_ref() {
                        Some(client) => {
                            if client.tx.send(WsMsg::Text(text.into())).is_err() {
                                debug!(client = client.id, "client gone, envelope dropped");
                            }
                        }
                        None => debug!(kind = %env.kind, "no UI client, envelope dropped"),
                    }
                }
            }
        }
        debug!("outbox forwarder stopped");
    }

    async fn handle_connection(
        stream: TcpStream,
        peer: SocketAddr,
        id: u64,
        current: ClientSlot,
        session: SessionHandle,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                warn!(%peer, error = %e, "WebSocket handshake failed");
                return;
            }
        };
        let (mut write, mut read) = ws_stream.split();
        let (tx_out, mut rx_out) = unbounded_channel::<WsMsg>();

        // dropping the old sender closes the old connection
        if let Some(previous) = lock_slot(&current).replace(Client { id, tx: tx_out }) {
            info!(previous = previous.id, "new UI client replaces the previous one");
        }
        info!(%peer, client = id, "UI client connected");

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    let _ = write.send(WsMsg::Close(None)).await;
                    break;
                }
                msg = read.next() => match msg {
                    Some(Ok(WsMsg::Text(txt))) => {
                        session.submit_text(txt.as_str());
                    }
                    Some(Ok(WsMsg::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(txt) => {
                            session.submit_text(txt);
                        }
                        Err(_) => warn!(%peer, "non UTF-8 binary frame dropped"),
                    },
                    Some(Ok(WsMsg::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(%peer, error = %e, "read failed");
                        break;
                    }
                },
                frame = rx_out.recv() => match frame {
                    Some(frame) => {
                        if let Err(e) = write.send(frame).await {
                            warn!(%peer, error = %e, "write failed");
                            break;
                        }
                    }
                    None => {
                        let _ = write.send(WsMsg::Close(None)).await;
                        break;
                    }
                }
            }
        }

        let mut slot = lock_slot(&current);
        if slot.as_ref().map(|c| c.id) == Some(id) {
            *slot = None;
        }
        info!(%peer, client = id, "UI client disconnected");
    }
}
