use std::net::SocketAddr;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use crate::events::ViewerEvent;
use crate::foundation::core::SharedClock;
use crate::foundation::error::{BrawlError, BrawlResult};
use crate::store::DynStore;

/// WebSocket fan-out of the store bus.
///
/// Every bus message is forwarded to every connected viewer verbatim. Viewers may send `vote`,
/// `poll-update`, and `shoutout` events, which are republished on the bus.
#[derive(Clone)]
pub struct ViewerServer {
    store: DynStore,
    clock: SharedClock,
}

impl ViewerServer {
    pub fn new(store: DynStore, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    pub async fn bind(addr: &str) -> BrawlResult<TcpListener> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding viewer channel on {addr}"))?;
        Ok(listener)
    }

    /// Accept connections until `shutdown` flips to true.
    pub async fn serve(&self, listener: TcpListener, mut shutdown: watch::Receiver<bool>) {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(%addr, "viewer channel listening");
        }
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let this = self.clone();
                        tokio::spawn(async move { this.handle_connection(stream, addr).await });
                    }
                    Err(e) => tracing::warn!(error = %e, "accept failed"),
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    async fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let ws = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                tracing::debug!(%addr, error = %e, "websocket handshake failed");
                return;
            }
        };
        tracing::debug!(%addr, "viewer connected");
        let (mut write, mut read) = ws.split();
        let mut bus = self.store.subscribe();

        loop {
            tokio::select! {
                msg = bus.recv() => match msg {
                    Ok(msg) => {
                        if write.send(Message::text(msg.payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::debug!(%addr, skipped = n, "viewer lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                incoming = read.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(e) = self.relay_inbound(&text).await {
                            tracing::debug!(%addr, error = %e, "ignoring viewer message");
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                },
            }
        }
        tracing::debug!(%addr, "viewer disconnected");
    }

    /// Validate a viewer-sent event and republish it. Heartbeats are server-only.
    pub async fn relay_inbound(&self, text: &str) -> BrawlResult<ViewerEvent> {
        let ev = match ViewerEvent::from_payload(text)? {
            ViewerEvent::Heartbeat { .. } => {
                return Err(BrawlError::validation("viewers cannot send heartbeats"));
            }
            ViewerEvent::Shoutout { message, user, .. } => {
                ViewerEvent::shoutout(&message, Some(&user), self.clock.now_ms())
                    .ok_or_else(|| BrawlError::validation("empty shoutout"))?
            }
            other => other,
        };
        self.store.publish(ev.channel(), &ev.to_payload()?).await?;
        Ok(ev)
    }
}
