//! Runtime control of the stream registry.
//!
//! One JSON request per line, one JSON reply per line:
//!
//! ```text
//! > {"action":"start","streamKey":"abc","screenId":"main"}
//! < {"streamKey":"abc","outcome":"started"}
//! > {"action":"stop","streamKey":"abc"}
//! < {"streamKey":"abc","stopped":true}
//! > {"action":"list"}
//! < {"activeStreams":[{"streamKey":"abc","screenId":"main","running":true}]}
//! ```
//!
//! Any failure is answered with `{"error":"..."}` and the connection stays open.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use crate::foundation::error::BrawlResult;
use crate::stream::StreamTarget;
use crate::stream::registry::{StartOutcome, StreamRegistry, StreamStatus};

#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ControlRequest {
    Start(StreamTarget),
    #[serde(rename_all = "camelCase")]
    Stop { stream_key: String },
    List,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum ControlReply {
    Started {
        stream_key: String,
        outcome: StartOutcome,
    },
    Stopped {
        stream_key: String,
        stopped: bool,
    },
    Streams {
        active_streams: Vec<StreamStatus>,
    },
    Error {
        error: String,
    },
}

impl ControlReply {
    fn error(e: impl std::fmt::Display) -> Self {
        Self::Error {
            error: e.to_string(),
        }
    }
}

/// Serves [`ControlRequest`]s against a shared registry.
#[derive(Clone)]
pub struct ControlServer {
    registry: Arc<StreamRegistry>,
}

impl ControlServer {
    pub fn new(registry: Arc<StreamRegistry>) -> Self {
        Self { registry }
    }

    pub async fn bind(addr: &str) -> BrawlResult<TcpListener> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding stream control on {addr}"))?;
        Ok(listener)
    }

    /// Decode and execute one request line.
    pub async fn handle(&self, line: &str) -> ControlReply {
        let request = match serde_json::from_str::<ControlRequest>(line) {
            Ok(request) => request,
            Err(e) => return ControlReply::error(format!("bad request: {e}")),
        };
        match request {
            ControlRequest::Start(target) => {
                let stream_key = target.stream_key.clone();
                match self.registry.start(target).await {
                    Ok(outcome) => ControlReply::Started {
                        stream_key,
                        outcome,
                    },
                    Err(e) => ControlReply::error(e),
                }
            }
            ControlRequest::Stop { stream_key } => {
                let stopped = self.registry.stop(&stream_key).await;
                ControlReply::Stopped {
                    stream_key,
                    stopped,
                }
            }
            ControlRequest::List => ControlReply::Streams {
                active_streams: self.registry.list().await,
            },
        }
    }

    /// Accept connections until `shutdown` flips to true.
    pub async fn serve(&self, listener: TcpListener, mut shutdown: watch::Receiver<bool>) {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(%addr, "stream control listening");
        }
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let this = self.clone();
                        let rx = shutdown.clone();
                        tokio::spawn(async move { this.handle_connection(stream, addr, rx).await });
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

    async fn handle_connection(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tracing::debug!(%addr, "control client connected");
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        loop {
            let line = tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::debug!(%addr, error = %e, "control read failed");
                        break;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let reply = self.handle(&line).await;
            if let ControlReply::Error { error } = &reply {
                tracing::warn!(%addr, %error, "control request failed");
            }
            let mut out = match serde_json::to_string(&reply) {
                Ok(out) => out,
                Err(e) => {
                    tracing::error!(%addr, error = %e, "encoding control reply failed");
                    break;
                }
            };
            out.push('\n');
            if write.write_all(out.as_bytes()).await.is_err() {
                break;
            }
        }
        tracing::debug!(%addr, "control client disconnected");
    }
}
