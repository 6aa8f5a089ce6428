//! # Push Server
//!
//! Axum HTTP server exposing the value feed.
//!
//! | Path | Description |
//! |------|-------------|
//! | `<path>` (default `/`) | WebSocket: one `{"value":N}` text frame per produced value |
//! | `/status` | JSON `{"subscribers": N, "published": M}` |
//!
//! Inbound frames from clients are read only to notice closure and are
//! otherwise ignored.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use bc_core::config::ServerConfig;
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;

use crate::broadcast::Broadcaster;
use crate::registry::{Subscriber, SubscriberRegistry};
use crate::sink::WatchSink;

/// Shared state passed to all request handlers.
#[derive(Clone)]
struct ServerState {
    registry: Arc<SubscriberRegistry>,
    broadcaster: Arc<Broadcaster>,
}

/// A bound, not yet running, push server.
pub struct PushServer {
    listener: TcpListener,
    router: Router,
    path: String,
}

impl PushServer {
    /// Bind the listener described by `config`.
    ///
    /// # Errors
    /// Returns an error if the address is invalid or already in use.
    pub async fn bind(config: &ServerConfig, broadcaster: Arc<Broadcaster>) -> Result<Self> {
        let addr = config.socket_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Impossible d'écouter sur {addr}"))?;

        let state = ServerState {
            registry: Arc::clone(broadcaster.registry()),
            broadcaster,
        };
        let router = Router::new()
            .route(&config.path, get(handle_upgrade))
            .route("/status", get(handle_status))
            .with_state(state);

        Ok(Self {
            listener,
            router,
            path: config.path.clone(),
        })
    }

    /// Address actually bound (useful with port 0).
    ///
    /// # Errors
    /// Returns an error if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `shutdown` resolves.
    ///
    /// # Errors
    /// Returns an error if the server stops abnormally.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        if let Ok(addr) = self.listener.local_addr() {
            log::info!("Push server listening on ws://{addr}{}", self.path);
        }
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .context("Serveur push arrêté")
    }
}

/// Handles requests to `/status`.
async fn handle_status(State(state): State<ServerState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "subscribers": state.registry.len(),
        "published": state.broadcaster.published(),
    }))
}

/// Handles WebSocket upgrade requests on the feed path.
async fn handle_upgrade(ws: WebSocketUpgrade, State(state): State<ServerState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Lifetime of one subscriber: register, forward values, unregister on close.
async fn handle_socket(socket: WebSocket, state: ServerState) {
    let id = state.registry.next_id();
    let (sink, mut rx) = WatchSink::channel();
    state.registry.register(Subscriber::new(id, Arc::new(sink)));
    log::debug!(
        "Subscriber {id} connected ({} total)",
        state.registry.len()
    );

    let (mut sender, receiver) = socket.split();

    let mut writer = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let payload = rx.borrow_and_update().clone();
            let Some(payload) = payload else {
                continue;
            };
            if sender.send(Message::Text(payload.to_string().into())).await.is_err() {
                break; // Client disconnected
            }
        }
    });

    tokio::select! {
        () = wait_for_close(receiver) => {}
        _ = &mut writer => {}
    }
    writer.abort();

    state.registry.unregister(id);
    log::debug!(
        "Subscriber {id} disconnected ({} remaining)",
        state.registry.len()
    );
}

/// Resolves once the peer closes the connection or the stream errors.
async fn wait_for_close(mut receiver: SplitStream<WebSocket>) {
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {} // Ignore other messages
        }
    }
}
