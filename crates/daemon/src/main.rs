// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `wrq-statusd`: accepts status-websocket connections and serves one
//! `Session` per client against a shared in-process `Queue`.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use wrq_core::{Queue, SystemClock};
use wrq_daemon::collaborators::{LoggingLiveJobSink, LoggingSchedulerAdapter};
use wrq_daemon::{env, Session};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let bind_addr = env::bind_addr();
    let listener = match TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%bind_addr, error = %err, "wrq-statusd: failed to bind");
            std::process::exit(1);
        }
    };
    tracing::info!(%bind_addr, "wrq-statusd: listening");

    let queue = Arc::new(Queue::new(
        Arc::new(LoggingLiveJobSink),
        Arc::new(LoggingSchedulerAdapter),
        SystemClock,
        env::subscriber_buffer(),
        env::queue_timings(),
    ));

    let auth_token = env::auth_token();

    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                tracing::warn!(error = %err, "wrq-statusd: accept failed");
                continue;
            }
        };

        let queue = Arc::clone(&queue);
        let auth_token = auth_token.clone();
        tokio::spawn(async move {
            if let Err(err) = serve_connection(stream, queue, auth_token.as_deref()).await {
                tracing::warn!(%peer_addr, error = %err, "wrq-statusd: connection failed");
            }
        });
    }
}

async fn serve_connection(
    stream: tokio::net::TcpStream,
    queue: Arc<Queue<SystemClock>>,
    auth_token: Option<&str>,
) -> Result<(), wrq_daemon::ConnectionError> {
    let ws_stream = tokio_tungstenite::accept_hdr_async(
        stream,
        |req: &tokio_tungstenite::tungstenite::handshake::server::Request, resp| {
            if let Some(expected) = auth_token {
                let presented = req
                    .uri()
                    .query()
                    .and_then(|q| q.split('&').find_map(|pair| pair.strip_prefix("token=").map(str::to_string)));
                if presented.as_deref() != Some(expected) {
                    tracing::warn!("wrq-statusd: rejecting connection, bad or missing token");
                    let mut unauthorized = tokio_tungstenite::tungstenite::http::Response::new(None);
                    *unauthorized.status_mut() = tokio_tungstenite::tungstenite::http::StatusCode::UNAUTHORIZED;
                    return Err(unauthorized);
                }
            }
            Ok(resp)
        },
    )
    .await?;

    Session::new(ws_stream, queue).run().await;
    Ok(())
}
