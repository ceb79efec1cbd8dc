// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single status-websocket connection: one read loop dispatching client
//! requests against the queue, racing three push loops that forward the
//! status/bad-server/scheduler-issue broadcasters to the same socket.
//!
//! Modeled on the teacher's `adapters/agent/coop/ws.rs` event bridge (the
//! `tokio::select!` over a read future and a cancellation signal, the
//! exhaustive `Message` match) generalized from one stream to four
//! concurrent producers sharing a single write half.

use crate::query;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use wrq_core::{Clock, Queue};
use wrq_wire::{Dispatch, Request, RequestKind, ServerMessage};

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("wire protocol error: {0}")]
    Protocol(#[from] wrq_wire::ProtocolError),
}

type WsWrite = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsRead = SplitStream<WebSocketStream<TcpStream>>;

/// A connected status client. Owns the socket's write half behind a mutex
/// (spec §4.G: pushes and request replies must not interleave mid-frame)
/// and runs for as long as the socket stays open.
pub struct Session<C: Clock> {
    write: Arc<Mutex<WsWrite>>,
    read: WsRead,
    queue: Arc<Queue<C>>,
    cancel: CancellationToken,
}

impl<C: Clock + Send + Sync + 'static> Session<C> {
    pub fn new(stream: WebSocketStream<TcpStream>, queue: Arc<Queue<C>>) -> Self {
        let (write, read) = stream.split();
        Self { write: Arc::new(Mutex::new(write)), read, queue, cancel: CancellationToken::new() }
    }

    /// Runs the session to completion: the read loop and the three push
    /// loops all race the same cancellation token, so a disconnect (or a
    /// close frame) on any one of them tears down the rest. Each loop runs
    /// on its own spawned task, so a panic in one is caught at that task's
    /// boundary by the runtime and only tears down that loop; the others
    /// keep running until the write guard starts failing or the socket
    /// closes out from under them.
    pub async fn run(self) {
        let Session { write, mut read, queue, cancel } = self;

        let status_handle =
            tokio::spawn(push_status_loop(Arc::clone(&write), Arc::clone(&queue), cancel.clone()));
        let bad_server_handle =
            tokio::spawn(push_bad_server_loop(Arc::clone(&write), Arc::clone(&queue), cancel.clone()));
        let issue_handle =
            tokio::spawn(push_issue_loop(Arc::clone(&write), Arc::clone(&queue), cancel.clone()));
        let read_handle = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                loop {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        msg = read.next() => {
                            match msg {
                                Some(Ok(Message::Text(text))) => {
                                    if let Err(err) = handle_request(&text, &write, &queue).await {
                                        tracing::warn!(error = %err, "session: request handling failed");
                                    }
                                }
                                Some(Ok(Message::Close(_))) | None => {
                                    tracing::debug!("session: client closed the connection");
                                    break;
                                }
                                Some(Ok(_)) => {} // ping/pong/binary — ignore
                                Some(Err(err)) => {
                                    tracing::warn!(error = %err, "session: websocket read error");
                                    break;
                                }
                            }
                        }
                    }
                }
                cancel.cancel();
            }
        });

        let (read_res, status_res, bad_server_res, issue_res) =
            tokio::join!(read_handle, status_handle, bad_server_handle, issue_handle);
        for (name, res) in [
            ("read", read_res),
            ("status", status_res),
            ("bad_server", bad_server_res),
            ("issue", issue_res),
        ] {
            if let Err(err) = res {
                tracing::warn!(loop_name = name, error = %err, "session: loop task ended abnormally");
            }
        }
    }
}

async fn handle_request<C: Clock + Send + Sync + 'static>(
    text: &str,
    write: &Arc<Mutex<WsWrite>>,
    queue: &Arc<Queue<C>>,
) -> Result<(), ConnectionError> {
    let request: Request = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(_) => return Ok(()), // malformed frame: ignored, per spec §6
    };

    let Some(dispatch) = request.dispatch() else { return Ok(()) };

    let messages = match dispatch {
        Dispatch::JobDetail(key) => query::job_detail_message(queue, &key).into_iter().collect(),
        Dispatch::Request(RequestKind::Current) => query::current_snapshot_messages(queue),
        Dispatch::Request(RequestKind::Details) => {
            let rep_group = request.rep_group.as_ref().map(|n| n.as_str()).unwrap_or_default();
            query::details_messages(queue, rep_group, 20, request.state)
        }
        Dispatch::Request(RequestKind::Retry) => {
            if let Some(rep_group) = request.rep_group.as_ref() {
                queue.retry_rep_group(
                    rep_group.as_str(),
                    request.exitcode,
                    request.fail_reason.as_deref(),
                    request.all.unwrap_or(false),
                );
            }
            Vec::new()
        }
        Dispatch::Request(RequestKind::Remove) => {
            if let Some(rep_group) = request.rep_group.as_ref() {
                queue.remove_rep_group(
                    rep_group.as_str(),
                    request.exitcode,
                    request.fail_reason.as_deref(),
                    request.all.unwrap_or(false),
                );
            }
            Vec::new()
        }
        Dispatch::Request(RequestKind::Kill) => {
            if let Some(rep_group) = request.rep_group.as_ref() {
                queue.kill_rep_group(rep_group.as_str()).await;
            }
            Vec::new()
        }
        Dispatch::Request(RequestKind::ConfirmBadServer) => {
            if let Some(server_id) = request.server_id.as_deref() {
                queue.confirm_bad_server(server_id);
            }
            Vec::new()
        }
        Dispatch::Request(RequestKind::DismissMsg) => {
            if let Some(msg_id) = request.msg.as_deref() {
                queue.dismiss_scheduler_issue(msg_id);
            }
            Vec::new()
        }
    };

    send_all(write, messages).await
}

async fn send_all(write: &Arc<Mutex<WsWrite>>, messages: Vec<ServerMessage>) -> Result<(), ConnectionError> {
    if messages.is_empty() {
        return Ok(());
    }
    let mut guard = write.lock().await;
    for message in messages {
        let payload = wrq_wire::encode(&message)?;
        let text = String::from_utf8_lossy(&payload).into_owned();
        guard.send(Message::Text(text.into())).await?;
    }
    Ok(())
}

async fn push_status_loop<C: Clock + Send + Sync + 'static>(write: Arc<Mutex<WsWrite>>, queue: Arc<Queue<C>>, cancel: CancellationToken) {
    let mut sub = queue.join_status();
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = sub.recv() => {
                match event {
                    Some(event) => {
                        let message = query::status_event_to_message(event);
                        if send_all(&write, vec![message]).await.is_err() {
                            cancel.cancel();
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }
}

async fn push_bad_server_loop<C: Clock + Send + Sync + 'static>(write: Arc<Mutex<WsWrite>>, queue: Arc<Queue<C>>, cancel: CancellationToken) {
    let mut sub = queue.join_bad_server();
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = sub.recv() => {
                match event {
                    Some(event) => {
                        let message = query::bad_server_event_to_message(event);
                        if send_all(&write, vec![message]).await.is_err() {
                            cancel.cancel();
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }
}

async fn push_issue_loop<C: Clock + Send + Sync + 'static>(write: Arc<Mutex<WsWrite>>, queue: Arc<Queue<C>>, cancel: CancellationToken) {
    let mut sub = queue.join_scheduler_issue();
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = sub.recv() => {
                match event {
                    Some(event) => {
                        let message = query::scheduler_issue_event_to_message(event);
                        if send_all(&write, vec![message]).await.is_err() {
                            cancel.cancel();
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }
}

