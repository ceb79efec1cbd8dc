// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end coverage of the status websocket: a real `TcpListener`, a real
//! `tokio_tungstenite` client, and a `Queue` driven through `Session`.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

use futures_util::{SinkExt, StreamExt};
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use wrq_core::queue::test_support::test_queue;
use wrq_core::{JobState, JobSubmission, Queue, RepGroupName};
use wrq_daemon::Session;
use wrq_wire::{Request, ServerMessage};

type TestQueue = Queue<wrq_core::FakeClock>;

async fn spawn_server(queue: Arc<TestQueue>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            if let Ok(ws_stream) = tokio_tungstenite::accept_async(stream).await {
                Session::new(ws_stream, queue).run().await;
            }
        }
    });
    format!("ws://{addr}")
}

async fn connect(url: &str) -> tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>> {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.expect("client connect");
    stream
}

async fn send(
    client: &mut tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    request: &Request,
) {
    let payload = wrq_wire::encode(request).expect("encode request");
    let text = String::from_utf8_lossy(&payload).into_owned();
    client.send(Message::Text(text.into())).await.expect("send request");
}

async fn recv_message(
    client: &mut tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
) -> ServerMessage {
    let timeout = tokio::time::timeout(Duration::from_secs(2), client.next()).await;
    let msg = timeout.expect("timed out waiting for message").expect("stream ended").expect("websocket error");
    match msg {
        Message::Text(text) => wrq_wire::decode(text.as_bytes()).expect("decode server message"),
        other => panic!("unexpected message: {other:?}"),
    }
}

#[tokio::test]
#[serial]
async fn retry_all_false_stops_after_first_match() {
    let queue = Arc::new(test_queue());
    for i in 0..3 {
        let key = queue.add(
            JobSubmission::builder().cmd(format!("job-{i}")).rep_group(RepGroupName::from("rg1")).build(),
        );
        queue.reserve();
        queue.start(&key).unwrap();
        queue.bury(&key, wrq_core::ExecOutcome { exitcode: Some(1), ..Default::default() }).unwrap();
    }

    let url = spawn_server(Arc::clone(&queue)).await;
    let mut client = connect(&url).await;

    send(
        &mut client,
        &Request { request: Some("retry".into()), rep_group: Some(RepGroupName::from("rg1")), all: Some(false), ..Default::default() },
    )
    .await;

    let message = recv_message(&mut client).await;
    assert!(matches!(message, ServerMessage::JobStatus(_)));

    let counts = queue.state_counts_repgroup("rg1");
    assert_eq!(counts.get(&JobState::Ready).copied().unwrap_or(0), 1);
    assert_eq!(counts.get(&JobState::Buried).copied().unwrap_or(0), 2);
}

#[tokio::test]
async fn remove_respects_dependents_and_reports_blocked() {
    let queue = Arc::new(test_queue());
    let upstream = queue.add(JobSubmission::builder().cmd("base").rep_group(RepGroupName::from("rg2")).build());
    queue.add(
        JobSubmission::builder()
            .cmd("downstream")
            .rep_group(RepGroupName::from("rg2"))
            .dependencies(vec![upstream])
            .build(),
    );

    let outcome = queue.remove_rep_group("rg2", None, None, true);
    assert!(outcome.blocked.contains(&upstream), "upstream has a dependent and must be blocked");
}

#[tokio::test]
#[serial]
async fn current_emits_aggregate_snapshot_before_repgroup_snapshots() {
    let queue = Arc::new(test_queue());
    queue.add(JobSubmission::builder().cmd("a").rep_group(RepGroupName::from("rgX")).build());

    let url = spawn_server(Arc::clone(&queue)).await;
    let mut client = connect(&url).await;

    send(&mut client, &Request { request: Some("current".into()), ..Default::default() }).await;

    let first = recv_message(&mut client).await;
    match first {
        ServerMessage::StateCountDelta(delta) => {
            assert_eq!(delta.rep_group, RepGroupName::from("+all+"));
        }
        other => panic!("expected aggregate snapshot first, got {other:?}"),
    }
}

#[tokio::test]
#[serial]
async fn job_detail_lookup_returns_the_single_job() {
    let queue = Arc::new(test_queue());
    let key = queue.add(JobSubmission::builder().cmd("solo").rep_group(RepGroupName::from("rg3")).build());

    let url = spawn_server(Arc::clone(&queue)).await;
    let mut client = connect(&url).await;

    send(&mut client, &Request { key: Some(key), ..Default::default() }).await;

    let message = recv_message(&mut client).await;
    match message {
        ServerMessage::JobStatus(status) => assert_eq!(status.key, key),
        other => panic!("expected JobStatus, got {other:?}"),
    }
}

#[tokio::test]
#[serial]
async fn lost_running_item_is_projected_on_the_wire_without_mutating_stored_state() {
    use wrq_core::collaborators::test_support::{RecordingLiveJobSink, RecordingSchedulerAdapter};
    use wrq_core::{FakeClock, QueueTimings};

    let clock = FakeClock::new();
    let queue = Arc::new(Queue::new(
        Arc::new(RecordingLiveJobSink::default()),
        Arc::new(RecordingSchedulerAdapter::default()),
        clock.clone(),
        16,
        QueueTimings { release_timeout: Duration::from_millis(10), ..QueueTimings::default() },
    ));
    let key = queue.add(JobSubmission::builder().cmd("long-runner").build());
    queue.reserve();
    queue.start(&key).unwrap();
    clock.advance(Duration::from_millis(50));
    assert_eq!(queue.sweep_lost(), vec![key]);

    let url = spawn_server(Arc::clone(&queue)).await;
    let mut client = connect(&url).await;
    send(&mut client, &Request { key: Some(key), ..Default::default() }).await;

    let message = recv_message(&mut client).await;
    match message {
        ServerMessage::JobStatus(status) => assert_eq!(status.state, JobState::Lost),
        other => panic!("expected JobStatus, got {other:?}"),
    }
}
