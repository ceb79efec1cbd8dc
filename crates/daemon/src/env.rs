// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::time::Duration;
use wrq_core::QueueTimings;

/// Bind address for the status websocket server.
pub fn bind_addr() -> String {
    std::env::var("WRQ_BIND").unwrap_or_else(|_| "127.0.0.1:7760".to_string())
}

/// Optional bearer token a client must present at websocket upgrade.
/// When unset, connections are accepted without authentication.
pub fn auth_token() -> Option<String> {
    std::env::var("WRQ_AUTH_TOKEN").ok().filter(|s| !s.is_empty())
}

/// Per-subscriber channel capacity for the status/bad-server/scheduler-issue
/// broadcasters (spec §4.F: bounded, drop-newest-on-full).
pub fn subscriber_buffer() -> usize {
    std::env::var("WRQ_SUB_BUFFER").ok().and_then(|s| s.parse().ok()).unwrap_or(64)
}

/// How long a `Running` item may go untouched before it is swept into the
/// `Lost` projection / released (spec §4.B `Touch`/`Release`).
pub fn release_timeout() -> Duration {
    std::env::var("WRQ_RELEASE_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(30))
}

/// Base back-off applied to `Release`'s Delay deadline, scaled by attempt
/// count.
pub fn base_backoff() -> Duration {
    std::env::var("WRQ_BASE_BACKOFF_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(10))
}

pub fn queue_timings() -> QueueTimings {
    QueueTimings { release_timeout: release_timeout(), base_backoff: base_backoff() }
}

/// Grace period given to in-flight sessions when the process receives a
/// shutdown signal.
pub fn drain_timeout() -> Duration {
    std::env::var("WRQ_DRAIN_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}
