// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Minimal concrete implementations of `wrq-core`'s collaborator traits.
//!
//! The live-job sink, scheduler backend, and bad-server handles are external
//! systems out of scope for this crate (spec §1). These adapters log the
//! calls they receive rather than reaching into any real infrastructure —
//! the same role the teacher's `AgentAdapter` trait object plays at the
//! boundary between the engine and Docker/Kubernetes/coop backends.

use wrq_core::{BadServerHandle, JobKey, LiveJobSink, SchedulerAdapter, SchedulerAdapterError};

/// Logs job removals instead of deleting anything from a real live-job
/// store (there is no live-job store in this crate).
#[derive(Debug, Default)]
pub struct LoggingLiveJobSink;

impl LiveJobSink for LoggingLiveJobSink {
    fn delete_live_job(&self, key: &JobKey) {
        tracing::info!(key = %key, "live job sink: delete (no-op backend)");
    }
}

/// Reports every kill as succeeding without contacting a real scheduler.
#[derive(Debug, Default)]
pub struct LoggingSchedulerAdapter;

#[async_trait::async_trait]
impl SchedulerAdapter for LoggingSchedulerAdapter {
    async fn kill_job(&self, key: &JobKey) -> Result<(), SchedulerAdapterError> {
        tracing::info!(key = %key, "scheduler adapter: kill (no-op backend)");
        Ok(())
    }
}

/// A bad-server handle that only logs its own destruction; there is no real
/// server to tear down.
pub struct LoggingBadServerHandle {
    server_id: String,
}

impl LoggingBadServerHandle {
    pub fn new(server_id: impl Into<String>) -> Self {
        Self { server_id: server_id.into() }
    }
}

impl BadServerHandle for LoggingBadServerHandle {
    fn server_id(&self) -> &str {
        &self.server_id
    }

    fn destroy(&self) {
        tracing::info!(server_id = %self.server_id, "bad server handle: destroy (no-op backend)");
    }
}
