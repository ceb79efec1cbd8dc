// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trait seams for the external collaborators the core consumes but does
//! not own: a persistence sink, a scheduler adapter, and per-server health
//! handles. Modeled as trait objects so the queue can be exercised in tests
//! without a real backend — the same "external collaborator behind a trait
//! object" role the teacher's `AgentAdapter` plays for agent backends.

use crate::id::JobKey;

/// `db.deleteLiveJob(key)` — informed whenever a job is removed from the
/// queue so the out-of-scope persistence layer can drop its copy.
pub trait LiveJobSink: Send + Sync {
    fn delete_live_job(&self, key: &JobKey);
}

/// `killJob(key)` — best-effort termination request sent to whichever
/// out-of-scope backend is running the job.
#[async_trait::async_trait]
pub trait SchedulerAdapter: Send + Sync {
    async fn kill_job(&self, key: &JobKey) -> Result<(), SchedulerAdapterError>;
}

#[derive(Debug, thiserror::Error)]
#[error("scheduler adapter failed to kill job: {0}")]
pub struct SchedulerAdapterError(pub String);

/// A handle to an out-of-scope compute backend server, as tracked by the
/// Bad-Server Registry. `destroy` must be idempotent-safe to call: the
/// registry guarantees it is invoked at most once per handle, but a handle
/// implementation may still be asked to destroy a server it no longer
/// believes exists.
pub trait BadServerHandle: Send + Sync {
    fn server_id(&self) -> &str;
    fn destroy(&self);
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    pub struct RecordingLiveJobSink {
        pub deleted: Mutex<Vec<JobKey>>,
    }

    impl LiveJobSink for RecordingLiveJobSink {
        fn delete_live_job(&self, key: &JobKey) {
            self.deleted.lock().push(*key);
        }
    }

    #[derive(Default)]
    pub struct RecordingSchedulerAdapter {
        pub killed: Mutex<Vec<JobKey>>,
    }

    #[async_trait::async_trait]
    impl SchedulerAdapter for RecordingSchedulerAdapter {
        async fn kill_job(&self, key: &JobKey) -> Result<(), SchedulerAdapterError> {
            self.killed.lock().push(*key);
            Ok(())
        }
    }

    pub struct RecordingBadServerHandle {
        pub server_id: String,
        pub destroyed: Arc<Mutex<Vec<String>>>,
    }

    impl BadServerHandle for RecordingBadServerHandle {
        fn server_id(&self) -> &str {
            &self.server_id
        }

        fn destroy(&self) {
            self.destroyed.lock().push(self.server_id.clone());
        }
    }
}
