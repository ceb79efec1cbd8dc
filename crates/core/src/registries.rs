// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bad-Server Registry and Scheduler-Issue Registry: the two small
//! mapping-with-exclusive-access-per-mutation registries the Session
//! Handler drives via `confirmBadServer`/`dismissMsg`.
//!
//! Both follow the same shape: confirming/dismissing *removes* the entry
//! and acts on the extracted value outside the lock, so a second call on an
//! already-removed key is a harmless no-op — that's what gives
//! `confirmBadServer(id)` its "destroys at most once" guarantee and
//! `dismissMsg(id)` its idempotence for free, rather than needing an
//! explicit "already handled" flag.

use crate::collaborators::BadServerHandle;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct BadServerRegistry {
    handles: Mutex<HashMap<String, Arc<dyn BadServerHandle>>>,
}

impl BadServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handle: Arc<dyn BadServerHandle>) {
        self.handles.lock().insert(handle.server_id().to_string(), handle);
    }

    /// Confirm that `server_id` is bad. Returns `true` the first time (and
    /// destroys the handle); a repeat call for the same ID finds nothing to
    /// remove and returns `false` without touching the handle again.
    pub fn confirm(&self, server_id: &str) -> bool {
        let removed = self.handles.lock().remove(server_id);
        match removed {
            Some(handle) => {
                handle.destroy();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, server_id: &str) -> bool {
        self.handles.lock().contains_key(server_id)
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerIssue {
    pub msg: String,
    pub timestamp_epoch_secs: i64,
}

#[derive(Default)]
pub struct SchedulerIssueRegistry {
    issues: Mutex<HashMap<String, SchedulerIssue>>,
}

impl SchedulerIssueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, msg_id: String, issue: SchedulerIssue) {
        self.issues.lock().insert(msg_id, issue);
    }

    /// Dismiss `msg_id`. Returns `true` the first time; a repeat call is a
    /// no-op.
    pub fn dismiss(&self, msg_id: &str) -> bool {
        self.issues.lock().remove(msg_id).is_some()
    }

    pub fn snapshot(&self) -> Vec<(String, SchedulerIssue)> {
        self.issues.lock().iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::test_support::RecordingBadServerHandle;

    #[test]
    fn confirm_destroys_at_most_once() {
        let registry = BadServerRegistry::new();
        let destroyed = Arc::new(Mutex::new(Vec::new()));
        registry.register(Arc::new(RecordingBadServerHandle {
            server_id: "srv-1".into(),
            destroyed: Arc::clone(&destroyed),
        }));

        assert!(registry.confirm("srv-1"));
        assert!(!registry.confirm("srv-1"));
        assert_eq!(destroyed.lock().as_slice(), ["srv-1"]);
    }

    #[test]
    fn dismiss_twice_is_a_noop_after_the_first() {
        let registry = SchedulerIssueRegistry::new();
        registry.insert(
            "msg-1".into(),
            SchedulerIssue { msg: "capacity exhausted".into(), timestamp_epoch_secs: 1 },
        );
        assert!(registry.dismiss("msg-1"));
        assert!(!registry.dismiss("msg-1"));
    }
}
