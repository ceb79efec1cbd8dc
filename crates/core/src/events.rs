// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The three event payloads carried by the status, bad-server, and
//! scheduler-issue broadcasters. These are internal domain events, not wire
//! DTOs: `wrq-daemon` translates them into the JSON messages described by
//! the protocol (`wrq-wire`), keeping this crate free of any knowledge of
//! the wire format.

use crate::id::RepGroupName;
use crate::job::{Item, JobState};

/// Published on the status broadcaster whenever an item changes.
#[derive(Debug, Clone)]
pub enum StatusEvent {
    /// A single job's full state changed; carries a snapshot so the
    /// subscriber never needs to re-lock the queue to render it.
    JobChanged(Item),
    /// A job moved between counted states within a RepGroup. `from_state`
    /// is `New` for the initial snapshot sent to a freshly joined session,
    /// matching the wire convention in spec §6.
    CountDelta { rep_group: RepGroupName, from_state: JobState, to_state: JobState, count: u32 },
    /// A job left the queue entirely (not a state transition to report a
    /// `to_state` for).
    JobRemoved { key: crate::id::JobKey, rep_group: RepGroupName, was_counted_state: JobState },
}

#[derive(Debug, Clone)]
pub struct BadServerEvent {
    pub server_id: String,
}

#[derive(Debug, Clone)]
pub struct SchedulerIssueEvent {
    pub msg_id: String,
    pub msg: String,
    pub timestamp_epoch_secs: i64,
}
