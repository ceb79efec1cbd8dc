// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server→client message variants (spec §6): `JobStatus`, `StateCountDelta`,
//! `BadServer`, `SchedulerIssue`. Tagged internally by `Type` so a single
//! websocket text frame decodes unambiguously on the client side.

use crate::job_status::JobStatus;
use serde::{Deserialize, Serialize};
use wrq_core::{JobState, RepGroupName};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Type")]
pub enum ServerMessage {
    JobStatus(JobStatus),
    StateCountDelta(StateCountDelta),
    BadServer(BadServerMsg),
    SchedulerIssue(SchedulerIssueMsg),
}

/// `FromState = New` marks an initial count snapshot (e.g. in response to
/// `current`) rather than a delta between two live states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StateCountDelta {
    pub rep_group: RepGroupName,
    pub from_state: JobState,
    pub to_state: JobState,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BadServerMsg {
    #[serde(rename = "ServerID")]
    pub server_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SchedulerIssueMsg {
    #[serde(rename = "MsgID")]
    pub msg_id: String,
    pub msg: String,
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_count_delta_serializes_with_type_tag() {
        let message = ServerMessage::StateCountDelta(StateCountDelta {
            rep_group: RepGroupName::from("rg1"),
            from_state: JobState::New,
            to_state: JobState::Ready,
            count: 2,
        });
        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains("\"Type\":\"StateCountDelta\""));
        assert!(json.contains("\"Count\":2"));
    }

    #[test]
    fn bad_server_roundtrips() {
        let message = ServerMessage::BadServer(BadServerMsg { server_id: "srv-1".into() });
        let json = serde_json::to_string(&message).unwrap();
        let back: ServerMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(message, back);
    }
}
