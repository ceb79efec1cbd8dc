// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon-side translation from core domain events/queries into wire
//! messages. Keeps `wrq-core` free of any knowledge of the JSON protocol,
//! mirroring the teacher's `protocol/types.rs` `From<&Job>` conversions.

use wrq_core::{BadServerEvent, Clock, JobKey, JobState, Queue, SchedulerIssueEvent, StatusEvent};
use wrq_wire::{BadServerMsg, JobStatus, SchedulerIssueMsg, ServerMessage, StateCountDelta};

/// RepGroup name used for the aggregate "every job, regardless of group"
/// snapshot sent in response to `current`.
pub const ALL_REP_GROUPS: &str = "+all+";

/// Translates a status-broadcaster event into its wire message. `JobRemoved`
/// has no dedicated wire shape (spec §6 names only JobStatus/
/// StateCountDelta/BadServer/SchedulerIssue); it is encoded as a
/// `StateCountDelta` whose `ToState` is `New`, reusing the same "not a real
/// state, just a bucket to ignore" convention `current`'s snapshot uses for
/// `FromState`.
pub fn status_event_to_message(event: StatusEvent) -> ServerMessage {
    match event {
        StatusEvent::JobChanged(item) => ServerMessage::JobStatus(JobStatus::from(&item)),
        StatusEvent::CountDelta { rep_group, from_state, to_state, count } => {
            ServerMessage::StateCountDelta(StateCountDelta { rep_group, from_state, to_state, count })
        }
        StatusEvent::JobRemoved { rep_group, was_counted_state, .. } => {
            ServerMessage::StateCountDelta(StateCountDelta {
                rep_group,
                from_state: was_counted_state,
                to_state: JobState::New,
                count: 1,
            })
        }
    }
}

pub fn bad_server_event_to_message(event: BadServerEvent) -> ServerMessage {
    ServerMessage::BadServer(BadServerMsg { server_id: event.server_id })
}

pub fn scheduler_issue_event_to_message(event: SchedulerIssueEvent) -> ServerMessage {
    ServerMessage::SchedulerIssue(SchedulerIssueMsg {
        msg_id: event.msg_id,
        msg: event.msg,
        timestamp: event.timestamp_epoch_secs,
    })
}

/// Builds the message set for a `current` request: an aggregate `+all+`
/// snapshot followed by one snapshot per RepGroup, matching spec §8 scenario
/// 4 ("an `+all+` StateCountDelta message ... followed by an `rg2` message").
pub fn current_snapshot_messages<C: Clock>(queue: &Queue<C>) -> Vec<ServerMessage> {
    let mut messages = Vec::new();
    let per_group = queue.state_counts_all();

    let mut aggregate: std::collections::HashMap<JobState, u32> = std::collections::HashMap::new();
    for counts in per_group.values() {
        for (state, count) in counts {
            *aggregate.entry(*state).or_insert(0) += count;
        }
    }
    push_snapshot(&mut messages, wrq_core::RepGroupName::from(ALL_REP_GROUPS), &aggregate);

    let mut rep_groups: Vec<_> = per_group.keys().cloned().collect();
    rep_groups.sort();
    for rep_group in rep_groups {
        if let Some(counts) = per_group.get(&rep_group) {
            push_snapshot(&mut messages, rep_group, counts);
        }
    }
    messages
}

fn push_snapshot(
    messages: &mut Vec<ServerMessage>,
    rep_group: wrq_core::RepGroupName,
    counts: &std::collections::HashMap<JobState, u32>,
) {
    for (state, count) in counts {
        messages.push(ServerMessage::StateCountDelta(StateCountDelta {
            rep_group: rep_group.clone(),
            from_state: JobState::New,
            to_state: *state,
            count: *count,
        }));
    }
}

/// Single-job detail lookup (spec §6: `Key` present).
pub fn job_detail_message<C: Clock>(queue: &Queue<C>, key: &JobKey) -> Option<ServerMessage> {
    queue.get(key).map(|item| ServerMessage::JobStatus(JobStatus::from(&item)))
}

/// `details` request: a representative sample from the RepGroup (spec §4.H).
pub fn details_messages<C: Clock>(
    queue: &Queue<C>,
    rep_group: &str,
    limit: usize,
    state_filter: Option<JobState>,
) -> Vec<ServerMessage> {
    queue
        .jobs_by_repgroup(rep_group, limit, state_filter)
        .iter()
        .map(|item| ServerMessage::JobStatus(JobStatus::from(item)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wrq_core::queue::test_support::test_queue;
    use wrq_core::{JobSubmission, RepGroupName};

    #[test]
    fn current_snapshot_emits_aggregate_before_repgroups() {
        let queue = test_queue();
        queue.add(JobSubmission::builder().cmd("a").rep_group(RepGroupName::from("rg2")).build());
        queue.add(JobSubmission::builder().cmd("b").rep_group(RepGroupName::from("rg2")).build());

        let messages = current_snapshot_messages(&queue);
        let aggregate_first = matches!(
            &messages[0],
            ServerMessage::StateCountDelta(delta) if delta.rep_group == RepGroupName::from(ALL_REP_GROUPS)
        );
        assert!(aggregate_first);
        assert!(messages.iter().any(|m| matches!(
            m,
            ServerMessage::StateCountDelta(delta) if delta.rep_group == RepGroupName::from("rg2") && delta.count == 2
        )));
    }

    #[test]
    fn job_detail_message_is_none_for_missing_key() {
        let queue = test_queue();
        let bogus = JobKey::derive("nope", "/nowhere");
        assert!(job_detail_message(&queue, &bogus).is_none());
    }
}
