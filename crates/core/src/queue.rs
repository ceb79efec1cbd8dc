// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The queue aggregate: State Machine (component B) transitions, composed
//! with the Item Store, Dependency Index, RepGroup Index, and
//! Scheduler-Group Counters under one lock so a transition updates all four
//! atomically — the same "one struct, several maps, one lock" shape as the
//! teacher's `MaterializedState`.

use crate::broadcast::Broadcaster;
use crate::clock::{Clock, SystemClock};
use crate::collaborators::{LiveJobSink, SchedulerAdapter};
use crate::deps::DependencyIndex;
use crate::error::QueueError;
use crate::events::{BadServerEvent, SchedulerIssueEvent, StatusEvent};
use crate::id::JobKey;
use crate::job::{ExecOutcome, Item, Job, JobState, JobSubmission};
use crate::registries::{BadServerRegistry, SchedulerIssue, SchedulerIssueRegistry};
use crate::repgroup::RepGroupIndex;
use crate::sched_groups::SchedGroupCounters;
use crate::store::ItemStore;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

pub(crate) struct QueueState {
    pub(crate) items: ItemStore,
    pub(crate) deps: DependencyIndex,
    pub(crate) repgroups: RepGroupIndex,
    pub(crate) sched_groups: SchedGroupCounters,
}

/// Tuning knobs for the state machine's deadlines. Defaults match what a
/// single-node deployment of this daemon would reasonably use.
#[derive(Debug, Clone, Copy)]
pub struct QueueTimings {
    pub release_timeout: Duration,
    pub base_backoff: Duration,
}

impl Default for QueueTimings {
    fn default() -> Self {
        Self { release_timeout: Duration::from_secs(30), base_backoff: Duration::from_secs(10) }
    }
}

pub struct Queue<C: Clock = SystemClock> {
    state: RwLock<QueueState>,
    status_bus: Broadcaster<StatusEvent>,
    bad_server_bus: Broadcaster<BadServerEvent>,
    issue_bus: Broadcaster<SchedulerIssueEvent>,
    bad_servers: BadServerRegistry,
    issues: SchedulerIssueRegistry,
    sink: Arc<dyn LiveJobSink>,
    scheduler: Arc<dyn SchedulerAdapter>,
    clock: C,
    timings: QueueTimings,
}

/// Outcome of a bulk `remove` over a RepGroup.
#[derive(Debug, Default)]
pub struct RemoveOutcome {
    pub removed: Vec<JobKey>,
    pub blocked: Vec<JobKey>,
}

impl<C: Clock> Queue<C> {
    pub fn new(
        sink: Arc<dyn LiveJobSink>,
        scheduler: Arc<dyn SchedulerAdapter>,
        clock: C,
        subscriber_capacity: usize,
        timings: QueueTimings,
    ) -> Self {
        Self {
            state: RwLock::new(QueueState {
                items: ItemStore::new(),
                deps: DependencyIndex::new(),
                repgroups: RepGroupIndex::new(),
                sched_groups: SchedGroupCounters::new(),
            }),
            status_bus: Broadcaster::new(subscriber_capacity),
            bad_server_bus: Broadcaster::new(subscriber_capacity),
            issue_bus: Broadcaster::new(subscriber_capacity),
            bad_servers: BadServerRegistry::new(),
            issues: SchedulerIssueRegistry::new(),
            sink,
            scheduler,
            clock,
            timings,
        }
    }

    pub fn join_status(&self) -> crate::broadcast::Subscriber<StatusEvent> {
        self.status_bus.join()
    }

    pub fn join_bad_server(&self) -> crate::broadcast::Subscriber<BadServerEvent> {
        self.bad_server_bus.join()
    }

    pub fn join_scheduler_issue(&self) -> crate::broadcast::Subscriber<SchedulerIssueEvent> {
        self.issue_bus.join()
    }

    /// Read access to the composed state for the query façade
    /// ([`crate::query`]), which needs to join `items` against `repgroups`
    /// without re-locking between the two.
    pub(crate) fn state_lock(&self) -> &RwLock<QueueState> {
        &self.state
    }

    /// `Add(job)`. Resubmitting a command+cwd pair that already has a live
    /// item only updates `RepGroup` (the identity is content-addressed by
    /// `Key`, so there is nothing else to change); a genuinely new job
    /// enters `Ready` or `Dependent` depending on whether its prerequisites
    /// are already Complete.
    pub fn add(&self, submission: JobSubmission) -> JobKey {
        let job = Job::new(submission);
        let key = job.key;
        let rep_group = job.rep_group.clone();

        let mut state = self.state.write();
        let existing_rep_group = state.items.get(&key).map(|it| it.job.rep_group.clone());

        if let Some(old_rep_group) = existing_rep_group {
            if old_rep_group != rep_group {
                state.repgroups.reassign(&old_rep_group, &rep_group, key);
                if let Some(item) = state.items.get_mut(&key) {
                    item.job.rep_group = rep_group.clone();
                }
            }
            let snapshot = state.items.get(&key).cloned();
            drop(state);
            if let Some(snapshot) = snapshot {
                self.status_bus.publish(StatusEvent::JobChanged(snapshot));
            }
            return key;
        }

        let deps = job.dependencies.clone();
        let scheduler_group = job.scheduler_group.clone();
        let all_prereqs_complete = deps
            .iter()
            .all(|d| state.items.get(d).map(|it| it.state == JobState::Complete).unwrap_or(false));
        let initial_state =
            if deps.is_empty() || all_prereqs_complete { JobState::Ready } else { JobState::Dependent };

        state.deps.add_edges(key, deps);
        state.repgroups.put(&rep_group, key);
        if initial_state.counts_as_demand() {
            state.sched_groups.increment(&scheduler_group);
        }
        state.items.insert(Item::new(job, initial_state));
        let snapshot = state.items.get(&key).cloned();
        drop(state);

        if let Some(snapshot) = snapshot {
            self.status_bus.publish(StatusEvent::JobChanged(snapshot));
            self.status_bus.publish(StatusEvent::CountDelta {
                rep_group,
                from_state: JobState::New,
                to_state: initial_state,
                count: 1,
            });
        }
        key
    }

    pub fn get(&self, key: &JobKey) -> Option<Item> {
        self.state.read().items.get(key).cloned()
    }

    /// `Reserve()`: Ready -> Reserved. Selects the earliest (by insertion
    /// order) Ready item.
    pub fn reserve(&self) -> Option<Item> {
        let mut state = self.state.write();
        let key = *state.items.iter().find(|it| it.state == JobState::Ready)?.key();
        let deadline = self.clock.now() + self.timings.release_timeout;
        let snapshot = {
            let item = state.items.get_mut(&key)?;
            item.state = JobState::Reserved;
            item.reserve_deadline = Some(deadline);
            item.clone()
        };
        drop(state);

        self.status_bus.publish(StatusEvent::JobChanged(snapshot.clone()));
        self.status_bus.publish(StatusEvent::CountDelta {
            rep_group: snapshot.job.rep_group.clone(),
            from_state: JobState::Ready,
            to_state: JobState::Reserved,
            count: 1,
        });
        Some(snapshot)
    }

    /// `Start(key)`: Reserved -> Running.
    pub fn start(&self, key: &JobKey) -> Result<(), QueueError> {
        let mut state = self.state.write();
        let current = state.items.get(key).map(|it| it.state).ok_or(QueueError::NotFound(*key))?;
        if current != JobState::Reserved {
            return Err(QueueError::PreconditionFailed { key: *key, state: current });
        }
        let deadline = self.clock.now() + self.timings.release_timeout;
        let snapshot = match state.items.get_mut(key) {
            Some(item) => {
                item.state = JobState::Running;
                item.release_deadline = Some(deadline);
                item.reserve_deadline = None;
                item.clone()
            }
            None => return Err(QueueError::NotFound(*key)),
        };
        drop(state);

        self.status_bus.publish(StatusEvent::JobChanged(snapshot.clone()));
        self.status_bus.publish(StatusEvent::CountDelta {
            rep_group: snapshot.job.rep_group,
            from_state: JobState::Reserved,
            to_state: JobState::Running,
            count: 1,
        });
        Ok(())
    }

    /// `Touch(key)`: refreshes the release deadline while Running and clears
    /// any Lost projection.
    pub fn touch(&self, key: &JobKey) -> Result<(), QueueError> {
        let mut state = self.state.write();
        let current = state.items.get(key).map(|it| it.state).ok_or(QueueError::NotFound(*key))?;
        if current != JobState::Running {
            return Err(QueueError::PreconditionFailed { key: *key, state: current });
        }
        let deadline = self.clock.now() + self.timings.release_timeout;
        let snapshot = match state.items.get_mut(key) {
            Some(item) => {
                item.release_deadline = Some(deadline);
                item.job.lost = false;
                item.clone()
            }
            None => return Err(QueueError::NotFound(*key)),
        };
        drop(state);
        self.status_bus.publish(StatusEvent::JobChanged(snapshot));
        Ok(())
    }

    /// Marks every Running item whose release deadline has elapsed as Lost
    /// (a display-only projection; `state` itself stays Running). Intended
    /// to run periodically off a timer task.
    pub fn sweep_lost(&self) -> Vec<JobKey> {
        let now = self.clock.now();
        let mut state = self.state.write();
        let due: Vec<JobKey> = state
            .items
            .iter()
            .filter(|it| {
                it.state == JobState::Running
                    && !it.job.lost
                    && it.release_deadline.is_some_and(|deadline| now >= deadline)
            })
            .map(|it| *it.key())
            .collect();

        let mut snapshots = Vec::with_capacity(due.len());
        for key in &due {
            if let Some(item) = state.items.get_mut(key) {
                item.job.lost = true;
                snapshots.push(item.clone());
            }
        }
        drop(state);

        for snapshot in snapshots {
            self.status_bus.publish(StatusEvent::JobChanged(snapshot));
        }
        due
    }

    /// `Release(key)`: Running -> Delay (with back-off) or Buried once
    /// attempts are exhausted.
    pub fn release(&self, key: &JobKey, outcome: ExecOutcome) -> Result<JobState, QueueError> {
        let mut state = self.state.write();
        let current = state.items.get(key).map(|it| it.state).ok_or(QueueError::NotFound(*key))?;
        if current != JobState::Running {
            return Err(QueueError::PreconditionFailed { key: *key, state: current });
        }

        let (attempts, until_buried, scheduler_group) = match state.items.get_mut(key) {
            Some(item) => {
                item.job.outcome = outcome;
                item.job.attempts += 1;
                item.release_deadline = None;
                (item.job.attempts, item.job.until_buried, item.job.scheduler_group.clone())
            }
            None => return Err(QueueError::NotFound(*key)),
        };

        let to_state = if attempts < until_buried { JobState::Delay } else { JobState::Buried };
        let delay_deadline =
            (to_state == JobState::Delay).then(|| self.clock.now() + self.timings.base_backoff * attempts);
        let snapshot = match state.items.get_mut(key) {
            Some(item) => {
                item.state = to_state;
                item.delay_deadline = delay_deadline;
                item.clone()
            }
            None => return Err(QueueError::NotFound(*key)),
        };
        if to_state.counts_as_demand() {
            state.sched_groups.increment(&scheduler_group);
        }
        drop(state);

        self.status_bus.publish(StatusEvent::JobChanged(snapshot.clone()));
        self.status_bus.publish(StatusEvent::CountDelta {
            rep_group: snapshot.job.rep_group,
            from_state: JobState::Running,
            to_state,
            count: 1,
        });
        Ok(to_state)
    }

    /// A Delay item whose `delay_deadline` has elapsed becomes Ready again.
    pub fn sweep_delayed(&self) -> Vec<JobKey> {
        let now = self.clock.now();
        let mut state = self.state.write();
        let due: Vec<JobKey> = state
            .items
            .iter()
            .filter(|it| it.state == JobState::Delay && it.delay_deadline.is_some_and(|d| now >= d))
            .map(|it| *it.key())
            .collect();

        let mut snapshots = Vec::with_capacity(due.len());
        for key in &due {
            if let Some(item) = state.items.get_mut(key) {
                item.state = JobState::Ready;
                item.delay_deadline = None;
                snapshots.push(item.clone());
            }
        }
        drop(state);

        for snapshot in &snapshots {
            self.status_bus.publish(StatusEvent::JobChanged(snapshot.clone()));
            self.status_bus.publish(StatusEvent::CountDelta {
                rep_group: snapshot.job.rep_group.clone(),
                from_state: JobState::Delay,
                to_state: JobState::Ready,
                count: 1,
            });
        }
        due
    }

    /// `Complete(key)`: Running -> Complete, promoting any Dependent
    /// successors whose prerequisites are now all Complete.
    pub fn complete(&self, key: &JobKey, outcome: ExecOutcome) -> Result<Vec<JobKey>, QueueError> {
        let mut state = self.state.write();
        let current = state.items.get(key).map(|it| it.state).ok_or(QueueError::NotFound(*key))?;
        if current != JobState::Running {
            return Err(QueueError::PreconditionFailed { key: *key, state: current });
        }
        let snapshot = match state.items.get_mut(key) {
            Some(item) => {
                item.job.outcome = outcome;
                item.state = JobState::Complete;
                item.clone()
            }
            None => return Err(QueueError::NotFound(*key)),
        };

        let now_ready = state.deps.on_complete(key, |candidate| {
            state.items.get(candidate).map(|it| it.state == JobState::Complete).unwrap_or(false)
        });

        let mut promoted_snapshots = Vec::new();
        for ready_key in &now_ready {
            let is_dependent =
                state.items.get(ready_key).map(|it| it.state == JobState::Dependent).unwrap_or(false);
            if !is_dependent {
                continue;
            }
            let scheduler_group = match state.items.get(ready_key) {
                Some(item) => item.job.scheduler_group.clone(),
                None => continue,
            };
            if let Some(item) = state.items.get_mut(ready_key) {
                item.state = JobState::Ready;
            }
            state.sched_groups.increment(&scheduler_group);
            if let Some(item) = state.items.get(ready_key) {
                promoted_snapshots.push(item.clone());
            }
        }
        drop(state);

        self.status_bus.publish(StatusEvent::JobChanged(snapshot.clone()));
        self.status_bus.publish(StatusEvent::CountDelta {
            rep_group: snapshot.job.rep_group,
            from_state: JobState::Running,
            to_state: JobState::Complete,
            count: 1,
        });
        let mut promoted = Vec::with_capacity(promoted_snapshots.len());
        for promoted_snapshot in promoted_snapshots {
            promoted.push(*promoted_snapshot.key());
            self.status_bus.publish(StatusEvent::JobChanged(promoted_snapshot.clone()));
            self.status_bus.publish(StatusEvent::CountDelta {
                rep_group: promoted_snapshot.job.rep_group,
                from_state: JobState::Dependent,
                to_state: JobState::Ready,
                count: 1,
            });
        }
        Ok(promoted)
    }

    /// `Bury(key)`: Running -> Buried.
    pub fn bury(&self, key: &JobKey, outcome: ExecOutcome) -> Result<(), QueueError> {
        let mut state = self.state.write();
        let current = state.items.get(key).map(|it| it.state).ok_or(QueueError::NotFound(*key))?;
        if current != JobState::Running {
            return Err(QueueError::PreconditionFailed { key: *key, state: current });
        }
        let snapshot = match state.items.get_mut(key) {
            Some(item) => {
                item.job.outcome = outcome;
                item.state = JobState::Buried;
                item.clone()
            }
            None => return Err(QueueError::NotFound(*key)),
        };
        drop(state);

        self.status_bus.publish(StatusEvent::JobChanged(snapshot.clone()));
        self.status_bus.publish(StatusEvent::CountDelta {
            rep_group: snapshot.job.rep_group,
            from_state: JobState::Running,
            to_state: JobState::Buried,
            count: 1,
        });
        Ok(())
    }

    /// `Kick(key)`: Bury -> Ready. Resets `UntilBuried` to `Retries + 1`.
    pub fn kick(&self, key: &JobKey) -> Result<(), QueueError> {
        let mut state = self.state.write();
        let current = state.items.get(key).map(|it| it.state).ok_or(QueueError::NotFound(*key))?;
        if current != JobState::Buried {
            return Err(QueueError::PreconditionFailed { key: *key, state: current });
        }
        let scheduler_group = match state.items.get_mut(key) {
            Some(item) => {
                item.state = JobState::Ready;
                item.job.until_buried = item.job.retries + 1;
                item.job.attempts = 0;
                item.job.scheduler_group.clone()
            }
            None => return Err(QueueError::NotFound(*key)),
        };
        state.sched_groups.increment(&scheduler_group);
        let snapshot = state.items.get(key).cloned();
        drop(state);

        if let Some(snapshot) = snapshot {
            self.status_bus.publish(StatusEvent::JobChanged(snapshot.clone()));
            self.status_bus.publish(StatusEvent::CountDelta {
                rep_group: snapshot.job.rep_group,
                from_state: JobState::Buried,
                to_state: JobState::Ready,
                count: 1,
            });
        }
        Ok(())
    }

    /// `Remove(key)`: any non-Running state -> removed, only if
    /// `HasDependents(key)` is false. Notifies the persistence sink and, for
    /// Delay/Ready items, decrements the scheduler-group counter.
    pub fn remove(&self, key: &JobKey) -> Result<(), QueueError> {
        let mut state = self.state.write();
        let removed = try_remove(&mut state, key)?;
        drop(state);

        self.sink.delete_live_job(key);
        self.status_bus.publish(StatusEvent::JobRemoved {
            key: *key,
            rep_group: removed.job.rep_group,
            was_counted_state: removed.counted_state(),
        });
        Ok(())
    }

    /// `retry`: iterate the RepGroup's keys; Kick every Buried item whose
    /// Exitcode/FailReason match. Stops after the first match if `all` is
    /// false.
    pub fn retry_rep_group(
        &self,
        rep_group: &str,
        exitcode: Option<i32>,
        fail_reason: Option<&str>,
        all: bool,
    ) -> Vec<JobKey> {
        let snapshot_keys = self.state.read().repgroups.lookup(rep_group);
        let mut kicked = Vec::new();
        let mut events = Vec::new();
        {
            let mut state = self.state.write();
            for key in snapshot_keys {
                let matches = state
                    .items
                    .get(&key)
                    .map(|it| it.state == JobState::Buried && matches_filter(&it.job, exitcode, fail_reason))
                    .unwrap_or(false);
                if !matches {
                    continue;
                }
                let scheduler_group = match state.items.get_mut(&key) {
                    Some(item) => {
                        item.state = JobState::Ready;
                        item.job.until_buried = item.job.retries + 1;
                        item.job.attempts = 0;
                        item.job.scheduler_group.clone()
                    }
                    None => continue,
                };
                state.sched_groups.increment(&scheduler_group);
                kicked.push(key);
                if let Some(item) = state.items.get(&key) {
                    events.push(item.clone());
                }
                if !all {
                    break;
                }
            }
        }
        for snapshot in events {
            self.status_bus.publish(StatusEvent::JobChanged(snapshot.clone()));
            self.status_bus.publish(StatusEvent::CountDelta {
                rep_group: snapshot.job.rep_group,
                from_state: JobState::Buried,
                to_state: JobState::Ready,
                count: 1,
            });
        }
        kicked
    }

    /// `remove`: iterate the RepGroup's keys; remove every matching item in
    /// {Bury, Delay, Dependent, Ready} that has no dependents. Per-item
    /// failures (has dependents) are collected, not fatal to the batch.
    pub fn remove_rep_group(
        &self,
        rep_group: &str,
        exitcode: Option<i32>,
        fail_reason: Option<&str>,
        all: bool,
    ) -> RemoveOutcome {
        let snapshot_keys = self.state.read().repgroups.lookup(rep_group);
        let mut outcome = RemoveOutcome::default();
        let mut removed_events = Vec::new();
        {
            let mut state = self.state.write();
            for key in snapshot_keys {
                let matches = state
                    .items
                    .get(&key)
                    .map(|it| it.state.removable() && matches_filter(&it.job, exitcode, fail_reason))
                    .unwrap_or(false);
                if !matches {
                    continue;
                }
                match try_remove(&mut state, &key) {
                    Ok(removed) => {
                        outcome.removed.push(key);
                        removed_events.push((key, removed.job.rep_group, removed.counted_state()));
                    }
                    Err(QueueError::HasDependents(_)) => outcome.blocked.push(key),
                    Err(_) => {}
                }
                if !all && !outcome.removed.is_empty() {
                    break;
                }
            }
        }
        for (key, rep_group, was_counted_state) in removed_events {
            self.sink.delete_live_job(&key);
            self.status_bus.publish(StatusEvent::JobRemoved { key, rep_group, was_counted_state });
        }
        outcome
    }

    /// `kill`: request termination of every key in the RepGroup. Best
    /// effort — individual failures are logged and do not abort the batch.
    pub async fn kill_rep_group(&self, rep_group: &str) -> Vec<JobKey> {
        let keys = self.state.read().repgroups.lookup(rep_group);
        let mut attempted = Vec::with_capacity(keys.len());
        for key in keys {
            attempted.push(key);
            if let Err(err) = self.scheduler.kill_job(&key).await {
                tracing::warn!(key = %key, rep_group, error = %err, "kill: backend failure, continuing batch");
            }
        }
        attempted
    }

    pub fn register_bad_server(&self, handle: Arc<dyn crate::collaborators::BadServerHandle>) {
        self.bad_servers.register(handle);
    }

    /// `confirmBadServer(id)`: destroys the server's handle the first time;
    /// a repeat call is a no-op.
    pub fn confirm_bad_server(&self, server_id: &str) -> bool {
        let confirmed = self.bad_servers.confirm(server_id);
        if confirmed {
            self.bad_server_bus.publish(BadServerEvent { server_id: server_id.to_string() });
        }
        confirmed
    }

    pub fn raise_scheduler_issue(&self, msg_id: String, msg: String, timestamp_epoch_secs: i64) {
        self.issues.insert(msg_id.clone(), SchedulerIssue { msg: msg.clone(), timestamp_epoch_secs });
        self.issue_bus.publish(SchedulerIssueEvent { msg_id, msg, timestamp_epoch_secs });
    }

    /// `dismissMsg(id)`: a repeat call after the first is a no-op.
    pub fn dismiss_scheduler_issue(&self, msg_id: &str) -> bool {
        self.issues.dismiss(msg_id)
    }
}

fn matches_filter(job: &Job, exitcode: Option<i32>, fail_reason: Option<&str>) -> bool {
    if let Some(expected) = exitcode {
        if job.outcome.exitcode != Some(expected) {
            return false;
        }
    }
    if let Some(expected) = fail_reason {
        if job.outcome.fail_reason.as_deref() != Some(expected) {
            return false;
        }
    }
    true
}

/// Structural removal shared by the single-key `Remove` and the bulk
/// `remove` handler: enforces `HasDependents` and the valid-states guard,
/// then drops the item from every index atomically under the caller's
/// write lock.
fn try_remove(state: &mut QueueState, key: &JobKey) -> Result<Item, QueueError> {
    let current = state.items.get(key).map(|it| it.state).ok_or(QueueError::NotFound(*key))?;
    if current == JobState::Running {
        return Err(QueueError::Running(*key));
    }
    if !current.removable() {
        return Err(QueueError::PreconditionFailed { key: *key, state: current });
    }
    if state.deps.has_dependents(key) {
        return Err(QueueError::HasDependents(*key));
    }

    let removed = match state.items.remove(key) {
        Some(item) => item,
        None => return Err(QueueError::NotFound(*key)),
    };
    state.repgroups.remove(&removed.job.rep_group, key);
    state.deps.remove_key(key);
    if removed.state.counts_as_demand() {
        state.sched_groups.decrement(&removed.job.scheduler_group);
    }
    Ok(removed)
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use super::*;
    use crate::clock::FakeClock;
    use crate::collaborators::test_support::{RecordingLiveJobSink, RecordingSchedulerAdapter};

    pub fn test_queue() -> Queue<FakeClock> {
        Queue::new(
            Arc::new(RecordingLiveJobSink::default()),
            Arc::new(RecordingSchedulerAdapter::default()),
            FakeClock::new(),
            16,
            QueueTimings::default(),
        )
    }
}
