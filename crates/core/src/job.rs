// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job data model: resource requirements, execution outcome, and the
//! `Job`/`Item` split described by the queue's data model.

use crate::id::{JobKey, RepGroupName};
use std::time::Instant;

/// State a job can occupy. `Lost` is never stored on an `Item`: it is a
/// display-only projection of `Running` computed by [`Item::display_state`]
/// when the runner's heartbeat has lapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    New,
    Delay,
    Ready,
    Reserved,
    Running,
    Lost,
    Buried,
    Complete,
    Dependent,
}

crate::simple_display! {
    JobState {
        New => "new",
        Delay => "delay",
        Ready => "ready",
        Reserved => "reserved",
        Running => "running",
        Lost => "lost",
        Buried => "buried",
        Complete => "complete",
        Dependent => "dependent",
    }
}

impl JobState {
    /// All states that count as "demand" against a scheduler-group counter.
    pub fn counts_as_demand(self) -> bool {
        matches!(self, JobState::Ready | JobState::Delay)
    }

    /// States `Remove` accepts (the `Running` state is excluded: you must
    /// `Bury` or let it `Complete` first).
    pub fn removable(self) -> bool {
        matches!(
            self,
            JobState::Buried | JobState::Delay | JobState::Dependent | JobState::Ready
        )
    }
}

/// Resource requirements a job asks the scheduler for.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResourceRequirements {
    pub ram_mb: u64,
    pub time_secs: u64,
    pub disk_gb: f64,
    pub cores: u32,
}

impl Default for ResourceRequirements {
    fn default() -> Self {
        Self { ram_mb: 100, time_secs: 3600, disk_gb: 1.0, cores: 1 }
    }
}

/// Result of a completed (or failed) run, filled in as the run progresses.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExecOutcome {
    pub exited: bool,
    pub exitcode: Option<i32>,
    pub fail_reason: Option<String>,
    pub peak_ram_mb: Option<u64>,
    pub pid: Option<u32>,
    pub host: Option<String>,
    pub host_id: Option<String>,
    pub host_ip: Option<String>,
    pub wall_time_secs: Option<f64>,
    pub cpu_time_secs: Option<f64>,
    pub start_time_epoch_secs: Option<i64>,
    pub end_time_epoch_secs: Option<i64>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

/// A unit of work. `Key` is content-addressed (see [`JobKey::derive`]);
/// `state` is *not* stored here — it lives on the owning [`Item`], since a
/// `Job` is the durable record and an `Item` is the queue's operational
/// wrapper around it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Job {
    pub key: JobKey,
    pub rep_group: RepGroupName,
    pub cmd: String,
    pub cwd: String,
    pub dependencies: Vec<JobKey>,
    pub dep_groups: Vec<String>,
    pub resources: ResourceRequirements,
    pub scheduler_group: String,
    pub outcome: ExecOutcome,
    pub attempts: u32,
    pub retries: u32,
    pub until_buried: u32,
    pub lost: bool,
}

impl Job {
    pub fn new(submission: JobSubmission) -> Self {
        let key = JobKey::derive(&submission.cmd, &submission.cwd);
        let scheduler_group = scheduler_group_for(&submission.resources);
        Self {
            key,
            rep_group: submission.rep_group,
            cmd: submission.cmd,
            cwd: submission.cwd,
            dependencies: submission.dependencies,
            dep_groups: submission.dep_groups,
            resources: submission.resources,
            scheduler_group,
            outcome: ExecOutcome::default(),
            attempts: 0,
            retries: submission.retries,
            until_buried: submission.retries + 1,
            lost: false,
        }
    }
}

/// Derive a scheduler-group bucket from resource requirements. Jobs with
/// identical requirements land in the same bucket so the out-of-scope
/// provisioner can size backend capacity per bucket rather than per job.
fn scheduler_group_for(resources: &ResourceRequirements) -> String {
    format!(
        "{}mb.{}s.{}gb.{}c",
        resources.ram_mb, resources.time_secs, resources.disk_gb as u64, resources.cores
    )
}

/// Input to [`crate::queue::Queue::add`]: everything the submission path
/// supplies about a new job.
#[derive(Debug, Clone)]
pub struct JobSubmission {
    pub cmd: String,
    pub cwd: String,
    pub rep_group: RepGroupName,
    pub dependencies: Vec<JobKey>,
    pub dep_groups: Vec<String>,
    pub resources: ResourceRequirements,
    pub retries: u32,
}

crate::builder! {
    pub struct JobSubmissionBuilder => JobSubmission {
        into { cmd: String = "true", cwd: String = "/tmp", rep_group: RepGroupName = RepGroupName::from("default") }
        set { dependencies: Vec<JobKey> = Vec::new(), dep_groups: Vec<String> = Vec::new(), resources: ResourceRequirements = ResourceRequirements { ram_mb: 100, time_secs: 3600, disk_gb: 1.0, cores: 1 }, retries: u32 = 2 }
    }
}

/// The queue's wrapper around a [`Job`]: state and the three deadlines the
/// state machine tracks while the item is in flight.
#[derive(Debug, Clone)]
pub struct Item {
    pub job: Job,
    pub state: JobState,
    pub reserve_deadline: Option<Instant>,
    pub delay_deadline: Option<Instant>,
    pub release_deadline: Option<Instant>,
}

impl Item {
    pub fn new(job: Job, state: JobState) -> Self {
        Self { job, state, reserve_deadline: None, delay_deadline: None, release_deadline: None }
    }

    pub fn key(&self) -> &JobKey {
        &self.job.key
    }

    /// The state as reported to clients: `Running` is projected to `Lost`
    /// when the job's heartbeat has lapsed. The underlying `state` field
    /// never changes as a result of this projection.
    pub fn display_state(&self) -> JobState {
        if self.state == JobState::Running && self.job.lost {
            JobState::Lost
        } else {
            self.state
        }
    }

    /// The state as reported by `StateCounts`: `Reserved` additionally
    /// merges into `Running`. Unlike `display_state`, this never reports
    /// `Lost` — a lost job is still `Running` as far as counts go.
    pub fn counted_state(&self) -> JobState {
        match self.state {
            JobState::Reserved => JobState::Running,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn same_cmd_and_cwd_derive_same_key() {
        let a = Job::new(JobSubmission::builder().cmd("echo hi").cwd("/a").build());
        let b = Job::new(JobSubmission::builder().cmd("echo hi").cwd("/a").build());
        assert_eq!(a.key, b.key);
    }

    #[test]
    fn display_state_projects_lost_only_while_running() {
        let job = Job::new(JobSubmission::builder().build());
        let mut item = Item::new(job, JobState::Buried);
        item.job.lost = true;
        assert_eq!(item.display_state(), JobState::Buried);

        item.state = JobState::Running;
        assert_eq!(item.display_state(), JobState::Lost);
    }

    #[test]
    fn counted_state_merges_reserved_into_running() {
        let job = Job::new(JobSubmission::builder().build());
        let item = Item::new(job, JobState::Reserved);
        assert_eq!(item.counted_state(), JobState::Running);
    }

    #[test]
    fn counted_state_keeps_a_lost_job_under_running() {
        let job = Job::new(JobSubmission::builder().build());
        let mut item = Item::new(job, JobState::Running);
        item.job.lost = true;
        assert_eq!(item.display_state(), JobState::Lost, "wire projection shows Lost");
        assert_eq!(item.counted_state(), JobState::Running, "but StateCounts still reports Running");
    }

    #[yare::parameterized(
        new        = { JobState::New, JobState::New },
        delay      = { JobState::Delay, JobState::Delay },
        ready      = { JobState::Ready, JobState::Ready },
        reserved   = { JobState::Reserved, JobState::Running },
        running    = { JobState::Running, JobState::Running },
        buried     = { JobState::Buried, JobState::Buried },
        complete   = { JobState::Complete, JobState::Complete },
        dependent  = { JobState::Dependent, JobState::Dependent },
    )]
    fn counted_state_merges_only_reserved(state: JobState, expected: JobState) {
        let job = Job::new(JobSubmission::builder().build());
        let item = Item::new(job, state);
        assert_eq!(item.counted_state(), expected);
    }

    fn arb_in_flight_state() -> impl Strategy<Value = JobState> {
        prop_oneof![Just(JobState::Reserved), Just(JobState::Running)]
    }

    proptest! {
        #[test]
        fn reserved_or_running_is_always_counted_as_running(
            state in arb_in_flight_state(),
            lost in any::<bool>(),
        ) {
            let job = Job::new(JobSubmission::builder().build());
            let mut item = Item::new(job, state);
            item.job.lost = lost;
            prop_assert_eq!(item.counted_state(), JobState::Running);
        }
    }
}
