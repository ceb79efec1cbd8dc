// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `JobStatus`: the flattened wire projection of a core `Item` (spec §6).

use serde::{Deserialize, Serialize};
use std::path::Path;
use wrq_core::{Item, JobKey, JobState, RepGroupName};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobStatus {
    pub key: JobKey,
    pub rep_group: RepGroupName,
    pub cmd: String,
    pub cwd_base: String,
    pub cwd: String,
    pub state: JobState,
    pub dependencies: Vec<JobKey>,
    pub dep_groups: Vec<String>,
    pub ram_mb: u64,
    pub time_secs: u64,
    pub disk_gb: f64,
    pub cores: u32,
    pub scheduler_group: String,
    pub exited: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exitcode: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_ram_mb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(rename = "HostID", default, skip_serializing_if = "Option::is_none")]
    pub host_id: Option<String>,
    #[serde(rename = "HostIP", default, skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wall_time_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_time_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std_out: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std_err: Option<String>,
    pub attempts: u32,
    pub retries: u32,
    pub until_buried: u32,
}

/// Splits a working directory into its parent (`CwdBase`) and leaf
/// component (`Cwd`), as spec §6 requires for the wire projection.
fn split_cwd(cwd: &str) -> (String, String) {
    let path = Path::new(cwd);
    let base = path.parent().map(|p| p.to_string_lossy().into_owned()).unwrap_or_default();
    let leaf = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| cwd.to_string());
    (base, leaf)
}

impl From<&Item> for JobStatus {
    fn from(item: &Item) -> Self {
        let job = &item.job;
        let (cwd_base, cwd) = split_cwd(&job.cwd);
        JobStatus {
            key: job.key,
            rep_group: job.rep_group.clone(),
            cmd: job.cmd.clone(),
            cwd_base,
            cwd,
            state: item.display_state(),
            dependencies: job.dependencies.clone(),
            dep_groups: job.dep_groups.clone(),
            ram_mb: job.resources.ram_mb,
            time_secs: job.resources.time_secs,
            disk_gb: job.resources.disk_gb,
            cores: job.resources.cores,
            scheduler_group: job.scheduler_group.clone(),
            exited: job.outcome.exited,
            exitcode: job.outcome.exitcode,
            fail_reason: job.outcome.fail_reason.clone(),
            peak_ram_mb: job.outcome.peak_ram_mb,
            pid: job.outcome.pid,
            host: job.outcome.host.clone(),
            host_id: job.outcome.host_id.clone(),
            host_ip: job.outcome.host_ip.clone(),
            wall_time_secs: job.outcome.wall_time_secs,
            cpu_time_secs: job.outcome.cpu_time_secs,
            started: job.outcome.start_time_epoch_secs,
            ended: job.outcome.end_time_epoch_secs,
            std_out: job.outcome.stdout.clone(),
            std_err: job.outcome.stderr.clone(),
            attempts: job.attempts,
            retries: job.retries,
            until_buried: job.until_buried,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wrq_core::{Job, JobSubmission};

    #[test]
    fn splits_cwd_into_base_and_leaf() {
        let (base, leaf) = split_cwd("/srv/app/build");
        assert_eq!(base, "/srv/app");
        assert_eq!(leaf, "build");
    }

    #[test]
    fn lost_projection_overrides_state_on_the_wire() {
        let mut job = Job::new(JobSubmission::builder().cmd("echo hi").build());
        job.lost = true;
        let item = Item::new(job, JobState::Running);
        let status = JobStatus::from(&item);
        assert_eq!(status.state, JobState::Lost);
    }

    #[test]
    fn serializes_with_pascal_case_field_names() {
        let job = Job::new(JobSubmission::builder().cmd("echo hi").cwd("/srv/app/build").build());
        let item = Item::new(job, JobState::Ready);
        let status = JobStatus::from(&item);
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"CwdBase\":\"/srv/app\""));
        assert!(json.contains("\"Cwd\":\"build\""));
        assert!(json.contains("\"State\":\"ready\""));
    }
}
