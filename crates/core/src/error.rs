// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for queue operations.

use crate::id::JobKey;
use crate::job::JobState;
use thiserror::Error;

/// Errors a state-machine operation on the queue can return.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("no job with key {0}")]
    NotFound(JobKey),

    #[error("job {key} is in state {state}, which does not permit this operation")]
    PreconditionFailed { key: JobKey, state: JobState },

    #[error("job {0} has dependents and cannot be removed")]
    HasDependents(JobKey),

    #[error("job {0} is running and cannot be removed")]
    Running(JobKey),
}
