// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Query Façade (component H): the read-only views a session handler needs
//! to answer `current`, `job`, `jobs`, and `stateCounts` requests without
//! reaching into the queue's internal indices directly.

use crate::clock::Clock;
use crate::id::{JobKey, RepGroupName};
use crate::job::{Item, JobState};
use crate::queue::Queue;
use std::collections::{HashMap, HashSet};

impl<C: Clock> Queue<C> {
    /// Every item currently tracked by the queue, in insertion order.
    pub fn jobs_current(&self) -> Vec<Item> {
        self.state_lock().read().items.iter().cloned().collect()
    }

    /// Items in `rep_group` whose state is Complete.
    pub fn complete_jobs_by_repgroup(&self, rep_group: &str) -> Vec<Item> {
        let state = self.state_lock().read();
        state
            .repgroups
            .lookup(rep_group)
            .iter()
            .filter_map(|key| state.items.get(key))
            .filter(|item| item.state == JobState::Complete)
            .cloned()
            .collect()
    }

    /// Look up a batch of keys. Returns the items found and, separately,
    /// the keys that were not.
    pub fn jobs_by_keys(&self, keys: &[JobKey]) -> (Vec<Item>, Vec<JobKey>) {
        let state = self.state_lock().read();
        let mut found = Vec::with_capacity(keys.len());
        let mut missing = Vec::new();
        for key in keys {
            match state.items.get(key) {
                Some(item) => found.push(item.clone()),
                None => missing.push(*key),
            }
        }
        (found, missing)
    }

    /// A representative sample of up to `limit` items from `rep_group`,
    /// optionally restricted to `state_filter`: at most one item per
    /// distinct `(display_state, exitcode, fail_reason)` triple, so a caller
    /// asking "what's going on in this RepGroup" sees every *kind* of
    /// outcome present rather than `limit` copies of the same one.
    pub fn jobs_by_repgroup(
        &self,
        rep_group: &str,
        limit: usize,
        state_filter: Option<JobState>,
    ) -> Vec<Item> {
        let state = self.state_lock().read();
        let mut seen = HashSet::new();
        let mut sample = Vec::new();
        for key in state.repgroups.lookup(rep_group) {
            if sample.len() >= limit {
                break;
            }
            let item = match state.items.get(&key) {
                Some(item) => item,
                None => continue,
            };
            let display = item.display_state();
            if state_filter.is_some_and(|filter| filter != display) {
                continue;
            }
            let signature = (display, item.job.outcome.exitcode, item.job.outcome.fail_reason.clone());
            if seen.insert(signature) {
                sample.push(item.clone());
            }
        }
        sample
    }

    /// `StateCounts` for an arbitrary slice of items (`Reserved` merged into
    /// `Running`, `Lost` projected from `Running`, per [`Item::counted_state`]).
    pub fn state_counts_of(items: &[Item]) -> HashMap<JobState, u32> {
        let mut counts = HashMap::new();
        for item in items {
            *counts.entry(item.counted_state()).or_insert(0) += 1;
        }
        counts
    }

    pub fn state_counts_repgroup(&self, rep_group: &str) -> HashMap<JobState, u32> {
        let state = self.state_lock().read();
        let items: Vec<Item> =
            state.repgroups.lookup(rep_group).iter().filter_map(|key| state.items.get(key).cloned()).collect();
        Self::state_counts_of(&items)
    }

    /// `StateCounts` broken down per RepGroup, for the initial snapshot sent
    /// to a freshly joined session.
    pub fn state_counts_all(&self) -> HashMap<RepGroupName, HashMap<JobState, u32>> {
        let state = self.state_lock().read();
        let mut out: HashMap<RepGroupName, HashMap<JobState, u32>> = HashMap::new();
        for item in state.items.iter() {
            let counts = out.entry(item.job.rep_group.clone()).or_default();
            *counts.entry(item.counted_state()).or_insert(0) += 1;
        }
        out
    }

    pub fn all_rep_groups(&self) -> Vec<RepGroupName> {
        self.state_lock().read().repgroups.rep_groups()
    }
}

#[cfg(test)]
mod tests {
    use crate::id::RepGroupName;
    use crate::job::{ExecOutcome, JobState, JobSubmission};
    use crate::queue::test_support::test_queue;

    #[test]
    fn jobs_by_keys_splits_found_from_missing() {
        let queue = test_queue();
        let key = queue.add(JobSubmission::builder().cmd("echo a").build());
        let bogus = crate::id::JobKey::derive("nope", "/nowhere");

        let (found, missing) = queue.jobs_by_keys(&[key, bogus]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].job.key, key);
        assert_eq!(missing, vec![bogus]);
    }

    #[test]
    fn state_counts_all_groups_by_repgroup() {
        let queue = test_queue();
        queue.add(JobSubmission::builder().cmd("a").rep_group(RepGroupName::from("rgA")).build());
        queue.add(JobSubmission::builder().cmd("b").rep_group(RepGroupName::from("rgB")).build());

        let counts = queue.state_counts_all();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[&RepGroupName::from("rgA")][&JobState::Ready], 1);
        assert_eq!(counts[&RepGroupName::from("rgB")][&JobState::Ready], 1);
    }

    #[test]
    fn jobs_by_repgroup_samples_one_per_outcome_signature() {
        let queue = test_queue();
        let mut keys = Vec::new();
        for i in 0..4 {
            let key = queue.add(
                JobSubmission::builder().cmd(format!("job-{i}")).rep_group(RepGroupName::from("rg1")).build(),
            );
            keys.push(key);
        }
        // Bury all four with the same (exitcode, fail_reason) signature.
        for key in &keys {
            queue.reserve();
            queue.start(key).unwrap();
            queue
                .bury(key, ExecOutcome { exitcode: Some(1), fail_reason: Some("boom".into()), ..Default::default() })
                .unwrap();
        }

        let sample = queue.jobs_by_repgroup("rg1", 10, None);
        assert_eq!(sample.len(), 1, "all four share one outcome signature");
    }

    #[test]
    fn complete_jobs_by_repgroup_only_returns_complete_items() {
        let queue = test_queue();
        let key = queue.add(JobSubmission::builder().cmd("a").rep_group(RepGroupName::from("rg1")).build());
        assert!(queue.complete_jobs_by_repgroup("rg1").is_empty());

        queue.reserve();
        queue.start(&key).unwrap();
        queue.complete(&key, ExecOutcome::default()).unwrap();

        let completed = queue.complete_jobs_by_repgroup("rg1");
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].job.key, key);
    }
}
