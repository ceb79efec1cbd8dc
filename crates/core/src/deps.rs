// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency Index: the DAG of `K1 -> K2` edges meaning "K2 waits on K1".

use crate::id::JobKey;
use std::collections::HashMap;

#[derive(Default)]
pub struct DependencyIndex {
    /// key -> its prerequisites (what it is waiting on).
    prereqs: HashMap<JobKey, Vec<JobKey>>,
    /// key -> dependents that name it as a prerequisite (reverse edges).
    dependents: HashMap<JobKey, Vec<JobKey>>,
}

impl DependencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edges(&mut self, key: JobKey, prereqs: Vec<JobKey>) {
        for prereq in &prereqs {
            self.dependents.entry(*prereq).or_default().push(key);
        }
        if prereqs.is_empty() {
            self.prereqs.remove(&key);
        } else {
            self.prereqs.insert(key, prereqs);
        }
    }

    pub fn has_dependents(&self, key: &JobKey) -> bool {
        self.dependents.get(key).is_some_and(|d| !d.is_empty())
    }

    pub fn remove_key(&mut self, key: &JobKey) {
        if let Some(prereqs) = self.prereqs.remove(key) {
            for prereq in prereqs {
                if let Some(dependents) = self.dependents.get_mut(&prereq) {
                    dependents.retain(|k| k != key);
                }
            }
        }
        self.dependents.remove(key);
    }

    /// Called when `key`'s job completes. `is_complete` resolves whether a
    /// given prerequisite key is itself Complete. Returns the dependents of
    /// `key` whose prerequisites are now *all* Complete — those are the keys
    /// the caller should promote Dependent -> Ready.
    pub fn on_complete(&self, key: &JobKey, is_complete: impl Fn(&JobKey) -> bool) -> Vec<JobKey> {
        self.dependents
            .get(key)
            .into_iter()
            .flatten()
            .filter(|dependent| {
                self.prereqs
                    .get(*dependent)
                    .map_or(true, |prereqs| prereqs.iter().all(&is_complete))
            })
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> JobKey {
        JobKey::derive(s, "/tmp")
    }

    #[test]
    fn has_dependents_reflects_reverse_edges() {
        let mut idx = DependencyIndex::new();
        let a = key("a");
        let b = key("b");
        idx.add_edges(b, vec![a]);
        assert!(idx.has_dependents(&a));
        assert!(!idx.has_dependents(&b));
    }

    #[test]
    fn on_complete_requires_all_prereqs_done() {
        let mut idx = DependencyIndex::new();
        let a = key("a");
        let b = key("b");
        let c = key("c");
        // c depends on both a and b.
        idx.add_edges(c, vec![a, b]);

        let ready = idx.on_complete(&a, |k| *k == a);
        assert!(ready.is_empty(), "c still waits on b");

        let ready = idx.on_complete(&b, |k| *k == a || *k == b);
        assert_eq!(ready, vec![c]);
    }

    #[test]
    fn remove_key_cleans_both_directions() {
        let mut idx = DependencyIndex::new();
        let a = key("a");
        let b = key("b");
        idx.add_edges(b, vec![a]);
        idx.remove_key(&b);
        assert!(!idx.has_dependents(&a));
    }
}
