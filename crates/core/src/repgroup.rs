// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RepGroup Index: the secondary index from reporting group to the set of
//! keys currently filed under it.
//!
//! `Lookup` hands back an owned snapshot (`Vec<JobKey>`) rather than a
//! reference into the live index, so bulk operations (retry/remove/kill)
//! iterate a point-in-time copy while the index underneath is free to
//! mutate — the "readers take a snapshot under read exclusion before
//! iterating" discipline.

use crate::id::{JobKey, RepGroupName};
use indexmap::IndexSet;
use std::collections::HashMap;

#[derive(Default)]
pub struct RepGroupIndex {
    groups: HashMap<RepGroupName, IndexSet<JobKey>>,
}

impl RepGroupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, rep_group: &RepGroupName, key: JobKey) {
        self.groups.entry(rep_group.clone()).or_default().insert(key);
    }

    pub fn remove(&mut self, rep_group: &RepGroupName, key: &JobKey) {
        if let Some(set) = self.groups.get_mut(rep_group) {
            set.shift_remove(key);
            if set.is_empty() {
                self.groups.remove(rep_group);
            }
        }
    }

    /// Move `key` from `old` to `new`, as one call so a reassignment never
    /// observably drops the key from both entries at once.
    pub fn reassign(&mut self, old: &RepGroupName, new: &RepGroupName, key: JobKey) {
        if old == new {
            self.put(new, key);
            return;
        }
        self.remove(old, &key);
        self.put(new, key);
    }

    pub fn lookup(&self, rep_group: &str) -> Vec<JobKey> {
        self.groups.get(rep_group).map(|s| s.iter().copied().collect()).unwrap_or_default()
    }

    pub fn rep_groups(&self) -> Vec<RepGroupName> {
        self.groups.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> JobKey {
        JobKey::derive(s, "/tmp")
    }

    #[test]
    fn put_and_lookup() {
        let mut idx = RepGroupIndex::new();
        let rg = RepGroupName::from("rg1");
        idx.put(&rg, key("a"));
        idx.put(&rg, key("b"));
        let mut found = idx.lookup("rg1");
        found.sort_by_key(|k| k.as_str().to_string());
        let mut expect = vec![key("a"), key("b")];
        expect.sort_by_key(|k| k.as_str().to_string());
        assert_eq!(found, expect);
    }

    #[test]
    fn remove_drops_empty_group() {
        let mut idx = RepGroupIndex::new();
        let rg = RepGroupName::from("rg1");
        let k = key("a");
        idx.put(&rg, k);
        idx.remove(&rg, &k);
        assert!(idx.lookup("rg1").is_empty());
        assert!(idx.rep_groups().is_empty());
    }

    #[test]
    fn reassign_moves_key_atomically_between_entries() {
        let mut idx = RepGroupIndex::new();
        let old = RepGroupName::from("rg1");
        let new = RepGroupName::from("rg2");
        let k = key("a");
        idx.put(&old, k);
        idx.reassign(&old, &new, k);
        assert!(idx.lookup("rg1").is_empty());
        assert_eq!(idx.lookup("rg2"), vec![k]);
    }
}
