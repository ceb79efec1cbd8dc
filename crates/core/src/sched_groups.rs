// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler-Group Counters: per-group demand counts driving the (out of
//! scope) backend provisioner. Incremented when a job lands in Ready or
//! Delay, decremented when it leaves those states via completion or
//! removal.

use std::collections::HashMap;

#[derive(Default)]
pub struct SchedGroupCounters {
    counts: HashMap<String, i64>,
}

impl SchedGroupCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, group: &str) {
        *self.counts.entry(group.to_string()).or_insert(0) += 1;
    }

    pub fn decrement(&mut self, group: &str) {
        if let Some(count) = self.counts.get_mut(group) {
            *count -= 1;
            if *count <= 0 {
                self.counts.remove(group);
            }
        }
    }

    pub fn get(&self, group: &str) -> i64 {
        self.counts.get(group).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_then_decrement_returns_to_zero() {
        let mut counters = SchedGroupCounters::new();
        counters.increment("100mb.60s.1gb.1c");
        counters.increment("100mb.60s.1gb.1c");
        assert_eq!(counters.get("100mb.60s.1gb.1c"), 2);
        counters.decrement("100mb.60s.1gb.1c");
        assert_eq!(counters.get("100mb.60s.1gb.1c"), 1);
        counters.decrement("100mb.60s.1gb.1c");
        assert_eq!(counters.get("100mb.60s.1gb.1c"), 0);
    }

    #[test]
    fn decrementing_unknown_group_is_a_no_op() {
        let mut counters = SchedGroupCounters::new();
        counters.decrement("never-seen");
        assert_eq!(counters.get("never-seen"), 0);
    }
}
