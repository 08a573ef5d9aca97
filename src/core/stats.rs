//! Aggregate run statistics.
//!
//! `RunStats::merge` is the correctness contract the parallel path rests on:
//! merging the stats of two disjoint file sets must equal the stats of
//! checking their union, regardless of merge order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::msgs::Category;

/// Message counts broken down by category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    /// Info messages
    pub info: u64,
    /// Convention messages
    pub convention: u64,
    /// Refactor messages
    pub refactor: u64,
    /// Warning messages
    pub warning: u64,
    /// Error messages
    pub error: u64,
    /// Fatal messages
    pub fatal: u64,
}

impl CategoryCounts {
    /// Bump the counter for one category.
    pub fn record(&mut self, category: Category) {
        match category {
            Category::Info => self.info += 1,
            Category::Convention => self.convention += 1,
            Category::Refactor => self.refactor += 1,
            Category::Warning => self.warning += 1,
            Category::Error => self.error += 1,
            Category::Fatal => self.fatal += 1,
        }
    }

    /// Element-wise sum.
    pub fn merge(&mut self, other: &CategoryCounts) {
        self.info += other.info;
        self.convention += other.convention;
        self.refactor += other.refactor;
        self.warning += other.warning;
        self.error += other.error;
        self.fatal += other.fatal;
    }

    /// Total messages across all categories.
    pub fn total(&self) -> u64 {
        self.info + self.convention + self.refactor + self.warning + self.error + self.fatal
    }
}

/// Statistics accumulated over one run (or one fragment of a run).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    /// Number of modules checked
    pub modules_checked: u64,
    /// Counts by category across the whole run
    pub by_category: CategoryCounts,
    /// Counts by message symbol
    pub by_msg: IndexMap<String, u64>,
    /// Per-module category breakdown
    pub by_module: IndexMap<String, CategoryCounts>,
}

impl RunStats {
    /// Create empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one emitted message.
    pub fn record(&mut self, category: Category, symbol: &str, module: &str) {
        self.by_category.record(category);
        *self.by_msg.entry(symbol.to_string()).or_default() += 1;
        self.by_module
            .entry(module.to_string())
            .or_default()
            .record(category);
    }

    /// Note that one more module was checked.
    pub fn module_checked(&mut self, module: &str) {
        self.modules_checked += 1;
        self.by_module.entry(module.to_string()).or_default();
    }

    /// Merge another fragment into this one.
    ///
    /// Associative and commutative for disjoint module sets: map entries sum
    /// key-wise and map equality ignores insertion order.
    pub fn merge(&mut self, other: &RunStats) {
        self.modules_checked += other.modules_checked;
        self.by_category.merge(&other.by_category);
        for (symbol, count) in &other.by_msg {
            *self.by_msg.entry(symbol.clone()).or_default() += count;
        }
        for (module, counts) in &other.by_module {
            self.by_module
                .entry(module.clone())
                .or_default()
                .merge(counts);
        }
    }

    /// Total messages across all categories.
    pub fn total_messages(&self) -> u64 {
        self.by_category.total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(entries: &[(Category, &str, &str)]) -> RunStats {
        let mut s = RunStats::new();
        for (cat, symbol, module) in entries {
            s.record(*cat, symbol, module);
        }
        s
    }

    #[test]
    fn merge_is_commutative() {
        let a = stats(&[
            (Category::Warning, "unused-thing", "mod_a"),
            (Category::Convention, "line-too-long", "mod_a"),
        ]);
        let b = stats(&[
            (Category::Warning, "unused-thing", "mod_b"),
            (Category::Error, "bad-call", "mod_b"),
        ]);

        let mut ab = a.clone();
        ab.merge(&b);
        let mut ba = b.clone();
        ba.merge(&a);

        assert_eq!(ab, ba);
        assert_eq!(ab.by_msg["unused-thing"], 2);
        assert_eq!(ab.total_messages(), 4);
    }

    #[test]
    fn merge_equals_union_for_disjoint_sets() {
        let a = stats(&[(Category::Refactor, "duplicate-lines", "mod_a")]);
        let b = stats(&[(Category::Refactor, "duplicate-lines", "mod_b")]);
        let union = stats(&[
            (Category::Refactor, "duplicate-lines", "mod_a"),
            (Category::Refactor, "duplicate-lines", "mod_b"),
        ]);

        let mut merged = a;
        merged.merge(&b);
        assert_eq!(merged, union);
    }
}
