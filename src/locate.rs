//! Title lookup over [`Metric`] trees.
//!
//! Titles are not guaranteed unique in store data. Lookups are pre-order and
//! first-match-wins: a node is checked before its children, and an earlier
//! sibling's subtree before a later sibling. Two labs sharing a title will
//! therefore both resolve to the same node.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::model::Metric;

/// Find the first node titled `title` in `root`'s subtree, `root` included.
pub fn find<'a>(title: &str, root: &'a Metric) -> Option<&'a Metric> {
    if root.title.as_deref() == Some(title) {
        return Some(root);
    }
    find_in(title, &root.metrics)
}

/// Find the first node titled `title` across a sequence of subtrees.
pub fn find_in<'a>(title: &str, metrics: &'a [Metric]) -> Option<&'a Metric> {
    metrics.iter().find_map(|metric| find(title, metric))
}

/// Title index with the same answers as [`find_in`].
///
/// Built in one pre-order pass, keeping only the first node seen for each
/// title. Use it when many titles are looked up in the same tree.
#[derive(Debug)]
pub struct TitleIndex<'a> {
    by_title: HashMap<&'a str, &'a Metric>,
}

impl<'a> TitleIndex<'a> {
    pub fn over(metrics: &'a [Metric]) -> Self {
        let mut by_title = HashMap::new();
        let mut stack: Vec<&'a Metric> = metrics.iter().rev().collect();

        while let Some(metric) = stack.pop() {
            if let Some(title) = metric.title.as_deref() {
                if let Entry::Vacant(slot) = by_title.entry(title) {
                    slot.insert(metric);
                }
            }
            stack.extend(metric.metrics.iter().rev());
        }

        Self { by_title }
    }

    pub fn get(&self, title: &str) -> Option<&'a Metric> {
        self.by_title.get(title).copied()
    }

    pub fn len(&self) -> usize {
        self.by_title.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_title.is_empty()
    }
}
