// src/services/metadata.rs

//! Reverse lookup from designators and full names to resource indices.

use std::collections::{BTreeSet, HashMap};

type Buckets = HashMap<String, BTreeSet<i64>>;

/// Designator and full-name lookup tables for one resource class.
///
/// Values map to sets because the upstream site can briefly list the same
/// designator under several indices.
#[derive(Debug, Default, Clone)]
pub struct DesignatorIndex {
    designators: Buckets,
    full_names: Buckets,
}

impl DesignatorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current names of `index`, dropping any previous ones.
    pub fn update(&mut self, designator: &str, full_name: &str, index: i64) {
        self.evict(index);
        if !designator.is_empty() {
            self.designators
                .entry(designator.to_string())
                .or_default()
                .insert(index);
        }
        if !full_name.is_empty() {
            self.full_names
                .entry(full_name.to_string())
                .or_default()
                .insert(index);
        }
    }

    /// Remove `index` from every bucket, deleting buckets left empty.
    pub fn evict(&mut self, index: i64) {
        remove_index(&mut self.designators, index);
        remove_index(&mut self.full_names, index);
    }

    pub fn designator_indexes(&self, designator: &str) -> Option<&BTreeSet<i64>> {
        self.designators.get(designator)
    }

    pub fn full_name_indexes(&self, full_name: &str) -> Option<&BTreeSet<i64>> {
        self.full_names.get(full_name)
    }

    /// Copy of the designator table.
    pub fn designators(&self) -> HashMap<String, Vec<i64>> {
        snapshot(&self.designators)
    }

    /// Copy of the full-name table.
    pub fn full_names(&self) -> HashMap<String, Vec<i64>> {
        snapshot(&self.full_names)
    }

    pub fn is_empty(&self) -> bool {
        self.designators.is_empty() && self.full_names.is_empty()
    }
}

fn remove_index(buckets: &mut Buckets, index: i64) {
    buckets.retain(|_, indexes| {
        indexes.remove(&index);
        !indexes.is_empty()
    });
}

fn snapshot(buckets: &Buckets) -> HashMap<String, Vec<i64>> {
    buckets
        .iter()
        .map(|(name, indexes)| (name.clone(), indexes.iter().copied().collect()))
        .collect()
}
