//! Repeat registry: instance counts and bounds for every repeat group.
//!
//! Entries (definitions) are re-registered on every build. Counts are kept
//! across builds so that add/remove survives a step switch within one template.

use std::collections::{BTreeMap, HashMap};

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::parse::types::RepeatSpec;

use super::types::GroupKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatEntry {
    pub key: String,
    pub owner: GroupKind,
    /// Naming prefix shared by every instance identifier, e.g. `contacts_`.
    pub prefix: String,
    /// Raw ids of the fields each instance carries (nested plain groups included).
    pub field_ids: Vec<String>,
    pub min: u32,
    pub max: u32,
    pub default_count: u32,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatBounds {
    pub min: u32,
    pub max: u32,
    pub default_count: u32,
}

impl RepeatBounds {
    /// Bounds of a repeat spec. Missing bounds fall back to `0..=fallback_max`
    /// with the default count at `min`.
    pub fn from_spec(spec: &RepeatSpec, fallback_max: u32) -> Self {
        let min = spec.min.unwrap_or(0);
        let max = spec.max.unwrap_or(fallback_max).max(min);
        let default_count = spec.default_count.unwrap_or(min).clamp(min, max);
        RepeatBounds {
            min,
            max,
            default_count,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RepeatRegistry {
    entries: BTreeMap<String, RepeatEntry>,
    counts: HashMap<String, u32>,
}

impl RepeatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop entry definitions ahead of a rebuild. Counts survive.
    pub fn clear_entries(&mut self) {
        self.entries.clear();
    }

    /// Forget everything, counts included. Used on template switch.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.counts.clear();
    }

    pub fn register(&mut self, entry: RepeatEntry) {
        self.entries.insert(entry.key.clone(), entry);
    }

    pub fn entry(&self, key: &str) -> Option<&RepeatEntry> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> impl Iterator<Item = &RepeatEntry> {
        self.entries.values()
    }

    pub fn count(&self, key: &str) -> Option<u32> {
        self.counts.get(key).copied()
    }

    /// Instance count for a group being built: the recorded count if any,
    /// otherwise inferred from persisted keys, at least the default, always
    /// clamped to the bounds. The result is recorded.
    pub fn resolve_count(&mut self, entry: &RepeatEntry, persisted: &Map<String, Value>) -> u32 {
        let count = match self.counts.get(&entry.key) {
            Some(&recorded) => recorded,
            None => infer_instance_count(&entry.prefix, persisted.keys()).max(entry.default_count),
        };
        let count = count.clamp(entry.min, entry.max);
        self.counts.insert(entry.key.clone(), count);
        count
    }

    pub fn can_add(&self, key: &str) -> bool {
        match (self.entries.get(key), self.counts.get(key)) {
            (Some(entry), Some(&count)) => count < entry.max,
            _ => false,
        }
    }

    /// Increment the count. Returns `false` when the group is unknown or full.
    pub fn add(&mut self, key: &str) -> bool {
        if !self.can_add(key) {
            return false;
        }
        if let Some(count) = self.counts.get_mut(key) {
            *count += 1;
        }
        true
    }

    pub fn can_remove(&self, key: &str, index: u32) -> bool {
        match (self.entries.get(key), self.counts.get(key)) {
            (Some(entry), Some(&count)) => count > entry.min && (1..=count).contains(&index),
            _ => false,
        }
    }

    /// Remove instance `index` (1-based): shift every nested repeat count
    /// above `index` down by one and decrement the count. The returned
    /// [`RemovedInstance`] re-keys value maps the same way.
    ///
    /// `None` when the group is unknown or the removal is out of bounds.
    pub fn remove(&mut self, key: &str, index: u32) -> Option<RemovedInstance> {
        if !self.can_remove(key, index) {
            return None;
        }
        let removed = RemovedInstance {
            prefix: self.entries.get(key)?.prefix.clone(),
            index,
            count: self.counts.get(key).copied()?,
        };
        removed.shift(&mut self.counts);
        if let Some(c) = self.counts.get_mut(key) {
            *c -= 1;
        }
        Some(removed)
    }
}

/// One removed repeat instance: slot `index` of `count` under `prefix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedInstance {
    pub prefix: String,
    pub index: u32,
    pub count: u32,
}

impl RemovedInstance {
    /// Re-key a map of instance-scoped identifiers: the removed slot is
    /// dropped (nested instances included), every later slot moves down one.
    pub fn shift<M, V>(&self, map: &mut M)
    where
        M: Default + IntoIterator<Item = (String, V)> + FromIterator<(String, V)>,
    {
        *map = std::mem::take(map)
            .into_iter()
            .filter_map(|(key, value)| match self.slot_of(&key) {
                Some((n, _)) if n == self.index => None,
                Some((n, rest)) if n > self.index && n <= self.count => {
                    Some((format!("{}{}_{rest}", self.prefix, n - 1), value))
                }
                _ => Some((key, value)),
            })
            .collect();
    }

    /// Instance index and remainder of a key shaped `prefix + N + "_" + rest`.
    fn slot_of<'k>(&self, key: &'k str) -> Option<(u32, &'k str)> {
        let tail = key.strip_prefix(self.prefix.as_str())?;
        let (digits, rest) = tail.split_once('_')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some((digits.parse().ok()?, rest))
    }
}

/// Highest instance index among keys shaped `prefix + N + "_" ...`.
pub fn infer_instance_count<'a>(prefix: &str, keys: impl Iterator<Item = &'a String>) -> u32 {
    let Ok(pattern) = Regex::new(&format!("^{}(\\d+)_", regex::escape(prefix))) else {
        return 0;
    };
    keys.filter_map(|key| pattern.captures(key))
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
        .max()
        .unwrap_or(0)
}
