//! Diff computation between two synthesized templates

use crate::synth::Template;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// How a resource changed between two templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Only in the new template
    Added,
    /// Only in the old template
    Removed,
    /// Same type, different properties or policies
    Modified,
    /// Same logical id, different resource type
    Replaced,
}

/// A diff for a single logical id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDiff {
    /// Logical id of the resource
    pub logical_id: String,
    /// Type in the new template (or the old one, for removals)
    pub resource_type: String,
    /// Kind of change
    pub change: ChangeKind,
    /// Top-level properties whose values differ
    pub changed_properties: Vec<String>,
}

impl ResourceDiff {
    pub fn is_addition(&self) -> bool {
        self.change == ChangeKind::Added
    }

    pub fn is_removal(&self) -> bool {
        self.change == ChangeKind::Removed
    }

    pub fn is_modification(&self) -> bool {
        matches!(self.change, ChangeKind::Modified | ChangeKind::Replaced)
    }
}

/// Compute per-resource diffs from `old` to `new`
///
/// Returns only resources that differ, ordered by logical id.
pub fn compute_diffs(old: &Template, new: &Template) -> Vec<ResourceDiff> {
    let ids: BTreeSet<&String> = old.resources.keys().chain(new.resources.keys()).collect();

    ids.into_iter()
        .filter_map(|id| {
            match (old.resources.get(id), new.resources.get(id)) {
                (None, Some(n)) => Some(ResourceDiff {
                    logical_id: id.clone(),
                    resource_type: n.resource_type.clone(),
                    change: ChangeKind::Added,
                    changed_properties: Vec::new(),
                }),
                (Some(o), None) => Some(ResourceDiff {
                    logical_id: id.clone(),
                    resource_type: o.resource_type.clone(),
                    change: ChangeKind::Removed,
                    changed_properties: Vec::new(),
                }),
                (Some(o), Some(n)) if o.resource_type != n.resource_type => Some(ResourceDiff {
                    logical_id: id.clone(),
                    resource_type: n.resource_type.clone(),
                    change: ChangeKind::Replaced,
                    changed_properties: Vec::new(),
                }),
                (Some(o), Some(n)) if o != n => {
                    let mut changed = changed_keys(&o.properties, &n.properties);
                    if o.depends_on != n.depends_on {
                        changed.push("DependsOn".to_string());
                    }
                    if o.deletion_policy != n.deletion_policy {
                        changed.push("DeletionPolicy".to_string());
                    }
                    Some(ResourceDiff {
                        logical_id: id.clone(),
                        resource_type: n.resource_type.clone(),
                        change: ChangeKind::Modified,
                        changed_properties: changed,
                    })
                }
                _ => None,
            }
        })
        .collect()
}

fn changed_keys(old: &serde_json::Value, new: &serde_json::Value) -> Vec<String> {
    let empty = serde_json::Map::new();
    let old = old.as_object().unwrap_or(&empty);
    let new = new.as_object().unwrap_or(&empty);
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    keys.into_iter()
        .filter(|k| old.get(*k) != new.get(*k))
        .cloned()
        .collect()
}

/// Diff summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    /// Number of resources to add
    pub additions: usize,
    /// Number of resources to remove
    pub removals: usize,
    /// Number of resources to modify or replace
    pub modifications: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs(diffs: &[ResourceDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            if diff.is_addition() {
                summary.additions += 1;
            } else if diff.is_removal() {
                summary.removals += 1;
            } else {
                summary.modifications += 1;
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group diffs by resource type
pub fn group_by_type(diffs: &[ResourceDiff]) -> HashMap<String, Vec<&ResourceDiff>> {
    let mut groups: HashMap<String, Vec<&ResourceDiff>> = HashMap::new();
    for diff in diffs {
        groups
            .entry(diff.resource_type.clone())
            .or_default()
            .push(diff);
    }
    groups
}
