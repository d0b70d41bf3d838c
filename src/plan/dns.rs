// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS record plan engine.
//!
//! Converts a list of desired and current records into the create, update,
//! and delete actions a DNS provider must execute. Rows are keyed by the
//! sanitized DNS name:
//!
//! ```text
//! name    | current       | candidates                 |
//! --------------------------------------------------------
//! foo.com | -> 1.1.1.1    | [->1.1.1.1, ->elb.com]     |  = resolver decides
//! bar.com |               | [->191.1.1.1, ->190.1.1.1] |  = create
//! ```
//!
//! Multiple candidates for one name are collapsed by the per-resource
//! conflict resolver before any action is emitted.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::endpoint::{DnsEndpoint, OWNER_LABEL_KEY};

/// Policy applied to a computed change-set before it is handed to a
/// registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlanPolicy {
    /// Allow full synchronization including deletes.
    #[default]
    Sync,
    /// Allow creates and updates but never delete records.
    UpsertOnly,
}

impl PlanPolicy {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::UpsertOnly => "upsert-only",
        }
    }

    /// Apply the policy to a change-set.
    #[must_use]
    pub fn apply(&self, changes: DnsChanges) -> DnsChanges {
        match self {
            Self::Sync => changes,
            Self::UpsertOnly => DnsChanges {
                delete: Vec::new(),
                ..changes
            },
        }
    }
}

impl FromStr for PlanPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sync" => Ok(Self::Sync),
            "upsert-only" => Ok(Self::UpsertOnly),
            other => Err(format!("unknown policy: {other}")),
        }
    }
}

impl fmt::Display for PlanPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The actions needed to move the zone towards desired state.
#[derive(Debug, Clone, Default)]
pub struct DnsChanges {
    /// Records that need to be created.
    pub create: Vec<DnsEndpoint>,
    /// Records that need to be updated (current data).
    pub update_old: Vec<DnsEndpoint>,
    /// Records that need to be updated (desired data).
    pub update_new: Vec<DnsEndpoint>,
    /// Records that need to be deleted.
    pub delete: Vec<DnsEndpoint>,
}

impl DnsChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.create.is_empty()
            && self.update_old.is_empty()
            && self.update_new.is_empty()
            && self.delete.is_empty()
    }
}

/// A desired/current diff over DNS records.
pub struct DnsPlan {
    pub current: Vec<DnsEndpoint>,
    pub desired: Vec<DnsEndpoint>,
    pub policy: PlanPolicy,
}

#[derive(Default)]
struct PlanRow {
    current: Option<DnsEndpoint>,
    candidates: Vec<DnsEndpoint>,
}

impl DnsPlan {
    /// Compute the actions needed to move current state towards desired
    /// state, then filter them through the configured policy.
    #[must_use]
    pub fn calculate(&self) -> DnsChanges {
        let mut rows: BTreeMap<String, PlanRow> = BTreeMap::new();

        for current in &self.current {
            rows.entry(sanitize_dns_name(&current.dns_name))
                .or_default()
                .current = Some(current.clone());
        }
        for desired in &self.desired {
            rows.entry(sanitize_dns_name(&desired.dns_name))
                .or_default()
                .candidates
                .push(desired.clone());
        }

        let mut changes = DnsChanges::default();
        for row in rows.values() {
            match (&row.current, row.candidates.as_slice()) {
                // name not taken
                (None, candidates) if !candidates.is_empty() => {
                    changes.create.push(resolve_create(candidates));
                }
                (Some(current), []) => changes.delete.push(current.clone()),
                // name is taken
                (Some(current), candidates) => {
                    let mut update = resolve_update(current, candidates);
                    if should_update_ttl(&update, current) || target_changed(&update, current) {
                        inherit_owner(current, &mut update);
                        changes.update_new.push(update);
                        changes.update_old.push(current.clone());
                    }
                }
                (None, _) => {}
            }
        }

        self.policy.apply(changes)
    }
}

/// Per-resource conflict resolution for a name with no current record: among
/// the candidates carrying the lowest `resource` label, pick the one with the
/// lexicographically smallest first target.
fn resolve_create(candidates: &[DnsEndpoint]) -> DnsEndpoint {
    let min_resource = candidates
        .iter()
        .map(|c| c.labels.resource())
        .min()
        .unwrap_or_default()
        .to_owned();
    candidates
        .iter()
        .filter(|c| c.labels.resource() == min_resource)
        .min_by(|a, b| a.targets.first().cmp(&b.targets.first()))
        .cloned()
        .unwrap_or_default()
}

/// Per-resource conflict resolution for a taken name: prefer candidates from
/// the same source object as the current record (stability under churn), fall
/// back to the creation rule otherwise.
fn resolve_update(current: &DnsEndpoint, candidates: &[DnsEndpoint]) -> DnsEndpoint {
    let current_resource = current.labels.resource();
    let matching: Vec<&DnsEndpoint> = candidates
        .iter()
        .filter(|c| c.labels.resource() == current_resource)
        .collect();
    if matching.is_empty() {
        return resolve_create(candidates);
    }
    matching
        .into_iter()
        .min_by(|a, b| a.targets.first().cmp(&b.targets.first()))
        .cloned()
        .unwrap_or_default()
}

/// Ownership is preserved across target changes: the update inherits the
/// current record's `owner` label.
fn inherit_owner(from: &DnsEndpoint, to: &mut DnsEndpoint) {
    to.labels.insert(OWNER_LABEL_KEY, from.labels.owner());
}

fn target_changed(desired: &DnsEndpoint, current: &DnsEndpoint) -> bool {
    !desired.targets.same(&current.targets)
}

/// A TTL difference only matters when the desired record configures one.
fn should_update_ttl(desired: &DnsEndpoint, current: &DnsEndpoint) -> bool {
    match desired.record_ttl {
        Some(ttl) => current.record_ttl != Some(ttl),
        None => false,
    }
}

/// Normalize a DNS name for keying: trim surrounding whitespace, lower-case.
fn sanitize_dns_name(dns_name: &str) -> String {
    dns_name.trim().to_lowercase()
}

#[cfg(test)]
#[path = "dns_tests.rs"]
mod dns_tests;
