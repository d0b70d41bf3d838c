// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Firewall plan engine.
//!
//! Runs two diffs in one pass: rule-sets keyed by name, and instance
//! bindings keyed by `(provider id, rule-set name)`. Every provider ID
//! attached to a rule-set on either side contributes one binding row.
//!
//! Providers must apply the resulting change-set in this order: create
//! rule-sets, update rule-sets, bind new instances (`set`), unbind removed
//! instances (`unset`), delete rule-sets. That ordering guarantees no
//! instance is ever bound to a deleted rule-set and no new binding targets a
//! rule-set that does not exist yet.

use std::collections::BTreeMap;
use std::fmt;

use crate::inbound::InboundRuleSet;

/// The fact "this node has this rule-set attached".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct InstanceBinding {
    pub provider_id: String,
    pub rule_set_name: String,
}

impl InstanceBinding {
    #[must_use]
    pub fn new(provider_id: impl Into<String>, rule_set_name: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            rule_set_name: rule_set_name.into(),
        }
    }
}

impl fmt::Display for InstanceBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.provider_id, self.rule_set_name)
    }
}

/// The actions needed to move the firewall towards desired state.
#[derive(Debug, Clone, Default)]
pub struct FirewallChanges {
    /// Rule-sets that need to be created.
    pub create: Vec<InboundRuleSet>,
    /// Rule-sets that need to be updated (current data).
    pub update_old: Vec<InboundRuleSet>,
    /// Rule-sets that need to be updated (desired data).
    pub update_new: Vec<InboundRuleSet>,
    /// Rule-sets that need to be deleted.
    pub delete: Vec<InboundRuleSet>,
    /// Instance bindings to establish.
    pub set: Vec<InstanceBinding>,
    /// Instance bindings to remove.
    pub unset: Vec<InstanceBinding>,
}

impl FirewallChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.create.is_empty()
            && self.update_old.is_empty()
            && self.update_new.is_empty()
            && self.delete.is_empty()
            && self.set.is_empty()
            && self.unset.is_empty()
    }
}

/// A desired/current diff over firewall rule-sets and their bindings.
pub struct FirewallPlan {
    pub current: Vec<InboundRuleSet>,
    pub desired: Vec<InboundRuleSet>,
}

#[derive(Default)]
struct RuleSetRow {
    current: Option<InboundRuleSet>,
    candidate: Option<InboundRuleSet>,
}

#[derive(Default)]
struct BindingRow {
    current: Option<InstanceBinding>,
    candidate: Option<InstanceBinding>,
}

impl FirewallPlan {
    /// Compute the rule-set and binding actions needed to move current state
    /// towards desired state.
    #[must_use]
    pub fn calculate(&self) -> FirewallChanges {
        let mut rule_rows: BTreeMap<String, RuleSetRow> = BTreeMap::new();
        let mut binding_rows: BTreeMap<(String, String), BindingRow> = BTreeMap::new();

        for current in &self.current {
            rule_rows.entry(current.name.clone()).or_default().current = Some(current.clone());
            for id in &current.provider_ids {
                let binding = InstanceBinding::new(id.clone(), current.name.clone());
                binding_rows
                    .entry((id.clone(), current.name.clone()))
                    .or_default()
                    .current = Some(binding);
            }
        }
        for desired in &self.desired {
            rule_rows.entry(desired.name.clone()).or_default().candidate = Some(desired.clone());
            for id in &desired.provider_ids {
                let binding = InstanceBinding::new(id.clone(), desired.name.clone());
                binding_rows
                    .entry((id.clone(), desired.name.clone()))
                    .or_default()
                    .candidate = Some(binding);
            }
        }

        let mut changes = FirewallChanges::default();
        for row in rule_rows.values() {
            match (&row.current, &row.candidate) {
                (None, Some(candidate)) => changes.create.push(candidate.clone()),
                (Some(current), None) => changes.delete.push(current.clone()),
                (Some(current), Some(candidate)) => {
                    if !current.same_rules(candidate) {
                        changes.update_old.push(current.clone());
                        changes.update_new.push(candidate.clone());
                    }
                }
                (None, None) => {}
            }
        }
        for row in binding_rows.values() {
            match (&row.current, &row.candidate) {
                (None, Some(candidate)) => changes.set.push(candidate.clone()),
                (Some(current), None) => changes.unset.push(current.clone()),
                // Binding already in place.
                _ => {}
            }
        }

        changes
    }
}

#[cfg(test)]
#[path = "firewall_tests.rs"]
mod firewall_tests;
