// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory DNS and firewall providers.
//!
//! These back `--provider=inmemory` and the integration tests. They enforce
//! the same apply contracts a cloud implementation would: creates fail on
//! existing records, updates and deletes fail on missing ones, and firewall
//! changes are applied in the create, update, set, unset, delete order.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use super::{DnsProvider, DomainFilter, FirewallProvider};
use crate::endpoint::DnsEndpoint;
use crate::inbound::InboundRuleSet;
use crate::plan::{DnsChanges, FirewallChanges};

/// Faults raised by the in-memory providers when an apply violates the
/// provider contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InMemoryError {
    #[error("record already exists: {0}")]
    RecordAlreadyExists(String),

    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("rule-set already exists: {0}")]
    RuleSetAlreadyExists(String),

    #[error("rule-set not found: {0}")]
    RuleSetNotFound(String),
}

/// A DNS provider that stores records in process memory.
#[derive(Default)]
pub struct InMemoryDnsProvider {
    filter: DomainFilter,
    store: Mutex<Vec<DnsEndpoint>>,
}

impl InMemoryDnsProvider {
    #[must_use]
    pub fn new(filter: DomainFilter) -> Self {
        Self {
            filter,
            store: Mutex::new(Vec::new()),
        }
    }

    /// Seed the store, bypassing the apply contract.
    #[must_use]
    pub fn with_records(self, records: Vec<DnsEndpoint>) -> Self {
        {
            let mut store = self.store.lock().expect("in-memory dns store poisoned");
            *store = records;
        }
        self
    }

    fn position(store: &[DnsEndpoint], endpoint: &DnsEndpoint) -> Option<usize> {
        store.iter().position(|e| {
            e.dns_name == endpoint.dns_name && e.record_type == endpoint.record_type
        })
    }
}

#[async_trait]
impl DnsProvider for InMemoryDnsProvider {
    async fn records(&self) -> Result<Vec<DnsEndpoint>> {
        let store = self.store.lock().expect("in-memory dns store poisoned");
        Ok(store
            .iter()
            .filter(|e| self.filter.matches(&e.dns_name))
            .cloned()
            .collect())
    }

    async fn apply_changes(&self, changes: &DnsChanges) -> Result<()> {
        let mut store = self.store.lock().expect("in-memory dns store poisoned");

        for endpoint in &changes.create {
            if Self::position(&store, endpoint).is_some() {
                return Err(InMemoryError::RecordAlreadyExists(endpoint.to_string()).into());
            }
            debug!(record = %endpoint, "CREATE");
            store.push(endpoint.clone());
        }
        for (old, new) in changes.update_old.iter().zip(&changes.update_new) {
            let Some(idx) = Self::position(&store, old) else {
                return Err(InMemoryError::RecordNotFound(old.to_string()).into());
            };
            debug!(old = %old, new = %new, "UPDATE");
            store[idx] = new.clone();
        }
        for endpoint in &changes.delete {
            let Some(idx) = Self::position(&store, endpoint) else {
                return Err(InMemoryError::RecordNotFound(endpoint.to_string()).into());
            };
            debug!(record = %endpoint, "DELETE");
            store.remove(idx);
        }

        Ok(())
    }
}

/// A firewall provider that stores rule-sets in process memory.
pub struct InMemoryFirewallProvider {
    cluster_name: String,
    store: Mutex<Vec<InboundRuleSet>>,
}

impl InMemoryFirewallProvider {
    #[must_use]
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            store: Mutex::new(Vec::new()),
        }
    }

    /// Seed the store, bypassing the apply contract.
    #[must_use]
    pub fn with_rule_sets(self, rule_sets: Vec<InboundRuleSet>) -> Self {
        {
            let mut store = self.store.lock().expect("in-memory firewall store poisoned");
            *store = rule_sets;
        }
        self
    }
}

#[async_trait]
impl FirewallProvider for InMemoryFirewallProvider {
    async fn rules(&self) -> Result<Vec<InboundRuleSet>> {
        let store = self.store.lock().expect("in-memory firewall store poisoned");
        Ok(store.clone())
    }

    async fn apply_changes(&self, changes: &FirewallChanges) -> Result<()> {
        let mut store = self.store.lock().expect("in-memory firewall store poisoned");

        // Create new rule-sets without bindings; the set phase attaches them.
        for rule_set in &changes.create {
            if store.iter().any(|r| r.name == rule_set.name) {
                return Err(InMemoryError::RuleSetAlreadyExists(rule_set.name.clone()).into());
            }
            debug!(rule_set = %rule_set, "CREATE");
            store.push(InboundRuleSet {
                provider_ids: Vec::new(),
                ..rule_set.clone()
            });
        }
        for rule_set in &changes.update_new {
            let Some(existing) = store.iter_mut().find(|r| r.name == rule_set.name) else {
                return Err(InMemoryError::RuleSetNotFound(rule_set.name.clone()).into());
            };
            debug!(rule_set = %rule_set, "UPDATE");
            existing.rules = rule_set.rules.clone();
        }
        for binding in &changes.set {
            let Some(existing) = store.iter_mut().find(|r| r.name == binding.rule_set_name)
            else {
                return Err(InMemoryError::RuleSetNotFound(binding.rule_set_name.clone()).into());
            };
            debug!(binding = %binding, "SET");
            if !existing.provider_ids.contains(&binding.provider_id) {
                existing.provider_ids.push(binding.provider_id.clone());
            }
        }
        for binding in &changes.unset {
            let Some(existing) = store.iter_mut().find(|r| r.name == binding.rule_set_name)
            else {
                return Err(InMemoryError::RuleSetNotFound(binding.rule_set_name.clone()).into());
            };
            debug!(binding = %binding, "UNSET");
            existing.provider_ids.retain(|id| id != &binding.provider_id);
        }
        for rule_set in &changes.delete {
            let Some(idx) = store.iter().position(|r| r.name == rule_set.name) else {
                return Err(InMemoryError::RuleSetNotFound(rule_set.name.clone()).into());
            };
            debug!(rule_set = %rule_set, "DELETE");
            store.remove(idx);
        }

        Ok(())
    }

    async fn cluster_name(&self) -> Result<String> {
        Ok(self.cluster_name.clone())
    }
}
