// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Provider ports.
//!
//! The DNS, firewall, and external-IP providers are distinct capability
//! interfaces with small surfaces; cloud implementations map them onto their
//! SDKs, and the in-memory pair in [`inmemory`] backs tests and the
//! `--provider=inmemory` mode. Registries decorate these ports with
//! ownership and lifecycle semantics without leaking into the plan engines.

pub mod extip;
pub mod inmemory;

pub use extip::ClusterExtIpProvider;
pub use inmemory::{InMemoryDnsProvider, InMemoryFirewallProvider};

use anyhow::Result;
use async_trait::async_trait;

use crate::endpoint::DnsEndpoint;
use crate::extip::ServiceExtIp;
use crate::inbound::InboundRuleSet;
use crate::plan::{DnsChanges, ExtIpChanges, FirewallChanges};

/// A DNS zone backend.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Fetch all records the provider currently serves.
    async fn records(&self) -> Result<Vec<DnsEndpoint>>;

    /// Apply a computed change-set.
    async fn apply_changes(&self, changes: &DnsChanges) -> Result<()>;
}

/// A cloud firewall backend managing named ingress rule-sets and their
/// per-instance bindings.
///
/// `apply_changes` implementations must honor the ordering contract from
/// [`crate::plan::firewall`]: create, update, set, unset, delete.
#[async_trait]
pub trait FirewallProvider: Send + Sync {
    async fn rules(&self) -> Result<Vec<InboundRuleSet>>;

    async fn apply_changes(&self, changes: &FirewallChanges) -> Result<()>;

    /// The cluster identifier derived from the provider's view of the node
    /// set (e.g. the `KubernetesCluster` instance tag on AWS). Consumed by
    /// the source aggregator for rule-set naming.
    async fn cluster_name(&self) -> Result<String>;
}

/// The cluster-side backend for `spec.externalIPs` updates.
#[async_trait]
pub trait ExtIpProvider: Send + Sync {
    async fn ext_ips(&self) -> Result<Vec<ServiceExtIp>>;

    async fn apply_changes(&self, changes: &ExtIpChanges) -> Result<()>;
}

// Shared handles are providers too; registries take ownership of their
// provider, so callers that also need to read provider state pass an Arc.
#[async_trait]
impl<T: DnsProvider + ?Sized> DnsProvider for std::sync::Arc<T> {
    async fn records(&self) -> Result<Vec<DnsEndpoint>> {
        (**self).records().await
    }

    async fn apply_changes(&self, changes: &DnsChanges) -> Result<()> {
        (**self).apply_changes(changes).await
    }
}

#[async_trait]
impl<T: FirewallProvider + ?Sized> FirewallProvider for std::sync::Arc<T> {
    async fn rules(&self) -> Result<Vec<InboundRuleSet>> {
        (**self).rules().await
    }

    async fn apply_changes(&self, changes: &FirewallChanges) -> Result<()> {
        (**self).apply_changes(changes).await
    }

    async fn cluster_name(&self) -> Result<String> {
        (**self).cluster_name().await
    }
}

#[async_trait]
impl<T: ExtIpProvider + ?Sized> ExtIpProvider for std::sync::Arc<T> {
    async fn ext_ips(&self) -> Result<Vec<ServiceExtIp>> {
        (**self).ext_ips().await
    }

    async fn apply_changes(&self, changes: &ExtIpChanges) -> Result<()> {
        (**self).apply_changes(changes).await
    }
}

/// Restricts which DNS names a provider manages, by domain suffix.
///
/// An empty filter matches every domain.
#[derive(Debug, Clone, Default)]
pub struct DomainFilter {
    filters: Vec<String>,
}

impl DomainFilter {
    #[must_use]
    pub fn new(filters: Vec<String>) -> Self {
        Self {
            filters: filters
                .into_iter()
                .map(|f| f.trim().trim_end_matches('.').to_lowercase())
                .filter(|f| !f.is_empty())
                .collect(),
        }
    }

    #[must_use]
    pub fn matches(&self, domain: &str) -> bool {
        if self.filters.is_empty() {
            return true;
        }
        let domain = domain.trim_end_matches('.').to_lowercase();
        self.filters
            .iter()
            .any(|f| domain == *f || domain.ends_with(&format!(".{f}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_domain_filter_matches_everything() {
        let filter = DomainFilter::new(vec![]);
        assert!(filter.matches("foo.example.org"));
        assert!(filter.matches(""));
    }

    #[test]
    fn test_domain_filter_matches_suffix() {
        let filter = DomainFilter::new(vec!["example.org".to_owned()]);
        assert!(filter.matches("example.org"));
        assert!(filter.matches("foo.example.org"));
        assert!(filter.matches("foo.EXAMPLE.org."));
        assert!(!filter.matches("example.com"));
        assert!(!filter.matches("notexample.org"));
    }

    #[test]
    fn test_domain_filter_normalizes_input() {
        let filter = DomainFilter::new(vec![" Example.ORG. ".to_owned()]);
        assert!(filter.matches("foo.example.org"));
    }
}
