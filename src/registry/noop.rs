// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pass-through DNS registry without ownership semantics.

use anyhow::Result;
use async_trait::async_trait;

use super::DnsRegistry;
use crate::endpoint::DnsEndpoint;
use crate::plan::DnsChanges;
use crate::provider::DnsProvider;

/// A [`DnsRegistry`] that forwards reads and writes unchanged. Suitable when
/// a single controller instance exclusively manages the zone.
pub struct NoopRegistry {
    provider: Box<dyn DnsProvider>,
}

impl NoopRegistry {
    #[must_use]
    pub fn new(provider: Box<dyn DnsProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl DnsRegistry for NoopRegistry {
    async fn records(&self) -> Result<Vec<DnsEndpoint>> {
        self.provider.records().await
    }

    async fn apply_changes(&self, changes: &DnsChanges) -> Result<()> {
        self.provider.apply_changes(changes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{RecordType, Targets};
    use crate::provider::{DomainFilter, InMemoryDnsProvider};

    #[tokio::test]
    async fn test_noop_forwards_records_and_changes() {
        let seeded = DnsEndpoint::new(
            "foo.example.org",
            RecordType::A,
            Targets::from(vec!["1.2.3.4"]),
        );
        let provider =
            InMemoryDnsProvider::new(DomainFilter::default()).with_records(vec![seeded.clone()]);
        let registry = NoopRegistry::new(Box::new(provider));

        let records = registry.records().await.expect("records");
        assert_eq!(records, vec![seeded.clone()]);

        let changes = DnsChanges {
            delete: vec![seeded],
            ..DnsChanges::default()
        };
        registry.apply_changes(&changes).await.expect("apply");
        assert!(registry.records().await.expect("records").is_empty());
    }
}
