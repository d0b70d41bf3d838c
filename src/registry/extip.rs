// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Lifecycle wrapper over the external-IP provider port.

use anyhow::Result;

use crate::extip::ServiceExtIp;
use crate::plan::ExtIpChanges;
use crate::provider::ExtIpProvider;

/// Mediates service external-IP reads and applies for the controller.
pub struct ExtIpRegistry {
    provider: Box<dyn ExtIpProvider>,
}

impl ExtIpRegistry {
    #[must_use]
    pub fn new(provider: Box<dyn ExtIpProvider>) -> Self {
        Self { provider }
    }

    /// The current external-IP bindings from the cluster.
    pub async fn ext_ips(&self) -> Result<Vec<ServiceExtIp>> {
        self.provider.ext_ips().await
    }

    /// Propagate update pairs to the cluster.
    pub async fn apply_changes(&self, changes: &ExtIpChanges) -> Result<()> {
        self.provider.apply_changes(changes).await
    }
}
