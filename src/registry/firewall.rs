// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Lifecycle wrapper over the firewall provider port.

use anyhow::Result;

use crate::inbound::InboundRuleSet;
use crate::plan::FirewallChanges;
use crate::provider::FirewallProvider;

/// Mediates firewall reads and applies for the controller. Carries no
/// ownership semantics; rule-sets are namespaced by their cluster-derived
/// names.
pub struct FirewallRegistry {
    provider: Box<dyn FirewallProvider>,
}

impl FirewallRegistry {
    #[must_use]
    pub fn new(provider: Box<dyn FirewallProvider>) -> Self {
        Self { provider }
    }

    /// The current rule-sets from the firewall provider.
    pub async fn rules(&self) -> Result<Vec<InboundRuleSet>> {
        self.provider.rules().await
    }

    /// Propagate changes to the firewall provider.
    pub async fn apply_changes(&self, changes: &FirewallChanges) -> Result<()> {
        self.provider.apply_changes(changes).await
    }
}
