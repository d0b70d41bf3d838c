// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Firewall rule-set value types.
//!
//! An [`InboundRuleSet`] is the externally visible unit the firewall provider
//! manages: a named list of ingress rules plus the cloud provider IDs of the
//! nodes the rule-set is attached to. Rule lists compare element-wise;
//! provider IDs compare order-insensitively and never affect rule-set
//! equivalence.

use std::fmt;

/// A single ingress permission: protocol plus destination port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRule {
    /// Lower-cased protocol name (`tcp`, `udp`, ...).
    pub protocol: String,
    pub port: u16,
}

impl fmt::Display for InboundRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.protocol, self.port)
    }
}

/// A named firewall rule-set with its per-instance bindings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundRuleSet {
    /// Externally visible identifier in the firewall provider.
    pub name: String,
    pub rules: Vec<InboundRule>,
    /// Provider IDs of the nodes this rule-set is bound to.
    pub provider_ids: Vec<String>,
}

impl InboundRuleSet {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Rule-set equivalence: rule lists must match element-wise. Provider IDs
    /// are deliberately excluded; they drive binding changes instead.
    #[must_use]
    pub fn same_rules(&self, other: &Self) -> bool {
        self.rules == other.rules
    }

    /// Order-insensitive comparison of the bound provider IDs.
    #[must_use]
    pub fn same_provider_ids(&self, other: &Self) -> bool {
        if self.provider_ids.len() != other.provider_ids.len() {
            return false;
        }
        let mut a = self.provider_ids.clone();
        let mut b = other.provider_ids.clone();
        a.sort();
        b.sort();
        a == b
    }
}

impl fmt::Display for InboundRuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for rule in &self.rules {
            write!(f, " {rule}")?;
        }
        Ok(())
    }
}
