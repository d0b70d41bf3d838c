// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Service external-IP binding value type.

use std::fmt;

use crate::endpoint::Targets;

/// The external-IP set pinned onto a Service object, keyed by service name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceExtIp {
    pub service_name: String,
    /// Node internal IPs to write into `spec.externalIPs`; comparison is
    /// order-insensitive.
    pub ext_ips: Targets,
}

impl ServiceExtIp {
    #[must_use]
    pub fn new(service_name: impl Into<String>, ext_ips: Targets) -> Self {
        Self {
            service_name: service_name.into(),
            ext_ips,
        }
    }

    /// Order-insensitive equality over the external-IP set.
    #[must_use]
    pub fn same_ips(&self, other: &Self) -> bool {
        self.ext_ips.same(&other.ext_ips)
    }
}

impl fmt::Display for ServiceExtIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.service_name, self.ext_ips)
    }
}
