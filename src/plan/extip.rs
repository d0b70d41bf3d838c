// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Service external-IP plan engine.
//!
//! Services are created and deleted elsewhere; this engine only ever emits
//! update pairs. A service that disappears from the desired set gets an
//! explicit clear (`ext_ips = []`) rather than a delete.

use std::collections::BTreeMap;

use crate::endpoint::Targets;
use crate::extip::ServiceExtIp;

/// Update pairs to apply to the cluster, index-matched old/new.
#[derive(Debug, Clone, Default)]
pub struct ExtIpChanges {
    /// External-IP sets that need to be updated (current data).
    pub update_old: Vec<ServiceExtIp>,
    /// External-IP sets that need to be updated (desired data).
    pub update_new: Vec<ServiceExtIp>,
}

impl ExtIpChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.update_old.is_empty() && self.update_new.is_empty()
    }
}

/// A desired/current diff over per-service external-IP lists.
pub struct ExtIpPlan {
    pub current: Vec<ServiceExtIp>,
    pub desired: Vec<ServiceExtIp>,
}

#[derive(Default)]
struct PlanRow {
    current: Option<ServiceExtIp>,
    candidate: Option<ServiceExtIp>,
}

impl ExtIpPlan {
    /// Compute the update pairs needed to move current state towards desired
    /// state.
    #[must_use]
    pub fn calculate(&self) -> ExtIpChanges {
        let mut rows: BTreeMap<String, PlanRow> = BTreeMap::new();

        for current in &self.current {
            rows.entry(current.service_name.clone()).or_default().current = Some(current.clone());
        }
        for desired in &self.desired {
            rows.entry(desired.service_name.clone())
                .or_default()
                .candidate = Some(desired.clone());
        }

        let mut changes = ExtIpChanges::default();
        for (service_name, row) in &rows {
            // A vanished candidate clears the service's external IPs.
            let candidate = row.candidate.clone().unwrap_or_else(|| {
                ServiceExtIp::new(service_name.clone(), Targets::default())
            });
            let current = row
                .current
                .clone()
                .unwrap_or_else(|| ServiceExtIp::new(service_name.clone(), Targets::default()));
            if !candidate.same_ips(&current) {
                changes.update_new.push(candidate);
                changes.update_old.push(current);
            }
        }

        changes
    }
}

#[cfg(test)]
#[path = "extip_tests.rs"]
mod extip_tests;
