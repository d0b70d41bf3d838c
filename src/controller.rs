// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The reconciliation loop.
//!
//! One tick reads the current state from all three registries and the
//! desired state from the source, computes the three plans, and applies them
//! in a fixed order: firewall first (so nodes accept traffic before DNS
//! points at them), then service external-IPs, then DNS. Any error aborts
//! the rest of the tick; the loop logs it and waits for the next tick.
//!
//! Ticks never overlap. The stop signal interrupts the wait between ticks
//! but lets a tick in progress run to completion.

use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::metrics;
use crate::plan::{DnsPlan, ExtIpPlan, FirewallPlan, PlanPolicy};
use crate::registry::{DnsRegistry, ExtIpRegistry, FirewallRegistry};
use crate::source::Source;

/// Orchestrates the sources, registries, and plan engines.
pub struct Controller {
    pub source: Box<dyn Source>,
    pub dns_registry: Box<dyn DnsRegistry>,
    pub firewall_registry: FirewallRegistry,
    pub extip_registry: ExtIpRegistry,
    /// The policy that defines which changes to DNS records are allowed.
    pub policy: PlanPolicy,
    /// The interval between individual synchronizations.
    pub interval: Duration,
}

impl Controller {
    /// Run a single reconciliation tick.
    ///
    /// # Errors
    ///
    /// Fails fast: the first read or apply error aborts the remainder of the
    /// tick and is returned to the caller.
    pub async fn run_once(&self) -> Result<()> {
        let start = Instant::now();
        let result = self.tick().await;
        match &result {
            Ok(()) => metrics::record_sync_success(start.elapsed()),
            Err(_) => metrics::record_sync_error(start.elapsed()),
        }
        result
    }

    async fn tick(&self) -> Result<()> {
        let records = self.dns_registry.records().await?;
        let rules = self.firewall_registry.rules().await?;
        let ext_ips = self.extip_registry.ext_ips().await?;
        let desired = self.source.bundle().await?;

        metrics::set_desired_entries("endpoints", desired.endpoints.len());
        metrics::set_desired_entries("rule_sets", desired.rule_sets.len());
        metrics::set_desired_entries("service_ext_ips", desired.service_ext_ips.len());

        let firewall_changes = FirewallPlan {
            current: rules,
            desired: desired.rule_sets,
        }
        .calculate();
        debug!(
            creates = firewall_changes.create.len(),
            updates = firewall_changes.update_new.len(),
            deletes = firewall_changes.delete.len(),
            sets = firewall_changes.set.len(),
            unsets = firewall_changes.unset.len(),
            "calculated firewall plan"
        );
        self.firewall_registry
            .apply_changes(&firewall_changes)
            .await?;
        metrics::record_changes("firewall", "create", firewall_changes.create.len());
        metrics::record_changes("firewall", "update", firewall_changes.update_new.len());
        metrics::record_changes("firewall", "delete", firewall_changes.delete.len());
        metrics::record_changes("firewall", "set", firewall_changes.set.len());
        metrics::record_changes("firewall", "unset", firewall_changes.unset.len());

        let extip_changes = ExtIpPlan {
            current: ext_ips,
            desired: desired.service_ext_ips,
        }
        .calculate();
        debug!(
            updates = extip_changes.update_new.len(),
            "calculated external-IP plan"
        );
        self.extip_registry.apply_changes(&extip_changes).await?;
        metrics::record_changes("extip", "update", extip_changes.update_new.len());

        let dns_changes = DnsPlan {
            current: records,
            desired: desired.endpoints,
            policy: self.policy,
        }
        .calculate();
        debug!(
            creates = dns_changes.create.len(),
            updates = dns_changes.update_new.len(),
            deletes = dns_changes.delete.len(),
            "calculated dns plan"
        );
        self.dns_registry.apply_changes(&dns_changes).await?;
        metrics::record_changes("dns", "create", dns_changes.create.len());
        metrics::record_changes("dns", "update", dns_changes.update_new.len());
        metrics::record_changes("dns", "delete", dns_changes.delete.len());

        Ok(())
    }

    /// Run ticks at the configured interval until the stop channel fires.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) {
        loop {
            if let Err(error) = self.run_once().await {
                metrics::record_error("controller");
                error!(%error, "reconciliation tick failed");
            }
            tokio::select! {
                () = tokio::time::sleep(self.interval) => {}
                _ = stop.changed() => {
                    info!("terminating main controller loop");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;
