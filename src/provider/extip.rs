// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster-backed external-IP provider.
//!
//! Reads and writes the `spec.externalIPs` field of Service objects through
//! the Kubernetes API. This is the only mutating path back into the cluster;
//! dry-run suppresses the write while keeping the log line.

use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::{debug, info};

use super::ExtIpProvider;
use crate::endpoint::Targets;
use crate::extip::ServiceExtIp;
use crate::plan::ExtIpChanges;

/// An [`ExtIpProvider`] backed by a Kubernetes namespace.
pub struct ClusterExtIpProvider {
    client: Client,
    namespace: Option<String>,
    dry_run: bool,
}

impl ClusterExtIpProvider {
    #[must_use]
    pub fn new(client: Client, namespace: Option<String>, dry_run: bool) -> Self {
        Self {
            client,
            namespace,
            dry_run,
        }
    }

    fn services(&self) -> Api<Service> {
        match &self.namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::default_namespaced(self.client.clone()),
        }
    }
}

#[async_trait]
impl ExtIpProvider for ClusterExtIpProvider {
    async fn ext_ips(&self) -> Result<Vec<ServiceExtIp>> {
        let services = self
            .services()
            .list(&kube::api::ListParams::default())
            .await
            .context("listing services for external IPs")?;

        Ok(services
            .items
            .iter()
            .map(|svc| {
                let ext_ips = svc
                    .spec
                    .as_ref()
                    .and_then(|spec| spec.external_ips.clone())
                    .unwrap_or_default();
                ServiceExtIp::new(svc.name_any(), Targets::new(ext_ips))
            })
            .collect())
    }

    async fn apply_changes(&self, changes: &ExtIpChanges) -> Result<()> {
        let api = self.services();
        for update in &changes.update_new {
            info!(
                service = %update.service_name,
                external_ips = %update.ext_ips,
                "UPDATE ExternalIPs"
            );
            if self.dry_run {
                continue;
            }
            let patch = json!({
                "spec": {
                    "externalIPs": update.ext_ips.as_slice(),
                }
            });
            let patched = api
                .patch(
                    &update.service_name,
                    &PatchParams::default(),
                    &Patch::Merge(&patch),
                )
                .await
                .with_context(|| {
                    format!("updating external IPs of service {}", update.service_name)
                })?;
            debug!(
                service = %patched.name_any(),
                namespace = ?patched.namespace(),
                "external IPs updated"
            );
        }
        Ok(())
    }
}
