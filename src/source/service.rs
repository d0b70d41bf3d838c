// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Service source.
//!
//! Finds all Service objects under our jurisdiction (annotated with desired
//! hostnames and carrying a matching or no controller annotation) and derives
//! the desired bundle: one A/CNAME endpoint per hostname targeting the
//! selected nodes, one firewall rule-set covering the service's ports on
//! those nodes, and the internal-IP set to pin into `spec.externalIPs`.
//!
//! The source is read-only against the cluster; all writes go through the
//! plan engines and their registries.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Service};
use kube::api::ListParams;
use kube::{Api, Client, ResourceExt};
use minijinja::{context, Environment};
use tracing::{debug, warn};

use super::{
    hostnames_from_annotations, is_responsible, max_ips_from_annotations,
    selector_from_annotations, ttl_from_annotations, DesiredBundle, Source, SourceConfig,
};
use crate::constants::{DEFAULT_NAMESPACE, DEFAULT_PROTOCOL, RESOURCE_LABEL_PREFIX};
use crate::endpoint::{DnsEndpoint, RecordType, Targets, RESOURCE_LABEL_KEY};
use crate::extip::ServiceExtIp;
use crate::inbound::{InboundRule, InboundRuleSet};
use crate::selector::Selector;

/// A [`Source`] for Kubernetes Service objects.
pub struct ServiceSource {
    client: Client,
    namespace: Option<String>,
    aggregator: ServiceAggregator,
}

impl ServiceSource {
    /// # Errors
    ///
    /// Fails on an invalid annotation filter or a malformed FQDN template.
    pub fn new(client: Client, cluster_name: &str, config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            client,
            namespace: config.namespace.clone(),
            aggregator: ServiceAggregator::new(cluster_name, config)?,
        })
    }

    fn services_api(&self) -> Api<Service> {
        match &self.namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::default_namespaced(self.client.clone()),
        }
    }
}

#[async_trait]
impl Source for ServiceSource {
    async fn bundle(&self) -> Result<DesiredBundle> {
        let services = self
            .services_api()
            .list(&ListParams::default())
            .await
            .context("listing services")?
            .items;

        // Get all the nodes once and reuse them for every service this run.
        let nodes = Api::<Node>::all(self.client.clone())
            .list(&ListParams::default())
            .await
            .context("listing nodes")?
            .items;

        Ok(self.aggregator.aggregate(&services, nodes))
    }
}

/// Node facts accumulated for one service.
struct SelectedNodes {
    external_ips: Vec<String>,
    internal_ips: Vec<String>,
    provider_ids: Vec<String>,
}

/// The pure aggregation core, separated from the cluster client so it can be
/// exercised directly against constructed objects.
pub(crate) struct ServiceAggregator {
    cluster_name: String,
    annotation_filter: Selector,
    fqdn_template: Option<String>,
    combine_fqdn_annotation: bool,
    publish_internal: bool,
}

impl ServiceAggregator {
    pub(crate) fn new(cluster_name: &str, config: &SourceConfig) -> Result<Self> {
        let annotation_filter = Selector::parse(&config.annotation_filter)
            .context("parsing annotation filter")?;

        let fqdn_template = if config.fqdn_template.is_empty() {
            None
        } else {
            // Surface template syntax errors at construction time.
            let env = Environment::new();
            env.template_from_str(&config.fqdn_template)
                .context("parsing FQDN template")?;
            Some(config.fqdn_template.clone())
        };

        Ok(Self {
            cluster_name: cluster_name.to_owned(),
            annotation_filter,
            fqdn_template,
            combine_fqdn_annotation: config.combine_fqdn_and_annotation,
            publish_internal: config.publish_internal,
        })
    }

    pub(crate) fn aggregate(&self, services: &[Service], mut nodes: Vec<Node>) -> DesiredBundle {
        // Sorting by creation time keeps node selection deterministic across
        // ticks as long as membership is unchanged.
        nodes.sort_by(|a, b| {
            a.metadata
                .creation_timestamp
                .cmp(&b.metadata.creation_timestamp)
        });

        let mut bundle = DesiredBundle::default();
        for service in services {
            let annotations = service.metadata.annotations.clone().unwrap_or_default();
            if !self.annotation_filter.matches(&annotations) {
                continue;
            }
            if !is_responsible(&annotations) {
                debug!(
                    service = %service.name_any(),
                    "skipping service; controller annotation names another controller"
                );
                continue;
            }
            if let Err(error) = self.collect_service(service, &annotations, &nodes, &mut bundle) {
                warn!(
                    service = %service.name_any(),
                    namespace = ?service.namespace(),
                    %error,
                    "skipping service with invalid annotations"
                );
            }
        }
        bundle
    }

    /// One service's contribution to the bundle. Any annotation error fails
    /// this service only.
    fn collect_service(
        &self,
        service: &Service,
        annotations: &BTreeMap<String, String>,
        nodes: &[Node],
        bundle: &mut DesiredBundle,
    ) -> Result<()> {
        let hostnames = self.hostnames_for(service, annotations)?;
        if hostnames.is_empty() {
            return Ok(());
        }

        let ttl = ttl_from_annotations(annotations)?;
        let selector = selector_from_annotations(annotations)?;
        let max_ips = max_ips_from_annotations(annotations)?;
        let selected = select_nodes(nodes, selector.as_ref(), max_ips);

        let name = service.name_any();
        let namespace = service.namespace().unwrap_or_default();

        let dns_targets = if self.publish_internal {
            Targets::new(selected.internal_ips.clone())
        } else {
            Targets::new(selected.external_ips.clone())
        };
        for hostname in &hostnames {
            let record_type = RecordType::for_targets(&dns_targets);
            let mut endpoint = DnsEndpoint::new(hostname, record_type, dns_targets.clone());
            endpoint.record_ttl = ttl;
            endpoint.labels.insert(
                RESOURCE_LABEL_KEY,
                format!("{RESOURCE_LABEL_PREFIX}{namespace}/{name}"),
            );
            bundle.endpoints.push(endpoint);
        }

        bundle
            .rule_sets
            .push(self.rule_set_for(service, &name, &namespace, selected.provider_ids));

        bundle
            .service_ext_ips
            .push(ServiceExtIp::new(name, Targets::new(selected.internal_ips)));

        Ok(())
    }

    /// Hostnames from the annotation, the FQDN template, or both when the
    /// combine flag is set.
    fn hostnames_for(
        &self,
        service: &Service,
        annotations: &BTreeMap<String, String>,
    ) -> Result<Vec<String>> {
        let mut hostnames = hostnames_from_annotations(annotations);
        let Some(template) = &self.fqdn_template else {
            return Ok(hostnames);
        };
        if !hostnames.is_empty() && !self.combine_fqdn_annotation {
            return Ok(hostnames);
        }

        let env = Environment::new();
        let rendered = env
            .template_from_str(template)
            .and_then(|tmpl| {
                tmpl.render(context! {
                    name => service.name_any(),
                    namespace => service.namespace().unwrap_or_default(),
                })
            })
            .context("rendering FQDN template")?;
        hostnames.extend(
            rendered
                .replace(' ', "")
                .split(',')
                .filter(|h| !h.is_empty())
                .map(str::to_owned),
        );
        Ok(hostnames)
    }

    /// The firewall rule-set for a service: one rule per port, named
    /// `<svc>[.<namespace>].<cluster>` with the namespace segment omitted for
    /// the default namespace.
    fn rule_set_for(
        &self,
        service: &Service,
        name: &str,
        namespace: &str,
        provider_ids: Vec<String>,
    ) -> InboundRuleSet {
        let mut rule_set_name = name.to_owned();
        if !namespace.is_empty() && namespace != DEFAULT_NAMESPACE {
            rule_set_name.push('.');
            rule_set_name.push_str(namespace);
        }
        rule_set_name.push('.');
        rule_set_name.push_str(&self.cluster_name);

        let mut rule_set = InboundRuleSet::new(rule_set_name);
        rule_set.provider_ids = provider_ids;

        let ports = service
            .spec
            .as_ref()
            .and_then(|spec| spec.ports.clone())
            .unwrap_or_default();
        for port in ports {
            let protocol = port
                .protocol
                .as_deref()
                .filter(|p| !p.is_empty())
                .map_or_else(|| DEFAULT_PROTOCOL.to_owned(), str::to_lowercase);
            let Ok(port) = u16::try_from(port.port) else {
                warn!(service = %service.name_any(), port = port.port, "ignoring out-of-range port");
                continue;
            };
            rule_set.rules.push(InboundRule { protocol, port });
        }
        rule_set
    }
}

/// Walk the creation-ordered node list, taking nodes whose labels satisfy
/// the selector until `max_ips > 0` nodes are selected. IP lists are sorted
/// lexicographically; that tie-break keeps the downstream diff stable.
fn select_nodes(nodes: &[Node], selector: Option<&Selector>, max_ips: usize) -> SelectedNodes {
    let mut selected = SelectedNodes {
        external_ips: Vec::new(),
        internal_ips: Vec::new(),
        provider_ids: Vec::new(),
    };

    for node in nodes {
        let labels = node.metadata.labels.clone().unwrap_or_default();
        if selector.is_none_or(|s| s.matches(&labels)) {
            let addresses = node
                .status
                .as_ref()
                .and_then(|status| status.addresses.clone())
                .unwrap_or_default();
            for address in addresses {
                match address.type_.as_str() {
                    "ExternalIP" => selected.external_ips.push(address.address),
                    "InternalIP" => selected.internal_ips.push(address.address),
                    _ => {}
                }
            }
            selected.provider_ids.push(
                node.spec
                    .as_ref()
                    .and_then(|spec| spec.provider_id.clone())
                    .unwrap_or_default(),
            );
        }
        if max_ips > 0 && selected.provider_ids.len() >= max_ips {
            break;
        }
    }

    selected.external_ips.sort();
    selected.internal_ips.sort();
    selected
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod service_tests;
