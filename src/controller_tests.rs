// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the controller tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::bail;
use async_trait::async_trait;

use super::*;
use crate::endpoint::{DnsEndpoint, RecordType, Targets};
use crate::extip::ServiceExtIp;
use crate::inbound::{InboundRule, InboundRuleSet};
use crate::plan::{DnsChanges, ExtIpChanges, FirewallChanges, InstanceBinding};
use crate::provider::{DnsProvider, ExtIpProvider, FirewallProvider};
use crate::registry::NoopRegistry;
use crate::source::{DesiredBundle, Source};

struct MockSource(DesiredBundle);

#[async_trait]
impl Source for MockSource {
    async fn bundle(&self) -> Result<DesiredBundle> {
        Ok(self.0.clone())
    }
}

/// Serves canned records and validates the changes it receives.
struct ValidatingDnsProvider {
    records: Vec<DnsEndpoint>,
    expected: DnsChanges,
}

fn same_dns_list(actual: &[DnsEndpoint], expected: &[DnsEndpoint]) -> bool {
    if actual.len() != expected.len() {
        return false;
    }
    let mut actual: Vec<_> = actual.iter().collect();
    let mut expected: Vec<_> = expected.iter().collect();
    actual.sort_by_key(|e| e.dns_name.clone());
    expected.sort_by_key(|e| e.dns_name.clone());
    actual
        .iter()
        .zip(&expected)
        .all(|(a, e)| a.dns_name == e.dns_name && a.targets.same(&e.targets))
}

#[async_trait]
impl DnsProvider for ValidatingDnsProvider {
    async fn records(&self) -> Result<Vec<DnsEndpoint>> {
        Ok(self.records.clone())
    }

    async fn apply_changes(&self, changes: &DnsChanges) -> Result<()> {
        if !same_dns_list(&changes.create, &self.expected.create) {
            bail!("created records are wrong: {:?}", changes.create);
        }
        if !same_dns_list(&changes.update_new, &self.expected.update_new) {
            bail!("update-new records are wrong: {:?}", changes.update_new);
        }
        if !same_dns_list(&changes.update_old, &self.expected.update_old) {
            bail!("update-old records are wrong: {:?}", changes.update_old);
        }
        if !same_dns_list(&changes.delete, &self.expected.delete) {
            bail!("deleted records are wrong: {:?}", changes.delete);
        }
        Ok(())
    }
}

/// Serves canned rule-sets and validates the changes it receives.
struct ValidatingFirewallProvider {
    rules: Vec<InboundRuleSet>,
    expected: FirewallChanges,
}

fn same_rule_list(actual: &[InboundRuleSet], expected: &[InboundRuleSet]) -> bool {
    if actual.len() != expected.len() {
        return false;
    }
    let mut actual: Vec<_> = actual.iter().collect();
    let mut expected: Vec<_> = expected.iter().collect();
    actual.sort_by_key(|r| r.name.clone());
    expected.sort_by_key(|r| r.name.clone());
    actual.iter().zip(&expected).all(|(a, e)| {
        a.name == e.name && a.same_rules(e) && a.same_provider_ids(e)
    })
}

fn same_binding_list(actual: &[InstanceBinding], expected: &[InstanceBinding]) -> bool {
    let mut actual = actual.to_vec();
    let mut expected = expected.to_vec();
    actual.sort();
    expected.sort();
    actual == expected
}

#[async_trait]
impl FirewallProvider for ValidatingFirewallProvider {
    async fn rules(&self) -> Result<Vec<InboundRuleSet>> {
        Ok(self.rules.clone())
    }

    async fn apply_changes(&self, changes: &FirewallChanges) -> Result<()> {
        if !same_rule_list(&changes.create, &self.expected.create) {
            bail!("created rules are wrong: {:?}", changes.create);
        }
        if !same_rule_list(&changes.update_new, &self.expected.update_new) {
            bail!("update-new rules are wrong: {:?}", changes.update_new);
        }
        if !same_rule_list(&changes.update_old, &self.expected.update_old) {
            bail!("update-old rules are wrong: {:?}", changes.update_old);
        }
        if !same_rule_list(&changes.delete, &self.expected.delete) {
            bail!("deleted rules are wrong: {:?}", changes.delete);
        }
        if !same_binding_list(&changes.set, &self.expected.set) {
            bail!("set bindings are wrong: {:?}", changes.set);
        }
        if !same_binding_list(&changes.unset, &self.expected.unset) {
            bail!("unset bindings are wrong: {:?}", changes.unset);
        }
        Ok(())
    }

    async fn cluster_name(&self) -> Result<String> {
        Ok("cl.kube.io".to_owned())
    }
}

/// Serves canned external-IP bindings and validates the changes it receives.
struct ValidatingExtIpProvider {
    ext_ips: Vec<ServiceExtIp>,
    expected: ExtIpChanges,
}

fn same_extip_list(actual: &[ServiceExtIp], expected: &[ServiceExtIp]) -> bool {
    if actual.len() != expected.len() {
        return false;
    }
    let mut actual: Vec<_> = actual.iter().collect();
    let mut expected: Vec<_> = expected.iter().collect();
    actual.sort_by_key(|e| e.service_name.clone());
    expected.sort_by_key(|e| e.service_name.clone());
    actual
        .iter()
        .zip(&expected)
        .all(|(a, e)| a.service_name == e.service_name && a.same_ips(e))
}

#[async_trait]
impl ExtIpProvider for ValidatingExtIpProvider {
    async fn ext_ips(&self) -> Result<Vec<ServiceExtIp>> {
        Ok(self.ext_ips.clone())
    }

    async fn apply_changes(&self, changes: &ExtIpChanges) -> Result<()> {
        if !same_extip_list(&changes.update_new, &self.expected.update_new) {
            bail!("update-new external IPs are wrong: {:?}", changes.update_new);
        }
        if !same_extip_list(&changes.update_old, &self.expected.update_old) {
            bail!("update-old external IPs are wrong: {:?}", changes.update_old);
        }
        Ok(())
    }
}

fn a_record(name: &str, target: &str) -> DnsEndpoint {
    DnsEndpoint::new(name, RecordType::A, Targets::from(vec![target]))
}

fn rule_set(name: &str, rules: &[(&str, u16)], provider_ids: &[&str]) -> InboundRuleSet {
    InboundRuleSet {
        name: name.to_owned(),
        rules: rules
            .iter()
            .map(|(protocol, port)| InboundRule {
                protocol: (*protocol).to_owned(),
                port: *port,
            })
            .collect(),
        provider_ids: provider_ids.iter().map(|id| (*id).to_owned()).collect(),
    }
}

fn ext_ip(service_name: &str, ips: &[&str]) -> ServiceExtIp {
    ServiceExtIp::new(service_name, Targets::from(ips.to_vec()))
}

/// The full tick: firewall create/update/delete with bindings, external-IP
/// update and clear, DNS create/update/delete, all validated end to end.
#[tokio::test]
async fn test_run_once_orchestrates_all_components() {
    let source = MockSource(DesiredBundle {
        endpoints: vec![
            a_record("create-record", "1.2.3.4"),
            a_record("update-record", "8.8.4.4"),
        ],
        rule_sets: vec![
            rule_set("create-rule", &[("udp", 9900)], &["bbc", "zyx"]),
            rule_set("update-rule", &[("udp", 9800)], &["abc", "zyx"]),
        ],
        service_ext_ips: vec![ext_ip("update-svc", &["3.2.5.4"])],
    });

    let dns_provider = ValidatingDnsProvider {
        records: vec![
            a_record("update-record", "8.8.8.8"),
            a_record("delete-record", "4.3.2.1"),
        ],
        expected: DnsChanges {
            create: vec![a_record("create-record", "1.2.3.4")],
            update_new: vec![a_record("update-record", "8.8.4.4")],
            update_old: vec![a_record("update-record", "8.8.8.8")],
            delete: vec![a_record("delete-record", "4.3.2.1")],
        },
    };

    let firewall_provider = ValidatingFirewallProvider {
        rules: vec![
            rule_set("update-rule", &[("udp", 5000)], &["abc", "zyx"]),
            rule_set("delete-rule", &[("tcp", 80)], &["def", "opq"]),
        ],
        expected: FirewallChanges {
            create: vec![rule_set("create-rule", &[("udp", 9900)], &["bbc", "zyx"])],
            update_new: vec![rule_set("update-rule", &[("udp", 9800)], &["abc", "zyx"])],
            update_old: vec![rule_set("update-rule", &[("udp", 5000)], &["abc", "zyx"])],
            delete: vec![rule_set("delete-rule", &[("tcp", 80)], &["def", "opq"])],
            set: vec![
                InstanceBinding::new("bbc", "create-rule"),
                InstanceBinding::new("zyx", "create-rule"),
            ],
            unset: vec![
                InstanceBinding::new("def", "delete-rule"),
                InstanceBinding::new("opq", "delete-rule"),
            ],
        },
    };

    let extip_provider = ValidatingExtIpProvider {
        ext_ips: vec![
            ext_ip("update-svc", &["8.8.8.8"]),
            ext_ip("delete-svc", &["4.3.2.1"]),
        ],
        expected: ExtIpChanges {
            update_new: vec![ext_ip("update-svc", &["3.2.5.4"]), ext_ip("delete-svc", &[])],
            update_old: vec![
                ext_ip("update-svc", &["8.8.8.8"]),
                ext_ip("delete-svc", &["4.3.2.1"]),
            ],
        },
    };

    let controller = Controller {
        source: Box::new(source),
        dns_registry: Box::new(NoopRegistry::new(Box::new(dns_provider))),
        firewall_registry: FirewallRegistry::new(Box::new(firewall_provider)),
        extip_registry: ExtIpRegistry::new(Box::new(extip_provider)),
        policy: PlanPolicy::Sync,
        interval: Duration::from_secs(60),
    };

    controller
        .run_once()
        .await
        .expect("tick should apply the expected changes");
}

/// A failed read aborts the tick before anything is applied.
#[tokio::test]
async fn test_read_failure_aborts_tick_before_applies() {
    struct FailingFirewall;

    #[async_trait]
    impl FirewallProvider for FailingFirewall {
        async fn rules(&self) -> Result<Vec<InboundRuleSet>> {
            bail!("firewall unreachable")
        }
        async fn apply_changes(&self, _changes: &FirewallChanges) -> Result<()> {
            panic!("must not apply after a failed read");
        }
        async fn cluster_name(&self) -> Result<String> {
            Ok("cl".to_owned())
        }
    }

    struct TrackingExtIp {
        applied: Arc<AtomicBool>,
    }

    #[async_trait]
    impl ExtIpProvider for TrackingExtIp {
        async fn ext_ips(&self) -> Result<Vec<ServiceExtIp>> {
            Ok(vec![])
        }
        async fn apply_changes(&self, _changes: &ExtIpChanges) -> Result<()> {
            self.applied.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct EmptyDns;

    #[async_trait]
    impl DnsProvider for EmptyDns {
        async fn records(&self) -> Result<Vec<DnsEndpoint>> {
            Ok(vec![])
        }
        async fn apply_changes(&self, _changes: &DnsChanges) -> Result<()> {
            Ok(())
        }
    }

    let applied = Arc::new(AtomicBool::new(false));
    let controller = Controller {
        source: Box::new(MockSource(DesiredBundle::default())),
        dns_registry: Box::new(NoopRegistry::new(Box::new(EmptyDns))),
        firewall_registry: FirewallRegistry::new(Box::new(FailingFirewall)),
        extip_registry: ExtIpRegistry::new(Box::new(TrackingExtIp {
            applied: applied.clone(),
        })),
        policy: PlanPolicy::Sync,
        interval: Duration::from_secs(60),
    };

    assert!(controller.run_once().await.is_err());
    assert!(
        !applied.load(Ordering::SeqCst),
        "external IPs must not be applied after an aborted tick"
    );
}

/// The stop channel ends the loop after the in-flight tick completes.
#[tokio::test]
async fn test_run_stops_on_signal() {
    struct CountingSource {
        ticks: Arc<Mutex<u32>>,
    }

    #[async_trait]
    impl Source for CountingSource {
        async fn bundle(&self) -> Result<DesiredBundle> {
            *self.ticks.lock().unwrap() += 1;
            Ok(DesiredBundle::default())
        }
    }

    struct EmptyDns;
    #[async_trait]
    impl DnsProvider for EmptyDns {
        async fn records(&self) -> Result<Vec<DnsEndpoint>> {
            Ok(vec![])
        }
        async fn apply_changes(&self, _changes: &DnsChanges) -> Result<()> {
            Ok(())
        }
    }

    struct EmptyFirewall;
    #[async_trait]
    impl FirewallProvider for EmptyFirewall {
        async fn rules(&self) -> Result<Vec<InboundRuleSet>> {
            Ok(vec![])
        }
        async fn apply_changes(&self, _changes: &FirewallChanges) -> Result<()> {
            Ok(())
        }
        async fn cluster_name(&self) -> Result<String> {
            Ok("cl".to_owned())
        }
    }

    struct EmptyExtIp;
    #[async_trait]
    impl ExtIpProvider for EmptyExtIp {
        async fn ext_ips(&self) -> Result<Vec<ServiceExtIp>> {
            Ok(vec![])
        }
        async fn apply_changes(&self, _changes: &ExtIpChanges) -> Result<()> {
            Ok(())
        }
    }

    let ticks = Arc::new(Mutex::new(0));
    let controller = Controller {
        source: Box::new(CountingSource {
            ticks: ticks.clone(),
        }),
        dns_registry: Box::new(NoopRegistry::new(Box::new(EmptyDns))),
        firewall_registry: FirewallRegistry::new(Box::new(EmptyFirewall)),
        extip_registry: ExtIpRegistry::new(Box::new(EmptyExtIp)),
        policy: PlanPolicy::Sync,
        interval: Duration::from_secs(3600),
    };

    let (stop_tx, stop_rx) = watch::channel(false);
    let run = tokio::spawn(async move { controller.run(stop_rx).await });

    // Give the first tick a moment, then stop.
    tokio::time::sleep(Duration::from_millis(50)).await;
    stop_tx.send(true).expect("stop channel open");
    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("loop must exit after stop")
        .expect("loop task must not panic");

    assert_eq!(*ticks.lock().unwrap(), 1);
}
