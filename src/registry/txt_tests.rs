// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the TXT-ownership registry.

use std::sync::Arc;

use super::*;
use crate::endpoint::RESOURCE_LABEL_KEY;

/// Serves a canned zone and captures every forwarded change-set.
struct MockProvider {
    records: Vec<DnsEndpoint>,
    records_calls: Mutex<u32>,
    applied: Mutex<Vec<DnsChanges>>,
}

impl MockProvider {
    fn new(records: Vec<DnsEndpoint>) -> Arc<Self> {
        Arc::new(Self {
            records,
            records_calls: Mutex::new(0),
            applied: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl DnsProvider for MockProvider {
    async fn records(&self) -> Result<Vec<DnsEndpoint>> {
        *self.records_calls.lock().unwrap() += 1;
        Ok(self.records.clone())
    }

    async fn apply_changes(&self, changes: &DnsChanges) -> Result<()> {
        self.applied.lock().unwrap().push(changes.clone());
        Ok(())
    }
}

fn a_record(name: &str, target: &str) -> DnsEndpoint {
    DnsEndpoint::new(name, RecordType::A, Targets::from(vec![target]))
}

fn txt_marker(name: &str, owner: &str) -> DnsEndpoint {
    let mut labels = Labels::new();
    labels.insert(OWNER_LABEL_KEY, owner);
    DnsEndpoint::new(
        name,
        RecordType::Txt,
        Targets::from(vec![labels.serialize(true)]),
    )
}

fn registry_over(
    provider: &Arc<MockProvider>,
    prefix: &str,
    owner: &str,
    cache_interval: Duration,
) -> TxtRegistry {
    TxtRegistry::new(Box::new(provider.clone()), prefix, owner, cache_interval)
        .expect("registry should construct")
}

#[test]
fn test_empty_owner_id_is_rejected() {
    let provider = MockProvider::new(vec![]);
    let result = TxtRegistry::new(Box::new(provider), "txt.", "", Duration::ZERO);
    assert!(result.is_err());
}

#[tokio::test]
async fn test_records_folds_ownership_markers_into_labels() {
    let provider = MockProvider::new(vec![
        a_record("foo.example.org", "1.2.3.4"),
        txt_marker("txt.foo.example.org", "owner-1"),
        a_record("bar.example.org", "5.6.7.8"),
    ]);
    let registry = registry_over(&provider, "txt.", "owner-1", Duration::ZERO);

    let records = registry.records().await.expect("records");
    assert_eq!(records.len(), 2);

    let foo = records
        .iter()
        .find(|r| r.dns_name == "foo.example.org")
        .expect("foo present");
    assert_eq!(foo.labels.owner(), "owner-1");

    // No marker: empty labels, un-owned.
    let bar = records
        .iter()
        .find(|r| r.dns_name == "bar.example.org")
        .expect("bar present");
    assert!(bar.labels.is_empty());
}

#[tokio::test]
async fn test_unparseable_txt_passes_through_as_plain_record() {
    let opaque = DnsEndpoint::new(
        "foo.example.com",
        RecordType::Txt,
        Targets::from(vec!["some unrelated verification token"]),
    );
    let provider = MockProvider::new(vec![opaque]);
    let registry = registry_over(&provider, "txt.", "owner-1", Duration::ZERO);

    let records = registry.records().await.expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].record_type, RecordType::Txt);
    assert_eq!(records[0].dns_name, "foo.example.com");
    assert!(records[0].labels.is_empty(), "opaque TXT has empty labels");
}

#[tokio::test]
async fn test_unprefixed_marker_claims_nothing() {
    // A heritage TXT without the prefix maps to the empty endpoint name.
    let provider = MockProvider::new(vec![
        a_record("foo.example.org", "1.2.3.4"),
        txt_marker("foo.example.org", "owner-1"),
    ]);
    let registry = registry_over(&provider, "txt.", "owner-1", Duration::ZERO);

    let records = registry.records().await.expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].labels.owner(), "");
}

#[tokio::test]
async fn test_apply_claims_creates_and_pairs_txt() {
    let provider = MockProvider::new(vec![]);
    let registry = registry_over(&provider, "txt.", "owner-1", Duration::ZERO);

    let mut create = a_record("foo.example.org", "1.2.3.4");
    create
        .labels
        .insert(RESOURCE_LABEL_KEY, "service/default/foo");
    let changes = DnsChanges {
        create: vec![create],
        ..DnsChanges::default()
    };
    registry.apply_changes(&changes).await.expect("apply");

    let applied = provider.applied.lock().unwrap();
    assert_eq!(applied.len(), 1);
    let forwarded = &applied[0];

    // One A record plus its TXT companion.
    assert_eq!(forwarded.create.len(), 2);
    assert_eq!(forwarded.create[0].labels.owner(), "owner-1");
    let txt = &forwarded.create[1];
    assert_eq!(txt.record_type, RecordType::Txt);
    assert_eq!(txt.dns_name, "txt.foo.example.org");
    let marker = Labels::parse(txt.targets.first().expect("txt target"))
        .expect("companion must serialize a heritage string");
    assert_eq!(marker.owner(), "owner-1");
    assert_eq!(marker.resource(), "service/default/foo");
}

#[tokio::test]
async fn test_apply_filters_non_owned_updates_and_deletes() {
    let provider = MockProvider::new(vec![]);
    let registry = registry_over(&provider, "txt.", "owner-1", Duration::ZERO);

    let mut mine = a_record("mine.example.org", "1.1.1.1");
    mine.labels.insert(OWNER_LABEL_KEY, "owner-1");
    let mut theirs = a_record("theirs.example.org", "2.2.2.2");
    theirs.labels.insert(OWNER_LABEL_KEY, "somebody-else");
    let unowned = a_record("unowned.example.org", "3.3.3.3");

    let changes = DnsChanges {
        delete: vec![mine, theirs.clone(), unowned],
        update_old: vec![theirs.clone()],
        update_new: vec![theirs],
        ..DnsChanges::default()
    };
    registry.apply_changes(&changes).await.expect("apply");

    let applied = provider.applied.lock().unwrap();
    let forwarded = &applied[0];

    // Only the owned record and its TXT companion survive.
    assert_eq!(forwarded.delete.len(), 2);
    assert_eq!(forwarded.delete[0].dns_name, "mine.example.org");
    assert_eq!(forwarded.delete[1].dns_name, "txt.mine.example.org");
    assert!(forwarded.update_old.is_empty());
    assert!(forwarded.update_new.is_empty());
}

#[tokio::test]
async fn test_txt_pairing_counts_per_category() {
    let provider = MockProvider::new(vec![]);
    let registry = registry_over(&provider, "txt.", "owner-1", Duration::ZERO);

    let mut owned_old = a_record("upd.example.org", "1.1.1.1");
    owned_old.labels.insert(OWNER_LABEL_KEY, "owner-1");
    let mut owned_new = a_record("upd.example.org", "2.2.2.2");
    owned_new.labels.insert(OWNER_LABEL_KEY, "owner-1");
    let mut owned_del = a_record("del.example.org", "3.3.3.3");
    owned_del.labels.insert(OWNER_LABEL_KEY, "owner-1");

    let changes = DnsChanges {
        create: vec![a_record("new.example.org", "4.4.4.4")],
        update_old: vec![owned_old],
        update_new: vec![owned_new],
        delete: vec![owned_del],
    };
    registry.apply_changes(&changes).await.expect("apply");

    let applied = provider.applied.lock().unwrap();
    let forwarded = &applied[0];

    for category in [
        &forwarded.create,
        &forwarded.update_old,
        &forwarded.update_new,
        &forwarded.delete,
    ] {
        let plain = category
            .iter()
            .filter(|e| e.record_type != RecordType::Txt)
            .count();
        let markers = category
            .iter()
            .filter(|e| e.record_type == RecordType::Txt)
            .count();
        assert_eq!(plain, markers, "every record needs exactly one marker");
    }
}

#[tokio::test]
async fn test_records_cache_avoids_repeated_provider_reads() {
    let provider = MockProvider::new(vec![a_record("foo.example.org", "1.2.3.4")]);
    let registry = registry_over(&provider, "txt.", "owner-1", Duration::from_secs(3600));

    let first = registry.records().await.expect("records");
    let second = registry.records().await.expect("records");
    assert_eq!(first.len(), second.len());
    assert_eq!(*provider.records_calls.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_cache_tracks_applied_changes() {
    let provider = MockProvider::new(vec![a_record("old.example.org", "1.2.3.4")]);
    let registry = registry_over(&provider, "txt.", "owner-1", Duration::from_secs(3600));

    // Prime the cache.
    let initial = registry.records().await.expect("records");
    assert_eq!(initial.len(), 1);

    let mut old = a_record("old.example.org", "1.2.3.4");
    old.labels.insert(OWNER_LABEL_KEY, "owner-1");
    let changes = DnsChanges {
        create: vec![a_record("new.example.org", "9.9.9.9")],
        delete: vec![old],
        ..DnsChanges::default()
    };
    registry.apply_changes(&changes).await.expect("apply");

    // Still within the cache interval: the cache must reflect the apply.
    let cached = registry.records().await.expect("records");
    assert_eq!(*provider.records_calls.lock().unwrap(), 1);
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].dns_name, "new.example.org");
}
