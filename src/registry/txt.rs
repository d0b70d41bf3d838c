// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! TXT-ownership registry.
//!
//! Multiple controller instances may share one DNS zone. Each instance is
//! configured with an owner id; a record belongs to an instance iff a
//! co-located TXT record at the mapped name serializes a label bag with
//! `owner=<id>`. The zone itself is the authoritative ownership store; no
//! state survives in the process beyond an optional read cache.
//!
//! On reads, TXT markers are folded into the labels of their endpoints. On
//! writes, updates and deletes are gated on ownership, creates claim
//! ownership for this instance, and every surviving non-TXT change gets a
//! synthesized TXT companion.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::debug;

use super::DnsRegistry;
use crate::endpoint::{DnsEndpoint, Labels, RecordType, Targets, OWNER_LABEL_KEY};
use crate::plan::DnsChanges;
use crate::provider::DnsProvider;

/// Maps endpoint names to their TXT marker names by prefixing.
///
/// Unprefixed TXT names map back to the empty string and are therefore never
/// claimed by any endpoint.
#[derive(Debug, Clone)]
struct PrefixNameMapper {
    prefix: String,
}

impl PrefixNameMapper {
    fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn to_endpoint_name(&self, txt_name: &str) -> String {
        txt_name.strip_prefix(&self.prefix).unwrap_or("").to_owned()
    }

    fn to_txt_name(&self, endpoint_name: &str) -> String {
        format!("{}{}", self.prefix, endpoint_name)
    }
}

#[derive(Default)]
struct RecordsCache {
    records: Option<Vec<DnsEndpoint>>,
    refreshed_at: Option<Instant>,
}

impl RecordsCache {
    fn fresh(&self, interval: Duration) -> Option<&Vec<DnsEndpoint>> {
        let records = self.records.as_ref()?;
        let refreshed_at = self.refreshed_at?;
        (refreshed_at.elapsed() < interval).then_some(records)
    }

    fn add(&mut self, endpoint: &DnsEndpoint) {
        if let Some(records) = self.records.as_mut() {
            records.push(endpoint.clone());
        }
    }

    // Cache entries are identified by (name, type, targets).
    fn remove(&mut self, endpoint: &DnsEndpoint) {
        if let Some(records) = self.records.as_mut() {
            if let Some(idx) = records.iter().position(|e| {
                e.dns_name == endpoint.dns_name
                    && e.record_type == endpoint.record_type
                    && e.targets.same(&endpoint.targets)
            }) {
                records.remove(idx);
            }
        }
    }
}

/// A [`DnsRegistry`] implementing ownership via associated TXT records.
pub struct TxtRegistry {
    provider: Box<dyn DnsProvider>,
    /// The owner id of this controller instance.
    owner_id: String,
    mapper: PrefixNameMapper,
    cache_interval: Duration,
    cache: Mutex<RecordsCache>,
}

impl TxtRegistry {
    /// # Errors
    ///
    /// Fails when the owner id is empty.
    pub fn new(
        provider: Box<dyn DnsProvider>,
        txt_prefix: &str,
        owner_id: &str,
        cache_interval: Duration,
    ) -> Result<Self> {
        if owner_id.is_empty() {
            bail!("owner id cannot be empty");
        }
        Ok(Self {
            provider,
            owner_id: owner_id.to_owned(),
            mapper: PrefixNameMapper::new(txt_prefix),
            cache_interval,
            cache: Mutex::new(RecordsCache::default()),
        })
    }

    fn filter_owned(&self, endpoints: &[DnsEndpoint]) -> Vec<DnsEndpoint> {
        endpoints
            .iter()
            .filter(|e| e.labels.owner() == self.owner_id)
            .cloned()
            .collect()
    }

    fn txt_companion(&self, endpoint: &DnsEndpoint) -> DnsEndpoint {
        DnsEndpoint::new(
            &self.mapper.to_txt_name(&endpoint.dns_name),
            RecordType::Txt,
            Targets::from(vec![endpoint.labels.serialize(true)]),
        )
    }
}

#[async_trait]
impl DnsRegistry for TxtRegistry {
    /// Fetch the zone, fold TXT ownership markers into endpoint labels, and
    /// return the non-TXT endpoints.
    ///
    /// TXT records whose value is not a parseable heritage string pass
    /// through as plain records: they have an empty owner and are never
    /// deleted on our account.
    async fn records(&self) -> Result<Vec<DnsEndpoint>> {
        {
            let cache = self.cache.lock().expect("records cache poisoned");
            if let Some(records) = cache.fresh(self.cache_interval) {
                debug!("using cached records");
                return Ok(records.clone());
            }
        }

        let records = self.provider.records().await?;

        let mut endpoints = Vec::new();
        let mut label_map: HashMap<String, Labels> = HashMap::new();

        for record in records {
            if record.record_type != RecordType::Txt {
                endpoints.push(record);
                continue;
            }
            // Registry TXT markers always have exactly one target.
            match Labels::parse(record.targets.first().unwrap_or_default()) {
                Ok(labels) => {
                    label_map.insert(self.mapper.to_endpoint_name(&record.dns_name), labels);
                }
                // Unidentifiable TXT value: keep the record as-is. It will
                // have an empty owner and can never be removed by us.
                Err(_) => endpoints.push(record),
            }
        }

        for endpoint in &mut endpoints {
            endpoint.labels = label_map
                .get(&endpoint.dns_name)
                .cloned()
                .unwrap_or_default();
        }

        if self.cache_interval > Duration::ZERO {
            let mut cache = self.cache.lock().expect("records cache poisoned");
            cache.records = Some(endpoints.clone());
            cache.refreshed_at = Some(Instant::now());
        }

        Ok(endpoints)
    }

    /// Gate updates and deletes on ownership, claim creates for this
    /// instance, synthesize the TXT companions, and forward to the provider.
    async fn apply_changes(&self, changes: &DnsChanges) -> Result<()> {
        // Creates are not filtered: new records are claimed by this instance.
        let mut filtered = DnsChanges {
            create: changes.create.clone(),
            update_new: self.filter_owned(&changes.update_new),
            update_old: self.filter_owned(&changes.update_old),
            delete: self.filter_owned(&changes.delete),
        };

        let caching = self.cache_interval > Duration::ZERO;

        {
            let mut cache = self.cache.lock().expect("records cache poisoned");

            let mut txts = Vec::with_capacity(filtered.create.len());
            for record in &mut filtered.create {
                record.labels.insert(OWNER_LABEL_KEY, self.owner_id.clone());
                txts.push(self.txt_companion(record));
                if caching {
                    cache.add(record);
                }
            }
            filtered.create.extend(txts);

            // The TXT value is reconstructed from the endpoint's labels, so the
            // marker paired with a deleted or replaced record is always exact.
            let mut txts = Vec::with_capacity(filtered.delete.len());
            for record in &filtered.delete {
                txts.push(self.txt_companion(record));
                if caching {
                    cache.remove(record);
                }
            }
            filtered.delete.extend(txts);

            let mut txts = Vec::with_capacity(filtered.update_old.len());
            for record in &filtered.update_old {
                txts.push(self.txt_companion(record));
                if caching {
                    cache.remove(record);
                }
            }
            filtered.update_old.extend(txts);

            let mut txts = Vec::with_capacity(filtered.update_new.len());
            for record in &filtered.update_new {
                txts.push(self.txt_companion(record));
                if caching {
                    cache.add(record);
                }
            }
            filtered.update_new.extend(txts);
        }

        self.provider.apply_changes(&filtered).await
    }
}

#[cfg(test)]
#[path = "txt_tests.rs"]
mod txt_tests;
