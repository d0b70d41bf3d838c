// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS endpoint value types.
//!
//! A [`DnsEndpoint`] is the unit of desired and observed DNS state that flows
//! between the source aggregator, the plan engine, and the registries. The
//! [`Labels`] bag attached to each endpoint carries two orthogonal concerns as
//! explicit keys: tenant ownership (`owner`, managed by the TXT registry) and
//! the source object back-reference (`resource`).

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

use thiserror::Error;

/// Label key identifying the controller instance that owns a record.
pub const OWNER_LABEL_KEY: &str = "owner";

/// Label key carrying the source-object back-reference
/// (`service/<namespace>/<name>`).
pub const RESOURCE_LABEL_KEY: &str = "resource";

/// Heritage marker embedded in serialized label bags. A TXT record whose
/// value does not carry this marker is not ours and is never touched.
const HERITAGE: &str = "extipy";

/// DNS record types understood by the controller.
///
/// `A` is chosen when every target is a literal IP address, `CNAME`
/// otherwise. `TXT` is reserved for the registry's ownership markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordType {
    #[default]
    A,
    Cname,
    Txt,
}

impl RecordType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::Cname => "CNAME",
            Self::Txt => "TXT",
        }
    }

    /// Pick the record type suitable for a target set: `A` for IP literals,
    /// `CNAME` for anything else.
    #[must_use]
    pub fn for_targets(targets: &Targets) -> Self {
        if targets.iter().all(|t| t.parse::<IpAddr>().is_ok()) {
            Self::A
        } else {
            Self::Cname
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered multiset of record targets (IPs or hostnames).
///
/// Order is preserved for display and provider round-trips, but comparison
/// via [`Targets::same`] is order-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Targets(Vec<String>);

impl Targets {
    #[must_use]
    pub fn new(targets: Vec<String>) -> Self {
        Self(targets)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Order-insensitive equality over the target multiset.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        if self.0.len() != other.0.len() {
            return false;
        }
        let mut a = self.0.clone();
        let mut b = other.0.clone();
        a.sort();
        b.sort();
        a == b
    }
}

impl From<Vec<String>> for Targets {
    fn from(targets: Vec<String>) -> Self {
        Self(targets)
    }
}

impl From<Vec<&str>> for Targets {
    fn from(targets: Vec<&str>) -> Self {
        Self(targets.into_iter().map(str::to_owned).collect())
    }
}

impl FromIterator<String> for Targets {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Targets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(";"))
    }
}

/// Returned when a TXT record value does not carry a parseable heritage
/// string. Such records belong to somebody else and pass through untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("heritage is unknown or not found")]
pub struct InvalidHeritage;

/// Control metadata attached to an endpoint.
///
/// Serializes to the heritage string stored in ownership TXT records, e.g.
/// `heritage=extipy,extipy/owner=default,extipy/resource=service/ns/name`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels(BTreeMap<String, String>);

impl Labels {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The owning controller instance, if any. An empty value counts as
    /// un-owned.
    #[must_use]
    pub fn owner(&self) -> &str {
        self.get(OWNER_LABEL_KEY).unwrap_or_default()
    }

    /// The source-object back-reference, if any.
    #[must_use]
    pub fn resource(&self) -> &str {
        self.get(RESOURCE_LABEL_KEY).unwrap_or_default()
    }

    /// Serialize the label bag into a heritage string. TXT record values are
    /// conventionally quoted, so `with_quotes` wraps the result.
    #[must_use]
    pub fn serialize(&self, with_quotes: bool) -> String {
        let mut parts = vec![format!("heritage={HERITAGE}")];
        for (key, value) in &self.0 {
            parts.push(format!("{HERITAGE}/{key}={value}"));
        }
        let serialized = parts.join(",");
        if with_quotes {
            format!("\"{serialized}\"")
        } else {
            serialized
        }
    }

    /// Parse a heritage string back into a label bag.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidHeritage`] when the heritage marker is missing or
    /// names a different system; callers treat such records as opaque.
    pub fn parse(value: &str) -> Result<Self, InvalidHeritage> {
        let value = value.trim().trim_matches('"');
        let mut heritage_seen = false;
        let mut labels = Self::new();
        for token in value.split(',') {
            let Some((key, val)) = token.split_once('=') else {
                return Err(InvalidHeritage);
            };
            if key == "heritage" {
                if val != HERITAGE {
                    return Err(InvalidHeritage);
                }
                heritage_seen = true;
            } else if let Some(label_key) =
                key.strip_prefix(HERITAGE).and_then(|k| k.strip_prefix('/'))
            {
                labels.insert(label_key, val);
            }
            // Foreign keys without our prefix are dropped.
        }
        if !heritage_seen {
            return Err(InvalidHeritage);
        }
        Ok(labels)
    }
}

/// A single DNS record in desired or observed state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnsEndpoint {
    /// Normalized DNS name (trailing dot removed).
    pub dns_name: String,
    /// Record targets; comparison is order-insensitive.
    pub targets: Targets,
    pub record_type: RecordType,
    /// TTL in seconds; `None` means provider default.
    pub record_ttl: Option<u32>,
    pub labels: Labels,
}

impl DnsEndpoint {
    /// Build an endpoint, trimming trailing dots from the name and targets.
    #[must_use]
    pub fn new(dns_name: &str, record_type: RecordType, targets: Targets) -> Self {
        Self {
            dns_name: dns_name.trim_end_matches('.').to_owned(),
            targets: targets
                .iter()
                .map(|t| t.trim_end_matches('.').to_owned())
                .collect(),
            record_type,
            record_ttl: None,
            labels: Labels::new(),
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.record_ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }
}

impl fmt::Display for DnsEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} -> {}",
            self.dns_name,
            self.record_ttl.unwrap_or(0),
            self.record_type,
            self.targets
        )
    }
}

#[cfg(test)]
#[path = "endpoint_tests.rs"]
mod endpoint_tests;
