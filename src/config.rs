// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Controller configuration.
//!
//! Every flag is mirrored by an environment variable with the
//! `EXTERNAL_DNS_` prefix; that prefix is part of the external compatibility
//! surface. Validation happens once at startup, before anything talks to a
//! provider.

use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::constants::{DEFAULT_METRICS_ADDRESS, SOURCE_SERVICE};
use crate::plan::PlanPolicy;

/// DNS/firewall provider names this build ships.
const PROVIDERS: &[&str] = &["inmemory"];

/// Registry kinds this build ships.
const REGISTRIES: &[&str] = &["txt", "noop"];

/// A fatal configuration problem, reported before startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("unknown registry: {0}")]
    UnknownRegistry(String),

    #[error("unknown policy: {0}")]
    UnknownPolicy(String),

    #[error("unknown source: {0}")]
    UnknownSource(String),

    #[error("unknown log format: {0} (expected text or json)")]
    UnknownLogFormat(String),

    #[error("no sources specified")]
    NoSources,

    #[error("txt registry requires a non-empty owner id")]
    EmptyOwnerId,
}

/// External IPs controller for Kubernetes: publishes annotated Services on
/// node external IPs via DNS records, cloud firewall rules, and the
/// Services' own `spec.externalIPs`.
#[derive(Parser, Debug, Clone)]
#[command(name = "extipy", version, about)]
pub struct Config {
    /// The resource types that are queried for desired state
    #[arg(
        long = "source",
        env = "EXTERNAL_DNS_SOURCE",
        value_delimiter = ',',
        default_value = SOURCE_SERVICE
    )]
    pub sources: Vec<String>,

    /// Limit sources of desired state to the given namespace (empty: the
    /// client's default namespace)
    #[arg(long, env = "EXTERNAL_DNS_NAMESPACE", default_value = "")]
    pub namespace: String,

    /// Filter sources by annotation using a label selector expression
    #[arg(long, env = "EXTERNAL_DNS_ANNOTATION_FILTER", default_value = "")]
    pub annotation_filter: String,

    /// Template for hostnames of services without a hostname annotation
    /// (variables: name, namespace)
    #[arg(long, env = "EXTERNAL_DNS_FQDN_TEMPLATE", default_value = "")]
    pub fqdn_template: String,

    /// Combine template hostnames with annotation hostnames instead of
    /// falling back
    #[arg(long, env = "EXTERNAL_DNS_COMBINE_FQDN_ANNOTATION", default_value_t = false)]
    pub combine_fqdn_annotation: bool,

    /// Publish node internal IPs as DNS targets instead of external IPs
    #[arg(long, env = "EXTERNAL_DNS_PUBLISH_INTERNAL", default_value_t = false)]
    pub publish_internal: bool,

    /// The DNS and firewall provider to sync against
    #[arg(long, env = "EXTERNAL_DNS_PROVIDER")]
    pub provider: String,

    /// Limit possible target zones by a domain suffix (repeatable)
    #[arg(
        long = "domain-filter",
        env = "EXTERNAL_DNS_DOMAIN_FILTER",
        value_delimiter = ','
    )]
    pub domain_filter: Vec<String>,

    /// Cluster name reported by the in-memory firewall provider
    #[arg(
        long,
        env = "EXTERNAL_DNS_INMEMORY_CLUSTER_NAME",
        default_value = "inmemory.cluster"
    )]
    pub inmemory_cluster_name: String,

    /// The registry implementation mediating DNS record ownership
    #[arg(long, env = "EXTERNAL_DNS_REGISTRY", default_value = "txt")]
    pub registry: String,

    /// Prefix mapping record names to their ownership TXT record names
    #[arg(long, env = "EXTERNAL_DNS_TXT_PREFIX", default_value = "")]
    pub txt_prefix: String,

    /// Identifier of this controller instance in ownership TXT records
    #[arg(long, env = "EXTERNAL_DNS_TXT_OWNER_ID", default_value = "default")]
    pub txt_owner_id: String,

    /// Memoize registry reads for this long (0s: no caching)
    #[arg(
        long,
        env = "EXTERNAL_DNS_TXT_CACHE_INTERVAL",
        default_value = "0s",
        value_parser = parse_duration
    )]
    pub txt_cache_interval: Duration,

    /// Which DNS record changes are allowed: sync or upsert-only
    #[arg(long, env = "EXTERNAL_DNS_POLICY", default_value = "sync")]
    pub policy: String,

    /// The interval between reconciliation ticks
    #[arg(
        long,
        env = "EXTERNAL_DNS_INTERVAL",
        default_value = "1m",
        value_parser = parse_duration
    )]
    pub interval: Duration,

    /// Run a single reconciliation tick and exit
    #[arg(long, env = "EXTERNAL_DNS_ONCE", default_value_t = false)]
    pub once: bool,

    /// Compute and log changes without applying them
    #[arg(long, env = "EXTERNAL_DNS_DRY_RUN", default_value_t = false)]
    pub dry_run: bool,

    /// Log output format: text or json
    #[arg(long, env = "EXTERNAL_DNS_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (overridden by RUST_LOG when set)
    #[arg(long, env = "EXTERNAL_DNS_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Bind address of the metrics and health HTTP server
    #[arg(
        long,
        env = "EXTERNAL_DNS_METRICS_ADDRESS",
        default_value = DEFAULT_METRICS_ADDRESS
    )]
    pub metrics_address: String,
}

impl Config {
    /// Check cross-flag invariants that clap cannot express.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found; all are fatal at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }
        for source in &self.sources {
            if source != SOURCE_SERVICE {
                return Err(ConfigError::UnknownSource(source.clone()));
            }
        }
        if !PROVIDERS.contains(&self.provider.as_str()) {
            return Err(ConfigError::UnknownProvider(self.provider.clone()));
        }
        if !REGISTRIES.contains(&self.registry.as_str()) {
            return Err(ConfigError::UnknownRegistry(self.registry.clone()));
        }
        if self.registry == "txt" && self.txt_owner_id.is_empty() {
            return Err(ConfigError::EmptyOwnerId);
        }
        if self.policy.parse::<PlanPolicy>().is_err() {
            return Err(ConfigError::UnknownPolicy(self.policy.clone()));
        }
        if self.log_format != "text" && self.log_format != "json" {
            return Err(ConfigError::UnknownLogFormat(self.log_format.clone()));
        }
        Ok(())
    }

    /// The namespace filter as an option; an empty flag means unrestricted
    /// within the client's default namespace.
    #[must_use]
    pub fn namespace_option(&self) -> Option<String> {
        if self.namespace.is_empty() {
            None
        } else {
            Some(self.namespace.clone())
        }
    }
}

/// Parse a human duration string: `300ms`, `30s`, `10m`, `12h`, or a bare
/// number of seconds.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("empty duration".to_owned());
    }

    let (number, unit) = match value.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => value.split_at(idx),
        None => (value, "s"),
    };
    let number: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration: {value}"))?;

    match unit {
        "ms" => Ok(Duration::from_millis(number)),
        "s" => Ok(Duration::from_secs(number)),
        "m" => Ok(Duration::from_secs(number * 60)),
        "h" => Ok(Duration::from_secs(number * 3600)),
        other => Err(format!("invalid duration unit: {other}")),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
