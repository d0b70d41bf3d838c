// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired-state sources.
//!
//! A source derives the desired `{DNS endpoints, firewall rule-sets, service
//! external-IP bindings}` bundle from the cluster. The only built-in kind is
//! [`ServiceSource`], which reads annotated Service objects; [`MultiSource`]
//! concatenates the bundles of several sources and is the extensibility
//! point for additional kinds.

pub mod multi;
pub mod service;

pub use multi::MultiSource;
pub use service::ServiceSource;

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use async_trait::async_trait;
use kube::Client;
use thiserror::Error;

use crate::constants::{
    CONTROLLER_ANNOTATION_KEY, CONTROLLER_ANNOTATION_VALUE, HOSTNAME_ANNOTATION_KEY,
    MAXIPS_ANNOTATION_KEY, SELECTOR_ANNOTATION_KEY, SOURCE_SERVICE, TTL_ANNOTATION_KEY,
    TTL_MAXIMUM, TTL_MINIMUM,
};
use crate::endpoint::DnsEndpoint;
use crate::extip::ServiceExtIp;
use crate::inbound::InboundRuleSet;
use crate::selector::{Selector, SelectorParseError};

/// The desired state derived from the cluster in one tick.
#[derive(Debug, Clone, Default)]
pub struct DesiredBundle {
    pub endpoints: Vec<DnsEndpoint>,
    pub rule_sets: Vec<InboundRuleSet>,
    pub service_ext_ips: Vec<ServiceExtIp>,
}

/// The interface desired-state sources implement.
#[async_trait]
pub trait Source: Send + Sync {
    async fn bundle(&self) -> Result<DesiredBundle>;
}

/// Shared configuration options for all sources.
#[derive(Debug, Clone, Default)]
pub struct SourceConfig {
    /// Restrict the service listing to one namespace; `None` means the
    /// client's default namespace.
    pub namespace: Option<String>,
    /// Label-selector expression matched against service annotations.
    pub annotation_filter: String,
    /// Template for hostnames of services without a hostname annotation.
    pub fqdn_template: String,
    /// Combine template hostnames with annotation hostnames instead of
    /// falling back.
    pub combine_fqdn_and_annotation: bool,
    /// Publish node internal IPs as DNS targets instead of external IPs.
    pub publish_internal: bool,
}

/// Returns sources for the requested kinds, sharing one cluster client.
///
/// # Errors
///
/// Fails on unknown source names or invalid source configuration.
pub fn by_names(
    client: &Client,
    names: &[String],
    config: &SourceConfig,
    cluster_name: &str,
) -> Result<Vec<Box<dyn Source>>> {
    let mut sources: Vec<Box<dyn Source>> = Vec::with_capacity(names.len());
    for name in names {
        match name.as_str() {
            SOURCE_SERVICE => {
                sources.push(Box::new(ServiceSource::new(
                    client.clone(),
                    cluster_name,
                    config,
                )?));
            }
            other => bail!("source not found: {other}"),
        }
    }
    Ok(sources)
}

/// A malformed per-service annotation. Fails that service's contribution for
/// the tick without failing the tick itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnnotationError {
    #[error("{value:?} is not a valid TTL value")]
    InvalidTtl { value: String },

    #[error("TTL value {value} must be between [{TTL_MINIMUM}, {TTL_MAXIMUM}]")]
    TtlOutOfRange { value: i64 },

    #[error("{value:?} is not a valid max IPs value")]
    InvalidMaxIps { value: String },

    #[error(transparent)]
    InvalidSelector(#[from] SelectorParseError),
}

/// The comma-separated hostname list, with whitespace stripped. Empty when
/// the annotation is absent; services without hostnames emit nothing.
pub(crate) fn hostnames_from_annotations(annotations: &BTreeMap<String, String>) -> Vec<String> {
    let Some(value) = annotations.get(HOSTNAME_ANNOTATION_KEY) else {
        return Vec::new();
    };
    value
        .replace(' ', "")
        .split(',')
        .filter(|h| !h.is_empty())
        .map(str::to_owned)
        .collect()
}

/// The desired record TTL, validated against the DNS TTL range.
pub(crate) fn ttl_from_annotations(
    annotations: &BTreeMap<String, String>,
) -> Result<Option<u32>, AnnotationError> {
    let Some(value) = annotations.get(TTL_ANNOTATION_KEY) else {
        return Ok(None);
    };
    let ttl: i64 = value.parse().map_err(|_| AnnotationError::InvalidTtl {
        value: value.clone(),
    })?;
    if !(TTL_MINIMUM..=TTL_MAXIMUM).contains(&ttl) {
        return Err(AnnotationError::TtlOutOfRange { value: ttl });
    }
    let ttl = u32::try_from(ttl).map_err(|_| AnnotationError::TtlOutOfRange { value: ttl })?;
    Ok(Some(ttl))
}

/// The node label selector restricting candidate nodes, if any.
pub(crate) fn selector_from_annotations(
    annotations: &BTreeMap<String, String>,
) -> Result<Option<Selector>, AnnotationError> {
    let Some(value) = annotations.get(SELECTOR_ANNOTATION_KEY) else {
        return Ok(None);
    };
    Ok(Some(Selector::parse(value)?))
}

/// The cap on selected candidate nodes; 0 means unbounded.
pub(crate) fn max_ips_from_annotations(
    annotations: &BTreeMap<String, String>,
) -> Result<usize, AnnotationError> {
    let Some(value) = annotations.get(MAXIPS_ANNOTATION_KEY) else {
        return Ok(0);
    };
    value.parse().map_err(|_| AnnotationError::InvalidMaxIps {
        value: value.clone(),
    })
}

/// Whether this controller is responsible for the service: the controller
/// annotation is absent or names us.
pub(crate) fn is_responsible(annotations: &BTreeMap<String, String>) -> bool {
    annotations
        .get(CONTROLLER_ANNOTATION_KEY)
        .is_none_or(|value| value == CONTROLLER_ANNOTATION_VALUE)
}
