// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Registries: ownership and lifecycle decorators over the provider ports.
//!
//! The DNS registries mediate multi-tenant ownership of a shared zone. The
//! [`TxtRegistry`] partitions ownership with co-managed TXT marker records;
//! the [`NoopRegistry`] passes everything through for single-tenant zones.
//! The firewall and external-IP registries are thin lifecycle wrappers with
//! no ownership semantics of their own.

pub mod extip;
pub mod firewall;
pub mod noop;
pub mod txt;

pub use extip::ExtIpRegistry;
pub use firewall::FirewallRegistry;
pub use noop::NoopRegistry;
pub use txt::TxtRegistry;

use anyhow::Result;
use async_trait::async_trait;

use crate::endpoint::DnsEndpoint;
use crate::plan::DnsChanges;

/// The contract the controller consumes for DNS state: the same surface as a
/// provider, with ownership semantics layered in by the implementation.
#[async_trait]
pub trait DnsRegistry: Send + Sync {
    async fn records(&self) -> Result<Vec<DnsEndpoint>>;

    async fn apply_changes(&self, changes: &DnsChanges) -> Result<()>;
}
