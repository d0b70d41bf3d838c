// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired-state / current-state diff engines.
//!
//! Three independent plan engines share a common shape: key both sides of the
//! world into a table, then walk the rows emitting create/update/delete
//! actions. Each engine has its own keying, conflict resolution, and change
//! vocabulary:
//!
//! - [`dns`] diffs DNS endpoints by sanitized name under a policy chain.
//! - [`firewall`] diffs rule-sets by name and instance bindings by
//!   `(provider id, rule-set name)`.
//! - [`extip`] diffs per-service external-IP lists into update pairs only.

pub mod dns;
pub mod extip;
pub mod firewall;

pub use dns::{DnsChanges, DnsPlan, PlanPolicy};
pub use extip::{ExtIpChanges, ExtIpPlan};
pub use firewall::{FirewallChanges, FirewallPlan, InstanceBinding};
