// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # Extipy - External IPs Controller for Kubernetes
//!
//! Extipy exposes selected cluster services to the public Internet without a
//! load balancer: it picks a subset of nodes to act as ingress IPs for each
//! annotated Service, publishes DNS records resolving the service's
//! hostnames to those nodes' external addresses, provisions firewall
//! rule-sets permitting the service's ports on those nodes, and pins the
//! Service's `spec.externalIPs` to the nodes' internal addresses.
//!
//! ## Overview
//!
//! The core is a three-way reconciliation engine driven by a common tick:
//!
//! - [`source`] - Derives the desired bundle from annotated Services and the
//!   node inventory
//! - [`plan`] - Diffs current vs. desired state for DNS records, firewall
//!   rule-sets with per-instance bindings, and service external-IPs
//! - [`registry`] - Mediates ownership (TXT markers) and idempotent apply
//!   semantics over the provider ports
//! - [`controller`] - Sequences reads, plans, and applies per tick
//!
//! ## Example
//!
//! A Service opts in through annotations:
//!
//! ```yaml
//! metadata:
//!   annotations:
//!     external-ips.alpha.openfresh.github.io/hostname: game.example.org
//!     external-ips.alpha.openfresh.github.io/selector: group=ingress
//!     external-ips.alpha.openfresh.github.io/maxips: "2"
//! ```
//!
//! The controller then keeps `game.example.org`, the firewall, and the
//! Service's external IPs converged on the two oldest matching nodes.

pub mod config;
pub mod constants;
pub mod controller;
pub mod endpoint;
pub mod extip;
pub mod inbound;
pub mod metrics;
pub mod plan;
pub mod provider;
pub mod registry;
pub mod selector;
pub mod source;
