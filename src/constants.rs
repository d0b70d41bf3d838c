// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the extipy controller.
//!
//! This module contains the annotation compatibility surface and the numeric
//! and string constants used throughout the codebase, organized by category.

// ============================================================================
// Annotation Compatibility Surface
// ============================================================================

/// Prefix shared by every recognized per-service annotation. This surface is
/// part of the external compatibility contract and must not change.
pub const ANNOTATION_PREFIX: &str = "external-ips.alpha.openfresh.github.io/";

/// Annotation defining the desired hostnames (comma-separated)
pub const HOSTNAME_ANNOTATION_KEY: &str = "external-ips.alpha.openfresh.github.io/hostname";

/// Annotation restricting candidate nodes via a label selector
pub const SELECTOR_ANNOTATION_KEY: &str = "external-ips.alpha.openfresh.github.io/selector";

/// Annotation capping how many candidate nodes are selected (0 = unbounded)
pub const MAXIPS_ANNOTATION_KEY: &str = "external-ips.alpha.openfresh.github.io/maxips";

/// Annotation defining the desired DNS record TTL
pub const TTL_ANNOTATION_KEY: &str = "external-ips.alpha.openfresh.github.io/ttl";

/// Annotation naming the controller responsible for the service
pub const CONTROLLER_ANNOTATION_KEY: &str = "external-ips.alpha.openfresh.github.io/controller";

/// The controller annotation value that makes us feel responsible
pub const CONTROLLER_ANNOTATION_VALUE: &str = "dns-controller";

// ============================================================================
// DNS Protocol Constants
// ============================================================================

/// Lowest TTL accepted from the ttl annotation
pub const TTL_MINIMUM: i64 = 1;

/// Highest TTL accepted from the ttl annotation (2^32 - 1)
pub const TTL_MAXIMUM: i64 = u32::MAX as i64;

/// Protocol assumed for service ports that carry none
pub const DEFAULT_PROTOCOL: &str = "tcp";

// ============================================================================
// Source Constants
// ============================================================================

/// Name of the built-in service source
pub const SOURCE_SERVICE: &str = "service";

/// Prefix of the `resource` back-reference label emitted by the service
/// source (`service/<namespace>/<name>`)
pub const RESOURCE_LABEL_PREFIX: &str = "service/";

/// The namespace segment omitted from rule-set names
pub const DEFAULT_NAMESPACE: &str = "default";

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for the Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Default bind address for the metrics HTTP server
pub const DEFAULT_METRICS_ADDRESS: &str = "0.0.0.0:7979";

/// Path for the Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Path for the liveness endpoint
pub const HEALTHZ_SERVER_PATH: &str = "/healthz";
