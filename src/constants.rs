// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Application Gateway ingress controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Naming Constants
// ============================================================================

/// Prefix carried by every gateway object this controller owns.
///
/// Objects whose names do not start with this prefix are considered
/// extraneous and are carried over untouched.
pub const MANAGED_PREFIX: &str = "k8s-ag-ingress";

/// Suffix of the catch-all health probe
pub const DEFAULT_PROBE_SUFFIX: &str = "defaultprobe";

/// Suffix of the empty catch-all backend address pool
pub const DEFAULT_POOL_SUFFIX: &str = "defaultaddresspool";

/// Suffix of the catch-all backend HTTP settings
pub const DEFAULT_HTTP_SETTINGS_SUFFIX: &str = "defaulthttpsetting";

/// Maximum length of a gateway object name
pub const MAX_NAME_LENGTH: usize = 80;

/// Number of hex characters used when a name needs a hash suffix
pub const NAME_HASH_LENGTH: usize = 8;

// ============================================================================
// Health Probe Constants
// ============================================================================

/// Host used by probes when neither the rule nor an annotation names one
pub const DEFAULT_PROBE_HOST: &str = "localhost";

/// Path used by probes when no annotation overrides it
pub const DEFAULT_PROBE_PATH: &str = "/";

/// Probe interval in seconds
pub const DEFAULT_PROBE_INTERVAL_SECS: i32 = 30;

/// Probe timeout in seconds
pub const DEFAULT_PROBE_TIMEOUT_SECS: i32 = 30;

/// Consecutive failures before a backend is marked unhealthy
pub const DEFAULT_PROBE_UNHEALTHY_THRESHOLD: i32 = 3;

/// Upper bound accepted for probe interval and timeout overrides
pub const MAX_PROBE_INTERVAL_SECS: i32 = 86_400;

/// Upper bound accepted for the unhealthy threshold override
pub const MAX_PROBE_UNHEALTHY_THRESHOLD: i32 = 20;

// ============================================================================
// Backend HTTP Settings Constants
// ============================================================================

/// Backend request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: i32 = 30;

/// Upper bound accepted for the request timeout override
pub const MAX_REQUEST_TIMEOUT_SECS: i32 = 86_400;

/// Connection draining timeout in seconds when draining is enabled without a value
pub const DEFAULT_CONNECTION_DRAINING_TIMEOUT_SECS: i32 = 30;

/// Upper bound accepted for the connection draining timeout
pub const MAX_CONNECTION_DRAINING_TIMEOUT_SECS: i32 = 3600;

/// Port used by the catch-all HTTP settings
pub const DEFAULT_BACKEND_PORT: i32 = 80;

// ============================================================================
// Frontend Constants
// ============================================================================

/// Plain HTTP frontend port
pub const HTTP_FRONTEND_PORT: i32 = 80;

/// TLS frontend port
pub const HTTPS_FRONTEND_PORT: i32 = 443;

/// Priority given to the first routing rule; later rules count up from here
pub const RULE_PRIORITY_BASE: u32 = 100;

// ============================================================================
// Kubernetes Constants
// ============================================================================

/// Ingress class handled when none is configured
pub const DEFAULT_INGRESS_CLASS: &str = "azure/application-gateway";

/// Secret key holding the PEM certificate chain
pub const TLS_CERT_KEY: &str = "tls.crt";

/// Secret key holding the PEM private key
pub const TLS_PRIVATE_KEY_KEY: &str = "tls.key";

/// Service port protocol accepted for layer-7 backends
pub const PROTOCOL_TCP: &str = "TCP";

// ============================================================================
// Controller Constants
// ============================================================================

/// Quiet period after a watch event before a reconciliation pass starts
pub const DEFAULT_DEBOUNCE_MILLIS: u64 = 500;

/// Delay before retrying a failed reconciliation pass (30 seconds)
pub const RECONCILE_RETRY_SECS: u64 = 30;

/// Default leader election lease name
pub const DEFAULT_LEASE_NAME: &str = "appgw-ingress-leader";

/// Default leader election lease duration (15 seconds)
pub const DEFAULT_LEASE_DURATION_SECS: u64 = 15;

/// Default leader election grace period (5 seconds)
pub const DEFAULT_LEASE_GRACE_SECS: u64 = 5;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
