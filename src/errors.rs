// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types produced while building gateway configuration.
//!
//! This module provides two kinds of errors:
//! - [`BuildIssue`] - non-fatal, per-Ingress problems. The offending rule (or TLS
//!   section, or annotation) is left out of the document and the build carries on.
//! - [`InvariantViolation`] - the finished document references an object that does
//!   not exist. This is a programming error and aborts the build.
//!
//! Issues are collected and returned alongside the document so that one malformed
//! Ingress never blocks configuration of the rest of the cluster.

use crate::context::ResourceKey;
use thiserror::Error;

/// How serious a [`BuildIssue`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// A default value was used in place of bad input
    Warning,
    /// Part of an Ingress was left out of the document
    Error,
}

impl Severity {
    /// Lower-case label used in logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// Non-fatal problems found while translating Ingresses into gateway configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildIssue {
    /// The Service named by an Ingress backend is not in the cache
    ///
    /// The rule is excluded. The Service may not exist yet, or the cache may not
    /// have caught up with it.
    #[error("Ingress '{ingress}': backend service '{service}' not found")]
    ServiceNotFound {
        /// Ingress owning the rule
        ingress: ResourceKey,
        /// Service that could not be found
        service: ResourceKey,
    },

    /// No Service port matches the backend port reference
    ///
    /// Numeric references match port numbers only, named references match port
    /// names only.
    #[error("Ingress '{ingress}': service '{service}' has no port matching '{port}'")]
    PortNotFound {
        /// Ingress owning the rule
        ingress: ResourceKey,
        /// Service that was searched
        service: ResourceKey,
        /// The port reference as written in the Ingress
        port: String,
    },

    /// The matching Service port is not TCP
    #[error(
        "Ingress '{ingress}': service '{service}' port '{port}' uses protocol {protocol}, only TCP backends are supported"
    )]
    UnsupportedProtocol {
        /// Ingress owning the rule
        ingress: ResourceKey,
        /// Service whose port matched
        service: ResourceKey,
        /// The port reference as written in the Ingress
        port: String,
        /// Protocol of the matched port
        protocol: String,
    },

    /// The Ingress backend cannot be translated (resource backend, missing port, ...)
    #[error("Ingress '{ingress}': invalid backend: {reason}")]
    InvalidBackend {
        /// Ingress owning the backend
        ingress: ResourceKey,
        /// What is wrong with the backend
        reason: String,
    },

    /// An annotation value could not be parsed; the default was used instead
    #[error("Ingress '{ingress}': annotation '{annotation}' has invalid value '{value}': {reason}")]
    MalformedAnnotation {
        /// Ingress carrying the annotation
        ingress: ResourceKey,
        /// Annotation key
        annotation: String,
        /// Raw annotation value
        value: String,
        /// Why the value was rejected
        reason: String,
    },

    /// A TLS section references a Secret that is not in the cache
    #[error("Ingress '{ingress}': TLS secret '{secret}' not found, TLS skipped")]
    SecretNotFound {
        /// Ingress owning the TLS section
        ingress: ResourceKey,
        /// Secret that could not be found
        secret: ResourceKey,
    },

    /// A TLS Secret exists but cannot be used
    #[error("Ingress '{ingress}': TLS secret '{secret}' is invalid, TLS skipped: {reason}")]
    InvalidSecret {
        /// Ingress owning the TLS section
        ingress: ResourceKey,
        /// Secret that was rejected
        secret: ResourceKey,
        /// Why the secret was rejected
        reason: String,
    },

    /// Another Ingress already routes the same listener and path
    #[error(
        "Ingress '{ingress}': route '{route}' on listener '{listener}' is already defined by Ingress '{owner}'"
    )]
    DuplicateRoute {
        /// Ingress whose rule was dropped
        ingress: ResourceKey,
        /// Listener name
        listener: String,
        /// Path description (`*` for a catch-all)
        route: String,
        /// Ingress that owns the route
        owner: ResourceKey,
    },

    /// An unmanaged object from the deployed configuration had to be dropped
    #[error("extraneous {kind} '{name}' dropped: {reason}")]
    ExtraneousDropped {
        /// Object kind (e.g. `routing rule`)
        kind: String,
        /// Object name
        name: String,
        /// Which reference could not be resolved
        reason: String,
    },
}

impl BuildIssue {
    /// Severity of this issue.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            BuildIssue::MalformedAnnotation { .. } | BuildIssue::ExtraneousDropped { .. } => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }

    /// The Ingress this issue belongs to, if any.
    #[must_use]
    pub fn ingress(&self) -> Option<&ResourceKey> {
        match self {
            BuildIssue::ServiceNotFound { ingress, .. }
            | BuildIssue::PortNotFound { ingress, .. }
            | BuildIssue::UnsupportedProtocol { ingress, .. }
            | BuildIssue::InvalidBackend { ingress, .. }
            | BuildIssue::MalformedAnnotation { ingress, .. }
            | BuildIssue::SecretNotFound { ingress, .. }
            | BuildIssue::InvalidSecret { ingress, .. }
            | BuildIssue::DuplicateRoute { ingress, .. } => Some(ingress),
            BuildIssue::ExtraneousDropped { .. } => None,
        }
    }

    /// Short snake_case label used as a metrics dimension.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            BuildIssue::ServiceNotFound { .. } => "service_not_found",
            BuildIssue::PortNotFound { .. } => "port_not_found",
            BuildIssue::UnsupportedProtocol { .. } => "unsupported_protocol",
            BuildIssue::InvalidBackend { .. } => "invalid_backend",
            BuildIssue::MalformedAnnotation { .. } => "malformed_annotation",
            BuildIssue::SecretNotFound { .. } => "secret_not_found",
            BuildIssue::InvalidSecret { .. } => "invalid_secret",
            BuildIssue::DuplicateRoute { .. } => "duplicate_route",
            BuildIssue::ExtraneousDropped { .. } => "extraneous_dropped",
        }
    }
}

/// The built document refers to objects it does not contain.
///
/// Synthesizers run in dependency order, so this only happens when a synthesizer
/// is wrong. The document is discarded rather than handed to the gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("configuration document has {} dangling reference(s): {}", .dangling.len(), .dangling.join("; "))]
pub struct InvariantViolation {
    /// One entry per unresolved reference, e.g. `routing rule 'x' -> pool 'y'`
    pub dangling: Vec<String>,
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
