// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Deterministic names for gateway objects.
//!
//! Names are persistent identities on the gateway: renaming an object forces the
//! control plane to delete and recreate it. Every name is therefore a pure function
//! of the input:
//!
//! - `k8s-ag-ingress-defaultprobe` (and the other default objects) are fixed.
//! - Derived probe names are `k8s-ag-ingress-{namespace}-{service}-{port}-pb-{ingress}-{hash}`
//!   where `port` is the resolved Service port number and `hash` the first 8 hex
//!   characters of the SHA-256 of the probe key, so a probe keeps its name when
//!   sibling probes of the same Ingress come and go.
//! - Characters outside `[A-Za-z0-9._-]` become `-` (`*` becomes `wildcard`).
//! - Names longer than 80 characters are cut and suffixed with the first
//!   8 hex characters of the SHA-256 of the full name.
//! - A name claimed twice in one pass gets `-{8 hex}` of the SHA-256 of the second
//!   claimant's identity appended. Synthesizers claim in sorted identity order, so
//!   the same input always hands out the same names.

use crate::appgw::backends::ResolvedBackend;
use crate::constants::{
    DEFAULT_HTTP_SETTINGS_SUFFIX, DEFAULT_POOL_SUFFIX, DEFAULT_PROBE_SUFFIX, MANAGED_PREFIX,
    MAX_NAME_LENGTH, NAME_HASH_LENGTH,
};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

#[must_use]
pub fn default_probe_name() -> String {
    format!("{MANAGED_PREFIX}-{DEFAULT_PROBE_SUFFIX}")
}

#[must_use]
pub fn default_pool_name() -> String {
    format!("{MANAGED_PREFIX}-{DEFAULT_POOL_SUFFIX}")
}

#[must_use]
pub fn default_http_settings_name() -> String {
    format!("{MANAGED_PREFIX}-{DEFAULT_HTTP_SETTINGS_SUFFIX}")
}

#[must_use]
pub fn frontend_port_name(port: i32) -> String {
    format!("{MANAGED_PREFIX}-fp-{port}")
}

/// Listener for `host` on `port`; `None` is the listener accepting any host.
#[must_use]
pub fn listener_name(host: Option<&str>, port: i32) -> String {
    fit(&format!(
        "{MANAGED_PREFIX}-fl-{}-{port}",
        sanitize(host.unwrap_or("default"))
    ))
}

#[must_use]
pub fn ssl_certificate_name(namespace: &str, secret: &str) -> String {
    fit(&format!(
        "{MANAGED_PREFIX}-{}-{}",
        sanitize(namespace),
        sanitize(secret)
    ))
}

/// Catch-all rule added to a listener that has none.
#[must_use]
pub fn catch_all_rule_name(listener: &str) -> String {
    fit(&format!("{listener}-rr-default"))
}

fn backend_stem(backend: &ResolvedBackend) -> String {
    format!(
        "{MANAGED_PREFIX}-{}-{}-{}",
        sanitize(&backend.service.namespace),
        sanitize(&backend.service.name),
        backend.service_port
    )
}

#[must_use]
pub fn probe_base_name(backend: &ResolvedBackend) -> String {
    format!(
        "{}-pb-{}",
        backend_stem(backend),
        sanitize(&backend.ingress.name)
    )
}

/// Name of the probe with key text `identity` first required by `backend`.
#[must_use]
pub fn probe_name(backend: &ResolvedBackend, identity: &str) -> String {
    fit(&format!("{}-{}", probe_base_name(backend), short_hash(identity)))
}

#[must_use]
pub fn pool_base_name(backend: &ResolvedBackend) -> String {
    format!("{}-bp-pool", backend_stem(backend))
}

#[must_use]
pub fn http_settings_base_name(backend: &ResolvedBackend) -> String {
    format!(
        "{}-bp-{}-{}",
        backend_stem(backend),
        backend.backend_port,
        sanitize(&backend.ingress.name)
    )
}

#[must_use]
pub fn rule_base_name(backend: &ResolvedBackend) -> String {
    format!(
        "{MANAGED_PREFIX}-rr-{}-{}-{}-{}",
        sanitize(&backend.ingress.namespace),
        sanitize(&backend.ingress.name),
        sanitize(&backend.service.name),
        backend.service_port
    )
}

/// Replace characters the gateway does not accept in names.
#[must_use]
pub fn sanitize(value: &str) -> String {
    value
        .replace('*', "wildcard")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Cut names that exceed the gateway limit, keeping them unique via a hash suffix.
#[must_use]
pub fn fit(name: &str) -> String {
    if name.len() <= MAX_NAME_LENGTH {
        return name.to_string();
    }
    let keep = MAX_NAME_LENGTH - NAME_HASH_LENGTH - 1;
    let mut cut = keep;
    while !name.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}-{}", &name[..cut], short_hash(name))
}

fn short_hash(value: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(value.as_bytes()));
    digest[..NAME_HASH_LENGTH].to_string()
}

/// Hands out unique names within one build.
#[derive(Debug, Default)]
pub struct NameRegistry {
    taken: BTreeSet<String>,
}

impl NameRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `name` as-is. Returns `false` when it was already taken.
    pub fn reserve(&mut self, name: &str) -> bool {
        self.taken.insert(name.to_string())
    }

    /// Claim `base`, or a disambiguated variant when `base` is taken.
    ///
    /// `identity` must uniquely describe the claiming object; it seeds the suffix.
    pub fn claim(&mut self, base: &str, identity: &str) -> String {
        let candidate = fit(base);
        if self.taken.insert(candidate.clone()) {
            return candidate;
        }
        let mut seed = identity.to_string();
        loop {
            let candidate = fit(&format!("{base}-{}", short_hash(&seed)));
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            seed.push('+');
        }
    }
}

#[cfg(test)]
#[path = "naming_tests.rs"]
mod naming_tests;
