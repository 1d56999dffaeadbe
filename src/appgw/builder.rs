// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Configuration builder: Ingresses + cluster snapshot → gateway document.
//!
//! The builder runs the synthesizers in dependency order against a single
//! snapshot and merges their output into one [`ConfigurationDocument`]:
//!
//! 1. Ingresses are converted to [`IngressModel`]s and sorted by key
//! 2. Backends are resolved against Services and Endpoints
//! 3. Probes, then pools and HTTP settings referencing them
//! 4. Frontend ports, certificates and listeners
//! 5. Routing rules tying listeners to pools and settings
//! 6. Objects of the deployed document that this controller does not manage are
//!    carried over, unless they refer to something that no longer exists. Managed
//!    rules step around the priorities of carried rules
//!
//! Problems with individual Ingresses never fail the build. They are returned as
//! [`BuildIssue`]s next to the document. The only hard failure is a document
//! with dangling references, which indicates a bug in a synthesizer.
//!
//! # Example
//!
//! ```rust,no_run
//! use appgw_ingress::appgw::ConfigBuilder;
//! use appgw_ingress::context::Snapshot;
//!
//! # fn example(ingresses: Vec<k8s_openapi::api::networking::v1::Ingress>) {
//! let snapshot = Snapshot::new();
//! match ConfigBuilder::new(&snapshot).build(&ingresses) {
//!     Ok(outcome) => println!("{} listeners", outcome.document.http_listeners.len()),
//!     Err(e) => eprintln!("{e}"),
//! }
//! # }
//! ```

use crate::appgw::backends::resolve_backends;
use crate::appgw::listeners::synthesize_listeners;
use crate::appgw::pools::synthesize_pools;
use crate::appgw::probes::synthesize_probes;
use crate::appgw::rules::synthesize_rules;
use crate::appgw::types::{is_managed_name, ConfigurationDocument, RuleAction};
use crate::constants::RULE_PRIORITY_BASE;
use crate::context::ResourceCache;
use crate::errors::{BuildIssue, InvariantViolation};
use crate::ingress::IngressModel;
use k8s_openapi::api::networking::v1::Ingress;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// A built document and the problems found while building it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub document: ConfigurationDocument,
    pub issues: Vec<BuildIssue>,
}

/// Builds gateway configuration from one consistent view of the cluster.
pub struct ConfigBuilder<'a, C: ResourceCache> {
    cache: &'a C,
    existing: Option<&'a ConfigurationDocument>,
}

impl<'a, C: ResourceCache> ConfigBuilder<'a, C> {
    #[must_use]
    pub fn new(cache: &'a C) -> Self {
        Self {
            cache,
            existing: None,
        }
    }

    /// Preserve the unmanaged objects of the currently deployed document.
    #[must_use]
    pub fn with_existing(mut self, existing: &'a ConfigurationDocument) -> Self {
        self.existing = Some(existing);
        self
    }

    /// Build the document for `ingresses`.
    ///
    /// The result only depends on the ingresses (not their order), the cache
    /// content and the existing document.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantViolation`] if the assembled document refers to an object
    /// it does not contain.
    pub fn build(&self, ingresses: &[Ingress]) -> Result<BuildOutcome, InvariantViolation> {
        let mut issues = Vec::new();

        let mut models: Vec<IngressModel> = ingresses
            .iter()
            .map(|ingress| {
                let (model, model_issues) = IngressModel::from_ingress(ingress);
                issues.extend(model_issues);
                model
            })
            .collect();
        models.sort_by(|a, b| a.key.cmp(&b.key));
        models.dedup_by(|a, b| a.key == b.key);

        let (backends, backend_issues) = resolve_backends(&models, self.cache);
        issues.extend(backend_issues);

        let probes = synthesize_probes(&backends);
        let pools = synthesize_pools(&backends, &probes);
        let listeners = synthesize_listeners(&models, self.cache);
        let rules = synthesize_rules(&backends, &pools, &listeners);
        issues.extend(listeners.issues);
        issues.extend(rules.issues);

        let mut document = ConfigurationDocument {
            probes: probes.probes,
            backend_address_pools: pools.pools,
            backend_http_settings: pools.settings,
            frontend_ports: listeners.frontend_ports,
            ssl_certificates: listeners.ssl_certificates,
            http_listeners: listeners.listeners,
            request_routing_rules: rules.rules,
        };

        if let Some(existing) = self.existing {
            issues.extend(merge_extraneous(&mut document, existing));
        }
        document.sort();

        let dangling = document.dangling_references();
        if !dangling.is_empty() {
            return Err(InvariantViolation { dangling });
        }

        debug!(
            ingresses = models.len(),
            backends = backends.len(),
            issues = issues.len(),
            "Built gateway configuration"
        );

        Ok(BuildOutcome { document, issues })
    }
}

/// Build with no deployed document to preserve.
///
/// # Errors
///
/// See [`ConfigBuilder::build`].
pub fn build(
    ingresses: &[Ingress],
    cache: &impl ResourceCache,
) -> Result<BuildOutcome, InvariantViolation> {
    ConfigBuilder::new(cache).build(ingresses)
}

fn dropped(kind: &str, name: &str, reason: String) -> BuildIssue {
    BuildIssue::ExtraneousDropped {
        kind: kind.to_string(),
        name: name.to_string(),
        reason,
    }
}

/// Names already present in `items`.
fn names<T>(items: &[T], name: impl Fn(&T) -> &str) -> BTreeSet<String> {
    items.iter().map(|item| name(item).to_string()).collect()
}

/// Append the unmanaged objects of `existing` to `document`.
///
/// Unmanaged objects referring to something missing from the merged document are
/// dropped, repeatedly, until every remaining reference resolves.
fn merge_extraneous(
    document: &mut ConfigurationDocument,
    existing: &ConfigurationDocument,
) -> Vec<BuildIssue> {
    fn carry<T: Clone>(target: &mut Vec<T>, source: &[T], name: impl Fn(&T) -> &str) {
        let mut taken = names(target, &name);
        for item in source {
            if !is_managed_name(name(item)) && taken.insert(name(item).to_string()) {
                target.push(item.clone());
            }
        }
    }

    carry(&mut document.probes, &existing.probes, |p| p.name.as_str());
    carry(
        &mut document.backend_address_pools,
        &existing.backend_address_pools,
        |p| p.name.as_str(),
    );
    carry(
        &mut document.backend_http_settings,
        &existing.backend_http_settings,
        |s| s.name.as_str(),
    );
    carry(
        &mut document.ssl_certificates,
        &existing.ssl_certificates,
        |c| c.name.as_str(),
    );
    carry(
        &mut document.http_listeners,
        &existing.http_listeners,
        |l| l.name.as_str(),
    );
    carry(
        &mut document.request_routing_rules,
        &existing.request_routing_rules,
        |r| r.name.as_str(),
    );

    let mut issues = Vec::new();

    // a gateway cannot expose one port number twice
    let mut bound: BTreeMap<i32, String> = document
        .frontend_ports
        .iter()
        .map(|port| (port.port, port.name.clone()))
        .collect();
    let mut taken = names(&document.frontend_ports, |p| p.name.as_str());
    for port in &existing.frontend_ports {
        if is_managed_name(&port.name) || !taken.insert(port.name.clone()) {
            continue;
        }
        match bound.get(&port.port) {
            Some(owner) => issues.push(dropped(
                "frontend port",
                &port.name,
                format!("port {} is already bound by '{owner}'", port.port),
            )),
            None => {
                bound.insert(port.port, port.name.clone());
                document.frontend_ports.push(port.clone());
            }
        }
    }

    loop {
        let probes = names(&document.probes, |p| p.name.as_str());
        let pools = names(&document.backend_address_pools, |p| p.name.as_str());
        let settings = names(&document.backend_http_settings, |s| s.name.as_str());
        let ports = names(&document.frontend_ports, |p| p.name.as_str());
        let certificates = names(&document.ssl_certificates, |c| c.name.as_str());
        let listeners = names(&document.http_listeners, |l| l.name.as_str());
        let before = issues.len();

        document.backend_http_settings.retain(|s| {
            if is_managed_name(&s.name) || probes.contains(&s.probe) {
                return true;
            }
            issues.push(dropped(
                "http settings",
                &s.name,
                format!("probe '{}' does not exist", s.probe),
            ));
            false
        });

        document.http_listeners.retain(|l| {
            if is_managed_name(&l.name) {
                return true;
            }
            let missing = if !ports.contains(&l.frontend_port) {
                Some(format!("frontend port '{}' does not exist", l.frontend_port))
            } else {
                l.ssl_certificate
                    .as_ref()
                    .filter(|cert| !certificates.contains(*cert))
                    .map(|cert| format!("certificate '{cert}' does not exist"))
            };
            match missing {
                Some(reason) => {
                    issues.push(dropped("listener", &l.name, reason));
                    false
                }
                None => true,
            }
        });

        document.request_routing_rules.retain(|r| {
            if is_managed_name(&r.name) {
                return true;
            }
            let missing = if !listeners.contains(&r.http_listener) {
                Some(format!("listener '{}' does not exist", r.http_listener))
            } else {
                match &r.action {
                    RuleAction::Forward {
                        backend_address_pool,
                        backend_http_settings,
                    } => {
                        if !pools.contains(backend_address_pool) {
                            Some(format!("pool '{backend_address_pool}' does not exist"))
                        } else if !settings.contains(backend_http_settings) {
                            Some(format!(
                                "http settings '{backend_http_settings}' does not exist"
                            ))
                        } else {
                            None
                        }
                    }
                    RuleAction::Redirect {
                        target_listener, ..
                    } => (!listeners.contains(target_listener))
                        .then(|| format!("redirect listener '{target_listener}' does not exist")),
                }
            };
            match missing {
                Some(reason) => {
                    issues.push(dropped("routing rule", &r.name, reason));
                    false
                }
                None => true,
            }
        });

        if issues.len() == before {
            break;
        }
    }

    issues.extend(renumber_managed_rules(document));
    issues
}

/// Give managed rules priorities no unmanaged rule holds.
///
/// Managed rules keep their relative order and stay as close to
/// [`RULE_PRIORITY_BASE`] as the unmanaged priorities allow. Of two unmanaged
/// rules sharing a priority, the later one is dropped.
fn renumber_managed_rules(document: &mut ConfigurationDocument) -> Vec<BuildIssue> {
    let mut issues = Vec::new();
    let mut reserved = BTreeSet::new();
    document.request_routing_rules.retain(|r| {
        if is_managed_name(&r.name) || reserved.insert(r.priority) {
            return true;
        }
        issues.push(dropped(
            "routing rule",
            &r.name,
            format!("priority {} is already used by another rule", r.priority),
        ));
        false
    });

    let mut next = RULE_PRIORITY_BASE;
    for rule in document
        .request_routing_rules
        .iter_mut()
        .filter(|r| is_managed_name(&r.name))
    {
        while reserved.contains(&next) {
            next += 1;
        }
        rule.priority = next;
        next += 1;
    }

    issues
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod builder_tests;
