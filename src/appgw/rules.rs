// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Request routing rule synthesis.
//!
//! Each resolved backend produces one rule per listener its `(ingress, host)`
//! pair is attached to. A `(listener, path)` route belongs to the first Ingress
//! that claims it; later claims are reported as [`BuildIssue::DuplicateRoute`].
//!
//! Rule priorities encode evaluation order: host-bound listeners before any-host
//! listeners, exact paths before prefixes, longer paths before shorter ones and
//! the catch-all last.

use crate::appgw::backends::ResolvedBackend;
use crate::appgw::listeners::ListenerSynthesis;
use crate::appgw::naming::{catch_all_rule_name, rule_base_name, NameRegistry};
use crate::appgw::pools::{Binding, PoolSynthesis};
use crate::appgw::types::{PathMatchKind, PathMatcher, RequestRoutingRule, RuleAction};
use crate::constants::RULE_PRIORITY_BASE;
use crate::context::ResourceKey;
use crate::errors::BuildIssue;
use crate::ingress::IngressPathType;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use tracing::debug;

/// Output of [`synthesize_rules`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSynthesis {
    /// Rules sorted by priority
    pub rules: Vec<RequestRoutingRule>,
    pub issues: Vec<BuildIssue>,
}

/// Map an Ingress path to a gateway path matcher. `None` is the catch-all.
#[must_use]
pub fn path_matcher(path: Option<&str>, path_type: IngressPathType) -> Option<PathMatcher> {
    let path = path?;
    let (kind, value) = match path_type {
        IngressPathType::Exact => (PathMatchKind::Exact, path),
        IngressPathType::Prefix => (PathMatchKind::Prefix, path),
        IngressPathType::ImplementationSpecific => match path.strip_suffix('*') {
            Some(stripped) => (PathMatchKind::Prefix, stripped),
            None => (PathMatchKind::Exact, path),
        },
    };
    if kind == PathMatchKind::Prefix && (value.is_empty() || value == "/") {
        return None;
    }
    Some(PathMatcher {
        kind,
        value: value.to_string(),
    })
}

struct Candidate<'a> {
    listener: &'a str,
    host_bound: bool,
    path: Option<PathMatcher>,
    action: RuleAction,
    /// Owning backend; `None` for a generated catch-all
    backend: Option<&'a ResolvedBackend>,
}

impl Candidate<'_> {
    /// Evaluation order key.
    fn order(&self) -> (bool, &str, u8, Reverse<usize>, &str) {
        let (rank, length, value) = match &self.path {
            Some(PathMatcher {
                kind: PathMatchKind::Exact,
                value,
            }) => (0, value.len(), value.as_str()),
            Some(PathMatcher {
                kind: PathMatchKind::Prefix,
                value,
            }) => (1, value.len(), value.as_str()),
            None => (2, 0, ""),
        };
        (!self.host_bound, self.listener, rank, Reverse(length), value)
    }
}

fn forward(binding: &Binding) -> RuleAction {
    RuleAction::Forward {
        backend_address_pool: binding.pool.clone(),
        backend_http_settings: binding.settings.clone(),
    }
}

/// Derive the routing rules of `backends`.
///
/// `backends` must be in Ingress key order and `pools` synthesized from the same
/// backends, so that `pools.bindings[i]` belongs to `backends[i]`.
#[must_use]
pub fn synthesize_rules(
    backends: &[ResolvedBackend],
    pools: &PoolSynthesis,
    listeners: &ListenerSynthesis,
) -> RuleSynthesis {
    let mut issues = Vec::new();
    let mut owners: BTreeMap<(&str, Option<PathMatcher>), &ResourceKey> = BTreeMap::new();
    let mut candidates = Vec::new();

    for (backend, binding) in backends.iter().zip(&pools.bindings) {
        let path = path_matcher(backend.path.as_deref(), backend.path_type);
        for attachment in listeners.attachments_for(&backend.ingress, backend.host.as_deref()) {
            let route = (attachment.listener.as_str(), path.clone());
            if let Some(owner) = owners.get(&route) {
                issues.push(BuildIssue::DuplicateRoute {
                    ingress: backend.ingress.clone(),
                    listener: attachment.listener.clone(),
                    route: path
                        .as_ref()
                        .map_or_else(|| "*".to_string(), ToString::to_string),
                    owner: (*owner).clone(),
                });
                continue;
            }
            owners.insert(route, &backend.ingress);

            let action = match &attachment.redirect_to {
                Some(target) => RuleAction::Redirect {
                    target_listener: target.clone(),
                    include_path: true,
                    include_query_string: true,
                },
                None => forward(binding),
            };
            candidates.push(Candidate {
                listener: attachment.listener.as_str(),
                host_bound: backend.host.is_some(),
                path: path.clone(),
                action,
                backend: Some(backend),
            });
        }
    }

    let default_binding = PoolSynthesis::default_binding();
    for listener in &listeners.listeners {
        if owners.contains_key(&(listener.name.as_str(), None)) {
            continue;
        }
        debug!(listener = %listener.name, "Adding catch-all rule to default backend");
        candidates.push(Candidate {
            listener: listener.name.as_str(),
            host_bound: listener.host_name.is_some(),
            path: None,
            action: forward(&default_binding),
            backend: None,
        });
    }

    candidates.sort_by(|a, b| a.order().cmp(&b.order()));

    let mut registry = NameRegistry::new();
    let rules = (RULE_PRIORITY_BASE..)
        .zip(candidates)
        .map(|(priority, candidate)| {
            let name = match candidate.backend {
                Some(backend) => {
                    let identity = format!(
                        "{}|{}",
                        candidate.listener,
                        candidate
                            .path
                            .as_ref()
                            .map_or_else(|| "*".to_string(), ToString::to_string)
                    );
                    registry.claim(&rule_base_name(backend), &identity)
                }
                None => registry.claim(&catch_all_rule_name(candidate.listener), candidate.listener),
            };
            RequestRoutingRule {
                name,
                priority,
                http_listener: candidate.listener.to_string(),
                path: candidate.path,
                action: candidate.action,
            }
        })
        .collect();

    RuleSynthesis { rules, issues }
}

#[cfg(test)]
#[path = "rules_tests.rs"]
mod rules_tests;
