// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Resource cache consumed by the configuration builder.
//!
//! The controller keeps one reflector [`Store`] per watched kind. Stores are
//! written by watcher tasks and are safe to read concurrently, but they can change
//! at any moment. A build therefore never reads a store directly: it receives a
//! [`Snapshot`], an owned immutable index taken once at the start of the pass, so
//! every lookup in a pass sees the same state.
//!
//! Lookups are total functions from [`ResourceKey`] to an optional object. An
//! absent object is a normal outcome, not an error.

use crate::ingress::is_managed_ingress;
use k8s_openapi::api::core::v1::{Endpoints, Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::reflector::Store;
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Namespace and name of a namespaced Kubernetes object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of an existing object. Cluster-scoped objects get an empty namespace.
    #[must_use]
    pub fn of<K: ResourceExt>(object: &K) -> Self {
        Self {
            namespace: object.namespace().unwrap_or_default(),
            name: object.name_any(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Read-only lookup surface used by the builder.
///
/// Implementations must not block and must return the latest locally known value.
pub trait ResourceCache {
    fn get_service(&self, key: &ResourceKey) -> Option<Arc<Service>>;
    fn get_endpoints(&self, key: &ResourceKey) -> Option<Arc<Endpoints>>;
    fn get_secret(&self, key: &ResourceKey) -> Option<Arc<Secret>>;
}

/// Immutable point-in-time view of Services, Endpoints and Secrets.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    services: BTreeMap<ResourceKey, Arc<Service>>,
    endpoints: BTreeMap<ResourceKey, Arc<Endpoints>>,
    secrets: BTreeMap<ResourceKey, Arc<Secret>>,
}

impl Snapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the given objects by key. Later duplicates replace earlier ones.
    pub fn from_objects(
        services: impl IntoIterator<Item = Arc<Service>>,
        endpoints: impl IntoIterator<Item = Arc<Endpoints>>,
        secrets: impl IntoIterator<Item = Arc<Secret>>,
    ) -> Self {
        Self {
            services: index(services),
            endpoints: index(endpoints),
            secrets: index(secrets),
        }
    }

    #[must_use]
    pub fn with_service(mut self, service: Service) -> Self {
        self.services
            .insert(ResourceKey::of(&service), Arc::new(service));
        self
    }

    #[must_use]
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints
            .insert(ResourceKey::of(&endpoints), Arc::new(endpoints));
        self
    }

    #[must_use]
    pub fn with_secret(mut self, secret: Secret) -> Self {
        self.secrets.insert(ResourceKey::of(&secret), Arc::new(secret));
        self
    }

    /// Number of cached objects of each kind: (services, endpoints, secrets).
    #[must_use]
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.services.len(), self.endpoints.len(), self.secrets.len())
    }
}

fn index<K: ResourceExt>(objects: impl IntoIterator<Item = Arc<K>>) -> BTreeMap<ResourceKey, Arc<K>> {
    objects
        .into_iter()
        .map(|object| (ResourceKey::of(object.as_ref()), object))
        .collect()
}

impl ResourceCache for Snapshot {
    fn get_service(&self, key: &ResourceKey) -> Option<Arc<Service>> {
        self.services.get(key).cloned()
    }

    fn get_endpoints(&self, key: &ResourceKey) -> Option<Arc<Endpoints>> {
        self.endpoints.get(key).cloned()
    }

    fn get_secret(&self, key: &ResourceKey) -> Option<Arc<Secret>> {
        self.secrets.get(key).cloned()
    }
}

/// Reflector stores for every kind the controller watches.
///
/// Each store is populated by a dedicated reflector task and provides
/// in-memory access to resources without API calls.
#[derive(Clone)]
pub struct Stores {
    pub ingresses: Store<Ingress>,
    pub services: Store<Service>,
    pub endpoints: Store<Endpoints>,
    pub secrets: Store<Secret>,
}

impl Stores {
    /// Copy the current content of the Service, Endpoints and Secret stores.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_objects(
            self.services.state(),
            self.endpoints.state(),
            self.secrets.state(),
        )
    }

    /// Ingresses handled by this controller's class, ordered by key.
    #[must_use]
    pub fn managed_ingresses(&self, ingress_class: &str) -> Vec<Ingress> {
        let mut ingresses: Vec<Ingress> = self
            .ingresses
            .state()
            .iter()
            .filter(|ingress| is_managed_ingress(ingress, ingress_class))
            .map(|ingress| ingress.as_ref().clone())
            .collect();
        ingresses.sort_by_key(|ingress| ResourceKey::of(ingress));
        ingresses
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
