// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Controller loop: watch the cluster, rebuild the gateway document, apply it.
//!
//! Reflectors keep in-memory stores of Ingresses, Services, Endpoints and Secrets.
//! Every watch event pokes a single reconciliation task, which waits for the
//! debounce period, snapshots the stores and runs the builder. At most one pass
//! runs at any time.
//!
//! The document is handed to a [`ConfigApplier`]. Applying is skipped when the
//! new document equals the deployed one.

use crate::appgw::{ConfigBuilder, ConfigurationDocument};
use crate::config::{ControllerConfig, LeaderElectionConfig, OutputFormat};
use crate::constants::RECONCILE_RETRY_SECS;
use crate::context::{Snapshot, Stores};
use crate::errors::Severity;
use crate::metrics;
use anyhow::{Context as _, Result};
use async_trait::async_trait;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Endpoints, Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::NamespaceResourceScope;
use kube::runtime::reflector::{self, Store};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, Resource};
use kube_lease_manager::{LeaseManager, LeaseManagerBuilder};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Destination of built documents.
#[async_trait]
pub trait ConfigApplier: Send + Sync {
    /// The currently deployed document, if any.
    async fn current(&self) -> Result<Option<ConfigurationDocument>>;

    /// Deploy `document`.
    async fn apply(&self, document: &ConfigurationDocument) -> Result<()>;
}

/// Logs a summary of each document and remembers the last one.
#[derive(Default)]
pub struct LogApplier {
    last: RwLock<Option<ConfigurationDocument>>,
}

impl LogApplier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigApplier for LogApplier {
    async fn current(&self) -> Result<Option<ConfigurationDocument>> {
        Ok(self.last.read().await.clone())
    }

    async fn apply(&self, document: &ConfigurationDocument) -> Result<()> {
        let [probes, pools, settings, ports, certificates, listeners, rules] =
            document.object_counts().map(|(_, count)| count);
        info!(
            probes,
            pools,
            settings,
            ports,
            certificates,
            listeners,
            rules,
            "Gateway configuration updated"
        );
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(document = %serde_json::to_string(document)?, "Gateway configuration document");
        }
        *self.last.write().await = Some(document.clone());
        Ok(())
    }
}

/// Reads and writes the document as a JSON or YAML file.
pub struct FileApplier {
    path: PathBuf,
    format: OutputFormat,
}

impl FileApplier {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    fn encode(&self, document: &ConfigurationDocument) -> Result<String> {
        Ok(match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(document)?,
            OutputFormat::Yaml => serde_yaml::to_string(document)?,
        })
    }

    fn decode(&self, text: &str) -> Result<ConfigurationDocument> {
        Ok(match self.format {
            OutputFormat::Json => serde_json::from_str(text)?,
            OutputFormat::Yaml => serde_yaml::from_str(text)?,
        })
    }
}

#[async_trait]
impl ConfigApplier for FileApplier {
    async fn current(&self) -> Result<Option<ConfigurationDocument>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => self
                .decode(&text)
                .map(Some)
                .with_context(|| format!("failed to parse {}", self.path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", self.path.display())),
        }
    }

    async fn apply(&self, document: &ConfigurationDocument) -> Result<()> {
        let text = self.encode(document)?;
        // write then rename so readers never observe a partial document
        let staging = self.path.with_extension("tmp");
        tokio::fs::write(&staging, text)
            .await
            .with_context(|| format!("failed to write {}", staging.display()))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        info!(path = %self.path.display(), "Gateway configuration written");
        Ok(())
    }
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied,
    Unchanged,
}

/// Builds and applies documents.
pub struct Reconciler<A> {
    applier: A,
}

impl<A: ConfigApplier> Reconciler<A> {
    pub fn new(applier: A) -> Self {
        Self { applier }
    }

    #[must_use]
    pub fn applier(&self) -> &A {
        &self.applier
    }

    /// Build the document for `ingresses` and apply it if it changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the deployed document cannot be read, the build
    /// produces an inconsistent document, or applying fails.
    pub async fn reconcile(
        &self,
        ingresses: &[Ingress],
        snapshot: &Snapshot,
    ) -> Result<ReconcileOutcome> {
        let existing = self
            .applier
            .current()
            .await
            .context("failed to read deployed configuration")?
            .unwrap_or_default();

        let start = Instant::now();
        let outcome = match ConfigBuilder::new(snapshot)
            .with_existing(&existing)
            .build(ingresses)
        {
            Ok(outcome) => outcome,
            Err(e) => {
                metrics::record_build_error(start.elapsed(), &[]);
                return Err(e).context("refusing to apply configuration");
            }
        };
        metrics::record_build_success(start.elapsed(), &outcome.document, &outcome.issues);

        for issue in &outcome.issues {
            match issue.severity() {
                Severity::Error => warn!(kind = issue.kind(), "{issue}"),
                Severity::Warning => info!(kind = issue.kind(), "{issue}"),
            }
        }

        if outcome.document == existing {
            debug!("Gateway configuration unchanged, skipping apply");
            metrics::record_apply("unchanged");
            return Ok(ReconcileOutcome::Unchanged);
        }

        if let Err(e) = self.applier.apply(&outcome.document).await {
            metrics::record_apply("error");
            return Err(e).context("failed to apply configuration");
        }
        metrics::record_apply("applied");
        Ok(ReconcileOutcome::Applied)
    }
}

/// Start a reflector for `K` that pokes `trigger` on every change.
fn spawn_reflector<K>(api: Api<K>, trigger: Arc<Notify>) -> Store<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    let kind = K::kind(&()).to_string();
    let (store, writer) = reflector::store::<K>();
    let stream = watcher(api, watcher::Config::default())
        .default_backoff()
        .reflect(writer)
        .touched_objects();

    tokio::spawn(async move {
        let mut stream = Box::pin(stream);
        while let Some(event) = stream.next().await {
            match event {
                Ok(_) => trigger.notify_one(),
                Err(e) => {
                    warn!(resource_type = %kind, error = %e, "Watch error");
                    metrics::record_watch_error(&kind);
                }
            }
        }
        error!(resource_type = %kind, "Watch stream ended");
    });

    store
}

fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
    match namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    }
}

/// Holder of the leader lease.
struct Leadership {
    identity: String,
    channel: watch::Receiver<bool>,
    task: JoinHandle<kube_lease_manager::Result<LeaseManager>>,
}

impl Leadership {
    async fn start(client: Client, config: &LeaderElectionConfig) -> Result<Self> {
        info!(
            lease = %config.lease_name,
            namespace = %config.namespace,
            identity = %config.identity,
            "Starting leader election"
        );
        let manager = LeaseManagerBuilder::new(client, &config.lease_name)
            .with_namespace(&config.namespace)
            .with_identity(&config.identity)
            .with_duration(config.duration_secs)
            .with_grace(config.grace_secs)
            .build()
            .await
            .context("failed to create lease manager")?;
        let (channel, task) = manager.watch().await;
        Ok(Self {
            identity: config.identity.clone(),
            channel,
            task,
        })
    }

    fn is_leader(&self) -> bool {
        *self.channel.borrow()
    }

    /// Wait for the next leadership change and return the new state.
    async fn changed(&mut self) -> bool {
        if self.channel.changed().await.is_err() {
            // lease task is gone, leadership can no longer change
            std::future::pending::<()>().await;
        }
        *self.channel.borrow_and_update()
    }

    async fn release(self) {
        drop(self.channel);
        match self.task.await {
            Ok(Ok(_)) => info!(identity = %self.identity, "Released leader lease"),
            Ok(Err(e)) => warn!(error = %e, "Lease manager failed"),
            Err(e) => warn!(error = %e, "Lease manager task panicked"),
        }
    }
}

async fn leadership_changed(leadership: &mut Option<Leadership>) -> bool {
    match leadership {
        Some(leadership) => leadership.changed().await,
        None => std::future::pending().await,
    }
}

/// Run the controller until `shutdown` flips to `true`.
///
/// # Errors
///
/// Returns an error if the caches cannot be synced or leader election cannot be
/// started. Failures of individual passes are logged and retried.
pub async fn run<A: ConfigApplier + 'static>(
    client: Client,
    config: ControllerConfig,
    applier: A,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let namespace = config.namespace.as_deref();
    let trigger = Arc::new(Notify::new());
    let stores = Stores {
        ingresses: spawn_reflector(scoped_api::<Ingress>(&client, namespace), trigger.clone()),
        services: spawn_reflector(scoped_api::<Service>(&client, namespace), trigger.clone()),
        endpoints: spawn_reflector(scoped_api::<Endpoints>(&client, namespace), trigger.clone()),
        secrets: spawn_reflector(scoped_api::<Secret>(&client, namespace), trigger.clone()),
    };

    info!(
        ingress_class = %config.ingress_class,
        namespace = namespace.unwrap_or("*"),
        "Waiting for caches to sync"
    );
    tokio::select! {
        synced = wait_for_stores(&stores) => synced?,
        _ = shutdown.changed() => return Ok(()),
    }
    info!("Caches synced");

    let mut leadership = match &config.leader_election {
        Some(election) => Some(Leadership::start(client.clone(), election).await?),
        None => None,
    };

    let reconciler = Reconciler::new(applier);
    trigger.notify_one();

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            leader = leadership_changed(&mut leadership) => {
                if let Some(leadership) = &leadership {
                    if leader {
                        info!(identity = %leadership.identity, "Acquired leadership");
                        metrics::record_leader_elected(&leadership.identity);
                        trigger.notify_one();
                    } else {
                        warn!(identity = %leadership.identity, "Lost leadership");
                        metrics::record_leader_lost(&leadership.identity);
                    }
                }
                continue;
            }
            () = trigger.notified() => {}
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            () = tokio::time::sleep(config.debounce) => {}
        }

        if !leadership.as_ref().is_none_or(Leadership::is_leader) {
            debug!("Not the leader, skipping reconciliation");
            continue;
        }

        let ingresses = stores.managed_ingresses(&config.ingress_class);
        let snapshot = stores.snapshot();
        let (services, endpoints, secrets) = snapshot.counts();
        debug!(
            ingresses = ingresses.len(),
            services, endpoints, secrets, "Starting reconciliation pass"
        );

        match reconciler.reconcile(&ingresses, &snapshot).await {
            Ok(outcome) => debug!(?outcome, "Reconciliation pass finished"),
            Err(e) => {
                error!(error = ?e, "Reconciliation pass failed");
                let trigger = trigger.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(RECONCILE_RETRY_SECS)).await;
                    trigger.notify_one();
                });
            }
        }
    }

    info!("Controller shutting down");
    if let Some(leadership) = leadership {
        leadership.release().await;
    }
    Ok(())
}

async fn wait_for_stores(stores: &Stores) -> Result<()> {
    stores
        .ingresses
        .wait_until_ready()
        .await
        .context("ingress cache")?;
    stores
        .services
        .wait_until_ready()
        .await
        .context("service cache")?;
    stores
        .endpoints
        .wait_until_ready()
        .await
        .context("endpoints cache")?;
    stores
        .secrets
        .wait_until_ready()
        .await
        .context("secret cache")?;
    Ok(())
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;
