// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Controller configuration from command line flags and environment variables.
//!
//! Every flag has an environment variable fallback so the controller can be
//! configured entirely from a Deployment manifest. [`ControllerArgs`] is the raw
//! clap surface; [`ControllerArgs::into_config`] validates it into a
//! [`ControllerConfig`].

use crate::constants::{
    DEFAULT_DEBOUNCE_MILLIS, DEFAULT_INGRESS_CLASS, DEFAULT_LEASE_DURATION_SECS,
    DEFAULT_LEASE_GRACE_SECS, DEFAULT_LEASE_NAME, METRICS_SERVER_BIND_ADDRESS,
    METRICS_SERVER_PORT,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Serialization of the configuration document on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application Gateway ingress controller
#[derive(Parser, Debug, Clone)]
#[command(name = "appgw-ingress", version, about, long_about = None)]
pub struct ControllerArgs {
    /// Ingress class handled by this controller
    #[arg(long, env = "INGRESS_CLASS", default_value = DEFAULT_INGRESS_CLASS)]
    pub ingress_class: String,

    /// Only watch this namespace (all namespaces when unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Write the configuration document to this file instead of logging it
    #[arg(long, env = "APPGW_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Format of the output file
    #[arg(long, env = "APPGW_OUTPUT_FORMAT", value_enum, default_value_t = OutputFormat::Json)]
    pub output_format: OutputFormat,

    /// Quiet period after a cluster change before rebuilding, in milliseconds
    #[arg(long, env = "DEBOUNCE_MS", default_value_t = DEFAULT_DEBOUNCE_MILLIS)]
    pub debounce_ms: u64,

    /// Address the metrics server binds to
    #[arg(long, env = "METRICS_BIND_ADDRESS", default_value = METRICS_SERVER_BIND_ADDRESS)]
    pub metrics_bind_address: String,

    /// Port of the metrics server
    #[arg(long, env = "METRICS_PORT", default_value_t = METRICS_SERVER_PORT)]
    pub metrics_port: u16,

    /// Only apply configuration while holding the leader lease
    #[arg(long, env = "ENABLE_LEADER_ELECTION")]
    pub leader_election: bool,

    /// Name of the leader lease
    #[arg(long, env = "LEASE_NAME", default_value = DEFAULT_LEASE_NAME)]
    pub lease_name: String,

    /// Namespace of the leader lease (defaults to the watched namespace, then `default`)
    #[arg(long, env = "POD_NAMESPACE")]
    pub lease_namespace: Option<String>,

    /// Identity used for the leader lease
    #[arg(long, env = "POD_NAME")]
    pub identity: Option<String>,

    /// Log format
    #[arg(long, env = "RUST_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Where built documents go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Log a summary of every document
    Log,
    /// Write every document to a file
    File { path: PathBuf, format: OutputFormat },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderElectionConfig {
    pub lease_name: String,
    pub namespace: String,
    pub identity: String,
    pub duration_secs: u64,
    pub grace_secs: u64,
}

/// Validated controller configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub ingress_class: String,
    pub namespace: Option<String>,
    pub output: OutputTarget,
    pub debounce: Duration,
    pub metrics_address: SocketAddr,
    pub leader_election: Option<LeaderElectionConfig>,
    pub log_format: LogFormat,
}

impl ControllerArgs {
    /// Validate the arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the ingress class is empty or the metrics address is
    /// not an IP address.
    pub fn into_config(self) -> Result<ControllerConfig> {
        let ingress_class = self.ingress_class.trim().to_string();
        if ingress_class.is_empty() {
            bail!("ingress class must not be empty");
        }

        let ip: IpAddr = self
            .metrics_bind_address
            .parse()
            .with_context(|| format!("invalid metrics bind address '{}'", self.metrics_bind_address))?;

        let namespace = self.namespace.filter(|ns| !ns.is_empty());

        let leader_election = self.leader_election.then(|| LeaderElectionConfig {
            lease_name: self.lease_name,
            namespace: self
                .lease_namespace
                .or_else(|| namespace.clone())
                .unwrap_or_else(|| "default".to_string()),
            identity: self
                .identity
                .or_else(|| std::env::var("HOSTNAME").ok())
                .unwrap_or_else(|| "appgw-ingress".to_string()),
            duration_secs: DEFAULT_LEASE_DURATION_SECS,
            grace_secs: DEFAULT_LEASE_GRACE_SECS,
        });

        let output = match self.output {
            Some(path) => OutputTarget::File {
                path,
                format: self.output_format,
            },
            None => OutputTarget::Log,
        };

        Ok(ControllerConfig {
            ingress_class,
            namespace,
            output,
            debounce: Duration::from_millis(self.debounce_ms),
            metrics_address: SocketAddr::new(ip, self.metrics_port),
            leader_election,
            log_format: self.log_format,
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
