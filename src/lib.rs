// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # appgw-ingress - Application Gateway configuration from Kubernetes Ingress
//!
//! This crate turns the Ingress resources of a cluster into one complete,
//! self-consistent Application Gateway configuration document: health probes,
//! backend address pools, backend HTTP settings, frontend ports, TLS
//! certificates, HTTP listeners and request routing rules.
//!
//! ## Overview
//!
//! The heart of the crate is a pure function. Given a list of Ingresses and a
//! read-only view of Services, Endpoints and Secrets, [`appgw::build`] produces
//! the same document every time, independent of input order. Problems with a
//! single Ingress are reported as [`errors::BuildIssue`]s and never stop the
//! rest of the cluster from being configured.
//!
//! ## Modules
//!
//! - [`appgw`] - Document types, naming and the per-kind synthesizers
//! - [`ingress`] - Normalized view of an Ingress
//! - [`annotations`] - Per-Ingress behaviour overrides
//! - [`context`] - Resource lookups and point-in-time snapshots
//! - [`controller`] - Watch, debounce, build and apply loop
//! - [`config`] - Command line and environment configuration
//! - [`metrics`] - Prometheus metrics
//!
//! ## Example
//!
//! ```rust,no_run
//! use appgw_ingress::appgw::build;
//! use appgw_ingress::context::Snapshot;
//!
//! let outcome = build(&[], &Snapshot::new()).unwrap();
//! assert_eq!(outcome.document.http_listeners.len(), 1);
//! ```

pub mod annotations;
pub mod appgw;
pub mod config;
pub mod constants;
pub mod context;
pub mod controller;
pub mod errors;
pub mod ingress;
pub mod metrics;

#[cfg(test)]
mod test_fixtures;
