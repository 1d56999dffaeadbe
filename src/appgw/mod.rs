// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Application Gateway configuration synthesis.
//!
//! This module turns Ingresses plus a snapshot of the cluster into a single
//! self-consistent [`ConfigurationDocument`]. It is organized the way the data
//! flows:
//!
//! - [`backends`] - Ingress backends resolved to Service ports and addresses
//! - [`probes`] - deduplicated health probes
//! - [`pools`] - backend address pools and HTTP settings
//! - [`listeners`] - frontend ports, certificates and HTTP listeners
//! - [`rules`] - request routing rules
//! - [`builder`] - runs the above and merges the results
//!
//! [`naming`] holds the deterministic naming scheme shared by all of them and
//! [`types`] the document model.
//!
//! Everything here is synchronous and free of I/O: given the same input, the
//! output is identical, byte for byte once serialized.

pub mod backends;
pub mod builder;
pub mod listeners;
pub mod naming;
pub mod pools;
pub mod probes;
pub mod rules;
pub mod types;

pub use builder::{build, BuildOutcome, ConfigBuilder};
pub use types::ConfigurationDocument;
