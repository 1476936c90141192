//! readiness-gate: gate Kubernetes rollouts on externally probed health
//!
//! Each configured rule probes a target (HTTP, TCP or a command) on an
//! interval and propagates the result either into the status of a `Probe`
//! custom resource or into a readiness-gate condition on the selected pods.
//! A mutating admission webhook injects the matching readiness gates into
//! labelled Deployments.

pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod prober;

#[cfg(feature = "rest-api")]
pub mod rest_api;

#[cfg(feature = "admission-webhook")]
pub mod webhook;

pub use crate::error::{Error, Result};
