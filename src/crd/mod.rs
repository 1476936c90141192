//! Custom Resource Definitions for the readiness gate operator

mod probe;

#[cfg(test)]
mod tests;

pub use probe::{Probe, ProbeSpec, ProbeStatus};
