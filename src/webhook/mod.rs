//! Admission webhook
//!
//! Injects readiness gates into labelled Deployments at admission time. On
//! startup a self-signed CA and server certificate are generated, the CA is
//! published into the MutatingWebhookConfiguration, and the mutation
//! endpoint is served over TLS.

pub mod certs;
pub mod mutation;
pub mod registrar;
pub mod server;

pub use certs::{generate_certs, write_cert_files, CertBundle};
pub use mutation::{mutate, INJECT_LABEL};
pub use registrar::{apply_ca_bundle, register_ca_bundle};
pub use server::{router, start_webhook, WebhookSettings};
