//! Admission Webhook Server
//!
//! Serves the mutating admission endpoint over TLS with a certificate
//! generated at startup, after publishing its CA to the cluster.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::{
    body::Bytes,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use kube::api::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use kube::Client;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use super::certs::{generate_certs, write_cert_files, DEFAULT_KEY_BITS};
use super::mutation::mutate;
use super::registrar::register_ca_bundle;
use crate::error::{Error, Result};

/// Time in-flight admission requests get to finish on shutdown
pub const GRACEFUL_DRAIN: Duration = Duration::from_secs(5);

/// Settings for the admission endpoint
#[derive(Clone, Debug)]
pub struct WebhookSettings {
    pub addr: SocketAddr,
    /// Name of the Service fronting the webhook, used for certificate SANs
    pub service_name: String,
    pub namespace: String,
    /// MutatingWebhookConfiguration receiving the CA bundle
    pub config_name: String,
    pub cert_dir: PathBuf,
    pub key_bits: usize,
}

impl WebhookSettings {
    pub fn new(addr: SocketAddr, service_name: &str, namespace: &str, config_name: &str) -> Self {
        Self {
            addr,
            service_name: service_name.to_string(),
            namespace: namespace.to_string(),
            config_name: config_name.to_string(),
            cert_dir: PathBuf::from("/tmp"),
            key_bits: DEFAULT_KEY_BITS,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

async fn health_handler() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Decode the review by hand so that malformed bodies still get an allowed
/// response instead of an extractor rejection.
#[instrument(skip(body), fields(bytes = body.len()))]
async fn mutate_handler(body: Bytes) -> Json<AdmissionReview<DynamicObject>> {
    let review: AdmissionReview<DynamicObject> = match serde_json::from_slice(&body) {
        Ok(review) => review,
        Err(e) => {
            error!("Failed to decode admission review: {}", e);
            return Json(allowed_invalid(format!("invalid admission review: {e}")).into_review());
        }
    };

    let request: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(request) => request,
        Err(e) => {
            error!("Failed to parse admission request: {}", e);
            return Json(allowed_invalid(format!("invalid admission request: {e}")).into_review());
        }
    };

    Json(mutate(&request).into_review())
}

fn allowed_invalid(message: String) -> AdmissionResponse {
    let mut response = AdmissionResponse::invalid(message.clone());
    response.allowed = true;
    response.warnings = Some(vec![message]);
    response
}

/// Router for the admission endpoint
pub fn router() -> Router {
    Router::new()
        .route("/mutate", post(mutate_handler))
        .route("/healthz", get(health_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Bootstrap certificates, publish the CA and serve until `token` fires.
///
/// Certificate or file failures abort only the webhook; a failed CA
/// publication is logged and the endpoint still starts.
pub async fn start_webhook(
    client: Client,
    settings: WebhookSettings,
    token: CancellationToken,
) -> Result<()> {
    let (service, namespace, bits) = (
        settings.service_name.clone(),
        settings.namespace.clone(),
        settings.key_bits,
    );
    let bundle = tokio::task::spawn_blocking(move || generate_certs(&service, &namespace, bits))
        .await
        .map_err(|e| Error::CertError(format!("certificate task failed: {e}")))??;

    let (cert_path, key_path) = write_cert_files(&settings.cert_dir, &bundle)?;

    if let Err(e) = register_ca_bundle(client, &settings.config_name, &bundle.ca_cert_pem).await {
        warn!(
            config = %settings.config_name,
            "Failed to publish CA bundle, the API server will not trust the webhook yet: {}",
            e
        );
    }

    let tls = RustlsConfig::from_pem_file(&cert_path, &key_path).await?;

    let handle = Handle::new();
    let shutdown = handle.clone();
    tokio::spawn(async move {
        token.cancelled().await;
        info!("Draining admission webhook");
        shutdown.graceful_shutdown(Some(GRACEFUL_DRAIN));
    });

    info!("Starting webhook server on {}", settings.addr);
    axum_server::bind_rustls(settings.addr, tls)
        .handle(handle)
        .serve(router().into_make_service())
        .await?;

    info!("Webhook server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn post_mutate(body: String) -> Value {
        let response = router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/mutate")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_mutate_endpoint_returns_patch() {
        let review = json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "b6c4d0e2-0000-4000-8000-000000000001",
                "kind": { "group": "apps", "version": "v1", "kind": "Deployment" },
                "resource": { "group": "apps", "version": "v1", "resource": "deployments" },
                "namespace": "default",
                "operation": "CREATE",
                "userInfo": {},
                "object": {
                    "apiVersion": "apps/v1",
                    "kind": "Deployment",
                    "metadata": {
                        "name": "api",
                        "labels": { "readiness-gate.io/inject": "canary" }
                    },
                    "spec": {
                        "selector": { "matchLabels": { "app": "api" } },
                        "template": { "spec": { "containers": [{ "name": "app" }] } }
                    }
                },
                "dryRun": false
            }
        });

        let body = post_mutate(review.to_string()).await;
        let response = &body["response"];
        assert_eq!(response["uid"], "b6c4d0e2-0000-4000-8000-000000000001");
        assert_eq!(response["allowed"], true);
        assert_eq!(response["patchType"], "JSONPatch");

        let patch_bytes: Vec<u8> = serde_json::from_value(response["patch"].clone()).unwrap();
        let patch: Value = serde_json::from_slice(&patch_bytes).unwrap();
        assert_eq!(
            patch,
            json!([{
                "op": "add",
                "path": "/spec/template/spec/readinessGates",
                "value": [{ "conditionType": "controller.rc/canary" }]
            }])
        );
    }

    #[tokio::test]
    async fn test_malformed_review_is_allowed() {
        let body = post_mutate("{not json".to_string()).await;
        assert_eq!(body["response"]["allowed"], true);
        assert!(body["response"]["warnings"][0]
            .as_str()
            .unwrap()
            .contains("invalid admission review"));
    }

    #[tokio::test]
    async fn test_healthz() {
        let response = router()
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
