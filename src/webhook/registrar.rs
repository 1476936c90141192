//! Publishes the generated CA into the MutatingWebhookConfiguration

use k8s_openapi::api::admissionregistration::v1::MutatingWebhookConfiguration;
use k8s_openapi::ByteString;
use kube::api::{Api, PostParams};
use kube::Client;
use tracing::{info, instrument};

use crate::error::{Error, Result};

/// Set every webhook's `clientConfig.caBundle` to `ca_pem`.
///
/// Returns the number of webhook entries updated.
pub fn apply_ca_bundle(config: &mut MutatingWebhookConfiguration, ca_pem: &[u8]) -> usize {
    let Some(webhooks) = config.webhooks.as_mut() else {
        return 0;
    };
    for webhook in webhooks.iter_mut() {
        webhook.client_config.ca_bundle = Some(ByteString(ca_pem.to_vec()));
    }
    webhooks.len()
}

/// Fetch the named configuration, replace its CA bundles and write it back
#[instrument(skip(client, ca_pem))]
pub async fn register_ca_bundle(client: Client, config_name: &str, ca_pem: &str) -> Result<usize> {
    let api: Api<MutatingWebhookConfiguration> = Api::all(client);

    let mut config = api.get(config_name).await.map_err(Error::KubeError)?;
    let updated = apply_ca_bundle(&mut config, ca_pem.as_bytes());
    api.replace(config_name, &PostParams::default(), &config)
        .await
        .map_err(Error::KubeError)?;

    info!(webhooks = updated, "Published CA bundle to webhook configuration");
    Ok(updated)
}
