//! Pipeline triggers for the command-line front end.

use async_trait::async_trait;
use reqwest::Client;
use signalforge_core::store::PipelineTrigger;

/// Fires the downstream pipeline by POSTing its name to a webhook.
///
/// Trigger failures are logged, never surfaced. A ready record that
/// missed its trigger is still picked up by the next manual `build`.
pub struct WebhookTrigger {
    client: Client,
    url: String,
}

impl WebhookTrigger {
    /// Creates a trigger POSTing to the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl PipelineTrigger for WebhookTrigger {
    async fn start(&self, pipeline: &str) {
        let body = serde_json::json!({ "pipeline": pipeline });
        match self.client.post(&self.url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!(pipeline, "triggered downstream pipeline");
            }
            Ok(resp) => {
                warn!(
                    pipeline,
                    status = %resp.status(),
                    "trigger endpoint returned an error"
                );
            }
            Err(err) => {
                warn!(pipeline, %err, "failed to reach trigger endpoint");
            }
        }
    }
}

/// A trigger that only logs. Used when no webhook is configured.
pub struct NoopTrigger;

#[async_trait]
impl PipelineTrigger for NoopTrigger {
    async fn start(&self, pipeline: &str) {
        info!(pipeline, "no trigger configured, skipping");
    }
}
