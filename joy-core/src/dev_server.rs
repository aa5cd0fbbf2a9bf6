//! Local development stand-in for the storage backend's completion webhook.
//!
//! In development nothing can reach the app's webhook, so the client pings
//! the handler with the upload request id after sending the file. The
//! handler then polls the storage API until the upload is done and posts the
//! completion webhook to itself.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use rand::Rng;
use tracing::{error, info, warn};

use crate::api::StorageApi;
use crate::protocol::{CallbackPayload, Hook, PolledFile, HOOK_HEADER, SIGNATURE_HEADER};
use crate::signature::create_signature;

/// Bounded exponential backoff with random fuzz.
#[derive(Debug, Clone)]
pub struct Backoff {
    pub base: Duration,
    pub max_delay: Duration,
    pub max_fuzz: Duration,
    /// Calls in total, the first one included: 21 is a first try plus 20 retries.
    pub max_attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            max_delay: Duration::from_secs(64),
            max_fuzz: Duration::from_millis(500),
            max_attempts: 21,
        }
    }
}

impl Backoff {
    /// Delay after `failures` failed attempts, before fuzz.
    pub fn delay(&self, failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(failures.min(31));
        self.base.saturating_mul(factor).min(self.max_delay)
    }

    fn fuzz(&self) -> Duration {
        let max = self.max_fuzz.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max))
    }

    /// Run `op` until it yields `Some`, sleeping between attempts.
    /// `None` once the attempt budget is spent.
    pub async fn retry<T, F, Fut>(&self, mut op: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        let mut failures = 0;
        while failures < self.max_attempts {
            if let Some(value) = op().await {
                return Some(value);
            }
            failures += 1;
            if failures == self.max_attempts {
                break;
            }

            let delay = self.delay(failures);
            if failures > 3 {
                warn!(
                    tries = failures,
                    retry_in_secs = delay.as_secs(),
                    "call unsuccessful, retrying"
                );
            }
            tokio::time::sleep(delay + self.fuzz()).await;
        }
        None
    }
}

/// `{callback_url}?slug={slug}`, with `http://` added when no scheme is given.
pub fn callback_target(callback_url: &str, slug: &str) -> String {
    let url = if callback_url.starts_with("http") {
        callback_url.to_string()
    } else {
        format!("http://{callback_url}")
    };
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}slug={slug}")
}

#[derive(Clone)]
pub struct DevServer {
    api: Arc<dyn StorageApi>,
    http: reqwest::Client,
    secret: String,
    backoff: Backoff,
}

impl DevServer {
    pub fn new(api: Arc<dyn StorageApi>, secret: impl Into<String>) -> Self {
        Self {
            api,
            http: reqwest::Client::new(),
            secret: secret.into(),
            backoff: Backoff::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Poll the storage API until the upload is reported done.
    pub async fn poll_until_done(&self, upload_request_id: &str) -> anyhow::Result<PolledFile> {
        let api = &self.api;
        let polled = self
            .backoff
            .retry(move || async move {
                match api.poll_upload(upload_request_id).await {
                    Ok(res) if res.is_done() => res.file_data,
                    Ok(_) => None,
                    Err(err) => {
                        warn!(upload_request_id, error = %err, "poll failed");
                        None
                    }
                }
            })
            .await;

        polled.ok_or_else(|| anyhow!("File took too long to upload"))
    }

    /// Deliver a signed completion webhook for a finished upload.
    pub async fn send_callback(&self, upload_request_id: &str, file: &PolledFile) -> anyhow::Result<()> {
        let payload = CallbackPayload {
            file: file.uploaded_file(),
            metadata: file.metadata_value(),
            upload_request_id: upload_request_id.to_string(),
        };
        let body = serde_json::to_string(&payload)?;
        let signature = create_signature(&body, &self.secret)?;
        let target = callback_target(&file.callback_url, &file.callback_slug);

        info!(key = %file.key, access = %file.access, "simulating upload webhook callback");
        let res = self
            .http
            .post(&target)
            .header(HOOK_HEADER, Hook::Callback.as_str())
            .header(SIGNATURE_HEADER, signature)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .with_context(|| format!("callback to {target} failed"))?;

        if res.status().is_success() {
            info!(key = %file.key, "simulated callback delivered");
        } else {
            error!(
                key = %file.key,
                status = res.status().as_u16(),
                "failed to simulate callback, is the webhook route configured?"
            );
        }
        Ok(())
    }

    /// Poll, then call back. Errors are logged; nothing is returned to the
    /// client that triggered it.
    pub async fn run(self, upload_request_id: String) {
        let outcome = async {
            let file = self.poll_until_done(&upload_request_id).await?;
            self.send_callback(&upload_request_id, &file).await
        }
        .await;

        if let Err(err) = outcome {
            error!(upload_request_id = %upload_request_id, error = %err, "failed to simulate callback for upload");
        }
    }
}
