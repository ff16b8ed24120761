use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{info, warn};

use crate::error::ScrapeError;
use crate::settings::Settings;

const BASE_BACKOFF_MS: u64 = 2000;

/// How often and how patiently to retry throttled or failing fetches.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            retries: settings.fetch_retries,
            base_backoff: Duration::from_millis(BASE_BACKOFF_MS),
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff * 2u32.pow(attempt)
    }
}

pub fn build_client(settings: &Settings) -> Result<Client, ScrapeError> {
    Ok(Client::builder()
        .user_agent(settings.user_agent.as_str())
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .build()?)
}

/// GET the page and return its body. Anything but 200 fails the run; 429 and
/// 5xx are retried with exponential backoff first.
pub async fn fetch_page(
    client: &Client,
    url: &str,
    policy: RetryPolicy,
) -> Result<String, ScrapeError> {
    let mut attempt = 0;
    loop {
        let response = client.get(url).send().await?;
        let status = response.status();
        if status == StatusCode::OK {
            let body = response.text().await?;
            info!(url, bytes = body.len(), "fetched page");
            return Ok(body);
        }

        let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
        if !retryable || attempt >= policy.retries {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let backoff = policy.backoff(attempt);
        warn!(
            "HTTP {} on {} (attempt {}/{}), backing off {:.1}s",
            status.as_u16(),
            url,
            attempt + 1,
            policy.retries,
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
        attempt += 1;
    }
}
