use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::config::RunConfig;
use crate::fetch::FetchError;

const USER_AGENT: &str = concat!("dex-analytics/", env!("CARGO_PKG_VERSION"));

/// Thin JSON client shared by the REST-backed reports. Requests are sequential;
/// callers sleep [`ApiClient::throttle`] between them.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    delay: Duration,
}

impl ApiClient {
    pub fn new(config: &RunConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            delay: config.request_delay,
        })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        log::debug!("[ApiClient::get_json] GET {url}");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn throttle(&self) {
        tokio::time::sleep(self.delay).await;
    }
}
