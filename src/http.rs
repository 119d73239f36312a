use anyhow::{anyhow, Result};
use reqwest::{
    header,
    header::{HeaderMap, HeaderValue},
    Client, ClientBuilder,
};
use tokio::time::Duration;
use tracing::{event, Level};

use crate::{
    error::FetchError,
    models::{FlagRecord, DEFAULT_ENV},
};

const API_URL: &str = "https://api.flaglite.co";

/// The environment variable to change the default timeout for flaglite requests.
const FLAGLITE_TIMEOUT_MS: &str = "FLAGLITE_TIMEOUT_MS";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

fn create_http_connection_client(key: &str) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store"),
    );
    let mut auth = HeaderValue::from_str(&format!("Bearer {}", key))
        .map_err(|e| anyhow!("flaglite: api key is not a valid header value: {}", e))?;
    auth.set_sensitive(true);
    headers.insert(header::AUTHORIZATION, auth);

    let timeout = std::env::var(FLAGLITE_TIMEOUT_MS)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_TIMEOUT_MS);
    ClientBuilder::new()
        .pool_idle_timeout(Some(Duration::from_secs(60)))
        .tcp_keepalive(Some(Duration::from_secs(30)))
        .timeout(Duration::from_millis(timeout))
        .default_headers(headers)
        .build()
        .map_err(|e| anyhow!("flaglite: failed to build http client: {}", e))
}

#[derive(Clone)]
pub struct FlagLiteHttpClient {
    flags_url: String,
    env: String,
    http_client: Client,
}

impl FlagLiteHttpClient {
    pub fn new(
        api_key: &str,
        api_url: Option<String>,
        env: Option<String>,
        project_public_id: &str,
    ) -> Result<Self> {
        let base_url = api_url.unwrap_or_else(|| API_URL.to_string());
        let flags_url = format!(
            "{}/flags/{}",
            base_url.trim_end_matches('/'),
            project_public_id
        );
        let env = env.unwrap_or_else(|| DEFAULT_ENV.to_string());
        let http_client = create_http_connection_client(api_key)?;
        Ok(Self {
            flags_url,
            env,
            http_client,
        })
    }

    pub fn flags_url(&self) -> &str {
        &self.flags_url
    }

    /// Downloads every flag of the project for the configured environment.
    pub async fn fetch_flags(&self) -> std::result::Result<Vec<FlagRecord>, FetchError> {
        let response = self
            .http_client
            .get(&self.flags_url)
            .query(&[("env", self.env.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            event!(
                Level::ERROR,
                "flaglite fetch error: status {}: {}",
                status.as_u16(),
                body
            );
            return Err(FetchError::http(status.as_u16(), &body));
        }

        Ok(response.json::<Vec<FlagRecord>>().await?)
    }
}
