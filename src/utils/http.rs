// src/utils/http.rs

//! HTTP client utilities and the document fetch seam.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::error::{AppError, Result};
use crate::models::ScraperConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &ScraperConfig) -> Result<Client> {
    let client = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.timeout())
        .pool_idle_timeout(Duration::from_secs(90))
        .danger_accept_invalid_certs(config.ignore_certificates)
        .build()?;
    Ok(client)
}

/// Source of raw HTML documents.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Fetch the body of `url`, failing on anything but 200 OK.
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Fetches documents over HTTP with a fixed retry budget.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    attempts: u32,
    retry_delay: Duration,
    timeout: Duration,
}

impl HttpFetcher {
    /// Build a fetcher from the scraper configuration.
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Ok(Self::with_client(
            create_async_client(config)?,
            config.retry_attempts,
            config.retry_delay(),
            config.timeout(),
        ))
    }

    /// Build a fetcher around an existing client.
    pub fn with_client(
        client: Client,
        attempts: u32,
        retry_delay: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            attempts: attempts.max(1),
            retry_delay,
            timeout,
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).timeout(self.timeout).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(AppError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let mut attempt = 1;
        loop {
            match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(error) if attempt < self.attempts => {
                    log::debug!(
                        "Fetch attempt {}/{} for {} failed: {}",
                        attempt,
                        self.attempts,
                        url,
                        error
                    );
                    attempt += 1;
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(error) => {
                    log::warn!(
                        "Giving up on {} after {} attempt(s): {}",
                        url,
                        self.attempts,
                        error
                    );
                    return Err(error);
                }
            }
        }
    }
}
