//! HTTP implementation of the pricing provider client.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::ProviderConfig;

use super::{PackageDetail, PricingProvider, ProviderError, TokenProvider};

/// Pricing provider client over the upstream REST API.
pub struct HttpPricingProvider {
    client: Client,
    config: ProviderConfig,
    tokens: TokenProvider,
}

#[derive(Deserialize)]
struct PriceResponse {
    price: f64,
}

impl HttpPricingProvider {
    /// Create a new provider client with the given configuration.
    pub fn new(config: ProviderConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .expect("Failed to create HTTP client");

        let tokens = TokenProvider::new(client.clone(), config.clone());

        Self {
            client,
            config,
            tokens,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Performs an authenticated GET, retrying once after a token refresh
    /// when the upstream answers 401.
    async fn get_authenticated(&self, path: &str) -> Result<reqwest::Response, ProviderError> {
        for attempt in 0..2 {
            let token = self.tokens.token().await?;

            let response = self
                .client
                .get(self.url(path))
                .bearer_auth(&token)
                .send()
                .await
                .map_err(|e| ProviderError::Http(e.to_string()))?;

            if response.status() == StatusCode::UNAUTHORIZED && attempt == 0 {
                debug!("Provider rejected token, refreshing and retrying");
                self.tokens.invalidate().await;
                continue;
            }

            return Ok(response);
        }
        unreachable!("authenticated GET loop always returns")
    }

    async fn check_status(
        response: reqwest::Response,
        external_id: &str,
    ) -> Result<reqwest::Response, ProviderError> {
        match response.status() {
            StatusCode::NOT_FOUND => Err(ProviderError::NotFound {
                external_id: external_id.to_string(),
            }),
            StatusCode::UNAUTHORIZED => {
                Err(ProviderError::Auth("token rejected after refresh".to_string()))
            }
            status if !status.is_success() => {
                Err(ProviderError::Http(format!("provider returned {}", status)))
            }
            _ => Ok(response),
        }
    }
}

#[async_trait]
impl PricingProvider for HttpPricingProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn current_price(&self, external_id: &str) -> Result<f64, ProviderError> {
        let path = format!("/packages/{}/price", external_id);
        let response = self.get_authenticated(&path).await?;
        let response = Self::check_status(response, external_id).await?;

        let price: PriceResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        Ok(price.price)
    }

    async fn package_detail(&self, external_id: &str) -> Result<PackageDetail, ProviderError> {
        let path = format!("/packages/{}", external_id);
        let response = self.get_authenticated(&path).await?;
        let response = Self::check_status(response, external_id).await?;

        response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building_trims_trailing_slash() {
        let provider = HttpPricingProvider::new(ProviderConfig {
            base_url: "https://api.example.com/".to_string(),
            username: "u".to_string(),
            password: "p".to_string(),
            timeout_secs: 5,
            token_safety_margin_secs: 60,
        });

        assert_eq!(
            provider.url("/packages/9001/price"),
            "https://api.example.com/packages/9001/price"
        );
    }
}
