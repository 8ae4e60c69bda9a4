//! Upstream pricing provider client.

mod http;
mod token;
mod types;

pub use http::HttpPricingProvider;
pub use token::TokenProvider;
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Package not found upstream: {external_id}")]
    NotFound { external_id: String },

    #[error("Provider authentication failed: {0}")]
    Auth(String),

    #[error("Provider request failed: {0}")]
    Http(String),

    #[error("Failed to decode provider response: {0}")]
    Decode(String),
}

/// Read-only access to the upstream pricing provider.
#[async_trait]
pub trait PricingProvider: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Current sell price for a package, by the provider's own id.
    async fn current_price(&self, external_id: &str) -> Result<f64, ProviderError>;

    /// Full package detail record, including all line-item categories.
    async fn package_detail(&self, external_id: &str) -> Result<PackageDetail, ProviderError>;
}
