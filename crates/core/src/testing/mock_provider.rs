use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::provider::{PackageDetail, PricingProvider, ProviderError};

/// In-memory pricing provider for tests.
///
/// Prices and details are keyed by external ID. Unknown IDs return
/// [`ProviderError::NotFound`], and per-ID errors can be injected to
/// simulate a flaky upstream. All lookups are recorded.
pub struct MockPricingProvider {
    prices: Mutex<HashMap<String, f64>>,
    details: Mutex<HashMap<String, PackageDetail>>,
    errors: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<String>>,
}

impl MockPricingProvider {
    pub fn new() -> Self {
        Self {
            prices: Mutex::new(HashMap::new()),
            details: Mutex::new(HashMap::new()),
            errors: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Set the price returned for an external ID.
    pub fn set_price(&self, external_id: &str, price: f64) {
        self.prices
            .lock()
            .unwrap()
            .insert(external_id.to_string(), price);
    }

    /// Set the detail record returned for an external ID.
    pub fn set_detail(&self, external_id: &str, detail: PackageDetail) {
        self.details
            .lock()
            .unwrap()
            .insert(external_id.to_string(), detail);
    }

    /// Make both lookups for an external ID fail with an HTTP error.
    pub fn set_error(&self, external_id: &str, message: &str) {
        self.errors
            .lock()
            .unwrap()
            .insert(external_id.to_string(), message.to_string());
    }

    /// External IDs looked up, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn check_error(&self, external_id: &str) -> Result<(), ProviderError> {
        if let Some(message) = self.errors.lock().unwrap().get(external_id) {
            return Err(ProviderError::Http(message.clone()));
        }
        Ok(())
    }
}

impl Default for MockPricingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PricingProvider for MockPricingProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn current_price(&self, external_id: &str) -> Result<f64, ProviderError> {
        self.calls.lock().unwrap().push(external_id.to_string());
        self.check_error(external_id)?;

        self.prices
            .lock()
            .unwrap()
            .get(external_id)
            .copied()
            .ok_or_else(|| ProviderError::NotFound {
                external_id: external_id.to_string(),
            })
    }

    async fn package_detail(&self, external_id: &str) -> Result<PackageDetail, ProviderError> {
        self.check_error(external_id)?;

        self.details
            .lock()
            .unwrap()
            .get(external_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound {
                external_id: external_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_price_lookup() {
        let provider = MockPricingProvider::new();
        provider.set_price("9001", 1234.5);

        assert_eq!(provider.current_price("9001").await.unwrap(), 1234.5);
        assert!(matches!(
            provider.current_price("missing").await,
            Err(ProviderError::NotFound { .. })
        ));
        assert_eq!(provider.calls(), vec!["9001", "missing"]);
    }

    #[tokio::test]
    async fn test_error_injection() {
        let provider = MockPricingProvider::new();
        provider.set_price("9001", 100.0);
        provider.set_error("9001", "boom");

        assert!(matches!(
            provider.current_price("9001").await,
            Err(ProviderError::Http(_))
        ));
    }
}
