//! Testing utilities and mock implementations for integration tests.
//!
//! Mock implementations of the external service traits, so the refresh job,
//! notification gate and API handlers can be exercised without a live pricing
//! provider or webhook endpoint.

mod mock_channel;
mod mock_provider;

pub use mock_channel::MockNotificationChannel;
pub use mock_provider::MockPricingProvider;
