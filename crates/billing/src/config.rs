//! Processor configuration.
//!
//! The secret API key is process-wide state: it is read once at startup and
//! passed explicitly into [`StripeGateway`](crate::stripe::StripeGateway)
//! construction. Nothing in this crate reads the environment after startup.

use crate::error::{GatewayError, GatewayResult};

/// Default Stripe API base. Overridable for tests and proxies.
pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

/// Stripe connection configuration.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Secret API key (`sk_...` or `rk_...`).
    pub secret_key: String,
    /// Base URL for API calls, without a trailing slash.
    pub api_base: String,
}

impl StripeConfig {
    /// Build a configuration with the default API base.
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Override the API base (tests point this at a local mock server).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        let base: String = api_base.into();
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    /// Load configuration from the environment.
    ///
    /// Reads `STRIPE_SECRET_KEY` (required) and `STRIPE_API_BASE`
    /// (optional). A `.env` file is honored when present.
    pub fn from_env() -> GatewayResult<Self> {
        // Ignore a missing .env file; real deployments use the environment.
        let _ = dotenvy::dotenv();

        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| GatewayError::Config("STRIPE_SECRET_KEY is not set".to_string()))?;

        let mut config = Self::new(secret_key);
        if let Ok(base) = std::env::var("STRIPE_API_BASE") {
            config = config.with_api_base(base);
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject obviously malformed configuration before any remote call.
    pub fn validate(&self) -> GatewayResult<()> {
        if self.secret_key.trim().is_empty() {
            return Err(GatewayError::Config(
                "Stripe secret key is empty".to_string(),
            ));
        }
        if !self.api_base.starts_with("http") {
            return Err(GatewayError::Config(format!(
                "Invalid API base '{}'",
                self.api_base
            )));
        }
        Ok(())
    }
}
