// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Cadence Billing
//!
//! Subscription lifecycle orchestration against a Stripe-shaped payment
//! processor. One recurring subscription per account (the "default" slot):
//!
//! - **Plans**: enumerate active recurring prices, normalized into plan
//!   descriptors with display pricing
//! - **Subscriptions**: create (optional trial and payment-method
//!   binding), change plan with or without proration, cancel immediately
//!   or at period end, resume during the grace period
//! - **Invoices**: read-only history with download references
//! - **Payment methods**: setup intents, listing, deletion
//!
//! The processor is consumed through the [`BillingGateway`] boundary;
//! [`StripeGateway`] is the bundled REST implementation. Every public
//! operation resolves to an [`OperationOutcome`] so callers never handle
//! processor-specific errors.

pub mod catalog;
pub mod config;
pub mod error;
pub mod gateway;
pub mod model;
pub mod outcome;
pub mod pricing;
pub mod stripe;
pub mod subscriptions;


// Catalog
pub use catalog::PlanCatalog;

// Config
pub use config::StripeConfig;

// Error
pub use error::{GatewayError, GatewayResult};

// Gateway
pub use gateway::{
    BillingGateway, CancelMode, CreateSubscriptionParams, ProrationMode, DEFAULT_SLOT,
};

// Model
pub use model::{
    Account, BillingInterval, BillingProfile, CardDetails, Invoice, InvoiceHistory, PaymentMethod,
    PaymentMethodList, Plan, SetupIntentSecret, Subscription, SubscriptionDetails,
    SubscriptionStatus,
};

// Outcome
pub use outcome::OperationOutcome;

// Pricing
pub use pricing::format_price;

// Stripe adapter
pub use stripe::StripeGateway;

// Subscriptions
pub use subscriptions::{SubscriptionService, DEFAULT_INVOICE_LIMIT};

use std::sync::Arc;

/// Main billing service combining the plan catalog and the subscription
/// orchestrator over one shared gateway.
pub struct BillingService {
    pub catalog: PlanCatalog,
    pub subscriptions: SubscriptionService,
}

impl BillingService {
    /// Create a billing service from environment variables
    /// (`STRIPE_SECRET_KEY`, optional `STRIPE_API_BASE`).
    pub fn from_env() -> GatewayResult<Self> {
        let config = StripeConfig::from_env()?;
        Ok(Self::new(config))
    }

    /// Create a billing service with explicit config.
    pub fn new(config: StripeConfig) -> Self {
        Self::with_gateway(Arc::new(StripeGateway::new(config)))
    }

    /// Create a billing service over any gateway implementation. Tests use
    /// this with an in-memory gateway.
    pub fn with_gateway(gateway: Arc<dyn BillingGateway>) -> Self {
        let catalog = PlanCatalog::new(gateway.clone());
        Self {
            subscriptions: SubscriptionService::new(gateway, catalog.clone()),
            catalog,
        }
    }
}
