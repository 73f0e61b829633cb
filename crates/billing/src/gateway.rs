//! The processor boundary.
//!
//! [`BillingGateway`] is the only surface the orchestrator and catalog talk
//! to. Implementations translate every processor-side failure into
//! [`GatewayError`](crate::error::GatewayError); no processor SDK or wire
//! type leaks past this trait.

use async_trait::async_trait;

use crate::error::GatewayResult;
use crate::model::{Invoice, PaymentMethod, Plan, SetupIntentSecret, Subscription};

/// Fixed name of the single subscription slot each customer may occupy.
pub const DEFAULT_SLOT: &str = "default";

/// How a price swap treats the mid-cycle delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProrationMode {
    /// Create the proration and invoice the delta immediately.
    InvoiceImmediately,
    /// Suppress proration entirely; the new price applies from the next
    /// cycle boundary, per processor semantics.
    Suppress,
}

/// How a cancellation takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelMode {
    /// End access now.
    Immediately,
    /// Schedule cancellation at the current period end; access continues
    /// until then.
    AtPeriodEnd,
}

/// Parameters for creating a subscription in the "default" slot.
#[derive(Debug, Clone)]
pub struct CreateSubscriptionParams {
    pub customer_id: String,
    pub price_id: String,
    /// Trial length in days; `None` means no trial is attached at all.
    pub trial_days: Option<u32>,
}

/// Abstraction over the payment processor.
///
/// Operations map one-to-one onto remote calls; each is a single round trip
/// unless noted. Implementations must be shareable across tasks
/// (`Arc<dyn BillingGateway>`), with no per-account state held in process.
#[async_trait]
pub trait BillingGateway: Send + Sync {
    /// Create a processor customer for the account and return its id.
    async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
        account_id: &str,
    ) -> GatewayResult<String>;

    /// Attach a payment method to the customer and make it the default for
    /// future invoices. Must complete before any subscription creation that
    /// may charge immediately.
    async fn set_default_payment_method(
        &self,
        customer_id: &str,
        payment_method_id: &str,
    ) -> GatewayResult<()>;

    /// Locate the customer's "default"-slot subscription, newest first.
    /// `None` when the customer has never subscribed.
    async fn find_subscription(&self, customer_id: &str) -> GatewayResult<Option<Subscription>>;

    /// Create the "default"-slot subscription. Returns
    /// [`GatewayError::IncompletePayment`](crate::error::GatewayError::IncompletePayment)
    /// when the initial charge needs customer authentication, and a
    /// conflict API error when the slot is already occupied.
    async fn create_subscription(
        &self,
        params: CreateSubscriptionParams,
    ) -> GatewayResult<Subscription>;

    /// Swap the subscription to a new price, applying `mode` to the
    /// mid-cycle delta. Returns the refreshed subscription.
    async fn swap_price(
        &self,
        subscription_id: &str,
        new_price_id: &str,
        mode: ProrationMode,
    ) -> GatewayResult<Subscription>;

    /// Cancel the subscription per `mode`. Returns the refreshed
    /// subscription.
    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        mode: CancelMode,
    ) -> GatewayResult<Subscription>;

    /// Unschedule a pending cancellation. Only meaningful while the
    /// subscription is within its grace period.
    async fn resume_subscription(&self, subscription_id: &str) -> GatewayResult<Subscription>;

    /// List the customer's most recent invoices, newest first.
    async fn list_invoices(&self, customer_id: &str, limit: u32) -> GatewayResult<Vec<Invoice>>;

    /// Retrieve a single price with its product expanded.
    async fn retrieve_price(&self, price_id: &str) -> GatewayResult<Plan>;

    /// List active recurring prices with products expanded.
    async fn list_prices(&self) -> GatewayResult<Vec<Plan>>;

    /// Create a setup intent so the caller's UI can collect a payment
    /// method without an immediate charge.
    async fn create_setup_intent(&self, customer_id: &str) -> GatewayResult<SetupIntentSecret>;

    /// List the customer's card payment methods.
    async fn list_payment_methods(&self, customer_id: &str) -> GatewayResult<Vec<PaymentMethod>>;

    /// Detach a payment method from its customer.
    async fn delete_payment_method(&self, payment_method_id: &str) -> GatewayResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_is_object_safe() {
        fn _accepts_dyn(_gateway: &dyn BillingGateway) {}
    }
}
