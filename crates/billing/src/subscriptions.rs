//! Subscription orchestration: the state machine over the processor.
//!
//! Every public operation validates its preconditions locally, drives the
//! gateway in the required order, and resolves to an
//! [`OperationOutcome`]. Precondition and validation failures are rejected
//! before any remote call; remote failures are logged in full and surfaced
//! with a generic message.
//!
//! The subscription state machine:
//!
//! ```text
//! NONE -> ACTIVE (on-trial sub-state) -> CANCEL_PENDING -> CANCELED
//!                      ^                       |
//!                      +------- resume --------+
//! ```
//!
//! Resume is legal only from CANCEL_PENDING; once the cancellation has
//! taken effect the only path back is a new subscription.

use std::sync::Arc;

use crate::catalog::PlanCatalog;
use crate::error::GatewayError;
use crate::gateway::{BillingGateway, CancelMode, CreateSubscriptionParams, ProrationMode};
use crate::model::{
    Account, BillingProfile, InvoiceHistory, PaymentMethodList, SetupIntentSecret, Subscription,
    SubscriptionDetails,
};
use crate::outcome::OperationOutcome;

/// Default number of invoices returned by the history lookup.
pub const DEFAULT_INVOICE_LIMIT: u32 = 10;

const MSG_NO_ACTIVE_SUBSCRIPTION: &str = "No active subscription found";
const MSG_NO_CANCELED_SUBSCRIPTION: &str = "No canceled subscription found";

/// Orchestrates the lifecycle of the account's "default" subscription.
///
/// Holds no per-account state: the account and its [`BillingProfile`] are
/// passed into every call, and independent accounts may run operations in
/// parallel. The processor enforces its own per-customer consistency.
pub struct SubscriptionService {
    gateway: Arc<dyn BillingGateway>,
    catalog: PlanCatalog,
}

impl SubscriptionService {
    pub fn new(gateway: Arc<dyn BillingGateway>, catalog: PlanCatalog) -> Self {
        Self { gateway, catalog }
    }

    /// Create the account's subscription.
    ///
    /// Lazily creates the processor customer, binds `payment_method_id` as
    /// default first when supplied (the create call may charge
    /// immediately), and attaches a trial only when `trial_days > 0`.
    /// Mutates `profile` in place as processor-side identity is created.
    pub async fn create_subscription(
        &self,
        account: &Account,
        profile: &mut BillingProfile,
        price_id: &str,
        payment_method_id: Option<&str>,
        trial_days: i64,
    ) -> OperationOutcome<Subscription> {
        if price_id.trim().is_empty() {
            return OperationOutcome::failure("A plan must be selected");
        }

        let customer_id = match self.ensure_customer(account, profile).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(account_id = %account.id, error = %e, "Error creating processor customer");
                return OperationOutcome::failure("Unable to create the subscription");
            }
        };

        if let Some(payment_method_id) = payment_method_id {
            if let Err(e) = self
                .gateway
                .set_default_payment_method(&customer_id, payment_method_id)
                .await
            {
                tracing::error!(
                    account_id = %account.id,
                    payment_method_id = %payment_method_id,
                    error = %e,
                    "Error setting default payment method"
                );
                return OperationOutcome::failure("Unable to create the subscription");
            }
            profile.default_payment_method = Some(payment_method_id.to_string());
        }

        // Zero or negative means no trial at all, not a zero-length trial.
        let trial = u32::try_from(trial_days).ok().filter(|days| *days > 0);

        let params = CreateSubscriptionParams {
            customer_id: customer_id.clone(),
            price_id: price_id.to_string(),
            trial_days: trial,
        };

        match self.gateway.create_subscription(params).await {
            Ok(subscription) => {
                tracing::info!(
                    account_id = %account.id,
                    subscription_id = %subscription.id,
                    price_id = %price_id,
                    on_trial = subscription.on_trial(),
                    "Created subscription"
                );
                OperationOutcome::success(subscription, "Subscription created successfully")
            }
            Err(GatewayError::IncompletePayment { payment_intent }) => {
                tracing::info!(
                    account_id = %account.id,
                    payment_intent = %payment_intent,
                    "Subscription creation awaiting payment confirmation"
                );
                OperationOutcome::action_required(
                    payment_intent,
                    "The subscription requires payment confirmation",
                )
            }
            Err(e) if e.is_conflict() => {
                tracing::warn!(account_id = %account.id, error = %e, "Duplicate subscription rejected");
                OperationOutcome::failure("An active subscription already exists for this account")
            }
            Err(e) => {
                tracing::error!(account_id = %account.id, error = %e, "Error creating subscription");
                OperationOutcome::failure("Unable to create the subscription")
            }
        }
    }

    /// Swap the active subscription to a new price.
    ///
    /// `prorate` chooses between invoicing the mid-cycle delta immediately
    /// and suppressing proration so the new price starts next cycle.
    pub async fn change_plan(
        &self,
        account: &Account,
        profile: &BillingProfile,
        new_price_id: &str,
        prorate: bool,
    ) -> OperationOutcome<Subscription> {
        if new_price_id.trim().is_empty() {
            return OperationOutcome::failure("A plan must be selected");
        }

        let subscription = match self.active_subscription(account, profile).await {
            Ok(Some(subscription)) => subscription,
            Ok(None) => return OperationOutcome::failure(MSG_NO_ACTIVE_SUBSCRIPTION),
            Err(outcome) => return outcome,
        };

        let mode = if prorate {
            ProrationMode::InvoiceImmediately
        } else {
            ProrationMode::Suppress
        };

        match self
            .gateway
            .swap_price(&subscription.id, new_price_id, mode)
            .await
        {
            Ok(refreshed) => {
                tracing::info!(
                    account_id = %account.id,
                    subscription_id = %refreshed.id,
                    new_price_id = %new_price_id,
                    prorate,
                    "Changed subscription plan"
                );
                OperationOutcome::success(refreshed, "Plan changed successfully")
            }
            Err(e) => {
                tracing::error!(account_id = %account.id, error = %e, "Error changing subscription plan");
                OperationOutcome::failure("Unable to change the subscription plan")
            }
        }
    }

    /// Cancel the active subscription, immediately or at period end.
    pub async fn cancel_subscription(
        &self,
        account: &Account,
        profile: &BillingProfile,
        immediately: bool,
    ) -> OperationOutcome<Subscription> {
        let subscription = match self.active_subscription(account, profile).await {
            Ok(Some(subscription)) => subscription,
            Ok(None) => return OperationOutcome::failure(MSG_NO_ACTIVE_SUBSCRIPTION),
            Err(outcome) => return outcome,
        };

        let (mode, message) = if immediately {
            (CancelMode::Immediately, "Subscription canceled immediately")
        } else {
            (
                CancelMode::AtPeriodEnd,
                "Subscription scheduled for cancellation at the end of the billing period",
            )
        };

        match self
            .gateway
            .cancel_subscription(&subscription.id, mode)
            .await
        {
            Ok(refreshed) => {
                tracing::info!(
                    account_id = %account.id,
                    subscription_id = %refreshed.id,
                    immediately,
                    ends_at = ?refreshed.ends_at,
                    "Canceled subscription"
                );
                OperationOutcome::success(refreshed, message)
            }
            Err(e) => {
                tracing::error!(account_id = %account.id, error = %e, "Error canceling subscription");
                OperationOutcome::failure("Unable to cancel the subscription")
            }
        }
    }

    /// Resume a subscription whose cancellation is scheduled but not yet
    /// effective. Illegal from any other state; no remote mutation is
    /// attempted when the precondition fails.
    pub async fn resume_subscription(
        &self,
        account: &Account,
        profile: &BillingProfile,
    ) -> OperationOutcome<Subscription> {
        let subscription = match self.find_subscription(account, profile).await {
            Ok(Some(subscription)) => subscription,
            Ok(None) => return OperationOutcome::failure(MSG_NO_CANCELED_SUBSCRIPTION),
            Err(outcome) => return outcome,
        };

        if !(subscription.is_canceled() && subscription.on_grace_period()) {
            return OperationOutcome::failure(MSG_NO_CANCELED_SUBSCRIPTION);
        }

        match self.gateway.resume_subscription(&subscription.id).await {
            Ok(refreshed) => {
                tracing::info!(
                    account_id = %account.id,
                    subscription_id = %refreshed.id,
                    "Resumed subscription"
                );
                OperationOutcome::success(refreshed, "Subscription resumed successfully")
            }
            Err(e) => {
                tracing::error!(account_id = %account.id, error = %e, "Error resuming subscription");
                OperationOutcome::failure("Unable to resume the subscription")
            }
        }
    }

    /// The enriched view of the current subscription. Absence of a
    /// subscription is a failure, distinct from a subscription whose plan
    /// lookup failed (which is tolerated: `plan` is simply absent).
    pub async fn subscription_details(
        &self,
        account: &Account,
        profile: &BillingProfile,
    ) -> OperationOutcome<SubscriptionDetails> {
        let subscription = match self.find_subscription(account, profile).await {
            Ok(Some(subscription)) => subscription,
            Ok(None) => return OperationOutcome::failure("No subscription found"),
            Err(outcome) => return outcome,
        };

        let plan = self.catalog.plan_details(&subscription.price_id).await;
        let details = SubscriptionDetails::from_subscription(&subscription, plan);
        OperationOutcome::success(details, "Subscription details fetched")
    }

    /// The account's most recent invoices. Read path: failures degrade to
    /// an empty list with `ok == false`, never an error.
    pub async fn invoice_history(
        &self,
        account: &Account,
        profile: &BillingProfile,
        limit: Option<u32>,
    ) -> InvoiceHistory {
        let Some(customer_id) = profile.customer_id.as_deref() else {
            return InvoiceHistory {
                ok: true,
                invoices: Vec::new(),
            };
        };

        let limit = limit.unwrap_or(DEFAULT_INVOICE_LIMIT);
        match self.gateway.list_invoices(customer_id, limit).await {
            Ok(invoices) => InvoiceHistory { ok: true, invoices },
            Err(e) => {
                tracing::error!(account_id = %account.id, error = %e, "Error fetching invoice history");
                InvoiceHistory {
                    ok: false,
                    invoices: Vec::new(),
                }
            }
        }
    }

    /// Create a setup intent so the caller's UI can collect a payment
    /// method without an immediate charge. Creates the processor customer
    /// lazily, like subscription creation.
    pub async fn create_setup_intent(
        &self,
        account: &Account,
        profile: &mut BillingProfile,
    ) -> OperationOutcome<SetupIntentSecret> {
        let customer_id = match self.ensure_customer(account, profile).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(account_id = %account.id, error = %e, "Error creating processor customer");
                return OperationOutcome::failure("Unable to create a setup intent");
            }
        };

        match self.gateway.create_setup_intent(&customer_id).await {
            Ok(secret) => OperationOutcome::success(secret, "Setup intent created"),
            Err(e) => {
                tracing::error!(account_id = %account.id, error = %e, "Error creating setup intent");
                OperationOutcome::failure("Unable to create a setup intent")
            }
        }
    }

    /// The customer's card payment methods plus the profile's default
    /// reference. An account with no processor identity has none; no
    /// remote call is made.
    pub async fn payment_methods(
        &self,
        account: &Account,
        profile: &BillingProfile,
    ) -> OperationOutcome<PaymentMethodList> {
        let Some(customer_id) = profile.customer_id.as_deref() else {
            return OperationOutcome::success(
                PaymentMethodList {
                    payment_methods: Vec::new(),
                    default_payment_method: None,
                },
                "No payment methods on file",
            );
        };

        match self.gateway.list_payment_methods(customer_id).await {
            Ok(payment_methods) => OperationOutcome::success(
                PaymentMethodList {
                    payment_methods,
                    default_payment_method: profile.default_payment_method.clone(),
                },
                "Payment methods fetched",
            ),
            Err(e) => {
                tracing::error!(account_id = %account.id, error = %e, "Error listing payment methods");
                OperationOutcome::failure("Unable to fetch payment methods")
            }
        }
    }

    /// Detach a payment method by reference.
    pub async fn delete_payment_method(
        &self,
        account: &Account,
        payment_method_id: &str,
    ) -> OperationOutcome<()> {
        if payment_method_id.trim().is_empty() {
            return OperationOutcome::failure("A payment method must be specified");
        }

        match self.gateway.delete_payment_method(payment_method_id).await {
            Ok(()) => OperationOutcome::success((), "Payment method deleted successfully"),
            Err(e) => {
                tracing::error!(
                    account_id = %account.id,
                    payment_method_id = %payment_method_id,
                    error = %e,
                    "Error deleting payment method"
                );
                OperationOutcome::failure("Unable to delete the payment method")
            }
        }
    }

    /// Ensure the account has a processor customer, creating one on the
    /// first billing action. The id is recorded on the profile; it is
    /// harmless to retry creation after a later step fails, so no rollback
    /// is ever attempted.
    async fn ensure_customer(
        &self,
        account: &Account,
        profile: &mut BillingProfile,
    ) -> Result<String, GatewayError> {
        if let Some(id) = profile.customer_id.clone() {
            return Ok(id);
        }

        let id = self
            .gateway
            .create_customer(
                &account.email,
                account.name.as_deref(),
                &account.id.to_string(),
            )
            .await?;
        tracing::info!(account_id = %account.id, customer_id = %id, "Created processor customer");
        profile.customer_id = Some(id.clone());
        Ok(id)
    }

    /// Authoritative lookup of the current "default"-slot subscription.
    /// A profile without a processor identity cannot have one, so no
    /// remote call is made in that case.
    async fn find_subscription<T>(
        &self,
        account: &Account,
        profile: &BillingProfile,
    ) -> Result<Option<Subscription>, OperationOutcome<T>> {
        let Some(customer_id) = profile.customer_id.as_deref() else {
            return Ok(None);
        };

        match self.gateway.find_subscription(customer_id).await {
            Ok(subscription) => Ok(subscription),
            Err(e) => {
                tracing::error!(account_id = %account.id, error = %e, "Error fetching subscription");
                Err(OperationOutcome::failure(
                    "Unable to fetch the subscription",
                ))
            }
        }
    }

    /// Like [`Self::find_subscription`], but only yields a subscription
    /// that currently grants access.
    async fn active_subscription<T>(
        &self,
        account: &Account,
        profile: &BillingProfile,
    ) -> Result<Option<Subscription>, OperationOutcome<T>> {
        let subscription = self.find_subscription(account, profile).await?;
        Ok(subscription.filter(Subscription::is_active))
    }
}
