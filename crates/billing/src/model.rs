//! Domain model for subscription billing.
//!
//! These types are this crate's own view of processor state. The processor
//! remains authoritative: every mutation re-reads the subscription rather
//! than trusting an in-memory copy, and nothing here is cached across
//! operations.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::pricing::format_price;

/// An account holder, passed explicitly into every operation. Billing
/// behavior lives in the services, never on the account itself.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    /// Email forwarded to the processor on customer creation.
    pub email: String,
    pub name: Option<String>,
}

impl Account {
    pub fn new(id: Uuid, email: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id,
            email: email.into(),
            name,
        }
    }
}

/// The account's processor-side identity. Owned and persisted by the
/// caller; the orchestrator reads and updates it in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillingProfile {
    /// Processor customer id, created lazily on the first billing action
    /// and never deleted by this crate.
    pub customer_id: Option<String>,
    /// Default payment-method reference, if one has been bound.
    pub default_payment_method: Option<String>,
}

impl BillingProfile {
    pub fn has_customer(&self) -> bool {
        self.customer_id.is_some()
    }
}

/// Billing interval of a recurring price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingInterval {
    /// Interval unit as reported by the processor: "day", "week", "month",
    /// "year".
    pub unit: String,
    pub count: u64,
}

/// A plan: a recurring price plus its product, snapshotted on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub product_id: String,
    pub name: String,
    /// Product description; empty when the processor has none.
    #[serde(default)]
    pub description: String,
    /// Unit amount in minor currency units.
    pub amount: i64,
    /// Lowercase ISO currency code.
    pub currency: String,
    pub interval: BillingInterval,
    /// Trial length in days; 0 means no trial.
    #[serde(default)]
    pub trial_period_days: u32,
    /// Feature list from product metadata; empty when absent.
    #[serde(default)]
    pub features: Vec<String>,
    /// Display string derived from `amount` and `currency`.
    pub formatted_price: String,
}

impl Plan {
    /// Recompute the display price from the raw amount and currency.
    pub fn with_formatted_price(mut self) -> Self {
        self.formatted_price = format_price(self.amount, &self.currency);
        self
    }
}

/// Processor subscription status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Unpaid,
    Incomplete,
    IncompleteExpired,
    Paused,
    /// A status this crate does not recognize; treated as inactive.
    #[serde(other)]
    Unknown,
}

impl SubscriptionStatus {
    /// Parse the processor's wire string; unrecognized values map to
    /// [`SubscriptionStatus::Unknown`].
    pub fn parse(raw: &str) -> Self {
        match raw {
            "active" => Self::Active,
            "trialing" => Self::Trialing,
            "past_due" => Self::PastDue,
            "canceled" => Self::Canceled,
            "unpaid" => Self::Unpaid,
            "incomplete" => Self::Incomplete,
            "incomplete_expired" => Self::IncompleteExpired,
            "paused" => Self::Paused,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Unpaid => "unpaid",
            Self::Incomplete => "incomplete",
            Self::IncompleteExpired => "incomplete_expired",
            Self::Paused => "paused",
            Self::Unknown => "unknown",
        }
    }
}

/// The single "default"-slot subscription for an account.
///
/// State machine: NONE -> ACTIVE (with an on-trial sub-state) ->
/// CANCEL_PENDING (canceled, usable until `ends_at`) -> CANCELED. Resume is
/// only legal from CANCEL_PENDING.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub customer_id: String,
    /// Price currently billed.
    pub price_id: String,
    pub status: SubscriptionStatus,
    /// True when cancellation is scheduled for period end.
    pub cancel_at_period_end: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub current_period_start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub current_period_end: OffsetDateTime,
    /// Trial expiry, when the subscription carries a trial.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub trial_end: Option<OffsetDateTime>,
    /// Cancellation-effective timestamp. Non-null for CANCEL_PENDING and
    /// CANCELED; access continues until it passes.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub ends_at: Option<OffsetDateTime>,
    /// Live plan details, attached by the details lookup when available.
    #[serde(default)]
    pub plan: Option<Plan>,
}

impl Subscription {
    /// True while the subscription grants billing access, including the
    /// grace period of a pending cancellation.
    pub fn is_active(&self) -> bool {
        match self.status {
            SubscriptionStatus::Active | SubscriptionStatus::Trialing => !self.has_ended(),
            _ => false,
        }
    }

    /// True once a cancellation has been requested, scheduled or effective.
    pub fn is_canceled(&self) -> bool {
        self.status == SubscriptionStatus::Canceled || self.ends_at.is_some()
    }

    /// Canceled but not yet past the cancellation-effective timestamp:
    /// the CANCEL_PENDING state, the only state resume is legal from.
    pub fn on_grace_period(&self) -> bool {
        self.status != SubscriptionStatus::Canceled
            && self
                .ends_at
                .is_some_and(|ends| ends > OffsetDateTime::now_utc())
    }

    pub fn on_trial(&self) -> bool {
        self.trial_end
            .is_some_and(|end| end > OffsetDateTime::now_utc())
    }

    fn has_ended(&self) -> bool {
        self.ends_at
            .is_some_and(|ends| ends <= OffsetDateTime::now_utc())
    }
}

/// Enriched subscription view returned by the details lookup.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionDetails {
    pub id: String,
    pub status: SubscriptionStatus,
    pub active: bool,
    pub canceled: bool,
    pub on_trial: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub trial_ends_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub ends_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub current_period_start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub current_period_end: OffsetDateTime,
    /// Live plan details; absent when the plan lookup failed (tolerated).
    pub plan: Option<Plan>,
}

impl SubscriptionDetails {
    /// Build the view from an authoritative subscription and an optional
    /// plan lookup result.
    pub fn from_subscription(subscription: &Subscription, plan: Option<Plan>) -> Self {
        Self {
            id: subscription.id.clone(),
            status: subscription.status,
            active: subscription.is_active(),
            canceled: subscription.is_canceled(),
            on_trial: subscription.on_trial(),
            trial_ends_at: subscription.trial_end,
            ends_at: subscription.ends_at,
            current_period_start: subscription.current_period_start,
            current_period_end: subscription.current_period_end,
            plan,
        }
    }
}

/// Immutable historical invoice record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub number: Option<String>,
    /// Total in minor currency units.
    pub total: i64,
    pub currency: String,
    pub status: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    /// Pre-built download reference; retrieval is the caller's concern.
    pub download_url: Option<String>,
    pub formatted_total: String,
}

/// Invoice-history read result: failures degrade to an empty list with the
/// flag cleared rather than an error.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceHistory {
    pub ok: bool,
    pub invoices: Vec<Invoice>,
}

/// Card details of a payment method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDetails {
    pub brand: String,
    pub last4: String,
    pub exp_month: u32,
    pub exp_year: u32,
}

/// A payment method owned by the processor; this crate only lists, binds
/// and deletes by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    /// Method type as reported by the processor ("card", ...).
    pub kind: String,
    pub card: Option<CardDetails>,
}

/// Payment methods on file plus the profile's current default.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentMethodList {
    pub payment_methods: Vec<PaymentMethod>,
    pub default_payment_method: Option<String>,
}

/// Client secret handed to the payment-collection UI to attach a payment
/// method without an immediate charge.
#[derive(Debug, Clone, Serialize)]
pub struct SetupIntentSecret {
    pub client_secret: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use time::Duration;

    fn base_subscription() -> Subscription {
        let now = OffsetDateTime::now_utc();
        Subscription {
            id: "sub_1".into(),
            customer_id: "cus_1".into(),
            price_id: "price_basic".into(),
            status: SubscriptionStatus::Active,
            cancel_at_period_end: false,
            current_period_start: now - Duration::days(10),
            current_period_end: now + Duration::days(20),
            trial_end: None,
            ends_at: None,
            plan: None,
        }
    }

    #[test]
    fn active_subscription_state() {
        let sub = base_subscription();
        assert!(sub.is_active());
        assert!(!sub.is_canceled());
        assert!(!sub.on_grace_period());
        assert!(!sub.on_trial());
    }

    #[test]
    fn cancel_pending_keeps_access_until_period_end() {
        let mut sub = base_subscription();
        sub.cancel_at_period_end = true;
        sub.ends_at = Some(sub.current_period_end);

        assert!(sub.is_active(), "grace period retains access");
        assert!(sub.is_canceled());
        assert!(sub.on_grace_period());
    }

    #[test]
    fn elapsed_cancellation_is_fully_canceled() {
        let mut sub = base_subscription();
        sub.status = SubscriptionStatus::Canceled;
        sub.ends_at = Some(OffsetDateTime::now_utc() - Duration::days(1));

        assert!(!sub.is_active());
        assert!(sub.is_canceled());
        assert!(!sub.on_grace_period(), "resume is not legal once ended");
    }

    #[test]
    fn trialing_subscription_reports_trial() {
        let mut sub = base_subscription();
        sub.status = SubscriptionStatus::Trialing;
        sub.trial_end = Some(OffsetDateTime::now_utc() + Duration::days(14));

        assert!(sub.is_active());
        assert!(sub.on_trial());
    }

    #[test]
    fn status_parse_round_trip() {
        for raw in [
            "active",
            "trialing",
            "past_due",
            "canceled",
            "unpaid",
            "incomplete",
            "incomplete_expired",
            "paused",
        ] {
            assert_eq!(SubscriptionStatus::parse(raw).as_str(), raw);
        }
        assert_eq!(
            SubscriptionStatus::parse("something_new"),
            SubscriptionStatus::Unknown
        );
    }

    #[test]
    fn details_view_reflects_state() {
        let mut sub = base_subscription();
        sub.cancel_at_period_end = true;
        sub.ends_at = Some(sub.current_period_end);

        let details = SubscriptionDetails::from_subscription(&sub, None);
        assert!(details.active);
        assert!(details.canceled);
        assert_eq!(details.ends_at, sub.ends_at);
        assert!(details.plan.is_none());
    }
}
