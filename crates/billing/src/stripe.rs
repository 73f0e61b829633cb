//! Stripe adapter for [`BillingGateway`].
//!
//! A thin REST client: form-encoded requests, JSON responses, bearer auth
//! with the process-wide secret key. Wire types stay private to this
//! module; everything returned upstream is a domain type, and every failure
//! is normalized to [`GatewayError`].

use std::collections::HashMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::config::StripeConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{
    BillingGateway, CancelMode, CreateSubscriptionParams, ProrationMode, DEFAULT_SLOT,
};
use crate::model::{
    BillingInterval, CardDetails, Invoice, PaymentMethod, Plan, SetupIntentSecret, Subscription,
    SubscriptionStatus,
};
use crate::pricing::format_price;

/// Payment-intent statuses that mean the customer must act before the
/// charge can complete.
const ACTIONABLE_INTENT_STATUSES: &[&str] = &["requires_action", "requires_confirmation"];

/// Stripe-backed implementation of the processor boundary.
#[derive(Clone)]
pub struct StripeGateway {
    http: reqwest::Client,
    config: StripeConfig,
}

impl StripeGateway {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base, path)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> GatewayResult<T> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.config.secret_key)
            .query(query)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> GatewayResult<T> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.config.secret_key)
            .form(form)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn delete<T: DeserializeOwned>(&self, path: &str) -> GatewayResult<T> {
        let response = self
            .http
            .delete(self.url(path))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Decode a 2xx body, or map Stripe's error envelope onto
    /// [`GatewayError::Api`].
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> GatewayResult<T> {
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return serde_json::from_str(&body)
                .map_err(|e| GatewayError::InvalidResponse(format!("{e}: {body}")));
        }

        match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => Err(GatewayError::Api {
                code: envelope.error.code,
                message: envelope
                    .error
                    .message
                    .unwrap_or_else(|| format!("HTTP {status}")),
            }),
            Err(_) => Err(GatewayError::Api {
                code: None,
                message: format!("HTTP {status}: {body}"),
            }),
        }
    }
}

#[async_trait]
impl BillingGateway for StripeGateway {
    async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
        account_id: &str,
    ) -> GatewayResult<String> {
        let mut form = vec![
            ("email", email.to_string()),
            ("metadata[account_id]", account_id.to_string()),
        ];
        if let Some(name) = name {
            form.push(("name", name.to_string()));
        }
        let customer: WireCustomer = self.post("/v1/customers", &form).await?;
        Ok(customer.id)
    }

    async fn set_default_payment_method(
        &self,
        customer_id: &str,
        payment_method_id: &str,
    ) -> GatewayResult<()> {
        // Attach first; setting an unattached method as default is
        // rejected by the processor.
        let _: WirePaymentMethod = self
            .post(
                &format!("/v1/payment_methods/{payment_method_id}/attach"),
                &[("customer", customer_id.to_string())],
            )
            .await?;

        let _: WireCustomer = self
            .post(
                &format!("/v1/customers/{customer_id}"),
                &[(
                    "invoice_settings[default_payment_method]",
                    payment_method_id.to_string(),
                )],
            )
            .await?;
        Ok(())
    }

    async fn find_subscription(&self, customer_id: &str) -> GatewayResult<Option<Subscription>> {
        let list: WireList<WireSubscription> = self
            .get(
                "/v1/subscriptions",
                &[
                    ("customer", customer_id.to_string()),
                    ("status", "all".to_string()),
                    ("limit", "10".to_string()),
                ],
            )
            .await?;

        // Prefer the newest subscription tagged with the "default" slot;
        // fall back to the newest overall for subscriptions created outside
        // this crate.
        let tagged = list
            .data
            .iter()
            .position(|s| s.metadata.get("slot").map(String::as_str) == Some(DEFAULT_SLOT));
        let index = match (tagged, list.data.is_empty()) {
            (Some(i), _) => i,
            (None, false) => 0,
            (None, true) => return Ok(None),
        };
        let wire = list
            .data
            .into_iter()
            .nth(index)
            .ok_or_else(|| GatewayError::InvalidResponse("subscription list truncated".into()))?;
        subscription_from_wire(wire).map(Some)
    }

    async fn create_subscription(
        &self,
        params: CreateSubscriptionParams,
    ) -> GatewayResult<Subscription> {
        // One "default" slot per customer: a second create is a conflict,
        // never a silent overwrite.
        if let Some(existing) = self.find_subscription(&params.customer_id).await? {
            if existing.is_active() || existing.on_grace_period() {
                return Err(GatewayError::api(
                    Some("resource_already_exists".to_string()),
                    format!(
                        "customer {} already has a '{DEFAULT_SLOT}' subscription ({})",
                        params.customer_id, existing.id
                    ),
                ));
            }
        }

        let mut form = vec![
            ("customer", params.customer_id.clone()),
            ("items[0][price]", params.price_id.clone()),
            ("metadata[slot]", DEFAULT_SLOT.to_string()),
            ("payment_behavior", "allow_incomplete".to_string()),
            ("expand[]", "latest_invoice.payment_intent".to_string()),
        ];
        if let Some(days) = params.trial_days {
            form.push(("trial_period_days", days.to_string()));
        }

        let wire: WireSubscription = self.post("/v1/subscriptions", &form).await?;

        // An incomplete subscription whose first invoice is waiting on
        // customer authentication is a suspended operation, not a failure.
        if wire.status == "incomplete" {
            if let Some(intent) = wire.actionable_payment_intent() {
                return Err(GatewayError::IncompletePayment {
                    payment_intent: intent,
                });
            }
        }

        subscription_from_wire(wire)
    }

    async fn swap_price(
        &self,
        subscription_id: &str,
        new_price_id: &str,
        mode: ProrationMode,
    ) -> GatewayResult<Subscription> {
        // The subscription item id is needed to swap in place.
        let current: WireSubscription = self
            .get(&format!("/v1/subscriptions/{subscription_id}"), &[])
            .await?;
        let item_id = current
            .items
            .data
            .first()
            .map(|item| item.id.clone())
            .ok_or_else(|| {
                GatewayError::InvalidResponse(format!(
                    "subscription {subscription_id} has no items"
                ))
            })?;

        let proration = match mode {
            ProrationMode::InvoiceImmediately => "always_invoice",
            ProrationMode::Suppress => "none",
        };
        let form = vec![
            ("items[0][id]", item_id),
            ("items[0][price]", new_price_id.to_string()),
            ("proration_behavior", proration.to_string()),
        ];

        let wire: WireSubscription = self
            .post(&format!("/v1/subscriptions/{subscription_id}"), &form)
            .await?;
        subscription_from_wire(wire)
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        mode: CancelMode,
    ) -> GatewayResult<Subscription> {
        let wire: WireSubscription = match mode {
            CancelMode::Immediately => {
                self.delete(&format!("/v1/subscriptions/{subscription_id}"))
                    .await?
            }
            CancelMode::AtPeriodEnd => {
                self.post(
                    &format!("/v1/subscriptions/{subscription_id}"),
                    &[("cancel_at_period_end", "true".to_string())],
                )
                .await?
            }
        };
        subscription_from_wire(wire)
    }

    async fn resume_subscription(&self, subscription_id: &str) -> GatewayResult<Subscription> {
        let wire: WireSubscription = self
            .post(
                &format!("/v1/subscriptions/{subscription_id}"),
                &[("cancel_at_period_end", "false".to_string())],
            )
            .await?;
        subscription_from_wire(wire)
    }

    async fn list_invoices(&self, customer_id: &str, limit: u32) -> GatewayResult<Vec<Invoice>> {
        let list: WireList<WireInvoice> = self
            .get(
                "/v1/invoices",
                &[
                    ("customer", customer_id.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        list.data.into_iter().map(invoice_from_wire).collect()
    }

    async fn retrieve_price(&self, price_id: &str) -> GatewayResult<Plan> {
        let wire: WirePrice = self
            .get(
                &format!("/v1/prices/{price_id}"),
                &[("expand[]", "product".to_string())],
            )
            .await?;
        plan_from_price(wire)
    }

    async fn list_prices(&self) -> GatewayResult<Vec<Plan>> {
        let list: WireList<WirePrice> = self
            .get(
                "/v1/prices",
                &[
                    ("active", "true".to_string()),
                    ("type", "recurring".to_string()),
                    ("limit", "100".to_string()),
                    ("expand[]", "data.product".to_string()),
                ],
            )
            .await?;
        list.data.into_iter().map(plan_from_price).collect()
    }

    async fn create_setup_intent(&self, customer_id: &str) -> GatewayResult<SetupIntentSecret> {
        let wire: WireSetupIntent = self
            .post(
                "/v1/setup_intents",
                &[("customer", customer_id.to_string())],
            )
            .await?;
        let client_secret = wire.client_secret.ok_or_else(|| {
            GatewayError::InvalidResponse("setup intent missing client_secret".into())
        })?;
        Ok(SetupIntentSecret { client_secret })
    }

    async fn list_payment_methods(&self, customer_id: &str) -> GatewayResult<Vec<PaymentMethod>> {
        let list: WireList<WirePaymentMethod> = self
            .get(
                "/v1/payment_methods",
                &[
                    ("customer", customer_id.to_string()),
                    ("type", "card".to_string()),
                ],
            )
            .await?;
        Ok(list.data.into_iter().map(payment_method_from_wire).collect())
    }

    async fn delete_payment_method(&self, payment_method_id: &str) -> GatewayResult<()> {
        let _: WirePaymentMethod = self
            .post(
                &format!("/v1/payment_methods/{payment_method_id}/detach"),
                &[],
            )
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wire types (private): Stripe's JSON shapes, decoded with serde and
// converted into domain types before leaving this module.
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireList<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct WireCustomer {
    id: String,
}

#[derive(Debug, Deserialize)]
struct WireRecurring {
    interval: String,
    #[serde(default = "default_interval_count")]
    interval_count: u64,
    trial_period_days: Option<u32>,
}

fn default_interval_count() -> u64 {
    1
}

#[derive(Debug, Deserialize)]
struct WireProductObject {
    id: String,
    name: String,
    description: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

/// `product` arrives expanded as an object or, when expansion was not
/// requested, as a bare id string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireProduct {
    Id(String),
    Object(WireProductObject),
}

#[derive(Debug, Deserialize)]
struct WirePrice {
    id: String,
    currency: String,
    unit_amount: Option<i64>,
    recurring: Option<WireRecurring>,
    product: Option<WireProduct>,
}

#[derive(Debug, Deserialize)]
struct WirePaymentIntent {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireMaybeIntent {
    Id(String),
    Object(WirePaymentIntent),
}

#[derive(Debug, Deserialize)]
struct WireInvoiceRef {
    #[allow(dead_code)]
    id: String,
    payment_intent: Option<WireMaybeIntent>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireMaybeInvoice {
    Id(String),
    Object(WireInvoiceRef),
}

#[derive(Debug, Deserialize)]
struct WireSubscriptionItem {
    id: String,
    price: WirePrice,
}

#[derive(Debug, Deserialize)]
struct WireSubscription {
    id: String,
    customer: String,
    status: String,
    #[serde(default)]
    cancel_at_period_end: bool,
    current_period_start: i64,
    current_period_end: i64,
    trial_end: Option<i64>,
    canceled_at: Option<i64>,
    cancel_at: Option<i64>,
    ended_at: Option<i64>,
    items: WireList<WireSubscriptionItem>,
    latest_invoice: Option<WireMaybeInvoice>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

impl WireSubscription {
    /// The payment intent the customer must confirm, when the latest
    /// invoice is blocked on authentication.
    fn actionable_payment_intent(&self) -> Option<String> {
        let invoice = match &self.latest_invoice {
            Some(WireMaybeInvoice::Object(invoice)) => invoice,
            _ => return None,
        };
        match &invoice.payment_intent {
            Some(WireMaybeIntent::Object(intent))
                if ACTIONABLE_INTENT_STATUSES.contains(&intent.status.as_str()) =>
            {
                Some(intent.id.clone())
            }
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireInvoice {
    id: String,
    number: Option<String>,
    total: i64,
    currency: String,
    status: Option<String>,
    created: i64,
    invoice_pdf: Option<String>,
    hosted_invoice_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireCard {
    brand: String,
    last4: String,
    exp_month: u32,
    exp_year: u32,
}

#[derive(Debug, Deserialize)]
struct WirePaymentMethod {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    card: Option<WireCard>,
}

#[derive(Debug, Deserialize)]
struct WireSetupIntent {
    client_secret: Option<String>,
}

// ---------------------------------------------------------------------------
// Wire -> domain conversions
// ---------------------------------------------------------------------------

fn timestamp(seconds: i64) -> GatewayResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(seconds)
        .map_err(|e| GatewayError::InvalidResponse(format!("bad timestamp {seconds}: {e}")))
}

fn optional_timestamp(seconds: Option<i64>) -> GatewayResult<Option<OffsetDateTime>> {
    seconds.map(timestamp).transpose()
}

fn plan_from_price(price: WirePrice) -> GatewayResult<Plan> {
    let product = match price.product {
        Some(WireProduct::Object(product)) => product,
        _ => {
            return Err(GatewayError::InvalidResponse(format!(
                "price {} is missing its expanded product",
                price.id
            )))
        }
    };
    let recurring = price.recurring.ok_or_else(|| {
        GatewayError::InvalidResponse(format!("price {} is not recurring", price.id))
    })?;

    let amount = price.unit_amount.unwrap_or(0);
    let features = product
        .metadata
        .get("features")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(Plan {
        id: price.id,
        product_id: product.id,
        name: product.name,
        description: product.description.unwrap_or_default(),
        amount,
        currency: price.currency.clone(),
        interval: BillingInterval {
            unit: recurring.interval,
            count: recurring.interval_count,
        },
        trial_period_days: recurring.trial_period_days.unwrap_or(0),
        features,
        formatted_price: format_price(amount, &price.currency),
    })
}

fn subscription_from_wire(wire: WireSubscription) -> GatewayResult<Subscription> {
    let price_id = wire
        .items
        .data
        .first()
        .map(|item| item.price.id.clone())
        .ok_or_else(|| {
            GatewayError::InvalidResponse(format!("subscription {} has no items", wire.id))
        })?;

    let current_period_end = timestamp(wire.current_period_end)?;
    // Cancellation-effective timestamp: an explicit cancel_at wins, then a
    // recorded end, then the period boundary of a scheduled cancellation.
    let ends_at = match (
        optional_timestamp(wire.cancel_at)?,
        optional_timestamp(wire.ended_at)?,
        optional_timestamp(wire.canceled_at)?,
    ) {
        (Some(at), _, _) => Some(at),
        (None, Some(at), _) => Some(at),
        (None, None, _) if wire.cancel_at_period_end => Some(current_period_end),
        (None, None, canceled) if wire.status == "canceled" => {
            Some(canceled.unwrap_or(current_period_end))
        }
        _ => None,
    };

    Ok(Subscription {
        id: wire.id,
        customer_id: wire.customer,
        price_id,
        status: SubscriptionStatus::parse(&wire.status),
        cancel_at_period_end: wire.cancel_at_period_end,
        current_period_start: timestamp(wire.current_period_start)?,
        current_period_end,
        trial_end: optional_timestamp(wire.trial_end)?,
        ends_at,
        plan: None,
    })
}

fn invoice_from_wire(wire: WireInvoice) -> GatewayResult<Invoice> {
    Ok(Invoice {
        formatted_total: format_price(wire.total, &wire.currency),
        date: timestamp(wire.created)?,
        download_url: wire.invoice_pdf.or(wire.hosted_invoice_url),
        id: wire.id,
        number: wire.number,
        total: wire.total,
        currency: wire.currency,
        status: wire.status,
    })
}

fn payment_method_from_wire(wire: WirePaymentMethod) -> PaymentMethod {
    PaymentMethod {
        id: wire.id,
        kind: wire.kind,
        card: wire.card.map(|card| CardDetails {
            brand: card.brand,
            last4: card.last4,
            exp_month: card.exp_month,
            exp_year: card.exp_year,
        }),
    }
}
