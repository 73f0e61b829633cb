//! Plan catalog: the processor's active recurring prices, normalized.
//!
//! Both lookups are side-effect-free read paths and degrade gracefully: a
//! processor or network failure is logged and surfaced as "no plans" / "no
//! such plan" rather than an error.

use std::sync::Arc;

use crate::gateway::BillingGateway;
use crate::model::Plan;

/// On-demand view of the processor's plan data. The processor stays
/// authoritative; nothing is cached here.
#[derive(Clone)]
pub struct PlanCatalog {
    gateway: Arc<dyn BillingGateway>,
}

impl PlanCatalog {
    pub fn new(gateway: Arc<dyn BillingGateway>) -> Self {
        Self { gateway }
    }

    /// All active recurring plans, with product data expanded. Empty on
    /// failure.
    pub async fn list_available_plans(&self) -> Vec<Plan> {
        match self.gateway.list_prices().await {
            Ok(plans) => plans,
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch subscription plans");
                Vec::new()
            }
        }
    }

    /// Single-plan lookup by price id. `None` on failure, logged.
    pub async fn plan_details(&self, price_id: &str) -> Option<Plan> {
        match self.gateway.retrieve_price(price_id).await {
            Ok(plan) => Some(plan),
            Err(e) => {
                tracing::warn!(price_id = %price_id, error = %e, "Failed to fetch plan details");
                None
            }
        }
    }
}
