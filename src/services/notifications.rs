//! Notification dispatch.
//!
//! Checkout hands a finished order summary to the notification collaborator
//! (which owns formatting and delivery). Dispatch is fire-and-forget: a
//! delivery failure is logged and never fails the checkout response.

use crate::common::PaymentMethod;
use crate::services::pricing::PricedOrder;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

const DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Order summary handed to the notification collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderConfirmation {
    pub recipient_email: String,
    pub recipient_name: String,
    pub gateway_order_id: String,
    pub reference: String,
    pub expires_at: String,
    pub payment_method: PaymentMethod,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub items: Vec<ConfirmationItem>,
    pub barcode_url: Option<String>,
    pub clabe: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationItem {
    pub name: String,
    pub section: String,
    pub quantity: i32,
    pub line_total: Decimal,
}

impl OrderConfirmation {
    pub fn items_from(priced: &PricedOrder) -> Vec<ConfirmationItem> {
        priced
            .items
            .iter()
            .map(|i| ConfirmationItem {
                name: i.name.clone(),
                section: i.section.as_str().to_string(),
                quantity: i.quantity,
                line_total: i.line_total,
            })
            .collect()
    }
}

#[derive(Clone)]
pub struct NotificationService {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl NotificationService {
    pub fn new(endpoint: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DISPATCH_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client, endpoint }
    }

    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Dispatches the confirmation in the background and returns
    /// immediately.
    pub fn dispatch_order_confirmation(&self, confirmation: OrderConfirmation) {
        let Some(endpoint) = self.endpoint.clone() else {
            debug!("Notification endpoint not configured; skipping dispatch");
            return;
        };
        let client = self.client.clone();

        tokio::spawn(async move {
            let gateway_order_id = confirmation.gateway_order_id.clone();
            match client.post(&endpoint).json(&confirmation).send().await {
                Ok(response) if response.status().is_success() => {
                    info!(%gateway_order_id, "Order confirmation dispatched");
                }
                Ok(response) => {
                    warn!(
                        %gateway_order_id,
                        status = %response.status(),
                        "Notification endpoint rejected order confirmation"
                    );
                }
                Err(err) => {
                    warn!(%gateway_order_id, error = %err, "Failed to dispatch order confirmation");
                }
            }
        });
    }
}
