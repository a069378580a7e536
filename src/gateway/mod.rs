//! Payment gateway adapter.
//!
//! Translates a priced order into the gateway's charge format and normalizes
//! the gateway's response into [`GatewayChargeResult`]. A successful call
//! creates a real external charge; compensation, if any, belongs to the
//! checkout orchestrator, never to this adapter.

pub mod conekta;

pub use conekta::ConektaGateway;

use crate::common::PaymentMethod;
use crate::errors::ServiceError;
use crate::services::pricing::{round_money, PricedOrder};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Cash references expire after 3 days, SPEI transfers after 24 hours.
pub fn charge_expiry(method: PaymentMethod, now: DateTime<Utc>) -> DateTime<Utc> {
    match method {
        PaymentMethod::Cash => now + Duration::days(3),
        PaymentMethod::Spei => now + Duration::hours(24),
    }
}

/// Customer contact details required by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeCustomer {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Shipping address in gateway format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street1: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub postal_code: String,
}

/// One gateway line item. Unit price is in integer minor-currency units and
/// already includes tax when the line is taxable: the gateway computes no
/// tax itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayLineItem {
    pub name: String,
    pub description: String,
    pub unit_price: i64,
    pub quantity: i32,
}

/// Complete charge request sent to the gateway.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayChargeRequest {
    pub line_items: Vec<GatewayLineItem>,
    pub currency: String,
    pub customer: ChargeCustomer,
    pub shipping: ShippingAddress,
    pub method: PaymentMethod,
    pub expires_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

impl GatewayChargeRequest {
    /// Builds a charge request from a priced order.
    pub fn build(
        order: &PricedOrder,
        method: PaymentMethod,
        currency: &str,
        customer: ChargeCustomer,
        shipping: ShippingAddress,
        user_id: i64,
    ) -> Self {
        let now = Utc::now();
        let line_items = order.items.iter().map(gateway_line_item).collect();
        let metadata = json!({
            "user_id": user_id.to_string(),
            "payment_type": method.as_str(),
            "created_at": now.to_rfc3339(),
            "subtotal": order.subtotal.to_string(),
            "tax": order.tax_total.to_string(),
            "total": order.total.to_string(),
        });

        Self {
            line_items,
            currency: currency.to_string(),
            customer,
            shipping,
            method,
            expires_at: charge_expiry(method, now),
            metadata,
        }
    }
}

fn gateway_line_item(line: &crate::services::pricing::LineItem) -> GatewayLineItem {
    let unit_price = if line.tax_applicable {
        round_money(line.unit_price * (Decimal::ONE + crate::services::pricing::IVA_RATE))
    } else {
        line.unit_price
    };

    GatewayLineItem {
        name: line.name.clone(),
        description: format!("Producto de tienda - {}", line.section),
        unit_price: to_minor_units(unit_price),
        quantity: line.quantity,
    }
}

/// Converts a decimal amount to integer minor units (centavos), half-up.
pub fn to_minor_units(amount: Decimal) -> i64 {
    (amount * Decimal::from(100))
        .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(i64::MAX)
}

/// Bank transfer payment details (SPEI).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankTransferDetails {
    pub clabe: String,
    pub bank: String,
}

/// Normalized outcome of a successful gateway charge. Immutable once built;
/// downstream components receive it by value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayChargeResult {
    pub gateway_order_id: String,
    pub payment_method: PaymentMethod,
    /// Payment reference for the customer; never empty (falls back to the
    /// charge id, then the gateway order id).
    pub reference: String,
    pub expires_at: DateTime<Utc>,
    pub bank_details: Option<BankTransferDetails>,
    pub barcode_url: Option<String>,
}

/// External payment processor boundary. One implementation talks to the real
/// gateway; tests provide their own.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(
        &self,
        request: &GatewayChargeRequest,
    ) -> Result<GatewayChargeResult, ServiceError>;
}
