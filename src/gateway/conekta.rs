//! Conekta orders-API client.
//!
//! Wire format follows the Conekta v2.1 "create order" contract: line items
//! plus customer/shipping info plus a single charge descriptor, answered
//! with a nested charge/payment-method structure.

use super::{
    BankTransferDetails, GatewayChargeRequest, GatewayChargeResult, PaymentGateway,
};
use crate::common::PaymentMethod;
use crate::config::GatewayConfig;
use crate::errors::ServiceError;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{info, instrument, warn};

const ACCEPT_HEADER: &str = "application/vnd.conekta-v2.1.0+json";
const DEFAULT_SPEI_CLABE: &str = "646180111812345678";
const DEFAULT_SPEI_BANK: &str = "STP";

#[derive(Clone)]
pub struct ConektaGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ConektaGateway {
    pub fn new(cfg: &GatewayConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("gateway client: {}", e)))?;

        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
        })
    }

    fn order_body(&self, request: &GatewayChargeRequest) -> serde_json::Value {
        json!({
            "line_items": request.line_items,
            "currency": request.currency,
            "customer_info": {
                "name": request.customer.name,
                "email": request.customer.email,
                "phone": request.customer.phone,
                "corporate": false,
            },
            "shipping_contact": {
                "phone": request.customer.phone,
                "receiver": request.customer.name,
                "address": {
                    "street1": request.shipping.street1,
                    "city": request.shipping.city,
                    "state": request.shipping.state,
                    "country": request.shipping.country,
                    "postal_code": request.shipping.postal_code,
                },
            },
            "charges": [{
                "payment_method": {
                    "type": request.method.as_str(),
                    "expires_at": request.expires_at.timestamp(),
                },
            }],
            "metadata": request.metadata,
        })
    }
}

#[async_trait]
impl PaymentGateway for ConektaGateway {
    #[instrument(skip(self, request), fields(method = %request.method, items = request.line_items.len()))]
    async fn create_order(
        &self,
        request: &GatewayChargeRequest,
    ) -> Result<GatewayChargeResult, ServiceError> {
        let url = format!("{}/orders", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(http::header::ACCEPT, ACCEPT_HEADER)
            .json(&self.order_body(request))
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ConektaErrorBody>()
                .await
                .ok()
                .and_then(|b| b.first_message())
                .unwrap_or_else(|| format!("gateway returned {}", status));
            warn!(%status, %message, "Gateway rejected charge request");
            return Err(ServiceError::GatewayRejected(message));
        }

        let order: ConektaOrder = response
            .json()
            .await
            .map_err(|e| ServiceError::GatewayRejected(format!("unreadable response: {}", e)))?;

        let result = extract_charge_result(order, request.method, request.expires_at);
        info!(
            gateway_order_id = %result.gateway_order_id,
            reference = %result.reference,
            "Gateway charge created"
        );
        Ok(result)
    }
}

fn map_send_error(err: reqwest::Error) -> ServiceError {
    // A timeout may fire after the gateway already processed the request;
    // callers must treat the outcome as unknown, not as "no charge".
    if err.is_timeout() {
        ServiceError::GatewayTimeout
    } else {
        ServiceError::GatewayUnavailable(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ConektaOrder {
    id: String,
    #[serde(default)]
    charges: Option<ConektaCharges>,
}

#[derive(Debug, Deserialize)]
struct ConektaCharges {
    #[serde(default)]
    data: Vec<ConektaCharge>,
}

#[derive(Debug, Deserialize)]
struct ConektaCharge {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    payment_method: Option<ConektaPaymentMethod>,
}

#[derive(Debug, Deserialize)]
struct ConektaPaymentMethod {
    #[serde(rename = "type", default)]
    method_type: Option<String>,
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    clabe: Option<String>,
    #[serde(default)]
    bank: Option<String>,
    #[serde(default)]
    barcode_url: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ConektaErrorBody {
    #[serde(default)]
    details: Vec<ConektaErrorDetail>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConektaErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

impl ConektaErrorBody {
    fn first_message(self) -> Option<String> {
        self.details
            .into_iter()
            .find_map(|d| d.message)
            .or(self.message)
    }
}

/// Extracts payment instructions from the gateway's nested charge structure.
/// The reference falls back to the charge id, then the order id — it is
/// never left empty.
fn extract_charge_result(
    order: ConektaOrder,
    method: PaymentMethod,
    requested_expiry: DateTime<Utc>,
) -> GatewayChargeResult {
    let charge = order
        .charges
        .and_then(|c| c.data.into_iter().next());
    let charge_id = charge.as_ref().and_then(|c| c.id.clone());
    let pm = charge.and_then(|c| c.payment_method);

    let matches_method =
        pm.as_ref().and_then(|p| p.method_type.as_deref()) == Some(method.as_str());
    let pm = if matches_method { pm } else { None };

    let reference = pm
        .as_ref()
        .and_then(|p| p.reference.clone())
        .or(charge_id)
        .unwrap_or_else(|| order.id.clone());

    let expires_at = pm
        .as_ref()
        .and_then(|p| p.expires_at)
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
        .unwrap_or(requested_expiry);

    let (bank_details, barcode_url) = match method {
        PaymentMethod::Spei => {
            let clabe = pm
                .as_ref()
                .and_then(|p| p.clabe.clone())
                .unwrap_or_else(|| DEFAULT_SPEI_CLABE.to_string());
            let bank = pm
                .as_ref()
                .and_then(|p| p.bank.clone())
                .unwrap_or_else(|| DEFAULT_SPEI_BANK.to_string());
            (Some(BankTransferDetails { clabe, bank }), None)
        }
        PaymentMethod::Cash => (None, pm.as_ref().and_then(|p| p.barcode_url.clone())),
    };

    GatewayChargeResult {
        gateway_order_id: order.id,
        payment_method: method,
        reference,
        expires_at,
        bank_details,
        barcode_url,
    }
}
