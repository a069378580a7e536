//! Checkout orchestrator.
//!
//! Composes the normalizer, pricing engine, gateway adapter, mutation
//! coordinator and ledger writer into one fixed, forward-only sequence per
//! request. The failure contract is asymmetric: before the gateway charge
//! everything fails closed (the request is rejected, no side effects);
//! after it, the customer already holds payment instructions, so local
//! failures fail open — they are logged for manual reconciliation and the
//! confirmation is still returned.

use crate::auth::AuthenticatedUser;
use crate::common::PaymentMethod;
use crate::errors::ServiceError;
use crate::gateway::{GatewayChargeRequest, GatewayChargeResult, PaymentGateway};
use crate::services::coordinator::{MutationCoordinator, MutationPlan};
use crate::services::customers::CustomerService;
use crate::services::ledger::{LedgerService, RecordOutcome};
use crate::services::line_items::{self, RawCartEntry};
use crate::services::notifications::{NotificationService, OrderConfirmation};
use crate::services::pricing::{self, PricedOrder};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

const EXPIRY_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Per-request checkout phases; strictly forward-moving, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutPhase {
    Received,
    Priced,
    Charged,
    Mutated,
    Recorded,
    Responded,
    /// Failed before any side effect
    Rejected,
    /// Charge succeeded but a later stage failed; needs reconciliation
    Degraded,
}

/// Checkout request body. The client's totals are advisory: the server
/// reprices the cart and never trusts them for the charge amount.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    #[serde(alias = "cartItems")]
    pub cart_items: Vec<RawCartEntry>,
    #[serde(default)]
    pub subtotal: Option<Decimal>,
    #[serde(default, alias = "iva")]
    pub tax: Option<Decimal>,
    #[serde(default)]
    pub total: Option<Decimal>,
}

/// Successful checkout payload returned to the client.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutConfirmation {
    pub order_id: String,
    pub reference: String,
    pub expires_at: String,
    pub total: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clabe: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode_url: Option<String>,
    pub items: Vec<RawCartEntry>,
}

#[derive(Clone)]
pub struct CheckoutService {
    customers: CustomerService,
    gateway: Arc<dyn PaymentGateway>,
    coordinator: MutationCoordinator,
    ledger: LedgerService,
    notifications: NotificationService,
    currency: String,
}

impl CheckoutService {
    pub fn new(
        customers: CustomerService,
        gateway: Arc<dyn PaymentGateway>,
        coordinator: MutationCoordinator,
        ledger: LedgerService,
        notifications: NotificationService,
        currency: String,
    ) -> Self {
        Self {
            customers,
            gateway,
            coordinator,
            ledger,
            notifications,
            currency,
        }
    }

    /// Runs one checkout end to end. The gateway charge happens before any
    /// local transaction opens, so nothing is held open across the network
    /// call, and a gateway failure leaves no local state to clean up.
    #[instrument(skip(self, request), fields(user_id = user.user_id, method = %method))]
    pub async fn checkout(
        &self,
        user: &AuthenticatedUser,
        method: PaymentMethod,
        request: CheckoutRequest,
    ) -> Result<CheckoutConfirmation, ServiceError> {
        let mut phase = CheckoutPhase::Received;
        tracing::debug!(?phase, items = request.cart_items.len(), "Checkout received");

        // Everything up to the gateway call fails closed.
        let profile = self.customers.find_profile(user.user_id).await?;
        let customer = profile.charge_customer()?;
        let shipping = profile.shipping_address();

        let items = line_items::normalize(&request.cart_items)?;
        let priced = pricing::price(&items, method)?;
        phase = CheckoutPhase::Priced;
        tracing::debug!(?phase, total = %priced.total, "Cart priced");

        if let Some(client_total) = request.total {
            if client_total != priced.total {
                // Advisory only; the recomputed total is authoritative.
                info!(
                    %client_total,
                    server_total = %priced.total,
                    "Client total differs from server pricing"
                );
            }
        }

        let charge_request = GatewayChargeRequest::build(
            &priced,
            method,
            &self.currency,
            customer.clone(),
            shipping,
            user.user_id,
        );

        // One attempt only: after a timeout the charge outcome is unknown
        // and a retry here could double-charge the customer.
        let charge = match self.gateway.create_order(&charge_request).await {
            Ok(charge) => charge,
            Err(err) => {
                if err.is_ambiguous_charge() {
                    warn!(
                        user_id = user.user_id,
                        phase = ?CheckoutPhase::Rejected,
                        "Gateway call timed out; charge outcome unknown, not retrying"
                    );
                } else {
                    warn!(
                        user_id = user.user_id,
                        phase = ?CheckoutPhase::Rejected,
                        error = %err,
                        "Gateway charge failed"
                    );
                }
                return Err(err);
            }
        };
        phase = CheckoutPhase::Charged;
        tracing::debug!(?phase, gateway_order_id = %charge.gateway_order_id, "Charge created");

        // From here on the charge exists externally: fail open.
        let plan = MutationPlan::for_checkout(user.user_id, &priced.items);
        match self.coordinator.execute(plan).await {
            Ok(()) => phase = CheckoutPhase::Mutated,
            Err(err) => {
                phase = CheckoutPhase::Degraded;
                error!(
                    gateway_order_id = %charge.gateway_order_id,
                    user_id = user.user_id,
                    items = ?priced.items,
                    error = %err,
                    "Store mutations failed after charge; needs manual reconciliation"
                );
            }
        }

        if phase != CheckoutPhase::Degraded {
            match self.ledger.record(user.user_id, method, &priced, &charge).await {
                Ok(RecordOutcome::Recorded { order_id }) => {
                    phase = CheckoutPhase::Recorded;
                    tracing::debug!(%order_id, "Ledger row created");
                }
                Ok(RecordOutcome::AlreadyRecorded) => phase = CheckoutPhase::Recorded,
                Err(err) => {
                    phase = CheckoutPhase::Degraded;
                    error!(
                        gateway_order_id = %charge.gateway_order_id,
                        user_id = user.user_id,
                        error = %err,
                        "Ledger write failed after charge; needs manual reconciliation"
                    );
                }
            }
        } else {
            // A degraded checkout still tries to land a ledger row: the
            // ledger is what reconciliation works from.
            if let Err(err) = self.ledger.record(user.user_id, method, &priced, &charge).await {
                error!(
                    gateway_order_id = %charge.gateway_order_id,
                    user_id = user.user_id,
                    error = %err,
                    "Ledger write also failed for degraded checkout"
                );
            }
        }

        self.notifications.dispatch_order_confirmation(build_confirmation_payload(
            &customer.email,
            &customer.name,
            &priced,
            &charge,
        ));

        let confirmation = build_response(&priced, &charge, request.cart_items);
        if phase != CheckoutPhase::Degraded {
            phase = CheckoutPhase::Responded;
        }
        info!(
            gateway_order_id = %charge.gateway_order_id,
            ?phase,
            total = %priced.total,
            "Checkout finished"
        );
        Ok(confirmation)
    }
}

fn build_confirmation_payload(
    email: &str,
    name: &str,
    priced: &PricedOrder,
    charge: &GatewayChargeResult,
) -> OrderConfirmation {
    OrderConfirmation {
        recipient_email: email.to_string(),
        recipient_name: name.to_string(),
        gateway_order_id: charge.gateway_order_id.clone(),
        reference: charge.reference.clone(),
        expires_at: charge.expires_at.format(EXPIRY_FORMAT).to_string(),
        payment_method: charge.payment_method,
        subtotal: priced.subtotal,
        tax: priced.tax_total,
        total: priced.total,
        items: OrderConfirmation::items_from(priced),
        barcode_url: charge.barcode_url.clone(),
        clabe: charge.bank_details.as_ref().map(|b| b.clabe.clone()),
    }
}

fn build_response(
    priced: &PricedOrder,
    charge: &GatewayChargeResult,
    cart_items: Vec<RawCartEntry>,
) -> CheckoutConfirmation {
    CheckoutConfirmation {
        order_id: charge.gateway_order_id.clone(),
        reference: charge.reference.clone(),
        expires_at: charge.expires_at.format(EXPIRY_FORMAT).to_string(),
        total: format!("{:.2}", priced.total),
        clabe: charge.bank_details.as_ref().map(|b| b.clabe.clone()),
        bank: charge.bank_details.as_ref().map(|b| b.bank.clone()),
        barcode_url: charge.barcode_url.clone(),
        items: cart_items,
    }
}
