use crate::auth::AuthenticatedUser;
use crate::common::PaymentMethod;
use crate::errors::ApiError;
use crate::handlers::common::success_response;
use crate::services::checkout::CheckoutRequest;
use crate::AppState;
use axum::{extract::State, response::Response, routing::post, Json, Router};
use std::sync::Arc;

/// POST /checkout/cash
///
/// Prices the cart, creates a cash (OXXO-style) charge and returns the
/// payment reference and barcode. Requires a bearer token.
async fn checkout_cash(
    State(app): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<Response, ApiError> {
    let confirmation = app
        .checkout
        .checkout(&user, PaymentMethod::Cash, request)
        .await?;
    Ok(success_response(
        confirmation,
        "Orden creada. Realiza tu pago en efectivo con la referencia indicada.",
    ))
}

/// POST /checkout/transfer
///
/// Prices the cart, creates a SPEI transfer charge and returns the CLABE
/// and receiving bank. Requires a bearer token.
async fn checkout_transfer(
    State(app): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<Response, ApiError> {
    let confirmation = app
        .checkout
        .checkout(&user, PaymentMethod::Spei, request)
        .await?;
    Ok(success_response(
        confirmation,
        "Orden creada. Realiza tu transferencia SPEI a la CLABE indicada.",
    ))
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/checkout/cash", post(checkout_cash))
        .route("/checkout/transfer", post(checkout_transfer))
}
