//! Order ledger writer.
//!
//! Persists one `orders` row per external gateway order. The gateway order
//! id carries a unique constraint and acts as the idempotency key: a retried
//! write for the same charge is reported as already recorded, not an error.

use crate::common::PaymentMethod;
use crate::entities::order;
use crate::errors::ServiceError;
use crate::gateway::GatewayChargeResult;
use crate::services::pricing::PricedOrder;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, DbErr, EntityTrait, Set};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

pub const STATUS_PENDING: &str = "pending";

/// Outcome of a ledger write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded { order_id: Uuid },
    /// A row for this gateway order id already exists; the charge was
    /// recorded by an earlier attempt.
    AlreadyRecorded,
}

#[derive(Clone)]
pub struct LedgerService {
    db: Arc<DatabaseConnection>,
}

impl LedgerService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Records a charged order in `pending` status. Duplicate gateway order
    /// ids are treated as success.
    #[instrument(skip(self, priced, charge), fields(gateway_order_id = %charge.gateway_order_id, user_id))]
    pub async fn record(
        &self,
        user_id: i64,
        method: PaymentMethod,
        priced: &PricedOrder,
        charge: &GatewayChargeResult,
    ) -> Result<RecordOutcome, ServiceError> {
        let items_json = serde_json::to_string(&priced.items)
            .map_err(|e| ServiceError::InternalError(format!("serialize items: {}", e)))?;

        let order_id = Uuid::new_v4();
        let row = order::ActiveModel {
            id: Set(order_id),
            gateway_order_id: Set(charge.gateway_order_id.clone()),
            user_id: Set(user_id),
            items_json: Set(items_json),
            subtotal: Set(priced.subtotal),
            tax: Set(priced.tax_total),
            total: Set(priced.total),
            payment_method: Set(method.as_str().to_string()),
            status: Set(STATUS_PENDING.to_string()),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };

        let insert = order::Entity::insert(row).on_conflict(
            OnConflict::column(order::Column::GatewayOrderId)
                .do_nothing()
                .to_owned(),
        );

        match insert.exec(&*self.db).await {
            Ok(_) => {
                info!(%order_id, "Order recorded in ledger");
                Ok(RecordOutcome::Recorded { order_id })
            }
            Err(DbErr::RecordNotInserted) => {
                info!("Ledger row already exists for gateway order; treating as recorded");
                Ok(RecordOutcome::AlreadyRecorded)
            }
            Err(err) => Err(err.into()),
        }
    }
}
