use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ledger row for a checkout. One row per external gateway order; the
/// gateway order id is the idempotency key.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub gateway_order_id: String,

    pub user_id: i64,

    /// Serialized line items as priced at checkout time
    #[sea_orm(column_type = "Text")]
    pub items_json: String,

    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,

    /// "cash" | "spei"
    pub payment_method: String,

    /// pending | paid | cancelled | expired; transitions are driven by the
    /// reconciliation process, never by checkout.
    pub status: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
