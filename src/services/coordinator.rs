//! Multi-store mutation coordinator.
//!
//! Applies a checkout's local side effects (stock decrement, cart clearing)
//! across the four catalog stores. Each store owns an independent
//! transaction scope: the protocol is begin-all, apply-all, commit-in-
//! sequence, and roll back whatever is still open on the first failure.
//! This is saga-style compensation, not a two-phase commit — a crash between
//! commits can leave stores inconsistent, which is acceptable because these
//! mutations are non-financial bookkeeping reconciled against the ledger.

use crate::common::CatalogSection;
use crate::db::StoreRegistry;
use crate::errors::ServiceError;
use crate::services::pricing::LineItem;
use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseTransaction, DbErr, Statement, TransactionTrait};
use std::collections::HashMap;
use tracing::{debug, error, instrument, warn};

/// Table and column names for one catalog store. The four stores predate
/// this service and each uses its own schema.
#[derive(Debug, Clone, Copy)]
pub struct StoreSchema {
    pub product_table: &'static str,
    pub product_id_col: &'static str,
    /// None for digital catalogs without stock tracking
    pub stock_col: Option<&'static str>,
    pub cart_table: &'static str,
    pub cart_items_table: &'static str,
}

impl StoreSchema {
    pub fn for_section(section: CatalogSection) -> StoreSchema {
        match section {
            CatalogSection::Merchandise => StoreSchema {
                product_table: "products",
                product_id_col: "product_id",
                stock_col: Some("stock"),
                cart_table: "carritos",
                cart_items_table: "carrito_items",
            },
            CatalogSection::Book => StoreSchema {
                product_table: "libros",
                product_id_col: "libro_id",
                stock_col: Some("stock"),
                cart_table: "carritos_libros",
                cart_items_table: "carrito_items_libros",
            },
            CatalogSection::Ebook => StoreSchema {
                product_table: "ebooks",
                product_id_col: "ebook_id",
                stock_col: None,
                cart_table: "carritos_ebooks",
                cart_items_table: "carrito_items_ebooks",
            },
            CatalogSection::Webinar => StoreSchema {
                product_table: "webinars",
                product_id_col: "webinar_id",
                stock_col: None,
                cart_table: "carritos_webinars",
                cart_items_table: "carrito_items_webinars",
            },
        }
    }
}

/// A single mutation applied inside one store's transaction.
#[async_trait]
pub trait StoreMutation: Send + Sync {
    fn describe(&self) -> String;

    async fn apply(&self, txn: &DatabaseTransaction) -> Result<(), ServiceError>;
}

/// Decrements stock for one product, failing when stock is insufficient.
pub struct StockDecrement {
    pub schema: StoreSchema,
    pub product_id: i64,
    pub quantity: i32,
}

#[async_trait]
impl StoreMutation for StockDecrement {
    fn describe(&self) -> String {
        format!(
            "decrement {}.{} for product {} by {}",
            self.schema.product_table,
            self.schema.stock_col.unwrap_or("?"),
            self.product_id,
            self.quantity
        )
    }

    async fn apply(&self, txn: &DatabaseTransaction) -> Result<(), ServiceError> {
        let Some(stock_col) = self.schema.stock_col else {
            return Ok(());
        };

        let sql = format!(
            "UPDATE {table} SET {stock} = {stock} - ? WHERE {id} = ? AND {stock} >= ?",
            table = self.schema.product_table,
            stock = stock_col,
            id = self.schema.product_id_col,
        );
        let result = txn
            .execute(Statement::from_sql_and_values(
                txn.get_database_backend(),
                &sql,
                [
                    self.quantity.into(),
                    self.product_id.into(),
                    self.quantity.into(),
                ],
            ))
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::DatabaseError(DbErr::Custom(format!(
                "insufficient stock for product {} in {}",
                self.product_id, self.schema.product_table
            ))));
        }
        Ok(())
    }
}

/// Removes every cart row belonging to a user in one store.
pub struct CartClear {
    pub schema: StoreSchema,
    pub user_id: i64,
}

#[async_trait]
impl StoreMutation for CartClear {
    fn describe(&self) -> String {
        format!("clear {} for user {}", self.schema.cart_items_table, self.user_id)
    }

    async fn apply(&self, txn: &DatabaseTransaction) -> Result<(), ServiceError> {
        let sql = format!(
            "DELETE FROM {items} WHERE carrito_id IN (SELECT id FROM {carts} WHERE user_id = ?)",
            items = self.schema.cart_items_table,
            carts = self.schema.cart_table,
        );
        txn.execute(Statement::from_sql_and_values(
            txn.get_database_backend(),
            &sql,
            [self.user_id.into()],
        ))
        .await?;
        Ok(())
    }
}

/// The per-store mutations for one checkout.
pub struct MutationPlan {
    per_store: HashMap<CatalogSection, Vec<Box<dyn StoreMutation>>>,
}

impl MutationPlan {
    pub fn new() -> Self {
        Self {
            per_store: HashMap::new(),
        }
    }

    pub fn push(&mut self, section: CatalogSection, mutation: Box<dyn StoreMutation>) {
        self.per_store.entry(section).or_default().push(mutation);
    }

    /// Builds the standard checkout plan: stock decrements for physical
    /// line items, cart clearing for every store the user may have touched.
    pub fn for_checkout(user_id: i64, items: &[LineItem]) -> Self {
        let mut plan = Self::new();

        for item in items {
            if item.section.is_physical() && item.product_id > 0 {
                plan.push(
                    item.section,
                    Box::new(StockDecrement {
                        schema: StoreSchema::for_section(item.section),
                        product_id: item.product_id,
                        quantity: item.quantity,
                    }),
                );
            }
        }

        for section in CatalogSection::ALL {
            plan.push(
                section,
                Box::new(CartClear {
                    schema: StoreSchema::for_section(section),
                    user_id,
                }),
            );
        }

        plan
    }

    fn take(&mut self, section: CatalogSection) -> Vec<Box<dyn StoreMutation>> {
        self.per_store.remove(&section).unwrap_or_default()
    }
}

impl Default for MutationPlan {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the begin-all / apply / commit-all / rollback-remaining protocol.
#[derive(Clone)]
pub struct MutationCoordinator {
    registry: StoreRegistry,
}

impl MutationCoordinator {
    pub fn new(registry: StoreRegistry) -> Self {
        Self { registry }
    }

    /// Runs the plan across all stores. On any apply or commit failure,
    /// every transaction still open is rolled back and the first error is
    /// returned.
    #[instrument(skip(self, plan))]
    pub async fn execute(&self, mut plan: MutationPlan) -> Result<(), ServiceError> {
        let mut open: Vec<(CatalogSection, DatabaseTransaction)> = Vec::new();

        // Begin all four transactions before applying anything.
        for handle in self.registry.in_order() {
            match handle.conn.begin().await {
                Ok(txn) => open.push((handle.section, txn)),
                Err(err) => {
                    error!(section = %handle.section, error = %err, "Failed to begin store transaction");
                    rollback_all(open).await;
                    return Err(err.into());
                }
            }
        }

        // Apply each store's mutations inside its own transaction.
        let mut failure: Option<ServiceError> = None;
        'stores: for idx in 0..open.len() {
            let (section, txn) = &open[idx];
            for mutation in plan.take(*section) {
                debug!(section = %section, mutation = %mutation.describe(), "Applying store mutation");
                if let Err(err) = mutation.apply(txn).await {
                    error!(
                        section = %section,
                        mutation = %mutation.describe(),
                        error = %err,
                        "Store mutation failed; rolling back all stores"
                    );
                    failure = Some(err);
                    break 'stores;
                }
            }
        }
        if let Some(err) = failure {
            rollback_all(open).await;
            return Err(err);
        }

        // Commit in sequence; roll back whatever has not committed yet.
        let mut pending = open.into_iter();
        while let Some((section, txn)) = pending.next() {
            if let Err(err) = txn.commit().await {
                error!(section = %section, error = %err, "Store commit failed; rolling back remaining stores");
                rollback_all(pending.collect()).await;
                return Err(err.into());
            }
        }

        Ok(())
    }
}

async fn rollback_all(open: Vec<(CatalogSection, DatabaseTransaction)>) {
    for (section, txn) in open {
        if let Err(err) = txn.rollback().await {
            // Nothing more to do; the connection drop will abort the txn.
            warn!(section = %section, error = %err, "Rollback failed");
        }
    }
}
