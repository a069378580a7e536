//! Line item normalizer: converts heterogeneous cart entries into a single
//! canonical shape.
//!
//! The storefront's four catalogs historically used different field names
//! (`name`/`nombre`, `price`/`precio`, `quantity`/`cantidad`), so every
//! field is alias-tolerant and coerced defensively before pricing.

use crate::common::CatalogSection;
use crate::errors::ServiceError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use utoipa::ToSchema;

/// Raw cart entry as submitted by the client. Field names vary by catalog.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RawCartEntry {
    #[serde(alias = "nombre", default)]
    pub name: Option<String>,
    #[serde(alias = "precio", default)]
    pub price: Option<Value>,
    #[serde(alias = "cantidad", default)]
    pub quantity: Option<Value>,
    #[serde(default = "default_section")]
    pub section: CatalogSection,
    #[serde(alias = "id", default)]
    pub product_id: Option<i64>,
}

fn default_section() -> CatalogSection {
    CatalogSection::Merchandise
}

/// Canonical cart item, ready for the pricing engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedItem {
    pub product_id: i64,
    pub name: String,
    pub section: CatalogSection,
    pub unit_price: Decimal,
    pub quantity: i32,
}

/// Normalizes raw cart entries. Items whose price cannot be coerced to a
/// non-negative decimal are dropped; an empty cart, or a cart where every
/// item was dropped, is a validation error.
pub fn normalize(raw: &[RawCartEntry]) -> Result<Vec<NormalizedItem>, ServiceError> {
    if raw.is_empty() {
        return Err(ServiceError::ValidationError(
            "Cart is empty".to_string(),
        ));
    }

    let mut items = Vec::with_capacity(raw.len());
    for entry in raw {
        let name = entry
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("Producto")
            .to_string();

        let unit_price = match entry.price.as_ref().and_then(coerce_price) {
            Some(price) if price >= Decimal::ZERO => price,
            _ => {
                warn!(item = %name, "Dropping cart entry with invalid price");
                continue;
            }
        };

        let quantity = entry
            .quantity
            .as_ref()
            .and_then(coerce_quantity)
            .filter(|q| *q >= 1)
            .unwrap_or(1);

        items.push(NormalizedItem {
            product_id: entry.product_id.unwrap_or(0),
            name,
            section: entry.section,
            unit_price,
            quantity,
        });
    }

    if items.is_empty() {
        return Err(ServiceError::ValidationError(
            "No cart item could be processed".to_string(),
        ));
    }

    Ok(items)
}

fn coerce_price(value: &Value) -> Option<Decimal> {
    match value {
        // Parse the JSON literal text rather than going through f64
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_quantity(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|q| i32::try_from(q).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
