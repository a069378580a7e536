//! Customer profile lookup.
//!
//! The gateway requires customer contact and shipping data; profiles live in
//! the primary store's `usuarios` table. Missing address fields fall back to
//! placeholder values accepted by the gateway, but a missing email is a hard
//! validation failure since the gateway refuses charges without one.

use crate::errors::ServiceError;
use crate::gateway::{ChargeCustomer, ShippingAddress};
use sea_orm::{ConnectionTrait, DatabaseConnection, FromQueryResult, Statement};
use std::sync::Arc;
use tracing::instrument;

const FALLBACK_PHONE: &str = "0000000000";
const FALLBACK_STREET: &str = "Calle no proporcionada";
const FALLBACK_CITY: &str = "Ciudad no proporcionada";
const FALLBACK_STATE: &str = "Estado no proporcionado";
const FALLBACK_POSTAL_CODE: &str = "00000";

#[derive(Debug, Clone, FromQueryResult)]
pub struct CustomerProfile {
    pub email: Option<String>,
    pub nombre: Option<String>,
    pub telefono: Option<String>,
    pub calle: Option<String>,
    pub colonia: Option<String>,
    pub municipio: Option<String>,
    pub estado: Option<String>,
    pub codigo_postal: Option<String>,
}

impl CustomerProfile {
    /// Gateway contact block. Fails when the profile has no email.
    pub fn charge_customer(&self) -> Result<ChargeCustomer, ServiceError> {
        let email = self
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                ServiceError::ValidationError(
                    "Customer profile has no email; update the profile before paying".to_string(),
                )
            })?;

        Ok(ChargeCustomer {
            name: self
                .nombre
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "Cliente".to_string()),
            email: email.to_string(),
            phone: self
                .telefono
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| FALLBACK_PHONE.to_string()),
        })
    }

    /// Gateway shipping block, with colonia folded into street1 when set.
    pub fn shipping_address(&self) -> ShippingAddress {
        let calle = self
            .calle
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        let colonia = self
            .colonia
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        let street1 = match (calle, colonia) {
            (Some(calle), Some(colonia)) => format!("{}, {}", calle, colonia),
            (Some(calle), None) => calle.to_string(),
            _ => FALLBACK_STREET.to_string(),
        };

        ShippingAddress {
            street1,
            city: self
                .municipio
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| FALLBACK_CITY.to_string()),
            state: self
                .estado
                .clone()
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| FALLBACK_STATE.to_string()),
            country: "MX".to_string(),
            postal_code: self
                .codigo_postal
                .clone()
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| FALLBACK_POSTAL_CODE.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DatabaseConnection>,
}

impl CustomerService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn find_profile(&self, user_id: i64) -> Result<CustomerProfile, ServiceError> {
        let stmt = Statement::from_sql_and_values(
            self.db.get_database_backend(),
            "SELECT email, nombre, telefono, calle, colonia, municipio, estado, codigo_postal \
             FROM usuarios WHERE id = ?",
            [user_id.into()],
        );

        CustomerProfile::find_by_statement(stmt)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))
    }
}
