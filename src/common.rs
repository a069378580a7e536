/// Common domain types shared across handlers and services
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The four catalog sections sold by the store. Each section is backed by its
/// own database; wire names follow the storefront's historical values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CatalogSection {
    #[serde(rename = "mercancia")]
    Merchandise,
    #[serde(rename = "libros", alias = "libro")]
    Book,
    #[serde(rename = "ebooks", alias = "ebook")]
    Ebook,
    #[serde(rename = "webinars", alias = "webinar")]
    Webinar,
}

impl CatalogSection {
    pub const ALL: [CatalogSection; 4] = [
        CatalogSection::Merchandise,
        CatalogSection::Book,
        CatalogSection::Ebook,
        CatalogSection::Webinar,
    ];

    /// Wire name, used for gateway descriptions and ledger serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogSection::Merchandise => "mercancia",
            CatalogSection::Book => "libros",
            CatalogSection::Ebook => "ebooks",
            CatalogSection::Webinar => "webinars",
        }
    }

    /// Physical sections carry stock that is decremented at checkout.
    pub fn is_physical(&self) -> bool {
        matches!(self, CatalogSection::Merchandise | CatalogSection::Book)
    }
}

impl std::fmt::Display for CatalogSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported payment methods. The tax policy for e-books is keyed by this
/// value (see `services::pricing`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Pay in cash at an affiliated retail partner; 3-day expiry.
    Cash,
    /// SPEI bank transfer; 24-hour expiry.
    Spei,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Spei => "spei",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
