//! Pricing and tax engine.
//!
//! Pure and deterministic: it runs before any irreversible action and its
//! output is trusted by both the gateway request and the ledger write.
//!
//! IVA is applied at a flat 16%. Merchandise is always taxed; books and
//! webinars are always exempt. E-books are taxed only under SPEI and exempt
//! under cash — the policy is keyed by payment method, matching the store's
//! established billing behavior (see DESIGN.md before changing it).

use crate::common::{CatalogSection, PaymentMethod};
use crate::errors::ServiceError;
use crate::services::line_items::NormalizedItem;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

pub const IVA_RATE: Decimal = dec!(0.16);

/// A canonical, priced line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: i64,
    pub name: String,
    pub section: CatalogSection,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub tax_applicable: bool,
    pub line_subtotal: Decimal,
    pub line_tax: Decimal,
    pub line_total: Decimal,
}

/// A fully priced order. `total = subtotal + tax_total`, all three summed
/// from already-rounded line values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedOrder {
    pub items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
}

/// Tax rate for a section under a payment method.
pub fn section_tax_rate(section: CatalogSection, method: PaymentMethod) -> Option<Decimal> {
    match (section, method) {
        (CatalogSection::Merchandise, _) => Some(IVA_RATE),
        (CatalogSection::Ebook, PaymentMethod::Spei) => Some(IVA_RATE),
        (CatalogSection::Ebook, PaymentMethod::Cash) => None,
        (CatalogSection::Book, _) | (CatalogSection::Webinar, _) => None,
    }
}

/// Rounds a monetary amount to 2 decimal places, half-up.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Prices a normalized cart. Line tax is rounded per line; totals are sums
/// of rounded line values and are never re-derived from the aggregate.
pub fn price(
    items: &[NormalizedItem],
    method: PaymentMethod,
) -> Result<PricedOrder, ServiceError> {
    let mut priced = Vec::with_capacity(items.len());
    let mut subtotal = Decimal::ZERO;
    let mut tax_total = Decimal::ZERO;
    let mut total = Decimal::ZERO;

    for item in items {
        let line_subtotal = round_money(item.unit_price * Decimal::from(item.quantity));
        let rate = section_tax_rate(item.section, method);
        let line_tax = match rate {
            Some(rate) => round_money(line_subtotal * rate),
            None => Decimal::ZERO,
        };
        let line_total = line_subtotal + line_tax;

        subtotal += line_subtotal;
        tax_total += line_tax;
        total += line_total;

        priced.push(LineItem {
            product_id: item.product_id,
            name: item.name.clone(),
            section: item.section,
            unit_price: item.unit_price,
            quantity: item.quantity,
            tax_applicable: rate.is_some(),
            line_subtotal,
            line_tax,
            line_total,
        });
    }

    if total <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Order total must be positive".to_string(),
        ));
    }

    Ok(PricedOrder {
        items: priced,
        subtotal,
        tax_total,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(section: CatalogSection, price: Decimal, qty: i32) -> NormalizedItem {
        NormalizedItem {
            product_id: 1,
            name: "item".to_string(),
            section,
            unit_price: price,
            quantity: qty,
        }
    }

    #[test]
    fn merchandise_cash_is_taxed() {
        // Scenario A: merchandise 100.00 x 2, cash
        let order = price(
            &[item(CatalogSection::Merchandise, dec!(100.00), 2)],
            PaymentMethod::Cash,
        )
        .unwrap();
        assert_eq!(order.subtotal, dec!(200.00));
        assert_eq!(order.tax_total, dec!(32.00));
        assert_eq!(order.total, dec!(232.00));
    }

    #[test]
    fn ebook_cash_is_exempt() {
        // Scenario B
        let order = price(
            &[item(CatalogSection::Ebook, dec!(50.00), 1)],
            PaymentMethod::Cash,
        )
        .unwrap();
        assert_eq!(order.subtotal, dec!(50.00));
        assert_eq!(order.tax_total, dec!(0.00));
        assert_eq!(order.total, dec!(50.00));
        assert!(!order.items[0].tax_applicable);
    }

    #[test]
    fn ebook_spei_is_taxed() {
        // Scenario C: same e-book, bank transfer
        let order = price(
            &[item(CatalogSection::Ebook, dec!(50.00), 1)],
            PaymentMethod::Spei,
        )
        .unwrap();
        assert_eq!(order.subtotal, dec!(50.00));
        assert_eq!(order.tax_total, dec!(8.00));
        assert_eq!(order.total, dec!(58.00));
        assert!(order.items[0].tax_applicable);
    }

    #[test]
    fn mixed_cart_taxes_merchandise_only() {
        // Scenario D: merchandise 100.00 x 1 + book 40.00 x 1, cash
        let order = price(
            &[
                item(CatalogSection::Merchandise, dec!(100.00), 1),
                item(CatalogSection::Book, dec!(40.00), 1),
            ],
            PaymentMethod::Cash,
        )
        .unwrap();
        assert_eq!(order.subtotal, dec!(140.00));
        assert_eq!(order.tax_total, dec!(16.00));
        assert_eq!(order.total, dec!(156.00));
    }

    #[test]
    fn books_and_webinars_always_exempt() {
        for method in [PaymentMethod::Cash, PaymentMethod::Spei] {
            assert_eq!(section_tax_rate(CatalogSection::Book, method), None);
            assert_eq!(section_tax_rate(CatalogSection::Webinar, method), None);
            assert_eq!(
                section_tax_rate(CatalogSection::Merchandise, method),
                Some(IVA_RATE)
            );
        }
    }

    #[test]
    fn line_tax_rounds_half_up() {
        // 31.25 * 0.16 = 5.00 exactly; 31.27 * 0.16 = 5.0032 -> 5.00;
        // 31.28 * 0.16 = 5.0048 -> 5.00; 0.03 * 0.16 = 0.0048 -> 0.00;
        // 70.31 * 0.16 = 11.2496 -> 11.25 (midpoint-adjacent)
        let order = price(
            &[item(CatalogSection::Merchandise, dec!(70.31), 1)],
            PaymentMethod::Cash,
        )
        .unwrap();
        assert_eq!(order.tax_total, dec!(11.25));

        // Midpoint rounds away from zero: 10.03125 * 0.16 = 1.605 -> 1.61
        assert_eq!(round_money(dec!(1.605)), dec!(1.61));
    }

    #[test]
    fn totals_sum_rounded_lines() {
        // Two lines each with sub-cent tax: rounding happens per line,
        // never on the aggregate.
        let order = price(
            &[
                item(CatalogSection::Merchandise, dec!(0.07), 1),
                item(CatalogSection::Merchandise, dec!(0.07), 1),
            ],
            PaymentMethod::Cash,
        )
        .unwrap();
        // 0.07 * 0.16 = 0.0112 -> 0.01 per line
        assert_eq!(order.tax_total, dec!(0.02));
        assert_eq!(order.total, order.subtotal + order.tax_total);
    }

    #[test]
    fn total_invariant_holds() {
        let order = price(
            &[
                item(CatalogSection::Merchandise, dec!(19.99), 3),
                item(CatalogSection::Ebook, dec!(149.50), 1),
                item(CatalogSection::Webinar, dec!(499.00), 2),
            ],
            PaymentMethod::Spei,
        )
        .unwrap();
        assert_eq!(order.total, order.subtotal + order.tax_total);
        let line_sum: Decimal = order.items.iter().map(|i| i.line_subtotal).sum();
        assert_eq!(order.subtotal, line_sum);
        for line in &order.items {
            assert_eq!(line.line_total, line.line_subtotal + line.line_tax);
        }
    }

    #[test]
    fn zero_total_is_rejected() {
        let err = price(
            &[item(CatalogSection::Book, dec!(0.00), 1)],
            PaymentMethod::Cash,
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }
}
