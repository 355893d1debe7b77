//! Monetary aggregation: VAT split and net/gross conversion, in fixed-point
//! decimal arithmetic throughout (never binary floats).

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::document::{DiscountItem, FiscalItem, Sign};

/// Flat VAT rate modeled by the device: 21%.
pub const VAT_RATE: Decimal = dec!(0.21);
/// `1 + VAT_RATE`, the net-to-gross multiplier.
pub const VAT_DIVISOR: Decimal = dec!(1.21);

/// Splits a line amount into its effective (gross) amount and its VAT
/// component, given whether the amount as stored is already VAT-inclusive.
///
/// - `total = true`: amount is gross already; VAT is extracted from it.
/// - `total = false`: amount is net; VAT is added to produce the gross amount.
pub fn effective_amount_and_vat(amount: Decimal, total: bool) -> (Decimal, Decimal) {
    if total {
        let iiva = (amount / VAT_DIVISOR) * VAT_RATE;
        (amount, iiva)
    } else {
        let iiva = amount * VAT_RATE;
        (amount * VAT_DIVISOR, iiva)
    }
}

fn signed(amount: Decimal, sign: Sign) -> Decimal {
    match sign {
        Sign::Add => amount,
        Sign::Subtract => -amount,
    }
}

/// Totals produced by Subtotal/Close: gross total, fiscal item count, VAT.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Totals {
    pub total: Decimal,
    pub items_count: i64,
    pub iva: Decimal,
}

/// Aggregates a document's items and discounts into [`Totals`].
///
/// Matches `_calcular_totales` in the original emulator driver: each item
/// contributes `qty * effective_amount`, each discount contributes its
/// (already-total) `effective_amount` directly, signed by `M`/`m`.
pub fn aggregate(items: &[FiscalItem], discounts: &[DiscountItem]) -> Totals {
    let mut total = Decimal::ZERO;
    let mut iva = Decimal::ZERO;
    let mut items_count = 0i64;

    for item in items {
        let (amount, item_iva) = effective_amount_and_vat(item.unit_amount, item.total);
        total += signed(item.quantity * amount, item.sign);
        iva += signed(item.quantity * item_iva, item.sign);
        items_count += match item.sign {
            Sign::Add => 1,
            Sign::Subtract => -1,
        };
    }

    for discount in discounts {
        let (amount, discount_iva) = effective_amount_and_vat(discount.amount, discount.total);
        total += signed(amount, discount.sign);
        iva += signed(discount_iva, discount.sign);
    }

    Totals {
        total,
        items_count,
        iva,
    }
}

/// Converts a stored (net or gross, per `total`) unit amount into the value
/// PrintLineItem should *display*, per the document-type × total-flag
/// matrix: a type-A document displays net, everyone else displays gross.
pub fn display_unit_amount(unit_amount: Decimal, is_type_a: bool, total: bool) -> Decimal {
    match (is_type_a, total) {
        (true, true) => unit_amount / VAT_DIVISOR,
        (false, false) => unit_amount * VAT_DIVISOR,
        _ => unit_amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DiscountItem, FiscalItem};

    fn water_item() -> FiscalItem {
        FiscalItem {
            description: "WATER".into(),
            quantity: dec!(2),
            unit_amount: dec!(10.00),
            vat_rate: dec!(21.00),
            sign: Sign::Add,
            k: Decimal::ZERO,
            total: false,
        }
    }

    #[test]
    fn fiscal_b_ticket_subtotal_matches_scenario() {
        let totals = aggregate(&[water_item()], &[]);
        assert_eq!(totals.total, dec!(24.20));
        assert_eq!(totals.items_count, 1);
    }

    #[test]
    fn total_flag_true_extracts_vat_from_gross() {
        let (amount, iva) = effective_amount_and_vat(dec!(12.1), true);
        assert_eq!(amount, dec!(12.1));
        assert_eq!((dec!(12.1) / VAT_DIVISOR) * VAT_RATE, iva);
    }

    #[test]
    fn discount_reduces_total_for_subtract_sign() {
        let discount = DiscountItem {
            description: "DTO".into(),
            amount: dec!(1.00),
            sign: Sign::Subtract,
            total: true,
        };
        let totals = aggregate(&[water_item()], &[discount]);
        assert_eq!(totals.total, dec!(24.20) - dec!(1.00));
    }

    #[test]
    fn display_unit_amount_matrix() {
        assert_eq!(display_unit_amount(dec!(12.1), true, true), dec!(12.1) / VAT_DIVISOR);
        assert_eq!(display_unit_amount(dec!(10.0), false, false), dec!(10.0) * VAT_DIVISOR);
        assert_eq!(display_unit_amount(dec!(10.0), true, false), dec!(10.0));
        assert_eq!(display_unit_amount(dec!(10.0), false, true), dec!(10.0));
    }
}
