//! Display-only order totals.
//!
//! The backend prices the order from its own copy of the cart; these figures
//! are shown to the user and never sent.

use bookshop_core::Price;
use rust_decimal::Decimal;

/// Flat shipping and tax rate applied to the cart subtotal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingPolicy {
    /// Charged when the cart has at least one line.
    pub shipping_fee: Decimal,
    /// Fraction of the subtotal, e.g. `0.07`.
    pub tax_rate: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            shipping_fee: Decimal::new(599, 2),
            tax_rate: Decimal::new(7, 2),
        }
    }
}

impl PricingPolicy {
    /// Totals for a cart with the given subtotal. Nothing is rounded.
    #[must_use]
    pub fn totals(&self, subtotal: Price, has_lines: bool) -> OrderTotals {
        let shipping = if has_lines {
            Price::new(self.shipping_fee)
        } else {
            Price::ZERO
        };
        let tax = subtotal * self.tax_rate;
        OrderTotals {
            subtotal,
            shipping,
            tax,
            total: subtotal + shipping + tax,
        }
    }
}

/// Unrounded order summary; format with [`Price::display`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Price,
    pub shipping: Price,
    pub tax: Price,
    pub total: Price,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hundred_dollar_cart() {
        let totals = PricingPolicy::default().totals(Price::from_cents(10_000), true);
        assert_eq!(totals.shipping, Price::from_cents(599));
        assert_eq!(totals.tax, Price::from_cents(700));
        assert_eq!(totals.total, Price::from_cents(11_299));
        assert_eq!(totals.total.display(), "$112.99");
    }

    #[test]
    fn test_empty_cart_has_no_shipping() {
        let totals = PricingPolicy::default().totals(Price::ZERO, false);
        assert_eq!(totals.shipping, Price::ZERO);
        assert_eq!(totals.total, Price::ZERO);
    }

    #[test]
    fn test_rounding_happens_only_at_display() {
        // 3 × 10.99 = 32.97; tax 2.3079 stays unrounded in the total.
        let totals = PricingPolicy::default().totals(Price::from_cents(3297), true);
        assert_eq!(totals.tax.amount(), Decimal::new(2_3079, 4));
        assert_eq!(totals.total.amount(), Decimal::new(41_2679, 4));
        assert_eq!(totals.tax.display(), "$2.31");
        assert_eq!(totals.total.display(), "$41.27");
    }

    #[test]
    fn test_custom_policy() {
        let policy = PricingPolicy {
            shipping_fee: Decimal::ZERO,
            tax_rate: Decimal::new(1, 1),
        };
        let totals = policy.totals(Price::from_cents(2000), true);
        assert_eq!(totals.total, Price::from_cents(2200));
    }
}
