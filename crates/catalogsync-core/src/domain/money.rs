//! Monetary amounts
//!
//! `Price` carries the normal/discount amounts in the upstream table's
//! native currency plus the optional USD mirror (spec §3.1). Amounts are
//! non-negative and rounded to two decimal places at construction so the
//! invariant never needs re-checking downstream.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// A non-negative amount rounded to two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Rounds `amount` to two decimal places and validates it is non-negative.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidAmount` if `amount` is negative or not finite.
    pub fn new(amount: Decimal) -> Result<Self, DomainError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(DomainError::InvalidAmount(format!(
                "amount must be non-negative: {amount}"
            )));
        }
        Ok(Self(amount.round_dp(2)))
    }

    /// Zero amount.
    #[must_use]
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Returns the inner decimal value.
    #[must_use]
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

/// The price section of a product (spec §3.1 `price.*`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// List / non-discounted price.
    pub normal: Option<Money>,
    /// Discounted price; must be `<= normal` when both are present.
    pub discount: Option<Money>,
    /// `1 - discount/normal`, rounded to four decimals, derived when both
    /// `normal` and `discount` are present.
    pub discount_rate: Option<Decimal>,
    /// Alternate-currency mirror of `normal`, stored verbatim, never
    /// converted from `normal` (spec §9 Open Question).
    pub usd: Option<Money>,
    /// Alternate-currency mirror of `discount`.
    pub special_usd: Option<Money>,
}

impl Price {
    /// Builds a `Price`, validating `discount <= normal` and deriving
    /// `discount_rate` per spec §3.1.
    ///
    /// # Errors
    /// Returns `DomainError::ValidationFailed` if `discount > normal`.
    pub fn new(
        normal: Option<Money>,
        discount: Option<Money>,
        usd: Option<Money>,
        special_usd: Option<Money>,
    ) -> Result<Self, DomainError> {
        let discount_rate = match (normal, discount) {
            (Some(n), Some(d)) => {
                if d.as_decimal() > n.as_decimal() {
                    return Err(DomainError::ValidationFailed(format!(
                        "discount ({}) exceeds normal price ({})",
                        d.as_decimal(),
                        n.as_decimal()
                    )));
                }
                if n.as_decimal().is_zero() {
                    Some(Decimal::ZERO)
                } else {
                    let rate = Decimal::ONE - (d.as_decimal() / n.as_decimal());
                    Some(rate.round_dp(4))
                }
            }
            _ => None,
        };

        Ok(Self {
            normal,
            discount,
            discount_rate,
            usd,
            special_usd,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn money_rounds_to_two_decimals() {
        let m = Money::new(dec!(9.999)).unwrap();
        assert_eq!(m.as_decimal(), dec!(10.00));
    }

    #[test]
    fn money_rejects_negative() {
        assert!(Money::new(dec!(-0.01)).is_err());
    }

    #[test]
    fn price_derives_discount_rate() {
        let normal = Money::new(dec!(100.00)).unwrap();
        let discount = Money::new(dec!(75.00)).unwrap();
        let price = Price::new(Some(normal), Some(discount), None, None).unwrap();
        assert_eq!(price.discount_rate, Some(dec!(0.25)));
    }

    #[test]
    fn price_rejects_discount_above_normal() {
        let normal = Money::new(dec!(10.00)).unwrap();
        let discount = Money::new(dec!(20.00)).unwrap();
        assert!(Price::new(Some(normal), Some(discount), None, None).is_err());
    }

    #[test]
    fn price_without_discount_has_no_rate() {
        let normal = Money::new(dec!(10.00)).unwrap();
        let price = Price::new(Some(normal), None, None, None).unwrap();
        assert_eq!(price.discount_rate, None);
    }
}
