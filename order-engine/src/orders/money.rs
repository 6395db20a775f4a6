//! Money calculation utilities using rust_decimal for precision
//!
//! Stateless financial calculator. Every function is pure: the aggregate's
//! recompute step and read-only previews both go through here, so no other
//! component derives money on its own.
//!
//! Derived amounts are kept exact (`3.375` stays `3.375`). Rounding to cents
//! happens only for display via [`round_money`].

use rust_decimal::prelude::*;
use shared::order::{Adjustment, AdjustmentKind, OrderItem};

/// Rounding strategy for displayed monetary values (2 decimal places, half-up)
const DECIMAL_PLACES: u32 = 2;

/// Maximum allowed price per item / fixed adjustment (1,000,000)
pub const MAX_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);
/// Maximum allowed quantity per item
pub const MAX_QUANTITY: i32 = 9999;

/// Result of one full financial derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinancialBreakdown {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    /// subtotal − discount_amount (percentage gratuity base)
    pub gratuity_base: Decimal,
    pub gratuity_amount: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

impl FinancialBreakdown {
    /// Derive every monetary field from the items and configuration
    ///
    /// ```text
    /// subtotal = Σ(qty × unit_price)
    /// discount = pct(subtotal) | fixed, clamped to [0, subtotal]
    /// gratuity = pct(subtotal − discount) | fixed
    /// tax      = subtotal × tax_rate_percent / 100
    /// total    = subtotal − discount + tax + gratuity
    /// ```
    pub fn compute(
        items: &[OrderItem],
        discount: Option<&Adjustment>,
        gratuity: Option<&Adjustment>,
        tax_rate_percent: Decimal,
    ) -> Self {
        // Empty orders are all-zero, even with a fixed gratuity configured
        if items.is_empty() {
            return Self::zero();
        }
        let subtotal = calculate_subtotal(items);
        let discount_amount = calculate_discount(subtotal, discount);
        let gratuity_base = subtotal - discount_amount;
        let gratuity_amount = calculate_gratuity(gratuity_base, gratuity);
        let tax_amount = calculate_tax(subtotal, tax_rate_percent);
        let total_amount = calculate_total(subtotal, discount_amount, tax_amount, gratuity_amount);

        Self {
            subtotal,
            discount_amount,
            gratuity_base,
            gratuity_amount,
            tax_amount,
            total_amount,
        }
    }

    /// All-zero breakdown (empty order)
    pub fn zero() -> Self {
        Self {
            subtotal: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            gratuity_base: Decimal::ZERO,
            gratuity_amount: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
        }
    }
}

/// Validate that a f64 value is finite (not NaN, not Infinity)
#[inline]
fn require_finite(value: f64, field_name: &str) -> Result<(), String> {
    if !value.is_finite() {
        return Err(format!(
            "{} must be a finite number, got {}",
            field_name, value
        ));
    }
    Ok(())
}

/// Build an adjustment from caller input
///
/// Rejects non-finite and negative values, percentages above 100 and fixed
/// amounts above [`MAX_PRICE`].
pub fn adjustment_from_input(
    kind: AdjustmentKind,
    value: f64,
    field_name: &str,
) -> Result<Adjustment, String> {
    require_finite(value, field_name)?;
    if value < 0.0 {
        return Err(format!("{} must be non-negative, got {}", field_name, value));
    }
    let value = Decimal::from_f64(value)
        .ok_or_else(|| format!("{} is not representable, got {}", field_name, value))?;
    let adjustment = Adjustment { kind, value };
    validate_adjustment(&adjustment, field_name)?;
    Ok(adjustment)
}

/// Validate an already-decimal adjustment
pub fn validate_adjustment(adjustment: &Adjustment, field_name: &str) -> Result<(), String> {
    if adjustment.value.is_sign_negative() && !adjustment.value.is_zero() {
        return Err(format!(
            "{} must be non-negative, got {}",
            field_name, adjustment.value
        ));
    }
    match adjustment.kind {
        AdjustmentKind::Percentage if adjustment.value > Decimal::ONE_HUNDRED => Err(format!(
            "{} percentage must be between 0 and 100, got {}",
            field_name, adjustment.value
        )),
        AdjustmentKind::Fixed if adjustment.value > MAX_PRICE => Err(format!(
            "{} exceeds maximum allowed ({}), got {}",
            field_name, MAX_PRICE, adjustment.value
        )),
        _ => Ok(()),
    }
}

/// Validate a unit price captured at add-time
pub fn validate_unit_price(price: Decimal) -> Result<(), String> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(format!("price must be non-negative, got {}", price));
    }
    if price > MAX_PRICE {
        return Err(format!(
            "price exceeds maximum allowed ({}), got {}",
            MAX_PRICE, price
        ));
    }
    Ok(())
}

/// quantity × unit_price
#[inline]
pub fn line_total(quantity: i32, unit_price: Decimal) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Σ(qty × unit_price) over all items, sent or unsent
pub fn calculate_subtotal(items: &[OrderItem]) -> Decimal {
    items
        .iter()
        .map(|i| line_total(i.quantity, i.unit_price))
        .sum()
}

/// Discount amount against the subtotal, clamped so the total never goes negative
pub fn calculate_discount(subtotal: Decimal, discount: Option<&Adjustment>) -> Decimal {
    let Some(adj) = discount else {
        return Decimal::ZERO;
    };
    let amount = match adj.kind {
        AdjustmentKind::Percentage => subtotal * adj.value / Decimal::ONE_HUNDRED,
        AdjustmentKind::Fixed => adj.value,
    };
    amount.max(Decimal::ZERO).min(subtotal.max(Decimal::ZERO))
}

/// Gratuity amount; `base` is the post-discount subtotal
pub fn calculate_gratuity(base: Decimal, gratuity: Option<&Adjustment>) -> Decimal {
    let Some(adj) = gratuity else {
        return Decimal::ZERO;
    };
    let amount = match adj.kind {
        AdjustmentKind::Percentage => base * adj.value / Decimal::ONE_HUNDRED,
        AdjustmentKind::Fixed => adj.value,
    };
    amount.max(Decimal::ZERO)
}

/// Tax on the subtotal at the injected rate (percent)
pub fn calculate_tax(subtotal: Decimal, tax_rate_percent: Decimal) -> Decimal {
    (subtotal * tax_rate_percent / Decimal::ONE_HUNDRED).max(Decimal::ZERO)
}

/// total = subtotal − discount + tax + gratuity
#[inline]
pub fn calculate_total(
    subtotal: Decimal,
    discount_amount: Decimal,
    tax_amount: Decimal,
    gratuity_amount: Decimal,
) -> Decimal {
    subtotal - discount_amount + tax_amount + gratuity_amount
}

/// Round to cents for display (half away from zero)
#[inline]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}
