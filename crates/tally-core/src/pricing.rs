//! # Pricing Engine
//!
//! Computes authoritative line totals from server-held product data.
//!
//! ```text
//! CartLine { product_id, quantity, client_price_hint, discount, tax_hint }
//!      │                               │                      │
//!      │                               └──── ignored ─────────┘
//!      ▼
//! Product (catalog) ──► price_cents, tax_rate_bps
//!      │
//!      ▼
//! sub_total = qty × price
//! tax       = rate > 0 ? max(sub_total − discount, 0) × rate : 0
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::Product;
use crate::validation::{validate_cart_size, validate_quantity};

/// One line of the cart as received from the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: String,
    pub quantity: i64,
    /// What the terminal displayed; never used for totals.
    #[serde(default)]
    pub client_price_hint_cents: Option<i64>,
    #[serde(default)]
    pub discount_cents: i64,
    /// What the terminal displayed; never used for totals.
    #[serde(default)]
    pub tax_hint_bps: Option<u32>,
}

impl CartLine {
    /// A plain line with no discount.
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        CartLine {
            product_id: product_id.into(),
            quantity,
            client_price_hint_cents: None,
            discount_cents: 0,
            tax_hint_bps: None,
        }
    }

    /// Sets the per-line discount.
    pub fn with_discount(mut self, discount_cents: i64) -> Self {
        self.discount_cents = discount_cents;
        self
    }
}

/// A line priced from catalog data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub sub_total: Money,
    pub discount: Money,
    pub tax: Money,
}

/// Result of pricing a whole cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub sub_total: Money,
    pub tax_total: Money,
    /// Σ line discounts (promotion and manual discounts are separate).
    pub line_discount_total: Money,
}

/// Prices every cart line against `catalog` (keyed by product id).
///
/// ## Errors
/// - `Validation` when the cart is empty or too large
/// - `InvalidItem` for a bad quantity, unknown or inactive product,
///   negative stored price, or a discount outside `0..=sub_total`
pub fn price_items(lines: &[CartLine], catalog: &HashMap<String, Product>) -> CoreResult<PricedCart> {
    validate_cart_size(lines.len())?;

    let mut priced = Vec::with_capacity(lines.len());
    let mut sub_total = Money::zero();
    let mut tax_total = Money::zero();
    let mut line_discount_total = Money::zero();

    let overflow = || ValidationError::OutOfRange {
        field: "cart total".to_string(),
        min: 0,
        max: i64::MAX,
    };
    for line in lines {
        let line = price_line(line, catalog)?;
        sub_total = sub_total.checked_add(line.sub_total).ok_or_else(overflow)?;
        tax_total = tax_total.checked_add(line.tax).ok_or_else(overflow)?;
        line_discount_total += line.discount;
        priced.push(line);
    }
    // grand total is computed from sub + tax downstream
    sub_total.checked_add(tax_total).ok_or_else(overflow)?;

    Ok(PricedCart {
        lines: priced,
        sub_total,
        tax_total,
        line_discount_total,
    })
}

fn price_line(line: &CartLine, catalog: &HashMap<String, Product>) -> CoreResult<PricedLine> {
    validate_quantity(line.quantity)
        .map_err(|e| CoreError::invalid_item(&line.product_id, e.to_string()))?;

    let product = catalog
        .get(&line.product_id)
        .ok_or_else(|| CoreError::invalid_item(&line.product_id, "product does not exist"))?;

    if !product.is_active {
        return Err(CoreError::invalid_item(&line.product_id, "product is inactive"));
    }
    if product.price_cents < 0 {
        return Err(CoreError::invalid_item(&line.product_id, "price is negative"));
    }

    let unit_price = product.price();
    let sub_total = unit_price
        .checked_multiply_quantity(line.quantity)
        .ok_or_else(|| CoreError::invalid_item(&line.product_id, "line total is out of range"))?;
    let discount = Money::from_cents(line.discount_cents);

    if discount.is_negative() || discount > sub_total {
        return Err(CoreError::invalid_item(
            &line.product_id,
            format!("discount {} outside 0..={}", discount, sub_total),
        ));
    }

    let rate = product.tax_rate();
    let tax = if rate.is_zero() {
        Money::zero()
    } else {
        (sub_total - discount).non_negative().calculate_tax(rate)
    };

    Ok(PricedLine {
        product_id: product.id.clone(),
        name: product.name.clone(),
        quantity: line.quantity,
        unit_price,
        sub_total,
        discount,
        tax,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(id: &str, price_cents: i64, tax_rate_bps: u32) -> Product {
        Product {
            id: id.to_string(),
            sku: format!("SKU-{}", id),
            name: format!("Product {}", id),
            price_cents,
            cost_price_cents: 0,
            tax_rate_bps,
            stock_quantity: 10,
            reorder_level: 0,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn catalog(products: Vec<Product>) -> HashMap<String, Product> {
        products.into_iter().map(|p| (p.id.clone(), p)).collect()
    }

    #[test]
    fn test_two_units_at_ten_percent() {
        let catalog = catalog(vec![product("P1", 1000, 1000)]);
        let cart = price_items(&[CartLine::new("P1", 2)], &catalog).unwrap();

        assert_eq!(cart.sub_total.cents(), 2000);
        assert_eq!(cart.tax_total.cents(), 200);
        assert_eq!(cart.line_discount_total, Money::zero());
    }

    #[test]
    fn test_client_price_hint_is_ignored() {
        let catalog = catalog(vec![product("P1", 1000, 0)]);
        let mut line = CartLine::new("P1", 1);
        line.client_price_hint_cents = Some(1);
        line.tax_hint_bps = Some(5000);

        let cart = price_items(&[line], &catalog).unwrap();
        assert_eq!(cart.lines[0].unit_price.cents(), 1000);
        assert_eq!(cart.tax_total, Money::zero());
    }

    #[test]
    fn test_tax_is_applied_after_line_discount() {
        let catalog = catalog(vec![product("P1", 1000, 1000)]);
        let cart = price_items(&[CartLine::new("P1", 2).with_discount(500)], &catalog).unwrap();

        // (2000 - 500) × 10% = 150
        assert_eq!(cart.lines[0].tax.cents(), 150);
        assert_eq!(cart.line_discount_total.cents(), 500);
    }

    #[test]
    fn test_invalid_items() {
        let mut inactive = product("P2", 100, 0);
        inactive.is_active = false;
        let catalog = catalog(vec![product("P1", 1000, 0), inactive, product("P3", -1, 0)]);

        let cases = [
            CartLine::new("P1", 0),
            CartLine::new("missing", 1),
            CartLine::new("P2", 1),
            CartLine::new("P3", 1),
            CartLine::new("P1", 1).with_discount(1001),
            CartLine::new("P1", 1).with_discount(-1),
        ];
        for line in cases {
            let err = price_items(&[line.clone()], &catalog).unwrap_err();
            assert!(
                matches!(err, CoreError::InvalidItem { .. }),
                "expected InvalidItem for {:?}, got {:?}",
                line,
                err
            );
        }
    }

    #[test]
    fn test_oversized_totals_are_rejected() {
        let catalog = catalog(vec![product("P1", i64::MAX / 2, 0), product("P2", i64::MAX / 2 + 2, 0)]);

        let err = price_items(&[CartLine::new("P1", 3)], &catalog).unwrap_err();
        assert!(matches!(err, CoreError::InvalidItem { .. }));

        let err = price_items(&[CartLine::new("P1", 1), CartLine::new("P2", 1)], &catalog).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::OutOfRange { .. })));
    }

    #[test]
    fn test_empty_cart_is_validation_error() {
        let err = price_items(&[], &HashMap::new()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
