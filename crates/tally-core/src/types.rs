//! # Domain Types
//!
//! Entities read and written by the sale engine.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Catalog                 Transaction              Audit / Returns       │
//! │  ─────────────────       ─────────────────        ─────────────────     │
//! │  Product ──┐             Sale                     StockMovement         │
//! │            └─► Batch     ├── SaleItem (n)         ReturnRequest         │
//! │  Customer                └── SalePayment (n)      └── ReturnLine (n)    │
//! │  Promotion               ShiftSession                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All amounts are cents (`*_cents: i64`); rates and percentage values are
//! basis points.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1000 bps = 10%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate(0)
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// A product available for sale.
///
/// `stock_quantity` is denormalized: it should equal the sum of the
/// product's batch `quantity_remaining`, and is guarded independently
/// so a stale allocation plan cannot drive it negative.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,
    /// Authoritative selling price; client hints never override it.
    pub price_cents: i64,
    pub cost_price_cents: i64,
    pub tax_rate_bps: u32,
    pub stock_quantity: i64,
    pub reorder_level: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }

    /// True once stock has dropped to or below the reorder level.
    pub fn needs_reorder(&self) -> bool {
        self.stock_quantity <= self.reorder_level
    }
}

/// An inventory lot of a product.
///
/// Batches are consumed oldest `created_at` first.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductBatch {
    pub id: String,
    pub product_id: String,
    pub batch_number: String,
    pub quantity_initial: i64,
    pub quantity_remaining: i64,
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl ProductBatch {
    /// A batch is expired once `today` is past its expiry date.
    /// The expiry day itself is still sellable.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        matches!(self.expiry_date, Some(expiry) if today > expiry)
    }
}

/// A loyalty-program customer.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub loyalty_points: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Promotion
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PromotionKind {
    /// `value` is basis points of the sub total.
    Percentage,
    /// `value` is cents.
    Fixed,
}

/// A promo code.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Promotion {
    pub code: String,
    pub kind: PromotionKind,
    pub value: i64,
    pub min_order_value_cents: i64,
    #[ts(as = "String")]
    pub start_date: DateTime<Utc>,
    #[ts(as = "String")]
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale transaction.
///
/// ```text
/// draft ──► completed ──► refunded
///   │           │
///   └───────────┴──► voided (compensation only)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Parked sale; tender may be incomplete.
    Draft,
    /// Paid and finalized.
    Completed,
    /// Fully refunded; terminal.
    Refunded,
    /// Rolled back by compensation; terminal.
    Voided,
}

impl SaleStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Draft => "draft",
            SaleStatus::Completed => "completed",
            SaleStatus::Refunded => "refunded",
            SaleStatus::Voided => "voided",
        }
    }
}

impl Default for SaleStatus {
    fn default() -> Self {
        SaleStatus::Completed
    }
}

// =============================================================================
// Payment Methods
// =============================================================================

/// How a sale was paid, as recorded on the sale header.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    /// Two or more distinct tender methods.
    Split,
    /// Paid with loyalty points.
    Loyalty,
}

/// A concrete tender that produces a `SalePayment` row.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TenderMethod {
    Cash,
    Card,
    BankTransfer,
}

impl From<TenderMethod> for PaymentMethod {
    fn from(method: TenderMethod) -> Self {
        match method {
            TenderMethod::Cash => PaymentMethod::Cash,
            TenderMethod::Card => PaymentMethod::Card,
            TenderMethod::BankTransfer => PaymentMethod::BankTransfer,
        }
    }
}

impl PaymentMethod {
    /// The tender method a single-method payment maps to, if any.
    pub const fn tender(&self) -> Option<TenderMethod> {
        match self {
            PaymentMethod::Cash => Some(TenderMethod::Cash),
            PaymentMethod::Card => Some(TenderMethod::Card),
            PaymentMethod::BankTransfer => Some(TenderMethod::BankTransfer),
            PaymentMethod::Split | PaymentMethod::Loyalty => None,
        }
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A sale header.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub receipt_number: String,
    pub cashier_id: String,
    pub shift_id: String,
    pub customer_id: Option<String>,
    pub sub_total_cents: i64,
    pub tax_total_cents: i64,
    pub discount_total_cents: i64,
    pub grand_total_cents: i64,
    pub payment_method: PaymentMethod,
    pub amount_paid_cents: i64,
    pub change_given_cents: i64,
    pub points_redeemed: i64,
    pub promo_code: Option<String>,
    pub status: SaleStatus,
    /// Free text; compensation records the failure reason here.
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn grand_total(&self) -> Money {
        Money::from_cents(self.grand_total_cents)
    }

    /// grand_total = sub_total + tax_total − discount_total, and ≥ 0.
    pub fn totals_balance(&self) -> bool {
        self.grand_total_cents
            == self.sub_total_cents + self.tax_total_cents - self.discount_total_cents
            && self.grand_total_cents >= 0
    }
}

/// A line item in a sale, with the product name frozen at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub name_snapshot: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// quantity × unit_price.
    pub sub_total_cents: i64,
    pub discount_cents: i64,
    pub tax_amount_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    /// What the customer paid for this line: sub total − discount + tax.
    pub fn net_total(&self) -> Money {
        Money::from_cents(self.sub_total_cents - self.discount_cents + self.tax_amount_cents)
    }
}

/// One tender applied to a sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalePayment {
    pub id: String,
    pub sale_id: String,
    pub method: TenderMethod,
    pub amount_cents: i64,
    /// Card auth code, transfer reference, etc.
    pub reference_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Shift Session
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    Open,
    Closed,
}

/// A cashier's working session.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ShiftSession {
    pub id: String,
    pub user_id: String,
    #[ts(as = "String")]
    pub start_time: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub end_time: Option<DateTime<Utc>>,
    pub status: ShiftStatus,
    pub starting_cash_cents: i64,
    pub ending_cash_cents: Option<i64>,
    pub cash_sales_cents: i64,
    pub expected_cash_cents: i64,
    pub difference_cents: Option<i64>,
}

// =============================================================================
// Stock Movement
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Sale,
    Return,
}

/// Append-only inventory audit row.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    /// Lot touched by a sale; returns restore product stock only.
    pub batch_id: Option<String>,
    pub kind: MovementKind,
    /// Negative for sales, positive for returns.
    pub quantity_change: i64,
    /// Sale id or return request id.
    pub reference_id: String,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Returns
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    Pending,
    Completed,
    Rejected,
}

/// A partial-return request against a completed sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ReturnRequest {
    pub id: String,
    pub sale_id: String,
    pub status: ReturnStatus,
    pub refund_amount_cents: i64,
    pub reason: Option<String>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// One returned sale line.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ReturnLine {
    pub id: String,
    pub return_id: String,
    pub sale_item_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub refund_amount_cents: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(expiry: Option<NaiveDate>) -> ProductBatch {
        ProductBatch {
            id: "B1".to_string(),
            product_id: "P1".to_string(),
            batch_number: "LOT-1".to_string(),
            quantity_initial: 10,
            quantity_remaining: 10,
            expiry_date: expiry,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_batch_expiry_is_exclusive_of_expiry_day() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let b = batch(Some(day));
        assert!(!b.is_expired(day));
        assert!(b.is_expired(day.succ_opt().unwrap()));
        assert!(!batch(None).is_expired(day));
    }

    #[test]
    fn test_tender_mapping() {
        assert_eq!(PaymentMethod::from(TenderMethod::Card), PaymentMethod::Card);
        assert_eq!(PaymentMethod::Cash.tender(), Some(TenderMethod::Cash));
        assert_eq!(PaymentMethod::Split.tender(), None);
        assert_eq!(PaymentMethod::Loyalty.tender(), None);
    }

    #[test]
    fn test_sale_item_net_total() {
        let item = SaleItem {
            id: "I1".to_string(),
            sale_id: "S1".to_string(),
            product_id: "P1".to_string(),
            name_snapshot: "Tea".to_string(),
            quantity: 2,
            unit_price_cents: 1000,
            sub_total_cents: 2000,
            discount_cents: 100,
            tax_amount_cents: 190,
            created_at: Utc::now(),
        };
        assert_eq!(item.net_total().cents(), 2090);
    }
}
