//! # tally-core: Pure Sale Logic for Tally POS
//!
//! Every decision the sale engine makes before it touches storage lives
//! here as a pure function with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Boundary (HTTP / IPC, out of scope)                  │   │
//! │  │        normalizes every request shape into SaleRequest          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               tally-sales (saga engine)                         │   │
//! │  │     shift guard, stock mutator, compensation, returns           │   │
//! │  └──────────────┬───────────────────────────────┬──────────────────┘   │
//! │                 │                               │                       │
//! │  ┌──────────────▼──────────────────┐ ┌──────────▼──────────────────┐   │
//! │  │     ★ tally-core (THIS CRATE) ★  │ │   tally-db (SQLite)         │   │
//! │  │  pricing   promotion  allocation │ │   repositories, CAS,        │   │
//! │  │  tender    loyalty    receipt    │ │   migrations                │   │
//! │  │  shift     money      validation │ │                             │   │
//! │  │  NO I/O • NO DATABASE • NO CLOCK │ └─────────────────────────────┘   │
//! │  └──────────────────────────────────┘                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Sale, ShiftSession, etc.)
//! - [`money`] - Money type with integer arithmetic
//! - [`pricing`] - Authoritative line pricing
//! - [`promotion`] - Promo codes and the discount approval gate
//! - [`allocation`] - FIFO batch planning with expiry guard
//! - [`tender`] - Payment normalization and change
//! - [`loyalty`] - Points earned and redeemed
//! - [`receipt`] - Receipt number format
//! - [`shift`] - Drawer reconciliation
//! - [`error`] - Domain error types
//! - [`validation`] - Field rules
//!
//! ## Example Usage
//!
//! ```rust
//! use std::collections::HashMap;
//! use tally_core::pricing::{price_items, CartLine};
//! use tally_core::Product;
//!
//! let now = chrono::Utc::now();
//! let product = Product {
//!     id: "P1".into(),
//!     sku: "SKU-1".into(),
//!     name: "Tea".into(),
//!     price_cents: 1000,
//!     cost_price_cents: 600,
//!     tax_rate_bps: 1000, // 10%
//!     stock_quantity: 5,
//!     reorder_level: 1,
//!     is_active: true,
//!     created_at: now,
//!     updated_at: now,
//! };
//! let catalog = HashMap::from([(product.id.clone(), product)]);
//!
//! let cart = price_items(&[CartLine::new("P1", 2)], &catalog).unwrap();
//! assert_eq!(cart.sub_total.cents(), 2000);
//! assert_eq!(cart.tax_total.cents(), 200);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocation;
pub mod error;
pub mod loyalty;
pub mod money;
pub mod pricing;
pub mod promotion;
pub mod receipt;
pub mod shift;
pub mod tender;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use allocation::{BatchDeduction, ProductAllocation};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use pricing::{CartLine, PricedCart, PricedLine};
pub use tender::{NormalizedTender, TenderSplit};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line
///
/// ## Business Reason
/// Catches typing 1000 instead of 10 at the till.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Ceiling for any single amount a request carries (tender, split,
/// manual discount): 10 billion currency units.
pub const MAX_AMOUNT_CENTS: i64 = 1_000_000_000_000;

/// Combined line + manual discount (bps of sub total) above which a manager
/// approval is required.
pub const DEFAULT_DISCOUNT_APPROVAL_THRESHOLD_BPS: i64 = 1000;

/// One loyalty point per this many cents of grand total.
pub const DEFAULT_LOYALTY_EARN_UNIT_CENTS: i64 = 1000;

/// Receipt number prefix.
pub const DEFAULT_RECEIPT_PREFIX: &str = "INV";
