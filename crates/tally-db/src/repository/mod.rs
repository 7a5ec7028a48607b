//! # Repository Module
//!
//! Database repository implementations for Tally POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  tally-sales SqliteStore                                               │
//! │       │                                                                 │
//! │       │  db.products().compare_and_set_batch("b1", 5, 0)               │
//! │       ▼                                                                 │
//! │  ProductRepository                                                     │
//! │  ├── batches_for(&self, product_id)                                    │
//! │  ├── decrement_stock_if_sufficient(&self, id, qty)                     │
//! │  └── compare_and_set_batch(&self, id, expected, new)                   │
//! │       │                                                                 │
//! │       │  One conditional UPDATE per call                               │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Every shared counter is written only through a compare-and-set or a   │
//! │  guarded decrement; callers never write back a value they read.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Products, batches, stock counters
//! - [`CustomerRepository`](customer::CustomerRepository) - Customers, loyalty balance
//! - [`PromotionRepository`](promotion::PromotionRepository) - Promo codes
//! - [`ShiftRepository`](shift::ShiftRepository) - Shift sessions
//! - [`SaleRepository`](sale::SaleRepository) - Sales, items, payments
//! - [`MovementRepository`](movement::MovementRepository) - Stock audit trail
//! - [`ReturnRepository`](returns::ReturnRepository) - Return requests
//! - [`SequenceRepository`](sequence::SequenceRepository) - Receipt counters

pub mod customer;
pub mod movement;
pub mod product;
pub mod promotion;
pub mod returns;
pub mod sale;
pub mod sequence;
pub mod shift;

#[cfg(test)]
pub(crate) mod fixtures;
