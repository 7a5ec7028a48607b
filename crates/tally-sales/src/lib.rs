//! # tally-sales: Sale-Transaction Engine for Tally POS
//!
//! Turns a cart, a cashier and a tender into a committed sale, keeping
//! inventory, payments, loyalty balances and receipt numbering consistent
//! without a multi-table transaction.
//!
//! ## How Consistency Is Kept
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  1. Decide everything first (tally-core, no writes)                     │
//! │     shift ─► pricing ─► promotion ─► discount gate ─► tender ─► FIFO    │
//! │                                                                         │
//! │  2. Write in a fixed order, each write guarded by CAS                   │
//! │     receipt no. ─► header ─► items/payments ─► stock ─► batches         │
//! │                                                                         │
//! │  3. Log an undo step after every write                                  │
//! │     on failure: unwind LIFO, void the header, keep going past           │
//! │     undo errors and report them with the cause                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`orchestrator`] - The sale saga and engine entry point
//! - [`returns`] - Full refunds and partial returns
//! - [`shift_guard`] - Open-shift lookup and shift close
//! - [`stock`] - Applies FIFO plans and restores stock
//! - [`loyalty`] - Post-commit loyalty adjustment
//! - [`receipt`] - Receipt number issue
//! - [`compensation`] - Undo steps and the LIFO log
//! - [`cas`] - Shared compare-and-swap retry loop
//! - [`store`] - Persistence traits the engine depends on
//! - [`memory`] - In-memory store with fault injection
//! - [`sqlite`] - Store backed by `tally-db`
//! - [`audit`] - Audit events and sinks
//! - [`config`] - Environment configuration
//! - [`request`] - Request and outcome types
//! - [`error`] - Engine error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tally_core::{CartLine, PaymentMethod};
//! use tally_sales::{SaleOrchestrator, SaleRequest, SalesConfig, SqliteStore};
//!
//! let store = SqliteStore::new(tally_db::Database::new(db_config).await?);
//! let engine = SaleOrchestrator::new(Arc::new(store), SalesConfig::from_env()?);
//!
//! let request = SaleRequest::new("cashier-1", vec![CartLine::new("P1", 2)], PaymentMethod::Cash, 2200);
//! let outcome = engine.process_sale(request).await?;
//! assert_eq!(outcome.sale.receipt_number, "INV-2026-000001");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod audit;
pub mod cas;
pub mod compensation;
pub mod config;
pub mod error;
pub mod loyalty;
pub mod memory;
pub mod orchestrator;
pub mod receipt;
pub mod request;
pub mod returns;
pub mod shift_guard;
pub mod sqlite;
pub mod stock;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use audit::{AuditEvent, AuditSink, TracingAuditSink};
pub use compensation::{CompensationLog, UndoStep};
pub use config::{ConfigError, SalesConfig};
pub use error::{ErrorCode, SaleError, SaleResult, StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use orchestrator::{SaleOrchestrator, SagaState};
pub use request::{RefundOutcome, ReturnLineRequest, ReturnOutcome, SaleOutcome, SaleRequest};
pub use returns::ReturnReversal;
pub use sqlite::SqliteStore;
pub use store::{CatalogStore, Counter, CounterStore, MovementStore, PosStore, ReturnStore, SaleStore, ShiftStore};
