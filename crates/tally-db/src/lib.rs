//! # tally-db
//!
//! SQLite persistence for the sale engine, via sqlx.
//!
//! ```text
//! tally-sales (SqliteStore)
//!      │
//!      ▼
//! Database ──► repositories ──► SqlitePool ──► tally.db
//!      │
//!      └─ migrations (embedded, applied on open)
//! ```
//!
//! Every write a sale needs is one statement. Counters (stock, batch
//! remaining, loyalty points, sale and shift status) change only through
//! conditional UPDATEs that report whether they matched, so the engine
//! above can detect a lost race and compensate.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/tally.db")).await?;
//!
//! let sold = db.products().decrement_stock_if_sufficient("p-1", 2).await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::customer::CustomerRepository;
pub use repository::movement::MovementRepository;
pub use repository::product::ProductRepository;
pub use repository::promotion::PromotionRepository;
pub use repository::returns::ReturnRepository;
pub use repository::sale::SaleRepository;
pub use repository::sequence::SequenceRepository;
pub use repository::shift::ShiftRepository;
