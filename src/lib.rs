//! # Statement Reconciliation
//!
//! Turns the tables extracted from a supplier statement into reconciled,
//! classified line items and matches them against the tenant's ledger.
//!
//! ## Features
//!
//! - **Row mapping**: configurable column mapping with locale-aware dates and amounts
//! - **Classification**: invoice / credit note / payment from amount columns and keywords
//! - **Anomaly flagging**: balance and summary lines, missing numbers, invalid dates
//! - **Idempotent merge**: reprocessing keeps user completion state and manual corrections
//! - **Ledger matching**: one-to-one exact and substring matching of document numbers
//! - **Storage abstraction**: trait-based storage, with an in-memory backend for tests
//!
//! ## Quick Start
//!
//! ```rust
//! use statement_recon::{ColumnConfig, ExtractionRun, MemoryStorage, RawRow, StatementProcessor, TotalColumn};
//!
//! let config = ColumnConfig::new("DD/MM/YYYY")
//!     .with_date_column("Date")
//!     .with_number_column("Invoice No")
//!     .with_total_column(TotalColumn::debit("Debit"));
//! let rows = vec![RawRow::new(1)
//!     .with_cell("Date", "03/01/2024")
//!     .with_cell("Invoice No", "INV-12345")
//!     .with_cell("Debit", "1,200.00")];
//! let run = ExtractionRun::new("tenant", "contact", "statement", config, rows);
//!
//! // let mut processor = StatementProcessor::new(MemoryStorage::new());
//! // let report = processor.process(run).await?;
//! ```

pub mod config;
pub mod parsing;
pub mod reconciliation;
pub mod statement;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::*;
pub use reconciliation::*;
pub use statement::*;
pub use traits::*;
pub use types::*;
pub use utils::*;
