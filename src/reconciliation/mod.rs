//! Reconciliation of extracted statements with persisted state and the ledger
//!
//! - [`merge`]: idempotent merge of a fresh extraction into persisted items
//! - [`matching`]: one-to-one matching of lines to ledger documents
//! - [`reference_check`]: best-effort comparison with the source text

pub mod matching;
pub mod merge;
pub mod reference_check;

pub use matching::*;
pub use merge::*;
pub use reference_check::*;
