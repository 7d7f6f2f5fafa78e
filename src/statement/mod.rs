//! Statement extraction: rows in, classified and flagged line items out

pub mod anomaly;
pub mod classifier;
pub mod core;
pub mod grid;
pub mod mapper;

pub use anomaly::*;
pub use classifier::*;
pub use self::core::*;
pub use grid::*;
pub use mapper::*;
