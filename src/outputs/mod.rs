//! Report generation.
//!
//! # Submodules
//!
//! - [`partition`]: Splits classified headlines into the ok and depressing sections
//! - [`pdf`]: Lays the two sections out as a paginated PDF and writes it to disk

pub mod partition;
pub mod pdf;

pub use partition::partition;
