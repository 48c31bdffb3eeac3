//! Run orchestration for both input classes.
//!
//! - [`XmlExtractor`]: single forward pass over an element stream, one
//!   mapper per element path, with the store/skip protocol.
//! - [`CsvExtractor`]: one mapper applied to every row.

mod csv;
mod xml;

pub use self::csv::{CsvExtractor, CsvRunStats};
pub use self::xml::{RunStats, XmlExtractor};
