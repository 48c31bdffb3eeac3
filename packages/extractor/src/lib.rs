//! Record Extractor - mapper-driven record extraction from XML and CSV.
//!
//! A mapper declares which paths or columns of the input become which named
//! properties, plus a callback that receives one record per match. XML input
//! is walked once, forward only; a callback's return value can store a
//! value for later back-references (`#path`) or skip ahead to an element.
//!
//! # Example
//!
//! ```
//! use record_extractor::{CsvConfig, CsvExtractor, MapperSpec, RowRecord};
//!
//! let mapper = MapperSpec::new()
//!     .property("x", "0")
//!     .property("z", "2")
//!     .callback(|row: &RowRecord| {
//!         println!("{} {:?}", row.line, row.properties.get("x"));
//!         Ok(None)
//!     });
//!
//! let mut extractor = CsvExtractor::new(mapper).unwrap();
//! let config = CsvConfig { start_line: 1, ..CsvConfig::default() };
//! assert!(extractor.run("a,b,c\n1,2,3\n", &config, None).unwrap());
//! assert_eq!(extractor.last_run().dispatched, 1);
//! ```
//!
//! # Architecture
//!
//! - [`config`]: Run configuration and validation
//! - [`types`]: Records, resolved values and input sources
//! - [`error`]: Error types and Result alias
//! - [`mapper`]: Callbacks, mapper specs and the mapper validator
//! - [`store`]: Per-run element store for back-references
//! - [`walker`]: Path stack and skip-ahead over an event source
//! - [`xml`]: Streaming reader, subtree materialization, diagnostics
//! - [`query`]: XPath subset evaluated over materialized subtrees
//! - [`resolver`]: Property resolution
//! - [`dispatch`]: Callback invocation and the store/skip protocol
//! - [`extractor`]: XML and CSV run orchestration
//! - [`cli`]: Command-line interface

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod extractor;
pub mod mapper;
pub mod query;
pub mod resolver;
pub mod store;
pub mod types;
pub mod walker;
pub mod xml;

// Re-export commonly used items
pub use config::{CsvConfig, ParserOptions, XmlConfig};
pub use error::{ExtractorError, Result};
pub use extractor::{CsvExtractor, CsvRunStats, RunStats, XmlExtractor};
pub use mapper::{Callback, CallbackError, CallbackResult, MapperSpec};
pub use types::{ElementRecord, Input, NodeValue, Properties, RowRecord, Value};
