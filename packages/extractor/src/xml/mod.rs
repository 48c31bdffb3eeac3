//! XML event streaming, subtree materialization and diagnostics.

mod diagnostics;
mod reader;
mod subtree;
mod utils;

pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use reader::StreamReader;
pub use subtree::Subtree;
pub use utils::{escape_attribute, line_at};
