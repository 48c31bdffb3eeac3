//! Materialized element subtree for path-query evaluation.

use roxmltree::{Document, ParsingOptions};

use crate::config::ParserOptions;
use crate::error::{ExtractorError, Result};

/// Self-contained markup of one element and its descendants.
///
/// The markup is the element's original text with the namespace
/// declarations it inherits from its ancestors added to its start tag. When
/// DTDs are allowed, the document's type declaration travels along so
/// internal entities still resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subtree {
    /// Type declaration, if any, followed by the element markup.
    text: String,
    /// Offset of the element's start tag in `text`.
    element_start: usize,
    path: String,
    line: usize,
    options: ParserOptions,
}

impl Subtree {
    /// Wrap element markup that starts at `line` of the input.
    pub fn new(
        xml: impl Into<String>,
        path: impl Into<String>,
        line: usize,
        options: ParserOptions,
    ) -> Self {
        Self {
            text: xml.into(),
            element_start: 0,
            path: path.into(),
            line,
            options,
        }
    }

    /// Attach a document type declaration naming this element.
    #[must_use]
    pub fn with_doctype(mut self, declaration: &str) -> Self {
        let xml = &self.text[self.element_start..];
        self.text = format!("{declaration}{xml}");
        self.element_start = declaration.len();
        self
    }

    /// Document type declaration parsed ahead of the element, if any.
    #[must_use]
    pub fn doctype(&self) -> Option<&str> {
        Some(&self.text[..self.element_start]).filter(|d| !d.is_empty())
    }

    /// Element markup.
    #[must_use]
    pub fn xml(&self) -> &str {
        &self.text[self.element_start..]
    }

    /// Path of the element in the input.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 1-based input line of the element's start tag.
    #[must_use]
    pub fn line(&self) -> usize {
        self.line
    }

    /// Parse into a navigable document whose root element is the subtree's element.
    ///
    /// # Errors
    /// Returns `MalformedInput` with the input line of the failure.
    pub fn parse(&self) -> Result<Document<'_>> {
        let mut options = ParsingOptions::default();
        options.allow_dtd = self.options.allow_dtd;
        options.nodes_limit = self.options.nodes_limit();

        let prologue_rows = self.doctype().map_or(0, |d| d.matches('\n').count());

        Document::parse_with_options(&self.text, options).map_err(|e| {
            let row = (e.pos().row as usize).saturating_sub(1 + prologue_rows);
            ExtractorError::MalformedInput {
                path: self.path.clone(),
                line: Some(self.line + row),
                message: e.to_string(),
            }
        })
    }
}
