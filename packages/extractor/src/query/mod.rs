//! Path-queries: XPath 1.0 through `sxd-xpath`.
//!
//! A matched element is copied into a small query document ([`materialize`])
//! and becomes the context node. `/` addresses the root of that document,
//! whose only element child is the matched element.
//!
//! Expressions are checked before they reach the XPath parser: every prefix
//! must be registered on the run and nesting is capped at
//! [`MAX_NESTING`]. Anything the engine rejects later, such as an unknown
//! function or a variable reference, is reported as `InvalidExpression` too.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use record_extractor::query::{materialize, Query, Scope};
//! use record_extractor::types::Value;
//!
//! let source = roxmltree::Document::parse(r#"<book id="7"><title>Dune</title></book>"#).unwrap();
//! let package = materialize(source.root_element());
//! let document = package.as_document();
//! let namespaces = BTreeMap::new();
//! let scope = Scope::new(&document, &namespaces);
//!
//! let query = Query::compile("string(title)", &namespaces).unwrap();
//! assert_eq!(query.evaluate(&scope).unwrap(), Value::String("Dune".into()));
//! ```

mod document;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use sxd_document::dom::{ChildOfRoot, Document};
use sxd_xpath::nodeset::Node as XPathNode;
use sxd_xpath::{Context, Factory, Value as XPathValue, XPath};

use crate::error::{ExtractorError, Result};
use crate::types::{NodeKind, NodeValue, Value};

pub use document::materialize;

/// Deepest nesting of parentheses, predicates and unary minus accepted.
pub const MAX_NESTING: usize = 64;

/// String literals, blanked out before prefixes are looked for.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static LITERAL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"'[^']*'|"[^"]*""#).expect("valid regex"));

/// `prefix:name` or `prefix:*`; axis separators (`::`) do not match.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static PREFIX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^A-Za-z0-9_.\-:])([A-Za-z_][A-Za-z0-9_.\-]*):[A-Za-z_*]").expect("valid regex")
});

/// A compiled path-query.
pub struct Query {
    source: String,
    xpath: XPath,
}

impl Query {
    /// Compile an expression whose prefixes must all be in `namespaces`.
    ///
    /// # Errors
    /// Returns `InvalidExpression` on syntax errors, unregistered prefixes
    /// and nesting deeper than [`MAX_NESTING`].
    pub fn compile(source: &str, namespaces: &BTreeMap<String, String>) -> Result<Self> {
        check_nesting(source).map_err(|reason| invalid(source, reason))?;
        check_prefixes(source, namespaces).map_err(|reason| invalid(source, reason))?;

        let xpath = Factory::new()
            .build(source)
            .map_err(|e| invalid(source, e.to_string()))?
            .ok_or_else(|| invalid(source, "empty expression"))?;
        Ok(Self {
            source: source.to_string(),
            xpath,
        })
    }

    /// Expression text as compiled.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against the scope's context node.
    ///
    /// # Errors
    /// Returns `InvalidExpression` for unknown functions, wrong argument
    /// counts, variable references and type errors.
    pub fn evaluate(&self, scope: &Scope<'_>) -> Result<Value> {
        let value = self
            .xpath
            .evaluate(&scope.context, scope.node)
            .map_err(|e| invalid(&self.source, e.to_string()))?;
        Ok(convert(value))
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Evaluation context for one materialized element.
pub struct Scope<'d> {
    context: Context<'d>,
    node: XPathNode<'d>,
}

impl<'d> Scope<'d> {
    /// Context node is the document's element, with `namespaces` registered.
    #[must_use]
    pub fn new(document: &Document<'d>, namespaces: &BTreeMap<String, String>) -> Self {
        let mut context = Context::new();
        for (prefix, uri) in namespaces {
            context.set_namespace(prefix, uri);
        }

        let root = document.root();
        let node = root
            .children()
            .into_iter()
            .find_map(|child| match child {
                ChildOfRoot::Element(element) => Some(XPathNode::Element(element)),
                _ => None,
            })
            .unwrap_or(XPathNode::Root(root));

        Self { context, node }
    }
}

fn invalid(expression: &str, reason: impl Into<String>) -> ExtractorError {
    ExtractorError::InvalidExpression {
        expression: expression.to_string(),
        reason: reason.into(),
    }
}

/// Reject expressions nested past [`MAX_NESTING`] before the recursive parser sees them.
fn check_nesting(source: &str) -> std::result::Result<(), String> {
    let mut depth = 0usize;
    let mut negations = 0usize;
    let mut quote = None;

    for c in source.chars() {
        if let Some(open) = quote {
            if c == open {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            '-' => negations += 1,
            c if c.is_whitespace() => {}
            _ => negations = 0,
        }
        if depth + negations > MAX_NESTING {
            return Err(format!("nesting deeper than {MAX_NESTING} levels"));
        }
    }
    Ok(())
}

fn check_prefixes(source: &str, namespaces: &BTreeMap<String, String>) -> std::result::Result<(), String> {
    let stripped = LITERAL_PATTERN.replace_all(source, "''");
    for captures in PREFIX_PATTERN.captures_iter(&stripped) {
        let prefix = &captures[1];
        if !namespaces.contains_key(prefix) {
            return Err(format!("namespace prefix '{prefix}' is not registered"));
        }
    }
    Ok(())
}

fn convert(value: XPathValue<'_>) -> Value {
    match value {
        XPathValue::Boolean(b) => Value::Boolean(b),
        XPathValue::Number(n) => Value::Number(n),
        XPathValue::String(s) => Value::String(s),
        XPathValue::Nodeset(nodes) => Value::Nodes(nodes.document_order().iter().map(snapshot).collect()),
    }
}

fn snapshot(node: &XPathNode<'_>) -> NodeValue {
    let kind = match node {
        XPathNode::Root(_) => NodeKind::Root,
        XPathNode::Element(_) => NodeKind::Element,
        XPathNode::Attribute(_) => NodeKind::Attribute,
        XPathNode::Text(_) => NodeKind::Text,
        XPathNode::Comment(_) => NodeKind::Comment,
        XPathNode::Namespace(_) => NodeKind::Namespace,
        XPathNode::ProcessingInstruction(_) => NodeKind::ProcessingInstruction,
    };
    NodeValue::new(kind, node.prefixed_name(), node.string_value())
}
