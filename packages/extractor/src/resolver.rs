//! Property resolution for matched elements.
//!
//! Each mapped expression is either a back-reference (`#key`) into the
//! element store or a path-query evaluated against the element's subtree.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

use roxmltree::Node;

use crate::config::BACK_REFERENCE_MARKER;
use crate::error::{ExtractorError, Result};
use crate::query::{materialize, Query, Scope};
use crate::store::ElementStore;
use crate::types::{Properties, Value};

/// Resolves mapper properties, compiling each distinct query once per run.
#[derive(Debug)]
pub struct PropertyResolver<'n> {
    namespaces: &'n BTreeMap<String, String>,
    cache: HashMap<String, Query>,
}

impl<'n> PropertyResolver<'n> {
    /// Create a resolver whose queries see `namespaces`.
    #[must_use]
    pub fn new(namespaces: &'n BTreeMap<String, String>) -> Self {
        Self {
            namespaces,
            cache: HashMap::new(),
        }
    }

    /// Resolve every property in declaration order.
    ///
    /// # Errors
    /// Returns `UnknownElement` for a back-reference to a key that was never
    /// stored and `InvalidExpression` for a query that fails to compile or
    /// evaluate. The first failure aborts resolution.
    pub fn resolve<'p>(
        &mut self,
        properties: impl IntoIterator<Item = (&'p str, &'p str)>,
        element: Node<'_, '_>,
        store: &ElementStore,
    ) -> Result<Properties<Value>> {
        let package = materialize(element);
        let document = package.as_document();
        let scope = Scope::new(&document, self.namespaces);

        let mut resolved = Properties::new();
        for (key, expression) in properties {
            let value = self.resolve_one(expression, &scope, store)?;
            resolved.insert(key, value);
        }
        Ok(resolved)
    }

    fn resolve_one(&mut self, expression: &str, scope: &Scope<'_>, store: &ElementStore) -> Result<Value> {
        let expression = expression.trim();

        if let Some(key) = expression.strip_prefix(BACK_REFERENCE_MARKER) {
            return store
                .get(key)
                .map(|stored| Value::String(stored.to_string()))
                .ok_or_else(|| ExtractorError::UnknownElement(key.to_string()));
        }

        self.query(expression)?.evaluate(scope)
    }

    fn query(&mut self, expression: &str) -> Result<&Query> {
        match self.cache.entry(expression.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let query = Query::compile(expression, self.namespaces)?;
                tracing::trace!(expression, "Compiled path-query");
                Ok(entry.insert(query))
            }
        }
    }

    /// Number of distinct queries compiled so far.
    #[must_use]
    pub fn compiled(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use roxmltree::Document;

    const BOOK: &str = r#"<book id="7"><title>Dune</title></book>"#;

    #[test]
    fn test_resolves_in_declaration_order() {
        let doc = Document::parse(BOOK).unwrap();
        let namespaces = BTreeMap::new();
        let mut resolver = PropertyResolver::new(&namespaces);
        let store = ElementStore::new();

        let properties = resolver
            .resolve(
                [("title", "string(title)"), ("id", " string(@id) ")],
                doc.root_element(),
                &store,
            )
            .unwrap();

        let keys: Vec<&str> = properties.keys().collect();
        assert_eq!(keys, vec!["title", "id"]);
        assert_eq!(properties.get("id"), Some(&Value::String("7".into())));
    }

    #[test]
    fn test_back_reference_returns_stored_value() {
        let doc = Document::parse(BOOK).unwrap();
        let namespaces = BTreeMap::new();
        let mut resolver = PropertyResolver::new(&namespaces);
        let mut store = ElementStore::new();
        store.insert("catalog/shelf", "shelf-42");

        let properties = resolver
            .resolve([("shelf", "#catalog/shelf")], doc.root_element(), &store)
            .unwrap();
        assert_eq!(
            properties.get("shelf"),
            Some(&Value::String("shelf-42".into()))
        );
    }

    #[test]
    fn test_unknown_back_reference() {
        let doc = Document::parse(BOOK).unwrap();
        let namespaces = BTreeMap::new();
        let mut resolver = PropertyResolver::new(&namespaces);

        let err = resolver
            .resolve([("shelf", "#missing")], doc.root_element(), &ElementStore::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown element: \"missing\"");
    }

    #[test]
    fn test_empty_node_set_is_accepted() {
        let doc = Document::parse(BOOK).unwrap();
        let namespaces = BTreeMap::new();
        let mut resolver = PropertyResolver::new(&namespaces);

        let properties = resolver
            .resolve([("author", "author")], doc.root_element(), &ElementStore::new())
            .unwrap();
        assert_eq!(properties.get("author"), Some(&Value::Nodes(vec![])));
    }

    #[test]
    fn test_invalid_expression_aborts() {
        let doc = Document::parse(BOOK).unwrap();
        let namespaces = BTreeMap::new();
        let mut resolver = PropertyResolver::new(&namespaces);

        let err = resolver
            .resolve(
                [("title", "title"), ("bad", "title[")],
                doc.root_element(),
                &ElementStore::new(),
            )
            .unwrap_err();
        assert!(matches!(err, ExtractorError::InvalidExpression { .. }));
    }

    #[test]
    fn test_registered_namespaces_are_visible() {
        let doc = Document::parse(r#"<book xmlns:dc="urn:dc"><dc:title>Dune</dc:title></book>"#).unwrap();
        let namespaces = BTreeMap::from([("d".to_string(), "urn:dc".to_string())]);
        let mut resolver = PropertyResolver::new(&namespaces);

        let properties = resolver
            .resolve([("title", "string(d:title)")], doc.root_element(), &ElementStore::new())
            .unwrap();
        assert_eq!(properties.get("title"), Some(&Value::String("Dune".into())));
    }

    #[test]
    fn test_deeply_nested_expression_is_invalid() {
        let doc = Document::parse(BOOK).unwrap();
        let namespaces = BTreeMap::new();
        let mut resolver = PropertyResolver::new(&namespaces);
        let nested = "(".repeat(3000);

        let err = resolver
            .resolve([("deep", nested.as_str())], doc.root_element(), &ElementStore::new())
            .unwrap_err();
        assert!(matches!(err, ExtractorError::InvalidExpression { .. }));
    }

    #[test]
    fn test_queries_are_compiled_once() {
        let doc = Document::parse(BOOK).unwrap();
        let namespaces = BTreeMap::new();
        let mut resolver = PropertyResolver::new(&namespaces);
        let store = ElementStore::new();

        for _ in 0..3 {
            resolver
                .resolve([("title", "title")], doc.root_element(), &store)
                .unwrap();
        }
        assert_eq!(resolver.compiled(), 1);
    }
}
