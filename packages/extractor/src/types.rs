//! Core data types shared by both extractors.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::error::{ExtractorError, Result};

/// Kind of a node selected by a path-query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Root,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
    Namespace,
}

/// Owned snapshot of a node selected by a path-query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeValue {
    /// Node kind.
    pub kind: NodeKind,

    /// Qualified name for elements and attributes, target for processing
    /// instructions, prefix for namespaces.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// String-value of the node.
    pub value: String,
}

impl NodeValue {
    /// Create a node snapshot.
    #[must_use]
    pub fn new(kind: NodeKind, name: Option<String>, value: impl Into<String>) -> Self {
        Self {
            kind,
            name,
            value: value.into(),
        }
    }
}

/// Resolved value of a mapped property.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Node-set result, in document order.
    Nodes(Vec<NodeValue>),
    /// String result, or a back-referenced stored value.
    String(String),
    /// Numeric result.
    Number(f64),
    /// Boolean result.
    Boolean(bool),
}

impl Value {
    /// Convert to text using XPath `string()` rules.
    ///
    /// # Examples
    /// ```
    /// use record_extractor::types::{NodeKind, NodeValue, Value};
    ///
    /// let nodes = Value::Nodes(vec![
    ///     NodeValue::new(NodeKind::Text, None, "first"),
    ///     NodeValue::new(NodeKind::Text, None, "second"),
    /// ]);
    /// assert_eq!(nodes.to_text(), "first");
    /// assert_eq!(Value::Number(3.0).to_text(), "3");
    /// assert_eq!(Value::Boolean(true).to_text(), "true");
    /// ```
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Nodes(nodes) => nodes.first().map(|n| n.value.clone()).unwrap_or_default(),
            Self::String(s) => s.clone(),
            Self::Number(n) => format_number(*n),
            Self::Boolean(b) => b.to_string(),
        }
    }

    /// Node-set contents, if this is a node-set.
    #[must_use]
    pub fn as_nodes(&self) -> Option<&[NodeValue]> {
        match self {
            Self::Nodes(nodes) => Some(nodes),
            _ => None,
        }
    }
}

/// Format a number the way XPath converts numbers to strings.
#[must_use]
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let label = if n > 0.0 { "Infinity" } else { "-Infinity" };
        label.to_string()
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Ordered property list, preserving mapper declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Properties<V> {
    entries: Vec<(String, V)>,
}

impl<V> Properties<V> {
    /// Create an empty property list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a property.
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        self.entries.push((key.into(), value));
    }

    /// Look up a property by name.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Whether a property is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no properties are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate properties in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Property names in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl<V> Default for Properties<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for Properties<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl<V: Serialize> Serialize for Properties<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Callback argument for a matched element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementRecord {
    /// Path of the matched element.
    pub element: String,

    /// Resolved properties.
    pub properties: Properties<Value>,

    /// Caller-supplied passthrough data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Callback argument for a tabular row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowRecord {
    /// 0-based row index.
    pub line: usize,

    /// Mapped column values.
    pub properties: Properties<String>,

    /// Caller-supplied passthrough data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Input handed to an extractor run.
pub enum Input {
    /// Raw markup or delimited text.
    Text(String),
    /// File on disk.
    Path(PathBuf),
    /// Any open readable stream.
    Reader(Box<dyn Read>),
}

impl Input {
    /// Wrap an open reader.
    pub fn reader(reader: impl Read + 'static) -> Self {
        Self::Reader(Box::new(reader))
    }

    /// Short description used in log and error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Text(text) => format!("<string of {} bytes>", text.len()),
            Self::Path(path) => path.display().to_string(),
            Self::Reader(_) => "<stream>".to_string(),
        }
    }

    /// Read the whole input into memory.
    ///
    /// # Errors
    /// Returns `InputOpenFailed` if the input cannot be read, is not valid
    /// UTF-8, or is empty.
    pub fn read_to_string(self) -> Result<String> {
        let description = self.describe();
        let text = match self {
            Self::Text(text) => text,
            Self::Path(path) => std::fs::read_to_string(&path).map_err(|e| {
                ExtractorError::InputOpenFailed(format!(
                    "Could not open \"{}\" for parsing: {e}",
                    path.display()
                ))
            })?,
            Self::Reader(mut reader) => {
                let mut text = String::new();
                reader.read_to_string(&mut text).map_err(|e| {
                    ExtractorError::InputOpenFailed(format!("Could not read {description}: {e}"))
                })?;
                text
            }
        };

        if text.trim().is_empty() {
            return Err(ExtractorError::InputOpenFailed(format!(
                "{description} is empty"
            )));
        }
        Ok(text)
    }

    /// Turn the input into a byte stream.
    ///
    /// # Errors
    /// Returns `InputOpenFailed` if a file cannot be opened.
    pub fn into_read(self) -> Result<Box<dyn Read>> {
        match self {
            Self::Text(text) => Ok(Box::new(std::io::Cursor::new(text.into_bytes()))),
            Self::Path(path) => {
                let file = File::open(&path).map_err(|e| {
                    ExtractorError::InputOpenFailed(format!(
                        "Could not open \"{}\" for parsing: {e}",
                        path.display()
                    ))
                })?;
                Ok(Box::new(BufReader::new(file)))
            }
            Self::Reader(reader) => Ok(reader),
        }
    }
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Input").field(&self.describe()).finish()
    }
}

impl From<&str> for Input {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Input {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<PathBuf> for Input {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for Input {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(-2.0), "-2");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_properties_keep_order() {
        let mut props = Properties::new();
        props.insert("z", 1);
        props.insert("a", 2);
        assert_eq!(props.keys().collect::<Vec<_>>(), vec!["z", "a"]);
        assert_eq!(props.get("a"), Some(&2));
        assert!(!props.contains("b"));
    }

    #[test]
    fn test_element_record_serializes_as_map() {
        let record = ElementRecord {
            element: "a/b".to_string(),
            properties: [("title", Value::String("x".to_string()))]
                .into_iter()
                .collect(),
            data: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"element":"a/b","properties":{"title":"x"}}"#);
    }

    #[test]
    fn test_empty_text_input_rejected() {
        let err = Input::from("   ").read_to_string().unwrap_err();
        assert!(matches!(err, ExtractorError::InputOpenFailed(_)));
    }

    #[test]
    fn test_missing_file_rejected() {
        let err = Input::from(Path::new("/definitely/not/here.xml"))
            .read_to_string()
            .unwrap_err();
        assert!(matches!(err, ExtractorError::InputOpenFailed(_)));
    }

    #[test]
    fn test_reader_input() {
        let input = Input::reader(std::io::Cursor::new(b"<a/>".to_vec()));
        assert_eq!(input.read_to_string().unwrap(), "<a/>");
    }
}
