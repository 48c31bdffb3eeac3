//! Mapper specifications, callbacks and the mapper validator.
//!
//! A mapper names the properties to extract (property name -> source
//! expression) and the callback that receives each extracted record. The
//! validator is shared by the XML and CSV extractors.

use std::fmt;

use serde_yaml_ng::Value as YamlValue;
use thiserror::Error;

use crate::error::{ExtractorError, Result};

/// Value returned by a callback: an optional reference key.
pub type CallbackResult = std::result::Result<Option<String>, CallbackError>;

/// Failure raised inside a user callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CallbackError {
    /// Human-readable message.
    pub message: String,
    /// Optional application error code.
    pub code: Option<i64>,
}

impl CallbackError {
    /// Create a callback error without a code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Attach an error code.
    #[must_use]
    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }
}

impl From<String> for CallbackError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for CallbackError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Capability invoked once per extracted record.
///
/// Implemented for every `FnMut(&R) -> CallbackResult`, so closures can be
/// used directly.
pub trait Callback<R> {
    /// Handle one record and optionally return a reference key.
    fn call(&mut self, record: &R) -> CallbackResult;
}

impl<R, F> Callback<R> for F
where
    F: FnMut(&R) -> CallbackResult,
{
    fn call(&mut self, record: &R) -> CallbackResult {
        self(record)
    }
}

/// Callback used when a mapper does not supply one: dumps the record.
fn debug_callback<R: fmt::Debug>(record: &R) -> CallbackResult {
    tracing::debug!(record = ?record, "Extracted record");
    Ok(None)
}

/// Property declarations as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertySpec {
    /// Named properties in declaration order.
    Map(Vec<(String, String)>),
    /// Positional properties; names are the array indices.
    List(Vec<String>),
}

impl PropertySpec {
    fn is_empty(&self) -> bool {
        match self {
            Self::Map(entries) => entries.is_empty(),
            Self::List(entries) => entries.is_empty(),
        }
    }

    fn into_entries(self) -> Vec<(String, String)> {
        match self {
            Self::Map(entries) => entries,
            Self::List(entries) => entries
                .into_iter()
                .enumerate()
                .map(|(i, expr)| (i.to_string(), expr))
                .collect(),
        }
    }
}

/// Unvalidated mapper.
pub struct MapperSpec<R> {
    /// Property declarations, if any.
    pub properties: Option<PropertySpec>,
    /// Callback, if any.
    pub callback: Option<Box<dyn Callback<R>>>,
}

impl<R> MapperSpec<R> {
    /// Create an empty spec.
    #[must_use]
    pub fn new() -> Self {
        Self {
            properties: None,
            callback: None,
        }
    }

    /// Create a spec from named properties.
    pub fn with_properties<K, V>(properties: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            properties: Some(PropertySpec::Map(
                properties
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            )),
            callback: None,
        }
    }

    /// Add a named property.
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, expression: impl Into<String>) -> Self {
        let entry = (name.into(), expression.into());
        match &mut self.properties {
            Some(PropertySpec::Map(entries)) => entries.push(entry),
            Some(PropertySpec::List(entries)) => {
                let mut named = std::mem::take(entries)
                    .into_iter()
                    .enumerate()
                    .map(|(i, e)| (i.to_string(), e))
                    .collect::<Vec<_>>();
                named.push(entry);
                self.properties = Some(PropertySpec::Map(named));
            }
            None => self.properties = Some(PropertySpec::Map(vec![entry])),
        }
        self
    }

    /// Set a closure callback.
    #[must_use]
    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&R) -> CallbackResult + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Set a callback object.
    #[must_use]
    pub fn handler(mut self, handler: impl Callback<R> + 'static) -> Self {
        self.callback = Some(Box::new(handler));
        self
    }

    /// Build a spec from an untyped YAML mapping `{ properties, callback }`.
    ///
    /// `callbacks` resolves callback names to implementations. Property
    /// values may be strings or integers (column indices); anything else is
    /// rejected.
    ///
    /// # Errors
    /// Returns `InvalidMapper` if the mapping has the wrong shape or names an
    /// unknown callback.
    pub fn from_yaml(
        value: &YamlValue,
        callbacks: &dyn Fn(&str) -> Option<Box<dyn Callback<R>>>,
    ) -> Result<Self> {
        let mapping = value
            .as_mapping()
            .ok_or_else(|| ExtractorError::invalid_mapper("Mapper must be a mapping"))?;

        let properties = match mapping.get("properties") {
            None | Some(YamlValue::Null) => None,
            Some(YamlValue::Mapping(entries)) => {
                let mut named = Vec::with_capacity(entries.len());
                for (key, expr) in entries {
                    named.push((yaml_scalar(key)?, yaml_scalar(expr)?));
                }
                Some(PropertySpec::Map(named))
            }
            Some(YamlValue::Sequence(entries)) => Some(PropertySpec::List(
                entries.iter().map(yaml_scalar).collect::<Result<_>>()?,
            )),
            Some(_) => {
                return Err(ExtractorError::invalid_mapper(
                    "Mapper properties must be a mapping or array",
                ))
            }
        };

        let callback = match mapping.get("callback") {
            None | Some(YamlValue::Null) => None,
            Some(YamlValue::String(name)) => Some(callbacks(name).ok_or_else(|| {
                ExtractorError::invalid_mapper(format!("Callback '{name}' is not invocable"))
            })?),
            Some(_) => {
                return Err(ExtractorError::invalid_mapper(
                    "Callbacks must name an invocable callback",
                ))
            }
        };

        Ok(Self {
            properties,
            callback,
        })
    }
}

impl<R> fmt::Debug for MapperSpec<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapperSpec")
            .field("properties", &self.properties)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

impl<R> Default for MapperSpec<R> {
    fn default() -> Self {
        Self::new()
    }
}

fn yaml_scalar(value: &YamlValue) -> Result<String> {
    match value {
        YamlValue::String(s) => Ok(s.clone()),
        YamlValue::Number(n) => Ok(n.to_string()),
        YamlValue::Bool(b) => Ok(b.to_string()),
        _ => Err(ExtractorError::invalid_mapper(
            "Mapper property names and expressions must be scalars",
        )),
    }
}

/// Validated mapper.
pub struct Mapper<R> {
    properties: Vec<(String, String)>,
    callback: Box<dyn Callback<R>>,
}

impl<R> Mapper<R> {
    /// Property declarations in declaration order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Invoke the callback.
    pub fn call(&mut self, record: &R) -> CallbackResult {
        self.callback.call(record)
    }
}

impl<R> fmt::Debug for Mapper<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

/// Validate a mapper spec.
///
/// Substitutes a record-dumping callback when none is supplied; that
/// callback never returns a value, so it never stores or skips.
///
/// # Errors
/// Returns `InvalidMapper` if the properties are missing or empty.
///
/// # Examples
/// ```
/// use record_extractor::mapper::{validate, MapperSpec};
/// use record_extractor::types::ElementRecord;
///
/// let spec = MapperSpec::<ElementRecord>::new().property("title", "string(title)");
/// assert!(validate(spec).is_ok());
/// assert!(validate(MapperSpec::<ElementRecord>::new()).is_err());
/// ```
pub fn validate<R: fmt::Debug + 'static>(spec: MapperSpec<R>) -> Result<Mapper<R>> {
    let properties = match spec.properties {
        Some(properties) if !properties.is_empty() => properties.into_entries(),
        _ => {
            return Err(ExtractorError::invalid_mapper(
                "Mapper properties empty/not set",
            ))
        }
    };

    let callback: Box<dyn Callback<R>> = match spec.callback {
        Some(callback) => callback,
        None => Box::new(debug_callback::<R>),
    };

    Ok(Mapper {
        properties,
        callback,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RowRecord;
    use pretty_assertions::assert_eq;

    fn no_callbacks(_: &str) -> Option<Box<dyn Callback<RowRecord>>> {
        None
    }

    fn row() -> RowRecord {
        RowRecord {
            line: 0,
            properties: crate::types::Properties::new(),
            data: None,
        }
    }

    #[test]
    fn test_validate_keeps_properties() {
        let spec = MapperSpec::<RowRecord>::with_properties([("x", "0"), ("z", "2")]);
        let mapper = validate(spec).unwrap();
        assert_eq!(
            mapper.properties().collect::<Vec<_>>(),
            vec![("x", "0"), ("z", "2")]
        );
    }

    #[test]
    fn test_validate_rejects_missing_properties() {
        let err = validate(MapperSpec::<RowRecord>::new()).unwrap_err();
        assert!(matches!(err, ExtractorError::InvalidMapper { .. }));
    }

    #[test]
    fn test_validate_rejects_empty_properties() {
        let spec = MapperSpec::<RowRecord> {
            properties: Some(PropertySpec::List(Vec::new())),
            callback: None,
        };
        assert!(validate(spec).is_err());
    }

    #[test]
    fn test_default_callback_returns_nothing() {
        let mut mapper = validate(MapperSpec::<RowRecord>::new().property("a", "0")).unwrap();
        assert_eq!(mapper.call(&row()), Ok(None));
    }

    #[test]
    fn test_closure_callback() {
        let spec = MapperSpec::<RowRecord>::new()
            .property("a", "0")
            .callback(|r: &RowRecord| Ok(Some(format!("line-{}", r.line))));
        let mut mapper = validate(spec).unwrap();
        assert_eq!(mapper.call(&row()), Ok(Some("line-0".to_string())));
    }

    #[test]
    fn test_list_properties_named_by_index() {
        let spec = MapperSpec::<RowRecord> {
            properties: Some(PropertySpec::List(vec!["3".to_string(), "1".to_string()])),
            callback: None,
        };
        let mapper = validate(spec).unwrap();
        assert_eq!(
            mapper.properties().collect::<Vec<_>>(),
            vec![("0", "3"), ("1", "1")]
        );
    }

    #[test]
    fn test_from_yaml_mapping() {
        let yaml: YamlValue = serde_yaml_ng::from_str("properties:\n  x: 0\n  z: 2\n").unwrap();
        let spec = MapperSpec::<RowRecord>::from_yaml(&yaml, &no_callbacks).unwrap();
        assert_eq!(
            spec.properties,
            Some(PropertySpec::Map(vec![
                ("x".to_string(), "0".to_string()),
                ("z".to_string(), "2".to_string()),
            ]))
        );
        assert!(spec.callback.is_none());
    }

    #[test]
    fn test_from_yaml_rejects_scalar_properties() {
        let yaml: YamlValue = serde_yaml_ng::from_str("properties: 5\n").unwrap();
        let err = MapperSpec::<RowRecord>::from_yaml(&yaml, &no_callbacks)
            .err()
            .unwrap();
        assert!(err.to_string().contains("mapping or array"));
    }

    #[test]
    fn test_from_yaml_rejects_unknown_callback() {
        let yaml: YamlValue =
            serde_yaml_ng::from_str("properties: [0]\ncallback: nope\n").unwrap();
        let err = MapperSpec::<RowRecord>::from_yaml(&yaml, &no_callbacks)
            .err()
            .unwrap();
        assert!(err.to_string().contains("not invocable"));
    }

    #[test]
    fn test_from_yaml_rejects_non_string_callback() {
        let yaml: YamlValue =
            serde_yaml_ng::from_str("properties: [0]\ncallback: [1]\n").unwrap();
        assert!(MapperSpec::<RowRecord>::from_yaml(&yaml, &no_callbacks).is_err());
    }

    #[test]
    fn test_callback_error_code() {
        let err = CallbackError::new("bad row").with_code(7);
        assert_eq!(err.code, Some(7));
        assert_eq!(err.to_string(), "bad row");
    }
}
