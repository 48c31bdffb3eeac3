//! Callback invocation and the store/skip protocol.
//!
//! A callback's return value steers the rest of the traversal:
//!
//! - no value (or an empty string): nothing happens;
//! - a value equal to a stored key: matching is suppressed until that path recurs;
//! - any other value: it is stored under the current element's path.

use crate::error::{ExtractorError, Result};
use crate::mapper::Mapper;
use crate::store::ElementStore;
use crate::walker::{EventSource, Walker};

/// Which branch of the protocol a callback result took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No value returned.
    Continue,
    /// Skip until the named path is reached.
    Skip(String),
    /// Value stored under the current path.
    Store(String),
}

impl Outcome {
    /// Classify a callback result against the current store.
    #[must_use]
    pub fn interpret(result: Option<String>, store: &ElementStore) -> Self {
        match result {
            Some(value) if value.is_empty() => Self::Continue,
            Some(value) if store.contains(&value) => Self::Skip(value),
            Some(value) => Self::Store(value),
            None => Self::Continue,
        }
    }
}

/// Invoke a mapper's callback.
///
/// `context` names where the record came from (element path or `line N`)
/// and is carried by the error.
///
/// # Errors
/// Returns `CallbackFailed` with the callback's message and code.
pub fn invoke<R>(mapper: &mut Mapper<R>, record: &R, context: &str) -> Result<Option<String>> {
    mapper
        .call(record)
        .map_err(|e| ExtractorError::CallbackFailed {
            context: context.to_string(),
            message: e.message,
            code: e.code,
        })
}

/// Apply a callback result for the element at `path`.
///
/// Exactly one of store, skip or nothing happens.
pub fn settle<S: EventSource>(
    result: Option<String>,
    path: &str,
    walker: &mut Walker<S>,
    store: &mut ElementStore,
) -> Outcome {
    let outcome = Outcome::interpret(result, store);
    match &outcome {
        Outcome::Continue => {
            tracing::trace!(path, "Callback returned no value");
        }
        Outcome::Skip(target) => {
            tracing::debug!(path, target = %target, "Skipping to element");
            walker.skip_to(target.clone());
        }
        Outcome::Store(value) => {
            tracing::debug!(path, "Storing element result");
            store.insert(path, value.clone());
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::{validate, CallbackError, MapperSpec};
    use crate::types::RowRecord;
    use crate::walker::tests::ScriptedSource;
    use pretty_assertions::assert_eq;

    fn walker() -> Walker<ScriptedSource> {
        Walker::new(ScriptedSource::new(Vec::new()))
    }

    #[test]
    fn test_no_value_changes_nothing() {
        let mut walker = walker();
        let mut store = ElementStore::new();

        assert_eq!(settle(None, "a/b", &mut walker, &mut store), Outcome::Continue);
        assert_eq!(
            settle(Some(String::new()), "a/b", &mut walker, &mut store),
            Outcome::Continue
        );
        assert!(store.is_empty());
        assert!(walker.skip_target().is_none());
    }

    #[test]
    fn test_new_value_is_stored() {
        let mut walker = walker();
        let mut store = ElementStore::new();

        let outcome = settle(Some("id-1".into()), "a/b", &mut walker, &mut store);
        assert_eq!(outcome, Outcome::Store("id-1".into()));
        assert_eq!(store.get("a/b"), Some("id-1"));
        assert!(walker.skip_target().is_none());
    }

    #[test]
    fn test_zero_is_a_value() {
        let mut walker = walker();
        let mut store = ElementStore::new();

        let outcome = settle(Some("0".into()), "a/b", &mut walker, &mut store);
        assert_eq!(outcome, Outcome::Store("0".into()));
        assert_eq!(store.get("a/b"), Some("0"));
    }

    #[test]
    fn test_stored_key_means_skip_not_overwrite() {
        let mut walker = walker();
        let mut store = ElementStore::new();
        store.insert("a/b", "id-1");

        let outcome = settle(Some("a/b".into()), "a/c", &mut walker, &mut store);
        assert_eq!(outcome, Outcome::Skip("a/b".into()));
        assert_eq!(walker.skip_target(), Some("a/b"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a/c"), None);
    }

    #[test]
    fn test_callback_error_keeps_message_and_code() {
        let spec = MapperSpec::<RowRecord>::new()
            .property("x", "0")
            .callback(|_: &RowRecord| Err(CallbackError::new("row rejected").with_code(7)));
        let mut mapper = validate(spec).unwrap();
        let record = RowRecord {
            line: 3,
            properties: Default::default(),
            data: None,
        };

        let err = invoke(&mut mapper, &record, "line 3").unwrap_err();
        assert_eq!(err.to_string(), "Callback failed at line 3: row rejected");
        assert_eq!(err.code(), Some(7));
    }
}
