//! Hierarchical extraction over an XML stream.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::XmlConfig;
use crate::dispatch::{self, Outcome};
use crate::error::Result;
use crate::mapper::{validate, Mapper, MapperSpec};
use crate::resolver::PropertyResolver;
use crate::store::ElementStore;
use crate::types::{ElementRecord, Input};
use crate::walker::{RawEvent, Walker};
use crate::xml::StreamReader;

/// Counters for the last completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Events pulled from the input.
    pub events: usize,
    /// Elements that had a mapper and were dispatched.
    pub matched: usize,
    /// Callback results stored.
    pub stored: usize,
    /// Callback results that triggered a skip.
    pub skips: usize,
    /// Parser warnings reported.
    pub warnings: usize,
}

/// Extracts records from XML, one mapper per element path.
///
/// # Example
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use record_extractor::config::XmlConfig;
/// use record_extractor::extractor::XmlExtractor;
/// use record_extractor::mapper::MapperSpec;
///
/// let titles = Rc::new(RefCell::new(Vec::new()));
/// let sink = Rc::clone(&titles);
/// let mapper = MapperSpec::new()
///     .property("title", "string(title)")
///     .callback(move |record: &record_extractor::ElementRecord| {
///         let title = record.properties.get("title").map(|v| v.to_text());
///         sink.borrow_mut().extend(title);
///         Ok(None)
///     });
///
/// let mut extractor = XmlExtractor::new([("shelf/book", mapper)]).unwrap();
/// let xml = "<shelf><book><title>Dune</title></book><book><title>Emma</title></book></shelf>";
/// assert!(extractor.run(xml, &XmlConfig::default(), None).unwrap());
/// assert_eq!(*titles.borrow(), vec!["Dune", "Emma"]);
/// ```
#[derive(Debug)]
pub struct XmlExtractor {
    mappers: HashMap<String, Mapper<ElementRecord>>,
    last_run: RunStats,
}

impl XmlExtractor {
    /// Validate mappers keyed by element path.
    ///
    /// # Errors
    /// Returns `InvalidMapper` naming the first rejected target.
    pub fn new<K: Into<String>>(
        mappers: impl IntoIterator<Item = (K, MapperSpec<ElementRecord>)>,
    ) -> Result<Self> {
        let mut validated = HashMap::new();
        for (target, spec) in mappers {
            let target = target.into();
            let mapper = validate(spec).map_err(|e| e.for_target(&target))?;
            validated.insert(target, mapper);
        }
        Ok(Self {
            mappers: validated,
            last_run: RunStats::default(),
        })
    }

    /// Element paths that have a mapper.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.mappers.keys().map(String::as_str)
    }

    /// Counters for the last successful run.
    #[must_use]
    pub fn last_run(&self) -> &RunStats {
        &self.last_run
    }

    /// Walk the input once, dispatching every mapped element.
    ///
    /// `data` is cloned into every record. Returns `true` on success.
    ///
    /// # Errors
    /// Any failure aborts the run: `InvalidConfig`, `InputOpenFailed`,
    /// `MalformedInput`, `InvalidExpression`, `UnknownElement` or
    /// `CallbackFailed`.
    pub fn run(
        &mut self,
        input: impl Into<Input>,
        config: &XmlConfig,
        data: Option<serde_json::Value>,
    ) -> Result<bool> {
        config.validate()?;
        let input = input.into();
        let description = input.describe();
        let text = input.read_to_string()?;

        tracing::info!(
            input = %description,
            mappers = self.mappers.len(),
            namespaces = config.namespaces.len(),
            "Starting XML extraction"
        );

        let mut walker = Walker::new(StreamReader::new(&text, config.parser_options.clone()));
        let mut store = ElementStore::new();
        let mut resolver = PropertyResolver::new(&config.namespaces);
        let mut stats = RunStats::default();

        while walker.advance()? {
            if !walker.event().is_some_and(RawEvent::opens_element) {
                continue;
            }
            let path = walker.current_path().to_string();
            let Some(mapper) = self.mappers.get_mut(&path) else {
                continue;
            };
            stats.matched += 1;

            let subtree = walker.expand_current()?;
            let document = subtree.parse()?;
            let properties = resolver.resolve(mapper.properties(), document.root_element(), &store)?;
            tracing::trace!(path = %path, line = subtree.line(), "Resolved element");

            let record = ElementRecord {
                element: path.clone(),
                properties,
                data: data.clone(),
            };
            let result = dispatch::invoke(mapper, &record, &path)?;

            match dispatch::settle(result, &path, &mut walker, &mut store) {
                Outcome::Store(_) => stats.stored += 1,
                Outcome::Skip(_) => stats.skips += 1,
                Outcome::Continue => {}
            }
        }

        stats.events = walker.events();
        stats.warnings = walker.source().diagnostics().warnings().count();
        if let Some(target) = walker.skip_target() {
            tracing::debug!(target, "Input ended before skip target was reached");
        }
        tracing::info!(
            events = stats.events,
            matched = stats.matched,
            stored = stats.stored,
            skips = stats.skips,
            "XML extraction finished"
        );

        self.last_run = stats;
        Ok(true)
    }
}
