//! Forward-only traversal over a stream of markup events.
//!
//! The walker keeps a depth-indexed stack of node names, derives the
//! current path from it after every event and suppresses matching while a
//! skip target is pending.

use crate::config::PATH_SEPARATOR;
use crate::error::Result;
use crate::xml::Subtree;

/// Kind of a raw traversal event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Element start; `empty` is set for self-closing elements.
    Element { empty: bool },
    /// Element end.
    EndElement,
    /// Character data, whitespace included.
    Text,
    /// CDATA section.
    CData,
    /// Comment.
    Comment,
    /// Processing instruction.
    ProcessingInstruction,
    /// Document type declaration.
    DocType,
}

/// One event pulled from an event source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Event kind.
    pub kind: EventKind,
    /// Nesting depth; the root element is at depth 0.
    pub depth: usize,
    /// Node name (`#text`, `#comment`, ... for non-element nodes).
    pub name: String,
}

impl RawEvent {
    /// Create an event.
    pub fn new(kind: EventKind, depth: usize, name: impl Into<String>) -> Self {
        Self {
            kind,
            depth,
            name: name.into(),
        }
    }

    /// Whether this event opens an element that has content (not self-closing).
    #[must_use]
    pub fn opens_element(&self) -> bool {
        self.kind == EventKind::Element { empty: false }
    }
}

/// Pull parser feeding the walker.
pub trait EventSource {
    /// Pull the next event, or `None` when the input is exhausted.
    fn next_event(&mut self) -> Result<Option<RawEvent>>;

    /// Materialize the element opened by the last event into a navigable subtree.
    ///
    /// `path` is the walker's current path, used for error context.
    fn expand(&mut self, path: &str) -> Result<Subtree>;
}

/// Path stack and skip state over an event source.
#[derive(Debug)]
pub struct Walker<S> {
    source: S,
    stack: Vec<String>,
    current: String,
    skip: Option<String>,
    event: Option<RawEvent>,
    events: usize,
    suppressed: usize,
}

impl<S: EventSource> Walker<S> {
    /// Create a walker with an empty stack and no skip target.
    #[must_use]
    pub fn new(source: S) -> Self {
        Self {
            source,
            stack: Vec::new(),
            current: String::new(),
            skip: None,
            event: None,
            events: 0,
            suppressed: 0,
        }
    }

    /// Move to the next event eligible for matching.
    ///
    /// Returns `false` once the source is exhausted. While a skip target is
    /// set, events are consumed without being yielded until one whose path
    /// equals the target exactly; that event clears the target and is yielded.
    ///
    /// # Errors
    /// Propagates structural errors reported by the event source.
    pub fn advance(&mut self) -> Result<bool> {
        loop {
            let Some(event) = self.source.next_event()? else {
                self.event = None;
                return Ok(false);
            };
            self.events += 1;

            self.stack.truncate(event.depth);
            self.stack.push(event.name.clone());
            self.current = self.stack.join(PATH_SEPARATOR);
            self.event = Some(event);

            if self.skip.as_deref() == Some(self.current.as_str()) {
                tracing::trace!(path = %self.current, "Reached skip target");
                self.skip = None;
            }

            if self.skip.is_none() {
                return Ok(true);
            }
            self.suppressed += 1;
        }
    }

    /// Path of the last yielded event.
    #[must_use]
    pub fn current_path(&self) -> &str {
        &self.current
    }

    /// Last yielded event.
    #[must_use]
    pub fn event(&self) -> Option<&RawEvent> {
        self.event.as_ref()
    }

    /// Node names from the root to the last yielded event.
    #[must_use]
    pub fn stack(&self) -> &[String] {
        &self.stack
    }

    /// Suppress matching until `target` is reached, replacing any pending target.
    pub fn skip_to(&mut self, target: impl Into<String>) {
        let target = target.into();
        if let Some(previous) = self.skip.as_deref() {
            tracing::debug!(previous, target = %target, "Replacing pending skip target");
        }
        self.skip = Some(target);
    }

    /// Pending skip target.
    #[must_use]
    pub fn skip_target(&self) -> Option<&str> {
        self.skip.as_deref()
    }

    /// Materialize the element opened by the last yielded event.
    ///
    /// # Errors
    /// Returns `MalformedInput` if the subtree cannot be parsed.
    pub fn expand_current(&mut self) -> Result<Subtree> {
        self.source.expand(&self.current)
    }

    /// Number of events pulled from the source.
    #[must_use]
    pub fn events(&self) -> usize {
        self.events
    }

    /// Number of events consumed while a skip target was pending.
    #[must_use]
    pub fn suppressed(&self) -> usize {
        self.suppressed
    }

    /// Borrow the event source.
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ExtractorError;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;

    /// Event source replaying a fixed list of events.
    pub(crate) struct ScriptedSource {
        events: VecDeque<RawEvent>,
    }

    impl ScriptedSource {
        pub(crate) fn new(events: Vec<RawEvent>) -> Self {
            Self {
                events: events.into(),
            }
        }
    }

    impl EventSource for ScriptedSource {
        fn next_event(&mut self) -> Result<Option<RawEvent>> {
            Ok(self.events.pop_front())
        }

        fn expand(&mut self, path: &str) -> Result<Subtree> {
            Err(ExtractorError::MalformedInput {
                path: path.to_string(),
                line: None,
                message: "scripted source has no markup".to_string(),
            })
        }
    }

    fn open(depth: usize, name: &str) -> RawEvent {
        RawEvent::new(EventKind::Element { empty: false }, depth, name)
    }

    fn close(depth: usize, name: &str) -> RawEvent {
        RawEvent::new(EventKind::EndElement, depth, name)
    }

    fn paths(walker: &mut Walker<ScriptedSource>) -> Vec<String> {
        let mut seen = Vec::new();
        while walker.advance().unwrap() {
            seen.push(walker.current_path().to_string());
        }
        seen
    }

    #[test]
    fn test_path_tracks_ancestors() {
        let mut walker = Walker::new(ScriptedSource::new(vec![
            open(0, "a"),
            open(1, "b"),
            RawEvent::new(EventKind::Text, 2, "#text"),
            close(1, "b"),
            open(1, "c"),
            close(1, "c"),
            close(0, "a"),
        ]));

        assert_eq!(
            paths(&mut walker),
            vec!["a", "a/b", "a/b/#text", "a/b", "a/c", "a/c", "a"]
        );
    }

    #[test]
    fn test_depth_drops_by_more_than_one() {
        let mut walker = Walker::new(ScriptedSource::new(vec![
            open(0, "a"),
            open(1, "b"),
            open(2, "c"),
            open(3, "d"),
            open(1, "e"),
        ]));

        assert_eq!(
            paths(&mut walker),
            vec!["a", "a/b", "a/b/c", "a/b/c/d", "a/e"]
        );
        assert_eq!(walker.stack(), ["a", "e"]);
    }

    #[test]
    fn test_stack_matches_last_event() {
        let mut walker = Walker::new(ScriptedSource::new(vec![
            open(0, "a"),
            open(1, "b"),
            open(2, "c"),
            open(1, "d"),
        ]));
        for _ in 0..4 {
            assert!(walker.advance().unwrap());
        }
        assert_eq!(walker.stack(), ["a", "d"]);
        assert_eq!(walker.current_path(), "a/d");
        assert_eq!(walker.event().map(|e| e.name.as_str()), Some("d"));
        assert!(!walker.advance().unwrap());
        assert!(walker.event().is_none());
    }

    #[test]
    fn test_skip_resumes_on_exact_path() {
        let mut walker = Walker::new(ScriptedSource::new(vec![
            open(0, "root"),
            open(1, "a"),
            open(2, "b"),
            close(2, "b"),
            close(1, "a"),
            open(1, "a2"),
            open(2, "b"),
            close(2, "b"),
            close(1, "a2"),
            open(1, "a"),
            open(2, "b"),
        ]));

        assert!(walker.advance().unwrap());
        walker.skip_to("root/a/b");
        assert!(walker.advance().unwrap());
        assert_eq!(walker.current_path(), "root/a/b");
        assert!(walker.skip_target().is_none());
        assert_eq!(walker.suppressed(), 1);

        walker.skip_to("root/a/b");
        // root/a/b end, root/a end, root/a2 ..., root/a
        assert!(walker.advance().unwrap());
        assert_eq!(walker.current_path(), "root/a/b");
        assert_eq!(walker.event().map(|e| e.kind), Some(EventKind::EndElement));
    }

    #[test]
    fn test_skip_ignores_prefix_and_sibling_paths() {
        let mut walker = Walker::new(ScriptedSource::new(vec![
            open(0, "a"),
            open(1, "x"),
            close(1, "x"),
            close(0, "a"),
            open(0, "a2"),
            open(1, "b"),
            close(1, "b"),
            close(0, "a2"),
        ]));
        walker.skip_to("a/b");
        assert!(!walker.advance().unwrap());
        assert_eq!(walker.suppressed(), 8);
        assert_eq!(walker.skip_target(), Some("a/b"));
    }

    #[test]
    fn test_new_skip_target_replaces_old() {
        let mut walker = Walker::new(ScriptedSource::new(vec![
            open(0, "a"),
            open(1, "b"),
            open(1, "c"),
        ]));
        walker.skip_to("a/b");
        walker.skip_to("a/c");
        assert!(walker.advance().unwrap());
        assert_eq!(walker.current_path(), "a/c");
        assert_eq!(walker.events(), 3);
    }

    #[test]
    fn test_opens_element() {
        assert!(open(0, "a").opens_element());
        assert!(!RawEvent::new(EventKind::Element { empty: true }, 0, "a").opens_element());
        assert!(!close(0, "a").opens_element());
    }
}
