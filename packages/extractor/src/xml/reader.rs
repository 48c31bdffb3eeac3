//! Pull-parser event source over buffered XML input.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Reader;

use super::diagnostics::{Diagnostic, Diagnostics};
use super::subtree::Subtree;
use super::utils::{escape_attribute, line_at};
use crate::config::{validate_encoding, ParserOptions, PATH_SEPARATOR};
use crate::error::{ExtractorError, Result};
use crate::walker::{EventKind, EventSource, RawEvent};

/// Element currently open in the stream.
#[derive(Debug)]
struct OpenElement {
    name: String,
    /// Namespace declarations made on this element: (prefix, uri), "" for default.
    namespaces: Vec<(String, String)>,
}

/// Document type declaration seen before the root element.
#[derive(Debug)]
struct DocType {
    name: String,
    /// Everything after the name: external id and internal subset.
    rest: String,
}

impl DocType {
    fn parse(content: &str) -> Self {
        let content = content.trim_start();
        let end = content
            .find(|c: char| c.is_whitespace() || c == '[')
            .unwrap_or(content.len());
        let (name, rest) = content.split_at(end);
        Self {
            name: name.to_string(),
            rest: rest.to_string(),
        }
    }

    /// Declaration retargeted at another root element.
    fn declare(&self, root: &str) -> String {
        format!("<!DOCTYPE {root}{}>", self.rest)
    }
}

/// Streams XML nodes as traversal events.
///
/// Depth follows the document structure: the root element is at depth 0,
/// children of a node are one deeper, and an end tag has the depth of its
/// start tag. Whitespace outside the root element is not reported.
pub struct StreamReader<'a> {
    input: &'a str,
    reader: Reader<&'a [u8]>,
    options: ParserOptions,
    open: Vec<OpenElement>,
    /// Byte offset of the start tag of the last element opened, while it can be expanded.
    expandable: Option<usize>,
    doctype: Option<DocType>,
    diagnostics: Diagnostics,
}

impl<'a> StreamReader<'a> {
    /// Start streaming over buffered input.
    #[must_use]
    pub fn new(input: &'a str, options: ParserOptions) -> Self {
        let mut reader = Reader::from_str(input);
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = options.check_end_names;

        Self {
            input,
            reader,
            options,
            open: Vec::new(),
            expandable: None,
            doctype: None,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Findings reported so far.
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    fn path(&self) -> String {
        self.open
            .iter()
            .map(|e| e.name.as_str())
            .collect::<Vec<_>>()
            .join(PATH_SEPARATOR)
    }

    fn position(&self) -> usize {
        self.reader.buffer_position() as usize
    }

    fn fail(&mut self, offset: usize, message: String) -> ExtractorError {
        let diagnostic = Diagnostic::error(self.path(), Some(line_at(self.input, offset)), message);
        self.diagnostics.abort(diagnostic)
    }

    fn warn(&mut self, message: String) -> Result<()> {
        let line = line_at(self.input, self.position());
        let diagnostic = Diagnostic::warning(self.path(), Some(line), message);
        self.diagnostics.report(diagnostic)
    }

    /// Offset of the `<` that opens the tag ending at the current position.
    fn tag_start(&self) -> usize {
        let end = self.position().min(self.input.len());
        self.input[..end].rfind('<').unwrap_or(0)
    }

    fn namespace_declarations(&mut self, start: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
        let mut declarations = Vec::new();
        for attr in start.attributes() {
            let attr = match attr {
                Ok(attr) => attr,
                Err(e) => {
                    let offset = self.position();
                    return Err(self.fail(offset, format!("invalid attribute: {e}")));
                }
            };
            let key = attr.key.as_ref();
            let prefix = if key == b"xmlns" {
                String::new()
            } else if let Some(prefix) = key.strip_prefix(b"xmlns:") {
                String::from_utf8_lossy(prefix).into_owned()
            } else {
                continue;
            };
            match attr.unescape_value() {
                Ok(uri) => declarations.push((prefix, uri.into_owned())),
                Err(e) => {
                    let offset = self.position();
                    return Err(self.fail(offset, format!("invalid namespace declaration: {e}")));
                }
            }
        }
        Ok(declarations)
    }

    fn check_declared_encoding(&mut self, declared: Option<String>) -> Result<()> {
        if let Some(declared) = declared {
            if validate_encoding(&declared).is_err() {
                self.warn(format!(
                    "declared encoding '{declared}' ignored, input is read as UTF-8"
                ))?;
            }
        }
        Ok(())
    }

    /// Namespace declarations in scope for the open element that it does not make itself.
    fn inherited_namespaces(&self) -> Vec<(String, String)> {
        let Some((current, ancestors)) = self.open.split_last() else {
            return Vec::new();
        };
        let mut inherited: Vec<(String, String)> = Vec::new();
        for element in ancestors {
            for (prefix, uri) in &element.namespaces {
                inherited.retain(|(p, _)| p != prefix);
                inherited.push((prefix.clone(), uri.clone()));
            }
        }
        inherited.retain(|(prefix, _)| !current.namespaces.iter().any(|(p, _)| p == prefix));
        inherited
    }
}

impl EventSource for StreamReader<'_> {
    fn next_event(&mut self) -> Result<Option<RawEvent>> {
        loop {
            let before = self.position();
            let event = match self.reader.read_event() {
                Ok(event) => event,
                Err(e) => {
                    let offset = self.reader.error_position() as usize;
                    return Err(self.fail(offset.max(before), e.to_string()));
                }
            };
            let depth = self.open.len();

            let raw = match event {
                Event::Start(start) => {
                    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                    let namespaces = self.namespace_declarations(&start)?;
                    self.expandable = Some(self.tag_start());
                    self.open.push(OpenElement {
                        name: name.clone(),
                        namespaces,
                    });
                    RawEvent::new(EventKind::Element { empty: false }, depth, name)
                }
                Event::Empty(start) => {
                    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                    self.namespace_declarations(&start)?;
                    self.expandable = None;
                    RawEvent::new(EventKind::Element { empty: true }, depth, name)
                }
                Event::End(end) => {
                    self.expandable = None;
                    let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                    self.open.pop();
                    RawEvent::new(EventKind::EndElement, self.open.len(), name)
                }
                Event::Text(text) => {
                    if depth == 0 && text.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    self.expandable = None;
                    RawEvent::new(EventKind::Text, depth, "#text")
                }
                Event::CData(_) => {
                    self.expandable = None;
                    RawEvent::new(EventKind::CData, depth, "#cdata-section")
                }
                Event::Comment(_) => {
                    self.expandable = None;
                    RawEvent::new(EventKind::Comment, depth, "#comment")
                }
                Event::PI(pi) => {
                    self.expandable = None;
                    let target = String::from_utf8_lossy(pi.target()).into_owned();
                    RawEvent::new(EventKind::ProcessingInstruction, depth, target)
                }
                Event::DocType(content) => {
                    if !self.options.allow_dtd {
                        self.warn("document type declaration ignored, DTDs are disabled".to_string())?;
                    }
                    let doctype = DocType::parse(&String::from_utf8_lossy(&content));
                    let name = doctype.name.clone();
                    self.doctype = Some(doctype);
                    RawEvent::new(EventKind::DocType, depth, name)
                }
                Event::Decl(decl) => {
                    let declared = decl
                        .encoding()
                        .and_then(|e| e.ok())
                        .map(|e| String::from_utf8_lossy(&e).into_owned());
                    self.check_declared_encoding(declared)?;
                    continue;
                }
                Event::Eof => {
                    if let Some(unclosed) = self.open.last() {
                        let message = format!("unexpected end of input, <{}> not closed", unclosed.name);
                        return Err(self.fail(self.input.len(), message));
                    }
                    return Ok(None);
                }
            };

            return Ok(Some(raw));
        }
    }

    fn expand(&mut self, path: &str) -> Result<Subtree> {
        let Some(start) = self.expandable else {
            return Err(ExtractorError::MalformedInput {
                path: path.to_string(),
                line: Some(line_at(self.input, self.position())),
                message: "no element to expand at this position".to_string(),
            });
        };
        let line = line_at(self.input, start);
        let fragment = &self.input[start..];

        let mut sub = Reader::from_str(fragment);
        sub.config_mut().trim_text(false);
        sub.config_mut().check_end_names = self.options.check_end_names;

        let name = match sub.read_event() {
            Ok(Event::Start(start_tag)) => start_tag.name().as_ref().to_vec(),
            Ok(_) => {
                let diagnostic = Diagnostic::fatal(path, Some(line), "expected an element start tag");
                return Err(self.diagnostics.abort(diagnostic));
            }
            Err(e) => {
                let diagnostic = Diagnostic::fatal(path, Some(line), e.to_string());
                return Err(self.diagnostics.abort(diagnostic));
            }
        };

        if let Err(e) = sub.read_to_end(QName(&name)) {
            let offset = start + sub.error_position() as usize;
            let diagnostic = Diagnostic::fatal(path, Some(line_at(self.input, offset)), e.to_string());
            return Err(self.diagnostics.abort(diagnostic));
        }
        let end = (sub.buffer_position() as usize).min(fragment.len());

        let mut xml = fragment[..end].to_string();
        let inherited = self.inherited_namespaces();
        if !inherited.is_empty() {
            let declarations: String = inherited
                .iter()
                .map(|(prefix, uri)| {
                    if prefix.is_empty() {
                        format!(" xmlns=\"{}\"", escape_attribute(uri))
                    } else {
                        format!(" xmlns:{prefix}=\"{}\"", escape_attribute(uri))
                    }
                })
                .collect();
            xml.insert_str(1 + name.len(), &declarations);
        }

        let mut subtree = Subtree::new(xml, path, line, self.options.clone());
        if let Some(doctype) = self.doctype.as_ref().filter(|_| self.options.allow_dtd) {
            subtree = subtree.with_doctype(&doctype.declare(&String::from_utf8_lossy(&name)));
        }
        tracing::trace!(path, line, bytes = subtree.xml().len(), "Expanded subtree");
        Ok(subtree)
    }
}
