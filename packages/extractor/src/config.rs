//! Run configuration and validation for both extractors.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::{ExtractorError, Result};

/// Prefix that marks a property expression as a back-reference.
pub const BACK_REFERENCE_MARKER: char = '#';

/// Separator used to join the path stack into a path key.
pub const PATH_SEPARATOR: &str = "/";

/// Default input encoding.
pub const DEFAULT_ENCODING: &str = "UTF-8";

/// Node limit for a single materialized subtree when huge documents are disabled.
///
/// Matches the limit libxml2 applies without `XML_PARSE_HUGE`.
pub const DEFAULT_NODES_LIMIT: u32 = 10_000_000;

/// XML namespace prefix pattern (NCName, ASCII subset).
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static NCNAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").expect("valid regex"));

/// Encoding labels accepted for UTF-8 input.
const UTF8_LABELS: &[&str] = &["utf-8", "utf8", "unicode-1-1-utf-8"];

/// Flags passed through to the XML parser.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    /// Lift the node limit for materialized subtrees.
    pub huge_documents: bool,

    /// Accept DTDs inside materialized subtrees.
    pub allow_dtd: bool,

    /// Fail on mismatched end tags while streaming.
    pub check_end_names: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            huge_documents: true,
            allow_dtd: false,
            check_end_names: true,
        }
    }
}

impl ParserOptions {
    /// Node limit handed to `roxmltree` when parsing a subtree.
    #[must_use]
    pub fn nodes_limit(&self) -> u32 {
        if self.huge_documents {
            u32::MAX
        } else {
            DEFAULT_NODES_LIMIT
        }
    }
}

/// Configuration for a hierarchical (XML) run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct XmlConfig {
    /// Declared input encoding.
    pub encoding: String,

    /// Parser pass-through flags.
    #[serde(alias = "parserOptions")]
    pub parser_options: ParserOptions,

    /// Namespace prefixes registered with the path-query evaluator.
    pub namespaces: BTreeMap<String, String>,
}

impl Default for XmlConfig {
    fn default() -> Self {
        Self {
            encoding: DEFAULT_ENCODING.to_string(),
            parser_options: ParserOptions::default(),
            namespaces: BTreeMap::new(),
        }
    }
}

impl XmlConfig {
    /// Register a namespace prefix for path-queries.
    #[must_use]
    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.insert(prefix.into(), uri.into());
        self
    }

    /// Set the parser options.
    #[must_use]
    pub fn with_parser_options(mut self, options: ParserOptions) -> Self {
        self.parser_options = options;
        self
    }

    /// Validate the configuration before a run.
    ///
    /// # Examples
    /// ```
    /// use record_extractor::config::XmlConfig;
    ///
    /// assert!(XmlConfig::default().validate().is_ok());
    /// assert!(XmlConfig::default().with_namespace("1bad", "urn:x").validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        validate_encoding(&self.encoding)?;
        for (prefix, uri) in &self.namespaces {
            validate_prefix(prefix)?;
            if uri.is_empty() {
                return Err(ExtractorError::InvalidConfig(format!(
                    "namespace prefix '{prefix}' is bound to an empty URI"
                )));
            }
        }
        Ok(())
    }
}

/// Configuration for a tabular (CSV) run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CsvConfig {
    /// Field delimiter.
    pub delimiter: char,

    /// Quote (enclosure) character.
    #[serde(alias = "quoteChar")]
    pub quote_char: char,

    /// Escape character inside quoted fields.
    #[serde(alias = "escapeChar")]
    pub escape_char: Option<char>,

    /// First row (0-based) handed to the callback.
    #[serde(alias = "startLine")]
    pub start_line: usize,

    /// Fail when a mapped column is absent from a row.
    #[serde(alias = "failOnMissingColumn")]
    pub fail_on_missing_column: bool,

    /// Accept lone `\r` as a row terminator.
    #[serde(alias = "autoDetectLineEndings")]
    pub auto_detect_line_endings: bool,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            quote_char: '"',
            escape_char: Some('\\'),
            start_line: 0,
            fail_on_missing_column: true,
            auto_detect_line_endings: false,
        }
    }
}

impl CsvConfig {
    /// Validate the configuration before a run.
    pub fn validate(&self) -> Result<()> {
        ascii_byte("delimiter", self.delimiter)?;
        ascii_byte("quote_char", self.quote_char)?;
        if let Some(escape) = self.escape_char {
            ascii_byte("escape_char", escape)?;
        }
        if self.delimiter == self.quote_char {
            return Err(ExtractorError::InvalidConfig(
                "delimiter and quote_char must differ".to_string(),
            ));
        }
        Ok(())
    }
}

/// Validate that an encoding label names UTF-8.
///
/// # Examples
/// ```
/// use record_extractor::config::validate_encoding;
///
/// assert!(validate_encoding("UTF-8").is_ok());
/// assert!(validate_encoding("utf8").is_ok());
/// assert!(validate_encoding("ISO-8859-1").is_err());
/// ```
pub fn validate_encoding(encoding: &str) -> Result<()> {
    let label = encoding.trim().to_ascii_lowercase();
    if UTF8_LABELS.contains(&label.as_str()) {
        Ok(())
    } else {
        Err(ExtractorError::InvalidConfig(format!(
            "unsupported encoding '{encoding}', only UTF-8 input is supported"
        )))
    }
}

/// Validate a namespace prefix.
pub fn validate_prefix(prefix: &str) -> Result<()> {
    if NCNAME_PATTERN.is_match(prefix) && !prefix.eq_ignore_ascii_case("xmlns") {
        Ok(())
    } else {
        Err(ExtractorError::InvalidConfig(format!(
            "invalid namespace prefix '{prefix}'"
        )))
    }
}

/// Convert a control character to the single byte the CSV reader expects.
pub fn ascii_byte(field: &str, c: char) -> Result<u8> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(ExtractorError::InvalidConfig(format!(
            "{field} must be a single-byte ASCII character, got '{c}'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xml_defaults() {
        let config = XmlConfig::default();
        assert_eq!(config.encoding, "UTF-8");
        assert!(config.parser_options.huge_documents);
        assert_eq!(config.parser_options.nodes_limit(), u32::MAX);
        assert!(config.namespaces.is_empty());
    }

    #[test]
    fn test_nodes_limit_without_huge() {
        let options = ParserOptions {
            huge_documents: false,
            ..ParserOptions::default()
        };
        assert_eq!(options.nodes_limit(), DEFAULT_NODES_LIMIT);
    }

    #[test]
    fn test_validate_prefix() {
        assert!(validate_prefix("dc").is_ok());
        assert!(validate_prefix("_x.y-z").is_ok());
        assert!(validate_prefix("").is_err());
        assert!(validate_prefix("1a").is_err());
        assert!(validate_prefix("a:b").is_err());
        assert!(validate_prefix("xmlns").is_err());
    }

    #[test]
    fn test_validate_encoding() {
        assert!(validate_encoding(" Utf-8 ").is_ok());
        assert!(validate_encoding("latin1").is_err());
    }

    #[test]
    fn test_empty_namespace_uri_rejected() {
        let config = XmlConfig::default().with_namespace("a", "");
        assert!(matches!(
            config.validate(),
            Err(ExtractorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_csv_defaults() {
        let config = CsvConfig::default();
        assert_eq!(config.delimiter, ',');
        assert_eq!(config.quote_char, '"');
        assert_eq!(config.escape_char, Some('\\'));
        assert_eq!(config.start_line, 0);
        assert!(config.fail_on_missing_column);
        assert!(!config.auto_detect_line_endings);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_csv_rejects_non_ascii() {
        let config = CsvConfig {
            delimiter: '§',
            ..CsvConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_csv_config_from_yaml() {
        let yaml = "delimiter: ';'\nstartLine: 2\nfail_on_missing_column: false\n";
        let config: CsvConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.delimiter, ';');
        assert_eq!(config.start_line, 2);
        assert!(!config.fail_on_missing_column);
        assert_eq!(config.quote_char, '"');
    }

    #[test]
    fn test_xml_config_from_yaml() {
        let yaml = "namespaces:\n  dc: http://purl.org/dc/elements/1.1/\nparserOptions:\n  huge_documents: false\n";
        let config: XmlConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(
            config.namespaces.get("dc").map(String::as_str),
            Some("http://purl.org/dc/elements/1.1/")
        );
        assert!(!config.parser_options.huge_documents);
        assert_eq!(config.encoding, "UTF-8");
    }
}
