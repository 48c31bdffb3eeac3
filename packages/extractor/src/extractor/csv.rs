//! Row mapping over delimited text.

use csv::{ReaderBuilder, Terminator};
use serde::Serialize;

use crate::config::{ascii_byte, CsvConfig};
use crate::dispatch;
use crate::error::{ExtractorError, Result};
use crate::mapper::{validate, Mapper, MapperSpec};
use crate::types::{Input, Properties, RowRecord};

/// Counters for the last completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CsvRunStats {
    /// Non-empty rows read.
    pub rows: usize,
    /// Rows handed to the callback.
    pub dispatched: usize,
}

/// Extracts one record per row, mapping column indices to property names.
#[derive(Debug)]
pub struct CsvExtractor {
    mapper: Mapper<RowRecord>,
    columns: Vec<(String, usize)>,
    last_run: CsvRunStats,
}

impl CsvExtractor {
    /// Validate the mapper; every property must name a column index.
    ///
    /// # Errors
    /// Returns `InvalidMapper` if properties are missing or a column is not a
    /// non-negative integer.
    pub fn new(spec: MapperSpec<RowRecord>) -> Result<Self> {
        let mapper = validate(spec)?;
        let columns = mapper
            .properties()
            .map(|(name, column)| {
                column
                    .trim()
                    .parse::<usize>()
                    .map(|index| (name.to_string(), index))
                    .map_err(|_| {
                        ExtractorError::invalid_mapper(format!(
                            "Column for property \"{name}\" must be a non-negative integer, got '{column}'"
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            mapper,
            columns,
            last_run: CsvRunStats::default(),
        })
    }

    /// Counters for the last successful run.
    #[must_use]
    pub fn last_run(&self) -> &CsvRunStats {
        &self.last_run
    }

    /// Map every row from `config.start_line` on and invoke the callback.
    ///
    /// Blank lines are not rows. Callback return values are ignored.
    ///
    /// # Errors
    /// `InvalidConfig`, `InputOpenFailed`, `MalformedInput` for rows the
    /// tokenizer rejects, `InvalidColumn` when a column is missing and
    /// `fail_on_missing_column` is set, `CallbackFailed`.
    pub fn run(
        &mut self,
        input: impl Into<Input>,
        config: &CsvConfig,
        data: Option<serde_json::Value>,
    ) -> Result<bool> {
        config.validate()?;
        let input = input.into();
        let description = input.describe();

        let mut builder = ReaderBuilder::new();
        builder
            .has_headers(false)
            .flexible(true)
            .delimiter(ascii_byte("delimiter", config.delimiter)?)
            .quote(ascii_byte("quoteChar", config.quote_char)?)
            .escape(config.escape_char.map(|c| ascii_byte("escapeChar", c)).transpose()?);
        if !config.auto_detect_line_endings {
            builder.terminator(Terminator::Any(b'\n'));
        }
        let mut reader = builder.from_reader(input.into_read()?);

        tracing::info!(input = %description, start_line = config.start_line, "Starting CSV extraction");

        let mut stats = CsvRunStats::default();
        for result in reader.records() {
            let row = result.map_err(|e| tokenizer_error(&description, &e))?;
            let mut fields: Vec<&str> = row.iter().collect();
            if !config.auto_detect_line_endings {
                if let Some(last) = fields.last_mut() {
                    let field: &str = *last;
                    *last = field.strip_suffix('\r').unwrap_or(field);
                }
            }
            if fields.len() == 1 && fields[0].is_empty() {
                continue;
            }

            let line = stats.rows;
            stats.rows += 1;
            if line < config.start_line {
                continue;
            }

            let mut properties = Properties::new();
            for (name, column) in &self.columns {
                match fields.get(*column) {
                    Some(value) => properties.insert(name.as_str(), (*value).to_string()),
                    None if config.fail_on_missing_column => {
                        return Err(ExtractorError::InvalidColumn {
                            column: *column,
                            line,
                            property: name.clone(),
                        });
                    }
                    None => {
                        tracing::debug!(line, column, property = %name, "Column missing, property left out");
                    }
                }
            }

            let record = RowRecord {
                line,
                properties,
                data: data.clone(),
            };
            dispatch::invoke(&mut self.mapper, &record, &format!("line {line}"))?;
            stats.dispatched += 1;
        }

        tracing::info!(rows = stats.rows, dispatched = stats.dispatched, "CSV extraction finished");
        self.last_run = stats;
        Ok(true)
    }
}

fn tokenizer_error(description: &str, error: &csv::Error) -> ExtractorError {
    if let csv::ErrorKind::Io(e) = error.kind() {
        return ExtractorError::InputOpenFailed(format!("Could not read {description}: {e}"));
    }
    ExtractorError::MalformedInput {
        path: description.to_string(),
        line: error.position().map(|p| p.line() as usize),
        message: error.to_string(),
    }
}
