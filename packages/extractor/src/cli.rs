//! Command-line interface for the extractor.

use std::cell::Cell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::{Parser, Subcommand};
use console::style;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml_ng::Value as YamlValue;

use crate::config::{CsvConfig, XmlConfig};
use crate::error::{ExtractorError, Result};
use crate::extractor::{CsvExtractor, XmlExtractor};
use crate::mapper::{Callback, CallbackError, CallbackResult, MapperSpec};
use crate::types::{ElementRecord, Input, RowRecord, Value};

/// Record Extractor - mapper-driven record extraction from XML and CSV.
#[derive(Parser)]
#[command(name = "record-extractor")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract records from an XML document.
    Xml {
        /// Input file, or `-` for stdin
        input: String,

        /// YAML mapper file with `config` and `mappers`
        #[arg(short, long)]
        mapper: PathBuf,

        /// JSON value passed to every record as `data`
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Extract records from delimited text.
    Csv {
        /// Input file, or `-` for stdin
        input: String,

        /// YAML mapper file with `config` and `mapper`
        #[arg(short, long)]
        mapper: PathBuf,

        /// JSON value passed to every record as `data`
        #[arg(short, long)]
        data: Option<String>,
    },
}

/// Contents of a mapper file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct MapperFile {
    #[serde(default)]
    config: Option<YamlValue>,

    /// XML: element path -> mapper.
    #[serde(default)]
    mappers: Option<YamlValue>,

    /// CSV: the single mapper.
    #[serde(default)]
    mapper: Option<YamlValue>,
}

impl MapperFile {
    fn parse(text: &str) -> Result<Self> {
        serde_yaml_ng::from_str(text)
            .map_err(|e| ExtractorError::InvalidConfig(format!("mapper file is not valid: {e}")))
    }

    fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ExtractorError::InputOpenFailed(format!(
                "Could not read mapper file \"{}\": {e}",
                path.display()
            ))
        })?;
        Self::parse(&text)
    }

    fn config<C: DeserializeOwned + Default>(&self) -> Result<C> {
        match &self.config {
            None | Some(YamlValue::Null) => Ok(C::default()),
            Some(value) => serde_yaml_ng::from_value(value.clone())
                .map_err(|e| ExtractorError::InvalidConfig(e.to_string())),
        }
    }

    fn xml_mappers(
        &self,
        printed: &Rc<Cell<usize>>,
    ) -> Result<Vec<(String, MapperSpec<ElementRecord>)>> {
        let Some(YamlValue::Mapping(entries)) = &self.mappers else {
            return Err(ExtractorError::invalid_mapper(
                "`mappers` must map element paths to mappers",
            ));
        };

        let callbacks = |name: &str| builtin_callback::<ElementRecord>(name, printed);
        let mut specs = Vec::with_capacity(entries.len());
        for (target, value) in entries {
            let Some(target) = target.as_str() else {
                return Err(ExtractorError::invalid_mapper("Element paths must be strings"));
            };
            let spec = MapperSpec::from_yaml(value, &callbacks).map_err(|e| e.for_target(target))?;
            specs.push((target.to_string(), spec));
        }
        Ok(specs)
    }

    fn csv_mapper(&self, printed: &Rc<Cell<usize>>) -> Result<MapperSpec<RowRecord>> {
        let Some(value) = &self.mapper else {
            return Err(ExtractorError::invalid_mapper("`mapper` is not set"));
        };
        let callbacks = |name: &str| builtin_callback::<RowRecord>(name, printed);
        MapperSpec::from_yaml(value, &callbacks)
    }
}

/// Records the CLI callbacks know how to print and reference.
trait CliRecord: Serialize + fmt::Debug + 'static {
    fn property_text(&self, name: &str) -> Option<String>;
}

impl CliRecord for ElementRecord {
    fn property_text(&self, name: &str) -> Option<String> {
        self.properties.get(name).map(Value::to_text)
    }
}

impl CliRecord for RowRecord {
    fn property_text(&self, name: &str) -> Option<String> {
        self.properties.get(name).cloned()
    }
}

/// Resolve a callback name used in a mapper file.
///
/// - `print`: write the record as one JSON line to stdout
/// - `debug`: log the record at debug level
/// - `store:<literal>`: return a fixed value
/// - `store-property:<name>`: return the text of a resolved property
fn builtin_callback<R: CliRecord>(
    name: &str,
    printed: &Rc<Cell<usize>>,
) -> Option<Box<dyn Callback<R>>> {
    if let Some(literal) = name.strip_prefix("store:") {
        let literal = literal.to_string();
        return Some(Box::new(move |_: &R| -> CallbackResult { Ok(Some(literal.clone())) }));
    }
    if let Some(property) = name.strip_prefix("store-property:") {
        let property = property.to_string();
        return Some(Box::new(move |record: &R| -> CallbackResult {
            Ok(record.property_text(&property))
        }));
    }

    match name {
        "print" => {
            let printed = Rc::clone(printed);
            Some(Box::new(move |record: &R| -> CallbackResult {
                let line = serde_json::to_string(record)
                    .map_err(|e| CallbackError::new(format!("could not serialize record: {e}")))?;
                println!("{line}");
                printed.set(printed.get() + 1);
                Ok(None)
            }))
        }
        "debug" => Some(Box::new(|record: &R| -> CallbackResult {
            tracing::debug!(record = ?record, "Extracted record");
            Ok(None)
        })),
        _ => None,
    }
}

fn open_input(input: &str) -> Input {
    if input == "-" {
        Input::reader(std::io::stdin())
    } else {
        Input::Path(PathBuf::from(input))
    }
}

fn parse_data(data: Option<&str>) -> Result<Option<serde_json::Value>> {
    data.map(|text| {
        serde_json::from_str(text)
            .map_err(|e| ExtractorError::InvalidConfig(format!("--data is not valid JSON: {e}")))
    })
    .transpose()
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Xml {
            input,
            mapper,
            data,
        } => xml_command(&input, &mapper, data.as_deref()),
        Commands::Csv {
            input,
            mapper,
            data,
        } => csv_command(&input, &mapper, data.as_deref()),
    }
}

/// Execute the xml command.
fn xml_command(input: &str, mapper_file: &Path, data: Option<&str>) -> Result<()> {
    let file = MapperFile::load(mapper_file)?;
    let config: XmlConfig = file.config()?;
    let data = parse_data(data)?;

    let printed = Rc::new(Cell::new(0));
    let mut extractor = XmlExtractor::new(file.xml_mappers(&printed)?)?;
    extractor.run(open_input(input), &config, data)?;

    let stats = extractor.last_run();
    eprintln!(
        "{} {} matched, {} stored, {} skipped, {} printed",
        style("Done:").green().bold(),
        style(stats.matched).cyan(),
        stats.stored,
        stats.skips,
        printed.get()
    );
    if stats.warnings > 0 {
        eprintln!("  Warnings: {}", style(stats.warnings).yellow().bold());
    }
    Ok(())
}

/// Execute the csv command.
fn csv_command(input: &str, mapper_file: &Path, data: Option<&str>) -> Result<()> {
    let file = MapperFile::load(mapper_file)?;
    let config: CsvConfig = file.config()?;
    let data = parse_data(data)?;

    let printed = Rc::new(Cell::new(0));
    let mut extractor = CsvExtractor::new(file.csv_mapper(&printed)?)?;
    extractor.run(open_input(input), &config, data)?;

    let stats = extractor.last_run();
    eprintln!(
        "{} {} rows, {} dispatched, {} printed",
        style("Done:").green().bold(),
        style(stats.rows).cyan(),
        stats.dispatched,
        printed.get()
    );
    Ok(())
}
