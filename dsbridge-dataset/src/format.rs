//! Physical file formats and their read options.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use arrow::csv::reader::Format;
use dsbridge_result::{Error, Result};
use regex::Regex;
use tracing::debug;

pub const DEFAULT_BATCH_SIZE: usize = 4096;
pub const DEFAULT_MAX_READ_RECORDS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParquetReadOptions {
    pub batch_size: usize,
}

impl Default for ParquetReadOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrcReadOptions {
    pub batch_size: usize,
}

impl Default for OrcReadOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvReadOptions {
    pub has_header: bool,
    pub delimiter: u8,
    /// Sample size for schema inference.
    pub max_read_records: usize,
    pub batch_size: usize,
    /// Cell text read as null, compared exactly.
    pub null_value: Option<String>,
}

impl Default for CsvReadOptions {
    fn default() -> Self {
        Self {
            has_header: true,
            delimiter: b',',
            max_read_records: DEFAULT_MAX_READ_RECORDS,
            batch_size: DEFAULT_BATCH_SIZE,
            null_value: None,
        }
    }
}

impl CsvReadOptions {
    pub(crate) fn to_format(&self) -> Result<Format> {
        let mut format = Format::default().with_header(self.has_header);
        if self.delimiter != b',' {
            format = format.with_delimiter(self.delimiter);
        }
        if let Some(token) = &self.null_value {
            let regex = Regex::new(&format!("^{}$", regex::escape(token))).map_err(|err| {
                Error::InvalidArgumentError(format!("null_value \"{token}\": {err}"))
            })?;
            format = format.with_null_regex(regex);
        }
        Ok(format)
    }
}

/// A format to read files with, selected by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileFormat {
    Parquet(ParquetReadOptions),
    Orc(OrcReadOptions),
    Csv(CsvReadOptions),
}

impl FileFormat {
    /// Map a format name and its string options to a [`FileFormat`].
    ///
    /// Names are matched case-insensitively. Unknown option keys are ignored;
    /// malformed values are an [`Error::InvalidArgumentError`].
    pub fn resolve(name: &str, options: &HashMap<String, String>) -> Result<Self> {
        let mut reader = OptionReader::new(options);
        let batch_size = reader.positive("batch_size", DEFAULT_BATCH_SIZE)?;

        let format = match name.to_ascii_lowercase().as_str() {
            "parquet" => FileFormat::Parquet(ParquetReadOptions { batch_size }),
            "orc" => FileFormat::Orc(OrcReadOptions { batch_size }),
            "csv" => {
                let defaults = CsvReadOptions::default();
                FileFormat::Csv(CsvReadOptions {
                    has_header: reader.parse("header", defaults.has_header)?,
                    delimiter: reader.delimiter("delimiter", defaults.delimiter)?,
                    max_read_records: reader
                        .positive("max_read_records", defaults.max_read_records)?,
                    batch_size,
                    null_value: reader.take("null_value").map(str::to_string),
                })
            }
            other => {
                return Err(Error::InvalidArgumentError(format!(
                    "unrecognized file format \"{other}\""
                )));
            }
        };

        for key in reader.unused() {
            debug!(format = %format.name(), key, "ignoring unknown format option");
        }
        Ok(format)
    }

    pub fn name(&self) -> &'static str {
        match self {
            FileFormat::Parquet(_) => "parquet",
            FileFormat::Orc(_) => "orc",
            FileFormat::Csv(_) => "csv",
        }
    }

    pub fn batch_size(&self) -> usize {
        match self {
            FileFormat::Parquet(options) => options.batch_size,
            FileFormat::Orc(options) => options.batch_size,
            FileFormat::Csv(options) => options.batch_size,
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FileFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        FileFormat::resolve(s, &HashMap::new())
    }
}

/// Tracks which option keys were consumed while parsing.
struct OptionReader<'a> {
    options: &'a HashMap<String, String>,
    used: Vec<&'a str>,
}

impl<'a> OptionReader<'a> {
    fn new(options: &'a HashMap<String, String>) -> Self {
        Self {
            options,
            used: Vec::new(),
        }
    }

    fn take(&mut self, key: &'a str) -> Option<&'a str> {
        let value = self.options.get(key)?;
        self.used.push(key);
        Some(value.as_str())
    }

    fn parse<T: FromStr>(&mut self, key: &'a str, default: T) -> Result<T> {
        match self.take(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|_| {
                Error::InvalidArgumentError(format!("invalid value \"{raw}\" for option \"{key}\""))
            }),
        }
    }

    fn positive(&mut self, key: &'a str, default: usize) -> Result<usize> {
        let value: usize = self.parse(key, default)?;
        if value == 0 {
            return Err(Error::InvalidArgumentError(format!(
                "option \"{key}\" must be positive"
            )));
        }
        Ok(value)
    }

    fn delimiter(&mut self, key: &'a str, default: u8) -> Result<u8> {
        match self.take(key) {
            None => Ok(default),
            Some(raw) => match raw.as_bytes() {
                [byte] => Ok(*byte),
                _ if raw == "\\t" => Ok(b'\t'),
                _ => Err(Error::InvalidArgumentError(format!(
                    "delimiter must be a single byte, got \"{raw}\""
                ))),
            },
        }
    }

    fn unused(&self) -> Vec<&'a str> {
        let mut keys: Vec<&'a str> = self
            .options
            .keys()
            .map(String::as_str)
            .filter(|key| !self.used.contains(key))
            .collect();
        keys.sort_unstable();
        keys
    }
}
