//! The `dsbridge-cat` command: scan one file and pretty-print its batches.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema};
use arrow::util::pretty::pretty_format_batches;
use dsbridge_column::BufferAllocator;
use dsbridge_dataset::{DatasetFactory, FileFormat};
use dsbridge_reconcile::FieldMatcher;
use dsbridge_result::{Error, Result};
use dsbridge_scan::{FileSplit, ScanConfig, ScanSummary, scan_split};

pub const USAGE: &str = "\
usage: dsbridge-cat <format> <uri> [column ...] [--case-insensitive] [--option key=value ...]

  format               parquet, csv or orc
  uri                  file:// URI of the file to scan (s3/hdfs URIs are normalized only)
  column               required output column; all file columns when omitted
  --case-insensitive   match column names case-insensitively
  --option key=value   format option, e.g. delimiter=; or batch_size=1024";

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatArgs {
    pub format: String,
    pub uri: String,
    pub columns: Vec<String>,
    pub case_insensitive: bool,
    pub options: HashMap<String, String>,
}

impl CatArgs {
    /// Parse arguments, excluding the program name.
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut positional = Vec::new();
        let mut case_insensitive = false;
        let mut options = HashMap::new();
        let mut args = args.into_iter().map(Into::into);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--case-insensitive" => case_insensitive = true,
                "--option" | "-o" => {
                    let pair = args.next().ok_or_else(|| {
                        Error::InvalidArgumentError(format!("{arg} needs a key=value argument"))
                    })?;
                    let (key, value) = pair.split_once('=').ok_or_else(|| {
                        Error::InvalidArgumentError(format!("expected key=value, got \"{pair}\""))
                    })?;
                    options.insert(key.to_string(), value.to_string());
                }
                flag if flag.starts_with("--") => {
                    return Err(Error::InvalidArgumentError(format!("unknown flag {flag}")));
                }
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let (Some(format), Some(uri)) = (positional.next(), positional.next()) else {
            return Err(Error::InvalidArgumentError(
                "a format and a URI are required".into(),
            ));
        };
        Ok(Self {
            format,
            uri,
            columns: positional.collect(),
            case_insensitive,
            options,
        })
    }
}

/// Required schema for `columns` against `data_schema`.
///
/// Columns the file lacks are requested as nullable strings and come back
/// all-null.
fn required_schema(
    data_schema: &Schema,
    columns: &[String],
    case_sensitive: bool,
) -> Result<Schema> {
    if columns.is_empty() {
        return Ok(data_schema.clone());
    }
    let matcher = FieldMatcher::for_schema(data_schema, case_sensitive);
    let fields = columns
        .iter()
        .map(|name| -> Result<Field> {
            Ok(match matcher.resolve(name)? {
                Some(idx) => {
                    let field = data_schema.field(idx);
                    Field::new(name, field.data_type().clone(), true)
                }
                None => Field::new(name, DataType::Utf8, true),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Schema::new(fields))
}

/// Scan the file named by `args` and write its batches as a table to `out`.
pub fn run(args: &CatArgs, out: &mut impl Write) -> Result<ScanSummary> {
    let format = FileFormat::resolve(&args.format, &args.options)?;
    let batch_size = format.batch_size();
    let factory = DatasetFactory::new([args.uri.as_str()], format)?;
    let data_schema = factory.inspect()?;

    let case_sensitive = !args.case_insensitive;
    let required = required_schema(&data_schema, &args.columns, case_sensitive)?;
    let config = ScanConfig::new(Arc::new(required))
        .with_case_sensitive(case_sensitive)
        .with_batch_size(batch_size);

    let mut batches = Vec::new();
    let split = FileSplit::new(args.uri.clone(), Vec::new());
    let summary = scan_split(0, BufferAllocator::new(), &factory, &split, &config, &mut |batch| {
        batches.push(batch.to_record_batch()?);
        Ok(())
    })?;

    if !batches.is_empty() {
        writeln!(out, "{}", pretty_format_batches(&batches)?)?;
    }
    writeln!(out, "{} rows in {} batches", summary.rows, summary.batches)?;
    Ok(summary)
}
