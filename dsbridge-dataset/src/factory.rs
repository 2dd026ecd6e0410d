//! Schema discovery and batch reading over a list of file URIs.

use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use arrow::csv::reader::{Reader as CsvReader, ReaderBuilder};
use arrow::datatypes::SchemaRef;
use dsbridge_reconcile::PhysicalBatch;
use dsbridge_result::{Error, Result};
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use tracing::debug;

use crate::format::{CsvReadOptions, FileFormat};
use crate::uri::NormalizedUri;

/// Reads the files of one dataset in one format.
#[derive(Debug, Clone)]
pub struct DatasetFactory {
    uris: Vec<NormalizedUri>,
    format: FileFormat,
}

impl DatasetFactory {
    /// Normalize every URI up front; an empty list is rejected.
    pub fn new<I, S>(uris: I, format: FileFormat) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let uris = uris
            .into_iter()
            .map(|uri| NormalizedUri::parse(uri.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        if uris.is_empty() {
            return Err(Error::InvalidArgumentError("empty input file list".into()));
        }
        Ok(Self { uris, format })
    }

    pub fn format(&self) -> &FileFormat {
        &self.format
    }

    pub fn uris(&self) -> &[NormalizedUri] {
        &self.uris
    }

    /// Physical schema of the first file.
    pub fn inspect(&self) -> Result<SchemaRef> {
        self.inspect_uri(&self.uris[0])
    }

    /// Physical schema of `uri` in this factory's format.
    pub fn inspect_uri(&self, uri: &NormalizedUri) -> Result<SchemaRef> {
        let path = uri.to_file_path()?;
        let schema = match &self.format {
            FileFormat::Parquet(_) => {
                let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(&path)?)
                    .map_err(|e| Error::Internal(format!("failed to read Parquet footer: {e}")))?;
                Arc::clone(builder.schema())
            }
            FileFormat::Csv(options) => infer_csv_schema(&path, options)?.0,
            FileFormat::Orc(_) => return Err(orc_unavailable()),
        };
        debug!(uri = %uri, format = %self.format, fields = schema.fields().len(), "inspected file");
        Ok(schema)
    }

    /// Start reading `uri`. The reader closes its file once exhausted or dropped.
    pub fn open(&self, uri: &NormalizedUri) -> Result<PhysicalBatchReader> {
        let path = uri.to_file_path()?;
        let (schema, source) = match &self.format {
            FileFormat::Parquet(options) => {
                let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(&path)?)
                    .map_err(|e| Error::Internal(format!("failed to create Parquet reader: {e}")))?;
                let schema = Arc::clone(builder.schema());
                let reader = builder
                    .with_batch_size(options.batch_size)
                    .build()
                    .map_err(|e| Error::Internal(format!("failed to build Parquet reader: {e}")))?;
                (schema, BatchSource::Parquet(reader))
            }
            FileFormat::Csv(options) => {
                let (schema, mut file) = infer_csv_schema(&path, options)?;
                file.seek(SeekFrom::Start(0))?;
                let reader = ReaderBuilder::new(Arc::clone(&schema))
                    .with_format(options.to_format()?)
                    .with_batch_size(options.batch_size)
                    .build(file)?;
                (schema, BatchSource::Csv(reader))
            }
            FileFormat::Orc(_) => return Err(orc_unavailable()),
        };

        debug!(uri = %uri, format = %self.format, "opened file");
        Ok(PhysicalBatchReader {
            uri: uri.to_string(),
            schema,
            source: Some(source),
            batches: 0,
            rows: 0,
        })
    }
}

fn orc_unavailable() -> Error {
    Error::InvalidArgumentError("reading orc files is not supported by this build".into())
}

fn infer_csv_schema(path: &Path, options: &CsvReadOptions) -> Result<(SchemaRef, File)> {
    let mut file = File::open(path)?;
    let format = options.to_format()?;
    let (schema, sampled) =
        format.infer_schema(BufReader::new(&mut file), Some(options.max_read_records))?;
    debug!(path = %path.display(), sampled, "inferred CSV schema");
    Ok((Arc::new(schema), file))
}

enum BatchSource {
    Parquet(ParquetRecordBatchReader),
    Csv(CsvReader<File>),
}

impl BatchSource {
    fn next_batch(&mut self) -> Option<Result<PhysicalBatch>> {
        let next = match self {
            BatchSource::Parquet(reader) => reader.next(),
            BatchSource::Csv(reader) => reader.next(),
        };
        next.map(|batch| batch.map(PhysicalBatch::new).map_err(Error::from))
    }
}

/// Iterator over the physical batches of one file.
pub struct PhysicalBatchReader {
    uri: String,
    schema: SchemaRef,
    source: Option<BatchSource>,
    batches: usize,
    rows: usize,
}

impl PhysicalBatchReader {
    /// Schema of every batch this reader yields.
    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn is_closed(&self) -> bool {
        self.source.is_none()
    }

    fn close(&mut self) {
        if self.source.take().is_some() {
            debug!(uri = %self.uri, batches = self.batches, rows = self.rows, "closed file");
        }
    }
}

impl Iterator for PhysicalBatchReader {
    type Item = Result<PhysicalBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.source.as_mut()?.next_batch();
        match &next {
            Some(Ok(batch)) => {
                self.batches += 1;
                self.rows += batch.num_rows();
            }
            Some(Err(_)) | None => self.close(),
        }
        next
    }
}

impl Drop for PhysicalBatchReader {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for PhysicalBatchReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalBatchReader")
            .field("uri", &self.uri)
            .field("closed", &self.is_closed())
            .field("batches", &self.batches)
            .finish()
    }
}
