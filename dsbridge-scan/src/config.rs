use std::sync::Arc;

use arrow::datatypes::{Schema, SchemaRef};
use dsbridge_dataset::{DEFAULT_BATCH_SIZE, partition_values_from_path};
use dsbridge_reconcile::ReconcileOptions;
use dsbridge_result::{Error, Result};
use dsbridge_types::PartitionValue;

/// What a scan produces, independent of the file being scanned.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub required_schema: SchemaRef,
    pub partition_schema: SchemaRef,
    pub case_sensitive: bool,
    /// Row count pooled null and partition columns are sized for.
    pub batch_size: usize,
}

impl ScanConfig {
    pub fn new(required_schema: SchemaRef) -> Self {
        Self {
            required_schema,
            partition_schema: Arc::new(Schema::empty()),
            case_sensitive: false,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_partition_schema(mut self, partition_schema: SchemaRef) -> Self {
        self.partition_schema = partition_schema;
        self
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions::case_sensitive(self.case_sensitive)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidArgumentError("batch_size must be positive".into()));
        }
        Ok(())
    }
}

/// One file to scan plus the partition values it contributes.
#[derive(Debug, Clone, PartialEq)]
pub struct FileSplit {
    pub uri: String,
    /// Aligned positionally with the scan's partition schema.
    pub partition_values: Vec<PartitionValue>,
}

impl FileSplit {
    pub fn new(uri: impl Into<String>, partition_values: Vec<PartitionValue>) -> Self {
        Self {
            uri: uri.into(),
            partition_values,
        }
    }

    /// A split whose partition values come from `key=value` segments of `uri`.
    pub fn from_hive_path(uri: impl Into<String>, partition_schema: &Schema) -> Result<Self> {
        let uri = uri.into();
        let partition_values = partition_values_from_path(&uri, partition_schema)?;
        Ok(Self {
            uri,
            partition_values,
        })
    }
}
