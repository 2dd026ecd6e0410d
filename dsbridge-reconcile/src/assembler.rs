//! Assembly of output batches from physical batches and pooled columns.
//!
//! Two entry points exist:
//!
//! - [`assemble`] passes every physical column through and appends the
//!   partition columns. Use it when the file is known to carry every field.
//! - [`Reconciler`] maps each field of a required schema to a physical column,
//!   a partition column, or a pooled null column, and appends the partition
//!   columns the required schema does not name.
//!
//! Pooled columns are shared by every batch of a split. They are retained and
//! their value count refreshed before each attach; the batch then owns only the
//! retained handle.

use std::sync::Arc;

use arrow::compute::{CastOptions, can_cast_types, cast_with_options};
use arrow::datatypes::{Field, FieldRef, Schema, SchemaRef};
use dsbridge_column::{Column, NullColumnPool, TaskContext};
use dsbridge_result::{Error, Result};
use tracing::{debug, trace};

use crate::matcher::FieldMatcher;
use crate::output::OutputBatch;
use crate::physical::PhysicalBatch;

/// Knobs for matching required fields against a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileOptions {
    /// Compare field names byte for byte instead of case-folded.
    pub case_sensitive: bool,
}

impl ReconcileOptions {
    pub fn case_sensitive(case_sensitive: bool) -> Self {
        Self { case_sensitive }
    }
}

fn attach_shared(column: &Column, rows: usize) -> Result<Column> {
    let handle = column.retain();
    handle.set_value_count(rows)?;
    Ok(handle)
}

/// Casts that would turn an unconvertible value into null fail instead.
pub(crate) fn strict_cast() -> CastOptions<'static> {
    CastOptions {
        safe: false,
        ..Default::default()
    }
}

fn check_partition_arity(partition_schema: &Schema, partition_columns: &[Column]) -> Result<()> {
    if partition_schema.fields().len() != partition_columns.len() {
        return Err(Error::InvalidArgumentError(format!(
            "partition schema has {} fields but {} partition columns were supplied",
            partition_schema.fields().len(),
            partition_columns.len()
        )));
    }
    Ok(())
}

/// Output every physical column typed per `data_schema`, followed by the
/// partition columns in `partition_schema` order.
pub fn assemble(
    ctx: &TaskContext,
    batch: PhysicalBatch,
    data_schema: &Schema,
    partition_schema: &Schema,
    partition_columns: &[Column],
) -> Result<OutputBatch> {
    check_partition_arity(partition_schema, partition_columns)?;
    let rows = batch.num_rows();
    let mut columns = batch.decode(data_schema, ctx.allocator())?;
    for column in partition_columns {
        columns.push(attach_shared(column, rows)?);
    }

    let fields: Vec<FieldRef> = data_schema
        .fields()
        .iter()
        .chain(partition_schema.fields().iter())
        .cloned()
        .collect();
    trace!(task_id = ctx.task_id(), rows, columns = columns.len(), "assembled batch");
    OutputBatch::new(Arc::new(Schema::new(fields)), columns, rows)
}

/// Where one output column comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// Index into the data schema.
    Physical(usize),
    /// Index into the partition schema.
    Partition(usize),
    /// A pooled null column. The pool is built from
    /// [`Reconciler::missing_fields`], so the n-th `Null` entry of the plan is
    /// the n-th pooled column.
    Null,
}

/// Per-split plan mapping a required schema onto a file's data schema.
///
/// Built once per split. Construction resolves every required field against
/// the physical names before any batch is read, so an ambiguous name fails the
/// split even when the field would have fallen back to a null or partition
/// column.
#[derive(Debug, Clone)]
pub struct Reconciler {
    data_schema: SchemaRef,
    required_schema: SchemaRef,
    partition_schema: SchemaRef,
    options: ReconcileOptions,
    plan: Vec<FieldSource>,
    appended_partitions: Vec<usize>,
    output_schema: SchemaRef,
}

impl Reconciler {
    pub fn try_new(
        data_schema: SchemaRef,
        required_schema: SchemaRef,
        partition_schema: SchemaRef,
        options: ReconcileOptions,
    ) -> Result<Self> {
        let physical = FieldMatcher::for_schema(&data_schema, options.case_sensitive);
        physical.validate_all(&required_schema)?;
        let partitions = FieldMatcher::for_schema(&partition_schema, options.case_sensitive);

        let mut plan = Vec::with_capacity(required_schema.fields().len());
        let mut fields: Vec<FieldRef> = Vec::with_capacity(
            required_schema.fields().len() + partition_schema.fields().len(),
        );
        let mut claimed = vec![false; partition_schema.fields().len()];

        for required in required_schema.fields() {
            let (source, nullable) = if let Some(idx) = physical.resolve(required.name())? {
                let field = data_schema.field(idx);
                if !can_cast_types(field.data_type(), required.data_type()) {
                    return Err(Error::InvalidArgumentError(format!(
                        "field \"{}\" is stored as {} and cannot be read as {}",
                        required.name(),
                        field.data_type(),
                        required.data_type()
                    )));
                }
                (FieldSource::Physical(idx), field.is_nullable())
            } else if let Some(idx) = partitions.resolve(required.name())? {
                let field = partition_schema.field(idx);
                if field.data_type() != required.data_type() {
                    return Err(Error::InvalidArgumentError(format!(
                        "partition field \"{}\" is {} but {} is required",
                        field.name(),
                        field.data_type(),
                        required.data_type()
                    )));
                }
                claimed[idx] = true;
                (FieldSource::Partition(idx), field.is_nullable())
            } else {
                (FieldSource::Null, true)
            };
            plan.push(source);
            fields.push(Arc::new(Field::new(
                required.name(),
                required.data_type().clone(),
                required.is_nullable() || nullable,
            )));
        }

        let appended_partitions: Vec<usize> = claimed
            .iter()
            .enumerate()
            .filter(|(_, claimed)| !**claimed)
            .map(|(idx, _)| idx)
            .collect();
        for &idx in &appended_partitions {
            fields.push(Arc::clone(&partition_schema.fields()[idx]));
        }

        debug!(
            required = required_schema.fields().len(),
            physical = data_schema.fields().len(),
            partitions = partition_schema.fields().len(),
            missing = plan.iter().filter(|s| **s == FieldSource::Null).count(),
            case_sensitive = options.case_sensitive,
            "reconciliation plan built"
        );

        Ok(Self {
            data_schema,
            required_schema,
            partition_schema,
            options,
            plan,
            appended_partitions,
            output_schema: Arc::new(Schema::new(fields)),
        })
    }

    pub fn data_schema(&self) -> &SchemaRef {
        &self.data_schema
    }

    pub fn required_schema(&self) -> &SchemaRef {
        &self.required_schema
    }

    pub fn partition_schema(&self) -> &SchemaRef {
        &self.partition_schema
    }

    pub fn options(&self) -> ReconcileOptions {
        self.options
    }

    /// Source of each required field, in required order.
    pub fn plan(&self) -> &[FieldSource] {
        &self.plan
    }

    /// Schema of every batch this reconciler produces.
    pub fn output_schema(&self) -> &SchemaRef {
        &self.output_schema
    }

    /// Required fields served by neither the file nor a partition column.
    ///
    /// The null-column pool passed to [`Reconciler::reconcile`] must hold a
    /// column for each of them, in this order.
    pub fn missing_fields(&self) -> Schema {
        let fields: Vec<FieldRef> = self
            .required_schema
            .fields()
            .iter()
            .zip(&self.plan)
            .filter(|(_, source)| **source == FieldSource::Null)
            .map(|(field, _)| {
                Arc::new(Field::new(field.name(), field.data_type().clone(), true))
            })
            .collect();
        Schema::new(fields)
    }

    /// Turn one physical batch into an output batch in required order.
    ///
    /// The physical batch is consumed. Decoded columns that no required field
    /// selects are released before this returns.
    pub fn reconcile(
        &self,
        ctx: &TaskContext,
        batch: PhysicalBatch,
        null_columns: &NullColumnPool,
        partition_columns: &[Column],
    ) -> Result<OutputBatch> {
        check_partition_arity(&self.partition_schema, partition_columns)?;
        let rows = batch.num_rows();
        let decoded = batch.decode(&self.data_schema, ctx.allocator())?;

        let mut columns = Vec::with_capacity(self.output_schema.fields().len());
        let mut null_slot = 0;
        for (field, source) in self.required_schema.fields().iter().zip(&self.plan) {
            let column = match *source {
                FieldSource::Physical(idx) => {
                    let column = &decoded[idx];
                    if column.data_type() == field.data_type() {
                        column.retain()
                    } else {
                        let array =
                            cast_with_options(&column.array()?, field.data_type(), &strict_cast())?;
                        Column::from_array(field.name(), array, ctx.allocator())?
                    }
                }
                FieldSource::Partition(idx) => attach_shared(&partition_columns[idx], rows)?,
                FieldSource::Null => {
                    let pooled = null_columns
                        .get(null_slot)
                        .filter(|c| c.name() == field.name().as_str())
                        .ok_or_else(|| Error::MissingNullColumn(field.name().clone()))?;
                    null_slot += 1;
                    if pooled.data_type() != field.data_type() {
                        return Err(Error::Internal(format!(
                            "null column \"{}\" is {} but {} is required",
                            pooled.name(),
                            pooled.data_type(),
                            field.data_type()
                        )));
                    }
                    attach_shared(pooled, rows)?
                }
            };
            columns.push(column);
        }
        for &idx in &self.appended_partitions {
            columns.push(attach_shared(&partition_columns[idx], rows)?);
        }

        let unselected = decoded.iter().filter(|c| c.ref_count() == 1).count();
        drop(decoded);
        trace!(
            task_id = ctx.task_id(),
            rows,
            columns = columns.len(),
            released = unselected,
            "reconciled batch"
        );
        OutputBatch::new(Arc::clone(&self.output_schema), columns, rows)
    }
}
