use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Int32Array, Int64Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Int32Type, Int64Type, Schema, SchemaRef};
use dsbridge_column::{
    BufferAllocator, ColumnKind, NullColumnPool, TaskContext, TaskOutcome,
    materialize_partition_columns, synthesize_null_columns,
};
use dsbridge_reconcile::{
    FieldSource, PhysicalBatch, ReconcileOptions, Reconciler, assemble,
};
use dsbridge_result::Error;
use dsbridge_types::PartitionValue;

fn schema(fields: &[(&str, DataType)]) -> SchemaRef {
    Arc::new(Schema::new(
        fields
            .iter()
            .map(|(name, ty)| Field::new(*name, ty.clone(), true))
            .collect::<Vec<_>>(),
    ))
}

fn int_batch(data_schema: &SchemaRef, columns: &[&[i32]]) -> PhysicalBatch {
    let arrays: Vec<ArrayRef> = columns
        .iter()
        .map(|values| Arc::new(Int32Array::from(values.to_vec())) as ArrayRef)
        .collect();
    PhysicalBatch::new(RecordBatch::try_new(Arc::clone(data_schema), arrays).unwrap())
}

fn insensitive() -> ReconcileOptions {
    ReconcileOptions::case_sensitive(false)
}

#[test]
fn physical_column_plus_partition_constant() {
    dsbridge_test_utils::init_tracing_for_tests();
    let allocator = BufferAllocator::new();
    let ctx = TaskContext::new(1, Arc::clone(&allocator));

    let required = schema(&[("a", DataType::Int32), ("b", DataType::Utf8)]);
    let data = schema(&[("a", DataType::Int32)]);
    let partition = schema(&[("b", DataType::Utf8)]);
    let reconciler = Reconciler::try_new(
        Arc::clone(&data),
        Arc::clone(&required),
        Arc::clone(&partition),
        insensitive(),
    )
    .unwrap();
    assert_eq!(
        reconciler.plan(),
        &[FieldSource::Physical(0), FieldSource::Partition(0)]
    );

    let partitions =
        materialize_partition_columns(&ctx, 3, &partition, &[PartitionValue::from("X")]).unwrap();
    let out = reconciler
        .reconcile(&ctx, int_batch(&data, &[&[1, 2, 3]]), &NullColumnPool::empty(), &partitions)
        .unwrap();

    assert_eq!(out.num_rows(), 3);
    assert_eq!(out.num_columns(), 2);
    let batch = out.to_record_batch().unwrap();
    assert_eq!(batch.column(0).as_primitive::<Int32Type>().values().as_ref(), &[1, 2, 3]);
    let b = batch.column(1).as_string::<i32>();
    assert_eq!(b.iter().collect::<Vec<_>>(), vec![Some("X"); 3]);
    assert_eq!(out.column(1).unwrap().kind(), ColumnKind::Constant);

    drop(out);
    drop(partitions);
    ctx.complete(TaskOutcome::Succeeded);
    assert_eq!(allocator.outstanding_bytes(), 0);
}

#[test]
fn case_insensitive_duplicates_are_ambiguous() {
    let required = schema(&[("A", DataType::Int32)]);
    let data = schema(&[("a", DataType::Int32), ("A", DataType::Int32)]);
    let err = Reconciler::try_new(
        Arc::clone(&data),
        required,
        Arc::new(Schema::empty()),
        insensitive(),
    )
    .unwrap_err();
    match err {
        Error::AmbiguousFieldMatch { required, matched } => {
            assert_eq!(required, "A");
            assert_eq!(matched, vec!["a", "A"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn ambiguity_is_reported_for_fields_served_elsewhere() {
    // "P" resolves to a partition column, but the file holds both "p" and "P".
    let required = schema(&[("P", DataType::Int32)]);
    let data = schema(&[("p", DataType::Int32), ("P", DataType::Int32)]);
    let partition = schema(&[("P", DataType::Int32)]);
    let err = Reconciler::try_new(data, required, partition, insensitive()).unwrap_err();
    assert!(matches!(err, Error::AmbiguousFieldMatch { .. }));
}

#[test]
fn case_sensitive_picks_exact_name() {
    let allocator = BufferAllocator::new();
    let ctx = TaskContext::new(2, Arc::clone(&allocator));
    let required = schema(&[("A", DataType::Int32)]);
    let data = schema(&[("a", DataType::Int32), ("A", DataType::Int32)]);
    let reconciler = Reconciler::try_new(
        Arc::clone(&data),
        required,
        Arc::new(Schema::empty()),
        ReconcileOptions::case_sensitive(true),
    )
    .unwrap();

    let out = reconciler
        .reconcile(&ctx, int_batch(&data, &[&[1, 2], &[10, 20]]), &NullColumnPool::empty(), &[])
        .unwrap();
    let batch = out.to_record_batch().unwrap();
    assert_eq!(batch.column(0).as_primitive::<Int32Type>().values().as_ref(), &[10, 20]);
}

#[test]
fn identical_schemas_round_trip_values() {
    let allocator = BufferAllocator::new();
    let ctx = TaskContext::new(3, Arc::clone(&allocator));
    let data: SchemaRef = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, true),
    ]));
    let arrays: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(vec![7, 8, 9])),
        Arc::new(StringArray::from(vec![Some("x"), None, Some("z")])),
    ];
    let physical = RecordBatch::try_new(Arc::clone(&data), arrays).unwrap();

    let reconciler = Reconciler::try_new(
        Arc::clone(&data),
        Arc::clone(&data),
        Arc::new(Schema::empty()),
        ReconcileOptions::case_sensitive(true),
    )
    .unwrap();
    let out = reconciler
        .reconcile(&ctx, PhysicalBatch::new(physical.clone()), &NullColumnPool::empty(), &[])
        .unwrap();

    assert_eq!(out.to_record_batch().unwrap(), physical);
}

#[test]
fn output_follows_required_order_and_types() {
    let allocator = BufferAllocator::new();
    let ctx = TaskContext::new(4, Arc::clone(&allocator));
    let data = schema(&[
        ("x", DataType::Int32),
        ("unused", DataType::Int32),
        ("y", DataType::Int32),
    ]);
    let required = schema(&[("Y", DataType::Int64), ("X", DataType::Int32)]);
    let reconciler = Reconciler::try_new(
        Arc::clone(&data),
        Arc::clone(&required),
        Arc::new(Schema::empty()),
        insensitive(),
    )
    .unwrap();

    let out = reconciler
        .reconcile(
            &ctx,
            int_batch(&data, &[&[1, 2], &[0, 0], &[3, 4]]),
            &NullColumnPool::empty(),
            &[],
        )
        .unwrap();
    let batch = out.to_record_batch().unwrap();
    let names: Vec<_> = batch.schema().fields().iter().map(|f| f.name().clone()).collect();
    assert_eq!(names, vec!["Y", "X"]);
    assert_eq!(batch.column(0).data_type(), &DataType::Int64);
    assert_eq!(batch.column(0).as_primitive::<Int64Type>().values().as_ref(), &[3, 4]);
    assert_eq!(batch.column(1).as_primitive::<Int32Type>().values().as_ref(), &[1, 2]);
    // Only the selected columns stay reserved; the cast source and "unused" are gone.
    let held: usize = out.columns().iter().map(|c| c.reserved_bytes()).sum();
    assert_eq!(allocator.outstanding_bytes(), held);

    drop(out);
    assert_eq!(allocator.outstanding_bytes(), 0);
}

#[test]
fn pooled_columns_refresh_for_a_short_final_batch() {
    let allocator = BufferAllocator::new();
    let ctx = TaskContext::new(5, Arc::clone(&allocator));
    let data = schema(&[("a", DataType::Int32)]);
    let required = schema(&[("a", DataType::Int32), ("missing", DataType::Utf8)]);
    let partition = schema(&[("day", DataType::Int32)]);
    let reconciler = Reconciler::try_new(
        Arc::clone(&data),
        required,
        Arc::clone(&partition),
        insensitive(),
    )
    .unwrap();

    let missing = reconciler.missing_fields();
    assert_eq!(missing.fields().len(), 1);
    let pool = synthesize_null_columns(&ctx, 4, &missing).unwrap();
    let partitions =
        materialize_partition_columns(&ctx, 4, &partition, &[PartitionValue::Int(11)]).unwrap();

    let first = reconciler
        .reconcile(&ctx, int_batch(&data, &[&[1, 2, 3, 4]]), &pool, &partitions)
        .unwrap();
    assert_eq!(pool.get(0).unwrap().ref_count(), 3);

    let last = reconciler
        .reconcile(&ctx, int_batch(&data, &[&[5, 6]]), &pool, &partitions)
        .unwrap();
    assert_eq!(pool.get(0).unwrap().ref_count(), 4);
    assert_eq!(pool.get(0).unwrap().value_count(), 2);
    assert_eq!(partitions[0].value_count(), 2);

    let batch = last.to_record_batch().unwrap();
    assert_eq!(batch.num_rows(), 2);
    assert_eq!(batch.column(1).null_count(), 2);
    assert_eq!(batch.column(2).as_primitive::<Int32Type>().values().as_ref(), &[11, 11]);

    // Discarding a batch never frees a column another holder still references.
    drop(first);
    drop(last);
    assert_eq!(pool.get(0).unwrap().ref_count(), 2);
    assert!(pool.get(0).unwrap().array().is_ok());

    ctx.complete(TaskOutcome::Succeeded);
    drop(pool);
    drop(partitions);
    assert_eq!(allocator.outstanding_bytes(), 0);
}

#[test]
fn empty_null_pool_is_a_setup_error() {
    let ctx = TaskContext::new(6, BufferAllocator::new());
    let data = schema(&[("a", DataType::Int32)]);
    let required = schema(&[("a", DataType::Int32), ("gone", DataType::Int32)]);
    let reconciler =
        Reconciler::try_new(Arc::clone(&data), required, Arc::new(Schema::empty()), insensitive())
            .unwrap();

    let err = reconciler
        .reconcile(&ctx, int_batch(&data, &[&[1]]), &NullColumnPool::empty(), &[])
        .unwrap_err();
    assert!(matches!(&err, Error::MissingNullColumn(name) if name == "gone"));
    assert!(err.is_task_fatal());
    assert_eq!(ctx.allocator().outstanding_bytes(), 0);
}

#[test]
fn unnamed_partitions_are_appended_in_partition_order() {
    let ctx = TaskContext::new(7, BufferAllocator::new());
    let data = schema(&[("v", DataType::Int32)]);
    let required = schema(&[("DT", DataType::Utf8), ("v", DataType::Int32)]);
    let partition = schema(&[("region", DataType::Utf8), ("dt", DataType::Utf8)]);
    let reconciler = Reconciler::try_new(
        Arc::clone(&data),
        required,
        Arc::clone(&partition),
        insensitive(),
    )
    .unwrap();
    let names: Vec<_> = reconciler
        .output_schema()
        .fields()
        .iter()
        .map(|f| f.name().as_str())
        .collect();
    assert_eq!(names, vec!["DT", "v", "region"]);

    let partitions = materialize_partition_columns(
        &ctx,
        2,
        &partition,
        &[PartitionValue::from("eu"), PartitionValue::from("2024-01-01")],
    )
    .unwrap();
    let batch = reconciler
        .reconcile(&ctx, int_batch(&data, &[&[1, 2]]), &NullColumnPool::empty(), &partitions)
        .unwrap()
        .to_record_batch()
        .unwrap();
    assert_eq!(batch.column(0).as_string::<i32>().value(1), "2024-01-01");
    assert_eq!(batch.column(2).as_string::<i32>().value(0), "eu");
}

#[test]
fn partition_type_must_match_required_type() {
    let data = schema(&[("v", DataType::Int32)]);
    let required = schema(&[("dt", DataType::Int32)]);
    let partition = schema(&[("dt", DataType::Utf8)]);
    let err = Reconciler::try_new(data, required, partition, insensitive()).unwrap_err();
    assert!(matches!(err, Error::InvalidArgumentError(_)));
}

#[test]
fn passthrough_appends_partitions_after_data() {
    let allocator = BufferAllocator::new();
    let ctx = TaskContext::new(8, Arc::clone(&allocator));
    let data = schema(&[("a", DataType::Int32), ("b", DataType::Int32)]);
    let partition = schema(&[("p", DataType::Utf8)]);
    let partitions =
        materialize_partition_columns(&ctx, 8, &partition, &[PartitionValue::from("k")]).unwrap();

    let out = assemble(
        &ctx,
        int_batch(&data, &[&[1, 2, 3], &[4, 5, 6]]),
        &data,
        &partition,
        &partitions,
    )
    .unwrap();
    let batch = out.to_record_batch().unwrap();
    assert_eq!(batch.num_columns(), 3);
    assert_eq!(batch.schema().field(2).name(), "p");
    assert_eq!(batch.column(2).len(), 3);
    assert_eq!(partitions[0].value_count(), 3);

    let err = assemble(&ctx, int_batch(&data, &[&[1], &[2]]), &data, &partition, &[])
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgumentError(_)));

    drop(out);
    drop(partitions);
    ctx.complete(TaskOutcome::Succeeded);
    assert_eq!(allocator.outstanding_bytes(), 0);
}

#[test]
fn projection_retains_columns() {
    let ctx = TaskContext::new(9, BufferAllocator::new());
    let data = schema(&[("a", DataType::Int32), ("b", DataType::Int32)]);
    let out = assemble(
        &ctx,
        int_batch(&data, &[&[1], &[2]]),
        &data,
        &Schema::empty(),
        &[],
    )
    .unwrap();
    let projected = out.project(&[1]).unwrap();
    assert_eq!(projected.column(0).unwrap().ref_count(), 2);
    drop(out);
    assert_eq!(projected.column_by_name("b").unwrap().ref_count(), 1);
    assert!(out_of_range(&projected));
}

fn out_of_range(batch: &dsbridge_reconcile::OutputBatch) -> bool {
    batch.project(&[5]).is_err()
}

#[test]
fn narrowing_overflow_is_an_error_not_a_null() {
    let allocator = BufferAllocator::new();
    let ctx = TaskContext::new(10, Arc::clone(&allocator));
    let data = schema(&[("a", DataType::Int64)]);
    let required = schema(&[("a", DataType::Int32)]);
    let reconciler =
        Reconciler::try_new(Arc::clone(&data), required, Arc::new(Schema::empty()), insensitive())
            .unwrap();

    let arrays: Vec<ArrayRef> = vec![Arc::new(Int64Array::from(vec![1, 3_000_000_000]))];
    let physical = RecordBatch::try_new(Arc::clone(&data), arrays).unwrap();
    let err = reconciler
        .reconcile(&ctx, PhysicalBatch::new(physical), &NullColumnPool::empty(), &[])
        .unwrap_err();
    assert!(matches!(err, Error::Arrow(_)), "unexpected error: {err:?}");
    assert_eq!(allocator.outstanding_bytes(), 0);
}

#[test]
fn unparsable_string_is_an_error_not_a_null() {
    let allocator = BufferAllocator::new();
    let ctx = TaskContext::new(11, Arc::clone(&allocator));
    let data = schema(&[("a", DataType::Utf8)]);
    let required: SchemaRef = Arc::new(Schema::new(vec![Field::new("a", DataType::Int32, false)]));
    let reconciler =
        Reconciler::try_new(Arc::clone(&data), required, Arc::new(Schema::empty()), insensitive())
            .unwrap();

    let arrays: Vec<ArrayRef> = vec![Arc::new(StringArray::from(vec!["7", "abc"]))];
    let physical = RecordBatch::try_new(Arc::clone(&data), arrays).unwrap();
    let err = reconciler
        .reconcile(&ctx, PhysicalBatch::new(physical), &NullColumnPool::empty(), &[])
        .unwrap_err();
    assert!(matches!(err, Error::Arrow(_)), "unexpected error: {err:?}");

    // Well-formed strings still convert.
    let arrays: Vec<ArrayRef> = vec![Arc::new(StringArray::from(vec!["7", "-2"]))];
    let physical = RecordBatch::try_new(Arc::clone(&data), arrays).unwrap();
    let out = reconciler
        .reconcile(&ctx, PhysicalBatch::new(physical), &NullColumnPool::empty(), &[])
        .unwrap();
    let batch = out.to_record_batch().unwrap();
    assert_eq!(batch.column(0).as_primitive::<Int32Type>().values().as_ref(), &[7, -2]);
    drop(out);
    assert_eq!(allocator.outstanding_bytes(), 0);
}

#[test]
fn null_pool_serves_missing_fields_in_plan_order() {
    let allocator = BufferAllocator::new();
    let ctx = TaskContext::new(12, Arc::clone(&allocator));
    let data = schema(&[("a", DataType::Int32)]);
    let required = schema(&[
        ("x", DataType::Utf8),
        ("a", DataType::Int32),
        ("y", DataType::Float64),
    ]);
    let reconciler =
        Reconciler::try_new(Arc::clone(&data), required, Arc::new(Schema::empty()), insensitive())
            .unwrap();
    let pool = synthesize_null_columns(&ctx, 4, &reconciler.missing_fields()).unwrap();

    for rows in [&[1, 2, 3, 4][..], &[5][..]] {
        let batch = reconciler
            .reconcile(&ctx, int_batch(&data, &[rows]), &pool, &[])
            .unwrap()
            .to_record_batch()
            .unwrap();
        assert_eq!(batch.column(0).data_type(), &DataType::Utf8);
        assert_eq!(batch.column(2).data_type(), &DataType::Float64);
        assert_eq!(batch.column(0).null_count(), rows.len());
        assert_eq!(batch.column(2).null_count(), rows.len());
    }

    // A pool built for some other set of fields does not line up.
    let stray = synthesize_null_columns(&ctx, 4, &schema(&[("z", DataType::Utf8)])).unwrap();
    let err = reconciler
        .reconcile(&ctx, int_batch(&data, &[&[1]]), &stray, &[])
        .unwrap_err();
    assert!(matches!(&err, Error::MissingNullColumn(name) if name == "x"));

    ctx.complete(TaskOutcome::Succeeded);
    drop(pool);
    drop(stray);
    assert_eq!(allocator.outstanding_bytes(), 0);
}
