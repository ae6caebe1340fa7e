use arrow::{
    array::{new_null_array, Array, ArrayRef},
    compute::cast,
    datatypes::{Field, Schema, SchemaRef},
    record_batch::RecordBatch,
};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::{
    collections::HashSet,
    fs::File,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, warn};

use crate::error::Result;
use crate::process::write::{read_parquet_schema, ParquetSink};

/// Union of the columns of `schemas`, in first-seen order. A column's type
/// is the type it had in the first schema that carried it.
pub fn union_schema(schemas: &[SchemaRef]) -> SchemaRef {
    let mut fields: Vec<Field> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for schema in schemas {
        for field in schema.fields() {
            if seen.insert(field.name().clone()) {
                fields.push(field.as_ref().clone().with_nullable(true));
            }
        }
    }
    Arc::new(Schema::new(fields))
}

/// Align `batch` to `schema`: absent columns are filled with nulls and
/// present ones are cast to the schema's type.
pub fn align_to_schema(batch: &RecordBatch, schema: &SchemaRef) -> Result<RecordBatch> {
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let col = match batch.column_by_name(field.name()) {
            Some(col) if col.data_type() == field.data_type() => col.clone(),
            Some(col) => {
                warn!(
                    column = %field.name(),
                    from = ?col.data_type(),
                    to = ?field.data_type(),
                    "casting column to panel type"
                );
                cast(col, field.data_type())?
            }
            None => new_null_array(field.data_type(), batch.num_rows()),
        };
        columns.push(col);
    }
    Ok(RecordBatch::try_new(schema.clone(), columns)?)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcatSummary {
    pub rows: usize,
    pub columns: usize,
}

/// Stack Parquet files row-wise into `out` over the union of their columns.
///
/// The union schema comes from the file footers. Each input is then
/// streamed batch by batch into a single writer, so only one batch is held
/// in memory at a time. Rows are neither dropped nor deduplicated.
pub fn concat_parquet_files(inputs: &[PathBuf], out: &Path) -> Result<ConcatSummary> {
    let schemas = inputs
        .iter()
        .map(|p| read_parquet_schema(p))
        .collect::<Result<Vec<_>>>()?;
    let schema = union_schema(&schemas);

    let mut sink = ParquetSink::create(out, schema.clone())?;
    for path in inputs {
        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?.build()?;
        for batch in reader {
            sink.write(&align_to_schema(&batch?, &schema)?)?;
        }
        debug!(path = %path.display(), rows = sink.rows(), "appended");
    }

    let rows = sink.rows();
    sink.finish()?;
    Ok(ConcatSummary {
        rows,
        columns: schema.fields().len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::write::{read_parquet, write_parquet};
    use arrow::array::{AsArray, Float64Array, StringArray};
    use arrow::datatypes::{DataType, Float64Type};
    use tempfile::TempDir;

    fn year(ids: &[&str], ratio: (&str, Vec<Option<f64>>)) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("ID RSSD", DataType::Utf8, true),
            Field::new(ratio.0, DataType::Float64, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(ids.to_vec())),
                Arc::new(Float64Array::from(ratio.1)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn union_keeps_first_seen_order() {
        let a = year(&["1"], ("UBPRE001", vec![Some(1.0)]));
        let b = year(&["1"], ("UBPRE002", vec![Some(2.0)]));
        let schema = union_schema(&[a.schema(), b.schema(), a.schema()]);
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["ID RSSD", "UBPRE001", "UBPRE002"]);
        assert!(schema.fields().iter().all(|f| f.is_nullable()));
    }

    #[test]
    fn align_fills_gaps_and_casts() {
        let b = year(&["1", "2"], ("UBPRE002", vec![Some(2.0), None]));
        let schema = Arc::new(Schema::new(vec![
            Field::new("ID RSSD", DataType::Utf8, true),
            Field::new("UBPRE001", DataType::Float64, true),
            Field::new("UBPRE002", DataType::Utf8, true),
        ]));
        let aligned = align_to_schema(&b, &schema).unwrap();
        assert_eq!(aligned.column(1).null_count(), 2);
        assert_eq!(aligned.column(2).as_string::<i32>().value(0), "2");
    }

    #[test]
    fn files_stack_with_nulls_for_gaps() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let y2019 = dir.path().join("UBPR_2019.parquet");
        let y2020 = dir.path().join("UBPR_2020.parquet");
        write_parquet(&year(&["1", "2"], ("UBPRE001", vec![Some(1.0), Some(2.0)])), &y2019)?;
        write_parquet(&year(&["1"], ("UBPRE002", vec![Some(3.0)])), &y2020)?;

        let out = dir.path().join("panel.parquet");
        let summary = concat_parquet_files(&[y2019, y2020], &out)?;
        assert_eq!(summary, ConcatSummary { rows: 3, columns: 3 });

        let panel = read_parquet(&out)?;
        assert_eq!(panel.num_rows(), 3);
        let e1 = panel
            .column_by_name("UBPRE001")
            .unwrap()
            .as_primitive::<Float64Type>();
        assert!(e1.is_null(2));
        let e2 = panel
            .column_by_name("UBPRE002")
            .unwrap()
            .as_primitive::<Float64Type>();
        assert_eq!(e2.null_count(), 2);
        assert_eq!(e2.value(2), 3.0);
        Ok(())
    }
}
