use crate::error::Result;
use crate::process::utils;
use arrow::{
    array::{Array, ArrayRef, AsArray, Float64Builder, StringBuilder},
    compute::cast,
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Final column types of a merged UBPR table.
///
/// - `id_key`: integer identifier rendered as a string (`"480228.0"` → `"480228"`).
/// - `period_key`: string.
/// - everything else: `Float64`, unparseable values become null.
pub fn normalize_panel_types(
    batch: &RecordBatch,
    id_key: &str,
    period_key: &str,
) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(batch.num_columns());
    let mut out = Vec::with_capacity(batch.num_columns());

    for (arr, fld) in batch.columns().iter().zip(batch.schema().fields()) {
        let name = fld.name().as_str();
        let col = if name == id_key {
            fields.push(Field::new(name, DataType::Utf8, true));
            integer_strings(arr, name)?
        } else if name == period_key {
            fields.push(Field::new(name, DataType::Utf8, true));
            cast(arr, &DataType::Utf8)?
        } else {
            fields.push(Field::new(name, DataType::Float64, true));
            to_float64(arr)?
        };
        out.push(col);
    }

    let schema = Arc::new(Schema::new(fields));
    RecordBatch::try_new(schema, out).map_err(Into::into)
}

fn integer_strings(arr: &ArrayRef, name: &str) -> Result<ArrayRef> {
    let utf8 = cast(arr, &DataType::Utf8)?;
    let sarr = utf8.as_string::<i32>();

    let mut b = StringBuilder::with_capacity(sarr.len(), sarr.value_data().len());
    let mut rejected = 0usize;
    for opt in sarr.iter() {
        let v = opt.and_then(utils::integer_string);
        if opt.is_some() && v.is_none() {
            rejected += 1;
        }
        b.append_option(v);
    }
    if rejected > 0 {
        warn!(column = %name, rejected, "non-integer identifiers replaced with null");
    }
    Ok(Arc::new(b.finish()))
}

fn to_float64(arr: &ArrayRef) -> Result<ArrayRef> {
    match arr.data_type() {
        DataType::Float64 => Ok(arr.clone()),
        DataType::Utf8 => {
            let sarr = arr.as_string::<i32>();
            let mut b = Float64Builder::with_capacity(sarr.len());
            for opt in sarr.iter() {
                b.append_option(opt.and_then(utils::parse_f64));
            }
            let col = b.finish();
            let coerced = col.null_count() - sarr.null_count();
            if coerced > 0 {
                debug!(coerced, "unparseable values coerced to null");
            }
            Ok(Arc::new(col))
        }
        // Integers, nulls and other numerics cast directly.
        _ => Ok(cast(arr, &DataType::Float64)?),
    }
}
