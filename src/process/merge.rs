//! Column-aligned merge of the tables read from one year's archive.

use arrow::{
    array::{Array, ArrayRef, AsArray, StringArray, UInt32Array},
    compute::{cast, take},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tracing::{debug, warn};

use crate::error::Result;
use crate::process::utils;

/// Columns a table contributes to the merge.
///
/// Keeps the table's column order, drops repeated names within the table,
/// always keeps the key columns, and keeps any other column whose name has
/// not been claimed by an earlier table.
pub fn columns_to_keep(
    claimed: &HashSet<String>,
    keys: &[&str],
    columns: &[String],
) -> Vec<String> {
    let mut seen_here: HashSet<&str> = HashSet::new();
    columns
        .iter()
        .filter(|c| seen_here.insert(c.as_str()))
        .filter(|c| keys.contains(&c.as_str()) || !claimed.contains(c.as_str()))
        .cloned()
        .collect()
}

/// Project `batch` onto `names`, taking the first column for each name.
pub fn select_columns(batch: &RecordBatch, names: &[String]) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut indices = Vec::with_capacity(names.len());
    for name in names {
        indices.push(schema.index_of(name)?);
    }
    Ok(batch.project(&indices)?)
}

/// Merge the per-file tables of one year.
///
/// Tables are claimed in order with [`columns_to_keep`] and then folded with
/// [`outer_join`] on `keys`. Tables without every key column cannot be joined
/// and are skipped. Returns `None` when nothing is left to merge.
pub fn merge_year_tables(
    tables: Vec<(String, RecordBatch)>,
    keys: &[&str],
) -> Result<Option<RecordBatch>> {
    let mut claimed: HashSet<String> = HashSet::new();
    let mut merged: Option<RecordBatch> = None;

    for (name, table) in tables {
        let columns: Vec<String> = table
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        let missing_key = keys
            .iter()
            .find(|k| !columns.iter().any(|c| c.as_str() == **k));
        if let Some(missing) = missing_key {
            warn!(file = %name, key = %missing, "skipping table without key column");
            continue;
        }

        let keep = columns_to_keep(&claimed, keys, &columns);
        debug!(file = %name, kept = keep.len(), of = columns.len(), "claimed columns");
        claimed.extend(keep.iter().cloned());
        let table = select_columns(&table, &keep)?;

        merged = Some(match merged {
            None => table,
            Some(left) => outer_join(&left, &table, keys)?,
        });
    }

    Ok(merged)
}

/// One part of a join key. Whole numbers compare by value, so `" 37"`,
/// `"037"` and `"37.0"` are the same key and `9` sorts before `10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum KeyPart<'a> {
    Int(i64),
    Text(&'a str),
}

type KeyTuple<'a> = Vec<Option<KeyPart<'a>>>;

fn key_columns(batch: &RecordBatch, keys: &[&str]) -> Result<Vec<StringArray>> {
    let schema = batch.schema();
    let mut out = Vec::with_capacity(keys.len());
    for key in keys {
        let col = batch.column(schema.index_of(key)?);
        let utf8 = cast(col, &DataType::Utf8)?;
        out.push(utf8.as_string::<i32>().clone());
    }
    Ok(out)
}

fn key_part(raw: &str) -> KeyPart<'_> {
    match utils::parse_integer(raw) {
        Some(v) => KeyPart::Int(v),
        None => KeyPart::Text(raw),
    }
}

fn key_at<'a>(cols: &'a [StringArray], row: usize) -> KeyTuple<'a> {
    cols.iter()
        .map(|c| (!c.is_null(row)).then(|| key_part(c.value(row))))
        .collect()
}

fn key_value(col: &StringArray, row: u32) -> Option<&str> {
    let row = row as usize;
    col.is_valid(row).then(|| col.value(row))
}

/// Missing key parts sort after present ones.
fn compare_keys(a: &KeyTuple<'_>, b: &KeyTuple<'_>) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        let ord = match (x, y) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Full outer join of `left` and `right` on `keys`.
///
/// Every row of either side survives; cells with no match on the other side
/// are null. Missing key values match each other. Duplicate keys yield every
/// matching pair. Output columns are `left`'s columns followed by `right`'s
/// non-key columns. Rows are ordered by key, numerically for whole-number
/// parts and by text otherwise (stable for equal keys).
pub fn outer_join(left: &RecordBatch, right: &RecordBatch, keys: &[&str]) -> Result<RecordBatch> {
    let left_keys = key_columns(left, keys)?;
    let right_keys = key_columns(right, keys)?;

    let mut right_index: HashMap<KeyTuple<'_>, Vec<u32>> = HashMap::new();
    for row in 0..right.num_rows() {
        right_index
            .entry(key_at(&right_keys, row))
            .or_default()
            .push(row as u32);
    }

    let mut pairs: Vec<(Option<u32>, Option<u32>)> = Vec::with_capacity(left.num_rows());
    let mut right_matched = vec![false; right.num_rows()];
    for row in 0..left.num_rows() {
        match right_index.get(&key_at(&left_keys, row)) {
            Some(matches) => {
                for &r in matches {
                    right_matched[r as usize] = true;
                    pairs.push((Some(row as u32), Some(r)));
                }
            }
            None => pairs.push((Some(row as u32), None)),
        }
    }
    for (r, matched) in right_matched.iter().enumerate() {
        if !matched {
            pairs.push((None, Some(r as u32)));
        }
    }

    let mut keyed: Vec<(KeyTuple<'_>, (Option<u32>, Option<u32>))> = pairs
        .into_iter()
        .map(|(l, r)| {
            let key = match (l, r) {
                (Some(l), _) => key_at(&left_keys, l as usize),
                (None, Some(r)) => key_at(&right_keys, r as usize),
                (None, None) => Vec::new(),
            };
            (key, (l, r))
        })
        .collect();
    keyed.sort_by(|a, b| compare_keys(&a.0, &b.0));
    let pairs: Vec<(Option<u32>, Option<u32>)> = keyed.into_iter().map(|(_, p)| p).collect();

    let left_take: UInt32Array = pairs.iter().map(|(l, _)| *l).collect();
    let right_take: UInt32Array = pairs.iter().map(|(_, r)| *r).collect();

    let mut fields: Vec<Field> = Vec::new();
    let mut columns: Vec<ArrayRef> = Vec::new();

    let left_schema = left.schema();
    for (idx, field) in left_schema.fields().iter().enumerate() {
        if let Some(k) = keys.iter().position(|k| *k == field.name().as_str()) {
            let coalesced: StringArray = pairs
                .iter()
                .map(|pair| match *pair {
                    (Some(l), _) => key_value(&left_keys[k], l),
                    (None, Some(r)) => key_value(&right_keys[k], r),
                    (None, None) => None,
                })
                .collect();
            fields.push(Field::new(field.name(), DataType::Utf8, true));
            columns.push(Arc::new(coalesced));
        } else {
            fields.push(field.as_ref().clone().with_nullable(true));
            columns.push(take(left.column(idx), &left_take, None)?);
        }
    }

    let right_schema = right.schema();
    for (idx, field) in right_schema.fields().iter().enumerate() {
        if keys.contains(&field.name().as_str()) {
            continue;
        }
        fields.push(field.as_ref().clone().with_nullable(true));
        columns.push(take(right.column(idx), &right_take, None)?);
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: [&str; 2] = ["ID RSSD", "Reporting Period"];

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    fn table(cols: &[(&str, Vec<Option<&str>>)]) -> RecordBatch {
        let fields: Vec<Field> = cols
            .iter()
            .map(|(n, _)| Field::new(*n, DataType::Utf8, true))
            .collect();
        let arrays: Vec<ArrayRef> = cols
            .iter()
            .map(|(_, v)| Arc::new(StringArray::from(v.clone())) as ArrayRef)
            .collect();
        RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).unwrap()
    }

    fn strings(batch: &RecordBatch, name: &str) -> Vec<Option<String>> {
        batch
            .column_by_name(name)
            .unwrap()
            .as_string::<i32>()
            .iter()
            .map(|v| v.map(str::to_string))
            .collect()
    }

    #[test]
    fn policy_keeps_keys_and_unclaimed_columns() {
        let claimed: HashSet<String> = ["ID RSSD", "Reporting Period", "UBPRD486"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let cols = names(&["ID RSSD", "UBPRD486", "Reporting Period", "UBPR7402"]);
        assert_eq!(
            columns_to_keep(&claimed, &KEYS, &cols),
            names(&["ID RSSD", "Reporting Period", "UBPR7402"])
        );
    }

    #[test]
    fn policy_drops_repeated_names_within_a_table() {
        let claimed = HashSet::new();
        let cols = names(&["ID RSSD", "Reporting Period", "UBPRE001", "UBPRE001", "ID RSSD"]);
        assert_eq!(
            columns_to_keep(&claimed, &KEYS, &cols),
            names(&["ID RSSD", "Reporting Period", "UBPRE001"])
        );
    }

    #[test]
    fn policy_on_first_table_keeps_everything() {
        let cols = names(&["Reporting Period", "UBPRE002", "ID RSSD"]);
        assert_eq!(columns_to_keep(&HashSet::new(), &KEYS, &cols), cols);
    }

    #[test]
    fn disjoint_keys_outer_join_keeps_all_rows() {
        let file1 = table(&[
            ("ID RSSD", vec![Some("1"), Some("2")]),
            ("Reporting Period", vec![Some("12/31/2019"), Some("12/31/2019")]),
            ("UBPRD486", vec![Some("0.5"), Some("0.7")]),
        ]);
        let file2 = table(&[
            ("ID RSSD", vec![Some("3"), Some("4")]),
            ("Reporting Period", vec![Some("12/31/2019"), Some("12/31/2019")]),
            ("UBPR7402", vec![Some("9"), Some("8")]),
        ]);

        let merged = merge_year_tables(
            vec![("file1.txt".into(), file1), ("file2.txt".into(), file2)],
            &KEYS,
        )
        .unwrap()
        .unwrap();

        assert_eq!(merged.num_rows(), 4);
        assert_eq!(
            strings(&merged, "ID RSSD"),
            vec![Some("1".into()), Some("2".into()), Some("3".into()), Some("4".into())]
        );
        assert_eq!(
            strings(&merged, "UBPRD486"),
            vec![Some("0.5".into()), Some("0.7".into()), None, None]
        );
        assert_eq!(
            strings(&merged, "UBPR7402"),
            vec![None, None, Some("9".into()), Some("8".into())]
        );
    }

    #[test]
    fn overlapping_keys_combine_into_one_row() {
        let left = table(&[
            ("ID RSSD", vec![Some("2"), Some("1")]),
            ("Reporting Period", vec![Some("2019"), Some("2019")]),
            ("A", vec![Some("a2"), Some("a1")]),
        ]);
        let right = table(&[
            ("ID RSSD", vec![Some("1"), Some("5")]),
            ("Reporting Period", vec![Some("2019"), Some("2019")]),
            ("B", vec![Some("b1"), Some("b5")]),
        ]);

        let joined = outer_join(&left, &right, &KEYS).unwrap();
        assert_eq!(joined.num_rows(), 3);
        assert_eq!(
            strings(&joined, "ID RSSD"),
            vec![Some("1".into()), Some("2".into()), Some("5".into())]
        );
        assert_eq!(
            strings(&joined, "A"),
            vec![Some("a1".into()), Some("a2".into()), None]
        );
        assert_eq!(
            strings(&joined, "B"),
            vec![Some("b1".into()), None, Some("b5".into())]
        );
    }

    #[test]
    fn duplicate_keys_produce_every_pair() {
        let left = table(&[
            ("ID RSSD", vec![Some("1"), Some("1")]),
            ("Reporting Period", vec![Some("p"), Some("p")]),
            ("A", vec![Some("x"), Some("y")]),
        ]);
        let right = table(&[
            ("ID RSSD", vec![Some("1"), Some("1")]),
            ("Reporting Period", vec![Some("p"), Some("p")]),
            ("B", vec![Some("u"), Some("v")]),
        ]);
        assert_eq!(outer_join(&left, &right, &KEYS).unwrap().num_rows(), 4);
    }

    #[test]
    fn claimed_column_from_later_file_is_dropped() {
        let first = table(&[
            ("ID RSSD", vec![Some("1")]),
            ("Reporting Period", vec![Some("p")]),
            ("UBPRE001", vec![Some("1.0")]),
        ]);
        let second = table(&[
            ("ID RSSD", vec![Some("1")]),
            ("Reporting Period", vec![Some("p")]),
            ("UBPRE001", vec![Some("2.0")]),
            ("UBPRE002", vec![Some("3.0")]),
        ]);
        let merged = merge_year_tables(
            vec![("a.txt".into(), first), ("b.txt".into(), second)],
            &KEYS,
        )
        .unwrap()
        .unwrap();

        let cols: Vec<String> = merged
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(cols, names(&["ID RSSD", "Reporting Period", "UBPRE001", "UBPRE002"]));
        assert_eq!(strings(&merged, "UBPRE001"), vec![Some("1.0".into())]);
    }

    #[test]
    fn table_without_keys_is_skipped() {
        let good = table(&[
            ("ID RSSD", vec![Some("1")]),
            ("Reporting Period", vec![Some("p")]),
        ]);
        let bad = table(&[("UBPRE001", vec![Some("1.0")])]);
        let merged = merge_year_tables(
            vec![("bad.txt".into(), bad), ("good.txt".into(), good)],
            &KEYS,
        )
        .unwrap()
        .unwrap();
        assert_eq!(merged.num_columns(), 2);
        assert!(merge_year_tables(Vec::new(), &KEYS).unwrap().is_none());
    }

    #[test]
    fn rows_are_ordered_by_numeric_id() {
        let left = table(&[
            ("ID RSSD", vec![Some("10"), Some("100")]),
            ("Reporting Period", vec![Some("p"), Some("p")]),
            ("A", vec![Some("a10"), Some("a100")]),
        ]);
        let right = table(&[
            ("ID RSSD", vec![Some("9"), Some("10")]),
            ("Reporting Period", vec![Some("p"), Some("p")]),
            ("B", vec![Some("b9"), Some("b10")]),
        ]);
        let joined = outer_join(&left, &right, &KEYS).unwrap();
        assert_eq!(
            strings(&joined, "ID RSSD"),
            vec![Some("9".into()), Some("10".into()), Some("100".into())]
        );
        assert_eq!(
            strings(&joined, "B"),
            vec![Some("b9".into()), Some("b10".into()), None]
        );
    }

    #[test]
    fn padded_ids_match_their_plain_form() {
        let left = table(&[
            ("ID RSSD", vec![Some(" 37"), Some("037")]),
            ("Reporting Period", vec![Some("p"), Some("q")]),
            ("A", vec![Some("a"), Some("aq")]),
        ]);
        let right = table(&[
            ("ID RSSD", vec![Some("37"), Some("37.0")]),
            ("Reporting Period", vec![Some("p"), Some("q")]),
            ("B", vec![Some("b"), Some("bq")]),
        ]);
        let joined = outer_join(&left, &right, &KEYS).unwrap();
        assert_eq!(joined.num_rows(), 2);
        assert_eq!(
            strings(&joined, "B"),
            vec![Some("b".into()), Some("bq".into())]
        );
        assert_eq!(
            strings(&joined, "A"),
            vec![Some("a".into()), Some("aq".into())]
        );
    }

    #[test]
    fn missing_keys_sort_last_and_match_each_other() {
        let left = table(&[
            ("ID RSSD", vec![None, Some("2")]),
            ("Reporting Period", vec![Some("p"), Some("p")]),
            ("A", vec![Some("a-none"), Some("a2")]),
        ]);
        let right = table(&[
            ("ID RSSD", vec![None]),
            ("Reporting Period", vec![Some("p")]),
            ("B", vec![Some("b-none")]),
        ]);
        let joined = outer_join(&left, &right, &KEYS).unwrap();
        assert_eq!(strings(&joined, "ID RSSD"), vec![Some("2".into()), None]);
        assert_eq!(
            strings(&joined, "B"),
            vec![None, Some("b-none".into())]
        );
    }
}
