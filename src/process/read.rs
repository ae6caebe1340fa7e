use arrow::{
    compute::concat_batches,
    csv::{reader::Format, ReaderBuilder},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use regex::Regex;
use std::{collections::HashSet, io::Cursor, sync::Arc};
use tracing::trace;

use crate::archive::TextEncoding;
use crate::error::{EtlError, Result};

const BATCH_SIZE: usize = 64 * 1024;

/// Tokens treated as missing in every read (the usual dataframe defaults).
pub const DEFAULT_NULL_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Extra tokens UBPR files use for missing values, on top of the defaults.
pub const UBPR_NULL_TOKENS: &[&str] = &[".", "NA", "", " "];

/// Which header columns to load.
#[derive(Debug, Clone, Copy)]
pub enum ColumnSelection<'a> {
    /// Every name must be present, otherwise the read fails with `MissingColumns`.
    Required(&'a [&'a str]),
    /// Load whichever of these names are present; ignore the rest.
    AllowList(&'a [&'a str]),
}

impl ColumnSelection<'_> {
    fn names(&self) -> &[&str] {
        match self {
            ColumnSelection::Required(n) | ColumnSelection::AllowList(n) => n,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DelimitedReadOptions {
    pub delimiter: u8,
    pub encoding: TextEncoding,
    null_regex: Regex,
}

impl DelimitedReadOptions {
    pub fn new(delimiter: u8, encoding: TextEncoding, null_tokens: &[&str]) -> Result<Self> {
        let alternatives: Vec<String> = null_tokens.iter().map(|t| regex::escape(t)).collect();
        let null_regex = Regex::new(&format!("^(?:{})$", alternatives.join("|")))?;
        Ok(Self {
            delimiter,
            encoding,
            null_regex,
        })
    }

    /// Tab-delimited call report files.
    pub fn call_report() -> Result<Self> {
        Self::new(b'\t', TextEncoding::Latin1, DEFAULT_NULL_TOKENS)
    }

    /// Tab-delimited UBPR files.
    pub fn ubpr() -> Result<Self> {
        let tokens: Vec<&str> = DEFAULT_NULL_TOKENS
            .iter()
            .chain(UBPR_NULL_TOKENS)
            .copied()
            .collect();
        Self::new(b'\t', TextEncoding::Windows1252, &tokens)
    }
}

/// Read delimited text into a single batch of `Utf8` columns.
///
/// Only the selected columns are parsed. Columns keep the file's order, and
/// a name repeated in the header is loaded from its first occurrence.
pub fn read_delimited(
    bytes: &[u8],
    selection: ColumnSelection<'_>,
    opts: &DelimitedReadOptions,
) -> Result<RecordBatch> {
    let text = opts.encoding.decode(bytes);
    let header = read_header(&text, opts.delimiter)?;

    let wanted: HashSet<&str> = selection.names().iter().copied().collect();
    let mut taken: HashSet<&str> = HashSet::new();
    let mut projection = Vec::new();
    for (idx, name) in header.iter().enumerate() {
        let name = name.as_str();
        if wanted.contains(name) && taken.insert(name) {
            projection.push(idx);
        }
    }

    if let ColumnSelection::Required(names) = selection {
        let missing: Vec<String> = names
            .iter()
            .filter(|n| !taken.contains(*n))
            .map(|n| n.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(EtlError::MissingColumns { missing });
        }
    }

    let schema = Arc::new(Schema::new(
        header
            .iter()
            .map(|n| Field::new(n, DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ));
    let projected = Arc::new(schema.project(&projection)?);

    let reader = ReaderBuilder::new(schema)
        .with_header(true)
        .with_delimiter(opts.delimiter)
        .with_batch_size(BATCH_SIZE)
        .with_truncated_rows(true)
        .with_null_regex(opts.null_regex.clone())
        .with_projection(projection)
        .build(Cursor::new(text.as_bytes()))?;

    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    let batch = concat_batches(&projected, &batches)?;
    trace!(
        rows = batch.num_rows(),
        columns = batch.num_columns(),
        "read delimited text"
    );
    Ok(batch)
}

fn read_header(text: &str, delimiter: u8) -> Result<Vec<String>> {
    if text.trim().is_empty() {
        return Err(EtlError::NoHeader);
    }
    let (schema, _) = Format::default()
        .with_header(true)
        .with_delimiter(delimiter)
        .infer_schema(Cursor::new(text.as_bytes()), Some(0))?;
    let names: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
    if names.is_empty() {
        return Err(EtlError::NoHeader);
    }
    Ok(names)
}
