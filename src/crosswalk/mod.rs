//! RSSD ↔ CERT crosswalk built from call report bulk archives.
//!
//! Every identifier pair found in any member file is kept once. Pairs that
//! break the one-to-one mapping are reported, never filtered out.

use arrow::{
    array::{ArrayRef, AsArray, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use serde::Serialize;
use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    fs::{self, File},
    io::BufWriter,
    path::Path,
    sync::Arc,
};
use tracing::{info, instrument, warn};

use crate::archive::{list_zip_archives, MemberArchive};
use crate::config::CrosswalkOptions;
use crate::error::{EtlError, Result};
use crate::process::{
    read_delimited, write_csv, write_parquet, ColumnSelection, DelimitedReadOptions,
};

/// Source column holding the Federal Reserve identifier.
pub const SOURCE_RSSD: &str = "IDRSSD";
/// Source column holding the FDIC certificate number.
pub const SOURCE_CERT: &str = "FDIC Certificate Number";

pub const ID_RSSD: &str = "ID_RSSD";
pub const CERT: &str = "CERT";

/// Rows shown in the post-run preview.
const PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct IdentifierRecord {
    pub id_rssd: String,
    pub cert: String,
}

/// Deduplicated identifier pairs, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Crosswalk {
    records: Vec<IdentifierRecord>,
}

impl Crosswalk {
    /// Keep the first occurrence of every pair.
    pub fn from_records(records: impl IntoIterator<Item = IdentifierRecord>) -> Self {
        let mut seen = HashSet::new();
        let records = records
            .into_iter()
            .filter(|r| seen.insert(r.clone()))
            .collect();
        Self { records }
    }

    pub fn records(&self) -> &[IdentifierRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Two `Utf8` columns, `ID_RSSD` and `CERT`.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let schema = Arc::new(Schema::new(vec![
            Field::new(ID_RSSD, DataType::Utf8, false),
            Field::new(CERT, DataType::Utf8, false),
        ]));
        let rssd: StringArray = self.records.iter().map(|r| Some(r.id_rssd.as_str())).collect();
        let cert: StringArray = self.records.iter().map(|r| Some(r.cert.as_str())).collect();
        Ok(RecordBatch::try_new(
            schema,
            vec![Arc::new(rssd) as ArrayRef, Arc::new(cert) as ArrayRef],
        )?)
    }
}

/// Identifiers mapped to more than one distinct counterpart, with the
/// number of distinct counterparts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConflictReport {
    pub rssd_conflicts: BTreeMap<String, usize>,
    pub cert_conflicts: BTreeMap<String, usize>,
}

impl ConflictReport {
    pub fn is_empty(&self) -> bool {
        self.rssd_conflicts.is_empty() && self.cert_conflicts.is_empty()
    }

    /// Names of the non-empty conflict groups.
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds = Vec::new();
        if !self.rssd_conflicts.is_empty() {
            kinds.push("rssd_conflicts");
        }
        if !self.cert_conflicts.is_empty() {
            kinds.push("cert_conflicts");
        }
        kinds
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

/// Group by each side and count distinct values of the other side.
pub fn detect_conflicts(records: &[IdentifierRecord]) -> ConflictReport {
    let mut by_rssd: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut by_cert: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for r in records {
        by_rssd.entry(&r.id_rssd).or_default().insert(&r.cert);
        by_cert.entry(&r.cert).or_default().insert(&r.id_rssd);
    }

    ConflictReport {
        rssd_conflicts: multi_valued(by_rssd),
        cert_conflicts: multi_valued(by_cert),
    }
}

fn multi_valued(groups: BTreeMap<&str, BTreeSet<&str>>) -> BTreeMap<String, usize> {
    groups
        .into_iter()
        .filter(|(_, others)| others.len() > 1)
        .map(|(k, others)| (k.to_string(), others.len()))
        .collect()
}

/// Identifier pairs of one member file, complete rows only, deduplicated.
fn identifier_records(batch: &RecordBatch) -> Result<Vec<IdentifierRecord>> {
    let schema = batch.schema();
    let rssd = batch.column(schema.index_of(SOURCE_RSSD)?).as_string::<i32>();
    let cert = batch.column(schema.index_of(SOURCE_CERT)?).as_string::<i32>();

    let pairs = rssd.iter().zip(cert.iter()).filter_map(|pair| match pair {
        (Some(r), Some(c)) => Some(IdentifierRecord {
            id_rssd: r.to_string(),
            cert: c.to_string(),
        }),
        _ => None,
    });
    Ok(Crosswalk::from_records(pairs).records)
}

/// Build the crosswalk from every call report archive in `opts.zip_folder`.
///
/// Member files without both identifier columns are skipped. Fails with
/// [`EtlError::EmptyInput`] when no file yields a table, in which case
/// nothing is written.
#[instrument(level = "info", skip(opts), fields(dir = %opts.zip_folder.display()))]
pub fn build_rssd_cert_crosswalk(opts: &CrosswalkOptions) -> Result<(Crosswalk, ConflictReport)> {
    let read_opts = DelimitedReadOptions::call_report()?;
    let columns = [SOURCE_RSSD, SOURCE_CERT];

    let mut usable_files = 0usize;
    let mut all = Vec::new();
    for zip_path in list_zip_archives(&opts.zip_folder)? {
        info!("processing {}", zip_path.display());
        let mut archive = MemberArchive::open(&zip_path)?;
        for name in archive.eligible_members()? {
            let bytes = archive.read_member(&name)?;
            match read_delimited(&bytes, ColumnSelection::Required(&columns), &read_opts) {
                Ok(batch) => {
                    let records = identifier_records(&batch)?;
                    info!(file = %name, rows = records.len(), "read identifiers");
                    usable_files += 1;
                    all.extend(records);
                }
                Err(EtlError::MissingColumns { .. }) | Err(EtlError::NoHeader) => {
                    warn!(file = %name, "skipping: missing {} or {}", SOURCE_RSSD, SOURCE_CERT);
                }
                Err(e) => return Err(e),
            }
        }
    }

    if usable_files == 0 {
        return Err(EtlError::EmptyInput {
            dir: opts.zip_folder.clone(),
        });
    }

    let crosswalk = Crosswalk::from_records(all);
    let conflicts = detect_conflicts(crosswalk.records());

    let batch = crosswalk.to_record_batch()?;
    write_csv(&batch, &opts.out_csv)?;
    info!(
        path = %opts.out_csv.display(),
        rows = crosswalk.len(),
        "final crosswalk saved"
    );
    if let Some(parquet_path) = &opts.out_parquet {
        write_parquet(&batch, parquet_path)?;
        info!(path = %parquet_path.display(), "also saved parquet");
    }
    if let Some(json_path) = &opts.conflicts_json {
        conflicts.write_json(json_path)?;
        info!(path = %json_path.display(), "saved conflict report");
    }

    log_summary(&crosswalk, &conflicts);
    Ok((crosswalk, conflicts))
}

fn log_summary(crosswalk: &Crosswalk, conflicts: &ConflictReport) {
    if conflicts.is_empty() {
        info!("no consistency issues found, mapping is one-to-one");
    } else {
        warn!(
            rssd_conflicts = conflicts.rssd_conflicts.len(),
            cert_conflicts = conflicts.cert_conflicts.len(),
            kinds = ?conflicts.kinds(),
            "consistency issues detected"
        );
    }
    for r in crosswalk.records().iter().take(PREVIEW_ROWS) {
        info!(id_rssd = %r.id_rssd, cert = %r.cert, "sample");
    }
}
