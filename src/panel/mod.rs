//! Multi-year UBPR panel built from one archive per year.
//!
//! Each year's member files are merged on `(ID RSSD, Reporting Period)`,
//! normalized and written to `UBPR_<year>.parquet`. The yearly files are
//! then streamed back from disk into the panel file, so at most one year's
//! table is in memory at any point.

use arrow::record_batch::RecordBatch;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use crate::archive::{list_zip_archives, year_label, MemberArchive};
use crate::config::PanelOptions;
use crate::error::{EtlError, Result};
use crate::process::{
    concat_parquet_files, merge_year_tables, normalize_panel_types, read_delimited,
    write_parquet, ColumnSelection, ConcatSummary, DelimitedReadOptions,
};

pub const ID_RSSD: &str = "ID RSSD";
pub const REPORTING_PERIOD: &str = "Reporting Period";
pub const KEY_COLUMNS: [&str; 2] = [ID_RSSD, REPORTING_PERIOD];

/// Financial-ratio variables kept from the UBPR files.
pub const UBPR_VARIABLES: [&str; 32] = [
    "UBPRD486", "UBPRD488", "UBPR7402", "UBPRNC98", "UBPR7408", "UBPRE022", "UBPRE021", "UBPRE395",
    "UBPRE544", "UBPR7414", "UBPRE549", "UBPRE019", "UBPRE020", "UBPRE001", "UBPRE002", "UBPRE003",
    "UBPRE004", "UBPRE005", "UBPRPG69", "UBPRE006", "UBPRKW07", "UBPRE007", "UBPRE009", "UBPRE010",
    "UBPRE013", "UBPRK447", "UBPRE014", "UBPRE015", "UBPRE029", "UBPR7316", "UBPRE027", "UBPRE028",
];

/// Key columns followed by the ratio variables; nothing else is loaded.
pub fn allowed_columns() -> Vec<&'static str> {
    KEY_COLUMNS.iter().chain(UBPR_VARIABLES.iter()).copied().collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearOutput {
    pub year: String,
    pub path: PathBuf,
    pub rows: usize,
    pub columns: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelSummary {
    pub years: Vec<YearOutput>,
    pub panel_path: PathBuf,
    pub rows: usize,
    pub columns: usize,
}

/// Read every eligible member of one yearly archive. Files that fail to read
/// are logged and left out.
fn read_year_tables(
    archive: &mut MemberArchive,
    read_opts: &DelimitedReadOptions,
    allowed: &[&str],
) -> Result<Vec<(String, RecordBatch)>> {
    let zip_name = archive
        .path()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut tables = Vec::new();
    for name in archive.eligible_members()? {
        let read = archive.read_member(&name).and_then(|bytes| {
            read_delimited(&bytes, ColumnSelection::AllowList(allowed), read_opts)
        });
        match read {
            Ok(batch) => {
                info!(
                    file = %name,
                    rows = batch.num_rows(),
                    columns = batch.num_columns(),
                    "read"
                );
                tables.push((name, batch));
            }
            Err(e) => warn!("skipping {} in {} ({})", name, zip_name, e),
        }
    }
    Ok(tables)
}

/// Merge, normalize and persist one year. `None` when no file was usable.
#[instrument(
    level = "info",
    skip(zip_path, out_folder, read_opts),
    fields(zip = %zip_path.display())
)]
pub fn process_year(
    zip_path: &Path,
    out_folder: &Path,
    read_opts: &DelimitedReadOptions,
) -> Result<Option<YearOutput>> {
    let year = year_label(zip_path);
    let allowed = allowed_columns();

    let mut archive = MemberArchive::open(zip_path)?;
    let tables = read_year_tables(&mut archive, read_opts, &allowed)?;
    drop(archive);

    let merged = match merge_year_tables(tables, &KEY_COLUMNS)? {
        Some(m) => m,
        None => {
            warn!(year = %year, "no usable files");
            return Ok(None);
        }
    };
    let merged = normalize_panel_types(&merged, ID_RSSD, REPORTING_PERIOD)?;

    let path = out_folder.join(format!("UBPR_{}.parquet", year));
    write_parquet(&merged, &path)?;
    info!(
        year = %year,
        rows = merged.num_rows(),
        columns = merged.num_columns(),
        path = %path.display(),
        "wrote yearly table"
    );

    Ok(Some(YearOutput {
        year,
        path,
        rows: merged.num_rows(),
        columns: merged.num_columns(),
    }))
}

/// Re-read the yearly files and stack them into the panel file at `panel_path`.
pub fn concatenate_years(
    yearly: &[YearOutput],
    source_dir: &Path,
    panel_path: &Path,
) -> Result<ConcatSummary> {
    if yearly.is_empty() {
        return Err(EtlError::NoYearlyData {
            dir: source_dir.to_path_buf(),
        });
    }
    let inputs: Vec<PathBuf> = yearly.iter().map(|y| y.path.clone()).collect();
    concat_parquet_files(&inputs, panel_path)
}

/// Build the yearly tables and the final panel from `opts.zip_folder`.
///
/// Fails with [`EtlError::NoYearlyData`] when no year produced a table.
#[instrument(level = "info", skip(opts), fields(dir = %opts.zip_folder.display()))]
pub fn process_ubpr_folder(opts: &PanelOptions) -> Result<PanelSummary> {
    std::fs::create_dir_all(&opts.out_folder)?;
    let read_opts = DelimitedReadOptions::ubpr()?;

    let zips = list_zip_archives(&opts.zip_folder)?;
    info!(archives = zips.len(), "processing years");

    let mut years = Vec::new();
    for (i, zip_path) in zips.iter().enumerate() {
        info!("year {}/{}: {}", i + 1, zips.len(), zip_path.display());
        if let Some(out) = process_year(zip_path, &opts.out_folder, &read_opts)? {
            years.push(out);
        }
    }

    info!("concatenating yearly files into panel");
    let panel_path = opts.final_path();
    let panel = concatenate_years(&years, &opts.zip_folder, &panel_path)?;
    info!(
        path = %panel_path.display(),
        rows = panel.rows,
        columns = panel.columns,
        "final panel saved"
    );

    Ok(PanelSummary {
        years,
        panel_path,
        rows: panel.rows,
        columns: panel.columns,
    })
}
