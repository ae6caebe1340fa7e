use anyhow::{Context, Result};
use bankpanel::{crosswalk, logging, panel, PipelineConfig};
use tracing::info;

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    logging::init();
    info!("startup");

    // ─── 2) configure dirs ───────────────────────────────────────────
    let cfg = PipelineConfig::discover(".").context("loading config")?;
    info!(
        call_reports = %cfg.call_report_data_dir.display(),
        ubpr = %cfg.ubpr_data_dir.display(),
        processed = %cfg.processed_data_dir.display(),
        "configured"
    );

    // ─── 3) RSSD ↔ CERT crosswalk ────────────────────────────────────
    let (crosswalk, conflicts) = crosswalk::build_rssd_cert_crosswalk(&cfg.crosswalk_options())
        .context("building RSSD/CERT crosswalk")?;
    info!(
        rows = crosswalk.len(),
        conflicts = ?conflicts.kinds(),
        "crosswalk done"
    );

    // ─── 4) UBPR panel ───────────────────────────────────────────────
    let summary =
        panel::process_ubpr_folder(&cfg.panel_options()).context("building UBPR panel")?;
    info!(
        years = summary.years.len(),
        rows = summary.rows,
        columns = summary.columns,
        "panel done"
    );

    info!("all done");
    Ok(())
}
