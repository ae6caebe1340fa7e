use anyhow::{Context, Result};
use bankpanel::{logging, panel, PipelineConfig};
use tracing::info;

fn main() -> Result<()> {
    logging::init();
    let cfg = PipelineConfig::discover(".").context("loading config")?;

    let summary =
        panel::process_ubpr_folder(&cfg.panel_options()).context("building UBPR panel")?;
    for y in &summary.years {
        info!(year = %y.year, rows = y.rows, columns = y.columns, "year");
    }
    info!(
        path = %summary.panel_path.display(),
        rows = summary.rows,
        columns = summary.columns,
        "done"
    );
    Ok(())
}
