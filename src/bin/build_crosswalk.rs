use anyhow::{Context, Result};
use bankpanel::{crosswalk, logging, PipelineConfig};
use tracing::info;

fn main() -> Result<()> {
    logging::init();
    let cfg = PipelineConfig::discover(".").context("loading config")?;

    let opts = cfg.crosswalk_options();
    let (crosswalk, conflicts) =
        crosswalk::build_rssd_cert_crosswalk(&opts).context("building RSSD/CERT crosswalk")?;

    for (rssd, n) in &conflicts.rssd_conflicts {
        info!(id_rssd = %rssd, certs = n, "RSSD maps to several CERTs");
    }
    for (cert, n) in &conflicts.cert_conflicts {
        info!(cert = %cert, rssds = n, "CERT maps to several RSSDs");
    }
    info!(
        rows = crosswalk.len(),
        conflicts = ?conflicts.kinds(),
        out = %opts.out_csv.display(),
        "done"
    );
    Ok(())
}
