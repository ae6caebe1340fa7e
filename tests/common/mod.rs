#![allow(dead_code)]

use std::{fs::File, io::Write, path::Path};
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

/// Write a zip archive at `path` holding `(member name, contents)` entries.
pub fn write_zip(path: &Path, members: &[(&str, &[u8])]) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, contents) in members {
        zip.start_file(*name, options)?;
        zip.write_all(contents)?;
    }
    zip.finish()?;
    Ok(())
}

/// Tab-separated text from rows of fields.
pub fn tsv(rows: &[&[&str]]) -> Vec<u8> {
    let mut out = String::new();
    for row in rows {
        out.push_str(&row.join("\t"));
        out.push('\n');
    }
    out.into_bytes()
}

pub fn init_test_logging() {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,bankpanel=debug")),
        )
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
