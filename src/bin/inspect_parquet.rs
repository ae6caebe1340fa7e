use anyhow::{Context, Result};
use arrow::array::Array;
use bankpanel::process::read_parquet;
use parquet::file::reader::{FileReader, SerializedFileReader};
use std::{env, fs::File, path::Path, process::exit};

fn main() {
    // Expect exactly one CLI argument: path to a Parquet file.
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <PARQUET_FILE>", args[0]);
        exit(1);
    }
    if let Err(e) = inspect_parquet(Path::new(&args[1])) {
        eprintln!("Error: {:#}", e);
        exit(1);
    }
}

/// Print file-level metadata, then each column's type and null count.
fn inspect_parquet(path: &Path) -> Result<()> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = SerializedFileReader::new(file).context("reading parquet metadata")?;
    let meta = reader.metadata();
    let file_meta = meta.file_metadata();

    println!("=== Parquet File: {} ===", path.display());
    println!(
        "Created by:           {}",
        file_meta.created_by().unwrap_or("<unknown>")
    );
    println!("Total rows:           {}", file_meta.num_rows());
    println!("Number of row groups: {}", meta.num_row_groups());
    println!("File-size on disk:    {} bytes", std::fs::metadata(path)?.len());
    println!();

    let batch = read_parquet(path).context("reading parquet data")?;
    println!("=== Columns ({}) ===", batch.num_columns());
    for (field, col) in batch.schema().fields().iter().zip(batch.columns()) {
        println!(
            "- {:<20} | {:<8} | nulls: {:>8} / {}",
            field.name(),
            format!("{}", field.data_type()),
            col.null_count(),
            col.len()
        );
    }
    Ok(())
}
