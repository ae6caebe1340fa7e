use arrow::{
    compute::concat_batches, csv::WriterBuilder, datatypes::SchemaRef, record_batch::RecordBatch,
};
use parquet::{
    arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter},
    basic::Compression,
    file::properties::WriterProperties,
};
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::error::Result;

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Parquet file written batch by batch. Data goes to a `.tmp` file beside
/// the target, which only appears once [`ParquetSink::finish`] succeeds.
pub struct ParquetSink {
    writer: ArrowWriter<File>,
    tmp: PathBuf,
    path: PathBuf,
    rows: usize,
}

impl ParquetSink {
    pub fn create(path: &Path, schema: SchemaRef) -> Result<Self> {
        ensure_parent(path)?;
        let tmp = temp_path(path);
        let file = File::create(&tmp)?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let writer = ArrowWriter::try_new(file, schema, Some(props))?;
        Ok(Self {
            writer,
            tmp,
            path: path.to_path_buf(),
            rows: 0,
        })
    }

    pub fn write(&mut self, batch: &RecordBatch) -> Result<()> {
        self.writer.write(batch)?;
        self.rows += batch.num_rows();
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Close the file and move it into place. Returns its size in bytes.
    pub fn finish(self) -> Result<u64> {
        self.writer.close()?;
        fs::rename(&self.tmp, &self.path)?;
        let bytes = fs::metadata(&self.path)?.len();
        debug!(path = %self.path.display(), rows = self.rows, bytes, "wrote parquet");
        Ok(bytes)
    }
}

/// Write `batch` to a Parquet file. The file is written beside its target
/// and renamed into place once complete.
pub fn write_parquet(batch: &RecordBatch, path: &Path) -> Result<u64> {
    let mut sink = ParquetSink::create(path, batch.schema())?;
    sink.write(batch)?;
    sink.finish()
}

/// Schema of a Parquet file, read from its footer only.
pub fn read_parquet_schema(path: &Path) -> Result<SchemaRef> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
    Ok(builder.schema().clone())
}

/// Read a whole Parquet file back into one batch.
pub fn read_parquet(path: &Path) -> Result<RecordBatch> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    Ok(concat_batches(&schema, &batches)?)
}

/// Write `batch` as comma-separated text with a header row; nulls are empty fields.
pub fn write_csv(batch: &RecordBatch, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let tmp = temp_path(path);
    {
        let file = File::create(&tmp)?;
        let mut writer = WriterBuilder::new().with_header(true).build(file);
        writer.write(batch)?;
    }
    fs::rename(&tmp, path)?;
    debug!(path = %path.display(), rows = batch.num_rows(), "wrote csv");
    Ok(())
}
