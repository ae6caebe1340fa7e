pub mod concat;
pub mod convert;
pub mod merge;
pub mod read;
pub mod utils;
pub mod write;

pub use concat::{concat_parquet_files, ConcatSummary};
pub use convert::normalize_panel_types;
pub use merge::{columns_to_keep, merge_year_tables, outer_join};
pub use read::{read_delimited, ColumnSelection, DelimitedReadOptions};
pub use write::{read_parquet, read_parquet_schema, write_csv, write_parquet, ParquetSink};
