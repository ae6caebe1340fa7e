pub mod archive;
pub mod config;
pub mod crosswalk;
pub mod error;
pub mod logging;
pub mod panel;
pub mod process;

pub use config::{CrosswalkOptions, PanelOptions, PipelineConfig};
pub use error::{EtlError, Result};
