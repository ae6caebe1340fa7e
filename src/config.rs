//! Directory and file layout for the raw inputs and processed outputs.
//!
//! The layout defaults to `<root>/data/raw/...` and `<root>/data/processed/...`.
//! A YAML file may override any individual path.

use serde::{Deserialize, Deserializer};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

use crate::error::Result;

/// Config file looked up in the working directory by the binaries.
pub const DEFAULT_CONFIG_FILE: &str = "bankpanel.yaml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub raw_data_dir: PathBuf,
    pub ubpr_data_dir: PathBuf,
    pub call_report_data_dir: PathBuf,
    pub processed_data_dir: PathBuf,
    pub ubpr_panel_dir: PathBuf,
    pub crosswalk_dir: PathBuf,
    pub crosswalk_csv: PathBuf,
    pub crosswalk_parquet: Option<PathBuf>,
    pub crosswalk_conflicts_json: Option<PathBuf>,
    pub ubpr_panel_file: PathBuf,
}

/// On-disk shape of the config file; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    root: Option<PathBuf>,
    raw_data_dir: Option<PathBuf>,
    ubpr_data_dir: Option<PathBuf>,
    call_report_data_dir: Option<PathBuf>,
    processed_data_dir: Option<PathBuf>,
    ubpr_panel_dir: Option<PathBuf>,
    crosswalk_dir: Option<PathBuf>,
    crosswalk_csv: Option<PathBuf>,
    #[serde(default, deserialize_with = "present")]
    crosswalk_parquet: Option<Option<OptionalOutput>>,
    crosswalk_conflicts_json: Option<PathBuf>,
    ubpr_panel_file: Option<PathBuf>,
}

/// An output that can be switched off: a path, `true` for the default
/// location, or `false`/`null` for none.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OptionalOutput {
    Enabled(bool),
    Path(PathBuf),
}

/// Distinguishes an explicit `null` (`Some(None)`) from an absent key (`None`).
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl PipelineConfig {
    /// Standard layout rooted at `root`.
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let raw_data_dir = root.join("data").join("raw");
        let processed_data_dir = root.join("data").join("processed");
        let ubpr_panel_dir = processed_data_dir.join("ubpr_panel");
        let crosswalk_dir = processed_data_dir.join("crosswalk");

        Self {
            ubpr_data_dir: raw_data_dir.join("ubpr_data"),
            call_report_data_dir: raw_data_dir.join("CallReportData"),
            crosswalk_csv: crosswalk_dir.join("rssd_cert_crosswalk.csv"),
            crosswalk_parquet: Some(crosswalk_dir.join("rssd_cert_crosswalk.parquet")),
            crosswalk_conflicts_json: None,
            ubpr_panel_file: ubpr_panel_dir.join("UBPR_Panel.parquet"),
            raw_data_dir,
            processed_data_dir,
            ubpr_panel_dir,
            crosswalk_dir,
        }
    }

    /// Load a YAML config. Relative paths resolve against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_yaml(&text, base)
    }

    /// Use `bankpanel.yaml` from `dir` when present, otherwise the default layout rooted at `dir`.
    pub fn discover(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let candidate = dir.join(DEFAULT_CONFIG_FILE);
        if candidate.is_file() {
            info!(path = %candidate.display(), "loading config");
            Self::load(candidate)
        } else {
            Ok(Self::from_root(dir))
        }
    }

    fn from_yaml(text: &str, base: &Path) -> Result<Self> {
        let file: ConfigFile = if text.trim().is_empty() {
            ConfigFile::default()
        } else {
            serde_yaml::from_str(text)?
        };
        let resolve = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };

        let root = file.root.map(resolve).unwrap_or_else(|| base.to_path_buf());
        let mut cfg = Self::from_root(&root);

        // Directory overrides move the files that live under them.
        if let Some(p) = file.raw_data_dir {
            cfg.raw_data_dir = resolve(p);
            cfg.ubpr_data_dir = cfg.raw_data_dir.join("ubpr_data");
            cfg.call_report_data_dir = cfg.raw_data_dir.join("CallReportData");
        }
        if let Some(p) = file.processed_data_dir {
            cfg.processed_data_dir = resolve(p);
            cfg.ubpr_panel_dir = cfg.processed_data_dir.join("ubpr_panel");
            cfg.crosswalk_dir = cfg.processed_data_dir.join("crosswalk");
        }
        if let Some(p) = file.ubpr_data_dir {
            cfg.ubpr_data_dir = resolve(p);
        }
        if let Some(p) = file.call_report_data_dir {
            cfg.call_report_data_dir = resolve(p);
        }
        if let Some(p) = file.ubpr_panel_dir {
            cfg.ubpr_panel_dir = resolve(p);
        }
        if let Some(p) = file.crosswalk_dir {
            cfg.crosswalk_dir = resolve(p);
        }

        cfg.crosswalk_csv = file
            .crosswalk_csv
            .map(resolve)
            .unwrap_or_else(|| cfg.crosswalk_dir.join("rssd_cert_crosswalk.csv"));
        let default_parquet = cfg.crosswalk_dir.join("rssd_cert_crosswalk.parquet");
        cfg.crosswalk_parquet = match file.crosswalk_parquet {
            None | Some(Some(OptionalOutput::Enabled(true))) => Some(default_parquet),
            Some(None) | Some(Some(OptionalOutput::Enabled(false))) => None,
            Some(Some(OptionalOutput::Path(p))) => Some(resolve(p)),
        };
        cfg.crosswalk_conflicts_json = file.crosswalk_conflicts_json.map(resolve);
        cfg.ubpr_panel_file = file
            .ubpr_panel_file
            .map(resolve)
            .unwrap_or_else(|| cfg.ubpr_panel_dir.join("UBPR_Panel.parquet"));

        Ok(cfg)
    }

    pub fn crosswalk_options(&self) -> CrosswalkOptions {
        CrosswalkOptions {
            zip_folder: self.call_report_data_dir.clone(),
            out_csv: self.crosswalk_csv.clone(),
            out_parquet: self.crosswalk_parquet.clone(),
            conflicts_json: self.crosswalk_conflicts_json.clone(),
        }
    }

    pub fn panel_options(&self) -> PanelOptions {
        // The panel file name is relative to the panel output folder.
        let final_file = self
            .ubpr_panel_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "UBPR_Panel.parquet".to_string());
        PanelOptions {
            zip_folder: self.ubpr_data_dir.clone(),
            out_folder: self
                .ubpr_panel_file
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.ubpr_panel_dir.clone()),
            final_file,
        }
    }
}

/// Inputs and outputs of one crosswalk run.
#[derive(Debug, Clone)]
pub struct CrosswalkOptions {
    pub zip_folder: PathBuf,
    pub out_csv: PathBuf,
    pub out_parquet: Option<PathBuf>,
    pub conflicts_json: Option<PathBuf>,
}

/// Inputs and outputs of one panel run.
#[derive(Debug, Clone)]
pub struct PanelOptions {
    pub zip_folder: PathBuf,
    /// Receives the per-year files and the final panel.
    pub out_folder: PathBuf,
    pub final_file: String,
}

impl PanelOptions {
    pub fn final_path(&self) -> PathBuf {
        self.out_folder.join(&self.final_file)
    }
}
