//! Configuration structs.
//!
//! Everything below `load_config` works on already-parsed values; only
//! [`load_config`] touches the filesystem. Defaults follow the usual VOC
//! layout, so a minimal config only needs `dataset.data_root` and
//! `dataset.classes`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DetError;

/// On-disk layout of a dataset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetFormat {
    /// One Pascal VOC XML file per image.
    #[default]
    Voc,
    /// A single `{metainfo, data_list}` JSON index.
    Json,
}

/// Subset selection applied after filtering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Indices {
    /// First `n` records, or the last `|n|` when negative.
    Count(i64),
    /// Exactly these records, in this order.
    List(Vec<usize>),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Drop records without instances.
    pub filter_empty_gt: bool,
    /// Drop records whose shorter side is below this.
    pub min_size: u32,
    /// Mark instances narrower or shorter than this as ignored.
    pub bbox_min_size: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub format: DatasetFormat,
    pub data_root: PathBuf,
    /// Image-id list (VOC) or record index (JSON). Relative to `data_root`.
    pub ann_file: Option<PathBuf>,
    pub classes: Vec<String>,
    pub img_subdir: String,
    pub ann_subdir: String,
    pub seg_subdir: Option<String>,
    pub seg_map_suffix: String,
    pub proposal_file: Option<PathBuf>,
    pub filter: FilterConfig,
    pub test_mode: bool,
    pub indices: Option<Indices>,
    pub serialize_data: bool,
    pub lazy_init: bool,
    pub label_map: Option<BTreeMap<u16, u16>>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            format: DatasetFormat::Voc,
            data_root: PathBuf::new(),
            ann_file: None,
            classes: Vec::new(),
            img_subdir: "JPEGImages".to_string(),
            ann_subdir: "Annotations".to_string(),
            seg_subdir: None,
            seg_map_suffix: ".png".to_string(),
            proposal_file: None,
            filter: FilterConfig::default(),
            test_mode: false,
            indices: None,
            serialize_data: true,
            lazy_init: false,
            label_map: None,
        }
    }
}

impl DatasetConfig {
    /// Joins `path` onto `data_root` unless it is already absolute.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_root.join(path)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadAnnotationsConfig {
    pub with_bbox: bool,
    pub with_label: bool,
    pub with_mask: bool,
    pub with_seg: bool,
    pub poly2mask: bool,
    /// Registered box type name. `null` keeps raw arrays.
    pub box_type: Option<serde_json::Value>,
    pub reduce_zero_label: bool,
    pub ignore_index: u16,
}

impl Default for LoadAnnotationsConfig {
    fn default() -> Self {
        Self {
            with_bbox: true,
            with_label: true,
            with_mask: false,
            with_seg: false,
            poly2mask: true,
            box_type: Some(serde_json::Value::String("hbox".to_string())),
            reduce_zero_label: false,
            ignore_index: 255,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub batch_size: usize,
    pub drop_last: bool,
    pub shuffle: bool,
    pub seed: Option<u64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            batch_size: 2,
            drop_last: false,
            shuffle: true,
            seed: None,
        }
    }
}

/// Top-level configuration file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub loader: LoadAnnotationsConfig,
    #[serde(default)]
    pub sampler: SamplerConfig,
}

/// Reads a YAML (`.yaml`/`.yml`) or JSON (`.json`) configuration file.
pub fn load_config(path: &Path) -> Result<Config, DetError> {
    let text = fs::read_to_string(path).map_err(|source| DetError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("yaml" | "yml") => {
            serde_yaml::from_str(&text).map_err(|source| DetError::YamlParse {
                path: path.to_path_buf(),
                source,
            })
        }
        Some("json") => serde_json::from_str(&text).map_err(|source| DetError::JsonParse {
            path: path.to_path_buf(),
            source,
        }),
        _ => Err(DetError::UnsupportedFormat(format!(
            "config file '{}' (expected .yaml, .yml or .json)",
            path.display()
        ))),
    }
}
