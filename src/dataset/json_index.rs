//! JSON record index: `{"metainfo": {"classes": [...]}, "data_list": [...]}`.
//!
//! Each entry of `data_list` is a [`DatasetRecord`](super::DatasetRecord).
//! Relative image and segmentation paths are resolved against `data_root`.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use super::{DataList, RecordSource};
use crate::config::DatasetConfig;
use crate::error::DetError;

#[derive(Clone, Debug)]
pub struct JsonIndexSource {
    index_path: PathBuf,
    data_root: PathBuf,
    classes: Vec<String>,
}

impl JsonIndexSource {
    /// Fails when the config names no `ann_file`.
    pub fn from_config(config: &DatasetConfig) -> Result<Self, DetError> {
        let ann_file = config.ann_file.as_deref().ok_or_else(|| {
            DetError::InvalidInput("JSON datasets need an `ann_file`".to_string())
        })?;
        Ok(Self {
            index_path: config.resolve_path(ann_file),
            data_root: config.data_root.clone(),
            classes: config.classes.clone(),
        })
    }
}

impl RecordSource for JsonIndexSource {
    fn load_data_list(&self) -> Result<DataList, DetError> {
        let file = File::open(&self.index_path).map_err(|source| DetError::ReadFile {
            path: self.index_path.clone(),
            source,
        })?;
        let mut list: DataList =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| {
                DetError::JsonParse {
                    path: self.index_path.clone(),
                    source,
                }
            })?;

        // Classes from the config win over the ones stored in the index.
        if !self.classes.is_empty() {
            list.metainfo.classes = self.classes.clone();
        }

        for record in &mut list.data_list {
            if record.img_path.is_relative() {
                record.img_path = self.data_root.join(&record.img_path);
            }
            if let Some(seg) = record.seg_map_path.as_mut().filter(|p| p.is_relative()) {
                *seg = self.data_root.join(&*seg);
            }
        }

        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn relative_paths_are_joined_to_data_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join("index.json"),
            r#"{
  "metainfo": {"classes": ["cat"]},
  "data_list": [
    {"img_id": "a", "img_path": "images/a.jpg", "width": 4, "height": 3,
     "seg_map_path": "seg/a.png",
     "instances": [{"bbox": [0, 0, 2, 2], "bbox_label": 0, "ignore_flag": 0}]}
  ]
}"#,
        )
        .expect("write index");

        let config = DatasetConfig {
            data_root: dir.path().to_path_buf(),
            ann_file: Some(PathBuf::from("index.json")),
            ..Default::default()
        };
        let list = JsonIndexSource::from_config(&config)
            .expect("source")
            .load_data_list()
            .expect("load");

        assert_eq!(list.metainfo.classes, vec!["cat".to_string()]);
        assert_eq!(list.data_list[0].img_path, dir.path().join("images/a.jpg"));
        assert_eq!(
            list.data_list[0].seg_map_path,
            Some(dir.path().join("seg/a.png"))
        );
    }

    #[test]
    fn ann_file_is_required() {
        assert!(JsonIndexSource::from_config(&DatasetConfig::default()).is_err());
    }
}
