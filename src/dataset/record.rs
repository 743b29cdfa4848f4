use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

use crate::mask::RawMask;

/// One sample of a dataset, as loaded from its annotation source.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub img_id: String,
    pub img_path: PathBuf,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub instances: Vec<Instance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seg_map_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposals: Option<Proposals>,
}

/// One annotated object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    /// `[x1, y1, x2, y2]` in pixels.
    pub bbox: [f64; 4],
    pub bbox_label: i64,
    #[serde(default, deserialize_with = "bool_or_int")]
    pub ignore_flag: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<RawMask>,
}

/// Annotation files write ignore flags as either `true`/`false` or `1`/`0`.
fn bool_or_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(flag) => flag,
        Flag::Int(flag) => flag != 0,
    })
}

/// Externally supplied region proposals for one image.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Proposals {
    /// `[x1, y1, x2, y2]` rows.
    pub bboxes: Vec<[f64; 4]>,
    #[serde(default)]
    pub scores: Vec<f64>,
}

impl Proposals {
    pub fn len(&self) -> usize {
        self.bboxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bboxes.is_empty()
    }
}

/// Dataset-level metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaInfo {
    #[serde(default)]
    pub classes: Vec<String>,
}

impl MetaInfo {
    pub fn new(classes: Vec<String>) -> Self {
        Self { classes }
    }

    /// Class name → label, in class-list order.
    pub fn cat2label(&self) -> BTreeMap<String, i64> {
        self.classes
            .iter()
            .enumerate()
            .map(|(label, name)| (name.clone(), label as i64))
            .collect()
    }

    pub fn label_of(&self, name: &str) -> Option<i64> {
        self.classes
            .iter()
            .position(|class| class == name)
            .map(|label| label as i64)
    }
}

/// Everything a [`RecordSource`](super::RecordSource) produces, and the JSON index layout.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DataList {
    #[serde(default)]
    pub metainfo: MetaInfo,
    pub data_list: Vec<DatasetRecord>,
}
