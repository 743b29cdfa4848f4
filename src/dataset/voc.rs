//! Pascal VOC source: one XML annotation per image.
//!
//! Image ids come from an id list (`ann_file`, one id per line) or, without
//! one, from the `*.xml` files under `ann_subdir`. Box coordinates in VOC are
//! 1-based and are shifted to 0-based on load.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use roxmltree::Node;
use tracing::debug;
use walkdir::WalkDir;

use super::{DataList, DatasetRecord, Instance, MetaInfo, RecordSource};
use crate::config::DatasetConfig;
use crate::error::DetError;

const XML_EXTENSION: &str = "xml";
const IMAGE_EXTENSION: &str = "jpg";

/// Reads a VOC-layout directory into records.
#[derive(Clone, Debug)]
pub struct XmlSource {
    data_root: PathBuf,
    ann_file: Option<PathBuf>,
    classes: Vec<String>,
    img_subdir: String,
    ann_subdir: String,
    seg_subdir: Option<String>,
    seg_map_suffix: String,
    bbox_min_size: Option<f64>,
    test_mode: bool,
}

impl XmlSource {
    pub fn from_config(config: &DatasetConfig) -> Self {
        Self {
            data_root: config.data_root.clone(),
            ann_file: config.ann_file.as_deref().map(|p| config.resolve_path(p)),
            classes: config.classes.clone(),
            img_subdir: config.img_subdir.clone(),
            ann_subdir: config.ann_subdir.clone(),
            seg_subdir: config.seg_subdir.clone(),
            seg_map_suffix: config.seg_map_suffix.clone(),
            bbox_min_size: config.filter.bbox_min_size,
            test_mode: config.test_mode,
        }
    }

    fn image_ids(&self) -> Result<Vec<String>, DetError> {
        match &self.ann_file {
            Some(list) => {
                let text = fs::read_to_string(list).map_err(|source| DetError::ReadFile {
                    path: list.clone(),
                    source,
                })?;
                Ok(text
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(ToOwned::to_owned)
                    .collect())
            }
            None => self.scan_annotation_dir(),
        }
    }

    fn scan_annotation_dir(&self) -> Result<Vec<String>, DetError> {
        let dir = self.data_root.join(&self.ann_subdir);
        let mut ids = Vec::new();
        for entry in WalkDir::new(&dir).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(|source| DetError::InvalidInput(format!(
                "failed while scanning {}: {source}",
                dir.display()
            )))?;
            let path = entry.path();
            if !entry.file_type().is_file() || !has_xml_extension(path) {
                continue;
            }
            let rel = path.strip_prefix(&dir).unwrap_or(path).with_extension("");
            ids.push(rel.to_string_lossy().replace('\\', "/"));
        }
        Ok(ids)
    }

    fn parse_record(&self, img_id: &str, meta: &MetaInfo) -> Result<DatasetRecord, DetError> {
        let img_path = self
            .data_root
            .join(&self.img_subdir)
            .join(format!("{img_id}.{IMAGE_EXTENSION}"));
        let xml_path = self
            .data_root
            .join(&self.ann_subdir)
            .join(format!("{img_id}.{XML_EXTENSION}"));

        let xml = fs::read_to_string(&xml_path).map_err(|source| DetError::ReadFile {
            path: xml_path.clone(),
            source,
        })?;
        let parsed = parse_voc_xml(&xml, &xml_path)?;

        let (width, height) = match parsed.size {
            Some(size) => size,
            None => image_size(&img_path)?,
        };

        let mut instances = Vec::with_capacity(parsed.objects.len());
        for object in parsed.objects {
            let Some(label) = meta.label_of(&object.name) else {
                debug!(img_id, class = %object.name, "skipping object of unknown class");
                continue;
            };

            let bbox = object.bbox.map(|coord| (coord as i64 - 1) as f64);
            let too_small = match self.bbox_min_size {
                Some(min) if !self.test_mode => {
                    bbox[2] - bbox[0] < min || bbox[3] - bbox[1] < min
                }
                _ => false,
            };

            instances.push(Instance {
                bbox,
                bbox_label: label,
                ignore_flag: object.difficult || too_small,
                mask: None,
            });
        }

        let seg_map_path = self.seg_subdir.as_ref().map(|subdir| {
            self.data_root
                .join(subdir)
                .join(format!("{img_id}{}", self.seg_map_suffix))
        });

        Ok(DatasetRecord {
            img_id: img_id.to_string(),
            img_path,
            width,
            height,
            instances,
            seg_map_path,
            proposals: None,
        })
    }
}

impl RecordSource for XmlSource {
    fn load_data_list(&self) -> Result<DataList, DetError> {
        if self.classes.is_empty() {
            return Err(DetError::InvalidInput(
                "VOC datasets need a non-empty `classes` list".to_string(),
            ));
        }
        let metainfo = MetaInfo::new(self.classes.clone());

        let records = self
            .image_ids()?
            .iter()
            .map(|img_id| self.parse_record(img_id, &metainfo))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DataList {
            metainfo,
            data_list: records,
        })
    }
}

fn image_size(path: &Path) -> Result<(u32, u32), DetError> {
    let size = imagesize::size(path).map_err(|source| DetError::ImageSize {
        path: path.to_path_buf(),
        source,
    })?;
    let width = u32::try_from(size.width).map_err(|_| {
        DetError::InvalidInput(format!("image width too large in {}", path.display()))
    })?;
    let height = u32::try_from(size.height).map_err(|_| {
        DetError::InvalidInput(format!("image height too large in {}", path.display()))
    })?;
    Ok((width, height))
}

/// The parts of one VOC annotation file this crate uses.
#[derive(Clone, Debug, PartialEq)]
pub struct VocAnnotation {
    /// `(width, height)` from `<size>`, when present.
    pub size: Option<(u32, u32)>,
    pub objects: Vec<VocObject>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VocObject {
    pub name: String,
    pub difficult: bool,
    /// 1-based `[xmin, ymin, xmax, ymax]` as written.
    pub bbox: [f64; 4],
}

/// Parses VOC XML from bytes, as used by the fuzz targets.
pub fn from_voc_xml_slice(bytes: &[u8]) -> Result<VocAnnotation, DetError> {
    let xml = std::str::from_utf8(bytes).map_err(|source| DetError::XmlParse {
        path: PathBuf::from("<memory>"),
        message: format!("input is not valid UTF-8: {source}"),
    })?;
    parse_voc_xml(xml, Path::new("<memory>"))
}

/// Parses one VOC annotation document. `path` is only used in error messages.
pub fn parse_voc_xml(xml: &str, path: &Path) -> Result<VocAnnotation, DetError> {
    let doc = roxmltree::Document::parse(xml).map_err(|source| DetError::XmlParse {
        path: path.to_path_buf(),
        message: source.to_string(),
    })?;
    let ctx = XmlCtx { path };

    let root = doc.root_element();
    if root.tag_name().name() != "annotation" {
        return Err(ctx.error("missing <annotation> root element".to_string()));
    }

    let size = match child(root, "size") {
        Some(size) => Some((
            ctx.parse_child::<u32>(size, "width")?,
            ctx.parse_child::<u32>(size, "height")?,
        )),
        None => None,
    };

    let mut objects = Vec::new();
    for object in root
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == "object")
    {
        let name = ctx.required_text(object, "name")?;
        let difficult = match text(object, "difficult") {
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                ctx.error(format!("invalid <difficult> value '{raw}'; expected integer"))
            })? != 0,
            None => false,
        };

        let bndbox = child(object, "bndbox")
            .ok_or_else(|| ctx.error("missing <bndbox> in <object>".to_string()))?;
        let bbox = [
            ctx.parse_child::<f64>(bndbox, "xmin")?,
            ctx.parse_child::<f64>(bndbox, "ymin")?,
            ctx.parse_child::<f64>(bndbox, "xmax")?,
            ctx.parse_child::<f64>(bndbox, "ymax")?,
        ];

        objects.push(VocObject {
            name,
            difficult,
            bbox,
        });
    }

    Ok(VocAnnotation { size, objects })
}

/// Error context for one document.
struct XmlCtx<'p> {
    path: &'p Path,
}

impl XmlCtx<'_> {
    fn error(&self, message: String) -> DetError {
        DetError::XmlParse {
            path: self.path.to_path_buf(),
            message,
        }
    }

    fn required_text(&self, node: Node<'_, '_>, tag: &str) -> Result<String, DetError> {
        text(node, tag).ok_or_else(|| {
            self.error(format!(
                "missing <{tag}> in <{}>",
                node.tag_name().name()
            ))
        })
    }

    fn parse_child<T: FromStr>(&self, node: Node<'_, '_>, tag: &str) -> Result<T, DetError> {
        let raw = self.required_text(node, tag)?;
        raw.parse::<T>().map_err(|_| {
            self.error(format!(
                "invalid <{tag}> value '{raw}' in <{}>",
                node.tag_name().name()
            ))
        })
    }
}

fn child<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == tag)
}

fn text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag)
        .and_then(|c| c.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToOwned::to_owned)
}

fn has_xml_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(XML_EXTENSION))
}
