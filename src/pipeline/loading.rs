use tracing::debug;

use super::{Results, SegMap, Transform};
use crate::boxes::{BoxField, BoxRepr, BoxTypeRegistry, RawBoxes};
use crate::config::LoadAnnotationsConfig;
use crate::error::DetError;
use crate::mask::{normalize_masks, payload_to_bitmap, BitmapMasks, Masks, PolygonMasks};

/// Fills the `gt_*` fields of a sample from its raw `instances`.
///
/// Steps run in the order boxes, labels, masks, segmentation map, each
/// behind its own flag. The mask step may force instances to be ignored,
/// and it rewrites `gt_ignore_flags` to match.
#[derive(Clone, Debug)]
pub struct LoadAnnotations {
    pub with_bbox: bool,
    pub with_label: bool,
    pub with_mask: bool,
    pub with_seg: bool,
    /// Rasterize masks into bitmaps; otherwise keep polygons.
    pub poly2mask: bool,
    /// Representation to build `gt_bboxes` as. `None` keeps a raw N×4 array.
    pub box_type: Option<(String, BoxRepr)>,
    pub reduce_zero_label: bool,
    pub ignore_index: u16,
}

impl Default for LoadAnnotations {
    fn default() -> Self {
        Self {
            with_bbox: true,
            with_label: true,
            with_mask: false,
            with_seg: false,
            poly2mask: true,
            box_type: None,
            reduce_zero_label: false,
            ignore_index: 255,
        }
    }
}

impl LoadAnnotations {
    /// Builds the transform, resolving `box_type` against `registry` up front.
    pub fn from_config(
        config: &LoadAnnotationsConfig,
        registry: &BoxTypeRegistry,
    ) -> Result<Self, DetError> {
        let box_type = config
            .box_type
            .as_ref()
            .map(|value| registry.resolve_value(value))
            .transpose()?;

        Ok(Self {
            with_bbox: config.with_bbox,
            with_label: config.with_label,
            with_mask: config.with_mask,
            with_seg: config.with_seg,
            poly2mask: config.poly2mask,
            box_type,
            reduce_zero_label: config.reduce_zero_label,
            ignore_index: config.ignore_index,
        })
    }

    fn load_bboxes(&self, results: &mut Results) -> Result<(), DetError> {
        let mut coords = Vec::with_capacity(results.instances.len() * 4);
        let mut ignore_flags = Vec::with_capacity(results.instances.len());
        for instance in &results.instances {
            coords.extend_from_slice(&instance.bbox);
            ignore_flags.push(instance.ignore_flag);
        }

        let raw = RawBoxes::new(coords, 4)?;
        results.gt_bboxes = Some(match &self.box_type {
            Some((_, repr)) => BoxField::Typed(repr.build(raw)?),
            None => BoxField::Raw(raw),
        });
        results.gt_ignore_flags = Some(ignore_flags);
        Ok(())
    }

    fn load_labels(&self, results: &mut Results) {
        results.gt_bboxes_labels = Some(
            results
                .instances
                .iter()
                .map(|instance| instance.bbox_label)
                .collect(),
        );
    }

    fn load_masks(&self, results: &mut Results) {
        let (height, width) = results.ori_shape;
        let normalized = normalize_masks(&mut results.instances, height, width, self.poly2mask);
        if normalized.degraded > 0 {
            debug!(
                img_id = %results.img_id,
                degraded = normalized.degraded,
                "ignored instances with unusable masks"
            );
        }

        let masks = if self.poly2mask {
            let planes = normalized
                .masks
                .iter()
                .map(|payload| payload_to_bitmap(payload, height, width))
                .collect();
            Masks::Bitmap(BitmapMasks::new(height, width, planes))
        } else {
            let rings = normalized
                .masks
                .into_iter()
                .map(|payload| payload.into_rings())
                .collect();
            Masks::Polygon(PolygonMasks::new(height, width, rings))
        };

        results.gt_masks = Some(masks);
        results.gt_ignore_flags = Some(normalized.ignore_flags);
    }

    fn load_seg_map(&self, results: &mut Results) -> Result<(), DetError> {
        let Some(path) = &results.seg_map_path else {
            return Ok(());
        };

        let mut seg_map = SegMap::open(path)?;
        if self.reduce_zero_label {
            seg_map.reduce_zero_label(self.ignore_index);
        }
        if let Some(label_map) = &results.label_map {
            seg_map.apply_label_map(label_map);
        }

        results.gt_seg_map = Some(seg_map);
        results.ignore_index = Some(self.ignore_index);
        Ok(())
    }
}

impl Transform for LoadAnnotations {
    fn transform(&self, mut results: Results) -> Result<Option<Results>, DetError> {
        if self.with_bbox {
            self.load_bboxes(&mut results)?;
        }
        if self.with_label {
            self.load_labels(&mut results);
        }
        if self.with_mask {
            self.load_masks(&mut results);
        }
        if self.with_seg {
            self.load_seg_map(&mut results)?;
        }
        Ok(Some(results))
    }
}
