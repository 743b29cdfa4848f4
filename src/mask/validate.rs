//! Per-instance mask validation.
//!
//! Nothing in here fails: a payload that cannot be turned into a usable mask
//! is replaced with [`DEGENERATE_RING`] and its instance is marked ignored, so
//! the mask count always equals the instance count.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{ring_within_reach, Bitmap, Rle};
use crate::dataset::Instance;

/// Placeholder ring for instances whose mask was unusable: one point, three times.
pub const DEGENERATE_RING: [f64; 6] = [0.0; 6];

/// A mask payload exactly as it appears in an annotation file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawMask {
    /// Polygon rings as flat `[x0, y0, x1, y1, ...]` lists.
    Polygons(Vec<Vec<f64>>),
    /// A COCO RLE object. Fields are checked later, not at parse time.
    Rle(RleObject),
    Other(Value),
}

/// The `{counts, size}` mapping form of a mask.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RleObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counts: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Value>,
}

/// A mask that survived validation.
#[derive(Clone, Debug, PartialEq)]
pub enum MaskPayload {
    Polygons(Vec<Vec<f64>>),
    Rle(Rle),
}

impl MaskPayload {
    fn degenerate() -> Self {
        MaskPayload::Polygons(vec![DEGENERATE_RING.to_vec()])
    }

    /// Polygon rings of the payload. RLE payloads have none and yield the placeholder.
    pub fn into_rings(self) -> Vec<Vec<f64>> {
        match self {
            MaskPayload::Polygons(rings) => rings,
            MaskPayload::Rle(_) => vec![DEGENERATE_RING.to_vec()],
        }
    }
}

/// Output of [`normalize_masks`]: one payload and one flag per instance.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalizedMasks {
    pub masks: Vec<MaskPayload>,
    pub ignore_flags: Vec<bool>,
    /// How many instances were replaced with the placeholder.
    pub degraded: usize,
}

/// Validates every instance's mask for a plane of `(height, width)`.
///
/// Polygon rings are kept when they have an even coordinate count of at
/// least six and every vertex is within reach of the plane (see
/// [`ring_within_reach`]); an instance with no surviving ring is degraded. RLE objects
/// are only accepted when `poly2mask` is set, both `counts` and `size` are
/// present, `counts` is a list or a compressed string, and the runs describe
/// exactly the record's plane. Missing masks are degraded too.
///
/// Degraded instances get `ignore_flag = true` written back into `instances`.
pub fn normalize_masks(
    instances: &mut [Instance],
    height: u32,
    width: u32,
    poly2mask: bool,
) -> NormalizedMasks {
    let mut out = NormalizedMasks {
        masks: Vec::with_capacity(instances.len()),
        ignore_flags: Vec::with_capacity(instances.len()),
        degraded: 0,
    };

    for (idx, instance) in instances.iter_mut().enumerate() {
        let payload = match &instance.mask {
            Some(RawMask::Polygons(rings)) => {
                let kept: Vec<Vec<f64>> = rings
                    .iter()
                    .filter(|ring| {
                        ring.len() % 2 == 0
                            && ring.len() >= 6
                            && ring_within_reach(ring, height, width)
                    })
                    .cloned()
                    .collect();
                (!kept.is_empty()).then_some(MaskPayload::Polygons(kept))
            }
            Some(RawMask::Rle(object)) if poly2mask => {
                rle_from_object(object, height, width).map(MaskPayload::Rle)
            }
            Some(RawMask::Rle(_)) | Some(RawMask::Other(_)) | None => None,
        };

        let payload = payload.unwrap_or_else(|| {
            debug!(instance = idx, "replacing unusable mask with placeholder");
            instance.ignore_flag = true;
            out.degraded += 1;
            MaskPayload::degenerate()
        });

        out.masks.push(payload);
        out.ignore_flags.push(instance.ignore_flag);
    }

    out
}

fn rle_from_object(object: &RleObject, height: u32, width: u32) -> Option<Rle> {
    let (counts, size) = (object.counts.as_ref()?, object.size.as_ref()?);

    let size = size.as_array()?;
    let [h, w] = size.as_slice() else {
        return None;
    };
    let h = u32::try_from(h.as_u64()?).ok()?;
    let w = u32::try_from(w.as_u64()?).ok()?;
    if (h, w) != (height, width) {
        return None;
    }

    let rle = match counts {
        Value::Array(items) => {
            let counts = items
                .iter()
                .map(|c| c.as_u64().and_then(|c| u32::try_from(c).ok()))
                .collect::<Option<Vec<u32>>>()?;
            Rle {
                height: h,
                width: w,
                counts,
            }
        }
        Value::String(s) => Rle::from_compressed(s, h, w)?,
        _ => return None,
    };

    rle.is_consistent().then_some(rle)
}

/// Rasterizes a validated payload into a plane of `(height, width)`.
pub fn payload_to_bitmap(payload: &MaskPayload, height: u32, width: u32) -> Bitmap {
    match payload {
        MaskPayload::Polygons(rings) => Rle::from_polygons(rings, height, width).decode(),
        MaskPayload::Rle(rle) => rle.decode(),
    }
}
