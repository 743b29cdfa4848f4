use super::{Bitmap, Rle};

/// One dense plane per instance, all sharing the record's shape.
#[derive(Clone, Debug, PartialEq)]
pub struct BitmapMasks {
    pub height: u32,
    pub width: u32,
    pub masks: Vec<Bitmap>,
}

impl BitmapMasks {
    pub fn new(height: u32, width: u32, masks: Vec<Bitmap>) -> Self {
        Self {
            height,
            width,
            masks,
        }
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Foreground pixel count of each plane.
    pub fn areas(&self) -> Vec<f64> {
        self.masks.iter().map(|m| m.count_ones() as f64).collect()
    }

    /// Run-length encodes each plane.
    pub fn to_rles(&self) -> Vec<Rle> {
        self.masks.iter().map(Rle::encode).collect()
    }
}

/// Polygon rings per instance, as flat `[x0, y0, x1, y1, ...]` lists.
#[derive(Clone, Debug, PartialEq)]
pub struct PolygonMasks {
    pub height: u32,
    pub width: u32,
    pub masks: Vec<Vec<Vec<f64>>>,
}

impl PolygonMasks {
    pub fn new(height: u32, width: u32, masks: Vec<Vec<Vec<f64>>>) -> Self {
        Self {
            height,
            width,
            masks,
        }
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Sum of ring areas per instance (shoelace formula).
    ///
    /// Rings are not intersected with each other, so overlapping rings count
    /// twice. Use [`PolygonMasks::to_bitmap`] for exact pixel areas.
    pub fn areas(&self) -> Vec<f64> {
        self.masks
            .iter()
            .map(|rings| rings.iter().map(|ring| shoelace(ring)).sum())
            .collect()
    }

    /// Rasterizes every instance into a plane of the collection's shape.
    pub fn to_bitmap(&self) -> BitmapMasks {
        let masks = self
            .masks
            .iter()
            .map(|rings| Rle::from_polygons(rings, self.height, self.width).decode())
            .collect();
        BitmapMasks::new(self.height, self.width, masks)
    }
}

fn shoelace(ring: &[f64]) -> f64 {
    let n = ring.len() / 2;
    if n < 3 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        acc += ring[2 * i] * ring[2 * j + 1] - ring[2 * j] * ring[2 * i + 1];
    }
    acc.abs() / 2.0
}

/// The `gt_masks` slot of a pipeline record.
#[derive(Clone, Debug, PartialEq)]
pub enum Masks {
    Bitmap(BitmapMasks),
    Polygon(PolygonMasks),
}

impl Masks {
    pub fn len(&self) -> usize {
        match self {
            Masks::Bitmap(masks) => masks.len(),
            Masks::Polygon(masks) => masks.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(height, width)` shared by every mask in the collection.
    pub fn shape(&self) -> (u32, u32) {
        match self {
            Masks::Bitmap(masks) => (masks.height, masks.width),
            Masks::Polygon(masks) => (masks.height, masks.width),
        }
    }

    pub fn areas(&self) -> Vec<f64> {
        match self {
            Masks::Bitmap(masks) => masks.areas(),
            Masks::Polygon(masks) => masks.areas(),
        }
    }
}
