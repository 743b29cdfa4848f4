//! Oriented boxes in center/size/angle format.

use std::any::Any;

use super::{check_dim, BoxList, FromRaw, RawBoxes};
use crate::error::DetError;

/// Oriented boxes stored as rows of `(cx, cy, w, h, angle)`, angle in radians.
#[derive(Clone, Debug, PartialEq)]
pub struct RotatedBoxes {
    raw: RawBoxes,
}

impl RotatedBoxes {
    pub fn from_rows(rows: &[[f64; 5]]) -> Self {
        Self {
            raw: RawBoxes::from_rows(rows),
        }
    }

    /// Returns box `i` as `[cx, cy, w, h, angle]`.
    pub fn get(&self, i: usize) -> [f64; 5] {
        let row = self.raw.row(i);
        [row[0], row[1], row[2], row[3], row[4]]
    }

    /// Corner points of box `i`, counter-clockwise from the (-w/2, -h/2) corner.
    pub fn corners(&self, i: usize) -> [[f64; 2]; 4] {
        let [cx, cy, w, h, angle] = self.get(i);
        let (sin, cos) = angle.sin_cos();
        let (hw, hh) = (w / 2.0, h / 2.0);
        [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)]
            .map(|(dx, dy)| [cx + dx * cos - dy * sin, cy + dx * sin + dy * cos])
    }
}

impl FromRaw for RotatedBoxes {
    const BOX_DIM: usize = 5;

    fn from_raw(raw: RawBoxes) -> Result<Self, DetError> {
        check_dim(&raw, Self::BOX_DIM, "RotatedBoxes")?;
        Ok(Self { raw })
    }
}

impl BoxList for RotatedBoxes {
    fn box_dim(&self) -> usize {
        Self::BOX_DIM
    }

    fn len(&self) -> usize {
        self.raw.len()
    }

    fn areas(&self) -> Vec<f64> {
        self.raw.rows().map(|r| r[2] * r[3]).collect()
    }

    fn centers(&self) -> Vec<[f64; 2]> {
        self.raw.rows().map(|r| [r[0], r[1]]).collect()
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        for row in self.raw.rows_mut() {
            row[0] += dx;
            row[1] += dy;
        }
    }

    fn flip_horizontal(&mut self, width: f64) {
        for row in self.raw.rows_mut() {
            row[0] = width - row[0];
            row[4] = -row[4];
        }
    }

    // Only the centers are clamped; the extent of an oriented box is not
    // representable after cropping without changing its shape.
    fn clip(&mut self, height: f64, width: f64) {
        for row in self.raw.rows_mut() {
            row[0] = row[0].clamp(0.0, width);
            row[1] = row[1].clamp(0.0, height);
        }
    }

    fn select(&self, indices: &[usize]) -> Result<Box<dyn BoxList>, DetError> {
        Ok(Box::new(Self {
            raw: self.raw.select(indices)?,
        }))
    }

    fn to_raw(&self) -> RawBoxes {
        self.raw.clone()
    }

    fn into_raw(self: Box<Self>) -> RawBoxes {
        self.raw
    }

    fn clone_boxed(&self) -> Box<dyn BoxList> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
