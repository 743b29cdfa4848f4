//! Axis-aligned boxes in XYXY format.

use std::any::Any;

use super::{check_dim, BoxList, FromRaw, RawBoxes};
use crate::error::DetError;

/// Axis-aligned boxes stored as rows of `(x1, y1, x2, y2)`.
///
/// Like the raw array it wraps, this type does NOT enforce `x1 <= x2`; boxes
/// read from disk may be malformed and downstream filtering decides what to
/// do with them.
#[derive(Clone, Debug, PartialEq)]
pub struct HorizontalBoxes {
    raw: RawBoxes,
}

impl HorizontalBoxes {
    /// Builds boxes from explicit XYXY rows.
    pub fn from_xyxy(rows: &[[f64; 4]]) -> Self {
        Self {
            raw: RawBoxes::from_rows(rows),
        }
    }

    /// Builds boxes from XYWH rows (top-left corner plus size), as COCO stores them.
    pub fn from_xywh(rows: &[[f64; 4]]) -> Self {
        let converted: Vec<[f64; 4]> = rows
            .iter()
            .map(|&[x, y, w, h]| [x, y, x + w, y + h])
            .collect();
        Self::from_xyxy(&converted)
    }

    /// Returns box `i` as `[x1, y1, x2, y2]`.
    pub fn get(&self, i: usize) -> [f64; 4] {
        let row = self.raw.row(i);
        [row[0], row[1], row[2], row[3]]
    }

    /// Widths of all boxes. May be negative for malformed boxes.
    pub fn widths(&self) -> Vec<f64> {
        self.raw.rows().map(|r| r[2] - r[0]).collect()
    }

    /// Heights of all boxes. May be negative for malformed boxes.
    pub fn heights(&self) -> Vec<f64> {
        self.raw.rows().map(|r| r[3] - r[1]).collect()
    }

    /// Returns true if every box has `x1 <= x2` and `y1 <= y2`.
    pub fn is_ordered(&self) -> bool {
        self.raw.rows().all(|r| r[0] <= r[2] && r[1] <= r[3])
    }
}

impl FromRaw for HorizontalBoxes {
    const BOX_DIM: usize = 4;

    fn from_raw(raw: RawBoxes) -> Result<Self, DetError> {
        check_dim(&raw, Self::BOX_DIM, "HorizontalBoxes")?;
        Ok(Self { raw })
    }
}

impl BoxList for HorizontalBoxes {
    fn box_dim(&self) -> usize {
        Self::BOX_DIM
    }

    fn len(&self) -> usize {
        self.raw.len()
    }

    fn areas(&self) -> Vec<f64> {
        self.raw
            .rows()
            .map(|r| (r[2] - r[0]) * (r[3] - r[1]))
            .collect()
    }

    fn centers(&self) -> Vec<[f64; 2]> {
        self.raw
            .rows()
            .map(|r| [(r[0] + r[2]) / 2.0, (r[1] + r[3]) / 2.0])
            .collect()
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        for row in self.raw.rows_mut() {
            row[0] += dx;
            row[1] += dy;
            row[2] += dx;
            row[3] += dy;
        }
    }

    fn flip_horizontal(&mut self, width: f64) {
        for row in self.raw.rows_mut() {
            let (x1, x2) = (row[0], row[2]);
            row[0] = width - x2;
            row[2] = width - x1;
        }
    }

    fn clip(&mut self, height: f64, width: f64) {
        for row in self.raw.rows_mut() {
            row[0] = row[0].clamp(0.0, width);
            row[1] = row[1].clamp(0.0, height);
            row[2] = row[2].clamp(0.0, width);
            row[3] = row[3].clamp(0.0, height);
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
