//! Box representations and the registry that names them.
//!
//! Boxes travel through the pipeline in one of two shapes:
//!
//! - [`RawBoxes`]: a dense row-major N×D array with no geometric meaning
//!   attached, the shape representation-agnostic transforms work on.
//! - a typed [`BoxList`] (e.g. [`HorizontalBoxes`], [`RotatedBoxes`]) that
//!   knows how to compute areas, flip, clip and so on.
//!
//! [`BoxField`] is the closed sum over both. The [`BoxTypeRegistry`] maps
//! names like `"hbox"` to a [`BoxRepr`] that can build the typed form, and
//! [`BoxCast`] lets a transform declare which typed form it wants to see.

mod cast;
mod horizontal;
mod registry;
mod rotated;

use std::any::Any;
use std::fmt;

use crate::error::DetError;

pub use cast::{BoxCast, Cast};
pub use horizontal::HorizontalBoxes;
pub use registry::{BoxRepr, BoxTypeRef, BoxTypeRegistry};
pub use rotated::RotatedBoxes;

/// A dense row-major N×D array of box coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct RawBoxes {
    data: Vec<f64>,
    dim: usize,
}

impl RawBoxes {
    /// Wraps a flat buffer as an N×`dim` array.
    ///
    /// Fails when `dim` is zero or the buffer length is not a multiple of it.
    pub fn new(data: Vec<f64>, dim: usize) -> Result<Self, DetError> {
        if dim == 0 || data.len() % dim != 0 {
            return Err(DetError::InvalidInput(format!(
                "cannot reshape {} values into rows of {}",
                data.len(),
                dim
            )));
        }
        Ok(Self { data, dim })
    }

    /// Builds an array from fixed-width rows. An empty slice yields a 0×D array.
    pub fn from_rows<const D: usize>(rows: &[[f64; D]]) -> Self {
        Self {
            data: rows.iter().flatten().copied().collect(),
            dim: D.max(1),
        }
    }

    /// An empty 0×`dim` array.
    pub fn empty(dim: usize) -> Self {
        Self {
            data: Vec::new(),
            dim: dim.max(1),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of columns.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Returns row `i`. Panics when out of range, like slice indexing.
    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.dim)
    }

    pub(crate) fn rows_mut(&mut self) -> impl Iterator<Item = &mut [f64]> {
        self.data.chunks_exact_mut(self.dim)
    }

    /// Copies the given rows, in order, into a new array.
    pub fn select(&self, indices: &[usize]) -> Result<Self, DetError> {
        let mut data = Vec::with_capacity(indices.len() * self.dim);
        for &i in indices {
            if i >= self.len() {
                return Err(DetError::IndexOutOfRange {
                    index: i,
                    len: self.len(),
                });
            }
            data.extend_from_slice(self.row(i));
        }
        Ok(Self {
            data,
            dim: self.dim,
        })
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }
}

/// The capability contract every registered box representation satisfies.
pub trait BoxList: fmt::Debug + Send + Sync + 'static {
    /// Number of coordinates per box.
    fn box_dim(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn areas(&self) -> Vec<f64>;

    fn centers(&self) -> Vec<[f64; 2]>;

    fn translate(&mut self, dx: f64, dy: f64);

    /// Mirrors boxes horizontally inside an image of the given width.
    fn flip_horizontal(&mut self, width: f64);

    /// Clamps boxes to an image of shape `(height, width)`.
    fn clip(&mut self, height: f64, width: f64);

    /// Keeps the given boxes, in order, as a new list of the same type.
    fn select(&self, indices: &[usize]) -> Result<Box<dyn BoxList>, DetError>;

    /// Exports the boxes as a raw array, leaving `self` untouched.
    fn to_raw(&self) -> RawBoxes;

    /// Unwraps the boxes back into a raw array without copying.
    fn into_raw(self: Box<Self>) -> RawBoxes;

    fn clone_boxed(&self) -> Box<dyn BoxList>;

    fn as_any(&self) -> &dyn Any;
}

/// Construction side of the contract, used by [`BoxRepr::of`].
pub trait FromRaw: BoxList + Sized {
    /// Required column count of the raw array.
    const BOX_DIM: usize;

    fn from_raw(raw: RawBoxes) -> Result<Self, DetError>;
}

impl Clone for Box<dyn BoxList> {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

pub(crate) fn check_dim(raw: &RawBoxes, expected: usize, type_name: &str) -> Result<(), DetError> {
    if raw.dim() != expected {
        return Err(DetError::InvalidInput(format!(
            "{type_name} expects {expected} values per box, got {}",
            raw.dim()
        )));
    }
    Ok(())
}

/// The `gt_bboxes` slot of a pipeline record.
#[derive(Clone, Debug)]
pub enum BoxField {
    Raw(RawBoxes),
    Typed(Box<dyn BoxList>),
}

impl BoxField {
    pub fn len(&self) -> usize {
        match self {
            BoxField::Raw(raw) => raw.len(),
            BoxField::Typed(boxes) => boxes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_typed(&self) -> bool {
        matches!(self, BoxField::Typed(_))
    }

    /// Exports the current coordinates as a raw array regardless of form.
    pub fn to_raw(&self) -> RawBoxes {
        match self {
            BoxField::Raw(raw) => raw.clone(),
            BoxField::Typed(boxes) => boxes.to_raw(),
        }
    }

    pub fn as_raw(&self) -> Option<&RawBoxes> {
        match self {
            BoxField::Raw(raw) => Some(raw),
            BoxField::Typed(_) => None,
        }
    }

    pub fn as_typed(&self) -> Option<&dyn BoxList> {
        match self {
            BoxField::Raw(_) => None,
            BoxField::Typed(boxes) => Some(&**boxes),
        }
    }

    pub fn as_typed_mut(&mut self) -> Option<&mut (dyn BoxList + 'static)> {
        match self {
            BoxField::Raw(_) => None,
            BoxField::Typed(boxes) => Some(&mut **boxes),
        }
    }

    /// Returns the typed list as a concrete representation, if it is one.
    pub fn downcast_ref<T: BoxList>(&self) -> Option<&T> {
        self.as_typed()
            .and_then(|boxes| boxes.as_any().downcast_ref::<T>())
    }
}
