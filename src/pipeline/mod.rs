//! Per-sample transform pipeline.
//!
//! A [`Results`] value carries one sample through a [`Compose`] of
//! [`Transform`]s. The dataset fills in the raw fields (`img_path`,
//! `ori_shape`, `instances`, ...), and transforms such as
//! [`LoadAnnotations`] add the `gt_*` fields.

mod loading;
mod seg_map;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::boxes::BoxField;
use crate::dataset::{DatasetRecord, Instance, Proposals};
use crate::error::DetError;
use crate::mask::Masks;

pub use loading::LoadAnnotations;
pub use seg_map::SegMap;

/// The mutable per-sample record that transforms consume and produce.
#[derive(Clone, Debug, Default)]
pub struct Results {
    pub img_id: String,
    pub img_path: PathBuf,
    /// `(height, width)` of the source image.
    pub ori_shape: (u32, u32),
    pub instances: Vec<Instance>,
    pub seg_map_path: Option<PathBuf>,
    /// Old → new semantic label mapping applied to `gt_seg_map`.
    pub label_map: Option<BTreeMap<u16, u16>>,
    pub proposals: Option<Proposals>,

    pub gt_bboxes: Option<BoxField>,
    pub gt_bboxes_labels: Option<Vec<i64>>,
    pub gt_ignore_flags: Option<Vec<bool>>,
    pub gt_masks: Option<Masks>,
    pub gt_seg_map: Option<SegMap>,
    pub ignore_index: Option<u16>,

    /// Extra samples attached by mixing transforms for the duration of a call.
    pub mix_results: Vec<Results>,
}

impl Results {
    /// Seeds a sample from a dataset record.
    pub fn from_record(record: DatasetRecord) -> Self {
        Self {
            img_id: record.img_id,
            img_path: record.img_path,
            ori_shape: (record.height, record.width),
            instances: record.instances,
            seg_map_path: record.seg_map_path,
            proposals: record.proposals,
            ..Default::default()
        }
    }
}

/// One step of a pipeline.
///
/// Returning `Ok(None)` drops the sample; later steps are not run.
pub trait Transform {
    fn transform(&self, results: Results) -> Result<Option<Results>, DetError>;
}

impl<T: Transform + ?Sized> Transform for Box<T> {
    fn transform(&self, results: Results) -> Result<Option<Results>, DetError> {
        (**self).transform(results)
    }
}

/// Adapts a closure into a [`Transform`].
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: Fn(Results) -> Result<Option<Results>, DetError>,
{
    FromFn(f)
}

/// See [`from_fn`].
#[derive(Clone)]
pub struct FromFn<F>(F);

impl<F> fmt::Debug for FromFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FromFn")
    }
}

impl<F> Transform for FromFn<F>
where
    F: Fn(Results) -> Result<Option<Results>, DetError>,
{
    fn transform(&self, results: Results) -> Result<Option<Results>, DetError> {
        (self.0)(results)
    }
}

/// Runs transforms in order.
#[derive(Default)]
pub struct Compose {
    steps: Vec<Box<dyn Transform + Send + Sync>>,
}

impl Compose {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<T: Transform + Send + Sync + 'static>(&mut self, step: T) -> &mut Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn with<T: Transform + Send + Sync + 'static>(mut self, step: T) -> Self {
        self.push(step);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Debug for Compose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compose")
            .field("steps", &self.steps.len())
            .finish()
    }
}

impl Transform for Compose {
    fn transform(&self, mut results: Results) -> Result<Option<Results>, DetError> {
        for step in &self.steps {
            match step.transform(results)? {
                Some(next) => results = next,
                None => return Ok(None),
            }
        }
        Ok(Some(results))
    }
}
