use std::mem;
use std::vec;

use super::{ImageShapes, Sampler};
use crate::error::DetError;

/// Groups indices into batches of images with the same orientation.
///
/// Indices pulled from the inner sampler go to one of two buckets, portrait
/// (`width < height`) or landscape (`width >= height`); a bucket is emitted
/// as soon as it holds `batch_size` indices. Once the inner sampler runs dry
/// the two remainders are concatenated, portrait first, and cut into
/// batches. The final chunk of that remainder is emitted only when
/// `drop_last` is false, even if it happens to be full.
#[derive(Debug)]
pub struct AspectRatioBatchSampler<'a, S, D: ?Sized> {
    sampler: S,
    shapes: &'a D,
    batch_size: usize,
    drop_last: bool,
}

impl<'a, S: Sampler, D: ImageShapes + ?Sized> AspectRatioBatchSampler<'a, S, D> {
    pub fn new(
        sampler: S,
        shapes: &'a D,
        batch_size: usize,
        drop_last: bool,
    ) -> Result<Self, DetError> {
        if batch_size == 0 {
            return Err(DetError::InvalidInput(
                "batch_size should be a positive integer value, but got batch_size=0".to_string(),
            ));
        }
        Ok(Self {
            sampler,
            shapes,
            batch_size,
            drop_last,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn drop_last(&self) -> bool {
        self.drop_last
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    pub fn set_epoch(&mut self, epoch: u64) {
        self.sampler.set_epoch(epoch);
    }

    /// Estimated batch count: `ceil(n / batch_size)`, or `floor` with `drop_last`.
    ///
    /// Bucketing can produce one batch more or fewer than this.
    pub fn len(&self) -> usize {
        let n = self.sampler.len();
        if self.drop_last {
            n / self.batch_size
        } else {
            n.div_ceil(self.batch_size)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts one epoch. Each call draws a fresh index order from the inner sampler.
    pub fn iter(&self) -> AspectRatioBatches<'a, D> {
        AspectRatioBatches {
            shapes: self.shapes,
            batch_size: self.batch_size,
            drop_last: self.drop_last,
            phase: Phase::Pulling {
                indices: self.sampler.indices().into_iter(),
                buckets: [Vec::new(), Vec::new()],
            },
        }
    }
}

impl<'a, 's, S: Sampler, D: ImageShapes + ?Sized> IntoIterator
    for &'s AspectRatioBatchSampler<'a, S, D>
{
    type Item = Result<Vec<usize>, DetError>;
    type IntoIter = AspectRatioBatches<'a, D>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug)]
enum Phase {
    Pulling {
        indices: vec::IntoIter<usize>,
        buckets: [Vec<usize>; 2],
    },
    Flushing {
        left: Vec<usize>,
        pos: usize,
    },
    Done,
}

/// One epoch of batches from [`AspectRatioBatchSampler::iter`].
///
/// A failed shape lookup is yielded once as an error and ends the epoch.
#[derive(Debug)]
pub struct AspectRatioBatches<'a, D: ?Sized> {
    shapes: &'a D,
    batch_size: usize,
    drop_last: bool,
    phase: Phase,
}

impl<D: ImageShapes + ?Sized> Iterator for AspectRatioBatches<'_, D> {
    type Item = Result<Vec<usize>, DetError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Phase::Pulling { indices, buckets } = &mut self.phase {
            for idx in indices.by_ref() {
                let (width, height) = match self.shapes.image_shape(idx) {
                    Ok(shape) => shape,
                    Err(err) => {
                        self.phase = Phase::Done;
                        return Some(Err(err));
                    }
                };
                let bucket = &mut buckets[usize::from(width >= height)];
                bucket.push(idx);
                if bucket.len() == self.batch_size {
                    return Some(Ok(mem::take(bucket)));
                }
            }

            let [portrait, landscape] = mem::take(buckets);
            let mut left = portrait;
            left.extend(landscape);
            self.phase = Phase::Flushing { left, pos: 0 };
        }

        let Phase::Flushing { left, pos } = &mut self.phase else {
            return None;
        };

        let remaining = left.len() - *pos;
        if remaining == 0 {
            self.phase = Phase::Done;
            return None;
        }
        if remaining <= self.batch_size {
            let tail = left[*pos..].to_vec();
            self.phase = Phase::Done;
            return (!self.drop_last).then_some(Ok(tail));
        }

        let batch = left[*pos..*pos + self.batch_size].to_vec();
        *pos += self.batch_size;
        Some(Ok(batch))
    }
}
