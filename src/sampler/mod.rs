//! Index samplers and the aspect-ratio batch sampler built on them.

mod aspect_ratio;

use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};

use crate::error::DetError;

pub use aspect_ratio::{AspectRatioBatchSampler, AspectRatioBatches};

/// Produces the index order of one epoch.
pub trait Sampler {
    /// Number of indices per epoch.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The indices of the current epoch, in sampling order.
    fn indices(&self) -> Vec<usize>;

    /// Selects the epoch for samplers whose order depends on it.
    fn set_epoch(&mut self, _epoch: u64) {}
}

/// Image dimensions by dataset index.
pub trait ImageShapes {
    /// `(width, height)` of record `idx`.
    fn image_shape(&self, idx: usize) -> Result<(u32, u32), DetError>;
}

impl ImageShapes for [(u32, u32)] {
    fn image_shape(&self, idx: usize) -> Result<(u32, u32), DetError> {
        self.get(idx).copied().ok_or(DetError::IndexOutOfRange {
            index: idx,
            len: self.len(),
        })
    }
}

/// `0, 1, ..., len - 1`.
#[derive(Clone, Debug)]
pub struct SequentialSampler {
    len: usize,
}

impl SequentialSampler {
    pub fn new(len: usize) -> Self {
        Self { len }
    }
}

impl Sampler for SequentialSampler {
    fn len(&self) -> usize {
        self.len
    }

    fn indices(&self) -> Vec<usize> {
        (0..self.len).collect()
    }
}

/// A permutation of `0..len`.
///
/// With a seed the permutation is reproducible and changes with
/// [`Sampler::set_epoch`]; without one every call draws a fresh order.
#[derive(Clone, Debug)]
pub struct RandomSampler {
    len: usize,
    seed: Option<u64>,
    epoch: u64,
}

impl RandomSampler {
    pub fn new(len: usize, seed: Option<u64>) -> Self {
        Self {
            len,
            seed,
            epoch: 0,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl Sampler for RandomSampler {
    fn len(&self) -> usize {
        self.len
    }

    fn indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.len).collect();
        if let Some(seed) = self.seed {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(self.epoch));
            indices.shuffle(&mut rng);
        } else {
            let mut rng = rand::rng();
            indices.shuffle(&mut rng);
        }
        indices
    }

    fn set_epoch(&mut self, epoch: u64) {
        self.epoch = epoch;
    }
}

/// Sequential or random, as chosen by configuration.
#[derive(Clone, Debug)]
pub enum AnySampler {
    Sequential(SequentialSampler),
    Random(RandomSampler),
}

impl AnySampler {
    pub fn new(len: usize, shuffle: bool, seed: Option<u64>) -> Self {
        if shuffle {
            AnySampler::Random(RandomSampler::new(len, seed))
        } else {
            AnySampler::Sequential(SequentialSampler::new(len))
        }
    }
}

impl Sampler for AnySampler {
    fn len(&self) -> usize {
        match self {
            AnySampler::Sequential(s) => s.len(),
            AnySampler::Random(s) => s.len(),
        }
    }

    fn indices(&self) -> Vec<usize> {
        match self {
            AnySampler::Sequential(s) => s.indices(),
            AnySampler::Random(s) => s.indices(),
        }
    }

    fn set_epoch(&mut self, epoch: u64) {
        if let AnySampler::Random(s) = self {
            s.set_epoch(epoch);
        }
    }
}
