mod common;

use std::path::PathBuf;

use common::{obj, write_voc, CLASSES};
use detset::config::DatasetConfig;
use detset::dataset::DetDataset;
use detset::sampler::{AnySampler, AspectRatioBatchSampler, Sampler};
use detset::DetError;

/// Orientations by index: P L P L L P L.
fn dataset(root: &std::path::Path, lazy: bool) -> DetDataset<detset::dataset::AnySource> {
    let shapes = [(10, 20), (20, 10), (5, 9), (8, 8), (30, 10), (1, 2), (640, 480)];
    let entries: Vec<_> = shapes
        .iter()
        .enumerate()
        .map(|(i, &size)| (format!("{i:03}"), size))
        .collect();
    write_voc(
        root,
        &entries
            .iter()
            .map(|(id, size)| (id.as_str(), Some(*size), vec![obj("cat", [1, 1, 2, 2])]))
            .collect::<Vec<_>>(),
    );
    let config = DatasetConfig {
        data_root: root.to_path_buf(),
        ann_file: Some(PathBuf::from("ImageSets/Main/train.txt")),
        classes: CLASSES.iter().map(|c| c.to_string()).collect(),
        lazy_init: lazy,
        ..Default::default()
    };
    DetDataset::from_config(&config).expect("dataset")
}

fn epoch<S: Sampler>(
    sampler: &AspectRatioBatchSampler<'_, S, DetDataset<detset::dataset::AnySource>>,
) -> Vec<Vec<usize>> {
    sampler.iter().collect::<Result<_, _>>().expect("batches")
}

#[test]
fn batches_follow_dataset_shapes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let dataset = dataset(dir.path(), false);

    let sampler =
        AspectRatioBatchSampler::new(AnySampler::new(dataset.len(), false, None), &dataset, 2, false)
            .expect("sampler");
    assert_eq!(
        epoch(&sampler),
        vec![vec![0, 2], vec![1, 3], vec![4, 6], vec![5]]
    );
    assert_eq!(sampler.len(), 4);
}

#[test]
fn seeded_shuffle_is_reproducible_and_changes_per_epoch() {
    let dir = tempfile::tempdir().expect("tempdir");
    let dataset = dataset(dir.path(), false);

    let make = || {
        AspectRatioBatchSampler::new(AnySampler::new(dataset.len(), true, Some(42)), &dataset, 3, false)
            .expect("sampler")
    };
    let mut a = make();
    let b = make();
    assert_eq!(epoch(&a), epoch(&b));

    let first = epoch(&a);
    let differs = (1..10).any(|e| {
        a.set_epoch(e);
        epoch(&a) != first
    });
    assert!(differs);

    let mut all: Vec<usize> = epoch(&a).into_iter().flatten().collect();
    all.sort_unstable();
    assert_eq!(all, (0..dataset.len()).collect::<Vec<_>>());
}

#[test]
fn uninitialized_dataset_yields_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let dataset = dataset(dir.path(), true);

    // A lazy dataset reports zero length, so size the inner sampler by hand.
    let sampler =
        AspectRatioBatchSampler::new(AnySampler::new(3, false, None), &dataset, 2, false)
            .expect("sampler");
    let mut batches = sampler.iter();
    assert!(matches!(batches.next(), Some(Err(DetError::NotInitialized))));
    assert!(batches.next().is_none());
}

#[test]
fn for_loop_over_reference() {
    let dir = tempfile::tempdir().expect("tempdir");
    let dataset = dataset(dir.path(), false);
    let sampler =
        AspectRatioBatchSampler::new(AnySampler::new(dataset.len(), false, None), &dataset, 4, true)
            .expect("sampler");

    let mut count = 0;
    for batch in &sampler {
        assert_eq!(batch.expect("batch").len(), 4);
        count += 1;
    }
    // Landscape fills one batch of four; the three portraits are dropped.
    assert_eq!(count, 1);
}
