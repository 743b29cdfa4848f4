#![allow(dead_code)]

use detset::dataset::Instance;
use detset::mask::RawMask;
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// `(width, height)` pairs, including squares and tiny images.
pub fn arb_shapes(max_len: usize) -> BoxedStrategy<Vec<(u32, u32)>> {
    prop::collection::vec((1u32..64, 1u32..64), 0..=max_len).boxed()
}

/// A ring with an arbitrary coordinate count, so some are invalid.
fn arb_ring(extent: f64) -> BoxedStrategy<Vec<f64>> {
    prop::collection::vec(0.0..extent, 0..12).boxed()
}

/// Any mask payload shape the loader might meet, valid or not.
pub fn arb_raw_mask(height: u32, width: u32) -> BoxedStrategy<Option<RawMask>> {
    let extent = f64::from(height.max(width));
    let plane = height * width;
    prop_oneof![
        Just(None),
        prop::collection::vec(arb_ring(extent), 0..3).prop_map(|rings| Some(RawMask::Polygons(rings))),
        (0..=plane).prop_map(move |on| {
            Some(RawMask::Rle(detset::mask::RleObject {
                counts: Some(serde_json::json!([plane - on, on])),
                size: Some(serde_json::json!([height, width])),
            }))
        }),
        any::<i32>().prop_map(|n| Some(RawMask::Other(serde_json::json!(n)))),
    ]
    .boxed()
}

pub fn arb_instances(height: u32, width: u32, max_len: usize) -> BoxedStrategy<Vec<Instance>> {
    prop::collection::vec((arb_raw_mask(height, width), any::<bool>()), 0..=max_len)
        .prop_map(|items| {
            items
                .into_iter()
                .map(|(mask, ignore_flag)| Instance {
                    bbox: [0.0, 0.0, 1.0, 1.0],
                    bbox_label: 0,
                    ignore_flag,
                    mask,
                })
                .collect()
        })
        .boxed()
}
