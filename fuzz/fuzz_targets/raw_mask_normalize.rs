//! Fuzz target for mask validation.
//!
//! Any JSON mask payload must come back as exactly one mask and one ignore
//! flag per instance.

#![no_main]

use detset::dataset::Instance;
use detset::mask::{normalize_masks, RawMask};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 * 1024 {
        return;
    }

    let Ok(mask) = serde_json::from_slice::<RawMask>(data) else {
        return;
    };

    let mut instances = vec![Instance {
        bbox: [0.0, 0.0, 1.0, 1.0],
        bbox_label: 0,
        ignore_flag: false,
        mask: Some(mask),
    }];
    let out = normalize_masks(&mut instances, 16, 16, true);
    assert_eq!(out.masks.len(), 1);
    assert_eq!(out.ignore_flags.len(), 1);
});
