//! Fuzz target for compressed RLE counts.
//!
//! Decoding arbitrary strings must never panic, and any counts that parse
//! must decode into a bitmap that stays within the plane.

#![no_main]

use detset::mask::Rle;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 || data.len() > 64 * 1024 {
        return;
    }

    let (height, width) = (u32::from(data[0] % 64), u32::from(data[1] % 64));
    let Ok(counts) = std::str::from_utf8(&data[2..]) else {
        return;
    };

    let Some(rle) = Rle::from_compressed(counts, height, width) else {
        return;
    };
    let bitmap = rle.decode();
    assert!(bitmap.count_ones() <= u64::from(height * width));
});
