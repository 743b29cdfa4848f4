//! COCO-compatible run-length encoding.
//!
//! Runs are counted over the plane in column-major order, alternating
//! background and foreground and always starting with background (a leading
//! zero-length run is used when the first pixel is foreground). The polygon
//! rasterizer and the compressed string format match the reference
//! `maskApi.c` so that masks agree pixel-for-pixel with COCO tooling.

use serde::{Deserialize, Serialize};

use super::Bitmap;

/// Upsampling factor used when walking polygon edges.
const POLY_SCALE: f64 = 5.0;

/// How far outside the plane, in multiples of its larger side, a polygon
/// vertex may lie and still be rasterized.
const POLY_REACH: f64 = 4.0;

/// Returns true when every coordinate of the ring is finite and within
/// [`POLY_REACH`] plane sizes of the origin.
pub fn ring_within_reach(xy: &[f64], height: u32, width: u32) -> bool {
    let limit = POLY_REACH * f64::from(height.max(width).max(1));
    xy.iter().all(|c| c.is_finite() && c.abs() <= limit)
}

/// A run-length encoded binary plane.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rle {
    pub height: u32,
    pub width: u32,
    pub counts: Vec<u32>,
}

impl Rle {
    /// An all-background plane.
    pub fn empty(height: u32, width: u32) -> Self {
        let pixels = u64::from(height) * u64::from(width);
        Self {
            height,
            width,
            counts: vec![u32::try_from(pixels).unwrap_or(u32::MAX)],
        }
    }

    /// Number of pixels in the plane.
    pub fn pixel_count(&self) -> u64 {
        self.height as u64 * self.width as u64
    }

    /// Returns true when the runs cover the plane exactly.
    pub fn is_consistent(&self) -> bool {
        self.counts.iter().map(|&c| c as u64).sum::<u64>() == self.pixel_count()
    }

    /// Number of foreground pixels.
    pub fn area(&self) -> u64 {
        self.counts.iter().skip(1).step_by(2).map(|&c| c as u64).sum()
    }

    /// Encodes a bitmap.
    pub fn encode(bitmap: &Bitmap) -> Self {
        let (height, width) = (bitmap.height(), bitmap.width());
        let mut counts = Vec::new();
        let mut current = false;
        let mut run: u32 = 0;

        for x in 0..width {
            for y in 0..height {
                let value = bitmap.get(y, x);
                if value != current {
                    counts.push(run);
                    run = 0;
                    current = value;
                }
                run += 1;
            }
        }
        counts.push(run);

        Self {
            height,
            width,
            counts,
        }
    }

    /// Decodes into a bitmap. Runs past the end of the plane are truncated.
    pub fn decode(&self) -> Bitmap {
        let mut bitmap = Bitmap::new(self.height, self.width);
        let h = self.height as usize;
        let n = self.pixel_count() as usize;
        let mut pos = 0usize;
        let mut value = false;

        for &count in &self.counts {
            let end = (pos + count as usize).min(n);
            if value {
                for k in pos..end {
                    bitmap.set((k % h) as u32, (k / h) as u32, true);
                }
            }
            pos = end;
            value = !value;
        }
        bitmap
    }

    /// Rasterizes one polygon given as flat `[x0, y0, x1, y1, ...]` coordinates.
    ///
    /// Edges are walked on a 5× upsampled grid, and the crossings that land
    /// on pixel centers become run boundaries. Rings with fewer than three
    /// points, or with a vertex out of [`ring_within_reach`], produce an
    /// empty mask.
    pub fn from_polygon(xy: &[f64], height: u32, width: u32) -> Self {
        let k = xy.len() / 2;
        if k == 0 || !ring_within_reach(xy, height, width) {
            return Self::empty(height, width);
        }
        let (h, w) = (height as i64, width as i64);

        let mut x: Vec<i64> = (0..k).map(|j| (POLY_SCALE * xy[2 * j] + 0.5) as i64).collect();
        let mut y: Vec<i64> = (0..k)
            .map(|j| (POLY_SCALE * xy[2 * j + 1] + 0.5) as i64)
            .collect();
        x.push(x[0]);
        y.push(y[0]);

        // Dense points along the whole boundary.
        let mut u: Vec<i64> = Vec::new();
        let mut v: Vec<i64> = Vec::new();
        for j in 0..k {
            let (mut xs, mut xe, mut ys, mut ye) = (x[j], x[j + 1], y[j], y[j + 1]);
            let dx = (xe - xs).abs();
            let dy = (ys - ye).abs();
            let flip = (dx >= dy && xs > xe) || (dx < dy && ys > ye);
            if flip {
                std::mem::swap(&mut xs, &mut xe);
                std::mem::swap(&mut ys, &mut ye);
            }
            if dx >= dy {
                let s = if dx == 0 {
                    0.0
                } else {
                    (ye - ys) as f64 / dx as f64
                };
                for d in 0..=dx {
                    let t = if flip { dx - d } else { d };
                    u.push(t + xs);
                    v.push((ys as f64 + s * t as f64 + 0.5) as i64);
                }
            } else {
                let s = (xe - xs) as f64 / dy as f64;
                for d in 0..=dy {
                    let t = if flip { dy - d } else { d };
                    v.push(t + ys);
                    u.push((xs as f64 + s * t as f64 + 0.5) as i64);
                }
            }
        }

        // Keep the crossings that fall on pixel columns, back at unit scale.
        let mut boundary: Vec<u64> = Vec::new();
        for j in 1..u.len() {
            if u[j] == u[j - 1] {
                continue;
            }
            let xd = (if u[j] < u[j - 1] { u[j] } else { u[j] - 1 }) as f64;
            let xd = (xd + 0.5) / POLY_SCALE - 0.5;
            if xd.floor() != xd || xd < 0.0 || xd > (w - 1) as f64 {
                continue;
            }
            let yd = v[j].min(v[j - 1]) as f64;
            let yd = ((yd + 0.5) / POLY_SCALE - 0.5).clamp(0.0, h as f64).ceil();
            boundary.push((xd as i64 * h + yd as i64) as u64);
        }

        boundary.push((h * w) as u64);
        boundary.sort_unstable();

        let mut prev = 0u64;
        for pos in boundary.iter_mut() {
            let at = *pos;
            *pos -= prev;
            prev = at;
        }

        // Zero-length runs collapse their neighbours together.
        let mut counts: Vec<u32> = vec![boundary[0] as u32];
        let mut j = 1;
        while j < boundary.len() {
            if boundary[j] > 0 {
                counts.push(boundary[j] as u32);
                j += 1;
            } else {
                j += 1;
                if j < boundary.len() {
                    if let Some(last) = counts.last_mut() {
                        *last += boundary[j] as u32;
                    }
                    j += 1;
                }
            }
        }

        Self {
            height,
            width,
            counts,
        }
    }

    /// Rasterizes all rings of one instance and unions them.
    pub fn from_polygons(rings: &[Vec<f64>], height: u32, width: u32) -> Self {
        let rles: Vec<Rle> = rings
            .iter()
            .map(|ring| Self::from_polygon(ring, height, width))
            .collect();
        if rles.is_empty() {
            return Self::empty(height, width);
        }
        Self::merge(&rles, false)
    }

    /// Merges several planes by union, or by intersection when `intersect` is set.
    ///
    /// Planes of differing shape yield an empty 0×0 result.
    pub fn merge(rles: &[Rle], intersect: bool) -> Self {
        let Some((first, rest)) = rles.split_first() else {
            return Self {
                height: 0,
                width: 0,
                counts: Vec::new(),
            };
        };

        let mut counts = first.counts.clone();
        for other in rest {
            if other.height != first.height || other.width != first.width {
                return Self {
                    height: 0,
                    width: 0,
                    counts: Vec::new(),
                };
            }
            counts = merge_counts(&counts, &other.counts, intersect);
        }

        Self {
            height: first.height,
            width: first.width,
            counts,
        }
    }

    /// Parses the compact COCO string form of `counts`.
    ///
    /// Returns `None` when a run decodes to a negative or oversized count.
    pub fn from_compressed(s: &str, height: u32, width: u32) -> Option<Self> {
        let bytes = s.as_bytes();
        let mut counts: Vec<u32> = Vec::new();
        let mut p = 0;

        while p < bytes.len() {
            let mut x: i64 = 0;
            let mut k: u32 = 0;
            let mut more = true;
            while more && p < bytes.len() {
                let c = bytes[p] as i64 - 48;
                x |= (c & 0x1f).wrapping_shl(5 * k);
                more = c & 0x20 != 0;
                p += 1;
                k += 1;
                if !more && c & 0x10 != 0 {
                    x |= (-1i64).wrapping_shl(5 * k);
                }
            }
            if counts.len() > 2 {
                x = x.checked_add(i64::from(counts[counts.len() - 2]))?;
            }
            counts.push(u32::try_from(x).ok()?);
        }

        Some(Self {
            height,
            width,
            counts,
        })
    }

    /// Serializes `counts` into the compact COCO string form.
    pub fn to_compressed(&self) -> String {
        let mut s = String::new();
        for (i, &count) in self.counts.iter().enumerate() {
            let mut x = count as i64;
            if i > 2 {
                x -= self.counts[i - 2] as i64;
            }
            loop {
                let mut c = x & 0x1f;
                x >>= 5;
                let more = if c & 0x10 != 0 { x != -1 } else { x != 0 };
                if more {
                    c |= 0x20;
                }
                s.push(char::from((c + 48) as u8));
                if !more {
                    break;
                }
            }
        }
        s
    }
}

fn merge_counts(a: &[u32], b: &[u32], intersect: bool) -> Vec<u32> {
    let mut out = Vec::new();
    let (mut ca, mut cb) = (
        a.first().copied().unwrap_or(0),
        b.first().copied().unwrap_or(0),
    );
    let (mut va, mut vb, mut v) = (false, false, false);
    let (mut ia, mut ib) = (1usize, 1usize);
    let mut acc: u32 = 0;

    loop {
        // Runs that do not cover the same number of pixels cannot be merged
        // further; stop instead of spinning on zero-length steps.
        if (ca == 0 && ia >= a.len()) != (cb == 0 && ib >= b.len()) {
            if acc > 0 {
                out.push(acc);
            }
            break;
        }

        let c = ca.min(cb);
        acc += c;
        let mut remaining = 0;

        ca -= c;
        if ca == 0 && ia < a.len() {
            ca = a[ia];
            ia += 1;
            va = !va;
        }
        remaining += ca;

        cb -= c;
        if cb == 0 && ib < b.len() {
            cb = b[ib];
            ib += 1;
            vb = !vb;
        }
        remaining += cb;

        let previous = v;
        v = if intersect { va && vb } else { va || vb };
        if v != previous || remaining == 0 {
            out.push(acc);
            acc = 0;
        }
        if remaining == 0 {
            break;
        }
    }
    out
}
