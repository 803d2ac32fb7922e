//! Fixed color tables for indexed recordings
//!
//! GIF and WebP recordings map every pixel onto one shared 256-entry palette
//! instead of optimizing a palette per frame. The table is built once and
//! never mutated, so it can be shared freely between encoder threads.

use std::sync::Arc;

use crate::errors::RecorderError;

lazy_static::lazy_static! {
    static ref PLAN9: Arc<Palette> = Arc::new(Palette::plan9());
}

/// Immutable RGB color table of at most 256 entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<[u8; 3]>,
}

impl Palette {
    pub fn from_colors(colors: Vec<[u8; 3]>) -> Result<Self, RecorderError> {
        if colors.is_empty() || colors.len() > 256 {
            return Err(RecorderError::InvalidConfig(format!(
                "palette must hold 1 to 256 colors, got {}",
                colors.len()
            )));
        }
        Ok(Self { colors })
    }

    /// The Plan 9 color map: a 4x4x4 RGB cube, each cell split into four
    /// intensity steps, plus a gray ramp.
    pub fn plan9() -> Self {
        let mut colors = vec![[0u8; 3]; 256];
        let mut i: i32 = 0;
        for r in 0..4i32 {
            for v in 0..4i32 {
                let mut j = v - r;
                for g in 0..4i32 {
                    for b in 0..4i32 {
                        let den = r.max(g).max(b);
                        let rgb = if den == 0 {
                            let gray = (0x11 * v) as u8;
                            [gray, gray, gray]
                        } else {
                            let num = 17 * (4 * den + v);
                            [
                                (r * num / den) as u8,
                                (g * num / den) as u8,
                                (b * num / den) as u8,
                            ]
                        };
                        colors[(i + (j & 0x0f)) as usize] = rgb;
                        j += 1;
                    }
                }
                i += 16;
            }
        }
        Self { colors }
    }

    /// Process-wide shared Plan 9 palette
    pub fn shared_plan9() -> Arc<Palette> {
        PLAN9.clone()
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn colors(&self) -> &[[u8; 3]] {
        &self.colors
    }

    pub fn color(&self, index: u8) -> [u8; 3] {
        self.colors
            .get(index as usize)
            .copied()
            .unwrap_or([0, 0, 0])
    }

    /// Index of the closest entry by squared RGB distance; ties go to the
    /// lowest index.
    pub fn nearest(&self, rgb: [u8; 3]) -> u8 {
        let mut best = 0usize;
        let mut best_dist = u32::MAX;
        for (i, c) in self.colors.iter().enumerate() {
            let d = distance_sq(*c, rgb);
            if d < best_dist {
                best = i;
                best_dist = d;
                if d == 0 {
                    break;
                }
            }
        }
        best as u8
    }

    /// Squared distance from `rgb` to its nearest palette entry
    pub fn nearest_distance_sq(&self, rgb: [u8; 3]) -> u32 {
        distance_sq(self.color(self.nearest(rgb)), rgb)
    }

    /// Flat `r, g, b, r, g, b, ...` table, padded to a power-of-two entry
    /// count as GIF color tables require.
    pub fn rgb_table(&self) -> Vec<u8> {
        let entries = self.colors.len().next_power_of_two().max(2);
        let mut table = Vec::with_capacity(entries * 3);
        for c in &self.colors {
            table.extend_from_slice(c);
        }
        table.resize(entries * 3, 0);
        table
    }
}

pub fn distance_sq(a: [u8; 3], b: [u8; 3]) -> u32 {
    let dr = a[0] as i32 - b[0] as i32;
    let dg = a[1] as i32 - b[1] as i32;
    let db = a[2] as i32 - b[2] as i32;
    (dr * dr + dg * dg + db * db) as u32
}
