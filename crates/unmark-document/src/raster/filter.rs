// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Frame filter — applies a color policy to every pixel of a rendered page.

use image::RgbImage;
use rayon::prelude::*;
use tracing::{debug, instrument};
use unmark_core::Rgb;

use crate::classify::ColorPolicy;

/// Rewrites replace-classified pixels of a grid in place.
///
/// Pixels the policy keeps are never written, so they stay byte-for-byte
/// identical. Rows are independent and are processed on the rayon pool.
#[derive(Debug, Clone, Copy)]
pub struct FrameFilter {
    policy: ColorPolicy,
}

impl FrameFilter {
    pub fn new(policy: ColorPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ColorPolicy {
        self.policy
    }

    /// Filter `grid` in place and return how many pixels were replaced.
    #[instrument(skip_all, fields(width = grid.width(), height = grid.height()))]
    pub fn apply(&self, grid: &mut RgbImage) -> u64 {
        let row_len = grid.width() as usize * 3;
        if row_len == 0 || grid.height() == 0 {
            return 0;
        }

        let policy = self.policy;
        let replaced: u64 = grid
            .par_chunks_mut(row_len)
            .map(|row| filter_row(&policy, row))
            .sum();

        debug!(replaced, "Frame filtered");
        replaced
    }
}

fn filter_row(policy: &ColorPolicy, row: &mut [u8]) -> u64 {
    let mut replaced = 0;
    for pixel in row.chunks_exact_mut(3) {
        let color = Rgb([pixel[0], pixel[1], pixel[2]]);
        if let Some(Rgb(new)) = policy.classify(color) {
            pixel.copy_from_slice(&new);
            replaced += 1;
        }
    }
    replaced
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb as Px;

    fn filter() -> FrameFilter {
        FrameFilter::new(ColorPolicy::distance(100.0))
    }

    #[test]
    fn white_grid_is_untouched() {
        let mut grid = RgbImage::from_pixel(17, 9, Px([255, 255, 255]));
        let before = grid.clone();
        assert_eq!(filter().apply(&mut grid), 0);
        assert_eq!(grid, before);
    }

    #[test]
    fn boundary_pixels() {
        let mut grid = RgbImage::new(4, 1);
        grid.put_pixel(0, 0, Px([100, 0, 0])); // distance 100: keep
        grid.put_pixel(1, 0, Px([101, 0, 0])); // distance 101: replace
        grid.put_pixel(2, 0, Px([255, 255, 0])); // highlight
        grid.put_pixel(3, 0, Px([10, 20, 30])); // ink

        assert_eq!(filter().apply(&mut grid), 2);
        assert_eq!(grid.get_pixel(0, 0), &Px([100, 0, 0]));
        assert_eq!(grid.get_pixel(1, 0), &Px([255, 255, 255]));
        assert_eq!(grid.get_pixel(2, 0), &Px([255, 255, 255]));
        assert_eq!(grid.get_pixel(3, 0), &Px([10, 20, 30]));
    }

    #[test]
    fn every_pixel_visited_across_rows() {
        // Yellow everywhere except a black diagonal.
        let mut grid = RgbImage::from_fn(64, 48, |x, y| {
            if x == y { Px([0, 0, 0]) } else { Px([255, 255, 0]) }
        });
        let replaced = filter().apply(&mut grid);
        assert_eq!(replaced, 64 * 48 - 48);
        for (x, y, px) in grid.enumerate_pixels() {
            let expected = if x == y { Px([0, 0, 0]) } else { Px([255, 255, 255]) };
            assert_eq!(*px, expected, "pixel ({x}, {y})");
        }
    }

    #[test]
    fn empty_grid_is_a_no_op() {
        let mut grid = RgbImage::new(0, 0);
        assert_eq!(filter().apply(&mut grid), 0);
    }
}
