// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Color classifier — decides whether a color is highlight (replace) or content
// (keep). Both engines share it with different policies.

use unmark_core::{Rgb, UnmarkConfig};

/// Replace-or-keep decision policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColorPolicy {
    /// Keep white and anything within `threshold` (Euclidean, 0-255 space) of
    /// black; everything else becomes white.
    DistanceFromBlack { threshold: f64 },
    /// Replace exactly `target` with `replacement`; nothing else changes.
    ExactMatch { target: Rgb, replacement: Rgb },
}

impl ColorPolicy {
    pub fn distance(threshold: f64) -> Self {
        Self::DistanceFromBlack { threshold }
    }

    pub fn exact(target: Rgb, replacement: Rgb) -> Self {
        Self::ExactMatch {
            target,
            replacement,
        }
    }

    /// The pixel policy of the rasterizing engine.
    pub fn raster_from_config(config: &UnmarkConfig) -> Self {
        Self::distance(config.black_threshold)
    }

    /// The token policy of the rewriting engine.
    pub fn rewrite_from_config(config: &UnmarkConfig) -> Self {
        Self::exact(config.target_color, config.replacement_color)
    }

    /// `true` when `color` must be replaced.
    #[inline]
    pub fn should_replace(&self, color: Rgb) -> bool {
        match *self {
            Self::DistanceFromBlack { threshold } => {
                if color == Rgb::WHITE {
                    return false;
                }
                // Squared comparison keeps integral boundaries exact.
                (squared_distance_from_black(color) as f64) > threshold * threshold
            }
            Self::ExactMatch { target, .. } => color == target,
        }
    }

    /// The color written in place of a replaced one.
    pub fn replacement(&self) -> Rgb {
        match *self {
            Self::DistanceFromBlack { .. } => Rgb::WHITE,
            Self::ExactMatch { replacement, .. } => replacement,
        }
    }

    /// `Some(replacement)` if `color` must change, `None` to keep it.
    #[inline]
    pub fn classify(&self, color: Rgb) -> Option<Rgb> {
        self.should_replace(color).then(|| self.replacement())
    }
}

/// `r² + g² + b²`.
#[inline]
pub fn squared_distance_from_black(color: Rgb) -> u32 {
    let [r, g, b] = color.0.map(u32::from);
    r * r + g * g + b * b
}

/// Euclidean distance of `color` from pure black.
pub fn distance_from_black(color: Rgb) -> f64 {
    (squared_distance_from_black(color) as f64).sqrt()
}
