//! Adaptive speed correction.
//!
//! Given the signed gap between where the follower should be and where it is,
//! decide between a hard seek, resetting to the nominal speed, or a bounded
//! speed bend shaped by a piecewise-linear curve.

use crate::settings::{CorrectionCurve, MAX_SPEED, MIN_SPEED, SyncSettings};

/// What the follower should do about one position snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    /// Gap too large for speed shaping: jump to `target`. Speed untouched.
    HardSeek { target: f64 },
    /// Within the hysteresis band: play at the nominal speed.
    InSync { speed: f64 },
    /// Bend the speed towards the target.
    Adjust { speed: f64 },
}

impl Correction {
    /// Speed the player should run at, if the correction sets one.
    pub fn speed(&self) -> Option<f64> {
        match *self {
            Correction::HardSeek { .. } => None,
            Correction::InSync { speed } | Correction::Adjust { speed } => Some(speed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Corrector {
    seek_threshold: f64,
    speed_adjust_threshold: f64,
    max_speed_adjust: f64,
    curve: CorrectionCurve,
}

impl Corrector {
    pub fn new(settings: &SyncSettings) -> Self {
        Self {
            seek_threshold: settings.seek_threshold,
            speed_adjust_threshold: settings.speed_adjust_threshold,
            max_speed_adjust: settings.max_speed_adjust,
            curve: settings.curve(),
        }
    }

    /// Magnitude of the speed change for a gap of `abs_diff` seconds, before
    /// it is added to the base speed.
    pub fn adjustment(&self, abs_diff: f64) -> f64 {
        self.curve
            .magnitude(abs_diff, self.speed_adjust_threshold)
            .clamp(0.0, self.max_speed_adjust)
    }

    /// Decide how to close the gap between `target` and `current`.
    ///
    /// `diff = target - current`; positive means the follower is behind.
    pub fn correct(&self, target: f64, current: f64, base_speed: f64) -> Correction {
        let diff = target - current;
        let abs_diff = diff.abs();

        if abs_diff > self.seek_threshold {
            return Correction::HardSeek { target };
        }
        if abs_diff < self.speed_adjust_threshold {
            return Correction::InSync { speed: base_speed };
        }

        let adjust = self.adjustment(abs_diff).copysign(diff);
        Correction::Adjust {
            speed: (base_speed + adjust).clamp(MIN_SPEED, MAX_SPEED),
        }
    }
}
