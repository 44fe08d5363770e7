//! Knot-vector clean-up for the host's strict NURBS rules.
//!
//! The host rejects knots that repeat "almost" but not bit-exactly, so runs
//! of nearly equal knots are collapsed onto one representative value before
//! a curve or surface is handed over.

use serde::{Deserialize, Serialize};

/// Thresholds under which two adjacent knots count as the same value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KnotTolerance {
    #[serde(rename = "@absolute")]
    pub absolute: f64,
    /// Fraction of the larger of the two knot magnitudes.
    #[serde(rename = "@relative")]
    pub relative: f64,
}

impl KnotTolerance {
    pub const DEFAULT: Self = Self {
        absolute: 1e-9,
        relative: 1e-9,
    };

    #[must_use]
    pub fn are_equal(&self, a: f64, b: f64) -> bool {
        let difference = (b - a).abs();
        difference <= self.absolute || difference <= self.relative * a.abs().max(b.abs())
    }
}

impl Default for KnotTolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Curves tolerate less interior multiplicity than surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnotOwner {
    Curve,
    Surface,
}

impl KnotOwner {
    /// Highest interior multiplicity that is not a kink.
    #[must_use]
    pub const fn max_smooth_multiplicity(self, degree: usize) -> usize {
        match self {
            Self::Curve => degree.saturating_sub(1),
            Self::Surface => degree,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnotRun {
    pub value: f64,
    pub start: usize,
    pub multiplicity: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KnotReport {
    pub knots: Vec<f64>,
    pub runs: Vec<KnotRun>,
    /// Number of knots whose value changed.
    pub snapped: usize,
    /// Interior knot values whose multiplicity marks a kink.
    pub kinks: Vec<f64>,
}

impl KnotReport {
    #[must_use]
    pub fn is_smooth(&self) -> bool {
        self.kinks.is_empty()
    }
}

/// Groups adjacent equal knots into runs and snaps every run onto its most
/// frequent exact value (the first one on ties).
#[must_use]
pub fn normalize_knots(knots: &[f64], degree: usize, owner: KnotOwner, tolerance: &KnotTolerance) -> KnotReport {
    let mut result = knots.to_vec();
    let mut runs = Vec::new();
    let mut snapped = 0;

    let mut start = 0;
    while start < knots.len() {
        let mut end = start + 1;
        while end < knots.len() && tolerance.are_equal(knots[end - 1], knots[end]) {
            end += 1;
        }

        let run = &knots[start..end];
        let value = representative(run);
        for (slot, &original) in result[start..end].iter_mut().zip(run) {
            #[allow(clippy::float_cmp)]
            let unchanged = original == value;
            if !unchanged {
                snapped += 1;
            }
            *slot = value;
        }
        runs.push(KnotRun {
            value,
            start,
            multiplicity: end - start,
        });
        start = end;
    }

    let kinks = if result.len() > 2 * degree {
        let (lo, hi) = (result[degree], result[result.len() - degree - 1]);
        let limit = owner.max_smooth_multiplicity(degree);
        runs.iter()
            .filter(|run| run.value > lo && run.value < hi && run.multiplicity > limit)
            .map(|run| run.value)
            .collect()
    } else {
        Vec::new()
    };

    if snapped > 0 {
        log::trace!("snapped {snapped} near-duplicate knots");
    }
    KnotReport {
        knots: result,
        runs,
        snapped,
        kinks,
    }
}

fn representative(run: &[f64]) -> f64 {
    let mut best = run[0];
    let mut best_count = 0;
    for &candidate in run {
        #[allow(clippy::float_cmp)]
        let count = run.iter().filter(|&&k| k == candidate).count();
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn near_duplicate_is_snapped_to_majority() {
        let knots = [0.0, 0.0, 0.0, 1.0 - 1e-12, 1.0, 1.0, 2.0, 2.0, 2.0];
        let report = normalize_knots(&knots, 2, KnotOwner::Curve, &KnotTolerance::DEFAULT);
        assert_eq!(report.knots, vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
        assert_eq!(report.snapped, 1);
        assert_eq!(report.kinks, vec![1.0]);
        assert!(report.knots.windows(2).all(|w| w[0] == w[1] || w[1] - w[0] > 1e-9));
    }

    #[test]
    fn distinct_knots_are_untouched() {
        let knots = [0.0, 0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0, 1.0];
        let report = normalize_knots(&knots, 3, KnotOwner::Curve, &KnotTolerance::DEFAULT);
        assert_eq!(report.knots, knots.to_vec());
        assert_eq!(report.snapped, 0);
        assert!(report.is_smooth());
        assert_eq!(report.runs.len(), 3);
    }

    #[test]
    fn ties_keep_the_first_value() {
        let knots = [0.0, 0.0, 0.3, 0.3 + 5e-10, 1.0, 1.0];
        let report = normalize_knots(&knots, 1, KnotOwner::Curve, &KnotTolerance::DEFAULT);
        assert_eq!(report.knots[3], 0.3);
    }

    #[test]
    fn surfaces_allow_full_degree_multiplicity() {
        let knots = [0.0, 0.0, 0.0, 0.5, 0.5, 1.0, 1.0, 1.0];
        let curve = normalize_knots(&knots, 2, KnotOwner::Curve, &KnotTolerance::DEFAULT);
        let surface = normalize_knots(&knots, 2, KnotOwner::Surface, &KnotTolerance::DEFAULT);
        assert_eq!(curve.kinks, vec![0.5]);
        assert!(surface.is_smooth());
    }

    #[test]
    fn relative_threshold_scales_with_magnitude() {
        let tolerance = KnotTolerance {
            absolute: 0.0,
            relative: 1e-12,
        };
        assert!(tolerance.are_equal(1e6, 1e6 + 1e-7));
        assert!(!tolerance.are_equal(1.0, 1.0 + 1e-7));
    }
}
