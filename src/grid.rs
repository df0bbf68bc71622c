//! Discretized hyperparameter grids.
//!
//! A `Range {min, max, step}` expands into an owned, ordered value sequence
//! that always includes the declared `max` (the upper bound used for the
//! expansion is `max + step`, so the maximum is never silently excluded; when
//! the span is not a whole multiple of the step one overshoot value past
//! `max` appears, matching the original tuner's behavior). Grid enumeration
//! is deterministic: parameter names in sorted order, last name varying
//! fastest.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

const STEP_EPSILON: f64 = 1e-9;

/// A closed arithmetic range over one tunable parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

/// Expand a range into its discrete candidate values, inclusive of `max`.
/// Values are generated as `min + i * step` rather than by accumulation, so
/// floating error does not compound across long ranges.
pub fn expand_range(range: Range) -> Vec<f64> {
    if range.step <= 0.0 || range.max < range.min {
        return Vec::new();
    }
    let span = range.max + range.step - range.min;
    let count = (span / range.step - STEP_EPSILON).ceil() as usize;
    (0..count).map(|i| range.min + i as f64 * range.step).collect()
}

/// The expanded Cartesian product of every tunable parameter's candidate
/// values. Enumeration order is reproducible across runs given the same
/// input.
#[derive(Debug, Clone)]
pub struct ParameterGrid {
    names: Vec<String>,
    values: Vec<Vec<f64>>,
    len: usize,
}

impl ParameterGrid {
    /// Build a grid from per-parameter candidate lists. `BTreeMap` fixes the
    /// name order (sorted); a parameter with no candidates yields an empty
    /// grid.
    pub fn new(candidates: BTreeMap<String, Vec<f64>>) -> ParameterGrid {
        let mut names = Vec::with_capacity(candidates.len());
        let mut values = Vec::with_capacity(candidates.len());
        for (name, vals) in candidates {
            names.push(name);
            values.push(vals);
        }
        let len = if values.is_empty() {
            0
        } else {
            values.iter().map(Vec::len).product()
        };
        ParameterGrid { names, values, len }
    }

    /// Expand each parameter's range and build the grid.
    pub fn from_ranges(ranges: &BTreeMap<String, Range>) -> ParameterGrid {
        let candidates = ranges
            .iter()
            .map(|(name, range)| (name.clone(), expand_range(*range)))
            .collect();
        ParameterGrid::new(candidates)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The `index`-th grid point. The last parameter name varies fastest.
    pub fn point(&self, index: usize) -> Option<BTreeMap<String, f64>> {
        if index >= self.len {
            return None;
        }
        let mut point = BTreeMap::new();
        let mut remainder = index;
        for (name, vals) in self.names.iter().zip(&self.values).rev() {
            point.insert(name.clone(), vals[remainder % vals.len()]);
            remainder /= vals.len();
        }
        Some(point)
    }

    pub fn iter(&self) -> impl Iterator<Item = BTreeMap<String, f64>> + '_ {
        (0..self.len).map(|i| self.point(i).expect("index in range"))
    }
}
