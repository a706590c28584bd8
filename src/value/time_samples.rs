//! Time-sampled attribute values.
//!
//! Samples are kept sorted by time code with unique, finite times. A sample
//! value may be [`Value::Block`], which blocks the attribute at that time.

use super::Value;
use crate::sdf::LayerOffset;
use crate::util::{Error, Result};

/// How values between two samples are produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    /// Hold the earlier sample.
    #[default]
    Held,
    /// Linear for floating point scalars and vectors, held for everything else.
    Linear,
}

/// Which opinion to read: the default value or a time code.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum SampleTime {
    #[default]
    Default,
    Time(f64),
}

impl From<f64> for SampleTime {
    fn from(t: f64) -> Self {
        Self::Time(t)
    }
}

/// Bracketing samples for a time query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleInterp {
    pub floor_index: usize,
    pub ceil_index: usize,
    /// Interpolation factor (0.0 = floor, 1.0 = ceil).
    pub alpha: f64,
}

impl SampleInterp {
    pub fn exact(index: usize) -> Self {
        Self {
            floor_index: index,
            ceil_index: index,
            alpha: 0.0,
        }
    }

    pub fn lerp(floor: usize, ceil: usize, alpha: f64) -> Self {
        Self {
            floor_index: floor,
            ceil_index: ceil,
            alpha: alpha.clamp(0.0, 1.0),
        }
    }

    pub fn is_exact(&self) -> bool {
        self.floor_index == self.ceil_index || self.alpha == 0.0
    }
}

/// Sorted `(time, value)` pairs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeSamples {
    samples: Vec<(f64, Value)>,
}

/// `-0.0` and `0.0` name the same time code; keys are stored as `0.0`.
#[inline]
fn canonical_time(t: f64) -> f64 {
    t + 0.0
}

fn check_time(t: f64) -> Result<f64> {
    if t.is_finite() {
        Ok(canonical_time(t))
    } else {
        Err(Error::invalid(format!("non-finite time code {t}")))
    }
}

impl TimeSamples {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from samples in any order. When a time repeats, the later
    /// sample in the input wins.
    pub fn from_samples(samples: Vec<(f64, Value)>) -> Result<Self> {
        let mut ts = Self::new();
        for (t, v) in samples {
            ts.insert(t, v)?;
        }
        Ok(ts)
    }

    /// Insert or replace the sample at `t`.
    pub fn insert(&mut self, t: f64, value: Value) -> Result<()> {
        let t = check_time(t)?;
        match self.samples.binary_search_by(|(st, _)| st.total_cmp(&t)) {
            Ok(i) => self.samples[i].1 = value,
            Err(i) => self.samples.insert(i, (t, value)),
        }
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(f64, Value)> {
        self.samples.iter()
    }

    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|(t, _)| *t)
    }

    pub fn get_exact(&self, t: f64) -> Option<&Value> {
        let t = canonical_time(t);
        self.samples
            .binary_search_by(|(st, _)| st.total_cmp(&t))
            .ok()
            .map(|i| &self.samples[i].1)
    }

    /// First non-blocked value, used to infer the sampled type.
    pub fn first_value(&self) -> Option<&Value> {
        self.samples.iter().map(|(_, v)| v).find(|v| !v.is_block())
    }

    /// Largest index with time <= `t` (0 when `t` precedes every sample).
    pub fn floor_index(&self, t: f64) -> Option<usize> {
        if self.samples.is_empty() {
            return None;
        }
        let after = self.samples.partition_point(|(st, _)| *st <= t);
        Some(after.saturating_sub(1))
    }

    /// Smallest index with time >= `t` (last index when `t` follows every sample).
    pub fn ceil_index(&self, t: f64) -> Option<usize> {
        if self.samples.is_empty() {
            return None;
        }
        let at = self.samples.partition_point(|(st, _)| *st < t);
        Some(at.min(self.samples.len() - 1))
    }

    /// Bracketing samples for `t`, clamped to the sampled range.
    pub fn interp(&self, t: f64) -> Option<SampleInterp> {
        let floor = self.floor_index(t)?;
        let ceil = self.ceil_index(t)?;
        let (t0, t1) = (self.samples[floor].0, self.samples[ceil].0);
        if floor == ceil || t <= t0 {
            return Some(SampleInterp::exact(floor));
        }
        if t >= t1 {
            return Some(SampleInterp::exact(ceil));
        }
        Some(SampleInterp::lerp(floor, ceil, (t - t0) / (t1 - t0)))
    }

    /// Evaluate at `t`. Times before the first sample take the first value,
    /// times after the last take the last. Linear interpolation falls back
    /// to held when either neighbour is blocked or the type does not
    /// interpolate.
    pub fn eval(&self, t: f64, interpolation: Interpolation) -> Option<Value> {
        let it = self.interp(t)?;
        let lo = &self.samples[it.floor_index].1;
        if it.is_exact() || interpolation == Interpolation::Held {
            return Some(lo.clone());
        }
        let hi = &self.samples[it.ceil_index].1;
        if lo.is_block() || hi.is_block() {
            return Some(lo.clone());
        }
        Some(lo.lerp(hi, it.alpha).unwrap_or_else(|| lo.clone()))
    }

    /// Merge samples from a weaker opinion. Samples already present win on
    /// exact time collisions.
    pub fn merge_weaker(&mut self, weaker: &TimeSamples) {
        for (t, v) in &weaker.samples {
            let t = canonical_time(*t);
            if let Err(i) = self.samples.binary_search_by(|(st, _)| st.total_cmp(&t)) {
                self.samples.insert(i, (t, v.clone()));
            }
        }
    }

    /// Map every time code through a layer offset.
    pub fn retimed(&self, offset: &LayerOffset) -> TimeSamples {
        if offset.is_identity() {
            return self.clone();
        }
        let mut samples: Vec<(f64, Value)> = self
            .samples
            .iter()
            .map(|(t, v)| (canonical_time(offset.apply(*t)), v.clone()))
            .collect();
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));
        samples.dedup_by(|a, b| a.0 == b.0);
        TimeSamples { samples }
    }
}
