use crate::engine::Engine;
use crate::error::{SimError, SimResult};
use crate::forcing::{ManagementParams, multiplier};
use crate::model::{ModelConfig, Preset};
use crate::stats::Accumulator;
use crate::trajectory::{CORAL, Trajectory};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Samples added to the first threshold crossing to let coral settle.
pub const SETTLING_MARGIN: usize = 10;

/// Outcome of a coral recovery-time measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryTime {
    /// Crossing index plus the settling margin.
    Reached(usize),
    /// Coral never crossed the threshold within the horizon.
    Undefined,
}

impl RecoveryTime {
    pub fn index(self) -> Option<usize> {
        match self {
            Self::Reached(idx) => Some(idx),
            Self::Undefined => None,
        }
    }
}

/// First index at which `series` exceeds `threshold`.
pub fn first_crossing(series: ArrayView1<f64>, threshold: f64) -> Option<usize> {
    series.iter().position(|&val| val > threshold)
}

/// Recovery time of a coral series against `threshold`.
pub fn recovery_from_series(series: ArrayView1<f64>, threshold: f64) -> RecoveryTime {
    match first_crossing(series, threshold) {
        Some(idx) => RecoveryTime::Reached(idx + SETTLING_MARGIN),
        None => RecoveryTime::Undefined,
    }
}

/// Time for coral in patch 0 to recover from the low-coral preset without
/// fishing or closures.
pub fn coral_recovery_time(engine: &Engine, model: &ModelConfig, times: &[f64]) -> SimResult<RecoveryTime> {
    let traj = engine.run(model, &ManagementParams::unfished(), model.preset(Preset::Low), times)?;
    let threshold = model.family().high_coral_threshold();
    let recovery = recovery_from_series(traj.coral(0), threshold);

    log::debug!("coral recovery time against threshold {threshold}: {recovery:?}");

    Ok(recovery)
}

/// Termination rule of the coral-cover bisection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BisectionOptions {
    /// Maximum number of halvings.
    pub max_depth: usize,
    /// Bracket width below which the midpoint counts as converged.
    pub tolerance: f64,
}

impl Default for BisectionOptions {
    fn default() -> Self {
        Self {
            max_depth: 10,
            tolerance: 1e-3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bisection {
    Converged(f64),
    /// Depth exhausted before the bracket narrowed below the tolerance.
    Inconclusive { estimate: f64, bracket: (f64, f64) },
}

impl Bisection {
    /// Best estimate, converged or not.
    pub fn value(self) -> f64 {
        match self {
            Self::Converged(value) => value,
            Self::Inconclusive { estimate, .. } => estimate,
        }
    }
}

/// Bisect `bracket` for the point where `probe` changes sign.
///
/// `probe(mid)` reports whether the dynamics started at `mid` end above
/// (`Greater`) or below (`Less`) it. Above means the root lies above `mid`.
pub fn bisect<F>(mut probe: F, bracket: (f64, f64), options: &BisectionOptions) -> SimResult<Bisection>
where
    F: FnMut(f64) -> SimResult<Ordering>,
{
    let (low, high) = bracket;
    if !(low.is_finite() && high.is_finite() && low < high) {
        return Err(SimError::config(format!(
            "bisection bracket must be finite and increasing, but is {bracket:?}"
        )));
    }
    bisect_from(&mut probe, bracket, 0, options)
}

fn bisect_from<F>(probe: &mut F, bracket: (f64, f64), depth: usize, options: &BisectionOptions) -> SimResult<Bisection>
where
    F: FnMut(f64) -> SimResult<Ordering>,
{
    let (low, high) = bracket;
    let mid = 0.5 * (low + high);

    if high - low <= options.tolerance {
        return Ok(Bisection::Converged(mid));
    }
    if depth >= options.max_depth {
        return Ok(Bisection::Inconclusive { estimate: mid, bracket });
    }

    match probe(mid)? {
        Ordering::Greater => bisect_from(probe, (mid, high), depth + 1, options),
        Ordering::Less => bisect_from(probe, (low, mid), depth + 1, options),
        Ordering::Equal => Ok(Bisection::Converged(mid)),
    }
}

/// Locate the unstable coral equilibrium between the two stable states.
///
/// Each probe starts from the low preset with the coral of every patch set to
/// the bracket midpoint and compares final coral in patch 0 with it.
pub fn find_unstable_equilibrium(
    engine: &Engine,
    model: &ModelConfig,
    mgmt: &ManagementParams,
    times: &[f64],
    bracket: (f64, f64),
    options: &BisectionOptions,
) -> SimResult<Bisection> {
    let probe = |mid: f64| -> SimResult<Ordering> {
        let initial = model.with_coral(model.preset(Preset::Low), mid);
        let traj = engine.run(model, mgmt, &initial, times)?;
        let coral = traj.coral(0);
        let last = coral.len() - 1;
        log::debug!("bisection probe at coral {mid:.6} ends at {:.6}", coral[last]);
        Ok(coral[last].total_cmp(&mid))
    };

    let result = bisect(probe, bracket, options)?;
    if let Bisection::Inconclusive { bracket, .. } = result {
        log::warn!("bisection stopped at depth {} with bracket {bracket:?}", options.max_depth);
    }
    Ok(result)
}

/// Coral cover averaged over all patches and the last `cycles` whole
/// rotation periods of `traj`.
///
/// The window ends at the last multiple of the period on the output grid and
/// is cut off at the start of the trajectory. A zero period, or a trajectory
/// shorter than one period, falls back to the final state.
pub fn cycle_average_coral(traj: &Trajectory, period: f64, cycles: usize) -> f64 {
    let len = traj.len();
    let period_samples = match traj.times() {
        [t0, t1, ..] if period > 0.0 => (period / (t1 - t0)).round() as usize,
        _ => 0,
    };
    if period_samples == 0 || len < period_samples {
        return final_mean_coral(traj);
    }

    let end = len - len % period_samples;
    let start = end.saturating_sub(cycles * period_samples);

    (start..end).map(|k| traj.mean_coral_at(k)).collect::<Accumulator>().mean()
}

/// Coral cover of the final state, averaged over patches.
pub fn final_mean_coral(traj: &Trajectory) -> f64 {
    if traj.is_empty() {
        return f64::NAN;
    }
    traj.mean_coral_at(traj.len() - 1)
}

/// Fishing yield of `patch` at every output time.
pub fn fishing_yield(traj: &Trajectory, model: &ModelConfig, mgmt: &ManagementParams, patch: usize) -> Vec<f64> {
    let n = model.n_patches();
    traj.times()
        .iter()
        .zip(traj.fish(patch))
        .map(|(&t, &fish)| fish * mgmt.fishing_intensity * multiplier(model.strategy(), t, patch, n, mgmt))
        .collect()
}

/// Fishing yield averaged over all patches and output times.
pub fn mean_yield(traj: &Trajectory, model: &ModelConfig, mgmt: &ManagementParams) -> f64 {
    (0..model.n_patches())
        .flat_map(|patch| fishing_yield(traj, model, mgmt, patch))
        .collect::<Accumulator>()
        .mean()
}

/// Long-run coral cover from both presets at one fishing intensity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BistablePoint {
    pub fishing_intensity: f64,
    pub coral_from_low: f64,
    pub coral_from_high: f64,
}

impl BistablePoint {
    /// Whether the two starts settled on different states.
    pub fn is_bistable(&self, tolerance: f64) -> bool {
        (self.coral_from_high - self.coral_from_low).abs() > tolerance
    }
}

/// Final coral of patch 0 from the low and the high preset, without
/// closures, for every fishing intensity.
pub fn bistable_scan(
    engine: &Engine,
    model: &ModelConfig,
    times: &[f64],
    intensities: &[f64],
) -> SimResult<Vec<BistablePoint>> {
    intensities
        .iter()
        .map(|&fishing_intensity| {
            let mgmt = ManagementParams {
                fishing_intensity,
                ..ManagementParams::unfished()
            };
            let final_coral = |preset| -> SimResult<f64> {
                let traj = engine.run(model, &mgmt, model.preset(preset), times)?;
                let n = traj.n_patches();
                Ok(traj.final_state().map_or(f64::NAN, |state| state[CORAL * n]))
            };
            Ok(BistablePoint {
                fishing_intensity,
                coral_from_low: final_coral(Preset::Low)?,
                coral_from_high: final_coral(Preset::High)?,
            })
        })
        .collect()
}
