use crate::analysis::{RecoveryTime, cycle_average_coral, final_mean_coral, mean_yield};
use crate::engine::Engine;
use crate::error::{SimError, SimResult};
use crate::forcing::ManagementParams;
use crate::model::ModelConfig;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Scalar reduction of one sweep run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Metric {
    /// Coral over the last `cycles` rotation periods, averaged over patches.
    CycleCoral { cycles: usize },
    /// Final coral averaged over patches.
    FinalCoral,
    /// Fishing yield averaged over patches and output times.
    MeanYield,
}

/// Run `model` once under `mgmt` and reduce the trajectory with `metric`.
pub fn evaluate_point(
    engine: &Engine,
    model: &ModelConfig,
    mgmt: &ManagementParams,
    initial: &[f64],
    times: &[f64],
    metric: Metric,
) -> SimResult<f64> {
    let traj = engine.run(model, mgmt, initial, times)?;
    let val = match metric {
        Metric::CycleCoral { cycles } => {
            let period = mgmt.closure_length * model.n_patches() as f64;
            cycle_average_coral(&traj, period, cycles)
        }
        Metric::FinalCoral => final_mean_coral(&traj),
        Metric::MeanYield => mean_yield(&traj, model, mgmt),
    };
    Ok(val)
}

/// One management combination of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub n_closed: usize,
    /// Full rotation period, `n · closure_length` (0 for static closures).
    pub period: f64,
}

/// Ordered list of management combinations.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepGrid {
    n_patches: usize,
    points: Vec<SweepPoint>,
}

impl SweepGrid {
    /// Every rotation period crossed with closed counts `m < max_fraction · n`.
    pub fn periodic(n_patches: usize, periods: &[f64], max_fraction: f64) -> Self {
        let m_end = ((max_fraction * n_patches as f64 + 1e-9).floor() as usize).clamp(1, n_patches.max(1));
        let points = periods
            .iter()
            .flat_map(|&period| (0..m_end).map(move |n_closed| SweepPoint { n_closed, period }))
            .collect();
        Self { n_patches, points }
    }

    /// Permanent closures of `0..n` patches.
    pub fn static_mpa(n_patches: usize) -> Self {
        let points = (0..n_patches.max(1))
            .map(|n_closed| SweepPoint {
                n_closed,
                period: 0.0,
            })
            .collect();
        Self { n_patches, points }
    }

    pub fn points(&self) -> &[SweepPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn management(&self, point: &SweepPoint, base: &ManagementParams) -> ManagementParams {
        ManagementParams {
            closure_length: point.period / self.n_patches as f64,
            n_closed: point.n_closed,
            ..*base
        }
    }
}

/// Result of one sweep point; `value` is `None` when the run failed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepCell {
    pub n_closed: usize,
    pub fraction_closed: f64,
    pub period: f64,
    pub closure_length: f64,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    pub metric: Metric,
    pub cells: Vec<SweepCell>,
}

impl Surface {
    pub fn n_failed(&self) -> usize {
        self.cells.iter().filter(|cell| cell.value.is_none()).count()
    }
}

/// Evaluate every point of `grid` in parallel.
///
/// Invalid management combinations abort the sweep before any run starts.
/// A run that fails afterwards is logged and leaves an empty cell.
pub fn run_sweep(
    engine: &Engine,
    model: &ModelConfig,
    base_mgmt: &ManagementParams,
    initial: &[f64],
    times: &[f64],
    grid: &SweepGrid,
    metric: Metric,
) -> SimResult<Surface> {
    if grid.is_empty() {
        return Err(SimError::config("sweep grid has no points"));
    }
    let n = model.n_patches();
    for point in grid.points() {
        grid.management(point, base_mgmt)
            .validate(n)
            .map_err(|e| e.prefixed(format!("sweep point {point:?}")))?;
    }

    let n_points = grid.len();
    let n_done = AtomicUsize::new(0);

    let cells = grid
        .points()
        .par_iter()
        .map(|point| {
            let mgmt = grid.management(point, base_mgmt);
            let value = match evaluate_point(engine, model, &mgmt, initial, times, metric) {
                Ok(val) => Some(val),
                Err(error) => {
                    log::warn!("sweep point {point:?} failed: {error}");
                    None
                }
            };

            let i_done = n_done.fetch_add(1, Ordering::Relaxed) + 1;
            let progress = 100.0 * i_done as f64 / n_points as f64;
            log::info!("completed {progress:06.2}%");

            SweepCell {
                n_closed: point.n_closed,
                fraction_closed: point.n_closed as f64 / n as f64,
                period: point.period,
                closure_length: mgmt.closure_length,
                value,
            }
        })
        .collect();

    Ok(Surface { metric, cells })
}

/// Rotation periods as multiples of the coral recovery time.
pub fn periods_from_recovery(recovery: RecoveryTime, multipliers: &[f64]) -> Option<Vec<f64>> {
    let recovery = recovery.index()? as f64;
    Some(multipliers.iter().map(|mult| mult * recovery).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::time_grid;
    use crate::forcing::Strategy;
    use crate::model::{InitialLevels, Preset};
    use crate::params::{ModelFamily, ParamSet};
    use crate::solver::{Rhs, Solver, SolverFailure};
    use ndarray::Array2;

    fn model(n: usize, strategy: Strategy) -> ModelConfig {
        let family = ModelFamily::BlackwoodMumby;
        ModelConfig::new(
            family,
            n,
            0.95,
            strategy,
            &ParamSet::defaults(family, 1.0),
            &InitialLevels::for_family(family),
        )
        .unwrap()
    }

    fn base_mgmt() -> ManagementParams {
        ManagementParams {
            fishing_intensity: 0.3,
            poaching: 0.0,
            ..ManagementParams::unfished()
        }
    }

    /// Holds the initial state and fails when patches 0 and 1 start out
    /// with different fish derivatives.
    struct FailOnAsymmetry;

    impl Solver for FailOnAsymmetry {
        fn integrate(&self, rhs: &Rhs<'_>, y0: &[f64], times: &[f64]) -> Result<Array2<f64>, SolverFailure> {
            let mut dx = vec![0.0; y0.len()];
            rhs(times[0], y0, &mut dx[..]);
            if (dx[0] - dx[1]).abs() > 1e-12 {
                return Err(SolverFailure {
                    time: times[0],
                    reason: "asymmetric start".to_string(),
                    completed: Array2::zeros((0, y0.len())),
                });
            }
            Ok(Array2::from_shape_fn((times.len(), y0.len()), |(_, j)| y0[j]))
        }
    }

    #[test]
    fn periodic_grid_crosses_periods_and_closures() {
        let grid = SweepGrid::periodic(6, &[3.0, 12.0], 1.0);
        assert_eq!(grid.len(), 12);
        assert_eq!(grid.points()[7], SweepPoint { n_closed: 1, period: 12.0 });

        let grid = SweepGrid::periodic(6, &[3.0], 2.0 / 3.0);
        let closed: Vec<_> = grid.points().iter().map(|p| p.n_closed).collect();
        assert_eq!(closed, vec![0, 1, 2, 3]);

        let mgmt = grid.management(&grid.points()[2], &base_mgmt());
        assert_eq!(mgmt.closure_length, 0.5);
        assert_eq!(mgmt.fishing_intensity, 0.3);
    }

    #[test]
    fn static_grid_has_no_rotation() {
        let grid = SweepGrid::static_mpa(4);
        assert_eq!(grid.len(), 4);
        assert!(grid.points().iter().all(|p| p.period == 0.0));
    }

    #[test]
    fn failed_points_leave_empty_cells() {
        let model = model(2, Strategy::Periodic);
        let engine = Engine::new(Box::new(FailOnAsymmetry));
        let grid = SweepGrid::periodic(2, &[10.0], 1.0);

        let surface = run_sweep(
            &engine,
            &model,
            &base_mgmt(),
            model.preset(Preset::High),
            &time_grid(10.0, 1),
            &grid,
            Metric::FinalCoral,
        )
        .unwrap();

        assert_eq!(surface.cells.len(), 2);
        assert_eq!(surface.n_failed(), 1);
        assert!((surface.cells[0].value.unwrap() - 0.6).abs() < 1e-12);
        assert_eq!(surface.cells[1].value, None);
        assert_eq!(surface.cells[1].fraction_closed, 0.5);
    }

    #[test]
    fn invalid_points_abort_the_sweep() {
        let model = model(2, Strategy::Periodic);
        let mgmt = ManagementParams {
            poaching: 2.0,
            ..base_mgmt()
        };
        let err = run_sweep(
            &Engine::default(),
            &model,
            &mgmt,
            model.preset(Preset::Low),
            &time_grid(10.0, 1),
            &SweepGrid::static_mpa(2),
            Metric::FinalCoral,
        )
        .unwrap_err();
        assert!(matches!(err, SimError::Configuration(_)));
    }

    #[test]
    fn rotation_sweep_reports_coral_fractions() {
        let model = model(3, Strategy::Periodic);
        let grid = SweepGrid::periodic(3, &[6.0], 1.0);
        let times = time_grid(60.0, 1);
        let run = || {
            run_sweep(
                &Engine::default(),
                &model,
                &base_mgmt(),
                model.preset(Preset::Low),
                &times,
                &grid,
                Metric::CycleCoral { cycles: 2 },
            )
            .unwrap()
        };

        let surface = run();
        assert_eq!(surface.n_failed(), 0);
        for cell in &surface.cells {
            let val = cell.value.unwrap();
            assert!((0.0..=1.0).contains(&val), "{cell:?}");
            assert_eq!(cell.closure_length, 2.0);
        }
        assert_eq!(surface, run());
    }

    #[test]
    fn static_mpa_yield_is_finite() {
        let model = model(3, Strategy::StaticMpa);
        let surface = run_sweep(
            &Engine::default(),
            &model,
            &base_mgmt(),
            model.preset(Preset::High),
            &time_grid(30.0, 1),
            &SweepGrid::static_mpa(3),
            Metric::MeanYield,
        )
        .unwrap();
        assert_eq!(surface.cells.len(), 3);
        assert!(surface.cells.iter().all(|cell| cell.value.is_some_and(f64::is_finite)));
    }

    #[test]
    fn periods_scale_recovery_time() {
        let periods = periods_from_recovery(RecoveryTime::Reached(40), &[0.25, 1.0, 4.0]).unwrap();
        assert_eq!(periods, vec![10.0, 40.0, 160.0]);
        assert_eq!(periods_from_recovery(RecoveryTime::Undefined, &[1.0]), None);
    }
}
