use crate::error::{SimError, SimResult};
use crate::forcing::ManagementParams;
use crate::model::ModelConfig;
use crate::solver::{Solver, SolverConfig};
use crate::trajectory::Trajectory;
use crate::utils::linspace;

/// Integration driver.
///
/// Wraps a [`Solver`] and turns a model, its management parameters and an
/// initial condition into a [`Trajectory`]. An engine holds no per-run
/// state, so one engine can serve many concurrent runs.
pub struct Engine {
    solver: Box<dyn Solver + Send + Sync>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(SolverConfig::default().build())
    }
}

impl Engine {
    pub fn new(solver: Box<dyn Solver + Send + Sync>) -> Self {
        Self { solver }
    }

    /// Integrate `model` from `initial` and record the state at `times`.
    ///
    /// The first row of the result is `initial` itself.
    pub fn run(
        &self,
        model: &ModelConfig,
        mgmt: &ManagementParams,
        initial: &[f64],
        times: &[f64],
    ) -> SimResult<Trajectory> {
        let n = model.n_patches();
        let n_comp = model.n_compartments();

        mgmt.validate(n)?;
        check_initial(initial, model.state_len())?;
        check_times(times)?;

        let system = model.system(*mgmt);
        let rhs = |t: f64, x: &[f64], dx: &mut [f64]| system.rhs(t, x, dx);

        match self.solver.integrate(&rhs, initial, times) {
            Ok(states) => Ok(Trajectory::new(times.to_vec(), states, n, n_comp)),
            Err(failure) => {
                log::warn!("integration failed at t = {}: {}", failure.time, failure.reason);
                let n_rows = failure.completed.nrows();
                let partial = (n_rows > 0).then(|| {
                    Box::new(Trajectory::new(times[..n_rows].to_vec(), failure.completed, n, n_comp))
                });
                Err(SimError::Integration {
                    time: failure.time,
                    reason: failure.reason,
                    partial,
                })
            }
        }
    }
}

/// Output times `0, 1/s, 2/s, ..., horizon` for `s` samples per time unit.
pub fn time_grid(horizon: f64, samples_per_unit: usize) -> Vec<f64> {
    let n_intervals = (horizon * samples_per_unit as f64).round() as usize;
    linspace(0.0, horizon, n_intervals + 1)
}

fn check_initial(initial: &[f64], exp_len: usize) -> SimResult<()> {
    let len = initial.len();
    if len != exp_len {
        return Err(SimError::config(format!(
            "initial state length must be {exp_len}, but is {len}"
        )));
    }
    if initial.iter().any(|&val| !val.is_finite() || val < 0.0) {
        return Err(SimError::config(
            "initial state must have only finite non-negative elements",
        ));
    }
    Ok(())
}

fn check_times(times: &[f64]) -> SimResult<()> {
    if times.is_empty() {
        return Err(SimError::config("output times must not be empty"));
    }
    if times.iter().any(|t| !t.is_finite()) {
        return Err(SimError::config("output times must be finite"));
    }
    if times.windows(2).any(|win| win[1] <= win[0]) {
        return Err(SimError::config("output times must be strictly increasing"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forcing::Strategy;
    use crate::model::{InitialLevels, Preset};
    use crate::params::{ModelFamily, ParamSet};
    use crate::trajectory::CORAL;

    fn model(family: ModelFamily, n: usize, frac_nomove: f64, strategy: Strategy) -> ModelConfig {
        ModelConfig::new(
            family,
            n,
            frac_nomove,
            strategy,
            &ParamSet::defaults(family, 1.0),
            &InitialLevels::for_family(family),
        )
        .unwrap()
    }

    fn fished(fishing_intensity: f64, n_closed: usize, poaching: f64) -> ManagementParams {
        ManagementParams {
            closure_length: 10.0,
            fishing_intensity,
            n_closed,
            poaching,
        }
    }

    #[test]
    fn single_output_time_returns_preset() {
        let model = model(ModelFamily::LeemputFull, 3, 0.95, Strategy::Periodic);
        let x1 = model.preset(Preset::Low);
        let traj = Engine::default().run(&model, &fished(0.3, 1, 0.0), x1, &[0.0]).unwrap();
        assert_eq!(traj.len(), 1);
        assert_eq!(traj.state(0).to_vec(), x1.to_vec());
    }

    #[test]
    fn isolated_identical_patches_stay_identical() {
        let model = model(ModelFamily::LeemputFull, 4, 1.0, Strategy::Periodic);
        let mgmt = fished(0.3, 0, 0.0);
        let traj = Engine::default()
            .run(&model, &mgmt, model.preset(Preset::High), &time_grid(100.0, 1))
            .unwrap();

        for k in 0..traj.len() {
            let state = traj.state(k);
            for c in 0..3 {
                for i in 1..4 {
                    assert_eq!(state[c * 4 + i], state[c * 4], "compartment {c} patch {i} at {k}");
                }
            }
        }
    }

    #[test]
    fn fully_closed_static_mpa_matches_single_patch_at_poaching_level() {
        let family = ModelFamily::BlackwoodMumby;
        let engine = Engine::default();
        let times = time_grid(150.0, 1);

        let multi = model(family, 4, 0.95, Strategy::StaticMpa);
        let traj = engine
            .run(&multi, &fished(0.4, 4, 0.25), multi.preset(Preset::High), &times)
            .unwrap();

        let single = model(family, 1, 0.95, Strategy::Periodic);
        let reference = engine
            .run(&single, &fished(0.4 * 0.25, 0, 0.0), single.preset(Preset::High), &times)
            .unwrap();

        for k in 0..times.len() {
            for i in 0..4 {
                let diff = traj.state(k)[CORAL * 4 + i] - reference.coral(0)[k];
                assert!(diff.abs() < 1e-9, "patch {i} at {k} differs by {diff}");
            }
        }
    }

    #[test]
    fn rejects_bad_run_inputs() {
        let model = model(ModelFamily::BlackwoodMumby, 2, 0.95, Strategy::Periodic);
        let engine = Engine::default();
        let x1 = model.preset(Preset::Low);

        let err = engine.run(&model, &fished(0.3, 3, 0.0), x1, &[0.0, 1.0]).unwrap_err();
        assert!(matches!(err, SimError::Configuration(_)));
        assert!(engine.run(&model, &fished(0.3, 1, 0.0), &x1[1..], &[0.0, 1.0]).is_err());
        assert!(engine.run(&model, &fished(0.3, 1, 0.0), x1, &[]).is_err());
        assert!(engine.run(&model, &fished(0.3, 1, 0.0), x1, &[0.0, 2.0, 1.0]).is_err());
    }

    #[test]
    fn adaptive_method_completes_and_agrees_with_rk4() {
        let model = model(ModelFamily::BlackwoodMumby, 4, 0.95, Strategy::Periodic);
        let mgmt = fished(0.3, 1, 0.0);
        let times = time_grid(50.0, 1);

        let dopri = Engine::new(
            SolverConfig {
                method: crate::solver::Method::Dopri5,
                ..SolverConfig::default()
            }
            .build(),
        );
        let adaptive = dopri.run(&model, &mgmt, model.preset(Preset::High), &times).unwrap();
        let fixed = Engine::default()
            .run(&model, &mgmt, model.preset(Preset::High), &times)
            .unwrap();

        assert_eq!(adaptive.len(), times.len());
        for i in 0..4 {
            let diff = adaptive.coral(i)[50] - fixed.coral(i)[50];
            assert!(diff.abs() < 5e-3, "patch {i} differs by {diff}");
        }
    }

    #[test]
    fn time_grid_has_unit_spacing() {
        let times = time_grid(500.0, 1);
        assert_eq!(times.len(), 501);
        assert_eq!(times[0], 0.0);
        assert_eq!(times[500], 500.0);
        assert!((times[137] - 137.0).abs() < 1e-9);
        assert_eq!(time_grid(2.0, 4).len(), 9);
    }
}
