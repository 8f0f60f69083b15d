//! Numerical integration of the patch system.
//!
//! A [`Solver`] advances `dy/dt = f(t, y)` and reports the state at each
//! requested output time. The engine only depends on the trait; the stock
//! implementation hands the stepping to `russell_ode`.

use ndarray::{Array2, ArrayView1, s};
use russell_lab::{StrError, Vector};
use russell_ode::{OdeSolver, Params, System};
use serde::{Deserialize, Serialize};

/// Right-hand side callback: writes `f(t, y)` into the last argument.
pub type Rhs<'a> = dyn Fn(f64, &[f64], &mut [f64]) + Sync + 'a;

/// Reason a solver stopped before the last output time.
#[derive(Debug, Clone)]
pub struct SolverFailure {
    pub time: f64,
    pub reason: String,
    /// Output rows completed before the failure.
    pub completed: Array2<f64>,
}

pub trait Solver {
    /// Integrate from `y0` at `times[0]` and return one row per output time.
    ///
    /// `times` must be non-empty and strictly increasing.
    fn integrate(&self, rhs: &Rhs<'_>, y0: &[f64], times: &[f64]) -> Result<Array2<f64>, SolverFailure>;
}

/// Integration method selected in the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Classic fourth-order Runge-Kutta with equal steps.
    Rk4,
    /// Adaptive Dormand-Prince 5(4).
    Dopri5,
}

/// Solver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub method: Method,
    /// Step of the fixed-step method, first trial step of the adaptive one.
    pub max_step: f64,
    /// Relative tolerance (adaptive method only).
    pub rtol: f64,
    /// Absolute tolerance (adaptive method only).
    pub atol: f64,
    /// Step budget per output interval (adaptive method only).
    pub max_steps: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            method: Method::Rk4,
            max_step: 0.1,
            rtol: 1e-6,
            atol: 1e-9,
            max_steps: 100_000,
        }
    }
}

impl SolverConfig {
    pub fn build(&self) -> Box<dyn Solver + Send + Sync> {
        Box::new(OdeIntegrator { config: self.clone() })
    }

    fn params(&self) -> Result<Params, StrError> {
        let mut params = match self.method {
            Method::Rk4 => Params::new(russell_ode::Method::Rk4),
            Method::Dopri5 => {
                let mut params = Params::new(russell_ode::Method::DoPri5);
                params.set_tolerances(self.atol, self.rtol, None)?;
                params.step.n_step_max = self.max_steps;
                params
            }
        };
        params.step.h_ini = self.max_step;
        Ok(params)
    }

    /// Equal step handed to the fixed-step method; the adaptive one picks its own.
    fn h_equal(&self) -> Option<f64> {
        match self.method {
            Method::Rk4 => Some(self.max_step),
            Method::Dopri5 => None,
        }
    }
}

/// [`Solver`] backed by `russell_ode`, solving one output interval at a time.
#[derive(Debug, Clone)]
pub struct OdeIntegrator {
    config: SolverConfig,
}

impl Solver for OdeIntegrator {
    fn integrate(&self, rhs: &Rhs<'_>, y0: &[f64], times: &[f64]) -> Result<Array2<f64>, SolverFailure> {
        let dim = y0.len();
        let mut out = Array2::zeros((times.len(), dim));
        let t_start = times.first().copied().unwrap_or_default();

        let system = System::new(dim, |dy: &mut Vector, t: f64, y: &Vector, _args: &mut ()| {
            rhs(t, &y.as_data()[..], &mut dy.as_mut_data()[..]);
            Ok(())
        });
        let params = self.config.params().map_err(|reason| failure(&out, 0, t_start, reason))?;
        let mut solver = OdeSolver::new(params, system).map_err(|reason| failure(&out, 0, t_start, reason))?;

        let mut y = Vector::new(dim);
        y.as_mut_data().copy_from_slice(y0);
        let h_equal = self.config.h_equal();

        for (k, win) in times.windows(2).enumerate() {
            out.row_mut(k).assign(&ArrayView1::from(&y.as_data()[..]));

            let (t0, t1) = (win[0], win[1]);
            solver
                .solve(&mut y, t0, t1, h_equal, &mut ())
                .map_err(|reason| failure(&out, k + 1, t0, reason))?;

            if !all_finite(y.as_data()) {
                return Err(failure(&out, k + 1, t1, "state is not finite"));
            }
        }
        if let Some(last) = times.len().checked_sub(1) {
            out.row_mut(last).assign(&ArrayView1::from(&y.as_data()[..]));
        }

        Ok(out)
    }
}

fn all_finite(y: &[f64]) -> bool {
    y.iter().all(|val| val.is_finite())
}

fn failure(out: &Array2<f64>, n_rows: usize, time: f64, reason: &str) -> SolverFailure {
    SolverFailure {
        time,
        reason: reason.to_string(),
        completed: out.slice(s![..n_rows, ..]).to_owned(),
    }
}
