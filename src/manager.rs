use crate::analysis::{
    BistablePoint, Bisection, RecoveryTime, bistable_scan, coral_recovery_time, final_mean_coral,
    find_unstable_equilibrium, mean_yield,
};
use crate::config::Config;
use crate::engine::{Engine, time_grid};
use crate::forcing::{ManagementParams, Strategy, closed_patches};
use crate::model::{ModelConfig, Preset};
use crate::params::ModelFamily;
use crate::stats::{Accumulator, Summary};
use crate::sweep::{Surface, SweepGrid, periods_from_recovery, run_sweep};
use crate::trajectory::Trajectory;
use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::path::Path;

pub struct Manager {
    cfg: Config,
    model: ModelConfig,
    engine: Engine,
    times: Vec<f64>,
}

#[derive(Debug, Serialize)]
struct RunReport<'a> {
    family: ModelFamily,
    preset: Preset,
    mgmt: &'a ManagementParams,
    /// Patches closed at the last output time.
    closed_patches: Vec<usize>,
    final_state: Vec<f64>,
    final_coral: Summary,
    final_mean_coral: f64,
    mean_yield: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    trajectory: Option<&'a Trajectory>,
}

#[derive(Debug, Serialize)]
struct RecoveryReport {
    family: ModelFamily,
    threshold: f64,
    recovery_time: RecoveryTime,
}

#[derive(Debug, Serialize)]
struct EquilibriumReport<'a> {
    family: ModelFamily,
    mgmt: &'a ManagementParams,
    bracket: (f64, f64),
    estimate: f64,
    result: Bisection,
}

#[derive(Debug, Serialize)]
struct SweepReport {
    periods: Vec<f64>,
    rotation: Surface,
    static_mpa: Surface,
}

#[derive(Debug, Serialize)]
struct BistableReport {
    family: ModelFamily,
    /// Intensities at which the two presets end on different states.
    bistable_intensities: Vec<f64>,
    points: Vec<BistablePoint>,
}

/// Coral difference above which the two presets count as separate states.
const BISTABLE_TOLERANCE: f64 = 0.01;

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let cfg_file = sim_dir.as_ref().join("config.toml");

        let cfg = Config::from_file(&cfg_file).context("failed to construct cfg")?;
        log::info!("loaded {cfg_file:?}");
        log::info!("{cfg:#?}");

        let model = cfg.model_config().context("failed to construct model")?;
        let engine = Engine::new(cfg.solver.build());
        let times = time_grid(cfg.time.horizon, cfg.time.samples_per_unit);

        Ok(Self {
            cfg,
            model,
            engine,
            times,
        })
    }

    pub fn run_model(&self, preset: Preset, full: bool) -> Result<()> {
        let mgmt = &self.cfg.mgmt;
        let traj = self
            .engine
            .run(&self.model, mgmt, self.model.preset(preset), &self.times)
            .context("failed to run model")?;

        let n = self.model.n_patches();
        let t_end = traj.times().last().copied().context("trajectory is empty")?;
        let final_state = traj.final_state().context("trajectory is empty")?.to_vec();
        let final_coral: Accumulator = (0..n).map(|patch| traj.coral(patch)[traj.len() - 1]).collect();

        emit(&RunReport {
            family: self.model.family(),
            preset,
            mgmt,
            closed_patches: closed_patches(self.model.strategy(), t_end, n, mgmt),
            final_state,
            final_coral: final_coral.summary(),
            final_mean_coral: final_mean_coral(&traj),
            mean_yield: mean_yield(&traj, &self.model, mgmt),
            trajectory: full.then_some(&traj),
        })
    }

    pub fn recovery_time(&self) -> Result<()> {
        let recovery_time = self.compute_recovery_time()?;

        emit(&RecoveryReport {
            family: self.model.family(),
            threshold: self.model.family().high_coral_threshold(),
            recovery_time,
        })
    }

    pub fn unstable_equilibrium(&self) -> Result<()> {
        let bracket = (self.cfg.equilibrium.low, self.cfg.equilibrium.high);
        let result = find_unstable_equilibrium(
            &self.engine,
            &self.model,
            &self.cfg.mgmt,
            &self.times,
            bracket,
            &self.cfg.bisection_options(),
        )
        .context("failed to find unstable equilibrium")?;

        emit(&EquilibriumReport {
            family: self.model.family(),
            mgmt: &self.cfg.mgmt,
            bracket,
            estimate: result.value(),
            result,
        })
    }

    pub fn run_sweep(&self) -> Result<()> {
        let sweep = &self.cfg.sweep;
        let n = self.model.n_patches();

        let periods = match &sweep.periods {
            Some(periods) => periods.clone(),
            None => {
                let recovery = self.compute_recovery_time()?;
                match periods_from_recovery(recovery, &sweep.period_multipliers) {
                    Some(periods) => periods,
                    None => bail!("coral does not recover within the horizon, set sweep periods explicitly"),
                }
            }
        };
        log::info!("sweeping rotation periods {periods:?}");

        let rotation_model = self.model.with_strategy(Strategy::Periodic);
        let rotation = run_sweep(
            &self.engine,
            &rotation_model,
            &self.cfg.mgmt,
            rotation_model.preset(sweep.preset),
            &self.times,
            &SweepGrid::periodic(n, &periods, sweep.max_fraction),
            sweep.metric,
        )
        .context("failed to sweep rotational closures")?;

        let static_model = self.model.with_strategy(Strategy::StaticMpa);
        let static_mpa = run_sweep(
            &self.engine,
            &static_model,
            &self.cfg.mgmt,
            static_model.preset(sweep.preset),
            &self.times,
            &SweepGrid::static_mpa(n),
            sweep.metric,
        )
        .context("failed to sweep static closures")?;

        let n_failed = rotation.n_failed() + static_mpa.n_failed();
        if n_failed > 0 {
            log::warn!("{n_failed} sweep points failed");
        }

        emit(&SweepReport {
            periods,
            rotation,
            static_mpa,
        })
    }

    pub fn bistable_zone(&self) -> Result<()> {
        let points = bistable_scan(&self.engine, &self.model, &self.times, &self.cfg.bistable_intensities())
            .context("failed to scan fishing intensities")?;

        let bistable_intensities = points
            .iter()
            .filter(|point| point.is_bistable(BISTABLE_TOLERANCE))
            .map(|point| point.fishing_intensity)
            .collect();

        emit(&BistableReport {
            family: self.model.family(),
            bistable_intensities,
            points,
        })
    }

    fn compute_recovery_time(&self) -> Result<RecoveryTime> {
        let recovery = coral_recovery_time(&self.engine, &self.model, &self.times)
            .context("failed to compute coral recovery time")?;
        if recovery == RecoveryTime::Undefined {
            log::warn!("coral did not recover within t = {}", self.cfg.time.horizon);
        }
        Ok(recovery)
    }
}

fn emit<T: Serialize>(report: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("failed to serialize report")?;
    println!("{json}");
    Ok(())
}
