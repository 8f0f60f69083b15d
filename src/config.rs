use crate::analysis::BisectionOptions;
use crate::forcing::{ManagementParams, Strategy};
use crate::model::{InitialLevels, ModelConfig, Preset};
use crate::params::{ModelFamily, ParamSet};
use crate::solver::{Method, SolverConfig};
use crate::sweep::Metric;
use crate::utils::{check_num, linspace};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelSection,
    #[serde(default)]
    pub init: InitSection,
    #[serde(default)]
    pub mgmt: ManagementParams,
    #[serde(default)]
    pub time: TimeSection,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub sweep: SweepSection,
    #[serde(default)]
    pub equilibrium: EquilibriumSection,
    #[serde(default)]
    pub bistable: BistableSection,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ModelSection {
    pub family: ModelFamily,
    pub n_patches: usize,
    /// Fraction of fish that stay in their patch.
    #[serde(default = "default_frac_nomove")]
    pub frac_nomove: f64,
    #[serde(default = "default_strategy")]
    pub strategy: Strategy,
    #[serde(default = "default_fish_growth_rate")]
    pub fish_growth_rate: f64,
    /// Start from the published parameter table of the family.
    #[serde(default = "default_use_defaults")]
    pub use_defaults: bool,
    /// Parameter values that replace (or, without defaults, make up) the set.
    #[serde(default)]
    pub params: ParamSet,
}

/// Initial-condition levels; unset values fall back to the family defaults.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InitSection {
    pub fish: Option<f64>,
    pub coral_low: Option<f64>,
    pub coral_high: Option<f64>,
    pub algae_low: Option<f64>,
    pub algae_high: Option<f64>,
    pub invulnerable_low: Option<f64>,
    pub invulnerable_high: Option<f64>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSection {
    /// Length of every run.
    pub horizon: f64,
    /// Output samples per unit of time.
    pub samples_per_unit: usize,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSection {
    /// Absolute rotation periods. When unset, `period_multipliers` are
    /// scaled by the coral recovery time.
    pub periods: Option<Vec<f64>>,
    pub period_multipliers: Vec<f64>,
    /// Largest fraction of patches closed at once (exclusive).
    pub max_fraction: f64,
    pub metric: Metric,
    /// Initial-condition preset of every sweep run.
    pub preset: Preset,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EquilibriumSection {
    pub low: f64,
    pub high: f64,
    pub max_depth: usize,
    pub tolerance: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BistableSection {
    pub max_intensity: f64,
    pub n_points: usize,
}

fn default_frac_nomove() -> f64 {
    0.95
}

fn default_strategy() -> Strategy {
    Strategy::Periodic
}

fn default_fish_growth_rate() -> f64 {
    1.0
}

fn default_use_defaults() -> bool {
    true
}

impl Default for TimeSection {
    fn default() -> Self {
        Self {
            horizon: 500.0,
            samples_per_unit: 1,
        }
    }
}

impl Default for SweepSection {
    fn default() -> Self {
        Self {
            periods: None,
            period_multipliers: vec![0.25, 0.5, 1.0, 2.0, 4.0],
            max_fraction: 1.0,
            metric: Metric::CycleCoral { cycles: 2 },
            preset: Preset::Low,
        }
    }
}

impl Default for EquilibriumSection {
    fn default() -> Self {
        let options = BisectionOptions::default();
        Self {
            low: 0.1,
            high: 0.7,
            max_depth: options.max_depth,
            tolerance: options.tolerance,
        }
    }
}

impl Default for BistableSection {
    fn default() -> Self {
        Self {
            max_intensity: 1.2,
            n_points: 20,
        }
    }
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents = fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        check_num(self.model.n_patches, 1..10_000).context("invalid number of patches")?;
        check_num(self.model.frac_nomove, 0.0..=1.0).context("invalid no-movement fraction")?;
        check_num(self.model.fish_growth_rate, 0.0..f64::INFINITY).context("invalid fish growth rate")?;
        if !self.model.use_defaults && self.model.params.keys().next().is_none() {
            bail!("parameters must be given when defaults are disabled");
        }

        self.mgmt.validate(self.model.n_patches).context("invalid management parameters")?;

        check_num(self.time.horizon, 0.0..1e7).context("invalid horizon")?;
        check_num(self.time.samples_per_unit, 1..10_000).context("invalid number of samples per unit")?;

        check_num(self.solver.max_step, 1e-9..1e3).context("invalid step size")?;
        if self.solver.method == Method::Dopri5 {
            check_num(self.solver.rtol, 1e-14..1.0).context("invalid relative tolerance")?;
            check_num(self.solver.atol, 1e-14..1.0).context("invalid absolute tolerance")?;
            check_num(self.solver.max_steps, 1..usize::MAX).context("invalid step budget")?;
        }

        match &self.sweep.periods {
            Some(periods) => {
                for &period in periods {
                    check_num(period, 0.0..1e7).context("invalid sweep period")?;
                }
            }
            None => {
                for &mult in &self.sweep.period_multipliers {
                    check_num(mult, 0.0..1e3).context("invalid period multiplier")?;
                }
            }
        }
        check_num(self.sweep.max_fraction, 0.0..=1.0).context("invalid maximum closed fraction")?;
        if let Metric::CycleCoral { cycles } = self.sweep.metric {
            check_num(cycles, 1..1_000).context("invalid number of averaged cycles")?;
        }

        let eq = &self.equilibrium;
        check_num(eq.low, 0.0..=1.0).context("invalid lower coral bound")?;
        check_num(eq.high, 0.0..=1.0).context("invalid upper coral bound")?;
        if eq.low >= eq.high {
            bail!("coral bracket must be increasing, but is [{}, {}]", eq.low, eq.high);
        }
        check_num(eq.max_depth, 1..64).context("invalid bisection depth")?;
        check_num(eq.tolerance, 0.0..1.0).context("invalid bisection tolerance")?;

        check_num(self.bistable.max_intensity, 0.0..1e3).context("invalid maximum fishing intensity")?;
        check_num(self.bistable.n_points, 1..10_000).context("invalid number of bistability points")?;

        Ok(())
    }

    /// Parameter set of the configured family.
    pub fn param_set(&self) -> ParamSet {
        let family = self.model.family;
        if !self.model.use_defaults {
            return self.model.params.clone();
        }

        let mut params = ParamSet::defaults(family, self.model.fish_growth_rate);
        for key in self.model.params.keys() {
            if params.get(key).is_err() {
                log::warn!("parameter {key:?} is not used by {family}");
            }
        }
        params.merge(&self.model.params);
        params
    }

    pub fn initial_levels(&self) -> InitialLevels {
        let defaults = InitialLevels::for_family(self.model.family);
        let init = &self.init;
        InitialLevels {
            fish: init.fish.unwrap_or(defaults.fish),
            coral_low: init.coral_low.unwrap_or(defaults.coral_low),
            coral_high: init.coral_high.unwrap_or(defaults.coral_high),
            algae_low: init.algae_low.unwrap_or(defaults.algae_low),
            algae_high: init.algae_high.unwrap_or(defaults.algae_high),
            invulnerable_low: init.invulnerable_low.unwrap_or(defaults.invulnerable_low),
            invulnerable_high: init.invulnerable_high.unwrap_or(defaults.invulnerable_high),
        }
    }

    /// Build the immutable model description.
    pub fn model_config(&self) -> Result<ModelConfig> {
        let model = &self.model;
        let config = ModelConfig::new(
            model.family,
            model.n_patches,
            model.frac_nomove,
            model.strategy,
            &self.param_set(),
            &self.initial_levels(),
        )?;
        Ok(config)
    }

    pub fn bisection_options(&self) -> BisectionOptions {
        BisectionOptions {
            max_depth: self.equilibrium.max_depth,
            tolerance: self.equilibrium.tolerance,
        }
    }

    /// Fishing intensities scanned for bistability.
    pub fn bistable_intensities(&self) -> Vec<f64> {
        linspace(0.0, self.bistable.max_intensity, self.bistable.n_points)
    }
}
