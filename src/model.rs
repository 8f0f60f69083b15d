use crate::dispersal::dispersal_matrix;
use crate::error::SimResult;
use crate::forcing::{ManagementParams, Strategy, multiplier};
use crate::kernels::Kernel;
use crate::params::{ModelFamily, ParamSet};
use crate::trajectory::{CORAL, FISH};
use crate::utils::check_num;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Levels used to build the initial-condition presets.
///
/// For Rassweiler-Briggs, `algae_*` is the vulnerable macroalgae and
/// `invulnerable_*` the invulnerable class; other families ignore the latter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialLevels {
    pub fish: f64,
    pub coral_low: f64,
    pub coral_high: f64,
    pub algae_low: f64,
    pub algae_high: f64,
    pub invulnerable_low: f64,
    pub invulnerable_high: f64,
}

impl InitialLevels {
    pub fn for_family(family: ModelFamily) -> Self {
        match family {
            ModelFamily::RassweilerBriggs => Self {
                fish: 20.0,
                coral_low: 0.04,
                coral_high: 0.6,
                algae_low: 0.04,
                algae_high: 0.2,
                invulnerable_low: 0.04,
                invulnerable_high: 0.2,
            },
            _ => Self {
                fish: 0.1,
                coral_low: 0.04,
                coral_high: 0.6,
                algae_low: 0.04,
                algae_high: 0.4,
                invulnerable_low: 0.0,
                invulnerable_high: 0.0,
            },
        }
    }

    fn validate(&self) -> SimResult<()> {
        check_num(self.fish, 0.0..f64::INFINITY).map_err(|e| e.prefixed("invalid initial fish"))?;
        for (name, val) in [
            ("coral_low", self.coral_low),
            ("coral_high", self.coral_high),
            ("algae_low", self.algae_low),
            ("algae_high", self.algae_high),
            ("invulnerable_low", self.invulnerable_low),
            ("invulnerable_high", self.invulnerable_high),
        ] {
            check_num(val, 0.0..=1.0).map_err(|e| e.prefixed(format!("invalid initial {name}")))?;
        }
        Ok(())
    }
}

/// Initial-condition preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// Coral starts low, algae high.
    Low,
    /// Coral starts high, algae low.
    High,
}

/// Immutable description of a patch model.
///
/// Holds everything that stays fixed across runs: the model family and its
/// resolved kernel, the dispersal matrix, the management strategy and the
/// initial-condition presets. Management parameters are passed per run.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    family: ModelFamily,
    kernel: Kernel,
    n_patches: usize,
    strategy: Strategy,
    dispersal: Array2<f64>,
    x1: Vec<f64>,
    x2: Vec<f64>,
}

impl ModelConfig {
    pub fn new(
        family: ModelFamily,
        n_patches: usize,
        frac_nomove: f64,
        strategy: Strategy,
        params: &ParamSet,
        levels: &InitialLevels,
    ) -> SimResult<Self> {
        let dispersal = dispersal_matrix(n_patches, frac_nomove)?;
        let kernel = Kernel::new(family, params).map_err(|e| e.prefixed(format!("{family} parameters")))?;
        levels.validate()?;

        let block = |val: f64| std::iter::repeat_n(val, n_patches);
        let (x1, x2): (Vec<f64>, Vec<f64>) = match family {
            ModelFamily::RassweilerBriggs => (
                block(levels.fish)
                    .chain(block(levels.coral_low))
                    .chain(block(levels.algae_high))
                    .chain(block(levels.invulnerable_high))
                    .collect(),
                block(levels.fish)
                    .chain(block(levels.coral_high))
                    .chain(block(levels.algae_low))
                    .chain(block(levels.invulnerable_low))
                    .collect(),
            ),
            _ => (
                block(levels.fish)
                    .chain(block(levels.coral_low))
                    .chain(block(levels.algae_high))
                    .collect(),
                block(levels.fish)
                    .chain(block(levels.coral_high))
                    .chain(block(levels.algae_low))
                    .collect(),
            ),
        };

        Ok(Self {
            family,
            kernel,
            n_patches,
            strategy,
            dispersal,
            x1,
            x2,
        })
    }

    pub fn family(&self) -> ModelFamily {
        self.family
    }

    pub fn n_patches(&self) -> usize {
        self.n_patches
    }

    pub fn n_compartments(&self) -> usize {
        self.kernel.n_compartments()
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Length of a full state vector.
    pub fn state_len(&self) -> usize {
        self.n_compartments() * self.n_patches
    }

    pub fn preset(&self, preset: Preset) -> &[f64] {
        match preset {
            Preset::Low => &self.x1,
            Preset::High => &self.x2,
        }
    }

    /// Copy of this model run under another management strategy.
    pub fn with_strategy(&self, strategy: Strategy) -> Self {
        Self {
            strategy,
            ..self.clone()
        }
    }

    /// Copy of `state` with the coral of every patch set to `coral`.
    pub fn with_coral(&self, state: &[f64], coral: f64) -> Vec<f64> {
        let mut state = state.to_vec();
        let block = CORAL * self.n_patches..(CORAL + 1) * self.n_patches;
        state[block].fill(coral);
        state
    }

    /// Right-hand side of the coupled patch system under `mgmt`.
    pub fn system(&self, mgmt: ManagementParams) -> PatchSystem<'_> {
        PatchSystem { model: self, mgmt }
    }
}

/// Coupled right-hand side of all patches for one run.
///
/// Borrows the model immutably and owns its management parameters, so
/// independent runs never share mutable state.
#[derive(Debug, Clone, Copy)]
pub struct PatchSystem<'a> {
    model: &'a ModelConfig,
    mgmt: ManagementParams,
}

impl PatchSystem<'_> {
    /// Write the time derivative of the full state `x` at time `t` into `dx`.
    pub fn rhs(&self, t: f64, x: &[f64], dx: &mut [f64]) {
        let model = self.model;
        let n = model.n_patches;
        let n_comp = model.n_compartments();
        let fish = ArrayView1::from(&x[FISH * n..(FISH + 1) * n]);

        for i in 0..n {
            let influx = model.dispersal.row(i).dot(&fish);
            let fishing = self.mgmt.fishing_intensity * multiplier(model.strategy, t, i, n, &self.mgmt);

            let mut local = [0.0; 4];
            for (c, val) in local.iter_mut().enumerate().take(n_comp) {
                *val = x[c * n + i];
            }

            let rates = model.kernel.local_rates(local, influx, fishing);
            for (c, &rate) in rates.iter().enumerate().take(n_comp) {
                dx[c * n + i] = rate;
            }
        }
    }
}
