//! Simulation output types.

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Compartment index of fish in the state layout.
pub const FISH: usize = 0;
/// Compartment index of coral in the state layout.
pub const CORAL: usize = 1;

/// States of a run at the requested output times.
///
/// Row `k` of `states` is the full state vector at `times[k]`, laid out as
/// one block of `n_patches` values per compartment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    times: Vec<f64>,
    states: Array2<f64>,
    n_patches: usize,
    n_compartments: usize,
}

impl Trajectory {
    pub(crate) fn new(times: Vec<f64>, states: Array2<f64>, n_patches: usize, n_compartments: usize) -> Self {
        debug_assert_eq!(states.dim(), (times.len(), n_patches * n_compartments));
        Self {
            times,
            states,
            n_patches,
            n_compartments,
        }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn n_patches(&self) -> usize {
        self.n_patches
    }

    /// Full state vector at output index `k`.
    pub fn state(&self, k: usize) -> ArrayView1<'_, f64> {
        self.states.row(k)
    }

    pub fn final_state(&self) -> Option<ArrayView1<'_, f64>> {
        self.len().checked_sub(1).map(|k| self.states.row(k))
    }

    /// Time series of one compartment in one patch.
    pub fn compartment(&self, compartment: usize, patch: usize) -> ArrayView1<'_, f64> {
        self.states.column(compartment * self.n_patches + patch)
    }

    pub fn fish(&self, patch: usize) -> ArrayView1<'_, f64> {
        self.compartment(FISH, patch)
    }

    pub fn coral(&self, patch: usize) -> ArrayView1<'_, f64> {
        self.compartment(CORAL, patch)
    }

    /// Coral cover averaged over all patches at output index `k`.
    pub fn mean_coral_at(&self, k: usize) -> f64 {
        let start = CORAL * self.n_patches;
        let row = self.states.row(k);
        row.iter().skip(start).take(self.n_patches).sum::<f64>() / self.n_patches as f64
    }
}
