use crate::error::SimResult;
use crate::utils::check_num;
use serde::{Deserialize, Serialize};

/// Spatial management strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    /// Closures rotate through the patches.
    #[serde(alias = "periodic")]
    Periodic,
    /// The same patches stay closed for the whole run.
    #[serde(alias = "MPA", alias = "static_mpa")]
    StaticMpa,
}

/// Management parameters of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagementParams {
    /// Time one rotation slot stays closed (0 disables the rotation).
    pub closure_length: f64,
    /// Fishing mortality coefficient of a fully open patch.
    pub fishing_intensity: f64,
    /// Number of patches closed at any instant.
    pub n_closed: usize,
    /// Fraction of the fishing pressure that persists inside closed patches.
    pub poaching: f64,
}

impl Default for ManagementParams {
    fn default() -> Self {
        Self::unfished()
    }
}

impl ManagementParams {
    /// No closures, no fishing.
    pub fn unfished() -> Self {
        Self {
            closure_length: 0.0,
            fishing_intensity: 0.0,
            n_closed: 0,
            poaching: 0.0,
        }
    }

    pub fn validate(&self, n: usize) -> SimResult<()> {
        check_num(self.n_closed, 0..=n).map_err(|e| e.prefixed("invalid number of closed patches"))?;
        check_num(self.poaching, 0.0..=1.0).map_err(|e| e.prefixed("invalid poaching fraction"))?;
        check_num(self.closure_length, 0.0..f64::INFINITY)
            .map_err(|e| e.prefixed("invalid closure length"))?;
        check_num(self.fishing_intensity, 0.0..f64::INFINITY)
            .map_err(|e| e.prefixed("invalid fishing intensity"))?;

        Ok(())
    }
}

/// Whether `patch` is closed at time `t`.
pub fn is_closed(strategy: Strategy, t: f64, patch: usize, n: usize, mgmt: &ManagementParams) -> bool {
    let m = mgmt.n_closed;
    if m == 0 {
        return false;
    }
    if m >= n {
        return true;
    }
    match strategy {
        Strategy::Periodic => {
            if mgmt.closure_length <= 0.0 {
                return false;
            }
            let start = rotation_start(t, n, mgmt.closure_length);
            // Offset of the patch from the window start, wrapping past n - 1.
            (patch + n - start) % n < m
        }
        Strategy::StaticMpa => patch <= m,
    }
}

/// Fishing-pressure multiplier of `patch` at time `t`.
///
/// Closed patches only see poaching. Open patches absorb the displaced
/// effort, so under rotation the patch-averaged multiplier stays 1.
pub fn multiplier(strategy: Strategy, t: f64, patch: usize, n: usize, mgmt: &ManagementParams) -> f64 {
    if is_closed(strategy, t, patch, n, mgmt) {
        return mgmt.poaching;
    }
    if strategy == Strategy::Periodic && mgmt.closure_length <= 0.0 {
        return 1.0;
    }
    let frac_closed = mgmt.n_closed as f64 / n as f64;
    (1.0 - frac_closed * mgmt.poaching) / (1.0 - frac_closed)
}

/// Indices of all patches closed at time `t`.
pub fn closed_patches(strategy: Strategy, t: f64, n: usize, mgmt: &ManagementParams) -> Vec<usize> {
    (0..n).filter(|&patch| is_closed(strategy, t, patch, n, mgmt)).collect()
}

fn rotation_start(t: f64, n: usize, closure_length: f64) -> usize {
    let phase = t.rem_euclid(n as f64 * closure_length);
    (phase / closure_length).floor() as usize % n
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::Strategy;
    use proptest::prelude::*;
    use proptest::strategy::Strategy as _;

    fn mgmt(closure_length: f64, n_closed: usize, poaching: f64) -> ManagementParams {
        ManagementParams {
            closure_length,
            fishing_intensity: 0.4,
            n_closed,
            poaching,
        }
    }

    #[test]
    fn one_of_four_closed_without_poaching() {
        let mgmt = mgmt(10.0, 1, 0.0);
        let mults: Vec<_> = (0..4).map(|i| multiplier(Strategy::Periodic, 5.0, i, 4, &mgmt)).collect();
        assert_eq!(mults[0], 0.0);
        for &mult in &mults[1..] {
            assert!((mult - 4.0 / 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn window_rotates_and_wraps() {
        let mgmt = mgmt(10.0, 2, 0.0);
        assert_eq!(closed_patches(Strategy::Periodic, 0.0, 4, &mgmt), vec![0, 1]);
        assert_eq!(closed_patches(Strategy::Periodic, 15.0, 4, &mgmt), vec![1, 2]);
        assert_eq!(closed_patches(Strategy::Periodic, 25.0, 4, &mgmt), vec![2, 3]);
        assert_eq!(closed_patches(Strategy::Periodic, 35.0, 4, &mgmt), vec![0, 3]);
        // Next cycle starts over.
        assert_eq!(closed_patches(Strategy::Periodic, 40.0, 4, &mgmt), vec![0, 1]);
    }

    #[test]
    fn zero_closure_length_keeps_everything_open() {
        let mgmt = mgmt(0.0, 2, 0.5);
        for i in 0..4 {
            assert!(!is_closed(Strategy::Periodic, 123.0, i, 4, &mgmt));
        }
        let unfished = ManagementParams::unfished();
        assert_eq!(multiplier(Strategy::Periodic, 7.0, 3, 4, &unfished), 1.0);
    }

    #[test]
    fn zero_closure_length_fishes_every_patch_at_baseline() {
        let mgmt = mgmt(0.0, 1, 0.0);
        for t in [0.0, 5.0, 250.0] {
            let mults: Vec<_> = (0..4).map(|i| multiplier(Strategy::Periodic, t, i, 4, &mgmt)).collect();
            assert_eq!(mults, vec![1.0; 4]);
        }
        // Closing every patch still leaves only poaching.
        assert_eq!(multiplier(Strategy::Periodic, 5.0, 2, 4, &self::mgmt(0.0, 4, 0.2)), 0.2);
    }

    #[test]
    fn static_mpa_closes_low_indices() {
        let mgmt = mgmt(500.0, 2, 0.1);
        assert_eq!(closed_patches(Strategy::StaticMpa, 0.0, 6, &mgmt), vec![0, 1, 2]);
        assert_eq!(closed_patches(Strategy::StaticMpa, 999.0, 6, &mgmt), vec![0, 1, 2]);
        let open = multiplier(Strategy::StaticMpa, 0.0, 5, 6, &mgmt);
        assert!((open - (1.0 - 0.1 / 3.0) / (2.0 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn static_mpa_extremes() {
        for t in [0.0, 3.5, 400.0] {
            for i in 0..5 {
                assert_eq!(multiplier(Strategy::StaticMpa, t, i, 5, &mgmt(500.0, 0, 0.3)), 1.0);
                assert_eq!(multiplier(Strategy::StaticMpa, t, i, 5, &mgmt(500.0, 5, 0.3)), 0.3);
            }
        }
    }

    #[test]
    fn validate_checks_ranges() {
        assert!(mgmt(10.0, 4, 0.0).validate(4).is_ok());
        assert!(mgmt(10.0, 5, 0.0).validate(4).is_err());
        assert!(mgmt(10.0, 1, 1.5).validate(4).is_err());
        assert!(mgmt(-1.0, 1, 0.0).validate(4).is_err());
    }

    proptest! {
        #[test]
        fn zero_closure_length_conserves_effort(
            (n, m) in (1usize..20).prop_flat_map(|n| (Just(n), 0..n)),
            t in 0.0f64..1000.0,
            poaching in 0.0f64..=1.0,
        ) {
            let mgmt = mgmt(0.0, m, poaching);
            for i in 0..n {
                prop_assert_eq!(multiplier(Strategy::Periodic, t, i, n, &mgmt), 1.0);
            }
        }

        #[test]
        fn no_closures_is_a_no_op(n in 1usize..20, t in 0.0f64..1000.0, len in 0.0f64..50.0, poaching in 0.0f64..=1.0) {
            let mgmt = mgmt(len, 0, poaching);
            for i in 0..n {
                prop_assert_eq!(multiplier(Strategy::Periodic, t, i, n, &mgmt), 1.0);
            }
        }

        #[test]
        fn closing_everything_leaves_poaching(n in 1usize..20, t in 0.0f64..1000.0, len in 0.1f64..50.0, poaching in 0.0f64..=1.0) {
            let mgmt = mgmt(len, n, poaching);
            for i in 0..n {
                prop_assert_eq!(multiplier(Strategy::Periodic, t, i, n, &mgmt), poaching);
                prop_assert_eq!(multiplier(Strategy::StaticMpa, t, i, n, &mgmt), poaching);
            }
        }

        #[test]
        fn rotation_conserves_effort(
            (n, m) in (1usize..20).prop_flat_map(|n| (Just(n), 0..n)),
            t in 0.0f64..1000.0,
            len in 0.1f64..50.0,
            poaching in 0.0f64..=1.0,
        ) {
            let mgmt = mgmt(len, m, poaching);
            let closed = closed_patches(Strategy::Periodic, t, n, &mgmt);
            prop_assert_eq!(closed.len(), m);

            let avg = (0..n).map(|i| multiplier(Strategy::Periodic, t, i, n, &mgmt)).sum::<f64>() / n as f64;
            prop_assert!((avg - 1.0).abs() < 1e-9, "average multiplier {}", avg);
        }
    }
}
