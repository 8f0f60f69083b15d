//! Local reaction kernels.
//!
//! Each kernel maps the state of one patch, the fish influx it receives by
//! dispersal and its current fishing coefficient to the time derivative of
//! every compartment of that patch. Compartments are ordered fish, coral,
//! algae (or fish, coral, vulnerable algae, invulnerable algae).

use crate::error::SimResult;
use crate::params::{ModelFamily, ParamSet};

/// Steepness of the density-dependent fishing response.
const FISHING_STEEPNESS: f64 = 25.0;
/// Fish density at which fishing reaches half its intensity.
const FISHING_SHIFT: f64 = 0.2;

/// Scaling of the open coral recruitment term (Blackwood-Mumby).
const BM_CORAL_RECRUITMENT: f64 = 0.0005;
/// Scaling of the open algae recruitment term (Blackwood-Mumby).
const BM_ALGAE_RECRUITMENT: f64 = 0.0075;

#[derive(Debug, Clone, PartialEq)]
pub struct LeemputParams {
    /// Fish growth rate.
    pub s: f64,
    /// Coral growth rate.
    pub r: f64,
    /// Coral recruitment.
    pub i_c: f64,
    /// Algae recruitment.
    pub i_m: f64,
    /// Coral mortality.
    pub d: f64,
    /// Algae growth rate.
    pub gamma: f64,
    /// Grazing rate.
    pub g: f64,
    /// Coral-fish feedback strength.
    pub sigma: f64,
    /// Algae-fish feedback strength.
    pub eta: f64,
    /// Algae-coral feedback strength.
    pub alpha: f64,
}

impl LeemputParams {
    /// Resolve the parameters of a Leemput-type family.
    ///
    /// Feedbacks that the variant switches off are zeroed and not required.
    pub fn from_set(family: ModelFamily, set: &ParamSet) -> SimResult<Self> {
        let (use_sigma, use_eta, use_alpha) = match family {
            ModelFamily::LeemputAlgaeCoral => (false, false, true),
            ModelFamily::LeemputAlgaeFish => (false, true, false),
            ModelFamily::LeemputFishCoral => (true, false, false),
            _ => (true, true, true),
        };
        let feedback = |active: bool, key: &str| if active { set.get(key) } else { Ok(0.0) };

        Ok(Self {
            s: set.get("s")?,
            r: set.get("r")?,
            i_c: set.get("i_C")?,
            i_m: set.get("i_M")?,
            d: set.get("d")?,
            gamma: set.get("gamma")?,
            g: set.get("g")?,
            sigma: feedback(use_sigma, "sigma")?,
            eta: feedback(use_eta, "eta")?,
            alpha: feedback(use_alpha, "alpha")?,
        })
    }

    fn carrying_capacity(&self, coral: f64) -> f64 {
        (1.0 - self.sigma) + self.sigma * coral
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlackwoodParams {
    pub s: f64,
    pub beta: f64,
    pub r: f64,
    pub d: f64,
    /// Algal overgrowth of coral.
    pub a: f64,
    /// Grazing rate.
    pub alpha: f64,
    /// Algal spread into free space.
    pub gamma: f64,
    pub i_c: f64,
    pub i_m: f64,
}

impl BlackwoodParams {
    pub fn from_set(set: &ParamSet) -> SimResult<Self> {
        Ok(Self {
            s: set.get("s")?,
            beta: set.get("beta")?,
            r: set.get("r")?,
            d: set.get("d")?,
            a: set.get("a")?,
            alpha: set.get("alpha")?,
            gamma: set.get("gamma")?,
            i_c: set.get("i_C")?,
            i_m: set.get("i_M")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RassweilerParams {
    /// Fish growth rate.
    pub r_h: f64,
    /// Fish carrying capacity.
    pub k: f64,
    pub phi_c: f64,
    pub phi_m: f64,
    /// Production of vulnerable algae from the invulnerable stage.
    pub r_m: f64,
    pub g_tc: f64,
    pub g_tv: f64,
    pub g_ti: f64,
    /// Growth of algae over coral relative to free space.
    pub gamma: f64,
    /// Maturation from vulnerable to invulnerable algae.
    pub omega: f64,
    pub d_c: f64,
    pub d_i: f64,
    pub d_v: f64,
    pub graze: f64,
}

impl RassweilerParams {
    pub fn from_set(set: &ParamSet) -> SimResult<Self> {
        Ok(Self {
            r_h: set.get("rH")?,
            k: set.get("K")?,
            phi_c: set.get("phiC")?,
            phi_m: set.get("phiM")?,
            r_m: set.get("rM")?,
            g_tc: set.get("gTC")?,
            g_tv: set.get("gTV")?,
            g_ti: set.get("gTI")?,
            gamma: set.get("gamma")?,
            omega: set.get("omega")?,
            d_c: set.get("dC")?,
            d_i: set.get("dI")?,
            d_v: set.get("dV")?,
            graze: set.get("Graze")?,
        })
    }
}

/// Reaction kernel of one model family with its resolved parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Kernel {
    Leemput(LeemputParams),
    Blackwood(BlackwoodParams),
    Rassweiler(RassweilerParams),
}

impl Kernel {
    /// Resolve the kernel for `family`, failing on the first missing parameter.
    pub fn new(family: ModelFamily, set: &ParamSet) -> SimResult<Self> {
        let kernel = match family {
            ModelFamily::LeemputFull
            | ModelFamily::LeemputAlgaeCoral
            | ModelFamily::LeemputAlgaeFish
            | ModelFamily::LeemputFishCoral => Kernel::Leemput(LeemputParams::from_set(family, set)?),
            ModelFamily::BlackwoodMumby => Kernel::Blackwood(BlackwoodParams::from_set(set)?),
            ModelFamily::RassweilerBriggs => Kernel::Rassweiler(RassweilerParams::from_set(set)?),
        };
        Ok(kernel)
    }

    pub fn n_compartments(&self) -> usize {
        match self {
            Kernel::Rassweiler(_) => 4,
            _ => 3,
        }
    }

    /// Local derivatives of one patch.
    ///
    /// `fishing` is the fishing intensity already scaled by the management
    /// multiplier of this patch. For three-compartment kernels the last
    /// entries of `local` and of the result are ignored.
    pub fn local_rates(&self, local: [f64; 4], influx: f64, fishing: f64) -> [f64; 4] {
        match self {
            Kernel::Leemput(p) => leemput(p, local, influx, fishing),
            Kernel::Blackwood(p) => blackwood(p, local, influx, fishing),
            Kernel::Rassweiler(p) => rassweiler(p, local, influx, fishing),
        }
    }
}

/// Fishing mortality that rises steeply once fish density passes a threshold.
pub fn density_dependent_fishing(fish: f64, intensity: f64) -> f64 {
    intensity / (1.0 + (-FISHING_STEEPNESS * (fish - FISHING_SHIFT)).exp())
}

fn leemput(p: &LeemputParams, local: [f64; 4], influx: f64, fishing: f64) -> [f64; 4] {
    let [fish, coral, algae, _] = local;
    let free = 1.0 - algae - coral;

    let d_fish = influx + p.s * fish * (1.0 - fish / p.carrying_capacity(coral))
        - density_dependent_fishing(fish, fishing) * fish;
    let d_coral = (p.i_c + p.r * coral) * free * (1.0 - p.alpha * algae) - p.d * coral;
    let d_algae =
        (p.i_m + p.gamma * algae) * free - p.g * algae * fish / (p.g * p.eta * algae + 1.0);

    [d_fish, d_coral, d_algae, 0.0]
}

fn blackwood(p: &BlackwoodParams, local: [f64; 4], influx: f64, fishing: f64) -> [f64; 4] {
    let [fish, coral, algae, _] = local;
    let free = 1.0 - algae - coral;
    let capacity = p.beta * (1.0 - 0.5 * coral);

    let d_fish = influx + p.s * fish * (1.0 - fish / capacity) - fishing * fish;
    let d_coral = p.r * free * coral - p.d * coral - p.a * algae * coral
        + BM_CORAL_RECRUITMENT * p.i_c * free;
    let d_algae = p.a * algae * coral - p.alpha * fish / p.beta * algae / (1.0 - coral)
        + p.gamma * algae * free
        + BM_ALGAE_RECRUITMENT * p.i_m * free;

    [d_fish, d_coral, d_algae, 0.0]
}

fn rassweiler(p: &RassweilerParams, local: [f64; 4], influx: f64, fishing: f64) -> [f64; 4] {
    let [fish, coral, vuln, invuln] = local;
    let free = 1.0 - coral - vuln - invuln;
    let overgrowth = p.gamma * p.g_ti * invuln * coral;

    let d_fish = influx + p.r_h * fish * (1.0 - fish / p.k) - fishing * fish;
    let d_coral = p.phi_c * free + p.g_tc * free * coral - overgrowth - p.d_c * coral;
    let d_vuln = p.phi_m * free + p.r_m * free * invuln + p.g_tv * free * vuln
        - p.d_v * vuln
        - fish * vuln * p.graze
        - p.omega * vuln;
    let d_invuln = p.omega * vuln + p.g_ti * free * invuln + overgrowth - p.d_i * invuln;

    [d_fish, d_coral, d_vuln, d_invuln]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;

    fn kernel(family: ModelFamily) -> Kernel {
        Kernel::new(family, &ParamSet::defaults(family, 1.0)).unwrap()
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-12, "{a} != {b}");
    }

    #[test]
    fn resolves_every_family_from_defaults() {
        for family in ModelFamily::ALL {
            let expected = if family == ModelFamily::RassweilerBriggs { 4 } else { 3 };
            assert_eq!(kernel(family).n_compartments(), expected);
        }
    }

    #[test]
    fn missing_key_is_a_configuration_error() {
        let defaults = ParamSet::defaults(ModelFamily::BlackwoodMumby, 1.0);
        let set: ParamSet = defaults
            .keys()
            .filter(|&k| k != "beta")
            .map(|k| (k, defaults.get(k).unwrap()))
            .collect();
        let err = Kernel::new(ModelFamily::BlackwoodMumby, &set).unwrap_err();
        match err {
            SimError::Configuration(msg) => assert!(msg.contains("beta")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn variants_zero_inactive_feedbacks() {
        let mut set = ParamSet::defaults(ModelFamily::LeemputFull, 1.0);
        set.insert("sigma", 0.3);
        set.insert("eta", 0.6);
        set.insert("alpha", 0.9);

        let Kernel::Leemput(p) = Kernel::new(ModelFamily::LeemputAlgaeFish, &set).unwrap() else {
            panic!("expected a Leemput kernel");
        };
        assert_eq!((p.sigma, p.eta, p.alpha), (0.0, 0.6, 0.0));

        let Kernel::Leemput(p) = Kernel::new(ModelFamily::LeemputFull, &set).unwrap() else {
            panic!("expected a Leemput kernel");
        };
        assert_eq!((p.sigma, p.eta, p.alpha), (0.3, 0.6, 0.9));
    }

    #[test]
    fn leemput_rates_match_hand_computation() {
        let kernel = kernel(ModelFamily::LeemputFull);
        let (fish, coral, algae) = (0.2, 0.3, 0.4);
        let rates = kernel.local_rates([fish, coral, algae, 0.0], 0.01, 0.5);

        // At the fishing shift the logistic response is exactly half the intensity.
        let capacity = 0.5 + 0.5 * coral;
        let d_fish = 0.01 + fish * (1.0 - fish / capacity) - 0.25 * fish;
        let d_coral = (0.05 + 0.3 * coral) * 0.3 * (1.0 - 0.5 * algae) - 0.1 * coral;
        let d_algae = (0.05 + 0.8 * algae) * 0.3 - algae * fish / (2.0 * algae + 1.0);
        assert_close(rates[0], d_fish);
        assert_close(rates[1], d_coral);
        assert_close(rates[2], d_algae);
        assert_eq!(rates[3], 0.0);
    }

    #[test]
    fn blackwood_rates_match_hand_computation() {
        let kernel = kernel(ModelFamily::BlackwoodMumby);
        let (fish, coral, algae) = (0.1, 0.4, 0.2);
        let rates = kernel.local_rates([fish, coral, algae, 0.0], 0.0, 0.3);

        let free = 0.4;
        let d_fish = fish * (1.0 - fish / 0.8) - 0.3 * fish;
        let d_coral = free * coral - 0.44 * coral - 0.1 * algae * coral + 0.0005 * 0.05 * free;
        let d_algae = 0.1 * algae * coral - fish * algae / 0.6
            + 0.8 * algae * free
            + 0.0075 * 0.05 * free;
        assert_close(rates[0], d_fish);
        assert_close(rates[1], d_coral);
        assert_close(rates[2], d_algae);
    }

    #[test]
    fn rassweiler_rates_match_hand_computation() {
        let kernel = kernel(ModelFamily::RassweilerBriggs);
        let (fish, coral, vuln, invuln) = (10.0, 0.3, 0.1, 0.2);
        let rates = kernel.local_rates([fish, coral, vuln, invuln], 0.5, 0.2);

        let free = 0.4;
        let overgrowth = 0.4 * 0.4 * invuln * coral;
        let d_fish = 0.5 + fish * (1.0 - fish / 20.0) - 0.2 * fish;
        let d_coral = 0.001 * free + 0.1 * free * coral - overgrowth - 0.05 * coral;
        let d_vuln = 0.0001 * free + 0.5 * free * invuln + 0.2 * free * vuln
            - 0.4 * vuln
            - fish * vuln * 0.58
            - 2.0 * vuln;
        let d_invuln = 2.0 * vuln + 0.4 * free * invuln + overgrowth - 0.4 * invuln;
        assert_close(rates[0], d_fish);
        assert_close(rates[1], d_coral);
        assert_close(rates[2], d_vuln);
        assert_close(rates[3], d_invuln);
    }

    #[test]
    fn fishing_response_saturates_at_intensity() {
        assert_close(density_dependent_fishing(0.2, 0.8), 0.4);
        assert!(density_dependent_fishing(5.0, 0.8) > 0.7999);
        assert!(density_dependent_fishing(0.0, 0.8) < 0.01);
    }
}
