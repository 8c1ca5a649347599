//! Nested per-event cut levels used by the streaming survey.
//!
//! Each level adds conditions to the previous one, so an event passing
//! `Tight` also passes `Mid` and `Loose`. `Tight` is the full batch policy
//! of [`MomentumCut`](crate::MomentumCut) evaluated on a single event.

use crate::momentum_cut::CutPolicy;
use dpol_core::{Derived, Event};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cut level of the streaming survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CutLevel {
    /// Longitudinal (z) or vertical-difference (y) conditions only.
    Loose,
    /// Adds the transverse-sum conditions.
    Mid,
    /// Adds the back-to-back angle condition.
    Tight,
}

impl CutLevel {
    /// All levels, loosest first.
    pub const ALL: [CutLevel; 3] = [CutLevel::Loose, CutLevel::Mid, CutLevel::Tight];

    /// Lowercase name used in bucket identities and reports.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Loose => "loose",
            Self::Mid => "mid",
            Self::Tight => "tight",
        }
    }

    /// Returns true if the event passes this level under `policy`.
    ///
    /// y-type: loose = `|dpy|` and summed pt^2; mid adds the rotated px sum;
    /// tight adds `pi - |phi|`.
    /// z-type: loose = summed pz and `|dpz|`; mid adds px sum and summed
    /// pt^2; tight adds `pi - |phi|`.
    #[must_use]
    pub fn passes(self, policy: &CutPolicy, event: &Event, derived: &Derived) -> bool {
        match policy {
            CutPolicy::Y(t) => {
                let loose = (event.proton.py - event.neutron.py).abs() < t.delta_py_threshold
                    && derived.sum_pt_sq > t.pt_sum_sq_threshold;
                let mid = || {
                    derived.proton_rot.px + derived.neutron_rot.px < t.px_sum_after_rotation
                };
                let tight = || derived.back_to_back_offset() < t.phi_threshold;
                match self {
                    Self::Loose => loose,
                    Self::Mid => loose && mid(),
                    Self::Tight => loose && mid() && tight(),
                }
            }
            CutPolicy::Z(t) => {
                let loose = derived.sum_pz > t.pz_sum_threshold
                    && derived.diff_pz.abs() < t.delta_pz_threshold;
                let mid = || {
                    derived.sum_px < t.px_sum_threshold
                        && derived.sum_pt_sq > t.pt_sum_sq_threshold
                };
                let tight = || derived.back_to_back_offset() < t.phi_threshold;
                match self {
                    Self::Loose => loose,
                    Self::Mid => loose && mid(),
                    Self::Tight => loose && mid() && tight(),
                }
            }
        }
    }

    /// Levels passed by the event, loosest first.
    #[must_use]
    pub fn passed(policy: &CutPolicy, event: &Event, derived: &Derived) -> Vec<CutLevel> {
        Self::ALL
            .into_iter()
            .filter(|level| level.passes(policy, event, derived))
            .collect()
    }
}

impl fmt::Display for CutLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CutLevel {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "loose" => Ok(Self::Loose),
            "mid" => Ok(Self::Mid),
            "tight" => Ok(Self::Tight),
            other => Err(crate::Error::InvalidParameter(format!(
                "unknown cut level '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MomentumCut;
    use dpol_core::{
        ChargeOrder, EventBatch, EventTag, Momentum, PolarizationType, PolarizationVariant,
    };
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256StarStar;
    use std::sync::Arc;

    fn random_events(pol_type: PolarizationType, n: usize) -> Vec<Event> {
        let tag = Arc::new(EventTag {
            layout: pol_type.layout(),
            target: "Pb208".to_string(),
            gamma: "050".to_string(),
            variant: PolarizationVariant::new(pol_type, ChargeOrder::Np),
        });
        let mut rng = Xoshiro256StarStar::seed_from_u64(99);
        (0..n)
            .map(|i| {
                let proton = Momentum::new(
                    rng.gen_range(-150.0..150.0),
                    rng.gen_range(-150.0..150.0),
                    rng.gen_range(500.0..700.0),
                );
                let neutron = Momentum::new(
                    rng.gen_range(-150.0..150.0),
                    rng.gen_range(-150.0..150.0),
                    rng.gen_range(500.0..700.0),
                );
                Event::new(Arc::clone(&tag), i64::try_from(i).unwrap(), proton, neutron)
            })
            .collect()
    }

    #[test]
    fn test_levels_are_nested() {
        for pol_type in [PolarizationType::Z, PolarizationType::Y] {
            let policy = CutPolicy::defaults(pol_type);
            for event in random_events(pol_type, 2000) {
                let d = Derived::from_event(&event);
                let passed = CutLevel::passed(&policy, &event, &d);
                if passed.contains(&CutLevel::Tight) {
                    assert!(passed.contains(&CutLevel::Mid));
                }
                if passed.contains(&CutLevel::Mid) {
                    assert!(passed.contains(&CutLevel::Loose));
                }
            }
        }
    }

    #[test]
    fn test_tight_matches_batch_policy() {
        for pol_type in [PolarizationType::Z, PolarizationType::Y] {
            let events = random_events(pol_type, 3000);
            let policy = CutPolicy::defaults(pol_type);
            let batch = EventBatch::from_events(&events);
            let result = MomentumCut::for_polarization(pol_type).evaluate(&batch);
            for (event, &in_mask) in events.iter().zip(&result.mask) {
                let d = Derived::from_event(event);
                assert_eq!(CutLevel::Tight.passes(&policy, event, &d), in_mask);
            }
        }
    }

    #[test]
    fn test_parse_level() {
        assert_eq!("Mid".parse::<CutLevel>().unwrap(), CutLevel::Mid);
        assert!("medium".parse::<CutLevel>().is_err());
        assert_eq!(CutLevel::Tight.to_string(), "tight");
    }
}
