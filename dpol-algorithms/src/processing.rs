//! High-level pipeline combining the momentum cut and the geometry filter.

use crate::geometry::GeometryFilter;
use crate::momentum_cut::MomentumCut;
use crate::ratio::RatioStatistic;
use crate::Result;
use dpol_core::EventBatch;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Raw merged events.
    BeforeCut,
    /// Momentum-cut survivors, rotated into the reaction-plane frame.
    AfterCut,
    /// Survivors of both the momentum cut and the geometry filter.
    AfterGeometry,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 3] = [Stage::BeforeCut, Stage::AfterCut, Stage::AfterGeometry];

    /// File-name friendly stage name.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::BeforeCut => "before_cut",
            Self::AfterCut => "after_cut",
            Self::AfterGeometry => "after_geometry",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Events of one stage and their ratio.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageRecord {
    /// Momenta of the events that reached this stage.
    pub events: EventBatch,
    /// Asymmetry ratio of `events`.
    pub ratio: RatioStatistic,
}

impl StageRecord {
    fn new(events: EventBatch) -> Self {
        let ratio = RatioStatistic::from_px(&events.pxp, &events.pxn);
        Self { events, ratio }
    }

    /// Number of events at this stage.
    #[must_use]
    pub fn n_events(&self) -> usize {
        self.events.len()
    }
}

/// Output of [`run_stages`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagedEvents {
    /// Raw merged events.
    pub before_cut: StageRecord,
    /// Rotated momentum-cut survivors.
    pub after_cut: StageRecord,
    /// Rotated survivors accepted by both detectors.
    pub after_geometry: StageRecord,
    /// Momentum-cut efficiency over all merged events.
    pub cut_efficiency: f64,
    /// Geometry efficiency over the momentum-cut survivors.
    pub geo_efficiency: f64,
}

impl StagedEvents {
    /// Record of one stage.
    #[must_use]
    pub fn stage(&self, stage: Stage) -> &StageRecord {
        match stage {
            Stage::BeforeCut => &self.before_cut,
            Stage::AfterCut => &self.after_cut,
            Stage::AfterGeometry => &self.after_geometry,
        }
    }
}

/// Runs before-cut, after-cut and after-geometry stages over one batch.
///
/// The before-cut ratio uses raw px; later stages use the rotated momenta
/// of the cut survivors, and the geometry filter sees rotated momenta.
///
/// # Errors
/// Returns an error if the intermediate masks disagree in length with
/// their batches.
pub fn run_stages<R: Rng + ?Sized>(
    batch: &EventBatch,
    cut: &MomentumCut,
    geometry: &GeometryFilter,
    rng: &mut R,
) -> Result<StagedEvents> {
    let cut_result = cut.apply(batch, rng);
    let after_cut = cut_result.passed_rotated();
    let geo_result = geometry.apply(&after_cut);
    let after_geometry = after_cut.select(&geo_result.mask)?;

    Ok(StagedEvents {
        before_cut: StageRecord::new(batch.clone()),
        after_cut: StageRecord::new(after_cut),
        after_geometry: StageRecord::new(after_geometry),
        cut_efficiency: cut_result.efficiency,
        geo_efficiency: geo_result.efficiency,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use dpol_core::{Momentum, PolarizationType};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    #[test]
    fn test_stages_shrink_monotonically() {
        let batch: EventBatch = vec![
            // passes the z cut; rotated neutron px is outside the NEBULA window
            (Momentum::new(-60.0, 20.0, 640.0), Momentum::new(-40.0, -10.0, 600.0)),
            // fails the z cut (phi = 0)
            (Momentum::new(0.0, 0.0, 700.0), Momentum::new(0.0, 0.0, 600.0)),
        ]
        .into_iter()
        .collect();

        let cut = MomentumCut::for_polarization(PolarizationType::Z);
        let geometry = GeometryFilter::new(1.0, 5.0).unwrap();
        let mut rng = Xoshiro256StarStar::seed_from_u64(0);
        let staged = run_stages(&batch, &cut, &geometry, &mut rng).unwrap();

        assert_eq!(staged.before_cut.n_events(), 2);
        assert_eq!(staged.after_cut.n_events(), 1);
        assert!(staged.after_geometry.n_events() <= staged.after_cut.n_events());
        assert_abs_diff_eq!(staged.cut_efficiency, 0.5);
        assert_eq!(staged.stage(Stage::BeforeCut).ratio.n_total, 2);
    }

    #[test]
    fn test_empty_batch() {
        let cut = MomentumCut::for_polarization(PolarizationType::Y);
        let geometry = GeometryFilter::new(1.2, 10.0).unwrap();
        let mut rng = Xoshiro256StarStar::seed_from_u64(0);
        let staged = run_stages(&EventBatch::default(), &cut, &geometry, &mut rng).unwrap();
        assert_eq!(staged.after_geometry.n_events(), 0);
        assert_eq!(staged.after_cut.ratio.ratio, None);
        assert_abs_diff_eq!(staged.geo_efficiency, 0.0);
        assert_eq!(Stage::AfterGeometry.to_string(), "after_geometry");
    }
}
