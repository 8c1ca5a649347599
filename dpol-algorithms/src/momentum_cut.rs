//! Momentum-space selection with reaction-plane rotation.
//!
//! Two policies, selected by polarization type:
//!
//! - **z-type**: a single pass; all five conditions are evaluated on the
//!   un-rotated momenta and only passing events are rotated.
//! - **y-type**: two stages. Stage 1 selects on the un-rotated momenta and
//!   rotates every stage-1 survivor; stage 2 then selects on the rotated px
//!   sum and on `phi` taken from the pre-rotation transverse sum.
//!
//! Rotated momenta are therefore defined for a superset of the final mask
//! (the intermediate mask). Slots outside it are `None`.

use crate::{Error, Result};
use dpol_core::{alignment_angle, rotate_transverse, EventBatch, Momentum, PolarizationType};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::f64::consts::PI;

/// Thresholds of the z-type policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZCutThresholds {
    /// `pz_p + pz_n` must exceed this (MeV/c).
    pub pz_sum_threshold: f64,
    /// `pi - |phi|` must be below this (rad).
    pub phi_threshold: f64,
    /// `|pz_p - pz_n|` must be below this (MeV/c).
    pub delta_pz_threshold: f64,
    /// `px_p + px_n` must be below this (MeV/c).
    pub px_sum_threshold: f64,
    /// `(px_p + px_n)^2 + (py_p + py_n)^2` must exceed this ((MeV/c)^2).
    pub pt_sum_sq_threshold: f64,
}

impl Default for ZCutThresholds {
    fn default() -> Self {
        Self {
            pz_sum_threshold: 1150.0,
            phi_threshold: 0.5,
            delta_pz_threshold: 150.0,
            px_sum_threshold: 200.0,
            pt_sum_sq_threshold: 2500.0,
        }
    }
}

/// Individually optional overrides of [`ZCutThresholds`].
///
/// Unknown keys are rejected when deserializing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ZCutOverrides {
    /// Replaces [`ZCutThresholds::pz_sum_threshold`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pz_sum_threshold: Option<f64>,
    /// Replaces [`ZCutThresholds::phi_threshold`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phi_threshold: Option<f64>,
    /// Replaces [`ZCutThresholds::delta_pz_threshold`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_pz_threshold: Option<f64>,
    /// Replaces [`ZCutThresholds::px_sum_threshold`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub px_sum_threshold: Option<f64>,
    /// Replaces [`ZCutThresholds::pt_sum_sq_threshold`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pt_sum_sq_threshold: Option<f64>,
}

impl ZCutThresholds {
    /// Returns these thresholds with every present override applied.
    #[must_use]
    pub fn with_overrides(mut self, overrides: &ZCutOverrides) -> Self {
        if let Some(value) = overrides.pz_sum_threshold {
            self.pz_sum_threshold = value;
        }
        if let Some(value) = overrides.phi_threshold {
            self.phi_threshold = value;
        }
        if let Some(value) = overrides.delta_pz_threshold {
            self.delta_pz_threshold = value;
        }
        if let Some(value) = overrides.px_sum_threshold {
            self.px_sum_threshold = value;
        }
        if let Some(value) = overrides.pt_sum_sq_threshold {
            self.pt_sum_sq_threshold = value;
        }
        self
    }

    fn values(&self) -> [(&'static str, f64); 5] {
        [
            ("pz_sum_threshold", self.pz_sum_threshold),
            ("phi_threshold", self.phi_threshold),
            ("delta_pz_threshold", self.delta_pz_threshold),
            ("px_sum_threshold", self.px_sum_threshold),
            ("pt_sum_sq_threshold", self.pt_sum_sq_threshold),
        ]
    }
}

/// Thresholds of the y-type policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YCutThresholds {
    /// Stage 1: `|py_p - py_n|` must be below this (MeV/c).
    pub delta_py_threshold: f64,
    /// Stage 1: summed transverse momentum squared must exceed this.
    pub pt_sum_sq_threshold: f64,
    /// Stage 2: rotated `px_p + px_n` must be below this (MeV/c).
    pub px_sum_after_rotation: f64,
    /// Stage 2: `pi - |phi|` must be below this (rad).
    pub phi_threshold: f64,
}

impl Default for YCutThresholds {
    fn default() -> Self {
        Self {
            delta_py_threshold: 150.0,
            pt_sum_sq_threshold: 2500.0,
            px_sum_after_rotation: 200.0,
            phi_threshold: 0.2,
        }
    }
}

/// Individually optional overrides of [`YCutThresholds`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct YCutOverrides {
    /// Replaces [`YCutThresholds::delta_py_threshold`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_py_threshold: Option<f64>,
    /// Replaces [`YCutThresholds::pt_sum_sq_threshold`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pt_sum_sq_threshold: Option<f64>,
    /// Replaces [`YCutThresholds::px_sum_after_rotation`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub px_sum_after_rotation: Option<f64>,
    /// Replaces [`YCutThresholds::phi_threshold`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phi_threshold: Option<f64>,
}

impl YCutThresholds {
    /// Returns these thresholds with every present override applied.
    #[must_use]
    pub fn with_overrides(mut self, overrides: &YCutOverrides) -> Self {
        if let Some(value) = overrides.delta_py_threshold {
            self.delta_py_threshold = value;
        }
        if let Some(value) = overrides.pt_sum_sq_threshold {
            self.pt_sum_sq_threshold = value;
        }
        if let Some(value) = overrides.px_sum_after_rotation {
            self.px_sum_after_rotation = value;
        }
        if let Some(value) = overrides.phi_threshold {
            self.phi_threshold = value;
        }
        self
    }

    fn values(&self) -> [(&'static str, f64); 4] {
        [
            ("delta_py_threshold", self.delta_py_threshold),
            ("pt_sum_sq_threshold", self.pt_sum_sq_threshold),
            ("px_sum_after_rotation", self.px_sum_after_rotation),
            ("phi_threshold", self.phi_threshold),
        ]
    }
}

/// Selection policy with its effective thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy")]
pub enum CutPolicy {
    /// Single-pass z-type selection.
    #[serde(rename = "zpol")]
    Z(ZCutThresholds),
    /// Two-stage y-type selection.
    #[serde(rename = "ypol")]
    Y(YCutThresholds),
}

impl CutPolicy {
    /// Default policy for a polarization type.
    #[must_use]
    pub fn defaults(pol_type: PolarizationType) -> Self {
        match pol_type {
            PolarizationType::Z => Self::Z(ZCutThresholds::default()),
            PolarizationType::Y => Self::Y(YCutThresholds::default()),
        }
    }

    /// Polarization type this policy belongs to.
    #[must_use]
    pub fn pol_type(&self) -> PolarizationType {
        match self {
            Self::Z(_) => PolarizationType::Z,
            Self::Y(_) => PolarizationType::Y,
        }
    }

    /// Checks that every threshold is finite.
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameter`] naming the first bad threshold.
    pub fn validate(&self) -> Result<()> {
        let check = |name: &str, value: f64| {
            if value.is_finite() {
                Ok(())
            } else {
                Err(Error::InvalidParameter(format!(
                    "{name} must be finite, got {value}"
                )))
            }
        };
        match self {
            Self::Z(t) => t.values().iter().try_for_each(|&(n, v)| check(n, v)),
            Self::Y(t) => t.values().iter().try_for_each(|&(n, v)| check(n, v)),
        }
    }
}

/// Effective cut settings, recorded next to each configuration's results.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MomentumCutSettings {
    /// Polarization type the policy belongs to.
    pub polarization: PolarizationType,
    /// Relative smearing resolution; `0.0` when smearing is off.
    pub resolution: f64,
    /// Policy tag and effective thresholds.
    pub thresholds: CutPolicy,
}

/// Rotated momenta of the events that reached the rotation step.
///
/// `None` marks events that were never rotated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RotatedMomenta {
    proton: Vec<Option<Momentum>>,
    neutron: Vec<Option<Momentum>>,
    angle: Vec<Option<f64>>,
}

impl RotatedMomenta {
    fn unset(len: usize) -> Self {
        Self {
            proton: vec![None; len],
            neutron: vec![None; len],
            angle: vec![None; len],
        }
    }

    fn set(&mut self, i: usize, proton: Momentum, neutron: Momentum, angle: f64) {
        self.proton[i] = Some(proton);
        self.neutron[i] = Some(neutron);
        self.angle[i] = Some(angle);
    }

    /// Number of event slots, rotated or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.proton.len()
    }

    /// Returns true if there are no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.proton.is_empty()
    }

    /// Rotated proton momentum of event `i`.
    #[must_use]
    pub fn proton(&self, i: usize) -> Option<Momentum> {
        self.proton.get(i).copied().flatten()
    }

    /// Rotated neutron momentum of event `i`.
    #[must_use]
    pub fn neutron(&self, i: usize) -> Option<Momentum> {
        self.neutron.get(i).copied().flatten()
    }

    /// Rotation applied to event `i`, i.e. `-phi`.
    #[must_use]
    pub fn angle(&self, i: usize) -> Option<f64> {
        self.angle.get(i).copied().flatten()
    }

    /// Number of rotated events.
    #[must_use]
    pub fn n_defined(&self) -> usize {
        self.angle.iter().filter(|a| a.is_some()).count()
    }
}

/// Passed fraction; `0.0` for an empty batch.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn efficiency(n_passed: usize, n_total: usize) -> f64 {
    if n_total == 0 {
        0.0
    } else {
        n_passed as f64 / n_total as f64
    }
}

/// Outcome of a momentum cut over one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct CutResult {
    /// Final per-event pass flags.
    pub mask: Vec<bool>,
    /// Events in the final mask.
    pub n_passed: usize,
    /// Events evaluated.
    pub n_total: usize,
    /// `n_passed / n_total`.
    pub efficiency: f64,
    /// Rotated momenta, defined for at least every passing event.
    pub rotated: RotatedMomenta,
}

impl CutResult {
    fn new(mask: Vec<bool>, rotated: RotatedMomenta) -> Self {
        let n_total = mask.len();
        let n_passed = mask.iter().filter(|&&m| m).count();
        Self {
            mask,
            n_passed,
            n_total,
            efficiency: efficiency(n_passed, n_total),
            rotated,
        }
    }

    /// Rotated momenta of the events in the final mask, in input order.
    #[must_use]
    pub fn passed_rotated(&self) -> EventBatch {
        self.mask
            .iter()
            .enumerate()
            .filter(|&(_, &passed)| passed)
            .filter_map(|(i, _)| Some((self.rotated.proton(i)?, self.rotated.neutron(i)?)))
            .collect()
    }
}

/// Policy-driven momentum cut with optional Gaussian smearing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MomentumCut {
    policy: CutPolicy,
    resolution: f64,
}

impl MomentumCut {
    /// Creates a cut from an explicit policy, without smearing.
    ///
    /// # Errors
    /// Returns an error if any threshold is not finite.
    pub fn new(policy: CutPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            policy,
            resolution: 0.0,
        })
    }

    /// Cut with the default thresholds of `pol_type`.
    #[must_use]
    pub fn for_polarization(pol_type: PolarizationType) -> Self {
        Self {
            policy: CutPolicy::defaults(pol_type),
            resolution: 0.0,
        }
    }

    /// Sets the relative momentum resolution used for smearing.
    ///
    /// # Errors
    /// Returns an error if `resolution` is negative or not finite.
    pub fn with_resolution(mut self, resolution: f64) -> Result<Self> {
        if !resolution.is_finite() || resolution < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "momentum resolution must be finite and >= 0, got {resolution}"
            )));
        }
        self.resolution = resolution;
        Ok(self)
    }

    /// Policy and thresholds in effect.
    #[must_use]
    pub fn policy(&self) -> &CutPolicy {
        &self.policy
    }

    /// Relative momentum resolution.
    #[must_use]
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Serializable record of the effective settings.
    #[must_use]
    pub fn describe(&self) -> MomentumCutSettings {
        MomentumCutSettings {
            polarization: self.policy.pol_type(),
            resolution: self.resolution,
            thresholds: self.policy,
        }
    }

    /// Smears the batch (if a resolution is set), then evaluates the policy.
    pub fn apply<R: Rng + ?Sized>(&self, batch: &EventBatch, rng: &mut R) -> CutResult {
        let input = if self.resolution > 0.0 {
            Cow::Owned(smear_batch(batch, self.resolution, rng))
        } else {
            Cow::Borrowed(batch)
        };
        self.evaluate(&input)
    }

    /// Evaluates the policy on the batch as given.
    #[must_use]
    pub fn evaluate(&self, batch: &EventBatch) -> CutResult {
        match &self.policy {
            CutPolicy::Z(t) => z_cut(batch, t),
            CutPolicy::Y(t) => y_cut(batch, t),
        }
    }
}

fn z_cut(batch: &EventBatch, t: &ZCutThresholds) -> CutResult {
    let mut mask = Vec::with_capacity(batch.len());
    let mut rotated = RotatedMomenta::unset(batch.len());

    for (i, (proton, neutron)) in batch.iter().enumerate() {
        let sum_px = proton.px + neutron.px;
        let sum_py = proton.py + neutron.py;
        let phi = alignment_angle(&proton, &neutron);

        let passed = proton.pz + neutron.pz > t.pz_sum_threshold
            && PI - phi.abs() < t.phi_threshold
            && (proton.pz - neutron.pz).abs() < t.delta_pz_threshold
            && sum_px < t.px_sum_threshold
            && sum_px * sum_px + sum_py * sum_py > t.pt_sum_sq_threshold;

        if passed {
            rotated.set(
                i,
                rotate_transverse(&proton, -phi),
                rotate_transverse(&neutron, -phi),
                -phi,
            );
        }
        mask.push(passed);
    }
    CutResult::new(mask, rotated)
}

fn y_cut(batch: &EventBatch, t: &YCutThresholds) -> CutResult {
    let mut mask = Vec::with_capacity(batch.len());
    let mut rotated = RotatedMomenta::unset(batch.len());

    for (i, (proton, neutron)) in batch.iter().enumerate() {
        let sum_px = proton.px + neutron.px;
        let sum_py = proton.py + neutron.py;

        let stage1 = (proton.py - neutron.py).abs() < t.delta_py_threshold
            && sum_px * sum_px + sum_py * sum_py > t.pt_sum_sq_threshold;
        if !stage1 {
            mask.push(false);
            continue;
        }

        let phi = alignment_angle(&proton, &neutron);
        let proton_rot = rotate_transverse(&proton, -phi);
        let neutron_rot = rotate_transverse(&neutron, -phi);
        rotated.set(i, proton_rot, neutron_rot, -phi);

        let stage2 = proton_rot.px + neutron_rot.px < t.px_sum_after_rotation
            && PI - phi.abs() < t.phi_threshold;
        mask.push(stage2);
    }
    CutResult::new(mask, rotated)
}

/// Adds independent zero-mean Gaussian noise to every component,
/// `p -> p + N(0, 1) * resolution * |p|`.
///
/// Columns are smeared in the order pxp, pyp, pzp, pxn, pyn, pzn. A
/// resolution of zero (or below) returns an identical copy.
pub fn smear_batch<R: Rng + ?Sized>(batch: &EventBatch, resolution: f64, rng: &mut R) -> EventBatch {
    if resolution <= 0.0 {
        return batch.clone();
    }
    let mut smear = |column: &[f64]| -> Vec<f64> {
        column
            .iter()
            .map(|&value| {
                let noise: f64 = rng.sample(StandardNormal);
                value + noise * resolution * value.abs()
            })
            .collect()
    };
    EventBatch {
        pxp: smear(&batch.pxp),
        pyp: smear(&batch.pyp),
        pzp: smear(&batch.pzp),
        pxn: smear(&batch.pxn),
        pyn: smear(&batch.pyn),
        pzn: smear(&batch.pzn),
    }
}

/// Independent per-component range cut on both particles.
///
/// A plain sanity check: no rotation and no interaction with the staged
/// policies. Ranges are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxCut {
    /// Accepted px interval (MeV/c).
    pub px_range: (f64, f64),
    /// Accepted py interval (MeV/c).
    pub py_range: (f64, f64),
    /// Accepted pz interval (MeV/c).
    pub pz_range: (f64, f64),
}

impl Default for BoxCut {
    fn default() -> Self {
        Self {
            px_range: (-300.0, 300.0),
            py_range: (-300.0, 300.0),
            pz_range: (200.0, 800.0),
        }
    }
}

impl BoxCut {
    /// Sets the accepted px interval (MeV/c).
    #[must_use]
    pub fn with_px_range(mut self, min: f64, max: f64) -> Self {
        self.px_range = (min, max);
        self
    }

    /// Sets the accepted py interval (MeV/c).
    #[must_use]
    pub fn with_py_range(mut self, min: f64, max: f64) -> Self {
        self.py_range = (min, max);
        self
    }

    /// Sets the accepted pz interval (MeV/c).
    #[must_use]
    pub fn with_pz_range(mut self, min: f64, max: f64) -> Self {
        self.pz_range = (min, max);
        self
    }

    /// Returns true if every component of `p` lies in its range.
    #[must_use]
    pub fn contains(&self, p: &Momentum) -> bool {
        let inside = |v: f64, (lo, hi): (f64, f64)| v >= lo && v <= hi;
        inside(p.px, self.px_range) && inside(p.py, self.py_range) && inside(p.pz, self.pz_range)
    }

    /// Applies the box to both particles of every event.
    #[must_use]
    pub fn apply(&self, batch: &EventBatch) -> CutResult {
        let mask = batch
            .iter()
            .map(|(proton, neutron)| self.contains(&proton) && self.contains(&neutron))
            .collect::<Vec<_>>();
        let n = mask.len();
        CutResult::new(mask, RotatedMomenta::unset(n))
    }
}
