//! Reaction-plane alignment.
//!
//! Every event has a random azimuthal orientation. Rotating both momenta by
//! `-phi`, where `phi` is the azimuth of the summed transverse momentum, puts
//! the summed transverse momentum on the +x axis so that selection thresholds
//! no longer depend on the orientation.
//!
//! `atan2(0, 0)` evaluates to `0.0`, so an event with zero summed transverse
//! momentum gets `phi = 0` and is left unrotated.

use crate::event::{Event, Momentum};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Azimuth of the summed transverse momentum, `atan2(py_p + py_n, px_p + px_n)`.
#[inline]
#[must_use]
pub fn alignment_angle(proton: &Momentum, neutron: &Momentum) -> f64 {
    (proton.py + neutron.py).atan2(proton.px + neutron.px)
}

/// Rotates the transverse part of `p` by `angle` about the beam axis.
///
/// The longitudinal component is unchanged.
#[inline]
#[must_use]
pub fn rotate_transverse(p: &Momentum, angle: f64) -> Momentum {
    let (sin_a, cos_a) = angle.sin_cos();
    Momentum::new(
        cos_a * p.px - sin_a * p.py,
        sin_a * p.px + cos_a * p.py,
        p.pz,
    )
}

/// Per-event quantities derived from the two momenta.
///
/// Always recomputed from the event; never cached alongside it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Derived {
    /// Alignment angle `phi` (radians, in `[-pi, pi]`).
    pub phi: f64,
    /// `(px_p + px_n)^2 + (py_p + py_n)^2`.
    pub sum_pt_sq: f64,
    pub sum_px: f64,
    pub sum_py: f64,
    pub sum_pz: f64,
    /// `pz_p - pz_n`.
    pub diff_pz: f64,
    /// Proton momentum rotated by `-phi`.
    pub proton_rot: Momentum,
    /// Neutron momentum rotated by `-phi`.
    pub neutron_rot: Momentum,
}

impl Derived {
    /// Derives the alignment quantities from a proton/neutron pair.
    #[must_use]
    pub fn from_momenta(proton: &Momentum, neutron: &Momentum) -> Self {
        let sum_px = proton.px + neutron.px;
        let sum_py = proton.py + neutron.py;
        let phi = sum_py.atan2(sum_px);
        Self {
            phi,
            sum_pt_sq: sum_px * sum_px + sum_py * sum_py,
            sum_px,
            sum_py,
            sum_pz: proton.pz + neutron.pz,
            diff_pz: proton.pz - neutron.pz,
            proton_rot: rotate_transverse(proton, -phi),
            neutron_rot: rotate_transverse(neutron, -phi),
        }
    }

    /// Derives the alignment quantities for an event.
    #[must_use]
    pub fn from_event(event: &Event) -> Self {
        Self::from_momenta(&event.proton, &event.neutron)
    }

    /// `pi - |phi|`, the distance of the alignment angle from the -x axis.
    #[inline]
    #[must_use]
    pub fn back_to_back_offset(&self) -> f64 {
        std::f64::consts::PI - self.phi.abs()
    }

    /// Rotated `px_n - px_p`.
    #[inline]
    #[must_use]
    pub fn rotated_px_difference(&self) -> f64 {
        self.neutron_rot.px - self.proton_rot.px
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample_pairs() -> Vec<(Momentum, Momentum)> {
        vec![
            (Momentum::new(120.0, -40.0, 650.0), Momentum::new(-30.0, 85.0, 610.0)),
            (Momentum::new(-200.0, 10.0, 700.0), Momentum::new(-15.0, -60.0, 640.0)),
            (Momentum::new(0.0, 0.0, 700.0), Momentum::new(0.0, 0.0, 600.0)),
            (Momentum::new(5.0, 0.0, 10.0), Momentum::new(-5.0, 0.0, 10.0)),
            (Momentum::new(-80.0, -1e-9, 500.0), Momentum::new(-20.0, 0.0, 500.0)),
        ]
    }

    #[test]
    fn test_rotation_round_trip() {
        for (p, n) in sample_pairs() {
            let d = Derived::from_momenta(&p, &n);
            let p_back = rotate_transverse(&d.proton_rot, d.phi);
            let n_back = rotate_transverse(&d.neutron_rot, d.phi);
            assert_abs_diff_eq!(p_back.px, p.px, epsilon = 1e-9);
            assert_abs_diff_eq!(p_back.py, p.py, epsilon = 1e-9);
            assert_abs_diff_eq!(n_back.px, n.px, epsilon = 1e-9);
            assert_abs_diff_eq!(n_back.py, n.py, epsilon = 1e-9);
            assert_abs_diff_eq!(p_back.pz, p.pz);
        }
    }

    #[test]
    fn test_rotation_aligns_transverse_sum() {
        let p = Momentum::new(120.0, -40.0, 650.0);
        let n = Momentum::new(-30.0, 85.0, 610.0);
        let d = Derived::from_momenta(&p, &n);
        let sum_y = d.proton_rot.py + d.neutron_rot.py;
        let sum_x = d.proton_rot.px + d.neutron_rot.px;
        assert_abs_diff_eq!(sum_y, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(sum_x, d.sum_pt_sq.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_degenerate_phi_is_zero() {
        let p = Momentum::new(0.0, 0.0, 700.0);
        let n = Momentum::new(0.0, 0.0, 600.0);
        let d = Derived::from_momenta(&p, &n);
        assert_abs_diff_eq!(d.phi, 0.0);
        assert_eq!(d.proton_rot, p);
        assert_eq!(d.neutron_rot, n);
        assert_abs_diff_eq!(d.back_to_back_offset(), std::f64::consts::PI);
        assert_abs_diff_eq!(d.sum_pz, 1300.0);
    }

    #[test]
    fn test_alignment_angle_matches_derived() {
        for (p, n) in sample_pairs() {
            assert_eq!(alignment_angle(&p, &n), Derived::from_momenta(&p, &n).phi);
        }
    }
}
