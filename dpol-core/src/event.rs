//! Breakup event records and the identifiers that label them.

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A 3-momentum in MeV/c.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Momentum {
    /// Horizontal component.
    pub px: f64,
    /// Vertical component.
    pub py: f64,
    /// Longitudinal (beam) component.
    pub pz: f64,
}

impl Momentum {
    /// Creates a new momentum vector.
    #[inline]
    #[must_use]
    pub const fn new(px: f64, py: f64, pz: f64) -> Self {
        Self { px, py, pz }
    }

    /// Azimuth of the transverse component, `atan2(py, px)`.
    #[inline]
    #[must_use]
    pub fn azimuth(&self) -> f64 {
        self.py.atan2(self.px)
    }

    /// Returns the components as an array `[px, py, pz]`.
    #[inline]
    #[must_use]
    pub fn to_array(self) -> [f64; 3] {
        [self.px, self.py, self.pz]
    }

    /// Component-wise difference `self - other`.
    #[inline]
    #[must_use]
    pub fn minus(&self, other: &Self) -> Self {
        Self::new(self.px - other.px, self.py - other.py, self.pz - other.pz)
    }
}

/// Polarization convention of a dataset.
///
/// The two conventions use different default selection thresholds and are
/// stored under different raw-data layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PolarizationType {
    /// Longitudinal polarization ("zpol").
    #[cfg_attr(feature = "serde", serde(rename = "zpol"))]
    Z,
    /// Transverse polarization ("ypol").
    #[cfg_attr(feature = "serde", serde(rename = "ypol"))]
    Y,
}

impl PolarizationType {
    /// Label used in configuration files and result keys.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Z => "zpol",
            Self::Y => "ypol",
        }
    }

    /// Single-letter direction used in dataset folder names.
    #[must_use]
    pub fn direction(self) -> char {
        match self {
            Self::Z => 'z',
            Self::Y => 'y',
        }
    }

    /// Both charge orderings for this polarization, in load order.
    #[must_use]
    pub fn variants(self) -> [PolarizationVariant; 2] {
        [
            PolarizationVariant::new(self, ChargeOrder::Np),
            PolarizationVariant::new(self, ChargeOrder::Pn),
        ]
    }

    /// Raw-data layout that stores datasets of this polarization.
    #[must_use]
    pub fn layout(self) -> DatasetLayout {
        match self {
            Self::Z => DatasetLayout::DiscreteImpact,
            Self::Y => DatasetLayout::RandomReactionPlane,
        }
    }
}

impl fmt::Display for PolarizationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PolarizationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "zpol" | "z" => Ok(Self::Z),
            "ypol" | "y" => Ok(Self::Y),
            other => Err(Error::InvalidIdentifier(format!(
                "unknown polarization type '{other}'"
            ))),
        }
    }
}

/// Charge ordering of a polarization dataset ("np" or "pn").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ChargeOrder {
    /// Proton-neutron ordering.
    Np,
    /// Neutron-proton ordering.
    Pn,
}

impl ChargeOrder {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Np => "np",
            Self::Pn => "pn",
        }
    }
}

/// Polarization type plus charge ordering, e.g. `znp` or `ypn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PolarizationVariant {
    pub pol_type: PolarizationType,
    pub order: ChargeOrder,
}

impl PolarizationVariant {
    #[must_use]
    pub const fn new(pol_type: PolarizationType, order: ChargeOrder) -> Self {
        Self { pol_type, order }
    }
}

impl fmt::Display for PolarizationVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pol_type.direction(), self.order.label())
    }
}

impl FromStr for PolarizationVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "znp" => Ok(Self::new(PolarizationType::Z, ChargeOrder::Np)),
            "zpn" => Ok(Self::new(PolarizationType::Z, ChargeOrder::Pn)),
            "ynp" => Ok(Self::new(PolarizationType::Y, ChargeOrder::Np)),
            "ypn" => Ok(Self::new(PolarizationType::Y, ChargeOrder::Pn)),
            other => Err(Error::InvalidIdentifier(format!(
                "unknown polarization variant '{other}'"
            ))),
        }
    }
}

/// On-disk layout an event was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DatasetLayout {
    /// One file per integer impact parameter (`z_pol/b_discrete`).
    DiscreteImpact,
    /// Single file with random reaction-plane orientation (`y_pol/phi_random`).
    RandomReactionPlane,
}

impl DatasetLayout {
    /// Short dataset tag ("zpol" / "ypol").
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::DiscreteImpact => "zpol",
            Self::RandomReactionPlane => "ypol",
        }
    }
}

/// Labels shared by every event of one loaded dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventTag {
    pub layout: DatasetLayout,
    pub target: String,
    pub gamma: String,
    pub variant: PolarizationVariant,
}

/// A single simulated breakup event.
///
/// Events are immutable once parsed; the dataset labels are shared between
/// all events of one file through an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub tag: Arc<EventTag>,
    /// Event number as written by the generator.
    pub event_no: i64,
    pub proton: Momentum,
    pub neutron: Momentum,
    /// Impact parameter [fm]; the file value for discrete layouts.
    pub impact_parameter: Option<f64>,
    /// Reaction-plane angle [deg]; only present in the random-plane layout.
    pub reaction_plane_deg: Option<f64>,
}

impl Event {
    /// Creates an event with no impact parameter or reaction-plane angle.
    #[must_use]
    pub fn new(tag: Arc<EventTag>, event_no: i64, proton: Momentum, neutron: Momentum) -> Self {
        Self {
            tag,
            event_no,
            proton,
            neutron,
            impact_parameter: None,
            reaction_plane_deg: None,
        }
    }

    #[must_use]
    pub fn with_impact_parameter(mut self, b: f64) -> Self {
        self.impact_parameter = Some(b);
        self
    }

    #[must_use]
    pub fn with_reaction_plane(mut self, phi_deg: f64) -> Self {
        self.reaction_plane_deg = Some(phi_deg);
        self
    }

    #[inline]
    #[must_use]
    pub fn target(&self) -> &str {
        &self.tag.target
    }

    #[inline]
    #[must_use]
    pub fn gamma(&self) -> &str {
        &self.tag.gamma
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_round_trip() {
        for label in ["znp", "zpn", "ynp", "ypn"] {
            let variant: PolarizationVariant = label.parse().unwrap();
            assert_eq!(variant.to_string(), label);
        }
        assert!("xnp".parse::<PolarizationVariant>().is_err());
    }

    #[test]
    fn test_polarization_variants_and_layout() {
        let [a, b] = PolarizationType::Z.variants();
        assert_eq!(a.to_string(), "znp");
        assert_eq!(b.to_string(), "zpn");
        assert_eq!(PolarizationType::Z.layout(), DatasetLayout::DiscreteImpact);
        assert_eq!(
            PolarizationType::Y.layout(),
            DatasetLayout::RandomReactionPlane
        );
        assert_eq!("YPOL".parse::<PolarizationType>().unwrap(), PolarizationType::Y);
    }

    #[test]
    fn test_momentum_helpers() {
        let p = Momentum::new(3.0, 4.0, 5.0);
        let n = Momentum::new(1.0, 1.0, 1.0);
        assert_eq!(p.minus(&n), Momentum::new(2.0, 3.0, 4.0));
        assert_eq!(p.to_array(), [3.0, 4.0, 5.0]);
        assert!((Momentum::new(0.0, 1.0, 0.0).azimuth() - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }
}
