//! Simplified two-detector geometric acceptance.
//!
//! This is an explicit approximation, not ray-tracing:
//!
//! - the target position follows from the beam deflection radius
//!   `R = p_beam / (0.3 B) * 1000` mm and the deflection angle;
//! - the proton detector accepts a proton when its px lies inside a fixed
//!   window (inclusive);
//! - the neutron detector accepts a neutron when both its horizontal and
//!   vertical opening angles, `atan2(px, pz)` and `atan2(py, pz)`, are
//!   strictly inside the half-angles subtended by the detector face.
//!
//! A configuration is immutable once built and serializes to a JSON
//! snapshot; a filter rebuilt from the snapshot yields identical masks.

use crate::momentum_cut::efficiency;
use crate::{Error, Result};
use dpol_core::{EventBatch, Momentum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Representative beam momentum (MeV/c).
pub const BEAM_MOMENTUM_MEV: f64 = 1330.0;
/// z of the beam entry point into the field (mm).
pub const BEAM_ENTRY_Z_MM: f64 = -4000.0;
/// z of the proton detector (mm).
pub const PROTON_DETECTOR_Z_MM: f64 = 5000.0;
/// z of the neutron detector (mm).
pub const NEUTRON_DETECTOR_Z_MM: f64 = 12000.0;

const STANDARD_FIELDS_T: [f64; 4] = [0.8, 1.0, 1.2, 1.4];
const STANDARD_ANGLES_DEG: [f64; 4] = [0.0, 5.0, 10.0, 15.0];

fn default_pdc_width() -> f64 {
    1680.0
}
fn default_pdc_height() -> f64 {
    780.0
}
fn default_px_min() -> f64 {
    -100.0
}
fn default_px_max() -> f64 {
    100.0
}
fn default_nebula_width() -> f64 {
    3600.0
}
fn default_nebula_height() -> f64 {
    1800.0
}
fn default_nebula_depth() -> f64 {
    600.0
}

/// Target placement for one (field strength, deflection angle).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetPosition {
    /// Beam deflection angle (deg).
    pub deflection_angle: f64,
    /// Target position `(x, y, z)` (mm).
    pub position: [f64; 3],
    /// Unit vector along the deflected beam.
    pub beam_direction: [f64; 3],
    /// Target rotation about y (deg).
    pub rotation_angle: f64,
    /// Field strength (T).
    pub field_strength: f64,
}

impl TargetPosition {
    /// Closed-form target placement.
    #[must_use]
    pub fn compute(field_strength: f64, deflection_angle: f64) -> Self {
        let radius = GeometryFilter::deflection_radius_mm(field_strength);
        let (sin_t, cos_t) = deflection_angle.to_radians().sin_cos();
        Self {
            deflection_angle,
            position: [
                radius * (1.0 - cos_t),
                0.0,
                BEAM_ENTRY_Z_MM + radius * sin_t,
            ],
            beam_direction: [sin_t, 0.0, cos_t],
            rotation_angle: deflection_angle,
            field_strength,
        }
    }
}

/// Proton-side detector (PDC).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProtonDetectorConfig {
    /// Position `(x, y, z)` (mm).
    pub position: [f64; 3],
    /// Rotation about y (deg).
    pub rotation_angle: f64,
    /// Width (mm).
    #[serde(default = "default_pdc_width")]
    pub width: f64,
    /// Height (mm).
    #[serde(default = "default_pdc_height")]
    pub height: f64,
    /// Lower edge of the accepted proton px window (MeV/c).
    #[serde(default = "default_px_min")]
    pub px_min: f64,
    /// Upper edge of the accepted proton px window (MeV/c).
    #[serde(default = "default_px_max")]
    pub px_max: f64,
}

impl ProtonDetectorConfig {
    /// Detector at the fixed downstream position, rotated by `rotation_angle`.
    #[must_use]
    pub fn new(rotation_angle: f64) -> Self {
        Self {
            position: [0.0, 0.0, PROTON_DETECTOR_Z_MM],
            rotation_angle,
            width: default_pdc_width(),
            height: default_pdc_height(),
            px_min: default_px_min(),
            px_max: default_px_max(),
        }
    }

    /// Replaces the accepted px window.
    #[must_use]
    pub fn with_px_window(mut self, px_min: f64, px_max: f64) -> Self {
        self.px_min = px_min;
        self.px_max = px_max;
        self
    }

    /// Returns true if the proton px lies in `[px_min, px_max]`.
    #[inline]
    #[must_use]
    pub fn accepts(&self, proton: &Momentum) -> bool {
        proton.px >= self.px_min && proton.px <= self.px_max
    }
}

/// Neutron-side detector (NEBULA).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeutronDetectorConfig {
    /// Position `(x, y, z)` (mm).
    pub position: [f64; 3],
    /// Width along x (mm).
    #[serde(default = "default_nebula_width")]
    pub width: f64,
    /// Height along y (mm).
    #[serde(default = "default_nebula_height")]
    pub height: f64,
    /// Depth along z (mm).
    #[serde(default = "default_nebula_depth")]
    pub depth: f64,
}

impl Default for NeutronDetectorConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, NEUTRON_DETECTOR_Z_MM],
            width: default_nebula_width(),
            height: default_nebula_height(),
            depth: default_nebula_depth(),
        }
    }
}

impl NeutronDetectorConfig {
    /// Replaces the face size (mm).
    #[must_use]
    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Horizontal and vertical acceptance half-angles (rad).
    #[must_use]
    pub fn half_angles(&self) -> (f64, f64) {
        let z = self.position[2];
        ((self.width / 2.0).atan2(z), (self.height / 2.0).atan2(z))
    }

    /// Returns true if the neutron direction is strictly inside both
    /// half-angles.
    #[inline]
    #[must_use]
    pub fn accepts(&self, neutron: &Momentum) -> bool {
        let (max_x, max_y) = self.half_angles();
        neutron.px.atan2(neutron.pz).abs() < max_x && neutron.py.atan2(neutron.pz).abs() < max_y
    }
}

/// Serializable form of a complete geometry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometrySnapshot {
    /// Field strength (T).
    pub field_strength: f64,
    /// Deflection angle (deg).
    pub deflection_angle: f64,
    /// Target placement.
    pub target: TargetPosition,
    /// Proton detector (PDC).
    #[serde(rename = "pdc", alias = "detectorA")]
    pub proton_detector: ProtonDetectorConfig,
    /// Neutron detector (NEBULA).
    #[serde(rename = "nebula", alias = "detectorB")]
    pub neutron_detector: NeutronDetectorConfig,
}

/// Result of the acceptance test over one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryAcceptanceResult {
    /// Per-event acceptance flags.
    pub mask: Vec<bool>,
    /// Accepted events.
    pub n_passed: usize,
    /// Events tested.
    pub n_total: usize,
    /// `n_passed / n_total`, zero for an empty batch.
    pub efficiency: f64,
    /// Configuration the mask was computed with.
    pub snapshot: GeometrySnapshot,
}

/// Two-detector acceptance filter for one (field strength, deflection angle).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryFilter {
    field_strength: f64,
    deflection_angle: f64,
    target: TargetPosition,
    proton_detector: ProtonDetectorConfig,
    neutron_detector: NeutronDetectorConfig,
}

impl GeometryFilter {
    /// Builds the closed-form configuration.
    ///
    /// # Errors
    /// Returns an error if the field strength is not strictly positive or
    /// either input is not finite.
    pub fn new(field_strength: f64, deflection_angle: f64) -> Result<Self> {
        if !field_strength.is_finite() || field_strength <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "field strength must be > 0 T, got {field_strength}"
            )));
        }
        if !deflection_angle.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "deflection angle must be finite, got {deflection_angle}"
            )));
        }
        Ok(Self {
            field_strength,
            deflection_angle,
            target: TargetPosition::compute(field_strength, deflection_angle),
            proton_detector: ProtonDetectorConfig::new(deflection_angle),
            neutron_detector: NeutronDetectorConfig::default(),
        })
    }

    /// Deflection radius `p_beam / (0.3 B) * 1000` in mm.
    #[must_use]
    pub fn deflection_radius_mm(field_strength: f64) -> f64 {
        BEAM_MOMENTUM_MEV / (0.3 * field_strength) * 1000.0
    }

    /// Standard grid of (field strength [T], deflection angle [deg]).
    #[must_use]
    pub fn standard_configurations() -> Vec<(f64, f64)> {
        STANDARD_FIELDS_T
            .iter()
            .flat_map(|&b| STANDARD_ANGLES_DEG.iter().map(move |&a| (b, a)))
            .collect()
    }

    /// Replaces the proton detector.
    #[must_use]
    pub fn with_proton_detector(mut self, detector: ProtonDetectorConfig) -> Self {
        self.proton_detector = detector;
        self
    }

    /// Replaces the neutron detector.
    #[must_use]
    pub fn with_neutron_detector(mut self, detector: NeutronDetectorConfig) -> Self {
        self.neutron_detector = detector;
        self
    }

    /// Field strength (T).
    #[must_use]
    pub fn field_strength(&self) -> f64 {
        self.field_strength
    }

    /// Deflection angle (deg).
    #[must_use]
    pub fn deflection_angle(&self) -> f64 {
        self.deflection_angle
    }

    /// Target placement for this configuration.
    #[must_use]
    pub fn target(&self) -> &TargetPosition {
        &self.target
    }

    /// Proton detector in use.
    #[must_use]
    pub fn proton_detector(&self) -> &ProtonDetectorConfig {
        &self.proton_detector
    }

    /// Neutron detector in use.
    #[must_use]
    pub fn neutron_detector(&self) -> &NeutronDetectorConfig {
        &self.neutron_detector
    }

    /// Copy of the full configuration.
    #[must_use]
    pub fn snapshot(&self) -> GeometrySnapshot {
        GeometrySnapshot {
            field_strength: self.field_strength,
            deflection_angle: self.deflection_angle,
            target: self.target,
            proton_detector: self.proton_detector,
            neutron_detector: self.neutron_detector,
        }
    }

    /// Rebuilds a filter from a snapshot, taking every value as stored.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSnapshot`] if the px window is inverted, the
    /// neutron detector is not downstream, or a value is not finite.
    pub fn from_snapshot(snapshot: &GeometrySnapshot) -> Result<Self> {
        let pdc = &snapshot.proton_detector;
        let nebula = &snapshot.neutron_detector;
        let values = [
            snapshot.field_strength,
            snapshot.deflection_angle,
            pdc.px_min,
            pdc.px_max,
            nebula.width,
            nebula.height,
            nebula.position[2],
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidSnapshot("non-finite value".to_string()));
        }
        if pdc.px_min > pdc.px_max {
            return Err(Error::InvalidSnapshot(format!(
                "px window [{}, {}] is inverted",
                pdc.px_min, pdc.px_max
            )));
        }
        if nebula.position[2] <= 0.0 {
            return Err(Error::InvalidSnapshot(format!(
                "neutron detector z must be > 0, got {}",
                nebula.position[2]
            )));
        }
        Ok(Self {
            field_strength: snapshot.field_strength,
            deflection_angle: snapshot.deflection_angle,
            target: snapshot.target,
            proton_detector: *pdc,
            neutron_detector: *nebula,
        })
    }

    /// Parses a JSON snapshot.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSnapshot`] if the text is not a complete
    /// snapshot.
    pub fn from_json(text: &str) -> Result<Self> {
        let snapshot: GeometrySnapshot =
            serde_json::from_str(text).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;
        Self::from_snapshot(&snapshot)
    }

    /// Pretty-printed JSON snapshot.
    ///
    /// # Errors
    /// Returns an error if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Loads a snapshot file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a valid snapshot.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Saves the snapshot, creating parent directories.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Per-event acceptance by both detectors.
    #[must_use]
    pub fn accepts(&self, proton: &Momentum, neutron: &Momentum) -> bool {
        self.proton_detector.accepts(proton) && self.neutron_detector.accepts(neutron)
    }

    /// Applies the acceptance test to every event of the batch.
    #[must_use]
    pub fn apply(&self, batch: &EventBatch) -> GeometryAcceptanceResult {
        let mask: Vec<bool> = batch
            .iter()
            .map(|(proton, neutron)| self.accepts(&proton, &neutron))
            .collect();
        let n_total = mask.len();
        let n_passed = mask.iter().filter(|&&m| m).count();
        GeometryAcceptanceResult {
            mask,
            n_passed,
            n_total,
            efficiency: efficiency(n_passed, n_total),
            snapshot: self.snapshot(),
        }
    }
}

impl fmt::Display for GeometryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.target;
        let pdc = &self.proton_detector;
        let nebula = &self.neutron_detector;
        writeln!(f, "Geometry configuration")?;
        writeln!(f, "  field strength:   {} T", self.field_strength)?;
        writeln!(f, "  deflection angle: {} deg", self.deflection_angle)?;
        writeln!(
            f,
            "  target:           ({:.1}, {:.1}, {:.1}) mm, beam ({:.4}, {:.4}, {:.4})",
            t.position[0],
            t.position[1],
            t.position[2],
            t.beam_direction[0],
            t.beam_direction[1],
            t.beam_direction[2]
        )?;
        writeln!(
            f,
            "  PDC:              z = {} mm, rotation {} deg, px in [{}, {}] MeV/c",
            pdc.position[2], pdc.rotation_angle, pdc.px_min, pdc.px_max
        )?;
        write!(
            f,
            "  NEBULA:           z = {} mm, {} x {} x {} mm",
            nebula.position[2], nebula.width, nebula.height, nebula.depth
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_target_position_closed_form() {
        let filter = GeometryFilter::new(1.0, 5.0).unwrap();
        let r = 1330.0 / 0.3 * 1000.0;
        let theta = 5.0_f64.to_radians();
        let t = filter.target();
        assert_relative_eq!(t.position[0], r * (1.0 - theta.cos()), max_relative = 1e-12);
        assert_relative_eq!(t.position[2], -4000.0 + r * theta.sin(), max_relative = 1e-12);
        assert_relative_eq!(t.beam_direction[2], theta.cos());
        assert_relative_eq!(filter.proton_detector().rotation_angle, 5.0);
    }

    #[test]
    fn test_rejects_non_positive_field() {
        assert!(GeometryFilter::new(0.0, 5.0).is_err());
        assert!(GeometryFilter::new(-1.2, 5.0).is_err());
        assert!(GeometryFilter::new(1.2, f64::NAN).is_err());
    }

    #[test]
    fn test_proton_window_is_inclusive() {
        let pdc = ProtonDetectorConfig::new(0.0);
        assert!(pdc.accepts(&Momentum::new(100.0, 0.0, 600.0)));
        assert!(pdc.accepts(&Momentum::new(-100.0, 0.0, 600.0)));
        assert!(!pdc.accepts(&Momentum::new(100.001, 0.0, 600.0)));
    }

    #[test]
    fn test_neutron_half_angles_are_strict() {
        let nebula = NeutronDetectorConfig::default();
        // tan(theta_x_max) = 1800 / 12000 = 0.15
        assert!(nebula.accepts(&Momentum::new(89.0, 0.0, 600.0)));
        assert!(!nebula.accepts(&Momentum::new(91.0, 0.0, 600.0)));
        // tan(theta_y_max) = 900 / 12000 = 0.075
        assert!(nebula.accepts(&Momentum::new(0.0, 44.0, 600.0)));
        assert!(!nebula.accepts(&Momentum::new(0.0, 46.0, 600.0)));
        assert!(!nebula.accepts(&Momentum::new(0.0, 0.0, -600.0)));
    }

    #[test]
    fn test_snapshot_uses_detector_keys_and_defaults() {
        let json = r#"{
            "field_strength": 1.2,
            "deflection_angle": 10.0,
            "target": {
                "deflection_angle": 10.0,
                "position": [1.0, 0.0, -3000.0],
                "beam_direction": [0.17, 0.0, 0.98],
                "rotation_angle": 10.0,
                "field_strength": 1.2
            },
            "detectorA": {"position": [0.0, 0.0, 5000.0], "rotation_angle": 10.0, "px_max": 50.0},
            "detectorB": {"position": [0.0, 0.0, 12000.0]}
        }"#;
        let filter = GeometryFilter::from_json(json).unwrap();
        assert_relative_eq!(filter.proton_detector().px_min, -100.0);
        assert_relative_eq!(filter.proton_detector().px_max, 50.0);
        assert_relative_eq!(filter.neutron_detector().depth, 600.0);

        let written: serde_json::Value = serde_json::from_str(&filter.to_json().unwrap()).unwrap();
        assert!(written.get("pdc").is_some());
        assert!(written.get("nebula").is_some());
    }

    #[test]
    fn test_snapshot_missing_field_is_error() {
        let json = r#"{"field_strength": 1.0, "deflection_angle": 5.0}"#;
        assert!(matches!(
            GeometryFilter::from_json(json),
            Err(Error::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn test_standard_configurations() {
        let configs = GeometryFilter::standard_configurations();
        assert_eq!(configs.len(), 16);
        assert_eq!(configs[0], (0.8, 0.0));
        assert_eq!(configs[15], (1.4, 15.0));
    }

    #[test]
    fn test_display_summary() {
        let text = GeometryFilter::new(1.0, 5.0).unwrap().to_string();
        assert!(text.contains("field strength:   1 T"));
        assert!(text.contains("px in [-100, 100]"));
    }
}
