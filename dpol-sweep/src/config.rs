//! Sweep configuration descriptor.

use crate::{Error, Result};
use dpol_algorithms::{CutPolicy, MomentumCut, YCutOverrides, ZCutOverrides};
use dpol_core::PolarizationType;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Per-polarization momentum-cut threshold overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CutOverrides {
    pub zpol: ZCutOverrides,
    pub ypol: YCutOverrides,
}

impl CutOverrides {
    /// Default thresholds of `pol_type` with the overrides applied.
    #[must_use]
    pub fn policy(&self, pol_type: PolarizationType) -> CutPolicy {
        match CutPolicy::defaults(pol_type) {
            CutPolicy::Z(t) => CutPolicy::Z(t.with_overrides(&self.zpol)),
            CutPolicy::Y(t) => CutPolicy::Y(t.with_overrides(&self.ypol)),
        }
    }
}

/// Everything the orchestrator needs for one sweep.
///
/// Loaded from JSON; every field has a default except `data_root`, and
/// unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepConfig {
    /// Root of the raw event tree.
    pub data_root: PathBuf,
    /// Output directory; no files are written when absent.
    pub output_root: Option<PathBuf>,
    /// Beam energy label used in dataset folder names.
    pub energy: String,
    /// Field strengths (T).
    pub field_strengths: Vec<f64>,
    /// Beam deflection angles (deg).
    pub deflection_angles: Vec<f64>,
    pub targets: Vec<String>,
    pub polarization_types: Vec<PolarizationType>,
    pub gamma_values: Vec<String>,
    /// Inclusive impact-parameter range (fm). The discrete layout reads
    /// the integer b values inside it.
    pub impact_parameter_range: (f64, f64),
    /// Divisor of the discrete-layout event-number filter.
    pub bmax_for_event_filter: u32,
    pub momentum_cuts: CutOverrides,
    /// Relative momentum resolutions; `0.0` disables smearing.
    pub momentum_resolutions: Vec<f64>,
    /// Seed from which every random stream of the sweep is derived.
    pub master_seed: u64,
    /// Write per-stage momentum arrays as CSV.
    pub keep_stage_arrays: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::new(),
            output_root: None,
            energy: "190".to_string(),
            field_strengths: vec![1.0],
            deflection_angles: vec![5.0],
            targets: vec!["Pb208".to_string()],
            polarization_types: vec![PolarizationType::Z, PolarizationType::Y],
            gamma_values: ["050", "060", "070", "080"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            impact_parameter_range: (5.0, 10.0),
            bmax_for_event_filter: 10,
            momentum_cuts: CutOverrides::default(),
            momentum_resolutions: vec![0.0],
            master_seed: 12345,
            keep_stage_arrays: false,
        }
    }
}

impl SweepConfig {
    /// Default configuration reading from `data_root`.
    pub fn new<P: Into<PathBuf>>(data_root: P) -> Self {
        Self {
            data_root: data_root.into(),
            ..Self::default()
        }
    }

    /// Loads and validates a JSON descriptor.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, contains unknown keys,
    /// or fails [`SweepConfig::validate`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_output_root<P: Into<PathBuf>>(mut self, output_root: P) -> Self {
        self.output_root = Some(output_root.into());
        self
    }

    #[must_use]
    pub fn with_field_strengths(mut self, values: Vec<f64>) -> Self {
        self.field_strengths = values;
        self
    }

    #[must_use]
    pub fn with_deflection_angles(mut self, values: Vec<f64>) -> Self {
        self.deflection_angles = values;
        self
    }

    #[must_use]
    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        self.targets = targets;
        self
    }

    #[must_use]
    pub fn with_polarization_types(mut self, types: Vec<PolarizationType>) -> Self {
        self.polarization_types = types;
        self
    }

    #[must_use]
    pub fn with_gamma_values(mut self, gammas: Vec<String>) -> Self {
        self.gamma_values = gammas;
        self
    }

    #[must_use]
    pub fn with_impact_parameter_range(mut self, b_min: f64, b_max: f64) -> Self {
        self.impact_parameter_range = (b_min, b_max);
        self
    }

    #[must_use]
    pub fn with_momentum_resolutions(mut self, values: Vec<f64>) -> Self {
        self.momentum_resolutions = values;
        self
    }

    #[must_use]
    pub fn with_momentum_cuts(mut self, overrides: CutOverrides) -> Self {
        self.momentum_cuts = overrides;
        self
    }

    #[must_use]
    pub fn with_master_seed(mut self, seed: u64) -> Self {
        self.master_seed = seed;
        self
    }

    #[must_use]
    pub fn with_stage_arrays(mut self, keep: bool) -> Self {
        self.keep_stage_arrays = keep;
        self
    }

    /// Momentum cut for one polarization type and resolution.
    ///
    /// # Errors
    /// Returns an error if an overridden threshold or the resolution is invalid.
    pub fn momentum_cut(&self, pol_type: PolarizationType, resolution: f64) -> Result<MomentumCut> {
        Ok(MomentumCut::new(self.momentum_cuts.policy(pol_type))?.with_resolution(resolution)?)
    }

    /// Checks every value the sweep depends on.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));

        if self.data_root.as_os_str().is_empty() {
            return invalid("data_root is required".to_string());
        }
        for (name, empty) in [
            ("field_strengths", self.field_strengths.is_empty()),
            ("deflection_angles", self.deflection_angles.is_empty()),
            ("targets", self.targets.is_empty()),
            ("polarization_types", self.polarization_types.is_empty()),
            ("gamma_values", self.gamma_values.is_empty()),
            ("momentum_resolutions", self.momentum_resolutions.is_empty()),
        ] {
            if empty {
                return invalid(format!("{name} must not be empty"));
            }
        }
        if let Some(b) = self
            .field_strengths
            .iter()
            .find(|b| !b.is_finite() || **b <= 0.0)
        {
            return invalid(format!("field strength must be > 0 T, got {b}"));
        }
        if let Some(a) = self.deflection_angles.iter().find(|a| !a.is_finite()) {
            return invalid(format!("deflection angle must be finite, got {a}"));
        }
        let (b_min, b_max) = self.impact_parameter_range;
        if !b_min.is_finite() || !b_max.is_finite() || b_min > b_max {
            return invalid(format!(
                "impact_parameter_range [{b_min}, {b_max}] is not a valid range"
            ));
        }
        if self.bmax_for_event_filter == 0 {
            return invalid("bmax_for_event_filter must be > 0".to_string());
        }
        for &pol_type in &self.polarization_types {
            for &resolution in &self.momentum_resolutions {
                self.momentum_cut(pol_type, resolution)
                    .map_err(|e| Error::InvalidConfig(e.to_string()))?;
            }
        }
        Ok(())
    }

    /// Integer b values inside `impact_parameter_range`, as an inclusive
    /// range. Empty (`start > end`) when no integer lies inside.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn discrete_b_range(&self) -> (i32, i32) {
        let (b_min, b_max) = self.impact_parameter_range;
        (b_min.ceil() as i32, b_max.floor() as i32)
    }
}

/// Result key of one configuration, e.g. `1.0T_5.0deg_Pb208_zpol` or
/// `1.0T_5.0deg_Pb208_ypol_res0.020`.
#[must_use]
pub fn config_key(
    field_strength: f64,
    deflection_angle: f64,
    target: &str,
    pol_type: PolarizationType,
    resolution: f64,
) -> String {
    let mut key = format!("{field_strength:?}T_{deflection_angle:?}deg_{target}_{pol_type}");
    if resolution > 0.0 {
        let _ = write!(key, "_res{resolution:.3}");
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    #[test]
    fn test_load_with_defaults_and_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sweep.json");
        fs::write(
            &path,
            r#"{
                "data_root": "/data/qmd",
                "field_strengths": [1.0, 1.2],
                "polarization_types": ["ypol"],
                "momentum_cuts": {"ypol": {"phi_threshold": 0.3}}
            }"#,
        )
        .unwrap();

        let config = SweepConfig::load(&path).unwrap();
        assert_eq!(config.field_strengths.len(), 2);
        assert_relative_eq!(config.field_strengths[1], 1.2);
        assert_eq!(config.energy, "190");
        assert_eq!(config.master_seed, 12345);
        assert_eq!(config.gamma_values.len(), 4);
        let CutPolicy::Y(t) = config.momentum_cuts.policy(PolarizationType::Y) else {
            panic!("expected y-type policy");
        };
        assert_relative_eq!(t.phi_threshold, 0.3);
        assert_relative_eq!(t.delta_py_threshold, 150.0);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let top: std::result::Result<SweepConfig, _> =
            serde_json::from_str(r#"{"data_root": "/d", "fields": [1.0]}"#);
        assert!(top.is_err());
        let nested: std::result::Result<SweepConfig, _> = serde_json::from_str(
            r#"{"data_root": "/d", "momentum_cuts": {"zpol": {"pz_threshold": 1.0}}}"#,
        );
        assert!(nested.is_err());
    }

    #[test]
    fn test_validate() {
        assert!(SweepConfig::default().validate().is_err());
        assert!(SweepConfig::new("/d").validate().is_ok());
        assert!(SweepConfig::new("/d")
            .with_field_strengths(vec![0.0])
            .validate()
            .is_err());
        assert!(SweepConfig::new("/d")
            .with_impact_parameter_range(10.0, 5.0)
            .validate()
            .is_err());
        assert!(SweepConfig::new("/d")
            .with_momentum_resolutions(vec![-0.1])
            .validate()
            .is_err());
        assert!(SweepConfig::new("/d").with_targets(vec![]).validate().is_err());
    }

    #[test]
    fn test_config_key_and_b_range() {
        assert_eq!(
            config_key(1.0, 5.0, "Pb208", PolarizationType::Z, 0.0),
            "1.0T_5.0deg_Pb208_zpol"
        );
        assert_eq!(
            config_key(1.2, 10.0, "Sn124", PolarizationType::Y, 0.02),
            "1.2T_10.0deg_Sn124_ypol_res0.020"
        );
        let config = SweepConfig::new("/d").with_impact_parameter_range(5.7, 9.2);
        assert_eq!(config.discrete_b_range(), (6, 9));
        let config = SweepConfig::new("/d").with_impact_parameter_range(5.0, 10.0);
        assert_eq!(config.discrete_b_range(), (5, 10));
        let (start, end) = SweepConfig::new("/d")
            .with_impact_parameter_range(5.2, 5.8)
            .discrete_b_range();
        assert!(start > end);
    }
}
