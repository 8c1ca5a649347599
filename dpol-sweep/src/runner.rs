//! Sweep orchestrator.
//!
//! Iterates the cartesian product
//! `field strengths x deflection angles x targets x polarization types x
//! momentum resolutions`, and for every configuration every gamma. Each
//! (configuration, gamma) pair loads both charge orderings, merges them and
//! runs the before-cut / after-cut / after-geometry pipeline.
//!
//! Configurations are independent and run in parallel. A configuration
//! that fails is logged and recorded as failed; the others are unaffected.

use crate::config::{config_key, SweepConfig};
use crate::Result;
use dpol_algorithms::{
    derive_seed, run_stages, GeometryFilter, GeometrySnapshot, MomentumCutSettings,
    RatioStatistic, Stage, StagedEvents,
};
use dpol_core::PolarizationType;
use dpol_io::{
    load_merged, write_json, DataRoot, DiscreteImpactSource, EventSource, LoadReport,
    RandomPlaneSource, StageFileWriter,
};
use log::{error, info, warn};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// One point of the configuration space.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigurationSpec {
    pub field_strength: f64,
    pub deflection_angle: f64,
    pub target: String,
    pub pol_type: PolarizationType,
    pub momentum_resolution: f64,
}

impl ConfigurationSpec {
    #[must_use]
    pub fn key(&self) -> String {
        config_key(
            self.field_strength,
            self.deflection_angle,
            &self.target,
            self.pol_type,
            self.momentum_resolution,
        )
    }

    /// `{B:.2}T/{angle:.0}deg/{target}/{pol}`, plus `res{r:.3}` when smeared.
    #[must_use]
    pub fn output_dir(&self, root: &Path) -> PathBuf {
        let mut dir = root
            .join(format!("{:.2}T", self.field_strength))
            .join(format!("{:.0}deg", self.deflection_angle))
            .join(&self.target)
            .join(self.pol_type.label());
        if self.momentum_resolution > 0.0 {
            dir.push(format!("res{:.3}", self.momentum_resolution));
        }
        dir
    }

    /// Label used in the cross-configuration comparison.
    fn comparison_label(&self) -> String {
        let mut label = format!("{}_{}", self.target, self.pol_type);
        if self.momentum_resolution > 0.0 {
            let _ = write!(label, "_res{:.3}", self.momentum_resolution);
        }
        label
    }
}

/// Counts and ratio of one pipeline stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StageSummary {
    pub n_events: usize,
    pub ratio: RatioStatistic,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cut_efficiency: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo_efficiency: Option<f64>,
}

/// Result of one (configuration, gamma) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GammaResult {
    pub before_cut: StageSummary,
    pub after_cut: StageSummary,
    pub after_geometry: StageSummary,
    pub load: LoadReport,
}

impl GammaResult {
    fn new(staged: &StagedEvents, load: LoadReport) -> Self {
        let summary = |stage: Stage| StageSummary {
            n_events: staged.stage(stage).n_events(),
            ratio: staged.stage(stage).ratio,
            ..StageSummary::default()
        };
        Self {
            before_cut: summary(Stage::BeforeCut),
            after_cut: StageSummary {
                cut_efficiency: Some(staged.cut_efficiency),
                ..summary(Stage::AfterCut)
            },
            after_geometry: StageSummary {
                geo_efficiency: Some(staged.geo_efficiency),
                ..summary(Stage::AfterGeometry)
            },
            load,
        }
    }

    #[must_use]
    pub fn stage(&self, stage: Stage) -> &StageSummary {
        match stage {
            Stage::BeforeCut => &self.before_cut,
            Stage::AfterCut => &self.after_cut,
            Stage::AfterGeometry => &self.after_geometry,
        }
    }
}

/// Outcome class of one configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigurationStatus {
    /// At least one gamma produced events.
    Completed,
    /// Every gamma yielded zero events.
    NoData,
    /// Aborted by an error, recorded in `error`.
    Failed,
}

/// Result of one configuration across all gammas.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigurationResult {
    pub key: String,
    #[serde(flatten)]
    pub spec: ConfigurationSpec,
    pub status: ConfigurationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub gammas: BTreeMap<String, GammaResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub momentum_cut: Option<MomentumCutSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<GeometrySnapshot>,
}

impl ConfigurationResult {
    fn failed(spec: &ConfigurationSpec, err: &crate::Error) -> Self {
        Self {
            key: spec.key(),
            spec: spec.clone(),
            status: ConfigurationStatus::Failed,
            error: Some(err.to_string()),
            gammas: BTreeMap::new(),
            momentum_cut: None,
            geometry: None,
        }
    }

    /// Events at `stage`, summed over gammas.
    #[must_use]
    pub fn total_events(&self, stage: Stage) -> usize {
        self.gammas.values().map(|g| g.stage(stage).n_events).sum()
    }
}

/// Ratios of every configuration sharing one (field strength, deflection angle).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatioComparison {
    pub field_strength: f64,
    pub deflection_angle: f64,
    /// `{target}_{pol}` -> gamma -> ratio after the momentum cut.
    pub after_cut: BTreeMap<String, BTreeMap<String, RatioStatistic>>,
    /// `{target}_{pol}` -> gamma -> ratio after the geometry filter.
    pub after_geometry: BTreeMap<String, BTreeMap<String, RatioStatistic>>,
}

/// Hierarchical result of a full sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    /// One entry per configuration, in sweep order.
    pub configurations: Vec<ConfigurationResult>,
    pub comparisons: Vec<RatioComparison>,
}

impl SweepReport {
    fn new(configurations: Vec<ConfigurationResult>) -> Self {
        let mut comparisons: Vec<RatioComparison> = Vec::new();
        for result in &configurations {
            if result.status == ConfigurationStatus::Failed {
                continue;
            }
            let b = result.spec.field_strength;
            let angle = result.spec.deflection_angle;
            let idx = match comparisons.iter().position(|c| {
                c.field_strength.to_bits() == b.to_bits()
                    && c.deflection_angle.to_bits() == angle.to_bits()
            }) {
                Some(idx) => idx,
                None => {
                    comparisons.push(RatioComparison {
                        field_strength: b,
                        deflection_angle: angle,
                        after_cut: BTreeMap::new(),
                        after_geometry: BTreeMap::new(),
                    });
                    comparisons.len() - 1
                }
            };
            let label = result.spec.comparison_label();
            let comparison = &mut comparisons[idx];
            for (gamma, g) in &result.gammas {
                comparison
                    .after_cut
                    .entry(label.clone())
                    .or_default()
                    .insert(gamma.clone(), g.after_cut.ratio);
                comparison
                    .after_geometry
                    .entry(label.clone())
                    .or_default()
                    .insert(gamma.clone(), g.after_geometry.ratio);
            }
        }
        Self {
            configurations,
            comparisons,
        }
    }

    #[must_use]
    pub fn configuration(&self, key: &str) -> Option<&ConfigurationResult> {
        self.configurations.iter().find(|c| c.key == key)
    }

    /// Number of configurations with the given status.
    #[must_use]
    pub fn count(&self, status: ConfigurationStatus) -> usize {
        self.configurations
            .iter()
            .filter(|c| c.status == status)
            .count()
    }
}

/// Runs a [`SweepConfig`].
pub struct SweepRunner {
    config: SweepConfig,
    root: DataRoot,
}

impl SweepRunner {
    /// Creates a runner for a validated configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration does not validate.
    pub fn new(config: SweepConfig) -> Result<Self> {
        config.validate()?;
        let root = DataRoot::new(&config.data_root);
        Ok(Self { config, root })
    }

    #[must_use]
    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// The configuration space in sweep order.
    #[must_use]
    pub fn configurations(&self) -> Vec<ConfigurationSpec> {
        let c = &self.config;
        let mut specs = Vec::new();
        for &field_strength in &c.field_strengths {
            for &deflection_angle in &c.deflection_angles {
                for target in &c.targets {
                    for &pol_type in &c.polarization_types {
                        for &momentum_resolution in &c.momentum_resolutions {
                            specs.push(ConfigurationSpec {
                                field_strength,
                                deflection_angle,
                                target: target.clone(),
                                pol_type,
                                momentum_resolution,
                            });
                        }
                    }
                }
            }
        }
        specs
    }

    fn source(&self, pol_type: PolarizationType) -> Result<Box<dyn EventSource>> {
        let c = &self.config;
        Ok(match pol_type {
            PolarizationType::Z => Box::new(DiscreteImpactSource::new(
                self.root.clone(),
                c.energy.clone(),
                c.discrete_b_range(),
                c.bmax_for_event_filter,
            )?),
            PolarizationType::Y => {
                let (b_min, b_max) = c.impact_parameter_range;
                Box::new(
                    RandomPlaneSource::new(self.root.clone(), c.energy.clone())
                        .with_b_window(b_min, b_max),
                )
            }
        })
    }

    /// Runs one configuration across all gammas.
    ///
    /// Missing data is not an error: the affected gammas report zero events.
    ///
    /// # Errors
    /// Returns an error if the cut or geometry cannot be built or an output
    /// file cannot be written.
    pub fn run_configuration(&self, spec: &ConfigurationSpec) -> Result<ConfigurationResult> {
        let key = spec.key();
        let cut = self
            .config
            .momentum_cut(spec.pol_type, spec.momentum_resolution)?;
        let geometry = GeometryFilter::new(spec.field_strength, spec.deflection_angle)?;
        let source = self.source(spec.pol_type)?;
        let output_dir = self
            .config
            .output_root
            .as_ref()
            .map(|root| spec.output_dir(root));

        let mut gammas = BTreeMap::new();
        for gamma in &self.config.gamma_values {
            let load = load_merged(source.as_ref(), &spec.target, gamma);
            if load.events.is_empty() {
                warn!("[{key}] gamma={gamma}: no events");
            }
            let seed = derive_seed(self.config.master_seed, &format!("{key}/g{gamma}"));
            let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
            let staged = run_stages(&load.batch(), &cut, &geometry, &mut rng)?;
            info!(
                "[{key}] gamma={gamma}: {} -> {} -> {} events",
                staged.before_cut.n_events(),
                staged.after_cut.n_events(),
                staged.after_geometry.n_events()
            );

            if self.config.keep_stage_arrays {
                if let Some(dir) = &output_dir {
                    write_stage_arrays(&dir.join(format!("gamma_{gamma}")), &staged)?;
                }
            }
            gammas.insert(gamma.clone(), GammaResult::new(&staged, load.report));
        }

        let status = if gammas.values().all(|g| g.before_cut.n_events == 0) {
            warn!("[{key}] no events for any gamma");
            ConfigurationStatus::NoData
        } else {
            ConfigurationStatus::Completed
        };

        let result = ConfigurationResult {
            key,
            spec: spec.clone(),
            status,
            error: None,
            gammas,
            momentum_cut: Some(cut.describe()),
            geometry: Some(geometry.snapshot()),
        };

        if let Some(dir) = &output_dir {
            geometry.save(dir.join("geometry_config.json"))?;
            write_json(dir.join("momentum_cut.json"), &cut.describe())?;
            write_json(dir.join("results.json"), &result)?;
        }
        Ok(result)
    }

    /// Runs every configuration.
    ///
    /// Per-configuration errors are logged and recorded as
    /// [`ConfigurationStatus::Failed`]; they do not stop the sweep.
    ///
    /// # Errors
    /// Returns an error only if the final summary cannot be written.
    pub fn run(&self) -> Result<SweepReport> {
        let specs = self.configurations();
        info!("Sweeping {} configurations", specs.len());

        let results: Vec<ConfigurationResult> = specs
            .par_iter()
            .map(|spec| {
                self.run_configuration(spec).unwrap_or_else(|err| {
                    error!("[{}] failed: {err}", spec.key());
                    ConfigurationResult::failed(spec, &err)
                })
            })
            .collect();

        let report = SweepReport::new(results);
        info!(
            "Sweep finished: {} completed, {} without data, {} failed",
            report.count(ConfigurationStatus::Completed),
            report.count(ConfigurationStatus::NoData),
            report.count(ConfigurationStatus::Failed)
        );
        if let Some(root) = &self.config.output_root {
            write_json(root.join("sweep_summary.json"), &report)?;
        }
        Ok(report)
    }
}

fn write_stage_arrays(dir: &Path, staged: &StagedEvents) -> Result<()> {
    for stage in Stage::ALL {
        let mut writer = StageFileWriter::create(dir.join(format!("{stage}.csv")))?;
        writer.write_batch_csv(&staged.stage(stage).events)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_order_and_paths() {
        let config = SweepConfig::new("/data")
            .with_field_strengths(vec![1.0, 1.2])
            .with_deflection_angles(vec![5.0])
            .with_targets(vec!["Pb208".to_string(), "Sn124".to_string()])
            .with_polarization_types(vec![PolarizationType::Z])
            .with_momentum_resolutions(vec![0.0, 0.05]);
        let runner = SweepRunner::new(config).unwrap();
        let specs = runner.configurations();
        assert_eq!(specs.len(), 8);
        assert_eq!(specs[0].key(), "1.0T_5.0deg_Pb208_zpol");
        assert_eq!(specs[1].key(), "1.0T_5.0deg_Pb208_zpol_res0.050");
        assert_eq!(specs[7].key(), "1.2T_5.0deg_Sn124_zpol_res0.050");

        let dir = specs[1].output_dir(Path::new("/out"));
        assert_eq!(dir, PathBuf::from("/out/1.00T/5deg/Pb208/zpol/res0.050"));
    }

    #[test]
    fn test_report_groups_comparisons_by_field_and_angle() {
        let spec = |b: f64, target: &str| ConfigurationSpec {
            field_strength: b,
            deflection_angle: 5.0,
            target: target.to_string(),
            pol_type: PolarizationType::Y,
            momentum_resolution: 0.0,
        };
        let completed = |s: ConfigurationSpec| {
            let mut gammas = BTreeMap::new();
            gammas.insert("050".to_string(), GammaResult::default());
            ConfigurationResult {
                key: s.key(),
                spec: s,
                status: ConfigurationStatus::Completed,
                error: None,
                gammas,
                momentum_cut: None,
                geometry: None,
            }
        };
        let failed = ConfigurationResult::failed(
            &spec(1.4, "Pb208"),
            &crate::Error::InvalidConfig("boom".to_string()),
        );
        let report = SweepReport::new(vec![
            completed(spec(1.0, "Pb208")),
            completed(spec(1.0, "Sn124")),
            completed(spec(1.2, "Pb208")),
            failed,
        ]);
        assert_eq!(report.comparisons.len(), 2);
        assert_eq!(report.comparisons[0].after_cut.len(), 2);
        assert!(report.comparisons[0].after_cut.contains_key("Sn124_ypol"));
        assert_eq!(report.count(ConfigurationStatus::Failed), 1);
        assert!(report
            .configuration("1.4T_5.0deg_Pb208_ypol")
            .unwrap()
            .error
            .as_deref()
            .unwrap()
            .contains("boom"));
    }
}
