//! Streaming survey of raw events through nested cut levels.
//!
//! Events are never held in memory as a whole: each gamma's files are
//! streamed, every event is tested against each requested [`CutLevel`], and
//! passing events are fed to the accumulator of bucket `(level, gamma)`.
//! Gammas are processed in parallel; every bucket is seeded from the master
//! seed and its own identity, so the result does not depend on scheduling.

use crate::config::CutOverrides;
use crate::{Error, Result};
use dpol_algorithms::{Accumulator, BucketKey, CutLevel, CutPolicy, RatioStatistic};
use dpol_core::{ChargeOrder, Derived, PolarizationType};
use dpol_io::{DataRoot, DiscreteImpactSource, EventSource, LoadReport, RandomPlaneSource};
use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Parameters of one survey (one target, one polarization type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SurveyConfig {
    pub data_root: PathBuf,
    pub energy: String,
    pub target: String,
    pub pol_type: PolarizationType,
    pub gamma_values: Vec<String>,
    pub levels: Vec<CutLevel>,
    /// Capacity of each 3D reservoir.
    pub reservoir_capacity: usize,
    /// Integer b range of the discrete layout; the random-plane layout is
    /// read unfiltered.
    pub b_range: (i32, i32),
    pub bmax_for_event_filter: u32,
    pub momentum_cuts: CutOverrides,
    pub master_seed: u64,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::new(),
            energy: "190".to_string(),
            target: "Pb208".to_string(),
            pol_type: PolarizationType::Y,
            gamma_values: ["050", "060", "070", "080"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            levels: CutLevel::ALL.to_vec(),
            reservoir_capacity: 20_000,
            b_range: (5, 10),
            bmax_for_event_filter: 10,
            momentum_cuts: CutOverrides::default(),
            master_seed: 12345,
        }
    }
}

impl SurveyConfig {
    pub fn new<P: Into<PathBuf>>(data_root: P, pol_type: PolarizationType) -> Self {
        Self {
            data_root: data_root.into(),
            pol_type,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    #[must_use]
    pub fn with_gamma_values(mut self, gammas: Vec<String>) -> Self {
        self.gamma_values = gammas;
        self
    }

    #[must_use]
    pub fn with_levels(mut self, levels: Vec<CutLevel>) -> Self {
        self.levels = levels;
        self
    }

    #[must_use]
    pub fn with_reservoir_capacity(mut self, capacity: usize) -> Self {
        self.reservoir_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_master_seed(mut self, seed: u64) -> Self {
        self.master_seed = seed;
        self
    }
}

/// Per-bucket record written for external renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketSummary {
    #[serde(flatten)]
    pub key: BucketKey,
    /// Events accumulated.
    pub count: u64,
    /// Points held in each 3D reservoir.
    pub n_sampled: usize,
    pub ratio: RatioStatistic,
}

/// Accumulators of a finished survey.
#[derive(Debug, Clone, Default)]
pub struct SurveyResult {
    pub buckets: BTreeMap<BucketKey, Accumulator>,
    /// Load report per gamma.
    pub reports: BTreeMap<String, LoadReport>,
}

impl SurveyResult {
    #[must_use]
    pub fn bucket(&self, key: &BucketKey) -> Option<&Accumulator> {
        self.buckets.get(key)
    }

    /// Counts and ratios of every bucket, in key order.
    #[must_use]
    pub fn summary(&self) -> Vec<BucketSummary> {
        self.buckets
            .iter()
            .map(|(key, acc)| BucketSummary {
                key: key.clone(),
                count: acc.count(),
                n_sampled: acc.proton_points().len(),
                ratio: acc.ratio(),
            })
            .collect()
    }
}

/// Streaming survey over the gammas of one dataset family.
pub struct Survey {
    config: SurveyConfig,
    policy: CutPolicy,
    source: Box<dyn EventSource>,
}

impl Survey {
    /// Builds the survey and its event source.
    ///
    /// # Errors
    /// Returns an error if the data root is empty, no level or gamma is
    /// requested, or the cut thresholds are invalid.
    pub fn new(config: SurveyConfig) -> Result<Self> {
        if config.data_root.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("data_root is required".to_string()));
        }
        if config.levels.is_empty() || config.gamma_values.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one cut level and one gamma are required".to_string(),
            ));
        }
        let policy = config.momentum_cuts.policy(config.pol_type);
        policy.validate()?;

        let root = DataRoot::new(&config.data_root);
        let source: Box<dyn EventSource> = match config.pol_type {
            PolarizationType::Z => Box::new(DiscreteImpactSource::new(
                root,
                config.energy.clone(),
                config.b_range,
                config.bmax_for_event_filter,
            )?),
            PolarizationType::Y => Box::new(RandomPlaneSource::new(root, config.energy.clone())),
        };
        Ok(Self {
            config,
            policy,
            source,
        })
    }

    #[must_use]
    pub fn config(&self) -> &SurveyConfig {
        &self.config
    }

    /// Streams every gamma and returns the filled accumulators.
    #[must_use]
    pub fn run(&self) -> SurveyResult {
        let per_gamma: Vec<_> = self
            .config
            .gamma_values
            .par_iter()
            .map(|gamma| (gamma.clone(), self.run_gamma(gamma)))
            .collect();

        let mut result = SurveyResult::default();
        for (gamma, (buckets, report)) in per_gamma {
            result.buckets.extend(buckets);
            result.reports.insert(gamma, report);
        }
        result
    }

    fn run_gamma(&self, gamma: &str) -> (Vec<(BucketKey, Accumulator)>, LoadReport) {
        let c = &self.config;
        let mut buckets: Vec<(BucketKey, Accumulator)> = c
            .levels
            .iter()
            .map(|&level| {
                let key = BucketKey::new(c.pol_type, level, gamma);
                let acc = Accumulator::for_bucket(&key, c.reservoir_capacity, c.master_seed);
                (key, acc)
            })
            .collect();

        let mut report = LoadReport::default();
        for order in [ChargeOrder::Np, ChargeOrder::Pn] {
            let mut stream = self.source.stream(&c.target, gamma, order);
            for event in stream.by_ref() {
                let derived = Derived::from_event(&event);
                for (key, acc) in &mut buckets {
                    if key.level.passes(&self.policy, &event, &derived) {
                        acc.add(&event, &derived);
                    }
                }
            }
            report.merge(stream.into_report());
        }
        info!(
            "[{}] gamma={gamma} done ({} events)",
            c.pol_type, report.events
        );
        (buckets, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_incomplete_config() {
        assert!(Survey::new(SurveyConfig::default()).is_err());
        let no_levels = SurveyConfig::new("/data", PolarizationType::Z).with_levels(vec![]);
        assert!(Survey::new(no_levels).is_err());
    }

    #[test]
    fn test_missing_data_gives_empty_buckets() {
        let dir = tempfile::TempDir::new().unwrap();
        let survey = Survey::new(
            SurveyConfig::new(dir.path(), PolarizationType::Z)
                .with_gamma_values(vec!["050".to_string()]),
        )
        .unwrap();
        let result = survey.run();
        assert_eq!(result.buckets.len(), 3);
        assert!(result.buckets.values().all(|acc| acc.count() == 0));
        assert!(result.reports["050"].all_missing());
        assert!(result.summary().iter().all(|s| s.ratio.ratio.is_none()));
    }
}
