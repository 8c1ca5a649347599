//! dpol-sweep: Drives selection and acceptance over a configuration space.
//!
//! - [`SweepRunner`] iterates field strengths x deflection angles x targets x
//!   polarization types x momentum resolutions x gammas, runs the
//!   before-cut / after-cut / after-geometry pipeline and isolates
//!   per-configuration failures.
//! - [`Survey`] streams raw events through nested cut levels into bounded
//!   per-bucket accumulators.
//!

mod config;
mod error;
mod runner;
mod survey;

pub use config::{config_key, CutOverrides, SweepConfig};
pub use error::{Error, Result};
pub use runner::{
    ConfigurationResult, ConfigurationSpec, ConfigurationStatus, GammaResult, RatioComparison,
    StageSummary, SweepReport, SweepRunner,
};
pub use survey::{BucketSummary, Survey, SurveyConfig, SurveyResult};
