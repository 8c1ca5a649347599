//! dpol-algorithms: Selection, acceptance and statistics for breakup events.
//!
//! This crate provides:
//! - **Momentum cuts** - z-type (single pass) and y-type (two stage) policies
//!   with reaction-plane rotation, plus a simple box cut
//! - **Geometry acceptance** - simplified two-detector model driven by field
//!   strength and beam deflection angle
//! - **Streaming statistics** - reservoir sampling, per-bucket accumulators and
//!   the asymmetry ratio
//!
#![warn(missing_docs)]

mod accumulator;
mod error;
mod geometry;
mod levels;
mod momentum_cut;
mod processing;
mod ratio;
mod reservoir;

pub use accumulator::{derive_seed, Accumulator, BucketKey, Point3, ScalarSeries};
pub use error::{Error, Result};
pub use geometry::{
    GeometryAcceptanceResult, GeometryFilter, GeometrySnapshot, NeutronDetectorConfig,
    ProtonDetectorConfig, TargetPosition, BEAM_ENTRY_Z_MM, BEAM_MOMENTUM_MEV,
    NEUTRON_DETECTOR_Z_MM, PROTON_DETECTOR_Z_MM,
};
pub use levels::CutLevel;
pub use momentum_cut::{
    efficiency, smear_batch, BoxCut, CutPolicy, CutResult, MomentumCut, MomentumCutSettings,
    RotatedMomenta, YCutOverrides, YCutThresholds, ZCutOverrides, ZCutThresholds,
};
pub use processing::{run_stages, Stage, StageRecord, StagedEvents};
pub use ratio::RatioStatistic;
pub use reservoir::ReservoirSampler;
