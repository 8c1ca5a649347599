//! dpol-core: Core types for deuteron breakup event analysis.
//!
//! This crate provides the event record produced by the raw-data readers,
//! the columnar batch used by the bulk cut and acceptance stages, and the
//! reaction-plane alignment transform shared by every stage.
//!

pub mod error;
pub mod event;
pub mod kinematics;
pub mod soa;

pub use error::{Error, Result};
pub use event::{
    ChargeOrder, DatasetLayout, Event, EventTag, Momentum, PolarizationType, PolarizationVariant,
};
pub use kinematics::{alignment_angle, rotate_transverse, Derived};
pub use soa::EventBatch;
