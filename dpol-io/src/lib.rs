//! dpol-io: Raw QMD event readers and result writers.
//!
//! Raw breakup events come in two ASCII layouts: one file per integer impact
//! parameter (`z_pol/b_discrete`) and a single random reaction-plane file per
//! dataset (`y_pol/phi_random`). Files are memory-mapped and parsed line by
//! line; missing data is logged and reported, never fatal.
//!

pub mod discovery;
mod error;
pub mod paths;
mod reader;
pub mod source;
mod writer;

pub use discovery::DatasetCatalog;
pub use error::{Error, Result};
pub use paths::{DataRoot, DatasetKey};
pub use reader::{
    data_lines, parse_discrete_line, parse_random_plane_line, DiscreteRecord, MappedTextFile,
    RandomPlaneRecord,
};
pub use source::{
    load_merged, DatasetLoad, DiscreteImpactSource, EventSource, EventStream, LoadReport,
    RandomPlaneSource,
};
pub use writer::{write_json, StageFileWriter};
