//! diffcover: differentially private dataset generalization.
//!
//! This crate anonymizes a labeled tabular dataset under an epsilon
//! differential-privacy budget. Attribute values are iteratively
//! *specialized* (categorical values walk down a taxonomy hierarchy,
//! numeric ranges split into finer intervals), with each refinement chosen
//! by the exponential mechanism, until the budget-bounded step count is
//! spent or nothing useful remains to refine. The released output is the
//! generalized partition with Laplace-noised per-class counts, plus a frozen
//! mapping that replays the same generalization onto held-out data.
//!
//! # Example
//!
//! ```no_run
//! use diffcover::{specialize_seeded, Mode, SpecializeParams};
//!
//! # let records = vec![];
//! # let spec = Default::default();
//! let params = SpecializeParams {
//!     epsilon: 1.0,
//!     mode: Mode::Fixed { steps: 8 },
//!     ..Default::default()
//! };
//! let release = specialize_seeded(&records, &spec, &params, 42).unwrap();
//! for row in &release.records {
//!     println!("{:?} -> {:?}", row.values, row.class_counts);
//! }
//! ```

pub mod budget;
pub mod candidate;
pub mod counter;
pub mod cut_set;
pub mod data;
pub mod engine;
pub mod error;
pub mod io;
pub mod mapper;
pub mod mech;
pub mod partition;
pub mod release;
pub mod taxonomy;
pub mod validate;

pub use data::{GeneralValue, Record, Value};
pub use engine::{
    apply_generalization, apply_generalization_seeded, specialize, specialize_seeded, Mode,
    PrivateRelease, SpecializeParams,
};
pub use error::CoverError;
pub use mapper::FrozenMapperSet;
pub use release::ReleasedRecord;
pub use taxonomy::{AttributeDomain, DomainSpec, TaxonomyNode};
pub use validate::check_input;
