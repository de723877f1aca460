//! Common types shared across the hydro-ingest crates.

pub mod error;
pub mod policy;
pub mod progress;
pub mod series;
pub mod version;

pub use error::{HydroError, HydroResult};
pub use policy::OverwritePolicy;
pub use progress::{CancellationToken, ProgressSink};
pub use series::{DataValue, Series, Site, Theme, Variable};
pub use version::ProtocolVersion;
