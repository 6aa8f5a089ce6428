//! Configuration, shared types, and pipeline seams for bandcast.
//!
//! Every other crate in the workspace depends on this one for the value
//! types that cross crate boundaries and for the two traits that decouple
//! the capture loop from its collaborators.

pub mod config;
pub mod error;
pub mod traits;
pub mod value;

pub use config::AppConfig;
pub use error::{CaptureError, CoreError};
pub use traits::{Publisher, SampleSource};
pub use value::{BandPower, NormalizedValue, ValueMessage};
