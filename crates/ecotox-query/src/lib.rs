//! ECOTOX query protocol
//!
//! Drives the ECOTOX search form for one (chemical, species, endpoint, duration)
//! tuple at a time and reduces the matching dose-response records to a single
//! geometric-mean concentration:
//! - [`FormController`] loads a query into the form and submits it
//! - [`ReadinessGate`] decides when the result table is safe to read
//! - [`RecordExtractor`] applies the inclusion rule to each table row
//! - [`aggregate`] reduces accepted values to the reported summary
//! - [`QueryDriver`] sequences the above and owns the session-scoped flags

pub mod aggregate;
mod driver;
pub mod errors;
mod extract;
mod form;
mod gate;
mod layout;
pub mod model;
mod policy;
#[cfg(any(test, feature = "fake"))]
pub mod testing;

pub use aggregate::{format_summary, geometric_mean, summarize, EMPTY_SUMMARY};
pub use driver::*;
pub use errors::QueryError;
pub use extract::*;
pub use form::*;
pub use gate::*;
pub use layout::*;
pub use model::*;
pub use policy::*;
