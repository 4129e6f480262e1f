//! Domain models for the refund desk
//!
//! Tax records, refund arithmetic, statistics and the submission form.

mod form;
mod record;
mod stats;
mod types;

pub use form::*;
pub use record::*;
pub use stats::*;
pub use types::*;
