//! Data models for the CFP review backend.
//!
//! Field names serialize as camelCase and enum values as kebab-case for the web client.

mod datastore;
mod evaluation;
mod evaluator;
mod member;
mod proposal;
mod session;

pub use datastore::*;
pub use evaluation::*;
pub use evaluator::*;
pub use member::*;
pub use proposal::*;
pub use session::*;
