//! Data models for the upload pipeline
//!
//! `upload` holds the ledger-facing types (files, records, states) and
//! `transport` the types exchanged with the transport layer (profiles, results,
//! progress events).

mod transport;
mod upload;

pub use transport::*;
pub use upload::*;
