//! trainfeed library crate.
//!
//! Pulls cursor-paginated Solr results and streams them as training batches
//! into a remote training service, behind a small HTTP control plane.

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod job;
pub mod logging;
pub mod service;
pub mod solr;
pub mod trainer;
pub mod utils;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
