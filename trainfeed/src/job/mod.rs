//! Jobs: lifecycle, dispatch pipeline, registries and the queue dispatcher.

mod config;
mod dispatcher;
mod entity;
mod pipeline;
mod registry;

pub use config::DispatchConfig;
pub use dispatcher::{DispatcherConfig, JobDispatcher};
pub use entity::{Job, JobSnapshot};
pub use pipeline::{DispatchSummary, dispatch};
pub use registry::{ConnectionRegistry, JobRegistry};
