//! Domain model: connections, job descriptors, batches and job status.

pub mod batch;
pub mod connection;
pub mod descriptor;
pub mod status;

pub use batch::{Batch, TrainExample};
pub use connection::ConnectionDescriptor;
pub use descriptor::{JobDescriptor, START_CURSOR};
pub use status::JobStatus;
