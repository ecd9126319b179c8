//! Polling services: normalized model, normalizer, coordinator and the
//! host-facing views built on top of them.

pub mod coordinator;
pub mod entities;
pub mod models;
pub mod normalizer;
pub mod setup;

pub use coordinator::{CycleOutcome, CyclePhase, HostView, PollCoordinator, PollStatus};
pub use entities::{describe, EntityDescriptor, EntityValue};
pub use models::{Device, Metric, ModelGroup, Reading, Snapshot};
pub use normalizer::normalize;
pub use setup::{validate_setup, SetupInfo};
