//! One-way status publishing for dashboards and controllers

mod publisher;
mod snapshot;

pub use publisher::StatusPublisher;
pub use snapshot::StatusSnapshot;
