//! Collaborator traits consumed by the lesson tracker.

pub mod channel;
pub mod store;

pub use channel::Channel;
pub use store::ScheduleStore;
