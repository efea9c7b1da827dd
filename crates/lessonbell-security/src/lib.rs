//! # LessonBell Security
//!
//! Correlation tokens: an "I attended" reply travels through the chat client
//! and comes back as opaque callback data, so the lesson id inside it is
//! signed with a process-wide key and verified before any mutation.

pub mod signer;

pub use signer::{CorrelationSigner, DENY_SENTINEL, InvalidToken, VISIT_ACTION};
