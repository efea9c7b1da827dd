//! # LessonBell Scheduler
//!
//! The lesson lifecycle tracker: a background task that walks today's lessons
//! in period order, sleeps until each alert threshold and pushes "starts in",
//! "started" and "ended" notices to the admin. Ended notices carry a signed
//! acknowledgment prompt that [`AckHandler`] later turns into an attendance mark.
//!
//! ## Architecture
//! ```text
//! LessonTracker (handle, cloneable)
//!   ├── start() / stop()       → running flag + per-run CancellationToken
//!   ├── current_lesson()       → watch channel written by the run task only
//!   └── run task
//!         Polling ──lessons──▶ Announcing ──all done──▶ Polling
//!            ▲                    │ wait_until(threshold) in ≤ poll ticks
//!            └── vanished/stop ───┘ emit → Channel (bounded by send timeout)
//! ```

pub mod ack;
pub mod clock;
pub mod humanize;
pub mod lifecycle;
pub mod notify;
pub mod tracker;

pub use ack::{AckHandler, AckOutcome, AckRejection, is_ack_data};
pub use clock::{AnchoredClock, Clock, SystemClock};
pub use humanize::humanize;
pub use notify::{Messages, Notification, NotificationKind, NotifyHistory};
pub use tracker::{LessonTracker, TrackerSettings};
