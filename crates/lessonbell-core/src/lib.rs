//! # LessonBell Core
//!
//! Shared vocabulary for the LessonBell workspace: the schedule data model,
//! the error type, configuration, and the collaborator traits the tracker
//! consumes (`ScheduleStore`, `Channel`).

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::LessonBellConfig;
pub use error::{LessonBellError, Result};
pub use traits::{Channel, ScheduleStore};
pub use types::{
    DefaultLesson, InlineButton, IncomingMessage, Lesson, LessonId, LessonRecord, OutgoingMessage,
    Period, PeriodSlot, Practice, TimeTable, WeekParity, week_parity,
};
