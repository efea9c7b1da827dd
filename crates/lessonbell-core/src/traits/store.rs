//! Schedule store trait: the narrow read/write surface the tracker needs.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::types::{Lesson, LessonId, LessonRecord, TimeTable};

/// Data access for lessons and per-date time-tables.
///
/// Implementations must make each call atomic on its own; callers never
/// hold a transaction across calls.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Lessons of `date` resolved against that date's time-table, ordered by
    /// period. Empty when the date has no lessons or no time-table.
    async fn lessons_for_date(&self, date: NaiveDate) -> Result<Vec<Lesson>>;

    /// Time-table of `date`, if one was set.
    async fn timetable_for_date(&self, date: NaiveDate) -> Result<Option<TimeTable>>;

    /// Stored lesson row by id.
    async fn lesson_by_id(&self, id: LessonId) -> Result<Option<LessonRecord>>;

    /// Look a lesson up by its natural key (date + name).
    async fn lesson_id(&self, date: NaiveDate, name: &str) -> Result<Option<LessonId>>;

    /// Set the attendance flag. Returns `false` when no such lesson exists.
    async fn set_attended(&self, id: LessonId, attended: bool) -> Result<bool>;
}
