//! # LessonBell Store
//!
//! Row-store backends for lessons, time-tables and practice periods.
//! Both backends implement [`ScheduleStore`](lessonbell_core::ScheduleStore);
//! the write side (adding lessons, setting time-tables) is inherent API used by
//! the admin commands.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use lessonbell_core::types::{Lesson, LessonRecord, TimeTable};

/// Resolve a day's rows against its time-table, ordered by period.
/// Rows whose period has no slot are dropped.
pub(crate) fn resolve_day(mut records: Vec<LessonRecord>, table: &TimeTable) -> Vec<Lesson> {
    records.sort_by_key(|r| r.period);
    records
        .iter()
        .filter_map(|record| {
            let lesson = record.resolve(table);
            if lesson.is_none() {
                tracing::warn!(
                    "⚠️ Lesson '{}' ({}) has no times for period {}",
                    record.name,
                    record.date,
                    record.period
                );
            }
            lesson
        })
        .collect()
}
