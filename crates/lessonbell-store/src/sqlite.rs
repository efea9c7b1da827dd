//! SQLite schedule store: lessons, per-date time-tables, the weekly default
//! schedule and practices.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};
use lessonbell_core::error::{LessonBellError, Result};
use lessonbell_core::traits::ScheduleStore;
use lessonbell_core::types::{
    DATE_FORMAT, DefaultLesson, Lesson, LessonId, LessonRecord, Period, PeriodSlot, Practice,
    TIME_FORMAT, TimeTable, WeekParity, parse_date, parse_time, validate_lesson_name,
};
use rusqlite::{Connection, OptionalExtension, params};

fn db_err(e: rusqlite::Error) -> LessonBellError {
    LessonBellError::Store(e.to_string())
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Raw `lessons` row: id, date, period, name, attended, note.
type LessonRow = (i64, String, i64, String, i64, Option<String>);

const LESSON_COLUMNS: &str = "id, date, period, name, attended, note";

fn record_from_row(row: LessonRow) -> Result<LessonRecord> {
    let (id, date, period, name, attended, note) = row;
    let period = u8::try_from(period)
        .map_err(|_| LessonBellError::Store(format!("lesson {id}: bad period {period}")))
        .and_then(Period::new)?;
    Ok(LessonRecord {
        id: LessonId(id),
        date: parse_date(&date)?,
        period,
        name,
        attended: attended != 0,
        note,
    })
}

fn read_lesson_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LessonRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn fmt_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// SQLite-backed schedule store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(db_err)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        tracing::debug!("🗄️ Schedule store opened at {}", path.display());
        Ok(store)
    }

    /// Private in-memory database (tests, dry runs).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| LessonBellError::Store(format!("connection lock poisoned: {e}")))
    }

    /// Create tables.
    fn migrate(&self) -> Result<()> {
        self.conn()?
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS lessons (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,              -- YYYY-MM-DD
                period INTEGER NOT NULL CHECK (period BETWEEN 1 AND 4),
                name TEXT NOT NULL,
                attended INTEGER NOT NULL DEFAULT 0,
                note TEXT,
                UNIQUE (date, period)
            );

            -- One row per date; NULL pairs mean the period has no times.
            CREATE TABLE IF NOT EXISTS timetables (
                date TEXT PRIMARY KEY,
                start1 TEXT, end1 TEXT,
                start2 TEXT, end2 TEXT,
                start3 TEXT, end3 TEXT,
                start4 TEXT, end4 TEXT
            );

            -- Weekly schedule; week 0 = numerator, 1 = denominator.
            CREATE TABLE IF NOT EXISTS default_lessons (
                weekday INTEGER NOT NULL CHECK (weekday BETWEEN 1 AND 7),   -- ISO, Monday = 1
                week INTEGER NOT NULL CHECK (week IN (0, 1)),
                period INTEGER NOT NULL CHECK (period BETWEEN 1 AND 4),
                name TEXT NOT NULL,
                PRIMARY KEY (weekday, week, period)
            );

            CREATE TABLE IF NOT EXISTS practices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                status INTEGER NOT NULL DEFAULT 1,   -- 1 = ongoing
                start_date TEXT NOT NULL UNIQUE,
                end_date TEXT,
                time_from TEXT NOT NULL,
                time_to TEXT NOT NULL
            );
         ",
            )
            .map_err(|e| LessonBellError::Store(format!("Migration: {e}")))
    }

    // ─── Lessons ──────────────────────────────────────────────

    /// Insert a lesson. Fails when the period of that date is already taken.
    pub fn add_lesson(
        &self,
        date: NaiveDate,
        period: Period,
        name: &str,
        note: Option<&str>,
    ) -> Result<LessonId> {
        let name = validate_lesson_name(name)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO lessons (date, period, name, attended, note) VALUES (?1, ?2, ?3, 0, ?4)",
            params![fmt_date(date), period.number(), name, note],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                LessonBellError::InvalidInput(format!("period {period} of {date} is already set"))
            } else {
                db_err(e)
            }
        })?;
        let id = LessonId(conn.last_insert_rowid());
        tracing::info!("📚 Lesson added: '{name}' on {date}, period {period} (#{id})");
        Ok(id)
    }

    /// Delete a lesson. Returns `false` if it did not exist.
    pub fn remove_lesson(&self, id: LessonId) -> Result<bool> {
        let changed = self
            .conn()?
            .execute("DELETE FROM lessons WHERE id = ?1", params![id.0])
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    /// Raw lesson rows of a date, ordered by period.
    pub fn lessons_on(&self, date: NaiveDate) -> Result<Vec<LessonRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {LESSON_COLUMNS} FROM lessons WHERE date = ?1 ORDER BY period"
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![fmt_date(date)], read_lesson_row)
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        rows.into_iter().map(record_from_row).collect()
    }

    // ─── Time-tables ──────────────────────────────────────────

    /// Store the time-table of its date, replacing any previous one.
    pub fn set_timetable(&self, table: &TimeTable) -> Result<()> {
        let mut cols: Vec<Option<String>> = Vec::with_capacity(Period::COUNT * 2);
        for period in Period::all() {
            let slot = table.slot(period);
            cols.push(slot.map(|s| s.start.format(TIME_FORMAT).to_string()));
            cols.push(slot.map(|s| s.end.format(TIME_FORMAT).to_string()));
        }
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO timetables
                 (date, start1, end1, start2, end2, start3, end3, start4, end4)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    fmt_date(table.date),
                    cols[0],
                    cols[1],
                    cols[2],
                    cols[3],
                    cols[4],
                    cols[5],
                    cols[6],
                    cols[7],
                ],
            )
            .map_err(db_err)?;
        tracing::info!("🕗 Time-table set for {}", table.date);
        Ok(())
    }

    fn load_timetable(&self, date: NaiveDate) -> Result<Option<TimeTable>> {
        let conn = self.conn()?;
        let row: Option<Vec<Option<String>>> = conn
            .query_row(
                "SELECT start1, end1, start2, end2, start3, end3, start4, end4
                 FROM timetables WHERE date = ?1",
                params![fmt_date(date)],
                |row| (0..Period::COUNT * 2).map(|i| row.get(i)).collect(),
            )
            .optional()
            .map_err(db_err)?;

        let Some(cols) = row else {
            return Ok(None);
        };
        let mut table = TimeTable::new(date);
        for (period, pair) in Period::all().zip(cols.chunks(2)) {
            if let [Some(start), Some(end)] = pair {
                table.set_slot(period, PeriodSlot::parse(start, end)?);
            }
        }
        Ok(Some(table))
    }

    // ─── Weekly defaults ──────────────────────────────────────

    /// Set the default lesson of a weekday/week/period, replacing any previous one.
    pub fn set_default_lesson(
        &self,
        weekday: Weekday,
        parity: WeekParity,
        period: Period,
        name: &str,
    ) -> Result<()> {
        let name = validate_lesson_name(name)?;
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO default_lessons (weekday, week, period, name)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    weekday.number_from_monday(),
                    parity.index(),
                    period.number(),
                    name
                ],
            )
            .map_err(db_err)?;
        tracing::info!("📅 Default lesson set: {weekday} ({parity}), period {period}: '{name}'");
        Ok(())
    }

    /// Delete a default lesson. Returns `false` if none was set.
    pub fn remove_default_lesson(
        &self,
        weekday: Weekday,
        parity: WeekParity,
        period: Period,
    ) -> Result<bool> {
        let changed = self
            .conn()?
            .execute(
                "DELETE FROM default_lessons WHERE weekday = ?1 AND week = ?2 AND period = ?3",
                params![weekday.number_from_monday(), parity.index(), period.number()],
            )
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    /// Default lessons for the weekday and week parity of `date`, by period.
    pub fn default_lessons_for(&self, date: NaiveDate) -> Result<Vec<DefaultLesson>> {
        let weekday = date.weekday();
        let parity = WeekParity::of(date);
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT period, name FROM default_lessons
                 WHERE weekday = ?1 AND week = ?2 ORDER BY period",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(
                params![weekday.number_from_monday(), parity.index()],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;

        rows.into_iter()
            .map(|(period, name)| {
                let period = u8::try_from(period)
                    .map_err(|_| LessonBellError::Store(format!("bad default period {period}")))
                    .and_then(Period::new)?;
                Ok(DefaultLesson {
                    weekday,
                    parity,
                    period,
                    name,
                })
            })
            .collect()
    }

    /// Copy the weekly defaults into `date`. Periods that already hold a
    /// lesson are left alone. Returns the ids of the lessons added.
    pub fn fill_default_lessons(&self, date: NaiveDate) -> Result<Vec<LessonId>> {
        let taken: Vec<Period> = self.lessons_on(date)?.iter().map(|l| l.period).collect();
        let mut added = Vec::new();
        for default in self.default_lessons_for(date)? {
            if taken.contains(&default.period) {
                tracing::debug!("Period {} of {date} already set, keeping it", default.period);
                continue;
            }
            added.push(self.add_lesson(date, default.period, &default.name, None)?);
        }
        Ok(added)
    }

    // ─── Practices ────────────────────────────────────────────

    /// Begin a practice block.
    pub fn start_practice(
        &self,
        start_date: NaiveDate,
        time_from: chrono::NaiveTime,
        time_to: chrono::NaiveTime,
    ) -> Result<i64> {
        PeriodSlot::new(time_from, time_to)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO practices (status, start_date, time_from, time_to) VALUES (1, ?1, ?2, ?3)",
            params![
                fmt_date(start_date),
                time_from.format(TIME_FORMAT).to_string(),
                time_to.format(TIME_FORMAT).to_string(),
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                LessonBellError::InvalidInput(format!("a practice already starts on {start_date}"))
            } else {
                db_err(e)
            }
        })?;
        Ok(conn.last_insert_rowid())
    }

    /// Close the practice that started on `start_date`: clears the ongoing
    /// status and records the end date in one update.
    pub fn end_practice(&self, start_date: NaiveDate, end_date: NaiveDate) -> Result<bool> {
        if end_date < start_date {
            return Err(LessonBellError::InvalidInput(format!(
                "practice cannot end ({end_date}) before it starts ({start_date})"
            )));
        }
        let changed = self
            .conn()?
            .execute(
                "UPDATE practices SET status = 0, end_date = ?1 WHERE start_date = ?2",
                params![fmt_date(end_date), fmt_date(start_date)],
            )
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    /// All practices, oldest first.
    pub fn practices(&self) -> Result<Vec<Practice>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, status, start_date, end_date, time_from, time_to
                 FROM practices ORDER BY start_date",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;

        rows.into_iter()
            .map(|(id, status, start, end, from, to)| {
                Ok(Practice {
                    id,
                    active: status != 0,
                    start_date: parse_date(&start)?,
                    end_date: end.as_deref().map(parse_date).transpose()?,
                    time_from: parse_time(&from)?,
                    time_to: parse_time(&to)?,
                })
            })
            .collect()
    }

    /// The practice covering `date`, if any.
    pub fn current_practice(&self, date: NaiveDate) -> Result<Option<Practice>> {
        Ok(self.practices()?.into_iter().find(|p| p.covers(date)))
    }
}

#[async_trait]
impl ScheduleStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn lessons_for_date(&self, date: NaiveDate) -> Result<Vec<Lesson>> {
        let Some(table) = self.load_timetable(date)? else {
            return Ok(Vec::new());
        };
        Ok(crate::resolve_day(self.lessons_on(date)?, &table))
    }

    async fn timetable_for_date(&self, date: NaiveDate) -> Result<Option<TimeTable>> {
        self.load_timetable(date)
    }

    async fn lesson_by_id(&self, id: LessonId) -> Result<Option<LessonRecord>> {
        let row = self
            .conn()?
            .query_row(
                &format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id = ?1"),
                params![id.0],
                read_lesson_row,
            )
            .optional()
            .map_err(db_err)?;
        row.map(record_from_row).transpose()
    }

    async fn lesson_id(&self, date: NaiveDate, name: &str) -> Result<Option<LessonId>> {
        self.conn()?
            .query_row(
                "SELECT id FROM lessons WHERE date = ?1 AND name = ?2 ORDER BY period LIMIT 1",
                params![fmt_date(date), name],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map(|id| id.map(LessonId))
            .map_err(db_err)
    }

    async fn set_attended(&self, id: LessonId, attended: bool) -> Result<bool> {
        let changed = self
            .conn()?
            .execute(
                "UPDATE lessons SET attended = ?1 WHERE id = ?2",
                params![attended as i32, id.0],
            )
            .map_err(db_err)?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn p(n: u8) -> Period {
        Period::new(n).unwrap()
    }

    #[tokio::test]
    async fn test_lessons_need_timetable() {
        let store = SqliteStore::in_memory().unwrap();
        store.add_lesson(day(), p(1), "Math", None).unwrap();
        assert!(store.lessons_for_date(day()).await.unwrap().is_empty());

        store.set_timetable(&TimeTable::standard(day())).unwrap();
        let lessons = store.lessons_for_date(day()).await.unwrap();
        assert_eq!(lessons.len(), 1);
        assert_eq!(lessons[0].name, "Math");
        assert_eq!(lessons[0].start, day().and_hms_opt(8, 30, 0).unwrap());
    }

    #[tokio::test]
    async fn test_lessons_ordered_by_period() {
        let store = SqliteStore::in_memory().unwrap();
        store.set_timetable(&TimeTable::standard(day())).unwrap();
        store.add_lesson(day(), p(3), "Physics", None).unwrap();
        store.add_lesson(day(), p(1), "Math", None).unwrap();
        store.add_lesson(day(), p(2), "History", Some("room 12")).unwrap();

        let lessons = store.lessons_for_date(day()).await.unwrap();
        let periods: Vec<u8> = lessons.iter().map(|l| l.period.number()).collect();
        assert_eq!(periods, vec![1, 2, 3]);
        assert_eq!(lessons[1].note.as_deref(), Some("room 12"));
    }

    #[tokio::test]
    async fn test_duplicate_period_rejected() {
        let store = SqliteStore::in_memory().unwrap();
        store.add_lesson(day(), p(1), "Math", None).unwrap();
        let err = store.add_lesson(day(), p(1), "Art", None).unwrap_err();
        assert!(matches!(err, LessonBellError::InvalidInput(_)));
        assert!(store.add_lesson(day(), p(2), "   ", None).is_err());
    }

    #[tokio::test]
    async fn test_partial_timetable_skips_unset_periods() {
        let store = SqliteStore::in_memory().unwrap();
        let table = TimeTable::new(day()).with_slot(p(2), PeriodSlot::parse("10:20", "11:50").unwrap());
        store.set_timetable(&table).unwrap();
        store.add_lesson(day(), p(1), "Math", None).unwrap();
        store.add_lesson(day(), p(2), "Art", None).unwrap();

        let loaded = store.timetable_for_date(day()).await.unwrap().unwrap();
        assert_eq!(loaded, table);
        let lessons = store.lessons_for_date(day()).await.unwrap();
        assert_eq!(lessons.len(), 1);
        assert_eq!(lessons[0].name, "Art");
    }

    #[tokio::test]
    async fn test_timetable_replaced() {
        let store = SqliteStore::in_memory().unwrap();
        store.set_timetable(&TimeTable::standard(day())).unwrap();
        let late = TimeTable::new(day()).with_slot(p(1), PeriodSlot::parse("09:00", "10:30").unwrap());
        store.set_timetable(&late).unwrap();
        assert_eq!(store.timetable_for_date(day()).await.unwrap(), Some(late));
        assert!(store.timetable_for_date(day().succ_opt().unwrap()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_attendance_and_lookup() {
        let store = SqliteStore::in_memory().unwrap();
        let id = store.add_lesson(day(), p(1), "Math", None).unwrap();

        assert_eq!(store.lesson_id(day(), "Math").await.unwrap(), Some(id));
        assert_eq!(store.lesson_id(day(), "Art").await.unwrap(), None);

        assert!(store.set_attended(id, true).await.unwrap());
        let record = store.lesson_by_id(id).await.unwrap().unwrap();
        assert!(record.attended);

        assert!(!store.set_attended(LessonId(999), true).await.unwrap());
        assert!(store.lesson_by_id(LessonId(999)).await.unwrap().is_none());

        assert!(store.remove_lesson(id).unwrap());
        assert!(!store.remove_lesson(id).unwrap());
    }

    #[test]
    fn test_end_practice_sets_both_columns() {
        let store = SqliteStore::in_memory().unwrap();
        let from = chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let to = chrono::NaiveTime::from_hms_opt(15, 0, 0).unwrap();
        store.start_practice(day(), from, to).unwrap();

        let ongoing = store.current_practice(day() + chrono::Duration::days(5)).unwrap().unwrap();
        assert!(ongoing.active);
        assert_eq!(ongoing.end_date, None);

        let end = day() + chrono::Duration::days(14);
        assert!(store.end_practice(day(), end).unwrap());
        let practices = store.practices().unwrap();
        assert_eq!(practices.len(), 1);
        assert!(!practices[0].active);
        assert_eq!(practices[0].end_date, Some(end));

        assert!(store.current_practice(end + chrono::Duration::days(1)).unwrap().is_none());
        assert!(store.end_practice(day(), day().pred_opt().unwrap()).is_err());
        assert!(!store.end_practice(end, end).unwrap());
    }

    #[test]
    fn test_default_lessons_follow_week_parity() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .set_default_lesson(Weekday::Mon, WeekParity::Numerator, p(2), "Math")
            .unwrap();
        store
            .set_default_lesson(Weekday::Mon, WeekParity::Numerator, p(1), "Art")
            .unwrap();
        store
            .set_default_lesson(Weekday::Mon, WeekParity::Denominator, p(1), "History")
            .unwrap();
        // replaced, not duplicated
        store
            .set_default_lesson(Weekday::Mon, WeekParity::Numerator, p(2), "Algebra")
            .unwrap();

        let numerator = store.default_lessons_for(day()).unwrap();
        let names: Vec<&str> = numerator.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Art", "Algebra"]);
        assert!(numerator.iter().all(|d| d.applies_to(day())));

        let next_monday = day() + chrono::Duration::days(7);
        let denominator = store.default_lessons_for(next_monday).unwrap();
        assert_eq!(denominator.len(), 1);
        assert_eq!(denominator[0].name, "History");

        assert!(store.default_lessons_for(day().succ_opt().unwrap()).unwrap().is_empty());
        assert!(store
            .remove_default_lesson(Weekday::Mon, WeekParity::Denominator, p(1))
            .unwrap());
        assert!(store.default_lessons_for(next_monday).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fill_default_lessons_keeps_existing() {
        let store = SqliteStore::in_memory().unwrap();
        store.set_timetable(&TimeTable::standard(day())).unwrap();
        store
            .set_default_lesson(Weekday::Mon, WeekParity::Numerator, p(1), "Math")
            .unwrap();
        store
            .set_default_lesson(Weekday::Mon, WeekParity::Numerator, p(3), "Physics")
            .unwrap();
        store.add_lesson(day(), p(1), "Exam", None).unwrap();

        let added = store.fill_default_lessons(day()).unwrap();
        assert_eq!(added.len(), 1);
        let lessons = store.lessons_for_date(day()).await.unwrap();
        let names: Vec<&str> = lessons.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Exam", "Physics"]);

        // second fill is a no-op
        assert!(store.fill_default_lessons(day()).unwrap().is_empty());
    }

    #[test]
    fn test_open_on_disk() {
        let dir = std::env::temp_dir().join("lessonbell-test-sqlite");
        std::fs::remove_dir_all(&dir).ok();
        let path = dir.join("schedule.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.add_lesson(day(), p(4), "Chemistry", None).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.lessons_on(day()).unwrap().len(), 1);
        std::fs::remove_dir_all(&dir).ok();
    }
}
