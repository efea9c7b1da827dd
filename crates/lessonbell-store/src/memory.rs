//! In-process schedule store. Same semantics as the SQLite backend, no disk.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};
use lessonbell_core::error::{LessonBellError, Result};
use lessonbell_core::traits::ScheduleStore;
use lessonbell_core::types::{
    DefaultLesson, Lesson, LessonId, LessonRecord, Period, TimeTable, WeekParity,
    validate_lesson_name,
};

#[derive(Default)]
struct MemoryState {
    lessons: BTreeMap<LessonId, LessonRecord>,
    timetables: HashMap<NaiveDate, TimeTable>,
    defaults: BTreeMap<(u32, WeekParity, Period), String>,
    next_id: i64,
}

/// Schedule store kept in a mutex-guarded map.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| LessonBellError::Store(format!("memory store lock poisoned: {e}")))
    }

    /// Insert a lesson. Fails when the period of that date is already taken.
    pub fn add_lesson(
        &self,
        date: NaiveDate,
        period: Period,
        name: &str,
        note: Option<&str>,
    ) -> Result<LessonId> {
        let name = validate_lesson_name(name)?;
        let mut state = self.state()?;
        if state
            .lessons
            .values()
            .any(|l| l.date == date && l.period == period)
        {
            return Err(LessonBellError::InvalidInput(format!(
                "period {period} of {date} is already set"
            )));
        }
        state.next_id += 1;
        let id = LessonId(state.next_id);
        state.lessons.insert(
            id,
            LessonRecord {
                id,
                date,
                period,
                name,
                attended: false,
                note: note.map(str::to_string),
            },
        );
        Ok(id)
    }

    /// Delete a lesson. Returns `false` if it did not exist.
    pub fn remove_lesson(&self, id: LessonId) -> Result<bool> {
        Ok(self.state()?.lessons.remove(&id).is_some())
    }

    /// Raw lesson rows of a date, ordered by period.
    pub fn lessons_on(&self, date: NaiveDate) -> Result<Vec<LessonRecord>> {
        let mut rows: Vec<LessonRecord> = self
            .state()?
            .lessons
            .values()
            .filter(|l| l.date == date)
            .cloned()
            .collect();
        rows.sort_by_key(|l| l.period);
        Ok(rows)
    }

    /// Store the time-table of its date, replacing any previous one.
    pub fn set_timetable(&self, table: TimeTable) -> Result<()> {
        self.state()?.timetables.insert(table.date, table);
        Ok(())
    }

    /// Set the default lesson of a weekday/week/period, replacing any previous one.
    pub fn set_default_lesson(
        &self,
        weekday: Weekday,
        parity: WeekParity,
        period: Period,
        name: &str,
    ) -> Result<()> {
        let name = validate_lesson_name(name)?;
        self.state()?
            .defaults
            .insert((weekday.number_from_monday(), parity, period), name);
        Ok(())
    }

    /// Delete a default lesson. Returns `false` if none was set.
    pub fn remove_default_lesson(
        &self,
        weekday: Weekday,
        parity: WeekParity,
        period: Period,
    ) -> Result<bool> {
        Ok(self
            .state()?
            .defaults
            .remove(&(weekday.number_from_monday(), parity, period))
            .is_some())
    }

    /// Default lessons for the weekday and week parity of `date`, by period.
    pub fn default_lessons_for(&self, date: NaiveDate) -> Result<Vec<DefaultLesson>> {
        let weekday = date.weekday();
        let parity = WeekParity::of(date);
        let day = weekday.number_from_monday();
        Ok(self
            .state()?
            .defaults
            .iter()
            .filter(|((d, w, _), _)| *d == day && *w == parity)
            .map(|((_, _, period), name)| DefaultLesson {
                weekday,
                parity,
                period: *period,
                name: name.clone(),
            })
            .collect())
    }

    /// Copy the weekly defaults into `date`. Periods that already hold a
    /// lesson are left alone. Returns the ids of the lessons added.
    pub fn fill_default_lessons(&self, date: NaiveDate) -> Result<Vec<LessonId>> {
        let taken: Vec<Period> = self.lessons_on(date)?.iter().map(|l| l.period).collect();
        let mut added = Vec::new();
        for default in self.default_lessons_for(date)? {
            if !taken.contains(&default.period) {
                added.push(self.add_lesson(date, default.period, &default.name, None)?);
            }
        }
        Ok(added)
    }

    /// Drop the time-table of a date.
    pub fn clear_timetable(&self, date: NaiveDate) -> Result<bool> {
        Ok(self.state()?.timetables.remove(&date).is_some())
    }
}

#[async_trait]
impl ScheduleStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn lessons_for_date(&self, date: NaiveDate) -> Result<Vec<Lesson>> {
        let table = self.state()?.timetables.get(&date).cloned();
        match table {
            Some(table) => Ok(crate::resolve_day(self.lessons_on(date)?, &table)),
            None => Ok(Vec::new()),
        }
    }

    async fn timetable_for_date(&self, date: NaiveDate) -> Result<Option<TimeTable>> {
        Ok(self.state()?.timetables.get(&date).cloned())
    }

    async fn lesson_by_id(&self, id: LessonId) -> Result<Option<LessonRecord>> {
        Ok(self.state()?.lessons.get(&id).cloned())
    }

    async fn lesson_id(&self, date: NaiveDate, name: &str) -> Result<Option<LessonId>> {
        Ok(self
            .lessons_on(date)?
            .into_iter()
            .find(|l| l.name == name)
            .map(|l| l.id))
    }

    async fn set_attended(&self, id: LessonId, attended: bool) -> Result<bool> {
        match self.state()?.lessons.get_mut(&id) {
            Some(lesson) => {
                lesson.attended = attended;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessonbell_core::types::PeriodSlot;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn p(n: u8) -> Period {
        Period::new(n).unwrap()
    }

    #[tokio::test]
    async fn test_resolves_in_period_order() {
        let store = MemoryStore::new();
        store.set_timetable(TimeTable::standard(day())).unwrap();
        store.add_lesson(day(), p(4), "Chemistry", None).unwrap();
        store.add_lesson(day(), p(2), "History", None).unwrap();

        let lessons = store.lessons_for_date(day()).await.unwrap();
        let names: Vec<&str> = lessons.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["History", "Chemistry"]);
    }

    #[tokio::test]
    async fn test_mutations_visible_to_readers() {
        let store = MemoryStore::new();
        store
            .set_timetable(
                TimeTable::new(day()).with_slot(p(1), PeriodSlot::parse("08:30", "10:00").unwrap()),
            )
            .unwrap();
        let id = store.add_lesson(day(), p(1), "Math", None).unwrap();
        assert!(store.add_lesson(day(), p(1), "Art", None).is_err());
        assert_eq!(store.lesson_id(day(), "Math").await.unwrap(), Some(id));

        assert!(store.set_attended(id, true).await.unwrap());
        assert!(store.lesson_by_id(id).await.unwrap().unwrap().attended);

        assert!(store.clear_timetable(day()).unwrap());
        assert!(store.lessons_for_date(day()).await.unwrap().is_empty());

        assert!(store.remove_lesson(id).unwrap());
        assert!(!store.set_attended(id, true).await.unwrap());
    }

    #[tokio::test]
    async fn test_fill_from_weekly_defaults() {
        let store = MemoryStore::new();
        store.set_timetable(TimeTable::standard(day())).unwrap();
        store
            .set_default_lesson(Weekday::Mon, WeekParity::Numerator, p(3), "Physics")
            .unwrap();
        store
            .set_default_lesson(Weekday::Mon, WeekParity::Numerator, p(1), "Math")
            .unwrap();
        store
            .set_default_lesson(Weekday::Mon, WeekParity::Denominator, p(2), "Art")
            .unwrap();
        store.add_lesson(day(), p(3), "Lab", None).unwrap();

        let added = store.fill_default_lessons(day()).unwrap();
        assert_eq!(added.len(), 1);
        let lessons = store.lessons_for_date(day()).await.unwrap();
        let names: Vec<&str> = lessons.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Math", "Lab"]);

        let next_monday = day() + chrono::Duration::days(7);
        let defaults = store.default_lessons_for(next_monday).unwrap();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].name, "Art");
        assert!(store
            .remove_default_lesson(Weekday::Mon, WeekParity::Denominator, p(2))
            .unwrap());
        assert!(store.fill_default_lessons(next_monday).unwrap().is_empty());
    }
}
