//! Which of today's lessons still need announcing, and in what order.

use chrono::NaiveDateTime;
use lessonbell_core::types::Lesson;

/// Lessons that are neither attended nor over at `now`, in period order.
pub fn upcoming(lessons: Vec<Lesson>, now: NaiveDateTime) -> Vec<Lesson> {
    let mut queue: Vec<Lesson> = lessons.into_iter().filter(|l| !l.is_passed(now)).collect();
    queue.sort_by_key(|l| l.period);
    queue
}

/// Whether `lesson` is still part of a freshly read day.
pub fn still_scheduled(lesson: &Lesson, day: &[Lesson]) -> bool {
    day.iter().any(|l| l.same_occurrence(lesson))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use lessonbell_core::types::{LessonId, LessonRecord, Period, TimeTable};

    fn lesson(id: i64, period: u8, name: &str) -> Lesson {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        LessonRecord {
            id: LessonId(id),
            date,
            period: Period::new(period).unwrap(),
            name: name.into(),
            attended: false,
            note: None,
        }
        .resolve(&TimeTable::standard(date))
        .unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_orders_by_period_not_insertion() {
        let queue = upcoming(
            vec![lesson(1, 3, "Physics"), lesson(2, 1, "Math"), lesson(3, 2, "Art")],
            at(7, 0),
        );
        let names: Vec<&str> = queue.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Math", "Art", "Physics"]);
    }

    #[test]
    fn test_drops_finished_and_attended() {
        let mut attended = lesson(3, 3, "Physics");
        attended.attended = true;
        let day = vec![lesson(1, 1, "Math"), lesson(2, 2, "Art"), attended];
        let end_of_first = day[0].end;

        let queue = upcoming(day, end_of_first);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].name, "Art");
    }

    #[test]
    fn test_in_progress_lesson_is_upcoming() {
        let math = lesson(1, 1, "Math");
        let mid = math.start + (math.end - math.start) / 2;
        assert_eq!(upcoming(vec![math], mid).len(), 1);
    }

    #[test]
    fn test_still_scheduled_checks_identity() {
        let math = lesson(1, 1, "Math");
        assert!(still_scheduled(&math, &[lesson(2, 2, "Art"), math.clone()]));
        let mut renamed = math.clone();
        renamed.name = "Algebra".into();
        assert!(!still_scheduled(&math, &[renamed]));
        assert!(!still_scheduled(&math, &[]));
    }
}
