//! Notification texts and the in-memory record of what was sent.

use std::collections::VecDeque;

use chrono::TimeDelta;
use lessonbell_core::config::Locale;
use lessonbell_core::types::{Lesson, LessonId, Period};
use serde::{Deserialize, Serialize};

use crate::humanize::humanize;

/// Notifications kept in [`NotifyHistory`].
const HISTORY_LIMIT: usize = 100;

/// Which lifecycle point a notification announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    FirstAlert,
    SecondAlert,
    Started,
    Ended,
}

/// A notification the tracker tried to deliver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub lesson_id: LessonId,
    pub lesson_name: String,
    pub text: String,
    /// Whether the channel accepted it within the send timeout.
    pub delivered: bool,
    /// Local wall time of the attempt, as read from the tracker clock.
    pub timestamp: chrono::NaiveDateTime,
}

/// Ring buffer of the latest notifications.
#[derive(Debug, Default)]
pub struct NotifyHistory {
    entries: VecDeque<Notification>,
}

impl NotifyHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a notification, dropping the oldest past the limit.
    pub fn record(&mut self, notification: Notification) {
        self.entries.push_back(notification);
        while self.entries.len() > HISTORY_LIMIT {
            self.entries.pop_front();
        }
    }

    /// Oldest first.
    pub fn entries(&self) -> Vec<Notification> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Escape Telegram Markdown control characters in user-provided text.
pub fn escape_markdown(s: &str) -> String {
    s.replace('_', "\\_")
        .replace('*', "\\*")
        .replace('[', "\\[")
        .replace('`', "\\`")
}

const PRAISE_EN: &[&str] = &[
    "Well done!",
    "Great job!",
    "Nice, keep it up!",
    "Attendance noted, good work!",
];
const PRAISE_RU: &[&str] = &["Молодец!", "Отлично!", "Так держать!", "Умница!"];
const REMARKS_EN: &[&str] = &[
    "That's a shame.",
    "Try not to miss the next one.",
    "Noted. Catch up on the material!",
];
const REMARKS_RU: &[&str] = &[
    "Жаль.",
    "Постарайся не пропускать следующую.",
    "Понятно. Не забудь нагнать материал!",
];

/// Localised message texts.
#[derive(Debug, Clone, Copy, Default)]
pub struct Messages {
    locale: Locale,
}

impl Messages {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    fn heading(&self, lesson: &Lesson) -> String {
        let name = escape_markdown(&lesson.name);
        match self.locale {
            Locale::En => format!("{} period: *{name}*", ordinal_en(lesson.period)),
            Locale::Ru => format!("{} пара: *{name}*", lesson.period),
        }
    }

    /// First and second "starts in" alerts. The second one is emphasised.
    pub fn starts_in(&self, lesson: &Lesson, remaining: TimeDelta, urgent: bool) -> String {
        let when = humanize(remaining, self.locale);
        let mark = if urgent { "!" } else { "" };
        match self.locale {
            Locale::En => format!("{} starts in *{when}*{mark}", self.heading(lesson)),
            Locale::Ru => format!("{}, начнётся *через {when}*{mark}", self.heading(lesson)),
        }
    }

    pub fn started(&self, lesson: &Lesson, until_end: TimeDelta) -> String {
        let when = humanize(until_end, self.locale);
        match self.locale {
            Locale::En => format!("{} has started and ends in *{when}*.", self.heading(lesson)),
            Locale::Ru => format!("{}, началась и закончится *через {when}*.", self.heading(lesson)),
        }
    }

    pub fn ended(&self, lesson: &Lesson) -> String {
        match self.locale {
            Locale::En => format!("{} - _has ended!_ Were you there?", self.heading(lesson)),
            Locale::Ru => format!("{} - _закончилась!_ Ты был(а) на паре?", self.heading(lesson)),
        }
    }

    /// Labels of the confirm and deny buttons under an ended notice.
    pub fn ack_labels(&self) -> (&'static str, &'static str) {
        match self.locale {
            Locale::En => ("I was there!", "I wasn't."),
            Locale::Ru => ("Я был(а)!", "Меня не было."),
        }
    }

    /// Status reply while a lesson is still ahead.
    pub fn until_start(&self, lesson: &Lesson, remaining: TimeDelta) -> String {
        let when = humanize(remaining, self.locale);
        let name = escape_markdown(&lesson.name);
        match self.locale {
            Locale::En => format!(
                "*{when}* until the {} period (*{name}*) starts.",
                ordinal_en(lesson.period)
            ),
            Locale::Ru => format!(
                "До начала {} пары (*{name}*) осталось *{when}*.",
                ordinal_ru_genitive(lesson.period)
            ),
        }
    }

    /// Status reply while a lesson is in progress.
    pub fn until_end(&self, lesson: &Lesson, remaining: TimeDelta) -> String {
        let when = humanize(remaining, self.locale);
        let name = escape_markdown(&lesson.name);
        match self.locale {
            Locale::En => format!(
                "*{when}* until the {} period (*{name}*) ends.",
                ordinal_en(lesson.period)
            ),
            Locale::Ru => format!(
                "До конца {} пары (*{name}*) осталось *{when}*.",
                ordinal_ru_genitive(lesson.period)
            ),
        }
    }

    pub fn no_lessons(&self) -> &'static str {
        match self.locale {
            Locale::En => "No lessons left today.",
            Locale::Ru => "На сегодня пар больше нет.",
        }
    }

    pub fn timer_enabled(&self) -> &'static str {
        match self.locale {
            Locale::En => "Lesson notifications are on.",
            Locale::Ru => "Уведомления о парах включены.",
        }
    }

    pub fn timer_disabled(&self) -> &'static str {
        match self.locale {
            Locale::En => "Lesson notifications are off.",
            Locale::Ru => "Уведомления о парах выключены.",
        }
    }

    pub fn timer_already_disabled(&self) -> &'static str {
        match self.locale {
            Locale::En => "Lesson notifications are already off.",
            Locale::Ru => "Уведомления о парах уже выключены.",
        }
    }

    pub fn already_recorded(&self) -> &'static str {
        match self.locale {
            Locale::En => "Attendance for this lesson is already recorded.",
            Locale::Ru => "Посещение этой пары уже отмечено.",
        }
    }

    pub fn unknown_lesson(&self) -> &'static str {
        match self.locale {
            Locale::En => "This lesson no longer exists.",
            Locale::Ru => "Этой пары больше нет в расписании.",
        }
    }

    pub fn something_wrong(&self) -> &'static str {
        match self.locale {
            Locale::En => "Something went wrong.",
            Locale::Ru => "Что-то пошло не так.",
        }
    }

    /// Replies to a confirmed visit.
    pub fn praise(&self) -> &'static [&'static str] {
        match self.locale {
            Locale::En => PRAISE_EN,
            Locale::Ru => PRAISE_RU,
        }
    }

    /// Replies to a denied visit.
    pub fn remarks(&self) -> &'static [&'static str] {
        match self.locale {
            Locale::En => REMARKS_EN,
            Locale::Ru => REMARKS_RU,
        }
    }
}

fn ordinal_en(period: Period) -> &'static str {
    match period.number() {
        1 => "1st",
        2 => "2nd",
        3 => "3rd",
        _ => "4th",
    }
}

/// "1-ой", "2-ой", "3-ей", "4-ой".
fn ordinal_ru_genitive(period: Period) -> String {
    let n = period.number();
    let suffix = if n == 3 { "ей" } else { "ой" };
    format!("{n}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use lessonbell_core::types::{LessonRecord, TimeTable};

    fn lesson(period: u8, name: &str) -> Lesson {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        LessonRecord {
            id: LessonId(1),
            date,
            period: Period::new(period).unwrap(),
            name: name.into(),
            attended: false,
            note: None,
        }
        .resolve(&TimeTable::standard(date))
        .unwrap()
    }

    fn notification(n: usize) -> Notification {
        Notification {
            kind: NotificationKind::FirstAlert,
            lesson_id: LessonId(n as i64),
            lesson_name: format!("L{n}"),
            text: String::new(),
            delivered: true,
            timestamp: chrono::NaiveDateTime::default(),
        }
    }

    #[test]
    fn test_english_templates() {
        let m = Messages::new(Locale::En);
        let math = lesson(1, "Math");
        assert_eq!(
            m.starts_in(&math, TimeDelta::minutes(10), false),
            "1st period: *Math* starts in *10 minutes*"
        );
        assert_eq!(
            m.starts_in(&math, TimeDelta::minutes(2), true),
            "1st period: *Math* starts in *2 minutes*!"
        );
        assert_eq!(
            m.started(&math, TimeDelta::minutes(90)),
            "1st period: *Math* has started and ends in *1 hour and 30 minutes*."
        );
        assert!(m.ended(&math).contains("has ended"));
    }

    #[test]
    fn test_russian_templates() {
        let m = Messages::new(Locale::Ru);
        let physics = lesson(3, "Физика");
        assert_eq!(
            m.starts_in(&physics, TimeDelta::minutes(10), false),
            "3 пара: *Физика*, начнётся *через 10 минут*"
        );
        assert_eq!(
            m.until_start(&physics, TimeDelta::minutes(2)),
            "До начала 3-ей пары (*Физика*) осталось *2 минуты*."
        );
        assert!(m.until_end(&lesson(2, "Химия"), TimeDelta::minutes(1)).contains("2-ой"));
    }

    #[test]
    fn test_names_are_escaped() {
        let m = Messages::new(Locale::En);
        let text = m.ended(&lesson(2, "Data_Science*"));
        assert!(text.contains("Data\\_Science\\*"));
    }

    #[test]
    fn test_history_ring_buffer() {
        let mut history = NotifyHistory::new();
        assert!(history.is_empty());
        for n in 0..150 {
            history.record(notification(n));
        }
        assert_eq!(history.len(), HISTORY_LIMIT);
        let entries = history.entries();
        assert_eq!(entries[0].lesson_id, LessonId(50));
        assert_eq!(entries[HISTORY_LIMIT - 1].lesson_id, LessonId(149));
    }
}
