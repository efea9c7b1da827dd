//! Schedule data model and channel message types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{LessonBellError, Result};

/// Wall-clock format used for period times ("08:30").
pub const TIME_FORMAT: &str = "%H:%M";

/// Calendar date format used for lesson dates ("2026-10-19").
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse an `HH:MM` wall-clock time.
pub fn parse_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), TIME_FORMAT)
        .map_err(|e| LessonBellError::InvalidInput(format!("bad time '{value}': {e}")))
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|e| LessonBellError::InvalidInput(format!("bad date '{value}': {e}")))
}

// ─── Periods ──────────────────────────────────────────────

/// Ordinal slot of a school day (1..=4). Defines same-day ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Period(u8);

impl Period {
    /// Number of periods in a day.
    pub const COUNT: usize = 4;

    pub fn new(number: u8) -> Result<Self> {
        if (1..=Self::COUNT as u8).contains(&number) {
            Ok(Self(number))
        } else {
            Err(LessonBellError::InvalidInput(format!(
                "period must be 1..={}, got {number}",
                Self::COUNT
            )))
        }
    }

    /// All periods in ascending order.
    pub fn all() -> impl Iterator<Item = Period> {
        (1..=Self::COUNT as u8).map(Period)
    }

    pub fn number(self) -> u8 {
        self.0
    }

    fn index(self) -> usize {
        usize::from(self.0 - 1)
    }
}

impl TryFrom<u8> for Period {
    type Error = LessonBellError;

    fn try_from(value: u8) -> Result<Self> {
        Period::new(value)
    }
}

impl From<Period> for u8 {
    fn from(period: Period) -> u8 {
        period.0
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Start/end wall-clock pair of one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl PeriodSlot {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self> {
        if start >= end {
            return Err(LessonBellError::InvalidInput(format!(
                "period start {} must be before end {}",
                start.format(TIME_FORMAT),
                end.format(TIME_FORMAT)
            )));
        }
        Ok(Self { start, end })
    }

    /// Build from `HH:MM` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_time(start)?, parse_time(end)?)
    }
}

/// Per-date mapping of period → (start, end).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeTable {
    pub date: NaiveDate,
    slots: [Option<PeriodSlot>; Period::COUNT],
}

impl TimeTable {
    /// Empty time-table for `date`.
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            slots: [None; Period::COUNT],
        }
    }

    /// The usual bell schedule: 08:30, 10:20, 12:20 and 14:10 starts, 90 minutes each.
    pub fn standard(date: NaiveDate) -> Self {
        let mut table = Self::new(date);
        let bells = [
            (8, 30, 10, 0),
            (10, 20, 11, 50),
            (12, 20, 13, 50),
            (14, 10, 15, 40),
        ];
        for (period, (sh, sm, eh, em)) in Period::all().zip(bells) {
            table.slots[period.index()] = Some(PeriodSlot {
                start: NaiveTime::from_hms_opt(sh, sm, 0).unwrap_or_default(),
                end: NaiveTime::from_hms_opt(eh, em, 0).unwrap_or_default(),
            });
        }
        table
    }

    pub fn with_slot(mut self, period: Period, slot: PeriodSlot) -> Self {
        self.set_slot(period, slot);
        self
    }

    pub fn set_slot(&mut self, period: Period, slot: PeriodSlot) {
        self.slots[period.index()] = Some(slot);
    }

    pub fn slot(&self, period: Period) -> Option<PeriodSlot> {
        self.slots[period.index()]
    }

    /// Iterate over the periods that have times set.
    pub fn slots(&self) -> impl Iterator<Item = (Period, PeriodSlot)> + '_ {
        Period::all().filter_map(|p| self.slot(p).map(|s| (p, s)))
    }
}

// ─── Lessons ──────────────────────────────────────────────

/// Store-assigned lesson identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LessonId(pub i64);

impl fmt::Display for LessonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LessonId {
    type Err = LessonBellError;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<i64>()
            .map(LessonId)
            .map_err(|_| LessonBellError::InvalidInput(format!("bad lesson id '{s}'")))
    }
}

/// A stored lesson row, not yet resolved against a time-table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonRecord {
    pub id: LessonId,
    pub date: NaiveDate,
    pub period: Period,
    pub name: String,
    pub attended: bool,
    pub note: Option<String>,
}

impl LessonRecord {
    /// Resolve against the day's time-table. `None` when the table has no slot
    /// for this period or belongs to another date.
    pub fn resolve(&self, table: &TimeTable) -> Option<Lesson> {
        if table.date != self.date {
            return None;
        }
        let slot = table.slot(self.period)?;
        Some(Lesson {
            id: self.id,
            date: self.date,
            period: self.period,
            name: self.name.clone(),
            start: self.date.and_time(slot.start),
            end: self.date.and_time(slot.end),
            attended: self.attended,
            note: self.note.clone(),
        })
    }
}

/// Validate a lesson name before it is stored.
pub fn validate_lesson_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(LessonBellError::InvalidInput("lesson name is empty".into()));
    }
    Ok(trimmed.to_string())
}

/// One scheduled class occurrence with concrete start/end times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub date: NaiveDate,
    pub period: Period,
    pub name: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub attended: bool,
    pub note: Option<String>,
}

impl Lesson {
    /// Attended, or over by `now`.
    pub fn is_passed(&self, now: NaiveDateTime) -> bool {
        self.attended || now >= self.end
    }

    /// Same scheduled occurrence: date, period, name and resolved times match.
    /// The attendance flag is not part of the identity.
    pub fn same_occurrence(&self, other: &Lesson) -> bool {
        self.date == other.date
            && self.period == other.period
            && self.name == other.name
            && self.start == other.start
            && self.end == other.end
    }
}

// ─── Practice ─────────────────────────────────────────────

/// An internship/practice block spanning several days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Practice {
    pub id: i64,
    /// `true` while the practice is ongoing.
    pub active: bool,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub time_from: NaiveTime,
    pub time_to: NaiveTime,
}

impl Practice {
    /// Whether `date` falls inside this practice.
    pub fn covers(&self, date: NaiveDate) -> bool {
        if date < self.start_date {
            return false;
        }
        match self.end_date {
            Some(end) => date <= end,
            None => self.active,
        }
    }
}

// ─── Weekly defaults ──────────────────────────────────────

/// `num_days_from_ce` of 2020-10-12, the first numerator Monday.
const PARITY_ANCHOR_DAYS: i32 = 737_710;

/// Which of the two alternating weeks a date falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekParity {
    Numerator,
    Denominator,
}

impl WeekParity {
    /// Parity of the week containing `date`. Weeks start on Monday and
    /// alternate from 2020-10-12.
    pub fn of(date: NaiveDate) -> Self {
        let weeks = (date.num_days_from_ce() - PARITY_ANCHOR_DAYS).div_euclid(7);
        if weeks.rem_euclid(2) == 0 {
            Self::Numerator
        } else {
            Self::Denominator
        }
    }

    /// Stored form: 0 for numerator, 1 for denominator.
    pub fn index(self) -> u8 {
        match self {
            Self::Numerator => 0,
            Self::Denominator => 1,
        }
    }

    pub fn from_index(index: i64) -> Result<Self> {
        match index {
            0 => Ok(Self::Numerator),
            1 => Ok(Self::Denominator),
            other => Err(LessonBellError::InvalidInput(format!(
                "week parity must be 0 or 1, got {other}"
            ))),
        }
    }
}

/// Shorthand for [`WeekParity::of`].
pub fn week_parity(date: NaiveDate) -> WeekParity {
    WeekParity::of(date)
}

impl fmt::Display for WeekParity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Numerator => "numerator",
            Self::Denominator => "denominator",
        })
    }
}

impl FromStr for WeekParity {
    type Err = LessonBellError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "numerator" | "num" | "n" | "0" => Ok(Self::Numerator),
            "denominator" | "den" | "d" | "1" => Ok(Self::Denominator),
            other => Err(LessonBellError::InvalidInput(format!(
                "unknown week '{other}', expected numerator or denominator"
            ))),
        }
    }
}

/// A lesson of the weekly schedule, copied into concrete dates on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultLesson {
    pub weekday: Weekday,
    pub parity: WeekParity,
    pub period: Period,
    pub name: String,
}

impl DefaultLesson {
    /// Whether this entry applies to `date`.
    pub fn applies_to(&self, date: NaiveDate) -> bool {
        date.weekday() == self.weekday && WeekParity::of(date) == self.parity
    }
}

// ─── Channel messages ─────────────────────────────────────

/// Inline action attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    pub label: String,
    /// Opaque data echoed back when the button is pressed.
    pub data: String,
}

/// A message to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub thread_id: String,
    pub content: String,
    #[serde(default)]
    pub buttons: Vec<InlineButton>,
}

impl OutgoingMessage {
    pub fn text(thread_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            content: content.into(),
            buttons: Vec::new(),
        }
    }

    pub fn with_buttons(mut self, buttons: Vec<InlineButton>) -> Self {
        self.buttons = buttons;
        self
    }
}

/// What kind of update an incoming message is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncomingKind {
    /// Plain text typed by the user.
    Text,
    /// Inline button press; `content` holds the button data.
    Callback {
        query_id: String,
        message_id: Option<i64>,
    },
}

/// A message received from a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub channel: String,
    pub thread_id: String,
    pub sender_id: String,
    pub sender_name: Option<String>,
    pub content: String,
    pub kind: IncomingKind,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn record(period: u8, attended: bool) -> LessonRecord {
        LessonRecord {
            id: LessonId(1),
            date: date(),
            period: Period::new(period).unwrap(),
            name: "Math".into(),
            attended,
            note: None,
        }
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        date().and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_period_bounds() {
        assert!(Period::new(0).is_err());
        assert!(Period::new(5).is_err());
        assert_eq!(Period::new(4).unwrap().number(), 4);
        assert_eq!(Period::all().count(), 4);
    }

    #[test]
    fn test_slot_rejects_inverted_times() {
        assert!(PeriodSlot::parse("10:00", "08:30").is_err());
        assert!(PeriodSlot::parse("08:30", "08:30").is_err());
        assert!(PeriodSlot::parse("8:30", "10:00").is_ok());
        assert!(PeriodSlot::parse("half past eight", "10:00").is_err());
    }

    #[test]
    fn test_standard_timetable() {
        let table = TimeTable::standard(date());
        let first = table.slot(Period::new(1).unwrap()).unwrap();
        assert_eq!(first.start.format(TIME_FORMAT).to_string(), "08:30");
        let last = table.slot(Period::new(4).unwrap()).unwrap();
        assert_eq!(last.end.format(TIME_FORMAT).to_string(), "15:40");
        assert_eq!(table.slots().count(), 4);
    }

    #[test]
    fn test_resolve_needs_slot_and_date() {
        let table = TimeTable::new(date())
            .with_slot(Period::new(2).unwrap(), PeriodSlot::parse("10:20", "11:50").unwrap());
        assert!(record(1, false).resolve(&table).is_none());
        let lesson = record(2, false).resolve(&table).unwrap();
        assert_eq!(lesson.start, at(10, 20));
        assert_eq!(lesson.end, at(11, 50));

        let other_day = TimeTable::standard(date().succ_opt().unwrap());
        assert!(record(2, false).resolve(&other_day).is_none());
    }

    #[test]
    fn test_passed_predicate() {
        let table = TimeTable::standard(date());
        let lesson = record(1, false).resolve(&table).unwrap();
        // not started
        assert!(!lesson.is_passed(at(8, 0)));
        // in progress
        assert!(!lesson.is_passed(at(9, 0)));
        // exactly at end
        assert!(lesson.is_passed(at(10, 0)));
        assert!(lesson.is_passed(at(11, 0)));

        let attended = record(1, true).resolve(&table).unwrap();
        assert!(attended.is_passed(at(8, 0)));
    }

    #[test]
    fn test_same_occurrence_ignores_attendance() {
        let table = TimeTable::standard(date());
        let a = record(1, false).resolve(&table).unwrap();
        let b = record(1, true).resolve(&table).unwrap();
        assert!(a.same_occurrence(&b));

        let moved = TimeTable::new(date())
            .with_slot(Period::new(1).unwrap(), PeriodSlot::parse("09:00", "10:30").unwrap());
        let c = record(1, false).resolve(&moved).unwrap();
        assert!(!a.same_occurrence(&c));
    }

    #[test]
    fn test_practice_covers() {
        let practice = Practice {
            id: 1,
            active: true,
            start_date: date(),
            end_date: None,
            time_from: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            time_to: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
        };
        assert!(practice.covers(date()));
        assert!(!practice.covers(date().pred_opt().unwrap()));

        let ended = Practice {
            active: false,
            end_date: date().succ_opt(),
            ..practice
        };
        assert!(ended.covers(date().succ_opt().unwrap()));
        assert!(!ended.covers(date() + chrono::Duration::days(2)));
    }

    #[test]
    fn test_period_serde_validates() {
        let ok: Period = serde_json::from_str("3").unwrap();
        assert_eq!(ok.number(), 3);
        assert!(serde_json::from_str::<Period>("7").is_err());
    }

    #[test]
    fn test_week_parity_alternates_from_anchor() {
        let anchor = NaiveDate::from_ymd_opt(2020, 10, 12).unwrap();
        assert_eq!(week_parity(anchor), WeekParity::Numerator);
        assert_eq!(week_parity(anchor + chrono::Duration::days(6)), WeekParity::Numerator);
        assert_eq!(week_parity(anchor + chrono::Duration::days(7)), WeekParity::Denominator);
        assert_eq!(week_parity(anchor + chrono::Duration::days(14)), WeekParity::Numerator);
        // the Sunday before the anchor closes a denominator week
        assert_eq!(week_parity(anchor.pred_opt().unwrap()), WeekParity::Denominator);

        assert_eq!(week_parity(date()), WeekParity::Numerator);
        assert_eq!(week_parity(date() + chrono::Duration::days(7)), WeekParity::Denominator);
    }

    #[test]
    fn test_week_parity_parse_and_index() {
        assert_eq!("numerator".parse::<WeekParity>().unwrap(), WeekParity::Numerator);
        assert_eq!("D".parse::<WeekParity>().unwrap(), WeekParity::Denominator);
        assert!("odd".parse::<WeekParity>().is_err());
        for parity in [WeekParity::Numerator, WeekParity::Denominator] {
            assert_eq!(WeekParity::from_index(parity.index() as i64).unwrap(), parity);
        }
        assert!(WeekParity::from_index(2).is_err());
    }

    #[test]
    fn test_default_lesson_applies_to() {
        let entry = DefaultLesson {
            weekday: Weekday::Mon,
            parity: WeekParity::Numerator,
            period: Period::new(1).unwrap(),
            name: "Math".into(),
        };
        assert!(entry.applies_to(date()));
        assert!(!entry.applies_to(date() + chrono::Duration::days(7)));
        assert!(!entry.applies_to(date().succ_opt().unwrap()));
    }
}
