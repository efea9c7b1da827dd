//! Human-readable durations ("1 hour, 2 minutes and 3 seconds").

use chrono::TimeDelta;
use lessonbell_core::config::Locale;

#[derive(Clone, Copy)]
enum Unit {
    Hour,
    Minute,
    Second,
}

/// Render a duration in the given locale, rounded to the nearest second.
///
/// Only non-zero units are listed; negative durations render as zero.
pub fn humanize(duration: TimeDelta, locale: Locale) -> String {
    let millis = duration.num_milliseconds().max(0);
    let total = (millis + 500) / 1000;
    let parts: Vec<String> = [
        (total / 3600, Unit::Hour),
        (total % 3600 / 60, Unit::Minute),
        (total % 60, Unit::Second),
    ]
    .into_iter()
    .filter(|(n, _)| *n > 0)
    .map(|(n, unit)| format!("{n} {}", unit_word(n, unit, locale)))
    .collect();

    if parts.is_empty() {
        return format!("0 {}", unit_word(0, Unit::Second, locale));
    }
    join(&parts, locale)
}

fn join(parts: &[String], locale: Locale) -> String {
    let and = match locale {
        Locale::En => "and",
        Locale::Ru => "и",
    };
    match parts {
        [only] => only.clone(),
        [init @ .., last] => format!("{} {and} {last}", init.join(", ")),
        [] => String::new(),
    }
}

fn unit_word(n: i64, unit: Unit, locale: Locale) -> &'static str {
    match locale {
        Locale::En => match (unit, n == 1) {
            (Unit::Hour, true) => "hour",
            (Unit::Hour, false) => "hours",
            (Unit::Minute, true) => "minute",
            (Unit::Minute, false) => "minutes",
            (Unit::Second, true) => "second",
            (Unit::Second, false) => "seconds",
        },
        Locale::Ru => {
            let [one, few, many] = match unit {
                Unit::Hour => ["час", "часа", "часов"],
                Unit::Minute => ["минута", "минуты", "минут"],
                Unit::Second => ["секунда", "секунды", "секунд"],
            };
            match (n % 10, n % 100) {
                (1, r) if r != 11 => one,
                (2..=4, r) if !(12..=14).contains(&r) => few,
                _ => many,
            }
        }
    }
}
