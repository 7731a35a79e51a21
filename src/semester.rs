use chrono::{Datelike, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    Spring,
    Fall,
}

pub fn season_of(date: NaiveDate) -> Season {
    match date.month() {
        1..=8 => Season::Spring,
        _ => Season::Fall,
    }
}

/// Compares season only; a fall date from any year is "current" during fall.
pub fn is_current_semester(date: NaiveDate, today: NaiveDate) -> bool {
    season_of(date) == season_of(today)
}

/// Calendar year in which the academic year containing `today` started.
pub fn academic_year(today: NaiveDate) -> i32 {
    if today.month() >= 9 {
        today.year()
    } else {
        today.year() - 1
    }
}

pub fn in_academic_year(date: NaiveDate, academic_year: i32) -> bool {
    if date.month() >= 9 {
        date.year() == academic_year
    } else {
        date.year() == academic_year + 1
    }
}
