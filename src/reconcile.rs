use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset, NaiveDate};

use crate::models::{Lesson, ScheduleDay};
use crate::semester;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub week_index: usize,
    pub day: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub ordered_days: Vec<ScheduleDay>,
    pub weeks: Vec<i32>,
    /// `None` when no day falls in the current semester.
    pub selection: Option<Selection>,
}

impl Reconciled {
    pub fn selected_day_index(&self) -> Option<usize> {
        let selection = self.selection?;
        self.ordered_days
            .iter()
            .position(|day| day.date() == selection.day)
    }
}

/// `now` must already be in the university's timezone.
pub fn reconcile(raw_days: Vec<ScheduleDay>, now: DateTime<FixedOffset>) -> Reconciled {
    let today = now.date_naive();

    let mut ordered_days: Vec<ScheduleDay> = raw_days
        .into_iter()
        .filter(|day| semester::is_current_semester(day.date(), today))
        .collect();
    ordered_days.sort_by_key(|day| day.date());

    for day in ordered_days.iter_mut() {
        sort_lessons(&mut day.lessons);
    }

    let mut weeks: Vec<i32> = ordered_days.iter().map(|day| day.week_number()).collect();
    weeks.sort_unstable();
    weeks.dedup();

    let selected = ordered_days
        .iter()
        .find(|day| day.date() == today)
        .or_else(|| ordered_days.iter().find(|day| day.date() > today))
        .or_else(|| ordered_days.last());

    let selection = selected.and_then(|day| {
        let week_index = weeks.iter().position(|week| *week == day.week_number())?;
        Some(Selection {
            week_index,
            day: day.date(),
        })
    });

    Reconciled {
        ordered_days,
        weeks,
        selection,
    }
}

/// Timed lessons by start time, then untimed ones by name.
pub fn sort_lessons(lessons: &mut [Lesson]) {
    lessons.sort_by(compare_lessons);
}

pub fn compare_lessons(a: &Lesson, b: &Lesson) -> Ordering {
    match (a.start_time(), b.start_time()) {
        (Some(left), Some(right)) => left.cmp(right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.lesson_name.cmp(&b.lesson_name),
    }
}

pub fn week_days(ordered_days: &[ScheduleDay], week: i32) -> Vec<&ScheduleDay> {
    ordered_days
        .iter()
        .filter(|day| day.week_number() == week)
        .collect()
}
