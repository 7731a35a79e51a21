use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate};

use crate::models::{Lesson, LessonType, ScheduleDay};
use crate::reconcile;
use crate::semester;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayOffset {
    Today,
    Tomorrow,
    DayAfter,
}

impl DayOffset {
    pub const ALL: [DayOffset; 3] = [DayOffset::Today, DayOffset::Tomorrow, DayOffset::DayAfter];

    pub fn days(self) -> i64 {
        match self {
            DayOffset::Today => 0,
            DayOffset::Tomorrow => 1,
            DayOffset::DayAfter => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DayOffset::Today => "Today",
            DayOffset::Tomorrow => "Tomorrow",
            DayOffset::DayAfter => "Day after tomorrow",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DayPlan {
    pub offset: DayOffset,
    pub date: NaiveDate,
    pub lessons: Vec<Lesson>,
}

#[derive(Debug, Clone)]
pub struct Exam {
    pub date: NaiveDate,
    pub lesson: Lesson,
}

#[derive(Debug, Clone)]
pub struct Overview {
    pub days: Vec<DayPlan>,
    pub upcoming_exams: Vec<Exam>,
}

pub fn build_overview(raw_days: &[ScheduleDay], now: DateTime<FixedOffset>) -> Overview {
    let today = now.date_naive();
    let academic_year = semester::academic_year(today);

    let days = DayOffset::ALL
        .into_iter()
        .map(|offset| {
            let target = today + Duration::days(offset.days());
            let mut lessons = raw_days
                .iter()
                .find(|day| {
                    let date = day.date();
                    semester::in_academic_year(date, academic_year)
                        && date.month() == target.month()
                        && date.day() == target.day()
                })
                .map(|day| day.lessons.clone())
                .unwrap_or_default();
            reconcile::sort_lessons(&mut lessons);
            DayPlan {
                offset,
                date: target,
                lessons,
            }
        })
        .collect();

    let mut upcoming_exams: Vec<Exam> = raw_days
        .iter()
        .filter(|day| day.date() >= today)
        .flat_map(|day| {
            day.lessons
                .iter()
                .filter(|lesson| lesson.lesson_type == LessonType::Exam)
                .map(|lesson| Exam {
                    date: day.date(),
                    lesson: lesson.clone(),
                })
        })
        .collect();
    upcoming_exams.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| reconcile::compare_lessons(&a.lesson, &b.lesson))
    });

    Overview {
        days,
        upcoming_exams,
    }
}
