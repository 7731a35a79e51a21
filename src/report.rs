use std::fmt::Write;

use crate::grades::{self, GradeStats};
use crate::models::{Department, Lesson, Mark};
use crate::overview::Overview;
use crate::reconcile::{self, Reconciled, Selection};
use crate::scroll::Pager;

fn week_label(week: i32) -> String {
    if week > 0 {
        format!("Week {week}")
    } else {
        "Exam session".to_string()
    }
}

fn write_lesson(output: &mut String, lesson: &Lesson) {
    let time = match (lesson.start_time(), lesson.end_time()) {
        (Some(start), Some(end)) => format!("{start}-{end}"),
        (Some(start), None) => start.to_string(),
        _ => "all day".to_string(),
    };
    let mut details = Vec::new();
    let label = lesson.lesson_type.label();
    if !label.is_empty() {
        details.push(label.to_string());
    }
    if let Some(auditory) = &lesson.auditory_name {
        details.push(auditory.clone());
    }
    if let Some(teacher) = &lesson.teacher_name {
        details.push(teacher.clone());
    }
    if lesson.is_distant {
        details.push("distant".to_string());
    }

    if details.is_empty() {
        let _ = writeln!(output, "- {time} {}", lesson.lesson_name);
    } else {
        let _ = writeln!(
            output,
            "- {time} {} ({})",
            lesson.lesson_name,
            details.join(", ")
        );
    }
}

/// `selection` may differ from the reconciled one once the user has paged.
pub fn build_schedule_report(
    group: &str,
    reconciled: &Reconciled,
    selection: Option<Selection>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Schedule for {group}");

    let Some((selection, week)) = selection.and_then(|selection| {
        let week = *reconciled.weeks.get(selection.week_index)?;
        Some((selection, week))
    }) else {
        let _ = writeln!(output, "No schedule data for the current semester.");
        return output;
    };

    let weeks: Vec<String> = reconciled
        .weeks
        .iter()
        .enumerate()
        .map(|(index, week)| {
            if index == selection.week_index {
                format!("[{}]", week_label(*week))
            } else {
                week_label(*week)
            }
        })
        .collect();
    let _ = writeln!(output, "{}", weeks.join(" | "));
    let _ = writeln!(output);

    for day in reconcile::week_days(&reconciled.ordered_days, week) {
        let marker = if day.date() == selection.day { " (selected)" } else { "" };
        let _ = writeln!(output, "## {}{marker}", day.date().format("%A, %-d %B %Y"));

        if day.lessons.is_empty() {
            let _ = writeln!(output, "No lessons.");
        }
        for lesson in day.lessons.iter() {
            write_lesson(&mut output, lesson);
        }
        let _ = writeln!(output);
    }

    output
}

/// Final position of each pager after a batch of scroll commands.
pub fn build_pager_report(commands: &[(Pager, f64)]) -> String {
    let mut output = String::new();

    for pager in [Pager::Week, Pager::Day] {
        let last = commands.iter().rev().find(|(target, _)| *target == pager);
        if let Some((_, offset_x)) = last {
            let name = match pager {
                Pager::Week => "Week",
                Pager::Day => "Day",
            };
            let _ = writeln!(output, "{name} pager at {offset_x:.0}px");
        }
    }

    output
}

pub fn build_overview_report(first_name: &str, overview: &Overview) -> String {
    let mut output = String::new();

    if first_name.is_empty() {
        let _ = writeln!(output, "# Hello");
    } else {
        let _ = writeln!(output, "# Hello, {first_name}");
    }

    for plan in overview.days.iter() {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "## {} ({})",
            plan.offset.label(),
            plan.date.format("%A, %-d %B")
        );
        if plan.lessons.is_empty() {
            let _ = writeln!(output, "No lessons.");
        }
        for lesson in plan.lessons.iter() {
            write_lesson(&mut output, lesson);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Upcoming exams");
    if overview.upcoming_exams.is_empty() {
        let _ = writeln!(output, "No exams scheduled.");
    }
    for exam in overview.upcoming_exams.iter() {
        let _ = writeln!(output, "- {} {}", exam.date, exam.lesson.lesson_name);
    }

    output
}

pub fn build_marks_report(marks: &[Mark], stats: &GradeStats, semester: i32) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Grades");
    match stats.average {
        Some(average) => {
            let _ = writeln!(output, "Average grade overall: {average:.2}");
        }
        None => {
            let _ = writeln!(output, "Average grade overall: -");
        }
    }
    if let Some(last) = stats.last_semester {
        let _ = writeln!(
            output,
            "Semester {last}: {} completed, {} debts",
            stats.completed_count, stats.debts_count
        );
    }

    let available: Vec<String> = grades::semesters(marks)
        .iter()
        .map(|s| s.to_string())
        .collect();
    let _ = writeln!(output, "Semesters: {}", available.join(", "));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Semester {semester}");

    let listed = grades::semester_marks(marks, semester);
    if listed.is_empty() {
        let _ = writeln!(output, "No marks recorded for this semester.");
    }
    for mark in listed {
        let _ = writeln!(
            output,
            "- {}: {} ({})",
            mark.lesson_name,
            grades::mark_display(mark),
            mark.control_type_name
        );
    }

    output
}

pub fn build_groups_report(departments: &[Department]) -> String {
    let mut output = String::new();

    if departments.is_empty() {
        let _ = writeln!(output, "No groups match.");
        return output;
    }
    for department in departments {
        let _ = writeln!(output, "## {}", department.name);
        let _ = writeln!(output, "{}", department.groups.join(", "));
    }

    output
}
