use std::cmp::Ordering;

use crate::models::Mark;

#[derive(Debug, Clone, PartialEq)]
pub struct GradeStats {
    /// Mean of all numeric marks; pass/fail entries (mark 0) do not count.
    pub average: Option<f64>,
    pub last_semester: Option<i32>,
    pub completed_count: usize,
    pub debts_count: usize,
}

pub fn grade_stats(marks: &[Mark]) -> GradeStats {
    let numeric: Vec<i32> = marks.iter().map(|m| m.mark).filter(|m| *m > 0).collect();
    let average = if numeric.is_empty() {
        None
    } else {
        Some(numeric.iter().sum::<i32>() as f64 / numeric.len() as f64)
    };

    let last_semester = marks.iter().map(|m| m.semester).max();
    let (debts, completed): (Vec<&Mark>, Vec<&Mark>) = marks
        .iter()
        .filter(|m| Some(m.semester) == last_semester)
        .partition(|m| m.has_debt != 0);

    GradeStats {
        average,
        last_semester,
        completed_count: completed.len(),
        debts_count: debts.len(),
    }
}

/// Distinct semesters, latest first.
pub fn semesters(marks: &[Mark]) -> Vec<i32> {
    let mut values: Vec<i32> = marks.iter().map(|m| m.semester).collect();
    values.sort_unstable_by(|a, b| b.cmp(a));
    values.dedup();
    values
}

/// Ungraded entries first, then highest mark first.
pub fn semester_marks(marks: &[Mark], semester: i32) -> Vec<&Mark> {
    let mut selected: Vec<&Mark> = marks.iter().filter(|m| m.semester == semester).collect();
    selected.sort_by(|a, b| match (&a.mark_name, &b.mark_name) {
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => b.mark.cmp(&a.mark),
    });
    selected
}

pub fn mark_display(mark: &Mark) -> String {
    match (&mark.mark_name, mark.mark) {
        (None, _) => "-".to_string(),
        (Some(_), 0) => "pass".to_string(),
        (Some(_), value) if value > 0 => value.to_string(),
        _ => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mark(semester: i32, value: i32, name: Option<&str>, has_debt: i32) -> Mark {
        Mark {
            in_diplom: 0,
            mark_name: name.map(str::to_string),
            mark: value,
            semester,
            control_type_name: "Exam".to_string(),
            years: "2024-2025".to_string(),
            course: 2,
            lesson_name: format!("Subject {semester}-{value}"),
            credit_unit: 4.0,
            has_debt,
        }
    }

    #[test]
    fn stats_cover_numeric_marks_and_last_semester() {
        let marks = vec![
            mark(1, 5, Some("excellent"), 0),
            mark(1, 4, Some("good"), 0),
            mark(2, 0, Some("pass"), 0),
            mark(2, 3, Some("satisfactory"), 0),
            mark(2, 0, None, 1),
        ];
        let stats = grade_stats(&marks);

        assert!((stats.average.unwrap() - 4.0).abs() < 0.001);
        assert_eq!(stats.last_semester, Some(2));
        assert_eq!(stats.completed_count, 2);
        assert_eq!(stats.debts_count, 1);
    }

    #[test]
    fn stats_without_marks() {
        let stats = grade_stats(&[]);
        assert_eq!(stats.average, None);
        assert_eq!(stats.last_semester, None);
        assert_eq!(stats.completed_count, 0);
    }

    #[test]
    fn semesters_latest_first() {
        let marks = vec![mark(1, 5, Some("a"), 0), mark(3, 4, Some("b"), 0), mark(1, 3, Some("c"), 0)];
        assert_eq!(semesters(&marks), vec![3, 1]);
    }

    #[test]
    fn semester_listing_puts_ungraded_first() {
        let marks = vec![
            mark(1, 3, Some("c"), 0),
            mark(1, 0, None, 0),
            mark(1, 5, Some("a"), 0),
            mark(2, 5, Some("other"), 0),
        ];
        let listed: Vec<i32> = semester_marks(&marks, 1).iter().map(|m| m.mark).collect();
        assert_eq!(listed, vec![0, 5, 3]);
    }

    #[test]
    fn display_variants() {
        assert_eq!(mark_display(&mark(1, 0, None, 0)), "-");
        assert_eq!(mark_display(&mark(1, 0, Some("pass"), 0)), "pass");
        assert_eq!(mark_display(&mark(1, 4, Some("good"), 0)), "4");
        assert_eq!(mark_display(&mark(1, -1, Some("absent"), 0)), "-");
    }
}
