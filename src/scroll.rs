//! Keeps the week strip and the day pager consistent with the selection.
//!
//! Works purely on offsets and indices; whatever renders the pagers feeds
//! scroll offsets in and receives `scroll_to` commands back through a
//! [`PagerSink`].

use chrono::NaiveDate;

use crate::reconcile::{Reconciled, Selection};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageMetrics {
    pub viewport_width: f64,
    pub max_content_width: f64,
    pub margin: f64,
}

impl PageMetrics {
    pub fn new(viewport_width: f64, max_content_width: f64, margin: f64) -> Self {
        Self {
            viewport_width,
            max_content_width,
            margin,
        }
    }

    pub fn with_viewport(self, viewport_width: f64) -> Self {
        Self {
            viewport_width,
            ..self
        }
    }

    pub fn page_width(&self) -> f64 {
        (self.viewport_width.min(self.max_content_width) - self.margin).max(1.0)
    }

    pub fn offset_for(&self, index: usize) -> f64 {
        index as f64 * self.page_width()
    }

    /// Page nearest to `offset_x`, halves rounding up, clamped to the strip.
    pub fn nearest_index(&self, offset_x: f64, page_count: usize) -> Option<usize> {
        if page_count == 0 {
            return None;
        }
        let position = (offset_x.max(0.0) / self.page_width()).round();
        let index = if position.is_finite() { position as usize } else { 0 };
        Some(index.min(page_count - 1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pager {
    Week,
    Day,
}

pub trait PagerSink {
    fn scroll_to(&mut self, pager: Pager, offset_x: f64);
}

impl PagerSink for Vec<(Pager, f64)> {
    fn scroll_to(&mut self, pager: Pager, offset_x: f64) {
        self.push((pager, offset_x));
    }
}

#[derive(Debug, Clone)]
pub struct ScrollSync {
    metrics: PageMetrics,
    days: Vec<(NaiveDate, i32)>,
    weeks: Vec<i32>,
    day_index: Option<usize>,
    week_index: Option<usize>,
}

impl ScrollSync {
    pub fn new(reconciled: &Reconciled, metrics: PageMetrics) -> Self {
        let mut sync = Self {
            metrics,
            days: Vec::new(),
            weeks: Vec::new(),
            day_index: None,
            week_index: None,
        };
        sync.load(reconciled);
        sync
    }

    fn load(&mut self, reconciled: &Reconciled) {
        self.days = reconciled
            .ordered_days
            .iter()
            .map(|day| (day.date(), day.week_number()))
            .collect();
        self.weeks = reconciled.weeks.clone();
        self.day_index = reconciled.selected_day_index();
        self.week_index = reconciled.selection.map(|selection| selection.week_index);
    }

    pub fn selection(&self) -> Option<Selection> {
        let (day, _) = *self.days.get(self.day_index?)?;
        Some(Selection {
            week_index: self.week_index?,
            day,
        })
    }

    /// Replaces the data set and positions both pagers on the new selection.
    pub fn reset(&mut self, reconciled: &Reconciled, sink: &mut impl PagerSink) {
        self.load(reconciled);
        self.align(sink);
    }

    pub fn align(&self, sink: &mut impl PagerSink) {
        if let Some(week_index) = self.week_index {
            sink.scroll_to(Pager::Week, self.metrics.offset_for(week_index));
        }
        if let Some(day_index) = self.day_index {
            sink.scroll_to(Pager::Day, self.metrics.offset_for(day_index));
        }
    }

    /// Programmatic selection. Returns whether anything changed.
    pub fn select_day(&mut self, date: NaiveDate, sink: &mut impl PagerSink) -> bool {
        let Some(index) = self.days.iter().position(|(day, _)| *day == date) else {
            return false;
        };
        if self.day_index == Some(index) {
            return false;
        }
        let week_changed = self.set_day(index);
        sink.scroll_to(Pager::Day, self.metrics.offset_for(index));
        if week_changed {
            self.scroll_week(sink);
        }
        true
    }

    pub fn on_day_scroll(&mut self, offset_x: f64, sink: &mut impl PagerSink) -> bool {
        let Some(index) = self.metrics.nearest_index(offset_x, self.days.len()) else {
            return false;
        };
        if self.day_index == Some(index) {
            return false;
        }
        if self.set_day(index) {
            self.scroll_week(sink);
        }
        true
    }

    pub fn on_week_scroll(&mut self, offset_x: f64, sink: &mut impl PagerSink) -> bool {
        let Some(index) = self.metrics.nearest_index(offset_x, self.weeks.len()) else {
            return false;
        };
        if self.week_index == Some(index) {
            return false;
        }
        self.week_index = Some(index);
        let week = self.weeks[index];
        if let Some(first_day) = self.days.iter().position(|(_, w)| *w == week) {
            self.day_index = Some(first_day);
            sink.scroll_to(Pager::Day, self.metrics.offset_for(first_day));
        }
        true
    }

    /// Returns whether the week changed along with the day.
    fn set_day(&mut self, index: usize) -> bool {
        self.day_index = Some(index);
        let week = self.days[index].1;
        let week_index = self.weeks.iter().position(|w| *w == week);
        let changed = week_index != self.week_index;
        self.week_index = week_index;
        changed
    }

    fn scroll_week(&self, sink: &mut impl PagerSink) {
        if let Some(week_index) = self.week_index {
            sink.scroll_to(Pager::Week, self.metrics.offset_for(week_index));
        }
    }
}
