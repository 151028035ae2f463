use crate::model::*;

use super::calendar::CalendarSnapshot;
use super::store::ReservationStore;
use super::EngineError;

/// The subset of the palette that accepts reservation requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingPolicy {
    bookable: Vec<Color>,
}

impl BookingPolicy {
    /// Unassigned is never bookable, even if listed.
    pub fn new(colors: impl IntoIterator<Item = Color>) -> Self {
        let mut bookable: Vec<Color> = Vec::new();
        for color in colors.into_iter().filter_map(Color::assigned) {
            if !bookable.contains(&color) {
                bookable.push(color);
            }
        }
        Self { bookable }
    }

    pub fn is_bookable(&self, color: Option<Color>) -> bool {
        color.is_some_and(|c| self.bookable.contains(&c))
    }

    pub fn colors(&self) -> &[Color] {
        &self.bookable
    }
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self::new([Color::Blue, Color::Orange, Color::Yellow])
    }
}

// ── Request check ─────────────────────────────────────────────────

/// Check the color governing a requested stay.
///
/// Only the midpoint day is sampled: a stay that crosses a period boundary is
/// judged by whichever period holds its middle night.
pub fn check_bookable(
    calendar: &CalendarSnapshot,
    span: &DateSpan,
    policy: &BookingPolicy,
) -> Result<Color, EngineError> {
    let date = span.midpoint();
    let color = calendar.color_at(date);
    match color {
        Some(c) if policy.is_bookable(color) => Ok(c),
        _ => Err(EngineError::BlackoutPeriod { date, color }),
    }
}

// ── Availability window ───────────────────────────────────────────

/// Spans within `window` whose days each resolve to a bookable color.
///
/// Unlike `check_bookable` this walks every day, so a bookable period that is
/// partly covered by a later blackout block is split around it.
pub fn bookable_spans(
    calendar: &CalendarSnapshot,
    window: &DateSpan,
    policy: &BookingPolicy,
) -> Vec<DateSpan> {
    let mut spans: Vec<DateSpan> = Vec::new();
    let mut run_start: Option<Date> = None;
    for day in window.iter_days() {
        let open = policy.is_bookable(calendar.color_at(day));
        match (open, run_start) {
            (true, None) => run_start = Some(day),
            (false, Some(start)) => {
                spans.push(DateSpan::new(start, day));
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        spans.push(DateSpan::new(start, window.end));
    }
    spans
}

/// Free, bookable spans within `window`: bookable days minus every
/// non-terminal reservation.
pub fn availability(
    calendar: &CalendarSnapshot,
    book: &ReservationStore,
    window: &DateSpan,
    policy: &BookingPolicy,
) -> Vec<DateSpan> {
    let free = bookable_spans(calendar, window, policy);
    if free.is_empty() {
        return free;
    }
    let mut taken: Vec<DateSpan> = book.occupying(window).map(Reservation::span).collect();
    if taken.is_empty() {
        return free;
    }
    taken.sort_by_key(|s| s.start);
    let taken = merge_overlapping(&taken);
    subtract_intervals(&free, &taken)
}

/// Merge sorted overlapping/adjacent spans into disjoint spans.
pub fn merge_overlapping(sorted: &[DateSpan]) -> Vec<DateSpan> {
    let mut merged: Vec<DateSpan> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end
        {
            last.end = last.end.max(span.end);
            continue;
        }
        merged.push(span);
    }
    merged
}

/// Remove `to_remove` (sorted, disjoint) from `base` (sorted, disjoint).
pub fn subtract_intervals(base: &[DateSpan], to_remove: &[DateSpan]) -> Vec<DateSpan> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(DateSpan::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(DateSpan::new(current_start, current_end));
        }
    }

    result
}
