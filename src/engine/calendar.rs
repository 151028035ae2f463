use crate::model::*;

/// A period together with its write sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPeriod {
    pub seq: u64,
    pub period: ColorPeriod,
}

/// Immutable view of the whole cycle calendar.
///
/// A replace never mutates a snapshot: it builds the next version, which the
/// engine swaps in behind a lock. Readers holding an older `Arc` keep a
/// consistent calendar for the duration of their request.
///
/// Overlap precedence: among the periods containing a date, the one with the
/// latest `start_date` wins; ties go to the most recently written period
/// (highest `seq`).
#[derive(Debug, Clone, Default)]
pub struct CalendarSnapshot {
    version: u64,
    next_seq: u64,
    /// Sorted by `(start_date, seq)`.
    periods: Vec<StoredPeriod>,
}

impl CalendarSnapshot {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// All periods ordered by start date.
    pub fn periods(&self) -> impl Iterator<Item = &ColorPeriod> {
        self.periods.iter().map(|p| &p.period)
    }

    /// All periods in write order. Replaying them as one replace reproduces
    /// the same precedence.
    pub fn periods_in_write_order(&self) -> Vec<ColorPeriod> {
        let mut stored: Vec<&StoredPeriod> = self.periods.iter().collect();
        stored.sort_by_key(|p| p.seq);
        stored.into_iter().map(|p| p.period.clone()).collect()
    }

    /// The period governing `date`, if any.
    pub fn period_at(&self, date: Date) -> Option<&ColorPeriod> {
        // Everything at index >= bound starts after `date` → can't contain it.
        let bound = self.periods.partition_point(|p| p.period.start_date <= date);
        self.periods[..bound]
            .iter()
            .rev()
            .find(|p| p.period.end_date >= date)
            .map(|p| &p.period)
    }

    /// Color governing `date`. Unassigned blocks and uncovered dates give `None`.
    pub fn color_at(&self, date: Date) -> Option<Color> {
        self.period_at(date).and_then(|p| p.color.assigned())
    }

    /// Periods intersecting `window`, in start order.
    pub fn overlapping(&self, window: &DateSpan) -> impl Iterator<Item = &ColorPeriod> {
        let bound = self
            .periods
            .partition_point(|p| p.period.start_date < window.end);
        self.periods[..bound]
            .iter()
            .map(|p| &p.period)
            .filter(move |p| p.end_date >= window.start)
    }

    /// Build the next version: drop every period whose start date falls in
    /// `scope`, then append `incoming` in order.
    pub fn replaced(&self, scope: Scope, incoming: Vec<ColorPeriod>) -> Self {
        let mut periods: Vec<StoredPeriod> = self
            .periods
            .iter()
            .filter(|p| !scope.covers(p.period.start_date))
            .cloned()
            .collect();
        let mut seq = self.next_seq;
        for period in incoming {
            periods.push(StoredPeriod { seq, period });
            seq += 1;
        }
        periods.sort_by_key(|p| (p.period.start_date, p.seq));
        Self {
            version: self.version + 1,
            next_seq: seq,
            periods,
        }
    }
}
