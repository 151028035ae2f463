use chrono::{DateTime, Datelike, Utc};

use crate::limits::*;
use crate::model::*;

use super::store::ReservationStore;
use super::EngineError;

pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}

fn year_supported(d: Date) -> bool {
    (MIN_SUPPORTED_YEAR..=MAX_SUPPORTED_YEAR).contains(&d.year())
}

/// Turn a requested `[from, to)` into a span. Reversed, empty, overlong and
/// out-of-range stays are all an `InvalidRange`.
pub(crate) fn validate_span(from: Date, to: Date) -> Result<DateSpan, EngineError> {
    let invalid = EngineError::InvalidRange { from, to };
    let span = DateSpan::try_new(from, to).ok_or(invalid.clone())?;
    if !year_supported(span.start) || !year_supported(span.end) || span.days() > MAX_STAY_DAYS {
        return Err(invalid);
    }
    Ok(span)
}

/// Like `validate_span`, for the availability window.
pub(crate) fn validate_window(from: Date, to: Date) -> Result<DateSpan, EngineError> {
    let span = DateSpan::try_new(from, to).ok_or(EngineError::InvalidRange { from, to })?;
    if span.days() > MAX_QUERY_WINDOW_DAYS {
        return Err(EngineError::LimitExceeded("query window too wide"));
    }
    Ok(span)
}

/// First non-terminal reservation overlapping `span` fails the check.
pub(crate) fn check_no_conflict(book: &ReservationStore, span: &DateSpan) -> Result<(), EngineError> {
    match book.occupying(span).next() {
        Some(existing) => Err(EngineError::DateConflict(existing.id)),
        None => Ok(()),
    }
}

pub(crate) fn validate_periods(scope: Scope, periods: &[ColorPeriod]) -> Result<(), EngineError> {
    if periods.len() > MAX_PERIODS_PER_REPLACE {
        return Err(EngineError::LimitExceeded("too many periods"));
    }
    for p in periods {
        if p.start_date > p.end_date {
            return Err(EngineError::InvalidRange {
                from: p.start_date,
                to: p.end_date,
            });
        }
        if let Scope::Year(year) = scope
            && p.start_date.year() != year
        {
            return Err(EngineError::PeriodOutsideYear {
                year,
                start: p.start_date,
            });
        }
        if !year_supported(p.start_date) || !year_supported(p.end_date) {
            return Err(EngineError::LimitExceeded("date out of supported range"));
        }
    }
    Ok(())
}

pub(crate) fn validate_year(year: i32) -> Result<(), EngineError> {
    if !(MIN_SUPPORTED_YEAR..=MAX_SUPPORTED_YEAR).contains(&year) {
        return Err(EngineError::LimitExceeded("year out of supported range"));
    }
    Ok(())
}

pub(crate) fn validate_principal_id(id: &str) -> Result<(), EngineError> {
    if id.is_empty() {
        return Err(EngineError::Forbidden("missing principal id"));
    }
    if id.len() > MAX_PRINCIPAL_ID_LEN {
        return Err(EngineError::LimitExceeded("principal id too long"));
    }
    Ok(())
}

pub(crate) fn require_approver(actor: &Principal) -> Result<(), EngineError> {
    if actor.is_approver() {
        Ok(())
    } else {
        Err(EngineError::Forbidden("action requires the approver role"))
    }
}
