use ulid::Ulid;

use crate::model::{Action, Color, Date, ReservationStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Empty or inverted date range.
    InvalidRange { from: Date, to: Date },
    /// The stay's sampled day is not in a bookable color.
    BlackoutPeriod { date: Date, color: Option<Color> },
    /// Overlaps the given non-terminal reservation.
    DateConflict(Ulid),
    NotFound(Ulid),
    Forbidden(&'static str),
    InvalidTransition {
        from: ReservationStatus,
        action: Action,
    },
    /// A period handed to a year replace does not start in that year.
    PeriodOutsideYear { year: i32, start: Date },
    LimitExceeded(&'static str),
    /// The durable log could not be written. Callers may retry.
    StorageUnavailable(String),
}

impl EngineError {
    /// Short stable label, used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidRange { .. } => "invalid_range",
            EngineError::BlackoutPeriod { .. } => "blackout_period",
            EngineError::DateConflict(_) => "date_conflict",
            EngineError::NotFound(_) => "not_found",
            EngineError::Forbidden(_) => "forbidden",
            EngineError::InvalidTransition { .. } => "invalid_transition",
            EngineError::PeriodOutsideYear { .. } => "period_outside_year",
            EngineError::LimitExceeded(_) => "limit_exceeded",
            EngineError::StorageUnavailable(_) => "storage_unavailable",
        }
    }

    /// Everything except storage failures is caused by the request and can be
    /// retried with corrected input.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, EngineError::StorageUnavailable(_))
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidRange { from, to } => {
                write!(f, "invalid range: {from} must be before {to}")
            }
            EngineError::BlackoutPeriod { date, color } => match color {
                Some(c) => write!(f, "blackout period: {date} is in a {c} period"),
                None => write!(f, "blackout period: {date} has no assigned color"),
            },
            EngineError::DateConflict(id) => {
                write!(f, "dates conflict with existing reservation: {id}")
            }
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            EngineError::InvalidTransition { from, action } => {
                write!(f, "cannot {action} a reservation that is {from}")
            }
            EngineError::PeriodOutsideYear { year, start } => {
                write!(f, "period starting {start} is outside year {year}")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::StorageUnavailable(e) => write!(f, "storage unavailable: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
