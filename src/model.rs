use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Calendar day, always interpreted in UTC.
pub type Date = NaiveDate;

/// Opaque principal id handed out by the identity provider.
pub type PrincipalId = String;

/// Half-open date interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateSpan {
    pub start: Date,
    pub end: Date,
}

impl DateSpan {
    pub fn new(start: Date, end: Date) -> Self {
        debug_assert!(start < end, "DateSpan start must be before end");
        Self { start, end }
    }

    /// `None` when the range is empty or inverted.
    pub fn try_new(start: Date, end: Date) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// The whole calendar year `[Jan 1, Jan 1 of the next year)`.
    pub fn year(year: i32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let end = NaiveDate::from_ymd_opt(year + 1, 1, 1)?;
        Some(Self { start, end })
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn overlaps(&self, other: &DateSpan) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_date(&self, d: Date) -> bool {
        self.start <= d && d < self.end
    }

    /// The sampled day of a stay: `start + floor(days / 2)`.
    ///
    /// A one-night stay samples its first (and only) night.
    pub fn midpoint(&self) -> Date {
        let half = (self.days() / 2).max(0) as u64;
        self.start
            .checked_add_days(Days::new(half))
            .unwrap_or(self.start)
    }

    /// Iterate the days covered by the span.
    pub fn iter_days(&self) -> impl Iterator<Item = Date> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d < end)
    }
}

impl fmt::Display for DateSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

// ── Color calendar ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    Red,
    Blue,
    Orange,
    Yellow,
    Green,
    #[serde(rename = "")]
    Unassigned,
}

impl Color {
    pub const PALETTE: [Color; 5] = [
        Color::Red,
        Color::Blue,
        Color::Orange,
        Color::Yellow,
        Color::Green,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Red => "Red",
            Color::Blue => "Blue",
            Color::Orange => "Orange",
            Color::Yellow => "Yellow",
            Color::Green => "Green",
            Color::Unassigned => "",
        }
    }

    /// `None` for an unassigned block.
    pub fn assigned(self) -> Option<Color> {
        match self {
            Color::Unassigned => None,
            c => Some(c),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Unassigned => f.write_str("unassigned"),
            c => f.write_str(c.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownColor(pub String);

impl fmt::Display for UnknownColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown color: {:?}", self.0)
    }
}

impl std::error::Error for UnknownColor {}

impl FromStr for Color {
    type Err = UnknownColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Color::Unassigned);
        }
        Color::PALETTE
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownColor(trimmed.to_string()))
    }
}

/// One colored block of the cycle calendar. Both dates are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorPeriod {
    pub color: Color,
    pub start_date: Date,
    pub end_date: Date,
}

impl ColorPeriod {
    pub fn new(color: Color, start_date: Date, end_date: Date) -> Self {
        Self {
            color,
            start_date,
            end_date,
        }
    }

    pub fn contains(&self, d: Date) -> bool {
        self.start_date <= d && d <= self.end_date
    }

    /// The period as a half-open span. `None` if the dates are inverted.
    pub fn span(&self) -> Option<DateSpan> {
        let end = self.end_date.checked_add_days(Days::new(1))?;
        DateSpan::try_new(self.start_date, end)
    }
}

/// Selects the part of the calendar or the reservation book a bulk
/// administrative operation touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    All,
    /// Records whose first day (`startDate` / `dateFrom`) lies in the year.
    Year(i32),
}

impl Scope {
    pub fn covers(&self, d: Date) -> bool {
        match self {
            Scope::All => true,
            Scope::Year(y) => d.year() == *y,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::All => f.write_str("all"),
            Scope::Year(y) => write!(f, "{y}"),
        }
    }
}

// ── Reservations ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
    CancellationPending,
}

impl ReservationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReservationStatus::Cancelled)
    }

    /// Non-terminal reservations keep their dates blocked.
    pub fn occupies(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::CancellationPending => "cancellation_pending",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle actions a principal can request on a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Approve,
    Reject,
    SelfCancel,
    RequestCancel,
    ApproveCancel,
    DenyCancel,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Approve,
        Action::Reject,
        Action::SelfCancel,
        Action::RequestCancel,
        Action::ApproveCancel,
        Action::DenyCancel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Approve => "approve",
            Action::Reject => "reject",
            Action::SelfCancel => "self-cancel",
            Action::RequestCancel => "request-cancel",
            Action::ApproveCancel => "approve-cancel",
            Action::DenyCancel => "deny-cancel",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: Ulid,
    pub requester_id: PrincipalId,
    pub date_from: Date,
    pub date_to: Date,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    pub fn span(&self) -> DateSpan {
        DateSpan::new(self.date_from, self.date_to)
    }
}

// ── Principals ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    Approver,
}

/// Authenticated caller, as produced by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub role: Role,
}

impl Principal {
    pub fn member(id: impl Into<PrincipalId>) -> Self {
        Self {
            id: id.into(),
            role: Role::Member,
        }
    }

    pub fn approver(id: impl Into<PrincipalId>) -> Self {
        Self {
            id: id.into(),
            role: Role::Approver,
        }
    }

    pub fn is_approver(&self) -> bool {
        self.role == Role::Approver
    }
}

/// Display-name lookup backed by the identity provider.
pub trait DisplayNames {
    fn display_name(&self, principal_id: &str) -> Option<String>;
}

impl DisplayNames for HashMap<PrincipalId, String> {
    fn display_name(&self, principal_id: &str) -> Option<String> {
        self.get(principal_id).cloned()
    }
}

// ── Side records ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Ulid,
    pub recipient: PrincipalId,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// WAL record format. Flat, one variant per state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ScheduleReplaced {
        scope: Scope,
        periods: Vec<ColorPeriod>,
    },
    ReservationCreated {
        id: Ulid,
        requester_id: PrincipalId,
        span: DateSpan,
        created_at: DateTime<Utc>,
    },
    /// Applied only if the record is still in `from`.
    ReservationTransitioned {
        id: Ulid,
        from: ReservationStatus,
        to: ReservationStatus,
    },
    ReservationDeleted {
        id: Ulid,
    },
    ReservationsCleared {
        scope: Scope,
    },
    NotificationCreated {
        id: Ulid,
        recipient: PrincipalId,
        message: String,
        created_at: DateTime<Utc>,
    },
    NotificationRead {
        id: Ulid,
    },
    SettingPut {
        key: String,
        value: String,
    },
}

// ── Query result types ───────────────────────────────────────────

/// Reservation as shown on the shared calendar: the requester is reduced
/// to a display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicReservation {
    pub id: Ulid,
    pub display_name: String,
    pub date_from: Date,
    pub date_to: Date,
    pub status: ReservationStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Date {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn span_basics() {
        let s = DateSpan::new(d(2026, 1, 6), d(2026, 1, 8));
        assert_eq!(s.days(), 2);
        assert!(s.contains_date(d(2026, 1, 6)));
        assert!(s.contains_date(d(2026, 1, 7)));
        assert!(!s.contains_date(d(2026, 1, 8))); // half-open
    }

    #[test]
    fn span_overlap() {
        let a = DateSpan::new(d(2026, 1, 6), d(2026, 1, 8));
        let b = DateSpan::new(d(2026, 1, 7), d(2026, 1, 9));
        let c = DateSpan::new(d(2026, 1, 8), d(2026, 1, 10));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c)); // checkout day is free for the next arrival
    }

    #[test]
    fn try_new_rejects_empty_and_inverted() {
        assert!(DateSpan::try_new(d(2026, 1, 6), d(2026, 1, 6)).is_none());
        assert!(DateSpan::try_new(d(2026, 1, 7), d(2026, 1, 6)).is_none());
        assert!(DateSpan::try_new(d(2026, 1, 6), d(2026, 1, 7)).is_some());
    }

    #[test]
    fn midpoint_floors() {
        let one_night = DateSpan::new(d(2026, 1, 4), d(2026, 1, 5));
        assert_eq!(one_night.midpoint(), d(2026, 1, 4));

        let two_nights = DateSpan::new(d(2026, 1, 6), d(2026, 1, 8));
        assert_eq!(two_nights.midpoint(), d(2026, 1, 7));

        let week = DateSpan::new(d(2026, 1, 3), d(2026, 1, 10));
        assert_eq!(week.midpoint(), d(2026, 1, 6));
    }

    #[test]
    fn year_span_is_whole_year() {
        let y = DateSpan::year(2028).unwrap();
        assert_eq!(y.start, d(2028, 1, 1));
        assert_eq!(y.end, d(2029, 1, 1));
        assert_eq!(y.days(), 366);
    }

    #[test]
    fn iter_days_is_half_open() {
        let s = DateSpan::new(d(2026, 2, 27), d(2026, 3, 2));
        let days: Vec<_> = s.iter_days().collect();
        assert_eq!(days, vec![d(2026, 2, 27), d(2026, 2, 28), d(2026, 3, 1)]);
    }

    #[test]
    fn period_is_inclusive() {
        let p = ColorPeriod::new(Color::Blue, d(2026, 1, 5), d(2026, 1, 11));
        assert!(p.contains(d(2026, 1, 5)));
        assert!(p.contains(d(2026, 1, 11)));
        assert!(!p.contains(d(2026, 1, 12)));
        assert_eq!(p.span(), Some(DateSpan::new(d(2026, 1, 5), d(2026, 1, 12))));

        let single = ColorPeriod::new(Color::Red, d(2026, 1, 5), d(2026, 1, 5));
        assert_eq!(single.span().map(|s| s.days()), Some(1));

        let inverted = ColorPeriod::new(Color::Red, d(2026, 1, 6), d(2026, 1, 5));
        assert!(inverted.span().is_none());
    }

    #[test]
    fn scope_covers_by_year() {
        assert!(Scope::All.covers(d(1999, 12, 31)));
        assert!(Scope::Year(2026).covers(d(2026, 12, 31)));
        assert!(!Scope::Year(2026).covers(d(2027, 1, 1)));
    }

    #[test]
    fn color_parsing() {
        assert_eq!("blue".parse::<Color>().unwrap(), Color::Blue);
        assert_eq!(" Yellow ".parse::<Color>().unwrap(), Color::Yellow);
        assert_eq!("".parse::<Color>().unwrap(), Color::Unassigned);
        assert!("Purple".parse::<Color>().is_err());
        assert_eq!(Color::Unassigned.assigned(), None);
        assert_eq!(Color::Green.assigned(), Some(Color::Green));
    }

    #[test]
    fn payloads_use_iso_dates() {
        let p = ColorPeriod::new(Color::Unassigned, d(2026, 1, 5), d(2026, 1, 11));
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["color"], "");
        assert_eq!(json["startDate"], "2026-01-05");
        assert_eq!(json["endDate"], "2026-01-11");

        let r = Reservation {
            id: Ulid::new(),
            requester_id: "u1".into(),
            date_from: d(2026, 1, 6),
            date_to: d(2026, 1, 8),
            status: ReservationStatus::CancellationPending,
            created_at: DateTime::parse_from_rfc3339("2026-01-01T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["dateFrom"], "2026-01-06");
        assert_eq!(json["status"], "cancellation_pending");
        assert_eq!(json["createdAt"], "2026-01-01T10:00:00Z");
    }

    #[test]
    fn action_wire_names() {
        let json = serde_json::to_string(&Action::RequestCancel).unwrap();
        assert_eq!(json, "\"request-cancel\"");
        let back: Action = serde_json::from_str("\"deny-cancel\"").unwrap();
        assert_eq!(back, Action::DenyCancel);
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::ReservationCreated {
            id: Ulid::new(),
            requester_id: "u1".into(),
            span: DateSpan::new(d(2026, 1, 6), d(2026, 1, 8)),
            created_at: Utc::now(),
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
