use ulid::Ulid;

use crate::model::*;

use super::availability::availability;
use super::conflict::{require_approver, validate_window};
use super::{Engine, EngineError};

/// Shown on the shared calendar when the identity provider has no name.
pub const UNKNOWN_DISPLAY_NAME: &str = "Unknown member";

impl Engine {
    /// Color governing `date`; `None` for unassigned or uncovered dates.
    pub async fn color_at(&self, date: Date) -> Option<Color> {
        self.snapshot().await.color_at(date)
    }

    pub async fn calendar_version(&self) -> u64 {
        self.snapshot().await.version()
    }

    /// Every period of the calendar, ordered by start date.
    pub async fn get_schedule(&self, actor: &Principal) -> Result<Vec<ColorPeriod>, EngineError> {
        require_approver(actor)?;
        Ok(self.snapshot().await.periods().cloned().collect())
    }

    pub async fn get_reservation(&self, id: Ulid) -> Result<Reservation, EngineError> {
        self.ledger
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(EngineError::NotFound(id))
    }

    /// Non-terminal reservations for the shared calendar, by start date. The
    /// requester is reduced to a display name.
    pub async fn list_public_reservations(
        &self,
        names: &dyn DisplayNames,
    ) -> Vec<PublicReservation> {
        let ledger = self.ledger.read().await;
        ledger
            .iter()
            .filter(|r| r.status.occupies())
            .map(|r| PublicReservation {
                id: r.id,
                display_name: names
                    .display_name(&r.requester_id)
                    .unwrap_or_else(|| UNKNOWN_DISPLAY_NAME.to_string()),
                date_from: r.date_from,
                date_to: r.date_to,
                status: r.status,
            })
            .collect()
    }

    /// The requester's reservations of every status, by start date.
    pub async fn list_my_reservations(&self, requester_id: &str) -> Vec<Reservation> {
        let ledger = self.ledger.read().await;
        ledger
            .iter()
            .filter(|r| r.requester_id == requester_id)
            .cloned()
            .collect()
    }

    /// Every reservation in the book, newest request first.
    pub async fn list_all_reservations(
        &self,
        actor: &Principal,
    ) -> Result<Vec<Reservation>, EngineError> {
        require_approver(actor)?;
        let mut all: Vec<Reservation> = self.ledger.read().await.iter().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(all)
    }

    /// Free, bookable spans within `[from, to)`.
    pub async fn compute_availability(
        &self,
        from: Date,
        to: Date,
    ) -> Result<Vec<DateSpan>, EngineError> {
        let window = validate_window(from, to)?;
        let calendar = self.snapshot().await;
        let ledger = self.ledger.read().await;
        Ok(availability(&calendar, &ledger, &window, &self.policy))
    }

    /// The caller's unread notifications, newest first.
    pub fn unread_notifications(&self, actor: &Principal) -> Vec<Notification> {
        let mut unread: Vec<Notification> = self
            .notifications
            .iter()
            .filter(|e| e.recipient == actor.id && !e.is_read)
            .map(|e| e.value().clone())
            .collect();
        unread.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        unread
    }

    /// Setting value, or the empty string when unset.
    pub async fn get_setting(&self, key: &str) -> String {
        self.settings
            .read()
            .await
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn reservation_count(&self) -> usize {
        self.ledger.read().await.len()
    }

    pub async fn active_reservation_count(&self) -> usize {
        self.ledger.read().await.active_count()
    }
}
