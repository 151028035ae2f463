use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability::{
    CALENDAR_VERSION, RESERVATION_REQUESTS_TOTAL, RESERVATIONS_ACTIVE,
    SCHEDULE_REPLACEMENTS_TOTAL, TRANSITIONS_TOTAL, WAL_COMPACTIONS_TOTAL, outcome_label,
};

use super::availability::check_bookable;
use super::conflict::{
    check_no_conflict, now, require_approver, validate_periods, validate_principal_id,
    validate_span, validate_year,
};
use super::lifecycle::authorize;
use super::{Engine, EngineError, WalCommand};

impl Engine {
    /// Request a stay `[from, to)`. On success the reservation is `pending`.
    ///
    /// Checks run in order: range, color at the midpoint, conflicts. The
    /// conflict check, WAL append and apply all happen under the ledger write
    /// lock, so two overlapping requests can never both be admitted.
    pub async fn create_reservation(
        &self,
        requester_id: &str,
        from: Date,
        to: Date,
    ) -> Result<Reservation, EngineError> {
        let result = self.try_create(requester_id, from, to).await;
        metrics::counter!(RESERVATION_REQUESTS_TOTAL, "outcome" => outcome_label(&result))
            .increment(1);
        if let Err(e) = &result {
            debug!("reservation request by {requester_id} for {from}..{to} rejected: {e}");
        }
        result
    }

    async fn try_create(
        &self,
        requester_id: &str,
        from: Date,
        to: Date,
    ) -> Result<Reservation, EngineError> {
        validate_principal_id(requester_id)?;
        let span = validate_span(from, to)?;
        let color = check_bookable(&*self.snapshot().await, &span, &self.policy)?;

        let mut ledger = self.ledger.write().await;
        if ledger.len() >= MAX_RESERVATIONS {
            return Err(EngineError::LimitExceeded("too many reservations"));
        }
        check_no_conflict(&ledger, &span)?;

        let reservation = Reservation {
            id: Ulid::new(),
            requester_id: requester_id.to_string(),
            date_from: span.start,
            date_to: span.end,
            status: ReservationStatus::Pending,
            created_at: now(),
        };
        let event = Event::ReservationCreated {
            id: reservation.id,
            requester_id: reservation.requester_id.clone(),
            span,
            created_at: reservation.created_at,
        };
        self.wal_append(&event).await?;
        ledger.insert(reservation.clone());
        metrics::gauge!(RESERVATIONS_ACTIVE).set(ledger.active_count() as f64);
        drop(ledger);

        info!(
            "reservation {} created by {requester_id} for {span} ({color})",
            reservation.id
        );
        Ok(reservation)
    }

    /// Drive the lifecycle: apply `action` to reservation `id` on behalf of `actor`.
    pub async fn transition(
        &self,
        id: Ulid,
        actor: &Principal,
        action: Action,
    ) -> Result<Reservation, EngineError> {
        let result = self.try_transition(id, actor, action).await;
        metrics::counter!(
            TRANSITIONS_TOTAL,
            "action" => action.as_str(),
            "outcome" => outcome_label(&result)
        )
        .increment(1);
        if let Err(e) = &result {
            debug!("{action} on {id} by {} rejected: {e}", actor.id);
        }
        result
    }

    async fn try_transition(
        &self,
        id: Ulid,
        actor: &Principal,
        action: Action,
    ) -> Result<Reservation, EngineError> {
        let mut ledger = self.ledger.write().await;
        let current = ledger.get(&id).ok_or(EngineError::NotFound(id))?;
        let t = authorize(current, actor, action)?;

        let event = Event::ReservationTransitioned {
            id,
            from: t.from,
            to: t.to,
        };
        self.wal_append(&event).await?;
        let updated = ledger
            .compare_and_set_status(&id, t.from, t.to)
            .map_err(|_| EngineError::InvalidTransition {
                from: t.from,
                action,
            })?
            .clone();
        metrics::gauge!(RESERVATIONS_ACTIVE).set(ledger.active_count() as f64);
        drop(ledger);

        info!("reservation {id}: {} -> {} by {} ({action})", t.from, t.to, actor.id);
        if let Some(notice) = t.notice {
            self.notify_requester(&updated, notice.message(&updated)).await;
        }
        Ok(updated)
    }

    /// Administrative delete of a reservation in any status.
    pub async fn delete_reservation(&self, id: Ulid, actor: &Principal) -> Result<(), EngineError> {
        require_approver(actor)?;
        let mut ledger = self.ledger.write().await;
        if ledger.get(&id).is_none() {
            return Err(EngineError::NotFound(id));
        }
        self.wal_append(&Event::ReservationDeleted { id }).await?;
        ledger.remove(&id);
        metrics::gauge!(RESERVATIONS_ACTIVE).set(ledger.active_count() as f64);
        info!("reservation {id} deleted by {}", actor.id);
        Ok(())
    }

    /// Delete every reservation whose first day lies in `scope`, bypassing
    /// the lifecycle. Returns how many were removed.
    pub async fn clear_reservations(
        &self,
        scope: Scope,
        actor: &Principal,
    ) -> Result<usize, EngineError> {
        require_approver(actor)?;
        if let Scope::Year(year) = scope {
            validate_year(year)?;
        }
        let mut ledger = self.ledger.write().await;
        if !ledger.iter().any(|r| scope.covers(r.date_from)) {
            return Ok(0);
        }
        self.wal_append(&Event::ReservationsCleared { scope }).await?;
        let removed = ledger.clear(scope);
        metrics::gauge!(RESERVATIONS_ACTIVE).set(ledger.active_count() as f64);
        info!("cleared {removed} reservations ({scope}) by {}", actor.id);
        Ok(removed)
    }

    /// Replace the whole calendar. Returns the new calendar version.
    pub async fn replace_schedule(
        &self,
        actor: &Principal,
        periods: Vec<ColorPeriod>,
    ) -> Result<u64, EngineError> {
        self.replace(actor, Scope::All, periods).await
    }

    /// Replace the periods starting in `year`; every incoming period must start
    /// in that year. Returns the new calendar version.
    pub async fn replace_schedule_for_year(
        &self,
        actor: &Principal,
        year: i32,
        periods: Vec<ColorPeriod>,
    ) -> Result<u64, EngineError> {
        validate_year(year)?;
        self.replace(actor, Scope::Year(year), periods).await
    }

    async fn replace(
        &self,
        actor: &Principal,
        scope: Scope,
        periods: Vec<ColorPeriod>,
    ) -> Result<u64, EngineError> {
        require_approver(actor)?;
        validate_periods(scope, &periods)?;

        let mut calendar = self.calendar.write().await;
        let next = calendar.replaced(scope, periods.clone());
        self.wal_append(&Event::ScheduleReplaced { scope, periods })
            .await?;
        let version = next.version();
        let count = next.len();
        *calendar = Arc::new(next);
        drop(calendar);

        let scope_label = match scope {
            Scope::All => "all",
            Scope::Year(_) => "year",
        };
        metrics::counter!(SCHEDULE_REPLACEMENTS_TOTAL, "scope" => scope_label).increment(1);
        metrics::gauge!(CALENDAR_VERSION).set(version as f64);
        info!(
            "schedule replaced ({scope}) by {}: version {version}, {count} periods",
            actor.id
        );
        Ok(version)
    }

    /// Mark one of the caller's own notifications as read.
    pub async fn mark_notification_read(
        &self,
        actor: &Principal,
        id: Ulid,
    ) -> Result<(), EngineError> {
        let _side = self.side_writes.read().await;
        let (recipient, is_read) = self
            .notifications
            .get(&id)
            .map(|n| (n.recipient.clone(), n.is_read))
            .ok_or(EngineError::NotFound(id))?;
        if recipient != actor.id {
            return Err(EngineError::Forbidden("notification belongs to another principal"));
        }
        if is_read {
            return Ok(());
        }
        self.wal_append(&Event::NotificationRead { id }).await?;
        if let Some(mut n) = self.notifications.get_mut(&id) {
            n.is_read = true;
        }
        Ok(())
    }

    /// Upsert an application setting.
    pub async fn put_setting(
        &self,
        actor: &Principal,
        key: &str,
        value: &str,
    ) -> Result<(), EngineError> {
        require_approver(actor)?;
        if key.is_empty() || key.len() > MAX_SETTING_KEY_LEN {
            return Err(EngineError::LimitExceeded("setting key length"));
        }
        if value.len() > MAX_SETTING_VALUE_LEN {
            return Err(EngineError::LimitExceeded("setting value too long"));
        }
        let mut settings = self.settings.write().await;
        self.wal_append(&Event::SettingPut {
            key: key.to_string(),
            value: value.to_string(),
        })
        .await?;
        settings.insert(key.to_string(), value.to_string());
        debug!("setting {key} updated by {}", actor.id);
        Ok(())
    }

    /// Persist and deliver a notification for the reservation's requester.
    ///
    /// The transition is already committed when this runs, so a storage
    /// failure here is logged and the live delivery still happens.
    async fn notify_requester(&self, reservation: &Reservation, message: String) {
        let notification = Notification {
            id: Ulid::new(),
            recipient: reservation.requester_id.clone(),
            message,
            is_read: false,
            created_at: now(),
        };
        let event = Event::NotificationCreated {
            id: notification.id,
            recipient: notification.recipient.clone(),
            message: notification.message.clone(),
            created_at: notification.created_at,
        };

        let _side = self.side_writes.read().await;
        match self.wal_append(&event).await {
            Ok(()) => {
                self.notifications
                    .insert(notification.id, notification.clone());
            }
            Err(e) => warn!(
                "notification for {} on reservation {} not persisted: {e}",
                notification.recipient, reservation.id
            ),
        }
        self.notify.send(&notification);
    }

    /// Rewrite the WAL as the minimal event set that recreates current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _side = self.side_writes.write().await;
        let ledger = self.ledger.read().await;
        let calendar = self.calendar.read().await;
        let settings = self.settings.read().await;

        let mut events = Vec::with_capacity(1 + ledger.len() * 2 + settings.len());
        if !calendar.is_empty() {
            events.push(Event::ScheduleReplaced {
                scope: Scope::All,
                periods: calendar.periods_in_write_order(),
            });
        }
        for r in ledger.iter() {
            events.push(Event::ReservationCreated {
                id: r.id,
                requester_id: r.requester_id.clone(),
                span: r.span(),
                created_at: r.created_at,
            });
            if r.status != ReservationStatus::Pending {
                events.push(Event::ReservationTransitioned {
                    id: r.id,
                    from: ReservationStatus::Pending,
                    to: r.status,
                });
            }
        }
        let mut notifications: Vec<Notification> =
            self.notifications.iter().map(|e| e.value().clone()).collect();
        notifications.sort_by_key(|n| n.id);
        for n in notifications {
            let read = n.is_read.then_some(Event::NotificationRead { id: n.id });
            events.push(Event::NotificationCreated {
                id: n.id,
                recipient: n.recipient,
                message: n.message,
                created_at: n.created_at,
            });
            events.extend(read);
        }
        for (key, value) in settings.iter() {
            events.push(Event::SettingPut {
                key: key.clone(),
                value: value.clone(),
            });
        }

        let count = events.len();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact {
                events,
                response: tx,
            })
            .await
            .map_err(|_| EngineError::StorageUnavailable("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::StorageUnavailable("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::StorageUnavailable(e.to_string()))?;

        metrics::counter!(WAL_COMPACTIONS_TOTAL).increment(1);
        info!("WAL compacted to {count} events");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
