use std::collections::HashMap;

use ulid::Ulid;

use crate::model::*;

/// The reservation book for the property.
///
/// Records are kept sorted by `date_from` so range queries can stop at the
/// first reservation starting at or after the query end. Cancelled records
/// stay in the book (they are history for their requester) but never occupy
/// dates.
#[derive(Debug, Clone, Default)]
pub struct ReservationStore {
    reservations: Vec<Reservation>,
    /// Reverse lookup: id → `date_from`, narrowing an id search to one date.
    by_id: HashMap<Ulid, Date>,
}

impl ReservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.reservations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reservations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reservation> {
        self.reservations.iter()
    }

    /// Index of `id` in the sorted vector.
    fn position(&self, id: &Ulid) -> Option<usize> {
        let from = *self.by_id.get(id)?;
        let start = self.reservations.partition_point(|r| r.date_from < from);
        self.reservations[start..]
            .iter()
            .take_while(|r| r.date_from == from)
            .position(|r| r.id == *id)
            .map(|offset| start + offset)
    }

    pub fn get(&self, id: &Ulid) -> Option<&Reservation> {
        self.position(id).map(|pos| &self.reservations[pos])
    }

    /// Insert maintaining sort order by `date_from`.
    pub fn insert(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .partition_point(|r| r.date_from <= reservation.date_from);
        self.by_id.insert(reservation.id, reservation.date_from);
        self.reservations.insert(pos, reservation);
    }

    pub fn remove(&mut self, id: &Ulid) -> Option<Reservation> {
        let pos = self.position(id)?;
        self.by_id.remove(id);
        Some(self.reservations.remove(pos))
    }

    /// Reservations of any status whose stay overlaps `query`.
    pub fn overlapping(&self, query: &DateSpan) -> impl Iterator<Item = &Reservation> {
        let right_bound = self
            .reservations
            .partition_point(|r| r.date_from < query.end);
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.date_to > query.start)
    }

    /// Non-terminal reservations whose stay overlaps `query`.
    pub fn occupying(&self, query: &DateSpan) -> impl Iterator<Item = &Reservation> {
        self.overlapping(query).filter(|r| r.status.occupies())
    }

    pub fn active_count(&self) -> usize {
        self.reservations
            .iter()
            .filter(|r| r.status.occupies())
            .count()
    }

    /// Conditional status update: applies only if the record is still in
    /// `expected`. Returns the status actually found on mismatch.
    pub fn compare_and_set_status(
        &mut self,
        id: &Ulid,
        expected: ReservationStatus,
        next: ReservationStatus,
    ) -> Result<&Reservation, Option<ReservationStatus>> {
        let Some(pos) = self.position(id) else {
            return Err(None);
        };
        let r = &mut self.reservations[pos];
        if r.status != expected {
            return Err(Some(r.status));
        }
        r.status = next;
        Ok(r)
    }

    /// Remove every reservation whose `date_from` lies in `scope`, whatever
    /// its status. Returns how many were removed.
    pub fn clear(&mut self, scope: Scope) -> usize {
        let before = self.reservations.len();
        let by_id = &mut self.by_id;
        self.reservations.retain(|r| {
            let keep = !scope.covers(r.date_from);
            if !keep {
                by_id.remove(&r.id);
            }
            keep
        });
        before - self.reservations.len()
    }

    /// Apply a reservation event. Calendar, notification and setting events
    /// are not the book's concern and are ignored.
    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::ReservationCreated {
                id,
                requester_id,
                span,
                created_at,
            } => {
                self.insert(Reservation {
                    id: *id,
                    requester_id: requester_id.clone(),
                    date_from: span.start,
                    date_to: span.end,
                    status: ReservationStatus::Pending,
                    created_at: *created_at,
                });
            }
            Event::ReservationTransitioned { id, from, to } => {
                if let Err(found) = self.compare_and_set_status(id, *from, *to) {
                    tracing::warn!(
                        "skipping transition {from} -> {to} on {id}: found {found:?}"
                    );
                }
            }
            Event::ReservationDeleted { id } => {
                self.remove(id);
            }
            Event::ReservationsCleared { scope } => {
                self.clear(*scope);
            }
            Event::ScheduleReplaced { .. }
            | Event::NotificationCreated { .. }
            | Event::NotificationRead { .. }
            | Event::SettingPut { .. } => {}
        }
    }
}
