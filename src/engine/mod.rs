mod availability;
mod calendar;
mod conflict;
mod error;
mod lifecycle;
mod mutations;
mod queries;
mod store;

pub use availability::{BookingPolicy, merge_overlapping, subtract_intervals};
pub use calendar::CalendarSnapshot;
pub use error::EngineError;
pub use lifecycle::{Notice, Side, Transition, next_status};
pub use queries::UNKNOWN_DISPLAY_NAME;
pub use store::ReservationStore;

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, oneshot};
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::observability::{WAL_FLUSH_BATCH_SIZE, WAL_FLUSH_DURATION_SECONDS};
use crate::wal::Wal;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Event, oneshot::Sender<io::Result<()>>);

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Drain every Append already queued behind it.
/// 3. One fsync for the whole batch, then answer every sender.
/// A non-append command found while draining is handled after the flush.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            WalCommand::Append { event, response } => (event, response),
            other => {
                handle_non_append(&mut wal, other);
                continue;
            }
        };
        let mut batch: Vec<PendingAppend> = vec![(event, response)];
        let mut deferred = None;
        while let Ok(next) = rx.try_recv() {
            match next {
                WalCommand::Append { event, response } => batch.push((event, response)),
                other => {
                    deferred = Some(other);
                    break;
                }
            }
        }

        metrics::histogram!(WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        if let Err(e) = &result {
            tracing::error!("WAL flush of {} events failed: {e}", batch.len());
        }
        respond_batch(batch, &result);

        if let Some(cmd) = deferred {
            handle_non_append(&mut wal, cmd);
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &[PendingAppend]) -> io::Result<()> {
    let appended = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event));
    // Flush even after a failed append so no half-written batch lingers in
    // the buffer and leaks into the next one.
    let flushed = wal.flush_sync();
    appended.and(flushed)
}

fn respond_batch(batch: Vec<PendingAppend>, result: &io::Result<()>) {
    for (_, tx) in batch {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result =
                Wal::write_compact_file(wal.path(), &events).and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { response, .. } => {
            let _ = response.send(Err(io::Error::other("append routed outside a batch")));
        }
    }
}

// ── Engine state ─────────────────────────────────────────

/// The reservation engine for one property.
///
/// Lock order, where more than one is held: `side_writes`, `ledger`,
/// `calendar`, `settings`. Only compaction holds more than one.
pub struct Engine {
    /// Current calendar snapshot. Replaces hold the write lock across the WAL
    /// append; readers clone the `Arc` and release immediately.
    pub(super) calendar: RwLock<Arc<CalendarSnapshot>>,
    /// The single writer lock serializing reservation creates and transitions.
    pub(super) ledger: RwLock<ReservationStore>,
    pub(super) notifications: DashMap<Ulid, Notification>,
    pub(super) settings: RwLock<HashMap<String, String>>,
    /// Notification writers share it; compaction takes it exclusively so no
    /// notification is appended between its snapshot and the swap.
    pub(super) side_writes: RwLock<()>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    pub(super) policy: BookingPolicy,
}

/// State rebuilt from the log before the engine goes live.
#[derive(Default)]
struct Replayed {
    calendar: CalendarSnapshot,
    ledger: ReservationStore,
    notifications: HashMap<Ulid, Notification>,
    settings: HashMap<String, String>,
}

impl Replayed {
    fn apply(&mut self, event: &Event) {
        match event {
            Event::ScheduleReplaced { scope, periods } => {
                self.calendar = self.calendar.replaced(*scope, periods.clone());
            }
            Event::NotificationCreated {
                id,
                recipient,
                message,
                created_at,
            } => {
                self.notifications.insert(
                    *id,
                    Notification {
                        id: *id,
                        recipient: recipient.clone(),
                        message: message.clone(),
                        is_read: false,
                        created_at: *created_at,
                    },
                );
            }
            Event::NotificationRead { id } => {
                if let Some(n) = self.notifications.get_mut(id) {
                    n.is_read = true;
                }
            }
            Event::SettingPut { key, value } => {
                self.settings.insert(key.clone(), value.clone());
            }
            reservation_event => self.ledger.apply(reservation_event),
        }
    }
}

impl Engine {
    /// Open the engine over the WAL at `wal_path` with the default policy.
    /// Must be called inside a tokio runtime.
    pub fn new(wal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        Self::with_policy(wal_path, notify, BookingPolicy::default())
    }

    pub fn with_policy(
        wal_path: PathBuf,
        notify: Arc<NotifyHub>,
        policy: BookingPolicy,
    ) -> io::Result<Self> {
        let events = Wal::recover(&wal_path)?;
        let mut state = Replayed::default();
        for event in &events {
            state.apply(event);
        }
        tracing::debug!(
            "replayed {} events from {}: {} periods, {} reservations",
            events.len(),
            wal_path.display(),
            state.calendar.len(),
            state.ledger.len()
        );

        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        Ok(Self {
            calendar: RwLock::new(Arc::new(state.calendar)),
            ledger: RwLock::new(state.ledger),
            notifications: state.notifications.into_iter().collect(),
            settings: RwLock::new(state.settings),
            side_writes: RwLock::new(()),
            wal_tx,
            notify,
            policy,
        })
    }

    pub fn policy(&self) -> &BookingPolicy {
        &self.policy
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::StorageUnavailable("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::StorageUnavailable("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::StorageUnavailable(e.to_string()))
    }

    /// Current calendar snapshot. The lock is released before returning.
    pub(super) async fn snapshot(&self) -> Arc<CalendarSnapshot> {
        self.calendar.read().await.clone()
    }
}
