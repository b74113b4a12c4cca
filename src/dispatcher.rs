//! Event Dispatcher (spec §4.8): a periodic timer that claims the
//! earliest due `UNDONE` event and spawns its handler on the lease
//! manager, without joining it.

use crate::manager::LeaseManager;
use crate::model::{Event, EventStatus, Moment};
use crate::persistence::{EventFilters, Persistence, SortDir};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub struct Dispatcher {
    persistence: Arc<dyn Persistence>,
    manager: Arc<LeaseManager>,
    tick: Duration,
}

impl Dispatcher {
    pub fn new(persistence: Arc<dyn Persistence>, manager: Arc<LeaseManager>, tick: Duration) -> Self {
        Self { persistence, manager, tick }
    }

    /// Runs one iteration (spec §4.8 steps 1-6). Returns whether an event
    /// was claimed and handed off, mostly useful to tests and the run loop.
    pub async fn tick_once(&self) -> bool {
        let due = match self.claim_due_event().await {
            Ok(Some(event)) => event,
            Ok(None) => return false,
            Err(e) => {
                log::error!("dispatcher failed to query the event queue: {e}");
                return false;
            }
        };

        let manager = self.manager.clone();
        let persistence = self.persistence.clone();
        let event_id = due.id;
        tokio::spawn(async move {
            if let Err(e) = manager.handle_event(due).await {
                log::error!("event {event_id} handler failed: {e}");
                persistence.event_update(event_id, Some(EventStatus::Error), None).await.ok();
            }
        });
        true
    }

    /// Queries the earliest `UNDONE` event and, if its time has come,
    /// atomically transitions it to `IN_PROGRESS` (spec §4.8 steps 1-3).
    async fn claim_due_event(&self) -> crate::error::Result<Option<Event>> {
        let mut filters = EventFilters::new();
        filters.insert("status".to_string(), "UNDONE".to_string());
        let Some(event) = self.persistence.event_get_first_sorted_by_filters("time", SortDir::Asc, &filters).await? else {
            return Ok(None);
        };
        if event.time > Moment::now() {
            return Ok(None);
        }
        let claimed = self.persistence.event_update(event.id, Some(EventStatus::InProgress), None).await?;
        Ok(Some(claimed))
    }

    /// Runs forever at the configured interval until `shutdown` fires
    /// (spec §5: "the dispatcher must be safe to run as a singleton").
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.tick);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick_once().await;
                }
                _ = shutdown.changed() => {
                    log::info!("dispatcher shutting down");
                    break;
                }
            }
        }
    }
}
