//! Lease Manager (spec §4.7): the RPC-facing entry point — lease CRUD,
//! date invariants, reservation fan-out to resource plugins, and the
//! event-queue bookkeeping that accompanies every lifecycle transition.

use crate::error::{Error, Result};
use crate::model::*;
use crate::notification::NotificationSink;
use crate::persistence::Persistence;
use crate::plugins::{PluginRegistry, ReservationRequest, ReservationUpdate};
use crate::trust::TrustProvider;
use chrono::Duration;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ReservationSpec {
    pub resource_type: String,
    pub params: Value,
}

#[derive(Debug, Clone)]
pub struct CreateLeaseValues {
    pub name: String,
    pub trust_id: String,
    pub start_date: String,
    pub end_date: String,
    pub before_end_notification: Option<String>,
    pub reservations: Vec<ReservationSpec>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateLeaseValues {
    pub name: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub before_end_notification: Option<String>,
}

pub struct LeaseManager {
    persistence: Arc<dyn Persistence>,
    plugins: Arc<PluginRegistry>,
    notifications: Arc<dyn NotificationSink>,
    trust: Arc<dyn TrustProvider>,
    notify_hours_before_lease_end: i64,
}

impl LeaseManager {
    pub fn new(
        persistence: Arc<dyn Persistence>,
        plugins: Arc<PluginRegistry>,
        notifications: Arc<dyn NotificationSink>,
        trust: Arc<dyn TrustProvider>,
        notify_hours_before_lease_end: i64,
    ) -> Self {
        Self { persistence, plugins, notifications, trust, notify_hours_before_lease_end }
    }

    pub async fn get_lease(&self, id: LeaseId) -> Result<Lease> {
        self.persistence.lease_get(id).await?.ok_or_else(|| Error::LeaseNotFound { lease_id: id.to_string() })
    }

    pub async fn list_leases(&self, project_id: Option<&str>) -> Result<Vec<Lease>> {
        self.persistence.lease_list(project_id).await
    }

    /// Plugin-specific RPC, forwarded verbatim (spec §4.7: `"<rt>:<method>"`).
    pub async fn dispatch(&self, call: &str, values: Value) -> Result<Value> {
        self.plugins.dispatch(call, values).await
    }

    fn parse_date(raw: &str, now: Moment) -> Result<Moment> {
        if raw == "now" {
            return Ok(now);
        }
        Moment::parse(raw).ok_or_else(|| Error::InvalidDate { date: raw.to_string(), date_format: Moment::FORMAT.to_string() })
    }

    pub async fn create_lease(&self, values: CreateLeaseValues) -> Result<Lease> {
        if values.trust_id.is_empty() {
            return Err(Error::MissingTrustId);
        }
        let trust = self.trust.scoped(&values.trust_id).await?;
        let now = Moment::now();
        let start_date = Self::parse_date(&values.start_date, now)?;
        let end_date = Self::parse_date(&values.end_date, now)?;
        if start_date < now {
            return Err(Error::InvalidDate { date: values.start_date.clone(), date_format: "start_date must not be in the past".to_string() });
        }
        if start_date > end_date {
            return Err(Error::InvalidRange);
        }

        let lease_id = Uuid::new_v4();
        let lease = Lease {
            id: lease_id,
            name: values.name.clone(),
            project_id: trust.project_id.clone(),
            user_id: trust.user_id.clone(),
            trust_id: values.trust_id.clone(),
            start_date,
            end_date,
            reservations: Vec::new(),
            events: Vec::new(),
        };
        self.persistence.lease_create(lease.clone()).await?;
        self.persistence
            .lease_state_save(LeaseState { lease_id, action: LeaseAction::Create, status: LeaseStateStatus::InProgress, status_reason: String::new() })
            .await?;

        if let Err(e) = self.fan_out_create(&lease, &values).await {
            self.persistence.lease_destroy(lease_id).await.ok();
            return Err(e);
        }

        let events = match self.create_lifecycle_events(&lease, &values, now).await {
            Ok(events) => events,
            Err(e) => {
                self.persistence.lease_destroy(lease_id).await.ok();
                return Err(e);
            }
        };

        let reservations = self.persistence.reservation_get_all_by_lease_id(lease_id).await?;
        let mut saved_lease = lease;
        saved_lease.events = events.iter().map(|e| e.id).collect();
        saved_lease.reservations = reservations.iter().map(|r| r.id).collect();
        let saved_lease = self.persistence.lease_update(lease_id, saved_lease).await?;

        self.persistence
            .lease_state_save(LeaseState { lease_id, action: LeaseAction::Create, status: LeaseStateStatus::Complete, status_reason: String::new() })
            .await?;
        self.notifications.send(&saved_lease, &["create"]).await;
        Ok(saved_lease)
    }

    async fn fan_out_create(&self, lease: &Lease, values: &CreateLeaseValues) -> Result<()> {
        for spec in &values.reservations {
            let plugin = self.plugins.get(&spec.resource_type)?;
            let request = ReservationRequest {
                lease_id: lease.id,
                project_id: lease.project_id.clone(),
                user_id: lease.user_id.clone(),
                start_date: lease.start_date,
                end_date: lease.end_date,
                params: spec.params.clone(),
            };
            plugin.create_reservation(request).await?;
        }
        Ok(())
    }

    /// Inserts the mandatory `start_lease`/`end_lease` events and, when
    /// notification is enabled, the optional `before_end_lease` event
    /// (spec §4.7 "Event creation on lease creation").
    async fn create_lifecycle_events(&self, lease: &Lease, values: &CreateLeaseValues, now: Moment) -> Result<Vec<Event>> {
        let mut events = vec![
            self.persistence
                .event_create(Event { id: Uuid::new_v4(), lease_id: lease.id, event_type: EventType::StartLease, time: lease.start_date, status: EventStatus::Undone })
                .await?,
            self.persistence
                .event_create(Event { id: Uuid::new_v4(), lease_id: lease.id, event_type: EventType::EndLease, time: lease.end_date, status: EventStatus::Undone })
                .await?,
        ];

        if values.before_end_notification.is_none() && self.notify_hours_before_lease_end == 0 {
            return Ok(events);
        }

        let mut before_end = match &values.before_end_notification {
            Some(raw) => {
                let parsed = Self::parse_date(raw, now)?;
                if !(parsed > lease.start_date && parsed < lease.end_date) {
                    return Err(Error::InvalidDate {
                        date: parsed.format(),
                        date_format: "before_end_notification must fall strictly within (start_date, end_date)".to_string(),
                    });
                }
                parsed
            }
            None => lease.end_date - Duration::hours(self.notify_hours_before_lease_end),
        };
        if before_end < lease.start_date {
            log::warn!("before_end_lease time for lease {} clamped to start_date", lease.id);
            before_end = lease.start_date;
        }
        events.push(
            self.persistence
                .event_create(Event { id: Uuid::new_v4(), lease_id: lease.id, event_type: EventType::BeforeEndLease, time: before_end, status: EventStatus::Undone })
                .await?,
        );
        Ok(events)
    }

    pub async fn update_lease(&self, lease_id: LeaseId, values: UpdateLeaseValues) -> Result<Lease> {
        let mut lease = self.get_lease(lease_id).await?;

        if values.start_date.is_none() && values.end_date.is_none() && values.before_end_notification.is_none() {
            if let Some(name) = values.name {
                lease.name = name;
                return self.persistence.lease_update(lease_id, lease).await;
            }
            return Ok(lease);
        }

        let now = Moment::now();
        let phase = lease.phase(now);
        let old_start = lease.start_date;
        let old_end = lease.end_date;

        let new_start = match &values.start_date {
            Some(raw) => {
                if phase != LeaseStatusKind::Pending {
                    return Err(Error::InvalidState { id: lease_id.to_string(), state: "start_date is immutable once the lease has started".to_string() });
                }
                let parsed = Self::parse_date(raw, now)?;
                if parsed < now {
                    return Err(Error::InvalidDate { date: raw.clone(), date_format: "start_date must not be in the past".to_string() });
                }
                parsed
            }
            None => old_start,
        };

        if phase == LeaseStatusKind::Terminal && (values.end_date.is_some() || values.before_end_notification.is_some()) {
            return Err(Error::InvalidState { id: lease_id.to_string(), state: "lease has ended, only renames are allowed".to_string() });
        }

        let new_end = match &values.end_date {
            Some(raw) => {
                let parsed = Self::parse_date(raw, now)?;
                if parsed < now || parsed < new_start {
                    return Err(Error::InvalidRange);
                }
                parsed
            }
            None => old_end,
        };

        if let Some(name) = &values.name {
            lease.name = name.clone();
        }

        let reservations = self.persistence.reservation_get_all_by_lease_id(lease_id).await?;
        for reservation in &reservations {
            let plugin = self.plugins.get(&reservation.resource_type)?;
            let update = ReservationUpdate { old_start_date: old_start, old_end_date: old_end, new_start_date: new_start, new_end_date: new_end, params: Value::Null };
            plugin.update_reservation(reservation.id, update).await?;
        }

        let events = self.persistence.event_get_all_by_lease(lease_id).await?;
        let start_event = events.iter().find(|e| e.event_type == EventType::StartLease).ok_or_else(|| Error::EventError { error: "lease has no start_lease event".to_string() })?;
        let end_event = events.iter().find(|e| e.event_type == EventType::EndLease).ok_or_else(|| Error::EventError { error: "lease has no end_lease event".to_string() })?;
        self.persistence.event_update(start_event.id, None, Some(new_start)).await?;
        self.persistence.event_update(end_event.id, None, Some(new_end)).await?;

        if let Some(before_end_event) = events.iter().find(|e| e.event_type == EventType::BeforeEndLease) {
            let mut new_time = match &values.before_end_notification {
                Some(raw) => Self::parse_date(raw, now)?,
                None => new_end - (old_end - before_end_event.time),
            };
            if new_time < new_start {
                new_time = new_start;
            }
            let mut reset_status = None;
            if before_end_event.status == EventStatus::Done {
                reset_status = Some(EventStatus::Undone);
                self.notifications.send(&lease, &["event.before_end_lease.stop"]).await;
            }
            self.persistence.event_update(before_end_event.id, reset_status, Some(new_time)).await?;
        }

        lease.start_date = new_start;
        lease.end_date = new_end;
        let updated = self.persistence.lease_update(lease_id, lease).await?;
        self.notifications.send(&updated, &["update"]).await;
        Ok(updated)
    }

    pub async fn delete_lease(&self, lease_id: LeaseId) -> Result<()> {
        let lease = self.get_lease(lease_id).await?;
        let now = Moment::now();
        if lease.phase(now) == LeaseStatusKind::Active {
            return Err(Error::NotAuthorized { reason: "cannot delete a running lease".to_string() });
        }

        let reservations = self.persistence.reservation_get_all_by_lease_id(lease_id).await?;
        for reservation in reservations {
            let plugin = self.plugins.get(&reservation.resource_type)?;
            plugin.on_end(&reservation.resource_id).await?;
        }

        self.persistence.lease_destroy(lease_id).await?;
        self.notifications.send(&lease, &["delete"]).await;
        Ok(())
    }

    /// Resolves the type-specific handler for `event` (spec §4.8 step 4)
    /// and runs it under a trust-derived context (spec §4.9).
    pub async fn handle_event(&self, event: Event) -> Result<()> {
        let lease = self.get_lease(event.lease_id).await?;
        let _context = self.trust.scoped(&lease.trust_id).await?;
        self.notifications.send(&lease, &[&format!("event.{}", event.event_type.as_str())]).await;

        match event.event_type {
            EventType::StartLease => self.basic_action(event, LeaseAction::Start, ReservationStatus::Active).await,
            EventType::EndLease => self.basic_action(event, LeaseAction::Stop, ReservationStatus::Completed).await,
            EventType::BeforeEndLease => self.before_end_lease(event).await,
        }
    }

    /// Common routine behind `start_lease`/`end_lease` (spec §4.7): runs
    /// `on_start`/`on_end` across every reservation, letting one
    /// reservation's failure mark only that reservation and the event as
    /// errored while its siblings continue.
    async fn basic_action(&self, event: Event, action: LeaseAction, success_status: ReservationStatus) -> Result<()> {
        self.persistence.lease_state_save(LeaseState { lease_id: event.lease_id, action, status: LeaseStateStatus::InProgress, status_reason: String::new() }).await?;

        let reservations = self.persistence.reservation_get_all_by_lease_id(event.lease_id).await?;
        let mut any_failed = false;
        for reservation in reservations {
            let plugin = match self.plugins.get(&reservation.resource_type) {
                Ok(plugin) => plugin,
                Err(e) => {
                    log::error!("reservation {} has no registered plugin: {e}", reservation.id);
                    self.persistence.reservation_update(reservation.id, ReservationStatus::Error).await.ok();
                    any_failed = true;
                    continue;
                }
            };
            let outcome = match action {
                LeaseAction::Start => plugin.on_start(&reservation.resource_id).await,
                LeaseAction::Stop => plugin.on_end(&reservation.resource_id).await,
                _ => unreachable!("basic_action is only invoked for Start/Stop"),
            };
            match outcome {
                Ok(()) => {
                    self.persistence.reservation_update(reservation.id, success_status).await?;
                }
                Err(e) => {
                    log::error!("reservation {} failed during {action:?}: {e}", reservation.id);
                    self.persistence.reservation_update(reservation.id, ReservationStatus::Error).await.ok();
                    any_failed = true;
                }
            }
        }

        if any_failed {
            self.persistence.event_update(event.id, Some(EventStatus::Error), None).await?;
            self.persistence
                .lease_state_save(LeaseState { lease_id: event.lease_id, action, status: LeaseStateStatus::Failed, status_reason: "one or more reservations failed".to_string() })
                .await?;
        } else {
            self.persistence.event_update(event.id, Some(EventStatus::Done), None).await?;
            self.persistence.lease_state_save(LeaseState { lease_id: event.lease_id, action, status: LeaseStateStatus::Complete, status_reason: String::new() }).await?;
        }
        Ok(())
    }

    async fn before_end_lease(&self, event: Event) -> Result<()> {
        self.persistence.event_update(event.id, Some(EventStatus::Done), None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::NullInventory;
    use crate::notification::{LoggingNotificationSink, RecordingNotificationSink};
    use crate::persistence::memory::MemoryPersistence;
    use crate::plugins::host::HostReservationPlugin;
    use crate::trust::StaticTrustProvider;
    use crate::usage::{MapLedger, UsageLedger};
    use serde_json::json;
    use std::collections::HashMap;

    async fn manager_with_host(persistence: Arc<MemoryPersistence>) -> LeaseManager {
        let ledger = Arc::new(MapLedger::new());
        ledger.init("proj-a", 1000.0).await.unwrap();
        let host_plugin = Arc::new(HostReservationPlugin::new(persistence.clone(), ledger, Arc::new(NullInventory), "freepool".to_string(), true, false));
        let mut registry = PluginRegistry::new();
        registry.register(host_plugin).unwrap();

        let trust = Arc::new(StaticTrustProvider::new());
        trust.register("trust-1", "proj-a", "user-1");

        LeaseManager::new(persistence, Arc::new(registry), Arc::new(LoggingNotificationSink), trust, 48)
    }

    async fn seed_host(persistence: &MemoryPersistence, name: &str) {
        persistence
            .host_create(Host {
                id: Uuid::new_v4(),
                hypervisor_hostname: name.to_string(),
                service_name: format!("nova-compute-{name}"),
                trust_id: "t".into(),
                vcpus: 8,
                memory_mb: 8192,
                local_gb: 100,
                capabilities: HashMap::new(),
            })
            .await
            .unwrap();
    }

    fn lease_request() -> CreateLeaseValues {
        CreateLeaseValues {
            name: "L1".to_string(),
            trust_id: "trust-1".to_string(),
            start_date: "now".to_string(),
            end_date: "2099-12-31 00:00".to_string(),
            before_end_notification: None,
            reservations: vec![ReservationSpec { resource_type: "physical:host".to_string(), params: json!({"min": "1", "max": "1", "hypervisor_properties": "[]", "resource_properties": "[]"}) }],
        }
    }

    #[tokio::test]
    async fn create_lease_persists_events_and_reservation() {
        let persistence = Arc::new(MemoryPersistence::new());
        seed_host(&persistence, "h1").await;
        let manager = manager_with_host(persistence.clone()).await;

        let lease = manager.create_lease(lease_request()).await.unwrap();
        assert_eq!(lease.events.len(), 2);
        assert_eq!(lease.reservations.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_lease_name_fails_and_leaves_first_intact() {
        let persistence = Arc::new(MemoryPersistence::new());
        seed_host(&persistence, "h1").await;
        seed_host(&persistence, "h2").await;
        let manager = manager_with_host(persistence.clone()).await;

        let first = manager.create_lease(lease_request()).await.unwrap();
        let err = manager.create_lease(lease_request()).await.unwrap_err();
        assert!(matches!(err, Error::LeaseNameAlreadyExists { .. }));

        let still_there = manager.get_lease(first.id).await.unwrap();
        assert_eq!(still_there.id, first.id);
    }

    #[tokio::test]
    async fn start_event_activates_reservation_and_pool() {
        let persistence = Arc::new(MemoryPersistence::new());
        seed_host(&persistence, "h1").await;
        let manager = manager_with_host(persistence.clone()).await;

        let mut request = lease_request();
        request.start_date = "2020-01-01 00:00".to_string();
        let lease = manager.create_lease(request).await.unwrap();

        let events = persistence.event_get_all_by_lease(lease.id).await.unwrap();
        let start_event = events.iter().find(|e| e.event_type == EventType::StartLease).unwrap().clone();
        manager.handle_event(start_event.clone()).await.unwrap();

        let updated_event = persistence.event_get(start_event.id).await.unwrap().unwrap();
        assert_eq!(updated_event.status, EventStatus::Done);

        let reservations = persistence.reservation_get_all_by_lease_id(lease.id).await.unwrap();
        assert_eq!(reservations[0].status, ReservationStatus::Active);
    }

    #[tokio::test]
    async fn create_lease_rejects_insufficient_budget_without_persisting_reservation() {
        let persistence = Arc::new(MemoryPersistence::new());
        seed_host(&persistence, "h1").await;
        let ledger = Arc::new(MapLedger::new());
        ledger.init("proj-a", 1.0).await.unwrap();
        let host_plugin = Arc::new(HostReservationPlugin::new(persistence.clone(), ledger, Arc::new(NullInventory), "freepool".to_string(), true, false));
        let mut registry = PluginRegistry::new();
        registry.register(host_plugin).unwrap();
        let trust = Arc::new(StaticTrustProvider::new());
        trust.register("trust-1", "proj-a", "user-1");
        let manager = LeaseManager::new(persistence.clone(), Arc::new(registry), Arc::new(LoggingNotificationSink), trust, 48);

        let err = manager.create_lease(lease_request()).await.unwrap_err();
        assert!(matches!(err, Error::NotAuthorized { .. }));
        assert!(persistence.lease_get_by_name("L1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_and_delete_lease_send_singly_prefixed_notifications() {
        let persistence = Arc::new(MemoryPersistence::new());
        seed_host(&persistence, "h1").await;
        let ledger = Arc::new(MapLedger::new());
        ledger.init("proj-a", 1000.0).await.unwrap();
        let host_plugin = Arc::new(HostReservationPlugin::new(persistence.clone(), ledger, Arc::new(NullInventory), "freepool".to_string(), true, false));
        let mut registry = PluginRegistry::new();
        registry.register(host_plugin).unwrap();
        let trust = Arc::new(StaticTrustProvider::new());
        trust.register("trust-1", "proj-a", "user-1");
        let notifications = Arc::new(RecordingNotificationSink::new());
        let manager = LeaseManager::new(persistence.clone(), Arc::new(registry), notifications.clone(), trust, 48);

        let mut request = lease_request();
        request.start_date = "2099-01-01 00:00".to_string();
        let lease = manager.create_lease(request).await.unwrap();
        manager.delete_lease(lease.id).await.unwrap();

        let sent = notifications.sent.lock().unwrap().clone();
        assert_eq!(sent, vec!["lease.create".to_string(), "lease.delete".to_string()]);
    }
}
