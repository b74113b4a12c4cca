//! End-to-end scenarios driving the public API the way an RPC transport
//! would: build a manager, create/update/delete leases, tick the
//! dispatcher, and assert on persisted state.

use lease_scheduler::inventory::NullInventory;
use lease_scheduler::manager::{CreateLeaseValues, LeaseManager, ReservationSpec};
use lease_scheduler::model::*;
use lease_scheduler::notification::LoggingNotificationSink;
use lease_scheduler::persistence::memory::MemoryPersistence;
use lease_scheduler::persistence::Persistence;
use lease_scheduler::plugins::host::HostReservationPlugin;
use lease_scheduler::plugins::PluginRegistry;
use lease_scheduler::trust::StaticTrustProvider;
use lease_scheduler::usage::{MapLedger, UsageLedger};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

fn host(name: &str) -> Host {
    Host { id: Uuid::new_v4(), hypervisor_hostname: name.to_string(), service_name: format!("nova-compute-{name}"), trust_id: "t".into(), vcpus: 8, memory_mb: 8192, local_gb: 100, capabilities: HashMap::new() }
}

async fn build(persistence: Arc<MemoryPersistence>, balance: f64) -> LeaseManager {
    let ledger = Arc::new(MapLedger::new());
    ledger.init("proj-a", balance).await.unwrap();
    let plugin = Arc::new(HostReservationPlugin::new(persistence.clone(), ledger, Arc::new(NullInventory), "freepool".to_string(), true, false));
    let mut registry = PluginRegistry::new();
    registry.register(plugin).unwrap();
    let trust = Arc::new(StaticTrustProvider::new());
    trust.register("trust-1", "proj-a", "user-1");
    LeaseManager::new(persistence, Arc::new(registry), Arc::new(LoggingNotificationSink), trust, 48)
}

fn host_reservation(min: &str, max: &str) -> ReservationSpec {
    ReservationSpec { resource_type: "physical:host".to_string(), params: json!({"min": min, "max": max, "hypervisor_properties": "[]", "resource_properties": "[]"}) }
}

fn basic_lease_request(start: &str, end: &str) -> CreateLeaseValues {
    CreateLeaseValues { name: "L1".to_string(), trust_id: "trust-1".to_string(), start_date: start.to_string(), end_date: end.to_string(), before_end_notification: None, reservations: vec![host_reservation("1", "1")] }
}

#[tokio::test]
async fn scenario_create_basic_lease() {
    let persistence = Arc::new(MemoryPersistence::new());
    persistence.host_create(host("h1")).await.unwrap();
    let manager = build(persistence.clone(), 1000.0).await;

    let lease = manager.create_lease(basic_lease_request("now", "2099-12-31 00:00")).await.unwrap();
    assert_eq!(lease.events.len(), 2);

    let reservations = persistence.reservation_get_all_by_lease_id(lease.id).await.unwrap();
    assert_eq!(reservations.len(), 1);
    assert_eq!(reservations[0].status, ReservationStatus::Pending);

    let allocations = persistence.host_allocation_get_all_by_reservation(reservations[0].id).await.unwrap();
    assert_eq!(allocations.len(), 1);

    let events = persistence.event_get_all_by_lease(lease.id).await.unwrap();
    assert!(events.iter().all(|e| e.status == EventStatus::Undone));
}

#[tokio::test]
async fn scenario_duplicate_name_keeps_first_lease_intact() {
    let persistence = Arc::new(MemoryPersistence::new());
    persistence.host_create(host("h1")).await.unwrap();
    persistence.host_create(host("h2")).await.unwrap();
    let manager = build(persistence.clone(), 1000.0).await;

    let first = manager.create_lease(basic_lease_request("now", "2099-12-31 00:00")).await.unwrap();
    let err = manager.create_lease(basic_lease_request("now", "2099-12-31 00:00")).await.unwrap_err();
    assert!(matches!(err, lease_scheduler::error::Error::LeaseNameAlreadyExists { .. }));

    let still_there = manager.get_lease(first.id).await.unwrap();
    assert_eq!(still_there.events.len(), 2);
}

#[tokio::test]
async fn scenario_start_event_fires_and_activates_reservation() {
    let persistence = Arc::new(MemoryPersistence::new());
    persistence.host_create(host("h1")).await.unwrap();
    let manager = build(persistence.clone(), 1000.0).await;

    let lease = manager.create_lease(basic_lease_request("2020-01-01 00:00", "2099-12-31 00:00")).await.unwrap();
    let events = persistence.event_get_all_by_lease(lease.id).await.unwrap();
    let start_event = events.into_iter().find(|e| e.event_type == EventType::StartLease).unwrap();

    manager.handle_event(start_event.clone()).await.unwrap();

    let updated = persistence.event_get(start_event.id).await.unwrap().unwrap();
    assert_eq!(updated.status, EventStatus::Done);

    let reservations = persistence.reservation_get_all_by_lease_id(lease.id).await.unwrap();
    assert_eq!(reservations[0].status, ReservationStatus::Active);

    let pool_hosts = persistence.pool_get_hosts(&reservations[0].resource_id).await.unwrap();
    assert_eq!(pool_hosts, vec!["nova-compute-h1".to_string()]);
}

#[tokio::test]
async fn scenario_insufficient_budget_blocks_reservation() {
    let persistence = Arc::new(MemoryPersistence::new());
    persistence.host_create(host("h1")).await.unwrap();
    persistence.host_create(host("h2")).await.unwrap();
    let manager = build(persistence.clone(), 10.0).await;

    let request = CreateLeaseValues {
        name: "L1".to_string(),
        trust_id: "trust-1".to_string(),
        start_date: "2024-01-01 00:00".to_string(),
        end_date: "2024-01-01 06:00".to_string(),
        before_end_notification: None,
        reservations: vec![host_reservation("2", "2")],
    };

    let err = manager.create_lease(request).await.unwrap_err();
    assert!(matches!(err, lease_scheduler::error::Error::NotAuthorized { .. }));
    assert!(persistence.lease_get_by_name("L1").await.unwrap().is_none());
}

#[tokio::test]
async fn scenario_requirements_parse() {
    use lease_scheduler::requirements::translate;
    let ok = translate(r#"["and", [">", "$memory", "4096"], [">", "$disk", "40"]]"#).unwrap();
    assert_eq!(ok, vec!["memory > 4096".to_string(), "disk > 40".to_string()]);

    let err = translate(r#"["=", "memory", "4096"]"#).unwrap_err();
    assert!(matches!(err, lease_scheduler::error::Error::MalformedRequirements { .. }));
}

#[tokio::test]
async fn scenario_delete_lease_cleans_up_pending_reservation() {
    let persistence = Arc::new(MemoryPersistence::new());
    persistence.host_create(host("h1")).await.unwrap();
    let manager = build(persistence.clone(), 1000.0).await;

    let lease = manager.create_lease(basic_lease_request("2099-01-01 00:00", "2099-12-31 00:00")).await.unwrap();
    manager.delete_lease(lease.id).await.unwrap();
    assert!(persistence.lease_get(lease.id).await.unwrap().is_none());
}

#[tokio::test]
async fn scenario_delete_running_lease_is_forbidden() {
    let persistence = Arc::new(MemoryPersistence::new());
    persistence.host_create(host("h1")).await.unwrap();
    let manager = build(persistence.clone(), 1000.0).await;

    let lease = manager.create_lease(basic_lease_request("2020-01-01 00:00", "2099-12-31 00:00")).await.unwrap();
    let err = manager.delete_lease(lease.id).await.unwrap_err();
    assert!(matches!(err, lease_scheduler::error::Error::NotAuthorized { .. }));
}
