//! Persistence Contract (spec §4.2): abstract CRUD over leases, events,
//! reservations, host allocations, the host catalog, extra capabilities,
//! and named host pools, plus the two ordered queries the dispatcher and
//! host matcher depend on.
//!
//! The concrete storage engine is out of scope (spec §1); this crate ships
//! one in-memory reference implementation (`memory::MemoryPersistence`)
//! used by tests and local runs.

pub mod memory;

use crate::error::Result;
use crate::model::*;
use async_trait::async_trait;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

/// Equality filters applied to `Event` rows, e.g. `{"status": "UNDONE"}`.
pub type EventFilters = HashMap<String, String>;

#[async_trait]
pub trait Persistence: Send + Sync {
    // --- leases ---
    async fn lease_create(&self, lease: Lease) -> Result<Lease>;
    async fn lease_get(&self, id: LeaseId) -> Result<Option<Lease>>;
    async fn lease_get_by_name(&self, name: &str) -> Result<Option<Lease>>;
    async fn lease_list(&self, project_id: Option<&str>) -> Result<Vec<Lease>>;
    async fn lease_update(&self, id: LeaseId, lease: Lease) -> Result<Lease>;
    async fn lease_destroy(&self, id: LeaseId) -> Result<()>;

    // --- lease state projection ---
    async fn lease_state_save(&self, state: LeaseState) -> Result<()>;
    async fn lease_state_get(&self, lease_id: LeaseId) -> Result<Option<LeaseState>>;

    // --- events ---
    async fn event_create(&self, event: Event) -> Result<Event>;
    async fn event_get(&self, id: EventId) -> Result<Option<Event>>;
    async fn event_update(&self, id: EventId, status: Option<EventStatus>, time: Option<Moment>) -> Result<Event>;
    async fn event_get_all_by_lease(&self, lease_id: LeaseId) -> Result<Vec<Event>>;
    async fn event_get_first_sorted_by_filters(
        &self,
        sort_key: &str,
        sort_dir: SortDir,
        filters: &EventFilters,
    ) -> Result<Option<Event>>;

    // --- reservations ---
    async fn reservation_create(&self, reservation: Reservation) -> Result<Reservation>;
    async fn reservation_get(&self, id: ReservationId) -> Result<Option<Reservation>>;
    async fn reservation_update(&self, id: ReservationId, status: ReservationStatus) -> Result<Reservation>;
    async fn reservation_get_all_by_lease_id(&self, lease_id: LeaseId) -> Result<Vec<Reservation>>;
    async fn reservation_get_all_by_resource_id(&self, resource_id: &str) -> Result<Vec<Reservation>>;

    // --- host reservations ---
    async fn host_reservation_create(&self, hr: HostReservation) -> Result<HostReservation>;
    async fn host_reservation_get_by_reservation_id(&self, reservation_id: ReservationId) -> Result<Option<HostReservation>>;
    async fn host_reservation_update(&self, id: uuid::Uuid, status: ReservationStatus) -> Result<HostReservation>;

    // --- host allocations ---
    async fn host_allocation_create(&self, alloc: HostAllocation) -> Result<HostAllocation>;
    async fn host_allocation_destroy(&self, id: uuid::Uuid) -> Result<()>;
    async fn host_allocation_get_all_by_host(&self, compute_host_id: HostId) -> Result<Vec<HostAllocation>>;
    async fn host_allocation_get_all_by_reservation(&self, reservation_id: ReservationId) -> Result<Vec<HostAllocation>>;

    /// Maximal free sub-intervals of `[start,end]` at least `min_duration`
    /// long, given this host's recorded allocations (spec §4.2).
    async fn get_free_periods(
        &self,
        host_id: HostId,
        start: Moment,
        end: Moment,
        min_duration: chrono::Duration,
    ) -> Result<Vec<(Moment, Moment)>>;

    /// Symmetric: maximal allocated sub-intervals.
    async fn get_full_periods(
        &self,
        host_id: HostId,
        start: Moment,
        end: Moment,
        min_duration: chrono::Duration,
    ) -> Result<Vec<(Moment, Moment)>>;

    // --- host catalog ---
    async fn host_create(&self, host: Host) -> Result<Host>;
    async fn host_get(&self, id: HostId) -> Result<Option<Host>>;
    async fn host_update(&self, id: HostId, host: Host) -> Result<Host>;
    async fn host_destroy(&self, id: HostId) -> Result<()>;
    async fn host_list(&self) -> Result<Vec<Host>>;
    /// Hosts whose `attributes()` satisfy every filter string (each of the
    /// form `"key op literal"`, as emitted by [`crate::requirements`]).
    async fn host_get_all_by_queries(&self, filters: &[String]) -> Result<Vec<Host>>;

    // --- named host pools / aggregates ---
    async fn pool_create(&self, name: &str) -> Result<()>;
    async fn pool_delete(&self, name: &str) -> Result<()>;
    async fn pool_exists(&self, name: &str) -> Result<bool>;
    async fn pool_add_host(&self, name: &str, service_name: &str) -> Result<()>;
    async fn pool_remove_host(&self, name: &str, service_name: &str) -> Result<()>;
    async fn pool_get_hosts(&self, name: &str) -> Result<Vec<String>>;
}
