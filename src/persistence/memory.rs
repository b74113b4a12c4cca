//! In-memory reference `Persistence` implementation.
//!
//! Modeled on the teacher repo's `ResourceStore` (a single
//! `Arc<RwLock<StoreInner>>` guarding a handful of maps), but keyed by the
//! stable `Uuid`s that cross the RPC boundary rather than `slotmap`'s
//! opaque generational keys — see DESIGN.md for why `slotmap` was dropped
//! for this module.

use super::{EventFilters, Persistence, SortDir};
use crate::error::{Error, Result};
use crate::model::*;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

#[derive(Default)]
struct StoreInner {
    leases: HashMap<LeaseId, Lease>,
    lease_names: HashMap<String, LeaseId>,
    lease_states: HashMap<LeaseId, LeaseState>,
    events: HashMap<EventId, Event>,
    reservations: HashMap<ReservationId, Reservation>,
    host_reservations: HashMap<Uuid, HostReservation>,
    host_reservations_by_reservation: HashMap<ReservationId, Uuid>,
    host_allocations: HashMap<Uuid, HostAllocation>,
    hosts: HashMap<HostId, Host>,
    pools: HashMap<String, Vec<String>>,
}

#[derive(Clone, Default)]
pub struct MemoryPersistence {
    inner: Arc<RwLock<StoreInner>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap()
    }
}

/// Computes the maximal sub-intervals of `[start, end]` at least
/// `min_duration` long that are free of `busy` intervals, which are
/// assumed pairwise non-overlapping but not necessarily sorted.
fn free_periods(start: Moment, end: Moment, min_duration: chrono::Duration, busy: &mut [(Moment, Moment)]) -> Vec<(Moment, Moment)> {
    busy.sort_by_key(|(s, _)| *s);
    let mut free = Vec::new();
    let mut cursor = start;
    for &(bs, be) in busy.iter() {
        if bs > cursor {
            let gap_end = bs.min(end);
            if gap_end > cursor {
                free.push((cursor, gap_end));
            }
        }
        if be > cursor {
            cursor = be;
        }
        if cursor >= end {
            break;
        }
    }
    if cursor < end {
        free.push((cursor, end));
    }
    free.into_iter().filter(|(s, e)| *e - *s >= min_duration).collect()
}

/// Symmetric: the maximal sub-intervals of `[start, end]` covered by
/// `busy`, merging adjacent/overlapping entries.
fn full_periods(start: Moment, end: Moment, min_duration: chrono::Duration, busy: &mut [(Moment, Moment)]) -> Vec<(Moment, Moment)> {
    busy.sort_by_key(|(s, _)| *s);
    let mut merged: Vec<(Moment, Moment)> = Vec::new();
    for &(bs, be) in busy.iter() {
        let cs = bs.max(start);
        let ce = be.min(end);
        if cs >= ce {
            continue;
        }
        match merged.last_mut() {
            Some((_, last_end)) if cs <= *last_end => {
                if ce > *last_end {
                    *last_end = ce;
                }
            }
            _ => merged.push((cs, ce)),
        }
    }
    merged.into_iter().filter(|(s, e)| *e - *s >= min_duration).collect()
}

fn eq_filter(value: &str, field: &str) -> bool {
    value == field
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn lease_create(&self, lease: Lease) -> Result<Lease> {
        let mut store = self.write();
        if store.lease_names.contains_key(&lease.name) {
            return Err(Error::LeaseNameAlreadyExists { name: lease.name });
        }
        store.lease_names.insert(lease.name.clone(), lease.id);
        store.leases.insert(lease.id, lease.clone());
        Ok(lease)
    }

    async fn lease_get(&self, id: LeaseId) -> Result<Option<Lease>> {
        Ok(self.read().leases.get(&id).cloned())
    }

    async fn lease_get_by_name(&self, name: &str) -> Result<Option<Lease>> {
        let store = self.read();
        Ok(store.lease_names.get(name).and_then(|id| store.leases.get(id)).cloned())
    }

    async fn lease_list(&self, project_id: Option<&str>) -> Result<Vec<Lease>> {
        let store = self.read();
        Ok(store
            .leases
            .values()
            .filter(|l| project_id.map(|p| l.project_id == p).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn lease_update(&self, id: LeaseId, lease: Lease) -> Result<Lease> {
        let mut store = self.write();
        if !store.leases.contains_key(&id) {
            return Err(Error::LeaseNotFound { lease_id: id.to_string() });
        }
        store.leases.insert(id, lease.clone());
        Ok(lease)
    }

    async fn lease_destroy(&self, id: LeaseId) -> Result<()> {
        let mut store = self.write();
        if let Some(lease) = store.leases.remove(&id) {
            store.lease_names.remove(&lease.name);
            for event_id in &lease.events {
                store.events.remove(event_id);
            }
            for reservation_id in &lease.reservations {
                store.reservations.remove(reservation_id);
            }
        }
        store.lease_states.remove(&id);
        Ok(())
    }

    async fn lease_state_save(&self, state: LeaseState) -> Result<()> {
        self.write().lease_states.insert(state.lease_id, state);
        Ok(())
    }

    async fn lease_state_get(&self, lease_id: LeaseId) -> Result<Option<LeaseState>> {
        Ok(self.read().lease_states.get(&lease_id).cloned())
    }

    async fn event_create(&self, event: Event) -> Result<Event> {
        self.write().events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn event_get(&self, id: EventId) -> Result<Option<Event>> {
        Ok(self.read().events.get(&id).cloned())
    }

    async fn event_update(&self, id: EventId, status: Option<EventStatus>, time: Option<Moment>) -> Result<Event> {
        let mut store = self.write();
        let event = store.events.get_mut(&id).ok_or_else(|| Error::EventNotFound { event_id: id.to_string() })?;
        if let Some(s) = status {
            event.status = s;
        }
        if let Some(t) = time {
            event.time = t;
        }
        Ok(event.clone())
    }

    async fn event_get_all_by_lease(&self, lease_id: LeaseId) -> Result<Vec<Event>> {
        Ok(self.read().events.values().filter(|e| e.lease_id == lease_id).cloned().collect())
    }

    async fn event_get_first_sorted_by_filters(
        &self,
        sort_key: &str,
        sort_dir: SortDir,
        filters: &EventFilters,
    ) -> Result<Option<Event>> {
        let store = self.read();
        let mut candidates: Vec<&Event> = store
            .events
            .values()
            .filter(|e| {
                filters.iter().all(|(k, v)| match k.as_str() {
                    "status" => match v.as_str() {
                        "UNDONE" => e.status == EventStatus::Undone,
                        "IN_PROGRESS" => e.status == EventStatus::InProgress,
                        "DONE" => e.status == EventStatus::Done,
                        "ERROR" => e.status == EventStatus::Error,
                        _ => false,
                    },
                    "lease_id" => eq_filter(v, &e.lease_id.to_string()),
                    "event_type" => eq_filter(v, e.event_type.as_str()),
                    _ => true,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            let key = |e: &&Event| match sort_key {
                "time" => (e.time, e.id),
                "lease_id" => (e.time, e.id),
                _ => (e.time, e.id),
            };
            let (ka, kb) = (key(a), key(b));
            match sort_dir {
                SortDir::Asc => ka.cmp(&kb),
                SortDir::Desc => kb.cmp(&ka),
            }
        });

        Ok(candidates.into_iter().next().cloned())
    }

    async fn reservation_create(&self, reservation: Reservation) -> Result<Reservation> {
        self.write().reservations.insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn reservation_get(&self, id: ReservationId) -> Result<Option<Reservation>> {
        Ok(self.read().reservations.get(&id).cloned())
    }

    async fn reservation_update(&self, id: ReservationId, status: ReservationStatus) -> Result<Reservation> {
        let mut store = self.write();
        let reservation = store.reservations.get_mut(&id).ok_or_else(|| Error::ReservationNotFound { reservation_id: id.to_string() })?;
        reservation.status = status;
        Ok(reservation.clone())
    }

    async fn reservation_get_all_by_lease_id(&self, lease_id: LeaseId) -> Result<Vec<Reservation>> {
        Ok(self.read().reservations.values().filter(|r| r.lease_id == lease_id).cloned().collect())
    }

    async fn reservation_get_all_by_resource_id(&self, resource_id: &str) -> Result<Vec<Reservation>> {
        Ok(self.read().reservations.values().filter(|r| r.resource_id == resource_id).cloned().collect())
    }

    async fn host_reservation_create(&self, hr: HostReservation) -> Result<HostReservation> {
        let mut store = self.write();
        store.host_reservations_by_reservation.insert(hr.reservation_id, hr.id);
        store.host_reservations.insert(hr.id, hr.clone());
        Ok(hr)
    }

    async fn host_reservation_get_by_reservation_id(&self, reservation_id: ReservationId) -> Result<Option<HostReservation>> {
        let store = self.read();
        Ok(store.host_reservations_by_reservation.get(&reservation_id).and_then(|id| store.host_reservations.get(id)).cloned())
    }

    async fn host_reservation_update(&self, id: Uuid, status: ReservationStatus) -> Result<HostReservation> {
        let mut store = self.write();
        let hr = store.host_reservations.get_mut(&id).ok_or_else(|| Error::ReservationNotFound { reservation_id: id.to_string() })?;
        hr.status = status;
        Ok(hr.clone())
    }

    async fn host_allocation_create(&self, alloc: HostAllocation) -> Result<HostAllocation> {
        self.write().host_allocations.insert(alloc.id, alloc.clone());
        Ok(alloc)
    }

    async fn host_allocation_destroy(&self, id: Uuid) -> Result<()> {
        self.write().host_allocations.remove(&id);
        Ok(())
    }

    async fn host_allocation_get_all_by_host(&self, compute_host_id: HostId) -> Result<Vec<HostAllocation>> {
        Ok(self.read().host_allocations.values().filter(|a| a.compute_host_id == compute_host_id).cloned().collect())
    }

    async fn host_allocation_get_all_by_reservation(&self, reservation_id: ReservationId) -> Result<Vec<HostAllocation>> {
        Ok(self.read().host_allocations.values().filter(|a| a.reservation_id == reservation_id).cloned().collect())
    }

    async fn get_free_periods(&self, host_id: HostId, start: Moment, end: Moment, min_duration: chrono::Duration) -> Result<Vec<(Moment, Moment)>> {
        let allocations = self.host_allocation_get_all_by_host(host_id).await?;
        let mut busy: Vec<(Moment, Moment)> = allocations.iter().map(|a| (a.start_date, a.end_date)).collect();
        Ok(free_periods(start, end, min_duration, &mut busy))
    }

    async fn get_full_periods(&self, host_id: HostId, start: Moment, end: Moment, min_duration: chrono::Duration) -> Result<Vec<(Moment, Moment)>> {
        let allocations = self.host_allocation_get_all_by_host(host_id).await?;
        let mut busy: Vec<(Moment, Moment)> = allocations.iter().map(|a| (a.start_date, a.end_date)).collect();
        Ok(full_periods(start, end, min_duration, &mut busy))
    }

    async fn host_create(&self, host: Host) -> Result<Host> {
        self.write().hosts.insert(host.id, host.clone());
        Ok(host)
    }

    async fn host_get(&self, id: HostId) -> Result<Option<Host>> {
        Ok(self.read().hosts.get(&id).cloned())
    }

    async fn host_update(&self, id: HostId, host: Host) -> Result<Host> {
        let mut store = self.write();
        if !store.hosts.contains_key(&id) {
            return Err(Error::HostNotFound { host: id.to_string() });
        }
        store.hosts.insert(id, host.clone());
        Ok(host)
    }

    async fn host_destroy(&self, id: HostId) -> Result<()> {
        self.write().hosts.remove(&id);
        Ok(())
    }

    async fn host_list(&self) -> Result<Vec<Host>> {
        Ok(self.read().hosts.values().cloned().collect())
    }

    async fn host_get_all_by_queries(&self, filters: &[String]) -> Result<Vec<Host>> {
        let store = self.read();
        let mut hosts: Vec<Host> = store
            .hosts
            .values()
            .filter(|h| filters.iter().all(|f| matches_filter(h, f)))
            .cloned()
            .collect();
        hosts.sort_by_key(|h| h.id);
        Ok(hosts)
    }

    async fn pool_create(&self, name: &str) -> Result<()> {
        // Idempotent: re-creating an existing pool (notably the freepool,
        // bootstrapped once per process) is a no-op rather than an error.
        self.write().pools.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn pool_delete(&self, name: &str) -> Result<()> {
        let mut store = self.write();
        match store.pools.get(name) {
            None => Err(Error::AggregateNotFound { pool: name.to_string() }),
            Some(hosts) if !hosts.is_empty() => Err(Error::AggregateHaveHost { name: name.to_string(), hosts: hosts.join(",") }),
            Some(_) => {
                store.pools.remove(name);
                Ok(())
            }
        }
    }

    async fn pool_exists(&self, name: &str) -> Result<bool> {
        Ok(self.read().pools.contains_key(name))
    }

    async fn pool_add_host(&self, name: &str, service_name: &str) -> Result<()> {
        let mut store = self.write();
        let hosts = store.pools.get_mut(name).ok_or_else(|| Error::AggregateNotFound { pool: name.to_string() })?;
        if hosts.iter().any(|h| h == service_name) {
            return Err(Error::AggregateAlreadyHasHost { pool: name.to_string(), host: service_name.to_string() });
        }
        hosts.push(service_name.to_string());
        Ok(())
    }

    async fn pool_remove_host(&self, name: &str, service_name: &str) -> Result<()> {
        let mut store = self.write();
        let hosts = store.pools.get_mut(name).ok_or_else(|| Error::AggregateNotFound { pool: name.to_string() })?;
        let before = hosts.len();
        hosts.retain(|h| h != service_name);
        if hosts.len() == before {
            return Err(Error::CantRemoveHost { pool: name.to_string(), host: service_name.to_string() });
        }
        Ok(())
    }

    async fn pool_get_hosts(&self, name: &str) -> Result<Vec<String>> {
        self.read().pools.get(name).cloned().ok_or_else(|| Error::AggregateNotFound { pool: name.to_string() })
    }
}

fn matches_filter(host: &Host, filter: &str) -> bool {
    let mut parts = filter.splitn(3, ' ');
    let (Some(key), Some(op), Some(literal)) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    let attrs = host.attributes();
    let Some(actual) = attrs.get(key) else { return false };

    if let (Ok(a), Ok(b)) = (actual.parse::<f64>(), literal.parse::<f64>()) {
        return match op {
            "==" => a == b,
            "!=" => a != b,
            ">=" => a >= b,
            "<=" => a <= b,
            ">" => a > b,
            "<" => a < b,
            _ => false,
        };
    }
    match op {
        "==" => actual == literal,
        "!=" => actual != literal,
        _ => false,
    }
}
