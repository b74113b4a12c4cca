//! Host Reservation Plugin (spec §4.6): the `"physical:host"` resource
//! type, composing the requirements DSL, host matcher, reservation pool
//! and usage ledger into create/update/start/end handlers, plus the
//! computehost catalog CRUD reachable via `"physical:host:<method>"`.

use super::{ReservationPlugin, ReservationRequest, ReservationUpdate};
use crate::error::{Error, Result};
use crate::host_matcher;
use crate::inventory::HostInventory;
use crate::model::*;
use crate::persistence::Persistence;
use crate::reservation_pool::ReservationPool;
use crate::usage::UsageLedger;
use async_trait::async_trait;
use chrono::Duration;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

pub struct HostReservationPlugin {
    persistence: Arc<dyn Persistence>,
    pool: ReservationPool,
    ledger: Arc<dyn UsageLedger>,
    inventory: Arc<dyn HostInventory>,
    freepool_name: String,
    usage_enforcement: bool,
    usage_strict: bool,
}

impl HostReservationPlugin {
    pub fn new(
        persistence: Arc<dyn Persistence>,
        ledger: Arc<dyn UsageLedger>,
        inventory: Arc<dyn HostInventory>,
        freepool_name: String,
        usage_enforcement: bool,
        usage_strict: bool,
    ) -> Self {
        let pool = ReservationPool::new(persistence.clone());
        Self { persistence, pool, ledger, inventory, freepool_name, usage_enforcement, usage_strict }
    }

    fn param_count(params: &Value, name: &str) -> Result<u32> {
        let value = params.get(name).ok_or_else(|| Error::MissingParameter { param: name.to_string() })?;
        let malformed = || Error::MalformedParameter { param: name.to_string() };
        match value {
            Value::Number(n) => n.as_u64().map(|v| v as u32).ok_or_else(malformed),
            Value::String(s) => s.parse::<u32>().map_err(|_| malformed()),
            _ => Err(malformed()),
        }
    }

    fn param_requirements(params: &Value, name: &str) -> String {
        match params.get(name) {
            Some(Value::String(s)) => s.clone(),
            Some(v) if !v.is_null() => v.to_string(),
            _ => String::new(),
        }
    }

    /// Admits `hours * host_count` service units against `project`'s
    /// budget, honoring `usage_strict` for ledger connection failures
    /// (spec §9 open question).
    async fn admit(&self, project: &str, hours: f64, host_count: u32) -> Result<()> {
        self.admit_su(project, hours * host_count as f64).await
    }

    async fn admit_su(&self, project: &str, requested_su: f64) -> Result<()> {
        if !self.usage_enforcement {
            return Ok(());
        }
        match self.ledger.admit(project, requested_su).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(Error::NotAuthorized { reason: format!("project {project} has insufficient service units for {requested_su} requested") }),
            Err(e) if self.usage_strict => Err(Error::NotAuthorized { reason: e.to_string() }),
            Err(e) => {
                log::warn!("usage ledger unreachable, bypassing admission check: {e}");
                Ok(())
            }
        }
    }

    async fn adjust(&self, project: &str, delta_su: f64) {
        if !self.usage_enforcement || delta_su == 0.0 {
            return;
        }
        if let Err(e) = self.ledger.adjust(project, delta_su).await {
            if self.usage_strict {
                log::error!("usage ledger adjustment failed for {project}: {e}");
            } else {
                log::warn!("usage ledger unreachable, dropping adjustment of {delta_su} for {project}: {e}");
            }
        }
    }

    async fn host_by_id(&self, id: HostId) -> Result<Host> {
        self.persistence.host_get(id).await?.ok_or_else(|| Error::HostNotFound { host: id.to_string() })
    }

    fn lookup_host<'a>(hosts: &'a [Host], query: &str) -> Result<&'a Host> {
        let mut matches = hosts.iter().filter(|h| h.id.to_string() == query || h.hypervisor_hostname == query);
        let found = matches.next().ok_or_else(|| Error::HostNotFound { host: query.to_string() })?;
        if matches.next().is_some() {
            return Err(Error::MultipleHostsFound { host: query.to_string() });
        }
        Ok(found)
    }
}

#[async_trait]
impl ReservationPlugin for HostReservationPlugin {
    fn resource_type(&self) -> &'static str {
        "physical:host"
    }

    async fn create_reservation(&self, request: ReservationRequest) -> Result<ReservationId> {
        let min = Self::param_count(&request.params, "min")?;
        let max = Self::param_count(&request.params, "max")?;
        if max < min {
            return Err(Error::InvalidRange);
        }
        let hypervisor_properties = Self::param_requirements(&request.params, "hypervisor_properties");
        let resource_properties = Self::param_requirements(&request.params, "resource_properties");

        let matched = host_matcher::match_hosts(
            self.persistence.as_ref(),
            &hypervisor_properties,
            &resource_properties,
            min,
            max,
            request.start_date,
            request.end_date,
        )
        .await?;
        if matched.is_empty() {
            return Err(Error::NotEnoughHostsAvailable);
        }

        let hours = request.start_date.hours_until(request.end_date);
        self.admit(&request.project_id, hours, matched.len() as u32).await?;

        let reservation_id = Uuid::new_v4();
        let pool_name = reservation_id.to_string();
        self.pool.create(&pool_name).await?;

        self.persistence
            .reservation_create(Reservation {
                id: reservation_id,
                lease_id: request.lease_id,
                resource_id: pool_name,
                resource_type: self.resource_type().to_string(),
                status: ReservationStatus::Pending,
            })
            .await?;

        self.persistence
            .host_reservation_create(HostReservation {
                id: Uuid::new_v4(),
                reservation_id,
                hypervisor_properties,
                resource_properties,
                min,
                max,
                status: ReservationStatus::Pending,
            })
            .await?;

        for host_id in matched {
            self.persistence
                .host_allocation_create(HostAllocation {
                    id: Uuid::new_v4(),
                    compute_host_id: host_id,
                    reservation_id,
                    start_date: request.start_date,
                    end_date: request.end_date,
                })
                .await?;
        }

        Ok(reservation_id)
    }

    async fn update_reservation(&self, reservation_id: ReservationId, update: ReservationUpdate) -> Result<()> {
        let extends_window = update.new_start_date < update.old_start_date || update.new_end_date > update.old_end_date;
        let allocations = self.persistence.host_allocation_get_all_by_reservation(reservation_id).await?;

        let mut disturbed_ids = std::collections::HashSet::new();

        if extends_window {
            let reservation = self
                .persistence
                .reservation_get(reservation_id)
                .await?
                .ok_or_else(|| Error::ReservationNotFound { reservation_id: reservation_id.to_string() })?;
            let pool_name = reservation.resource_id.clone();
            // Only a reservation whose hosts are currently in an active pool
            // can have running workloads worth protecting; a still-Pending
            // reservation's hosts sit in the freepool and are free to swap.
            let hosts_in_pool = !self.pool.get_computehosts(&pool_name).await?.is_empty();

            let max_start = update.new_start_date.max(update.old_start_date);
            let min_end = update.new_end_date.min(update.old_end_date);

            let mut disturbed = Vec::new();
            for alloc in &allocations {
                let full = self.persistence.get_full_periods(alloc.compute_host_id, update.new_start_date, update.new_end_date, Duration::zero()).await?;
                let covers_existing_window = full.len() == 1 && full[0] == (max_start, min_end);
                if !full.is_empty() && !covers_existing_window {
                    disturbed.push(alloc.clone());
                }
            }

            if hosts_in_pool {
                for alloc in &disturbed {
                    let host = self.host_by_id(alloc.compute_host_id).await?;
                    if self.inventory.running_workload_count(&host.hypervisor_hostname).await? > 0 {
                        return Err(Error::NotEnoughHostsAvailable);
                    }
                }
            }

            if !disturbed.is_empty() {
                let hr = self
                    .persistence
                    .host_reservation_get_by_reservation_id(reservation_id)
                    .await?
                    .ok_or_else(|| Error::ReservationNotFound { reservation_id: reservation_id.to_string() })?;

                let replacements = host_matcher::match_hosts(
                    self.persistence.as_ref(),
                    &hr.hypervisor_properties,
                    &hr.resource_properties,
                    disturbed.len() as u32,
                    disturbed.len() as u32,
                    update.new_start_date,
                    update.new_end_date,
                )
                .await?;
                if replacements.is_empty() {
                    return Err(Error::NotEnoughHostsAvailable);
                }

                let mut removed_service_names = Vec::new();
                for alloc in &disturbed {
                    let host = self.host_by_id(alloc.compute_host_id).await?;
                    removed_service_names.push(host.service_name.clone());
                    disturbed_ids.insert(alloc.id);
                    self.persistence.host_allocation_destroy(alloc.id).await?;
                }
                if hosts_in_pool && !removed_service_names.is_empty() {
                    self.pool.remove_computehost(&pool_name, &removed_service_names).await?;
                }

                for host_id in replacements {
                    self.persistence
                        .host_allocation_create(HostAllocation {
                            id: Uuid::new_v4(),
                            compute_host_id: host_id,
                            reservation_id,
                            start_date: update.new_start_date,
                            end_date: update.new_end_date,
                        })
                        .await?;
                    if hosts_in_pool {
                        let host = self.host_by_id(host_id).await?;
                        self.pool.add_computehost(&pool_name, &host.service_name).await?;
                    }
                }
            }
        }

        for alloc in &allocations {
            if disturbed_ids.contains(&alloc.id) {
                continue;
            }
            if alloc.start_date != update.new_start_date || alloc.end_date != update.new_end_date {
                let mut refreshed = alloc.clone();
                refreshed.start_date = update.new_start_date;
                refreshed.end_date = update.new_end_date;
                self.persistence.host_allocation_destroy(alloc.id).await?;
                self.persistence.host_allocation_create(refreshed).await?;
            }
        }

        let old_hours = update.old_start_date.hours_until(update.old_end_date);
        let new_hours = update.new_start_date.hours_until(update.new_end_date);
        let host_count = self.persistence.host_allocation_get_all_by_reservation(reservation_id).await?.len() as u32;
        let delta_su = (new_hours - old_hours) * host_count as f64;

        if delta_su > 0.0 {
            let reservation = self
                .persistence
                .reservation_get(reservation_id)
                .await?
                .ok_or_else(|| Error::ReservationNotFound { reservation_id: reservation_id.to_string() })?;
            let lease = self
                .persistence
                .lease_get(reservation.lease_id)
                .await?
                .ok_or_else(|| Error::LeaseNotFound { lease_id: reservation.lease_id.to_string() })?;
            self.admit_su(&lease.project_id, delta_su).await?;
        } else if delta_su < 0.0 {
            let reservation = self
                .persistence
                .reservation_get(reservation_id)
                .await?
                .ok_or_else(|| Error::ReservationNotFound { reservation_id: reservation_id.to_string() })?;
            let lease = self
                .persistence
                .lease_get(reservation.lease_id)
                .await?
                .ok_or_else(|| Error::LeaseNotFound { lease_id: reservation.lease_id.to_string() })?;
            self.adjust(&lease.project_id, delta_su).await;
        }

        Ok(())
    }

    async fn on_start(&self, resource_id: &str) -> Result<()> {
        let reservations = self.persistence.reservation_get_all_by_resource_id(resource_id).await?;
        for reservation in reservations {
            let allocations = self.persistence.host_allocation_get_all_by_reservation(reservation.id).await?;
            for alloc in allocations {
                let host = self.host_by_id(alloc.compute_host_id).await?;
                self.pool.add_computehost(resource_id, &host.service_name).await?;
            }
        }
        Ok(())
    }

    async fn on_end(&self, resource_id: &str) -> Result<()> {
        let reservations = self.persistence.reservation_get_all_by_resource_id(resource_id).await?;
        for reservation in reservations {
            if reservation.status == ReservationStatus::Completed {
                continue;
            }

            let was_active = reservation.status == ReservationStatus::Active;
            let allocations = self.persistence.host_allocation_get_all_by_reservation(reservation.id).await?;
            let host_count = allocations.len() as u32;

            let mut service_names = Vec::new();
            for alloc in &allocations {
                let host = self.host_by_id(alloc.compute_host_id).await?;
                if was_active {
                    self.inventory.evict_all(&host.hypervisor_hostname).await?;
                }
                service_names.push(host.service_name.clone());
                self.persistence.host_allocation_destroy(alloc.id).await?;
            }
            if was_active {
                self.pool.remove_computehost(resource_id, &service_names).await?;
            }

            self.persistence.reservation_update(reservation.id, ReservationStatus::Completed).await?;
            if let Some(hr) = self.persistence.host_reservation_get_by_reservation_id(reservation.id).await? {
                self.persistence.host_reservation_update(hr.id, ReservationStatus::Completed).await?;
            }

            if self.usage_enforcement && host_count > 0 {
                let lease = self
                    .persistence
                    .lease_get(reservation.lease_id)
                    .await?
                    .ok_or_else(|| Error::LeaseNotFound { lease_id: reservation.lease_id.to_string() })?;
                let now = Moment::now();
                let actual_hours = match reservation.status {
                    ReservationStatus::Pending => 0.0,
                    ReservationStatus::Active => lease.start_date.hours_until(now).max(0.0),
                    _ => lease.start_date.hours_until(lease.end_date),
                };
                let encumbered_hours = lease.start_date.hours_until(lease.end_date);
                let delta_su = (actual_hours - encumbered_hours) * host_count as f64;
                self.adjust(&lease.project_id, delta_su).await;
            }
        }
        Ok(())
    }

    async fn dispatch(&self, method: &str, values: Value) -> Result<Value> {
        match method {
            "create_computehost" => {
                let hostname = values.get("hypervisor_hostname").and_then(Value::as_str).ok_or_else(|| Error::MissingParameter { param: "hypervisor_hostname".to_string() })?;
                let trust_id = values.get("trust_id").and_then(Value::as_str).unwrap_or_default();
                let vcpus = values.get("vcpus").and_then(Value::as_u64).unwrap_or(0) as u32;
                let memory_mb = values.get("memory_mb").and_then(Value::as_u64).unwrap_or(0);
                let local_gb = values.get("local_gb").and_then(Value::as_u64).unwrap_or(0);
                let mut capabilities = HashMap::new();
                if let Some(Value::Object(extra)) = values.get("capabilities") {
                    for (k, v) in extra {
                        capabilities.insert(k.clone(), v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()));
                    }
                }
                self.pool.ensure_freepool(&self.freepool_name).await?;
                let host = self
                    .persistence
                    .host_create(Host {
                        id: Uuid::new_v4(),
                        hypervisor_hostname: hostname.to_string(),
                        service_name: format!("nova-compute-{hostname}"),
                        trust_id: trust_id.to_string(),
                        vcpus,
                        memory_mb,
                        local_gb,
                        capabilities,
                    })
                    .await?;
                self.pool.add_computehost(&self.freepool_name, &host.service_name).await?;
                Ok(serde_json::to_value(&host)?)
            }
            "list_computehosts" => Ok(json!(self.persistence.host_list().await?)),
            "get_computehost" => {
                let query = values.as_str().ok_or_else(|| Error::MissingParameter { param: "host".to_string() })?;
                let hosts = self.persistence.host_list().await?;
                Ok(serde_json::to_value(Self::lookup_host(&hosts, query)?)?)
            }
            "update_computehost" => {
                let query = values.get("host").and_then(Value::as_str).ok_or_else(|| Error::MissingParameter { param: "host".to_string() })?;
                let hosts = self.persistence.host_list().await?;
                let mut host = Self::lookup_host(&hosts, query)?.clone();
                if let Some(Value::Object(values_to_update)) = values.get("values") {
                    for (k, v) in values_to_update {
                        host.capabilities.insert(k.clone(), v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()));
                    }
                }
                let updated = self.persistence.host_update(host.id, host).await?;
                Ok(serde_json::to_value(&updated)?)
            }
            "delete_computehost" => {
                let query = values.as_str().ok_or_else(|| Error::MissingParameter { param: "host".to_string() })?;
                let hosts = self.persistence.host_list().await?;
                let host = Self::lookup_host(&hosts, query)?.clone();
                if !self.persistence.host_allocation_get_all_by_host(host.id).await?.is_empty() {
                    return Err(Error::HostHavingServers { host: host.hypervisor_hostname.clone(), servers: "active allocations".to_string() });
                }
                self.pool.remove_computehost(&self.freepool_name, &[host.service_name.clone()]).await.ok();
                self.persistence.host_destroy(host.id).await?;
                Ok(Value::Null)
            }
            _ => Err(Error::UnsupportedPluginMethod { plugin: self.resource_type().to_string(), method: method.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::memory::MemoryPersistence;
    use crate::usage::MapLedger;
    use std::collections::HashMap as Map;

    fn plugin() -> (HostReservationPlugin, Arc<MemoryPersistence>) {
        plugin_with_inventory(Arc::new(crate::inventory::NullInventory))
    }

    fn plugin_with_inventory(inventory: Arc<dyn crate::inventory::HostInventory>) -> (HostReservationPlugin, Arc<MemoryPersistence>) {
        let persistence = Arc::new(MemoryPersistence::new());
        let plugin = HostReservationPlugin::new(persistence.clone(), Arc::new(MapLedger::new()), inventory, "freepool".to_string(), true, false);
        (plugin, persistence)
    }

    /// Reports every hypervisor as running workloads, used to prove that
    /// `update_reservation`'s eviction check only fires when the
    /// reservation's hosts are actually in an active pool.
    struct AlwaysBusyInventory;

    #[async_trait]
    impl crate::inventory::HostInventory for AlwaysBusyInventory {
        async fn running_workload_count(&self, _hypervisor_hostname: &str) -> Result<u32> {
            Ok(3)
        }

        async fn evict_all(&self, _hypervisor_hostname: &str) -> Result<()> {
            Ok(())
        }
    }

    async fn seed_host(persistence: &MemoryPersistence, name: &str) -> Host {
        persistence
            .host_create(Host {
                id: Uuid::new_v4(),
                hypervisor_hostname: name.to_string(),
                service_name: format!("nova-compute-{name}"),
                trust_id: "t".into(),
                vcpus: 8,
                memory_mb: 8192,
                local_gb: 100,
                capabilities: Map::new(),
            })
            .await
            .unwrap()
    }

    fn request(lease_id: LeaseId, project_id: &str, min: u32, max: u32) -> ReservationRequest {
        ReservationRequest {
            lease_id,
            project_id: project_id.to_string(),
            user_id: "u1".to_string(),
            start_date: Moment::parse("2024-01-01 00:00").unwrap(),
            end_date: Moment::parse("2024-01-02 00:00").unwrap(),
            params: json!({"min": min.to_string(), "max": max.to_string(), "hypervisor_properties": "[]", "resource_properties": "[]"}),
        }
    }

    #[tokio::test]
    async fn create_reservation_matches_and_charges_ledger() {
        let (plugin, persistence) = plugin();
        seed_host(&persistence, "h1").await;
        plugin.ledger.init("proj-a", 100.0).await.unwrap();

        let reservation_id = plugin.create_reservation(request(Uuid::new_v4(), "proj-a", 1, 1)).await.unwrap();
        let reservation = persistence.reservation_get(reservation_id).await.unwrap().unwrap();
        assert_eq!(reservation.status, ReservationStatus::Pending);

        let usage = plugin.ledger.snapshot("proj-a").await.unwrap();
        assert_eq!(usage.encumbered, 24.0);
    }

    #[tokio::test]
    async fn create_reservation_fails_when_no_hosts_match() {
        let (plugin, _persistence) = plugin();
        plugin.ledger.init("proj-a", 100.0).await.unwrap();
        let err = plugin.create_reservation(request(Uuid::new_v4(), "proj-a", 1, 1)).await.unwrap_err();
        assert!(matches!(err, Error::NotEnoughHostsAvailable));
    }

    #[tokio::test]
    async fn create_reservation_rejects_insufficient_budget() {
        let (plugin, persistence) = plugin();
        seed_host(&persistence, "h1").await;
        plugin.ledger.init("proj-a", 1.0).await.unwrap();
        let err = plugin.create_reservation(request(Uuid::new_v4(), "proj-a", 1, 1)).await.unwrap_err();
        assert!(matches!(err, Error::NotAuthorized { .. }));
    }

    #[tokio::test]
    async fn rejects_min_greater_than_max() {
        let (plugin, persistence) = plugin();
        seed_host(&persistence, "h1").await;
        plugin.ledger.init("proj-a", 100.0).await.unwrap();
        let err = plugin.create_reservation(request(Uuid::new_v4(), "proj-a", 3, 1)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRange));
    }

    #[tokio::test]
    async fn on_start_then_on_end_is_idempotent() {
        let (plugin, persistence) = plugin();
        seed_host(&persistence, "h1").await;
        plugin.ledger.init("proj-a", 100.0).await.unwrap();
        let reservation_id = plugin.create_reservation(request(Uuid::new_v4(), "proj-a", 1, 1)).await.unwrap();
        let reservation = persistence.reservation_get(reservation_id).await.unwrap().unwrap();
        persistence.reservation_update(reservation_id, ReservationStatus::Active).await.unwrap();

        plugin.on_start(&reservation.resource_id).await.unwrap();
        assert_eq!(plugin.pool.get_computehosts(&reservation.resource_id).await.unwrap().len(), 1);

        plugin.on_end(&reservation.resource_id).await.unwrap();
        assert!(plugin.pool.get_computehosts(&reservation.resource_id).await.unwrap().is_empty());

        // second on_end is a no-op, not a double-decrement
        plugin.on_end(&reservation.resource_id).await.unwrap();
    }

    /// Builds a pending reservation on one of two hosts, then adds a
    /// second allocation directly adjacent to its window on the same
    /// host so extending the window marks that host disturbed.
    async fn seed_disturbed_reservation(persistence: &MemoryPersistence, plugin: &HostReservationPlugin) -> (ReservationId, HostAllocation, ReservationUpdate) {
        seed_host(persistence, "h1").await;
        seed_host(persistence, "h2").await;
        plugin.ledger.init("proj-a", 100.0).await.unwrap();

        let reservation_id = plugin.create_reservation(request(Uuid::new_v4(), "proj-a", 1, 1)).await.unwrap();
        let alloc = persistence.host_allocation_get_all_by_reservation(reservation_id).await.unwrap().into_iter().next().unwrap();

        persistence
            .host_allocation_create(HostAllocation {
                id: Uuid::new_v4(),
                compute_host_id: alloc.compute_host_id,
                reservation_id: Uuid::new_v4(),
                start_date: alloc.end_date,
                end_date: alloc.end_date + Duration::hours(1),
            })
            .await
            .unwrap();

        let update = ReservationUpdate {
            old_start_date: alloc.start_date,
            old_end_date: alloc.end_date,
            new_start_date: alloc.start_date,
            new_end_date: alloc.end_date + Duration::hours(2),
            params: json!({"min": "1", "max": "1", "hypervisor_properties": "[]", "resource_properties": "[]"}),
        };
        (reservation_id, alloc, update)
    }

    #[tokio::test]
    async fn update_reservation_blocks_eviction_when_hosts_in_pool() {
        let (plugin, persistence) = plugin_with_inventory(Arc::new(AlwaysBusyInventory));
        let (reservation_id, _alloc, update) = seed_disturbed_reservation(&persistence, &plugin).await;

        let reservation = persistence.reservation_get(reservation_id).await.unwrap().unwrap();
        persistence.reservation_update(reservation_id, ReservationStatus::Active).await.unwrap();
        plugin.on_start(&reservation.resource_id).await.unwrap();
        assert_eq!(plugin.pool.get_computehosts(&reservation.resource_id).await.unwrap().len(), 1);

        let err = plugin.update_reservation(reservation_id, update).await.unwrap_err();
        assert!(matches!(err, Error::NotEnoughHostsAvailable));
    }

    #[tokio::test]
    async fn update_reservation_ignores_running_workload_when_still_pending() {
        let (plugin, persistence) = plugin_with_inventory(Arc::new(AlwaysBusyInventory));
        let (reservation_id, alloc, update) = seed_disturbed_reservation(&persistence, &plugin).await;

        // Reservation is still Pending: its host was never added to an
        // active pool, so the disturbed host's reported workload must not
        // block the update.
        plugin.update_reservation(reservation_id, update).await.unwrap();

        let remaining = persistence.host_allocation_get_all_by_reservation(reservation_id).await.unwrap();
        assert!(remaining.iter().all(|a| a.compute_host_id != alloc.compute_host_id));
    }

    #[tokio::test]
    async fn create_computehost_via_dispatch_seeds_freepool() {
        let (plugin, persistence) = plugin();
        let result = plugin.dispatch("create_computehost", json!({"hypervisor_hostname": "h1", "vcpus": 8, "memory_mb": 8192, "local_gb": 100})).await.unwrap();
        assert_eq!(result["hypervisor_hostname"], "h1");
        assert_eq!(persistence.host_list().await.unwrap().len(), 1);
        assert_eq!(plugin.pool.get_computehosts("freepool").await.unwrap().len(), 1);
    }
}
