//! Host Matcher (spec §4.4): matches eligible hosts to a reservation
//! request via the requirements DSL, preferring never-allocated hosts to
//! reduce churn in the pool.

use crate::model::{HostId, Moment};
use crate::persistence::Persistence;
use crate::requirements;
use chrono::Duration;

/// Returns up to `max` matching host IDs, or empty if fewer than `min`
/// hosts are available (spec §4.4 steps 1-6).
pub async fn match_hosts(
    persistence: &dyn Persistence,
    hypervisor_properties: &str,
    resource_properties: &str,
    min: u32,
    max: u32,
    start: Moment,
    end: Moment,
) -> crate::error::Result<Vec<HostId>> {
    let mut filters = Vec::new();
    if !hypervisor_properties.is_empty() {
        filters.extend(requirements::translate(hypervisor_properties)?);
    }
    if !resource_properties.is_empty() {
        filters.extend(requirements::translate(resource_properties)?);
    }

    let candidates = persistence.host_get_all_by_queries(&filters).await?;

    let mut not_allocated = Vec::new();
    let mut allocated_but_free = Vec::new();

    for host in candidates {
        let allocations = persistence.host_allocation_get_all_by_host(host.id).await?;
        if allocations.is_empty() {
            not_allocated.push(host.id);
            continue;
        }
        let free = persistence.get_free_periods(host.id, start, end, Duration::zero()).await?;
        if free.len() == 1 && free[0] == (start, end) {
            allocated_but_free.push(host.id);
        }
    }

    let min = min as usize;
    let max = max as usize;

    if not_allocated.len() >= min {
        not_allocated.truncate(max);
        return Ok(not_allocated);
    }

    let mut all_candidates = not_allocated;
    all_candidates.extend(allocated_but_free);
    if all_candidates.len() >= min {
        all_candidates.truncate(max);
        return Ok(all_candidates);
    }

    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Host;
    use crate::persistence::memory::MemoryPersistence;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn host(name: &str) -> Host {
        Host {
            id: Uuid::new_v4(),
            hypervisor_hostname: name.to_string(),
            service_name: name.to_string(),
            trust_id: "t".into(),
            vcpus: 8,
            memory_mb: 4096,
            local_gb: 100,
            capabilities: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn empty_requirements_match_every_host() {
        let db = MemoryPersistence::new();
        db.host_create(host("h1")).await.unwrap();
        db.host_create(host("h2")).await.unwrap();
        let start = Moment::parse("2024-01-01 00:00").unwrap();
        let end = Moment::parse("2024-01-02 00:00").unwrap();
        let matched = match_hosts(&db, "", "", 1, 1, start, end).await.unwrap();
        assert_eq!(matched.len(), 1);
    }

    #[tokio::test]
    async fn min_equals_max_returns_exact_count_or_fails() {
        let db = MemoryPersistence::new();
        db.host_create(host("h1")).await.unwrap();
        let start = Moment::parse("2024-01-01 00:00").unwrap();
        let end = Moment::parse("2024-01-02 00:00").unwrap();
        let matched = match_hosts(&db, "", "", 2, 2, start, end).await.unwrap();
        assert!(matched.is_empty());
    }

    #[tokio::test]
    async fn prefers_never_allocated_hosts() {
        use crate::model::HostAllocation;
        let db = MemoryPersistence::new();
        let h1 = host("h1");
        let h2 = host("h2");
        let h1_id = h1.id;
        db.host_create(h1).await.unwrap();
        db.host_create(h2).await.unwrap();

        let far_start = Moment::parse("2030-01-01 00:00").unwrap();
        let far_end = Moment::parse("2030-01-02 00:00").unwrap();
        db.host_allocation_create(HostAllocation {
            id: Uuid::new_v4(),
            compute_host_id: h1_id,
            reservation_id: Uuid::new_v4(),
            start_date: far_start,
            end_date: far_end,
        })
        .await
        .unwrap();

        let start = Moment::parse("2024-01-01 00:00").unwrap();
        let end = Moment::parse("2024-01-02 00:00").unwrap();
        let matched = match_hosts(&db, "", "", 1, 1, start, end).await.unwrap();
        assert_eq!(matched, vec![h2_id(&db).await]);
    }

    async fn h2_id(db: &MemoryPersistence) -> Uuid {
        db.host_list().await.unwrap().into_iter().find(|h| h.hypervisor_hostname == "h2").unwrap().id
    }
}
