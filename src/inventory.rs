//! Running-workload inventory (out of scope per spec §1: the compute
//! hypervisor/VM layer a real deployment would query to evict instances
//! before reclaiming a host). The host plugin only needs to know whether a
//! host currently has anything running on it; this is the seam for that,
//! with a null implementation standing in for the real inventory service.

use async_trait::async_trait;

#[async_trait]
pub trait HostInventory: Send + Sync {
    /// Number of running workloads on `hypervisor_hostname`. A nonzero
    /// count blocks reallocating the host mid-lease (spec §4.6 update
    /// edge case).
    async fn running_workload_count(&self, hypervisor_hostname: &str) -> crate::error::Result<u32>;

    /// Evicts every workload on `hypervisor_hostname` before the host is
    /// returned to the freepool.
    async fn evict_all(&self, hypervisor_hostname: &str) -> crate::error::Result<()>;
}

/// Always reports an idle host and no-ops eviction. Sufficient for tests
/// and for deployments where the compute layer drains hosts out-of-band.
#[derive(Default)]
pub struct NullInventory;

#[async_trait]
impl HostInventory for NullInventory {
    async fn running_workload_count(&self, _hypervisor_hostname: &str) -> crate::error::Result<u32> {
        Ok(0)
    }

    async fn evict_all(&self, _hypervisor_hostname: &str) -> crate::error::Result<()> {
        Ok(())
    }
}
