//! Reservation Pool (spec §4.5): membership manager for a named host
//! aggregate. The freepool is the default aggregate holding every
//! registered-but-unallocated host.

use crate::error::Result;
use crate::persistence::Persistence;
use std::sync::Arc;

#[derive(Clone)]
pub struct ReservationPool {
    persistence: Arc<dyn Persistence>,
}

impl ReservationPool {
    pub fn new(persistence: Arc<dyn Persistence>) -> Self {
        Self { persistence }
    }

    pub async fn create(&self, name: &str) -> Result<()> {
        self.persistence.pool_create(name).await
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        self.persistence.pool_delete(name).await
    }

    pub async fn add_computehost(&self, pool_name: &str, service_name: &str) -> Result<()> {
        self.persistence.pool_add_host(pool_name, service_name).await
    }

    pub async fn remove_computehost(&self, pool_name: &str, service_names: &[String]) -> Result<()> {
        for service_name in service_names {
            self.persistence.pool_remove_host(pool_name, service_name).await?;
        }
        Ok(())
    }

    pub async fn get_computehosts(&self, pool_name: &str) -> Result<Vec<String>> {
        self.persistence.pool_get_hosts(pool_name).await
    }

    pub async fn ensure_freepool(&self, freepool_name: &str) -> Result<()> {
        self.persistence.pool_create(freepool_name).await
    }
}
