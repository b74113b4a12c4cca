//! Resource plugin trait and registry (spec §4.6, REDESIGN FLAGS: static
//! discovery by configured resource type, no reflection-based dispatch).

pub mod host;

use crate::error::{Error, Result};
use crate::model::{LeaseId, Moment, ReservationId};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Lease-level fields common to every resource type, plus a
/// resource-type-specific `params` bag (e.g. the host plugin's
/// `min`/`max`/`hypervisor_properties`/`resource_properties`).
#[derive(Debug, Clone)]
pub struct ReservationRequest {
    pub lease_id: LeaseId,
    pub project_id: String,
    pub user_id: String,
    pub start_date: Moment,
    pub end_date: Moment,
    pub params: Value,
}

#[derive(Debug, Clone)]
pub struct ReservationUpdate {
    pub old_start_date: Moment,
    pub old_end_date: Moment,
    pub new_start_date: Moment,
    pub new_end_date: Moment,
    pub params: Value,
}

/// A resource-type-specific plugin, orchestrating matching/pooling for
/// one kind of reservable resource (spec §4.6).
#[async_trait]
pub trait ReservationPlugin: Send + Sync {
    fn resource_type(&self) -> &'static str;

    async fn create_reservation(&self, request: ReservationRequest) -> Result<ReservationId>;
    async fn update_reservation(&self, reservation_id: ReservationId, update: ReservationUpdate) -> Result<()>;
    async fn on_start(&self, resource_id: &str) -> Result<()>;
    async fn on_end(&self, resource_id: &str) -> Result<()>;

    /// Plugin-specific verbs reachable only through the
    /// `"<resource_type>:<method>"` RPC form (spec §4.7), e.g. the host
    /// plugin's computehost CRUD. The default rejects every method name;
    /// plugins override this to expose their own surface.
    async fn dispatch(&self, method: &str, _values: Value) -> Result<Value> {
        Err(Error::UnsupportedPluginMethod { plugin: self.resource_type().to_string(), method: method.to_string() })
    }
}

/// Built once at startup from `Config.plugins`, keyed by resource type.
/// Duplicate registration for the same resource type is rejected
/// (spec §9: "reject on duplicate type").
pub struct PluginRegistry {
    plugins: HashMap<String, Arc<dyn ReservationPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self { plugins: HashMap::new() }
    }

    pub fn register(&mut self, plugin: Arc<dyn ReservationPlugin>) -> Result<()> {
        let resource_type = plugin.resource_type().to_string();
        if self.plugins.contains_key(&resource_type) {
            return Err(Error::PluginConfigurationError {
                error: format!("multiple plugins registered for resource type {resource_type}"),
            });
        }
        self.plugins.insert(resource_type, plugin);
        Ok(())
    }

    pub fn get(&self, resource_type: &str) -> Result<Arc<dyn ReservationPlugin>> {
        self.plugins.get(resource_type).cloned().ok_or_else(|| Error::UnsupportedResourceType { resource_type: resource_type.to_string() })
    }

    /// Dispatches a call named `"<resource_type>:<method>"`, the
    /// redesigned explicit-registry replacement for reflection-based RPC
    /// dispatch (spec §9).
    pub async fn dispatch(&self, call: &str, values: Value) -> Result<Value> {
        let (resource_type, method) = call.split_once(':').ok_or_else(|| Error::UnsupportedResourceType { resource_type: call.to_string() })?;
        let plugin = self.get(resource_type)?;
        plugin.dispatch(method, values).await
    }

    pub fn resource_types(&self) -> Vec<&str> {
        self.plugins.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}
