//! Trust context acquisition (spec §4.9 / REDESIGN FLAGS): modeled as a
//! scoped resource acquired before each handler body rather than as
//! ambient/thread-local state. The concrete identity backend is out of
//! scope; this is the reference in-memory provider used by tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustContext {
    pub trust_id: String,
    pub project_id: String,
    pub user_id: String,
}

#[async_trait]
pub trait TrustProvider: Send + Sync {
    async fn scoped(&self, trust_id: &str) -> crate::error::Result<TrustContext>;
}

/// Fixed trust_id -> (project_id, user_id) table, sufficient for tests and
/// local runs; a real deployment would exchange the trust id with the
/// identity service for a delegated token.
#[derive(Default)]
pub struct StaticTrustProvider {
    registry: RwLock<HashMap<String, (String, String)>>,
}

impl StaticTrustProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, trust_id: &str, project_id: &str, user_id: &str) {
        self.registry.write().unwrap().insert(trust_id.to_string(), (project_id.to_string(), user_id.to_string()));
    }
}

#[async_trait]
impl TrustProvider for StaticTrustProvider {
    async fn scoped(&self, trust_id: &str) -> crate::error::Result<TrustContext> {
        let registry = self.registry.read().unwrap();
        match registry.get(trust_id) {
            Some((project_id, user_id)) => Ok(TrustContext {
                trust_id: trust_id.to_string(),
                project_id: project_id.clone(),
                user_id: user_id.clone(),
            }),
            None => Ok(TrustContext {
                trust_id: trust_id.to_string(),
                project_id: trust_id.to_string(),
                user_id: "unknown".to_string(),
            }),
        }
    }
}
