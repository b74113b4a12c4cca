use thiserror::Error;

/// Crate-wide error taxonomy.
///
/// Variants line up with the exception classes of the source this crate's
/// domain is modeled on: validation errors carry a 400-class status, not
/// found errors 404, state/conflict errors 409. `status_code()` exposes
/// that classification without tying this crate to any particular
/// transport.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("malformed parameter {param}")]
    MalformedParameter { param: String },
    #[error("missing parameter {param}")]
    MissingParameter { param: String },
    #[error("{date} is an invalid date, required format: {date_format}")]
    InvalidDate { date: String, date_format: String },
    #[error("malformed requirements {rqrms}")]
    MalformedRequirements { rqrms: String },
    #[error("invalid values for min/max of hosts, max must be equal to or larger than min")]
    InvalidRange,

    #[error("aggregate '{pool}' not found")]
    AggregateNotFound { pool: String },
    #[error("host '{host}' not found")]
    HostNotFound { host: String },
    #[error("hypervisor '{pool}' not found")]
    HypervisorNotFound { pool: String },
    #[error("no freepool found")]
    NoFreePool,
    #[error("host {host} not in freepool '{freepool_name}'")]
    HostNotInFreePool { host: String, freepool_name: String },
    #[error("no endpoints for {service}")]
    EndpointsNotFound { service: String },
    #[error("service {service} not found")]
    ServiceNotFound { service: String },
    #[error("lease '{lease_id}' not found")]
    LeaseNotFound { lease_id: String },
    #[error("reservation '{reservation_id}' not found")]
    ReservationNotFound { reservation_id: String },
    #[error("event '{event_id}' not found")]
    EventNotFound { event_id: String },

    #[error("the lease with name {name} already exists")]
    LeaseNameAlreadyExists { name: String },
    #[error("invalid state {state} for {id}")]
    InvalidState { id: String, state: String },
    #[error("unable to update id {id} state with {action}:{status}")]
    InvalidStateUpdate { id: String, action: String, status: String },
    #[error("can't delete aggregate '{name}', host(s) attached to it: {hosts}")]
    AggregateHaveHost { name: String, hosts: String },
    #[error("aggregate {pool} already has host(s) {host}")]
    AggregateAlreadyHasHost { pool: String, host: String },
    #[error("can't add host(s) {host} to aggregate {pool}")]
    CantAddHost { pool: String, host: String },
    #[error("can't remove host(s) {host} from aggregate {pool}")]
    CantRemoveHost { pool: String, host: String },
    #[error("servers [{servers}] found for host {host}")]
    HostHavingServers { host: String, servers: String },
    #[error("multiple hosts found for pattern '{host}'")]
    MultipleHostsFound { host: String },
    #[error("can't add extra capabilities {keys} to host {host}")]
    CantAddExtraCapability { host: String, keys: String },

    #[error("not enough hosts available")]
    NotEnoughHostsAvailable,

    #[error("not authorized: {reason}")]
    NotAuthorized { reason: String },
    #[error("a trust id is required")]
    MissingTrustId,
    #[error("no project_id found in current context")]
    ProjectIdNotFound,

    #[error("the {resource_type} resource type is not supported")]
    UnsupportedResourceType { resource_type: String },
    #[error("plugin {plugin} has no method {method}")]
    UnsupportedPluginMethod { plugin: String, method: String },
    #[error("plugin configuration error: {error}")]
    PluginConfigurationError { error: String },
    #[error("configuration error: {error}")]
    ConfigurationError { error: String },
    #[error("event error: {error}")]
    EventError { error: String },

    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

impl Error {
    /// HTTP-ish status class this error surfaces as: 400 validation, 404
    /// not found, 409 conflict/state, 401/403 auth, 500 infra.
    pub fn status_code(&self) -> u16 {
        use Error::*;
        match self {
            MalformedParameter { .. }
            | MissingParameter { .. }
            | InvalidDate { .. }
            | MalformedRequirements { .. }
            | InvalidRange
            | UnsupportedPluginMethod { .. }
            | UnsupportedResourceType { .. }
            | PluginConfigurationError { .. }
            | ConfigurationError { .. }
            | EventError { .. } => 400,

            AggregateNotFound { .. }
            | HostNotFound { .. }
            | HypervisorNotFound { .. }
            | NoFreePool
            | HostNotInFreePool { .. }
            | EndpointsNotFound { .. }
            | ServiceNotFound { .. }
            | LeaseNotFound { .. }
            | ReservationNotFound { .. }
            | EventNotFound { .. } => 404,

            LeaseNameAlreadyExists { .. }
            | InvalidState { .. }
            | InvalidStateUpdate { .. }
            | AggregateHaveHost { .. }
            | AggregateAlreadyHasHost { .. }
            | CantAddHost { .. }
            | CantRemoveHost { .. }
            | HostHavingServers { .. }
            | MultipleHostsFound { .. }
            | CantAddExtraCapability { .. } => 409,

            NotEnoughHostsAvailable | NotAuthorized { .. } => 403,
            MissingTrustId | ProjectIdNotFound => 401,
            Persistence(_) | Serde(_) => 500,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serde(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
