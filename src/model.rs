//! Core persisted entities (spec §3: Lease, Reservation, HostReservation,
//! HostAllocation, Host, Event, LeaseState).

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub type LeaseId = Uuid;
pub type ReservationId = Uuid;
pub type EventId = Uuid;
pub type HostId = Uuid;
pub type ProjectId = String;

/// Wall-clock moment at minute resolution, UTC. Seconds/nanos are always
/// truncated on construction so equality and ordering never depend on
/// sub-minute jitter (spec §8: "`start_date == \"now\"` resolves to the
/// current UTC minute, not second").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Moment(NaiveDateTime);

impl Moment {
    pub fn new(dt: NaiveDateTime) -> Self {
        Moment(dt.with_second(0).and_then(|d| d.with_nanosecond(0)).unwrap_or(dt))
    }

    pub fn now() -> Self {
        Moment::new(chrono::Utc::now().naive_utc())
    }

    pub fn inner(&self) -> NaiveDateTime {
        self.0
    }

    pub const FORMAT: &'static str = "%Y-%m-%d %H:%M";

    pub fn parse(s: &str) -> Option<Self> {
        NaiveDateTime::parse_from_str(s, Self::FORMAT).ok().map(Moment::new)
    }

    pub fn format(&self) -> String {
        self.0.format(Self::FORMAT).to_string()
    }

    /// Whole hours between `self` and `other`, as a float (spec §4.6:
    /// "service unit is one host-hour").
    pub fn hours_until(&self, other: Moment) -> f64 {
        (other.0 - self.0).num_seconds() as f64 / 3600.0
    }
}

use chrono::Timelike;

impl std::ops::Add<chrono::Duration> for Moment {
    type Output = Moment;
    fn add(self, rhs: chrono::Duration) -> Moment {
        Moment::new(self.0 + rhs)
    }
}

impl std::ops::Sub<chrono::Duration> for Moment {
    type Output = Moment;
    fn sub(self, rhs: chrono::Duration) -> Moment {
        Moment::new(self.0 - rhs)
    }
}

impl std::ops::Sub<Moment> for Moment {
    type Output = chrono::Duration;
    fn sub(self, rhs: Moment) -> chrono::Duration {
        self.0 - rhs.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseStatusKind {
    /// Derived view, not persisted directly: the lease has no terminal
    /// marker of its own in spec §3 beyond its events/reservations, but
    /// callers frequently need "has it started/ended" — kept here for
    /// convenience, computed from `Lease::phase`.
    Pending,
    Active,
    Terminal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lease {
    pub id: LeaseId,
    pub name: String,
    pub project_id: ProjectId,
    pub user_id: String,
    pub trust_id: String,
    pub start_date: Moment,
    pub end_date: Moment,
    pub reservations: Vec<ReservationId>,
    pub events: Vec<EventId>,
}

impl Lease {
    pub fn phase(&self, now: Moment) -> LeaseStatusKind {
        if now < self.start_date {
            LeaseStatusKind::Pending
        } else if now > self.end_date {
            LeaseStatusKind::Terminal
        } else {
            LeaseStatusKind::Active
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Active,
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub lease_id: LeaseId,
    pub resource_id: String,
    pub resource_type: String,
    pub status: ReservationStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostReservation {
    pub id: Uuid,
    pub reservation_id: ReservationId,
    pub hypervisor_properties: String,
    pub resource_properties: String,
    pub min: u32,
    pub max: u32,
    pub status: ReservationStatus,
}

impl HostReservation {
    pub fn count_range(&self) -> String {
        format!("{}-{}", self.min, self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostAllocation {
    pub id: Uuid,
    pub compute_host_id: HostId,
    pub reservation_id: ReservationId,
    pub start_date: Moment,
    pub end_date: Moment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub id: HostId,
    pub hypervisor_hostname: String,
    pub service_name: String,
    pub trust_id: String,
    pub vcpus: u32,
    pub memory_mb: u64,
    pub local_gb: u64,
    pub capabilities: HashMap<String, String>,
}

impl Host {
    /// Base attributes plus extra capabilities, as the single attribute
    /// namespace the requirements DSL filters against.
    pub fn attributes(&self) -> HashMap<String, String> {
        let mut attrs = self.capabilities.clone();
        attrs.insert("vcpus".into(), self.vcpus.to_string());
        attrs.insert("memory_mb".into(), self.memory_mb.to_string());
        attrs.insert("local_gb".into(), self.local_gb.to_string());
        attrs.insert("hypervisor_hostname".into(), self.hypervisor_hostname.clone());
        attrs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    StartLease,
    EndLease,
    BeforeEndLease,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::StartLease => "start_lease",
            EventType::EndLease => "end_lease",
            EventType::BeforeEndLease => "before_end_lease",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Undone,
    InProgress,
    Done,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub lease_id: LeaseId,
    pub event_type: EventType,
    pub time: Moment,
    pub status: EventStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LeaseAction {
    Create,
    Update,
    Delete,
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LeaseStateStatus {
    InProgress,
    Complete,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaseState {
    pub lease_id: LeaseId,
    pub action: LeaseAction,
    pub status: LeaseStateStatus,
    pub status_reason: String,
}
