//! Recognized configuration options (spec §6), mirroring the
//! `manager_opts`/`plugin_opts` groups of the source this is modeled on.

use clap::Parser;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "lease-scheduler", about = "Resource reservation and lease scheduler")]
pub struct Config {
    /// Resource-type plugins to load at startup.
    #[arg(long, env = "MANAGER_PLUGINS", value_delimiter = ',', default_value = "physical:host")]
    pub plugins: Vec<String>,

    /// Hours before lease end to fire `before_end_lease`; 0 disables it.
    #[arg(long, env = "MANAGER_NOTIFY_HOURS_BEFORE_LEASE_END", default_value_t = 48)]
    pub notify_hours_before_lease_end: i64,

    /// KV host backing the usage ledger. Absent means usage enforcement
    /// runs against the in-memory reference ledger only.
    #[arg(long, env = "MANAGER_USAGE_DB_HOST")]
    pub usage_db_host: Option<String>,

    /// Default SU balance granted to a project seen for the first time.
    #[arg(long, env = "MANAGER_USAGE_DEFAULT_ALLOCATED", default_value_t = 0.0)]
    pub usage_default_allocated: f64,

    /// Name of the aggregate holding every registered, unreserved host.
    #[arg(long, env = "PHYSICAL_HOST_AGGREGATE_FREEPOOL_NAME", default_value = "freepool")]
    pub aggregate_freepool_name: String,

    /// Whether SU budgets are enforced at all.
    #[arg(long, env = "MANAGER_USAGE_ENFORCEMENT", default_value_t = true)]
    pub usage_enforcement: bool,

    /// When true, a ledger connection failure blocks the reservation
    /// instead of being logged and bypassed (spec §9 open question).
    #[arg(long, env = "MANAGER_USAGE_STRICT", default_value_t = false)]
    pub usage_strict: bool,

    /// Dispatcher polling interval, in seconds.
    #[arg(long, env = "MANAGER_DISPATCHER_TICK_SECS", default_value_t = 10)]
    pub dispatcher_tick_secs: u64,

    /// Optional JSON file of computehosts to register at startup, each
    /// shaped like the `physical:host:create_computehost` RPC payload.
    #[arg(long, env = "MANAGER_SEED_HOSTS_FILE")]
    pub seed_hosts_file: Option<String>,

    /// Directory the file log sink writes into.
    #[arg(long, env = "MANAGER_LOG_DIR", default_value = "logs")]
    pub log_dir: String,
}

impl Config {
    pub fn dispatcher_tick(&self) -> Duration {
        Duration::from_secs(self.dispatcher_tick_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            plugins: vec!["physical:host".to_string()],
            notify_hours_before_lease_end: 48,
            usage_db_host: None,
            usage_default_allocated: 0.0,
            aggregate_freepool_name: "freepool".to_string(),
            usage_enforcement: true,
            usage_strict: false,
            dispatcher_tick_secs: 10,
            seed_hosts_file: None,
            log_dir: "logs".to_string(),
        }
    }
}
