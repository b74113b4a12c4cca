use clap::Parser;
use lease_scheduler::config::Config;
use lease_scheduler::dispatcher::Dispatcher;
use lease_scheduler::inventory::NullInventory;
use lease_scheduler::loader::parser::parse_json_file;
use lease_scheduler::logger;
use lease_scheduler::manager::LeaseManager;
use lease_scheduler::notification::LoggingNotificationSink;
use lease_scheduler::persistence::memory::MemoryPersistence;
use lease_scheduler::persistence::Persistence;
use lease_scheduler::plugins::host::HostReservationPlugin;
use lease_scheduler::plugins::PluginRegistry;
use lease_scheduler::trust::StaticTrustProvider;
use lease_scheduler::usage::MapLedger;
use serde_json::Value;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = Config::parse();
    logger::init(&config.log_dir);
    log::info!("starting lease scheduler with plugins: {:?}", config.plugins);

    let persistence: Arc<dyn Persistence> = Arc::new(MemoryPersistence::new());
    let ledger = Arc::new(MapLedger::new());
    let inventory = Arc::new(NullInventory);

    let mut registry = PluginRegistry::new();
    for resource_type in &config.plugins {
        if resource_type == "physical:host" {
            let plugin = Arc::new(HostReservationPlugin::new(
                persistence.clone(),
                ledger.clone(),
                inventory.clone(),
                config.aggregate_freepool_name.clone(),
                config.usage_enforcement,
                config.usage_strict,
            ));
            if let Err(e) = registry.register(plugin) {
                log::error!("failed to register plugin {resource_type}: {e}");
            }
        } else {
            log::warn!("unrecognized plugin {resource_type} in MANAGER_PLUGINS, skipping");
        }
    }
    let registry = Arc::new(registry);

    if let Err(e) = persistence.pool_create(&config.aggregate_freepool_name).await {
        log::error!("failed to bootstrap freepool {}: {e}", config.aggregate_freepool_name);
    }

    if let Some(path) = &config.seed_hosts_file {
        match parse_json_file::<Vec<Value>>(path) {
            Ok(hosts) => {
                for host in hosts {
                    if let Err(e) = registry.dispatch("physical:host:create_computehost", host).await {
                        log::error!("failed to seed host from {path}: {e}");
                    }
                }
            }
            Err(e) => log::error!("failed to load seed hosts file {path}: {e}"),
        }
    }

    let trust = Arc::new(StaticTrustProvider::new());
    let notifications = Arc::new(LoggingNotificationSink);
    let manager = Arc::new(LeaseManager::new(persistence.clone(), registry, notifications, trust, config.notify_hours_before_lease_end));

    let dispatcher = Arc::new(Dispatcher::new(persistence, manager, config.dispatcher_tick()));
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let dispatcher_handle = tokio::spawn(dispatcher.run(shutdown_rx));

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {e}");
    }
    log::info!("shutdown requested, waiting for the dispatcher to settle");
    shutdown_tx.send(true).ok();
    dispatcher_handle.await.ok();
}
